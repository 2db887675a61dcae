use crate::status::{Reply, StatusCode};

/// Protocol revision announced in the greeting.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Text that follows `220 ` in every greeting.
pub const GREETING_PREFIX: &str = "Boat Server";

/// Builds `220 Boat Server <version>`.
#[must_use]
pub fn format_greeting(version: &str) -> Reply {
    Reply::new(StatusCode::GREETING, format!("{GREETING_PREFIX} {version}"))
}

/// Returns `true` when `reply` is a greeting. Only the status code is
/// checked, so servers with a different banner text still qualify.
#[must_use]
pub fn is_greeting(reply: &Reply) -> bool {
    reply.code() == StatusCode::GREETING
}
