use std::fmt;

use zeroize::Zeroizing;

/// Environment variable that overrides the configured shared key.
pub const KEY_ENV: &str = "BOAT_KEY";

/// A username and its shared key. The key is zeroed on drop and never printed.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    key: Zeroizing<Vec<u8>>,
}

impl Credentials {
    /// Creates credentials from raw key bytes.
    pub fn new(username: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            username: username.into(),
            key: Zeroizing::new(key.into()),
        }
    }

    /// Username sent in `USER`.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}
