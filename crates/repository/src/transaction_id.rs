use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier naming a transaction's temporary file and version file.
///
/// Rendered as `<unix-seconds>.<pid>.<connection-id>.<sequence>`. The
/// connection id is unique within the process and the sequence is unique
/// within the connection, so two live transactions never share an id.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct TransactionId {
    seconds: u64,
    pid: u32,
    connection: u64,
    sequence: u64,
}

impl TransactionId {
    /// Builds an id stamped with the current time and process id.
    #[must_use]
    pub fn new(connection: u64, sequence: u64) -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Self {
            seconds,
            pid: std::process::id(),
            connection,
            sequence,
        }
    }

    /// Connection that opened the transaction.
    #[must_use]
    pub const fn connection(&self) -> u64 {
        self.connection
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.seconds, self.pid, self.connection, self.sequence
        )
    }
}
