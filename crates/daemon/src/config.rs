//! Daemon configuration file parsing for boat.conf.
//!
//! The configuration consists of global parameters followed by one section per
//! user. Section names are usernames.
//!
//! # Format
//!
//! ```ini
//! # Global parameters
//! address = 0.0.0.0
//! port = 19184
//! storage path = /var/lib/boat
//!
//! [alice]
//! key = correct horse battery staple
//! repository = alice
//! access = rw
//! versioning = yes
//! ```
//!
//! # Example
//!
//! ```no_run
//! use daemon::ServerConfig;
//! use std::path::Path;
//!
//! let config = ServerConfig::from_file(Path::new("/etc/boat.conf"))?;
//! if let Some(alice) = config.user("alice") {
//!     println!("alice uploads into {}", alice.repository());
//! }
//! # Ok::<(), daemon::ConfigError>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use protocol::{is_valid_filename, is_valid_username};
use repository::Storage;
use zeroize::Zeroizing;

use crate::ini::{IniLine, scan_ini};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/boat.conf";

/// Default listen address.
pub const DEFAULT_ADDRESS: &str = "localhost";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 19184;

/// Default storage root.
pub const DEFAULT_STORAGE_PATH: &str = "/var/lib/boat";

/// Default limit on concurrent connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Default read inactivity timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Errors that can occur while loading configuration files.
#[derive(Debug, Clone)]
pub struct ConfigError {
    line: Option<usize>,
    message: String,
    path: Option<PathBuf>,
}

impl ConfigError {
    fn io_error(path: &Path, source: &io::Error) -> Self {
        Self {
            line: None,
            message: format!("failed to read '{}': {}", path.display(), source),
            path: Some(path.to_path_buf()),
        }
    }

    fn at_line(path: &Path, line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
            path: Some(path.to_path_buf()),
        }
    }

    fn whole_file(path: &Path, message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
            path: Some(path.to_path_buf()),
        }
    }

    /// Returns the line number where the error occurred, if available.
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Returns the configuration file path where the error occurred.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the error message without location.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}: ", path.display())?;
        }
        if let Some(line) = self.line {
            write!(f, "line {line}: ")?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// What a user may do once authenticated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
    /// Uploads allowed.
    ReadWrite,
    /// Uploads refused with `400 no write access`.
    ReadOnly,
}

impl Access {
    /// Returns `true` when uploads are allowed.
    pub const fn can_write(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// A user's shared secret. Zeroed on drop and never printed.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<Vec<u8>>);

impl SecretKey {
    /// Wraps raw key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    /// Key bytes for signing.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// One configured user.
#[derive(Clone, Debug)]
pub struct UserRecord {
    name: String,
    key: SecretKey,
    access: Access,
    repository: String,
    versioning: bool,
}

impl UserRecord {
    /// Creates a read-write, versioned user.
    pub fn new(name: impl Into<String>, key: impl Into<Vec<u8>>, repository: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: SecretKey::new(key),
            access: Access::ReadWrite,
            repository: repository.into(),
            versioning: true,
        }
    }

    /// Sets the access level.
    #[must_use]
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Enables or disables versioning.
    #[must_use]
    pub fn with_versioning(mut self, versioning: bool) -> Self {
        self.versioning = versioning;
        self
    }

    /// Username.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared secret.
    pub fn key(&self) -> &SecretKey {
        &self.key
    }

    /// Access level.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Repository the user uploads into.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Whether every upload is kept as a new version.
    pub fn versioning(&self) -> bool {
        self.versioning
    }
}

/// Resolved daemon configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    address: String,
    port: u16,
    storage_path: PathBuf,
    max_connections: usize,
    timeout: Duration,
    users: HashMap<String, Arc<UserRecord>>,
}

impl ServerConfig {
    /// Configuration with default listener settings and no users.
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_owned(),
            port: DEFAULT_PORT,
            storage_path: storage_path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            users: HashMap::new(),
        }
    }

    /// Adds or replaces a user.
    #[must_use]
    pub fn with_user(mut self, user: UserRecord) -> Self {
        self.users.insert(user.name.clone(), Arc::new(user));
        self
    }

    /// Sets the read inactivity timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parses a configuration file from the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid syntax or
    /// fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, &e))?;
        Self::parse(&contents, path)
    }

    /// Parses configuration from a string. `path` is used in error messages.
    pub fn parse(input: &str, path: &Path) -> Result<Self, ConfigError> {
        Parser::new(input, path).parse()
    }

    /// Host name or address to listen on.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Port to listen on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Storage root.
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Storage rooted at [`storage_path`](Self::storage_path).
    pub fn storage(&self) -> Storage {
        Storage::new(&self.storage_path)
    }

    /// Concurrent connection limit.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Read inactivity timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Looks up a user by name.
    pub fn user(&self, name: &str) -> Option<Arc<UserRecord>> {
        self.users.get(name).cloned()
    }

    /// All configured users, in no particular order.
    pub fn users(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.values().map(AsRef::as_ref)
    }
}

struct Parser<'a> {
    input: &'a str,
    path: &'a Path,
    line_number: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, path: &'a Path) -> Self {
        Self {
            input,
            path,
            line_number: 0,
        }
    }

    fn parse(&mut self) -> Result<ServerConfig, ConfigError> {
        let mut config = ServerConfig::new(DEFAULT_STORAGE_PATH);
        let mut current_user: Option<UserBuilder> = None;
        let mut user_lines: HashMap<String, usize> = HashMap::new();

        for (line_number, line) in scan_ini(self.input) {
            self.line_number = line_number;
            match line.map_err(|syntax| self.error(syntax.to_string()))? {
                IniLine::Section(name) => {
                    if let Some(builder) = current_user.take() {
                        let user = builder.build(self.path)?;
                        config.users.insert(user.name.clone(), Arc::new(user));
                    }

                    if !is_valid_username(name) {
                        return Err(self.error(format!("invalid username '{name}'")));
                    }
                    if let Some(prev_line) = user_lines.get(name) {
                        return Err(self.error(format!(
                            "duplicate user '{name}' (previously defined at line {prev_line})"
                        )));
                    }
                    user_lines.insert(name.to_owned(), line_number);

                    current_user = Some(UserBuilder::new(name.to_owned(), line_number));
                }
                IniLine::Entry { key, value } => {
                    if let Some(ref mut builder) = current_user {
                        self.parse_user_directive(builder, &key, value)?;
                    } else {
                        self.parse_global_directive(&mut config, &key, value)?;
                    }
                }
            }
        }

        if let Some(builder) = current_user {
            let user = builder.build(self.path)?;
            config.users.insert(user.name.clone(), Arc::new(user));
        }

        if config.users.is_empty() {
            return Err(ConfigError::whole_file(
                self.path,
                "configuration file does not define any users",
            ));
        }

        Ok(config)
    }

    fn parse_global_directive(
        &self,
        config: &mut ServerConfig,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        match key {
            "address" => {
                if value.is_empty() {
                    return Err(self.error("address must not be empty"));
                }
                config.address = value.to_owned();
            }
            "port" => {
                config.port = match value.parse::<u16>() {
                    Ok(port) if port > 0 => port,
                    _ => return Err(self.error("invalid port number")),
                };
            }
            "storage path" => {
                if value.is_empty() {
                    return Err(self.error("storage path must not be empty"));
                }
                config.storage_path = PathBuf::from(value);
            }
            "max connections" => {
                config.max_connections = match value.parse::<usize>() {
                    Ok(max) if max > 0 => max,
                    _ => return Err(self.error("invalid max connections value")),
                };
            }
            "timeout" => {
                config.timeout = match value.parse::<u64>() {
                    Ok(secs) if secs > 0 => Duration::from_secs(secs),
                    _ => return Err(self.error("invalid timeout value")),
                };
            }
            _ => return Err(self.error(format!("unknown global parameter '{key}'"))),
        }
        Ok(())
    }

    fn parse_user_directive(
        &self,
        builder: &mut UserBuilder,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        match key {
            "key" => {
                if value.is_empty() {
                    return Err(self.error("key must not be empty"));
                }
                builder.key = Some(SecretKey::new(value.as_bytes()));
            }
            "repository" => {
                // `.` and `..` would resolve to `repositories/` itself or the storage root.
                if !is_valid_filename(value) || value.starts_with('.') {
                    return Err(self.error(format!("invalid repository name '{value}'")));
                }
                builder.repository = Some(value.to_owned());
            }
            "access" => {
                builder.access = Some(match value.to_ascii_lowercase().as_str() {
                    "rw" | "read-write" => Access::ReadWrite,
                    "r" | "read-only" => Access::ReadOnly,
                    _ => return Err(self.error(format!("invalid access value '{value}'"))),
                });
            }
            "versioning" => {
                builder.versioning = Some(self.parse_bool(value)?);
            }
            _ => return Err(self.error(format!("unknown user parameter '{key}'"))),
        }
        Ok(())
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Ok(true),
            "no" | "false" | "0" => Ok(false),
            _ => Err(self.error(format!("invalid boolean value '{value}'"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::at_line(self.path, self.line_number, message)
    }
}

struct UserBuilder {
    name: String,
    line: usize,
    key: Option<SecretKey>,
    repository: Option<String>,
    access: Option<Access>,
    versioning: Option<bool>,
}

impl UserBuilder {
    fn new(name: String, line: usize) -> Self {
        Self {
            name,
            line,
            key: None,
            repository: None,
            access: None,
            versioning: None,
        }
    }

    fn build(self, path: &Path) -> Result<UserRecord, ConfigError> {
        let key = self.key.ok_or_else(|| {
            ConfigError::at_line(
                path,
                self.line,
                format!("user '{}' is missing required 'key' directive", self.name),
            )
        })?;
        let repository = self.repository.ok_or_else(|| {
            ConfigError::at_line(
                path,
                self.line,
                format!("user '{}' is missing required 'repository' directive", self.name),
            )
        })?;

        Ok(UserRecord {
            name: self.name,
            key,
            access: self.access.unwrap_or(Access::ReadWrite),
            repository,
            versioning: self.versioning.unwrap_or(true),
        })
    }
}
