//! `$HOME/.boat.conf`: who the client is and where it uploads to.
//!
//! Same `key = value` syntax as the server file, without sections:
//!
//! ```text
//! username = alice
//! key = correct horse battery staple
//! host = boat.example.net
//! port = 19184
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use client::Credentials;
use daemon::{DEFAULT_PORT, IniLine, scan_ini};
use thiserror::Error;
use zeroize::Zeroizing;

/// File name of the client configuration inside `$HOME`.
pub const CLIENT_CONFIG_FILE: &str = ".boat.conf";

/// Host used when the configuration names none.
pub const DEFAULT_HOST: &str = "localhost";

/// Errors raised while loading the client configuration.
#[derive(Debug, Error)]
pub enum ClientConfigError {
    /// The configuration file does not exist.
    #[error("{} does not exist", path.display())]
    Missing {
        /// Path that was looked up.
        path: PathBuf,
    },
    /// The configuration file could not be read.
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying failure.
        source: io::Error,
    },
    /// A line could not be parsed.
    #[error("{}: line {line}: {message}", path.display())]
    Syntax {
        /// File containing the line.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What is wrong.
        message: String,
    },
    /// `$HOME` is unset, so there is no default file.
    #[error("HOME is not set; pass the configuration file with -c")]
    NoHome,
    /// Neither the file nor the environment supplies a username.
    #[error("{}: no username configured", path.display())]
    NoUsername {
        /// File that was loaded.
        path: PathBuf,
    },
    /// Neither the file nor `BOAT_KEY` supplies a key.
    #[error("{}: no key configured (set 'key' or BOAT_KEY)", path.display())]
    NoKey {
        /// File that was loaded.
        path: PathBuf,
    },
}

/// Parsed client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    path: PathBuf,
    username: Option<String>,
    key: Option<Zeroizing<Vec<u8>>>,
    host: String,
    port: u16,
}

impl ClientConfig {
    /// `$HOME/.boat.conf`, if `home` is known.
    pub fn default_path(home: Option<&Path>) -> Result<PathBuf, ClientConfigError> {
        home.map(|home| home.join(CLIENT_CONFIG_FILE))
            .ok_or(ClientConfigError::NoHome)
    }

    /// Reads and parses `path`.
    pub fn from_file(path: &Path) -> Result<Self, ClientConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ClientConfigError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                ClientConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(&contents, path)
    }

    /// Parses configuration text; `path` is used in error messages.
    pub fn parse(input: &str, path: &Path) -> Result<Self, ClientConfigError> {
        let mut config = Self {
            path: path.to_path_buf(),
            username: None,
            key: None,
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
        };
        let syntax = |line: usize, message: String| ClientConfigError::Syntax {
            path: path.to_path_buf(),
            line,
            message,
        };

        for (number, line) in scan_ini(input) {
            let (key, value) = match line.map_err(|error| syntax(number, error.to_string()))? {
                IniLine::Entry { key, value } => (key, value),
                IniLine::Section(_) => {
                    return Err(syntax(number, "unexpected section header".to_owned()));
                }
            };

            match key.as_str() {
                "username" => config.username = Some(value.to_owned()),
                "key" => config.key = Some(Zeroizing::new(value.as_bytes().to_vec())),
                "host" => {
                    if value.is_empty() {
                        return Err(syntax(number, "host must not be empty".to_owned()));
                    }
                    config.host = value.to_owned();
                }
                "port" => {
                    config.port = match value.parse::<u16>() {
                        Ok(port) if port > 0 => port,
                        _ => return Err(syntax(number, "invalid port number".to_owned())),
                    };
                }
                _ => return Err(syntax(number, format!("unknown parameter '{key}'"))),
            }
        }

        Ok(config)
    }

    /// Server host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Builds credentials; a non-empty `env_key` takes precedence over the file.
    pub fn credentials(&self, env_key: Option<Vec<u8>>) -> Result<Credentials, ClientConfigError> {
        let username = self
            .username
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ClientConfigError::NoUsername {
                path: self.path.clone(),
            })?;
        let key = env_key
            .filter(|key| !key.is_empty())
            .or_else(|| self.key.as_ref().map(|key| key.to_vec()))
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ClientConfigError::NoKey {
                path: self.path.clone(),
            })?;
        Ok(Credentials::new(username, key))
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("path", &self.path)
            .field("username", &self.username)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}
