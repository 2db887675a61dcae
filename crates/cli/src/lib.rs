#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` implements the command-line front ends of the Boat workspace:
//! [`run_client`] backs the `boat` uploader and [`run_daemon`] backs `boatd`.
//! Both accept an argument iterator together with handles for standard
//! output and error so they can be driven from tests exactly as the binaries
//! drive them from `main`.
//!
//! # Design
//!
//! - Arguments are parsed with a [`clap`](https://docs.rs/clap/) builder
//!   definition. `-v` may be repeated and maps to a
//!   [`logging::Verbosity`]; `BOAT_LOG` overrides it.
//! - `boat` reads `$HOME/.boat.conf` (or `-c FILE`), lets `--host`/`--port`
//!   override it and takes the key from `BOAT_KEY` when that is set. Regular
//!   files are hashed before upload so the server can deduplicate; standard
//!   input is spooled to an anonymous temporary file and uploaded with a
//!   deferred hash.
//! - `boatd` forwards to [`daemon::run_blocking`].
//!
//! # Invariants
//!
//! - The entry points never panic; failures surface as non-zero exit codes
//!   with a one-line diagnostic on the error handle.
//! - `boat` exits `0` only after the server's acceptance signature verified.
//!
//! # Examples
//!
//! ```
//! let mut stdout = Vec::new();
//! let mut stderr = Vec::new();
//! let status = cli::run_client(["boat", "--version"], &mut stdout, &mut stderr);
//!
//! assert_eq!(status, 0);
//! assert!(String::from_utf8(stdout).unwrap().starts_with("boat "));
//! assert!(stderr.is_empty());
//! ```

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::ArgMatches;
use clap::error::ErrorKind;
use logging::Verbosity;

mod client_config;
mod command_builder;
mod upload;

pub use client_config::{CLIENT_CONFIG_FILE, ClientConfig, ClientConfigError, DEFAULT_HOST};
pub use command_builder::{CLIENT_PROGRAM_NAME, DAEMON_PROGRAM_NAME};
pub use upload::UploadError;

use command_builder::{client_command, daemon_command};
use upload::{UploadRequest, execute, resolve_operands};

/// Maximum exit code representable by a Unix process.
const MAX_EXIT_CODE: i32 = u8::MAX as i32;

/// Process state the uploader reads besides its arguments.
pub struct ClientEnvironment<R> {
    stdin: R,
    key: Option<Vec<u8>>,
    home: Option<PathBuf>,
}

impl<R: Read> ClientEnvironment<R> {
    /// Environment with the given standard input and nothing else set.
    pub fn new(stdin: R) -> Self {
        Self {
            stdin,
            key: None,
            home: None,
        }
    }

    /// Supplies the `BOAT_KEY` value.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Supplies `$HOME`.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }
}

impl ClientEnvironment<io::StdinLock<'static>> {
    /// Reads standard input, `BOAT_KEY` and `HOME` from the running process.
    pub fn from_process() -> Self {
        Self {
            stdin: io::stdin().lock(),
            key: std::env::var_os(client::KEY_ENV).map(OsString::into_encoded_bytes),
            home: std::env::var_os("HOME").map(PathBuf::from),
        }
    }
}

/// Runs `boat` with the process environment. Returns the exit status.
pub fn run_client<I, Out, Err>(args: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
    Out: Write,
    Err: Write,
{
    run_client_with(args, ClientEnvironment::from_process(), stdout, stderr)
}

/// Runs `boat` against an explicit environment. Returns the exit status.
pub fn run_client_with<I, R, Out, Err>(
    args: I,
    environment: ClientEnvironment<R>,
    stdout: &mut Out,
    stderr: &mut Err,
) -> i32
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
    R: Read,
    Out: Write,
    Err: Write,
{
    let matches = match client_command().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(error) => return report_usage(&error, stdout, stderr),
    };
    let _ = logging::init_tracing(verbosity(&matches, Verbosity::Normal));

    match upload(&matches, environment) {
        Ok(receipt) => {
            tracing::info!(outcome = ?receipt.outcome, hash = %receipt.hash, "upload acknowledged");
            0
        }
        Err(error) => {
            let _ = writeln!(stderr, "{CLIENT_PROGRAM_NAME}: {error}");
            1
        }
    }
}

fn upload<R: Read>(
    matches: &ArgMatches,
    environment: ClientEnvironment<R>,
) -> Result<client::Receipt, UploadError> {
    let ClientEnvironment { stdin, key, home } = environment;

    let source = matches
        .get_one::<OsString>("source")
        .map(OsString::as_os_str)
        .unwrap_or_default();
    let destination = matches
        .get_one::<OsString>("destination")
        .map(OsString::as_os_str);
    let (source, destination) = resolve_operands(source, destination)?;

    let path = match matches.get_one::<PathBuf>("config") {
        Some(path) => path.clone(),
        None => ClientConfig::default_path(home.as_deref())?,
    };
    let config = ClientConfig::from_file(&path)?;
    let credentials = config.credentials(key)?;

    let request = UploadRequest {
        source,
        destination,
        host: matches
            .get_one::<String>("host")
            .cloned()
            .unwrap_or_else(|| config.host().to_owned()),
        port: matches
            .get_one::<u16>("port")
            .copied()
            .unwrap_or_else(|| config.port()),
        credentials,
    };
    execute(request, stdin)
}

/// Runs `boatd` until it is stopped. Returns the exit status.
pub fn run_daemon<I, Out, Err>(args: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
    Out: Write,
    Err: Write,
{
    let matches = match daemon_command().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(error) => return report_usage(&error, stdout, stderr),
    };
    let _ = logging::init_tracing(verbosity(&matches, Verbosity::Verbose));

    let options = daemon::DaemonOptions {
        config_path: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(daemon::DEFAULT_CONFIG_PATH)),
        address: matches.get_one::<String>("address").cloned(),
        port: matches.get_one::<u16>("port").copied(),
    };

    match daemon::run_blocking(options) {
        Ok(()) => 0,
        Err(error) => {
            tracing::error!(%error, "daemon stopped");
            let _ = writeln!(stderr, "{DAEMON_PROGRAM_NAME}: {error}");
            error.exit_code()
        }
    }
}

/// Converts a numeric exit code into an [`std::process::ExitCode`].
#[must_use]
pub fn exit_code_from(status: i32) -> std::process::ExitCode {
    let clamped = status.clamp(0, MAX_EXIT_CODE);
    std::process::ExitCode::from(clamped as u8)
}

/// `-q` wins; otherwise each `-v` raises `base` one level.
fn verbosity(matches: &ArgMatches, base: Verbosity) -> Verbosity {
    if matches.get_flag("quiet") {
        return Verbosity::Quiet;
    }
    (0..matches.get_count("verbose")).fold(base, |level, _| level.raised())
}

fn report_usage<Out: Write, Err: Write>(
    error: &clap::Error,
    stdout: &mut Out,
    stderr: &mut Err,
) -> i32 {
    let rendered = error.render();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = write!(stdout, "{rendered}");
            0
        }
        _ => {
            let _ = write!(stderr, "{rendered}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str], environment: ClientEnvironment<&[u8]>) -> (i32, String, String) {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let status = run_client_with(args.iter().copied(), environment, &mut stdout, &mut stderr);
        (
            status,
            String::from_utf8(stdout).unwrap(),
            String::from_utf8(stderr).unwrap(),
        )
    }

    #[test]
    fn help_goes_to_stdout() {
        let (status, stdout, stderr) = run(&["boat", "--help"], ClientEnvironment::new(&[][..]));
        assert_eq!(status, 0);
        assert!(stdout.contains("SOURCE"));
        assert!(stderr.is_empty());
    }

    #[test]
    fn missing_source_is_a_usage_error() {
        let (status, stdout, stderr) = run(&["boat"], ClientEnvironment::new(&[][..]));
        assert_eq!(status, 1);
        assert!(stdout.is_empty());
        assert!(stderr.contains("SOURCE"));
    }

    #[test]
    fn stdin_without_destination_fails_before_connecting() {
        let (status, _, stderr) = run(&["boat", "-"], ClientEnvironment::new(&b"data"[..]));
        assert_eq!(status, 1);
        assert_eq!(
            stderr,
            "boat: you must specify a destination filename when uploading from stdin\n"
        );
    }

    #[test]
    fn missing_configuration_is_reported() {
        let home = tempfile::tempdir().unwrap();
        let (status, _, stderr) = run(
            &["boat", "-", "notes.txt"],
            ClientEnvironment::new(&b"data"[..]).with_home(home.path()),
        );
        assert_eq!(status, 1);
        assert!(stderr.ends_with(".boat.conf does not exist\n"), "{stderr}");
    }

    #[test]
    fn daemon_rejects_unknown_flags() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let status = run_daemon(["boatd", "--bogus"], &mut stdout, &mut stderr);
        assert_eq!(status, 1);
        assert!(!stderr.is_empty());
    }

    #[test]
    fn daemon_reports_configuration_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("boat.conf");
        std::fs::write(&config, "port = 0\n").unwrap();

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let status = run_daemon(
            [OsString::from("boatd"), OsString::from("-c"), config.into_os_string()],
            &mut stdout,
            &mut stderr,
        );
        assert_eq!(status, 2);
        let stderr = String::from_utf8(stderr).unwrap();
        assert!(stderr.contains("line 1: invalid port number"), "{stderr}");
    }

    #[test]
    fn exit_codes_are_clamped() {
        assert_eq!(exit_code_from(-1), std::process::ExitCode::from(0));
        assert_eq!(exit_code_from(300), std::process::ExitCode::from(255));
    }
}
