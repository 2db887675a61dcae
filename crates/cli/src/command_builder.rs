//! clap definitions for `boat` and `boatd`.

use clap::builder::{OsStringValueParser, PathBufValueParser};
use clap::{Arg, ArgAction, Command, value_parser};

/// Program name of the upload client.
pub const CLIENT_PROGRAM_NAME: &str = "boat";

/// Program name of the daemon.
pub const DAEMON_PROGRAM_NAME: &str = "boatd";

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) fn client_command() -> Command {
    Command::new(CLIENT_PROGRAM_NAME)
        .version(VERSION)
        .about("Upload a file to a Boat server")
        .arg(verbose_arg())
        .arg(quiet_arg())
        .arg(config_arg("Client configuration file [default: $HOME/.boat.conf]"))
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Server to connect to, overriding the configuration file"),
        )
        .arg(port_arg("Server port, overriding the configuration file"))
        .arg(
            Arg::new("source")
                .value_name("SOURCE")
                .required(true)
                .value_parser(OsStringValueParser::new())
                .help("File to upload, or - to read standard input"),
        )
        .arg(
            Arg::new("destination")
                .value_name("DESTINATION")
                .value_parser(OsStringValueParser::new())
                .help("Name to store the upload under [default: base name of SOURCE]"),
        )
}

pub(crate) fn daemon_command() -> Command {
    Command::new(DAEMON_PROGRAM_NAME)
        .version(VERSION)
        .about("Serve authenticated, deduplicating Boat uploads")
        .arg(verbose_arg())
        .arg(quiet_arg())
        .arg(config_arg("Server configuration file [default: /etc/boat.conf]"))
        .arg(
            Arg::new("address")
                .long("address")
                .value_name("ADDRESS")
                .help("Address to listen on, overriding the configuration file"),
        )
        .arg(port_arg("Port to listen on, overriding the configuration file"))
}

fn verbose_arg() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::Count)
        .help("Increase logging verbosity (repeatable)")
}

fn quiet_arg() -> Arg {
    Arg::new("quiet")
        .short('q')
        .long("quiet")
        .action(ArgAction::SetTrue)
        .conflicts_with("verbose")
        .help("Only log errors")
}

fn config_arg(help: &'static str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .value_parser(PathBufValueParser::new())
        .help(help)
}

fn port_arg(help: &'static str) -> Arg {
    Arg::new("port")
        .short('p')
        .long("port")
        .value_name("PORT")
        .value_parser(value_parser!(u16).range(1..))
        .help(help)
}
