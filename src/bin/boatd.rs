#![deny(unsafe_code)]

mod support;

use std::{env, io, process::ExitCode};

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    support::dispatch(env::args_os(), &mut stdout, &mut stderr, cli::run_daemon)
}
