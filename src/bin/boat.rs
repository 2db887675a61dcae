#![deny(unsafe_code)]

mod support;

use std::{env, io, process::ExitCode};

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    support::dispatch(env::args_os(), &mut stdout, &mut stderr, cli::run_client)
}

#[cfg(test)]
mod tests {
    use super::support;
    use std::process::ExitCode;

    #[test]
    fn version_flag_reports_success() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let exit = support::dispatch(["boat", "--version"], &mut stdout, &mut stderr, cli::run_client);

        assert_eq!(exit, ExitCode::SUCCESS);
        assert!(!stdout.is_empty());
        assert!(stderr.is_empty());
    }

    #[test]
    fn unknown_flag_reports_failure() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let exit = support::dispatch(["boat", "--bogus"], &mut stdout, &mut stderr, cli::run_client);

        assert_eq!(exit, ExitCode::from(1));
        assert!(!stderr.is_empty());
    }
}
