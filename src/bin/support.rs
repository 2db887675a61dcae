use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

/// Signature shared by the `cli` entry points.
pub type EntryPoint<Out, Err> = fn(Vec<OsString>, &mut Out, &mut Err) -> i32;

/// Forwards `args` to `entry` and maps its status to an [`ExitCode`].
///
/// Both binaries call into this helper so argument collection, output
/// flushing and status clamping stay identical.
pub fn dispatch<I, Out, Err>(
    args: I,
    stdout: &mut Out,
    stderr: &mut Err,
    entry: EntryPoint<Out, Err>,
) -> ExitCode
where
    I: IntoIterator,
    I::Item: Into<OsString>,
    Out: Write,
    Err: Write,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let status = entry(args, stdout, stderr);
    let _ = stdout.flush();
    let _ = stderr.flush();
    cli::exit_code_from(status)
}
