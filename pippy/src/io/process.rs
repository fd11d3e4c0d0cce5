//! Running child processes with inspectable results.
//!
//! Every spawn blocks until the child exits. There is no timeout: a hung
//! child blocks the caller until the host delivers a signal.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use tracing::{debug, error, instrument, warn};

use crate::core::quote::render_command_line;
use crate::core::types::CommandResult;
use crate::error::PippyError;
use crate::io::report::Reporter;

/// Bytes of a child's stderr kept for error reports; older output is dropped.
pub const STDERR_TAIL_LIMIT: usize = 64 * 1024;

/// A command line interpreted by the platform shell.
///
/// Only constructible from `'static` strings so externally supplied values
/// can never reach the shell. Use it for commands that need globbing or
/// chaining; everything else goes through [`Invocation::Args`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellCommand(&'static str);

impl ShellCommand {
    pub const fn new(script: &'static str) -> Self {
        Self(script)
    }

    pub fn script(&self) -> &'static str {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Discrete argument list, program first. Never passes through a shell.
    Args(Vec<OsString>),
    Shell(ShellCommand),
}

/// Everything needed to run one external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub invocation: Invocation,
    pub cwd: Option<PathBuf>,
    /// Variables layered on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Capture stdout instead of streaming it to the terminal.
    pub capture: bool,
    /// Treat a non-zero exit as [`PippyError::CommandFailed`].
    pub check: bool,
    /// Hand the terminal to the child: stdout and stderr are inherited and
    /// nothing is captured.
    pub interactive: bool,
}

impl RunRequest {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self::from_invocation(Invocation::Args(
            argv.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn shell(command: ShellCommand) -> Self {
        Self::from_invocation(Invocation::Shell(command))
    }

    fn from_invocation(invocation: Invocation) -> Self {
        Self {
            invocation,
            cwd: None,
            env: BTreeMap::new(),
            capture: false,
            check: true,
            interactive: false,
        }
    }

    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_capture(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn without_check(mut self) -> Self {
        self.check = false;
        self
    }

    /// Inherit every stream and never fail on the exit code.
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self.capture = false;
        self.check = false;
        self
    }

    /// Argument list for non-shell invocations.
    pub fn argv(&self) -> Option<&[OsString]> {
        match &self.invocation {
            Invocation::Args(argv) => Some(argv),
            Invocation::Shell(_) => None,
        }
    }

    /// Human-readable command line; each argument is quoted.
    pub fn describe(&self) -> Result<String, PippyError> {
        match &self.invocation {
            Invocation::Args(argv) => render_command_line(argv),
            Invocation::Shell(command) => Ok(command.script().to_string()),
        }
    }
}

/// A process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub result: CommandResult,
    /// Stderr was already shown live while the process ran.
    pub stderr_streamed: bool,
}

/// Executes external processes.
///
/// Implementors provide [`CommandRunner::execute`], which never inspects the
/// exit code; [`CommandRunner::run`] layers the `check` semantics on top so
/// every runner fails the same way.
pub trait CommandRunner {
    fn execute(&self, request: &RunRequest) -> Result<Completed, PippyError>;

    fn reporter(&self) -> &dyn Reporter;

    fn run(&self, request: &RunRequest) -> Result<CommandResult, PippyError> {
        let completed = self.execute(request)?;
        let result = completed.result;
        if request.check && !result.success() {
            let command = request.describe()?;
            error!(code = result.code, command = %command, "command failed");
            if !completed.stderr_streamed && !result.stderr.is_empty() {
                self.reporter().command_stderr(&command, &result.stderr);
            }
            return Err(PippyError::CommandFailed {
                command,
                code: result.code,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }
}

/// Runner backed by `std::process::Command`.
pub struct SystemRunner<'a> {
    reporter: &'a dyn Reporter,
}

impl<'a> SystemRunner<'a> {
    pub fn new(reporter: &'a dyn Reporter) -> Self {
        Self { reporter }
    }
}

impl CommandRunner for SystemRunner<'_> {
    #[instrument(skip_all, fields(capture = request.capture, check = request.check))]
    fn execute(&self, request: &RunRequest) -> Result<Completed, PippyError> {
        let description = request.describe()?;
        let (mut cmd, program) = build_command(&request.invocation)?;
        if let Some(dir) = &request.cwd {
            // The launcher reports a missing cwd as NotFound too.
            if !dir.is_dir() {
                return Err(PippyError::io(
                    format!("working directory not found: {}", dir.display()),
                    io::ErrorKind::NotFound.into(),
                ));
            }
            cmd.current_dir(dir);
        }
        cmd.envs(&request.env);
        cmd.stdin(Stdio::inherit());
        if request.capture {
            cmd.stdout(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
        }
        if request.interactive {
            cmd.stderr(Stdio::inherit());
        } else {
            cmd.stderr(Stdio::piped());
        }

        debug!(command = %description, cwd = ?request.cwd, "running command");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                error!(program = %program, "command not found");
                return Err(PippyError::ExecutableNotFound { program });
            }
            Err(e) => {
                error!(err = %e, command = %description, "failed to spawn command");
                return Err(PippyError::SpawnFailed {
                    command: description,
                    source: e,
                });
            }
        };

        let stdout_handle = child
            .stdout
            .take()
            .map(|stdout| thread::spawn(move || read_stream(stdout)));
        let tee = !request.capture;
        let stderr_handle = child
            .stderr
            .take()
            .map(|stderr| thread::spawn(move || read_stderr_tail(stderr, tee, STDERR_TAIL_LIMIT)));

        let status = child
            .wait()
            .map_err(|e| PippyError::io(format!("wait for {description}"), e))?;

        let stdout = match stdout_handle {
            Some(handle) => join_output(handle)?,
            None => Vec::new(),
        };
        let (stderr, dropped) = match stderr_handle {
            Some(handle) => join_output(handle)?,
            None => (Vec::new(), 0),
        };
        let mut stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        if dropped > 0 {
            warn!(dropped, "stderr truncated to its last {STDERR_TAIL_LIMIT} bytes");
            stderr = format!("[{dropped} earlier bytes of stderr dropped]\n{stderr}");
        }

        let result = CommandResult {
            code: exit_code(status),
            stdout: String::from_utf8_lossy(&stdout).trim().to_string(),
            stderr,
        };
        if !result.stdout.is_empty() {
            debug!(stdout = %result.stdout, "captured stdout");
        }
        if !result.stderr.is_empty() {
            debug!(stderr = %result.stderr, "captured stderr");
        }
        debug!(exit_code = result.code, "command finished");
        Ok(Completed {
            result,
            stderr_streamed: tee,
        })
    }

    fn reporter(&self) -> &dyn Reporter {
        self.reporter
    }
}

fn build_command(invocation: &Invocation) -> Result<(Command, String), PippyError> {
    match invocation {
        Invocation::Args(argv) => {
            let (program, args) = argv
                .split_first()
                .ok_or_else(|| PippyError::InvalidArgument("empty command".to_string()))?;
            let mut cmd = Command::new(program);
            cmd.args(args);
            Ok((cmd, program.to_string_lossy().into_owned()))
        }
        Invocation::Shell(command) => {
            let (shell, flag) = if cfg!(windows) {
                ("cmd", "/C")
            } else {
                ("sh", "-c")
            };
            let mut cmd = Command::new(shell);
            cmd.arg(flag).arg(command.script());
            Ok((cmd, shell.to_string()))
        }
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

fn join_output<T>(handle: thread::JoinHandle<io::Result<T>>) -> Result<T, PippyError> {
    match handle.join() {
        Ok(result) => result.map_err(|e| PippyError::io("read command output", e)),
        Err(_) => Err(PippyError::io(
            "output reader thread panicked",
            io::ErrorKind::Other.into(),
        )),
    }
}

fn read_stream<R: Read>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Read a stream to the end, keeping at most `limit` trailing bytes.
///
/// With `tee` every chunk is echoed to our stderr as it arrives, so partial
/// lines such as prompts show up immediately. Returns the tail and the
/// number of bytes dropped ahead of it.
fn read_stderr_tail<R: Read>(
    mut reader: R,
    tee: bool,
    limit: usize,
) -> io::Result<(Vec<u8>, usize)> {
    let mut tail = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        if tee {
            let mut err = io::stderr().lock();
            // A closed terminal must not lose the captured copy.
            let _ = err.write_all(&chunk[..n]).and_then(|()| err.flush());
        }
        tail.extend_from_slice(&chunk[..n]);
        if tail.len() > limit.saturating_mul(2) {
            let excess = tail.len() - limit;
            tail.drain(..excess);
            dropped += excess;
        }
    }
    if tail.len() > limit {
        let excess = tail.len() - limit;
        tail.drain(..excess);
        dropped += excess;
    }

    Ok((tail, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingReporter, ScriptedRunner};

    #[test]
    fn describe_quotes_arguments() {
        let request = RunRequest::new(["pip", "install", "my package"]);
        let line = request.describe().expect("describe");
        assert!(line.starts_with("pip install "));
        assert_ne!(line, "pip install my package");
    }

    #[test]
    fn builder_defaults_check_on_capture_off() {
        let request = RunRequest::new(["true"]);
        assert!(request.check);
        assert!(!request.capture);
        let request = request.with_capture().without_check().with_env("A", "1");
        assert!(request.capture);
        assert!(!request.check);
        assert_eq!(request.env.get("A").map(String::as_str), Some("1"));
    }

    #[test]
    fn checked_failure_reports_stderr_then_errors() {
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter).respond(1, "", "it broke");

        let err = runner.run(&RunRequest::new(["exit-1"])).unwrap_err();
        match err {
            PippyError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, 1);
                assert_eq!(stderr, "it broke");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(reporter.stderr_reports(), vec!["it broke".to_string()]);
    }

    #[test]
    fn unchecked_failure_returns_triple() {
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter).respond(3, "out", "err");

        let result = runner
            .run(&RunRequest::new(["exit-3"]).without_check())
            .expect("run");
        assert_eq!(
            result,
            CommandResult {
                code: 3,
                stdout: "out".to_string(),
                stderr: "err".to_string(),
            }
        );
        assert!(reporter.stderr_reports().is_empty());
    }

    #[test]
    fn interactive_turns_off_capture_and_check() {
        let request = RunRequest::new(["sh"]).with_capture().interactive();
        assert!(request.interactive);
        assert!(!request.capture);
        assert!(!request.check);
    }

    #[test]
    fn stderr_tail_keeps_last_bytes() {
        let data: Vec<u8> = (0..50_000u32).map(|i| b'a' + (i % 26) as u8).collect();
        let (tail, dropped) =
            read_stderr_tail(std::io::Cursor::new(data.clone()), false, 1000).expect("read");
        assert_eq!(tail.len(), 1000);
        assert_eq!(dropped, 49_000);
        assert_eq!(tail.as_slice(), &data[49_000..]);

        let (short, dropped) =
            read_stderr_tail(std::io::Cursor::new(b"oops\n".to_vec()), false, 1000).expect("read");
        assert_eq!(short, b"oops\n");
        assert_eq!(dropped, 0);
    }

    #[test]
    fn missing_working_directory_is_not_a_missing_program() {
        let temp = tempfile::tempdir().expect("tempdir");
        let reporter = RecordingReporter::default();
        let runner = SystemRunner::new(&reporter);
        let err = runner
            .run(&RunRequest::new(["true"]).with_cwd(temp.path().join("gone")))
            .unwrap_err();
        assert!(matches!(err, PippyError::Io { .. }), "{err:?}");
        assert_eq!(err.exit_code(), crate::exit_codes::FAILURE);
        assert!(err.to_string().contains("working directory not found"));
    }

    #[test]
    fn empty_argv_is_invalid() {
        let reporter = RecordingReporter::default();
        let runner = SystemRunner::new(&reporter);
        let err = runner
            .run(&RunRequest::new(Vec::<OsString>::new()))
            .unwrap_err();
        assert!(matches!(err, PippyError::InvalidArgument(_)));
    }

    #[test]
    fn missing_program_is_executable_not_found() {
        let reporter = RecordingReporter::default();
        let runner = SystemRunner::new(&reporter);
        let err = runner
            .run(&RunRequest::new(["pippy-definitely-not-a-real-program"]))
            .unwrap_err();
        assert!(matches!(err, PippyError::ExecutableNotFound { .. }));
        assert_eq!(err.exit_code(), crate::exit_codes::NOT_FOUND);
    }

    #[cfg(unix)]
    #[test]
    fn real_false_with_check_fails_with_observed_code() {
        let reporter = RecordingReporter::default();
        let runner = SystemRunner::new(&reporter);
        let err = runner.run(&RunRequest::new(["false"])).unwrap_err();
        assert!(matches!(err, PippyError::CommandFailed { code: 1, .. }));

        let result = runner
            .run(&RunRequest::new(["false"]).without_check())
            .expect("unchecked run");
        assert_eq!(result.code, 1);
    }

    #[cfg(unix)]
    #[test]
    fn captured_output_is_trimmed() {
        let reporter = RecordingReporter::default();
        let runner = SystemRunner::new(&reporter);
        let result = runner
            .run(
                &RunRequest::new(["sh", "-c", "printf '  hi  \\n'; printf 'oops\\n' >&2"])
                    .with_capture(),
            )
            .expect("run");
        assert_eq!(result.stdout, "hi");
        assert_eq!(result.stderr, "oops");
    }

    #[cfg(unix)]
    #[test]
    fn large_stderr_is_bounded_to_its_tail() {
        let reporter = RecordingReporter::default();
        let runner = SystemRunner::new(&reporter);
        let request = RunRequest::new([
            "sh",
            "-c",
            "head -c 300000 /dev/zero | tr '\\0' x >&2; echo last >&2; exit 2",
        ])
        .with_capture()
        .without_check();
        let result = runner.run(&request).expect("run");
        assert_eq!(result.code, 2);
        assert!(result.stderr.len() < STDERR_TAIL_LIMIT + 100);
        assert!(result.stderr.starts_with('['));
        assert!(result.stderr.contains("earlier bytes of stderr dropped"));
        assert!(result.stderr.ends_with("xlast"));
    }

    #[cfg(unix)]
    #[test]
    fn env_overlay_and_cwd_reach_child() {
        let temp = tempfile::tempdir().expect("tempdir");
        let reporter = RecordingReporter::default();
        let runner = SystemRunner::new(&reporter);
        let request = RunRequest::new(["sh", "-c", "printf '%s' \"$PIPPY_TEST_VALUE\"; pwd -P >&2"])
            .with_cwd(temp.path())
            .with_env("PIPPY_TEST_VALUE", "overlay")
            .with_capture();
        let result = runner.run(&request).expect("run");
        assert_eq!(result.stdout, "overlay");
        let canonical = temp.path().canonicalize().expect("canonicalize");
        assert_eq!(PathBuf::from(result.stderr), canonical);
    }

    #[cfg(unix)]
    #[test]
    fn shell_mode_supports_chaining() {
        const CHAIN: ShellCommand = ShellCommand::new("echo first && echo second; exit 4");
        let reporter = RecordingReporter::default();
        let runner = SystemRunner::new(&reporter);
        let result = runner
            .run(&RunRequest::shell(CHAIN).with_capture().without_check())
            .expect("run");
        assert_eq!(result.code, 4);
        assert_eq!(result.stdout, "first\nsecond");
    }
}
