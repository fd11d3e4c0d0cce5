//! Test-only fakes for the runner, host lookup, and reporter.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::layout::{Platform, VENV_MARKER, VenvLayout};
use crate::core::resolve::HostProbe;
use crate::core::types::{CommandResult, VirtualEnvironment};
use crate::error::PippyError;
use crate::io::process::{CommandRunner, Completed, RunRequest};
use crate::io::project::ProjectContext;
use crate::io::report::Reporter;

/// Reporter that records everything it is asked to show.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    stderr: RefCell<Vec<String>>,
    warnings: RefCell<Vec<String>>,
}

impl RecordingReporter {
    pub fn stderr_reports(&self) -> Vec<String> {
        self.stderr.borrow().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }
}

impl Reporter for RecordingReporter {
    fn command_stderr(&self, _command: &str, stderr: &str) {
        self.stderr.borrow_mut().push(stderr.to_string());
    }

    fn warning(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }
}

enum Scripted {
    Exit {
        result: CommandResult,
        creates: Option<PathBuf>,
    },
    NotFound(String),
}

/// Runner that records requests and replays scripted outcomes in order.
///
/// Once the script is exhausted every request succeeds with empty output.
pub struct ScriptedRunner<'a> {
    reporter: &'a dyn Reporter,
    script: RefCell<VecDeque<Scripted>>,
    requests: RefCell<Vec<RunRequest>>,
}

impl<'a> ScriptedRunner<'a> {
    pub fn new(reporter: &'a dyn Reporter) -> Self {
        Self {
            reporter,
            script: RefCell::new(VecDeque::new()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn respond(self, code: i32, stdout: &str, stderr: &str) -> Self {
        self.push(Scripted::Exit {
            result: result(code, stdout, stderr),
            creates: None,
        })
    }

    /// Succeed and create an empty file at `path`, as an installer would.
    pub fn respond_creating(self, path: impl Into<PathBuf>) -> Self {
        self.push(Scripted::Exit {
            result: result(0, "", ""),
            creates: Some(path.into()),
        })
    }

    pub fn respond_not_found(self, program: &str) -> Self {
        self.push(Scripted::NotFound(program.to_string()))
    }

    fn push(self, entry: Scripted) -> Self {
        self.script.borrow_mut().push_back(entry);
        self
    }

    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.borrow().clone()
    }

    /// Each recorded request rendered as a plain space-joined command line.
    pub fn command_lines(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| match request.argv() {
                Some(argv) => argv
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(" "),
                None => request.describe().unwrap_or_default(),
            })
            .collect()
    }
}

impl CommandRunner for ScriptedRunner<'_> {
    fn execute(&self, request: &RunRequest) -> Result<Completed, PippyError> {
        self.requests.borrow_mut().push(request.clone());
        let next = self.script.borrow_mut().pop_front();
        match next {
            Some(Scripted::NotFound(program)) => Err(PippyError::ExecutableNotFound { program }),
            Some(Scripted::Exit { result, creates }) => {
                if let Some(path) = creates {
                    touch(&path);
                }
                Ok(Completed {
                    result,
                    stderr_streamed: request.interactive,
                })
            }
            None => Ok(Completed {
                result: result(0, "", ""),
                stderr_streamed: request.interactive,
            }),
        }
    }

    fn reporter(&self) -> &dyn Reporter {
        self.reporter
    }
}

/// Host lookup with a declared file set and PATH table.
///
/// `is_file` also consults the real filesystem so fixtures built in a temp
/// directory resolve the same way they would on a real host.
#[derive(Debug, Clone)]
pub struct FakeHost {
    files: BTreeSet<PathBuf>,
    path_entries: BTreeMap<String, PathBuf>,
    interpreter: PathBuf,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            files: BTreeSet::new(),
            path_entries: BTreeMap::new(),
            interpreter: PathBuf::from("/usr/bin/python3"),
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(path.into());
        self
    }

    pub fn with_path_entry(mut self, tool: &str, path: impl Into<PathBuf>) -> Self {
        self.path_entries.insert(tool.to_string(), path.into());
        self
    }

    pub fn with_interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.interpreter = path.into();
        self
    }
}

impl HostProbe for FakeHost {
    fn is_file(&self, path: &Path) -> bool {
        self.files.contains(path) || path.is_file()
    }

    fn search_path(&self, tool: &str) -> Option<PathBuf> {
        self.path_entries.get(tool).cloned()
    }

    fn host_interpreter(&self) -> PathBuf {
        self.interpreter.clone()
    }
}

/// Scratch project directory removed on drop.
pub struct TestProject {
    _temp: tempfile::TempDir,
    ctx: ProjectContext,
}

impl TestProject {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = ProjectContext::resolve(Some(temp.path())).expect("resolve project");
        Self { _temp: temp, ctx }
    }

    pub fn ctx(&self) -> &ProjectContext {
        &self.ctx
    }

    /// Canonical project root.
    pub fn path(&self) -> &Path {
        self.ctx.root()
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path().join(relative);
        touch(&path);
        fs::write(&path, contents).expect("write project file");
        path
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a genuine-looking environment (marker + interpreter) under `project_root`.
pub fn make_venv(project_root: &Path) -> VirtualEnvironment {
    let layout = VenvLayout::for_project(project_root, Platform::current());
    fs::create_dir_all(&layout.bin_dir).expect("create bin dir");
    fs::write(
        layout.root.join(VENV_MARKER),
        "home = /usr/bin\nversion = 3.12.1\n",
    )
    .expect("write marker");
    touch(&layout.interpreter);
    VirtualEnvironment::from_verified_layout(layout)
}

/// Create an empty file, including parent directories.
pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, "").expect("touch file");
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return what it logged.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().expect("log buffer")).into_owned();
    (value, logs)
}

fn result(code: i32, stdout: &str, stderr: &str) -> CommandResult {
    CommandResult {
        code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}
