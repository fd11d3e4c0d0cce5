//! Orchestration for `pippy info` and `pippy which`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::resolve::{Resolution, select_interpreter};
use crate::core::tool::ToolSpec;
use crate::core::types::VirtualEnvironment;
use crate::io::config::ProjectConfig;
use crate::io::installer::ensure;
use crate::io::project::EXCLUDE_DIRS;
use crate::io::scan::find_python_files;
use crate::io::venv::{active_environment, read_marker};
use crate::session::Session;
use crate::settings::{KeySource, api_key_from_env};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentInfo {
    pub root: PathBuf,
    pub interpreter: PathBuf,
    pub interpreter_present: bool,
    /// `version` from `pyvenv.cfg` (`version_info` on newer interpreters).
    pub python_version: Option<String>,
    /// Base installation the environment was created from.
    pub home: Option<String>,
    pub activation_hint: String,
}

/// Snapshot of a project for `pippy info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectInfo {
    pub project: PathBuf,
    pub environment: Option<EnvironmentInfo>,
    /// Interpreter `run` would use right now.
    pub interpreter: PathBuf,
    /// Environment already active in the calling shell, if any.
    pub active_environment: Option<PathBuf>,
    /// Requirements pipreqs detects; `None` when they could not be retrieved.
    pub requirements: Option<Vec<String>>,
    pub config: ProjectConfig,
    /// Where the assistant credential would come from; never the key itself.
    pub api_key_source: Option<KeySource>,
    /// Python files relative to the project, `/`-separated.
    pub python_files: Vec<String>,
}

pub fn collect_info(session: &Session<'_>) -> Result<ProjectInfo> {
    let ctx = session.context();
    let env = session.find_environment();
    let environment = match &env {
        Some(env) => {
            let marker = read_marker(env)?;
            Some(EnvironmentInfo {
                root: env.root().to_path_buf(),
                interpreter: env.interpreter().to_path_buf(),
                interpreter_present: session.host().is_file(env.interpreter()),
                python_version: marker
                    .get("version")
                    .or_else(|| marker.get("version_info"))
                    .cloned(),
                home: marker.get("home").cloned(),
                activation_hint: env.activation_hint(),
            })
        }
        None => None,
    };
    let (interpreter, _) = select_interpreter(env.as_ref(), session.host());
    let python_files = find_python_files(ctx.root())
        .iter()
        .map(|path| {
            ctx.relative(path)
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();

    let requirements = match env {
        Some(env) => detect_requirements(session, env).unwrap_or_else(|err| {
            session
                .reporter()
                .warning(&format!("could not retrieve requirements: {err:#}"));
            None
        }),
        None => None,
    };

    let config = session.config();
    let api_key_source = match api_key_from_env(&config) {
        Ok(key) => key.map(|key| key.source),
        Err(err) => {
            session.reporter().warning(&format!("{err:#}"));
            None
        }
    };

    Ok(ProjectInfo {
        project: ctx.root().to_path_buf(),
        environment,
        interpreter,
        active_environment: active_environment(),
        requirements,
        config,
        api_key_source,
        python_files,
    })
}

/// Run `pipreqs <root> --print` in the environment without touching any file.
///
/// A non-zero exit shows pipreqs' stderr and yields `None`.
fn detect_requirements(
    session: &Session<'_>,
    env: VirtualEnvironment,
) -> Result<Option<Vec<String>>> {
    let root = session.context().root();
    let toolchain = session.toolchain(Some(env));
    ensure(&toolchain, &ToolSpec::pipreqs()).context("install pipreqs")?;
    let pipreqs = toolchain.resolve("pipreqs");
    let args: Vec<OsString> = vec![
        root.as_os_str().to_os_string(),
        "--print".into(),
        "--ignore".into(),
        EXCLUDE_DIRS.join(",").into(),
    ];
    let request = toolchain.tool(&pipreqs, args).with_capture().without_check();
    let result = toolchain.run(&request).context("run pipreqs")?;
    if !result.success() {
        warn!(code = result.code, "pipreqs --print failed");
        if !result.stderr.is_empty() {
            session
                .reporter()
                .command_stderr(&request.describe()?, &result.stderr);
        }
        return Ok(None);
    }
    let requirements: Vec<String> = result
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    debug!(count = requirements.len(), "requirements detected");
    Ok(Some(requirements))
}

#[derive(Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
}

/// Indented tree of `/`-separated relative paths, directories marked with `/`.
pub struct FileTree<'a>(pub &'a [String]);

impl fmt::Display for FileTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut root = TreeNode::default();
        for path in self.0 {
            let mut node = &mut root;
            for part in path.split('/') {
                node = node.children.entry(part.to_string()).or_default();
            }
        }
        fmt_node(&root, 0, f)
    }
}

fn fmt_node(node: &TreeNode, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (name, child) in &node.children {
        let indent = "  ".repeat(depth);
        if child.children.is_empty() {
            writeln!(f, "{indent}{name}")?;
        } else {
            writeln!(f, "{indent}{name}/")?;
            fmt_node(child, depth + 1, f)?;
        }
    }
    Ok(())
}

/// Human-readable report.
impl fmt::Display for ProjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Project: {}", self.project.display())?;

        writeln!(f, "\n=== Requirements (detected by pipreqs) ===")?;
        match (&self.requirements, &self.environment) {
            (Some(requirements), _) if requirements.is_empty() => {
                writeln!(f, "(No requirements detected by pipreqs)")?;
            }
            (Some(requirements), _) => {
                for requirement in requirements {
                    writeln!(f, "{requirement}")?;
                }
            }
            (None, Some(_)) => writeln!(f, "Could not retrieve requirements.")?,
            (None, None) => writeln!(f, "(needs a virtual environment; run `pippy init`)")?,
        }

        writeln!(f, "\n=== Virtual Environment ===")?;
        match &self.environment {
            Some(env) => {
                writeln!(f, "Root: {}", env.root.display())?;
                let present = if env.interpreter_present { "" } else { " (missing)" };
                writeln!(f, "Interpreter: {}{present}", env.interpreter.display())?;
                if let Some(version) = &env.python_version {
                    writeln!(f, "Python: {version}")?;
                }
                if let Some(home) = &env.home {
                    writeln!(f, "Base installation: {home}")?;
                }
                writeln!(f, "Activate with: {}", env.activation_hint)?;
            }
            None => {
                writeln!(f, "(none; run `pippy init` to create one)")?;
                writeln!(f, "Host interpreter: {}", self.interpreter.display())?;
            }
        }
        if let Some(active) = &self.active_environment {
            writeln!(f, "Active environment: {}", active.display())?;
        }

        writeln!(f, "\n=== Configuration ===")?;
        if self.config.is_empty() {
            writeln!(f, "(empty)")?;
        } else {
            write!(f, "{}", self.config)?;
        }
        let source = match self.api_key_source {
            Some(KeySource::Environment) => "environment",
            Some(KeySource::Config) => "config",
            None => "not set",
        };
        writeln!(f, "API key: {source}")?;

        writeln!(f, "\n=== Python File Tree ===")?;
        if self.python_files.is_empty() {
            writeln!(f, "(No Python files found outside excluded directories)")
        } else {
            write!(f, "{}", FileTree(&self.python_files))
        }
    }
}

/// Resolve `tool` the way commands would, for debugging resolution.
pub fn which(session: &Session<'_>, tool: &str) -> Resolution {
    let env = session.find_environment();
    session.toolchain(env).resolution(tool)
}
