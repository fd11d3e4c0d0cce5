//! Orchestration for `pippy init`, `pippy install`, and `pippy lock`.
//!
//! `init` creates the environment and makes sure `pipreqs` is available.
//! `install` (re)generates `requirements.txt` when asked or missing, installs
//! it, then records the project's entry script. `lock` freezes the
//! environment into a pin file.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::core::tool::ToolSpec;
use crate::error::PippyError;
use crate::io::config::{MAIN_KEY, update_value};
use crate::io::installer::ensure;
use crate::io::project::{
    CONFIG_FILE_NAME, EXCLUDE_DIRS, LOCK_FILE_NAME, ProjectContext, REQ_FILE_NAME,
};
use crate::io::prompt::Prompter;
use crate::io::scan::find_python_files;
use crate::script::has_main_block;
use crate::session::Session;

/// Outcome of `pippy init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub environment: PathBuf,
    pub activation_hint: String,
}

pub fn init_project(session: &Session<'_>) -> Result<InitOutcome> {
    info!(project = %session.context().root().display(), "initializing project");
    let env = session.environment(true)?;
    let toolchain = session.toolchain(Some(env.clone()));
    ensure(&toolchain, &ToolSpec::pipreqs()).context("install pipreqs")?;
    info!(root = %env.root().display(), "virtual environment ready");
    Ok(InitOutcome {
        environment: env.root().to_path_buf(),
        activation_hint: env.activation_hint(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Regenerate `requirements.txt` even if it exists.
    pub force_requirements: bool,
    /// Entry script to record instead of detecting one.
    pub main: Option<PathBuf>,
    pub skip_main: bool,
}

/// How the entry script was (or was not) configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainSelection {
    Skipped,
    /// Already present in the config; left untouched.
    Existing(String),
    Explicit(String),
    /// Exactly one file with a `__main__` block was found and recorded.
    Detected(String),
    /// Picked from several candidates.
    Selected(String),
    /// Typed in because nothing was detected.
    Entered(String),
    /// The single candidate was turned down.
    Declined,
    /// Several candidates and no choice made; nothing recorded.
    Ambiguous(Vec<String>),
    NoneFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Number of requirement lines when the file was (re)generated.
    pub generated: Option<usize>,
    pub main: MainSelection,
}

pub fn install_dependencies(
    session: &Session<'_>,
    options: &InstallOptions,
    prompter: &dyn Prompter,
) -> Result<InstallOutcome> {
    let ctx = session.context();
    info!(project = %ctx.root().display(), "setting up project");
    let env = session.environment(true)?;
    let toolchain = session.toolchain(Some(env));
    let req_file = ctx.requirements_path();

    let mut generated = None;
    if options.force_requirements || !req_file.exists() {
        ensure(&toolchain, &ToolSpec::pipreqs())
            .context("cannot generate requirements without pipreqs")?;
        info!("generating {REQ_FILE_NAME} using pipreqs");
        let pipreqs = toolchain.resolve("pipreqs");
        let ignore = EXCLUDE_DIRS.join(",");
        let request = toolchain
            .tool(&pipreqs, [".", "--force", "--ignore", ignore.as_str()])
            .with_capture();
        toolchain
            .run(&request)
            .with_context(|| format!("generate {REQ_FILE_NAME}"))?;
        let contents = fs::read_to_string(&req_file).with_context(|| {
            format!("{REQ_FILE_NAME} not found after pipreqs reported success")
        })?;
        let count = count_requirements(&contents);
        info!(count, "{REQ_FILE_NAME} generated");
        generated = Some(count);
    }

    info!(file = %req_file.display(), "installing dependencies");
    let request = toolchain.pip([
        OsString::from("install"),
        OsString::from("--upgrade"),
        OsString::from("-r"),
        req_file.clone().into_os_string(),
    ]);
    toolchain
        .run(&request)
        .with_context(|| format!("install dependencies from {REQ_FILE_NAME}"))?;
    info!("dependencies installed");

    let main = if options.skip_main {
        MainSelection::Skipped
    } else {
        configure_main(session, options.main.as_deref(), prompter)?
    };
    Ok(InstallOutcome { generated, main })
}

fn count_requirements(contents: &str) -> usize {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .count()
}

const MAIN_PATH_QUESTION: &str =
    "Enter path to main Python script (relative to project root), or leave blank to skip";

/// Record the project's entry script.
///
/// An explicit path wins, then an existing config entry. Otherwise detected
/// `__main__` candidates are offered through `prompter`: one is confirmed,
/// several are chosen from, none asks for a path. A failed config write is
/// only warned about.
pub fn configure_main(
    session: &Session<'_>,
    explicit: Option<&Path>,
    prompter: &dyn Prompter,
) -> Result<MainSelection> {
    let ctx = session.context();
    let selection = match explicit {
        Some(path) => MainSelection::Explicit(project_script(ctx, path)?),
        None => {
            if let Some(existing) = session.config().main() {
                info!(main = existing, "main script already configured");
                return Ok(MainSelection::Existing(existing.to_string()));
            }
            info!("searching for potential main scripts");
            let candidates: Vec<String> = find_python_files(ctx.root())
                .into_iter()
                .filter(|path| has_main_block(path))
                .map(|path| config_path_string(ctx.relative(&path)))
                .collect();
            match candidates.as_slice() {
                [] => {
                    warn!("no files with an `if __name__ == \"__main__\":` block found");
                    let answer = prompter.text(MAIN_PATH_QUESTION)?;
                    if answer.is_empty() {
                        return Ok(MainSelection::NoneFound);
                    }
                    match project_script(ctx, Path::new(&answer)) {
                        Ok(main) => MainSelection::Entered(main),
                        Err(err) => {
                            session.reporter().warning(&format!("{err:#}"));
                            return Ok(MainSelection::NoneFound);
                        }
                    }
                }
                [only] => {
                    let question = format!("Use '{only}' as the main script?");
                    if !prompter.confirm(&question, true)? {
                        return Ok(MainSelection::Declined);
                    }
                    MainSelection::Detected(only.clone())
                }
                _ => match prompter.choose("Multiple potential main scripts found:", &candidates)? {
                    Some(index) => MainSelection::Selected(candidates[index].clone()),
                    None => return Ok(MainSelection::Ambiguous(candidates)),
                },
            }
        }
    };

    let (MainSelection::Explicit(main)
    | MainSelection::Detected(main)
    | MainSelection::Selected(main)
    | MainSelection::Entered(main)) = &selection
    else {
        return Ok(selection);
    };
    match update_value(ctx, session.reporter(), MAIN_KEY, main.as_str()) {
        Ok(_) => info!(main = %main, "main script set in {CONFIG_FILE_NAME}"),
        Err(err) => session
            .reporter()
            .warning(&format!("could not save main script: {err}")),
    }
    Ok(selection)
}

/// Validate `path` as a `.py` file inside the project; returns its config form.
fn project_script(ctx: &ProjectContext, path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        ctx.root().join(path)
    };
    let is_script = absolute.is_file() && absolute.extension().is_some_and(|ext| ext == "py");
    if !is_script {
        bail!(PippyError::InvalidArgument(format!(
            "not a Python file: {}",
            path.display()
        )));
    }
    let absolute = absolute
        .canonicalize()
        .with_context(|| format!("resolve {}", path.display()))?;
    if !absolute.starts_with(ctx.root()) {
        bail!(PippyError::InvalidArgument(format!(
            "{} is outside the project",
            path.display()
        )));
    }
    Ok(config_path_string(ctx.relative(&absolute)))
}

/// Config values use `/` separators on every platform.
fn config_path_string(path: &Path) -> String {
    path.components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOutcome {
    pub path: PathBuf,
    pub packages: usize,
}

/// Freeze the environment's installed packages into `output` (default `requirements.lock`).
pub fn lock_dependencies(session: &Session<'_>, output: Option<&Path>) -> Result<LockOutcome> {
    let ctx = session.context();
    let env = session.environment(false)?;
    let toolchain = session.toolchain(Some(env));
    let path = ctx
        .root()
        .join(output.unwrap_or_else(|| Path::new(LOCK_FILE_NAME)));

    info!(path = %path.display(), "freezing dependencies");
    let frozen = toolchain
        .run(&toolchain.pip(["freeze"]).with_capture())
        .context("pip freeze")?;
    let mut contents = frozen.stdout;
    if !contents.is_empty() {
        contents.push('\n');
    }
    fs::write(&path, &contents).with_context(|| format!("write lock file {}", path.display()))?;
    let packages = contents.lines().filter(|line| !line.trim().is_empty()).count();
    info!(packages, path = %path.display(), "wrote package pins");
    Ok(LockOutcome { path, packages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::VENV_DIR_NAME;
    use crate::io::config::read_config;
    use crate::io::prompt::{LinePrompter, NoPrompt};
    use std::io::Cursor;
    use crate::test_support::{
        FakeHost, RecordingReporter, ScriptedRunner, TestProject, make_venv, touch,
    };

    #[test]
    fn init_creates_environment_and_installs_pipreqs() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        let layout = ctx.venv_layout();
        touch(&layout.interpreter);
        let pipreqs_stub = layout.executable_candidates("pipreqs")[0].clone();
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter)
            .respond_creating(layout.marker.clone())
            .respond_creating(pipreqs_stub);
        let host = FakeHost::new();
        let session = Session::new(ctx.clone(), &runner, &host);

        let outcome = init_project(&session).expect("init");
        assert_eq!(outcome.environment, layout.root);
        assert!(outcome.activation_hint.contains(VENV_DIR_NAME));
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(&format!("-m venv {}", layout.root.display())));
        assert!(lines[1].ends_with("-m pip install pipreqs"));
    }

    #[test]
    fn install_generates_requirements_then_installs_and_detects_main() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        let env = make_venv(ctx.root());
        touch(&env.layout().executable_candidates("pipreqs")[0]);
        project.write(
            "app.py",
            "def main():\n    pass\n\nif __name__ == \"__main__\":\n    main()\n",
        );
        project.write("lib.py", "X = 1\n");
        let reporter = RecordingReporter::default();
        let req = ctx.requirements_path();
        let runner = ScriptedRunner::new(&reporter).respond_creating(req.clone());
        let host = FakeHost::new();
        let session = Session::new(ctx.clone(), &runner, &host);

        let outcome = install_dependencies(&session, &InstallOptions::default(), &NoPrompt)
            .expect("install");
        assert_eq!(outcome.generated, Some(0));
        assert_eq!(outcome.main, MainSelection::Detected("app.py".to_string()));

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("pipreqs . --force --ignore .venv,venv,__pycache__"));
        assert!(lines[1].ends_with(&format!("-m pip install --upgrade -r {}", req.display())));
        assert_eq!(read_config(&ctx, &reporter).main(), Some("app.py"));
    }

    #[test]
    fn install_keeps_existing_requirements_and_main() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        make_venv(ctx.root());
        project.write(REQ_FILE_NAME, "requests\n");
        project.write(CONFIG_FILE_NAME, r#"{"main": "src/run.py", "extra": 1}"#);
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new();
        let session = Session::new(ctx.clone(), &runner, &host);

        let outcome = install_dependencies(&session, &InstallOptions::default(), &NoPrompt)
            .expect("install");
        assert_eq!(outcome.generated, None);
        assert_eq!(outcome.main, MainSelection::Existing("src/run.py".to_string()));
        assert_eq!(runner.command_lines().len(), 1);
    }

    #[test]
    fn failed_requirement_install_stops_before_main() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        make_venv(ctx.root());
        project.write(REQ_FILE_NAME, "nonexistent-pkg==0.0.0\n");
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter).respond(1, "", "No matching distribution");
        let host = FakeHost::new();
        let session = Session::new(ctx.clone(), &runner, &host);

        let err =
            install_dependencies(&session, &InstallOptions::default(), &NoPrompt).unwrap_err();
        assert_eq!(crate::error::exit_code_for(&err), crate::exit_codes::FAILURE);
        assert_eq!(reporter.stderr_reports(), vec!["No matching distribution".to_string()]);
        assert!(!ctx.config_path().exists());
    }

    #[test]
    fn configure_main_lists_ambiguous_candidates_without_saving() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        let block = "if __name__ == '__main__':\n    pass\n";
        project.write("a.py", block);
        project.write("tools/b.py", block);
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new();
        let session = Session::new(ctx.clone(), &runner, &host);

        let selection = configure_main(&session, None, &NoPrompt).expect("configure");
        assert_eq!(
            selection,
            MainSelection::Ambiguous(vec!["a.py".to_string(), "tools/b.py".to_string()])
        );
        assert!(!ctx.config_path().exists());
    }

    #[test]
    fn configure_main_accepts_explicit_script() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        project.write("cli/entry.py", "print('hi')\n");
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new();
        let session = Session::new(ctx.clone(), &runner, &host);

        let selection = configure_main(&session, Some(Path::new("cli/entry.py")), &NoPrompt)
            .expect("configure");
        assert_eq!(selection, MainSelection::Explicit("cli/entry.py".to_string()));
        assert_eq!(read_config(&ctx, &reporter).main(), Some("cli/entry.py"));

        let err =
            configure_main(&session, Some(Path::new("missing.py")), &NoPrompt).unwrap_err();
        assert!(err.to_string().contains("not a Python file"));
    }

    fn answers(input: &str) -> LinePrompter<Cursor<Vec<u8>>, Vec<u8>> {
        LinePrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn configure_main_saves_chosen_candidate() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        let block = "if __name__ == \"__main__\":\n    pass\n";
        project.write("a.py", block);
        project.write("tools/b.py", block);
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new();
        let session = Session::new(ctx.clone(), &runner, &host);

        let prompter = answers("2\n");
        let selection = configure_main(&session, None, &prompter).expect("configure");
        assert_eq!(selection, MainSelection::Selected("tools/b.py".to_string()));
        assert_eq!(read_config(&ctx, &reporter).main(), Some("tools/b.py"));
        let shown = String::from_utf8(prompter.into_output()).expect("utf8");
        assert!(shown.contains("  1) a.py"));
    }

    #[test]
    fn configure_main_declined_single_candidate_saves_nothing() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        project.write("app.py", "if __name__ == '__main__':\n    pass\n");
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new();
        let session = Session::new(ctx.clone(), &runner, &host);

        let selection = configure_main(&session, None, &answers("n\n")).expect("configure");
        assert_eq!(selection, MainSelection::Declined);
        assert!(!ctx.config_path().exists());
    }

    #[test]
    fn configure_main_asks_for_path_when_nothing_detected() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        project.write("cli/entry.py", "print('hi')\n");
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new();
        let session = Session::new(ctx.clone(), &runner, &host);

        let selection =
            configure_main(&session, None, &answers("cli/entry.py\n")).expect("configure");
        assert_eq!(selection, MainSelection::Entered("cli/entry.py".to_string()));
        assert_eq!(read_config(&ctx, &reporter).main(), Some("cli/entry.py"));

        fs::remove_file(ctx.config_path()).expect("remove config");
        let selection = configure_main(&session, None, &answers("nope.txt\n")).expect("configure");
        assert_eq!(selection, MainSelection::NoneFound);
        assert!(reporter.warnings().iter().any(|w| w.contains("not a Python file")));
        assert!(!ctx.config_path().exists());
    }

    #[test]
    fn lock_requires_environment() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        let reporter = RecordingReporter::default();
        let runner = ScriptedRunner::new(&reporter);
        let host = FakeHost::new();
        let session = Session::new(ctx, &runner, &host);

        let err = lock_dependencies(&session, None).unwrap_err();
        assert!(
            err.downcast_ref::<PippyError>()
                .is_some_and(|e| matches!(e, PippyError::EnvironmentNotFound { .. }))
        );
        assert!(runner.requests().is_empty());
    }

    #[test]
    fn lock_writes_frozen_packages() {
        let project = TestProject::new();
        let ctx = project.ctx().clone();
        make_venv(ctx.root());
        let reporter = RecordingReporter::default();
        let runner =
            ScriptedRunner::new(&reporter).respond(0, "certifi==2024.2.2\nrequests==2.31.0", "");
        let host = FakeHost::new();
        let session = Session::new(ctx.clone(), &runner, &host);

        let outcome = lock_dependencies(&session, None).expect("lock");
        assert_eq!(outcome.packages, 2);
        assert_eq!(outcome.path, ctx.root().join(LOCK_FILE_NAME));
        assert_eq!(
            fs::read_to_string(&outcome.path).expect("read"),
            "certifi==2024.2.2\nrequests==2.31.0\n"
        );
        assert!(runner.requests()[0].capture);
    }
}
