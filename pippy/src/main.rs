//! `pippy` command-line entry point.
//!
//! Each subcommand resolves the project directory, wires the real runner and
//! host lookup into a [`Session`], and hands off to an orchestration module.
//! Failures print their context chain and exit with the code carried by the
//! underlying error.

use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use pippy::core::resolve::HostProbe;
use pippy::error::exit_code_for;
use pippy::exit_codes;
use pippy::info::{collect_info, which};
use pippy::io::host::SystemHost;
use pippy::io::process::{CommandRunner, SystemRunner};
use pippy::io::prompt::{LinePrompter, NoPrompt, Prompter};
use pippy::io::report::StderrReporter;
use pippy::session::Session;
use pippy::setup::{InstallOptions, MainSelection};
use pippy::{clean, dist, logging, script, settings, setup, shell};

#[derive(Parser)]
#[command(
    name = "pippy",
    version,
    about = "Python project manager: environments, dependencies, scripts, packaging"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the project's virtual environment (.venv) and install pipreqs.
    Init {
        /// Project directory (default: current directory).
        dir: Option<PathBuf>,
    },
    /// Generate requirements.txt if needed, install it, and configure the main script.
    Install {
        dir: Option<PathBuf>,
        /// Regenerate requirements.txt with pipreqs even if it exists.
        #[arg(short = 'f', long = "force-req")]
        force_req: bool,
        /// Record this file as the main script instead of detecting one.
        #[arg(long, conflicts_with = "skip_main")]
        main: Option<PathBuf>,
        /// Leave the main script configuration alone.
        #[arg(long)]
        skip_main: bool,
    },
    /// Run a Python file, or a project directory's configured main script.
    Run {
        target: PathBuf,
        /// Arguments passed to the script.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },
    /// Shortcut for `pippy run .`.
    Start {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },
    /// Freeze installed packages into a lock file.
    Lock {
        dir: Option<PathBuf>,
        /// Output file, relative to the project (default: requirements.lock).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove __pycache__ directories and *.pyc/*.pyo files.
    Clean { dir: Option<PathBuf> },
    /// Install the project in editable mode (`pip install -e .`).
    Develop { dir: Option<PathBuf> },
    /// Build source and wheel distributions with `python -m build`.
    Pkg { dir: Option<PathBuf> },
    /// Upload distributions from dist/ with twine.
    Publish {
        dir: Option<PathBuf>,
        /// Repository URL (e.g. https://test.pypi.org/legacy/).
        #[arg(short = 'r', long = "repository")]
        repository: Option<String>,
    },
    /// Start an interactive shell with the virtual environment activated.
    Shell { dir: Option<PathBuf> },
    /// Show requirements, environment, configuration, and Python file tree.
    Info {
        dir: Option<PathBuf>,
        /// Print a JSON object instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Read or write pippy.json values.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show how a tool name resolves in this project.
    Which {
        tool: String,
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the value stored under KEY.
    Get {
        key: String,
        dir: Option<PathBuf>,
    },
    /// Store VALUE under KEY (`true`/`false` are stored as booleans).
    Set {
        key: String,
        value: String,
        dir: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let reporter = StderrReporter;
    let runner = SystemRunner::new(&reporter);
    let host = SystemHost::detect();
    let runner_ref: &dyn CommandRunner = &runner;
    let host_ref: &dyn HostProbe = &host;
    let open = move |dir: Option<PathBuf>| Session::open(dir.as_deref(), runner_ref, host_ref);

    match cli.command {
        Command::Init { dir } => {
            let outcome = setup::init_project(&open(dir)?)?;
            println!("Virtual environment ready at: {}", outcome.environment.display());
            println!("To activate it manually, run: {}", outcome.activation_hint);
        }
        Command::Install {
            dir,
            force_req,
            main,
            skip_main,
        } => {
            let options = InstallOptions {
                force_requirements: force_req,
                main,
                skip_main,
            };
            let prompter: Box<dyn Prompter> = if io::stdin().is_terminal() {
                Box::new(LinePrompter::stdio())
            } else {
                Box::new(NoPrompt)
            };
            let outcome = setup::install_dependencies(&open(dir)?, &options, prompter.as_ref())?;
            print_main_selection(&outcome.main);
        }
        Command::Run { target, args } => {
            return script::run_target(runner_ref, host_ref, &target, &args);
        }
        Command::Start { args } => {
            return script::start(runner_ref, host_ref, None, &args);
        }
        Command::Lock { dir, output } => {
            let outcome = setup::lock_dependencies(&open(dir)?, output.as_deref())?;
            println!(
                "Wrote {} package pins to {}",
                outcome.packages,
                outcome.path.display()
            );
        }
        Command::Clean { dir } => {
            let session = open(dir)?;
            let outcome = clean::clean_caches(session.context(), session.reporter())?;
            println!(
                "Removed {} directories and {} files.",
                outcome.dirs, outcome.files
            );
        }
        Command::Develop { dir } => dist::develop(&open(dir)?)?,
        Command::Pkg { dir } => {
            let dist_dir = dist::build_package(&open(dir)?)?;
            println!("Distributions written to {}", dist_dir.display());
        }
        Command::Publish { dir, repository } => {
            let count = dist::publish(&open(dir)?, repository.as_deref())?;
            println!("Uploaded {count} files (check twine output for details).");
        }
        Command::Shell { dir } => return shell::spawn_shell(&open(dir)?),
        Command::Info { dir, json } => {
            let info = collect_info(&open(dir)?)?;
            if json {
                let payload = serde_json::to_string_pretty(&info).context("serialize info")?;
                println!("{payload}");
            } else {
                print!("{info}");
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Get { key, dir } => match settings::get_value(&open(dir)?, &key) {
                Some(Value::String(text)) => println!("{text}"),
                Some(other) => println!("{other}"),
                None => {
                    eprintln!("{key} is not set");
                    return Ok(exit_codes::FAILURE);
                }
            },
            ConfigAction::Set { key, value, dir } => {
                settings::set_value(&open(dir)?, &key, &value)?;
            }
        },
        Command::Which { tool, dir } => {
            let resolution = which(&open(dir)?, &tool);
            println!("{}", resolution.reference);
        }
    }
    Ok(exit_codes::OK)
}

fn print_main_selection(selection: &MainSelection) {
    match selection {
        MainSelection::Skipped => {}
        MainSelection::Existing(main) => println!("Main script: {main}"),
        MainSelection::Explicit(main)
        | MainSelection::Detected(main)
        | MainSelection::Selected(main)
        | MainSelection::Entered(main) => {
            println!("Main script set to '{main}'");
        }
        MainSelection::Declined => {
            println!("No main script recorded; set one with `pippy config set main <file>`.");
        }
        MainSelection::Ambiguous(candidates) => {
            println!("Multiple potential main scripts found:");
            for candidate in candidates {
                println!("  {candidate}");
            }
            println!("Choose one with `pippy config set main <file>`.");
        }
        MainSelection::NoneFound => {
            println!("No main script found; set one with `pippy config set main <file>`.");
        }
    }
}
