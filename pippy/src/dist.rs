//! Orchestration for `pippy develop`, `pippy pkg`, and `pippy publish`.
//!
//! All three require an existing environment and run with failure treated
//! as fatal; the child's own output streams straight to the terminal.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::core::tool::ToolSpec;
use crate::io::installer::ensure;
use crate::session::Session;

pub const DIST_DIR_NAME: &str = "dist";

/// Install the project in editable mode (`pip install -e .`).
pub fn develop(session: &Session<'_>) -> Result<()> {
    let env = session.environment(false)?;
    let toolchain = session.toolchain(Some(env));
    info!("installing project in editable mode");
    toolchain
        .run(&toolchain.pip(["install", "-e", "."]))
        .context("editable install failed")?;
    info!("editable install successful");
    Ok(())
}

/// Build source and wheel distributions with `python -m build`.
pub fn build_package(session: &Session<'_>) -> Result<PathBuf> {
    let env = session.environment(false)?;
    let toolchain = session.toolchain(Some(env));
    info!("building distributions");
    ensure(&toolchain, &ToolSpec::build()).context("install build")?;
    toolchain
        .run(&toolchain.python(["-m", "build"]))
        .context("build failed")?;
    let dist = session.context().root().join(DIST_DIR_NAME);
    info!(dist = %dist.display(), "build successful");
    Ok(dist)
}

/// Files directly inside `dist/`, sorted.
fn dist_files(session: &Session<'_>) -> Result<Vec<PathBuf>> {
    let dist = session.context().root().join(DIST_DIR_NAME);
    if !dist.is_dir() {
        bail!(
            "'{DIST_DIR_NAME}' directory not found in {} (run `pippy pkg` first)",
            session.context().root().display()
        );
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(&dist).with_context(|| format!("read {}", dist.display()))? {
        let entry = entry.with_context(|| format!("read {}", dist.display()))?;
        if entry.file_type().is_ok_and(|kind| kind.is_file()) {
            files.push(entry.path());
        }
    }
    if files.is_empty() {
        bail!("no files found in {} (run `pippy pkg` first)", dist.display());
    }
    files.sort();
    Ok(files)
}

/// Upload everything in `dist/` with twine.
///
/// Files are listed in-process and passed as discrete arguments so no shell
/// ever sees a path.
pub fn publish(session: &Session<'_>, repository_url: Option<&str>) -> Result<usize> {
    let env = session.environment(false)?;
    let files = dist_files(session)?;
    let toolchain = session.toolchain(Some(env));
    info!(files = files.len(), "uploading distributions via twine");
    ensure(&toolchain, &ToolSpec::twine()).context("install twine")?;

    let twine = toolchain.resolve("twine");
    let mut args: Vec<OsString> = vec!["upload".into()];
    if let Some(url) = repository_url {
        args.push("--repository-url".into());
        args.push(url.into());
    }
    args.extend(files.iter().map(|path| path.clone().into_os_string()));
    toolchain
        .run(&toolchain.tool(&twine, args))
        .context("twine upload failed")?;
    info!("upload command executed");
    Ok(files.len())
}
