//! Project config document (`pippy.json`).
//!
//! Reads are tolerant: a missing or malformed file is logged as a warning
//! and treated as an empty document. Writes replace the whole
//! document atomically (temp file + rename). Updates are read-modify-write
//! so unrelated keys survive; concurrent writers race, last write wins.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PippyError;
use crate::io::project::{CONFIG_FILE_NAME, ProjectContext};
use crate::io::report::Reporter;

pub const MAIN_KEY: &str = "main";
pub const API_KEY_KEY: &str = "openai_api_key";
pub const USE_ENV_KEY_KEY: &str = "use_env_key";

/// A value as accepted from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Text(String),
    Flag(bool),
}

impl ConfigValue {
    /// `true` and `false` become flags; anything else is kept as text.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "true" => ConfigValue::Flag(true),
            "false" => ConfigValue::Flag(false),
            other => ConfigValue::Text(other.to_string()),
        }
    }
}

impl From<ConfigValue> for Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Text(text) => Value::String(text),
            ConfigValue::Flag(flag) => Value::Bool(flag),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Flag(value)
    }
}

/// Ordered key/value document. Unknown keys are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProjectConfig {
    values: Map<String, Value>,
}

impl ProjectConfig {
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.values.insert(key.to_string(), Value::from(value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Configured entry script, relative to the project root.
    pub fn main(&self) -> Option<&str> {
        self.text(MAIN_KEY)
    }

    pub fn openai_api_key(&self) -> Option<&str> {
        self.text(API_KEY_KEY)
    }

    pub fn use_env_key(&self) -> bool {
        self.values
            .get(USE_ENV_KEY_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// One `key = value` line per entry; the API key value is never shown.
impl fmt::Display for ProjectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.values {
            match value {
                _ if key == API_KEY_KEY => writeln!(f, "{key} = <set>")?,
                Value::String(text) => writeln!(f, "{key} = {text}")?,
                other => writeln!(f, "{key} = {other}")?,
            }
        }
        Ok(())
    }
}

/// Load the project's config, never failing.
pub fn read_config(ctx: &ProjectContext, reporter: &dyn Reporter) -> ProjectConfig {
    let path = ctx.config_path();
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using an empty document");
        return ProjectConfig::default();
    }
    match load(&path) {
        Ok(config) => config,
        Err(reason) => {
            warn!(path = %path.display(), %reason, "unreadable config");
            reporter.warning(&format!(
                "could not parse {CONFIG_FILE_NAME} ({reason}), treating as empty"
            ));
            ProjectConfig::default()
        }
    }
}

fn load(path: &Path) -> Result<ProjectConfig, String> {
    let contents = fs::read_to_string(path).map_err(|e| e.to_string())?;
    match serde_json::from_str::<Value>(&contents).map_err(|e| e.to_string())? {
        Value::Object(values) => Ok(ProjectConfig::from_map(values)),
        _ => Err("top level is not an object".to_string()),
    }
}

/// Replace the config file with `config`.
pub fn write_config(ctx: &ProjectContext, config: &ProjectConfig) -> Result<(), PippyError> {
    let path = ctx.config_path();
    let mut payload = serde_json::to_string_pretty(&config.values)
        .map_err(|e| PippyError::io("serialize config", e.into()))?;
    payload.push('\n');

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload)
        .map_err(|e| PippyError::io(format!("write temp config {}", tmp_path.display()), e))?;
    fs::rename(&tmp_path, &path)
        .map_err(|e| PippyError::io(format!("replace config {}", path.display()), e))?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

/// Read, set one key, write. Returns the document as written.
pub fn update_value(
    ctx: &ProjectContext,
    reporter: &dyn Reporter,
    key: &str,
    value: impl Into<ConfigValue>,
) -> Result<ProjectConfig, PippyError> {
    let mut config = read_config(ctx, reporter);
    config.set(key, value);
    write_config(ctx, &config)?;
    Ok(config)
}
