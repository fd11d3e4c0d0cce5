//! Orchestration for `pippy config` and credential lookup.

use std::env;
use std::fmt;

use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::PippyError;
use crate::io::config::{ConfigValue, ProjectConfig, USE_ENV_KEY_KEY, update_value};
use crate::io::project::CONFIG_FILE_NAME;
use crate::session::Session;

/// Environment variable holding the assistant credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Current value of `key`, if set.
pub fn get_value(session: &Session<'_>, key: &str) -> Option<Value> {
    session.config().get(key).cloned()
}

/// Store `raw` under `key`; `true`/`false` are stored as booleans.
///
/// Returns whether the value was saved. A failed write is warned about, not fatal.
pub fn set_value(session: &Session<'_>, key: &str, raw: &str) -> Result<bool> {
    if key.trim().is_empty() {
        bail!(PippyError::InvalidArgument("config key must not be empty".to_string()));
    }
    let value = ConfigValue::parse(raw);
    match update_value(session.context(), session.reporter(), key, value) {
        Ok(_) => {
            info!(key, "saved to {CONFIG_FILE_NAME}");
            Ok(true)
        }
        Err(err) => {
            session
                .reporter()
                .warning(&format!("failed to write {CONFIG_FILE_NAME}: {err}"));
            Ok(false)
        }
    }
}

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    Environment,
    Config,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub value: String,
    pub source: KeySource,
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Pick the credential: `use_env_key` forces the environment variable, else a
/// saved key, else the environment variable. `None` when nothing is available.
pub fn resolve_api_key(config: &ProjectConfig, env_value: Option<&str>) -> Result<Option<ApiKey>> {
    let env_value = env_value.filter(|value| !value.is_empty());
    if config.use_env_key() {
        let Some(value) = env_value else {
            bail!("{API_KEY_ENV} is not set, but '{USE_ENV_KEY_KEY}' is true in {CONFIG_FILE_NAME}");
        };
        return Ok(Some(ApiKey {
            value: value.to_string(),
            source: KeySource::Environment,
        }));
    }
    if let Some(saved) = config.openai_api_key() {
        return Ok(Some(ApiKey {
            value: saved.to_string(),
            source: KeySource::Config,
        }));
    }
    Ok(env_value.map(|value| ApiKey {
        value: value.to_string(),
        source: KeySource::Environment,
    }))
}

/// [`resolve_api_key`] against the process environment.
pub fn api_key_from_env(config: &ProjectConfig) -> Result<Option<ApiKey>> {
    let env_value = env::var(API_KEY_ENV).ok();
    resolve_api_key(config, env_value.as_deref())
}
