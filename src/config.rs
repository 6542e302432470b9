//! shellport configuration: deserialization and validation.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ShellportError;
use crate::tools::CATALOGUE;

/// Strip an env var reference to its variable name.
///
/// Accepts `${VAR_NAME}` syntax only. Returns `None` if the value is not a
/// valid env-var reference.
pub fn parse_env_ref(value: &str) -> Option<&str> {
    value.strip_prefix("${").and_then(|s| s.strip_suffix('}'))
}

/// Resolve a map of env-var references to their actual values.
///
/// Unset variables resolve to the empty string.
pub fn resolve_env_vars(env: &HashMap<String, String>) -> HashMap<String, String> {
    env.iter()
        .map(|(k, v)| {
            let resolved = match parse_env_ref(v) {
                Some(var_name) => std::env::var(var_name).unwrap_or_default(),
                None => v.clone(),
            };
            (k.clone(), resolved)
        })
        .collect()
}

/// Top-level configuration, parsed from `shellport.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellportConfig {
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// How the interpreter is launched for each call.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterpreterConfig {
    #[serde(default = "default_executable")]
    pub executable: String,
    /// Wall-clock limit per call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra environment for the interpreter. Values are `${VAR}` references
    /// resolved against the server's own environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            timeout_secs: default_timeout_secs(),
            env: HashMap::new(),
        }
    }
}

impl InterpreterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Catalogue tools to leave unregistered.
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_executable() -> String {
    if cfg!(windows) {
        "powershell".to_string()
    } else {
        "pwsh".to_string()
    }
}

fn default_timeout_secs() -> u64 {
    120
}

impl ShellportConfig {
    /// Parse TOML text without validating it.
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| ShellportError::InvalidConfig(e.to_string()))
    }

    /// Read, parse and validate a config file.
    pub async fn load(path: &Path) -> crate::Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ShellportError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config, failing fast before the registry is built.
    pub fn validate(&self) -> crate::Result<()> {
        let interpreter = &self.interpreter;

        if interpreter.executable.trim().is_empty() {
            return Err(ShellportError::InvalidConfig(
                "interpreter.executable must not be empty".to_string(),
            ));
        }

        if interpreter.timeout_secs == 0 {
            return Err(ShellportError::InvalidConfig(
                "interpreter.timeout_secs must be > 0".to_string(),
            ));
        }

        for (key, value) in &interpreter.env {
            if parse_env_ref(value).is_none() {
                return Err(ShellportError::InvalidConfig(format!(
                    "env value for key '{}' must be a ${{VAR}} reference, got '{}'",
                    key, value
                )));
            }
        }

        for name in &self.tools.disabled {
            if !CATALOGUE.contains(&name.as_str()) {
                return Err(ShellportError::InvalidConfig(format!(
                    "tools.disabled names unknown tool '{}'",
                    name
                )));
            }
        }

        Ok(())
    }
}
