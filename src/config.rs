//! Configuration loaded from `gradebox.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::language::Language;

const CONFIG_FILE: &str = "gradebox.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Sandbox resource and timeout settings.
    #[serde(default)]
    pub sandbox: SandboxConfig,
    /// Per-language adapter overrides.
    #[serde(default)]
    pub languages: LanguagesConfig,
}

/// Sandbox resource limits and execution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Memory limit (e.g., "256m", "1g")
    #[serde(default = "default_memory")]
    pub memory: String,

    /// CPU limit (e.g., "1", "0.5")
    #[serde(default = "default_cpus")]
    pub cpus: String,

    /// Maximum number of processes inside the sandbox
    #[serde(default = "default_pids_limit")]
    pub pids_limit: i64,

    /// Execution timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Network policy; untrusted code runs without network by default
    #[serde(default)]
    pub network: NetworkPolicy,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory: default_memory(),
            cpus: default_cpus(),
            pids_limit: default_pids_limit(),
            timeout_secs: default_timeout_secs(),
            network: NetworkPolicy::default(),
        }
    }
}

impl SandboxConfig {
    /// The configured execution timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Network access policy for sandbox containers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkPolicy {
    /// No network access (default for untrusted submissions)
    #[default]
    Deny,
    /// Default bridge network
    AllowAll,
}

impl std::fmt::Display for NetworkPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deny => write!(f, "deny"),
            Self::AllowAll => write!(f, "allow-all"),
        }
    }
}

/// Optional per-language overrides for the adapter registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguagesConfig {
    /// Overrides for the Python adapter.
    #[serde(default)]
    pub python: Option<LanguageOverride>,
    /// Overrides for the JavaScript adapter.
    #[serde(default)]
    pub javascript: Option<LanguageOverride>,
}

impl LanguagesConfig {
    /// Returns the override block for a language, if configured.
    pub fn get(&self, language: Language) -> Option<&LanguageOverride> {
        match language {
            Language::Python => self.python.as_ref(),
            Language::Javascript => self.javascript.as_ref(),
        }
    }
}

/// Image and command overrides for a single language adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageOverride {
    /// Container image to use instead of the built-in default
    #[serde(default)]
    pub image: Option<String>,

    /// Run command template; `{file}` expands to the staged source path
    #[serde(default)]
    pub command: Option<String>,
}

// Default value functions
fn default_memory() -> String {
    "256m".to_string()
}

fn default_cpus() -> String {
    "1".to_string()
}

fn default_pids_limit() -> i64 {
    64
}

fn default_timeout_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from file, using defaults if not found
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sandbox.memory, "256m");
        assert_eq!(config.sandbox.timeout_secs, 5);
        assert_eq!(config.sandbox.pids_limit, 64);
        assert_eq!(config.sandbox.network, NetworkPolicy::Deny);
        assert!(config.languages.python.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[sandbox]
memory = "512m"
cpus = "0.5"
timeout_secs = 10
network = "allow-all"

[languages.python]
image = "python:3.13-slim"
command = "python3 {file}"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.sandbox.memory, "512m");
        assert_eq!(config.sandbox.cpus, "0.5");
        assert_eq!(config.sandbox.timeout(), Duration::from_secs(10));
        assert_eq!(config.sandbox.network, NetworkPolicy::AllowAll);

        let python = config.languages.get(Language::Python).unwrap();
        assert_eq!(python.image.as_deref(), Some("python:3.13-slim"));
        assert_eq!(python.command.as_deref(), Some("python3 {file}"));
        assert!(config.languages.get(Language::Javascript).is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.sandbox.timeout_secs, 5);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("gradebox.toml"),
            "[sandbox]\ntimeout_secs = 30\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.sandbox.timeout_secs, 30);
    }

    #[test]
    fn test_network_policy_display() {
        assert_eq!(format!("{}", NetworkPolicy::Deny), "deny");
        assert_eq!(format!("{}", NetworkPolicy::AllowAll), "allow-all");
    }
}
