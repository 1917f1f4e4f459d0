//! Language adapters for supported submission languages.
//!
//! Each adapter is static configuration: which container image runs the
//! language, how the staged source file is named, the command that
//! executes it non-interactively, and the output markers the scorer
//! uses to classify a run as errored. The registry is built once at
//! process start and never mutated afterwards, so it is safe to share
//! across concurrently executing requests without synchronization.

use anyhow::{Context, Result};

use crate::config::LanguagesConfig;
use crate::error::GraderError;

/// Placeholder in a command template replaced by the staged source path.
const FILE_PLACEHOLDER: &str = "{file}";

/// Supported submission languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    /// Python 3, executed with the CPython interpreter.
    Python,
    /// JavaScript, executed with Node.js.
    Javascript,
}

impl Language {
    /// All supported languages, in registry order.
    pub const ALL: [Language; 2] = [Language::Python, Language::Javascript];

    /// The canonical lowercase identifier for this language.
    pub fn name(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Language {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" => Ok(Self::Python),
            "javascript" | "js" => Ok(Self::Javascript),
            _ => Err(GraderError::unsupported_language(
                s,
                Language::ALL.iter().map(|l| l.name()),
            )),
        }
    }
}

/// Static per-language execution configuration.
///
/// Adapters describe *how* to run code; they never touch the container
/// runtime themselves. The error markers belong here rather than in the
/// isolation backend so that sandbox logic stays language-agnostic.
#[derive(Debug, Clone)]
pub struct LanguageAdapter {
    /// The language this adapter executes.
    pub language: Language,
    /// Container image providing the runtime.
    pub image: String,
    /// File name the source is staged under inside the sandbox.
    pub source_file: String,
    /// Command template; `{file}` expands to the staged source path.
    pub command: Vec<String>,
    /// Substrings in combined output that indicate an errored run.
    pub error_markers: Vec<String>,
}

impl LanguageAdapter {
    fn python() -> Self {
        Self {
            language: Language::Python,
            image: "python:3.12-alpine".to_string(),
            source_file: "main.py".to_string(),
            command: vec!["python".to_string(), FILE_PLACEHOLDER.to_string()],
            error_markers: vec!["Traceback".to_string(), "Error".to_string()],
        }
    }

    fn javascript() -> Self {
        Self {
            language: Language::Javascript,
            image: "node:20-alpine".to_string(),
            source_file: "main.js".to_string(),
            command: vec!["node".to_string(), FILE_PLACEHOLDER.to_string()],
            error_markers: vec!["Error".to_string()],
        }
    }

    /// Expands the command template against the staged source path.
    pub fn run_command(&self, source_path: &str) -> Vec<String> {
        self.command
            .iter()
            .map(|arg| arg.replace(FILE_PLACEHOLDER, source_path))
            .collect()
    }

    /// Returns true if the combined output contains any error marker.
    pub fn output_indicates_error(&self, combined_output: &str) -> bool {
        self.error_markers
            .iter()
            .any(|marker| combined_output.contains(marker))
    }
}

/// Read-only registry mapping language identifiers to adapters.
///
/// Built once at startup, then only read. Unknown languages fail with
/// [`GraderError::UnsupportedLanguage`] carrying the supported list.
#[derive(Debug, Clone)]
pub struct Registry {
    adapters: Vec<LanguageAdapter>,
}

impl Registry {
    /// Builds the registry with built-in adapter defaults.
    pub fn with_defaults() -> Self {
        Self {
            adapters: vec![LanguageAdapter::python(), LanguageAdapter::javascript()],
        }
    }

    /// Builds the registry, applying image/command overrides from config.
    pub fn from_config(config: &LanguagesConfig) -> Result<Self> {
        let mut registry = Self::with_defaults();
        for adapter in &mut registry.adapters {
            let Some(overrides) = config.get(adapter.language) else {
                continue;
            };
            if let Some(ref image) = overrides.image {
                adapter.image.clone_from(image);
            }
            if let Some(ref command) = overrides.command {
                adapter.command = shell_words::split(command).with_context(|| {
                    format!(
                        "invalid command override for {}: '{command}'",
                        adapter.language
                    )
                })?;
            }
        }
        Ok(registry)
    }

    /// Resolves a language identifier to its adapter.
    ///
    /// Pure lookup, no side effects.
    pub fn resolve(&self, language: &str) -> Result<&LanguageAdapter, GraderError> {
        let language: Language = language.parse()?;
        // The registry always holds one adapter per Language variant.
        self.adapters
            .iter()
            .find(|adapter| adapter.language == language)
            .ok_or_else(|| {
                GraderError::unsupported_language(
                    language.name(),
                    self.supported().iter().map(|l| l.name()),
                )
            })
    }

    /// The languages this registry can resolve.
    pub fn supported(&self) -> Vec<Language> {
        self.adapters.iter().map(|adapter| adapter.language).collect()
    }

    /// Iterates over all registered adapters.
    pub fn adapters(&self) -> impl Iterator<Item = &LanguageAdapter> {
        self.adapters.iter()
    }
}
