//! List supported languages and their runtimes.

use anyhow::{Context, Result};

use gradebox::config::Config;
use gradebox::language::Registry;

/// Print the adapter table the registry would be built with.
pub fn run() -> Result<()> {
    let project_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&project_dir)?;
    let registry = Registry::from_config(&config.languages)?;

    println!("{:<12} {:<24} COMMAND", "LANGUAGE", "IMAGE");
    for adapter in registry.adapters() {
        println!(
            "{:<12} {:<24} {}",
            adapter.language.to_string(),
            adapter.image,
            adapter.command.join(" ")
        );
    }

    Ok(())
}
