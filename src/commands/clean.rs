//! Remove orphaned sandbox containers left by crashed runs.

use anyhow::{Context, Result};

use gradebox::config::Config;
use gradebox::sandbox::{DockerSandbox, Sandbox};

/// Force-remove any leftover gradebox containers.
pub async fn run() -> Result<()> {
    let project_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&project_dir)?;

    let sandbox = DockerSandbox::new(&config.sandbox)?;
    let removed = sandbox.cleanup_orphaned().await?;

    if removed == 0 {
        println!("No orphaned sandbox containers found.");
    } else {
        println!("Removed {removed} orphaned sandbox container(s).");
    }

    Ok(())
}
