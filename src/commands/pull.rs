//! Pull the runtime images used by the language adapters.

use anyhow::{Context, Result};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::StreamExt;
use tracing::info;

use gradebox::config::Config;
use gradebox::language::Registry;

/// Pull the image for one language, or for all registered adapters.
pub async fn run(language: Option<String>) -> Result<()> {
    let project_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&project_dir)?;
    let registry = Registry::from_config(&config.languages)?;

    let images: Vec<String> = match language {
        Some(ref language) => vec![registry.resolve(language)?.image.clone()],
        None => registry.adapters().map(|a| a.image.clone()).collect(),
    };

    let docker = Docker::connect_with_local_defaults()
        .context("Failed to connect to Docker. Is Docker running?")?;

    docker
        .ping()
        .await
        .context("Cannot ping Docker daemon. Is Docker running?")?;

    for image in images {
        pull_image(&docker, &image).await?;
    }

    Ok(())
}

/// Pull a single image from its registry, streaming progress.
async fn pull_image(docker: &Docker, image: &str) -> Result<()> {
    info!("Pulling image: {}", image);

    let pull_options = CreateImageOptions {
        from_image: image,
        ..Default::default()
    };

    let mut stream = docker.create_image(Some(pull_options), None, None);

    while let Some(chunk_result) = stream.next().await {
        match chunk_result {
            Ok(output) => {
                if let Some(status) = &output.status {
                    let trimmed = status.trim();
                    if !trimmed.is_empty() {
                        println!("{trimmed}");
                    }
                } else if let Some(error) = &output.error {
                    anyhow::bail!("Docker pull error: {error}");
                }
            }
            Err(e) => {
                anyhow::bail!("Error pulling image {image}: {e}");
            }
        }
    }

    info!("Image pulled: {}", image);
    Ok(())
}
