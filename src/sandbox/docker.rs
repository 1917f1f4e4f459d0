//! Docker implementation of the [`Sandbox`] trait.
//!
//! Each execution provisions a fresh container, injects the source via
//! an in-memory tar upload, runs the adapter's command, and collects
//! combined stdout/stderr until the process exits or the timeout fires.
//! The container is force-removed before `run` returns, on every path.

use anyhow::{Context, Result};
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, UploadToContainerOptions, WaitContainerOptions,
};
use bollard::Docker;
use bytes::Bytes;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ExecutionOutcome, Sandbox, SandboxError};
use crate::config::{NetworkPolicy, SandboxConfig};
use crate::language::LanguageAdapter;

/// Name prefix for every container this backend creates; cleanup of
/// orphans keys off it.
const CONTAINER_PREFIX: &str = "gradebox-";

/// Directory inside the container that staged source archives unpack into.
const STAGING_ROOT: &str = "/tmp";

/// How long to keep draining buffered log output after the process exits.
const LOG_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Bound on each daemon call outside the timed run loop. A hung daemon
/// surfaces as an error instead of stalling the request.
const DAEMON_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on each container-removal attempt during teardown.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs submissions in disposable Docker containers.
pub struct DockerSandbox {
    network: NetworkPolicy,
    memory_bytes: i64,
    nano_cpus: i64,
    pids_limit: i64,
}

impl DockerSandbox {
    /// Creates a sandbox backend, validating the configured resource limits.
    pub fn new(config: &SandboxConfig) -> Result<Self> {
        let memory_bytes = parse_memory_limit(&config.memory)?;
        let cpus: f64 = config
            .cpus
            .parse()
            .with_context(|| format!("Invalid CPU limit: {}", config.cpus))?;
        #[allow(clippy::cast_possible_truncation)]
        let nano_cpus = (cpus * 1_000_000_000.0) as i64;

        Ok(Self {
            network: config.network,
            memory_bytes,
            nano_cpus,
            pids_limit: config.pids_limit,
        })
    }

    async fn connect(&self) -> Result<Docker, SandboxError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::unavailable(format!("failed to connect: {e}")))?;

        docker
            .ping()
            .await
            .map_err(|e| SandboxError::unavailable(format!("cannot ping daemon: {e}")))?;

        Ok(docker)
    }

    fn build_container_config(
        &self,
        adapter: &LanguageAdapter,
        source_path: &str,
    ) -> ContainerConfig<String> {
        let network_mode = match self.network {
            NetworkPolicy::Deny => Some("none".to_string()),
            NetworkPolicy::AllowAll => None,
        };

        ContainerConfig {
            image: Some(adapter.image.clone()),
            cmd: Some(adapter.run_command(source_path)),
            working_dir: Some(STAGING_ROOT.to_string()),
            host_config: Some(bollard::service::HostConfig {
                memory: Some(self.memory_bytes),
                nano_cpus: Some(self.nano_cpus),
                pids_limit: Some(self.pids_limit),
                network_mode,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn create(
        &self,
        docker: &Docker,
        container_name: &str,
        adapter: &LanguageAdapter,
        source_path: &str,
    ) -> Result<(), SandboxError> {
        debug!("Creating container: {}", container_name);
        docker
            .create_container(
                Some(CreateContainerOptions {
                    name: container_name.to_string(),
                    platform: None,
                }),
                self.build_container_config(adapter, source_path),
            )
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => SandboxError::image_not_found(&adapter.image),
                other => SandboxError::container_failed(format!("failed to create: {other}")),
            })?;
        Ok(())
    }

    /// Injects the source archive, starts the process, and collects
    /// output until exit or timeout. The caller owns teardown.
    async fn execute(
        &self,
        docker: &Docker,
        container_name: &str,
        archive: Bytes,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, SandboxError> {
        bounded("source injection", DAEMON_CALL_TIMEOUT, async {
            docker
                .upload_to_container(
                    container_name,
                    Some(UploadToContainerOptions::<String> {
                        path: STAGING_ROOT.to_string(),
                        ..Default::default()
                    }),
                    archive,
                )
                .await
                .map_err(|e| {
                    SandboxError::container_failed(format!("failed to inject source: {e}"))
                })
        })
        .await?;

        debug!("Starting container");
        bounded("container start", DAEMON_CALL_TIMEOUT, async {
            docker
                .start_container::<String>(container_name, None)
                .await
                .map_err(|e| SandboxError::container_failed(format!("failed to start: {e}")))
        })
        .await?;

        let mut logs = docker.logs(
            container_name,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );
        let mut wait = docker.wait_container(container_name, None::<WaitContainerOptions<String>>);

        let mut combined_output = String::new();
        let mut logs_done = false;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                () = &mut deadline => {
                    warn!("Execution exceeded timeout of {:?}", timeout);
                    return Ok(ExecutionOutcome::timed_out(combined_output));
                }
                chunk = logs.next(), if !logs_done => match chunk {
                    Some(Ok(log)) => {
                        combined_output.push_str(&String::from_utf8_lossy(&log.into_bytes()));
                    }
                    Some(Err(e)) => warn!("Error reading container output: {}", e),
                    None => logs_done = true,
                },
                status = wait.next() => break status,
            }
        };

        let exit_code = match status {
            Some(Ok(body)) => body.status_code,
            // bollard reports non-zero exits as a wait error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => code,
            Some(Err(e)) => {
                return Err(SandboxError::container_failed(format!(
                    "failed waiting for exit: {e}"
                )));
            }
            None => {
                return Err(SandboxError::container_failed(
                    "wait stream ended without an exit status",
                ));
            }
        };

        // Drain output buffered between the last poll and process exit.
        while !logs_done {
            match tokio::time::timeout(LOG_DRAIN_TIMEOUT, logs.next()).await {
                Ok(Some(Ok(log))) => {
                    combined_output.push_str(&String::from_utf8_lossy(&log.into_bytes()));
                }
                Ok(Some(Err(_)) | None) | Err(_) => logs_done = true,
            }
        }

        debug!("Container exited with status {}", exit_code);
        Ok(ExecutionOutcome::completed(exit_code, combined_output))
    }

    /// Force-removes the container; best-effort retried once, each
    /// attempt capped so teardown can never block the request path.
    async fn teardown(&self, docker: &Docker, container_name: &str) {
        debug!("Removing container: {}", container_name);
        if let Err(first) = remove_bounded(docker, container_name).await {
            warn!(
                "Failed to remove container {}: {}; retrying",
                container_name, first
            );
            if let Err(second) = remove_bounded(docker, container_name).await {
                warn!(
                    "Container {} left behind: {}; `gradebox clean` will collect it",
                    container_name, second
                );
            }
        }
    }
}

#[async_trait::async_trait]
impl Sandbox for DockerSandbox {
    async fn run(
        &self,
        adapter: &LanguageAdapter,
        source: &str,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, SandboxError> {
        let docker = bounded("daemon connect", DAEMON_CALL_TIMEOUT, self.connect()).await?;

        let execution_id = short_id();
        let container_name = format!("{CONTAINER_PREFIX}{execution_id}");
        let staged = stage_source(adapter, source, &execution_id)?;

        info!(
            "Running {} submission in container {}",
            adapter.language, container_name
        );

        bounded(
            "container create",
            DAEMON_CALL_TIMEOUT,
            self.create(&docker, &container_name, adapter, &staged.container_path),
        )
        .await?;

        // Everything past creation runs under guaranteed teardown.
        let result = self
            .execute(&docker, &container_name, staged.archive, timeout)
            .await;

        self.teardown(&docker, &container_name).await;

        result
    }

    async fn cleanup_orphaned(&self) -> Result<u32, SandboxError> {
        let docker = bounded("daemon connect", DAEMON_CALL_TIMEOUT, self.connect()).await?;

        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![CONTAINER_PREFIX.to_string()]);

        let containers = bounded("container list", DAEMON_CALL_TIMEOUT, async {
            docker
                .list_containers(Some(ListContainersOptions::<String> {
                    all: true,
                    filters,
                    ..Default::default()
                }))
                .await
                .map_err(|e| SandboxError::container_failed(format!("failed to list: {e}")))
        })
        .await?;

        let mut removed = 0;
        for container in containers {
            let Some(name) = container
                .names
                .as_ref()
                .and_then(|names| names.first())
                .map(|name| name.trim_start_matches('/').to_string())
            else {
                continue;
            };
            if !name.starts_with(CONTAINER_PREFIX) {
                continue;
            }
            match remove_bounded(&docker, &name).await {
                Ok(()) => {
                    info!("Removed orphaned container: {}", name);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove orphaned container {}: {}", name, e),
            }
        }

        Ok(removed)
    }
}

/// Caps a daemon call at `limit`; elapsing the cap reports the daemon
/// as unresponsive.
async fn bounded<T>(
    operation: &str,
    limit: Duration,
    call: impl std::future::Future<Output = Result<T, SandboxError>>,
) -> Result<T, SandboxError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SandboxError::unavailable(format!(
            "{operation} did not complete within {limit:?}"
        ))),
    }
}

/// One capped force-removal attempt.
async fn remove_bounded(docker: &Docker, container_name: &str) -> Result<(), SandboxError> {
    bounded("container removal", TEARDOWN_TIMEOUT, async {
        docker
            .remove_container(
                container_name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| SandboxError::container_failed(e.to_string()))
    })
    .await
}

/// A source archive staged for upload, plus the path the run command
/// will find it at inside the container.
struct StagedSource {
    archive: Bytes,
    container_path: String,
}

/// Packs the source into an in-memory tar under a per-execution
/// directory, so concurrent executions can never collide on a path.
fn stage_source(
    adapter: &LanguageAdapter,
    source: &str,
    execution_id: &str,
) -> Result<StagedSource, SandboxError> {
    let entry_path = format!("{execution_id}/{}", adapter.source_file);

    let mut header = tar::Header::new_gnu();
    header.set_size(source.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append_data(&mut header, &entry_path, source.as_bytes())
        .map_err(|e| SandboxError::container_failed(format!("failed to stage source: {e}")))?;
    let archive = builder
        .into_inner()
        .map_err(|e| SandboxError::container_failed(format!("failed to stage source: {e}")))?;

    Ok(StagedSource {
        archive: Bytes::from(archive),
        container_path: format!("{STAGING_ROOT}/{entry_path}"),
    })
}

/// Short unique id for container names and staging directories.
fn short_id() -> String {
    uuid::Uuid::new_v4()
        .to_string()
        .split('-')
        .next()
        .unwrap_or("0")
        .to_string()
}

/// Parse memory limit string (e.g., "1g", "512m") to bytes
fn parse_memory_limit(limit: &str) -> Result<i64> {
    let limit = limit.to_lowercase();

    if let Some(num) = limit.strip_suffix('g') {
        let gigs: i64 = num.parse().context("Invalid memory limit")?;
        Ok(gigs * 1024 * 1024 * 1024)
    } else if let Some(num) = limit.strip_suffix('m') {
        let megs: i64 = num.parse().context("Invalid memory limit")?;
        Ok(megs * 1024 * 1024)
    } else {
        limit.parse().context("Invalid memory limit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Registry;

    fn python_adapter() -> LanguageAdapter {
        Registry::with_defaults().resolve("python").unwrap().clone()
    }

    #[test]
    fn test_parse_memory_limit() {
        assert_eq!(parse_memory_limit("1g").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_memory_limit("512m").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_memory_limit("256M").unwrap(), 256 * 1024 * 1024);
        assert_eq!(parse_memory_limit("1024").unwrap(), 1024);
        assert!(parse_memory_limit("lots").is_err());
    }

    #[test]
    fn test_new_rejects_bad_limits() {
        let config = SandboxConfig {
            memory: "plenty".to_string(),
            ..Default::default()
        };
        assert!(DockerSandbox::new(&config).is_err());

        let config = SandboxConfig {
            cpus: "fast".to_string(),
            ..Default::default()
        };
        assert!(DockerSandbox::new(&config).is_err());
    }

    #[test]
    fn test_stage_source_builds_readable_archive() {
        let staged = stage_source(&python_adapter(), "print('hi')\n", "abc123").unwrap();
        assert_eq!(staged.container_path, "/tmp/abc123/main.py");

        let mut archive = tar::Archive::new(staged.archive.as_ref());
        let mut entries = archive.entries().unwrap();
        let entry = entries.next().unwrap().unwrap();
        assert_eq!(
            entry.path().unwrap().to_str().unwrap(),
            "abc123/main.py"
        );
    }

    #[test]
    fn test_container_config_applies_limits_and_network() {
        let sandbox = DockerSandbox::new(&SandboxConfig::default()).unwrap();
        let config = sandbox.build_container_config(&python_adapter(), "/tmp/x/main.py");

        assert_eq!(config.image.as_deref(), Some("python:3.12-alpine"));
        assert_eq!(
            config.cmd,
            Some(vec!["python".to_string(), "/tmp/x/main.py".to_string()])
        );

        let host = config.host_config.unwrap();
        assert_eq!(host.memory, Some(256 * 1024 * 1024));
        assert_eq!(host.nano_cpus, Some(1_000_000_000));
        assert_eq!(host.pids_limit, Some(64));
        assert_eq!(host.network_mode.as_deref(), Some("none"));
    }

    #[test]
    fn test_container_config_allow_all_keeps_default_network() {
        let config = SandboxConfig {
            network: NetworkPolicy::AllowAll,
            ..Default::default()
        };
        let sandbox = DockerSandbox::new(&config).unwrap();
        let container = sandbox.build_container_config(&python_adapter(), "/tmp/x/main.py");
        assert!(container.host_config.unwrap().network_mode.is_none());
    }

    #[test]
    fn test_short_id_is_unique_enough() {
        let a = short_id();
        let b = short_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_bounded_call_fails_instead_of_hanging() {
        let result = bounded(
            "container removal",
            Duration::from_millis(10),
            std::future::pending::<Result<(), SandboxError>>(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("container removal"));
    }

    #[tokio::test]
    async fn test_bounded_call_passes_results_through() {
        let ok = bounded("ping", DAEMON_CALL_TIMEOUT, async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = bounded("ping", DAEMON_CALL_TIMEOUT, async {
            Err::<(), _>(SandboxError::container_failed("boom"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, SandboxError::ContainerFailed { .. }));
    }

    #[tokio::test]
    async fn test_cleanup_orphaned_without_docker() {
        // Verifies graceful behavior whether or not a daemon is present.
        let sandbox = DockerSandbox::new(&SandboxConfig::default()).unwrap();
        match sandbox.cleanup_orphaned().await {
            Ok(_count) => {}
            Err(e) => assert!(e.is_unavailable(), "unexpected error: {e}"),
        }
    }
}
