//! Docker runtime client: connection handling and low-level container calls
//!
//! Everything that touches the bollard API directly lives here. Higher-level
//! lifecycle decisions (replace semantics, locking, labels) live in the
//! lifecycle module.

use crate::error::{Error, Result};
use bollard::container::{ListContainersOptions, LogOutput, LogsOptions, RemoveContainerOptions};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Shared handle to the Docker daemon
pub struct DockerManager {
    client: Docker,
}

impl DockerManager {
    /// Connect to the Docker daemon and verify it responds.
    ///
    /// Connection priority:
    /// 1. Explicit docker_host parameter
    /// 2. DOCKER_HOST environment variable
    /// 3. Platform socket defaults
    pub async fn new(docker_host: Option<&str>) -> Result<Self> {
        let client = if let Some(host) = docker_host {
            Self::connect_to_host(host)?
        } else if let Ok(host) = std::env::var("DOCKER_HOST") {
            Self::connect_to_host(&host)?
        } else {
            Docker::connect_with_socket_defaults().map_err(|e| {
                Error::RuntimeUnavailable(format!(
                    "cannot connect to Docker daemon: {}. \
                     Start dockerd or set DOCKER_HOST.",
                    e
                ))
            })?
        };

        client.ping().await.map_err(|e| {
            Error::RuntimeUnavailable(format!("Docker daemon is not responding: {}", e))
        })?;

        debug!("Connected to Docker daemon");
        Ok(Self { client })
    }

    fn connect_to_host(host: &str) -> Result<Docker> {
        let result = if host.starts_with("unix://") {
            let socket_path = host.trim_start_matches("unix://");
            Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            Docker::connect_with_http(host, 120, bollard::API_DEFAULT_VERSION)
        } else {
            return Err(Error::RuntimeUnavailable(format!(
                "invalid docker host '{}': expected 'unix:///path/to/socket' or 'tcp://host:port'",
                host
            )));
        };
        result.map_err(|e| {
            Error::RuntimeUnavailable(format!("failed to connect to Docker at '{}': {}", host, e))
        })
    }

    /// Raw bollard client, for the lifecycle manager's create/start calls
    pub fn client(&self) -> &Docker {
        &self.client
    }

    /// Client built without the startup ping. The connection is lazy, so
    /// tests can exercise call ordering whether or not a daemon is
    /// reachable.
    #[cfg(test)]
    pub(crate) fn connect_lazy() -> Result<Self> {
        // A plain-HTTP handle is built without touching the filesystem, so
        // construction succeeds even when no docker socket exists; calls
        // fail only when actually made.
        let client = Docker::connect_with_http("http://127.0.0.1:1", 1, bollard::API_DEFAULT_VERSION)?;
        Ok(Self { client })
    }

    /// Pull an image unless it is already present locally.
    ///
    /// Container creation does not pull on its own, so the lifecycle manager
    /// calls this before the first create after a fresh host.
    pub async fn pull_image_if_needed(&self, image: &str) -> Result<()> {
        if self.client.inspect_image(image).await.is_ok() {
            debug!(image, "Image exists locally, skipping pull");
            return Ok(());
        }

        info!(image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            let progress = result?;
            if let Some(status) = progress.status {
                debug!(image, status, "Pull progress");
            }
            if let Some(error) = progress.error {
                return Err(Error::RuntimeUnavailable(format!(
                    "failed to pull image '{}': {}",
                    image, error
                )));
            }
        }

        info!(image, "Image pulled");
        Ok(())
    }

    /// Forcibly remove a container by name, stopping it first if needed.
    ///
    /// An absent container counts as success; anything else propagates.
    pub async fn remove_container(&self, container_name: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self
            .client
            .remove_container(container_name, Some(options))
            .await
        {
            Ok(_) => {
                debug!(container_name, "Removed container");
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!(container_name, "Container not found, nothing to remove");
                Ok(())
            }
            Err(e) => {
                warn!(container_name, error = %e, "Failed to remove container");
                Err(e.into())
            }
        }
    }

    /// Map container name to its state string, for every container the
    /// runtime knows about (running or not). Names come back without the
    /// leading slash the API prefixes them with.
    pub async fn list_container_states(&self) -> Result<HashMap<String, String>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let containers = self.client.list_containers(Some(options)).await?;

        let mut states = HashMap::new();
        for container in containers {
            let state = container
                .state
                .unwrap_or_else(|| "unknown".to_string());
            for name in container.names.unwrap_or_default() {
                states.insert(name.trim_start_matches('/').to_string(), state.clone());
            }
        }
        Ok(states)
    }

    /// Last `tail` lines of combined stdout/stderr from a container.
    ///
    /// Fails with NotFound when no such container exists.
    pub async fn tail_logs(&self, container_name: &str, tail: usize) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut stream = self.client.logs(container_name, Some(options));
        let mut output = String::new();

        while let Some(result) = stream.next().await {
            match result {
                Ok(LogOutput::StdIn { .. }) => {}
                Ok(chunk) => {
                    output.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
                }
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => {
                    return Err(Error::NotFound(format!("container {}", container_name)));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(output)
    }
}
