//! Container lifecycle management for user apps
//!
//! Makes the running container for an app match its current code and naming:
//! replace semantics (remove old, create fresh, start), restart as the same
//! code path, removal, and log retrieval. Mutating operations take a per-app
//! lock so "at most one container per app name" holds under concurrent
//! requests, not just sequentially.

use crate::docker::DockerManager;
use crate::error::Result;
use crate::naming;
use crate::store::CodeStore;
use bollard::container::{Config, CreateContainerOptions, StartContainerOptions};
use bollard::models::{HostConfig, RestartPolicy, RestartPolicyNameEnum};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Working directory inside every app container, where the code is mounted
const WORKING_DIR: &str = "/user-app";

/// Lifecycle settings carried over from configuration
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Docker network shared with the reverse proxy
    pub network: String,
    /// Base image apps run from
    pub image: String,
    /// Port the app server binds inside the container
    pub app_port: u16,
    /// Base domain the routing labels are derived from
    pub base_domain: String,
}

/// Creates, replaces, and removes the container backing an app
pub struct LifecycleManager {
    docker: Arc<DockerManager>,
    store: CodeStore,
    config: LifecycleConfig,
    /// Per-app-name locks serializing mutating operations
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LifecycleManager {
    pub fn new(docker: Arc<DockerManager>, store: CodeStore, config: LifecycleConfig) -> Self {
        Self {
            docker,
            store,
            config,
            locks: DashMap::new(),
        }
    }

    /// Take the lock for an app name, creating it on first use.
    ///
    /// Lock entries are never reaped; the name space is bounded at 90,000.
    async fn lock_app(&self, app_name: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(app_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Replace the container for an app with a fresh one running its
    /// current code.
    ///
    /// Any existing container with the app's name is force-removed first,
    /// so after this returns at most one container exists for the name and
    /// it started from a clean slate. There is no rollback: if create
    /// succeeds but start fails, the broken container stays behind for
    /// status and log inspection.
    pub async fn start_or_replace(&self, app_name: &str) -> Result<()> {
        let _guard = self.lock_app(app_name).await;
        self.replace_locked(app_name).await
    }

    /// Restart shares the replace code path; there is no lighter-weight
    /// "just restart the process" operation.
    pub async fn restart(&self, app_name: &str) -> Result<()> {
        self.start_or_replace(app_name).await
    }

    async fn replace_locked(&self, app_name: &str) -> Result<()> {
        let container_name = naming::container_name(app_name);
        let labels = naming::routing_labels(
            app_name,
            &self.config.base_domain,
            self.config.app_port,
            &self.config.network,
        );

        // The bind mount needs an absolute host path; this also rejects
        // apps with no code directory before anything is torn down.
        let host_path = self.store.host_path(app_name)?;

        self.docker.pull_image_if_needed(&self.config.image).await?;

        // Clean slate: remove any previous container, whatever its status
        self.docker.remove_container(&container_name).await?;

        let host_config = HostConfig {
            binds: Some(vec![format!("{}:{}", host_path.display(), WORKING_DIR)]),
            network_mode: Some(self.config.network.clone()),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::ALWAYS),
                maximum_retry_count: None,
            }),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(self.config.image.clone()),
            cmd: Some(bootstrap_command(self.config.app_port)),
            working_dir: Some(WORKING_DIR.to_string()),
            labels: Some(labels.into_iter().collect()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .client()
            .create_container(Some(create_options), container_config)
            .await?;

        debug!(
            app = app_name,
            container_name,
            container_id = response.id,
            "Created app container"
        );

        self.docker
            .client()
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await?;

        info!(
            app = app_name,
            container_name,
            container_id = response.id,
            "Started app container"
        );

        Ok(())
    }

    /// Remove the container for an app, leaving its code directory in
    /// place. Absence is success.
    pub async fn stop_and_remove(&self, app_name: &str) -> Result<()> {
        let _guard = self.lock_app(app_name).await;
        self.remove_locked(app_name).await
    }

    /// Delete an app outright: its container, then its code directory.
    ///
    /// Both steps run under one lock acquisition, so a concurrent replace
    /// cannot slip between them, see the directory still present, and
    /// start a fresh container whose code is about to vanish. Container
    /// first, so a running container never points at deleted code.
    pub async fn delete(&self, app_name: &str) -> Result<()> {
        let _guard = self.lock_app(app_name).await;
        self.remove_locked(app_name).await?;
        self.store.delete_app_dir(app_name)?;
        info!(app = app_name, "Deleted app");
        Ok(())
    }

    async fn remove_locked(&self, app_name: &str) -> Result<()> {
        let container_name = naming::container_name(app_name);
        self.docker.remove_container(&container_name).await
    }

    /// Last `tail` lines of combined output from the app's container.
    /// Fails with NotFound when the app has no container.
    pub async fn fetch_logs(&self, app_name: &str, tail: usize) -> Result<String> {
        let container_name = naming::container_name(app_name);
        self.docker.tail_logs(&container_name, tail).await
    }
}

/// Bootstrap command every app container runs: install the app's runtime
/// dependencies, then launch it under gunicorn on the fixed internal port.
fn bootstrap_command(port: u16) -> Vec<String> {
    vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        format!(
            "pip install Flask gunicorn && gunicorn --bind 0.0.0.0:{} app:app",
            port
        ),
    ]
}
