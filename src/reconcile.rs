//! State reconciler: merges the code store with live container state
//!
//! The code store decides which apps exist; the runtime decides what their
//! status is. A directory with no matching container is `stopped`. A
//! container with no matching directory is an orphan and stays invisible
//! here (no cleanup pass).

use crate::docker::DockerManager;
use crate::error::Result;
use crate::naming;
use crate::store::CodeStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Status reported for an app whose directory exists but has no container
pub const STATUS_STOPPED: &str = "stopped";

/// One row of the app listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppView {
    pub name: String,
    pub status: String,
    pub url: String,
    pub https_url: String,
}

/// Produces the authoritative app list
pub struct Reconciler {
    docker: Arc<DockerManager>,
    store: CodeStore,
    base_domain: String,
}

impl Reconciler {
    pub fn new(docker: Arc<DockerManager>, store: CodeStore, base_domain: String) -> Self {
        Self {
            docker,
            store,
            base_domain,
        }
    }

    /// One AppView per code directory, with live status where a container
    /// exists. Queries the runtime exactly once per call.
    pub async fn list_apps(&self) -> Result<Vec<AppView>> {
        let states = self.docker.list_container_states().await?;
        let dirs = self.store.list_app_dirs()?;
        Ok(merge(&dirs, &states, &self.base_domain))
    }
}

/// Merge directory names with a container-name-to-state map.
///
/// Pure so the listing semantics are testable without a runtime.
pub fn merge(
    app_dirs: &[String],
    container_states: &HashMap<String, String>,
    base_domain: &str,
) -> Vec<AppView> {
    app_dirs
        .iter()
        .map(|name| {
            let status = container_states
                .get(&naming::container_name(name))
                .cloned()
                .unwrap_or_else(|| STATUS_STOPPED.to_string());
            AppView {
                name: name.clone(),
                status,
                url: naming::app_url(name, base_domain),
                https_url: naming::app_https_url(name, base_domain),
            }
        })
        .collect()
}
