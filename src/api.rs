//! Management API for the dashboard
//!
//! JSON endpoints mapping 1:1 onto the core operations: list apps, create
//! an app, read/replace its code, restart it, delete it, and fetch its
//! logs. Page rendering lives in a separate frontend; this surface is the
//! whole of what it calls.

use crate::error::{json_error_response, Error, Result};
use crate::lifecycle::LifecycleManager;
use crate::naming;
use crate::reconcile::{AppView, Reconciler};
use crate::store::{self, CodeStore};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How many generated names the create path tries before giving up on a
/// collision streak
const CREATE_NAME_ATTEMPTS: usize = 16;

/// Request to replace an app's source code
#[derive(Debug, Deserialize)]
pub struct UpdateCodeRequest {
    pub code: String,
}

/// App source returned by the code endpoint
#[derive(Debug, Serialize)]
pub struct CodeView {
    pub name: String,
    pub code: String,
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Management API server
pub struct DashboardApi {
    bind_addr: SocketAddr,
    store: CodeStore,
    lifecycle: Arc<LifecycleManager>,
    reconciler: Reconciler,
    default_log_tail: usize,
    shutdown_rx: watch::Receiver<bool>,
}

impl DashboardApi {
    pub fn new(
        bind_addr: SocketAddr,
        store: CodeStore,
        lifecycle: Arc<LifecycleManager>,
        reconciler: Reconciler,
        default_log_tail: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bind_addr,
            store,
            lifecycle,
            reconciler,
            default_log_tail,
            shutdown_rx,
        }
    }

    /// Run the API server until shutdown is signalled
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "Management API listening");

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let api = Arc::clone(&self);
                            tokio::spawn(async move {
                                if let Err(e) = api.serve_connection(stream).await {
                                    debug!(addr = %addr, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Management API shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    async fn serve_connection<S>(self: Arc<Self>, stream: S) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(stream);
        let service = service_fn(move |req| {
            let api = Arc::clone(&self);
            async move { api.handle_request(req).await }
        });

        AutoBuilder::new(TokioExecutor::new())
            .serve_connection(io, service)
            .await
            .map_err(|e| anyhow::anyhow!("Connection error: {}", e))?;

        Ok(())
    }

    async fn handle_request(
        self: Arc<Self>,
        req: Request<hyper::body::Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(str::to_string);

        debug!(%method, %path, "API request");

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        let response = match (method, segments.as_slice()) {
            (Method::GET, ["health"]) => Ok(json_response(StatusCode::OK, r#"{"status":"ok"}"#)),
            (Method::GET, ["apps"]) => self.list_apps().await,
            (Method::POST, ["apps"]) => self.create_app().await,
            (Method::GET, ["apps", name, "code"]) => self.get_code(name).await,
            (Method::PUT, ["apps", name, "code"]) => {
                let name = name.to_string();
                self.update_code(&name, req).await
            }
            (Method::POST, ["apps", name, "restart"]) => self.restart_app(name).await,
            (Method::DELETE, ["apps", name]) => self.delete_app(name).await,
            (Method::GET, ["apps", name, "logs"]) => {
                self.get_logs(name, query.as_deref()).await
            }
            _ => Err(Error::NotFound(path.clone())),
        };

        match response {
            Ok(resp) => Ok(resp),
            Err(e) => {
                warn!(%path, error = %e, code = e.code(), "API request failed");
                Ok(json_error_response(&e))
            }
        }
    }

    // ==================== App actions ====================

    async fn list_apps(&self) -> Result<Response<Full<Bytes>>> {
        let apps = self.reconciler.list_apps().await?;
        let response = ApiResponse::ok(apps);
        Ok(json_response(
            StatusCode::OK,
            serde_json::to_string(&response)?,
        ))
    }

    /// Create a new app: generate a free name, write the default code, then
    /// start its container. A generated-name collision regenerates up to
    /// CREATE_NAME_ATTEMPTS times before propagating AlreadyExists.
    async fn create_app(&self) -> Result<Response<Full<Bytes>>> {
        let mut name = None;
        for _ in 0..CREATE_NAME_ATTEMPTS {
            let candidate = naming::generate_name();
            match self
                .store
                .create_app_dir(&candidate, store::DEFAULT_APP_CODE)
            {
                Ok(()) => {
                    name = Some(candidate);
                    break;
                }
                Err(Error::AlreadyExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        let name = name.ok_or_else(|| {
            Error::AlreadyExists("no free app name after repeated collisions".to_string())
        })?;

        info!(app = %name, "Created app");

        self.lifecycle.start_or_replace(&name).await?;

        let view = self.view_for(&name).await?;
        let response = ApiResponse::ok(view);
        Ok(json_response(
            StatusCode::CREATED,
            serde_json::to_string(&response)?,
        ))
    }

    async fn get_code(&self, app_name: &str) -> Result<Response<Full<Bytes>>> {
        validate_name(app_name)?;
        let code = self.store.read_code(app_name)?;
        let response = ApiResponse::ok(CodeView {
            name: app_name.to_string(),
            code,
        });
        Ok(json_response(
            StatusCode::OK,
            serde_json::to_string(&response)?,
        ))
    }

    /// Replace an app's code and swap in a fresh container running it
    async fn update_code(
        &self,
        app_name: &str,
        req: Request<hyper::body::Incoming>,
    ) -> Result<Response<Full<Bytes>>> {
        validate_name(app_name)?;
        let body = req
            .collect()
            .await
            .map_err(|e| Error::InvalidRequest(format!("failed to read body: {}", e)))?
            .to_bytes();
        let update: UpdateCodeRequest = serde_json::from_slice(&body)
            .map_err(|e| Error::InvalidRequest(format!("invalid JSON: {}", e)))?;

        self.store.write_code(app_name, &update.code)?;
        self.lifecycle.start_or_replace(app_name).await?;

        info!(app = app_name, "Updated app code and replaced container");

        let view = self.view_for(app_name).await?;
        let response = ApiResponse::ok(view);
        Ok(json_response(
            StatusCode::OK,
            serde_json::to_string(&response)?,
        ))
    }

    async fn restart_app(&self, app_name: &str) -> Result<Response<Full<Bytes>>> {
        validate_name(app_name)?;
        self.lifecycle.restart(app_name).await?;

        let view = self.view_for(app_name).await?;
        let response = ApiResponse::ok(view);
        Ok(json_response(
            StatusCode::OK,
            serde_json::to_string(&response)?,
        ))
    }

    /// Delete an app. The lifecycle manager removes the container and the
    /// code directory under one per-app lock acquisition. Deleting an app
    /// that does not exist succeeds silently.
    async fn delete_app(&self, app_name: &str) -> Result<Response<Full<Bytes>>> {
        validate_name(app_name)?;
        self.lifecycle.delete(app_name).await?;

        let response = ApiResponse::ok(());
        Ok(json_response(
            StatusCode::OK,
            serde_json::to_string(&response)?,
        ))
    }

    async fn get_logs(
        &self,
        app_name: &str,
        query: Option<&str>,
    ) -> Result<Response<Full<Bytes>>> {
        validate_name(app_name)?;
        let tail = parse_tail(query)?.unwrap_or(self.default_log_tail);
        let logs = self.lifecycle.fetch_logs(app_name, tail).await?;

        let response = ApiResponse::ok(serde_json::json!({
            "name": app_name,
            "tail": tail,
            "logs": logs,
        }));
        Ok(json_response(
            StatusCode::OK,
            serde_json::to_string(&response)?,
        ))
    }

    async fn view_for(&self, app_name: &str) -> Result<AppView> {
        let apps = self.reconciler.list_apps().await?;
        apps.into_iter()
            .find(|a| a.name == app_name)
            .ok_or_else(|| Error::NotFound(format!("app {}", app_name)))
    }
}

// ==================== Helper functions ====================

/// Reject path segments that could not have come from the name generator,
/// before they ever reach the filesystem or the runtime.
fn validate_name(app_name: &str) -> Result<()> {
    let ok = !app_name.is_empty()
        && app_name.len() <= 64
        && app_name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "invalid app name: {}",
            app_name
        )))
    }
}

/// Parse `tail=N` out of a query string, if present
fn parse_tail(query: Option<&str>) -> Result<Option<usize>> {
    let Some(query) = query else {
        return Ok(None);
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("tail=") {
            let tail = value
                .parse::<usize>()
                .map_err(|_| Error::InvalidRequest(format!("invalid tail value: {}", value)))?;
            return Ok(Some(tail));
        }
    }
    Ok(None)
}

fn json_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(body.into()))
        .expect("valid response")
}
