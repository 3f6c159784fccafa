//! HTTP surface of the directory.
//!
//! `POST` registers a JSON [`Registration`], `DELETE` removes the instance
//! whose URL is the raw request body, `GET` lists live registrations.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{normalize_path, DirectoryConfig};
use crate::directory::Directory;
use crate::registration::Registration;
use crate::{Error, Result};

impl Error {
    /// Status code the directory answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Duplicate(_) => StatusCode::CONFLICT,
            Error::NotFound(_) | Error::NoProviders(_) => StatusCode::NOT_FOUND,
            Error::Delivery { .. } | Error::Timeout(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Router serving the registration endpoint at `path`.
pub fn directory_router(directory: Arc<Directory>, path: &str) -> Router {
    Router::new()
        .route(&normalize_path(path.to_owned()), post(register).delete(deregister).get(list))
        .with_state(directory)
}

async fn register(
    State(directory): State<Arc<Directory>>,
    Json(reg): Json<Registration>,
) -> Result<StatusCode> {
    info!(service = %reg.service_name, url = %reg.service_url, "adding service");
    directory.add(reg).await.inspect_err(|e| warn!(error = %e, "registration failed"))?;
    Ok(StatusCode::OK)
}

async fn deregister(State(directory): State<Arc<Directory>>, body: String) -> Result<StatusCode> {
    let url = body.trim();
    info!(url, "removing service");
    directory.remove(url).inspect_err(|e| warn!(error = %e, "deregistration failed"))?;
    Ok(StatusCode::OK)
}

async fn list(State(directory): State<Arc<Directory>>) -> Json<Vec<Registration>> {
    Json(directory.registrations())
}

/// Runs the directory behind its HTTP endpoint.
pub struct DirectoryServer {
    directory: Arc<Directory>,
    config: DirectoryConfig,
}

impl DirectoryServer {
    /// Create a server with an HTTP-delivering directory.
    pub fn new(config: DirectoryConfig) -> Self {
        let directory = Arc::new(Directory::with_http(config.http.clone()));
        Self { directory, config }
    }

    /// Create a server around an existing directory.
    pub fn with_directory(directory: Arc<Directory>, config: DirectoryConfig) -> Self {
        Self { directory, config }
    }

    /// Bind the configured address and start serving.
    pub async fn serve(self) -> Result<DirectoryGuard> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_with_listener(listener)
    }

    /// Start serving on an already bound listener.
    pub fn serve_with_listener(self, listener: TcpListener) -> Result<DirectoryGuard> {
        let local_addr = listener.local_addr()?;
        let services_path = normalize_path(self.config.services_path);
        let app = directory_router(Arc::clone(&self.directory), &services_path);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            let shutdown_fut = async move {
                let _ = shutdown_rx.recv().await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_fut)
                .await
            {
                error!("directory server error: {e}");
            }
        });

        info!(%local_addr, path = %services_path, "directory listening");
        Ok(DirectoryGuard {
            directory: self.directory,
            local_addr,
            services_path,
            shutdown_tx,
            handle: Some(handle),
        })
    }
}

/// Guard for a running directory server.
pub struct DirectoryGuard {
    directory: Arc<Directory>,
    local_addr: SocketAddr,
    services_path: String,
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl DirectoryGuard {
    /// The directory being served.
    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Full URL of the registration endpoint, for clients on this host.
    pub fn services_url(&self) -> String {
        format!("http://{}{}", self.local_addr, self.services_path)
    }

    /// Graceful shutdown.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

impl Drop for DirectoryGuard {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use tower::ServiceExt;

    use super::*;
    use crate::delivery::PatchSender;
    use crate::patch::Patch;

    struct NullSender;

    impl PatchSender for NullSender {
        fn send<'a>(&'a self, _url: &'a str, _patch: &'a Patch) -> BoxFuture<'a, Result<()>> {
            async { Ok(()) }.boxed()
        }
    }

    fn app() -> (Arc<Directory>, Router) {
        let directory = Arc::new(Directory::new(Arc::new(NullSender)));
        let router = directory_router(Arc::clone(&directory), "/services");
        (directory, router)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/services")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn delete(url: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri("/services")
            .body(Body::from(url.to_owned()))
            .unwrap()
    }

    const LOG: &str = r#"{"ServiceName":"LogService","ServiceURL":"http://localhost:4000","RequiredServices":[],"ServiceUpdateURL":"http://localhost:4000/services"}"#;

    #[tokio::test]
    async fn register_then_deregister() {
        let (directory, app) = app();

        let res = app.clone().oneshot(post_json(LOG)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(directory.len(), 1);

        let res = app.oneshot(delete("http://localhost:4000")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn maps_errors_to_statuses() {
        let (_directory, app) = app();

        let res = app.clone().oneshot(post_json(LOG)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let res = app.clone().oneshot(post_json(LOG)).await.unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let empty = r#"{"ServiceName":"","ServiceURL":"http://x"}"#;
        let res = app.clone().oneshot(post_json(empty)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app.clone().oneshot(delete("http://unknown")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let put = Request::builder()
            .method("PUT")
            .uri("/services")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(put).await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn lists_live_registrations() {
        let (_directory, app) = app();
        app.clone().oneshot(post_json(LOG)).await.unwrap();

        let get = Request::builder()
            .method("GET")
            .uri("/services")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(get).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let regs: Vec<Registration> = serde_json::from_slice(&body).unwrap();
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[0].service_url, "http://localhost:4000");
    }

    #[tokio::test]
    async fn relative_path_is_served_as_absolute() {
        let directory = Arc::new(Directory::new(Arc::new(NullSender)));
        let app = directory_router(Arc::clone(&directory), "services");

        let res = app.oneshot(post_json(LOG)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(directory.len(), 1);
    }
}
