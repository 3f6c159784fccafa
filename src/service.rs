//! Bootstrap for a service that registers with the directory.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use service_directory::{ClientConfig, Registration, ServiceHost, LOG_SERVICE};
//!
//! # async fn run() -> service_directory::Result<()> {
//! let reg = Registration::new("GradingService", "http://localhost:6000", "http://localhost:6000/services")
//!     .require(LOG_SERVICE);
//! let guard = ServiceHost::new(reg, ClientConfig::default())
//!     .routes(Router::new().route("/grades", get(|| async { "[]" })))
//!     .start("0.0.0.0:6000".parse().unwrap())
//!     .await?;
//!
//! let log_url = guard.client().get_provider(&LOG_SERVICE.into())?;
//! # let _ = log_url;
//! guard.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::client::DiscoveryClient;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::registration::Registration;

/// Builder for a service process: its own routes plus the update endpoint,
/// served on one listener and registered with the directory.
pub struct ServiceHost {
    registration: Registration,
    client: DiscoveryClient,
    routes: Router,
}

impl ServiceHost {
    /// Create a host for `registration`.
    pub fn new(registration: Registration, config: ClientConfig) -> Self {
        Self {
            registration,
            client: DiscoveryClient::new(config),
            routes: Router::new(),
        }
    }

    /// Use an existing discovery client (and its provider cache).
    pub fn with_client(mut self, client: DiscoveryClient) -> Self {
        self.client = client;
        self
    }

    /// Add application routes.
    pub fn routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// Bind `addr`, start serving and register.
    pub async fn start(self, addr: SocketAddr) -> Result<ServiceGuard> {
        let listener = TcpListener::bind(addr).await?;
        self.start_with_listener(listener).await
    }

    /// Start serving on `listener` and register.
    ///
    /// If registration fails the server is stopped and the error returned.
    pub async fn start_with_listener(self, listener: TcpListener) -> Result<ServiceGuard> {
        let local_addr = listener.local_addr()?;
        let updates = self.client.routes(&self.registration.update_url)?;
        let app = self.routes.merge(updates);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let name = self.registration.service_name.clone();

        let handle = tokio::spawn(async move {
            let shutdown_fut = async move {
                let _ = shutdown_rx.recv().await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_fut)
                .await
            {
                error!(service = %name, "service server error: {e}");
            }
        });

        let mut guard = ServiceGuard {
            registration: self.registration,
            client: self.client,
            local_addr,
            shutdown_tx,
            handle: Some(handle),
            registered: false,
        };

        if let Err(e) = guard.client.register(&guard.registration).await {
            warn!(service = %guard.registration.service_name, error = %e, "registration failed, stopping");
            guard.stop().await;
            return Err(e);
        }
        guard.registered = true;

        info!(service = %guard.registration.service_name, %local_addr, "service started");
        Ok(guard)
    }
}

/// Guard for a running, registered service.
pub struct ServiceGuard {
    registration: Registration,
    client: DiscoveryClient,
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
    registered: bool,
}

impl ServiceGuard {
    /// Discovery client, for provider lookups.
    pub fn client(&self) -> &DiscoveryClient {
        &self.client
    }

    /// The registration this service was started with.
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Address the service is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Deregister, then stop serving.
    ///
    /// The server is stopped even if deregistration fails; that error is
    /// returned afterwards.
    pub async fn shutdown(mut self) -> Result<()> {
        let result = if self.registered {
            self.registered = false;
            self.client.deregister(&self.registration.service_url).await
        } else {
            Ok(())
        };
        self.stop().await;
        result
    }

    async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ServiceGuard {
    fn drop(&mut self) {
        if self.registered {
            warn!(
                url = %self.registration.service_url,
                "service dropped without shutdown, directory entry left behind"
            );
        }
        let _ = self.shutdown_tx.send(());
    }
}
