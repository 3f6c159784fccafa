//! Registration-side client for the directory.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::patch::Patch;
use crate::providers::ProviderCache;
use crate::registration::{Registration, ServiceName};
use crate::transport::HttpClient;
use crate::{Error, Result};

/// Talks to the directory on behalf of one service process and keeps its
/// provider cache up to date.
///
/// Mount [`routes()`](DiscoveryClient::routes) on the service's listener
/// before calling [`register()`](DiscoveryClient::register): the directory
/// pushes the initial provider list while registration is in flight.
#[derive(Clone, Debug)]
pub struct DiscoveryClient {
    directory_url: String,
    http: HttpClient,
    providers: Arc<ProviderCache>,
}

impl DiscoveryClient {
    /// Create a client with an empty provider cache.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            directory_url: config.directory_url,
            http: HttpClient::new(config.http),
            providers: Arc::new(ProviderCache::new()),
        }
    }

    /// The local provider cache.
    pub fn providers(&self) -> &Arc<ProviderCache> {
        &self.providers
    }

    /// Router accepting patches with `POST` on the path of `update_url`.
    ///
    /// Holds a single explicit route, so it merges with application routers
    /// that carry their own fallback. An empty `update_url` yields an empty
    /// router.
    pub fn routes(&self, update_url: &str) -> Result<Router> {
        if update_url.is_empty() {
            return Ok(Router::new());
        }
        let uri: Uri = update_url.parse()?;
        debug!(path = uri.path(), "mounting update handler");
        Ok(Router::new()
            .route(uri.path(), post(receive_patch))
            .with_state(self.clone()))
    }

    /// Register with the directory. Anything but 200 is an error.
    pub async fn register(&self, reg: &Registration) -> Result<()> {
        let status = self.http.post_json(&self.directory_url, reg).await?;
        if status != StatusCode::OK {
            return Err(Error::Rejected {
                operation: "register",
                status,
            });
        }
        info!(service = %reg.service_name, url = %reg.service_url, "registered with directory");
        Ok(())
    }

    /// Ask the directory to drop the instance at `url`. Not retried.
    pub async fn deregister(&self, url: &str) -> Result<()> {
        let status = self.http.delete_text(&self.directory_url, url).await?;
        if status != StatusCode::OK {
            return Err(Error::Rejected {
                operation: "deregister",
                status,
            });
        }
        info!(url, "deregistered from directory");
        Ok(())
    }

    /// Pick a provider of `name` from the local cache.
    pub fn get_provider(&self, name: &ServiceName) -> Result<String> {
        self.providers.lookup(name)
    }
}

async fn receive_patch(State(client): State<DiscoveryClient>, body: axum::body::Bytes) -> StatusCode {
    let Ok(Json(patch)) = Json::<Patch>::from_bytes(&body) else {
        return StatusCode::BAD_REQUEST;
    };
    debug!(?patch, "update received");
    client.providers.apply(&patch);
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::patch::PatchEntry;

    const UPDATE_URL: &str = "http://127.0.0.1:6000/services";

    fn request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn applies_pushed_patches() {
        let client = DiscoveryClient::new(ClientConfig::default());
        let body = serde_json::to_string(&Patch::added([PatchEntry::new("LogService", "http://l")])).unwrap();

        let res = client
            .routes(UPDATE_URL)
            .unwrap()
            .oneshot(request("POST", "/services", &body))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(client.get_provider(&ServiceName::from("LogService")).unwrap(), "http://l");
    }

    #[tokio::test]
    async fn rejects_unknown_paths_and_bad_input() {
        let client = DiscoveryClient::new(ClientConfig::default());
        let app = client.routes(UPDATE_URL).unwrap();

        let res = app.clone().oneshot(request("POST", "/other", "{}")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app.clone().oneshot(request("GET", "/services", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

        let res = app.oneshot(request("POST", "/services", "not json")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn merges_with_application_fallback() {
        let client = DiscoveryClient::new(ClientConfig::default());
        let app = Router::new()
            .route("/hello", axum::routing::get(|| async { "hi" }))
            .fallback(|| async { (StatusCode::IM_A_TEAPOT, "nothing here") })
            .merge(client.routes(UPDATE_URL).unwrap());

        let res = app.clone().oneshot(request("GET", "/hello", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app.clone().oneshot(request("GET", "/missing", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);

        let res = app.oneshot(request("POST", "/services", r#"{"Added":null,"Removed":null}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn empty_update_url_mounts_nothing() {
        let client = DiscoveryClient::new(ClientConfig::default());
        assert!(client.routes("").is_ok());
        assert!(client.routes("http://bad host/x").is_err());
    }

    #[tokio::test]
    async fn unreachable_directory_fails_registration() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = DiscoveryClient::new(ClientConfig::default().directory_url(format!("http://{addr}/services")));
        let reg = Registration::new("A", "http://a", "http://a/services");

        assert!(client.register(&reg).await.is_err());
    }
}
