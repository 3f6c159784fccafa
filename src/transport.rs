//! Outbound HTTP used for registration calls and patch delivery.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, StatusCode, Uri};
use http_body_util::Full;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use tracing::trace;

use crate::config::HttpConfig;
use crate::{Error, Result};

/// Pooled HTTP/1 client. Cheap to clone.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client<HttpConnector, Full<Bytes>>,
    config: HttpConfig,
}

impl HttpClient {
    /// Create a client with the given settings.
    pub fn new(config: HttpConfig) -> Self {
        let inner = Client::builder(TokioExecutor::new()).build_http();
        Self { inner, config }
    }

    /// POST `body` as JSON and return the response status.
    pub async fn post_json<T: Serialize>(&self, url: &str, body: &T) -> Result<StatusCode> {
        let payload = serde_json::to_vec(body)?;
        self.send(Method::POST, url, "application/json", payload).await
    }

    /// DELETE with a plain-text body and return the response status.
    pub async fn delete_text(&self, url: &str, body: &str) -> Result<StatusCode> {
        self.send(Method::DELETE, url, "text/plain", body.as_bytes().to_vec())
            .await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        content_type: &'static str,
        payload: Vec<u8>,
    ) -> Result<StatusCode> {
        let uri: Uri = url.parse()?;
        let req = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(CONTENT_TYPE, content_type)
            .body(Full::new(Bytes::from(payload)))?;

        let res = tokio::time::timeout(self.config.request_timeout, self.inner.request(req))
            .await
            .map_err(|_| Error::Timeout(url.to_owned()))??;

        trace!(%method, url, status = %res.status(), "http response");
        Ok(res.status())
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(HttpConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_url() {
        let client = HttpClient::default();
        let err = client.delete_text("not a url", "x").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUri(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_client_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::default();
        let res = client.post_json(&format!("http://{addr}/services"), &"x").await;
        assert!(matches!(res, Err(Error::Client(_)) | Err(Error::Timeout(_))));
    }
}
