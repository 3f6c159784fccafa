//! Patch delivery to dependents.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::StatusCode;
use tracing::debug;

use crate::patch::Patch;
use crate::transport::HttpClient;
use crate::{Error, Result};

/// Pushes a patch to a dependent's update callback.
///
/// One call is one attempt; callers never retry.
pub trait PatchSender: Send + Sync + 'static {
    /// Deliver `patch` to `url`.
    fn send<'a>(&'a self, url: &'a str, patch: &'a Patch) -> BoxFuture<'a, Result<()>>;
}

/// Delivers patches as JSON over HTTP POST; anything but 200 is a failure.
#[derive(Clone, Debug, Default)]
pub struct HttpPatchSender {
    client: HttpClient,
}

impl HttpPatchSender {
    /// Create a sender on top of an HTTP client.
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl PatchSender for HttpPatchSender {
    fn send<'a>(&'a self, url: &'a str, patch: &'a Patch) -> BoxFuture<'a, Result<()>> {
        async move {
            let status = self
                .client
                .post_json(url, patch)
                .await
                .map_err(|e| Error::delivery(url, e))?;
            if status != StatusCode::OK {
                return Err(Error::delivery(url, format!("dependent responded with code {status}")));
            }
            debug!(url, "patch delivered");
            Ok(())
        }
        .boxed()
    }
}

/// A delivery that failed and was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Update callback URL of the dependent.
    pub target: String,
    /// The patch that was not delivered.
    pub patch: Patch,
    /// Why it failed.
    pub reason: String,
}
