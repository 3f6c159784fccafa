//! The directory: authoritative set of live registrations.
//!
//! Every mutation computes the patches it owes to dependents inside the same
//! write section that changes the list, so no dependent is missed or told
//! twice when adds and removes interleave. Delivery happens after the lock is
//! released, one task per dependent.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::delivery::{DeliveryFailure, HttpPatchSender, PatchSender};
use crate::patch::{Patch, PatchEntry};
use crate::registration::{Registration, ServiceName};
use crate::transport::HttpClient;
use crate::{Error, Result};

/// A patch owed to one dependent.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Delivery {
    target: String,
    patch: Patch,
}

/// Registry of live service instances.
pub struct Directory {
    registrations: RwLock<Vec<Registration>>,
    sender: Arc<dyn PatchSender>,
    failures: broadcast::Sender<DeliveryFailure>,
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("registrations", &self.registrations.read().len())
            .field("sender", &"<dyn PatchSender>")
            .finish()
    }
}

impl Directory {
    /// Create a directory that delivers patches through `sender`.
    pub fn new(sender: Arc<dyn PatchSender>) -> Self {
        let (failures, _) = broadcast::channel(128);
        Self {
            registrations: RwLock::new(Vec::new()),
            sender,
            failures,
        }
    }

    /// Create a directory that delivers patches over HTTP.
    pub fn with_http(config: HttpConfig) -> Self {
        Self::new(Arc::new(HttpPatchSender::new(HttpClient::new(config))))
    }

    /// Register a new instance.
    ///
    /// Dependents already live are told about the newcomer in the background.
    /// The newcomer itself gets a snapshot of its current providers before
    /// this returns; if that delivery fails the error is returned, but the
    /// registration stays.
    pub async fn add(&self, reg: Registration) -> Result<()> {
        reg.validate()?;

        let (initial, deliveries) = {
            let mut regs = self.registrations.write();
            if regs.iter().any(|r| r.service_url == reg.service_url) {
                return Err(Error::Duplicate(reg.service_url));
            }

            let initial = Patch::added(
                regs.iter()
                    .filter(|r| reg.requires(&r.service_name))
                    .map(PatchEntry::from),
            );
            let deliveries = deliveries_for(&regs, &Patch::added([PatchEntry::from(&reg)]));

            regs.push(reg.clone());
            (initial, deliveries)
        };

        info!(
            service = %reg.service_name,
            url = %reg.service_url,
            dependents = deliveries.len(),
            "added service"
        );
        self.dispatch(deliveries);

        // Newcomers without dependencies have nothing to sync and may not
        // expose an update endpoint at all.
        if reg.required_services.is_empty() {
            return Ok(());
        }

        debug!(
            url = %reg.update_url,
            providers = initial.added.len(),
            "sending initial providers"
        );
        if let Err(err) = self.sender.send(&reg.update_url, &initial).await {
            self.report(&reg.update_url, initial, &err);
            return Err(err);
        }
        Ok(())
    }

    /// Remove the instance at `url` and tell its dependents in the background.
    pub fn remove(&self, url: &str) -> Result<()> {
        let (removed, deliveries) = {
            let mut regs = self.registrations.write();
            let Some(removed) = regs.iter().find(|r| r.service_url == url).cloned() else {
                return Err(Error::NotFound(url.to_owned()));
            };
            regs.retain(|r| r.service_url != url);

            let deliveries = deliveries_for(&regs, &Patch::removed([PatchEntry::from(&removed)]));
            (removed, deliveries)
        };

        info!(
            service = %removed.service_name,
            url,
            dependents = deliveries.len(),
            "removed service"
        );
        self.dispatch(deliveries);
        Ok(())
    }

    /// Snapshot of the live registrations, in registration order.
    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.read().clone()
    }

    /// URLs of every live instance of `name`.
    pub fn instances_of(&self, name: &ServiceName) -> Vec<String> {
        self.registrations
            .read()
            .iter()
            .filter(|r| r.service_name == *name)
            .map(|r| r.service_url.clone())
            .collect()
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }

    /// Stream of deliveries that failed from now on.
    ///
    /// A slow subscriber misses failures instead of blocking delivery.
    pub fn delivery_failures(&self) -> impl Stream<Item = DeliveryFailure> {
        BroadcastStream::new(self.failures.subscribe()).filter_map(|msg| async move { msg.ok() })
    }

    fn dispatch(&self, deliveries: Vec<Delivery>) {
        for Delivery { target, patch } in deliveries {
            let sender = Arc::clone(&self.sender);
            let failures = self.failures.clone();
            tokio::spawn(async move {
                if let Err(err) = sender.send(&target, &patch).await {
                    warn!(dependent = %target, error = %err, "dropping patch");
                    let _ = failures.send(DeliveryFailure {
                        target,
                        patch,
                        reason: err.to_string(),
                    });
                }
            });
        }
    }

    fn report(&self, target: &str, patch: Patch, err: &Error) {
        warn!(dependent = target, error = %err, "initial provider sync failed");
        let _ = self.failures.send(DeliveryFailure {
            target: target.to_owned(),
            patch,
            reason: err.to_string(),
        });
    }
}

/// Every live registration that depends on something in `event`, with the
/// part of `event` it cares about.
fn deliveries_for(regs: &[Registration], event: &Patch) -> Vec<Delivery> {
    regs.iter()
        .filter(|r| !r.update_url.is_empty())
        .filter_map(|r| {
            event.filter_for(r).map(|patch| Delivery {
                target: r.update_url.clone(),
                patch,
            })
        })
        .collect()
}
