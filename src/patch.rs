//! Delta format used to propagate topology changes to dependents.

use serde::{Deserialize, Serialize};

use crate::registration::{null_as_empty, Registration, ServiceName};

/// One provider instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchEntry {
    /// Service kind.
    #[serde(rename = "Name")]
    pub name: ServiceName,
    /// Instance address.
    #[serde(rename = "URL")]
    pub url: String,
}

impl PatchEntry {
    /// Create an entry.
    pub fn new(name: impl Into<ServiceName>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

impl From<&Registration> for PatchEntry {
    fn from(reg: &Registration) -> Self {
        Self {
            name: reg.service_name.clone(),
            url: reg.service_url.clone(),
        }
    }
}

/// Providers added and removed since the last patch.
///
/// Always a delta, except the first patch a new instance receives, which
/// lists every matching provider as added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Providers that joined.
    #[serde(rename = "Added", default, deserialize_with = "null_as_empty")]
    pub added: Vec<PatchEntry>,
    /// Providers that left.
    #[serde(rename = "Removed", default, deserialize_with = "null_as_empty")]
    pub removed: Vec<PatchEntry>,
}

impl Patch {
    /// Added-only patch.
    pub fn added(entries: impl IntoIterator<Item = PatchEntry>) -> Self {
        Self {
            added: entries.into_iter().collect(),
            removed: Vec::new(),
        }
    }

    /// Removed-only patch.
    pub fn removed(entries: impl IntoIterator<Item = PatchEntry>) -> Self {
        Self {
            added: Vec::new(),
            removed: entries.into_iter().collect(),
        }
    }

    /// True if the patch carries no entries.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Narrow this patch to the entries a dependent declared.
    ///
    /// Returns `None` when nothing is relevant to it.
    pub fn filter_for(&self, dependent: &Registration) -> Option<Patch> {
        let relevant = |e: &&PatchEntry| dependent.requires(&e.name);
        let patch = Patch {
            added: self.added.iter().filter(relevant).cloned().collect(),
            removed: self.removed.iter().filter(relevant).cloned().collect(),
        };
        (!patch.is_empty()).then_some(patch)
    }
}
