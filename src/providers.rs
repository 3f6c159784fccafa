//! Client-side cache of provider URLs per service name.

use std::collections::HashMap;

use parking_lot::RwLock;
use rand::Rng;
use tracing::debug;

use crate::patch::Patch;
use crate::registration::ServiceName;
use crate::{Error, Result};

/// Eventually-consistent view of the providers a service depends on.
///
/// Fed by patches pushed from the directory; never expires entries on its own.
#[derive(Debug, Default)]
pub struct ProviderCache {
    services: RwLock<HashMap<ServiceName, Vec<String>>>,
}

impl ProviderCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a patch: append every added URL, then drop the first exact
    /// match of every removed URL. Unknown removals are ignored.
    pub fn apply(&self, patch: &Patch) {
        let mut services = self.services.write();

        for entry in &patch.added {
            services
                .entry(entry.name.clone())
                .or_default()
                .push(entry.url.clone());
        }

        for entry in &patch.removed {
            let Some(urls) = services.get_mut(&entry.name) else {
                continue;
            };
            if let Some(pos) = urls.iter().position(|u| *u == entry.url) {
                urls.remove(pos);
            }
            if urls.is_empty() {
                services.remove(&entry.name);
            }
        }

        debug!(
            added = patch.added.len(),
            removed = patch.removed.len(),
            "applied provider patch"
        );
    }

    /// Pick one provider for `name`, uniformly at random.
    pub fn lookup(&self, name: &ServiceName) -> Result<String> {
        let services = self.services.read();
        match services.get(name) {
            Some(urls) if !urls.is_empty() => {
                let idx = rand::rng().random_range(0..urls.len());
                Ok(urls[idx].clone())
            }
            _ => Err(Error::NoProviders(name.clone())),
        }
    }

    /// Snapshot of every known provider for `name`.
    pub fn providers(&self, name: &ServiceName) -> Vec<String> {
        self.services.read().get(name).cloned().unwrap_or_default()
    }

    /// Service names with at least one provider.
    pub fn names(&self) -> Vec<ServiceName> {
        self.services.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::patch::PatchEntry;

    fn name(s: &str) -> ServiceName {
        ServiceName::from(s)
    }

    #[test]
    fn add_then_remove_leaves_nothing() {
        let cache = ProviderCache::new();
        cache.apply(&Patch::added([PatchEntry::new("X", "http://u1")]));
        assert_eq!(cache.lookup(&name("X")).unwrap(), "http://u1");

        cache.apply(&Patch::removed([PatchEntry::new("X", "http://u1")]));
        assert!(cache.providers(&name("X")).is_empty());
        assert!(cache.names().is_empty());

        let err = cache.lookup(&name("X")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn removal_drops_first_exact_match_only() {
        let cache = ProviderCache::new();
        cache.apply(&Patch::added([
            PatchEntry::new("X", "http://a"),
            PatchEntry::new("X", "http://b"),
            PatchEntry::new("X", "http://a"),
        ]));
        cache.apply(&Patch::removed([PatchEntry::new("X", "http://a")]));

        assert_eq!(cache.providers(&name("X")), vec!["http://b", "http://a"]);
    }

    #[test]
    fn unknown_removals_are_noops() {
        let cache = ProviderCache::new();
        cache.apply(&Patch::added([PatchEntry::new("X", "http://a")]));
        cache.apply(&Patch::removed([
            PatchEntry::new("X", "http://zzz"),
            PatchEntry::new("Y", "http://a"),
        ]));

        assert_eq!(cache.providers(&name("X")), vec!["http://a"]);
    }

    #[test]
    fn lookup_reaches_every_provider() {
        let cache = ProviderCache::new();
        let urls = ["http://a", "http://b", "http://c", "http://d"];
        cache.apply(&Patch::added(urls.iter().map(|u| PatchEntry::new("X", *u))));

        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            seen.insert(cache.lookup(&name("X")).unwrap());
        }
        assert_eq!(seen.len(), urls.len());
    }

    #[test]
    fn concurrent_apply_and_lookup() {
        let cache = Arc::new(ProviderCache::new());
        let workers: Vec<_> = (0..8)
            .map(|w| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let url = format!("http://w{w}-{i}");
                        cache.apply(&Patch::added([PatchEntry::new("X", url.clone())]));
                        let _ = cache.lookup(&name("X"));
                        if i % 2 == 0 {
                            cache.apply(&Patch::removed([PatchEntry::new("X", url)]));
                        }
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(cache.providers(&name("X")).len(), 8 * 100);
    }
}
