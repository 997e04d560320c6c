use super::platforms::{GenericAdapter, SITE_PROFILES, SiteAdapter};
use super::PlatformAdapter;
use std::sync::Arc;
use url::Url;

type Predicate = Box<dyn Fn(&Url) -> bool + Send + Sync>;

struct Entry {
    predicate: Predicate,
    adapter: Arc<dyn PlatformAdapter>,
}

/// Ordered `{predicate, adapter}` list; the first matching predicate wins.
#[derive(Default)]
pub struct AdapterRegistry {
    entries: Vec<Entry>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every bundled site in table order, then the generic fallback.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for profile in SITE_PROFILES {
            registry.register(Arc::new(SiteAdapter::new(profile)));
        }
        registry.register(Arc::new(GenericAdapter));
        registry
    }

    /// Register an adapter using its own `detect` as the predicate.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        let detector = adapter.clone();
        self.entries.push(Entry {
            predicate: Box::new(move |url| detector.detect(url)),
            adapter,
        });
    }

    /// Register an adapter behind a custom predicate. Inserted ahead of all
    /// existing entries so it can override bundled sites.
    pub fn register_first<F>(&mut self, predicate: F, adapter: Arc<dyn PlatformAdapter>)
    where
        F: Fn(&Url) -> bool + Send + Sync + 'static,
    {
        self.entries.insert(
            0,
            Entry {
                predicate: Box::new(predicate),
                adapter,
            },
        );
    }

    pub fn detect(&self, url: &Url) -> Option<Arc<dyn PlatformAdapter>> {
        self.entries
            .iter()
            .find(|entry| (entry.predicate)(url))
            .map(|entry| entry.adapter.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
