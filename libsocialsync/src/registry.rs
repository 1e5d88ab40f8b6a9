//! Adapter registry: platform identifier → adapter

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{PlatformError, Result};
use crate::http::ApiClient;
use crate::platforms::bluesky::BlueskyAdapter;
use crate::platforms::mastodon::MastodonAdapter;
use crate::platforms::pixelfed::PixelfedAdapter;
use crate::platforms::threads::ThreadsAdapter;
use crate::platforms::Adapter;

/// Lookup table of adapters, keyed by [`Adapter::platform`].
///
/// New networks are supported by registering another adapter; the engine
/// never branches on platform names.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the Mastodon, Pixelfed, Bluesky and Threads
    /// adapters, sharing one HTTP client.
    pub fn with_defaults(config: &Config) -> Result<Self> {
        let client = ApiClient::new(&config.engine)?;
        let endpoints = &config.endpoints;

        let mut registry = Self::new();
        registry.register(Arc::new(MastodonAdapter::new(client.clone())));
        registry.register(Arc::new(PixelfedAdapter::new(
            client.clone(),
            endpoints.pixelfed_default_instance.clone(),
        )));
        registry.register(Arc::new(BlueskyAdapter::new(
            client.clone(),
            &endpoints.bluesky_service,
            &endpoints.bluesky_app,
        )));
        registry.register(Arc::new(ThreadsAdapter::new(
            client,
            &endpoints.threads_graph,
            &endpoints.threads_web,
        )));

        Ok(registry)
    }

    /// Register an adapter, replacing any adapter with the same identifier.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> &mut Self {
        let platform = adapter.platform().to_string();
        if self.adapters.insert(platform.clone(), adapter).is_some() {
            tracing::debug!("Replaced adapter for platform {}", platform);
        }
        self
    }

    pub fn get(&self, platform: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(platform).cloned()
    }

    /// Like [`AdapterRegistry::get`], but an unknown identifier is an
    /// `UnsupportedPlatform` error.
    pub fn resolve(&self, platform: &str) -> std::result::Result<Arc<dyn Adapter>, PlatformError> {
        self.get(platform)
            .ok_or_else(|| PlatformError::UnsupportedPlatform(platform.to_string()))
    }

    pub fn contains(&self, platform: &str) -> bool {
        self.adapters.contains_key(platform)
    }

    /// Registered identifiers, sorted
    pub fn platforms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockAdapter;

    #[test]
    fn test_defaults_register_four_platforms() {
        let registry = AdapterRegistry::with_defaults(&Config::default()).unwrap();
        assert_eq!(
            registry.platforms(),
            vec!["bluesky", "mastodon", "pixelfed", "threads"]
        );
    }

    #[test]
    fn test_unknown_platform_is_unsupported() {
        let registry = AdapterRegistry::with_defaults(&Config::default()).unwrap();
        match registry.resolve("myspace") {
            Err(PlatformError::UnsupportedPlatform(name)) => assert_eq!(name, "myspace"),
            _ => panic!("Expected UnsupportedPlatform"),
        }
        assert!(!registry.contains("myspace"));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let registry = AdapterRegistry::with_defaults(&Config::default()).unwrap();
        assert!(registry.get("mastodon").is_some());
        assert!(registry.get("Mastodon").is_none());
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = AdapterRegistry::with_defaults(&Config::default()).unwrap();
        let mock = MockAdapter::success("mastodon");
        let calls = mock.calls();
        registry.register(Arc::new(mock));

        assert_eq!(registry.platforms().len(), 4);
        let adapter = registry.get("mastodon").unwrap();
        assert_eq!(adapter.platform(), "mastodon");
        assert_eq!(calls.post_count(), 0);
    }

    #[test]
    fn test_register_chains() {
        let mut registry = AdapterRegistry::new();
        registry
            .register(Arc::new(MockAdapter::success("a")))
            .register(Arc::new(MockAdapter::success("b")));
        assert_eq!(registry.platforms(), vec!["a", "b"]);
    }
}
