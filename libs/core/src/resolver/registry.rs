use std::sync::Arc;

use dashmap::DashMap;
use url::Url;

use crate::errors::MsgError;
use crate::handler::Handler;
use crate::provider::Provider;
use crate::resolver::{ChainResolver, HandlerRef, Lookup, ProviderRef};

/// Resolver backed by a [`SchemeRegistry`].
pub type RegistryResolver = ChainResolver<SchemeRegistry>;

/// Thread-safe `scheme -> handler` / `scheme -> provider` maps.
///
/// Schemes are matched case-insensitively.
///
/// ```
/// use std::sync::Arc;
/// use courier_core::{LogHandler, RegistryResolver, Resolver, SchemeRegistry};
/// use url::Url;
///
/// let registry = SchemeRegistry::new().with_handler("LOG", Arc::new(LogHandler::default()));
/// let resolver = RegistryResolver::new(registry);
/// let mut uri = Url::parse("log://audit").unwrap();
/// assert!(resolver.resolve_handler(&mut uri).unwrap().is_some());
/// assert!(resolver.resolve_provider(&mut uri).unwrap().is_none());
/// ```
#[derive(Default)]
pub struct SchemeRegistry {
    handlers: DashMap<String, HandlerRef>,
    providers: DashMap<String, ProviderRef>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(self, scheme: &str, handler: Arc<dyn Handler>) -> Self {
        self.register_handler(scheme, handler);
        self
    }

    pub fn with_provider(self, scheme: &str, provider: Arc<dyn Provider>) -> Self {
        self.register_provider(scheme, provider);
        self
    }

    /// Registers `handler` for `scheme`, returning the handler it replaced.
    pub fn register_handler(&self, scheme: &str, handler: Arc<dyn Handler>) -> Option<HandlerRef> {
        self.handlers.insert(normalize(scheme), handler)
    }

    /// Registers `provider` for `scheme`, returning the provider it replaced.
    pub fn register_provider(
        &self,
        scheme: &str,
        provider: Arc<dyn Provider>,
    ) -> Option<ProviderRef> {
        self.providers.insert(normalize(scheme), provider)
    }

    pub fn handler(&self, scheme: &str) -> Option<HandlerRef> {
        self.handlers
            .get(&normalize(scheme))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn provider(&self, scheme: &str) -> Option<ProviderRef> {
        self.providers
            .get(&normalize(scheme))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove_handler(&self, scheme: &str) -> Option<HandlerRef> {
        self.handlers.remove(&normalize(scheme)).map(|(_, handler)| handler)
    }

    pub fn remove_provider(&self, scheme: &str) -> Option<ProviderRef> {
        self.providers
            .remove(&normalize(scheme))
            .map(|(_, provider)| provider)
    }

    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self
            .handlers
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.providers.iter().map(|entry| entry.key().clone()))
            .collect();
        schemes.sort();
        schemes.dedup();
        schemes
    }
}

impl Lookup for SchemeRegistry {
    fn lookup_handler(&self, uri: &mut Url) -> Result<Option<HandlerRef>, MsgError> {
        Ok(self.handler(uri.scheme()))
    }

    fn lookup_provider(&self, uri: &mut Url) -> Result<Option<ProviderRef>, MsgError> {
        Ok(self.provider(uri.scheme()))
    }
}

fn normalize(scheme: &str) -> String {
    scheme.trim().to_ascii_lowercase()
}
