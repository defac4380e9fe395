use std::sync::Arc;

use courier_core::{ChainResolver, HandlerRef, Lookup, MsgError, Provider, ProviderRef, Url};
use dashmap::DashMap;
use tracing::debug;

use crate::config::BusConfig;
use crate::endpoint::{BrokerEndpoint, ROUTING_KEY_PARAM, query_param};
use crate::handler::BrokerHandler;
use crate::provider::BrokerProvider;
use crate::transport::{self, Connector};

/// Resolver answering for one broker scheme.
pub type BrokerResolver = ChainResolver<BrokerLookup>;

/// Memoization key: the serialized URI plus its routing key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub uri: String,
    pub routing_key: Option<String>,
}

impl EndpointKey {
    pub fn of(uri: &Url) -> Self {
        Self {
            uri: uri.as_str().to_string(),
            routing_key: query_param(uri, ROUTING_KEY_PARAM),
        }
    }
}

/// Lookup hook building broker handlers and providers on first use.
///
/// Instances are memoized per [`EndpointKey`] until evicted. Evicted and
/// cleared providers are closed.
pub struct BrokerLookup {
    scheme: String,
    connector: Arc<dyn Connector>,
    handlers: DashMap<EndpointKey, Arc<BrokerHandler>>,
    providers: DashMap<EndpointKey, Arc<BrokerProvider>>,
}

impl BrokerLookup {
    pub fn new(scheme: &str, connector: Arc<dyn Connector>) -> Self {
        Self {
            scheme: scheme.trim().to_ascii_lowercase(),
            connector,
            handlers: DashMap::new(),
            providers: DashMap::new(),
        }
    }

    pub fn from_config(config: &BusConfig, connector: Arc<dyn Connector>) -> Self {
        Self::new(&config.scheme, connector)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Drops the memoized handler and provider for `uri`.
    pub fn evict(&self, uri: &Url) {
        let key = EndpointKey::of(uri);
        self.handlers.remove(&key);
        if let Some((_, provider)) = self.providers.remove(&key) {
            provider.close();
        }
    }

    pub fn clear(&self) {
        self.handlers.clear();
        let keys: Vec<EndpointKey> = self.providers.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, provider)) = self.providers.remove(&key) {
                provider.close();
            }
        }
    }

    fn endpoint(&self, uri: &Url) -> Result<Option<(EndpointKey, BrokerEndpoint)>, MsgError> {
        if uri.scheme() != self.scheme {
            return Ok(None);
        }
        Ok(Some((EndpointKey::of(uri), BrokerEndpoint::parse(uri)?)))
    }
}

impl Lookup for BrokerLookup {
    fn lookup_handler(&self, uri: &mut Url) -> Result<Option<HandlerRef>, MsgError> {
        let Some((key, endpoint)) = self.endpoint(uri)? else {
            return Ok(None);
        };
        if let Some(found) = self.handlers.get(&key) {
            return Ok(Some(Arc::clone(found.value()) as HandlerRef));
        }
        let connection = transport::open(self.connector.as_ref(), &endpoint)?;
        debug!(uri = %uri, "broker handler created");
        let handler = Arc::clone(
            self.handlers
                .entry(key)
                .or_insert_with(|| Arc::new(BrokerHandler::new(endpoint, connection)))
                .value(),
        );
        Ok(Some(handler as HandlerRef))
    }

    fn lookup_provider(&self, uri: &mut Url) -> Result<Option<ProviderRef>, MsgError> {
        let Some((key, endpoint)) = self.endpoint(uri)? else {
            return Ok(None);
        };
        if let Some(found) = self.providers.get(&key) {
            return Ok(Some(Arc::clone(found.value()) as ProviderRef));
        }
        let connection = transport::open(self.connector.as_ref(), &endpoint)?;
        debug!(uri = %uri, "broker provider created");
        let provider = Arc::clone(
            self.providers
                .entry(key)
                .or_insert_with(|| Arc::new(BrokerProvider::new(endpoint, connection)))
                .value(),
        );
        Ok(Some(provider as ProviderRef))
    }
}
