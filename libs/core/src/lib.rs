//! Courier core contracts and value types.
//!
//! Handlers consume pushed messages, providers yield pulled messages with an
//! optional deferred-confirmation protocol, and resolvers map a message URI to
//! the handler or provider that owns it. Backends (in-memory callbacks,
//! external brokers, proxies) all plug in behind the same three traits.
pub mod broker;
pub mod config;
pub mod errors;
pub mod flags;
pub mod handler;
pub mod message;
pub mod provider;
pub mod resolver;
pub mod stash;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod uri;

pub use broker::{Broker, MessageBroker};
pub use config::{ConfigError, ROUTES_PATH_ENV, RoutingConfig};
pub use errors::{ErrorKind, MsgError};
pub use flags::{AckFlags, DiscardFlags, FetchFlags};
pub use handler::{CallbackHandler, Handler, LogHandler, RecordHandler};
pub use message::{DEFAULT_CONTENT_TYPE, JSON_CONTENT_TYPE, Message};
pub use provider::{
    CallbackProvider, DelegatedReceipt, Delivery, PendingMessage, Provider, ProxyProvider,
};
pub use resolver::{
    CallbackLookup, CallbackResolver, ChainResolver, HandlerRef, Lookup, ProviderRef,
    RegistryResolver, Resolver, SchemeRegistry,
};
pub use stash::{CleanupFn, Stash, Token};
pub use uri::{AliasUriResolver, UriResolver, parse_uri};

/// Re-exported so integrators name URIs with the same type the traits use.
pub use url::Url;
