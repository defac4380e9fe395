//! URI → handler/provider resolution.
//!
//! [`ChainResolver`] implements the resolution algorithm once:
//!
//! 1. ask the optional upstream [`UriResolver`] for candidate URIs, falling
//!    back to the input URI when it yields none;
//! 2. run the [`Lookup`] hook on each candidate in order, the first hit wins
//!    and the caller's URI is replaced by that candidate;
//! 3. otherwise delegate the untouched URI to the fallback resolver, if any;
//! 4. otherwise report "not found" as `Ok(None)`.

use std::sync::Arc;

use courier_telemetry::{TelemetryLabels, record_counter};
use tracing::debug;
use url::Url;

use crate::errors::MsgError;
use crate::handler::Handler;
use crate::provider::Provider;
use crate::uri::UriResolver;

mod callback;
mod registry;

pub use callback::{CallbackLookup, CallbackResolver};
pub use registry::{RegistryResolver, SchemeRegistry};

pub type HandlerRef = Arc<dyn Handler>;
pub type ProviderRef = Arc<dyn Provider>;

/// Maps a URI to the handler or provider responsible for it.
///
/// Both methods may rewrite `uri`; callers must use the rewritten value with
/// the returned handler/provider.
pub trait Resolver: Send + Sync {
    fn resolve_handler(&self, uri: &mut Url) -> Result<Option<HandlerRef>, MsgError>;

    fn resolve_provider(&self, uri: &mut Url) -> Result<Option<ProviderRef>, MsgError>;
}

/// Per-candidate dispatch hook used by [`ChainResolver`].
///
/// A hook may normalize the candidate in place; the normalized value becomes
/// the caller's URI on a hit.
pub trait Lookup: Send + Sync {
    fn lookup_handler(&self, uri: &mut Url) -> Result<Option<HandlerRef>, MsgError>;

    fn lookup_provider(&self, uri: &mut Url) -> Result<Option<ProviderRef>, MsgError>;
}

/// Resolver combining a [`Lookup`] hook with optional URI rewriting and a
/// fallback resolver.
pub struct ChainResolver<L> {
    lookup: L,
    uri_resolver: Option<Arc<dyn UriResolver>>,
    fallback: Option<Arc<dyn Resolver>>,
}

impl<L: Lookup> ChainResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            uri_resolver: None,
            fallback: None,
        }
    }

    /// Consults `uri_resolver` for candidate URIs before running the hook.
    pub fn with_uri_resolver(mut self, uri_resolver: Arc<dyn UriResolver>) -> Self {
        self.uri_resolver = Some(uri_resolver);
        self
    }

    /// Delegates unresolved URIs to `fallback`.
    pub fn with_fallback(mut self, fallback: Arc<dyn Resolver>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    fn candidates(&self, uri: &Url) -> Result<Vec<Url>, MsgError> {
        let mut candidates = match &self.uri_resolver {
            Some(uri_resolver) => uri_resolver.resolve_uri(uri)?,
            None => Vec::new(),
        };
        if candidates.is_empty() {
            candidates.push(uri.clone());
        }
        Ok(candidates)
    }

    fn resolve_with<T, H, D>(
        &self,
        uri: &mut Url,
        operation: &'static str,
        hook: H,
        delegate: D,
    ) -> Result<Option<T>, MsgError>
    where
        H: Fn(&L, &mut Url) -> Result<Option<T>, MsgError>,
        D: Fn(&dyn Resolver, &mut Url) -> Result<Option<T>, MsgError>,
    {
        for mut candidate in self.candidates(uri)? {
            if let Some(found) = hook(&self.lookup, &mut candidate)? {
                if candidate != *uri {
                    debug!(from = %uri, to = %candidate, operation, "uri rewritten by resolution");
                }
                *uri = candidate;
                return Ok(Some(found));
            }
        }
        if let Some(fallback) = &self.fallback {
            return delegate(fallback.as_ref(), uri);
        }
        record_counter(
            "courier_resolve_miss_total",
            1,
            &TelemetryLabels::new(uri.scheme(), operation),
        );
        debug!(uri = %uri, operation, "no route for uri");
        Ok(None)
    }
}

impl<L: Lookup> Resolver for ChainResolver<L> {
    fn resolve_handler(&self, uri: &mut Url) -> Result<Option<HandlerRef>, MsgError> {
        self.resolve_with(
            uri,
            "resolve_handler",
            |lookup, candidate| lookup.lookup_handler(candidate),
            |fallback, uri| fallback.resolve_handler(uri),
        )
    }

    fn resolve_provider(&self, uri: &mut Url) -> Result<Option<ProviderRef>, MsgError> {
        self.resolve_with(
            uri,
            "resolve_provider",
            |lookup, candidate| lookup.lookup_provider(candidate),
            |fallback, uri| fallback.resolve_provider(uri),
        )
    }
}
