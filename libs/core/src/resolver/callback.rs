use std::sync::Arc;

use url::Url;

use crate::errors::MsgError;
use crate::resolver::{ChainResolver, HandlerRef, Lookup, ProviderRef, Resolver};

type ResolverFn = Arc<dyn Fn(&Url) -> anyhow::Result<Option<Arc<dyn Resolver>>> + Send + Sync>;

/// Resolver whose lookups go through a [`CallbackLookup`].
pub type CallbackResolver = ChainResolver<CallbackLookup>;

/// Lookup hook that asks a user callback which resolver owns a URI and
/// delegates to it.
///
/// A callback that fails with something other than a [`MsgError`], or that
/// returns no resolver at all, yields a runtime error.
#[derive(Clone)]
pub struct CallbackLookup {
    callback: ResolverFn,
}

impl CallbackLookup {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Url) -> anyhow::Result<Option<Arc<dyn Resolver>>> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    fn resolver_for(&self, uri: &Url) -> Result<Arc<dyn Resolver>, MsgError> {
        (self.callback)(uri)
            .map_err(|err| MsgError::wrap("resolver_callback", err))?
            .ok_or_else(|| {
                MsgError::runtime(
                    "resolver_callback",
                    format!("resolver callback returned no resolver for {uri}"),
                )
            })
    }
}

impl Lookup for CallbackLookup {
    fn lookup_handler(&self, uri: &mut Url) -> Result<Option<HandlerRef>, MsgError> {
        self.resolver_for(uri)?.resolve_handler(uri)
    }

    fn lookup_provider(&self, uri: &mut Url) -> Result<Option<ProviderRef>, MsgError> {
        self.resolver_for(uri)?.resolve_provider(uri)
    }
}
