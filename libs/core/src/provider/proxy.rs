use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};
use url::Url;

use crate::errors::MsgError;
use crate::flags::{AckFlags, DiscardFlags, FetchFlags};
use crate::provider::{Delivery, Provider};
use crate::resolver::Resolver;
use crate::stash::{Stash, Token};

/// Receipt pointing back at the delegate that produced a message.
#[derive(Clone)]
pub struct DelegatedReceipt {
    pub provider: Arc<dyn Provider>,
    pub token: Token,
}

/// Provider that forwards every fetch to whatever provider the resolver
/// returns for the URI at call time.
///
/// The delegate is never cached; its receipt is kept in the proxy's own stash
/// so acknowledge/discard reach the provider that issued the message.
pub struct ProxyProvider {
    resolver: Arc<dyn Resolver>,
    stash: Mutex<Stash<DelegatedReceipt>>,
}

impl ProxyProvider {
    /// Creates a proxy whose orphaned receipts are requeued on their delegates at close.
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self::with_cleanup(resolver, requeue_orphans)
    }

    pub fn with_cleanup<C>(resolver: Arc<dyn Resolver>, cleanup: C) -> Self
    where
        C: FnOnce(HashMap<Token, DelegatedReceipt>) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            resolver,
            stash: Mutex::new(Stash::with_cleanup(cleanup)),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.stash().len()
    }

    fn stash(&self) -> MutexGuard<'_, Stash<DelegatedReceipt>> {
        self.stash
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Provider for ProxyProvider {
    fn fetch(&self, uri: &Url, flags: FetchFlags) -> Result<Option<Delivery>, MsgError> {
        if flags.is_confirm() {
            self.stash().ensure_open("fetch")?;
        }
        let mut target = uri.clone();
        let provider = self
            .resolver
            .resolve_provider(&mut target)?
            .ok_or_else(|| {
                MsgError::runtime("no_provider", format!("no provider found for {uri}"))
            })?;
        debug!(uri = %uri, target = %target, "proxy fetch resolved");
        let Some(delivery) = provider.fetch(&target, flags)? else {
            return Ok(None);
        };
        match delivery.token {
            Some(inner) => {
                let mut stash = self.stash();
                if let Err(err) = stash.ensure_open("fetch") {
                    drop(stash);
                    if let Err(requeue_err) = provider.discard(&inner, DiscardFlags::REQUEUE) {
                        warn!(
                            uri = %uri,
                            error = %requeue_err,
                            "failed to requeue delivery after close"
                        );
                    }
                    return Err(err);
                }
                let token = stash.store(DelegatedReceipt {
                    provider,
                    token: inner,
                });
                Ok(Some(Delivery::pending(delivery.message, token)))
            }
            None => Ok(Some(delivery)),
        }
    }

    fn acknowledge(&self, token: &Token, flags: AckFlags) -> Result<(), MsgError> {
        let receipt = self.stash().restore(token, "acknowledge")?;
        receipt.provider.acknowledge(&receipt.token, flags)
    }

    fn discard(&self, token: &Token, flags: DiscardFlags) -> Result<(), MsgError> {
        let receipt = self.stash().restore(token, "discard")?;
        receipt.provider.discard(&receipt.token, flags)
    }

    fn close(&self) {
        let mut stash = self.stash().detach();
        stash.close();
    }
}

fn requeue_orphans(pending: HashMap<Token, DelegatedReceipt>) -> anyhow::Result<()> {
    for (token, receipt) in pending {
        if let Err(err) = receipt
            .provider
            .discard(&receipt.token, DiscardFlags::REQUEUE)
        {
            warn!(token = %token, error = %err, "failed to requeue orphaned delivery");
        }
    }
    Ok(())
}
