use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use courier_core::{
    AckFlags, Delivery, DiscardFlags, FetchFlags, MsgError, Provider, Stash, Token, Url,
};
use courier_telemetry::{TelemetryLabels, record_counter};
use tracing::{debug, warn};

use crate::endpoint::BrokerEndpoint;
use crate::link::Link;
use crate::transport::{Connection, DeliveryTag};

/// Provider pulling from the endpoint's queue.
///
/// Plain fetches are acknowledged before returning. Confirm-mode fetches keep
/// the delivery tag in a stash until `acknowledge` or `discard`; tags still
/// pending at `close` are nacked with requeue unless another cleanup is given.
pub struct BrokerProvider {
    link: Arc<Link>,
    stash: Mutex<Stash<DeliveryTag>>,
}

impl BrokerProvider {
    pub fn new(endpoint: BrokerEndpoint, connection: Box<dyn Connection>) -> Self {
        let link = Arc::new(Link::new(endpoint, connection));
        let cleanup_link = Arc::clone(&link);
        Self {
            link,
            stash: Mutex::new(Stash::with_cleanup(move |pending| {
                requeue_orphans(&cleanup_link, pending)
            })),
        }
    }

    pub fn with_cleanup<C>(
        endpoint: BrokerEndpoint,
        connection: Box<dyn Connection>,
        cleanup: C,
    ) -> Self
    where
        C: FnOnce(HashMap<Token, DeliveryTag>) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            link: Arc::new(Link::new(endpoint, connection)),
            stash: Mutex::new(Stash::with_cleanup(cleanup)),
        }
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        self.link.endpoint()
    }

    pub fn pending_len(&self) -> usize {
        self.stash().len()
    }

    fn stash(&self) -> MutexGuard<'_, Stash<DeliveryTag>> {
        self.stash
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Provider for BrokerProvider {
    fn fetch(&self, uri: &Url, flags: FetchFlags) -> Result<Option<Delivery>, MsgError> {
        if flags.is_confirm() {
            self.stash().ensure_open("fetch")?;
        }
        let Some(received) = self.link.get()? else {
            return Ok(None);
        };
        record_counter(
            "courier_fetch_total",
            1,
            &TelemetryLabels::new(uri.scheme(), "fetch"),
        );
        if !flags.is_confirm() {
            if let Err(err) = self.link.ack(received.tag) {
                self.requeue_after_failure(received.tag, "fetch");
                return Err(err);
            }
            return Ok(Some(Delivery::committed(received.message)));
        }
        let token = {
            let mut stash = self.stash();
            match stash.ensure_open("fetch") {
                Ok(()) => stash.store(received.tag),
                Err(err) => {
                    drop(stash);
                    self.requeue_after_failure(received.tag, "fetch");
                    return Err(err);
                }
            }
        };
        debug!(uri = %uri, token = %token, tag = received.tag.0, "delivery held for confirmation");
        Ok(Some(Delivery::pending(received.message, token)))
    }

    fn acknowledge(&self, token: &Token, _flags: AckFlags) -> Result<(), MsgError> {
        let tag = self.stash().restore(token, "acknowledge")?;
        if let Err(err) = self.link.ack(tag) {
            if !self.requeue_after_failure(tag, "acknowledge") {
                self.stash().reinstate(token.clone(), tag);
            }
            return Err(err);
        }
        record_counter(
            "courier_ack_total",
            1,
            &TelemetryLabels::new(self.link.endpoint().scheme.as_str(), "acknowledge"),
        );
        Ok(())
    }

    fn discard(&self, token: &Token, flags: DiscardFlags) -> Result<(), MsgError> {
        let tag = self.stash().restore(token, "discard")?;
        if let Err(err) = self.link.nack(tag, flags.is_requeue()) {
            warn!(
                token = %token,
                tag = tag.0,
                error = %err,
                "discard failed; token kept for retry"
            );
            self.stash().reinstate(token.clone(), tag);
            return Err(err);
        }
        record_counter(
            "courier_discard_total",
            1,
            &TelemetryLabels::new(self.link.endpoint().scheme.as_str(), "discard"),
        );
        Ok(())
    }

    fn close(&self) {
        let mut stash = self.stash().detach();
        stash.close();
    }
}

impl BrokerProvider {
    /// Hands a delivery the caller never received back to the queue.
    ///
    /// Returns `false` when the broker refused, leaving the tag unacked.
    fn requeue_after_failure(&self, tag: DeliveryTag, operation: &'static str) -> bool {
        match self.link.nack(tag, true) {
            Ok(()) => {
                debug!(operation, tag = tag.0, "delivery requeued after failure");
                true
            }
            Err(err) => {
                warn!(
                    operation,
                    tag = tag.0,
                    error = %err,
                    "failed to requeue delivery after failure"
                );
                false
            }
        }
    }
}

fn requeue_orphans(link: &Link, pending: HashMap<Token, DeliveryTag>) -> anyhow::Result<()> {
    record_counter(
        "courier_stash_orphans_total",
        pending.len() as u64,
        &TelemetryLabels::new(link.endpoint().scheme.as_str(), "close"),
    );
    for (token, tag) in pending {
        if let Err(err) = link.nack(tag, true) {
            warn!(
                token = %token,
                tag = tag.0,
                error = %err,
                "failed to requeue unconfirmed delivery"
            );
        }
    }
    Ok(())
}
