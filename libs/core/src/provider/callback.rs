use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use courier_telemetry::{TelemetryLabels, record_counter};
use tracing::{info, warn};
use url::Url;

use crate::errors::MsgError;
use crate::flags::{AckFlags, DiscardFlags, FetchFlags};
use crate::message::Message;
use crate::provider::{Delivery, Provider};
use crate::stash::{Stash, Token};

type FetchFn = Arc<dyn Fn(&Url) -> anyhow::Result<Option<Message>> + Send + Sync>;

/// Receipt kept for a message fetched in confirm mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMessage {
    pub uri: Url,
    pub message: Message,
}

struct State {
    stash: Stash<PendingMessage>,
    requeued: HashMap<Url, VecDeque<Message>>,
}

/// In-memory provider pulling messages from a user callback.
///
/// Discarding with [`DiscardFlags::REQUEUE`] parks the message in a per-URI
/// FIFO that is drained before the callback is asked again. Messages still
/// parked at [`Provider::close`] go through the same cleanup path as
/// unconfirmed receipts.
///
/// ```
/// use courier_core::{CallbackProvider, FetchFlags, Message, Provider};
/// use url::Url;
///
/// let provider = CallbackProvider::new(|_uri| Ok(Some(Message::new("tick"))));
/// let uri = Url::parse("memory://clock").unwrap();
/// let delivery = provider.fetch(&uri, FetchFlags::DEFAULT).unwrap().unwrap();
/// assert!(delivery.token.is_none());
/// provider.close();
/// ```
pub struct CallbackProvider {
    callback: FetchFn,
    state: Mutex<State>,
}

impl CallbackProvider {
    /// Creates a provider whose leftovers at close are logged as warnings.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Url) -> anyhow::Result<Option<Message>> + Send + Sync + 'static,
    {
        Self::with_cleanup(callback, log_orphans)
    }

    /// Creates a provider that hands its leftovers at close to `cleanup`.
    pub fn with_cleanup<F, C>(callback: F, cleanup: C) -> Self
    where
        F: Fn(&Url) -> anyhow::Result<Option<Message>> + Send + Sync + 'static,
        C: FnOnce(HashMap<Token, PendingMessage>) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            callback: Arc::new(callback),
            state: Mutex::new(State {
                stash: Stash::with_cleanup(cleanup),
                requeued: HashMap::new(),
            }),
        }
    }

    /// Number of messages parked for redelivery on `uri`.
    pub fn requeued_len(&self, uri: &Url) -> usize {
        self.state().requeued.get(uri).map_or(0, VecDeque::len)
    }

    /// Number of confirm-mode deliveries awaiting acknowledge/discard.
    pub fn pending_len(&self) -> usize {
        self.state().stash.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Provider for CallbackProvider {
    fn fetch(&self, uri: &Url, flags: FetchFlags) -> Result<Option<Delivery>, MsgError> {
        let parked = {
            let mut state = self.state();
            if flags.is_confirm() {
                state.stash.ensure_open("fetch")?;
            }
            state.requeued.get_mut(uri).and_then(VecDeque::pop_front)
        };
        let next = match parked {
            Some(message) => Some(message),
            None => (self.callback)(uri).map_err(|err| MsgError::wrap("provider_callback", err))?,
        };
        let Some(message) = next else {
            return Ok(None);
        };
        record_counter(
            "courier_fetch_total",
            1,
            &TelemetryLabels::new(uri.scheme(), "fetch"),
        );
        if !flags.is_confirm() {
            return Ok(Some(Delivery::committed(message)));
        }
        let mut state = self.state();
        if let Err(err) = state.stash.ensure_open("fetch") {
            warn!(uri = %uri, "provider closed during confirm fetch; message dropped");
            return Err(err);
        }
        let token = state.stash.store(PendingMessage {
            uri: uri.clone(),
            message: message.clone(),
        });
        Ok(Some(Delivery::pending(message, token)))
    }

    fn acknowledge(&self, token: &Token, _flags: AckFlags) -> Result<(), MsgError> {
        let pending = self.state().stash.restore(token, "acknowledge")?;
        record_counter(
            "courier_ack_total",
            1,
            &TelemetryLabels::new(pending.uri.scheme(), "acknowledge"),
        );
        Ok(())
    }

    fn discard(&self, token: &Token, flags: DiscardFlags) -> Result<(), MsgError> {
        let mut state = self.state();
        let pending = state.stash.restore(token, "discard")?;
        record_counter(
            "courier_discard_total",
            1,
            &TelemetryLabels::new(pending.uri.scheme(), "discard"),
        );
        if flags.is_requeue() {
            state
                .requeued
                .entry(pending.uri)
                .or_default()
                .push_back(pending.message);
        } else {
            info!(
                uri = %pending.uri,
                token = %token,
                content_type = pending.message.content_type(),
                "message discarded"
            );
        }
        Ok(())
    }

    fn close(&self) {
        let mut stash = {
            let mut state = self.state();
            let requeued = std::mem::take(&mut state.requeued);
            for (uri, messages) in requeued {
                for message in messages {
                    state.stash.store(PendingMessage {
                        uri: uri.clone(),
                        message,
                    });
                }
            }
            state.stash.detach()
        };
        stash.close();
    }
}

fn log_orphans(pending: HashMap<Token, PendingMessage>) -> anyhow::Result<()> {
    record_counter(
        "courier_stash_orphans_total",
        pending.len() as u64,
        &TelemetryLabels::new("memory", "close"),
    );
    for (token, orphan) in pending {
        warn!(
            uri = %orphan.uri,
            token = %token,
            content_type = orphan.message.content_type(),
            "unconfirmed message dropped at close"
        );
    }
    Ok(())
}
