//! Fixtures shared by tests of crates built on `courier-core`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use url::Url;

use crate::errors::MsgError;
use crate::flags::{AckFlags, DiscardFlags, FetchFlags};
use crate::handler::Handler;
use crate::message::Message;
use crate::provider::{CallbackProvider, Delivery, Provider};
use crate::stash::Token;

/// Handler that records every `(uri, message)` it receives.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<(Url, Message)>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns and clears everything recorded so far.
    pub fn take(&self) -> Vec<(Url, Message)> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Handler for RecordingHandler {
    fn process_message(&self, uri: &Url, message: &Message) -> Result<(), MsgError> {
        self.seen.lock().unwrap().push((uri.clone(), message.clone()));
        Ok(())
    }
}

/// Provider serving per-URI backlogs pushed by the test.
pub struct QueueProvider {
    backlog: Arc<Mutex<HashMap<Url, VecDeque<Message>>>>,
    inner: CallbackProvider,
}

impl QueueProvider {
    pub fn new() -> Self {
        let backlog: Arc<Mutex<HashMap<Url, VecDeque<Message>>>> = Arc::default();
        let source = Arc::clone(&backlog);
        let inner = CallbackProvider::new(move |uri| {
            Ok(source
                .lock()
                .unwrap()
                .get_mut(uri)
                .and_then(VecDeque::pop_front))
        });
        Self { backlog, inner }
    }

    pub fn push(&self, uri: &Url, message: Message) {
        self.backlog
            .lock()
            .unwrap()
            .entry(uri.clone())
            .or_default()
            .push_back(message);
    }

    /// Messages still waiting on `uri`, not counting requeued ones.
    pub fn backlog_len(&self, uri: &Url) -> usize {
        self.backlog
            .lock()
            .unwrap()
            .get(uri)
            .map_or(0, VecDeque::len)
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending_len()
    }
}

impl Default for QueueProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for QueueProvider {
    fn fetch(&self, uri: &Url, flags: FetchFlags) -> Result<Option<Delivery>, MsgError> {
        self.inner.fetch(uri, flags)
    }

    fn acknowledge(&self, token: &Token, flags: AckFlags) -> Result<(), MsgError> {
        self.inner.acknowledge(token, flags)
    }

    fn discard(&self, token: &Token, flags: DiscardFlags) -> Result<(), MsgError> {
        self.inner.discard(token, flags)
    }

    fn close(&self) {
        self.inner.close();
    }
}
