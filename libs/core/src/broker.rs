//! Composition of one provider and one handler behind a single value.

use std::sync::Arc;

use url::Url;

use crate::errors::MsgError;
use crate::flags::{AckFlags, DiscardFlags, FetchFlags};
use crate::handler::Handler;
use crate::message::Message;
use crate::provider::{Delivery, Provider};
use crate::stash::Token;

/// Combined push/pull interface.
pub trait MessageBroker: Handler + Provider {}

impl<T: Handler + Provider> MessageBroker for T {}

/// Pairs a [`Provider`] with a [`Handler`] and forwards every call.
#[derive(Clone)]
pub struct Broker {
    provider: Arc<dyn Provider>,
    handler: Arc<dyn Handler>,
}

impl Broker {
    pub fn new(provider: Arc<dyn Provider>, handler: Arc<dyn Handler>) -> Self {
        Self { provider, handler }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl Handler for Broker {
    fn process_message(&self, uri: &Url, message: &Message) -> Result<(), MsgError> {
        self.handler.process_message(uri, message)
    }

    fn process(
        &self,
        uri: &Url,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), MsgError> {
        self.handler.process(uri, content, content_type)
    }
}

impl Provider for Broker {
    fn fetch(&self, uri: &Url, flags: FetchFlags) -> Result<Option<Delivery>, MsgError> {
        self.provider.fetch(uri, flags)
    }

    fn acknowledge(&self, token: &Token, flags: AckFlags) -> Result<(), MsgError> {
        self.provider.acknowledge(token, flags)
    }

    fn discard(&self, token: &Token, flags: DiscardFlags) -> Result<(), MsgError> {
        self.provider.discard(token, flags)
    }

    fn close(&self) {
        self.provider.close();
    }
}
