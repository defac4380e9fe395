//! Pull-side contract: providers yield messages for a URI and accept
//! acknowledge/discard decisions for messages fetched in confirm mode.

use url::Url;

use crate::errors::MsgError;
use crate::flags::{AckFlags, DiscardFlags, FetchFlags};
use crate::message::Message;
use crate::stash::Token;

mod callback;
mod proxy;

pub use callback::{CallbackProvider, PendingMessage};
pub use proxy::{DelegatedReceipt, ProxyProvider};

/// Result of a successful [`Provider::fetch`].
///
/// `token` is `Some` exactly when the fetch ran with [`FetchFlags::CONFIRM`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub message: Message,
    pub token: Option<Token>,
}

impl Delivery {
    pub fn committed(message: Message) -> Self {
        Self {
            message,
            token: None,
        }
    }

    pub fn pending(message: Message, token: Token) -> Self {
        Self {
            message,
            token: Some(token),
        }
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

/// Source of messages for a URI.
pub trait Provider: Send + Sync {
    /// Returns the next message for `uri`, or `None` once the source is exhausted.
    fn fetch(&self, uri: &Url, flags: FetchFlags) -> Result<Option<Delivery>, MsgError>;

    /// Commits a message fetched in confirm mode.
    fn acknowledge(&self, token: &Token, flags: AckFlags) -> Result<(), MsgError>;

    /// Rejects a message fetched in confirm mode, optionally asking for redelivery.
    fn discard(&self, token: &Token, flags: DiscardFlags) -> Result<(), MsgError>;

    /// Flushes unconfirmed receipts through the provider's cleanup path.
    ///
    /// Owners must call this before dropping the provider; receipts still
    /// pending at drop time are leaked, not flushed.
    fn close(&self) {}
}
