//! Push-side contract: handlers process a message addressed to a URI.

use bytes::Bytes;
use url::Url;

use crate::errors::MsgError;
use crate::message::Message;

mod callback;
mod log;
mod record;

pub use callback::CallbackHandler;
pub use log::LogHandler;
pub use record::RecordHandler;

/// Sink that processes messages for a URI.
///
/// Implementers only supply [`Handler::process_message`]; errors that are not
/// already a [`MsgError`] must be wrapped with [`MsgError::wrap`].
pub trait Handler: Send + Sync {
    fn process_message(&self, uri: &Url, message: &Message) -> Result<(), MsgError>;

    /// Builds a [`Message`] from raw bytes and forwards it to
    /// [`Handler::process_message`].
    fn process(
        &self,
        uri: &Url,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), MsgError> {
        let message = Message::from_parts(
            Some(Bytes::copy_from_slice(content)),
            content_type.map(str::to_string),
        );
        self.process_message(uri, &message)
    }
}
