use std::sync::Arc;

use courier_telemetry::{TelemetryLabels, record_counter};
use url::Url;

use crate::errors::MsgError;
use crate::handler::Handler;
use crate::message::Message;

type HandlerFn = Arc<dyn Fn(&Url, &Message) -> anyhow::Result<()> + Send + Sync>;

/// Handler backed by a user callback.
///
/// ```
/// use courier_core::{CallbackHandler, Handler};
/// use url::Url;
///
/// let handler = CallbackHandler::new(|uri, message| {
///     assert_eq!(uri.scheme(), "memory");
///     assert_eq!(message.len(), 2);
///     Ok(())
/// });
/// handler
///     .process(&Url::parse("memory://inbox").unwrap(), b"hi", None)
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct CallbackHandler {
    callback: HandlerFn,
}

impl CallbackHandler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Url, &Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl Handler for CallbackHandler {
    fn process_message(&self, uri: &Url, message: &Message) -> Result<(), MsgError> {
        record_counter(
            "courier_process_total",
            1,
            &TelemetryLabels::new(uri.scheme(), "process"),
        );
        (self.callback)(uri, message).map_err(|err| MsgError::wrap("handler_callback", err))
    }
}
