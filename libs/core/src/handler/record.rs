use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use url::Url;

use crate::errors::MsgError;
use crate::handler::Handler;
use crate::message::Message;

type RecordFn<T> = Arc<dyn Fn(&Url, T) -> anyhow::Result<()> + Send + Sync>;

/// Handler that decodes JSON content into `T` before invoking its callback.
///
/// Content that does not parse is rejected with an invalid-message error and
/// never reaches the callback.
pub struct RecordHandler<T> {
    callback: RecordFn<T>,
    _record: PhantomData<fn() -> T>,
}

impl<T> RecordHandler<T>
where
    T: DeserializeOwned + 'static,
{
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Url, T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            _record: PhantomData,
        }
    }
}

impl<T> Handler for RecordHandler<T>
where
    T: DeserializeOwned + 'static,
{
    fn process_message(&self, uri: &Url, message: &Message) -> Result<(), MsgError> {
        let record = message.to_record::<T>()?;
        (self.callback)(uri, record).map_err(|err| MsgError::wrap("record_callback", err))
    }
}
