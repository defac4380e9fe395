use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::MsgError;

/// Media type assumed when none (or an empty one) is supplied.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Media type used for messages built from serde records.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Immutable message exchanged between handlers and providers.
///
/// ```
/// use courier_core::{Message, DEFAULT_CONTENT_TYPE};
///
/// let message = Message::new("hello");
/// assert_eq!(message.content().map(|b| b.as_ref()), Some(&b"hello"[..]));
/// assert_eq!(message.content_type(), DEFAULT_CONTENT_TYPE);
///
/// let typed = Message::with_type("{}", "application/json");
/// assert_eq!(typed.content_type(), "application/json");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Message {
    content: Option<Bytes>,
    content_type: String,
}

impl Message {
    /// Creates a message with the default content type.
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self::from_parts(Some(content.into()), None)
    }

    pub fn with_type(content: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self::from_parts(Some(content.into()), Some(content_type.into()))
    }

    /// Creates a message without content.
    pub fn empty(content_type: Option<&str>) -> Self {
        Self::from_parts(None, content_type.map(str::to_string))
    }

    /// Builds a message from optional parts; an absent or blank type falls back
    /// to [`DEFAULT_CONTENT_TYPE`].
    pub fn from_parts(content: Option<Bytes>, content_type: Option<String>) -> Self {
        let content_type = content_type
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        Self {
            content,
            content_type,
        }
    }

    /// Serializes `record` as JSON.
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self, MsgError> {
        let bytes = serde_json::to_vec(record).map_err(|err| {
            MsgError::invalid_message("record_encode", "record could not be serialized")
                .with_source(err)
        })?;
        Ok(Self::with_type(bytes, JSON_CONTENT_TYPE))
    }

    /// Parses the JSON content into `T`.
    pub fn to_record<T: DeserializeOwned>(&self) -> Result<T, MsgError> {
        let content = self.content.as_ref().ok_or_else(|| {
            MsgError::invalid_message("record_decode", "message carries no content")
        })?;
        serde_json::from_slice(content).map_err(|err| {
            MsgError::invalid_message(
                "record_decode",
                format!("content is not a valid record: {err}"),
            )
            .with_source(err)
        })
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    /// Returns the media type; never empty.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.content.as_ref().map_or(0, Bytes::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_parts(self) -> (Option<Bytes>, String) {
        (self.content, self.content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u32,
        sku: String,
    }

    #[test]
    fn blank_content_type_falls_back_to_default() {
        let message = Message::with_type("x", "   ");
        assert_eq!(message.content_type(), DEFAULT_CONTENT_TYPE);
        let empty = Message::empty(None);
        assert!(empty.content().is_none());
        assert_eq!(empty.content_type(), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn records_use_json_content_type() {
        let order = Order {
            id: 7,
            sku: "widget".into(),
        };
        let message = Message::from_record(&order).expect("encode");
        assert_eq!(message.content_type(), JSON_CONTENT_TYPE);
        let decoded: Order = message.to_record().expect("decode");
        assert_eq!(decoded, order);
    }

    #[test]
    fn malformed_record_is_invalid_message() {
        let message = Message::with_type("{not json", JSON_CONTENT_TYPE);
        let err = message.to_record::<Order>().unwrap_err();
        assert!(err.is_invalid_message());

        let err = Message::empty(Some(JSON_CONTENT_TYPE))
            .to_record::<Order>()
            .unwrap_err();
        assert!(err.is_invalid_message());
    }
}
