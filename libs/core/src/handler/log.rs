use tracing::{Level, debug, error, info, trace, warn};
use url::Url;

use crate::errors::MsgError;
use crate::handler::Handler;
use crate::message::Message;

const DEFAULT_PREVIEW_BYTES: usize = 256;

/// Handler that writes every message to the tracing pipeline.
///
/// Never fails; useful as a fallback sink or while wiring a new route.
#[derive(Clone, Debug)]
pub struct LogHandler {
    level: Level,
    preview_bytes: usize,
}

impl LogHandler {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            preview_bytes: DEFAULT_PREVIEW_BYTES,
        }
    }

    /// Limits how much of the content is echoed into the log record.
    pub fn with_preview_bytes(mut self, preview_bytes: usize) -> Self {
        self.preview_bytes = preview_bytes;
        self
    }

    fn preview(&self, message: &Message) -> String {
        let Some(content) = message.content() else {
            return String::new();
        };
        let cut = content.len().min(self.preview_bytes);
        let mut preview = String::from_utf8_lossy(&content[..cut]).into_owned();
        if cut < content.len() {
            preview.push('…');
        }
        preview
    }
}

impl Default for LogHandler {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

macro_rules! emit {
    ($level:expr, $($field:tt)*) => {{
        let level = $level;
        if level == Level::ERROR {
            error!($($field)*)
        } else if level == Level::WARN {
            warn!($($field)*)
        } else if level == Level::INFO {
            info!($($field)*)
        } else if level == Level::DEBUG {
            debug!($($field)*)
        } else {
            trace!($($field)*)
        }
    }};
}

impl Handler for LogHandler {
    fn process_message(&self, uri: &Url, message: &Message) -> Result<(), MsgError> {
        let preview = self.preview(message);
        emit!(
            self.level,
            uri = %uri,
            content_type = message.content_type(),
            bytes = message.len(),
            preview = %preview,
            "message received"
        );
        Ok(())
    }
}
