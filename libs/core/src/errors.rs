use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Broad classification of a [`MsgError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller-supplied URI, token or record is malformed or unknown.
    Argument,
    /// Backend/transport failure, reconnect failure, non-success status or a
    /// misbehaving callback.
    Runtime,
    /// Message content failed structural validation.
    InvalidMessage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Argument => "argument",
            ErrorKind::Runtime => "runtime",
            ErrorKind::InvalidMessage => "invalid_message",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain error raised by handlers, providers and resolvers.
///
/// Once raised, a `MsgError` travels unchanged through any number of
/// delegation layers; see [`MsgError::wrap`].
#[derive(Debug)]
pub struct MsgError {
    kind: ErrorKind,
    code: String,
    message: String,
    source: Option<anyhow::Error>,
}

impl MsgError {
    fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an argument error (bad URI, unknown token, malformed record).
    pub fn argument(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Argument, code, message)
    }

    /// Creates a runtime error (backend failure, resolver misbehaviour).
    pub fn runtime(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, code, message)
    }

    /// Creates an error for content that failed structural validation.
    pub fn invalid_message(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidMessage, code, message)
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Converts an arbitrary error crossing a core boundary into a domain error.
    ///
    /// A `MsgError` hidden inside the `anyhow::Error` is returned as-is, anything
    /// else becomes a runtime error carrying the original as its source.
    ///
    /// ```
    /// use courier_core::{ErrorKind, MsgError};
    ///
    /// let domain = anyhow::Error::new(MsgError::argument("bad_uri", "missing host"));
    /// assert_eq!(MsgError::wrap("callback", domain).kind(), ErrorKind::Argument);
    ///
    /// let foreign = anyhow::anyhow!("socket closed");
    /// let wrapped = MsgError::wrap("callback", foreign);
    /// assert_eq!(wrapped.kind(), ErrorKind::Runtime);
    /// assert_eq!(wrapped.code(), "callback");
    /// ```
    pub fn wrap(code: impl Into<String>, err: anyhow::Error) -> Self {
        match err.downcast::<MsgError>() {
            Ok(domain) => domain,
            Err(other) => MsgError::runtime(code, other.to_string()).with_source(other),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the machine-readable error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the descriptive error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_argument(&self) -> bool {
        self.kind == ErrorKind::Argument
    }

    pub fn is_runtime(&self) -> bool {
        self.kind == ErrorKind::Runtime
    }

    pub fn is_invalid_message(&self) -> bool {
        self.kind == ErrorKind::InvalidMessage
    }
}

impl Display for MsgError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} error [{}]: {}", self.kind, self.code, self.message)
    }
}

impl Error for MsgError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err.as_ref() as &(dyn Error + 'static))
    }
}
