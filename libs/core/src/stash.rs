//! Token-keyed store for receipts awaiting acknowledge/discard.
//!
//! A [`Stash`] decouples "a message was delivered" from "the caller finished
//! processing it". Owners must call [`Stash::close`] when they are done; only
//! `close` hands the unconfirmed payloads to the cleanup callback. Dropping a
//! stash that still holds entries, closed or not, leaks them and logs a warning.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use tracing::warn;
use uuid::Uuid;

use crate::errors::MsgError;

/// Opaque handle naming a pending stash entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Callback receiving every entry still pending when the stash is closed.
pub type CleanupFn<P> = Box<dyn FnOnce(HashMap<Token, P>) -> anyhow::Result<()> + Send>;

/// Keyed ephemeral store mapping tokens to backend receipts.
///
/// Not synchronized; providers keep it behind their own mutex.
///
/// ```
/// use courier_core::Stash;
///
/// let mut stash = Stash::new();
/// let token = stash.store(42u64);
/// assert_eq!(stash.restore(&token, "acknowledge").unwrap(), 42);
/// assert!(stash.restore(&token, "acknowledge").is_err());
/// ```
pub struct Stash<P> {
    entries: HashMap<Token, P>,
    cleanup: Option<CleanupFn<P>>,
    closed: bool,
}

impl<P> Stash<P> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            cleanup: None,
            closed: false,
        }
    }

    /// Creates a stash whose leftovers are passed to `cleanup` on [`Stash::close`].
    pub fn with_cleanup<F>(cleanup: F) -> Self
    where
        F: FnOnce(HashMap<Token, P>) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            entries: HashMap::new(),
            cleanup: Some(Box::new(cleanup)),
            closed: false,
        }
    }

    /// Records `payload` and returns a fresh token for it.
    pub fn store(&mut self, payload: P) -> Token {
        let mut token = Token::generate();
        while self.entries.contains_key(&token) {
            token = Token::generate();
        }
        self.entries.insert(token.clone(), payload);
        token
    }

    /// Removes and returns the payload for `token`.
    ///
    /// `action` names the attempted verb and only feeds the error message.
    pub fn restore(&mut self, token: &Token, action: &str) -> Result<P, MsgError> {
        self.entries.remove(token).ok_or_else(|| {
            MsgError::argument(
                "unknown_token",
                format!("cannot {action}: token {token} is unknown or already used"),
            )
        })
    }

    /// Puts `payload` back under a token previously returned by [`Stash::store`].
    ///
    /// Used when the backend call that should have consumed a restored entry
    /// failed, so the caller may retry with the same token.
    pub fn reinstate(&mut self, token: Token, payload: P) {
        self.entries.insert(token, payload);
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.entries.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Fails with a runtime `provider_closed` error once [`Stash::close`] ran.
    pub fn ensure_open(&self, action: &str) -> Result<(), MsgError> {
        if self.closed {
            return Err(MsgError::runtime(
                "provider_closed",
                format!("cannot {action}: provider is closed"),
            ));
        }
        Ok(())
    }

    /// Flushes the remaining entries through the cleanup callback.
    ///
    /// The callback runs at most once over the lifetime of the stash and only
    /// when entries remain. Its errors are logged, never returned. Entries
    /// stored after `close` are not flushed again; dropping the stash with
    /// such entries still warns.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let Some(cleanup) = self.cleanup.take() else {
            return;
        };
        if self.entries.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.entries);
        let count = pending.len();
        if let Err(err) = cleanup(pending) {
            warn!(pending = count, error = %err, "stash cleanup callback failed");
        }
    }
}

impl<P> Stash<P> {
    /// Swaps in a closed, empty stash and returns the live one.
    ///
    /// Lets an owner run [`Stash::close`] outside its own lock while any
    /// later caller sees `is_closed() == true` instead of a fresh stash.
    pub fn detach(&mut self) -> Self {
        let spent = Self {
            entries: HashMap::new(),
            cleanup: None,
            closed: true,
        };
        std::mem::replace(self, spent)
    }
}

impl<P> Default for Stash<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Drop for Stash<P> {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            warn!(
                pending = self.entries.len(),
                closed = self.closed,
                "stash dropped without close; unconfirmed receipts leaked"
            );
        }
    }
}
