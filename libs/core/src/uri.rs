//! Upstream URI resolution: turns one URI into the ordered candidates a
//! [`crate::ChainResolver`] should try.

use std::collections::HashMap;

use url::Url;

use crate::errors::MsgError;

/// Produces candidate URIs for an input URI.
///
/// Returning an empty list means "no opinion"; the resolver then tries the
/// input URI itself.
pub trait UriResolver: Send + Sync {
    fn resolve_uri(&self, uri: &Url) -> Result<Vec<Url>, MsgError>;
}

/// Parses `raw` into a [`Url`], reporting failures as argument errors.
pub fn parse_uri(raw: &str) -> Result<Url, MsgError> {
    Url::parse(raw.trim()).map_err(|err| {
        MsgError::argument("invalid_uri", format!("`{raw}` is not a valid uri: {err}"))
            .with_source(err)
    })
}

/// Static alias table mapping a URI to replacement candidates.
///
/// ```
/// use courier_core::{AliasUriResolver, UriResolver};
/// use url::Url;
///
/// let aliases = AliasUriResolver::new()
///     .with_alias("urn:orders", ["amqp://mq.internal/?queue-name=orders"])
///     .unwrap();
/// let candidates = aliases.resolve_uri(&Url::parse("urn:orders").unwrap()).unwrap();
/// assert_eq!(candidates[0].host_str(), Some("mq.internal"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AliasUriResolver {
    aliases: HashMap<Url, Vec<Url>>,
}

impl AliasUriResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias<I, S>(mut self, from: &str, to: I) -> Result<Self, MsgError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.insert(from, to)?;
        Ok(self)
    }

    /// Adds (or replaces) the candidates for `from`.
    pub fn insert<I, S>(&mut self, from: &str, to: I) -> Result<(), MsgError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let from = parse_uri(from)?;
        let targets = to
            .into_iter()
            .map(|raw| parse_uri(raw.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.aliases.insert(from, targets);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl UriResolver for AliasUriResolver {
    fn resolve_uri(&self, uri: &Url) -> Result<Vec<Url>, MsgError> {
        Ok(self.aliases.get(uri).cloned().unwrap_or_default())
    }
}
