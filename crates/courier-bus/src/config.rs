use std::env;

pub const BROKER_SCHEME_ENV: &str = "COURIER_BROKER_SCHEME";
pub const DEFAULT_BROKER_SCHEME: &str = "amqp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// The one URI scheme the broker resolver answers for.
    pub scheme: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_BROKER_SCHEME.to_string(),
        }
    }
}

impl BusConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let scheme = lookup(BROKER_SCHEME_ENV)
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BROKER_SCHEME.to_string());
        Self { scheme }
    }
}
