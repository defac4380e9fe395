use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub json_logs: bool,
    pub metrics_enabled: bool,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str, default_service_version: &str) -> Self {
        Self::from_lookup(default_service_name, default_service_version, |key| {
            env::var(key).ok()
        })
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(
        default_service_name: &str,
        default_service_version: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let service_name =
            lookup("OTEL_SERVICE_NAME").unwrap_or_else(|| default_service_name.to_string());
        let service_version = lookup("OTEL_SERVICE_VERSION")
            .unwrap_or_else(|| default_service_version.to_string());
        let environment = lookup("DEPLOYMENT_ENV").unwrap_or_else(|| "dev".into());
        let json_logs = lookup("LOG_FORMAT")
            .map(|v| !matches!(v.to_lowercase().as_str(), "text" | "pretty" | "plain"))
            .unwrap_or(true);
        let metrics_enabled = lookup("COURIER_METRICS")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Self {
            service_name,
            service_version,
            environment,
            json_logs,
            metrics_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> TelemetryConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TelemetryConfig::from_lookup("courier", "0.1.0", |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_json_logs_without_metrics() {
        let cfg = config(&[]);
        assert_eq!(cfg.service_name, "courier");
        assert_eq!(cfg.environment, "dev");
        assert!(cfg.json_logs);
        assert!(!cfg.metrics_enabled);
    }

    #[test]
    fn honours_overrides() {
        let cfg = config(&[
            ("OTEL_SERVICE_NAME", "orders-worker"),
            ("LOG_FORMAT", "Pretty"),
            ("COURIER_METRICS", "on"),
            ("DEPLOYMENT_ENV", "prod"),
        ]);
        assert_eq!(cfg.service_name, "orders-worker");
        assert_eq!(cfg.environment, "prod");
        assert!(!cfg.json_logs);
        assert!(cfg.metrics_enabled);
    }
}
