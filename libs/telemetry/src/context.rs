/// Labels attached to every courier metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryLabels {
    pub scheme: String,
    pub operation: &'static str,
    pub extra: Vec<(String, String)>,
}

impl TelemetryLabels {
    pub fn new(scheme: impl Into<String>, operation: &'static str) -> Self {
        Self {
            scheme: scheme.into(),
            operation,
            extra: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    pub fn tags(&self) -> Vec<(String, String)> {
        let mut tags = Vec::with_capacity(2 + self.extra.len());
        tags.push(("scheme".into(), self.scheme.clone()));
        tags.push(("operation".into(), self.operation.to_string()));
        for (key, value) in &self.extra {
            tags.push((key.clone(), value.clone()));
        }
        tags
    }
}
