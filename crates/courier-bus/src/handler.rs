use courier_core::{Handler, Message, MsgError, Url};
use courier_telemetry::{TelemetryLabels, record_counter};
use tracing::debug;

use crate::endpoint::BrokerEndpoint;
use crate::link::Link;
use crate::transport::Connection;

/// Handler publishing every message to the endpoint's exchange and routing key.
pub struct BrokerHandler {
    link: Link,
}

impl BrokerHandler {
    pub fn new(endpoint: BrokerEndpoint, connection: Box<dyn Connection>) -> Self {
        Self {
            link: Link::new(endpoint, connection),
        }
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        self.link.endpoint()
    }
}

impl Handler for BrokerHandler {
    fn process_message(&self, uri: &Url, message: &Message) -> Result<(), MsgError> {
        self.link.publish(message)?;
        record_counter(
            "courier_process_total",
            1,
            &TelemetryLabels::new(uri.scheme(), "process"),
        );
        debug!(uri = %uri, bytes = message.len(), "message published");
        Ok(())
    }
}
