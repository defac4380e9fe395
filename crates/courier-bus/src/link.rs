use std::sync::{Mutex, MutexGuard};

use courier_core::{Message, MsgError};
use tracing::{debug, warn};

use crate::endpoint::BrokerEndpoint;
use crate::transport::{Connection, DeliveryTag, Received};

/// A lazily (re)connected broker connection shared by one handler or provider.
pub(crate) struct Link {
    endpoint: BrokerEndpoint,
    connection: Mutex<Box<dyn Connection>>,
}

impl Link {
    pub(crate) fn new(endpoint: BrokerEndpoint, connection: Box<dyn Connection>) -> Self {
        Self {
            endpoint,
            connection: Mutex::new(connection),
        }
    }

    pub(crate) fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }

    pub(crate) fn publish(&self, message: &Message) -> Result<(), MsgError> {
        let endpoint = &self.endpoint;
        let accepted = self.call("publish", |conn| {
            conn.publish(
                endpoint.exchange_name.as_deref(),
                endpoint.routing_key.as_deref(),
                message,
            )
        })?;
        self.accepted("publish", accepted)
    }

    pub(crate) fn get(&self) -> Result<Option<Received>, MsgError> {
        let queue = self.endpoint.queue_name.as_deref();
        self.call("get", |conn| conn.get(queue))
    }

    pub(crate) fn ack(&self, tag: DeliveryTag) -> Result<(), MsgError> {
        let accepted = self.call("ack", |conn| conn.ack(tag))?;
        self.accepted("ack", accepted)
    }

    pub(crate) fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<(), MsgError> {
        let accepted = self.call("nack", |conn| conn.nack(tag, requeue))?;
        self.accepted("nack", accepted)
    }

    fn call<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&mut dyn Connection) -> anyhow::Result<T>,
    ) -> Result<T, MsgError> {
        let mut conn = self.connection();
        if !conn.is_connected() {
            debug!(endpoint = %self.endpoint, "connecting to broker");
            match conn.connect() {
                Ok(true) => {}
                Ok(false) => {
                    return Err(MsgError::runtime(
                        "broker_unavailable",
                        format!("could not connect to {}", self.endpoint),
                    ));
                }
                Err(err) => {
                    warn!(endpoint = %self.endpoint, error = %err, "broker connect failed");
                    return Err(MsgError::runtime(
                        "broker_unavailable",
                        format!("could not connect to {}", self.endpoint),
                    )
                    .with_source(err));
                }
            }
        }
        op(&mut **conn).map_err(|err| {
            MsgError::runtime(
                "broker_transport",
                format!("{operation} failed on {}", self.endpoint),
            )
            .with_source(err)
        })
    }

    fn accepted(&self, operation: &'static str, accepted: bool) -> Result<(), MsgError> {
        if accepted {
            Ok(())
        } else {
            Err(MsgError::runtime(
                "broker_rejected",
                format!("{operation} rejected by {}", self.endpoint),
            ))
        }
    }

    fn connection(&self) -> MutexGuard<'_, Box<dyn Connection>> {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
