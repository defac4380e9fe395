//! Boundary to the external broker client.
//!
//! Implementations own the wire protocol; courier only checks liveness and
//! invokes the six operations below. Handles are opaque.

use courier_core::{Message, MsgError};

use crate::endpoint::BrokerEndpoint;

/// Broker-assigned identifier of an unacknowledged delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryTag(pub u64);

/// Message taken from a queue, not yet acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Received {
    pub tag: DeliveryTag,
    pub message: Message,
}

/// One broker connection and channel.
///
/// `Ok(false)` from any operation means the broker refused it.
pub trait Connection: Send {
    fn is_connected(&self) -> bool;

    fn connect(&mut self) -> anyhow::Result<bool>;

    fn publish(
        &mut self,
        exchange: Option<&str>,
        routing_key: Option<&str>,
        message: &Message,
    ) -> anyhow::Result<bool>;

    fn get(&mut self, queue: Option<&str>) -> anyhow::Result<Option<Received>>;

    fn ack(&mut self, tag: DeliveryTag) -> anyhow::Result<bool>;

    fn nack(&mut self, tag: DeliveryTag, requeue: bool) -> anyhow::Result<bool>;
}

/// Factory for [`Connection`]s. Must not perform I/O; connections connect lazily.
pub trait Connector: Send + Sync {
    fn connection(&self, endpoint: &BrokerEndpoint) -> anyhow::Result<Box<dyn Connection>>;
}

pub(crate) fn open(
    connector: &dyn Connector,
    endpoint: &BrokerEndpoint,
) -> Result<Box<dyn Connection>, MsgError> {
    connector.connection(endpoint).map_err(|err| {
        MsgError::runtime(
            "broker_unavailable",
            format!("could not open a connection to {endpoint}"),
        )
        .with_source(err)
    })
}
