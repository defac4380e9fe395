//! In-process broker used as the transport in tests and local runs.
//!
//! Exchanges route by exact routing-key match against their bindings (`#`
//! binds everything). The default exchange (no name, or `""`) routes to the
//! queue named by the routing key.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail};
use courier_core::Message;
use tracing::debug;

use crate::endpoint::BrokerEndpoint;
use crate::transport::{Connection, Connector, DeliveryTag, Received};

const MATCH_ALL: &str = "#";

/// A message accepted by an exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    pub exchange: Option<String>,
    pub routing_key: Option<String>,
    pub message: Message,
}

struct State {
    online: bool,
    reject_next_ack: bool,
    next_tag: u64,
    connections_opened: usize,
    exchanges: HashMap<String, Vec<(String, String)>>,
    queues: HashMap<String, VecDeque<Message>>,
    unacked: HashMap<DeliveryTag, (String, Message)>,
    published: Vec<Published>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            online: true,
            reject_next_ack: false,
            next_tag: 1,
            connections_opened: 0,
            exchanges: HashMap::new(),
            queues: HashMap::new(),
            unacked: HashMap::new(),
            published: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> InMemoryConnector {
        InMemoryConnector {
            broker: self.clone(),
        }
    }

    pub fn declare_queue(&self, queue: &str) -> &Self {
        self.state().queues.entry(queue.to_string()).or_default();
        self
    }

    pub fn declare_exchange(&self, exchange: &str) -> &Self {
        self.state().exchanges.entry(exchange.to_string()).or_default();
        self
    }

    /// Binds `queue` to `exchange` for `routing_key`, declaring both.
    pub fn bind(&self, exchange: &str, routing_key: &str, queue: &str) -> &Self {
        let mut state = self.state();
        state.queues.entry(queue.to_string()).or_default();
        state
            .exchanges
            .entry(exchange.to_string())
            .or_default()
            .push((routing_key.to_string(), queue.to_string()));
        self
    }

    /// Appends `message` directly to `queue`, bypassing exchanges.
    pub fn enqueue(&self, queue: &str, message: Message) {
        self.state()
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(message);
    }

    pub fn queue_len(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, VecDeque::len)
    }

    pub fn unacked_len(&self) -> usize {
        self.state().unacked.len()
    }

    pub fn connections_opened(&self) -> usize {
        self.state().connections_opened
    }

    pub fn take_published(&self) -> Vec<Published> {
        std::mem::take(&mut self.state().published)
    }

    /// Offline brokers refuse connects and fail every operation.
    pub fn set_online(&self, online: bool) {
        self.state().online = online;
    }

    /// Makes the next `ack` report a refusal.
    pub fn reject_next_ack(&self) {
        self.state().reject_next_ack = true;
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct InMemoryConnector {
    broker: InMemoryBroker,
}

impl Connector for InMemoryConnector {
    fn connection(&self, endpoint: &BrokerEndpoint) -> anyhow::Result<Box<dyn Connection>> {
        self.broker.state().connections_opened += 1;
        debug!(endpoint = %endpoint, "in-memory connection opened");
        Ok(Box::new(InMemoryConnection {
            broker: self.broker.clone(),
            connected: false,
        }))
    }
}

struct InMemoryConnection {
    broker: InMemoryBroker,
    connected: bool,
}

impl InMemoryConnection {
    fn online(&self) -> anyhow::Result<MutexGuard<'_, State>> {
        let state = self.broker.state();
        if !state.online || !self.connected {
            bail!("in-memory broker is offline");
        }
        Ok(state)
    }
}

impl Connection for InMemoryConnection {
    fn is_connected(&self) -> bool {
        self.connected && self.broker.state().online
    }

    fn connect(&mut self) -> anyhow::Result<bool> {
        self.connected = self.broker.state().online;
        Ok(self.connected)
    }

    fn publish(
        &mut self,
        exchange: Option<&str>,
        routing_key: Option<&str>,
        message: &Message,
    ) -> anyhow::Result<bool> {
        let mut state = self.online()?;
        let targets: Vec<String> = match exchange.filter(|name| !name.is_empty()) {
            None => routing_key
                .filter(|key| state.queues.contains_key(*key))
                .map(|key| vec![key.to_string()])
                .unwrap_or_default(),
            Some(name) => {
                let Some(bindings) = state.exchanges.get(name) else {
                    return Ok(false);
                };
                bindings
                    .iter()
                    .filter(|(key, _)| key == MATCH_ALL || Some(key.as_str()) == routing_key)
                    .map(|(_, queue)| queue.clone())
                    .collect()
            }
        };
        for queue in targets {
            state
                .queues
                .entry(queue)
                .or_default()
                .push_back(message.clone());
        }
        state.published.push(Published {
            exchange: exchange.map(str::to_string),
            routing_key: routing_key.map(str::to_string),
            message: message.clone(),
        });
        Ok(true)
    }

    fn get(&mut self, queue: Option<&str>) -> anyhow::Result<Option<Received>> {
        let queue = queue.ok_or_else(|| anyhow!("no queue name given"))?;
        let mut state = self.online()?;
        let Some(message) = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| anyhow!("queue {queue} is not declared"))?
            .pop_front()
        else {
            return Ok(None);
        };
        let tag = DeliveryTag(state.next_tag);
        state.next_tag += 1;
        state
            .unacked
            .insert(tag, (queue.to_string(), message.clone()));
        Ok(Some(Received { tag, message }))
    }

    fn ack(&mut self, tag: DeliveryTag) -> anyhow::Result<bool> {
        let mut state = self.online()?;
        if std::mem::take(&mut state.reject_next_ack) {
            return Ok(false);
        }
        Ok(state.unacked.remove(&tag).is_some())
    }

    fn nack(&mut self, tag: DeliveryTag, requeue: bool) -> anyhow::Result<bool> {
        let mut state = self.online()?;
        let Some((queue, message)) = state.unacked.remove(&tag) else {
            return Ok(false);
        };
        if requeue {
            state.queues.entry(queue).or_default().push_front(message);
        }
        Ok(true)
    }
}
