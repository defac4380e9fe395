//! NATS JetStream transport.
//!
//! Mapping: `exchange-name` names the stream, `queue-name` a durable pull
//! consumer on it, and `routing-key` the subject messages are published to.
//! Each connection drives async-nats on its own current-thread runtime, so
//! it must not be used from inside another tokio runtime.

use std::collections::HashMap;

use anyhow::{Context, anyhow, bail};
use async_nats::jetstream::consumer::{AckPolicy, pull};
use async_nats::jetstream::{self, AckKind};
use async_nats::{ConnectOptions, HeaderMap};
use courier_core::Message;
use futures::TryStreamExt;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use crate::endpoint::BrokerEndpoint;
use crate::transport::{Connection, Connector, DeliveryTag, Received};

const DEFAULT_NATS_PORT: u16 = 4222;
const CONTENT_TYPE_HEADER: &str = "Content-Type";

#[derive(Clone, Debug, Default)]
pub struct NatsConnector;

impl NatsConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for NatsConnector {
    fn connection(&self, endpoint: &BrokerEndpoint) -> anyhow::Result<Box<dyn Connection>> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("build NATS runtime")?;
        Ok(Box::new(NatsConnection {
            endpoint: endpoint.clone(),
            runtime,
            session: None,
            pending: HashMap::new(),
            next_tag: 1,
        }))
    }
}

struct Session {
    client: async_nats::Client,
    js: jetstream::Context,
}

struct NatsConnection {
    endpoint: BrokerEndpoint,
    runtime: Runtime,
    session: Option<Session>,
    pending: HashMap<DeliveryTag, jetstream::Message>,
    next_tag: u64,
}

impl NatsConnection {
    fn session(&self) -> anyhow::Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("not connected to {}", self.endpoint))
    }

    fn server_url(&self) -> String {
        format!(
            "nats://{}:{}",
            self.endpoint.host,
            self.endpoint.port.unwrap_or(DEFAULT_NATS_PORT)
        )
    }
}

impl Connection for NatsConnection {
    fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|session| {
            session.client.connection_state() == async_nats::connection::State::Connected
        })
    }

    fn connect(&mut self) -> anyhow::Result<bool> {
        let url = self.server_url();
        let options = match (&self.endpoint.login, &self.endpoint.password) {
            (Some(user), Some(password)) => {
                ConnectOptions::with_user_and_password(user.clone(), password.clone())
            }
            _ => ConnectOptions::new(),
        };
        let client = self
            .runtime
            .block_on(options.connect(url.as_str()))
            .with_context(|| format!("connect to {url}"))?;
        info!(endpoint = %self.endpoint, "connected to NATS");
        let js = jetstream::new(client.clone());
        self.session = Some(Session { client, js });
        Ok(true)
    }

    fn publish(
        &mut self,
        _exchange: Option<&str>,
        routing_key: Option<&str>,
        message: &Message,
    ) -> anyhow::Result<bool> {
        let Some(subject) = routing_key else {
            bail!("a routing-key is required to publish to NATS");
        };
        let js = self.session()?.js.clone();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE_HEADER, message.content_type());
        let payload = message.content().cloned().unwrap_or_default();
        let subject = subject.to_string();
        self.runtime.block_on(async {
            js.publish_with_headers(subject.clone(), headers, payload)
                .await
                .with_context(|| format!("publish to {subject}"))?
                .await
                .with_context(|| format!("publish ack for {subject}"))
        })?;
        Ok(true)
    }

    fn get(&mut self, queue: Option<&str>) -> anyhow::Result<Option<Received>> {
        let Some(stream_name) = self.endpoint.exchange_name.clone() else {
            bail!("an exchange-name naming the JetStream stream is required");
        };
        let Some(consumer_name) = queue.map(str::to_string) else {
            bail!("a queue-name naming the durable consumer is required");
        };
        let js = self.session()?.js.clone();
        let next = self.runtime.block_on(async {
            let stream = js
                .get_stream(&stream_name)
                .await
                .with_context(|| format!("look up stream {stream_name}"))?;
            let consumer = stream
                .get_or_create_consumer(
                    &consumer_name,
                    pull::Config {
                        durable_name: Some(consumer_name.clone()),
                        ack_policy: AckPolicy::Explicit,
                        ..Default::default()
                    },
                )
                .await
                .with_context(|| format!("open consumer {consumer_name}"))?;
            let mut messages = consumer
                .fetch()
                .max_messages(1)
                .messages()
                .await
                .map_err(|e| anyhow!(e))?;
            messages.try_next().await.map_err(|e| anyhow!(e))
        })?;
        let Some(delivered) = next else {
            return Ok(None);
        };

        let content_type = delivered
            .headers
            .as_ref()
            .and_then(|headers| headers.get(CONTENT_TYPE_HEADER))
            .map(|value| value.as_str().to_string());
        let message = Message::from_parts(Some(delivered.payload.clone()), content_type);
        let tag = DeliveryTag(self.next_tag);
        self.next_tag += 1;
        self.pending.insert(tag, delivered);
        debug!(
            stream = %stream_name,
            consumer = %consumer_name,
            tag = tag.0,
            "NATS message fetched"
        );
        Ok(Some(Received { tag, message }))
    }

    fn ack(&mut self, tag: DeliveryTag) -> anyhow::Result<bool> {
        let Some(delivered) = self.pending.remove(&tag) else {
            return Ok(false);
        };
        self.runtime
            .block_on(delivered.ack())
            .map_err(|e| anyhow!(e))?;
        Ok(true)
    }

    fn nack(&mut self, tag: DeliveryTag, requeue: bool) -> anyhow::Result<bool> {
        let Some(delivered) = self.pending.remove(&tag) else {
            return Ok(false);
        };
        let kind = if requeue { AckKind::Nak(None) } else { AckKind::Term };
        self.runtime
            .block_on(delivered.ack_with(kind))
            .map_err(|e| anyhow!(e))?;
        Ok(true)
    }
}
