use std::sync::Arc;

use courier_bus::{
    BrokerLookup, BrokerProvider, BrokerResolver, BusConfig, InMemoryBroker, open_broker,
};
use courier_core::testkit::{QueueProvider, RecordingHandler};
use courier_core::{
    AckFlags, DiscardFlags, FetchFlags, Handler, Message, Provider, ProxyProvider,
    RegistryResolver, Resolver, SchemeRegistry, Url,
};

const ORDERS: &str =
    "amqp://guest:guest@mq/prod?exchange-name=orders&queue-name=orders.new&routing-key=new";

fn orders_uri() -> Url {
    Url::parse(ORDERS).unwrap()
}

fn broker_with_orders() -> InMemoryBroker {
    let broker = InMemoryBroker::new();
    broker.bind("orders", "new", "orders.new");
    broker
}

fn provider(broker: &InMemoryBroker) -> Arc<dyn Provider> {
    let resolver = BrokerResolver::new(BrokerLookup::from_config(
        &BusConfig::default(),
        Arc::new(broker.connector()),
    ));
    resolver.resolve_provider(&mut orders_uri()).unwrap().unwrap()
}

#[test]
fn published_messages_come_back_through_the_provider() {
    let broker = broker_with_orders();
    let uri = orders_uri();
    let pair = open_broker(&uri, &broker.connector()).unwrap();

    pair.process(&uri, b"{\"id\":1}", Some("application/json"))
        .unwrap();
    let published = broker.take_published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].exchange.as_deref(), Some("orders"));
    assert_eq!(published[0].routing_key.as_deref(), Some("new"));

    let delivery = pair.fetch(&uri, FetchFlags::DEFAULT).unwrap().unwrap();
    assert!(delivery.token.is_none());
    assert_eq!(delivery.message.content_type(), "application/json");
    assert_eq!(delivery.message.content().unwrap().as_ref(), b"{\"id\":1}");
    assert_eq!(broker.unacked_len(), 0);
    assert!(pair.fetch(&uri, FetchFlags::DEFAULT).unwrap().is_none());
    pair.close();
}

#[test]
fn confirm_mode_defers_ack_until_acknowledge() {
    let broker = broker_with_orders();
    broker.enqueue("orders.new", Message::new("a"));
    let provider = provider(&broker);
    let uri = orders_uri();

    let delivery = provider.fetch(&uri, FetchFlags::CONFIRM).unwrap().unwrap();
    let token = delivery.token.unwrap();
    assert_eq!(broker.unacked_len(), 1);

    provider.acknowledge(&token, AckFlags::DEFAULT).unwrap();
    assert_eq!(broker.unacked_len(), 0);
    let err = provider.discard(&token, DiscardFlags::DEFAULT).unwrap_err();
    assert!(err.is_argument());
    provider.close();
}

#[test]
fn discard_with_requeue_redelivers() {
    let broker = broker_with_orders();
    broker.enqueue("orders.new", Message::new("retry-me"));
    let provider = provider(&broker);
    let uri = orders_uri();

    let first = provider.fetch(&uri, FetchFlags::CONFIRM).unwrap().unwrap();
    provider
        .discard(first.token.as_ref().unwrap(), DiscardFlags::REQUEUE)
        .unwrap();
    assert_eq!(broker.queue_len("orders.new"), 1);

    let second = provider.fetch(&uri, FetchFlags::CONFIRM).unwrap().unwrap();
    assert_eq!(second.message, first.message);
    provider
        .discard(second.token.as_ref().unwrap(), DiscardFlags::DEFAULT)
        .unwrap();
    assert_eq!(broker.queue_len("orders.new"), 0);
    assert_eq!(broker.unacked_len(), 0);
    provider.close();
}

#[test]
fn transport_failures_are_runtime_errors() {
    let broker = broker_with_orders();
    broker.enqueue("orders.new", Message::new("a"));
    let provider = provider(&broker);
    let uri = orders_uri();

    broker.set_online(false);
    let err = provider.fetch(&uri, FetchFlags::DEFAULT).unwrap_err();
    assert!(err.is_runtime());
    assert_eq!(err.code(), "broker_unavailable");

    broker.set_online(true);
    broker.reject_next_ack();
    let err = provider.fetch(&uri, FetchFlags::DEFAULT).unwrap_err();
    assert!(err.is_runtime());
    assert_eq!(err.code(), "broker_rejected");
    provider.close();
}

#[test]
fn rejected_ack_on_plain_fetch_puts_the_message_back() {
    let broker = broker_with_orders();
    broker.enqueue("orders.new", Message::new("fragile"));
    let provider = provider(&broker);
    let uri = orders_uri();

    broker.reject_next_ack();
    let err = provider.fetch(&uri, FetchFlags::DEFAULT).unwrap_err();
    assert_eq!(err.code(), "broker_rejected");
    assert_eq!(broker.queue_len("orders.new"), 1);
    assert_eq!(broker.unacked_len(), 0);

    let retry = provider.fetch(&uri, FetchFlags::DEFAULT).unwrap().unwrap();
    assert_eq!(retry.message, Message::new("fragile"));
    provider.close();
}

#[test]
fn rejected_acknowledge_requeues_the_delivery() {
    let broker = broker_with_orders();
    broker.enqueue("orders.new", Message::new("a"));
    let provider = provider(&broker);
    let uri = orders_uri();

    let delivery = provider.fetch(&uri, FetchFlags::CONFIRM).unwrap().unwrap();
    broker.reject_next_ack();
    let err = provider
        .acknowledge(delivery.token.as_ref().unwrap(), AckFlags::DEFAULT)
        .unwrap_err();
    assert_eq!(err.code(), "broker_rejected");
    assert_eq!(broker.queue_len("orders.new"), 1);
    assert_eq!(broker.unacked_len(), 0);
    provider.close();
}

#[test]
fn failed_acknowledge_and_discard_keep_the_token_usable() {
    let broker = broker_with_orders();
    broker.enqueue("orders.new", Message::new("a"));
    broker.enqueue("orders.new", Message::new("b"));
    let provider = provider(&broker);
    let uri = orders_uri();

    let first = provider.fetch(&uri, FetchFlags::CONFIRM).unwrap().unwrap();
    let second = provider.fetch(&uri, FetchFlags::CONFIRM).unwrap().unwrap();
    let first = first.token.unwrap();
    let second = second.token.unwrap();

    broker.set_online(false);
    let err = provider.acknowledge(&first, AckFlags::DEFAULT).unwrap_err();
    assert_eq!(err.code(), "broker_unavailable");
    let err = provider.discard(&second, DiscardFlags::REQUEUE).unwrap_err();
    assert_eq!(err.code(), "broker_unavailable");

    broker.set_online(true);
    provider.acknowledge(&first, AckFlags::DEFAULT).unwrap();
    provider.discard(&second, DiscardFlags::REQUEUE).unwrap();
    assert_eq!(broker.unacked_len(), 0);
    assert_eq!(broker.queue_len("orders.new"), 1);
    provider.close();
}

#[test]
fn evicted_provider_refuses_confirm_fetches() {
    let broker = broker_with_orders();
    broker.enqueue("orders.new", Message::new("a"));
    let resolver = BrokerResolver::new(BrokerLookup::from_config(
        &BusConfig::default(),
        Arc::new(broker.connector()),
    ));
    let uri = orders_uri();
    let held = resolver.resolve_provider(&mut orders_uri()).unwrap().unwrap();

    resolver.lookup().evict(&uri);
    let err = held.fetch(&uri, FetchFlags::CONFIRM).unwrap_err();
    assert!(err.is_runtime());
    assert_eq!(err.code(), "provider_closed");
    assert_eq!(broker.queue_len("orders.new"), 1);
    assert_eq!(broker.unacked_len(), 0);

    let fresh = resolver.resolve_provider(&mut orders_uri()).unwrap().unwrap();
    let delivery = fresh.fetch(&uri, FetchFlags::CONFIRM).unwrap().unwrap();
    fresh.acknowledge(delivery.token.as_ref().unwrap(), AckFlags::DEFAULT).unwrap();
    resolver.lookup().clear();
}

#[test]
fn publishing_to_an_undeclared_exchange_is_rejected() {
    let broker = InMemoryBroker::new();
    let uri = orders_uri();
    let pair = open_broker(&uri, &broker.connector()).unwrap();
    let err = pair.process_message(&uri, &Message::new("x")).unwrap_err();
    assert!(err.is_runtime());
    assert_eq!(err.code(), "broker_rejected");
}

#[test]
fn close_requeues_unconfirmed_deliveries() {
    let broker = broker_with_orders();
    broker.enqueue("orders.new", Message::new("a"));
    broker.enqueue("orders.new", Message::new("b"));
    let endpoint = courier_bus::BrokerEndpoint::parse(&orders_uri()).unwrap();
    let connection = courier_bus::Connector::connection(&broker.connector(), &endpoint).unwrap();
    let provider = BrokerProvider::new(endpoint, connection);
    let uri = orders_uri();

    provider.fetch(&uri, FetchFlags::CONFIRM).unwrap().unwrap();
    provider.fetch(&uri, FetchFlags::CONFIRM).unwrap().unwrap();
    assert_eq!(provider.pending_len(), 2);
    assert_eq!(broker.queue_len("orders.new"), 0);

    provider.close();
    assert_eq!(provider.pending_len(), 0);
    assert_eq!(broker.unacked_len(), 0);
    assert_eq!(broker.queue_len("orders.new"), 2);
}

#[test]
#[tracing_test::traced_test]
fn failed_requeue_at_close_is_logged_not_raised() {
    let broker = broker_with_orders();
    broker.enqueue("orders.new", Message::new("a"));
    let provider = provider(&broker);
    provider
        .fetch(&orders_uri(), FetchFlags::CONFIRM)
        .unwrap()
        .unwrap();

    broker.set_online(false);
    provider.close();
    assert!(logs_contain("failed to requeue unconfirmed delivery"));
}

#[test]
fn proxy_routes_broker_and_registry_providers() {
    let broker = broker_with_orders();
    broker.enqueue("orders.new", Message::new("from-broker"));
    let queue = Arc::new(QueueProvider::new());
    let local = Url::parse("memory://jobs").unwrap();
    queue.push(&local, Message::new("from-memory"));

    let brokers: Arc<dyn Resolver> = Arc::new(BrokerResolver::new(BrokerLookup::new(
        "amqp",
        Arc::new(broker.connector()),
    )));
    let resolver = RegistryResolver::new(
        SchemeRegistry::new().with_provider("memory", queue.clone() as Arc<dyn Provider>),
    )
    .with_fallback(brokers);
    let proxy = ProxyProvider::new(Arc::new(resolver));

    let remote = proxy
        .fetch(&orders_uri(), FetchFlags::CONFIRM)
        .unwrap()
        .unwrap();
    let memory = proxy.fetch(&local, FetchFlags::CONFIRM).unwrap().unwrap();
    assert_eq!(remote.message, Message::new("from-broker"));
    assert_eq!(memory.message, Message::new("from-memory"));
    assert_eq!(broker.unacked_len(), 1);
    assert_eq!(queue.pending_len(), 1);

    proxy
        .acknowledge(remote.token.as_ref().unwrap(), AckFlags::DEFAULT)
        .unwrap();
    assert_eq!(broker.unacked_len(), 0);
    assert_eq!(queue.pending_len(), 1);

    proxy.close();
    assert_eq!(proxy.pending_len(), 0);
    queue.close();
}

#[test]
fn recording_handler_sees_rewritten_uri() {
    let recorder = Arc::new(RecordingHandler::new());
    let aliases = courier_core::RoutingConfig::from_yaml_str(
        "aliases:\n  \"urn:orders\": [\"log://orders\"]\n",
    )
    .unwrap()
    .uri_resolver()
    .unwrap();
    let resolver = RegistryResolver::new(
        SchemeRegistry::new().with_handler("log", recorder.clone() as Arc<dyn Handler>),
    )
    .with_uri_resolver(Arc::new(aliases));

    let mut uri = Url::parse("urn:orders").unwrap();
    let handler = resolver.resolve_handler(&mut uri).unwrap().unwrap();
    handler.process(&uri, b"hello", None).unwrap();

    let seen = recorder.take();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_str(), "log://orders");
}
