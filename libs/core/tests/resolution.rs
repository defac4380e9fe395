use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use courier_core::*;

fn uri(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

fn noop_handler() -> Arc<dyn Handler> {
    Arc::new(CallbackHandler::new(|_uri, _message| Ok(())))
}

fn empty_provider() -> Arc<dyn Provider> {
    Arc::new(CallbackProvider::new(|_uri| Ok(None)))
}

#[test]
fn rewritten_uri_is_handed_back_to_the_caller() {
    let handler = noop_handler();
    let aliases = AliasUriResolver::new().with_alias("urn:a", ["urn:b"]).unwrap();
    let lookup = CallbackLookup::new({
        let handler = Arc::clone(&handler);
        move |candidate: &Url| {
            let found = SchemeRegistry::new();
            if candidate.as_str() == "urn:b" {
                found.register_handler("urn", Arc::clone(&handler));
            }
            Ok(Some(Arc::new(RegistryResolver::new(found)) as Arc<dyn Resolver>))
        }
    });
    let resolver = CallbackResolver::new(lookup).with_uri_resolver(Arc::new(aliases));

    let mut target = uri("urn:a");
    let resolved = resolver.resolve_handler(&mut target).unwrap().unwrap();
    assert!(Arc::ptr_eq(&resolved, &handler));
    assert_eq!(target.as_str(), "urn:b");
}

#[test]
fn first_candidate_with_a_hit_wins() {
    let aliases = AliasUriResolver::new()
        .with_alias("urn:orders", ["missing://x", "log://orders", "queue://orders"])
        .unwrap();
    let resolver = RegistryResolver::new(
        SchemeRegistry::new()
            .with_handler("log", noop_handler())
            .with_handler("queue", noop_handler()),
    )
    .with_uri_resolver(Arc::new(aliases));

    let mut target = uri("urn:orders");
    assert!(resolver.resolve_handler(&mut target).unwrap().is_some());
    assert_eq!(target.scheme(), "log");
}

#[test]
fn empty_candidate_list_falls_back_to_the_input() {
    let registry = SchemeRegistry::new().with_provider("memory", empty_provider());
    let resolver =
        RegistryResolver::new(registry).with_uri_resolver(Arc::new(AliasUriResolver::new()));
    let mut target = uri("memory://jobs");
    assert!(resolver.resolve_provider(&mut target).unwrap().is_some());
    assert_eq!(target.as_str(), "memory://jobs");
}

#[test]
fn misses_delegate_to_the_fallback_with_the_original_uri() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
    let fallback = CallbackResolver::new(CallbackLookup::new({
        let seen = Arc::clone(&seen);
        move |candidate: &Url| {
            seen.lock().unwrap().push(candidate.to_string());
            Ok(Some(Arc::new(RegistryResolver::new(
                SchemeRegistry::new().with_provider("amqp", empty_provider()),
            )) as Arc<dyn Resolver>))
        }
    }));
    let aliases = AliasUriResolver::new()
        .with_alias("urn:jobs", ["missing://one", "missing://two"])
        .unwrap();
    let primary = RegistryResolver::new(SchemeRegistry::new())
        .with_uri_resolver(Arc::new(aliases))
        .with_fallback(Arc::new(fallback));

    let mut target = uri("urn:jobs");
    assert!(primary.resolve_provider(&mut target).unwrap().is_none());
    assert_eq!(seen.lock().unwrap().as_slice(), ["urn:jobs"]);

    let mut target = uri("amqp://mq/?queue-name=jobs");
    assert!(primary.resolve_provider(&mut target).unwrap().is_some());
}

#[test]
fn not_found_is_not_an_error() {
    let resolver = RegistryResolver::new(SchemeRegistry::new().with_handler("log", noop_handler()));
    let mut target = uri("log://x");
    assert!(resolver.resolve_provider(&mut target).unwrap().is_none());
    assert!(resolver.resolve_handler(&mut target).unwrap().is_some());
}

#[test]
fn scheme_lookup_is_case_insensitive() {
    let registry = SchemeRegistry::new().with_handler("Log", noop_handler());
    let resolver = RegistryResolver::new(registry);
    let mut target = uri("LOG://audit");
    assert!(resolver.resolve_handler(&mut target).unwrap().is_some());
    assert!(resolver.lookup().remove_handler("log").is_some());
    assert!(resolver.resolve_handler(&mut target).unwrap().is_none());
}

#[test]
fn callback_lookup_errors() {
    let failing =
        CallbackResolver::new(CallbackLookup::new(|_uri| anyhow::bail!("registry offline")));
    let err = failing.resolve_handler(&mut uri("urn:x")).err().unwrap();
    assert!(err.is_runtime());
    assert_eq!(err.code(), "resolver_callback");

    let domain = CallbackResolver::new(CallbackLookup::new(|_uri| {
        Err(MsgError::argument("bad_route", "route table corrupt").into())
    }));
    let err = domain.resolve_provider(&mut uri("urn:x")).err().unwrap();
    assert!(err.is_argument());
    assert_eq!(err.code(), "bad_route");

    let empty = CallbackResolver::new(CallbackLookup::new(|_uri| Ok(None)));
    let err = empty.resolve_provider(&mut uri("urn:x")).err().unwrap();
    assert!(err.is_runtime());
}

#[test]
fn resolution_consults_the_uri_resolver_each_time() {
    struct Counting(AtomicUsize);

    impl UriResolver for Counting {
        fn resolve_uri(&self, uri: &Url) -> Result<Vec<Url>, MsgError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![uri.clone()])
        }
    }

    let counter = Arc::new(Counting(AtomicUsize::new(0)));
    let resolver = RegistryResolver::new(SchemeRegistry::new().with_handler("log", noop_handler()))
        .with_uri_resolver(counter.clone());
    for _ in 0..3 {
        resolver.resolve_handler(&mut uri("log://x")).unwrap();
    }
    assert_eq!(counter.0.load(Ordering::SeqCst), 3);
}

#[test]
fn routing_config_feeds_the_uri_resolver() {
    let config =
        RoutingConfig::from_yaml_str("aliases:\n  \"urn:audit\": [\"log://audit\"]\n").unwrap();
    let registry = SchemeRegistry::new().with_handler("log", Arc::new(LogHandler::default()));
    let resolver = RegistryResolver::new(registry)
        .with_uri_resolver(Arc::new(config.uri_resolver().unwrap()));
    let mut target = uri("urn:audit");
    let handler = resolver.resolve_handler(&mut target).unwrap().unwrap();
    handler.process(&target, b"entry", None).unwrap();
    assert_eq!(target.as_str(), "log://audit");
}
