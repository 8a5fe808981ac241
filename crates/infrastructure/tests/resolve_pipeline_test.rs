//! The per-server resolve pipeline, driven end to end against a local
//! mock DNS server: cache, breaker, rcode, timeout, and success paths.

use dnsres_domain::{DnsResponse, ResolveError};
use dnsres_infrastructure::events::EventType;
use dnsres_infrastructure::DnsResolver;
use hickory_proto::op::ResponseCode;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod helpers;
use helpers::{test_config, MockBehavior, MockDnsServer};

fn seeded_response(hostname: &str, server: &str, addresses: &[&str]) -> Arc<DnsResponse> {
    Arc::new(DnsResponse {
        server: server.to_string(),
        hostname: hostname.to_string(),
        addresses: addresses.iter().map(|a| a.to_string()).collect(),
        ttl: 60,
        ..Default::default()
    })
}

#[tokio::test]
async fn cache_hit_short_circuits_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let server = "127.0.0.1:1".to_string();
    let resolver = DnsResolver::new(test_config(
        vec![server.clone()],
        vec!["ex.com".to_string()],
        dir.path(),
    ))
    .unwrap();

    let seeded = seeded_response("ex.com", &server, &["1.2.3.4"]);
    resolver
        .cache()
        .set("ex.com", Arc::clone(&seeded), std::time::Duration::from_secs(60));

    let (mut events, _sub) = resolver.subscribe_events(8);
    let token = CancellationToken::new();

    let resolved = resolver
        .resolve_with_server(&server, "ex.com", &token)
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&resolved, &seeded));
    let metrics = resolver.metrics();
    assert_eq!(metrics.cache_hits.get(&[server.as_str(), "ex.com"]), 1);
    // No network, no breaker involvement.
    assert_eq!(metrics.total_queries.get(&[server.as_str(), "ex.com"]), 0);
    assert_eq!(resolver.breaker(&server).unwrap().failures(), 0);

    let event = events.try_recv().unwrap();
    assert_eq!(event.event_type, EventType::ResolveSuccess);
    assert_eq!(event.source, "cache");
    assert_eq!(event.addresses, vec!["1.2.3.4"]);
    assert!(event.duration.is_zero());
}

#[tokio::test]
async fn open_breaker_blocks_before_pool_and_network() {
    let dir = tempfile::tempdir().unwrap();
    let server = "127.0.0.1:1".to_string();
    let mut config = test_config(vec![server.clone()], vec!["ex.com".to_string()], dir.path());
    config.circuit_breaker.threshold = 1;
    let resolver = DnsResolver::new(config).unwrap();

    resolver.breaker(&server).unwrap().record_failure();

    let (mut events, _sub) = resolver.subscribe_events(8);
    let token = CancellationToken::new();

    let err = resolver
        .resolve_with_server(&server, "ex.com", &token)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::CircuitOpen { .. }));

    let metrics = resolver.metrics();
    assert_eq!(
        metrics
            .failure_queries
            .get(&[server.as_str(), "ex.com", "circuit_breaker"]),
        1
    );
    assert_eq!(metrics.total_queries.get(&[server.as_str(), "ex.com"]), 0);
    assert_eq!(metrics.pool_protocol_total.get(&[server.as_str(), "new"]), 0);

    let event = events.try_recv().unwrap();
    assert_eq!(event.event_type, EventType::ResolveFailure);
    assert_eq!(event.source, "circuit_breaker");
    assert_eq!(event.error, "circuit breaker open");
}

#[tokio::test]
async fn error_rcode_records_failure_with_the_mnemonic() {
    let dir = tempfile::tempdir().unwrap();
    let (mock, addr) = MockDnsServer::start(MockBehavior::Rcode(ResponseCode::ServFail))
        .await
        .unwrap();
    let server = addr.to_string();
    let resolver = DnsResolver::new(test_config(
        vec![server.clone()],
        vec!["ex.com".to_string()],
        dir.path(),
    ))
    .unwrap();

    let (mut events, _sub) = resolver.subscribe_events(8);
    let token = CancellationToken::new();

    let err = resolver
        .resolve_with_server(&server, "ex.com", &token)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Rcode(ref code) if code == "SERVFAIL"));

    let metrics = resolver.metrics();
    assert_eq!(metrics.total_queries.get(&[server.as_str(), "ex.com"]), 1);
    assert_eq!(
        metrics.failure_queries.get(&[server.as_str(), "ex.com", "SERVFAIL"]),
        1
    );
    assert_eq!(metrics.query_duration_seconds.count(&[server.as_str(), "ex.com"]), 1);
    assert_eq!(resolver.breaker(&server).unwrap().failures(), 1);

    // cache miss event ordering: the first published event is the failure
    let event = events.try_recv().unwrap();
    assert_eq!(event.event_type, EventType::ResolveFailure);
    assert_eq!(event.source, "rcode");
    assert_eq!(event.error, "SERVFAIL");

    mock.shutdown();
}

#[tokio::test]
async fn transport_timeout_is_a_query_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mock, addr) = MockDnsServer::start(MockBehavior::Silent).await.unwrap();
    let server = addr.to_string();
    let resolver = DnsResolver::new(test_config(
        vec![server.clone()],
        vec!["ex.com".to_string()],
        dir.path(),
    ))
    .unwrap();

    let (mut events, _sub) = resolver.subscribe_events(8);
    let token = CancellationToken::new();

    let err = resolver
        .resolve_with_server(&server, "ex.com", &token)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Query(_)));

    let metrics = resolver.metrics();
    assert_eq!(
        metrics
            .failure_queries
            .get(&[server.as_str(), "ex.com", "query_error"]),
        1
    );
    // A transport failure never reaches the duration histogram.
    assert_eq!(metrics.query_duration_seconds.count(&[server.as_str(), "ex.com"]), 0);
    assert_eq!(resolver.breaker(&server).unwrap().failures(), 1);

    let event = events.try_recv().unwrap();
    assert_eq!(event.event_type, EventType::ResolveFailure);
    assert_eq!(event.source, "query_error");
    assert!(event.error.contains("timeout"));

    mock.shutdown();
}

#[tokio::test]
async fn successful_query_caches_and_publishes() {
    let dir = tempfile::tempdir().unwrap();
    let (mock, addr) = MockDnsServer::start(MockBehavior::Answer {
        addresses: vec![Ipv4Addr::new(93, 184, 216, 34)],
        ttl: 120,
    })
    .await
    .unwrap();
    let server = addr.to_string();
    let resolver = DnsResolver::new(test_config(
        vec![server.clone()],
        vec!["ex.com".to_string()],
        dir.path(),
    ))
    .unwrap();

    let (mut events, _sub) = resolver.subscribe_events(8);
    let token = CancellationToken::new();

    let resolved = resolver
        .resolve_with_server(&server, "ex.com", &token)
        .await
        .unwrap();

    assert_eq!(resolved.addresses, vec!["93.184.216.34"]);
    assert_eq!(resolved.ttl, 120);
    assert_eq!(resolved.record_count.get("A"), Some(&1));
    assert!(resolved.edns);

    let metrics = resolver.metrics();
    assert_eq!(metrics.success_queries.get(&[server.as_str(), "ex.com"]), 1);
    assert_eq!(metrics.query_duration_seconds.count(&[server.as_str(), "ex.com"]), 1);
    assert_eq!(metrics.response_size_bytes.count(&[server.as_str(), "ex.com"]), 1);

    let event = events.try_recv().unwrap();
    assert_eq!(event.event_type, EventType::ResolveSuccess);
    assert_eq!(event.source, "query");
    assert_eq!(event.addresses, vec!["93.184.216.34"]);

    // The cache was written before the event was published, so a reader
    // reacting to it sees the entry.
    let cached = resolver.cache().get("ex.com").expect("expected cache entry");
    assert!(Arc::ptr_eq(&cached, &resolved));

    // A second resolve is served from cache without touching the network.
    resolver
        .resolve_with_server(&server, "ex.com", &token)
        .await
        .unwrap();
    assert_eq!(metrics.total_queries.get(&[server.as_str(), "ex.com"]), 1);
    assert_eq!(metrics.cache_hits.get(&[server.as_str(), "ex.com"]), 1);

    mock.shutdown();
}

#[tokio::test]
async fn cancellation_classifies_as_query_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mock, addr) = MockDnsServer::start(MockBehavior::Silent).await.unwrap();
    let server = addr.to_string();
    let resolver = DnsResolver::new(test_config(
        vec![server.clone()],
        vec!["ex.com".to_string()],
        dir.path(),
    ))
    .unwrap();

    let token = CancellationToken::new();
    token.cancel();

    let err = resolver
        .resolve_with_server(&server, "ex.com", &token)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Query(ref msg) if msg.contains("cancelled")));

    mock.shutdown();
}
