//! Response decoding and cross-server consistency comparison.

use crate::metrics::Metrics;
use dnsres_domain::{DnsResponse, PoolProtocol};
use hickory_proto::op::Message;
use hickory_proto::rr::{RData, RecordType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Decode a successful response into a [`DnsResponse`] and emit the
/// per-response metric observations (record counts, TTLs, DNSSEC/EDNS
/// support, response size).
pub fn analyze_response(
    server: &str,
    hostname: &str,
    message: &Message,
    size: usize,
    protocol: PoolProtocol,
    duration: Duration,
    metrics: &Metrics,
) -> DnsResponse {
    let mut addresses = Vec::new();
    let mut record_count: HashMap<String, u32> = HashMap::new();

    for record in message.answers() {
        let type_name = record.record_type().to_string();
        *record_count.entry(type_name.clone()).or_insert(0) += 1;
        metrics
            .ttl_seconds
            .observe(&[server, hostname, type_name.as_str()], f64::from(record.ttl()));

        if let RData::A(a) = record.data() {
            addresses.push(a.0.to_string());
        }
    }

    for (type_name, count) in &record_count {
        metrics
            .record_count
            .observe(&[server, hostname, type_name.as_str()], f64::from(*count));
    }

    let dnssec = has_dnssec(message);
    let edns = has_edns(message);
    metrics
        .dnssec_support
        .set(&[server, hostname], if dnssec { 1.0 } else { 0.0 });
    metrics
        .edns_support
        .set(&[server, hostname], if edns { 1.0 } else { 0.0 });
    metrics
        .response_size_bytes
        .observe(&[server, hostname], size as f64);

    DnsResponse {
        server: server.to_string(),
        hostname: hostname.to_string(),
        addresses,
        ttl: min_ttl(message),
        record_count,
        size,
        dnssec,
        edns,
        protocol,
        duration,
    }
}

/// Minimum TTL across answer records, 0 for an empty answer section.
pub fn min_ttl(message: &Message) -> u32 {
    message
        .answers()
        .iter()
        .map(|record| record.ttl())
        .min()
        .unwrap_or(0)
}

pub fn has_dnssec(message: &Message) -> bool {
    message.answers().iter().any(|record| {
        matches!(
            record.record_type(),
            RecordType::RRSIG | RecordType::DNSKEY
        )
    })
}

pub fn has_edns(message: &Message) -> bool {
    message.extensions().is_some()
}

/// Whether every response in the list reports the same address set.
///
/// Address order is not semantic; the explicit length check guards against
/// duplicate addresses masking a difference. A list of at most one response
/// is trivially consistent.
pub fn compare_responses(responses: &[Arc<DnsResponse>]) -> bool {
    let Some((first, rest)) = responses.split_first() else {
        return true;
    };

    let first_set: HashSet<&str> = first.addresses.iter().map(String::as_str).collect();
    rest.iter().all(|response| {
        response.addresses.len() == first.addresses.len()
            && response
                .addresses
                .iter()
                .all(|addr| first_set.contains(addr.as_str()))
    })
}
