//! Process-wide metrics registry.
//!
//! Counters and gauges are atomics; labeled families live in a `DashMap`
//! keyed by the rendered label body so exposition is a straight dump.
//! Every update is a single atomic operation or one map-entry mutation
//! under the entry's shard lock — no sampling, no batching.

mod instruments;

pub use instruments::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramSnapshot, HistogramVec,
};

use std::fmt::Write;
use std::sync::Arc;

/// Bucket layouts, matching the exposition the monitor has always shipped.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];
const TTL_BUCKETS: &[f64] = &[
    60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0, 28800.0, 86400.0,
];
const RECORD_COUNT_BUCKETS: &[f64] = &[
    0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0,
    17.0, 18.0, 19.0,
];
const SIZE_BUCKETS: &[f64] = &[
    64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0, 8192.0, 16384.0, 32768.0,
];

/// Every instrument the resolver, cache, breakers, pool, and health probe
/// update. One instance per process, shared via `Arc`.
pub struct Metrics {
    pub total_queries: CounterVec,
    pub success_queries: CounterVec,
    pub failure_queries: CounterVec,
    pub query_duration_seconds: HistogramVec,
    pub response_size_bytes: HistogramVec,
    pub record_count: HistogramVec,
    pub ttl_seconds: HistogramVec,
    pub consistency: GaugeVec,
    pub cycle_duration_seconds: Histogram,
    pub cache_hits: CounterVec,
    pub cache_hits_aggregate: Counter,
    pub cache_misses: CounterVec,
    pub cache_misses_aggregate: Counter,
    pub cache_evictions_total: Counter,
    pub cache_size: Gauge,
    pub breaker_state: GaugeVec,
    pub breaker_failures_total: CounterVec,
    pub dnssec_support: GaugeVec,
    pub edns_support: GaugeVec,
    pub pool_protocol_total: CounterVec,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_queries: CounterVec::new(&["server", "hostname"]),
            success_queries: CounterVec::new(&["server", "hostname"]),
            failure_queries: CounterVec::new(&["server", "hostname", "error_type"]),
            query_duration_seconds: HistogramVec::new(&["server", "hostname"], DURATION_BUCKETS),
            response_size_bytes: HistogramVec::new(&["server", "hostname"], SIZE_BUCKETS),
            record_count: HistogramVec::new(
                &["server", "hostname", "record_type"],
                RECORD_COUNT_BUCKETS,
            ),
            ttl_seconds: HistogramVec::new(&["server", "hostname", "record_type"], TTL_BUCKETS),
            consistency: GaugeVec::new(&["hostname"]),
            cycle_duration_seconds: Histogram::new(DURATION_BUCKETS),
            cache_hits: CounterVec::new(&["server", "hostname"]),
            cache_hits_aggregate: Counter::new(),
            cache_misses: CounterVec::new(&["server", "hostname"]),
            cache_misses_aggregate: Counter::new(),
            cache_evictions_total: Counter::new(),
            cache_size: Gauge::new(),
            breaker_state: GaugeVec::new(&["server"]),
            breaker_failures_total: CounterVec::new(&["server"]),
            dnssec_support: GaugeVec::new(&["server", "hostname"]),
            edns_support: GaugeVec::new(&["server", "hostname"]),
            pool_protocol_total: CounterVec::new(&["server", "protocol"]),
        })
    }

    /// Render the whole registry in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(4096);

        counter_family(
            &mut out,
            "total_queries",
            "Total number of DNS resolution attempts",
            None,
            &self.total_queries,
        );
        counter_family(
            &mut out,
            "success_queries",
            "Number of successful DNS resolutions",
            None,
            &self.success_queries,
        );
        counter_family(
            &mut out,
            "failure_queries",
            "Number of failed DNS resolutions",
            None,
            &self.failure_queries,
        );
        histogram_family(
            &mut out,
            "query_duration_seconds",
            "DNS resolution duration in seconds",
            &self.query_duration_seconds.series(),
        );
        histogram_family(
            &mut out,
            "response_size_bytes",
            "Size of DNS responses in bytes",
            &self.response_size_bytes.series(),
        );
        histogram_family(
            &mut out,
            "record_count",
            "Number of records in DNS responses",
            &self.record_count.series(),
        );
        histogram_family(
            &mut out,
            "ttl_seconds",
            "TTL values from DNS responses",
            &self.ttl_seconds.series(),
        );
        gauge_family(
            &mut out,
            "consistency",
            "Whether DNS responses are consistent across servers",
            &self.consistency,
        );
        let mut cycle = Vec::new();
        cycle.push((String::new(), self.cycle_duration_seconds.snapshot()));
        histogram_family(
            &mut out,
            "cycle_duration_seconds",
            "Duration of a full resolution cycle in seconds",
            &cycle,
        );
        counter_family(
            &mut out,
            "cache_hits_total",
            "Number of cache hits",
            Some(self.cache_hits_aggregate.get()),
            &self.cache_hits,
        );
        counter_family(
            &mut out,
            "cache_misses_total",
            "Number of cache misses",
            Some(self.cache_misses_aggregate.get()),
            &self.cache_misses,
        );
        simple_counter(
            &mut out,
            "cache_evictions_total",
            "Number of cache evictions",
            self.cache_evictions_total.get(),
        );
        simple_gauge(
            &mut out,
            "cache_size",
            "Current number of entries in the DNS cache",
            self.cache_size.get(),
        );
        gauge_family(
            &mut out,
            "breaker_state",
            "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
            &self.breaker_state,
        );
        counter_family(
            &mut out,
            "breaker_failures_total",
            "Number of recorded failures per server",
            None,
            &self.breaker_failures_total,
        );
        gauge_family(
            &mut out,
            "dnssec_support",
            "DNSSEC support status (1=supported, 0=not supported)",
            &self.dnssec_support,
        );
        gauge_family(
            &mut out,
            "edns_support",
            "EDNS support status (1=supported, 0=not supported)",
            &self.edns_support,
        );
        counter_family(
            &mut out,
            "pool_protocol_total",
            "Client pool events by protocol classification",
            None,
            &self.pool_protocol_total,
        );

        out
    }
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

fn simple_counter(out: &mut String, name: &str, help: &str, value: u64) {
    header(out, name, help, "counter");
    let _ = writeln!(out, "{name} {value}");
}

fn simple_gauge(out: &mut String, name: &str, help: &str, value: f64) {
    header(out, name, help, "gauge");
    let _ = writeln!(out, "{name} {value}");
}

fn counter_family(
    out: &mut String,
    name: &str,
    help: &str,
    aggregate: Option<u64>,
    vec: &CounterVec,
) {
    header(out, name, help, "counter");
    if let Some(value) = aggregate {
        let _ = writeln!(out, "{name} {value}");
    }
    for (labels, value) in vec.series() {
        let _ = writeln!(out, "{name}{{{labels}}} {value}");
    }
}

fn gauge_family(out: &mut String, name: &str, help: &str, vec: &GaugeVec) {
    header(out, name, help, "gauge");
    for (labels, value) in vec.series() {
        let _ = writeln!(out, "{name}{{{labels}}} {value}");
    }
}

fn histogram_family(
    out: &mut String,
    name: &str,
    help: &str,
    series: &[(String, instruments::HistogramSnapshot)],
) {
    header(out, name, help, "histogram");
    for (labels, snapshot) in series {
        let mut cumulative = 0u64;
        for (upper, count) in snapshot.buckets.iter() {
            cumulative += count;
            if labels.is_empty() {
                let _ = writeln!(out, "{name}_bucket{{le=\"{upper}\"}} {cumulative}");
            } else {
                let _ = writeln!(out, "{name}_bucket{{{labels},le=\"{upper}\"}} {cumulative}");
            }
        }
        if labels.is_empty() {
            let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {}", snapshot.count);
            let _ = writeln!(out, "{name}_sum {}", snapshot.sum);
            let _ = writeln!(out, "{name}_count {}", snapshot.count);
        } else {
            let _ = writeln!(out, "{name}_bucket{{{labels},le=\"+Inf\"}} {}", snapshot.count);
            let _ = writeln!(out, "{name}_sum{{{labels}}} {}", snapshot.sum);
            let _ = writeln!(out, "{name}_count{{{labels}}} {}", snapshot.count);
        }
    }
}
