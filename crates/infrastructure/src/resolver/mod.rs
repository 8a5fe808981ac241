//! The resolution orchestrator.
//!
//! Runs the periodic cycle, fans out per-hostname workers (capped by a
//! counting semaphore) and per-server sub-workers, threads every query
//! through cache, breaker, pool, network, analysis, and cache-store, and
//! publishes lifecycle events for subscribers.

use crate::analysis;
use crate::breaker::CircuitBreaker;
use crate::cache::ShardedCache;
use crate::events::{EventBus, ResolverEvent, Subscription};
use crate::health::HealthProbe;
use crate::logging::ResolverLogs;
use crate::metrics::Metrics;
use crate::pool::ClientPool;
use crate::wire;
use dnsres_domain::{Config, DnsResponse, Level, ResolutionStats, ResolveError};
use hickory_proto::op::ResponseCode;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// At most this many hostname workers run the per-server fan-out at once.
const MAX_CONCURRENT_HOSTNAMES: usize = 10;

/// Idle clients kept per server in the pool.
const POOL_MAX_IDLE: usize = 100;

pub struct DnsResolver {
    config: Config,
    pool: ClientPool,
    breakers: HashMap<String, CircuitBreaker>,
    cache: ShardedCache,
    health: Arc<HealthProbe>,
    logs: ResolverLogs,
    stats: ResolutionStats,
    events: EventBus,
    metrics: Arc<Metrics>,
}

impl DnsResolver {
    pub fn new(mut config: Config) -> Result<Arc<Self>, ResolveError> {
        config.normalize();
        config.validate()?;

        let level = config.instrumentation_level();
        let metrics = Metrics::new();
        let logs = ResolverLogs::open(&config.log_dir, level)?;

        let pool = ClientPool::new(POOL_MAX_IDLE, *config.query_timeout, Arc::clone(&metrics));
        let breakers = config
            .dns_servers
            .iter()
            .map(|server| {
                (
                    server.clone(),
                    CircuitBreaker::new(
                        config.circuit_breaker.threshold,
                        *config.circuit_breaker.timeout,
                        server.clone(),
                        Arc::clone(&metrics),
                    ),
                )
            })
            .collect();
        let cache = ShardedCache::with_default_shards(config.cache.max_size, Arc::clone(&metrics));
        let health = Arc::new(HealthProbe::new(
            &config.dns_servers,
            Arc::clone(&metrics),
            level,
        ));
        let stats = ResolutionStats::new(&config.dns_servers);

        logs.app(
            Level::Low,
            &format!(
                "resolver initialized hostnames={} servers={} interval={} timeout={} instrumentation={}",
                config.hostnames.len(),
                config.dns_servers.len(),
                config.query_interval,
                config.query_timeout,
                level,
            ),
        );

        Ok(Arc::new(Self {
            config,
            pool,
            breakers,
            cache,
            health,
            logs,
            stats,
            events: EventBus::new(),
            metrics,
        }))
    }

    /// Channel of resolver activity events plus its unsubscribe handle.
    pub fn subscribe_events(
        &self,
        buffer: usize,
    ) -> (mpsc::Receiver<ResolverEvent>, Subscription) {
        self.events.subscribe(buffer)
    }

    /// Latest health probe status, copied out for UI consumption.
    pub fn health_snapshot(&self) -> HashMap<String, bool> {
        self.health.snapshot()
    }

    pub fn health(&self) -> &Arc<HealthProbe> {
        &self.health
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn cache(&self) -> &ShardedCache {
        &self.cache
    }

    pub fn breaker(&self, server: &str) -> Option<&CircuitBreaker> {
        self.breakers.get(server)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn log_dir(&self) -> &std::path::Path {
        self.logs.dir()
    }

    pub fn log_dir_was_fallback(&self) -> bool {
        self.logs.dir_was_fallback()
    }

    /// Ungated app-log line for server lifecycle errors.
    pub fn log_app_error(&self, message: &str) {
        self.logs.app(Level::None, message);
    }

    /// Run the resolution loop until the token is cancelled.
    ///
    /// One cycle runs immediately so the first data is available within a
    /// query timeout rather than a full interval; the ticker starts after.
    pub async fn start(self: Arc<Self>, token: CancellationToken) -> Result<(), ResolveError> {
        tokio::spawn(Arc::clone(&self.health).run(token.clone()));

        self.run_cycle(&token).await;
        info!(interval = %self.config.query_interval, "resolution loop started");
        self.logs.app(
            Level::Low,
            &format!("resolution loop started interval={}", self.config.query_interval),
        );

        let period = *self.config.query_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    self.logs.app(
                        Level::Low,
                        &format!("resolution tick fired interval={}", self.config.query_interval),
                    );
                    self.run_cycle(&token).await;
                }
            }
        }
    }

    /// One pass over every hostname against every server.
    pub async fn run_cycle(self: &Arc<Self>, token: &CancellationToken) {
        let start = Instant::now();
        let hostname_count = self.config.hostnames.len();
        let server_count = self.config.dns_servers.len();

        self.events
            .publish(ResolverEvent::cycle_start(hostname_count, server_count));
        debug!(hostnames = hostname_count, servers = server_count, "resolution cycle starting");
        self.logs.app(
            Level::Low,
            &format!("resolution cycle start hostnames={hostname_count} servers={server_count}"),
        );

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_HOSTNAMES));
        let mut workers = JoinSet::new();
        for hostname in self.config.hostnames.clone() {
            let resolver = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let token = token.clone();
            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else { return };
                resolver.resolve_hostname(&hostname, &token).await;
            });
        }
        while workers.join_next().await.is_some() {}

        let duration = start.elapsed();
        self.metrics
            .cycle_duration_seconds
            .observe(duration.as_secs_f64());
        self.events.publish(ResolverEvent::cycle_complete(
            duration,
            hostname_count,
            server_count,
        ));
        debug!(?duration, "resolution cycle complete");
        self.logs.app(
            Level::Low,
            &format!("resolution cycle complete duration={duration:?}"),
        );
    }

    /// Fan out one sub-worker per server, then compare the successful
    /// responses for cross-server consistency.
    async fn resolve_hostname(self: &Arc<Self>, hostname: &str, token: &CancellationToken) {
        let responses: Arc<Mutex<Vec<Arc<DnsResponse>>>> = Arc::new(Mutex::new(Vec::new()));

        let mut sub_workers = JoinSet::new();
        for server in self.config.dns_servers.clone() {
            let resolver = Arc::clone(self);
            let hostname = hostname.to_string();
            let responses = Arc::clone(&responses);
            let token = token.clone();
            sub_workers.spawn(async move {
                match resolver.resolve_with_server(&server, &hostname, &token).await {
                    Ok(response) => {
                        let state = resolver
                            .breakers
                            .get(&server)
                            .map(|breaker| breaker.state().to_string())
                            .unwrap_or_default();
                        resolver
                            .logs
                            .success(&format!("Resolved {hostname} using {server} (state: {state})"));
                        if let Ok(mut collected) = responses.lock() {
                            collected.push(response);
                        }
                    }
                    Err(err) => {
                        resolver
                            .logs
                            .error(&format!("Failed to resolve {hostname} using {server}: {err}"));
                    }
                }
            });
        }
        while sub_workers.join_next().await.is_some() {}

        let collected = responses
            .lock()
            .map(|collected| collected.clone())
            .unwrap_or_default();
        if collected.len() >= 2 {
            let consistent = analysis::compare_responses(&collected);
            self.metrics
                .consistency
                .set(&[hostname], if consistent { 1.0 } else { 0.0 });
            if !consistent {
                self.events.publish(ResolverEvent::inconsistent(hostname));
                self.logs
                    .app(Level::High, &format!("inconsistent responses hostname={hostname}"));
                self.logs.error(&format!("Inconsistent responses for {hostname}"));
            }
        }
    }

    /// The per-server resolve pipeline:
    /// cache → breaker → pool → network → analysis → cache-store → event.
    pub async fn resolve_with_server(
        &self,
        server: &str,
        hostname: &str,
        token: &CancellationToken,
    ) -> Result<Arc<DnsResponse>, ResolveError> {
        if let Some(cached) = self.cache.get(hostname) {
            self.metrics.cache_hits.inc(&[server, hostname]);
            self.logs.app(
                Level::Low,
                &format!("cache hit hostname={hostname} server={server}"),
            );
            self.events.publish(ResolverEvent::resolve_success(
                hostname,
                server,
                Duration::ZERO,
                cached.addresses.clone(),
                "cache",
            ));
            return Ok(cached);
        }
        self.metrics.cache_misses.inc(&[server, hostname]);
        self.logs.app(
            Level::Low,
            &format!("cache miss hostname={hostname} server={server}"),
        );

        let Some(breaker) = self.breakers.get(server) else {
            return Err(ResolveError::Query(format!("unknown server {server}")));
        };
        if !breaker.allow() {
            self.metrics
                .failure_queries
                .inc(&[server, hostname, "circuit_breaker"]);
            self.logs
                .app(Level::Medium, &format!("circuit breaker open server={server}"));
            self.events.publish(ResolverEvent::resolve_failure(
                hostname,
                server,
                Duration::ZERO,
                "circuit breaker open",
                "circuit_breaker",
            ));
            return Err(ResolveError::CircuitOpen {
                server: server.to_string(),
            });
        }

        let (client, protocol) = match self.pool.get(server) {
            Ok(acquired) => acquired,
            Err(err) => {
                self.logs.app(
                    Level::Medium,
                    &format!("client pool get failed server={server} err={err}"),
                );
                self.events.publish(ResolverEvent::resolve_failure(
                    hostname,
                    server,
                    Duration::ZERO,
                    &err.to_string(),
                    "client_pool",
                ));
                return Err(err);
            }
        };

        let query = match wire::build_a_query(hostname) {
            Ok(query) => query,
            Err(err) => {
                self.pool.put(server, client);
                return Err(self.fail_query(breaker, server, hostname, Duration::ZERO, &err));
            }
        };

        self.metrics.total_queries.inc(&[server, hostname]);
        let start = Instant::now();
        let exchanged = tokio::select! {
            _ = token.cancelled() => Err(ResolveError::Query("query cancelled".to_string())),
            result = client.exchange(&query, server) => result,
        };
        let elapsed = start.elapsed();
        self.pool.put(server, client);

        let bytes = match exchanged {
            Ok((bytes, _)) => bytes,
            Err(err) => return Err(self.fail_query(breaker, server, hostname, elapsed, &err)),
        };
        let message = match wire::parse_message(&bytes) {
            Ok(message) => message,
            Err(err) => return Err(self.fail_query(breaker, server, hostname, elapsed, &err)),
        };

        self.metrics
            .query_duration_seconds
            .observe(&[server, hostname], elapsed.as_secs_f64());

        if message.response_code() != ResponseCode::NoError {
            let mnemonic = wire::rcode_name(message.response_code());
            breaker.record_failure();
            self.stats.record_failure(server, mnemonic);
            self.metrics
                .failure_queries
                .inc(&[server, hostname, mnemonic]);
            self.logs.app(
                Level::Medium,
                &format!("DNS response error hostname={hostname} server={server} rcode={mnemonic}"),
            );
            self.events.publish(ResolverEvent::resolve_failure(
                hostname,
                server,
                elapsed,
                mnemonic,
                "rcode",
            ));
            return Err(ResolveError::Rcode(mnemonic.to_string()));
        }

        breaker.record_success();
        self.stats.record_success(server);
        self.metrics.success_queries.inc(&[server, hostname]);
        self.logs.app(
            Level::High,
            &format!("DNS response ok hostname={hostname} server={server} duration={elapsed:?}"),
        );

        let response = Arc::new(analysis::analyze_response(
            server,
            hostname,
            &message,
            bytes.len(),
            protocol,
            elapsed,
            &self.metrics,
        ));
        // Cache strictly before publishing, so a subscriber reacting to the
        // event can immediately read the entry back.
        self.cache.set(
            hostname,
            Arc::clone(&response),
            Duration::from_secs(u64::from(response.ttl)),
        );
        self.events.publish(ResolverEvent::resolve_success(
            hostname,
            server,
            elapsed,
            response.addresses.clone(),
            "query",
        ));

        Ok(response)
    }

    /// Shared failure path for transport-level query errors.
    fn fail_query(
        &self,
        breaker: &CircuitBreaker,
        server: &str,
        hostname: &str,
        elapsed: Duration,
        err: &ResolveError,
    ) -> ResolveError {
        let detail = match err {
            ResolveError::Query(message) => message.clone(),
            other => other.to_string(),
        };
        breaker.record_failure();
        self.stats.record_failure(server, &detail);
        self.metrics
            .failure_queries
            .inc(&[server, hostname, "query_error"]);
        self.logs.app(
            Level::Medium,
            &format!("DNS query failed hostname={hostname} server={server} err={detail}"),
        );
        self.events.publish(ResolverEvent::resolve_failure(
            hostname,
            server,
            elapsed,
            &detail,
            "query_error",
        ));
        ResolveError::Query(detail)
    }

    /// Per-server statistics table for `--report` mode.
    pub fn generate_report(&self) -> String {
        let mut report = String::new();
        report.push_str("Hour              | DNS Server     | Total    | Fails    | Fail %  \n");
        report.push_str("-----------------------------------------------------------------\n");

        let hour = self.stats.start_time.format("%Y-%m-%d %H:%M").to_string();
        for (server, stats) in self.stats.snapshot() {
            let fail_percent = if stats.total > 0 {
                stats.failures as f64 / stats.total as f64 * 100.0
            } else {
                0.0
            };
            let _ = writeln!(
                report,
                "{hour} | {server:<12} | {:<8} | {:<8} | {fail_percent:6.2}%",
                stats.total, stats.failures,
            );
        }

        report
    }
}
