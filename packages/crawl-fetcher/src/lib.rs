//! HTTP Fetcher (C1) — concrete `crawl_core::fetcher::HttpFetcher`
//! implementation: per-host token bucket (governor), retry with full
//! jitter, a per-host circuit breaker, robots.txt compliance, and
//! user-agent/proxy round-robin.
//!
//! Grounded in `kernel::simple_scraper::SimpleScraper`'s reqwest client
//! construction (custom headers, bounded redirects, explicit timeout)
//! and `extraction::crawlers::rate_limited::RateLimitedCrawler`'s use
//! of `governor`, generalized from one global limiter to a keyed
//! per-host one.

mod circuit;
mod robots;

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use rand::Rng;
use reqwest::redirect::Policy;
use url::Url;

use crawl_core::fetcher::{FetchError, FetchedPage, HttpFetcher};

use circuit::{Admission, CircuitBreaker};
use robots::RobotsCache;

type HostRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub rate_per_host: f64,
    pub burst_per_host: u32,
    pub rate_limit_wait: Duration,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub request_timeout: Duration,
    pub robots_respect: bool,
    pub robots_ttl: Duration,
    pub user_agents: Vec<String>,
    pub proxies: Vec<String>,
    pub circuit_fail_threshold: u32,
    pub circuit_failure_window: Duration,
    pub circuit_cool_off: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            rate_per_host: 1.0,
            burst_per_host: 2,
            rate_limit_wait: Duration::from_secs(5),
            max_retries: 3,
            initial_backoff_ms: 300,
            max_backoff_ms: 5000,
            request_timeout: Duration::from_secs(20),
            robots_respect: true,
            robots_ttl: Duration::from_secs(3600),
            user_agents: vec!["Mozilla/5.0 (compatible; CareerCrawlBot/1.0)".to_string()],
            proxies: Vec::new(),
            circuit_fail_threshold: 5,
            circuit_failure_window: Duration::from_secs(60),
            circuit_cool_off: Duration::from_secs(60),
        }
    }
}

fn retryable_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429) || status >= 500
}

fn non_retryable_status(status: u16) -> bool {
    matches!(status, 400 | 401 | 403 | 404 | 410 | 422)
}

fn backoff_delay_ms(attempt: u32, initial_ms: u64, max_ms: u64) -> u64 {
    let exp = initial_ms.saturating_mul(1u64 << attempt.min(20));
    let cap = exp.min(max_ms);
    if cap == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=cap)
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
}

fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{}://{}:{}", parsed.scheme(), host, port)),
        None => Some(format!("{}://{}", parsed.scheme(), host)),
    }
}

pub struct ReqwestFetcher {
    clients: Vec<reqwest::Client>,
    client_cursor: AtomicUsize,
    user_agents: Vec<String>,
    ua_cursor: AtomicUsize,
    limiter: HostRateLimiter,
    rate_limit_wait: Duration,
    circuit: CircuitBreaker,
    robots: RobotsCache,
    robots_respect: bool,
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl ReqwestFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, reqwest::Error> {
        let user_agents = if config.user_agents.is_empty() {
            vec![FetcherConfig::default().user_agents[0].clone()]
        } else {
            config.user_agents
        };

        let mut clients = Vec::new();
        if config.proxies.is_empty() {
            clients.push(Self::build_client(&config.request_timeout, None)?);
        } else {
            for proxy_url in &config.proxies {
                let proxy = reqwest::Proxy::all(proxy_url)?;
                clients.push(Self::build_client(&config.request_timeout, Some(proxy))?);
            }
        }

        let rate = config.rate_per_host.max(0.001);
        let quota = Quota::with_period(Duration::from_secs_f64(1.0 / rate))
            .expect("rate_per_host must be positive")
            .allow_burst(NonZeroU32::new(config.burst_per_host.max(1)).unwrap());

        Ok(Self {
            clients,
            client_cursor: AtomicUsize::new(0),
            user_agents,
            ua_cursor: AtomicUsize::new(0),
            limiter: RateLimiter::keyed(quota),
            rate_limit_wait: config.rate_limit_wait,
            circuit: CircuitBreaker::new(
                config.circuit_fail_threshold,
                config.circuit_failure_window,
                config.circuit_cool_off,
            ),
            robots: RobotsCache::new(config.robots_ttl),
            robots_respect: config.robots_respect,
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        })
    }

    fn build_client(
        timeout: &Duration,
        proxy: Option<reqwest::Proxy>,
    ) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(*timeout)
            .redirect(Policy::limited(5))
            .connect_timeout(Duration::from_secs(10));
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy);
        }
        builder.build()
    }

    fn next_client(&self) -> &reqwest::Client {
        let idx = self.client_cursor.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[idx]
    }

    fn next_user_agent(&self) -> &str {
        let idx = self.ua_cursor.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        &self.user_agents[idx]
    }

    async fn wait_for_rate_limit(&self, host: &str) -> Result<(), FetchError> {
        match self.limiter.check_key(&host.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                if wait > self.rate_limit_wait {
                    return Err(FetchError::RateLimitedLocal { host: host.to_string() });
                }
                tokio::time::sleep(wait).await;
                Ok(())
            }
        }
    }

    async fn single_attempt(&self, url: &str, user_agent: &str) -> Result<FetchedPage, FetchError> {
        let client = self.next_client();
        let response = client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .header(reqwest::header::ACCEPT, "text/html,application/json;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout { url: url.to_string() }
                } else {
                    FetchError::Transport { url: url.to_string(), message: e.to_string() }
                }
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !response.status().is_success() {
            if let Some(secs) = retry_after {
                tokio::time::sleep(Duration::from_millis((secs * 1000).min(self.max_backoff_ms))).await;
            }
            return Err(FetchError::HttpStatus { url: url.to_string(), status });
        }

        let body = response.text().await.map_err(|e| FetchError::MalformedResponse {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(FetchedPage { url: url.to_string(), status, body, content_type })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let host = host_of(url).ok_or_else(|| FetchError::MalformedResponse {
            url: url.to_string(),
            message: "could not parse host from URL".to_string(),
        })?;

        if self.robots_respect {
            let origin = origin_of(url).unwrap_or_else(|| host.clone());
            let path = Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default();
            let user_agent = self.next_user_agent().to_string();
            let client = self.next_client().clone();
            let allowed = self.robots.is_allowed(&client, &origin, &user_agent, &path).await;
            if !allowed {
                return Err(FetchError::RobotsDisallow { url: url.to_string() });
            }
        }

        let admission = self.circuit.admit(&host).await;
        if admission == Admission::Rejected {
            return Err(FetchError::CircuitOpen { host });
        }

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            self.wait_for_rate_limit(&host).await?;

            let user_agent = self.next_user_agent().to_string();
            match self.single_attempt(url, &user_agent).await {
                Ok(page) => {
                    self.circuit.record_success(&host).await;
                    return Ok(page);
                }
                Err(e @ FetchError::HttpStatus { status, .. }) if non_retryable_status(status) => {
                    self.circuit.record_failure(&host).await;
                    return Err(e);
                }
                Err(e @ FetchError::HttpStatus { status, .. }) if retryable_status(status) => {
                    self.circuit.record_failure(&host).await;
                    last_error = Some(e);
                }
                Err(e @ (FetchError::Timeout { .. } | FetchError::Transport { .. })) => {
                    self.circuit.record_failure(&host).await;
                    last_error = Some(e);
                }
                Err(e) => {
                    self.circuit.record_failure(&host).await;
                    return Err(e);
                }
            }

            if attempt < self.max_retries {
                let delay = backoff_delay_ms(attempt, self.initial_backoff_ms, self.max_backoff_ms);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(last_error.unwrap_or(FetchError::Transport {
            url: url.to_string(),
            message: "exhausted retries with no recorded error".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_status_matches_expected_set() {
        for status in [408, 425, 429, 500, 502, 503] {
            assert!(retryable_status(status), "{status} should be retryable");
        }
        for status in [400, 401, 403, 404, 410, 422] {
            assert!(!retryable_status(status), "{status} should not be retryable");
        }
    }

    #[test]
    fn non_retryable_status_matches_expected_set() {
        for status in [400, 401, 403, 404, 410, 422] {
            assert!(non_retryable_status(status));
        }
        assert!(!non_retryable_status(500));
    }

    #[test]
    fn backoff_never_exceeds_max() {
        for attempt in 0..10 {
            let delay = backoff_delay_ms(attempt, 300, 5000);
            assert!(delay <= 5000);
        }
    }

    #[test]
    fn zero_retries_is_one_attempt() {
        // max_retries = 0 means the loop `0..=0` runs exactly once.
        let attempts: Vec<u32> = (0..=0u32).collect();
        assert_eq!(attempts.len(), 1);
    }

    #[test]
    fn host_of_extracts_lowercased_host() {
        assert_eq!(host_of("https://Example.com/jobs").as_deref(), Some("example.com"));
    }

    #[tokio::test]
    async fn wait_for_rate_limit_enforces_minimum_spacing_per_host() {
        let config = FetcherConfig {
            rate_per_host: 10.0, // one token every 100ms
            burst_per_host: 1,
            ..FetcherConfig::default()
        };
        let fetcher = ReqwestFetcher::new(config).unwrap();

        fetcher.wait_for_rate_limit("example.com").await.unwrap();
        let start = std::time::Instant::now();
        fetcher.wait_for_rate_limit("example.com").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn wait_for_rate_limit_is_independent_per_host() {
        let config = FetcherConfig {
            rate_per_host: 10.0,
            burst_per_host: 1,
            ..FetcherConfig::default()
        };
        let fetcher = ReqwestFetcher::new(config).unwrap();

        fetcher.wait_for_rate_limit("a.example").await.unwrap();
        let start = std::time::Instant::now();
        fetcher.wait_for_rate_limit("b.example").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
