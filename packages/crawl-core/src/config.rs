//! Orchestrator configuration.
//!
//! Mirrors `server::config::Config`'s `from_env` convention: load via
//! `dotenvy` + `std::env`, fail fast with `anyhow::Context` on a
//! missing or unparseable required value, and fall back to the
//! documented default everywhere one exists. Secrets (DB URL, LLM API
//! key) are not part of this struct — they belong to `crawl-server`'s
//! own config, one layer up, the same separation drawn upstream
//! between `kernel`-level policy and `config::Config`'s connection
//! strings.

use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub crawl_interval_minutes: u32,
    pub max_concurrent_company_crawls: usize,
    pub ranker_parallelism: usize,
    pub ranker_timeout: Duration,

    pub http_rate_per_host: f64,
    pub http_burst_per_host: u32,
    pub http_max_retries: u32,
    pub http_initial_backoff_ms: u64,
    pub http_max_backoff_ms: u64,
    pub http_request_timeout: Duration,
    pub robots_respect: bool,
    pub http_user_agents: Vec<String>,
    pub http_proxies: Vec<String>,

    pub recommend_threshold: i32,
    pub max_description_chars: usize,
    pub eta_window: usize,

    pub circuit_fail_threshold: u32,
    pub circuit_cool_off: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            crawl_interval_minutes: 30,
            max_concurrent_company_crawls: 5,
            ranker_parallelism: 4,
            ranker_timeout: Duration::from_secs(20),

            http_rate_per_host: 1.0,
            http_burst_per_host: 2,
            http_max_retries: 3,
            http_initial_backoff_ms: 300,
            http_max_backoff_ms: 5000,
            http_request_timeout: Duration::from_secs(20),
            robots_respect: true,
            http_user_agents: vec![
                "Mozilla/5.0 (compatible; CareerCrawlBot/1.0)".to_string(),
            ],
            http_proxies: Vec::new(),

            recommend_threshold: 60,
            max_description_chars: 4000,
            eta_window: 10,

            circuit_fail_threshold: 5,
            circuit_cool_off: Duration::from_secs(60),
        }
    }
}

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key}: failed to parse {raw:?}: {e}")),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(e).context(format!("reading {key}")),
    }
}

fn env_list(key: &str, default: Vec<String>) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.split(',').map(|s| s.trim().to_string()).collect(),
        _ => default,
    }
}

impl OrchestratorConfig {
    /// Load from the process environment, falling back to defaults
    /// for everything not set. Interval is validated against the
    /// "minimum 1 minute" rule at load time as well as at
    /// `update_interval` time (scheduler.rs).
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let crawl_interval_minutes =
            env_or_default("CRAWL_INTERVAL_MINUTES", defaults.crawl_interval_minutes)?;
        anyhow::ensure!(
            crawl_interval_minutes >= 1,
            "CRAWL_INTERVAL_MINUTES must be >= 1, got {crawl_interval_minutes}"
        );

        let ranker_timeout_secs =
            env_or_default("RANKER_TIMEOUT_SECS", defaults.ranker_timeout.as_secs())?;
        let http_request_timeout_secs = env_or_default(
            "HTTP_REQUEST_TIMEOUT_SECS",
            defaults.http_request_timeout.as_secs(),
        )?;
        let circuit_cool_off_secs =
            env_or_default("CIRCUIT_COOL_OFF_SECS", defaults.circuit_cool_off.as_secs())?;

        Ok(Self {
            crawl_interval_minutes,
            max_concurrent_company_crawls: env_or_default(
                "MAX_CONCURRENT_COMPANY_CRAWLS",
                defaults.max_concurrent_company_crawls,
            )?,
            ranker_parallelism: env_or_default("RANKER_PARALLELISM", defaults.ranker_parallelism)?,
            ranker_timeout: Duration::from_secs(ranker_timeout_secs),

            http_rate_per_host: env_or_default("HTTP_RATE_PER_HOST", defaults.http_rate_per_host)?,
            http_burst_per_host: env_or_default(
                "HTTP_BURST_PER_HOST",
                defaults.http_burst_per_host,
            )?,
            http_max_retries: env_or_default("HTTP_MAX_RETRIES", defaults.http_max_retries)?,
            http_initial_backoff_ms: env_or_default(
                "HTTP_INITIAL_BACKOFF_MS",
                defaults.http_initial_backoff_ms,
            )?,
            http_max_backoff_ms: env_or_default(
                "HTTP_MAX_BACKOFF_MS",
                defaults.http_max_backoff_ms,
            )?,
            http_request_timeout: Duration::from_secs(http_request_timeout_secs),
            robots_respect: env_or_default("ROBOTS_RESPECT", defaults.robots_respect)?,
            http_user_agents: env_list("HTTP_USER_AGENTS", defaults.http_user_agents),
            http_proxies: env_list("HTTP_PROXIES", defaults.http_proxies),

            recommend_threshold: env_or_default(
                "RECOMMEND_THRESHOLD",
                defaults.recommend_threshold,
            )?,
            max_description_chars: env_or_default(
                "MAX_DESCRIPTION_CHARS",
                defaults.max_description_chars,
            )?,
            eta_window: env_or_default("ETA_WINDOW", defaults.eta_window)?,

            circuit_fail_threshold: env_or_default(
                "CIRCUIT_FAIL_THRESHOLD",
                defaults.circuit_fail_threshold,
            )?,
            circuit_cool_off: Duration::from_secs(circuit_cool_off_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.crawl_interval_minutes, 30);
        assert_eq!(config.max_concurrent_company_crawls, 5);
        assert_eq!(config.ranker_parallelism, 4);
        assert_eq!(config.http_rate_per_host, 1.0);
        assert_eq!(config.http_burst_per_host, 2);
        assert_eq!(config.http_max_retries, 3);
        assert_eq!(config.http_initial_backoff_ms, 300);
        assert_eq!(config.http_max_backoff_ms, 5000);
        assert!(config.robots_respect);
        assert_eq!(config.recommend_threshold, 60);
        assert_eq!(config.eta_window, 10);
    }

    #[test]
    fn env_list_splits_on_comma_and_trims() {
        std::env::set_var("TEST_ENV_LIST_KEY", "a, b ,c");
        let got = env_list("TEST_ENV_LIST_KEY", vec!["default".into()]);
        assert_eq!(got, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        std::env::remove_var("TEST_ENV_LIST_KEY");
    }

    #[test]
    fn env_list_falls_back_to_default_when_unset() {
        std::env::remove_var("TEST_ENV_LIST_UNSET_KEY");
        let got = env_list("TEST_ENV_LIST_UNSET_KEY", vec!["default".into()]);
        assert_eq!(got, vec!["default".to_string()]);
    }
}
