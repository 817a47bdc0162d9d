//! Process entry point. Wires configuration, the Postgres-backed job
//! store, the reqwest fetcher, the three adapters, an OpenAI-backed
//! ranker, the orchestrator and scheduler, and a minimal status/health
//! router — in that order, the way `server::server::main` wires its
//! pool, app and listener before calling `axum::serve`.

mod llm_adapter;
mod profile;
mod status_api;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crawl_adapters::{AiParsedAdapter, StructuredAAdapter, StructuredBAdapter};
use crawl_core::clock::SystemClock;
use crawl_core::config::OrchestratorConfig;
use crawl_core::model::AdapterKind;
use crawl_core::orchestrator::Orchestrator;
use crawl_core::scheduler::Scheduler;
use crawl_core::telemetry::TracingTelemetrySink;
use crawl_fetcher::{FetcherConfig, ReqwestFetcher};
use crawl_ranker::LlmRanker;
use crawl_store_postgres::PostgresJobStore;
use llm_adapter::OpenAiLlmClient;

struct ServerConfig {
    database_url: String,
    openai_api_key: String,
    openai_model: String,
    profile_path: PathBuf,
    bind_addr: String,
}

impl ServerConfig {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            openai_api_key: std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            profile_path: std::env::var("PROFILE_PATH")
                .unwrap_or_else(|_| "profile.json".to_string())
                .into(),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }
}

fn fetcher_config_from(config: &OrchestratorConfig) -> FetcherConfig {
    FetcherConfig {
        rate_per_host: config.http_rate_per_host,
        burst_per_host: config.http_burst_per_host,
        max_retries: config.http_max_retries,
        initial_backoff_ms: config.http_initial_backoff_ms,
        max_backoff_ms: config.http_max_backoff_ms,
        request_timeout: config.http_request_timeout,
        robots_respect: config.robots_respect,
        user_agents: config.http_user_agents.clone(),
        proxies: config.http_proxies.clone(),
        circuit_fail_threshold: config.circuit_fail_threshold,
        circuit_cool_off: config.circuit_cool_off,
        ..FetcherConfig::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crawl_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting crawl orchestrator");

    let server_config = ServerConfig::from_env()?;
    let orchestrator_config = OrchestratorConfig::from_env().context("loading orchestrator configuration")?;

    tracing::info!("connecting to job store...");
    let store = Arc::new(
        PostgresJobStore::connect(&server_config.database_url)
            .await
            .context("connecting to job store")?,
    );

    let fetcher = Arc::new(
        ReqwestFetcher::new(fetcher_config_from(&orchestrator_config)).context("building http fetcher")?,
    );

    let mut adapters: HashMap<AdapterKind, Arc<dyn crawl_core::adapter::ListAdapter>> = HashMap::new();
    adapters.insert(AdapterKind::StructuredA, Arc::new(StructuredAAdapter::new()));
    adapters.insert(AdapterKind::StructuredB, Arc::new(StructuredBAdapter::new()));

    let openai_client = openai_client::OpenAIClient::new(server_config.openai_api_key.clone());
    let llm_client: Arc<dyn crawl_core::llm::LlmClient> =
        Arc::new(OpenAiLlmClient::new(openai_client, server_config.openai_model.clone()));
    adapters.insert(AdapterKind::AiParsed, Arc::new(AiParsedAdapter::new(llm_client.clone())));

    let ranker = Arc::new(LlmRanker::new(
        llm_client,
        orchestrator_config.ranker_timeout,
        orchestrator_config.recommend_threshold,
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        fetcher,
        adapters,
        ranker,
        Arc::new(SystemClock),
        Arc::new(TracingTelemetrySink),
        orchestrator_config.clone(),
    ));

    let profile_path = server_config.profile_path.clone();
    let profile_provider: Arc<dyn Fn() -> crawl_core::model::UserProfileSnapshot + Send + Sync> =
        Arc::new(move || match profile::load_profile(&profile_path) {
            Ok(profile) => Arc::new(profile),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load user profile, ranking against an empty profile");
                Arc::new(crawl_core::model::UserProfile::default())
            }
        });

    let scheduler = Arc::new(Scheduler::new(
        orchestrator.clone(),
        orchestrator_config.crawl_interval_minutes,
        profile_provider.clone(),
    ));
    scheduler.start();

    let app = status_api::router(status_api::AppState {
        orchestrator,
        scheduler: scheduler.clone(),
        store,
        profile_provider,
    });

    let listener = tokio::net::TcpListener::bind(&server_config.bind_addr)
        .await
        .context("binding status listener")?;
    tracing::info!(addr = %server_config.bind_addr, "status/health surface listening");

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("status server error")?;

    scheduler.stop();
    tracing::info!("crawl orchestrator stopped");
    Ok(())
}
