//! Runtime-agnostic core of the career-page crawl orchestrator: entity
//! model, deduper/normalizer, and the trait seams (`JobStore`,
//! `HttpFetcher`, `ListAdapter`, `Ranker`, `Clock`, `TelemetrySink`)
//! that the orchestrator and scheduler are built against. Concrete
//! implementations of those seams live in sibling crates
//! (`crawl-fetcher`, `crawl-adapters`, `crawl-ranker`,
//! `crawl-store-postgres`); this crate never performs I/O itself.

pub mod adapter;
pub mod clock;
pub mod config;
pub mod fetcher;
pub mod llm;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod ranker;
pub mod scheduler;
pub mod store;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support {
    //! Wiring shared by `orchestrator` and `scheduler` unit tests: a
    //! fully-doubled `Orchestrator` with no adapters registered, for
    //! tests that only exercise state transitions.

    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::clock::SystemClock;
    use crate::config::OrchestratorConfig;
    use crate::fetcher::test_util::ScriptedFetcher;
    use crate::model::AiAnnotation;
    use crate::orchestrator::Orchestrator;
    use crate::ranker::test_util::FixedRanker;
    use crate::store::test_util::InMemoryJobStore;
    use crate::telemetry::TracingTelemetrySink;

    pub fn blank_orchestrator() -> Orchestrator {
        Orchestrator::new(
            Arc::new(InMemoryJobStore::new()),
            Arc::new(ScriptedFetcher::new()),
            HashMap::new(),
            Arc::new(FixedRanker::new(AiAnnotation::default())),
            Arc::new(SystemClock),
            Arc::new(TracingTelemetrySink),
            OrchestratorConfig::default(),
        )
    }
}
