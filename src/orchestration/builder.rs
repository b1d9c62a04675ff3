//! Wires concrete components into a ready-to-run harvest.

use std::sync::Arc;

use crate::crawler::{HarvestController, SeedReport};
use crate::network::HttpClient;
use crate::parser::HeurekaExtractor;
use crate::sink::JsonlSink;

use super::config::HarvestConfig;
use super::persistence::open_ledger;
use super::shutdown::LifecycleGuard;

/// A seeded controller plus the guard owning its cancellation token.
pub struct Harvest {
    pub controller: HarvestController,
    pub guard: Arc<LifecycleGuard>,
    pub seeded: SeedReport,
}

/// Builds the controller with the HTTP transport, Heureka extractor, JSONL
/// sink and the redb-backed ledger, then seeds it.
#[tracing::instrument(skip(config), fields(seeds = config.seeds.len(), quota = %config.quota))]
pub fn build_harvest(config: &HarvestConfig) -> Result<Harvest, Box<dyn std::error::Error>> {
    let http = HttpClient::builder(
        config.transport.user_agent.clone(),
        config.transport.timeout_secs,
    )
    .same_host_delay(config.transport.same_domain_delay)
    .build()?;

    let extractor = HeurekaExtractor::new()?;
    let sink = JsonlSink::open(config.dataset_path())?;
    let ledger = open_ledger(&config.data_dir)?;
    let guard = LifecycleGuard::new(Arc::clone(&ledger));

    let controller = HarvestController::new(
        config.controller_config(),
        Arc::new(http),
        Arc::new(extractor),
        Arc::new(sink),
        ledger,
        guard.token(),
    );
    let seeded = controller.seed(&config.seeds);

    Ok(Harvest {
        controller,
        guard,
        seeded,
    })
}
