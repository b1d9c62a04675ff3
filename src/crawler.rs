use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::frontier::Frontier;
use crate::ledger::QuotaLedger;
use crate::models::{EntityProgress, FrontierRequest, Quota, RequestState};
use crate::network::{FetchError, PageFetcher};
use crate::parser::{ExtractionError, Extractor};
use crate::policy::FrontierPolicy;
use crate::sink::{RecordSink, SinkError};
use crate::state::StateError;
use crate::url_utils;

/// Why a single frontier request ended in `FAILED`. Never fatal to the run.
#[derive(Error, Debug)]
pub enum RequestFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("ledger flush failed: {0}")]
    Ledger(#[from] StateError),

    #[error("sink append failed: {0}")]
    Sink(#[from] SinkError),
}

/// Immutable run parameters for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub quota: Quota,
    pub workers: usize,
    pub max_requests: Option<u64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            quota: Quota::Unbounded,
            workers: Config::DEFAULT_WORKERS,
            max_requests: None,
        }
    }
}

/// Terminal outcome of one request.
#[derive(Debug)]
pub enum RequestOutcome {
    Committed {
        granted: u64,
        next: Option<FrontierRequest>,
    },
    Failed(RequestFailure),
    Interrupted,
}

impl RequestOutcome {
    pub fn state(&self) -> RequestState {
        match self {
            RequestOutcome::Committed { .. } => RequestState::Committed,
            RequestOutcome::Failed(_) => RequestState::Failed,
            RequestOutcome::Interrupted => RequestState::Interrupted,
        }
    }
}

struct TaskResult {
    request: FrontierRequest,
    outcome: RequestOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub queued: usize,
    pub resumed: usize,
    pub skipped: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestSummary {
    pub processed: usize,
    pub committed: usize,
    pub failed: usize,
    pub interrupted: usize,
    pub skipped: usize,
    pub records_accepted: u64,
    pub duration_secs: u64,
    pub entities: BTreeMap<String, EntityProgress>,
}

impl std::fmt::Display for HarvestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Requests: {} processed ({} committed, {} failed, {} interrupted, {} skipped) | Records: {} | {}s",
            self.processed,
            self.committed,
            self.failed,
            self.interrupted,
            self.skipped,
            self.records_accepted,
            self.duration_secs
        )
    }
}

/// Drives frontier requests through fetch, extraction, accounting and commit.
#[derive(Clone)]
pub struct HarvestController {
    config: ControllerConfig,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn RecordSink>,
    ledger: Arc<QuotaLedger>,
    frontier: Arc<Frontier>,
    cancel: CancellationToken,
}

impl HarvestController {
    pub fn new(
        config: ControllerConfig,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
        sink: Arc<dyn RecordSink>,
        ledger: Arc<QuotaLedger>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config: ControllerConfig {
                workers: config.workers.max(1),
                ..config
            },
            fetcher,
            extractor,
            sink,
            ledger,
            frontier: Arc::new(Frontier::new()),
            cancel,
        }
    }

    pub fn ledger(&self) -> &Arc<QuotaLedger> {
        &self.ledger
    }

    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Queue one request per seed entity, resuming from persisted cursors.
    ///
    /// Entities already finished or out of quota are not queued.
    pub fn seed(&self, shop_urls: &[String]) -> SeedReport {
        let mut report = SeedReport::default();

        for shop_url in shop_urls {
            let Some(entity) = url_utils::entity_key(shop_url) else {
                warn!(url = %shop_url, "Seed is not a valid URL, skipping");
                report.skipped += 1;
                continue;
            };

            let progress = self.ledger.progress(&entity).unwrap_or_default();
            if progress.finished {
                info!(entity = %entity, accepted = progress.accepted, "All pages already harvested, skipping");
                report.skipped += 1;
                continue;
            }
            if self.ledger.remaining(&entity, self.config.quota) == 0 {
                info!(
                    entity = %entity,
                    accepted = progress.accepted,
                    quota = %self.config.quota,
                    "Quota already reached, skipping"
                );
                report.skipped += 1;
                continue;
            }

            let (request, resumed) = match progress.cursor {
                Some(cursor) => (
                    FrontierRequest::resume(entity.clone(), shop_url.clone(), cursor),
                    true,
                ),
                None => (FrontierRequest::seed(entity.clone(), shop_url.clone()), false),
            };
            let page = request.page;

            if !self.frontier.push(request) {
                debug!(entity = %entity, "Duplicate seed ignored");
                report.duplicates += 1;
                continue;
            }

            report.queued += 1;
            debug!(entity = %entity, page, state = %RequestState::Pending, "Request queued");
            if resumed {
                report.resumed += 1;
                info!(entity = %entity, page, accepted = progress.accepted, "Resuming harvest");
            }
        }

        info!(
            queued = report.queued,
            resumed = report.resumed,
            skipped = report.skipped,
            "Seeded frontier"
        );
        report
    }

    /// Run the worker pool until the frontier is exhausted, the request
    /// budget is spent, or the cancellation token fires.
    pub async fn run(&self) -> Result<HarvestSummary, StateError> {
        let start = Instant::now();
        let quota = self.config.quota;
        let mut summary = HarvestSummary::default();

        let mut in_flight_tasks = JoinSet::new();
        let mut dequeued: u64 = 0;
        let mut budget_reached = false;

        loop {
            // Phase 1: fill worker pool
            while in_flight_tasks.len() < self.config.workers && !self.cancel.is_cancelled() {
                if let Some(max) = self.config.max_requests {
                    if dequeued >= max {
                        if !budget_reached {
                            info!(max_requests = max, "Request budget reached, draining");
                            budget_reached = true;
                        }
                        break;
                    }
                }

                let Some(request) = self.frontier.pop() else {
                    break;
                };

                if self.ledger.remaining(&request.entity, quota) == 0 {
                    debug!(entity = %request.entity, page = request.page, "Quota exhausted, not fetching");
                    self.frontier.release(&request.entity);
                    summary.skipped += 1;
                    continue;
                }

                dequeued += 1;
                let worker = self.clone();
                in_flight_tasks.spawn(async move {
                    let outcome = worker.process_request(&request).await;
                    TaskResult { request, outcome }
                });
            }

            // Phase 2: collect completed tasks
            if let Some(joined) = in_flight_tasks.join_next().await {
                self.settle(joined, &mut summary);
            }

            // Phase 3: check for completion
            let stopping = budget_reached || self.cancel.is_cancelled();
            if in_flight_tasks.is_empty() && (stopping || self.frontier.is_empty()) {
                break;
            }
        }

        // Drain any tasks that are still running
        while let Some(joined) = in_flight_tasks.join_next().await {
            self.settle(joined, &mut summary);
        }

        let abandoned = self.frontier.drain();
        if !abandoned.is_empty() {
            info!(count = abandoned.len(), "Pending requests left for the next run");
            summary.interrupted += abandoned.len();
        }

        self.ledger.flush()?;

        summary.duration_secs = start.elapsed().as_secs();
        summary.entities = self.ledger.snapshot();
        info!("Harvest finished: {}", summary);
        Ok(summary)
    }

    fn settle(
        &self,
        joined: Result<TaskResult, tokio::task::JoinError>,
        summary: &mut HarvestSummary,
    ) {
        let task = match joined {
            Ok(task) => task,
            Err(e) => {
                error!("Task join error: {}", e);
                summary.processed += 1;
                summary.failed += 1;
                return;
            }
        };

        summary.processed += 1;
        let entity = task.request.entity.as_str();
        debug!(entity, url = %task.request.url, state = %task.outcome.state(), "Request settled");

        match task.outcome {
            RequestOutcome::Committed { granted, next } => {
                summary.committed += 1;
                summary.records_accepted += granted;
                match next {
                    Some(next) => self.frontier.advance(next),
                    None => self.frontier.release(entity),
                }
            }
            RequestOutcome::Failed(failure) => {
                warn!(entity, url = %task.request.url, page = task.request.page, error = %failure, "Request failed");
                summary.failed += 1;
                self.frontier.release(entity);
            }
            RequestOutcome::Interrupted => {
                info!(entity, page = task.request.page, "Request interrupted");
                summary.interrupted += 1;
                self.frontier.release(entity);
            }
        }

        if summary.processed % Config::PROGRESS_INTERVAL == 0 {
            info!(
                "Progress: {} processed | {} records | {}",
                summary.processed,
                summary.records_accepted,
                self.frontier.stats()
            );
        }
    }

    /// PENDING → FETCHING → EXTRACTED → ACCOUNTED → COMMITTED for one request.
    async fn process_request(&self, request: &FrontierRequest) -> RequestOutcome {
        let entity = request.entity.as_str();
        let quota = self.config.quota;

        debug!(entity, url = %request.url, state = %RequestState::Fetching, "Fetching page");
        let page = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return RequestOutcome::Interrupted,
            fetched = self.fetcher.fetch(&request.url) => match fetched {
                Ok(page) => page,
                Err(e) => return RequestOutcome::Failed(e.into()),
            },
        };
        if self.cancel.is_cancelled() {
            return RequestOutcome::Interrupted;
        }

        let result = match self.extractor.extract(request, &page) {
            Ok(result) => result,
            Err(e) => return RequestOutcome::Failed(e.into()),
        };
        let page_no = result.page;
        let next_page = result.next_page.clone();
        debug!(
            entity,
            page = page_no,
            drafts = result.drafts.len(),
            shop = result.shop_name.as_deref().unwrap_or(""),
            state = %RequestState::Extracted,
            "Page extracted"
        );

        // Past this point the request always runs to COMMITTED or FAILED.
        let previous_cursor = self.ledger.progress(entity).and_then(|p| p.cursor);
        let decision = FrontierPolicy::new(&self.ledger).decide(result, quota);
        self.ledger.set_cursor(entity, next_page.clone());
        debug!(entity, page = page_no, granted = decision.granted, state = %RequestState::Accounted, "Page accounted");

        if let Err(e) = self.ledger.flush() {
            self.ledger.restore_cursor(entity, previous_cursor);
            return RequestOutcome::Failed(e.into());
        }
        if !decision.accepted.is_empty() {
            if let Err(e) = self.sink.append(&decision.accepted) {
                self.ledger.restore_cursor(entity, previous_cursor);
                if let Err(flush_err) = self.ledger.flush() {
                    warn!(entity, error = %flush_err, "Could not persist rewound cursor");
                }
                return RequestOutcome::Failed(e.into());
            }
        }

        let total = self.ledger.accepted(entity);
        if decision.requested == 0 {
            info!(entity, page = page_no, accepted = total, quota = %quota, "No reviews found on page {}", page_no);
        } else {
            info!(
                entity,
                page = page_no,
                accepted = total,
                quota = %quota,
                "Saved {} reviews from page {} ({}/{})",
                decision.granted,
                page_no,
                total,
                quota
            );
        }
        if decision.is_partial() || (next_page.is_some() && !decision.enqueue_next) {
            info!(entity, accepted = total, quota = %quota, "Quota reached, stopping pagination");
        }

        let next = if decision.enqueue_next {
            next_page.map(|cursor| request.follow(&cursor))
        } else {
            None
        };

        RequestOutcome::Committed {
            granted: decision.granted,
            next,
        }
    }
}
