pub mod backoff;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod frontier;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod network;
pub mod orchestration;
pub mod parser;
pub mod policy;
pub mod sink;
pub mod state;
pub mod url_utils;

// Re-export main types for library usage
pub use crawler::{ControllerConfig, HarvestController, HarvestSummary, RequestFailure, SeedReport};
pub use frontier::Frontier;
pub use ledger::QuotaLedger;
pub use models::{EntityProgress, FrontierRequest, PageCursor, PageResult, Quota, ReviewRecord};
pub use network::{FetchError, HttpClient, PageFetcher, RenderedPage};
pub use parser::{ExtractionError, Extractor, HeurekaExtractor};
pub use policy::{FrontierPolicy, PageDecision};
pub use sink::{JsonlSink, MemorySink, RecordSink, SinkError};
pub use state::{KvStore, MemoryStore, RedbStore, StateError};
