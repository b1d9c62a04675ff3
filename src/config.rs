// Global configuration constants - single source of truth

pub struct Config;

impl Config {
    // Worker pool; one request in flight unless asked otherwise
    pub const DEFAULT_WORKERS: usize = 1;

    // HTTP/Network config
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const SAME_DOMAIN_DELAY_SECS: u64 = 2;
    pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024; // 10MB
    pub const MAX_RETRIES: u32 = 2;
    pub const RETRY_BACKOFF_MS: u64 = 500;
    pub const RETRY_BACKOFF_MAX_MS: u64 = 8_000;
    pub const POOL_IDLE_PER_HOST: usize = 4;
    pub const USER_AGENT: &'static str = "ShopReviewHarvester/0.1";

    // Persistence
    pub const STATE_DB_FILE: &'static str = "harvest_state.redb";
    pub const DATASET_FILE: &'static str = "dataset.jsonl";
    pub const LEDGER_KEY: &'static str = "quota-ledger";

    // Progress reporting
    pub const PROGRESS_INTERVAL: usize = 25;
}
