//! State database and ledger setup.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::ledger::QuotaLedger;
use crate::state::{RedbStore, StateError};

/// Opens `<data_dir>/harvest_state.redb` and restores the ledger from it.
///
/// A damaged snapshot still yields an (empty) ledger; only an unopenable
/// database is an error.
pub fn open_ledger<P: AsRef<Path>>(data_dir: P) -> Result<Arc<QuotaLedger>, StateError> {
    let path = data_dir.as_ref().join(Config::STATE_DB_FILE);
    let store = Arc::new(RedbStore::open(&path)?);
    let ledger = Arc::new(QuotaLedger::open(store));
    info!(path = %path.display(), entities = ledger.len(), "Opened harvest state");
    Ok(ledger)
}
