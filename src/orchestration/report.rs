//! Ledger inspection and reset commands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::ledger::QuotaLedger;
use crate::models::{EntityProgress, Quota};
use crate::state::StateError;
use crate::url_utils;

use super::persistence::open_ledger;

/// One line per entity: `entity  accepted/quota  next page or done`.
///
/// The quota shown is `quota_override` when given, else the quota the entity
/// was last harvested under.
pub fn format_progress(
    entities: &BTreeMap<String, EntityProgress>,
    quota_override: Option<Quota>,
) -> Vec<String> {
    entities
        .iter()
        .map(|(entity, progress)| {
            let position = match (&progress.cursor, progress.finished) {
                (_, true) => "all pages harvested".to_string(),
                (Some(cursor), false) => format!("next page {} ({})", cursor.page, cursor.url),
                (None, false) => "not started".to_string(),
            };
            let quota = quota_override
                .or(progress.quota)
                .unwrap_or(Quota::Unbounded);
            format!("{}  {}/{}  {}", entity, progress.accepted, quota, position)
        })
        .collect()
}

/// What `reset` should forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetTarget {
    All,
    Shop(String),
}

/// Remove progress from the ledger and persist. Returns how many entities were dropped.
pub fn reset_progress(ledger: &QuotaLedger, target: &ResetTarget) -> Result<usize, StateError> {
    let removed = match target {
        ResetTarget::All => {
            let count = ledger.len();
            ledger.clear();
            count
        }
        ResetTarget::Shop(url) => {
            let normalized = url_utils::normalize_url_for_cli(url);
            match url_utils::entity_key(&normalized) {
                Some(entity) => usize::from(ledger.remove(&entity)),
                None => 0,
            }
        }
    };
    ledger.flush()?;
    Ok(removed)
}

#[tracing::instrument]
pub fn run_summary_command(data_dir: PathBuf, quota: Option<u64>) -> Result<(), StateError> {
    let ledger = open_ledger(&data_dir)?;
    if ledger.is_empty() {
        println!("No saved progress in {}", data_dir.display());
        return Ok(());
    }

    let lines = format_progress(&ledger.snapshot(), quota.map(Quota::Limited));
    for line in &lines {
        println!("{}", line);
    }
    println!("{} shops tracked", lines.len());
    Ok(())
}

#[tracing::instrument]
pub fn run_reset_command(data_dir: PathBuf, target: ResetTarget) -> Result<(), StateError> {
    let ledger = open_ledger(&data_dir)?;
    let removed = reset_progress(&ledger, &target)?;
    println!("Reset {} shop(s)", removed);
    Ok(())
}
