//! Decides how much of a page to keep and whether to follow its next-page link.

use crate::ledger::QuotaLedger;
use crate::models::{PageResult, Quota, ReviewRecord};

/// Outcome of evaluating one page against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDecision {
    pub requested: u64,
    pub granted: u64,
    pub accepted: Vec<ReviewRecord>,
    pub enqueue_next: bool,
}

impl PageDecision {
    /// The quota cut off part of the page.
    pub fn is_partial(&self) -> bool {
        self.granted < self.requested
    }
}

/// Halt-on-partial-page pagination policy.
pub struct FrontierPolicy<'a> {
    ledger: &'a QuotaLedger,
}

impl<'a> FrontierPolicy<'a> {
    pub fn new(ledger: &'a QuotaLedger) -> Self {
        Self { ledger }
    }

    /// Reserve quota for the page's drafts and keep the first `granted` in document order.
    ///
    /// Pagination continues only when the whole page was accepted, a next link
    /// exists and quota remains. An empty page with a next link keeps going.
    pub fn decide(&self, result: PageResult, quota: Quota) -> PageDecision {
        let has_next = result.has_next_page_link();
        let mut drafts = result.drafts;

        let requested = drafts.len() as u64;
        let granted = self.ledger.reserve(&result.entity, requested, quota);
        drafts.truncate(granted as usize);

        let enqueue_next = granted == requested
            && has_next
            && self.ledger.remaining(&result.entity, quota) > 0;

        PageDecision {
            requested,
            granted,
            accepted: drafts,
            enqueue_next,
        }
    }
}
