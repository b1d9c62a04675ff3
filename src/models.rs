use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-entity cap on accepted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quota {
    Limited(u64),
    Unbounded,
}

impl Quota {
    pub fn from_option(limit: Option<u64>) -> Self {
        match limit {
            Some(n) => Quota::Limited(n),
            None => Quota::Unbounded,
        }
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quota::Limited(n) => write!(f, "{}", n),
            Quota::Unbounded => write!(f, "∞"),
        }
    }
}

/// Reply left by the shop under a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopReply {
    pub title: String,
    pub body: String,
}

/// One harvested review. Field names follow the dataset's camelCase layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub entity: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_at: Option<String>,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub shop_reply: Option<ShopReply>,
}

/// Locator of a page still to be visited for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub url: String,
    pub page: u32,
}

/// Extractor output for one listing page. Drafts are in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub entity: String,
    pub shop_name: Option<String>,
    pub page: u32,
    pub drafts: Vec<ReviewRecord>,
    pub next_page: Option<PageCursor>,
}

impl PageResult {
    pub fn has_next_page_link(&self) -> bool {
        self.next_page.is_some()
    }
}

/// A pending unit of work in the frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierRequest {
    /// Entity key the page belongs to.
    pub entity: String,
    /// Shop root URL; pagination links must stay under it.
    pub shop_url: String,
    pub url: String,
    pub page: u32,
}

impl FrontierRequest {
    pub fn seed(entity: String, shop_url: String) -> Self {
        Self {
            entity,
            url: shop_url.clone(),
            shop_url,
            page: 1,
        }
    }

    pub fn resume(entity: String, shop_url: String, cursor: PageCursor) -> Self {
        Self {
            entity,
            shop_url,
            url: cursor.url,
            page: cursor.page,
        }
    }

    /// Follow-up request for the same entity.
    pub fn follow(&self, cursor: &PageCursor) -> Self {
        Self {
            entity: self.entity.clone(),
            shop_url: self.shop_url.clone(),
            url: cursor.url.clone(),
            page: cursor.page,
        }
    }
}

/// Durable per-entity progress stored in the ledger snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProgress {
    pub accepted: u64,
    /// Quota in force when the entity was last accounted.
    #[serde(default)]
    pub quota: Option<Quota>,
    #[serde(default)]
    pub cursor: Option<PageCursor>,
    #[serde(default)]
    pub finished: bool,
}

/// Lifecycle of a single frontier request inside the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Fetching,
    Extracted,
    Accounted,
    Committed,
    Failed,
    Interrupted,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Pending => "PENDING",
            RequestState::Fetching => "FETCHING",
            RequestState::Extracted => "EXTRACTED",
            RequestState::Accounted => "ACCOUNTED",
            RequestState::Committed => "COMMITTED",
            RequestState::Failed => "FAILED",
            RequestState::Interrupted => "INTERRUPTED",
        };
        f.write_str(name)
    }
}
