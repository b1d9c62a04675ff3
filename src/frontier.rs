use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

use crate::models::FrontierRequest;

/// Frontier work queue keyed by entity.
///
/// An entity is "outstanding" from the moment its request is queued until the
/// controller calls [`Frontier::release`]. While outstanding, no other request
/// for that entity can be pushed, so pages of one entity run strictly in order.
pub struct Frontier {
    inner: Mutex<FrontierInner>,
}

#[derive(Default)]
struct FrontierInner {
    queue: VecDeque<FrontierRequest>,
    outstanding: HashSet<String>,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FrontierInner::default()),
        }
    }

    /// Queue a request for an entity with nothing outstanding.
    /// Returns false if the entity already has a queued or in-flight request.
    pub fn push(&self, request: FrontierRequest) -> bool {
        let mut inner = self.inner.lock();
        if !inner.outstanding.insert(request.entity.clone()) {
            return false;
        }
        inner.queue.push_back(request);
        true
    }

    /// Take the next request. Its entity stays outstanding until released or advanced.
    pub fn pop(&self) -> Option<FrontierRequest> {
        self.inner.lock().queue.pop_front()
    }

    /// Replace the entity's finished request with its follow-up page.
    pub fn advance(&self, next: FrontierRequest) {
        let mut inner = self.inner.lock();
        inner.outstanding.insert(next.entity.clone());
        inner.queue.push_back(next);
    }

    /// The entity's current request reached a terminal state with no follow-up.
    pub fn release(&self, entity: &str) {
        self.inner.lock().outstanding.remove(entity);
    }

    /// Drop every queued request, releasing their entities.
    pub fn drain(&self) -> Vec<FrontierRequest> {
        let mut inner = self.inner.lock();
        let drained: Vec<FrontierRequest> = inner.queue.drain(..).collect();
        for request in &drained {
            inner.outstanding.remove(&request.entity);
        }
        drained
    }

    /// No queued requests (in-flight ones may still exist).
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn stats(&self) -> FrontierStats {
        let inner = self.inner.lock();
        FrontierStats {
            queued: inner.queue.len(),
            outstanding_entities: inner.outstanding.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierStats {
    pub queued: usize,
    pub outstanding_entities: usize,
}

impl std::fmt::Display for FrontierStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frontier: {} queued, {} entities outstanding",
            self.queued, self.outstanding_entities
        )
    }
}
