//! Memory backpressure: the reference manager tracks resident node bodies
//! in LRU order and, when a construction pushes the count past the
//! configured threshold, evicts the coldest bodies after persisting any
//! dirty ones.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::GraphInner;
use crate::types::{NodeId, Result, StoreError};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum EvictMode {
    /// Caller-requested: dirty bodies are refused.
    Explicit,
    /// Backpressure: dirty bodies are persisted first, contended ones skipped.
    Pressure,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum EvictOutcome {
    Evicted,
    NotResident,
    InUse,
}

pub(crate) struct ReferenceManager {
    resident: Mutex<LruCache<NodeId, ()>>,
    max_resident: Option<usize>,
    batch: usize,
}

impl ReferenceManager {
    pub(crate) fn new(max_resident: Option<usize>, batch: usize) -> Self {
        Self {
            resident: Mutex::new(LruCache::unbounded()),
            max_resident,
            batch: batch.max(1),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.resident.lock().len()
    }

    /// Marks `id` as most recently used.
    pub(crate) fn touch(&self, id: NodeId) {
        self.resident.lock().get(&id);
    }

    pub(crate) fn forget(&self, id: NodeId) {
        self.resident.lock().pop(&id);
    }

    /// Admits the body of `id` and, if the resident set is over its
    /// threshold, evicts up to one batch of the least recently used other
    /// bodies through `evict`. Runs on the constructing thread; no lock of
    /// the manager is held while `evict` runs, and `id` itself is never a
    /// candidate.
    pub(crate) fn notify_node_created<F>(&self, id: NodeId, mut evict: F)
    where
        F: FnMut(NodeId) -> Result<EvictOutcome>,
    {
        let candidates = {
            let mut resident = self.resident.lock();
            resident.put(id, ());
            let Some(max) = self.max_resident else {
                return;
            };
            let excess = resident.len().saturating_sub(max).min(self.batch);
            let mut picked = Vec::with_capacity(excess);
            while picked.len() < excess {
                match resident.pop_lru() {
                    Some((candidate, ())) if candidate == id => {
                        resident.put(candidate, ());
                        break;
                    }
                    Some((candidate, ())) => picked.push(candidate),
                    None => break,
                }
            }
            picked
        };
        if candidates.is_empty() {
            return;
        }

        let mut evicted = 0usize;
        let mut refused = Vec::new();
        for candidate in candidates {
            match evict(candidate) {
                Ok(EvictOutcome::Evicted) => evicted += 1,
                Ok(EvictOutcome::NotResident) => {}
                Ok(EvictOutcome::InUse) => refused.push(candidate),
                Err(err) => {
                    warn!(node = %candidate, error = %err, "eviction.failed");
                    refused.push(candidate);
                }
            }
        }
        if !refused.is_empty() {
            let mut resident = self.resident.lock();
            for candidate in &refused {
                resident.put(*candidate, ());
            }
        }
        debug!(trigger = %id, evicted, refused = refused.len(), "eviction.pass");
    }
}

impl GraphInner {
    /// Drops the resident body of `id`. A body is only dropped when nothing
    /// outside the registry holds it; the check happens under the entry's
    /// write lock so no new borrower can appear meanwhile.
    pub(crate) fn evict_entry(&self, id: NodeId, mode: EvictMode) -> Result<EvictOutcome> {
        let Some(entry) = self.entries.read().get(&id).cloned() else {
            return Ok(EvictOutcome::NotResident);
        };
        let mut slot = match mode {
            EvictMode::Explicit => entry.body.write(),
            EvictMode::Pressure => match entry.body.try_write() {
                Some(slot) => slot,
                None => return Ok(EvictOutcome::InUse),
            },
        };
        let Some(body) = slot.as_ref() else {
            return Ok(EvictOutcome::NotResident);
        };
        if Arc::strong_count(body) > 1 {
            if mode == EvictMode::Pressure {
                warn!(node = %id, "eviction.refused_in_use");
            }
            return Ok(EvictOutcome::InUse);
        }
        if body.is_dirty() {
            match mode {
                EvictMode::Explicit => return Err(StoreError::DirtyEviction(id)),
                EvictMode::Pressure => {
                    self.flush_body(body)?;
                }
            }
        }
        *slot = None;
        self.metrics.node_evicted();
        debug!(node = %id, ?mode, "eviction.evicted");
        Ok(EvictOutcome::Evicted)
    }
}
