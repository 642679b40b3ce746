//! In-memory cache of extraction results, one entry per (kind, paper).
//!
//! Absence of a map entry *is* the `Absent` state, so [`invalidate`] simply
//! removes the entry. Every `Absent → Loading` transition is stamped with a
//! fresh generation; a completion is committed only while the entry is still
//! `Loading` under that generation. Late results from superseded fetches are
//! counted and dropped.
//!
//! [`invalidate`]: ExtractionCache::invalidate

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::extraction::{ExtractionKind, ExtractionPayload};
use crate::paper::PaperId;

/// Cache key: extraction kind + paper.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub struct CacheKey {
    pub kind: ExtractionKind,
    pub paper_id: PaperId,
}

impl CacheKey {
    pub fn new(kind: ExtractionKind, paper_id: PaperId) -> Self {
        Self { kind, paper_id }
    }
}

/// Observable state of one key.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheState {
    Absent,
    Loading,
    Ready(Arc<ExtractionPayload>),
    Error(String),
}

impl CacheState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Loading => "loading",
            Self::Ready(_) => "ready",
            Self::Error(_) => "error",
        }
    }

    pub fn payload(&self) -> Option<&Arc<ExtractionPayload>> {
        match self {
            Self::Ready(payload) => Some(payload),
            _ => None,
        }
    }
}

/// A stored entry. `generation` identifies the fetch that owns a `Loading` slot.
#[derive(Clone, Debug)]
struct Slot {
    state: CacheState,
    generation: u64,
}

/// Thread-safe extraction cache shared between the controller and its fetch tasks.
pub struct ExtractionCache {
    entries: DashMap<CacheKey, Slot>,
    next_generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
}

impl Default for ExtractionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_generation: AtomicU64::new(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale: AtomicU64::new(0),
        }
    }

    /// Current state of `key`.
    pub fn state(&self, key: &CacheKey) -> CacheState {
        self.entries
            .get(key)
            .map(|slot| slot.state.clone())
            .unwrap_or(CacheState::Absent)
    }

    /// The payload for `key` if it is `Ready`.
    pub fn ready(&self, key: &CacheKey) -> Option<Arc<ExtractionPayload>> {
        self.entries
            .get(key)
            .and_then(|slot| slot.state.payload().cloned())
    }

    /// Move `key` from `Absent` to `Loading`, returning the generation that
    /// owns the fetch. Any existing entry (`Loading`, `Ready` or `Error`) is
    /// left untouched and `None` is returned.
    pub fn try_begin(&self, key: &CacheKey) -> Option<u64> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                None
            }
            Entry::Vacant(vacant) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                vacant.insert(Slot {
                    state: CacheState::Loading,
                    generation,
                });
                Some(generation)
            }
        }
    }

    /// Record the outcome of the fetch stamped `generation`.
    ///
    /// Returns false, leaving the entry as it is, when that fetch is no longer
    /// the current one for `key`.
    pub fn commit(
        &self,
        key: &CacheKey,
        generation: u64,
        outcome: Result<ExtractionPayload, String>,
    ) -> bool {
        let Some(mut slot) = self.entries.get_mut(key) else {
            self.stale.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        if slot.state != CacheState::Loading || slot.generation != generation {
            self.stale.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        slot.state = match outcome {
            Ok(payload) => CacheState::Ready(Arc::new(payload)),
            Err(message) => CacheState::Error(message),
        };
        true
    }

    /// Force `key` back to `Absent`, whatever its state. Returns the previous state.
    pub fn invalidate(&self, key: &CacheKey) -> CacheState {
        self.entries
            .remove(key)
            .map(|(_, slot)| slot.state)
            .unwrap_or(CacheState::Absent)
    }

    /// Drop every entry belonging to `paper_id`. Returns how many were removed.
    pub fn prune_paper(&self, paper_id: &PaperId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| &key.paper_id != paper_id);
        before.saturating_sub(self.entries.len())
    }

    /// Activations that found an existing entry.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Activations that started a fetch.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Completions discarded because their fetch had been superseded.
    pub fn stale_discards(&self) -> u64 {
        self.stale.load(Ordering::Relaxed)
    }

    /// Number of keys not in the `Absent` state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ExtractionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionCache")
            .field("entries", &self.entries.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .field("stale", &self.stale_discards())
            .finish()
    }
}
