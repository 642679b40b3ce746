//! Activation-gated fetching of extraction results.
//!
//! A fetch starts only when a paper is selected, the view owning the
//! extraction kind is the active one, and the cache holds nothing for the key.
//! The gate is re-evaluated explicitly on every selection change, view
//! activation and invalidation. In-flight fetches are never cancelled; their
//! results land in the cache when they arrive unless a newer fetch for the
//! same key has superseded them.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::backend::PaperBackend;
use crate::cache::{CacheKey, CacheState, ExtractionCache};
use crate::extraction::ExtractionKind;
use crate::paper::PaperId;

/// Which view currently has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Library,
    PaperInfo,
    Extraction(ExtractionKind),
    Visualize,
}

impl View {
    pub fn extraction_kind(self) -> Option<ExtractionKind> {
        match self {
            View::Extraction(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Called from the fetch task once a key has settled (or been discarded).
pub type SettleHook = Arc<dyn Fn(&CacheKey, &CacheState) + Send + Sync>;

/// Handle to a fetch started by the controller.
#[derive(Debug)]
pub struct FetchTicket {
    pub key: CacheKey,
    pub generation: u64,
    handle: JoinHandle<bool>,
}

impl FetchTicket {
    /// Wait for the fetch to finish. Returns whether its result was committed.
    pub async fn settled(self) -> bool {
        self.handle.await.unwrap_or(false)
    }
}

pub struct ActivationController<B: PaperBackend> {
    backend: Arc<B>,
    cache: Arc<ExtractionCache>,
    selected: Option<PaperId>,
    active: View,
    on_settled: Option<SettleHook>,
}

impl<B: PaperBackend> ActivationController<B> {
    pub fn new(backend: Arc<B>, cache: Arc<ExtractionCache>) -> Self {
        Self {
            backend,
            cache,
            selected: None,
            active: View::Library,
            on_settled: None,
        }
    }

    pub fn with_settle_hook(mut self, hook: SettleHook) -> Self {
        self.on_settled = Some(hook);
        self
    }

    pub fn cache(&self) -> &Arc<ExtractionCache> {
        &self.cache
    }

    pub fn selected_paper(&self) -> Option<&PaperId> {
        self.selected.as_ref()
    }

    pub fn active_view(&self) -> View {
        self.active
    }

    /// Change the selected paper and evaluate the gate.
    pub fn select_paper(&mut self, paper_id: Option<PaperId>) -> Option<FetchTicket> {
        self.selected = paper_id;
        self.evaluate_gate()
    }

    /// Make `view` the active one and evaluate the gate.
    pub fn activate(&mut self, view: View) -> Option<FetchTicket> {
        self.active = view;
        self.evaluate_gate()
    }

    /// Force `key` back to `Absent`. When the key belongs to the active view
    /// and the selected paper, a new fetch starts immediately.
    pub fn invalidate(&mut self, key: &CacheKey) -> Option<FetchTicket> {
        let previous = self.cache.invalidate(key);
        log::debug!(
            "invalidated {}/{} (was {})",
            key.kind,
            key.paper_id,
            previous.label()
        );
        if self.active_key().as_ref() == Some(key) {
            self.evaluate_gate()
        } else {
            None
        }
    }

    /// The key the gate would fetch right now, ignoring cache contents.
    pub fn active_key(&self) -> Option<CacheKey> {
        let paper_id = self.selected.clone()?;
        let kind = self.active.extraction_kind()?;
        Some(CacheKey::new(kind, paper_id))
    }

    /// State of `kind` for the selected paper.
    pub fn state_for(&self, kind: ExtractionKind) -> CacheState {
        match &self.selected {
            Some(paper_id) => self.cache.state(&CacheKey::new(kind, paper_id.clone())),
            None => CacheState::Absent,
        }
    }

    fn evaluate_gate(&self) -> Option<FetchTicket> {
        let key = self.active_key()?;
        let generation = self.cache.try_begin(&key)?;
        Some(self.spawn_fetch(key, generation))
    }

    fn spawn_fetch(&self, key: CacheKey, generation: u64) -> FetchTicket {
        let backend = self.backend.clone();
        let cache = self.cache.clone();
        let hook = self.on_settled.clone();
        let task_key = key.clone();

        log::debug!(
            "fetching {} for {} (generation {generation})",
            key.kind,
            key.paper_id
        );

        let handle = tokio::spawn(async move {
            let outcome = backend
                .extract(task_key.kind, &task_key.paper_id)
                .await
                .map_err(|e| e.to_string());
            if let Err(message) = &outcome {
                log::warn!(
                    "{} extraction failed for {}: {message}",
                    task_key.kind,
                    task_key.paper_id
                );
            }

            let committed = cache.commit(&task_key, generation, outcome);
            if !committed {
                log::info!(
                    "discarding superseded {} result for {} (generation {generation})",
                    task_key.kind,
                    task_key.paper_id
                );
            }
            if let Some(hook) = hook {
                hook(&task_key, &cache.state(&task_key));
            }
            committed
        });

        FetchTicket {
            key,
            generation,
            handle,
        }
    }
}
