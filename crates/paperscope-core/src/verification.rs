//! Raw contribution samples shown next to a generated visualization, so the
//! user can check the chart against what was actually extracted.
//!
//! Everything here is best effort: a paper whose contributions can't be
//! obtained is left out of the sample and nothing is reported.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::PaperBackend;
use crate::cache::{CacheKey, ExtractionCache};
use crate::extraction::ExtractionKind;
use crate::paper::PaperId;

/// How much of the result's paper set is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationLimits {
    /// First K papers of the result.
    pub papers: usize,
    /// First N contributions per paper.
    pub items: usize,
}

impl Default for VerificationLimits {
    fn default() -> Self {
        Self {
            papers: 3,
            items: 5,
        }
    }
}

/// A paper to sample, with the title to show for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTarget {
    pub paper_id: PaperId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationEntry {
    pub paper_id: PaperId,
    pub title: String,
    pub contributions: Vec<Value>,
    /// Served from the extraction cache rather than a fresh backend call.
    #[serde(skip)]
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationSample {
    pub entries: Vec<VerificationEntry>,
    pub generated_at: DateTime<Utc>,
}

impl VerificationSample {
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct VerificationOverlay<B: PaperBackend> {
    backend: Arc<B>,
    cache: Arc<ExtractionCache>,
    limits: VerificationLimits,
    epoch: AtomicU64,
    sample: Mutex<Option<Arc<VerificationSample>>>,
}

impl<B: PaperBackend> VerificationOverlay<B> {
    pub fn new(backend: Arc<B>, cache: Arc<ExtractionCache>, limits: VerificationLimits) -> Self {
        Self {
            backend,
            cache,
            limits,
            epoch: AtomicU64::new(0),
            sample: Mutex::new(None),
        }
    }

    pub fn limits(&self) -> VerificationLimits {
        self.limits
    }

    /// Start a new sampling round: the current sample is dropped and any
    /// refresh still running for an older round will be ignored.
    pub fn begin(&self) -> u64 {
        let mut sample = lock(&self.sample);
        *sample = None;
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Sample contributions for the first K `targets`.
    ///
    /// A ready cache entry is used as is. Otherwise the backend is asked
    /// directly and the cache is left untouched. Returns `None` when a newer
    /// round has started in the meantime.
    pub async fn refresh(
        &self,
        epoch: u64,
        targets: &[VerificationTarget],
    ) -> Option<Arc<VerificationSample>> {
        let fetches = targets
            .iter()
            .take(self.limits.papers)
            .map(|target| self.sample_paper(target));
        let entries = join_all(fetches).await.into_iter().flatten().collect();
        self.store(epoch, entries)
    }

    /// Publish `entries` unless a newer round has begun. The epoch is
    /// checked under the sample lock, which `begin` also holds.
    fn store(&self, epoch: u64, entries: Vec<VerificationEntry>) -> Option<Arc<VerificationSample>> {
        let mut slot = lock(&self.sample);
        if self.epoch.load(Ordering::Acquire) != epoch {
            log::debug!("dropping verification sample from superseded round {epoch}");
            return None;
        }
        let sample = Arc::new(VerificationSample {
            entries,
            generated_at: Utc::now(),
        });
        *slot = Some(sample.clone());
        Some(sample)
    }

    pub fn sample(&self) -> Option<Arc<VerificationSample>> {
        lock(&self.sample).clone()
    }

    async fn sample_paper(&self, target: &VerificationTarget) -> Option<VerificationEntry> {
        let key = CacheKey::new(ExtractionKind::Contributions, target.paper_id.clone());
        let (items, from_cache) = match self.cache.ready(&key) {
            Some(payload) => (payload.items.clone(), true),
            None => match self
                .backend
                .extract(ExtractionKind::Contributions, &target.paper_id)
                .await
            {
                Ok(payload) => (payload.items, false),
                Err(e) => {
                    log::debug!("verification sample skipped {}: {e}", target.paper_id);
                    return None;
                }
            },
        };
        Some(VerificationEntry {
            paper_id: target.paper_id.clone(),
            title: target.title.clone(),
            contributions: items.into_iter().take(self.limits.items).collect(),
            from_cache,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
