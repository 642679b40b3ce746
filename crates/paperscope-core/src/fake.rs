//! In-memory [`PaperBackend`] for tests: counts calls, can fail on demand and
//! can hold individual requests until the test releases them.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Notify, oneshot};

use crate::ApiError;
use crate::analysis::{AnalysisReport, AnalysisRequest, PaperAnswer, PaperQuestion};
use crate::backend::{ExportRequest, ExportedFile, Health, PaperBackend, PaperListing};
use crate::extraction::{ExtractionKind, ExtractionPayload};
use crate::paper::{Paper, PaperId, PdfUpload};

pub(crate) const ITEMS_PER_EXTRACTION: usize = 3;

#[derive(Default)]
pub(crate) struct FakeBackend {
    gated: bool,
    extract_calls: AtomicUsize,
    extract_gates: Mutex<Vec<Option<oneshot::Sender<()>>>>,
    extracted: Mutex<HashSet<(ExtractionKind, PaperId)>>,
    extract_failures: Mutex<HashMap<(ExtractionKind, PaperId), String>>,
    items_per_extraction: Mutex<Option<usize>>,

    upload_calls: AtomicUsize,
    upload_failure: Mutex<Option<String>>,

    list_calls: AtomicUsize,
    listing: Mutex<Vec<Paper>>,

    visualize_calls: AtomicUsize,
    visualize_queries: Mutex<Vec<(Vec<PaperId>, String)>>,
    visualize_failure: Mutex<Option<String>>,
    visualize_markup: Mutex<Option<String>>,
    hold_visualize: AtomicBool,
    visualize_release: Notify,

    export_calls: AtomicUsize,
    query_calls: AtomicUsize,
    analysis_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every extraction waits for [`release_extract`](Self::release_extract).
    pub fn gated() -> Self {
        Self {
            gated: true,
            ..Self::default()
        }
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn visualize_calls(&self) -> usize {
        self.visualize_calls.load(Ordering::SeqCst)
    }

    pub fn export_calls(&self) -> usize {
        self.export_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn analysis_calls(&self) -> usize {
        self.analysis_calls.load(Ordering::SeqCst)
    }

    pub fn visualize_queries(&self) -> Vec<(Vec<PaperId>, String)> {
        self.visualize_queries.lock().unwrap().clone()
    }

    pub fn fail_extract(&self, kind: ExtractionKind, paper: &str, detail: &str) {
        self.extract_failures
            .lock()
            .unwrap()
            .insert((kind, PaperId::from(paper)), detail.to_string());
    }

    pub fn clear_failures(&self) {
        self.extract_failures.lock().unwrap().clear();
        *self.upload_failure.lock().unwrap() = None;
        *self.visualize_failure.lock().unwrap() = None;
    }

    pub fn set_items_per_extraction(&self, n: usize) {
        *self.items_per_extraction.lock().unwrap() = Some(n);
    }

    pub fn fail_upload(&self, detail: &str) {
        *self.upload_failure.lock().unwrap() = Some(detail.to_string());
    }

    pub fn fail_visualize(&self, detail: &str) {
        *self.visualize_failure.lock().unwrap() = Some(detail.to_string());
    }

    pub fn set_visualize_markup(&self, markup: &str) {
        *self.visualize_markup.lock().unwrap() = Some(markup.to_string());
    }

    pub fn set_listing(&self, papers: Vec<Paper>) {
        *self.listing.lock().unwrap() = papers;
    }

    /// Visualization requests block until [`release_visualize`](Self::release_visualize).
    pub fn hold_visualize(&self) {
        self.hold_visualize.store(true, Ordering::SeqCst);
    }

    pub fn release_visualize(&self) {
        self.visualize_release.notify_one();
    }

    /// Let the extraction issued as call number `index` (0-based) complete.
    pub fn release_extract(&self, index: usize) {
        let sender = self
            .extract_gates
            .lock()
            .unwrap()
            .get_mut(index)
            .and_then(Option::take);
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }

    pub async fn wait_for_extract_calls(&self, n: usize) {
        wait_until(|| self.extract_calls() >= n).await;
    }

    pub async fn wait_for_visualize_calls(&self, n: usize) {
        wait_until(|| self.visualize_calls() >= n).await;
    }
}

async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..2000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

pub(crate) fn paper(id: &str, title: &str) -> Paper {
    Paper {
        paper_id: PaperId::from(id),
        title: title.to_string(),
        abstract_text: String::new(),
        authors: vec!["A. Author".into()],
        num_pages: 12,
        status: "processed".into(),
    }
}

fn status(detail: String) -> ApiError {
    ApiError::Status {
        status: 500,
        detail,
    }
}

impl PaperBackend for FakeBackend {
    async fn upload(&self, file: &PdfUpload) -> Result<Paper, ApiError> {
        let n = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(detail) = self.upload_failure.lock().unwrap().clone() {
            return Err(ApiError::Status {
                status: 400,
                detail,
            });
        }
        let title = file.filename.trim_end_matches(".pdf").to_string();
        Ok(paper(&format!("paper-{n}"), &title))
    }

    async fn list_papers(&self) -> Result<PaperListing, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let papers = self.listing.lock().unwrap().clone();
        Ok(PaperListing {
            total: papers.len(),
            papers,
        })
    }

    async fn get_paper(&self, paper_id: &PaperId) -> Result<Paper, ApiError> {
        self.listing
            .lock()
            .unwrap()
            .iter()
            .find(|p| &p.paper_id == paper_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                detail: "Paper not found".into(),
            })
    }

    async fn extract(
        &self,
        kind: ExtractionKind,
        paper_id: &PaperId,
    ) -> Result<ExtractionPayload, ApiError> {
        let cached = !self
            .extracted
            .lock()
            .unwrap()
            .insert((kind, paper_id.clone()));
        let failure = self
            .extract_failures
            .lock()
            .unwrap()
            .get(&(kind, paper_id.clone()))
            .cloned();
        let items = self
            .items_per_extraction
            .lock()
            .unwrap()
            .unwrap_or(ITEMS_PER_EXTRACTION);

        let gate = {
            let mut gates = self.extract_gates.lock().unwrap();
            let gate = if self.gated {
                let (tx, rx) = oneshot::channel();
                gates.push(Some(tx));
                Some(rx)
            } else {
                gates.push(None);
                None
            };
            self.extract_calls.fetch_add(1, Ordering::SeqCst);
            gate
        };
        if let Some(rx) = gate {
            let _ = rx.await;
        }

        if let Some(detail) = failure {
            return Err(status(detail));
        }
        Ok(ExtractionPayload {
            items: (0..items)
                .map(|i| {
                    json!({
                        "contribution_type": "method",
                        "specific_innovation": format!("{} item {i} of {paper_id}", kind.id()),
                        "problem_addressed": "test problem",
                        "evidence_location": format!("Section {}", i + 1),
                    })
                })
                .collect(),
            cached,
        })
    }

    async fn generate_visualization(
        &self,
        paper_ids: &[PaperId],
        query: &str,
    ) -> Result<String, ApiError> {
        self.visualize_queries
            .lock()
            .unwrap()
            .push((paper_ids.to_vec(), query.to_string()));
        self.visualize_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_visualize.load(Ordering::SeqCst) {
            self.visualize_release.notified().await;
        }
        if let Some(detail) = self.visualize_failure.lock().unwrap().clone() {
            return Err(status(detail));
        }
        if let Some(markup) = self.visualize_markup.lock().unwrap().clone() {
            return Ok(markup);
        }
        let ids = paper_ids
            .iter()
            .map(PaperId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "<html><body><h1>{query}</h1><div style=\"height: 400px\">{ids}</div></body></html>"
        ))
    }

    async fn query_paper(&self, question: &PaperQuestion) -> Result<PaperAnswer, ApiError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PaperAnswer {
            paper_id: question.paper_id.clone(),
            query: question.query.clone(),
            result: format!("answer about {}", question.paper_id),
        })
    }

    /// Every paper contributes `ITEMS_PER_EXTRACTION` "method" contributions.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, ApiError> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        let papers = request.paper_ids.len();
        let total = papers * ITEMS_PER_EXTRACTION;
        let body = json!({
            "total_papers": papers,
            "total_contributions": total,
            "most_common": [{"type": "method", "count": total}],
            "total_experiments": 0,
            "patterns": [{
                "title": "Most Common Contribution Type",
                "description": format!("method appears in {total} papers"),
                "confidence": "high"
            }],
            "gaps": [],
        });
        AnalysisReport::from_response(request.kind, body)
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportedFile, ApiError> {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExportedFile {
            filename: request.fallback_filename(),
            content_type: Some("application/json".into()),
            bytes: br#"{"ok":true}"#.to_vec(),
        })
    }

    async fn health(&self) -> Result<Health, ApiError> {
        Ok(Health {
            status: "healthy".into(),
            llm: "configured".into(),
            provider: Some("openai".into()),
        })
    }
}
