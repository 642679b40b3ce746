//! Query-driven visualization requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::backend::PaperBackend;
use crate::paper::PaperId;
use crate::{ApiError, CoreError, ValidationError};

/// A validated request: trimmed, non-empty query over at least one paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualizationRequest {
    pub query: String,
    pub paper_ids: Vec<PaperId>,
}

impl VisualizationRequest {
    pub fn new(query: &str, paper_ids: &[PaperId]) -> Result<Self, ValidationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if paper_ids.is_empty() {
            return Err(ValidationError::NoPapers);
        }
        Ok(Self {
            query: query.to_string(),
            paper_ids: paper_ids.to_vec(),
        })
    }
}

/// Markup generated for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualizationResult {
    pub query: String,
    pub paper_ids: Vec<PaperId>,
    pub markup: String,
    pub generated_at: DateTime<Utc>,
}

/// Issues visualization requests, at most one at a time, and keeps the latest
/// successful result.
pub struct VisualizationPipeline<B: PaperBackend> {
    backend: Arc<B>,
    in_flight: AtomicBool,
    current: Mutex<Option<Arc<VisualizationResult>>>,
    last_error: Mutex<Option<String>>,
}

/// Clears the in-flight flag when the request finishes or its future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<B: PaperBackend> VisualizationPipeline<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            in_flight: AtomicBool::new(false),
            current: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Generate markup for `query` over `paper_ids`.
    ///
    /// Validation happens before anything else, so an invalid request never
    /// reaches the backend. A call made while another is pending fails with
    /// [`CoreError::Busy`]. On success the result replaces the previous one
    /// entirely; on failure the previous result stays and the message is kept
    /// in [`last_error`](Self::last_error).
    pub async fn generate(
        &self,
        query: &str,
        paper_ids: &[PaperId],
    ) -> Result<Arc<VisualizationResult>, CoreError> {
        let request = VisualizationRequest::new(query, paper_ids)?;
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CoreError::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        log::info!(
            "generating visualization over {} paper(s): {}",
            request.paper_ids.len(),
            request.query
        );
        let outcome = self
            .backend
            .generate_visualization(&request.paper_ids, &request.query)
            .await
            .and_then(|markup| {
                if markup.trim().is_empty() {
                    Err(ApiError::Decode("backend returned empty markup".into()))
                } else {
                    Ok(markup)
                }
            });

        match outcome {
            Ok(markup) => {
                let result = Arc::new(VisualizationResult {
                    query: request.query,
                    paper_ids: request.paper_ids,
                    markup,
                    generated_at: Utc::now(),
                });
                *lock(&self.current) = Some(result.clone());
                *lock(&self.last_error) = None;
                Ok(result)
            }
            Err(e) => {
                log::warn!("visualization failed: {e}");
                *lock(&self.last_error) = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Re-issue the current result's query over the same papers.
    pub async fn regenerate(&self) -> Result<Arc<VisualizationResult>, CoreError> {
        let current = self.current().ok_or(ValidationError::NothingToRegenerate)?;
        self.generate(&current.query, &current.paper_ids).await
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn current(&self) -> Option<Arc<VisualizationResult>> {
        lock(&self.current).clone()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn clear(&self) {
        *lock(&self.current) = None;
        *lock(&self.last_error) = None;
    }
}

/// Poisoning only happens if a holder panicked; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBackend;

    fn ids(names: &[&str]) -> Vec<PaperId> {
        names.iter().map(|n| PaperId::from(*n)).collect()
    }

    #[tokio::test]
    async fn empty_query_is_rejected_locally() {
        let backend = Arc::new(FakeBackend::new());
        let pipeline = VisualizationPipeline::new(backend.clone());
        for query in ["", "   \n\t"] {
            let err = pipeline.generate(query, &ids(&["a"])).await.unwrap_err();
            assert!(matches!(err, CoreError::Validation(ValidationError::EmptyQuery)));
            assert_eq!(err.to_string(), "Please enter a query");
        }
        assert_eq!(backend.visualize_calls(), 0);
    }

    #[tokio::test]
    async fn empty_paper_set_is_rejected_locally() {
        let backend = Arc::new(FakeBackend::new());
        let pipeline = VisualizationPipeline::new(backend.clone());
        let err = pipeline.generate("compare", &[]).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::NoPapers)));
        assert_eq!(backend.visualize_calls(), 0);
        assert!(pipeline.last_error().is_none());
    }

    #[tokio::test]
    async fn query_is_trimmed_before_sending() {
        let backend = Arc::new(FakeBackend::new());
        let pipeline = VisualizationPipeline::new(backend.clone());
        let result = pipeline.generate("  timeline  ", &ids(&["a"])).await.unwrap();
        assert_eq!(result.query, "timeline");
        assert_eq!(backend.visualize_queries()[0].1, "timeline");
    }

    #[tokio::test]
    async fn success_replaces_previous_result() {
        let backend = Arc::new(FakeBackend::new());
        let pipeline = VisualizationPipeline::new(backend.clone());
        let first = pipeline.generate("first", &ids(&["a", "b"])).await.unwrap();
        let second = pipeline.generate("second", &ids(&["c"])).await.unwrap();

        let current = pipeline.current().unwrap();
        assert!(Arc::ptr_eq(&current, &second));
        assert_eq!(current.paper_ids, ids(&["c"]));
        assert!(current.markup.contains("second"));
        assert!(!current.markup.contains(&first.query));
    }

    #[tokio::test]
    async fn failure_keeps_previous_result() {
        let backend = Arc::new(FakeBackend::new());
        let pipeline = VisualizationPipeline::new(backend.clone());
        let ok = pipeline.generate("first", &ids(&["a"])).await.unwrap();

        backend.fail_visualize("Visualization generation failed: quota");
        let err = pipeline.generate("second", &ids(&["a"])).await.unwrap_err();
        assert!(!err.is_local());
        assert_eq!(
            pipeline.last_error().as_deref(),
            Some("Visualization generation failed: quota")
        );
        assert!(Arc::ptr_eq(&pipeline.current().unwrap(), &ok));
    }

    #[tokio::test]
    async fn empty_markup_is_an_error() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_visualize_markup("   ");
        let pipeline = VisualizationPipeline::new(backend.clone());
        let err = pipeline.generate("q", &ids(&["a"])).await.unwrap_err();
        assert!(matches!(err, CoreError::Api(ApiError::Decode(_))));
        assert!(pipeline.current().is_none());
    }

    #[tokio::test]
    async fn second_request_while_pending_is_busy() {
        let backend = Arc::new(FakeBackend::new());
        backend.hold_visualize();
        let pipeline = Arc::new(VisualizationPipeline::new(backend.clone()));

        let first = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.generate("one", &ids(&["a"])).await })
        };
        backend.wait_for_visualize_calls(1).await;
        assert!(pipeline.is_busy());

        let err = pipeline.generate("two", &ids(&["a"])).await.unwrap_err();
        assert!(matches!(err, CoreError::Busy));
        assert_eq!(backend.visualize_calls(), 1);

        backend.release_visualize();
        assert!(first.await.unwrap().is_ok());
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn regenerate_reuses_query_and_papers() {
        let backend = Arc::new(FakeBackend::new());
        let pipeline = VisualizationPipeline::new(backend.clone());
        assert!(matches!(
            pipeline.regenerate().await.unwrap_err(),
            CoreError::Validation(ValidationError::NothingToRegenerate)
        ));

        pipeline.generate("baselines", &ids(&["a", "b"])).await.unwrap();
        pipeline.regenerate().await.unwrap();
        let calls = backend.visualize_queries();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }
}
