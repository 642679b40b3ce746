//! One user's working set: registered papers, their cached extractions, the
//! focused view and the current visualization.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::analysis::{
    AnalysisKind, AnalysisReport, AnalysisRequest, PaperAnswer, PaperQuestion,
};
use crate::backend::{
    ExportFormat, ExportRequest, ExportTarget, ExportedFile, Health, PaperBackend, PaperListing,
};
use crate::cache::{CacheKey, CacheState, ExtractionCache};
use crate::config::Config;
use crate::controller::{ActivationController, FetchTicket, SettleHook, View};
use crate::extraction::ExtractionKind;
use crate::paper::{Paper, PaperId, PdfUpload};
use crate::registry::{PaperRegistry, UploadCoordinator};
use crate::sandbox::{FrameSize, GuestFrame, SandboxRenderer};
use crate::verification::{VerificationOverlay, VerificationSample, VerificationTarget};
use crate::visualize::{VisualizationPipeline, VisualizationResult};
use crate::{ApiError, CoreError};

/// A successful generation and the verification sample being gathered for it.
#[derive(Debug)]
pub struct Generation {
    pub result: Arc<VisualizationResult>,
    verification: JoinHandle<Option<Arc<VerificationSample>>>,
}

impl Generation {
    /// Wait for the verification sample. `None` when it was superseded.
    pub async fn verification(self) -> Option<Arc<VerificationSample>> {
        self.verification.await.ok().flatten()
    }

    pub fn into_parts(self) -> (Arc<VisualizationResult>, JoinHandle<Option<Arc<VerificationSample>>>) {
        (self.result, self.verification)
    }
}

/// Visualization pipeline plus the verification overlay that follows each
/// successful generation. Cheap to clone into background tasks.
pub struct Visualizer<B: PaperBackend> {
    pipeline: Arc<VisualizationPipeline<B>>,
    overlay: Arc<VerificationOverlay<B>>,
}

impl<B: PaperBackend> Clone for Visualizer<B> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            overlay: self.overlay.clone(),
        }
    }
}

impl<B: PaperBackend> Visualizer<B> {
    pub fn new(pipeline: Arc<VisualizationPipeline<B>>, overlay: Arc<VerificationOverlay<B>>) -> Self {
        Self { pipeline, overlay }
    }

    pub fn pipeline(&self) -> &Arc<VisualizationPipeline<B>> {
        &self.pipeline
    }

    pub fn overlay(&self) -> &Arc<VerificationOverlay<B>> {
        &self.overlay
    }

    /// Generate, then start sampling `targets` in the background. The
    /// returned result does not wait for the sample.
    pub async fn generate(
        &self,
        query: &str,
        paper_ids: &[PaperId],
        targets: Vec<VerificationTarget>,
    ) -> Result<Generation, CoreError> {
        let result = self.pipeline.generate(query, paper_ids).await?;
        Ok(self.start_verification(result, targets))
    }

    pub async fn regenerate(&self, targets: Vec<VerificationTarget>) -> Result<Generation, CoreError> {
        let result = self.pipeline.regenerate().await?;
        Ok(self.start_verification(result, targets))
    }

    fn start_verification(
        &self,
        result: Arc<VisualizationResult>,
        targets: Vec<VerificationTarget>,
    ) -> Generation {
        let epoch = self.overlay.begin();
        let overlay = self.overlay.clone();
        let verification = tokio::spawn(async move { overlay.refresh(epoch, &targets).await });
        Generation {
            result,
            verification,
        }
    }
}

pub struct Session<B: PaperBackend> {
    backend: Arc<B>,
    registry: PaperRegistry,
    cache: Arc<ExtractionCache>,
    uploader: Arc<UploadCoordinator<B>>,
    controller: ActivationController<B>,
    visualizer: Visualizer<B>,
    renderer: SandboxRenderer,
    prune_cache_on_remove: bool,
}

impl<B: PaperBackend> Session<B> {
    pub fn new(backend: B, config: &Config) -> Self {
        Self::from_arc(Arc::new(backend), config)
    }

    pub fn from_arc(backend: Arc<B>, config: &Config) -> Self {
        let cache = Arc::new(ExtractionCache::new());
        let pipeline = Arc::new(VisualizationPipeline::new(backend.clone()));
        let overlay = Arc::new(VerificationOverlay::new(
            backend.clone(),
            cache.clone(),
            config.verification,
        ));
        Self {
            registry: PaperRegistry::new(),
            uploader: Arc::new(UploadCoordinator::new(backend.clone())),
            controller: ActivationController::new(backend.clone(), cache.clone()),
            visualizer: Visualizer::new(pipeline, overlay),
            renderer: SandboxRenderer::new(config.sandbox),
            prune_cache_on_remove: config.prune_cache_on_remove,
            cache,
            backend,
        }
    }

    /// Called from fetch tasks whenever an extraction settles.
    pub fn with_settle_hook(mut self, hook: SettleHook) -> Self {
        self.controller = self.controller.with_settle_hook(hook);
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn registry(&self) -> &PaperRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ExtractionCache> {
        &self.cache
    }

    pub fn uploader(&self) -> Arc<UploadCoordinator<B>> {
        self.uploader.clone()
    }

    pub fn visualizer(&self) -> Visualizer<B> {
        self.visualizer.clone()
    }

    pub fn pipeline(&self) -> &Arc<VisualizationPipeline<B>> {
        self.visualizer.pipeline()
    }

    pub fn overlay(&self) -> &Arc<VerificationOverlay<B>> {
        self.visualizer.overlay()
    }

    pub fn renderer(&self) -> &SandboxRenderer {
        &self.renderer
    }

    // --- papers ---

    /// Validate and upload `file`, registering the resulting paper.
    pub async fn upload(&mut self, file: &PdfUpload) -> Result<Paper, CoreError> {
        let paper = self.uploader.upload(file).await?;
        self.register(paper.clone());
        Ok(paper)
    }

    /// Register a paper uploaded elsewhere (e.g. by a background task).
    pub fn register(&mut self, paper: Paper) -> bool {
        self.registry.push(paper)
    }

    /// Forget a paper locally. The backend is not contacted.
    pub fn remove_paper(&mut self, paper_id: &PaperId) -> Option<Paper> {
        let removed = self.registry.remove(paper_id)?;
        if self.prune_cache_on_remove {
            let pruned = self.cache.prune_paper(paper_id);
            log::debug!("removed {paper_id}, pruned {pruned} cache entries");
        }
        if self.controller.selected_paper() == Some(paper_id) {
            self.controller.select_paper(None);
        }
        Some(removed)
    }

    /// Pull the backend's paper list and register papers not known yet.
    pub async fn sync_papers(&mut self) -> Result<usize, CoreError> {
        let listing = self.backend.list_papers().await?;
        Ok(self.merge_listing(listing))
    }

    /// Register papers from a listing fetched elsewhere. Known ids are skipped.
    pub fn merge_listing(&mut self, listing: PaperListing) -> usize {
        let added = self.registry.merge_listing(listing);
        log::info!("synced paper list: {added} new, {} total", self.registry.len());
        added
    }

    // --- extraction ---

    pub fn selected_paper(&self) -> Option<&PaperId> {
        self.controller.selected_paper()
    }

    pub fn active_view(&self) -> View {
        self.controller.active_view()
    }

    pub fn select_paper(&mut self, paper_id: Option<PaperId>) -> Option<FetchTicket> {
        self.controller.select_paper(paper_id)
    }

    pub fn activate(&mut self, view: View) -> Option<FetchTicket> {
        self.controller.activate(view)
    }

    /// Re-run `kind` for the selected paper.
    pub fn invalidate(&mut self, kind: ExtractionKind) -> Option<FetchTicket> {
        let paper_id = self.controller.selected_paper()?.clone();
        self.controller.invalidate(&CacheKey::new(kind, paper_id))
    }

    pub fn invalidate_key(&mut self, key: &CacheKey) -> Option<FetchTicket> {
        self.controller.invalidate(key)
    }

    /// State of `kind` for the selected paper.
    pub fn extraction_state(&self, kind: ExtractionKind) -> CacheState {
        self.controller.state_for(kind)
    }

    // --- visualization ---

    pub fn verification_targets(&self, paper_ids: &[PaperId]) -> Vec<VerificationTarget> {
        paper_ids
            .iter()
            .map(|id| VerificationTarget {
                paper_id: id.clone(),
                title: self
                    .registry
                    .title_of(id)
                    .map(str::to_string)
                    .unwrap_or_else(|| id.to_string()),
            })
            .collect()
    }

    pub async fn generate(&self, query: &str, paper_ids: &[PaperId]) -> Result<Generation, CoreError> {
        let targets = self.verification_targets(paper_ids);
        self.visualizer.generate(query, paper_ids, targets).await
    }

    pub async fn regenerate(&self) -> Result<Generation, CoreError> {
        let targets = self
            .pipeline()
            .current()
            .map(|current| self.verification_targets(&current.paper_ids))
            .unwrap_or_default();
        self.visualizer.regenerate(targets).await
    }

    /// Load the current visualization into `frame` and size it.
    pub fn render<F: GuestFrame>(&self, frame: &mut F) -> Option<FrameSize> {
        let current = self.pipeline().current()?;
        Some(self.renderer.render(frame, &current))
    }

    // --- questions and analyses ---

    /// Ask a free-form question about one paper. A blank query is rejected locally.
    pub async fn ask(&self, paper_id: PaperId, query: &str) -> Result<PaperAnswer, CoreError> {
        let question = PaperQuestion::new(paper_id, query)?;
        log::info!("asking {} about {}", question.query, question.paper_id);
        Ok(self.backend.query_paper(&question).await?)
    }

    /// Aggregate `kind` across `paper_ids`. An empty set is rejected locally.
    pub async fn analyze(
        &self,
        kind: AnalysisKind,
        paper_ids: &[PaperId],
    ) -> Result<AnalysisReport, CoreError> {
        let request = AnalysisRequest::new(kind, paper_ids)?;
        Ok(self.backend.analyze(&request).await?)
    }

    // --- misc ---

    pub async fn export(
        &self,
        paper_id: PaperId,
        target: ExportTarget,
        format: ExportFormat,
    ) -> Result<ExportedFile, CoreError> {
        let request = ExportRequest::new(paper_id, target, format)?;
        Ok(self.backend.export(&request).await?)
    }

    pub async fn health(&self) -> Result<Health, ApiError> {
        self.backend.health().await
    }
}
