use thiserror::Error;

pub mod analysis;
pub mod backend;
pub mod cache;
pub mod client;
pub mod config;
pub mod controller;
pub mod extraction;
pub mod paper;
pub mod registry;
pub mod sandbox;
pub mod session;
pub mod verification;
pub mod visualize;

#[cfg(test)]
mod fake;

// Re-export for convenience
pub use analysis::{
    AnalysisKind, AnalysisReport, AnalysisRequest, Insight, PaperAnswer, PaperQuestion, Tally,
};
pub use backend::{
    ExportFormat, ExportRequest, ExportTarget, ExportedFile, Health, PaperBackend, PaperListing,
};
pub use cache::{CacheKey, CacheState, ExtractionCache};
pub use client::ApiClient;
pub use config::{API_URL_ENV, Config, ConfigError, DEFAULT_API_URL};
pub use controller::{ActivationController, FetchTicket, SettleHook, View};
pub use extraction::{
    Contribution, EXTRACTION_TYPES, Experiment, ExtractionKind, ExtractionPayload,
    ExtractionType, RenderMode,
};
pub use paper::{Paper, PaperId, PdfUpload};
pub use registry::{PaperRegistry, UploadCoordinator};
pub use sandbox::{
    FrameSize, GuestFrame, HeightPolicy, HeightSource, LayoutEstimateFrame, MeasureError,
    SandboxRenderer, SandboxedDocument,
};
pub use session::{Generation, Session, Visualizer};
pub use verification::{
    VerificationEntry, VerificationLimits, VerificationOverlay, VerificationSample,
    VerificationTarget,
};
pub use visualize::{VisualizationPipeline, VisualizationRequest, VisualizationResult};

/// Errors caught locally, before anything reaches the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a query")]
    EmptyQuery,
    #[error("Please select at least one paper")]
    NoPapers,
    #[error("{filename} is not a PDF file")]
    NotPdf { filename: String },
    #[error("{format} export is not available for {target}")]
    UnsupportedExport { target: String, format: String },
    #[error("no visualization to regenerate")]
    NothingToRegenerate,
}

/// Transport and backend failures.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success response; `detail` is the backend's message verbatim.
    #[error("{detail}")]
    Status { status: u16, detail: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("a visualization is already being generated")]
    Busy,
}

impl CoreError {
    /// True for failures that never left the process.
    pub fn is_local(&self) -> bool {
        matches!(self, CoreError::Validation(_) | CoreError::Busy)
    }
}
