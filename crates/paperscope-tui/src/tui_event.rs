use std::path::PathBuf;
use std::sync::Arc;

use paperscope_core::{
    AnalysisReport, CacheKey, CacheState, Health, Paper, PaperAnswer, PaperId, PaperListing,
    VerificationSample, VisualizationResult,
};

/// Events flowing from background tasks to the TUI.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// A file was accepted by the backend.
    Uploaded { filename: String, paper: Paper },
    /// Local validation or the backend rejected a file.
    UploadFailed { filename: String, error: String },
    /// The backend's paper list arrived.
    Synced { listing: PaperListing },
    SyncFailed { error: String },
    /// An extraction fetch finished; the cache already holds its outcome.
    ExtractionSettled { key: CacheKey, state: CacheState },
    VisualizationReady { result: Arc<VisualizationResult> },
    VisualizationFailed { error: String },
    /// Verification sample for the current visualization.
    VerificationReady { sample: Arc<VerificationSample> },
    /// Outcome of a question about one paper.
    Answered {
        paper_id: PaperId,
        outcome: Result<PaperAnswer, String>,
    },
    /// Outcome of analysis request number `seq`.
    Analyzed {
        seq: u64,
        outcome: Result<AnalysisReport, String>,
    },
    Exported { path: PathBuf },
    ExportFailed { error: String },
    Health { health: Result<Health, String> },
}
