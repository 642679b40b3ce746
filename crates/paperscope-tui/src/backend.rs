use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use paperscope_core::{
    AnalysisRequest, ApiClient, ExportRequest, Paper, PaperBackend, PaperId, PaperQuestion,
    PdfUpload, UploadCoordinator,
    VerificationTarget, Visualizer,
};

use crate::tui_event::BackendEvent;

pub type EventTx = mpsc::UnboundedSender<BackendEvent>;

/// Upload one file in the background.
///
/// Files are read and validated inside the task, so a bad path or a non-PDF
/// comes back as an `UploadFailed` event like any backend rejection.
pub fn spawn_upload(
    uploader: Arc<UploadCoordinator<ApiClient>>,
    path: PathBuf,
    tx: EventTx,
    cancel: CancellationToken,
) {
    let filename = display_name(&path);
    tokio::spawn(async move {
        let outcome: Result<Paper, String> = async {
            let file =
                PdfUpload::from_path(&path).map_err(|e| format!("{}: {e}", path.display()))?;
            tokio::select! {
                result = uploader.upload(&file) => result.map_err(|e| e.to_string()),
                _ = cancel.cancelled() => Err("cancelled".to_string()),
            }
        }
        .await;

        let event = match outcome {
            Ok(paper) => BackendEvent::Uploaded { filename, paper },
            Err(error) => {
                tracing::warn!(%filename, %error, "upload failed");
                BackendEvent::UploadFailed { filename, error }
            }
        };
        let _ = tx.send(event);
    });
}

/// Fetch the backend's paper list.
pub fn spawn_sync(backend: Arc<ApiClient>, tx: EventTx) {
    tokio::spawn(async move {
        let event = match backend.list_papers().await {
            Ok(listing) => BackendEvent::Synced { listing },
            Err(e) => BackendEvent::SyncFailed {
                error: e.to_string(),
            },
        };
        let _ = tx.send(event);
    });
}

pub fn spawn_health(backend: Arc<ApiClient>, tx: EventTx) {
    tokio::spawn(async move {
        let health = backend.health().await.map_err(|e| e.to_string());
        let _ = tx.send(BackendEvent::Health { health });
    });
}

/// Generate a visualization (or regenerate the current one when `request`
/// is `None`), then forward the verification sample once it is gathered.
pub fn spawn_generate(
    visualizer: Visualizer<ApiClient>,
    request: Option<(String, Vec<PaperId>)>,
    targets: Vec<VerificationTarget>,
    tx: EventTx,
) {
    tokio::spawn(async move {
        let outcome = match &request {
            Some((query, paper_ids)) => visualizer.generate(query, paper_ids, targets).await,
            None => visualizer.regenerate(targets).await,
        };
        let generation = match outcome {
            Ok(generation) => generation,
            Err(e) => {
                let _ = tx.send(BackendEvent::VisualizationFailed {
                    error: e.to_string(),
                });
                return;
            }
        };

        let (result, verification) = generation.into_parts();
        let _ = tx.send(BackendEvent::VisualizationReady { result });
        if let Ok(Some(sample)) = verification.await {
            let _ = tx.send(BackendEvent::VerificationReady { sample });
        }
    });
}

pub fn spawn_ask(backend: Arc<ApiClient>, question: PaperQuestion, tx: EventTx) {
    tokio::spawn(async move {
        let outcome = backend.query_paper(&question).await.map_err(|e| e.to_string());
        if let Err(error) = &outcome {
            tracing::warn!(paper_id = %question.paper_id, %error, "question failed");
        }
        let _ = tx.send(BackendEvent::Answered {
            paper_id: question.paper_id,
            outcome,
        });
    });
}

pub fn spawn_analysis(backend: Arc<ApiClient>, request: AnalysisRequest, seq: u64, tx: EventTx) {
    tokio::spawn(async move {
        let outcome = backend.analyze(&request).await.map_err(|e| e.to_string());
        let _ = tx.send(BackendEvent::Analyzed { seq, outcome });
    });
}

/// Download an export and write it into `dir`.
pub fn spawn_export(backend: Arc<ApiClient>, request: ExportRequest, dir: PathBuf, tx: EventTx) {
    tokio::spawn(async move {
        let event = match backend.export(&request).await {
            Ok(file) => {
                let path = dir.join(&file.filename);
                match std::fs::write(&path, &file.bytes) {
                    Ok(()) => BackendEvent::Exported { path },
                    Err(e) => BackendEvent::ExportFailed {
                        error: format!("{}: {e}", path.display()),
                    },
                }
            }
            Err(e) => BackendEvent::ExportFailed {
                error: e.to_string(),
            },
        };
        let _ = tx.send(event);
    });
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
