//! Contract with the remote analysis service.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisReport, AnalysisRequest, PaperAnswer, PaperQuestion};
use crate::extraction::{ExtractionKind, ExtractionPayload};
use crate::paper::{Paper, PaperId, PdfUpload};
use crate::{ApiError, ValidationError};

/// Operations the analysis service exposes.
///
/// [`ApiClient`](crate::ApiClient) speaks HTTP; tests substitute an in-memory
/// implementation that counts calls.
pub trait PaperBackend: Send + Sync + 'static {
    fn upload(&self, file: &PdfUpload) -> impl Future<Output = Result<Paper, ApiError>> + Send;

    fn list_papers(&self) -> impl Future<Output = Result<PaperListing, ApiError>> + Send;

    fn get_paper(
        &self,
        paper_id: &PaperId,
    ) -> impl Future<Output = Result<Paper, ApiError>> + Send;

    fn extract(
        &self,
        kind: ExtractionKind,
        paper_id: &PaperId,
    ) -> impl Future<Output = Result<ExtractionPayload, ApiError>> + Send;

    /// Returns the generated markup.
    fn generate_visualization(
        &self,
        paper_ids: &[PaperId],
        query: &str,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;

    /// Free-form question about one paper, answered by the backend's LLM.
    fn query_paper(
        &self,
        question: &PaperQuestion,
    ) -> impl Future<Output = Result<PaperAnswer, ApiError>> + Send;

    fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<AnalysisReport, ApiError>> + Send;

    fn export(
        &self,
        request: &ExportRequest,
    ) -> impl Future<Output = Result<ExportedFile, ApiError>> + Send;

    fn health(&self) -> impl Future<Output = Result<Health, ApiError>> + Send;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperListing {
    #[serde(default)]
    pub papers: Vec<Paper>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub llm: String,
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    Contributions,
    Experiments,
    All,
}

impl ExportTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contributions => "contributions",
            Self::Experiments => "experiments",
            Self::All => "all",
        }
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contributions" => Ok(Self::Contributions),
            "experiments" => Ok(Self::Experiments),
            "all" => Ok(Self::All),
            other => Err(format!("unknown export target: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Markdown,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "markdown",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// A validated export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub paper_id: PaperId,
    pub target: ExportTarget,
    pub format: ExportFormat,
}

impl ExportRequest {
    /// CSV exists only per extraction kind, Markdown only for the full report.
    pub fn new(
        paper_id: PaperId,
        target: ExportTarget,
        format: ExportFormat,
    ) -> Result<Self, ValidationError> {
        let supported = match (target, format) {
            (_, ExportFormat::Json) => true,
            (ExportTarget::All, ExportFormat::Csv) => false,
            (_, ExportFormat::Csv) => true,
            (ExportTarget::All, ExportFormat::Markdown) => true,
            (_, ExportFormat::Markdown) => false,
        };
        if !supported {
            return Err(ValidationError::UnsupportedExport {
                target: target.to_string(),
                format: format.to_string(),
            });
        }
        Ok(Self {
            paper_id,
            target,
            format,
        })
    }

    /// Name used when the response carries no `Content-Disposition` filename.
    pub fn fallback_filename(&self) -> String {
        format!("{}_{}.{}", self.paper_id, self.target, self.format)
    }
}

/// A downloaded export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

static DISPOSITION_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'')?"?([^";]+)"?"#).unwrap()
});

/// Extract the filename from a `Content-Disposition` header value.
///
/// Path components are stripped so a hostile header cannot steer the write
/// outside the target directory.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let raw = DISPOSITION_FILENAME.captures(header)?.get(1)?.as_str().trim();
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(target: ExportTarget, format: ExportFormat) -> Result<ExportRequest, ValidationError> {
        ExportRequest::new(PaperId::from("p1"), target, format)
    }

    #[test]
    fn csv_not_offered_for_full_report() {
        assert!(request(ExportTarget::All, ExportFormat::Csv).is_err());
        assert!(request(ExportTarget::Contributions, ExportFormat::Csv).is_ok());
    }

    #[test]
    fn markdown_only_for_full_report() {
        assert!(request(ExportTarget::All, ExportFormat::Markdown).is_ok());
        assert!(request(ExportTarget::Experiments, ExportFormat::Markdown).is_err());
    }

    #[test]
    fn fallback_filename_uses_id_target_and_format() {
        let req = request(ExportTarget::Experiments, ExportFormat::Json).unwrap();
        assert_eq!(req.fallback_filename(), "p1_experiments.json");
    }

    #[test]
    fn disposition_quoted_and_bare() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="p1_report.md""#).as_deref(),
            Some("p1_report.md")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=p1_contributions.csv").as_deref(),
            Some("p1_contributions.csv")
        );
    }

    #[test]
    fn disposition_strips_directories() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="../../etc/passwd""#).as_deref(),
            Some("passwd")
        );
        assert_eq!(filename_from_disposition("attachment; filename=\"..\""), None);
    }

    #[test]
    fn disposition_without_filename() {
        assert_eq!(filename_from_disposition("inline"), None);
    }
}
