use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Signature every PDF carries near the start of the file.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Readers accept the signature anywhere in the first KiB.
const SIGNATURE_WINDOW: usize = 1024;

/// Opaque identifier assigned by the backend on upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperId(String);

impl PaperId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaperId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PaperId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An uploaded paper and its parsed metadata.
///
/// The list endpoint omits `abstract` and `status`, so everything except the id
/// and title falls back to a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub paper_id: PaperId,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub num_pages: u32,
    #[serde(default)]
    pub status: String,
}

impl Paper {
    /// Authors for display: the first `max` names, then "+N more".
    pub fn author_line(&self, max: usize) -> String {
        let mut line = self
            .authors
            .iter()
            .take(max)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if self.authors.len() > max {
            line.push_str(&format!(" +{} more", self.authors.len() - max));
        }
        line
    }
}

/// A file the user wants to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl PdfUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a file from disk. Recognition happens later, in [`check`](Self::check).
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }

    /// Whether the file is recognized as a PDF: `.pdf` name and a `%PDF-` signature.
    pub fn is_pdf(&self) -> bool {
        let named_pdf = self.filename.to_ascii_lowercase().ends_with(".pdf");
        let window = &self.bytes[..self.bytes.len().min(SIGNATURE_WINDOW)];
        named_pdf && window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
    }

    pub fn check(&self) -> Result<(), ValidationError> {
        if self.is_pdf() {
            Ok(())
        } else {
            Err(ValidationError::NotPdf {
                filename: self.filename.clone(),
            })
        }
    }
}
