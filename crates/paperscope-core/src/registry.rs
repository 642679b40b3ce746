//! The set of papers known to this session, and the upload path that feeds it.

use std::sync::Arc;

use crate::CoreError;
use crate::backend::{PaperBackend, PaperListing};
use crate::paper::{Paper, PaperId, PdfUpload};

/// Papers in upload order. Ids are unique.
#[derive(Debug, Clone, Default)]
pub struct PaperRegistry {
    papers: Vec<Paper>,
}

impl PaperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `paper`. Returns false, leaving the registry unchanged, when its
    /// id is already registered.
    pub fn push(&mut self, paper: Paper) -> bool {
        if self.contains(&paper.paper_id) {
            return false;
        }
        self.papers.push(paper);
        true
    }

    /// Remove a paper. Cached extractions are not touched here.
    pub fn remove(&mut self, paper_id: &PaperId) -> Option<Paper> {
        let index = self.papers.iter().position(|p| &p.paper_id == paper_id)?;
        Some(self.papers.remove(index))
    }

    pub fn get(&self, paper_id: &PaperId) -> Option<&Paper> {
        self.papers.iter().find(|p| &p.paper_id == paper_id)
    }

    pub fn contains(&self, paper_id: &PaperId) -> bool {
        self.get(paper_id).is_some()
    }

    pub fn papers(&self) -> &[Paper] {
        &self.papers
    }

    pub fn ids(&self) -> Vec<PaperId> {
        self.papers.iter().map(|p| p.paper_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn title_of(&self, paper_id: &PaperId) -> Option<&str> {
        self.get(paper_id).map(|p| p.title.as_str())
    }

    /// Add papers from a backend listing that aren't registered yet.
    /// Returns how many were added.
    pub fn merge_listing(&mut self, listing: PaperListing) -> usize {
        listing
            .papers
            .into_iter()
            .map(|paper| self.push(paper))
            .filter(|added| *added)
            .count()
    }
}

/// Validates a file locally, then hands it to the backend.
///
/// Shared by reference between concurrent uploads; it holds no per-upload state.
pub struct UploadCoordinator<B: PaperBackend> {
    backend: Arc<B>,
}

impl<B: PaperBackend> UploadCoordinator<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// A file that isn't recognized as a PDF is rejected without a backend call.
    pub async fn upload(&self, file: &PdfUpload) -> Result<Paper, CoreError> {
        file.check()?;
        let paper = self.backend.upload(file).await?;
        log::info!(
            "uploaded {} as {} ({} pages)",
            file.filename,
            paper.paper_id,
            paper.num_pages
        );
        Ok(paper)
    }
}
