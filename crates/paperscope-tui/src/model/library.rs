use paperscope_core::Paper;

/// Progress of a file the user asked to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    Uploading,
    Failed(String),
}

impl UploadPhase {
    pub fn label(&self) -> &str {
        match self {
            Self::Uploading => "Uploading...",
            Self::Failed(_) => "Failed",
        }
    }
}

/// An upload that has not (yet) produced a registered paper.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub filename: String,
    pub phase: UploadPhase,
}

impl PendingUpload {
    pub fn new(filename: String) -> Self {
        Self {
            filename,
            phase: UploadPhase::Uploading,
        }
    }
}

/// Sort order for the library table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Added,
    Title,
    Pages,
}

impl SortOrder {
    pub fn next(self) -> Self {
        match self {
            Self::Added => Self::Title,
            Self::Title => Self::Pages,
            Self::Pages => Self::Added,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Title => "title",
            Self::Pages => "pages",
        }
    }
}

/// Row order of `papers` under `order`, as indices into `papers`.
pub fn sorted_indices(papers: &[Paper], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..papers.len()).collect();
    match order {
        SortOrder::Added => {}
        SortOrder::Title => {
            indices.sort_by(|&a, &b| {
                papers[a]
                    .title
                    .to_lowercase()
                    .cmp(&papers[b].title.to_lowercase())
                    .then_with(|| a.cmp(&b))
            });
        }
        SortOrder::Pages => {
            indices.sort_by(|&a, &b| {
                papers[b]
                    .num_pages
                    .cmp(&papers[a].num_pages)
                    .then_with(|| a.cmp(&b))
            });
        }
    }
    indices
}
