use paperscope_core::{AnalysisKind, AnalysisReport, PaperId};

/// The analysis screen: one aggregate report over the marked papers.
#[derive(Debug)]
pub struct AnalysisState {
    pub kind: AnalysisKind,
    pub paper_ids: Vec<PaperId>,
    pub pending: bool,
    pub report: Option<AnalysisReport>,
    pub error: Option<String>,
    pub scroll: usize,
    /// Sequence of the newest request; replies to older ones are dropped.
    seq: u64,
}

impl Default for AnalysisState {
    fn default() -> Self {
        Self {
            kind: AnalysisKind::Contributions,
            paper_ids: Vec::new(),
            pending: false,
            report: None,
            error: None,
            scroll: 0,
            seq: 0,
        }
    }
}

impl AnalysisState {
    /// Start a request for `kind` over `paper_ids` and return its sequence.
    pub fn begin(&mut self, kind: AnalysisKind, paper_ids: Vec<PaperId>) -> u64 {
        self.seq += 1;
        self.kind = kind;
        self.paper_ids = paper_ids;
        self.pending = true;
        self.report = None;
        self.error = None;
        self.scroll = 0;
        self.seq
    }

    /// Apply a reply. Returns false when it answers a superseded request.
    pub fn settle(&mut self, seq: u64, outcome: Result<AnalysisReport, String>) -> bool {
        if seq != self.seq {
            return false;
        }
        self.pending = false;
        match outcome {
            Ok(report) => self.report = Some(report),
            Err(error) => self.error = Some(error),
        }
        true
    }

    /// A request rejected before it was sent.
    pub fn reject(&mut self, kind: AnalysisKind, error: String) {
        self.seq += 1;
        self.kind = kind;
        self.paper_ids.clear();
        self.pending = false;
        self.report = None;
        self.error = Some(error);
    }

    pub fn row_count(&self) -> usize {
        self.report.as_ref().map(|r| r.rows().len()).unwrap_or(0)
    }
}
