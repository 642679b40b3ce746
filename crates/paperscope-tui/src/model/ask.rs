use std::collections::{HashMap, HashSet};

use paperscope_core::{PaperAnswer, PaperId};

/// Latest question outcome per paper.
#[derive(Debug, Default)]
pub struct AskState {
    pending: HashSet<PaperId>,
    outcomes: HashMap<PaperId, Result<PaperAnswer, String>>,
}

impl AskState {
    /// Returns false when a question about `paper_id` is already in flight.
    pub fn begin(&mut self, paper_id: &PaperId) -> bool {
        self.pending.insert(paper_id.clone())
    }

    pub fn finish(&mut self, paper_id: PaperId, outcome: Result<PaperAnswer, String>) {
        self.pending.remove(&paper_id);
        self.outcomes.insert(paper_id, outcome);
    }

    pub fn is_pending(&self, paper_id: &PaperId) -> bool {
        self.pending.contains(paper_id)
    }

    pub fn outcome(&self, paper_id: &PaperId) -> Option<&Result<PaperAnswer, String>> {
        self.outcomes.get(paper_id)
    }

    pub fn forget(&mut self, paper_id: &PaperId) {
        self.pending.remove(paper_id);
        self.outcomes.remove(paper_id);
    }
}
