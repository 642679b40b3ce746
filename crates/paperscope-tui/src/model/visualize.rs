use std::path::PathBuf;
use std::sync::Arc;

use paperscope_core::{FrameSize, VerificationSample, VisualizationResult};

/// Starter queries cycled with `n` on the visualize screen.
pub const EXAMPLE_QUERIES: &[&str] = &[
    "Build a taxonomy of the methods proposed across these papers",
    "Matrix of experiments: which datasets each paper evaluates on",
    "Compare the baselines each paper beats and by how much",
    "Diagram the model architecture of each paper side by side",
    "Contrast the core contributions of the selected papers",
    "Timeline of the ideas these papers build on",
    "Table of reported hyperparameters and training budgets",
    "Map each headline claim to the evidence that supports it",
    "Roadmap from stated limitations to proposed future work",
    "Reproducibility checklist: code, data and compute per paper",
];

/// Everything the visualize screen shows.
#[derive(Debug, Default)]
pub struct VisualizeState {
    pub query: String,
    /// Index into [`EXAMPLE_QUERIES`] of the next example to offer.
    pub example: usize,
    pub pending: bool,
    pub error: Option<String>,
    pub result: Option<Arc<VisualizationResult>>,
    pub frame: Option<FrameSize>,
    /// Readable text of the current markup, one block per line.
    pub preview: Vec<String>,
    pub verification: Option<Arc<VerificationSample>>,
    pub show_verification: bool,
    pub fullscreen: bool,
    pub scroll: usize,
    pub saved: Option<PathBuf>,
}

impl VisualizeState {
    /// Put the next example in the query box.
    pub fn next_example(&mut self) {
        self.query = EXAMPLE_QUERIES[self.example % EXAMPLE_QUERIES.len()].to_string();
        self.example = (self.example + 1) % EXAMPLE_QUERIES.len();
    }

    /// Mark a request as sent. The previous result stays on screen.
    pub fn begin(&mut self) {
        self.pending = true;
        self.error = None;
        self.saved = None;
    }

    pub fn finish(
        &mut self,
        result: Arc<VisualizationResult>,
        frame: Option<FrameSize>,
        preview: Vec<String>,
    ) {
        self.pending = false;
        self.error = None;
        self.result = Some(result);
        self.frame = frame;
        self.preview = preview;
        self.verification = None;
        self.scroll = 0;
    }

    pub fn fail(&mut self, error: String) {
        self.pending = false;
        self.error = Some(error);
    }

    /// Accept a verification sample only if it belongs to the shown result.
    pub fn accept_verification(&mut self, sample: Arc<VerificationSample>) -> bool {
        let Some(result) = &self.result else {
            return false;
        };
        let belongs = sample
            .entries
            .iter()
            .all(|e| result.paper_ids.contains(&e.paper_id));
        if belongs {
            self.verification = Some(sample);
        }
        belongs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use paperscope_core::{PaperId, VerificationEntry};

    fn result(ids: &[&str]) -> Arc<VisualizationResult> {
        Arc::new(VisualizationResult {
            query: "q".into(),
            paper_ids: ids.iter().map(|id| PaperId::from(*id)).collect(),
            markup: "<html><body>hi</body></html>".into(),
            generated_at: Utc::now(),
        })
    }

    fn sample(ids: &[&str]) -> Arc<VerificationSample> {
        Arc::new(VerificationSample {
            entries: ids
                .iter()
                .map(|id| VerificationEntry {
                    paper_id: PaperId::from(*id),
                    title: id.to_string(),
                    contributions: vec![],
                    from_cache: false,
                })
                .collect(),
            generated_at: Utc::now(),
        })
    }

    #[test]
    fn examples_cycle() {
        let mut state = VisualizeState::default();
        state.next_example();
        assert_eq!(state.query, EXAMPLE_QUERIES[0]);
        for _ in 1..EXAMPLE_QUERIES.len() {
            state.next_example();
        }
        state.next_example();
        assert_eq!(state.query, EXAMPLE_QUERIES[0]);
    }

    #[test]
    fn failure_keeps_previous_result() {
        let mut state = VisualizeState::default();
        state.begin();
        state.finish(result(&["a"]), None, vec!["hi".into()]);
        state.begin();
        state.fail("boom".into());
        assert!(!state.pending);
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert!(state.result.is_some());
        assert_eq!(state.preview, vec!["hi".to_string()]);
    }

    #[test]
    fn verification_for_other_result_is_ignored() {
        let mut state = VisualizeState::default();
        assert!(!state.accept_verification(sample(&["a"])));
        state.finish(result(&["a", "b"]), None, vec![]);
        assert!(!state.accept_verification(sample(&["c"])));
        assert!(state.verification.is_none());
        assert!(state.accept_verification(sample(&["b"])));
        assert!(state.verification.is_some());
    }
}
