//! Free-form questions about one paper and aggregate analyses over several.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::paper::PaperId;
use crate::{ApiError, ValidationError};

/// A question about a single paper, with a non-empty trimmed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperQuestion {
    pub paper_id: PaperId,
    pub query: String,
}

impl PaperQuestion {
    pub fn new(paper_id: PaperId, query: &str) -> Result<Self, ValidationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        Ok(Self {
            paper_id,
            query: query.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperAnswer {
    pub paper_id: PaperId,
    pub query: String,
    pub result: String,
}

/// Cross-paper aggregations offered by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Contributions,
    Experiments,
    Patterns,
    Gaps,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        Self::Contributions,
        Self::Experiments,
        Self::Patterns,
        Self::Gaps,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contributions => "contributions",
            Self::Experiments => "experiments",
            Self::Patterns => "patterns",
            Self::Gaps => "gaps",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Contributions => "Contributions",
            Self::Experiments => "Experiments",
            Self::Patterns => "Patterns",
            Self::Gaps => "Research gaps",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contributions" => Ok(Self::Contributions),
            "experiments" => Ok(Self::Experiments),
            "patterns" => Ok(Self::Patterns),
            "gaps" => Ok(Self::Gaps),
            other => Err(format!("unknown analysis: {other}")),
        }
    }
}

/// A validated analysis over at least one paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub kind: AnalysisKind,
    pub paper_ids: Vec<PaperId>,
}

impl AnalysisRequest {
    pub fn new(kind: AnalysisKind, paper_ids: &[PaperId]) -> Result<Self, ValidationError> {
        if paper_ids.is_empty() {
            return Err(ValidationError::NoPapers);
        }
        Ok(Self {
            kind,
            paper_ids: paper_ids.to_vec(),
        })
    }

    /// The `paper_ids` query parameter: ids joined by commas.
    pub fn joined_ids(&self) -> String {
        self.paper_ids
            .iter()
            .map(PaperId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A name (contribution type, dataset, task) and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tally {
    #[serde(alias = "type")]
    pub name: String,
    #[serde(default)]
    pub count: usize,
}

/// A pattern or gap the backend noticed across the papers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Insight {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `confidence` for patterns, `opportunity` for gaps.
    #[serde(default, alias = "confidence", alias = "opportunity")]
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContributionSummary {
    #[serde(default)]
    pub total_papers: usize,
    #[serde(default)]
    pub total_contributions: usize,
    #[serde(default)]
    pub most_common: Vec<Tally>,
    #[serde(default)]
    pub contributions: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExperimentSummary {
    #[serde(default)]
    pub total_papers: usize,
    #[serde(default)]
    pub total_experiments: usize,
    #[serde(default)]
    pub common_datasets: Vec<Tally>,
    #[serde(default)]
    pub common_tasks: Vec<Tally>,
    #[serde(default)]
    pub experiments: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct InsightList {
    #[serde(default)]
    patterns: Vec<Insight>,
    #[serde(default)]
    gaps: Vec<Insight>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisReport {
    Contributions(ContributionSummary),
    Experiments(ExperimentSummary),
    Patterns(Vec<Insight>),
    Gaps(Vec<Insight>),
}

fn decode<T: DeserializeOwned>(kind: AnalysisKind, body: Value) -> Result<T, ApiError> {
    if !body.is_object() {
        return Err(ApiError::Decode(format!("{kind} analysis is not a JSON object")));
    }
    serde_json::from_value(body).map_err(|e| ApiError::Decode(format!("{kind} analysis: {e}")))
}

impl AnalysisReport {
    pub fn from_response(kind: AnalysisKind, body: Value) -> Result<Self, ApiError> {
        Ok(match kind {
            AnalysisKind::Contributions => Self::Contributions(decode(kind, body)?),
            AnalysisKind::Experiments => Self::Experiments(decode(kind, body)?),
            AnalysisKind::Patterns => Self::Patterns(decode::<InsightList>(kind, body)?.patterns),
            AnalysisKind::Gaps => Self::Gaps(decode::<InsightList>(kind, body)?.gaps),
        })
    }

    pub fn kind(&self) -> AnalysisKind {
        match self {
            Self::Contributions(_) => AnalysisKind::Contributions,
            Self::Experiments(_) => AnalysisKind::Experiments,
            Self::Patterns(_) => AnalysisKind::Patterns,
            Self::Gaps(_) => AnalysisKind::Gaps,
        }
    }

    pub fn headline(&self) -> String {
        match self {
            Self::Contributions(s) => format!(
                "{} contributions across {} papers",
                s.total_contributions, s.total_papers
            ),
            Self::Experiments(s) => format!(
                "{} experiments across {} papers",
                s.total_experiments, s.total_papers
            ),
            Self::Patterns(p) => format!("{} patterns found", p.len()),
            Self::Gaps(g) => format!("{} research gaps found", g.len()),
        }
    }

    /// Label and detail pairs for display.
    pub fn rows(&self) -> Vec<(String, String)> {
        match self {
            Self::Contributions(s) => s
                .most_common
                .iter()
                .map(|t| (t.name.clone(), t.count.to_string()))
                .collect(),
            Self::Experiments(s) => s
                .common_datasets
                .iter()
                .map(|t| (format!("dataset {}", t.name), t.count.to_string()))
                .chain(
                    s.common_tasks
                        .iter()
                        .map(|t| (format!("task {}", t.name), t.count.to_string())),
                )
                .collect(),
            Self::Patterns(list) | Self::Gaps(list) => list
                .iter()
                .map(|i| {
                    let detail = match &i.level {
                        Some(level) => format!("{} ({level})", i.description),
                        None => i.description.clone(),
                    };
                    (i.title.clone(), detail)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_question_is_rejected() {
        assert_eq!(
            PaperQuestion::new("p1".into(), "  \n"),
            Err(ValidationError::EmptyQuery)
        );
        let q = PaperQuestion::new("p1".into(), " What dataset? ").unwrap();
        assert_eq!(q.query, "What dataset?");
    }

    #[test]
    fn analysis_needs_papers() {
        assert_eq!(
            AnalysisRequest::new(AnalysisKind::Gaps, &[]),
            Err(ValidationError::NoPapers)
        );
        let req = AnalysisRequest::new(AnalysisKind::Patterns, &["a".into(), "b".into()]).unwrap();
        assert_eq!(req.joined_ids(), "a,b");
    }

    #[test]
    fn kind_parses_and_cycles() {
        assert_eq!("Gaps".parse::<AnalysisKind>(), Ok(AnalysisKind::Gaps));
        assert!("trends".parse::<AnalysisKind>().is_err());
        assert_eq!(AnalysisKind::Gaps.next(), AnalysisKind::Contributions);
        assert_eq!(AnalysisKind::Contributions.prev(), AnalysisKind::Gaps);
    }

    #[test]
    fn contribution_summary_rows() {
        let body = json!({
            "total_papers": 2,
            "total_contributions": 5,
            "by_type": {"Novel Architecture": 3, "Training Procedure": 2},
            "most_common": [
                {"type": "Novel Architecture", "count": 3},
                {"type": "Training Procedure", "count": 2}
            ],
            "contributions": []
        });
        let report = AnalysisReport::from_response(AnalysisKind::Contributions, body).unwrap();
        assert_eq!(report.headline(), "5 contributions across 2 papers");
        assert_eq!(report.rows()[0], ("Novel Architecture".to_string(), "3".to_string()));
    }

    #[test]
    fn experiment_rows_list_datasets_then_tasks() {
        let body = json!({
            "total_papers": 1,
            "total_experiments": 2,
            "common_datasets": [{"name": "ImageNet", "count": 2}],
            "common_tasks": [{"name": "classification", "count": 2}]
        });
        let report = AnalysisReport::from_response(AnalysisKind::Experiments, body).unwrap();
        let labels: Vec<_> = report.rows().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, ["dataset ImageNet", "task classification"]);
    }

    #[test]
    fn gaps_carry_opportunity() {
        let body = json!({
            "total_gaps": 1,
            "gaps": [{
                "type": "dataset_combination",
                "title": "Cross-Dataset Evaluation",
                "description": "Try combining A with B",
                "opportunity": "medium"
            }]
        });
        let report = AnalysisReport::from_response(AnalysisKind::Gaps, body).unwrap();
        assert_eq!(report.kind(), AnalysisKind::Gaps);
        assert_eq!(
            report.rows(),
            vec![(
                "Cross-Dataset Evaluation".to_string(),
                "Try combining A with B (medium)".to_string()
            )]
        );
    }

    #[test]
    fn non_object_body_is_a_decode_error() {
        let err = AnalysisReport::from_response(AnalysisKind::Patterns, json!([1, 2])).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
