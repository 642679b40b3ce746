//! The fixed set of extraction kinds the backend can run against a paper.
//!
//! Each kind maps to one row of [`EXTRACTION_TYPES`]: the endpoint segment that
//! triggers it, the key its items come back under, and how the result is shown.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ApiError;

/// One analysis category applied to a paper.
///
/// Declaration order matches [`EXTRACTION_TYPES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExtractionKind {
    Contributions,
    Experiments,
    Architectures,
    Hyperparameters,
    Ablations,
    Baselines,
    Equations,
    Algorithms,
    Limitations,
    FutureWork,
    CodeResources,
    Datasets,
    LossFunctions,
    Metrics,
    Training,
    RelatedWork,
    Claims,
}

/// How a ready payload is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    ContributionGrid,
    ExperimentTable,
    Generic,
}

/// Static description of an extraction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionType {
    pub kind: ExtractionKind,
    pub id: &'static str,
    pub label: &'static str,
    /// Path segment under `/api/papers/{id}/extract/`.
    pub endpoint: &'static str,
    /// Key of the item array in the response body.
    pub response_key: &'static str,
    pub render_mode: RenderMode,
}

const fn generic(
    kind: ExtractionKind,
    id: &'static str,
    label: &'static str,
    endpoint: &'static str,
) -> ExtractionType {
    ExtractionType {
        kind,
        id,
        label,
        endpoint,
        response_key: id,
        render_mode: RenderMode::Generic,
    }
}

pub const EXTRACTION_TYPES: [ExtractionType; 17] = [
    ExtractionType {
        kind: ExtractionKind::Contributions,
        id: "contributions",
        label: "Contributions",
        endpoint: "contributions",
        response_key: "contributions",
        render_mode: RenderMode::ContributionGrid,
    },
    ExtractionType {
        kind: ExtractionKind::Experiments,
        id: "experiments",
        label: "Experiments",
        endpoint: "experiments",
        response_key: "experiments",
        render_mode: RenderMode::ExperimentTable,
    },
    // The backend route is singular, the response key plural.
    generic(ExtractionKind::Architectures, "architectures", "Architectures", "architecture"),
    generic(ExtractionKind::Hyperparameters, "hyperparameters", "Hyperparameters", "hyperparameters"),
    generic(ExtractionKind::Ablations, "ablations", "Ablations", "ablations"),
    generic(ExtractionKind::Baselines, "baselines", "Baselines", "baselines"),
    generic(ExtractionKind::Equations, "equations", "Equations", "equations"),
    generic(ExtractionKind::Algorithms, "algorithms", "Algorithms", "algorithms"),
    generic(ExtractionKind::Limitations, "limitations", "Limitations", "limitations"),
    generic(ExtractionKind::FutureWork, "future_work", "Future Work", "future_work"),
    generic(ExtractionKind::CodeResources, "code_resources", "Code/Resources", "code_resources"),
    generic(ExtractionKind::Datasets, "datasets", "Datasets", "datasets"),
    generic(ExtractionKind::LossFunctions, "loss_functions", "Loss Functions", "loss_functions"),
    generic(ExtractionKind::Metrics, "metrics", "Metrics", "metrics"),
    generic(ExtractionKind::Training, "training", "Training", "training"),
    generic(ExtractionKind::RelatedWork, "related_work", "Related Work", "related_work"),
    generic(ExtractionKind::Claims, "claims", "Claims", "claims"),
];

impl ExtractionKind {
    pub const ALL: [ExtractionKind; 17] = [
        Self::Contributions,
        Self::Experiments,
        Self::Architectures,
        Self::Hyperparameters,
        Self::Ablations,
        Self::Baselines,
        Self::Equations,
        Self::Algorithms,
        Self::Limitations,
        Self::FutureWork,
        Self::CodeResources,
        Self::Datasets,
        Self::LossFunctions,
        Self::Metrics,
        Self::Training,
        Self::RelatedWork,
        Self::Claims,
    ];

    pub fn descriptor(self) -> &'static ExtractionType {
        &EXTRACTION_TYPES[self as usize]
    }

    pub fn id(self) -> &'static str {
        self.descriptor().id
    }

    pub fn label(self) -> &'static str {
        self.descriptor().label
    }

    pub fn render_mode(self) -> RenderMode {
        self.descriptor().render_mode
    }

    pub fn from_id(id: &str) -> Option<Self> {
        EXTRACTION_TYPES
            .iter()
            .find(|t| t.id == id || t.endpoint == id)
            .map(|t| t.kind)
    }
}

impl fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ExtractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(&s.trim().to_ascii_lowercase().replace('-', "_"))
            .ok_or_else(|| format!("unknown extraction type: {s}"))
    }
}

/// Items returned by one extraction call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionPayload {
    pub items: Vec<Value>,
    /// Whether the backend served a stored result instead of running the extractor.
    pub cached: bool,
}

impl ExtractionPayload {
    /// Pull the item array for `kind` out of a response body.
    ///
    /// A missing item key yields an empty payload; a non-array value is rejected.
    pub fn from_response(kind: ExtractionKind, body: &Value) -> Result<Self, ApiError> {
        let Some(object) = body.as_object() else {
            return Err(ApiError::Decode(format!(
                "{} response is not a JSON object",
                kind.id()
            )));
        };
        let items = match object.get(kind.descriptor().response_key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                return Err(ApiError::Decode(format!(
                    "`{}` is not an array",
                    kind.descriptor().response_key
                )));
            }
        };
        let cached = object
            .get("cached")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Self { items, cached })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items decoded as contributions; entries that don't fit are skipped.
    pub fn contributions(&self) -> Vec<Contribution> {
        decode_items(&self.items)
    }

    pub fn experiments(&self) -> Vec<Experiment> {
        decode_items(&self.items)
    }
}

fn decode_items<T: for<'de> Deserialize<'de>>(items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contribution {
    pub contribution_type: String,
    pub specific_innovation: String,
    pub problem_addressed: String,
    pub evidence_location: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub description: String,
    pub task: String,
    pub datasets: Vec<Value>,
    pub baselines: Vec<Value>,
    pub proposed_methods: Vec<Value>,
    pub evaluation_metrics: Vec<Value>,
    pub results: Vec<Value>,
    pub hyperparameters: serde_json::Map<String, Value>,
    pub evidence_location: String,
    pub notes: String,
}

impl Experiment {
    /// Dataset names, whether the backend sent strings or `{name: ..}` objects.
    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets
            .iter()
            .map(|d| match d {
                Value::String(s) => s.clone(),
                other => other
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
            })
            .collect()
    }
}
