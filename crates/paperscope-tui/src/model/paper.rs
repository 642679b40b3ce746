use serde_json::Value;

use paperscope_core::{ExtractionKind, View};

/// Tabs on the paper screen: metadata first, then one per extraction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperTab {
    Info,
    Extraction(ExtractionKind),
}

impl PaperTab {
    pub const COUNT: usize = 1 + ExtractionKind::ALL.len();

    pub fn index(self) -> usize {
        match self {
            Self::Info => 0,
            Self::Extraction(kind) => 1 + kind as usize,
        }
    }

    pub fn from_index(index: usize) -> Self {
        match index % Self::COUNT {
            0 => Self::Info,
            i => Self::Extraction(ExtractionKind::ALL[i - 1]),
        }
    }

    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(self) -> Self {
        Self::from_index(self.index() + Self::COUNT - 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Extraction(kind) => kind.label(),
        }
    }

    /// The view this tab activates.
    pub fn view(self) -> View {
        match self {
            Self::Info => View::PaperInfo,
            Self::Extraction(kind) => View::Extraction(kind),
        }
    }

    pub fn kind(self) -> Option<ExtractionKind> {
        match self {
            Self::Info => None,
            Self::Extraction(kind) => Some(kind),
        }
    }
}

/// Keys tried, in order, to find a one-line label for a generic item.
const SUMMARY_KEYS: &[&str] = &[
    "name",
    "title",
    "claim",
    "statement",
    "description",
    "limitation",
    "direction",
    "metric",
    "dataset",
    "equation",
    "text",
];

/// One-line label for an item of a kind without a dedicated viewer.
pub fn item_summary(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Object(map) => SUMMARY_KEYS
            .iter()
            .filter_map(|k| map.get(*k).and_then(Value::as_str))
            .find(|s| !s.trim().is_empty())
            .or_else(|| map.values().filter_map(Value::as_str).next())
            .map(str::to_string)
            .unwrap_or_else(|| item.to_string()),
        other => other.to_string(),
    }
}

/// Field name and rendered value pairs for the detail screen.
pub fn item_fields(item: &Value) -> Vec<(String, String)> {
    match item {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (humanize(k), render_value(v)))
            .collect(),
        other => vec![("Value".to_string(), render_value(other))],
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "—".to_string(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join("; "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
        other => other.to_string(),
    }
}

/// `specific_innovation` → `Specific innovation`.
pub fn humanize(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
