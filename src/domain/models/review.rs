use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Per-category rubric scores, each on a 0-10 scale. A score the reviewer
/// did not state is absent, never zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rigor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationReadiness {
    Ready,
    MinorRevisions,
    MajorRevisions,
    Unknown,
}

impl std::fmt::Display for PublicationReadiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PublicationReadiness::Ready => "ready",
            PublicationReadiness::MinorRevisions => "minor_revisions",
            PublicationReadiness::MajorRevisions => "major_revisions",
            PublicationReadiness::Unknown => "unknown",
        };
        return write!(f, "{label}");
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub scores: Scores,
    pub publication_readiness: PublicationReadiness,
    pub review_text: String,
    pub model: String,
}
