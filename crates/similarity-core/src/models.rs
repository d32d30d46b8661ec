//! Core data model: fragments, their identifiers, and backend strategies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a [`Fragment`], unique within the backend that produced it.
///
/// Relational rows carry integer keys, vector and keyword index entries carry
/// UUID strings. The two spaces never compare equal to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FragmentId {
    Row(i64),
    Point(String),
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentId::Row(id) => write!(f, "{}", id),
            FragmentId::Point(id) => f.write_str(id),
        }
    }
}

impl From<i64> for FragmentId {
    fn from(id: i64) -> Self {
        FragmentId::Row(id)
    }
}

impl From<&str> for FragmentId {
    fn from(id: &str) -> Self {
        FragmentId::Point(id.to_string())
    }
}

impl From<String> for FragmentId {
    fn from(id: String) -> Self {
        FragmentId::Point(id)
    }
}

/// An immutable unit of retrievable text.
///
/// `vector` is only populated for relational fragments that are scored
/// in-process; `score` is `None` for pure keyword hits merged in by the
/// term matcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub text: String,
    #[serde(skip)]
    pub vector: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Fragment {
    pub fn new(id: impl Into<FragmentId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            vector: None,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }
}

/// Which backend adapter answers a retrieval call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Remote nearest-neighbour index (Qdrant).
    Vector,
    /// Brute-force cosine ranking over a relational scope (SQLite).
    Relational,
    /// Weighted keyword + vector query (Elasticsearch).
    Hybrid,
}

impl Strategy {
    /// Parse a configured strategy name. Unknown names yield `None`, which
    /// the pipeline treats as "no backend selected".
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "vector" | "qdrant" => Some(Strategy::Vector),
            "relational" | "postgresql" | "sqlite" => Some(Strategy::Relational),
            "hybrid" | "elasticsearch" => Some(Strategy::Hybrid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Vector => "vector",
            Strategy::Relational => "relational",
            Strategy::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
