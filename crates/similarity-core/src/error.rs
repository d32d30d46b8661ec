//! Error taxonomy for the retrieval pipeline.
//!
//! Every variant names the pipeline stage that produced it, so a caller
//! printing only the top-level message still knows where a call failed.
//! Collaborator failures are kept as boxed sources and remain reachable
//! through [`std::error::Error::source`].

use thiserror::Error;

/// Boxed collaborator failure carried inside [`Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The two vectors handed to the scorer have different lengths.
    #[error("scorer: vector dimensions differ ({left} vs {right})")]
    DimensionMismatch { left: usize, right: usize },

    /// One of the vectors handed to the scorer has zero magnitude.
    #[error("scorer: vector has zero magnitude")]
    ZeroMagnitude,

    /// The embedding provider failed to embed the query.
    #[error("embedding: {source}")]
    Embedding {
        #[source]
        source: BoxError,
    },

    /// A backend adapter failed (including a failed provisioning retry).
    #[error("retrieval ({backend}): {source}")]
    Retrieval {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    /// One of the concurrent exact-term lookups failed.
    #[error("term match ({term}): {source}")]
    TermMatch {
        term: String,
        #[source]
        source: BoxError,
    },

    /// The answer generator failed.
    #[error("generation: {source}")]
    Generation {
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub fn embedding(err: impl Into<BoxError>) -> Self {
        Error::Embedding { source: err.into() }
    }

    pub fn retrieval(backend: &'static str, err: impl Into<BoxError>) -> Self {
        Error::Retrieval {
            backend,
            source: err.into(),
        }
    }

    pub fn term_match(term: impl Into<String>, err: impl Into<BoxError>) -> Self {
        Error::TermMatch {
            term: term.into(),
            source: err.into(),
        }
    }

    pub fn generation(err: impl Into<BoxError>) -> Self {
        Error::Generation { source: err.into() }
    }

    /// Pipeline stage the error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::DimensionMismatch { .. } | Error::ZeroMagnitude => "scorer",
            Error::Embedding { .. } => "embedding",
            Error::Retrieval { .. } => "retrieval",
            Error::TermMatch { .. } => "term_match",
            Error::Generation { .. } => "generation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_message_names_stage() {
        let err = Error::retrieval("qdrant", anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "retrieval (qdrant): connection refused");
        assert_eq!(err.stage(), "retrieval");
    }

    #[test]
    fn test_source_is_preserved() {
        let err = Error::generation(anyhow::anyhow!("rate limited"));
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "rate limited");
    }

    #[test]
    fn test_term_match_carries_term() {
        let err = Error::term_match("B1207KDZ", anyhow::anyhow!("boom"));
        assert!(err.to_string().contains("B1207KDZ"));
        assert_eq!(err.stage(), "term_match");
    }
}
