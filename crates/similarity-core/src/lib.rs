//! # Similarity Core
//!
//! Runtime-agnostic logic for similarity: the fragment model, the cosine
//! scorer, the ranker, the backend search adapters, result merging, and
//! the word-budgeted prompt assembler.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Backends are reached only through the collaborator traits in
//! [`backend`]; the application crate supplies SQLite, Qdrant,
//! Elasticsearch, and OpenAI implementations.

pub mod backend;
pub mod error;
pub mod merge;
pub mod models;
pub mod prompt;
pub mod rank;
pub mod search;
pub mod similarity;
pub mod store;

pub use error::{Error, Result};
pub use models::{Fragment, FragmentId, Strategy};
