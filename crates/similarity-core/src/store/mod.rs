//! In-process implementations of the collaborator traits in
//! [`crate::backend`].
//!
//! Production backends (SQLite, Qdrant, Elasticsearch) live in the
//! application crate.

pub mod memory;
