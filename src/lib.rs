//! # similarity
//!
//! Question answering over a private corpus. A query is embedded, the
//! most related fragments are fetched from one configured backend
//! (Qdrant, SQLite, or Elasticsearch), optionally augmented with exact-term
//! hits, packed into a word-budgeted prompt, and sent to a chat model.
//!
//! The retrieval algorithms live in [`similarity_core`]; this crate adds
//! the concrete clients, persistence, ingestion commands, and the CLI and
//! HTTP surfaces.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] / [`migrate`] | SQLite pool and schema |
//! | [`sqlite_store`] | relational fragment store |
//! | [`qdrant`] | vector index client |
//! | [`elastic`] | hybrid keyword + vector client |
//! | [`embedding`] / [`generation`] | OpenAI embeddings and chat |
//! | [`term_match`] | concurrent exact-term lookups |
//! | [`pipeline`] | retrieval orchestration |
//! | [`load`] | JSON ingestion and index sync |
//! | [`server`] | HTTP API |

pub mod config;
pub mod db;
pub mod elastic;
pub mod embedding;
pub mod generation;
pub mod load;
pub mod logging;
pub mod migrate;
pub mod pipeline;
pub mod qdrant;
pub mod server;
pub mod sqlite_store;
pub mod term_match;
