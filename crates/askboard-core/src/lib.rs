//! # Askboard Core
//!
//! Shared, runtime-free logic for Askboard: question models, text
//! normalization, lexical scoring, the similarity-search pipeline,
//! duplicate detection, and the store/embedder traits.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Async seams use `async-trait` so the
//! application crate can plug in SQLite and HTTP-backed implementations
//! while tests run against the in-memory store.

pub mod dedup;
pub mod embedding;
pub mod error;
pub mod models;
pub mod normalize;
pub mod search;
pub mod store;
