//! # Askboard
//!
//! A course question board with semantic duplicate detection and
//! similarity search.
//!
//! Askboard stores course questions in SQLite, embeds them with a
//! configurable provider, and blends vector similarity with lexical
//! (Jaccard) overlap to rank similar questions and reject duplicates at
//! posting time. Two surfaces share one service layer: the `askb` CLI
//! and a JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌──────────┐
//! │ Embedder │──▶│ QuestionService│──▶│  SQLite   │
//! │ openai/  │   │ dedup + search │   │ rows+vecs │
//! │ hash     │   └───────┬───────┘   └──────────┘
//! └──────────┘           │
//!             ┌──────────┤
//!             ▼          ▼
//!        ┌────────┐ ┌────────┐
//!        │  CLI   │ │  HTTP  │
//!        │ (askb) │ │ (JSON) │
//!        └────────┘ └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! askb init                                        # create database
//! askb ask "How do lifetimes work?" --course cs101 --author alice
//! askb search "lifetime annotations" --course cs101
//! askb serve                                       # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`embedding`] | Embedding provider factory (openai, hash, disabled) |
//! | [`questions`] | Question lifecycle service |
//! | [`sqlite_store`] | SQLite-backed store and vector index |
//! | [`server`] | JSON HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//!
//! The ranking and duplicate-policy algorithms live in the runtime-free
//! `askboard-core` crate.

pub mod config;
pub mod db;
pub mod embedding;
pub mod migrate;
pub mod questions;
pub mod server;
pub mod sqlite_store;
