//! Storage abstraction for Askboard.
//!
//! The [`QuestionStore`] trait defines every storage operation the
//! duplicate-detection pipeline and the lifecycle service need, enabling
//! pluggable backends (SQLite, in-memory). Implementations must be
//! `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::QaError;
use crate::models::{Answer, Question, QuestionStatus};

/// A candidate returned from vector similarity search, before lexical
/// enrichment.
///
/// `score` is normalized by the store boundary to `[0.0, 1.0]`, higher =
/// more similar. Backends whose native measure is a distance or an
/// unbounded magnitude must convert before returning — the pipeline
/// treats the value as an opaque similarity and never re-normalizes.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub question_id: String,
    pub text: String,
    pub course_id: String,
    pub score: f64,
}

/// Partial update applied to a question.
///
/// When `text` is set, the store recomputes `canonical_key` from it, so
/// the `canonical_key == normalize(text)` invariant holds at the storage
/// seam rather than by caller discipline. The caller supplies the fresh
/// embedding alongside via [`QuestionStore::update_question`].
#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
    pub text: Option<String>,
    pub labels: Option<Vec<String>>,
    pub status: Option<QuestionStatus>,
    /// `Some(None)` clears the accepted answer.
    pub accepted_answer_id: Option<Option<String>>,
}

impl QuestionPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.labels.is_none()
            && self.status.is_none()
            && self.accepted_answer_id.is_none()
    }
}

/// Abstract storage backend for questions, answers, and vectors.
///
/// Vote and bookmark operations are idempotent set toggles: adding an
/// already-present member or removing an absent one succeeds without
/// changing anything.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Insert a new question together with its embedding vector.
    async fn insert_question(&self, question: &Question, vector: &[f32]) -> Result<(), QaError>;

    /// Fetch a question by id, including vote and bookmark sets.
    async fn get_question(&self, id: &str) -> Result<Option<Question>, QaError>;

    /// Exact-duplicate lookup: find a question in `course_id` whose
    /// canonical key equals `key`, skipping `exclude` (the question being
    /// updated, if any).
    async fn find_by_canonical_key(
        &self,
        course_id: &str,
        key: &str,
        exclude: Option<&str>,
    ) -> Result<Option<Question>, QaError>;

    /// Apply a partial update. `vector` must be `Some` exactly when
    /// `patch.text` is set. Returns [`QaError::NotFound`] when no
    /// question matches.
    async fn update_question(
        &self,
        id: &str,
        patch: &QuestionPatch,
        vector: Option<&[f32]>,
    ) -> Result<(), QaError>;

    /// Delete a question, its vector, and its membership sets.
    async fn delete_question(&self, id: &str) -> Result<(), QaError>;

    /// Approximate nearest-neighbor search.
    ///
    /// `num_candidates` bounds how many neighbors an ANN backend examines
    /// internally; brute-force backends scan everything and treat it as
    /// advisory. Returns at most `limit` hits ordered by descending
    /// vector score, optionally restricted to one course.
    async fn vector_search(
        &self,
        query_vec: &[f32],
        num_candidates: usize,
        limit: usize,
        course_id: Option<&str>,
    ) -> Result<Vec<VectorHit>, QaError>;

    /// Whether the vector index currently serves this question id. Used
    /// by the post-write visibility poll.
    async fn vector_indexed(&self, id: &str) -> Result<bool, QaError>;

    /// Idempotent set toggles for votes and bookmarks.
    async fn set_vote(&self, question_id: &str, user_id: &str, on: bool) -> Result<(), QaError>;
    async fn set_bookmark(&self, question_id: &str, user_id: &str, on: bool)
        -> Result<(), QaError>;

    /// Insert an answer and increment the parent's `answer_count`.
    async fn insert_answer(&self, answer: &Answer) -> Result<(), QaError>;

    /// Fetch an answer by id.
    async fn get_answer(&self, id: &str) -> Result<Option<Answer>, QaError>;

    /// Bump the view counter for a question.
    async fn increment_views(&self, question_id: &str) -> Result<(), QaError>;
}
