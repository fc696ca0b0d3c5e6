//! Duplicate detection for question creation and update.
//!
//! Two-stage policy:
//!
//! 1. **Exact**: canonical-key lookup scoped to the course. A hit rejects
//!    with [`QaError::DuplicateExact`].
//! 2. **Near**: run the similarity pipeline and inspect the top candidate
//!    by combined score. Rejection requires the vector score AND the
//!    lexical score to clear their thresholds — high vector similarity
//!    alone (a paraphrase) or high lexical overlap alone (short,
//!    templated text) must not reject.
//!
//! Thresholds arrive via [`DedupConfig`] so they stay tunable per
//! deployment and per test scenario.

use crate::embedding::Embedder;
use crate::error::QaError;
use crate::normalize::normalize;
use crate::search::{search_similar, SearchParams};
use crate::store::QuestionStore;

/// Duplicate-rejection thresholds.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Minimum vector score for a near-duplicate rejection.
    pub exact_threshold: f64,
    /// Minimum lexical (Jaccard) score for a near-duplicate rejection.
    pub jaccard_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        DedupConfig {
            exact_threshold: 0.9,
            jaccard_threshold: 0.65,
        }
    }
}

/// Run both duplicate checks for `text` within `course_id`.
///
/// `exclude` names the question being updated so it never conflicts with
/// itself. Returns `Ok(())` when the text is acceptable; otherwise the
/// duplicate error names the conflicting question (and, for near
/// duplicates, both scores) so the caller can surface a judgeable
/// rejection.
///
/// Upstream failures propagate: a broken embedding provider or vector
/// index aborts the attempt instead of letting an unchecked question
/// through.
pub async fn check_duplicate<S, E>(
    store: &S,
    embedder: &E,
    params: &SearchParams,
    config: &DedupConfig,
    course_id: &str,
    text: &str,
    exclude: Option<&str>,
) -> Result<(), QaError>
where
    S: QuestionStore + ?Sized,
    E: Embedder + ?Sized,
{
    let key = normalize(text);
    if key.is_empty() {
        return Err(QaError::Validation(
            "question text has no searchable content".to_string(),
        ));
    }

    if let Some(existing) = store.find_by_canonical_key(course_id, &key, exclude).await? {
        return Err(QaError::DuplicateExact {
            question_id: existing.id,
            text: existing.text,
        });
    }

    let mut candidates = search_similar(store, embedder, text, Some(course_id), params).await?;
    if let Some(id) = exclude {
        candidates.retain(|c| c.question_id != id);
    }

    if let Some(top) = candidates.first() {
        if top.vector_score >= config.exact_threshold
            && top.lexical_score >= config.jaccard_threshold
        {
            return Err(QaError::DuplicateNear {
                question_id: top.question_id.clone(),
                text: top.text.clone(),
                vector_score: top.vector_score,
                lexical_score: top.lexical_score,
            });
        }
    }

    Ok(())
}
