//! Error taxonomy shared by the core pipeline and the application crate.
//!
//! Every fallible core operation returns [`QaError`]. Nothing is retried
//! or swallowed here: a failed embedding or vector search surfaces to the
//! caller unchanged, because silently proceeding would defeat duplicate
//! protection.

use thiserror::Error;

/// Errors produced by the question pipeline.
///
/// The HTTP layer maps these onto status classes: validation and
/// duplicate rejections are client errors (400), missing references are
/// 404, upstream failures are 502, and persistence failures are 500.
#[derive(Debug, Error)]
pub enum QaError {
    /// Malformed or missing input. Recoverable by the caller correcting
    /// the request; never retried automatically.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Canonical-key collision: another question in the same course has
    /// identical normalized text.
    #[error("duplicate of question {question_id}: \"{text}\"")]
    DuplicateExact { question_id: String, text: String },

    /// Combined-threshold collision: the best candidate cleared both the
    /// vector and the lexical threshold.
    #[error(
        "near-duplicate of question {question_id} (vector {vector_score:.3}, lexical {lexical_score:.3}): \"{text}\""
    )]
    DuplicateNear {
        question_id: String,
        text: String,
        vector_score: f64,
        lexical_score: f64,
    },

    /// Referenced question, answer, or label does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Embedding provider or vector search failed or timed out.
    #[error("upstream service failed: {0}")]
    Upstream(#[source] anyhow::Error),

    /// Underlying store read/write failed, including zero rows modified
    /// where one was expected.
    #[error("persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl QaError {
    pub fn upstream(err: impl Into<anyhow::Error>) -> Self {
        QaError::Upstream(err.into())
    }

    pub fn persistence(err: impl Into<anyhow::Error>) -> Self {
        QaError::Persistence(err.into())
    }

    /// True for both duplicate variants.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            QaError::DuplicateExact { .. } | QaError::DuplicateNear { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_duplicate_message_carries_scores() {
        let err = QaError::DuplicateNear {
            question_id: "q1".to_string(),
            text: "what is a closure".to_string(),
            vector_score: 0.912,
            lexical_score: 0.75,
        };
        let msg = err.to_string();
        assert!(msg.contains("q1"));
        assert!(msg.contains("0.912"));
        assert!(msg.contains("0.750"));
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_validation_is_not_duplicate() {
        assert!(!QaError::Validation("empty".into()).is_duplicate());
    }
}
