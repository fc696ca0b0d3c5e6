//! Core data models for questions and answers.
//!
//! These types flow through the duplicate-detection pipeline and the
//! lifecycle service. Transient search candidates live in
//! [`crate::search`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::normalize;

/// Lifecycle status of a question. Questions cycle between the two
/// states indefinitely; deletion is a separate destructive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Open,
    Closed,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Open => "open",
            QuestionStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(QuestionStatus::Open),
            "closed" => Some(QuestionStatus::Closed),
            _ => None,
        }
    }
}

/// A persisted question.
///
/// `canonical_key` is always `normalize(text)`; stores recompute it on
/// every text change so the exact-duplicate invariant cannot drift.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub canonical_key: String,
    pub course_id: String,
    pub author_id: String,
    pub labels: Vec<String>,
    pub status: QuestionStatus,
    pub accepted_answer_id: Option<String>,
    /// Unix epoch seconds, immutable after creation.
    pub created_at: i64,
    pub updated_at: i64,
    pub answer_count: i64,
    pub views: i64,
    /// User ids, set semantics (no duplicates).
    pub up_votes: Vec<String>,
    pub bookmarks: Vec<String>,
}

/// Input for question creation, before validation and duplicate checks.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    pub course_id: String,
    pub author_id: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Question {
    /// Build a fresh open question with a generated id and derived
    /// canonical key.
    pub fn create(new: NewQuestion, now: i64) -> Self {
        let canonical_key = normalize(&new.text);
        Question {
            id: Uuid::new_v4().to_string(),
            text: new.text,
            canonical_key,
            course_id: new.course_id,
            author_id: new.author_id,
            labels: new.labels,
            status: QuestionStatus::Open,
            accepted_answer_id: None,
            created_at: now,
            updated_at: now,
            answer_count: 0,
            views: 0,
            up_votes: Vec::new(),
            bookmarks: Vec::new(),
        }
    }
}

/// An answer to a question. Only the fields the question lifecycle needs:
/// acceptance validation requires knowing which question an answer
/// belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: i64,
}

impl Answer {
    pub fn create(question_id: &str, author_id: &str, text: &str, now: i64) -> Self {
        Answer {
            id: Uuid::new_v4().to_string(),
            question_id: question_id.to_string(),
            author_id: author_id.to_string(),
            text: text.to_string(),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_derives_canonical_key() {
        let q = Question::create(
            NewQuestion {
                text: "What is   a Closure?".to_string(),
                course_id: "cs101".to_string(),
                author_id: "u1".to_string(),
                labels: vec!["js".to_string()],
            },
            1_700_000_000,
        );
        assert_eq!(q.canonical_key, "what is a closure");
        assert_eq!(q.status, QuestionStatus::Open);
        assert_eq!(q.answer_count, 0);
        assert!(q.up_votes.is_empty() && q.bookmarks.is_empty());
        assert_eq!(q.created_at, q.updated_at);
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(QuestionStatus::parse("open"), Some(QuestionStatus::Open));
        assert_eq!(QuestionStatus::parse("closed"), Some(QuestionStatus::Closed));
        assert_eq!(QuestionStatus::parse("archived"), None);
        assert_eq!(QuestionStatus::Closed.as_str(), "closed");
    }
}
