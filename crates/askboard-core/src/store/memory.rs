//! In-memory [`QuestionStore`] implementation for tests.
//!
//! Uses `HashMap` behind `std::sync::RwLock` for thread safety. Vector
//! search is brute-force cosine similarity over all stored vectors, with
//! negative cosines clamped to `0.0` to honor the `[0, 1]` score
//! contract.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::QaError;
use crate::models::{Answer, Question};
use crate::normalize::normalize;

use super::{QuestionPatch, QuestionStore, VectorHit};

struct StoredQuestion {
    question: Question,
    vector: Vec<f32>,
}

/// In-memory store for unit and lifecycle tests.
#[derive(Default)]
pub struct InMemoryStore {
    questions: RwLock<HashMap<String, StoredQuestion>>,
    answers: RwLock<HashMap<String, Answer>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[async_trait]
impl QuestionStore for InMemoryStore {
    async fn insert_question(&self, question: &Question, vector: &[f32]) -> Result<(), QaError> {
        let mut questions = self.questions.write().unwrap();
        questions.insert(
            question.id.clone(),
            StoredQuestion {
                question: question.clone(),
                vector: vector.to_vec(),
            },
        );
        Ok(())
    }

    async fn get_question(&self, id: &str) -> Result<Option<Question>, QaError> {
        let questions = self.questions.read().unwrap();
        Ok(questions.get(id).map(|s| s.question.clone()))
    }

    async fn find_by_canonical_key(
        &self,
        course_id: &str,
        key: &str,
        exclude: Option<&str>,
    ) -> Result<Option<Question>, QaError> {
        let questions = self.questions.read().unwrap();
        Ok(questions
            .values()
            .filter(|s| exclude != Some(s.question.id.as_str()))
            .find(|s| s.question.course_id == course_id && s.question.canonical_key == key)
            .map(|s| s.question.clone()))
    }

    async fn update_question(
        &self,
        id: &str,
        patch: &QuestionPatch,
        vector: Option<&[f32]>,
    ) -> Result<(), QaError> {
        let mut questions = self.questions.write().unwrap();
        let stored = questions
            .get_mut(id)
            .ok_or_else(|| QaError::NotFound(format!("question {}", id)))?;

        if let Some(text) = &patch.text {
            stored.question.canonical_key = normalize(text);
            stored.question.text = text.clone();
            match vector {
                Some(v) => stored.vector = v.to_vec(),
                None => {
                    return Err(QaError::persistence(anyhow::anyhow!(
                        "text update without a fresh embedding"
                    )))
                }
            }
        }
        if let Some(labels) = &patch.labels {
            stored.question.labels = labels.clone();
        }
        if let Some(status) = patch.status {
            stored.question.status = status;
        }
        if let Some(accepted) = &patch.accepted_answer_id {
            stored.question.accepted_answer_id = accepted.clone();
        }
        stored.question.updated_at = Self::now();
        Ok(())
    }

    async fn delete_question(&self, id: &str) -> Result<(), QaError> {
        let mut questions = self.questions.write().unwrap();
        if questions.remove(id).is_none() {
            return Err(QaError::NotFound(format!("question {}", id)));
        }
        let mut answers = self.answers.write().unwrap();
        answers.retain(|_, a| a.question_id != id);
        Ok(())
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        _num_candidates: usize,
        limit: usize,
        course_id: Option<&str>,
    ) -> Result<Vec<VectorHit>, QaError> {
        let questions = self.questions.read().unwrap();
        let mut hits: Vec<VectorHit> = questions
            .values()
            .filter(|s| course_id.map_or(true, |c| s.question.course_id == c))
            .map(|s| VectorHit {
                question_id: s.question.id.clone(),
                text: s.question.text.clone(),
                course_id: s.question.course_id.clone(),
                score: f64::from(cosine_similarity(query_vec, &s.vector)).max(0.0),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn vector_indexed(&self, id: &str) -> Result<bool, QaError> {
        let questions = self.questions.read().unwrap();
        Ok(questions.contains_key(id))
    }

    async fn set_vote(&self, question_id: &str, user_id: &str, on: bool) -> Result<(), QaError> {
        let mut questions = self.questions.write().unwrap();
        let stored = questions
            .get_mut(question_id)
            .ok_or_else(|| QaError::NotFound(format!("question {}", question_id)))?;
        let votes = &mut stored.question.up_votes;
        if on {
            if !votes.iter().any(|u| u == user_id) {
                votes.push(user_id.to_string());
            }
        } else {
            votes.retain(|u| u != user_id);
        }
        Ok(())
    }

    async fn set_bookmark(
        &self,
        question_id: &str,
        user_id: &str,
        on: bool,
    ) -> Result<(), QaError> {
        let mut questions = self.questions.write().unwrap();
        let stored = questions
            .get_mut(question_id)
            .ok_or_else(|| QaError::NotFound(format!("question {}", question_id)))?;
        let bookmarks = &mut stored.question.bookmarks;
        if on {
            if !bookmarks.iter().any(|u| u == user_id) {
                bookmarks.push(user_id.to_string());
            }
        } else {
            bookmarks.retain(|u| u != user_id);
        }
        Ok(())
    }

    async fn insert_answer(&self, answer: &Answer) -> Result<(), QaError> {
        let mut questions = self.questions.write().unwrap();
        let stored = questions
            .get_mut(&answer.question_id)
            .ok_or_else(|| QaError::NotFound(format!("question {}", answer.question_id)))?;
        stored.question.answer_count += 1;
        let mut answers = self.answers.write().unwrap();
        answers.insert(answer.id.clone(), answer.clone());
        Ok(())
    }

    async fn get_answer(&self, id: &str) -> Result<Option<Answer>, QaError> {
        let answers = self.answers.read().unwrap();
        Ok(answers.get(id).cloned())
    }

    async fn increment_views(&self, question_id: &str) -> Result<(), QaError> {
        let mut questions = self.questions.write().unwrap();
        let stored = questions
            .get_mut(question_id)
            .ok_or_else(|| QaError::NotFound(format!("question {}", question_id)))?;
        stored.question.views += 1;
        Ok(())
    }
}
