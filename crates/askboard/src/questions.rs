//! Question lifecycle: create, update, delete, search, status
//! transitions, answers, and membership toggles.
//!
//! Every write that changes indexed text runs the duplicate policy first
//! and then waits for the vector index to serve the new document via a
//! bounded visibility poll (exponential backoff, hard attempt cap). A
//! poll that exhausts its attempts is an upstream failure, never a
//! silent success — correctness must not depend on a magic sleep tuned
//! to one deployment's index latency.
//!
//! No lock is taken across the check-then-insert sequence; two
//! near-simultaneous creations of the same question can race. The
//! storage-level unique constraint on the canonical key catches the
//! exact case; the near case is an accepted race window.

use std::sync::Arc;
use std::time::Duration;

use askboard_core::dedup::{check_duplicate, DedupConfig};
use askboard_core::embedding::Embedder;
use askboard_core::error::QaError;
use askboard_core::models::{Answer, NewQuestion, Question, QuestionStatus};
use askboard_core::search::{search_similar, Candidate, SearchParams};
use askboard_core::store::{QuestionPatch, QuestionStore};

/// Bounded post-write poll for vector-index visibility.
#[derive(Debug, Clone)]
pub struct IndexWait {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl Default for IndexWait {
    fn default() -> Self {
        IndexWait {
            attempts: 10,
            interval_ms: 100,
        }
    }
}

/// Caller-facing update request. `text` changes re-run the duplicate
/// policy; the remaining fields merge verbatim.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateRequest {
    pub text: Option<String>,
    pub labels: Option<Vec<String>>,
    pub status: Option<QuestionStatus>,
}

/// Owns all question operations, wiring the store, embedder, retrieval
/// parameters, and duplicate thresholds together.
pub struct QuestionService {
    store: Arc<dyn QuestionStore>,
    embedder: Arc<dyn Embedder>,
    params: SearchParams,
    dedup: DedupConfig,
    wait: IndexWait,
}

impl QuestionService {
    pub fn new(
        store: Arc<dyn QuestionStore>,
        embedder: Arc<dyn Embedder>,
        params: SearchParams,
        dedup: DedupConfig,
        wait: IndexWait,
    ) -> Self {
        Self {
            store,
            embedder,
            params,
            dedup,
            wait,
        }
    }

    /// Create a question: validate, run both duplicate checks, embed,
    /// persist, await index visibility, and return the re-read record.
    pub async fn create(&self, new: NewQuestion) -> Result<Question, QaError> {
        if new.text.trim().is_empty() {
            return Err(QaError::Validation("question text is required".into()));
        }
        if new.course_id.trim().is_empty() || new.author_id.trim().is_empty() {
            return Err(QaError::Validation(
                "course_id and author_id are required".into(),
            ));
        }

        check_duplicate(
            self.store.as_ref(),
            self.embedder.as_ref(),
            &self.params,
            &self.dedup,
            &new.course_id,
            &new.text,
            None,
        )
        .await?;

        let vector = self.embed_checked(&new.text).await?;
        let question = Question::create(new, chrono::Utc::now().timestamp());
        self.store.insert_question(&question, &vector).await?;
        self.await_indexed(&question.id).await?;

        self.store
            .get_question(&question.id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", question.id)))
    }

    /// Apply a partial update. Text changes re-run the duplicate policy
    /// (excluding this question from exact-match comparison); a rejection
    /// aborts before any write, leaving the stored text and embedding
    /// untouched.
    pub async fn update(&self, id: &str, req: UpdateRequest) -> Result<Question, QaError> {
        let existing = self
            .store
            .get_question(id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", id)))?;

        let mut vector = None;
        if let Some(text) = &req.text {
            if text.trim().is_empty() {
                return Err(QaError::Validation("question text is required".into()));
            }
            check_duplicate(
                self.store.as_ref(),
                self.embedder.as_ref(),
                &self.params,
                &self.dedup,
                &existing.course_id,
                text,
                Some(id),
            )
            .await?;
            vector = Some(self.embed_checked(text).await?);
        }

        let patch = QuestionPatch {
            text: req.text.clone(),
            labels: req.labels,
            status: req.status,
            accepted_answer_id: None,
        };
        if patch.is_empty() {
            return Err(QaError::Validation("update contains no fields".into()));
        }

        self.store
            .update_question(id, &patch, vector.as_deref())
            .await?;
        if req.text.is_some() {
            self.await_indexed(id).await?;
        }

        self.store
            .get_question(id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", id)))
    }

    /// Find questions similar to `query` — the "did you mean" surface.
    pub async fn search(
        &self,
        query: &str,
        course_id: Option<&str>,
        k: Option<usize>,
    ) -> Result<Vec<Candidate>, QaError> {
        let params = match k {
            Some(k) if k >= 1 => SearchParams {
                k,
                ..self.params.clone()
            },
            Some(_) => return Err(QaError::Validation("k must be >= 1".into())),
            None => self.params.clone(),
        };
        search_similar(
            self.store.as_ref(),
            self.embedder.as_ref(),
            query,
            course_id,
            &params,
        )
        .await
    }

    /// Fetch a question and count the view.
    pub async fn get(&self, id: &str) -> Result<Question, QaError> {
        self.store.increment_views(id).await?;
        self.store
            .get_question(id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", id)))
    }

    /// Destructive removal, outside the status machine.
    pub async fn delete(&self, id: &str) -> Result<(), QaError> {
        self.store.delete_question(id).await
    }

    pub async fn close(&self, id: &str) -> Result<Question, QaError> {
        self.set_status(id, QuestionStatus::Closed).await
    }

    pub async fn reopen(&self, id: &str) -> Result<Question, QaError> {
        self.set_status(id, QuestionStatus::Open).await
    }

    async fn set_status(&self, id: &str, status: QuestionStatus) -> Result<Question, QaError> {
        let patch = QuestionPatch {
            status: Some(status),
            ..Default::default()
        };
        self.store.update_question(id, &patch, None).await?;
        self.store
            .get_question(id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", id)))
    }

    /// Record a new answer. Increments `answer_count` and reopens a
    /// closed question.
    pub async fn record_answer(
        &self,
        question_id: &str,
        author_id: &str,
        text: &str,
    ) -> Result<Answer, QaError> {
        if text.trim().is_empty() {
            return Err(QaError::Validation("answer text is required".into()));
        }
        let question = self
            .store
            .get_question(question_id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", question_id)))?;

        let answer = Answer::create(question_id, author_id, text, chrono::Utc::now().timestamp());
        self.store.insert_answer(&answer).await?;

        if question.status == QuestionStatus::Closed {
            self.set_status(question_id, QuestionStatus::Open).await?;
        }
        Ok(answer)
    }

    /// Accept an answer: it must belong to this question. Accepting
    /// closes the question.
    pub async fn accept_answer(&self, question_id: &str, answer_id: &str) -> Result<Question, QaError> {
        self.store
            .get_question(question_id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", question_id)))?;
        let answer = self
            .store
            .get_answer(answer_id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("answer {}", answer_id)))?;
        if answer.question_id != question_id {
            return Err(QaError::Validation(format!(
                "answer {} does not belong to question {}",
                answer_id, question_id
            )));
        }

        let patch = QuestionPatch {
            status: Some(QuestionStatus::Closed),
            accepted_answer_id: Some(Some(answer_id.to_string())),
            ..Default::default()
        };
        self.store.update_question(question_id, &patch, None).await?;
        self.store
            .get_question(question_id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", question_id)))
    }

    /// Idempotent bookmark toggle.
    pub async fn set_bookmark(
        &self,
        question_id: &str,
        user_id: &str,
        on: bool,
    ) -> Result<Question, QaError> {
        self.store.set_bookmark(question_id, user_id, on).await?;
        self.store
            .get_question(question_id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", question_id)))
    }

    /// Idempotent up-vote toggle.
    pub async fn set_vote(
        &self,
        question_id: &str,
        user_id: &str,
        on: bool,
    ) -> Result<Question, QaError> {
        self.store.set_vote(question_id, user_id, on).await?;
        self.store
            .get_question(question_id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", question_id)))
    }

    async fn embed_checked(&self, text: &str) -> Result<Vec<f32>, QaError> {
        let vector = self.embedder.embed(text).await?;
        let dims = self.embedder.dims();
        if dims > 0 && vector.len() != dims {
            return Err(QaError::upstream(anyhow::anyhow!(
                "embedding has {} dims, index expects {}",
                vector.len(),
                dims
            )));
        }
        Ok(vector)
    }

    /// Poll the vector index until it serves `id`, backing off
    /// exponentially. Exhausting the attempt budget is an upstream
    /// failure.
    async fn await_indexed(&self, id: &str) -> Result<(), QaError> {
        for attempt in 0..self.wait.attempts {
            if self.store.vector_indexed(id).await? {
                return Ok(());
            }
            let delay = Duration::from_millis(self.wait.interval_ms << attempt.min(5));
            tokio::time::sleep(delay).await;
        }
        Err(QaError::upstream(anyhow::anyhow!(
            "vector index did not become visible for question {} after {} attempts",
            id,
            self.wait.attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use crate::embedding::HashEmbedder;
    use askboard_core::store::memory::InMemoryStore;
    use askboard_core::store::VectorHit;
    use async_trait::async_trait;

    fn service_with(store: Arc<dyn QuestionStore>) -> QuestionService {
        let embedder = HashEmbedder::new(&EmbeddingConfig {
            provider: "hash".to_string(),
            model: None,
            dims: Some(256),
            max_retries: 0,
            timeout_secs: 1,
        })
        .unwrap();
        QuestionService::new(
            store,
            Arc::new(embedder),
            SearchParams::default(),
            DedupConfig::default(),
            IndexWait {
                attempts: 3,
                interval_ms: 1,
            },
        )
    }

    fn new_question(text: &str) -> NewQuestion {
        NewQuestion {
            text: text.to_string(),
            course_id: "cs101".to_string(),
            author_id: "alice".to_string(),
            labels: vec!["rust".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_round_trip() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let q = service
            .create(new_question("How do Rust lifetimes work?"))
            .await
            .unwrap();
        assert_eq!(q.canonical_key, "how do rust lifetimes work");
        assert_eq!(q.status, QuestionStatus::Open);
        assert_eq!(q.answer_count, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_exact_duplicate() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        service
            .create(new_question("what is a closure"))
            .await
            .unwrap();
        let err = service
            .create(new_question("What is   a Closure?"))
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::DuplicateExact { .. }));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let err = service.create(new_question("   ")).await.unwrap_err();
        assert!(matches!(err, QaError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_rejection_leaves_record_untouched() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let first = service
            .create(new_question("what is a closure"))
            .await
            .unwrap();
        let second = service
            .create(new_question("how does borrowing work"))
            .await
            .unwrap();

        let err = service
            .update(
                &second.id,
                UpdateRequest {
                    text: Some("What is a CLOSURE".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        match err {
            QaError::DuplicateExact { question_id, .. } => assert_eq!(question_id, first.id),
            other => panic!("expected DuplicateExact, got {:?}", other),
        }

        let unchanged = service.get(&second.id).await.unwrap();
        assert_eq!(unchanged.text, "how does borrowing work");
        assert_eq!(unchanged.canonical_key, "how does borrowing work");
    }

    #[tokio::test]
    async fn test_update_own_text_is_not_self_duplicate() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let q = service
            .create(new_question("what is a closure"))
            .await
            .unwrap();
        // Cosmetic edit normalizing to the same canonical key must pass.
        let updated = service
            .update(
                &q.id,
                UpdateRequest {
                    text: Some("What is a closure?".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.canonical_key, "what is a closure");
        assert_eq!(updated.text, "What is a closure?");
    }

    #[tokio::test]
    async fn test_bookmark_toggle_is_idempotent() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let q = service
            .create(new_question("what is ownership"))
            .await
            .unwrap();

        service.set_bookmark(&q.id, "bob", true).await.unwrap();
        let after_second = service.set_bookmark(&q.id, "bob", true).await.unwrap();
        assert_eq!(after_second.bookmarks, vec!["bob".to_string()]);

        // Removing a non-member is a no-op success.
        let removed = service.set_bookmark(&q.id, "carol", false).await.unwrap();
        assert_eq!(removed.bookmarks, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_vote_toggle_round_trip() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let q = service
            .create(new_question("what is ownership"))
            .await
            .unwrap();
        service.set_vote(&q.id, "bob", true).await.unwrap();
        service.set_vote(&q.id, "bob", true).await.unwrap();
        let off = service.set_vote(&q.id, "bob", false).await.unwrap();
        assert!(off.up_votes.is_empty());
    }

    #[tokio::test]
    async fn test_answer_accept_and_status_cycle() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let q = service
            .create(new_question("how do traits work"))
            .await
            .unwrap();

        let answer = service
            .record_answer(&q.id, "bob", "They define shared behavior.")
            .await
            .unwrap();
        let accepted = service.accept_answer(&q.id, &answer.id).await.unwrap();
        assert_eq!(accepted.status, QuestionStatus::Closed);
        assert_eq!(accepted.accepted_answer_id, Some(answer.id.clone()));

        // A new answer on a closed question reopens it.
        service
            .record_answer(&q.id, "carol", "Another take.")
            .await
            .unwrap();
        let reopened = service.get(&q.id).await.unwrap();
        assert_eq!(reopened.status, QuestionStatus::Open);
        assert_eq!(reopened.answer_count, 2);
    }

    #[tokio::test]
    async fn test_accept_foreign_answer_rejected() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let q1 = service
            .create(new_question("how do traits work"))
            .await
            .unwrap();
        let q2 = service
            .create(new_question("how does async work"))
            .await
            .unwrap();
        let answer = service
            .record_answer(&q1.id, "bob", "With vtables, sometimes.")
            .await
            .unwrap();
        let err = service.accept_answer(&q2.id, &answer.id).await.unwrap_err();
        assert!(matches!(err, QaError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_counts_views() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let q = service
            .create(new_question("what is ownership"))
            .await
            .unwrap();
        service.get(&q.id).await.unwrap();
        let seen = service.get(&q.id).await.unwrap();
        assert_eq!(seen.views, 2);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let service = service_with(Arc::new(InMemoryStore::new()));
        let q = service
            .create(new_question("what is ownership"))
            .await
            .unwrap();
        service.delete(&q.id).await.unwrap();
        let err = service.get(&q.id).await.unwrap_err();
        assert!(matches!(err, QaError::NotFound(_)));
    }

    /// Store whose vector index never serves new writes; drives the
    /// visibility-poll timeout path.
    struct LaggingStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl QuestionStore for LaggingStore {
        async fn insert_question(
            &self,
            question: &Question,
            vector: &[f32],
        ) -> Result<(), QaError> {
            self.inner.insert_question(question, vector).await
        }
        async fn get_question(&self, id: &str) -> Result<Option<Question>, QaError> {
            self.inner.get_question(id).await
        }
        async fn find_by_canonical_key(
            &self,
            course_id: &str,
            key: &str,
            exclude: Option<&str>,
        ) -> Result<Option<Question>, QaError> {
            self.inner.find_by_canonical_key(course_id, key, exclude).await
        }
        async fn update_question(
            &self,
            id: &str,
            patch: &QuestionPatch,
            vector: Option<&[f32]>,
        ) -> Result<(), QaError> {
            self.inner.update_question(id, patch, vector).await
        }
        async fn delete_question(&self, id: &str) -> Result<(), QaError> {
            self.inner.delete_question(id).await
        }
        async fn vector_search(
            &self,
            query_vec: &[f32],
            num_candidates: usize,
            limit: usize,
            course_id: Option<&str>,
        ) -> Result<Vec<VectorHit>, QaError> {
            self.inner
                .vector_search(query_vec, num_candidates, limit, course_id)
                .await
        }
        async fn vector_indexed(&self, _id: &str) -> Result<bool, QaError> {
            Ok(false)
        }
        async fn set_vote(&self, q: &str, u: &str, on: bool) -> Result<(), QaError> {
            self.inner.set_vote(q, u, on).await
        }
        async fn set_bookmark(&self, q: &str, u: &str, on: bool) -> Result<(), QaError> {
            self.inner.set_bookmark(q, u, on).await
        }
        async fn insert_answer(&self, answer: &Answer) -> Result<(), QaError> {
            self.inner.insert_answer(answer).await
        }
        async fn get_answer(&self, id: &str) -> Result<Option<Answer>, QaError> {
            self.inner.get_answer(id).await
        }
        async fn increment_views(&self, question_id: &str) -> Result<(), QaError> {
            self.inner.increment_views(question_id).await
        }
    }

    #[tokio::test]
    async fn test_stale_index_times_out_as_upstream() {
        let service = service_with(Arc::new(LaggingStore {
            inner: InMemoryStore::new(),
        }));
        let err = service
            .create(new_question("what is ownership"))
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::Upstream(_)));
    }
}
