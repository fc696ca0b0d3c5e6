//! SQLite-backed [`QuestionStore`] implementation.
//!
//! Vector search is a brute-force cosine scan over `question_vectors` in
//! Rust, with negative cosines clamped to `0.0` per the store contract.
//! All sqlx failures surface as [`QaError::Persistence`]; the
//! `UNIQUE(course_id, canonical_key)` constraint is the storage-level
//! backstop for the unlocked create race.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use askboard_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use askboard_core::error::QaError;
use askboard_core::models::{Answer, Question, QuestionStatus};
use askboard_core::normalize::normalize;
use askboard_core::store::{QuestionPatch, QuestionStore, VectorHit};

pub struct SqliteStore {
    pool: SqlitePool,
    model: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, model: &str) -> Self {
        Self {
            pool,
            model: model.to_string(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn member_set(&self, table: &str, question_id: &str) -> Result<Vec<String>, QaError> {
        // Table name comes from a fixed internal call site, never user input.
        let sql = format!(
            "SELECT user_id FROM {} WHERE question_id = ? ORDER BY user_id",
            table
        );
        let rows = sqlx::query(&sql)
            .bind(question_id)
            .fetch_all(&self.pool)
            .await
            .map_err(QaError::persistence)?;
        Ok(rows.iter().map(|r| r.get("user_id")).collect())
    }

    async fn row_to_question(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Question, QaError> {
        let labels_json: String = row.get("labels_json");
        let labels: Vec<String> = serde_json::from_str(&labels_json).unwrap_or_default();
        let status_raw: String = row.get("status");
        let status = QuestionStatus::parse(&status_raw).ok_or_else(|| {
            QaError::persistence(anyhow::anyhow!("unknown question status: {}", status_raw))
        })?;
        let id: String = row.get("id");

        Ok(Question {
            up_votes: self.member_set("question_votes", &id).await?,
            bookmarks: self.member_set("question_bookmarks", &id).await?,
            id,
            text: row.get("text"),
            canonical_key: row.get("canonical_key"),
            course_id: row.get("course_id"),
            author_id: row.get("author_id"),
            labels,
            status,
            accepted_answer_id: row.get("accepted_answer_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            answer_count: row.get("answer_count"),
            views: row.get("views"),
        })
    }

    async fn fetch_question_row(
        &self,
        id: &str,
    ) -> Result<Option<sqlx::sqlite::SqliteRow>, QaError> {
        sqlx::query("SELECT * FROM questions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QaError::persistence)
    }
}

#[async_trait]
impl QuestionStore for SqliteStore {
    async fn insert_question(&self, question: &Question, vector: &[f32]) -> Result<(), QaError> {
        let labels_json =
            serde_json::to_string(&question.labels).map_err(QaError::persistence)?;
        let blob = vec_to_blob(vector);

        let mut tx = self.pool.begin().await.map_err(QaError::persistence)?;

        sqlx::query(
            r#"
            INSERT INTO questions (id, course_id, author_id, text, canonical_key, labels_json,
                                   status, accepted_answer_id, created_at, updated_at,
                                   answer_count, views)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&question.id)
        .bind(&question.course_id)
        .bind(&question.author_id)
        .bind(&question.text)
        .bind(&question.canonical_key)
        .bind(&labels_json)
        .bind(question.status.as_str())
        .bind(&question.accepted_answer_id)
        .bind(question.created_at)
        .bind(question.updated_at)
        .bind(question.answer_count)
        .bind(question.views)
        .execute(&mut *tx)
        .await
        .map_err(QaError::persistence)?;

        sqlx::query(
            r#"
            INSERT INTO question_vectors (question_id, course_id, embedding, model, dims, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&question.id)
        .bind(&question.course_id)
        .bind(&blob)
        .bind(&self.model)
        .bind(vector.len() as i64)
        .bind(question.created_at)
        .execute(&mut *tx)
        .await
        .map_err(QaError::persistence)?;

        tx.commit().await.map_err(QaError::persistence)?;
        Ok(())
    }

    async fn get_question(&self, id: &str) -> Result<Option<Question>, QaError> {
        match self.fetch_question_row(id).await? {
            Some(row) => Ok(Some(self.row_to_question(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_canonical_key(
        &self,
        course_id: &str,
        key: &str,
        exclude: Option<&str>,
    ) -> Result<Option<Question>, QaError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM questions
            WHERE course_id = ? AND canonical_key = ? AND id != COALESCE(?, '')
            LIMIT 1
            "#,
        )
        .bind(course_id)
        .bind(key)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await
        .map_err(QaError::persistence)?;

        match row {
            Some(row) => Ok(Some(self.row_to_question(&row).await?)),
            None => Ok(None),
        }
    }

    async fn update_question(
        &self,
        id: &str,
        patch: &QuestionPatch,
        vector: Option<&[f32]>,
    ) -> Result<(), QaError> {
        let row = self
            .fetch_question_row(id)
            .await?
            .ok_or_else(|| QaError::NotFound(format!("question {}", id)))?;
        let current = self.row_to_question(&row).await?;

        // Merge the patch over the current record in Rust, then write all
        // mutable columns back in one statement.
        let (text, canonical_key) = match &patch.text {
            Some(t) => (t.clone(), normalize(t)),
            None => (current.text.clone(), current.canonical_key.clone()),
        };
        if patch.text.is_some() && vector.is_none() {
            return Err(QaError::persistence(anyhow::anyhow!(
                "text update without a fresh embedding"
            )));
        }
        let labels = patch.labels.as_ref().unwrap_or(&current.labels);
        let labels_json = serde_json::to_string(labels).map_err(QaError::persistence)?;
        let status = patch.status.unwrap_or(current.status);
        let accepted = match &patch.accepted_answer_id {
            Some(value) => value.clone(),
            None => current.accepted_answer_id.clone(),
        };
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(QaError::persistence)?;

        let result = sqlx::query(
            r#"
            UPDATE questions
            SET text = ?, canonical_key = ?, labels_json = ?, status = ?,
                accepted_answer_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&text)
        .bind(&canonical_key)
        .bind(&labels_json)
        .bind(status.as_str())
        .bind(&accepted)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(QaError::persistence)?;

        if result.rows_affected() == 0 {
            return Err(QaError::persistence(anyhow::anyhow!(
                "expected to update question {} but no rows changed",
                id
            )));
        }

        if let Some(vec) = vector {
            let blob = vec_to_blob(vec);
            sqlx::query(
                r#"
                INSERT INTO question_vectors (question_id, course_id, embedding, model, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(question_id) DO UPDATE SET
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims,
                    created_at = excluded.created_at
                "#,
            )
            .bind(id)
            .bind(&current.course_id)
            .bind(&blob)
            .bind(&self.model)
            .bind(vec.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(QaError::persistence)?;
        }

        tx.commit().await.map_err(QaError::persistence)?;
        Ok(())
    }

    async fn delete_question(&self, id: &str) -> Result<(), QaError> {
        let mut tx = self.pool.begin().await.map_err(QaError::persistence)?;

        for sql in [
            "DELETE FROM question_vectors WHERE question_id = ?",
            "DELETE FROM question_votes WHERE question_id = ?",
            "DELETE FROM question_bookmarks WHERE question_id = ?",
            "DELETE FROM answers WHERE question_id = ?",
        ] {
            sqlx::query(sql)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(QaError::persistence)?;
        }

        let result = sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(QaError::persistence)?;

        if result.rows_affected() == 0 {
            return Err(QaError::NotFound(format!("question {}", id)));
        }

        tx.commit().await.map_err(QaError::persistence)?;
        Ok(())
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        _num_candidates: usize,
        limit: usize,
        course_id: Option<&str>,
    ) -> Result<Vec<VectorHit>, QaError> {
        // Brute-force scan; num_candidates is advisory for ANN backends.
        let rows = match course_id {
            Some(course) => {
                sqlx::query(
                    r#"
                    SELECT qv.question_id, qv.embedding, q.text, q.course_id
                    FROM question_vectors qv
                    JOIN questions q ON q.id = qv.question_id
                    WHERE qv.course_id = ?
                    "#,
                )
                .bind(course)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT qv.question_id, qv.embedding, q.text, q.course_id
                    FROM question_vectors qv
                    JOIN questions q ON q.id = qv.question_id
                    "#,
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(QaError::persistence)?;

        let mut hits: Vec<VectorHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let score = f64::from(cosine_similarity(query_vec, &vec)).max(0.0);
                VectorHit {
                    question_id: row.get("question_id"),
                    text: row.get("text"),
                    course_id: row.get("course_id"),
                    score,
                }
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
        let present: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM question_vectors WHERE question_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(QaError::persistence)?;
        Ok(present)
    }

    async fn set_vote(&self, question_id: &str, user_id: &str, on: bool) -> Result<(), QaError> {
        if self.fetch_question_row(question_id).await?.is_none() {
            return Err(QaError::NotFound(format!("question {}", question_id)));
        }
        let sql = if on {
            "INSERT OR IGNORE INTO question_votes (question_id, user_id) VALUES (?, ?)"
        } else {
            "DELETE FROM question_votes WHERE question_id = ? AND user_id = ?"
        };
        sqlx::query(sql)
            .bind(question_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(QaError::persistence)?;
        Ok(())
    }

    async fn set_bookmark(
        &self,
        question_id: &str,
        user_id: &str,
        on: bool,
    ) -> Result<(), QaError> {
        if self.fetch_question_row(question_id).await?.is_none() {
            return Err(QaError::NotFound(format!("question {}", question_id)));
        }
        let sql = if on {
            "INSERT OR IGNORE INTO question_bookmarks (question_id, user_id) VALUES (?, ?)"
        } else {
            "DELETE FROM question_bookmarks WHERE question_id = ? AND user_id = ?"
        };
        sqlx::query(sql)
            .bind(question_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(QaError::persistence)?;
        Ok(())
    }

    async fn insert_answer(&self, answer: &Answer) -> Result<(), QaError> {
        let mut tx = self.pool.begin().await.map_err(QaError::persistence)?;

        let result = sqlx::query(
            "UPDATE questions SET answer_count = answer_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(answer.created_at)
        .bind(&answer.question_id)
        .execute(&mut *tx)
        .await
        .map_err(QaError::persistence)?;

        if result.rows_affected() == 0 {
            return Err(QaError::NotFound(format!(
                "question {}",
                answer.question_id
            )));
        }

        sqlx::query(
            "INSERT INTO answers (id, question_id, author_id, text, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&answer.id)
        .bind(&answer.question_id)
        .bind(&answer.author_id)
        .bind(&answer.text)
        .bind(answer.created_at)
        .execute(&mut *tx)
        .await
        .map_err(QaError::persistence)?;

        tx.commit().await.map_err(QaError::persistence)?;
        Ok(())
    }

    async fn get_answer(&self, id: &str) -> Result<Option<Answer>, QaError> {
        let row = sqlx::query(
            "SELECT id, question_id, author_id, text, created_at FROM answers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(QaError::persistence)?;

        Ok(row.map(|r| Answer {
            id: r.get("id"),
            question_id: r.get("question_id"),
            author_id: r.get("author_id"),
            text: r.get("text"),
            created_at: r.get("created_at"),
        }))
    }

    async fn increment_views(&self, question_id: &str) -> Result<(), QaError> {
        let result = sqlx::query("UPDATE questions SET views = views + 1 WHERE id = ?")
            .bind(question_id)
            .execute(&self.pool)
            .await
            .map_err(QaError::persistence)?;
        if result.rows_affected() == 0 {
            return Err(QaError::NotFound(format!("question {}", question_id)));
        }
        Ok(())
    }
}
