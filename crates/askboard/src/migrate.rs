//! Database schema migrations (idempotent).
//!
//! The `UNIQUE(course_id, canonical_key)` constraint on `questions` backs
//! the exact-duplicate invariant at the storage layer; the policy check
//! runs first, and the constraint catches the unlocked race between two
//! near-simultaneous creations.

use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            text TEXT NOT NULL,
            canonical_key TEXT NOT NULL,
            labels_json TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'open',
            accepted_answer_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            answer_count INTEGER NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0,
            UNIQUE(course_id, canonical_key)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS question_vectors (
            question_id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (question_id) REFERENCES questions(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS answers (
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (question_id) REFERENCES questions(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS question_votes (
            question_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            UNIQUE(question_id, user_id),
            FOREIGN KEY (question_id) REFERENCES questions(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS question_bookmarks (
            question_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            UNIQUE(question_id, user_id),
            FOREIGN KEY (question_id) REFERENCES questions(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_questions_course ON questions(course_id)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_questions_canonical ON questions(course_id, canonical_key)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_answers_question ON answers(question_id)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_question_vectors_course ON question_vectors(course_id)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
