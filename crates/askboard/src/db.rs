//! SQLite connection pool for the question database.
//!
//! WAL journaling keeps reads (question pages, searches) from blocking
//! behind writes (posts, votes); the brute-force vector scan holds a
//! read connection for its whole pass, so writers must not stall it.
//! The database file and its parent directory are created on first
//! connect, letting `askb init` run against a fresh checkout.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

/// Connections stay small: one for the serving path, a few spares for
/// concurrent CLI invocations against the same file.
const MAX_CONNECTIONS: u32 = 5;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "Failed to create question database directory: {}",
                parent.display()
            )
        })?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .with_context(|| format!("Invalid question database path: {}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| {
            format!("Failed to open question database: {}", db_path.display())
        })?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig, ServerConfig};

    fn config_at(path: std::path::PathBuf) -> Config {
        Config {
            db: DbConfig { path },
            embedding: Default::default(),
            retrieval: Default::default(),
            dedup: Default::default(),
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_connect_creates_file_and_missing_parents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("data").join("askb.sqlite");
        let pool = connect(&config_at(db_path.clone())).await.unwrap();

        assert!(db_path.exists());
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(one, 1);
        pool.close().await;
    }
}
