//! # Askboard CLI (`askb`)
//!
//! The `askb` binary is the primary interface for the question board. It
//! provides commands for database initialization, posting and editing
//! questions, similarity search, answers, votes, bookmarks, and starting
//! the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! askb --config ./config/askb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askb init` | Create the SQLite database and run schema migrations |
//! | `askb ask` | Post a question (runs both duplicate checks first) |
//! | `askb search "<query>"` | Rank similar questions by blended score |
//! | `askb get <id>` | Show a question (counts a view) |
//! | `askb update <id>` | Edit a question's text, labels, or status |
//! | `askb answer <id>` | Record an answer |
//! | `askb accept <id> <answer>` | Accept an answer, closing the question |
//! | `askb close <id>` / `askb reopen <id>` | Status transitions |
//! | `askb vote <id>` / `askb bookmark <id>` | Per-user toggles |
//! | `askb delete <id>` | Remove a question and its answers |
//! | `askb serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! askb init --config ./config/askb.toml
//!
//! # Post a question to a course
//! askb ask "How do Rust lifetimes work?" --course cs101 --author alice --label rust
//!
//! # Find similar questions before posting
//! askb search "rust lifetime annotations" --course cs101
//!
//! # Answer and accept
//! askb answer <id> --author bob "They bound reference validity."
//! askb accept <id> <answer-id>
//! ```

mod config;
mod db;
mod embedding;
mod migrate;
mod questions;
mod server;
mod sqlite_store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use askboard_core::error::QaError;
use askboard_core::models::NewQuestion;
use askboard_core::models::Question;

use questions::{IndexWait, QuestionService, UpdateRequest};
use sqlite_store::SqliteStore;

/// Askboard CLI — a course question board with semantic duplicate
/// detection and similarity search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/askb.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "askb",
    about = "Askboard — a course question board with semantic duplicate detection",
    version,
    long_about = "Askboard stores course questions in SQLite, embeds them with a configurable \
    provider, and blends vector similarity with lexical (Jaccard) overlap to rank similar \
    questions and reject duplicates at posting time."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/askb.toml`. Database, embedding, retrieval,
    /// duplicate-threshold, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/askb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (questions,
    /// question_vectors, answers, question_votes, question_bookmarks).
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Post a question.
    ///
    /// Runs the exact-duplicate check (normalized text, same course) and the
    /// near-duplicate check (vector similarity AND lexical overlap) before
    /// storing. A rejection names the existing question so you can read it
    /// instead.
    Ask {
        /// The question text.
        text: String,

        /// Course the question belongs to.
        #[arg(long)]
        course: String,

        /// Posting user.
        #[arg(long)]
        author: String,

        /// Topic label (repeatable).
        #[arg(long = "label")]
        labels: Vec<String>,
    },

    /// Rank questions similar to a query.
    ///
    /// Embeds the query, fetches vector candidates, blends each one's vector
    /// score with its lexical overlap, and prints the top results.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one course.
        #[arg(long)]
        course: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Show a question by id. Counts a view.
    Get {
        /// Question id.
        id: String,
    },

    /// Edit a question's text, labels, or status.
    ///
    /// A text change re-runs both duplicate checks (ignoring the question
    /// itself) and re-embeds; a rejection leaves the stored question
    /// untouched.
    Update {
        /// Question id.
        id: String,

        /// New question text.
        #[arg(long)]
        text: Option<String>,

        /// Replace the label set (repeatable).
        #[arg(long = "label")]
        labels: Option<Vec<String>>,
    },

    /// Record an answer to a question.
    ///
    /// Answering a closed question reopens it.
    Answer {
        /// Question id.
        id: String,

        /// The answer text.
        text: String,

        /// Answering user.
        #[arg(long)]
        author: String,
    },

    /// Accept an answer. Closes the question.
    Accept {
        /// Question id.
        id: String,

        /// Answer id (must belong to the question).
        answer_id: String,
    },

    /// Close a question.
    Close {
        /// Question id.
        id: String,
    },

    /// Reopen a closed question.
    Reopen {
        /// Question id.
        id: String,
    },

    /// Toggle your up-vote on a question.
    Vote {
        /// Question id.
        id: String,

        /// Voting user.
        #[arg(long)]
        user: String,

        /// Remove the vote instead of adding it.
        #[arg(long)]
        remove: bool,
    },

    /// Toggle your bookmark on a question.
    Bookmark {
        /// Question id.
        id: String,

        /// Bookmarking user.
        #[arg(long)]
        user: String,

        /// Remove the bookmark instead of adding it.
        #[arg(long)]
        remove: bool,
    },

    /// Delete a question and its answers.
    Delete {
        /// Question id.
        id: String,
    },

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// question board API.
    Serve,
}

/// Build the service stack shared by every command except `init`.
async fn build_service(cfg: &config::Config) -> anyhow::Result<Arc<QuestionService>> {
    let pool = db::connect(cfg).await?;
    let embedder = embedding::create_embedder(&cfg.embedding)?;
    let store = Arc::new(SqliteStore::new(pool, embedder.model_name()));
    Ok(Arc::new(QuestionService::new(
        store,
        embedder,
        cfg.search_params(),
        cfg.dedup_config(),
        IndexWait {
            attempts: cfg.dedup.index_wait_attempts,
            interval_ms: cfg.dedup.index_wait_ms,
        },
    )))
}

fn print_question(q: &Question) {
    println!("id:       {}", q.id);
    println!("course:   {}", q.course_id);
    println!("author:   {}", q.author_id);
    println!("status:   {}", q.status.as_str());
    if !q.labels.is_empty() {
        println!("labels:   {}", q.labels.join(", "));
    }
    if let Some(accepted) = &q.accepted_answer_id {
        println!("accepted: {}", accepted);
    }
    println!(
        "answers:  {}   views: {}   votes: {}   bookmarks: {}",
        q.answer_count,
        q.views,
        q.up_votes.len(),
        q.bookmarks.len()
    );
    println!();
    println!("{}", q.text);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ask {
            text,
            course,
            author,
            labels,
        } => {
            let service = build_service(&cfg).await?;
            let result = service
                .create(NewQuestion {
                    text,
                    course_id: course,
                    author_id: author,
                    labels,
                })
                .await;
            match result {
                Ok(q) => {
                    println!("Posted question {}", q.id);
                    print_question(&q);
                }
                Err(err @ (QaError::DuplicateExact { .. } | QaError::DuplicateNear { .. })) => {
                    eprintln!("Rejected: {}", err);
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Search { query, course, k } => {
            let service = build_service(&cfg).await?;
            let results = service.search(&query, course.as_deref(), k).await?;
            if results.is_empty() {
                println!("No similar questions found.");
            } else {
                for (i, c) in results.iter().enumerate() {
                    println!(
                        "{}. [{:.3}] {} (vector {:.3}, lexical {:.3})",
                        i + 1,
                        c.combined_score,
                        c.question_id,
                        c.vector_score,
                        c.lexical_score
                    );
                    println!("   {}", c.text);
                }
            }
        }
        Commands::Get { id } => {
            let service = build_service(&cfg).await?;
            let q = service.get(&id).await?;
            print_question(&q);
        }
        Commands::Update { id, text, labels } => {
            let service = build_service(&cfg).await?;
            let result = service
                .update(
                    &id,
                    UpdateRequest {
                        text,
                        labels,
                        status: None,
                    },
                )
                .await;
            match result {
                Ok(q) => {
                    println!("Updated question {}", q.id);
                    print_question(&q);
                }
                Err(err @ (QaError::DuplicateExact { .. } | QaError::DuplicateNear { .. })) => {
                    eprintln!("Rejected: {}", err);
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Answer { id, text, author } => {
            let service = build_service(&cfg).await?;
            let answer = service.record_answer(&id, &author, &text).await?;
            println!("Recorded answer {} on question {}", answer.id, id);
        }
        Commands::Accept { id, answer_id } => {
            let service = build_service(&cfg).await?;
            let q = service.accept_answer(&id, &answer_id).await?;
            println!("Accepted answer {} — question is now closed.", answer_id);
            print_question(&q);
        }
        Commands::Close { id } => {
            let service = build_service(&cfg).await?;
            service.close(&id).await?;
            println!("Closed question {}", id);
        }
        Commands::Reopen { id } => {
            let service = build_service(&cfg).await?;
            service.reopen(&id).await?;
            println!("Reopened question {}", id);
        }
        Commands::Vote { id, user, remove } => {
            let service = build_service(&cfg).await?;
            let q = service.set_vote(&id, &user, !remove).await?;
            println!("Question {} now has {} vote(s).", id, q.up_votes.len());
        }
        Commands::Bookmark { id, user, remove } => {
            let service = build_service(&cfg).await?;
            let q = service.set_bookmark(&id, &user, !remove).await?;
            println!("Question {} now has {} bookmark(s).", id, q.bookmarks.len());
        }
        Commands::Delete { id } => {
            let service = build_service(&cfg).await?;
            service.delete(&id).await?;
            println!("Deleted question {}", id);
        }
        Commands::Serve => {
            let service = build_service(&cfg).await?;
            server::run_server(&cfg, service).await?;
        }
    }

    Ok(())
}
