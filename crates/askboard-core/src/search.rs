//! Similarity search pipeline: vector recall, lexical enrichment, and
//! blended re-ranking.
//!
//! # Scoring
//!
//! 1. Embed the query text.
//! 2. Fetch up to `k` vector candidates from the store (which may examine
//!    `num_candidates` neighbors internally).
//! 3. For each candidate compute `lexical_score` (Jaccard over token
//!    sets) against the query.
//! 4. `combined = vector_weight × vector + lexical_weight × lexical`.
//! 5. Re-sort by combined score (desc) with an id tie-break; vector order
//!    and combined order may diverge, and combined order governs every
//!    downstream decision.

use serde::Serialize;

use crate::embedding::Embedder;
use crate::error::QaError;
use crate::normalize::{jaccard_similarity, tokenize};
use crate::store::QuestionStore;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Maximum candidates returned.
    pub k: usize,
    /// Neighbors an ANN backend may examine internally; `0` means
    /// `max(100, k × 20)`.
    pub num_candidates: usize,
    /// Weight of the vector score in the blend.
    pub vector_weight: f64,
    /// Weight of the lexical score in the blend.
    pub lexical_weight: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            k: 5,
            num_candidates: 0,
            vector_weight: 0.8,
            lexical_weight: 0.2,
        }
    }
}

impl SearchParams {
    pub fn effective_candidates(&self) -> usize {
        if self.num_candidates == 0 {
            std::cmp::max(100, self.k * 20)
        } else {
            self.num_candidates
        }
    }
}

/// A scored similar-question candidate. Transient: produced per search
/// call and discarded once the caller consumes the ranked list.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub question_id: String,
    pub text: String,
    pub course_id: String,
    pub vector_score: f64,
    pub lexical_score: f64,
    pub combined_score: f64,
}

/// Sort candidates by combined score descending, breaking ties by id for
/// deterministic output, and truncate to `k`.
pub fn rank_candidates(mut candidates: Vec<Candidate>, k: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.question_id.cmp(&b.question_id))
    });
    candidates.truncate(k);
    candidates
}

/// Run the similarity pipeline for `query` against one course (or all
/// courses when `course_id` is `None`).
///
/// Returns at most `params.k` candidates ordered by descending combined
/// score. An empty index yields an empty list, not an error; embedding or
/// store failures propagate unchanged so a broken search can never
/// silently suppress a duplicate check.
pub async fn search_similar<S, E>(
    store: &S,
    embedder: &E,
    query: &str,
    course_id: Option<&str>,
    params: &SearchParams,
) -> Result<Vec<Candidate>, QaError>
where
    S: QuestionStore + ?Sized,
    E: Embedder + ?Sized,
{
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = embedder.embed(query).await?;
    let hits = store
        .vector_search(
            &query_vec,
            params.effective_candidates(),
            params.k,
            course_id,
        )
        .await?;

    let query_tokens = tokenize(query);
    let candidates: Vec<Candidate> = hits
        .into_iter()
        .map(|hit| {
            let lexical = jaccard_similarity(&query_tokens, &tokenize(&hit.text));
            let combined = params.vector_weight * hit.score + params.lexical_weight * lexical;
            Candidate {
                question_id: hit.question_id,
                text: hit.text,
                course_id: hit.course_id,
                vector_score: hit.score,
                lexical_score: lexical,
                combined_score: combined,
            }
        })
        .collect();

    Ok(rank_candidates(candidates, params.k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewQuestion, Question};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;

    fn make_candidate(id: &str, vector: f64, lexical: f64) -> Candidate {
        Candidate {
            question_id: id.to_string(),
            text: String::new(),
            course_id: "c".to_string(),
            vector_score: vector,
            lexical_score: lexical,
            combined_score: 0.8 * vector + 0.2 * lexical,
        }
    }

    #[test]
    fn test_rank_agrees_with_vector_order() {
        // 0.8*0.9+0.2*0.2 = 0.76 vs 0.8*0.7+0.2*0.9 = 0.74.
        let ranked = rank_candidates(
            vec![make_candidate("a", 0.9, 0.2), make_candidate("b", 0.7, 0.9)],
            5,
        );
        assert_eq!(ranked[0].question_id, "a");
        assert!((ranked[0].combined_score - 0.76).abs() < 1e-9);
        assert!((ranked[1].combined_score - 0.74).abs() < 1e-9);
    }

    #[test]
    fn test_rank_overrides_vector_order() {
        // Vector order says "a" first, but lexical overlap flips it:
        // 0.8*0.80+0.2*0.00 = 0.64 vs 0.8*0.75+0.2*0.90 = 0.78.
        let ranked = rank_candidates(
            vec![make_candidate("a", 0.80, 0.0), make_candidate("b", 0.75, 0.9)],
            5,
        );
        assert_eq!(ranked[0].question_id, "b");
        assert_eq!(ranked[1].question_id, "a");
    }

    #[test]
    fn test_rank_tie_break_is_deterministic() {
        let ranked = rank_candidates(
            vec![make_candidate("b", 0.5, 0.5), make_candidate("a", 0.5, 0.5)],
            5,
        );
        assert_eq!(ranked[0].question_id, "a");
    }

    #[test]
    fn test_rank_truncates_to_k() {
        let candidates = (0..10)
            .map(|i| make_candidate(&format!("q{}", i), 0.1 * i as f64, 0.0))
            .collect();
        assert_eq!(rank_candidates(candidates, 3).len(), 3);
    }

    #[test]
    fn test_effective_candidates_floor() {
        let params = SearchParams::default();
        assert_eq!(params.effective_candidates(), 100);
        let wide = SearchParams {
            k: 10,
            ..SearchParams::default()
        };
        assert_eq!(wide.effective_candidates(), 200);
        let explicit = SearchParams {
            num_candidates: 40,
            ..SearchParams::default()
        };
        assert_eq!(explicit.effective_candidates(), 40);
    }

    /// Embedder that returns a fixed vector per known text and fails on
    /// anything else.
    struct TableEmbedder {
        entries: Vec<(String, Vec<f32>)>,
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn model_name(&self) -> &str {
            "table"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, QaError> {
            self.entries
                .iter()
                .find(|(t, _)| t == text)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| QaError::upstream(anyhow::anyhow!("no vector for {:?}", text)))
        }
    }

    fn question(text: &str) -> Question {
        Question::create(
            NewQuestion {
                text: text.to_string(),
                course_id: "cs101".to_string(),
                author_id: "u1".to_string(),
                labels: Vec::new(),
            },
            1_700_000_000,
        )
    }

    #[tokio::test]
    async fn test_search_empty_query_and_empty_index() {
        let store = InMemoryStore::new();
        let embedder = TableEmbedder {
            entries: vec![("anything at all".to_string(), vec![1.0, 0.0])],
        };
        let params = SearchParams::default();

        let blank = search_similar(&store, &embedder, "   ", None, &params)
            .await
            .unwrap();
        assert!(blank.is_empty());

        let none = search_similar(&store, &embedder, "anything at all", None, &params)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_search_fails_closed_on_embedder_error() {
        let store = InMemoryStore::new();
        let embedder = TableEmbedder { entries: vec![] };
        let err = search_similar(
            &store,
            &embedder,
            "unknown query",
            None,
            &SearchParams::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, QaError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_search_blends_vector_and_lexical() {
        let store = InMemoryStore::new();
        // Semantically close (same direction) but lexically disjoint.
        let paraphrase = question("closures capture environment scope");
        // Semantically further but sharing tokens with the query.
        let literal = question("what is a closure exactly");
        store
            .insert_question(&paraphrase, &[1.0, 0.0])
            .await
            .unwrap();
        store
            .insert_question(&literal, &[0.8, 0.6])
            .await
            .unwrap();

        let embedder = TableEmbedder {
            entries: vec![("what is a closure".to_string(), vec![1.0, 0.0])],
        };
        let results = search_similar(
            &store,
            &embedder,
            "what is a closure",
            Some("cs101"),
            &SearchParams::default(),
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
        // paraphrase: 0.8*1.0 + 0.2*0.0 = 0.80
        // literal:    0.8*0.8 + 0.2*(3/4) = 0.79  ({what,is,closure} of
        // {what,is,closure,exactly}; "a" is dropped by the tokenizer)
        assert_eq!(results[0].question_id, paraphrase.id);
        assert!((results[0].combined_score - 0.80).abs() < 1e-6);
        assert!((results[1].combined_score - 0.79).abs() < 1e-6);
        assert!((results[1].lexical_score - 0.75).abs() < 1e-6);
    }
}
