//! Relevance ranking: cosine similarity between the user query and each
//! retrieved document, threshold filter, stable descending order.
//!
//! Ranking is best-effort. Speed mode skips it, and a failing embedding
//! capability degrades to unranked pass-through; retrieval output is never
//! discarded because scoring was unavailable.

use tracing::{debug, warn};

use beacon_core::models::{Document, OptimizationMode, RankedDocument};
use beacon_core::traits::EmbeddingModel;

/// Rank retrieved documents against the query.
pub async fn rank(
    embedder: &dyn EmbeddingModel,
    query: &str,
    documents: Vec<Document>,
    threshold: f32,
    mode: OptimizationMode,
) -> Vec<RankedDocument> {
    if documents.is_empty() {
        return Vec::new();
    }
    if !mode.rerank() {
        debug!(count = documents.len(), "rerank skipped for speed mode");
        return documents.into_iter().map(RankedDocument::unranked).collect();
    }

    let texts: Vec<String> = documents.iter().map(embedding_text).collect();

    let query_vec = match embedder.embed(&[query.to_string()]).await {
        Ok(mut vecs) if !vecs.is_empty() => vecs.remove(0),
        Ok(_) | Err(_) => {
            warn!("query embedding unavailable, passing documents through unranked");
            return documents.into_iter().map(RankedDocument::unranked).collect();
        }
    };

    let doc_vecs = match embedder.embed(&texts).await {
        Ok(vecs) if vecs.len() == documents.len() => vecs,
        Ok(vecs) => {
            warn!(
                expected = documents.len(),
                got = vecs.len(),
                "embedding batch size mismatch, passing through unranked"
            );
            return documents.into_iter().map(RankedDocument::unranked).collect();
        }
        Err(e) => {
            warn!(error = %e, "document embedding failed, passing through unranked");
            return documents.into_iter().map(RankedDocument::unranked).collect();
        }
    };

    let mut ranked: Vec<RankedDocument> = documents
        .into_iter()
        .zip(doc_vecs)
        .map(|(doc, vec)| {
            let score = cosine_similarity(&query_vec, &vec);
            RankedDocument::scored(doc, score)
        })
        .filter(|r| r.score.is_some_and(|s| s >= threshold))
        .collect();

    // Stable sort: ties keep original retrieval order.
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    debug!(kept = ranked.len(), threshold, "ranking complete");
    ranked
}

/// Text embedded for a document: title plus snippet.
fn embedding_text(doc: &Document) -> String {
    if doc.snippet.is_empty() {
        doc.title.clone()
    } else {
        format!("{} - {}", doc.title, doc.snippet)
    }
}

/// Cosine similarity in [-1, 1]. Zero vectors and dimension mismatches
/// score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
