//! Retrieval client: one search call per planned query, concurrently, each
//! with its own timeout. A failing or slow query contributes an empty set;
//! it never fails the turn or delays the join beyond its own budget.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use beacon_core::errors::RetrievalError;
use beacon_core::models::Document;
use beacon_core::traits::SearchEngine;

/// Fan-out wrapper around a search capability.
pub struct RetrievalClient {
    engine: Arc<dyn SearchEngine>,
    per_query_timeout: Duration,
}

impl RetrievalClient {
    pub fn new(engine: Arc<dyn SearchEngine>, per_query_timeout: Duration) -> Self {
        Self {
            engine,
            per_query_timeout,
        }
    }

    /// Run every query concurrently and merge the results.
    ///
    /// Merge order: queries in submission order, documents in first-seen
    /// order within each query. Duplicates (by normalized URL) keep the
    /// first occurrence.
    pub async fn retrieve(&self, queries: &[String], engines: &[String]) -> Vec<Document> {
        let calls = queries.iter().map(|query| {
            let engine = Arc::clone(&self.engine);
            let query = query.clone();
            let engines = engines.to_vec();
            let budget = self.per_query_timeout;
            async move {
                match tokio::time::timeout(budget, engine.search(&query, &engines)).await {
                    Ok(Ok(documents)) => documents,
                    Ok(Err(e)) => {
                        warn!(query = %query, error = %e, "search query failed");
                        Vec::new()
                    }
                    Err(_) => {
                        let e = RetrievalError::Timeout {
                            timeout_secs: budget.as_secs(),
                        };
                        warn!(query = %query, error = %e, "search query timed out");
                        Vec::new()
                    }
                }
            }
        });

        let per_query = join_all(calls).await;

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for documents in per_query {
            for doc in documents {
                if seen.insert(normalize_url(&doc.url)) {
                    merged.push(doc);
                }
            }
        }

        debug!(
            queries = queries.len(),
            documents = merged.len(),
            "retrieval merged"
        );
        merged
    }
}

/// Dedup key for a document URL: lowercased scheme/host, no fragment, no
/// trailing slash. Unparseable URLs fall back to the trimmed raw string.
fn normalize_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            let mut s = parsed.to_string();
            while s.ends_with('/') {
                s.pop();
            }
            s
        }
        Err(_) => raw.trim().trim_end_matches('/').to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_core::errors::{BeaconResult, RetrievalError};

    struct ScriptedEngine;

    #[async_trait]
    impl SearchEngine for ScriptedEngine {
        async fn search(&self, query: &str, _engines: &[String]) -> BeaconResult<Vec<Document>> {
            match query {
                "a" => Ok(vec![
                    Document::new("one", "https://one.example/", "s1"),
                    Document::new("two", "https://two.example", "s2"),
                ]),
                "b" => Ok(vec![
                    // Same page as "one" modulo trailing slash and fragment.
                    Document::new("one-dup", "https://one.example#frag", "s1b"),
                    Document::new("three", "https://three.example", "s3"),
                ]),
                "fail" => Err(RetrievalError::SearchFailed {
                    reason: "engine down".into(),
                }
                .into()),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(vec![Document::new("late", "https://late.example", "")])
                }
                _ => Ok(vec![]),
            }
        }
    }

    fn client() -> RetrievalClient {
        RetrievalClient::new(Arc::new(ScriptedEngine), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn merges_in_submission_order_and_dedups() {
        let docs = client()
            .retrieve(&["a".into(), "b".into()], &[])
            .await;
        let urls: Vec<&str> = docs.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://one.example/",
                "https://two.example",
                "https://three.example"
            ]
        );
        // First occurrence wins.
        assert_eq!(docs[0].title, "one");
    }

    #[tokio::test]
    async fn failed_query_contributes_empty_set() {
        let docs = client()
            .retrieve(&["fail".into(), "a".into()], &[])
            .await;
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_query_is_cut_at_its_own_timeout() {
        let docs = client()
            .retrieve(&["slow".into(), "a".into()], &[])
            .await;
        // The slow query's budget elapsed; the fast one still delivered.
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.title != "late"));
    }

    #[tokio::test]
    async fn all_queries_failing_yields_empty_not_error() {
        let docs = client()
            .retrieve(&["fail".into(), "fail".into()], &[])
            .await;
        assert!(docs.is_empty());
    }

    #[test]
    fn url_normalization_strips_fragment_and_slash() {
        assert_eq!(
            normalize_url("https://one.example/#frag"),
            normalize_url("https://one.example")
        );
        assert_eq!(normalize_url("not a url /"), "not a url");
    }
}
