//! SearXNG-compatible search engine client.
//!
//! `GET {endpoint}/search?format=json&q=...` with optional engine and
//! language restriction. Result shapes vary by backend engine; everything
//! is normalized into `Document`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use beacon_core::errors::{BeaconResult, RetrievalError};
use beacon_core::models::Document;
use beacon_core::traits::SearchEngine;

/// HTTP client for one SearXNG endpoint.
#[derive(Debug, Clone)]
pub struct SearxngEngine {
    http: reqwest::Client,
    endpoint: String,
    language: Option<String>,
}

/// Raw SearXNG result row. Image fields differ per backend engine.
#[derive(Debug, Deserialize)]
struct RawResult {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
    img_src: Option<String>,
    thumbnail_src: Option<String>,
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RawResult>,
}

impl SearxngEngine {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    fn normalize(raw: RawResult) -> Option<Document> {
        let url = raw.url?;
        if url.is_empty() {
            return None;
        }
        Some(Document {
            title: raw.title.unwrap_or_default(),
            url,
            snippet: raw.content.unwrap_or_default(),
            image_url: raw.img_src.or(raw.thumbnail_src).or(raw.thumbnail),
        })
    }
}

#[async_trait]
impl SearchEngine for SearxngEngine {
    async fn search(&self, query: &str, engines: &[String]) -> BeaconResult<Vec<Document>> {
        let mut params: Vec<(&str, String)> =
            vec![("format", "json".to_string()), ("q", query.to_string())];
        if !engines.is_empty() {
            params.push(("engines", engines.join(",")));
        }
        if let Some(lang) = &self.language {
            params.push(("language", lang.clone()));
        }

        let response = self
            .http
            .get(format!("{}/search", self.endpoint))
            .query(&params)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| RetrievalError::SearchFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::SearchFailed {
                reason: format!("search returned {status}"),
            }
            .into());
        }

        let parsed: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| RetrievalError::SearchFailed {
                    reason: format!("malformed search payload: {e}"),
                })?;

        let documents: Vec<Document> = parsed
            .results
            .into_iter()
            .filter_map(Self::normalize)
            .collect();
        debug!(query, count = documents.len(), "search returned");
        Ok(documents)
    }
}
