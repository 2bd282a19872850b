use async_trait::async_trait;

use crate::errors::BeaconResult;
use crate::models::Document;

/// External search capability: "given a query, return documents".
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Run one search. `engines` restricts which backend engines the
    /// service queries; empty means the service default.
    async fn search(&self, query: &str, engines: &[String]) -> BeaconResult<Vec<Document>>;
}
