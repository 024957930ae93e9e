//! # Case-Law Client
//!
//! Rate-limited access to the case-law source. Every call waits on the shared bucket.

use super::{guarded, SourceError, TokenBucket};
use crate::legal::CaseKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const SOURCE_NAME: &str = "courtlistener";

/// One search hit (an opinion cluster)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseHit {
    pub cluster_id: u64,
    /// Lead opinion, when the source returned one
    pub opinion_id: Option<u64>,
    pub case_name: String,
    pub court: String,
    pub date_filed: String,
    pub citation: String,
    pub snippet: String,
    /// Path relative to the source's public site
    pub absolute_url: String,
}

impl CaseHit {
    pub fn key(&self) -> CaseKey {
        CaseKey::new(&self.case_name, &self.date_filed)
    }
}

/// Full opinion record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionDetail {
    pub opinion_id: u64,
    pub cluster_id: u64,
    pub opinion_text: String,
    pub absolute_url: String,
}

/// Network side of the case-law source
#[async_trait]
pub trait CaseLawBackend: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<CaseHit>, SourceError>;

    /// `Ok(None)` when the opinion does not exist
    async fn fetch_opinion(&self, opinion_id: u64) -> Result<Option<OpinionDetail>, SourceError>;
}

/// Rate-limited case-law client shared by all case-law sub-agents
pub struct CaseLawClient {
    backend: Arc<dyn CaseLawBackend>,
    limiter: TokenBucket,
    call_timeout: Duration,
    max_results: usize,
}

impl CaseLawClient {
    pub fn new(
        backend: Arc<dyn CaseLawBackend>,
        limiter: TokenBucket,
        call_timeout: Duration,
        max_results: usize,
    ) -> Self {
        Self {
            backend,
            limiter,
            call_timeout,
            max_results: max_results.max(1),
        }
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<CaseHit>, SourceError> {
        let limit = max_results.min(self.max_results);
        self.limiter.acquire().await;
        let mut hits = guarded(
            SOURCE_NAME,
            "search",
            self.call_timeout,
            self.backend.search(query, limit),
        )
        .await?
        .unwrap_or_default();
        hits.truncate(limit);
        Ok(hits)
    }

    pub async fn fetch_opinion(&self, opinion_id: u64) -> Result<Option<OpinionDetail>, SourceError> {
        self.limiter.acquire().await;
        Ok(guarded(
            SOURCE_NAME,
            "fetch_opinion",
            self.call_timeout,
            self.backend.fetch_opinion(opinion_id),
        )
        .await?
        .flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCaseLawBackend;

    fn client(backend: Arc<FakeCaseLawBackend>) -> CaseLawClient {
        CaseLawClient::new(backend, TokenBucket::unlimited(), Duration::from_secs(5), 5)
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal() {
        let backend = Arc::new(FakeCaseLawBackend::new().unauthorized());
        let client = client(Arc::clone(&backend));

        let err = client.search("negligence", 5).await.unwrap_err();
        assert!(err.is_fatal());
        let err = client.fetch_opinion(1).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_transient_failure_is_zero_results() {
        let backend = Arc::new(FakeCaseLawBackend::new().failing_transiently());
        let client = client(Arc::clone(&backend));

        assert_eq!(client.search("negligence", 5).await, Ok(vec![]));
        assert_eq!(client.fetch_opinion(1).await, Ok(None));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_search_and_fetch() {
        let backend = Arc::new(
            FakeCaseLawBackend::new()
                .with_case("Rowland v. Christian", "1968-08-08", "duty of care")
                .with_case("Li v. Yellow Cab Co.", "1975-03-31", "comparative fault"),
        );
        let client = client(Arc::clone(&backend));

        let hits = client.search("negligence", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        let opinion_id = hits[0].opinion_id.unwrap();
        let opinion = client.fetch_opinion(opinion_id).await.unwrap().unwrap();
        assert!(opinion.opinion_text.contains("duty of care"));
        assert_eq!(client.fetch_opinion(9_999).await, Ok(None));
    }
}
