//! # Statute Client
//!
//! Bounded, rate-limited access to the statute source, with a process-lifetime
//! cache of definitive section lookups.

use super::{guarded, SourceError, TokenBucket};
use crate::legal::StatuteKey;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const SOURCE_NAME: &str = "leginfo";

/// Full text of one statute section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatuteSection {
    pub code: String,
    pub section: String,
    pub title: String,
    pub full_text: String,
    pub url: String,
}

impl StatuteSection {
    pub fn key(&self) -> StatuteKey {
        StatuteKey::new(&self.code, &self.section)
    }
}

/// Lightweight keyword-search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatuteHit {
    pub code: String,
    pub section: String,
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl StatuteHit {
    pub fn key(&self) -> StatuteKey {
        StatuteKey::new(&self.code, &self.section)
    }
}

/// Network side of the statute source
#[async_trait]
pub trait StatuteBackend: Send + Sync {
    /// Fetch one section; `Ok(None)` when the source has no such section.
    async fn fetch_section(
        &self,
        code: &str,
        section: &str,
    ) -> Result<Option<StatuteSection>, SourceError>;

    /// Keyword search returning at most `max_results` hits
    async fn keyword_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<StatuteHit>, SourceError>;
}

/// Process-lifetime cache of section lookups keyed by natural identity.
///
/// Holds both found sections and confirmed misses. No eviction: growth across
/// many runs is unbounded until [`SectionCache::clear`].
#[derive(Debug, Default)]
pub struct SectionCache {
    entries: Mutex<HashMap<StatuteKey, Option<StatuteSection>>>,
}

impl SectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` = not cached; `Some(None)` = cached miss
    pub fn get(&self, key: &StatuteKey) -> Option<Option<StatuteSection>> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: StatuteKey, value: Option<StatuteSection>) {
        self.entries.lock().insert(key, value);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Rate-limited statute client shared by all statute sub-agents
pub struct StatuteClient {
    backend: Arc<dyn StatuteBackend>,
    limiter: TokenBucket,
    cache: SectionCache,
    call_timeout: Duration,
    max_results: usize,
}

impl StatuteClient {
    pub fn new(
        backend: Arc<dyn StatuteBackend>,
        limiter: TokenBucket,
        call_timeout: Duration,
        max_results: usize,
    ) -> Self {
        Self {
            backend,
            limiter,
            cache: SectionCache::new(),
            call_timeout,
            max_results: max_results.max(1),
        }
    }

    pub fn cache(&self) -> &SectionCache {
        &self.cache
    }

    /// Look up a section by identity. Cached answers skip the rate limiter.
    pub async fn fetch_section(
        &self,
        code: &str,
        section: &str,
    ) -> Result<Option<StatuteSection>, SourceError> {
        let key = StatuteKey::new(code, section);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        self.limiter.acquire().await;
        let outcome = guarded(
            SOURCE_NAME,
            "fetch_section",
            self.call_timeout,
            self.backend.fetch_section(&key.code, &key.section),
        )
        .await?;

        match outcome {
            Some(found) => {
                self.cache.insert(key, found.clone());
                Ok(found)
            }
            // Transient failures are not cached
            None => Ok(None),
        }
    }

    /// Keyword search capped at the client's configured result count
    pub async fn keyword_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<StatuteHit>, SourceError> {
        let limit = max_results.min(self.max_results);
        self.limiter.acquire().await;
        let mut hits = guarded(
            SOURCE_NAME,
            "keyword_search",
            self.call_timeout,
            self.backend.keyword_search(query, limit),
        )
        .await?
        .unwrap_or_default();
        hits.truncate(limit);
        Ok(hits)
    }
}
