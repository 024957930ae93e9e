//! # CourtListener Backend
//!
//! Case-law backend over the CourtListener REST API (v4), restricted to the
//! California Supreme Court and Courts of Appeal. Token-authenticated.

use super::caselaw::{CaseHit, CaseLawBackend, OpinionDetail, SOURCE_NAME};
use super::{html_to_text, SourceError, USER_AGENT};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const BASE_URL: &str = "https://www.courtlistener.com/api/rest/v4";
const CALIFORNIA_COURTS: &str = "cal calctapp";
const MAX_PAGE_SIZE: usize = 20;
const SNIPPET_CHARS: usize = 1000;
const OPINION_CHARS: usize = 10_000;

pub struct CourtListenerBackend {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    cluster_id: u64,
    #[serde(default, rename = "caseName", alias = "case_name")]
    case_name: String,
    #[serde(default)]
    court: String,
    #[serde(default, rename = "dateFiled", alias = "date_filed")]
    date_filed: String,
    /// A single citation string or a list of them
    #[serde(default)]
    citation: Value,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    absolute_url: String,
    #[serde(default)]
    opinions: Vec<NestedOpinion>,
}

#[derive(Deserialize)]
struct NestedOpinion {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    snippet: String,
}

#[derive(Deserialize)]
struct OpinionResponse {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    cluster_id: u64,
    #[serde(default)]
    plain_text: String,
    #[serde(default)]
    html_with_citations: String,
    #[serde(default)]
    html: String,
    #[serde(default)]
    xml_harvard: String,
    #[serde(default)]
    absolute_url: String,
}

impl SearchResult {
    fn into_hit(self) -> CaseHit {
        let citation = match &self.citation {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .find_map(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        };
        let lead = self.opinions.first();
        let opinion_id = lead.and_then(|o| o.id);
        let snippet = lead
            .map(|o| o.snippet.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or(self.snippet);

        CaseHit {
            cluster_id: self.cluster_id,
            opinion_id,
            case_name: self.case_name,
            court: self.court,
            date_filed: self.date_filed,
            citation,
            snippet: snippet.chars().take(SNIPPET_CHARS).collect(),
            absolute_url: self.absolute_url,
        }
    }
}

impl OpinionResponse {
    fn into_detail(self) -> OpinionDetail {
        let raw = [
            self.plain_text,
            self.html_with_citations,
            self.html,
            self.xml_harvard,
        ]
        .into_iter()
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default();
        let text = if raw.contains('<') { html_to_text(&raw) } else { raw };

        OpinionDetail {
            opinion_id: self.id,
            cluster_id: self.cluster_id,
            opinion_text: text.chars().take(OPINION_CHARS).collect(),
            absolute_url: self.absolute_url,
        }
    }
}

impl CourtListenerBackend {
    pub fn new(token: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_base_url(BASE_URL, token, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// GET a JSON document; `Ok(None)` on 404
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, SourceError> {
        if self.token.trim().is_empty() {
            return Err(SourceError::Unauthorized {
                source_name: SOURCE_NAME,
                message: "COURTLISTENER_TOKEN is not set".to_string(),
            });
        }

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Token {}", self.token))
            .query(query)
            .send()
            .await
            .map_err(transient)?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::Unauthorized {
                source_name: SOURCE_NAME,
                message: format!("token rejected ({})", response.status()),
            }),
            StatusCode::NOT_FOUND => Ok(None),
            status if !status.is_success() => Err(SourceError::Transient {
                source_name: SOURCE_NAME,
                message: format!("HTTP {} for {}", status, path),
            }),
            _ => response.json().await.map(Some).map_err(transient),
        }
    }
}

fn transient(err: reqwest::Error) -> SourceError {
    SourceError::Transient {
        source_name: SOURCE_NAME,
        message: err.to_string(),
    }
}

#[async_trait]
impl CaseLawBackend for CourtListenerBackend {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<CaseHit>, SourceError> {
        let page_size = max_results.clamp(1, MAX_PAGE_SIZE);
        let params = [
            ("q", query.to_string()),
            ("court", CALIFORNIA_COURTS.to_string()),
            ("type", "o".to_string()),
            ("highlight", "on".to_string()),
            ("page_size", page_size.to_string()),
        ];
        let response: Option<SearchResponse> = self.get_json("/search/", &params).await?;
        Ok(response
            .map(|r| {
                r.results
                    .into_iter()
                    .take(max_results)
                    .map(SearchResult::into_hit)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_opinion(&self, opinion_id: u64) -> Result<Option<OpinionDetail>, SourceError> {
        let response: Option<OpinionResponse> = self
            .get_json(&format!("/opinions/{}/", opinion_id), &[])
            .await?;
        Ok(response.map(OpinionResponse::into_detail))
    }
}
