//! # Research Tools
//!
//! Rate-limited clients for the two external legal-data sources.
//!
//! ```text
//! Sub-agent ──▶ StatuteClient ──▶ TokenBucket ──▶ StatuteBackend (LegInfo)
//! Sub-agent ──▶ CaseLawClient ──▶ TokenBucket ──▶ CaseLawBackend (CourtListener)
//! ```
//!
//! ## Modules
//!
//! - `rate_limit` - Token bucket shared by all callers of one source
//! - `statutes` - Statute backend contract, section cache, bounded statute client
//! - `caselaw` - Case-law backend contract, bounded case-law client
//! - `leginfo` - HTTP statute backend
//! - `courtlistener` - HTTP case-law backend
//!
//! Every client call waits on its bucket, then runs under a fixed timeout.
//! Transient failures become empty results; only [`SourceError::Unauthorized`]
//! escapes a client.

pub mod caselaw;
pub mod courtlistener;
pub mod leginfo;
pub mod rate_limit;
pub mod statutes;

pub use caselaw::{CaseHit, CaseLawBackend, CaseLawClient, OpinionDetail};
pub use courtlistener::CourtListenerBackend;
pub use leginfo::LegInfoBackend;
pub use rate_limit::TokenBucket;
pub use statutes::{SectionCache, StatuteBackend, StatuteClient, StatuteHit, StatuteSection};

use regex::Regex;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

pub(crate) const USER_AGENT: &str = "casebrief/0.1 (legal research tool)";

/// Failure reported by a source backend
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// Missing or rejected credential. Fatal for the calling sub-agent.
    #[error("{source_name} rejected credentials: {message}")]
    Unauthorized {
        source_name: &'static str,
        message: String,
    },
    /// Network error, timeout or non-2xx response
    #[error("{source_name} request failed: {message}")]
    Transient {
        source_name: &'static str,
        message: String,
    },
}

impl SourceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Unauthorized { .. })
    }
}

/// Run one backend call under `timeout`, classifying the outcome.
///
/// `Ok(Some(_))` is a definitive answer, `Ok(None)` means a transient failure was
/// logged and absorbed, `Err` is fatal.
pub(crate) async fn guarded<T, F>(
    source_name: &'static str,
    operation: &str,
    timeout: Duration,
    call: F,
) -> Result<Option<T>, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(Some(value)),
        Ok(Err(err)) if err.is_fatal() => Err(err),
        Ok(Err(err)) => {
            tracing::warn!(source = source_name, operation, error = %err, "treating as zero results");
            Ok(None)
        }
        Err(_) => {
            tracing::warn!(
                source = source_name,
                operation,
                timeout_secs = timeout.as_secs_f64(),
                "call timed out, treating as zero results"
            );
            Ok(None)
        }
    }
}

/// Render an HTML fragment as plain text: scripts dropped, block breaks kept as
/// newlines, common entities decoded, blank lines removed.
pub(crate) fn html_to_text(html: &str) -> String {
    static SCRIPTS: OnceLock<Option<Regex>> = OnceLock::new();
    static BREAKS: OnceLock<Option<Regex>> = OnceLock::new();
    static TAGS: OnceLock<Option<Regex>> = OnceLock::new();

    let scripts = SCRIPTS.get_or_init(|| Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>").ok());
    let breaks = BREAKS.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr)>").ok());
    let tags = TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").ok());

    let mut text = html.to_string();
    for (re, replacement) in [(scripts, ""), (breaks, "\n"), (tags, "")] {
        if let Some(re) = re {
            text = re.replace_all(&text, replacement).into_owned();
        }
    }
    let text = text
        .replace("&nbsp;", " ")
        .replace("&sect;", "§")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
