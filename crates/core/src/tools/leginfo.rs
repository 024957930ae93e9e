//! # LegInfo Backend
//!
//! Statute backend over the California Legislative Information site. Section pages
//! are fetched by `lawCode`/`sectionNum`; keyword search reads the text-search page
//! and pulls section references out of its result links.

use super::statutes::{StatuteBackend, StatuteHit, StatuteSection, SOURCE_NAME};
use super::{html_to_text, SourceError, USER_AGENT};
use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use std::sync::OnceLock;
use std::time::Duration;

const BASE_URL: &str = "https://leginfo.legislature.ca.gov";
const SNIPPET_CHARS: usize = 500;

/// Ids/classes of the element that holds a section's text, in preference order
const SECTION_BODY_MARKERS: &[&str] = &["codeLaw", "manylawsections", "law-section-body"];

pub struct LegInfoBackend {
    http: reqwest::Client,
    base_url: String,
}

impl LegInfoBackend {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn section_url(&self, code: &str, section: &str) -> String {
        format!(
            "{}/faces/codes_displaySection.xhtml?sectionNum={}&lawCode={}",
            self.base_url,
            urlencoding::encode(section),
            urlencoding::encode(code)
        )
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/faces/codes_displayText.xhtml?lawCode=ALL&keyword={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    /// GET a page; `Ok(None)` on 404
    async fn get_page(&self, url: &str) -> Result<Option<String>, SourceError> {
        let response = self.http.get(url).send().await.map_err(transient)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SourceError::Transient {
                source_name: SOURCE_NAME,
                message: format!("HTTP {} for {}", status, url),
            });
        }
        response.text().await.map(Some).map_err(transient)
    }
}

fn transient(err: reqwest::Error) -> SourceError {
    SourceError::Transient {
        source_name: SOURCE_NAME,
        message: err.to_string(),
    }
}

#[async_trait]
impl StatuteBackend for LegInfoBackend {
    async fn fetch_section(
        &self,
        code: &str,
        section: &str,
    ) -> Result<Option<StatuteSection>, SourceError> {
        let url = self.section_url(code, section);
        let Some(html) = self.get_page(&url).await? else {
            return Ok(None);
        };
        let parsed = parse_section_page(&html, code, section, &url);
        if parsed.is_none() {
            tracing::debug!(code, section, "section page had no statute text");
        }
        Ok(parsed)
    }

    async fn keyword_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<StatuteHit>, SourceError> {
        let url = self.search_url(query);
        let Some(html) = self.get_page(&url).await? else {
            return Ok(Vec::new());
        };
        Ok(parse_search_page(&html, &self.base_url, max_results))
    }
}

fn heading_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<[a-z0-9]+[^>]*class="[^"]*law-section-heading[^"]*"[^>]*>(.*?)</[a-z0-9]+>|<h3[^>]*>(.*?)</h3>"#).ok()
    })
    .as_ref()
}

fn section_link_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?is)<a\s[^>]*href="([^"]*codes_displaySection[^"]*)"[^>]*>(.*?)</a>"#).ok())
        .as_ref()
}

fn law_code_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"lawCode=(\w+)").ok()).as_ref()
}

fn section_num_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"sectionNum=([\d.]+)").ok()).as_ref()
}

/// End of the element opened at `start`, just past its matching close tag.
/// Nested elements of the same name are counted; an unclosed element runs to the end of the page.
fn element_end(html: &str, start: usize) -> usize {
    let name: String = html[start + 1..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if name.is_empty() {
        return html.len();
    }
    let open = format!("<{}", name);
    let close = format!("</{}", name);
    let ends_name = |rest: &str, len: usize| !rest[len..].starts_with(|c: char| c.is_ascii_alphanumeric());

    // ASCII lowercasing keeps byte offsets intact
    let lower = html.to_ascii_lowercase();
    let mut depth = 0usize;
    let mut pos = start;
    while let Some(offset) = lower[pos..].find('<') {
        let at = pos + offset;
        let rest = &lower[at..];
        if rest.starts_with(&close) && ends_name(rest, close.len()) {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return rest.find('>').map(|gt| at + gt + 1).unwrap_or(html.len());
            }
        } else if rest.starts_with(&open) && ends_name(rest, open.len()) {
            depth += 1;
        }
        pos = at + 1;
    }
    html.len()
}

/// Extract the statute text of a section page. `None` if the page has no section body.
fn parse_section_page(html: &str, code: &str, section: &str, url: &str) -> Option<StatuteSection> {
    let start = SECTION_BODY_MARKERS
        .iter()
        .find_map(|marker| html.find(marker))?;
    // Back up to the opening of the element carrying the marker
    let start = html[..start].rfind('<').unwrap_or(start);
    let end = element_end(html, start);
    let full_text = html_to_text(&html[start..end]);
    if full_text.is_empty() {
        return None;
    }

    let title = heading_regex()
        .and_then(|re| re.captures(html))
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| html_to_text(m.as_str()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("{} Section {}", code, section));

    Some(StatuteSection {
        code: code.to_string(),
        section: section.to_string(),
        title,
        full_text,
        url: url.to_string(),
    })
}

/// Pull `lawCode`/`sectionNum` pairs out of result links, in page order.
///
/// The snippet is the text between a link and the next one.
fn parse_search_page(html: &str, base_url: &str, max_results: usize) -> Vec<StatuteHit> {
    let Some(link_regex) = section_link_regex() else {
        return Vec::new();
    };
    let links: Vec<_> = link_regex.captures_iter(html).collect();
    let mut hits = Vec::new();

    for (idx, caps) in links.iter().enumerate() {
        if hits.len() >= max_results {
            break;
        }
        let (Some(whole), Some(href), Some(anchor)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let href = href.as_str().replace("&amp;", "&");
        let (Some(code), Some(section)) = (
            law_code_regex().and_then(|re| re.captures(&href)).and_then(|c| c.get(1)),
            section_num_regex().and_then(|re| re.captures(&href)).and_then(|c| c.get(1)),
        ) else {
            continue;
        };

        let title = html_to_text(anchor.as_str());
        let tail_end = links
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(html.len());
        let tail = html_to_text(&html[whole.end()..tail_end]);
        let snippet = if tail.is_empty() { title.clone() } else { tail };

        let url = if href.starts_with("http") {
            href.clone()
        } else {
            format!("{}/{}", base_url, href.trim_start_matches('/'))
        };

        hits.push(StatuteHit {
            code: code.as_str().to_string(),
            section: section.as_str().trim_end_matches('.').to_string(),
            title,
            snippet: snippet.chars().take(SNIPPET_CHARS).collect(),
            url,
        });
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTION_PAGE: &str = r#"
        <html><body>
        <div id="header">Navigation</div>
        <span class="law-section-heading">Assault defined</span>
        <div id="codeLawSectionNoHead">
          <h6>240.</h6>
          <p>An assault is an unlawful attempt, coupled with a present ability,
          to commit a violent injury on the person of another.</p>
        </div>
        </body></html>"#;

    const SEARCH_PAGE: &str = r#"
        <table>
          <tr><td><a href="codes_displaySection.xhtml?lawCode=PEN&amp;sectionNum=240.">PEN 240</a></td>
              <td>An assault is an unlawful attempt</td></tr>
          <tr><td><a href="/faces/codes_displaySection.xhtml?sectionNum=1714.&amp;lawCode=CIV">CIV 1714</a></td>
              <td>Everyone is responsible</td></tr>
          <tr><td><a href="codes_displaySection.xhtml?lawCode=VEH">broken link</a></td></tr>
        </table>"#;

    #[test]
    fn test_parse_section_page() {
        let section = parse_section_page(SECTION_PAGE, "PEN", "240", "http://x").unwrap();
        assert_eq!(section.title, "Assault defined");
        assert!(section.full_text.starts_with("240."));
        assert!(section.full_text.contains("present ability,"));
        assert!(!section.full_text.contains("Navigation"));
    }

    #[test]
    fn test_section_page_without_body_is_not_found() {
        assert!(parse_section_page("<html><body>No such section</body></html>", "PEN", "1", "u").is_none());
    }

    #[test]
    fn test_section_title_falls_back() {
        let html = r#"<div id="codeLawSectionNoHead">Text</div>"#;
        let section = parse_section_page(html, "CIV", "1714", "u").unwrap();
        assert_eq!(section.title, "CIV Section 1714");
    }

    #[test]
    fn test_section_text_stops_at_its_closing_tag() {
        let html = r#"
            <div id="codeLawSectionNoHead">
              <div><h6>240.</h6></div>
              <p>An assault is an unlawful attempt.</p>
            </div>
            <div id="footer">Home Accessibility | Privacy Policy | Contact Us</div>"#;
        let section = parse_section_page(html, "PEN", "240", "u").unwrap();
        assert_eq!(section.full_text, "240.\nAn assault is an unlawful attempt.");
    }

    #[test]
    fn test_unclosed_section_runs_to_end_of_page() {
        let html = r#"<div id="codeLawSectionNoHead"><p>Everyone is responsible.</p>"#;
        let start = html.find('<').unwrap();
        assert_eq!(element_end(html, start), html.len());
        let section = parse_section_page(html, "CIV", "1714", "u").unwrap();
        assert_eq!(section.full_text, "Everyone is responsible.");
    }

    #[test]
    fn test_patterns_compile() {
        assert!(heading_regex().is_some());
        assert!(section_link_regex().is_some());
        assert!(law_code_regex().is_some());
        assert!(section_num_regex().is_some());
    }

    #[test]
    fn test_parse_search_page() {
        let hits = parse_search_page(SEARCH_PAGE, BASE_URL, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!((hits[0].code.as_str(), hits[0].section.as_str()), ("PEN", "240"));
        assert_eq!(hits[0].snippet, "An assault is an unlawful attempt");
        assert_eq!((hits[1].code.as_str(), hits[1].section.as_str()), ("CIV", "1714"));
        assert!(hits[1].url.starts_with("https://leginfo.legislature.ca.gov/faces/"));
    }

    #[test]
    fn test_search_respects_max_results() {
        assert_eq!(parse_search_page(SEARCH_PAGE, BASE_URL, 1).len(), 1);
    }

    #[test]
    fn test_urls_are_encoded() {
        let backend = LegInfoBackend::with_base_url("http://local/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            backend.search_url("duty of care"),
            "http://local/faces/codes_displayText.xhtml?lawCode=ALL&keyword=duty%20of%20care"
        );
        assert!(backend.section_url("PEN", "240").ends_with("sectionNum=240&lawCode=PEN"));
    }
}
