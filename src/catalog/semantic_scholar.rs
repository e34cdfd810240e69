//! Semantic Scholar catalog, backed by the Graph API paper search.
//!
//! Papers with an arXiv external id are identified as `arXiv:<id>` so they
//! deduplicate against arXiv results; others keep their Semantic Scholar
//! paper id. A missing publication date falls back to January 1 of the
//! publication year.

use async_trait::async_trait;
use chrono::NaiveDate;
use paperweek_core::models::PaperRecord;
use serde::Deserialize;
use tracing::debug;

use super::{collapse_whitespace, Catalog};
use crate::error::SourceError;
use crate::http::truncate_body;

const NAME: &str = "semantic_scholar";
const SOURCE_LABEL: &str = "Semantic Scholar";
const FIELDS: &str = "title,abstract,authors,year,publicationDate,url,externalIds";

pub struct SemanticScholarCatalog {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarCatalog {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    paper_id: String,
    title: Option<String>,
    #[serde(rename = "abstract")]
    summary: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    year: Option<i32>,
    publication_date: Option<String>,
    url: Option<String>,
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

impl Paper {
    fn into_record(self) -> Option<PaperRecord> {
        let title = collapse_whitespace(self.title.as_deref().unwrap_or_default());
        if title.is_empty() || self.paper_id.is_empty() {
            return None;
        }

        let id = match self.external_ids.and_then(|ids| ids.arxiv) {
            Some(arxiv) if !arxiv.trim().is_empty() => format!("arXiv:{}", arxiv.trim()),
            _ => self.paper_id.clone(),
        };
        let published = self
            .publication_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .or_else(|| self.year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)));
        let url = self
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("https://www.semanticscholar.org/paper/{}", self.paper_id));

        Some(PaperRecord {
            id,
            title,
            summary: collapse_whitespace(self.summary.as_deref().unwrap_or_default()),
            authors: self
                .authors
                .into_iter()
                .filter_map(|a| a.name)
                .filter(|n| !n.trim().is_empty())
                .collect(),
            source: SOURCE_LABEL.to_string(),
            published,
            url,
        })
    }
}

/// Parse a `/graph/v1/paper/search` response body into records.
pub fn parse_search_response(body: &str) -> Result<Vec<PaperRecord>, String> {
    let resp: SearchResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;
    Ok(resp.data.into_iter().filter_map(Paper::into_record).collect())
}

#[async_trait]
impl Catalog for SemanticScholarCatalog {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, topic: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SourceError::InvalidQuery("topic must not be empty".to_string()));
        }
        let url = format!("{}/graph/v1/paper/search", self.base_url);
        debug!(url = %url, topic, "querying Semantic Scholar");

        let limit_param = limit.to_string();
        let mut req = self.client.get(&url).query(&[
            ("query", topic),
            ("limit", limit_param.as_str()),
            ("fields", FIELDS),
        ]);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = req.send().await.map_err(|e| SourceError::Unreachable {
            catalog: NAME.to_string(),
            message: e.to_string(),
        })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(SourceError::RateLimited {
                catalog: NAME.to_string(),
            });
        }
        let body = resp.text().await.map_err(|e| SourceError::Unreachable {
            catalog: NAME.to_string(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(SourceError::Http {
                catalog: NAME.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let mut records = parse_search_response(&body).map_err(|message| SourceError::Malformed {
            catalog: NAME.to_string(),
            message,
        })?;
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "total": 3,
        "offset": 0,
        "data": [
            {
                "paperId": "abc123",
                "title": "Error-Corrected Logical Qubits at Scale",
                "abstract": "We demonstrate\n logical qubits.",
                "authors": [
                    {"authorId": "1", "name": "Ada Lovelace"},
                    {"authorId": null, "name": null}
                ],
                "year": 2024,
                "publicationDate": "2024-01-15",
                "url": "https://www.semanticscholar.org/paper/abc123",
                "externalIds": {"ArXiv": "2401.01234", "DOI": "10.1/x"}
            },
            {
                "paperId": "def456",
                "title": "A Journal Paper",
                "abstract": null,
                "authors": [],
                "year": 2019,
                "publicationDate": null,
                "url": null,
                "externalIds": {"DOI": "10.2/y"}
            },
            {
                "paperId": "ghi789",
                "title": null
            }
        ]
    }"#;

    #[test]
    fn test_parse_search_response() {
        let records = parse_search_response(BODY).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.id, "arXiv:2401.01234");
        assert_eq!(first.summary, "We demonstrate logical qubits.");
        assert_eq!(first.authors, vec!["Ada Lovelace"]);
        assert_eq!(first.published, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(first.source, "Semantic Scholar");

        let second = &records[1];
        assert_eq!(second.id, "def456");
        assert_eq!(second.summary, "");
        assert_eq!(second.published, NaiveDate::from_ymd_opt(2019, 1, 1));
        assert_eq!(second.url, "https://www.semanticscholar.org/paper/def456");
    }

    #[test]
    fn test_missing_data_is_empty() {
        assert!(parse_search_response(r#"{"total": 0}"#).unwrap().is_empty());
        assert!(parse_search_response("not json").is_err());
    }

    #[tokio::test]
    async fn test_search_sends_key_and_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/graph/v1/paper/search")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("query".into(), "quantum computing".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "7".into()),
            ]))
            .match_header("x-api-key", "s2-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create_async()
            .await;

        let catalog = SemanticScholarCatalog::new(
            reqwest::Client::new(),
            &server.url(),
            Some("s2-key".to_string()),
        );
        let records = catalog.search("quantum computing", 7).await.unwrap();
        assert_eq!(records.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(429)
            .with_body(r#"{"message": "Too Many Requests"}"#)
            .create_async()
            .await;

        let catalog = SemanticScholarCatalog::new(reqwest::Client::new(), &server.url(), None);
        let err = catalog.search("quantum", 5).await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let catalog = SemanticScholarCatalog::new(reqwest::Client::new(), &server.url(), None);
        let err = catalog.search("quantum", 5).await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
