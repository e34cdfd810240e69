//! arXiv catalog, backed by the Atom query API.
//!
//! `GET {base}/api/query?search_query=all:w1 AND all:w2&max_results=N`
//! returns an Atom feed with one `<entry>` per paper. Identifiers are
//! normalized to `arXiv:<id>` without the version suffix so they match
//! the arXiv identifiers other catalogs expose.

use async_trait::async_trait;
use chrono::NaiveDate;
use paperweek_core::models::PaperRecord;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::{collapse_whitespace, Catalog};
use crate::error::SourceError;
use crate::http::truncate_body;

const NAME: &str = "arxiv";
const SOURCE_LABEL: &str = "arXiv";

pub struct ArxivCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivCatalog {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Catalog for ArxivCatalog {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, topic: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let query = build_query(topic);
        if query.is_empty() {
            return Err(SourceError::InvalidQuery("topic must not be empty".to_string()));
        }
        let url = format!("{}/api/query", self.base_url);
        debug!(url = %url, query = %query, "querying arXiv");

        let max_results = limit.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("search_query", query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Unreachable {
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

        let mut records = parse_feed(&body).map_err(|message| SourceError::Malformed {
            catalog: NAME.to_string(),
            message,
        })?;
        records.truncate(limit);
        Ok(records)
    }
}

/// `quantum computing` becomes `all:quantum AND all:computing`.
fn build_query(topic: &str) -> String {
    topic
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| c == '"' || c == '(' || c == ')'))
        .filter(|word| !word.is_empty())
        .map(|word| format!("all:{}", word))
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
}

#[derive(Default)]
struct EntryDraft {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    link: Option<String>,
}

impl EntryDraft {
    fn finish(self) -> Result<Option<PaperRecord>, String> {
        let abs_url = self.id.trim();
        if abs_url.contains("/api/errors") {
            return Err(format!("query rejected: {}", collapse_whitespace(&self.summary)));
        }
        let title = collapse_whitespace(&self.title);
        let Some(raw_id) = abs_url.split_once("/abs/").map(|(_, id)| id) else {
            return Ok(None);
        };
        if title.is_empty() || raw_id.is_empty() {
            return Ok(None);
        }

        let published = self
            .published
            .trim()
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        Ok(Some(PaperRecord {
            id: format!("arXiv:{}", strip_version(raw_id)),
            title,
            summary: collapse_whitespace(&self.summary),
            authors: self.authors,
            source: SOURCE_LABEL.to_string(),
            published,
            url: self.link.unwrap_or_else(|| abs_url.to_string()),
        }))
    }
}

/// `2401.01234v2` becomes `2401.01234`.
fn strip_version(id: &str) -> &str {
    match id.rfind('v') {
        Some(pos)
            if pos > 0 && pos + 1 < id.len() && id[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &id[..pos]
        }
        _ => id,
    }
}

fn alternate_link(e: &BytesStart) -> Option<String> {
    let mut rel = None;
    let mut href = None;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value().ok()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"rel" => rel = Some(value),
            b"href" => href = Some(value),
            _ => {}
        }
    }
    match rel.as_deref() {
        Some("alternate") | None => href,
        _ => None,
    }
}

/// Parse an arXiv Atom feed into records, in feed order.
pub fn parse_feed(xml: &str) -> Result<Vec<PaperRecord>, String> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut records = Vec::new();
    let mut entry: Option<EntryDraft> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => entry = Some(EntryDraft::default()),
                b"author" => in_author = true,
                b"link" => {
                    if let Some(draft) = entry.as_mut() {
                        if draft.link.is_none() {
                            draft.link = alternate_link(&e);
                        }
                    }
                }
                name if entry.is_some() => {
                    field = match name {
                        b"id" => Some(Field::Id),
                        b"title" => Some(Field::Title),
                        b"summary" => Some(Field::Summary),
                        b"published" => Some(Field::Published),
                        b"name" if in_author => Some(Field::AuthorName),
                        _ => None,
                    };
                    if field == Some(Field::AuthorName) {
                        if let Some(draft) = entry.as_mut() {
                            draft.authors.push(String::new());
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"link" {
                    if let Some(draft) = entry.as_mut() {
                        if draft.link.is_none() {
                            draft.link = alternate_link(&e);
                        }
                    }
                }
            }
            Ok(Event::Text(te)) => {
                let text = te.unescape().map_err(|e| e.to_string())?;
                append(entry.as_mut(), field, &text);
            }
            Ok(Event::CData(cd)) => {
                let raw = cd.into_inner();
                append(entry.as_mut(), field, &String::from_utf8_lossy(&raw));
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(draft) = entry.take() {
                        if let Some(record) = draft.finish()? {
                            records.push(record);
                        }
                    }
                    field = None;
                }
                b"author" => {
                    in_author = false;
                    field = None;
                }
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

fn append(entry: Option<&mut EntryDraft>, field: Option<Field>, text: &str) {
    let (Some(draft), Some(field)) = (entry, field) else {
        return;
    };
    let target = match field {
        Field::Id => &mut draft.id,
        Field::Title => &mut draft.title,
        Field::Summary => &mut draft.summary,
        Field::Published => &mut draft.published,
        Field::AuthorName => match draft.authors.last_mut() {
            Some(name) => name,
            None => return,
        },
    };
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=all:quantum</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2401.01234v2</id>
    <updated>2024-01-20T10:00:00Z</updated>
    <published>2024-01-15T18:59:59Z</published>
    <title>Error-Corrected Logical Qubits
      at Scale</title>
    <summary>  We demonstrate logical qubits &amp; below-threshold
      error rates.
    </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name><arxiv:affiliation>Bletchley</arxiv:affiliation></author>
    <link href="http://arxiv.org/abs/2401.01234v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2401.01234v2" rel="related"
          type="application/pdf"/>
    <arxiv:primary_category term="quant-ph" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/hep-th/9901001v1</id>
    <published>1999-01-01T00:00:00Z</published>
    <title>Old Style Identifier</title>
    <summary>Strings.</summary>
    <author><name>Ed Witten</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let records = parse_feed(FEED).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.id, "arXiv:2401.01234");
        assert_eq!(first.title, "Error-Corrected Logical Qubits at Scale");
        assert_eq!(
            first.summary,
            "We demonstrate logical qubits & below-threshold error rates."
        );
        assert_eq!(first.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(first.source, "arXiv");
        assert_eq!(first.published, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(first.url, "http://arxiv.org/abs/2401.01234v2");

        let second = &records[1];
        assert_eq!(second.id, "arXiv:hep-th/9901001");
        // No link element: falls back to the abstract URL.
        assert_eq!(second.url, "http://arxiv.org/abs/hep-th/9901001v1");
    }

    #[test]
    fn test_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn test_error_entry() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
            <id>http://arxiv.org/api/errors#incorrect_id_format</id>
            <title>Error</title>
            <summary>incorrect id format</summary>
        </entry></feed>"#;
        let err = parse_feed(xml).unwrap_err();
        assert!(err.contains("incorrect id format"));
    }

    #[test]
    fn test_build_query() {
        assert_eq!(build_query("quantum computing"), "all:quantum AND all:computing");
        assert_eq!(build_query("  \"error\"  "), "all:error");
        assert_eq!(build_query("   "), "");
    }

    #[test]
    fn test_strip_version() {
        assert_eq!(strip_version("2401.01234v12"), "2401.01234");
        assert_eq!(strip_version("2401.01234"), "2401.01234");
        assert_eq!(strip_version("solv-int/9901001v1"), "solv-int/9901001");
        assert_eq!(strip_version("solv-int/9901001"), "solv-int/9901001");
    }

    #[tokio::test]
    async fn test_search_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded(
                    "search_query".into(),
                    "all:quantum AND all:computing".into(),
                ),
                mockito::Matcher::UrlEncoded("max_results".into(), "1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(FEED)
            .create_async()
            .await;

        let catalog = ArxivCatalog::new(reqwest::Client::new(), &server.url());
        let records = catalog.search("quantum computing", 1).await.unwrap();
        assert_eq!(records.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _limited = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(429)
            .create_async()
            .await;
        let catalog = ArxivCatalog::new(reqwest::Client::new(), &server.url());
        let err = catalog.search("quantum", 5).await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimited { .. }));

        let mut server = mockito::Server::new_async().await;
        let _down = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;
        let catalog = ArxivCatalog::new(reqwest::Client::new(), &server.url());
        let err = catalog.search("quantum", 5).await.unwrap_err();
        assert!(matches!(err, SourceError::Http { status: 503, .. }));
    }
}
