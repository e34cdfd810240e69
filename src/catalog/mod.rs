//! Paper catalogs and the multi-catalog fetch.
//!
//! A [`Catalog`] searches one external source for a topic and returns
//! normalized [`PaperRecord`]s in the source's own relevance order.
//! [`fetch_papers`] queries every configured catalog in turn, tolerates
//! individual failures, deduplicates and caps the merged list.
//!
//! # Failure policy
//!
//! | Outcome | Result |
//! |---------|--------|
//! | some catalogs fail | failures logged and reported in [`FetchReport::failures`] |
//! | every catalog fails | [`SourceError::AllUnavailable`] |
//! | catalogs answer but nothing is found | [`SourceError::NoPapers`] |

pub mod arxiv;
pub mod semantic_scholar;

use std::collections::HashSet;

use async_trait::async_trait;
use paperweek_core::models::PaperRecord;
use tracing::{info, warn};

use crate::config::{CatalogKind, Config, MAX_PAPERS_CAP};
use crate::error::SourceError;

/// A searchable paper catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Human-readable catalog name, used in logs and errors.
    fn name(&self) -> &str;

    /// Return up to `limit` papers for `topic`, most relevant first.
    async fn search(&self, topic: &str, limit: usize) -> Result<Vec<PaperRecord>, SourceError>;
}

/// Outcome of [`fetch_papers`].
#[derive(Debug)]
pub struct FetchReport {
    /// Deduplicated records, at most `max_papers`.
    pub papers: Vec<PaperRecord>,
    /// Catalogs that failed while at least one other succeeded.
    pub failures: Vec<SourceError>,
    /// Records dropped as duplicates.
    pub duplicates: usize,
}

/// Instantiate the catalogs enabled in `config`, in configured order.
pub fn create_catalogs(config: &Config, client: &reqwest::Client) -> Vec<Box<dyn Catalog>> {
    config
        .catalogs
        .iter()
        .map(|kind| -> Box<dyn Catalog> {
            match kind {
                CatalogKind::Arxiv => Box::new(arxiv::ArxivCatalog::new(
                    client.clone(),
                    &config.catalog.arxiv_url,
                )),
                CatalogKind::SemanticScholar => {
                    Box::new(semantic_scholar::SemanticScholarCatalog::new(
                        client.clone(),
                        &config.catalog.semantic_scholar_url,
                        config.catalog.semantic_scholar_api_key.clone(),
                    ))
                }
            }
        })
        .collect()
}

/// Query each catalog for `topic` and merge the results.
///
/// Each catalog is asked for `max(1, max_papers / catalogs)` records; the
/// merged list is deduplicated by identifier and normalized title, then
/// truncated to `max_papers` (itself capped at [`MAX_PAPERS_CAP`]).
pub async fn fetch_papers(
    catalogs: &[Box<dyn Catalog>],
    topic: &str,
    max_papers: usize,
) -> Result<FetchReport, SourceError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(SourceError::InvalidQuery("topic must not be empty".to_string()));
    }
    if max_papers == 0 {
        return Err(SourceError::InvalidQuery(
            "maximum paper count must be positive".to_string(),
        ));
    }
    if catalogs.is_empty() {
        return Err(SourceError::InvalidQuery("no catalogs configured".to_string()));
    }

    let max_papers = max_papers.min(MAX_PAPERS_CAP);
    let per_catalog = (max_papers / catalogs.len()).max(1);

    let mut fetched = Vec::new();
    let mut failures = Vec::new();

    for catalog in catalogs {
        info!(catalog = catalog.name(), limit = per_catalog, "searching catalog");
        match catalog.search(topic, per_catalog).await {
            Ok(records) => {
                info!(catalog = catalog.name(), found = records.len(), "catalog answered");
                fetched.extend(records);
            }
            Err(e) => {
                warn!(
                    catalog = catalog.name(),
                    error = %e,
                    "catalog failed; continuing without it"
                );
                failures.push(e);
            }
        }
    }

    if failures.len() == catalogs.len() {
        let summary = failures
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(SourceError::AllUnavailable(summary));
    }

    let total = fetched.len();
    let mut papers = dedupe(fetched);
    let duplicates = total - papers.len();
    papers.truncate(max_papers);

    if papers.is_empty() {
        return Err(SourceError::NoPapers(topic.to_string()));
    }

    Ok(FetchReport {
        papers,
        failures,
        duplicates,
    })
}

/// Keep the first occurrence of each identifier and each normalized title.
pub fn dedupe(records: Vec<PaperRecord>) -> Vec<PaperRecord> {
    let mut ids = HashSet::new();
    let mut titles = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let new_id = ids.insert(r.id.clone());
            let new_title = titles.insert(r.title_key());
            new_id && new_title
        })
        .collect()
}

/// Collapse runs of whitespace, as catalog text often carries hard wraps.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
