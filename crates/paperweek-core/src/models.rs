//! Core data models that flow through the pipeline.
//!
//! A [`PaperRecord`] is created once by a catalog adapter and never
//! mutated afterwards. Everything here lives for a single run.

use chrono::NaiveDate;

/// Normalized paper metadata produced by a catalog adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperRecord {
    /// Catalog identifier, e.g. `arXiv:2401.01234v1` or a Semantic Scholar paper id.
    pub id: String,
    pub title: String,
    /// Abstract text. May be empty when the catalog has none.
    pub summary: String,
    pub authors: Vec<String>,
    /// Catalog that produced the record (`"arXiv"`, `"Semantic Scholar"`).
    pub source: String,
    pub published: Option<NaiveDate>,
    pub url: String,
}

impl PaperRecord {
    /// Lowercased, whitespace-collapsed title used as the cross-catalog
    /// deduplication key.
    pub fn title_key(&self) -> String {
        normalize_title(&self.title)
    }

    /// The enriched text block that is both embedded and shown to the
    /// chat model as context.
    ///
    /// ```rust
    /// use paperweek_core::models::PaperRecord;
    ///
    /// let paper = PaperRecord {
    ///     id: "arXiv:2401.00001v1".into(),
    ///     title: "Fast Qubits".into(),
    ///     summary: "We make qubits faster.".into(),
    ///     authors: vec!["Ada Lovelace".into()],
    ///     source: "arXiv".into(),
    ///     published: None,
    ///     url: "http://arxiv.org/abs/2401.00001v1".into(),
    /// };
    /// let text = paper.context_text();
    /// assert!(text.starts_with("SOURCE: arXiv\nTITLE: Fast Qubits\n"));
    /// assert!(text.ends_with("SUMMARY: We make qubits faster."));
    /// ```
    pub fn context_text(&self) -> String {
        let date = self
            .published
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let mut out = format!(
            "SOURCE: {}\nTITLE: {}\nDATE: {}\nLINK: {}\n",
            self.source, self.title, date, self.url
        );
        if !self.authors.is_empty() {
            out.push_str(&format!("AUTHORS: {}\n", self.authors.join(", ")));
        }
        out.push_str("SUMMARY: ");
        out.push_str(self.summary.trim());
        out
    }
}

/// A [`PaperRecord`] together with its embedding vector.
#[derive(Debug, Clone)]
pub struct EmbeddedRecord {
    pub record: PaperRecord,
    /// L2-normalized embedding.
    pub vector: Vec<f32>,
}

/// One entry of the final ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedItem {
    /// 1-based rank.
    pub rank: usize,
    /// Title of the retrieved paper the item resolved to.
    pub title: String,
    pub justification: String,
    /// Catalog of the ranked paper.
    pub source: String,
    pub url: String,
}

/// The ordered result of the GENERATE stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    pub items: Vec<RankedItem>,
}

impl std::fmt::Display for Ranking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}. {}", item.rank, item.title)?;
            for line in item.justification.lines() {
                writeln!(f, "   {}", line)?;
            }
            writeln!(f, "   {}: {}", item.source, item.url)?;
        }
        Ok(())
    }
}

/// Lowercase and collapse runs of whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Quantum   Error\nCorrection "), "quantum error correction");
        assert_eq!(normalize_title("UPPER"), "upper");
        assert_eq!(normalize_title("   "), "");
    }

    #[test]
    fn test_context_text_includes_date_and_authors() {
        let paper = PaperRecord {
            id: "p1".into(),
            title: "Title".into(),
            summary: "  Body.  ".into(),
            authors: vec!["A".into(), "B".into()],
            source: "Semantic Scholar".into(),
            published: NaiveDate::from_ymd_opt(2024, 3, 9),
            url: "https://example.org/p1".into(),
        };
        let text = paper.context_text();
        assert!(text.contains("DATE: 2024-03-09\n"));
        assert!(text.contains("AUTHORS: A, B\n"));
        assert!(text.ends_with("SUMMARY: Body."));
    }

    #[test]
    fn test_ranking_display() {
        let ranking = Ranking {
            items: vec![
                RankedItem {
                    rank: 1,
                    title: "First".into(),
                    justification: "Because.".into(),
                    source: "arXiv".into(),
                    url: "https://arxiv.org/abs/1".into(),
                },
                RankedItem {
                    rank: 2,
                    title: "Second".into(),
                    justification: "Also.".into(),
                    source: "Semantic Scholar".into(),
                    url: "https://www.semanticscholar.org/paper/2".into(),
                },
            ],
        };
        assert_eq!(
            ranking.to_string(),
            "1. First\n   Because.\n   arXiv: https://arxiv.org/abs/1\n\n\
             2. Second\n   Also.\n   Semantic Scholar: https://www.semanticscholar.org/paper/2\n"
        );
    }
}
