//! Parsing of the chat model's ranking output.
//!
//! The model is instructed to answer with numbered items:
//!
//! ```text
//! 1. <title>
//!    <one or two sentences of justification>
//! 2. <title>
//!    ...
//! ```
//!
//! [`parse_ranking`] is deliberately tolerant of Markdown decoration
//! (`**bold**`, `### 1. ...`, `1)`, `[title]`, trailing `(Score 4.5)`)
//! and strict about the result: exactly the expected number of distinct
//! papers, each with non-empty justification, and every title must name
//! one of the candidate papers the model was shown.

use std::collections::HashSet;

use thiserror::Error;

use crate::models::{normalize_title, PaperRecord, RankedItem, Ranking};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RankingError {
    #[error("model output contains no numbered ranking items")]
    NoItems,

    #[error("expected {expected} ranked items, found {found}")]
    TooFewItems { expected: usize, found: usize },

    #[error("title '{0}' is ranked more than once")]
    DuplicateTitle(String),

    #[error("item {rank} ('{title}') has no justification")]
    MissingJustification { rank: usize, title: String },

    #[error("item {rank} ('{title}') does not match any retrieved paper")]
    UngroundedTitle { rank: usize, title: String },
}

/// Remove `<think>...</think>` reasoning blocks emitted by reasoning
/// models such as `deepseek-r1`. An unterminated block swallows the rest
/// of the text.
///
/// ```rust
/// use paperweek_core::ranking::strip_reasoning;
///
/// assert_eq!(strip_reasoning("<think>hmm</think>\n1. A"), "1. A");
/// ```
pub fn strip_reasoning(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Parse model output into a [`Ranking`] of exactly `expected` items,
/// each resolved against `candidates`.
///
/// Items past `expected` are dropped. Ranks are renumbered `1..=expected`
/// in output order. A ranked item takes the title, source and link of the
/// candidate it resolves to (see [`resolve_title`]).
pub fn parse_ranking(
    text: &str,
    expected: usize,
    candidates: &[PaperRecord],
) -> Result<Ranking, RankingError> {
    let text = strip_reasoning(text);
    let mut drafts: Vec<(String, Vec<String>)> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(title) = item_title(trimmed) {
            drafts.push((title, Vec::new()));
        } else if let Some((_, body)) = drafts.last_mut() {
            let cleaned = clean_justification_line(trimmed);
            if !cleaned.is_empty() {
                body.push(cleaned);
            }
        }
    }

    if drafts.is_empty() {
        return Err(RankingError::NoItems);
    }
    if drafts.len() < expected {
        return Err(RankingError::TooFewItems {
            expected,
            found: drafts.len(),
        });
    }

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(expected);
    for (i, (title, body)) in drafts.into_iter().take(expected).enumerate() {
        let rank = i + 1;
        let (title, justification) = if body.is_empty() {
            split_inline_justification(&title)
        } else {
            (title, body.join(" "))
        };

        let Some(paper) = resolve_title(&title, candidates) else {
            return Err(RankingError::UngroundedTitle { rank, title });
        };
        if !seen.insert(paper.id.as_str()) {
            return Err(RankingError::DuplicateTitle(paper.title.clone()));
        }
        if justification.trim().is_empty() {
            return Err(RankingError::MissingJustification { rank, title });
        }

        items.push(RankedItem {
            rank,
            title: paper.title.clone(),
            justification,
            source: paper.source.clone(),
            url: paper.url.clone(),
        });
    }

    Ok(Ranking { items })
}

/// Find the candidate a ranked title refers to.
///
/// An exact match on the normalized title wins. Otherwise the title is
/// accepted when exactly one candidate title contains it or is contained
/// in it; no match or several partial matches give `None`.
///
/// ```rust
/// use paperweek_core::models::PaperRecord;
/// use paperweek_core::ranking::resolve_title;
///
/// let paper = PaperRecord {
///     id: "p1".into(),
///     title: "Fast Qubits: A Survey".into(),
///     summary: String::new(),
///     authors: vec![],
///     source: "arXiv".into(),
///     published: None,
///     url: "https://arxiv.org/abs/2401.00001".into(),
/// };
/// let candidates = [paper];
/// assert!(resolve_title("fast qubits", &candidates).is_some());
/// assert!(resolve_title("Slow Qubits", &candidates).is_none());
/// ```
pub fn resolve_title<'a>(title: &str, candidates: &'a [PaperRecord]) -> Option<&'a PaperRecord> {
    let key = normalize_title(title);
    if key.is_empty() {
        return None;
    }
    if let Some(exact) = candidates.iter().find(|c| c.title_key() == key) {
        return Some(exact);
    }
    let mut partial = candidates.iter().filter(|c| {
        let other = c.title_key();
        !other.is_empty() && (other.contains(&key) || key.contains(&other))
    });
    match (partial.next(), partial.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Number of numbered items in `text`, reasoning blocks excluded.
pub fn count_items(text: &str) -> usize {
    strip_reasoning(text)
        .lines()
        .filter(|line| item_title(line.trim()).is_some())
        .count()
}

/// If `line` starts a numbered item, return its cleaned title.
fn item_title(line: &str) -> Option<String> {
    let line = line.trim_start_matches(|c: char| c == '#' || c == '*' || c.is_whitespace());
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 2 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let title = clean_title(rest);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

fn clean_title(raw: &str) -> String {
    let mut title = raw.replace("**", "").replace("__", "");
    if let Some(pos) = title.rfind("(Score").or_else(|| title.rfind("(score")) {
        title.truncate(pos);
    }
    let title = title
        .trim()
        .trim_start_matches(|c| c == '[' || c == '"' || c == '*')
        .trim_end_matches(|c| c == ']' || c == '"' || c == '*' || c == ':');
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_justification_line(line: &str) -> String {
    let line = line
        .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•' || c.is_whitespace())
        .replace("**", "");
    let label = "justification:";
    match line.get(..label.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(label) => {
            line[label.len()..].trim().to_string()
        }
        _ => line.trim().to_string(),
    }
}

/// `Title - why it matters` on a single line.
fn split_inline_justification(title: &str) -> (String, String) {
    for sep in [" — ", " – ", " - ", ": "] {
        if let Some(pos) = title.find(sep) {
            let head = title[..pos].trim();
            let tail = title[pos + sep.len()..].trim();
            if !head.is_empty() && !tail.is_empty() {
                return (head.to_string(), tail.to_string());
            }
        }
    }
    (title.to_string(), String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE: &str = "\
Here is the ranking:

1. **Error-Corrected Logical Qubits at Scale** (Score 4.8)
   - Demonstrates below-threshold logical error rates on 100 qubits.
2. [Quantum Advantage in Sampling]
   Shows a sampling task beyond classical reach.
   Grounded in a new hardness proof.
3) Variational Eigensolvers Revisited
   Improves convergence of VQE on chemistry benchmarks.
### 4. Photonic Interconnects
   Justification: Links distant processors with low loss.
5. Compiling for Noisy Hardware
   A compiler pass that cuts two-qubit gate counts by 30%.
";

    const FIVE_TITLES: [&str; 5] = [
        "Error-Corrected Logical Qubits at Scale",
        "Quantum Advantage in Sampling",
        "Variational Eigensolvers Revisited",
        "Photonic Interconnects",
        "Compiling for Noisy Hardware",
    ];

    fn papers(titles: &[&str]) -> Vec<PaperRecord> {
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| PaperRecord {
                id: format!("p{}", i),
                title: title.to_string(),
                summary: String::new(),
                authors: vec![],
                source: "arXiv".to_string(),
                published: None,
                url: format!("https://arxiv.org/abs/2401.0000{}", i),
            })
            .collect()
    }

    fn candidates() -> Vec<PaperRecord> {
        let mut titles = FIVE_TITLES.to_vec();
        titles.push("Sixth Paper");
        titles.push("Topological Codes Without Magic");
        papers(&titles)
    }

    #[test]
    fn test_parses_five_items() {
        let ranking = parse_ranking(FIVE, 5, &candidates()).unwrap();
        let titles: Vec<&str> = ranking.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, FIVE_TITLES.to_vec());
        assert_eq!(
            ranking.items[1].justification,
            "Shows a sampling task beyond classical reach. Grounded in a new hardness proof."
        );
        assert_eq!(
            ranking.items[3].justification,
            "Links distant processors with low loss."
        );
        assert!(ranking.items.iter().all(|i| !i.justification.is_empty()));
        let ranks: Vec<usize> = ranking.items.iter().map(|i| i.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_items_carry_source_and_link() {
        let ranking = parse_ranking(FIVE, 5, &candidates()).unwrap();
        assert_eq!(ranking.items[0].source, "arXiv");
        assert_eq!(ranking.items[0].url, "https://arxiv.org/abs/2401.00000");
        assert_eq!(ranking.items[4].url, "https://arxiv.org/abs/2401.00004");
    }

    #[test]
    fn test_strips_think_block() {
        let text = format!("<think>\n1. Not a real item\n</think>\n{}", FIVE);
        let ranking = parse_ranking(&text, 5, &candidates()).unwrap();
        assert_eq!(ranking.items[0].title, "Error-Corrected Logical Qubits at Scale");
    }

    #[test]
    fn test_unterminated_think_block() {
        assert_eq!(strip_reasoning("before<think>never closed"), "before");
    }

    #[test]
    fn test_extra_items_dropped() {
        let text = format!("{}6. Sixth Paper\n   Extra.\n", FIVE);
        let ranking = parse_ranking(&text, 5, &candidates()).unwrap();
        assert_eq!(ranking.items.len(), 5);
    }

    #[test]
    fn test_count_items() {
        let text = format!("<think>1. hidden</think>\n{}6. Sixth Paper\n   Extra.\n", FIVE);
        assert_eq!(count_items(&text), 6);
        assert_eq!(count_items("no items here"), 0);
    }

    #[test]
    fn test_too_few_items() {
        let text = "1. Only One\n   Reason.\n2. Only Two\n   Reason.";
        assert_eq!(
            parse_ranking(text, 5, &papers(&["Only One", "Only Two"])),
            Err(RankingError::TooFewItems {
                expected: 5,
                found: 2
            })
        );
    }

    #[test]
    fn test_no_items() {
        assert_eq!(parse_ranking("", 5, &candidates()), Err(RankingError::NoItems));
        assert_eq!(
            parse_ranking("I cannot rank these papers.", 5, &candidates()),
            Err(RankingError::NoItems)
        );
    }

    #[test]
    fn test_duplicate_titles_rejected() {
        let text = "1. Same Paper\n   A.\n2. same   paper\n   B.";
        assert_eq!(
            parse_ranking(text, 2, &papers(&["Same Paper", "Other Paper"])),
            Err(RankingError::DuplicateTitle("Same Paper".to_string()))
        );
    }

    #[test]
    fn test_two_spellings_of_one_paper_are_duplicates() {
        let text = "1. Fast Qubits\n   A.\n2. Fast Qubits: A Survey\n   B.";
        assert_eq!(
            parse_ranking(text, 2, &papers(&["Fast Qubits: A Survey", "Slow Qubits"])),
            Err(RankingError::DuplicateTitle("Fast Qubits: A Survey".to_string()))
        );
    }

    #[test]
    fn test_missing_justification() {
        let text = "1. Has Reason\n   Yes.\n2. Bare Title";
        assert_eq!(
            parse_ranking(text, 2, &papers(&["Has Reason", "Bare Title"])),
            Err(RankingError::MissingJustification {
                rank: 2,
                title: "Bare Title".to_string()
            })
        );
    }

    #[test]
    fn test_inline_justification() {
        let text = "1. Fast Qubits - Doubles coherence time.\n2. Slow Qubits — Halves error.";
        let ranking = parse_ranking(text, 2, &papers(&["Fast Qubits", "Slow Qubits"])).unwrap();
        assert_eq!(ranking.items[0].title, "Fast Qubits");
        assert_eq!(ranking.items[0].justification, "Doubles coherence time.");
        assert_eq!(ranking.items[1].title, "Slow Qubits");
    }

    #[test]
    fn test_year_lines_are_not_items() {
        let text = "1. Paper\n   2024. A strong year for qubits.";
        let ranking = parse_ranking(text, 1, &papers(&["Paper"])).unwrap();
        assert_eq!(ranking.items[0].justification, "2024. A strong year for qubits.");
    }

    #[test]
    fn test_invented_title_rejected() {
        let text = "1. Photonic Interconnects\n   Real.\n2. Teleporting Cats\n   Invented.";
        assert_eq!(
            parse_ranking(text, 2, &candidates()),
            Err(RankingError::UngroundedTitle {
                rank: 2,
                title: "Teleporting Cats".to_string()
            })
        );
    }

    #[test]
    fn test_shortened_title_takes_full_candidate_title() {
        let text = "1. Topological Codes\n   No magic states needed.";
        let ranking = parse_ranking(text, 1, &candidates()).unwrap();
        assert_eq!(ranking.items[0].title, "Topological Codes Without Magic");
        assert_eq!(ranking.items[0].url, "https://arxiv.org/abs/2401.00006");
    }

    #[test]
    fn test_ambiguous_partial_title_rejected() {
        let candidates = papers(&["Qubit Routing I", "Qubit Routing II", "Other"]);
        assert!(resolve_title("Qubit Routing", &candidates).is_none());
        assert_eq!(
            resolve_title("qubit routing ii", &candidates).map(|p| p.id.as_str()),
            Some("p1")
        );
    }
}
