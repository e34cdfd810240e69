//! `paperweek sources`: show what a run would use, without network calls.

use crate::config::{CatalogKind, Config};

/// One `NAME  STATUS  DETAIL` row per catalog, provider and delivery target.
pub fn describe(config: &Config) -> Vec<(String, String, String)> {
    let mut rows = Vec::new();

    for kind in [CatalogKind::Arxiv, CatalogKind::SemanticScholar] {
        let enabled = config.catalogs.contains(&kind);
        let url = match kind {
            CatalogKind::Arxiv => &config.catalog.arxiv_url,
            CatalogKind::SemanticScholar => &config.catalog.semantic_scholar_url,
        };
        let status = if enabled { "ENABLED" } else { "DISABLED" };
        rows.push((kind.name().to_string(), status.to_string(), url.clone()));
    }

    rows.push((
        "embedding".to_string(),
        config.embedding.provider.name().to_string(),
        format!(
            "{} (batch {}) at {}",
            config.embedding.model, config.embedding.batch_size, config.embedding.base_url
        ),
    ));
    rows.push((
        "chat".to_string(),
        config.chat.provider.name().to_string(),
        format!(
            "{} (temperature {}) at {}",
            config.chat.model, config.chat.temperature, config.chat.base_url
        ),
    ));

    let (status, detail) = match (&config.telegram, config.delivery_target()) {
        (_, Some((_, chat_id))) => ("OK", format!("chat {}", chat_id)),
        (Some(_), None) => (
            "NO CHAT ID",
            "run `paperweek telegram chat-id` to find it".to_string(),
        ),
        (None, None) => ("NOT CONFIGURED", "ranking is printed only".to_string()),
    };
    rows.push(("telegram".to_string(), status.to_string(), detail));

    rows
}

pub fn list_sources(config: &Config) {
    println!("topic: {}", config.topic);
    println!(
        "max papers: {}, retrieval k: {}\n",
        config.max_papers, config.retrieval_k
    );
    println!("{:<18} {:<16} DETAIL", "NAME", "STATUS");
    for (name, status, detail) in describe(config) {
        println!("{:<18} {:<16} {}", name, status, detail);
    }
}
