//! The five-stage run: FETCH → EMBED_INDEX → RETRIEVE → GENERATE → DELIVER.
//!
//! Stages run strictly in order and each hands its output to the next.
//! A failure in any of the first four ends the run with a
//! [`PipelineError`] naming the stage. A delivery failure is logged and
//! recorded in the [`RunReport`]; the run still succeeds.

use paperweek_core::index::VectorIndex;
use paperweek_core::models::{PaperRecord, Ranking};
use paperweek_core::ranking::{count_items, parse_ranking};
use tracing::{info, warn};

use crate::catalog::{create_catalogs, fetch_papers, Catalog};
use crate::chat::{create_chat_model, ChatModel, ChatPrompt};
use crate::config::Config;
use crate::deliver::{deliver_ranking, Delivery, TelegramDelivery, TELEGRAM_MESSAGE_LIMIT};
use crate::embedding::{create_embedder, embed_query, embed_texts, Embedder};
use crate::error::{ConfigError, DeliveryError, GenerationError, PipelineError, Stage};

/// Number of items the chat model is asked to rank.
pub const RANKING_SIZE: usize = 5;

/// The backends a run talks to, built once from the configuration.
pub struct Components {
    pub catalogs: Vec<Box<dyn Catalog>>,
    pub embedder: Box<dyn Embedder>,
    pub chat: Box<dyn ChatModel>,
    /// `None` when no delivery target is configured.
    pub delivery: Option<Box<dyn Delivery>>,
}

impl Components {
    pub fn from_config(config: &Config, client: &reqwest::Client) -> Self {
        let delivery = config.delivery_target().map(|(telegram, chat_id)| {
            Box::new(TelegramDelivery::new(client.clone(), telegram, chat_id)) as Box<dyn Delivery>
        });
        Self {
            catalogs: create_catalogs(config, client),
            embedder: create_embedder(&config.embedding, client),
            chat: create_chat_model(&config.chat, client),
            delivery,
        }
    }

    /// Check local model servers before any paper is fetched.
    pub async fn preflight(&self) -> Result<(), ConfigError> {
        self.embedder.preflight().await?;
        self.chat.preflight().await
    }
}

/// Per-run parameters.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub topic: String,
    pub max_papers: usize,
    pub retrieval_k: usize,
    /// Send the ranking to the delivery target, if one is configured.
    pub deliver: bool,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            topic: config.topic.clone(),
            max_papers: config.max_papers,
            retrieval_k: config.retrieval_k,
            deliver: true,
        }
    }
}

/// What happened in the DELIVER stage.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered { messages: usize },
    Skipped(String),
    Failed(DeliveryError),
}

/// Result of a successful run.
#[derive(Debug)]
pub struct RunReport {
    pub topic: String,
    /// Deduplicated records fetched from the catalogs.
    pub fetched: usize,
    /// Catalogs that failed without aborting the run.
    pub catalog_failures: usize,
    /// Records handed to the chat model, most similar first.
    pub retrieved: Vec<PaperRecord>,
    pub ranking: Ranking,
    pub delivery: DeliveryOutcome,
}

/// System instruction fixing the shape of the answer.
pub fn system_prompt(items: usize) -> String {
    format!(
        "You are a technology news editor. Using ONLY the retrieved paper context, \
rank the {items} most relevant and impactful research results for the requested topic. \
Do not add greetings, introductions or closing remarks.

Judge the papers on:
- significant technological innovation
- performance improvements
- recent advances in AI, machine learning and computing
- potential impact on industry

Answer with exactly {items} numbered items and nothing else, in this format:
1. <paper title exactly as it appears in the context>
   <one or two sentences on what is new and why it matters, grounded in the context>"
    )
}

/// Assemble the prompt for `topic` over the retrieved records.
pub fn build_prompt(topic: &str, retrieved: &[PaperRecord], items: usize) -> ChatPrompt {
    let context = retrieved
        .iter()
        .map(PaperRecord::context_text)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    ChatPrompt {
        system: system_prompt(items),
        user: format!(
            "Topic: {}\n\nRank the top {} papers from the {} below.",
            topic,
            items,
            retrieved.len()
        ),
        context,
    }
}

/// Execute one run.
pub async fn run(
    components: &Components,
    settings: &RunSettings,
) -> Result<RunReport, PipelineError> {
    let topic = settings.topic.trim();

    // FETCH
    info!(stage = %Stage::Fetch, topic, max_papers = settings.max_papers, "stage started");
    let fetched = fetch_papers(&components.catalogs, topic, settings.max_papers)
        .await
        .map_err(|e| PipelineError::new(Stage::Fetch, e))?;
    let papers = fetched.papers;
    info!(
        papers = papers.len(),
        duplicates = fetched.duplicates,
        failed_catalogs = fetched.failures.len(),
        "fetch complete"
    );

    // EMBED_INDEX
    info!(
        stage = %Stage::EmbedIndex,
        provider = components.embedder.provider().name(),
        model = components.embedder.model_name(),
        "stage started"
    );
    let texts: Vec<String> = papers.iter().map(PaperRecord::context_text).collect();
    let vectors = embed_texts(components.embedder.as_ref(), &texts)
        .await
        .map_err(|e| PipelineError::new(Stage::EmbedIndex, e))?;
    let mut index = VectorIndex::new();
    for (record, vector) in papers.into_iter().zip(&vectors) {
        index
            .insert(record, vector)
            .map_err(|e| PipelineError::new(Stage::EmbedIndex, e))?;
    }
    info!(records = index.len(), dims = ?index.dims(), "index built");

    // RETRIEVE
    let k = settings.retrieval_k.max(RANKING_SIZE);
    if k > settings.retrieval_k {
        warn!(requested = settings.retrieval_k, k, "retrieval k is below the ranking size");
    }
    info!(stage = %Stage::Retrieve, k, "stage started");
    let query = embed_query(components.embedder.as_ref(), topic)
        .await
        .map_err(|e| PipelineError::new(Stage::Retrieve, e))?;
    let retrieved: Vec<PaperRecord> = index
        .query(&query, k)
        .map_err(|e| PipelineError::new(Stage::Retrieve, e))?
        .into_iter()
        .map(|hit| hit.record.clone())
        .collect();
    info!(retrieved = retrieved.len(), "retrieval complete");

    // GENERATE
    let expected = RANKING_SIZE.min(retrieved.len());
    info!(
        stage = %Stage::Generate,
        provider = components.chat.provider().name(),
        model = components.chat.model_name(),
        expected,
        "stage started"
    );
    let prompt = build_prompt(topic, &retrieved, expected);
    let output = components
        .chat
        .generate(&prompt)
        .await
        .map_err(|e| PipelineError::new(Stage::Generate, e))?;
    let found = count_items(&output);
    if found > expected {
        warn!(found, expected, "model returned extra items; keeping the first ones");
    }
    let ranking = parse_ranking(&output, expected, &retrieved)
        .map_err(|e| PipelineError::new(Stage::Generate, GenerationError::from(e)))?;

    // DELIVER
    let delivery = match (&components.delivery, settings.deliver) {
        (_, false) => DeliveryOutcome::Skipped("delivery disabled for this run".to_string()),
        (None, true) => DeliveryOutcome::Skipped("no delivery target configured".to_string()),
        (Some(target), true) => {
            info!(stage = %Stage::Deliver, channel = target.name(), "stage started");
            match deliver_ranking(target.as_ref(), topic, &ranking, TELEGRAM_MESSAGE_LIMIT).await {
                Ok(messages) => DeliveryOutcome::Delivered { messages },
                Err(e) => {
                    warn!(
                        stage = %Stage::Deliver,
                        error = %e,
                        "delivery failed; ranking is still printed"
                    );
                    DeliveryOutcome::Failed(e)
                }
            }
        }
    };
    if let DeliveryOutcome::Skipped(reason) = &delivery {
        info!(stage = %Stage::Deliver, reason = %reason, "delivery skipped");
    }

    Ok(RunReport {
        topic: topic.to_string(),
        fetched: index.len(),
        catalog_failures: fetched.failures.len(),
        retrieved,
        ranking,
        delivery,
    })
}
