//! Run configuration.
//!
//! All settings come from environment-style key/value pairs, read exactly
//! once at process entry. [`Config::from_env`] loads an optional `.env` file
//! and reads the process environment; [`Config::from_lookup`] accepts any
//! key lookup so tests never touch the real environment.
//!
//! Validation is complete by the time a [`Config`] exists: provider names,
//! credentials, numeric ranges and URLs are all checked here, before any
//! network call is made.

use std::path::Path;

use tracing::warn;

use crate::error::ConfigError;
use crate::pipeline::RANKING_SIZE;

/// Hard upper bound on fetched papers, to bound embedding and prompt cost.
pub const MAX_PAPERS_CAP: usize = 15;

const DEFAULT_TOPIC: &str = "artificial intelligence machine learning";
const DEFAULT_SOURCES: &str = "arxiv,semantic_scholar";
const DEFAULT_RETRIEVAL_K: usize = 8;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TEMPERATURE: f32 = 0.7;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_ARXIV_URL: &str = "http://export.arxiv.org";
const DEFAULT_SEMANTIC_SCHOLAR_URL: &str = "https://api.semanticscholar.org";
const DEFAULT_TELEGRAM_URL: &str = "https://api.telegram.org";

/// Backend serving a chat or embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Local Ollama server.
    Ollama,
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn is_hosted(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }

    fn parse(key: &'static str, value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "ollama" | "local" | "deepseek-local" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(ConfigError::Invalid {
                key,
                message: format!("unknown provider '{}'. Use ollama, openai, or gemini", other),
            }),
        }
    }
}

/// A paper catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Arxiv,
    SemanticScholar,
}

impl CatalogKind {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogKind::Arxiv => "arxiv",
            CatalogKind::SemanticScholar => "semantic_scholar",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Maximum texts per backend request.
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub arxiv_url: String,
    pub semantic_scholar_url: String,
    pub semantic_scholar_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Destination chat. Delivery is skipped when unset.
    pub chat_id: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub topic: String,
    /// Already capped at [`MAX_PAPERS_CAP`].
    pub max_papers: usize,
    pub retrieval_k: usize,
    pub catalogs: Vec<CatalogKind>,
    pub catalog: CatalogConfig,
    pub chat: ChatConfig,
    pub embedding: EmbeddingConfig,
    pub telegram: Option<TelegramConfig>,
    pub timeout_secs: u64,
}

impl Config {
    /// Load `.env` (or `env_file`) into the process environment, then read it.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        match env_file {
            Some(path) => {
                dotenv::from_path(path).map_err(|e| ConfigError::Invalid {
                    key: "--env-file",
                    message: format!("{}: {}", path.display(), e),
                })?;
            }
            None => {
                // A missing .env is fine.
                let _ = dotenv::dotenv();
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build and validate a config from an arbitrary key lookup. Empty
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        // Providers
        let llm_raw = get("LLM_PROVIDER");
        let emb_raw = get("EMBEDDING_PROVIDER");
        let chat_provider = match &llm_raw {
            Some(v) => ProviderKind::parse("LLM_PROVIDER", v)?,
            None => ProviderKind::Ollama,
        };
        let embedding_provider = match &emb_raw {
            Some(v) => ProviderKind::parse("EMBEDDING_PROVIDER", v)?,
            None => ProviderKind::Ollama,
        };

        match (&llm_raw, &emb_raw) {
            (Some(_), None) if chat_provider.is_hosted() => {
                return Err(ConfigError::Conflict(format!(
                    "LLM_PROVIDER={} requires EMBEDDING_PROVIDER to be set as well",
                    chat_provider.name()
                )));
            }
            (None, Some(_)) if embedding_provider.is_hosted() => {
                return Err(ConfigError::Conflict(format!(
                    "EMBEDDING_PROVIDER={} requires LLM_PROVIDER to be set as well",
                    embedding_provider.name()
                )));
            }
            _ => {}
        }

        let openai_key = get("OPENAI_API_KEY");
        let google_key = get("GOOGLE_API_KEY");
        let uses = |kind: ProviderKind| chat_provider == kind || embedding_provider == kind;

        if openai_key.is_some() && !uses(ProviderKind::OpenAi) {
            return Err(ConfigError::Conflict(
                "OPENAI_API_KEY is set but neither LLM_PROVIDER nor EMBEDDING_PROVIDER is openai; \
                 select the provider or unset the key"
                    .to_string(),
            ));
        }
        if google_key.is_some() && !uses(ProviderKind::Gemini) {
            return Err(ConfigError::Conflict(
                "GOOGLE_API_KEY is set but neither LLM_PROVIDER nor EMBEDDING_PROVIDER is gemini; \
                 select the provider or unset the key"
                    .to_string(),
            ));
        }

        let ollama_url = url_or("OLLAMA_BASE_URL", get("OLLAMA_BASE_URL"), DEFAULT_OLLAMA_URL)?;
        let openai_url = url_or("OPENAI_BASE_URL", get("OPENAI_BASE_URL"), DEFAULT_OPENAI_URL)?;
        let gemini_url = url_or("GEMINI_BASE_URL", get("GEMINI_BASE_URL"), DEFAULT_GEMINI_URL)?;

        let credentials = |kind: ProviderKind, role: &str| -> Result<Option<String>, ConfigError> {
            match kind {
                ProviderKind::Ollama => Ok(None),
                ProviderKind::OpenAi => openai_key
                    .clone()
                    .map(Some)
                    .ok_or_else(|| ConfigError::Missing {
                        key: "OPENAI_API_KEY",
                        reason: format!("when {}=openai", role),
                    }),
                ProviderKind::Gemini => google_key
                    .clone()
                    .map(Some)
                    .ok_or_else(|| ConfigError::Missing {
                        key: "GOOGLE_API_KEY",
                        reason: format!("when {}=gemini", role),
                    }),
            }
        };
        let base_url = |kind: ProviderKind| match kind {
            ProviderKind::Ollama => ollama_url.clone(),
            ProviderKind::OpenAi => openai_url.clone(),
            ProviderKind::Gemini => gemini_url.clone(),
        };

        let temperature = match get("LLM_TEMPERATURE") {
            Some(v) => {
                let t: f32 = v.parse().map_err(|_| ConfigError::Invalid {
                    key: "LLM_TEMPERATURE",
                    message: format!("'{}' is not a number", v),
                })?;
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::Invalid {
                        key: "LLM_TEMPERATURE",
                        message: "must be in [0.0, 2.0]".to_string(),
                    });
                }
                t
            }
            None => DEFAULT_TEMPERATURE,
        };

        let chat = ChatConfig {
            provider: chat_provider,
            model: match chat_provider {
                ProviderKind::Ollama => get("OLLAMA_CHAT_MODEL")
                    .or_else(|| get("DEEPSEEK_MODEL"))
                    .unwrap_or_else(|| "deepseek-r1:7b".to_string()),
                ProviderKind::OpenAi => {
                    get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string())
                }
                ProviderKind::Gemini => {
                    get("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string())
                }
            },
            base_url: base_url(chat_provider),
            api_key: credentials(chat_provider, "LLM_PROVIDER")?,
            temperature,
        };

        let default_batch = match embedding_provider {
            ProviderKind::Ollama => 64,
            ProviderKind::OpenAi => 256,
            ProviderKind::Gemini => 100,
        };
        let embedding = EmbeddingConfig {
            provider: embedding_provider,
            model: match embedding_provider {
                ProviderKind::Ollama => get("LOCAL_EMBEDDING_MODEL")
                    .unwrap_or_else(|| "nomic-embed-text".to_string()),
                ProviderKind::OpenAi => get("OPENAI_EMBEDDING_MODEL")
                    .unwrap_or_else(|| "text-embedding-3-small".to_string()),
                ProviderKind::Gemini => get("GEMINI_EMBEDDING_MODEL")
                    .unwrap_or_else(|| "text-embedding-004".to_string()),
            },
            base_url: base_url(embedding_provider),
            api_key: credentials(embedding_provider, "EMBEDDING_PROVIDER")?,
            batch_size: positive_or(
                "EMBEDDING_BATCH_SIZE",
                get("EMBEDDING_BATCH_SIZE"),
                default_batch,
            )?,
        };

        // Catalogs and query
        let topic = get("TECH_NEWS_TOPIC").unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let catalogs = parse_catalogs(
            &get("PAPER_SOURCES").unwrap_or_else(|| DEFAULT_SOURCES.to_string()),
        )?;

        let requested = positive_or("MAX_PAPERS", get("MAX_PAPERS"), MAX_PAPERS_CAP)?;
        if requested > MAX_PAPERS_CAP {
            warn!(requested, cap = MAX_PAPERS_CAP, "MAX_PAPERS exceeds the cap; using the cap");
        }
        let max_papers = requested.min(MAX_PAPERS_CAP);
        let retrieval_k = positive_or("RETRIEVAL_K", get("RETRIEVAL_K"), DEFAULT_RETRIEVAL_K)?;
        if retrieval_k < RANKING_SIZE {
            return Err(ConfigError::Invalid {
                key: "RETRIEVAL_K",
                message: format!(
                    "{} is below the ranking size; at least {} candidates are needed",
                    retrieval_k, RANKING_SIZE
                ),
            });
        }

        let catalog = CatalogConfig {
            arxiv_url: url_or("ARXIV_API_URL", get("ARXIV_API_URL"), DEFAULT_ARXIV_URL)?,
            semantic_scholar_url: url_or(
                "SEMANTIC_SCHOLAR_API_URL",
                get("SEMANTIC_SCHOLAR_API_URL"),
                DEFAULT_SEMANTIC_SCHOLAR_URL,
            )?,
            semantic_scholar_api_key: get("SEMANTIC_SCHOLAR_API_KEY"),
        };

        // Delivery
        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), chat_id) => Some(TelegramConfig {
                bot_token,
                chat_id,
                api_url: url_or("TELEGRAM_API_URL", get("TELEGRAM_API_URL"), DEFAULT_TELEGRAM_URL)?,
            }),
            (None, Some(_)) => {
                return Err(ConfigError::Missing {
                    key: "TELEGRAM_BOT_TOKEN",
                    reason: "when TELEGRAM_CHAT_ID is set".to_string(),
                })
            }
            (None, None) => None,
        };

        let timeout_secs = positive_or(
            "REQUEST_TIMEOUT_SECS",
            get("REQUEST_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS as usize,
        )? as u64;

        Ok(Config {
            topic,
            max_papers,
            retrieval_k,
            catalogs,
            catalog,
            chat,
            embedding,
            telegram,
            timeout_secs,
        })
    }

    /// Where the ranking goes, if delivery is fully configured.
    pub fn delivery_target(&self) -> Option<(&TelegramConfig, &str)> {
        let telegram = self.telegram.as_ref()?;
        let chat_id = telegram.chat_id.as_deref()?;
        Some((telegram, chat_id))
    }
}

/// Parse a comma-separated catalog list such as `arxiv,semantic_scholar`.
pub fn parse_catalogs(raw: &str) -> Result<Vec<CatalogKind>, ConfigError> {
    let mut catalogs = Vec::new();
    for name in raw.split(',').map(|s| s.trim().to_lowercase()) {
        if name.is_empty() {
            continue;
        }
        let kind = match name.as_str() {
            "arxiv" => CatalogKind::Arxiv,
            "semantic_scholar" | "semanticscholar" | "s2" => CatalogKind::SemanticScholar,
            other => {
                return Err(ConfigError::Invalid {
                    key: "PAPER_SOURCES",
                    message: format!(
                        "unknown catalog '{}'. Supported: arxiv, semantic_scholar",
                        other
                    ),
                })
            }
        };
        if !catalogs.contains(&kind) {
            catalogs.push(kind);
        }
    }
    if catalogs.is_empty() {
        return Err(ConfigError::Invalid {
            key: "PAPER_SOURCES",
            message: "at least one catalog must be enabled".to_string(),
        });
    }
    Ok(catalogs)
}

fn positive_or(
    key: &'static str,
    raw: Option<String>,
    default: usize,
) -> Result<usize, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            key,
            message: format!("'{}' is not a positive integer", raw),
        }),
    }
}

fn url_or(key: &'static str, raw: Option<String>, default: &str) -> Result<String, ConfigError> {
    let url = raw.unwrap_or_else(|| default.to_string());
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            key,
            message: format!("'{}' must start with http:// or https://", url),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}
