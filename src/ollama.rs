//! Reachability check for a local Ollama server.
//!
//! Local providers are checked once before the pipeline starts, so a
//! stopped server or an unpulled model is reported as a configuration
//! problem with a fix, not as a failure halfway through a run.

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<LocalModel>,
}

#[derive(Debug, Deserialize)]
struct LocalModel {
    name: String,
}

/// Whether `wanted` names the pulled model `pulled`. An untagged name
/// matches its `:latest` tag.
fn same_model(wanted: &str, pulled: &str) -> bool {
    let strip = |name: &str| name.strip_suffix(":latest").unwrap_or(name).to_string();
    strip(wanted) == strip(pulled)
}

/// Fail unless the server at `base_url` answers `GET /api/tags` and lists
/// `model` as pulled.
pub async fn check_model(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
) -> Result<(), ConfigError> {
    let url = format!("{}/api/tags", base_url);
    debug!(url = %url, model, "checking local model server");

    let resp = client.get(&url).send().await.map_err(|e| {
        ConfigError::Unavailable(format!(
            "cannot reach Ollama at {} ({}); start it with `ollama serve`",
            base_url, e
        ))
    })?;
    if !resp.status().is_success() {
        return Err(ConfigError::Unavailable(format!(
            "Ollama at {} answered HTTP {}",
            base_url,
            resp.status().as_u16()
        )));
    }
    let tags: TagsResponse = resp.json().await.map_err(|e| {
        ConfigError::Unavailable(format!("unexpected reply from Ollama at {}: {}", base_url, e))
    })?;

    if tags.models.iter().any(|m| same_model(model, &m.name)) {
        Ok(())
    } else {
        Err(ConfigError::Unavailable(format!(
            "model '{}' is not available in Ollama; run `ollama pull {}`",
            model, model
        )))
    }
}
