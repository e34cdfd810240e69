//! Shared HTTP client construction.
//!
//! Every outbound call goes through a client with an explicit timeout so an
//! unreachable local model server cannot hang the run.

use std::time::Duration;

use anyhow::Result;

const USER_AGENT: &str = concat!("paperweek/", env!("CARGO_PKG_VERSION"));

pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Trim an error body so log lines and messages stay readable.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    let body = body.trim();
    if body.chars().count() <= MAX {
        return body.to_string();
    }
    let cut: String = body.chars().take(MAX).collect();
    format!("{}…", cut)
}
