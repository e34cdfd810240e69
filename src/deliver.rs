//! Ranking delivery through the Telegram Bot API.
//!
//! The ranking is rendered as Telegram legacy Markdown: a header naming
//! the topic, one block per ranked item and a footer. Blocks are packed
//! into messages of at most [`TELEGRAM_MESSAGE_LIMIT`] UTF-16 code units
//! by [`split_message`], so an item is never cut between two messages.
//!
//! Delivery is best-effort. Callers log a [`DeliveryError`] and carry on.

use async_trait::async_trait;
use paperweek_core::message::split_message;
use paperweek_core::models::Ranking;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::TelegramConfig;
use crate::error::DeliveryError;
use crate::http::truncate_body;

/// Maximum `sendMessage` text length.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// A destination for finished messages.
#[async_trait]
pub trait Delivery: Send + Sync {
    fn name(&self) -> &str;

    /// Send one message that already fits the channel's limit.
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Posts messages to one Telegram chat.
pub struct TelegramDelivery {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramDelivery {
    pub fn new(client: reqwest::Client, config: &TelegramConfig, chat_id: &str) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            bot_token: config.bot_token.clone(),
            chat_id: chat_id.to_string(),
        }
    }
}

/// Envelope of every Bot API reply.
#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    description: Option<String>,
    #[serde(default)]
    result: Value,
}

fn method_url(api_url: &str, bot_token: &str, method: &str) -> String {
    format!("{}/bot{}/{}", api_url, bot_token, method)
}

/// Decode a Bot API reply. Transport errors are stripped of their URL,
/// which embeds the bot token.
async fn read_reply(
    resp: Result<reqwest::Response, reqwest::Error>,
) -> Result<Value, DeliveryError> {
    let resp = resp.map_err(|e| DeliveryError::Request(e.without_url().to_string()))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| DeliveryError::Request(e.without_url().to_string()))?;

    let reply: Option<ApiReply> = serde_json::from_str(&body).ok();
    if !status.is_success() {
        let description = reply
            .and_then(|r| r.description)
            .unwrap_or_else(|| truncate_body(&body));
        return Err(DeliveryError::Api {
            status: status.as_u16(),
            description,
        });
    }
    match reply {
        Some(r) if r.ok => Ok(r.result),
        Some(r) => Err(DeliveryError::Rejected(
            r.description.unwrap_or_else(|| "unknown error".to_string()),
        )),
        None => Err(DeliveryError::Rejected(format!(
            "unreadable reply: {}",
            truncate_body(&body)
        ))),
    }
}

#[async_trait]
impl Delivery for TelegramDelivery {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        if text.trim().is_empty() {
            return Err(DeliveryError::EmptyMessage);
        }
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });
        let resp = self
            .client
            .post(method_url(&self.api_url, &self.bot_token, "sendMessage"))
            .json(&body)
            .send()
            .await;
        read_reply(resp).await?;
        debug!(chat_id = %self.chat_id, units = text.encode_utf16().count(), "message sent");
        Ok(())
    }
}

/// Escape legacy Markdown control characters in user-supplied text.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '[' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Text placed inside a bold entity, where escapes are not recognised.
fn bold(text: &str) -> String {
    format!("*{}*", text.replace('*', ""))
}

/// Inline link. Brackets are dropped from the label and `)` is
/// percent-encoded so the URL cannot close the entity early.
fn link(label: &str, url: &str) -> String {
    let label: String = label.chars().filter(|c| !matches!(c, '[' | ']')).collect();
    format!("[{}]({})", label, url.replace(')', "%29"))
}

/// Render `ranking` as message blocks: header, one block per item, footer.
pub fn render_blocks(topic: &str, ranking: &Ranking) -> Vec<String> {
    let mut blocks = Vec::with_capacity(ranking.items.len() + 2);
    blocks.push(format!("🚀 {}", bold(&format!("paperweek: {}", topic))));
    for item in &ranking.items {
        blocks.push(format!(
            "{}\n{}\n{}",
            bold(&format!("{}. {}", item.rank, item.title)),
            escape_markdown(&item.justification),
            link(&item.source, &item.url)
        ));
    }
    blocks.push("_Generated automatically by paperweek_".to_string());
    blocks
}

/// Render, split and send `ranking`. Returns the number of messages sent.
pub async fn deliver_ranking(
    delivery: &dyn Delivery,
    topic: &str,
    ranking: &Ranking,
    limit: usize,
) -> Result<usize, DeliveryError> {
    if ranking.items.is_empty() {
        return Err(DeliveryError::EmptyMessage);
    }
    let messages = split_message(&render_blocks(topic, ranking), limit);
    for (i, message) in messages.iter().enumerate() {
        debug!(part = i + 1, of = messages.len(), "sending message");
        delivery.send(message).await?;
    }
    info!(channel = delivery.name(), messages = messages.len(), "ranking delivered");
    Ok(messages.len())
}

/// Message sent by `paperweek telegram test`.
pub fn test_message() -> String {
    "🧪 *paperweek test message*\n\nDelivery is working.".to_string()
}

/// Find the chat id of the most recent update the bot received.
///
/// Returns `None` when nobody has written to the bot yet.
pub async fn discover_chat_id(
    client: &reqwest::Client,
    config: &TelegramConfig,
) -> Result<Option<String>, DeliveryError> {
    let resp = client
        .get(method_url(&config.api_url, &config.bot_token, "getUpdates"))
        .send()
        .await;
    let result = read_reply(resp).await?;
    Ok(latest_chat_id(&result))
}

fn latest_chat_id(updates: &Value) -> Option<String> {
    updates.as_array()?.iter().rev().find_map(|update| {
        ["message", "edited_message", "channel_post", "my_chat_member"]
            .iter()
            .find_map(|kind| update.get(kind)?.pointer("/chat/id"))
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    })
}
