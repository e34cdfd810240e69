//! # paperweek
//!
//! Fetches recent research papers for a topic, indexes them in memory by
//! embedding, retrieves the closest matches and asks a language model for
//! a ranked top five, which is printed and optionally sent to Telegram.
//!
//! Each invocation is one linear run; nothing survives the process.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Catalogs   │──▶│  Embedder   │──▶│ VectorIndex  │
//! │ arXiv / S2   │   │ Ollama/etc. │   │  (in memory) │
//! └──────────────┘   └─────────────┘   └──────┬───────┘
//!                                             │ top-k
//!                    ┌─────────────┐   ┌──────▼───────┐
//!                    │  Telegram   │◀──│  Chat model  │
//!                    │  delivery   │   │   ranking    │
//!                    └─────────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment-style configuration and validation |
//! | [`error`] | Typed errors and the stage-tagged [`error::PipelineError`] |
//! | [`catalog`] | arXiv and Semantic Scholar adapters, multi-catalog fetch |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`chat`] | Chat provider abstraction |
//! | [`deliver`] | Telegram rendering, splitting and sending |
//! | [`pipeline`] | The five-stage run |
//! | [`sources`] | Configuration summary for `paperweek sources` |
//!
//! Pure logic (records, vector index, ranking parser, message splitter)
//! lives in the `paperweek-core` crate.

pub mod catalog;
pub mod chat;
pub mod config;
pub mod deliver;
pub mod embedding;
pub mod error;
pub mod http;
pub mod ollama;
pub mod pipeline;
pub mod sources;
