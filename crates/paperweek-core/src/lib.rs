//! # paperweek core
//!
//! Pure logic shared by the `paperweek` pipeline: paper models, vector
//! math, the in-memory [`index::VectorIndex`], the ranking parser and the
//! message splitter used by delivery.
//!
//! This crate performs no I/O. Network access, configuration and
//! provider selection live in the `paperweek` application crate.

pub mod embedding;
pub mod index;
pub mod message;
pub mod models;
pub mod ranking;
