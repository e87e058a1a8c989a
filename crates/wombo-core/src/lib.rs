//! # wombo-core
//!
//! Core types for the wombo Dream image-generation client.
//!
//! Dream (dream.ai, formerly WOMBO) has no public API. Every generation runs
//! the same chain: scrape an anonymous credential out of the web bundle,
//! submit a task, poll it until the service reports a result, and optionally
//! stitch the preview frames into a GIF.
//!
//! This crate holds the pieces that carry no I/O:
//! - The unified [`DreamError`] taxonomy
//! - The wire model ([`Task`], [`Credential`], [`Style`])
//! - The pure task [`state_machine`]
//! - [`DreamConfig`] endpoint, timeout and polling settings

pub mod config;
mod error;
pub mod state_machine;
mod types;

pub use config::DreamConfig;
pub use error::{DreamError, Result};
pub use state_machine::{TaskEvent, TaskState};
pub use types::*;
