//! task-publish library
//!
//! Extracts checklist tasks from a markdown vault, renders them into a
//! published page and syncs edits made on that page back into the vault.

pub mod changelog;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod format;
pub mod intake;
pub mod logging;
pub mod publish;
pub mod query;
pub mod render;
pub mod retry;
pub mod service;
pub mod store;
pub mod sync;
pub mod types;
