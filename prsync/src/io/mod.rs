//! I/O adapters for prsync commands.

pub mod config;
pub mod github;
pub mod http;
pub mod state_store;
pub mod todoist;
