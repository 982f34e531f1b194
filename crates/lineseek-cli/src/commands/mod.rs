//! Subcommand implementations.

pub mod build;
pub mod delete;
pub mod list;
pub mod search;
