//! Subcommand implementations.

pub mod check;
pub mod config;
pub mod watch;
