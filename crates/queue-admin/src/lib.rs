//! Queue admin library exports.
//!
//! This crate provides the operator CLI for the index queue store.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations over the queue store

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{execute, run};
