//! CLI module
//!
//! Command-line interface for following and replaying shape streams.
//!
//! # Commands
//!
//! - `follow` - Consume a shape over HTTP and print events
//! - `replay` - Feed a JSON-lines file of raw messages through the engine
//! - `checkpoint` - Show or clear a stored resume offset

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
