//! CLI Adapter
//!
//! Command-line interface for the exitbot binary.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CheckCmd, CliApp, Command, MarketArg, RunCmd};
