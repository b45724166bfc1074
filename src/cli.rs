//! Command-line interface definition for Sahayak
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand};

/// Sahayak - multilingual AI chat assistant backend
///
/// Serves the chat API, proxying conversations to an upstream generative
/// provider while keeping per-session history in memory.
#[derive(Parser, Debug, Clone)]
#[command(name = "sahayak")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Sahayak
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override the listen port from config
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address from config
        #[arg(long)]
        host: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
