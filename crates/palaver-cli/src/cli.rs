use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// palaver: inspect and manage chat session documents.
#[derive(Parser, Debug)]
#[command(name = "palaver", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log directive override (e.g. palaver=debug).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start an empty session with the configured role and write it out.
    New {
        output: PathBuf,
        /// Model id from the catalog; the configured default when omitted.
        #[arg(long)]
        model: Option<String>,
    },
    /// List configured models and their token limits.
    Models,
    /// Summarize a session document.
    Inspect { document: PathBuf },
    /// Estimate the tokens a new prompt would need.
    Estimate { document: PathBuf, input: String },
    /// List archived sessions, newest first.
    Sessions,
    /// Move an unanswered trailing prompt back into a draft.
    Recover { document: PathBuf },
    /// Write a copy of a document with attachment bytes embedded.
    Bundle { document: PathBuf, output: PathBuf },
    /// Print the effective configuration as JSON.
    Config,
}

pub fn parse() -> Args {
    Args::parse()
}
