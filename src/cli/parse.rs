//! CLI parse: clap types for artifact-forge. No behavior; definitions only.

use crate::types::ArtifactKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// artifact-forge - batched artifact generation for work items
#[derive(Parser)]
#[command(name = "artifact-forge")]
#[command(about = "Generate schemas and test plans for work items with retry, batching and fallback")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate artifacts for every work item lacking a valid one
    Run {
        /// JSON file with the work items
        #[arg(long)]
        items: PathBuf,

        /// Artifact kind (schema, test-plan)
        #[arg(long)]
        kind: ArtifactKind,

        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override the configured concurrency
        #[arg(long)]
        concurrency: Option<usize>,

        /// Previous JSON result to refine; its successes are kept
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Extra prompt context for a refinement run
        #[arg(long, requires = "previous")]
        context: Option<String>,

        /// Do not write generated artifacts
        #[arg(long, default_value = "false")]
        no_persist: bool,

        /// Print the result as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Report which work items already have a valid artifact
    Check {
        /// JSON file with the work items
        #[arg(long)]
        items: PathBuf,

        /// Artifact kind (schema, test-plan)
        #[arg(long)]
        kind: ArtifactKind,

        /// Print the report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}
