//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use hubserve_core::Modality;
use std::path::PathBuf;

/// hubserve - serve an offline inference worker from a local model cache
#[derive(Parser)]
#[command(name = "hubserve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file path (YAML, TOML or JSON)
    #[arg(short = 'c', long, global = true, env = "HUBSERVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Model identifier in org/name form (overrides config and MODEL_NAME)
    #[arg(short = 'm', long, global = true)]
    pub model_name: Option<String>,

    /// Model cache root (overrides config and HF_CACHE_ROOT)
    #[arg(long, global = true)]
    pub cache_root: Option<PathBuf>,

    /// Served modality: text or image_edit (overrides config and WORKER_MODALITY)
    #[arg(long, global = true)]
    pub modality: Option<Modality>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the configured model and print its snapshot directory
    Resolve,

    /// Handle a single job document and print its envelope
    Run {
        /// Job document, e.g. {"input": {"prompt": "Hello"}}
        #[arg(short, long, default_value = "test_input.json")]
        input: PathBuf,
    },

    /// Read one job document per stdin line and write one response per line
    Serve {
        /// Maximum number of jobs in flight
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Per-job time limit in seconds; expiry is reported as a failure
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}
