use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::inference::{DEFAULT_API_BASE, DEFAULT_MAX_INPUT_CHARS, DEFAULT_MODEL};
use crate::resolver::DEFAULT_LABEL_THRESHOLD;

#[derive(Parser, Debug)]
#[command(
    name = "merger-sections",
    version,
    about = "Extract labeled subsections from merger agreement and proxy PDFs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = "data")]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "chunks")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// Worker threads for processing documents in parallel; defaults to the CPU count.
    #[arg(long)]
    pub jobs: Option<usize>,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Pages with more links than this are sent to ToC inference.
    #[arg(long, default_value_t = 5)]
    pub links_per_page_threshold: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_INPUT_CHARS)]
    pub max_input_chars: usize,

    #[arg(long, default_value_t = DEFAULT_LABEL_THRESHOLD)]
    pub label_threshold: f64,

    #[arg(long, default_value_t = 5)]
    pub max_attempts: u32,

    #[arg(long, default_value_t = 500)]
    pub base_delay_ms: u64,

    #[arg(long, default_value_t = 30_000)]
    pub max_delay_ms: u64,

    #[arg(long, default_value_t = 0.2)]
    pub retry_jitter: f64,

    #[arg(long, default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// End a subsection on the next section's start page instead of the page before it.
    #[arg(long, default_value_t = false)]
    pub no_new_page_rule: bool,

    #[arg(long, default_value_t = false)]
    pub skip_labels: bool,
}
