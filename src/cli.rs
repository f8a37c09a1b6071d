//! Command-line interface
//!
//! Every engine and server setting has an environment fallback so the same
//! binary runs unchanged in a container.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Vigil search service
#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Full-text search service for leaked-data indices", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output (no short flag to avoid conflicts)
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP search API
    Serve(ServeArgs),
    /// Run one query against the engine and print the results
    Search(SearchArgs),
    /// Fuzzy-filter a local JSON array of objects
    Fuzzy(FuzzyArgs),
}

/// Search engine connection
#[derive(Args, Clone, Debug)]
pub struct EngineArgs {
    /// Engine base URL
    #[arg(long = "engine-url", env = "ELASTICSEARCH_URL", default_value = "http://localhost:9200")]
    pub engine_url: String,

    /// Indices to search, comma-separated
    #[arg(
        short = 'i',
        long = "indices",
        env = "SEARCH_INDICES",
        value_delimiter = ',',
        default_value = "leaks"
    )]
    pub indices: Vec<String>,

    /// Basic-auth user
    #[arg(long, env = "ELASTICSEARCH_USERNAME")]
    pub username: Option<String>,

    /// Basic-auth password (ignored without a user)
    #[arg(long, env = "ELASTICSEARCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", env = "VIGIL_TIMEOUT", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates from the engine
    #[arg(long)]
    pub insecure: bool,

    /// JSON file overriding query fields and boosts
    #[arg(long, env = "VIGIL_PROFILE")]
    pub profile: Option<PathBuf>,
}

/// `serve` arguments
#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Address to bind
    #[arg(long, env = "VIGIL_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(short, long, env = "VIGIL_PORT", default_value_t = 3001)]
    pub port: u16,

    /// Default number of results per search (max 100)
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,

    /// Requests allowed per client per window, 0 disables
    #[arg(long, env = "VIGIL_RATE_LIMIT", default_value_t = 30)]
    pub rate_limit: u32,

    /// Rate limit window in seconds
    #[arg(long = "rate-window", default_value_t = 60)]
    pub rate_window_secs: u64,

    /// Allowed CORS origins, comma-separated; empty allows any
    #[arg(long, env = "VIGIL_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Rate-limit by the first X-Forwarded-For entry (set only behind a reverse proxy)
    #[arg(long, env = "VIGIL_TRUST_FORWARDED")]
    pub trust_forwarded: bool,
}

/// `search` arguments
#[derive(Args, Clone, Debug)]
pub struct SearchArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Search terms
    #[arg(short = 'q', long)]
    pub query: String,

    /// Maximum number of results (default 20, max 100)
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,

    /// Print JSON instead of markdown
    #[arg(long)]
    pub json: bool,

    /// Print the request body that would be sent and exit
    #[arg(long, conflicts_with = "json")]
    pub explain: bool,
}

/// `fuzzy` arguments
#[derive(Args, Clone, Debug)]
pub struct FuzzyArgs {
    /// JSON file holding an array of objects
    #[arg(short = 'f', long)]
    pub file: PathBuf,

    /// Term to match
    #[arg(short = 't', long)]
    pub term: String,

    /// Fields to compare (dotted paths allowed), comma-separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub fields: Vec<String>,

    /// Print JSON instead of markdown
    #[arg(long)]
    pub json: bool,
}
