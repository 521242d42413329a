use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Gemini Studio
#[derive(Debug, Parser)]
#[command(name = "gemini-studio", version, about = "Generate images from a prompt and reference images")]
pub struct Cli {
    /// Credential file (defaults to the platform config directory)
    #[arg(long, global = true, env = "GEMINI_STUDIO_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Log filter (`RUST_LOG` syntax)
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the saved API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Generate images
    Generate(GenerateArgs),
}

#[derive(Debug, Subcommand)]
pub enum KeyAction {
    /// Save an API key
    Set { key: String },
    /// Show the saved API key (masked)
    Show,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Text prompt
    #[arg(short, long, default_value = "")]
    pub prompt: String,

    /// Character reference image (up to 4)
    #[arg(long = "character", value_name = "PATH")]
    pub characters: Vec<PathBuf>,

    /// Product reference image (up to 2)
    #[arg(long = "product", value_name = "PATH")]
    pub products: Vec<PathBuf>,

    /// Background reference image
    #[arg(long, value_name = "PATH")]
    pub background: Option<PathBuf>,

    /// Keep a slot loaded but leave it out of the request (e.g. `char-2`)
    #[arg(long = "disable", value_name = "SLOT-ID")]
    pub disabled: Vec<String>,

    /// Number of images, clamped to 1..=4
    #[arg(short = 'n', long, default_value_t = 1, allow_negative_numbers = true)]
    pub count: i64,

    /// Model to try, in order (repeatable); defaults to the built-in fallback list
    #[arg(short, long = "model", value_name = "MODEL")]
    pub models: Vec<String>,

    /// Forward calls through a relay instead of calling the API directly
    #[arg(long, value_name = "URL")]
    pub relay: Option<String>,

    /// Issue all calls for a model at once
    #[arg(long, conflicts_with = "spacing_ms")]
    pub concurrent: bool,

    /// Delay between sequential calls
    #[arg(long, value_name = "MS")]
    pub spacing_ms: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output aspect ratio, e.g. `16:9`
    #[arg(long)]
    pub aspect_ratio: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Print data URIs instead of writing files
    #[arg(long)]
    pub print_uris: bool,
}
