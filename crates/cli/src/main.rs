//! Recollect CLI: the main entry point.
//!
//! Commands:
//! - `ingest`: Store a message and extract facts/topics from it
//! - `facts`: List or search an owner's facts
//! - `topics`: Extract topics from text, or show an owner's topic usage
//! - `classify`: Analyze a query (memory query? which kind? which topics?)
//! - `context`: Assemble and render the memory context for a query
//! - `search`: Full-text search over an owner's messages
//! - `config`: Show, validate or initialize configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "recollect",
    about = "Recollect: memory retrieval and context assembly for AI companions",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the SQLite database path
    #[arg(long, global = true, env = "RECOLLECT_DB_PATH")]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a message and extract facts and topics from it
    Ingest {
        /// Owner (user) id
        #[arg(short, long)]
        owner: String,

        /// Conversation id
        #[arg(short, long, default_value = "default")]
        conversation: String,

        /// Record the message as sent by the assistant
        #[arg(long)]
        assistant: bool,

        /// Message text
        text: String,
    },

    /// List an owner's facts, or search them
    Facts {
        #[arg(short, long)]
        owner: String,

        /// Rank facts against this text instead of listing all
        #[arg(short, long)]
        query: Option<String>,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Extract topics from text, or show an owner's topic usage
    Topics {
        /// Show stored topic usage for this owner
        #[arg(short, long, conflicts_with = "text")]
        owner: Option<String>,

        /// Text to extract topics from
        #[arg(required_unless_present = "owner")]
        text: Option<String>,

        #[arg(short = 'n', long, default_value_t = 3)]
        top_n: usize,
    },

    /// Classify a query
    Classify {
        query: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Assemble and render the memory context for a query
    Context {
        #[arg(short, long)]
        owner: String,

        query: String,

        /// Override the character budget
        #[arg(long)]
        max_chars: Option<usize>,

        /// Print the scored context as JSON instead of the rendered block
        #[arg(long)]
        json: bool,
    },

    /// Full-text search over an owner's messages
    Search {
        #[arg(short, long)]
        owner: String,

        query: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Validate the config file
    Validate,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let db = cli.db;
    match cli.command {
        Commands::Ingest {
            owner,
            conversation,
            assistant,
            text,
        } => commands::ingest::run(db, &owner, &conversation, assistant, &text).await?,
        Commands::Facts {
            owner,
            query,
            limit,
        } => commands::facts::run(db, &owner, query.as_deref(), limit).await?,
        Commands::Topics {
            owner: Some(owner), ..
        } => commands::topics::usage(db, &owner).await?,
        Commands::Topics {
            text: Some(text),
            top_n,
            ..
        } => commands::topics::extract(&text, top_n),
        Commands::Topics { .. } => return Err("topics needs TEXT or --owner".into()),
        Commands::Classify { query, json } => commands::classify::run(&query, json)?,
        Commands::Context {
            owner,
            query,
            max_chars,
            json,
        } => commands::context::run(db, &owner, &query, max_chars, json).await?,
        Commands::Search {
            owner,
            query,
            limit,
        } => commands::search::run(db, &owner, &query, limit).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Validate => commands::config_cmd::validate()?,
            ConfigAction::Init { force } => commands::config_cmd::init(force)?,
        },
    }

    Ok(())
}
