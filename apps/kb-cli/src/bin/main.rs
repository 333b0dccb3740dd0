use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use kb_core::config::Config;
use kb_core::logging;
use kb_pipeline::{build_cascade, build_service, QueryRequest};

#[derive(Parser)]
#[command(name = "kb")]
#[command(about = "Knowledge-base query with cascading retrieval and answer synthesis")]
struct Cli {
    /// Directory holding config.toml (defaults to the current directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from the knowledge base
    Query {
        /// The question
        query: String,

        /// Passages to retrieve [default: retrieval.default_top_k]
        #[arg(short = 'n', long)]
        top_k: Option<usize>,

        /// Caller task id, reused as the query id
        #[arg(long)]
        task_id: Option<String>,

        /// Request filter as key=value (repeatable)
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,

        /// Print the full response envelope as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which retrieval backends initialized
    Backends,

    /// Print the effective configuration
    Config,
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config_dir {
        Some(dir) => Config::load_from(dir),
        None => Config::load(),
    }
    .map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    logging::init(&settings.logging)?;
    tracing::debug!(env = config.env_name(), base = %config.base_dir().display(), "configuration loaded");

    match cli.command {
        Commands::Query { query, top_k, task_id, filters, json } => {
            let service = build_service(&settings)?;
            let mut request = QueryRequest::new(query);
            request.task_id = task_id;
            request.top_k = top_k;
            request.filters = filters.into_iter().collect();

            let envelope = service.query(request);
            if json {
                println!("{}", envelope.to_json()?);
            } else {
                println!("{}", envelope.answer());
                if !envelope.sources().is_empty() {
                    println!("\nSources ({}):", envelope.retriever());
                    for (i, source) in envelope.sources().iter().enumerate() {
                        println!("  {}. {}", i + 1, source);
                    }
                }
            }
            if envelope.status_code() != 200 {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Backends => {
            let cascade = build_cascade(&settings)?;
            for slot in cascade.slots() {
                match slot.unavailable_reason() {
                    None => println!("{:<18} ready    timeout={}ms", slot.id().as_str(), slot.timeout().as_millis()),
                    Some(reason) => println!("{:<18} down     {}", slot.id().as_str(), reason),
                }
            }
            println!("{} of {} backends available", cascade.available_count(), cascade.slots().len());
        }
        Commands::Config => {
            println!("# env: {}", config.env_name());
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}
