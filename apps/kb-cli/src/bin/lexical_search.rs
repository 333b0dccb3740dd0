use std::path::PathBuf;

use clap::Parser;

use kb_core::config::Config;
use kb_core::traits::RetrievalBackend;
use kb_text::LexicalBackend;

#[derive(Parser)]
#[command(name = "kb-lexical-search")]
#[command(about = "Search the lexical corpus only, bypassing the cascade")]
struct Args {
    /// Search query
    query: String,

    /// Corpus directory [default: lexical.corpus_dir]
    corpus_dir: Option<PathBuf>,

    /// Maximum results [default: retrieval.default_top_k]
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Config::load()?.settings()?;
    kb_core::logging::init(&settings.logging)?;

    let limit = args.limit.unwrap_or(settings.retrieval.default_top_k).clamp(1, settings.retrieval.max_top_k);
    let corpus_dir = args.corpus_dir.unwrap_or(settings.lexical.corpus_dir);

    println!("kb-lexical-search\n=================");
    println!("Query: {}", args.query);
    println!("Corpus: {}", corpus_dir.display());
    let backend = LexicalBackend::open(&corpus_dir, &settings.lexical.extensions)?;
    let results = backend.search(&args.query, limit)?;
    println!("\nFound {} results for: \"{}\" ({} chunks indexed)", results.len(), args.query, backend.chunk_count());
    for (i, result) in results.iter().enumerate() {
        let score = result.score.map_or_else(|| "substring".to_string(), |s| format!("{s:.4}"));
        println!("\n  {}. score={}  source={}", i + 1, score, result.source);
        println!("     {}", result.content);
    }
    Ok(())
}
