mod chat;
mod config;
mod document;
mod embedding;
mod error;
mod llm;
mod vector_db;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat::ChatInterface;
use config::RagConfig;
use llm::OllamaGenerator;
use vector_db::VectorDb;

/// Local retrieval-augmented generation over a directory of text files.
#[derive(Parser, Debug)]
#[command(name = "local-rag", version, about)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing documents to index
    #[arg(long)]
    documents_dir: Option<PathBuf>,

    /// Model name for generation
    #[arg(long)]
    model: Option<String>,

    /// Model name for embeddings
    #[arg(long)]
    embedding_model: Option<String>,

    /// Delete the existing index and rebuild it from the documents
    #[arg(long)]
    reindex: bool,
}

fn build_config(cli: &Cli) -> Result<RagConfig> {
    let mut config = match &cli.config {
        Some(path) => RagConfig::load(path)?,
        None => RagConfig::default(),
    };

    if let Some(dir) = &cli.documents_dir {
        config.documents_dir = dir.clone();
    }
    if let Some(model) = &cli.model {
        config.model_name = model.clone();
    }
    if let Some(model) = &cli.embedding_model {
        config.embedding_model = model.clone();
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli).context("invalid configuration")?;
    config.ensure_dirs()?;

    if cli.reindex && VectorDb::is_built(&config.index_dir) {
        info!(dir = %config.index_dir.display(), "reindex requested, clearing index");
        fs::remove_dir_all(&config.index_dir)
            .with_context(|| format!("cannot clear index at {}", config.index_dir.display()))?;
    }

    let embedder = embedding::from_config(&config);
    let generator = Box::new(OllamaGenerator::from_config(&config));

    let chat = ChatInterface::initialize(config, embedder, generator)
        .context("failed to initialize the RAG pipeline")?;
    chat.run_chat_loop()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_win_over_defaults() -> Result<()> {
        let cli = Cli::parse_from([
            "local-rag",
            "--model",
            "llama3.2",
            "--embedding-model",
            "all-minilm",
        ]);
        let config = build_config(&cli)?;
        assert_eq!(config.model_name, "llama3.2");
        assert_eq!(config.embedding_model, "all-minilm");
        Ok(())
    }

    #[test]
    fn reindex_flag_parses() {
        let cli = Cli::parse_from(["local-rag", "--reindex"]);
        assert!(cli.reindex);
    }
}
