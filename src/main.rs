use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use graph_rag::commands::{clear_index, index_sources, run_query, show_stats};
use graph_rag::config::{Config, run_interactive_config, show_config};

#[derive(Debug, Parser)]
#[command(name = "graph-rag")]
#[command(about = "Question answering over knowledge graphs and ontologies with vector retrieval")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Configure providers and the vector store
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index a graph and/or ontology export into the vector store
    Index {
        /// Graph export (JSON with nodes and relationships)
        #[arg(long)]
        graph: Option<PathBuf>,
        /// Ontology export (JSON with classes, individuals and properties)
        #[arg(long)]
        ontology: Option<PathBuf>,
    },
    /// Ask a question. Files given here are indexed before answering.
    Query {
        /// The question to answer
        question: String,
        #[arg(long)]
        graph: Option<PathBuf>,
        #[arg(long)]
        ontology: Option<PathBuf>,
    },
    /// Show the record count of the collection
    Stats,
    /// Remove every record from the collection
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index { graph, ontology } => {
            let config = Config::load_default()?;
            index_sources(&config, graph.as_deref(), ontology.as_deref()).await?;
        }
        Commands::Query {
            question,
            graph,
            ontology,
        } => {
            let config = Config::load_default()?;
            run_query(&config, &question, graph.as_deref(), ontology.as_deref()).await?;
        }
        Commands::Stats => {
            show_stats(&Config::load_default()?).await?;
        }
        Commands::Clear => {
            clear_index(&Config::load_default()?).await?;
        }
    }

    Ok(())
}
