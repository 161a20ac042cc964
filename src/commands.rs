use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::{EmbeddingProvider, HttpEmbeddingClient};
use crate::extractor::{
    GraphSource, JsonGraphFile, JsonOntologyFile, OntologySource, ontology_summary,
};
use crate::generation::HttpGenerationClient;
use crate::index::{VectorIndex, open_index};
use crate::indexer::{Indexer, IndexingStats};
use crate::retrieval::{PromptGrounding, RagService};

const NO_GRAPH_SCHEMA: &str = "No graph schema available.";
const NO_ONTOLOGY: &str = "No ontology loaded.";

fn spinner(message: &str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.enable_steady_tick(Duration::from_millis(120));
    bar.set_message(message.to_string());
    bar
}

fn embedder(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let client = HttpEmbeddingClient::new(&config.embedding)
        .context("Failed to initialize embedding client")?;
    Ok(Arc::new(client))
}

fn print_stats(label: &str, stats: IndexingStats) {
    println!(
        "Indexed {} {} chunks in {} batches",
        stats.records_stored, label, stats.batches
    );
}

async fn index_files(
    config: &Config,
    index: &Arc<dyn VectorIndex>,
    graph: Option<&Path>,
    ontology: Option<&Path>,
) -> Result<()> {
    if graph.is_none() && ontology.is_none() {
        return Ok(());
    }

    let indexer = Indexer::new(
        embedder(config)?,
        Arc::clone(index),
        config.embedding.batch_size as usize,
    );

    if let Some(path) = graph {
        let snapshot = JsonGraphFile::new(path)
            .graph_snapshot()
            .await
            .with_context(|| format!("Failed to load graph from {}", path.display()))?;

        let bar = spinner(&format!("Indexing graph from {}", path.display()));
        let result = indexer.index_graph(&snapshot).await;
        bar.finish_and_clear();
        print_stats("graph", result.context("Graph indexing failed")?);
    }

    if let Some(path) = ontology {
        let snapshot = JsonOntologyFile::new(path)
            .ontology_snapshot()
            .await
            .with_context(|| format!("Failed to load ontology from {}", path.display()))?;

        let bar = spinner(&format!("Indexing ontology from {}", path.display()));
        let result = indexer.index_ontology(&snapshot).await;
        bar.finish_and_clear();
        print_stats("ontology", result.context("Ontology indexing failed")?);
    }

    Ok(())
}

/// Index a graph and/or ontology export into the configured collection
#[inline]
pub async fn index_sources(
    config: &Config,
    graph: Option<&Path>,
    ontology: Option<&Path>,
) -> Result<()> {
    if graph.is_none() && ontology.is_none() {
        println!("Nothing to index. Pass --graph and/or --ontology.");
        return Ok(());
    }

    let index = open_index(config)
        .await
        .context("Failed to open vector index")?;
    let result = index_files(config, &index, graph, ontology).await;

    if result.is_ok() {
        let stats = index.stats().await;
        println!(
            "Collection '{}' now holds {} records",
            index.name(),
            stats.record_count
        );
    }
    index.close().await;
    result
}

async fn grounding(graph: Option<&Path>, ontology: Option<&Path>) -> Result<PromptGrounding> {
    let graph_schema = match graph {
        Some(path) => JsonGraphFile::new(path)
            .graph_schema()
            .await
            .with_context(|| format!("Failed to read graph schema from {}", path.display()))?,
        None => NO_GRAPH_SCHEMA.to_string(),
    };

    let ontology_summary = match ontology {
        Some(path) => {
            let snapshot = JsonOntologyFile::new(path)
                .ontology_snapshot()
                .await
                .with_context(|| format!("Failed to load ontology from {}", path.display()))?;
            ontology_summary(&snapshot)
        }
        None => NO_ONTOLOGY.to_string(),
    };

    Ok(PromptGrounding {
        graph_schema,
        ontology_summary,
    })
}

/// Answer a question against the configured collection. Any files given are
/// indexed first, which the local backend needs since it does not persist.
#[inline]
pub async fn run_query(
    config: &Config,
    question: &str,
    graph: Option<&Path>,
    ontology: Option<&Path>,
) -> Result<()> {
    let index = open_index(config)
        .await
        .context("Failed to open vector index")?;

    let result = async {
        index_files(config, &index, graph, ontology).await?;

        if index.stats().await.record_count == 0 {
            warn!(
                "Collection '{}' is empty, answering without context",
                index.name()
            );
        }

        let generator = HttpGenerationClient::new(&config.generation)
            .context("Failed to initialize generation client")?;
        let rag = RagService::new(embedder(config)?, Arc::clone(&index), Arc::new(generator))
            .with_top_k(config.retrieval.top_k);
        let prompt_grounding = grounding(graph, ontology).await?;

        let bar = spinner("Thinking");
        let answer = rag.query(question, &prompt_grounding).await;
        bar.finish_and_clear();
        let answer = answer.context("Query failed")?;

        println!("{}", answer.answer);
        if !answer.sources.is_empty() {
            println!();
            println!("Sources:");
            for source in &answer.sources {
                println!("  {} (similarity: {:.3})", source.key, source.score);
            }
        }
        info!("Answered with {} sources", answer.sources.len());
        Ok::<(), anyhow::Error>(())
    }
    .await;

    index.close().await;
    result
}

/// Print the record count of the configured collection
#[inline]
pub async fn show_stats(config: &Config) -> Result<()> {
    let index = open_index(config)
        .await
        .context("Failed to open vector index")?;
    let stats = index.stats().await;

    println!("Collection: {}", index.name());
    println!("Backend: {:?}", config.vector_store.backend);
    println!("Dimension: {}", index.dimension());
    println!("Records: {}", stats.record_count);

    index.close().await;
    Ok(())
}

/// Remove every record from the configured collection
#[inline]
pub async fn clear_index(config: &Config) -> Result<()> {
    let index = open_index(config)
        .await
        .context("Failed to open vector index")?;
    let result = index.clear().await.context("Failed to clear collection");
    index.close().await;
    result?;

    println!("Cleared collection '{}'", config.vector_store.collection);
    Ok(())
}
