use super::*;
use crate::index::{LocalIndex, VectorRecord};
use crate::testing::{KeywordEmbedder, ScriptedGenerator};
use std::sync::atomic::Ordering;

const KEYWORDS: &[&str] = &["alice", "bob", "acme", "knows"];

fn grounding() -> PromptGrounding {
    PromptGrounding {
        graph_schema: "Node labels: Person".to_string(),
        ontology_summary: "- Classes: 1".to_string(),
    }
}

async fn populated_index(embedder: &KeywordEmbedder) -> Arc<LocalIndex> {
    let index = Arc::new(LocalIndex::new("test", embedder.dimension()));
    let texts = [
        "Node: alice label:Person KNOWS->bob",
        "Node: acme label:Company",
        "Node: bob label:Person KNOWS<-alice",
    ];
    let records = texts
        .iter()
        .enumerate()
        .map(|(i, text)| VectorRecord::new(format!("graph_{i}"), embedder.vector_for(text), *text))
        .collect();
    index.upsert(records).await.expect("upsert should succeed");
    index
}

fn service(
    embedder: &Arc<KeywordEmbedder>,
    index: &Arc<LocalIndex>,
    generator: &Arc<ScriptedGenerator>,
) -> RagService {
    RagService::new(
        Arc::clone(embedder) as Arc<dyn EmbeddingProvider>,
        Arc::clone(index) as Arc<dyn VectorIndex>,
        Arc::clone(generator) as Arc<dyn GenerationProvider>,
    )
}

#[tokio::test]
async fn answer_is_grounded_in_retrieved_context() {
    let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
    let index = populated_index(&embedder).await;
    let generator = Arc::new(ScriptedGenerator::answering("Alice knows Bob."));
    let rag = service(&embedder, &index, &generator);

    let answer = rag
        .query("Who does alice know?", &grounding())
        .await
        .expect("query should succeed");

    assert_eq!(answer.answer, "Alice knows Bob.");
    assert_eq!(answer.sources.len(), 3);
    assert_eq!(answer.sources[0].key, "graph_0");
    assert!(
        answer
            .sources
            .windows(2)
            .all(|w| w[0].score >= w[1].score)
    );

    let prompt = generator.last_prompt();
    assert_eq!(prompt.len(), 2);
    assert!(prompt[0].content.contains("GRAPH SCHEMA:\nNode labels: Person"));
    assert!(
        prompt[0]
            .content
            .contains("Result 1 (similarity: 0.577):\nNode: alice label:Person KNOWS->bob\n\n")
    );
    assert_eq!(prompt[1].content, "Who does alice know?");
}

#[tokio::test]
async fn top_k_bounds_the_sources() {
    let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
    let index = populated_index(&embedder).await;
    let generator = Arc::new(ScriptedGenerator::answering("ok"));
    let rag = service(&embedder, &index, &generator).with_top_k(1);

    let answer = rag
        .query("acme", &grounding())
        .await
        .expect("query should succeed");

    assert_eq!(rag.top_k(), 1);
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].text(), Some("Node: acme label:Company"));
}

#[tokio::test]
async fn empty_index_still_generates() {
    let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
    let index = Arc::new(LocalIndex::new("empty", embedder.dimension()));
    let generator = Arc::new(ScriptedGenerator::answering("I don't know."));
    let rag = service(&embedder, &index, &generator);

    let answer = rag
        .answer("Who is alice?", &grounding())
        .await
        .expect("query should succeed");

    assert_eq!(answer, "I don't know.");
    assert!(
        generator.last_prompt()[0]
            .content
            .contains("RETRIEVED CONTEXT:\nRelevant graph data retrieved from vector store:\n\n\n\n")
    );
}

#[tokio::test]
async fn blank_question_is_rejected_before_any_call() {
    let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
    let index = Arc::new(LocalIndex::new("test", embedder.dimension()));
    let generator = Arc::new(ScriptedGenerator::answering("unused"));
    let rag = service(&embedder, &index, &generator);

    let err = rag
        .query("   ", &grounding())
        .await
        .expect_err("query should fail");

    assert!(matches!(err, RagError::InvalidInput(_)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn embedding_failure_stops_at_embed_stage() {
    let mut embedder = KeywordEmbedder::new(KEYWORDS);
    embedder.fail_from_call = Some(0);
    let embedder = Arc::new(embedder);
    let index = Arc::new(LocalIndex::new("test", embedder.dimension()));
    let generator = Arc::new(ScriptedGenerator::answering("unused"));
    let rag = service(&embedder, &index, &generator);

    let err = rag
        .query("Who is alice?", &grounding())
        .await
        .expect_err("query should fail");

    assert_eq!(err.stage(), Some(Stage::Embed));
    assert!(matches!(err.root(), RagError::EmbeddingFailed(_)));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn dimension_mismatch_stops_at_retrieve_stage() {
    let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
    let index = Arc::new(LocalIndex::new("wide", embedder.dimension() + 1));
    let generator = Arc::new(ScriptedGenerator::answering("unused"));
    let rag = service(&embedder, &index, &generator);

    let err = rag
        .query("Who is alice?", &grounding())
        .await
        .expect_err("query should fail");

    assert_eq!(err.stage(), Some(Stage::Retrieve));
    assert!(matches!(err.root(), RagError::DimensionMismatch { .. }));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn generation_failure_stops_at_generate_stage() {
    let embedder = Arc::new(KeywordEmbedder::new(KEYWORDS));
    let index = populated_index(&embedder).await;
    let generator = Arc::new(ScriptedGenerator::failing(429, "rate limited"));
    let rag = service(&embedder, &index, &generator);

    let err = rag
        .query("Who is alice?", &grounding())
        .await
        .expect_err("query should fail");

    assert_eq!(err.stage(), Some(Stage::Generate));
    match err.root() {
        RagError::Provider(provider_error) => {
            assert_eq!(provider_error.status, Some(429));
            assert_eq!(provider_error.message, "rate limited");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(generator.call_count(), 1);
}
