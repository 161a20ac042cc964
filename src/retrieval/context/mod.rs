
use std::fmt::Write;

use crate::generation::ChatMessage;
use crate::index::SearchResult;

pub const CONTEXT_HEADER: &str = "Relevant graph data retrieved from vector store:\n\n";

const INSTRUCTIONS: &str = "You are an expert knowledge graph analyst specializing in \
ontology-based question answering. Your task is to answer questions using ONLY the provided \
graph context.

CRITICAL INSTRUCTIONS:
1. Answer ONLY based on the RETRIEVED CONTEXT below
2. Map user question terms to actual ontology relationships:
   - 'created/made/generated' -> check for 'detectedBy', 'discoveredBy', 'identifiedBy'
   - 'involved/participated' -> check for 'involvedIn', 'partOf'
   - 'connected/linked' -> check for relationship properties
3. When individuals have relationships, ALWAYS mention them
4. Use the actual property names from the context (e.g., 'detectedBy' not 'createdBy')
5. If context is insufficient, say so - DO NOT make up information";

const CLOSING: &str =
    "Answer the question using the relationships and properties shown in the context above.";

/// Externally supplied descriptions that ground the prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptGrounding {
    pub graph_schema: String,
    pub ontology_summary: String,
}

/// Number the results in order with their score and text. Results without
/// a text field contribute only their heading.
#[inline]
pub fn assemble_context(results: &[SearchResult]) -> String {
    let mut context = String::from(CONTEXT_HEADER);
    for (i, result) in results.iter().enumerate() {
        let _ = writeln!(context, "Result {} (similarity: {:.3}):", i + 1, result.score);
        if let Some(text) = result.text() {
            context.push_str(text);
            context.push_str("\n\n");
        }
    }
    context
}

/// System message with instructions and grounding, then the question.
#[inline]
pub fn compose_prompt(
    question: &str,
    grounding: &PromptGrounding,
    context: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        "{INSTRUCTIONS}\n\n\
         GRAPH SCHEMA:\n{}\n\n\
         ONTOLOGY SUMMARY:\n{}\n\n\
         RETRIEVED CONTEXT:\n{}\n\n\
         {CLOSING}",
        grounding.graph_schema, grounding.ontology_summary, context
    );

    vec![ChatMessage::system(system), ChatMessage::user(question)]
}
