
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Chunk;

pub type Properties = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub relationships: Vec<GraphRelationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub id: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub properties: Properties,
}

impl GraphSnapshot {
    /// Inventory of node labels and relationship patterns, used as the graph
    /// schema section of the prompt.
    #[inline]
    pub fn schema_text(&self) -> String {
        let labels: BTreeSet<&str> = self
            .nodes
            .iter()
            .flat_map(|node| node.labels.iter().map(String::as_str))
            .collect();

        let node_labels: BTreeMap<&str, String> = self
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node.labels.iter().sorted().join(":")))
            .collect();

        let patterns: BTreeSet<String> = self
            .relationships
            .iter()
            .map(|rel| {
                let side = |id: &str| {
                    node_labels
                        .get(id)
                        .filter(|label| !label.is_empty())
                        .map_or_else(|| "()".to_string(), |label| format!("(:{label})"))
                };
                format!("{}-[:{}]->{}", side(&rel.start), rel.rel_type, side(&rel.end))
            })
            .collect();

        let mut schema = String::new();
        let _ = writeln!(schema, "Node labels: {}", labels.iter().join(", "));
        schema.push_str("Relationships:\n");
        for pattern in &patterns {
            let _ = writeln!(schema, "- {pattern}");
        }
        schema
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn property_tokens(properties: &Properties) -> impl Iterator<Item = String> + '_ {
    properties
        .iter()
        .map(|(key, value)| format!("{key}:'{}'", render_value(value)))
}

/// One chunk per node, then one per relationship, both ordered by id.
/// Keys are `graph_<position>`.
#[inline]
pub fn graph_chunks(snapshot: &GraphSnapshot) -> Vec<Chunk> {
    let nodes = snapshot.nodes.iter().sorted_by(|a, b| a.id.cmp(&b.id));
    let relationships = snapshot
        .relationships
        .iter()
        .sorted_by(|a, b| a.id.cmp(&b.id))
        .collect_vec();

    let outgoing_by_node = relationships
        .iter()
        .map(|rel| (rel.start.as_str(), format!("{}->{}", rel.rel_type, rel.end)))
        .into_group_map();
    let incoming_by_node = relationships
        .iter()
        .map(|rel| (rel.end.as_str(), format!("{}<-{}", rel.rel_type, rel.start)))
        .into_group_map();

    let mut texts = Vec::with_capacity(snapshot.nodes.len() + relationships.len());

    for node in nodes {
        let mut tokens: Vec<String> = node
            .labels
            .iter()
            .sorted()
            .map(|label| format!("label:{label}"))
            .collect();
        tokens.extend(property_tokens(&node.properties));

        for edges in [&outgoing_by_node, &incoming_by_node] {
            if let Some(found) = edges.get(node.id.as_str()) {
                tokens.extend(found.iter().sorted().cloned());
            }
        }

        let text = shared_format("Node", &node.id, &tokens);
        texts.push((
            text,
            vec![
                ("kind", "node".to_string()),
                ("entity_id", node.id.clone()),
                ("labels", node.labels.iter().sorted().join(",")),
            ],
        ));
    }

    for rel in &relationships {
        let mut tokens = vec![format!("from:{}", rel.start), format!("to:{}", rel.end)];
        tokens.extend(property_tokens(&rel.properties));

        let text = shared_format("Relationship", &rel.rel_type, &tokens);
        texts.push((
            text,
            vec![
                ("kind", "relationship".to_string()),
                ("entity_id", rel.id.clone()),
                ("relation", rel.rel_type.clone()),
                ("start_id", rel.start.clone()),
                ("end_id", rel.end.clone()),
            ],
        ));
    }

    let chunks = texts
        .into_iter()
        .enumerate()
        .map(|(i, (text, fields))| {
            fields.into_iter().fold(
                Chunk::new(format!("graph_{i}"), text, "graph"),
                |chunk, (name, value)| chunk.with_field(name, value),
            )
        })
        .collect_vec();

    debug!(
        "Extracted {} graph chunks ({} nodes, {} relationships)",
        chunks.len(),
        snapshot.nodes.len(),
        snapshot.relationships.len()
    );
    chunks
}

/// `<Kind>: <name> <token>*`
pub(crate) fn shared_format(kind: &str, name: &str, tokens: &[String]) -> String {
    let mut text = format!("{kind}: {name}");
    for token in tokens {
        text.push(' ');
        text.push_str(token);
    }
    text
}
