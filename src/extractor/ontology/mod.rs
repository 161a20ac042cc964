
use std::cmp::Ordering;
use std::fmt::Write;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::graph::shared_format;
use super::{Chunk, short_name};

/// Asserted content of an OWL ontology. Names may be full IRIs; chunks use
/// their short form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologySnapshot {
    pub classes: Vec<OntologyClass>,
    pub individuals: Vec<OntologyIndividual>,
    pub object_properties: Vec<OntologyObjectProperty>,
    pub data_properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyClass {
    pub iri: String,
    #[serde(default)]
    pub super_classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyIndividual {
    pub iri: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub object_assertions: Vec<ObjectAssertion>,
    #[serde(default)]
    pub data_assertions: Vec<DataAssertion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAssertion {
    pub property: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAssertion {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyObjectProperty {
    pub iri: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub ranges: Vec<String>,
}

fn sorted_tokens<'a>(
    items: impl Iterator<Item = &'a String>,
    render: impl Fn(&str) -> String,
) -> Vec<String> {
    items.map(|item| render(short_name(item))).sorted().collect()
}

fn by_short_name(a: &str, b: &str) -> Ordering {
    short_name(a)
        .cmp(short_name(b))
        .then_with(|| a.cmp(b))
}

/// Classes, then individuals, then object properties, each ordered by short
/// name. Keys are `ontology_<position>` in that order.
#[inline]
pub fn ontology_chunks(snapshot: &OntologySnapshot) -> Vec<Chunk> {
    let mut entries: Vec<(String, &'static str, String)> = Vec::new();

    for class in snapshot
        .classes
        .iter()
        .sorted_by(|a, b| by_short_name(&a.iri, &b.iri))
    {
        let name = short_name(&class.iri);
        let tokens = sorted_tokens(class.super_classes.iter(), |sup| {
            format!("subClassOf {sup}")
        });
        entries.push((shared_format("OWL Class", name, &tokens), "class", name.to_string()));
    }

    for individual in snapshot
        .individuals
        .iter()
        .sorted_by(|a, b| by_short_name(&a.iri, &b.iri))
    {
        let name = short_name(&individual.iri);
        let mut tokens = sorted_tokens(individual.types.iter(), |class| format!("type:{class}"));
        tokens.extend(
            individual
                .object_assertions
                .iter()
                .map(|a| format!("{}:{}", short_name(&a.property), short_name(&a.target)))
                .sorted(),
        );
        tokens.extend(
            individual
                .data_assertions
                .iter()
                .map(|a| format!("{}:'{}'", short_name(&a.property), a.value))
                .sorted(),
        );
        entries.push((
            shared_format("Individual", name, &tokens),
            "individual",
            name.to_string(),
        ));
    }

    for property in snapshot
        .object_properties
        .iter()
        .sorted_by(|a, b| by_short_name(&a.iri, &b.iri))
    {
        let name = short_name(&property.iri);
        let mut tokens = sorted_tokens(property.domains.iter(), |c| format!("domain:{c}"));
        tokens.extend(sorted_tokens(property.ranges.iter(), |c| format!("range:{c}")));
        entries.push((
            shared_format("OWL Object Property", name, &tokens),
            "object_property",
            name.to_string(),
        ));
    }

    let chunks = entries
        .into_iter()
        .enumerate()
        .map(|(i, (text, kind, name))| {
            Chunk::new(format!("ontology_{i}"), text, "ontology")
                .with_field("kind", kind)
                .with_field("name", name)
        })
        .collect_vec();

    debug!("Extracted {} ontology chunks", chunks.len());
    chunks
}

/// Element counts for the ontology summary section of the prompt.
#[inline]
pub fn ontology_summary(snapshot: &OntologySnapshot) -> String {
    let mut summary = String::from("Current Ontology Summary:\n");
    let _ = writeln!(summary, "- Classes: {}", snapshot.classes.len());
    let _ = writeln!(summary, "- Individuals: {}", snapshot.individuals.len());
    let _ = writeln!(
        summary,
        "- Object Properties: {}",
        snapshot.object_properties.len()
    );
    let _ = writeln!(
        summary,
        "- Data Properties: {}",
        snapshot.data_properties.len()
    );
    summary
}
