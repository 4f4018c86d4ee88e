//! Generators and mutators of document payloads.

mod binary;
mod dataset;
mod emp;
mod hierarchical;
pub mod hierarchical_vector;
mod hotel;
mod person;
pub mod vocab;

use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{Map, Value};
use strum_macros::EnumString;

use crate::configuration::WorkloadSpec;
use crate::payload::Payload;

pub use binary::BinaryTemplate;
pub use dataset::DatasetTemplate;
pub use emp::EmpTemplate;
pub use hierarchical::HierarchicalTemplate;
pub use hierarchical_vector::HierarchicalVectorTemplate;
pub use hotel::HotelTemplate;
pub use person::PersonTemplate;

/// The field incremented on every mutation of a generated document.
pub const MUTATION_MARKER: &str = "mutated";

/// Produces the content of documents.
///
/// Implementations are shared by all workers of a phase, so they must not
/// keep mutable state.
pub trait DocumentTemplate: Send + Sync {
    /// Produces the document with the given integer id. The same id always
    /// gives the same document.
    fn generate(&self, id: u64) -> Payload;

    /// Derives a new version of an existing document.
    ///
    /// Only fields from `fields` are modified. If `fields` is empty,
    /// the template modifies its default field.
    fn mutate(&self, existing: Payload, fields: &[String]) -> Result<Payload>;

    /// The name under which documents are exported to the secondary store.
    fn dataset_name(&self) -> &str;
}

/// Template kinds known by name. Any other name refers to a file-backed
/// dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString)]
pub enum TemplateKind {
    #[strum(serialize = "emp", serialize = "Employee")]
    Emp,
    #[strum(serialize = "Person", serialize = "person")]
    Person,
    #[strum(serialize = "Hotel", serialize = "hotel")]
    Hotel,
    #[strum(serialize = "hierarchical", serialize = "Hierarchical")]
    Hierarchical,
    #[strum(serialize = "hierarchical_vector", serialize = "HierarchicalVector")]
    HierarchicalVector,
    #[strum(serialize = "Binary", serialize = "binary")]
    Binary,
    #[strum(disabled)]
    Dataset,
}

impl TemplateKind {
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or(TemplateKind::Dataset)
    }
}

/// Instantiates the template selected by the workload.
pub fn build(spec: &WorkloadSpec) -> Result<Arc<dyn DocumentTemplate>> {
    let template: Arc<dyn DocumentTemplate> = match spec.template {
        TemplateKind::Emp => Arc::new(EmpTemplate),
        TemplateKind::Person => Arc::new(PersonTemplate::new(spec.doc_size)),
        TemplateKind::Hotel => Arc::new(HotelTemplate),
        TemplateKind::Hierarchical => Arc::new(HierarchicalTemplate::new(spec.doc_size)),
        TemplateKind::HierarchicalVector => Arc::new(HierarchicalVectorTemplate),
        TemplateKind::Binary => Arc::new(BinaryTemplate::new(spec.doc_size)),
        TemplateKind::Dataset => {
            let path = spec.data_file.as_ref().ok_or_else(|| {
                anyhow::anyhow!(
                    "template {} is not built in and needs a data file",
                    spec.template_name
                )
            })?;
            let dataset = DatasetTemplate::load(path, &spec.template_name, spec.num_ops)
                .with_context(|| format!("Failed to load dataset from {}", path.display()))?;
            Arc::new(dataset)
        }
    };
    Ok(template)
}

// The generator behind `generate(id)`.
fn rng_for(id: u64) -> StdRng {
    StdRng::seed_from_u64(id)
}

// Extracts the JSON object from a payload which is about to be mutated.
fn into_object(existing: Payload) -> Result<Map<String, Value>> {
    match existing {
        Payload::Json(Value::Object(map)) => Ok(map),
        Payload::Json(other) => Err(anyhow::anyhow!(
            "expected a JSON object, got {}",
            json_kind(&other)
        )),
        Payload::Binary(_) => Err(anyhow::anyhow!("expected a JSON object, got binary data")),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn bump_mutation_marker(doc: &mut Map<String, Value>) {
    let previous = doc
        .get(MUTATION_MARKER)
        .and_then(Value::as_u64)
        .unwrap_or(0);
    doc.insert(MUTATION_MARKER.to_string(), Value::from(previous + 1));
}

// Produces values from `gen` until one differs from `current`.
fn regenerate_distinct(current: Option<&Value>, mut gen: impl FnMut() -> Value) -> Value {
    loop {
        let candidate = gen();
        if Some(&candidate) != current {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_registry() {
        assert_eq!(TemplateKind::resolve("emp"), TemplateKind::Emp);
        assert_eq!(TemplateKind::resolve("Employee"), TemplateKind::Emp);
        assert_eq!(TemplateKind::resolve("Person"), TemplateKind::Person);
        assert_eq!(TemplateKind::resolve("Hotel"), TemplateKind::Hotel);
        assert_eq!(TemplateKind::resolve("Hierarchical"), TemplateKind::Hierarchical);
        assert_eq!(
            TemplateKind::resolve("HierarchicalVector"),
            TemplateKind::HierarchicalVector
        );
        assert_eq!(TemplateKind::resolve("binary"), TemplateKind::Binary);
        assert_eq!(TemplateKind::resolve("napa"), TemplateKind::Dataset);
        assert_eq!(TemplateKind::resolve("Dataset"), TemplateKind::Dataset);
    }

    #[test]
    fn test_dataset_needs_file() {
        let mut spec = crate::test_util::spec_with(10, 100, 0, 0, 1);
        spec.template = TemplateKind::resolve("wiki");
        spec.template_name = "wiki".to_string();
        spec.data_file = None;
        assert!(build(&spec).is_err());
    }

    #[test]
    fn test_into_object() {
        assert!(into_object(Payload::Json(serde_json::json!({"a": 1}))).is_ok());
        assert!(into_object(Payload::Json(serde_json::json!([1]))).is_err());
        assert!(into_object(Payload::Binary(vec![1])).is_err());
    }

    #[test]
    fn test_mutation_marker() {
        let mut doc = Map::new();
        bump_mutation_marker(&mut doc);
        assert_eq!(doc[MUTATION_MARKER], 1);
        bump_mutation_marker(&mut doc);
        assert_eq!(doc[MUTATION_MARKER], 2);
    }
}
