//! An in-memory document store.
//!
//! This is the reference implementation of the [`Collection`] and
//! [`CollectionProvisioner`] contracts. The bundled binary runs against it in
//! dry-run mode (measuring generator and mixture overhead without a server),
//! and the tests use it wherever real store semantics are needed. It
//! interprets exactly the aggregation stage forms the workload emits and
//! rejects everything else.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde_json::Value;

use super::{Collection, CollectionProvisioner, Document, IndexSpec};

type SharedDocuments = Arc<Mutex<Vec<Document>>>;

/// Holds every provisioned collection. The "secondary" handle reads the same
/// underlying documents; there is no replication lag to simulate here.
#[derive(Default)]
pub struct MemStore {
    collections: Mutex<HashMap<String, SharedDocuments>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CollectionProvisioner for MemStore {
    async fn ensure_collection(
        &self,
        name: &str,
        _indexes: &[IndexSpec],
    ) -> Result<(Arc<dyn Collection>, Arc<dyn Collection>)> {
        let documents = Arc::clone(
            self.collections
                .lock()
                .entry(name.to_owned())
                .or_default(),
        );

        let primary = Arc::new(MemCollection {
            documents: Arc::clone(&documents),
        });
        let secondary = Arc::new(MemCollection { documents });
        Ok((primary, secondary))
    }
}

pub struct MemCollection {
    documents: SharedDocuments,
}

#[async_trait]
impl Collection for MemCollection {
    async fn insert_one(&self, document: Document) -> Result<()> {
        self.documents.lock().push(document);
        Ok(())
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<()> {
        self.documents.lock().extend(documents);
        Ok(())
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        let documents = self.documents.lock();
        Ok(documents.iter().find(|doc| matches_filter(doc, &filter)).cloned())
    }

    async fn aggregate(&self, pipeline: &[Value]) -> Result<Vec<Document>> {
        let documents = self.documents.lock().clone();
        run_pipeline(documents, pipeline)
    }
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| document.get(field) == Some(expected))
}

fn run_pipeline(documents: Vec<Document>, pipeline: &[Value]) -> Result<Vec<Document>> {
    let mut current = documents;
    for stage in pipeline {
        let stage = stage
            .as_object()
            .context("a pipeline stage must be an object")?;
        anyhow::ensure!(
            stage.len() == 1,
            "a pipeline stage must hold exactly one operator, got {}",
            stage.len()
        );
        let (operator, spec) = stage.iter().next().expect("stage has one entry");

        current = match operator.as_str() {
            "$group" => group(current, spec)?,
            "$set" => set(current, spec)?,
            "$unset" => unset(current, spec)?,
            "$sort" => sort(current, spec)?,
            other => anyhow::bail!("unsupported pipeline stage {other:?}"),
        };
    }
    Ok(current)
}

// Extracts the field name of a "$field" path reference.
fn field_path(value: &Value) -> Result<&str> {
    value
        .as_str()
        .and_then(|path| path.strip_prefix('$'))
        .with_context(|| format!("expected a \"$field\" path, got {value}"))
}

// Supports grouping over a single field path with `$sum` accumulators of a
// numeric literal ({"$sum": 1} style counting).
fn group(documents: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let spec = spec.as_object().context("$group takes an object")?;
    let group_field = field_path(spec.get("_id").context("$group needs an _id")?)?;

    let mut accumulators: Vec<(String, i64)> = Vec::new();
    for (name, acc) in spec.iter().filter(|(name, _)| name.as_str() != "_id") {
        let increment = acc
            .get("$sum")
            .and_then(Value::as_i64)
            .with_context(|| format!("accumulator {name:?} must be {{\"$sum\": <int>}}"))?;
        accumulators.push((name.to_owned(), increment));
    }

    // Group keys keep their first-seen order; a later $sort decides the
    // final ordering.
    let mut groups: Vec<(Value, Vec<i64>)> = Vec::new();
    for document in &documents {
        let key = document.get(group_field).cloned().unwrap_or(Value::Null);
        let index = match groups.iter().position(|(k, _)| *k == key) {
            Some(index) => index,
            None => {
                groups.push((key, vec![0; accumulators.len()]));
                groups.len() - 1
            }
        };
        for (slot, (_, increment)) in groups[index].1.iter_mut().zip(&accumulators) {
            *slot += increment;
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, sums)| {
            let mut result = Document::new();
            result.insert("_id".to_owned(), key);
            for ((name, _), sum) in accumulators.iter().zip(sums) {
                result.insert(name.clone(), Value::from(sum));
            }
            result
        })
        .collect())
}

// {"target": "$source"} copies a field; any other value is set literally.
fn set(mut documents: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let spec = spec.as_object().context("$set takes an object")?;
    for document in &mut documents {
        for (target, source) in spec {
            let value = match field_path(source) {
                Ok(path) => document.get(path).cloned().unwrap_or(Value::Null),
                Err(_) => source.clone(),
            };
            document.insert(target.clone(), value);
        }
    }
    Ok(documents)
}

fn unset(mut documents: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let fields: Vec<&str> = match spec {
        Value::String(field) => vec![field.as_str()],
        Value::Array(fields) => fields
            .iter()
            .map(|field| field.as_str().context("$unset fields must be strings"))
            .collect::<Result<_>>()?,
        other => anyhow::bail!("$unset takes a field name or an array, got {other}"),
    };

    for document in &mut documents {
        for field in &fields {
            document.remove(*field);
        }
    }
    Ok(documents)
}

fn sort(mut documents: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let spec = spec.as_object().context("$sort takes an object")?;
    anyhow::ensure!(spec.len() == 1, "$sort supports exactly one sort key");
    let (field, direction) = spec.iter().next().expect("spec has one entry");
    let descending = match direction.as_i64() {
        Some(1) => false,
        Some(-1) => true,
        _ => anyhow::bail!("sort direction must be 1 or -1, got {direction}"),
    };

    documents.sort_by(|a, b| {
        let ordering = compare_values(a.get(field), b.get(field));
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    Ok(documents)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
