//! Recording fakes for the database contracts, used by session tests to
//! assert on the exact call sequence a workload produces.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;

use crate::db::{Collection, CollectionProvisioner, Document, IndexSpec};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DbCall {
    InsertOne(Document),
    InsertMany(usize),
    FindOne(Document),
    // Number of pipeline stages.
    Aggregate(usize),
}

/// Records every call; finds return nothing, aggregations return an empty
/// result set. `fail_next` injects a one-shot failure.
#[derive(Default)]
pub(crate) struct RecordingCollection {
    pub calls: Mutex<Vec<DbCall>>,
    fail_next: AtomicBool,
}

impl RecordingCollection {
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("injected database failure");
        }
        Ok(())
    }
}

#[async_trait]
impl Collection for RecordingCollection {
    async fn insert_one(&self, document: Document) -> Result<()> {
        self.maybe_fail()?;
        self.calls.lock().push(DbCall::InsertOne(document));
        Ok(())
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<()> {
        self.maybe_fail()?;
        self.calls.lock().push(DbCall::InsertMany(documents.len()));
        Ok(())
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        self.maybe_fail()?;
        self.calls.lock().push(DbCall::FindOne(filter));
        Ok(None)
    }

    async fn aggregate(&self, pipeline: &[Value]) -> Result<Vec<Document>> {
        self.maybe_fail()?;
        self.calls.lock().push(DbCall::Aggregate(pipeline.len()));
        Ok(Vec::new())
    }
}

/// Hands out a distinct recording collection as the primary and the
/// secondary, so tests can tell which handle an operation targeted.
#[derive(Default)]
pub(crate) struct RecordingProvisioner {
    pub primary: Arc<RecordingCollection>,
    pub secondary: Arc<RecordingCollection>,
    pub ensure_calls: Mutex<Vec<(String, Vec<IndexSpec>)>>,
}

#[async_trait]
impl CollectionProvisioner for RecordingProvisioner {
    async fn ensure_collection(
        &self,
        name: &str,
        indexes: &[IndexSpec],
    ) -> Result<(Arc<dyn Collection>, Arc<dyn Collection>)> {
        self.ensure_calls
            .lock()
            .push((name.to_owned(), indexes.to_vec()));
        Ok((
            Arc::clone(&self.primary) as Arc<dyn Collection>,
            Arc::clone(&self.secondary) as Arc<dyn Collection>,
        ))
    }
}
