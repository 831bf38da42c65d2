pub mod mem;

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

/// A single flat document, as inserted into and read back from the store.
pub type Document = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrder {
    Ascending,
    Descending,
}

/// A single-field index requested during collection provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub field: String,
    pub order: IndexOrder,
}

impl IndexSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: IndexOrder::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: IndexOrder::Descending,
        }
    }

    /// The index name registered with the store.
    pub fn name(&self) -> String {
        format!("idx_{}", self.field)
    }
}

/// A handle to a provisioned collection. This is the narrow seam towards the
/// actual database driver; everything behind it (connection pooling, wire
/// protocol, timeouts) is the driver's responsibility.
///
/// Errors are returned as-is: the workload performs no retries and no
/// suppression, so a driver failure propagates out of the operation that
/// triggered it.
#[async_trait]
pub trait Collection: Send + Sync {
    async fn insert_one(&self, document: Document) -> Result<()>;

    async fn insert_many(&self, documents: Vec<Document>) -> Result<()>;

    /// Finds one document whose fields are equal to all fields of `filter`.
    /// `Ok(None)` is a valid result, not an error.
    async fn find_one(&self, filter: Document) -> Result<Option<Document>>;

    /// Runs an aggregation pipeline and returns the complete result set.
    ///
    /// Implementations must materialize the whole result eagerly (never hand
    /// back a lazy cursor): the measured cost of an aggregation includes
    /// iterating everything it produced.
    async fn aggregate(&self, pipeline: &[Value]) -> Result<Vec<Document>>;
}

/// Provisions collections and their indexes.
///
/// `ensure_collection` is idempotent and safe to call concurrently from many
/// sessions: creating an already-existing collection or index is a no-op.
/// The returned pair is `(primary, secondary)`; the secondary handle routes
/// reads to a replica where the deployment has one, so replica read latency
/// can be measured separately from primary write latency.
#[async_trait]
pub trait CollectionProvisioner: Send + Sync {
    async fn ensure_collection(
        &self,
        name: &str,
        indexes: &[IndexSpec],
    ) -> Result<(Arc<dyn Collection>, Arc<dyn Collection>)>;
}
