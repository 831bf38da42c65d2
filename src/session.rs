//! The per-user session: one instance per simulated user, driven by the run
//! harness.
//!
//! A session provisions the collection on start, owns one sample cache per
//! entity type, and routes every weighted tick to a generator, a cache and
//! the database handles. Bulk inserts intentionally bypass the sample
//! caches: only single inserts feed them, so point lookups only ever target
//! singly-inserted documents even though bulk inserts produce far more rows.
//! This asymmetry is inherited from the workload this tool reproduces; keep
//! it unless the traffic shape is deliberately revised.

use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use strum::IntoEnumIterator;

use crate::configuration::{OperationContext, Session, SessionFactory};
use crate::db::{Collection, CollectionProvisioner, Document, IndexSpec};
use crate::generate::{self, Entity};
use crate::sample_cache::SampleCache;
use crate::settings::Settings;
use crate::stats::{OpOutcome, ShardedStats};
use crate::workload::{MixSampler, WorkloadMix};

/// What a mix entry does when its turn comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert(Entity),
    BulkInsert(Entity),
    Find(Entity),
    Aggregate,
}

/// Document counts of the bulk-insert variants. Each variant is a separate
/// mix entry so that different write-amplification regimes can be weighted
/// independently.
pub const BULK_BATCH_SIZES: [usize; 3] = [10, 100, 1000];

/// Builds the full operation mix: per entity one single insert, one find and
/// three bulk-insert variants, plus the aggregation pipeline.
pub fn build_workload_mix(settings: &Settings) -> WorkloadMix<OpKind> {
    let mut mix = WorkloadMix::new();
    for entity in Entity::iter() {
        mix.register(
            format!("insert_{entity}"),
            settings.insert_weight,
            OpKind::Insert(entity),
        );
        mix.register(
            format!("find_{entity}"),
            settings.find_weight,
            OpKind::Find(entity),
        );
        for batch_size in BULK_BATCH_SIZES {
            mix.register_batched(
                format!("insert_{}_bulk_{}", entity.plural(), batch_size),
                settings.bulk_insert_weight,
                batch_size,
                OpKind::BulkInsert(entity),
            );
        }
    }
    mix.register(
        "run_aggregation_pipeline",
        settings.agg_pipe_weight,
        OpKind::Aggregate,
    );
    mix
}

/// The fixed analytic query: products per category, largest count first.
///
/// Stage by stage: group everything by `category_id` counting into
/// `total_products`, copy the grouping key into a `category_id` field, drop
/// the implicit `_id`, sort descending by the count.
pub fn category_count_pipeline() -> Vec<Value> {
    vec![
        json!({"$group": {"_id": "$category_id", "total_products": {"$sum": 1}}}),
        json!({"$set": {"category_id": "$_id"}}),
        json!({"$unset": ["_id"]}),
        json!({"$sort": {"total_products": -1}}),
    ]
}

// Orders are re-located through a composite key; all other entities use a
// single name field.
type OrderKey = (i64, String);

struct EntityCaches {
    products: SampleCache<String>,
    categories: SampleCache<String>,
    customers: SampleCache<String>,
    orders: SampleCache<OrderKey>,
}

impl EntityCaches {
    fn new(capacity: usize) -> Self {
        Self {
            products: SampleCache::new(capacity),
            categories: SampleCache::new(capacity),
            customers: SampleCache::new(capacity),
            orders: SampleCache::new(capacity),
        }
    }
}

// Everything a session owns while it is running. Dropped wholesale on stop;
// nothing survives the session.
struct Active {
    collection: Arc<dyn Collection>,
    collection_secondary: Arc<dyn Collection>,
    caches: EntityCaches,
}

enum Phase {
    Unstarted,
    Running(Active),
    Stopped,
}

pub struct WorkloadSession {
    settings: Arc<Settings>,
    provisioner: Arc<dyn CollectionProvisioner>,
    mix: Arc<WorkloadMix<OpKind>>,
    sampler: MixSampler,
    stats: Arc<ShardedStats>,
    rng: StdRng,
    phase: Phase,
}

pub struct WorkloadSessionFactory {
    settings: Arc<Settings>,
    provisioner: Arc<dyn CollectionProvisioner>,
    mix: Arc<WorkloadMix<OpKind>>,
    sampler: MixSampler,
    stats: Arc<ShardedStats>,
}

impl WorkloadSessionFactory {
    /// Validates the mix once, so that a degenerate weight configuration
    /// fails here - at startup - rather than in some session later.
    pub fn new(
        settings: Arc<Settings>,
        mix: Arc<WorkloadMix<OpKind>>,
        provisioner: Arc<dyn CollectionProvisioner>,
        stats: Arc<ShardedStats>,
    ) -> Result<Self> {
        let sampler = MixSampler::new(&mix)?;
        Ok(Self {
            settings,
            provisioner,
            mix,
            sampler,
            stats,
        })
    }
}

impl SessionFactory for WorkloadSessionFactory {
    fn create(&self) -> Box<dyn Session> {
        Box::new(WorkloadSession {
            settings: Arc::clone(&self.settings),
            provisioner: Arc::clone(&self.provisioner),
            mix: Arc::clone(&self.mix),
            sampler: self.sampler.clone(),
            stats: Arc::clone(&self.stats),
            rng: StdRng::from_entropy(),
            phase: Phase::Unstarted,
        })
    }
}

#[async_trait]
impl Session for WorkloadSession {
    async fn on_start(&mut self) -> Result<()> {
        anyhow::ensure!(
            matches!(self.phase, Phase::Unstarted),
            "the session was started twice"
        );

        let indexes = [IndexSpec::ascending("product_name")];
        let (collection, collection_secondary) = self
            .provisioner
            .ensure_collection(&self.settings.collection_name, &indexes)
            .await
            .context("failed to provision the collection")?;

        tracing::debug!(
            collection = %self.settings.collection_name,
            "session started"
        );

        self.phase = Phase::Running(Active {
            collection,
            collection_secondary,
            caches: EntityCaches::new(self.settings.cache_capacity),
        });
        Ok(())
    }

    async fn execute(&mut self, ctx: &OperationContext) -> Result<ControlFlow<()>> {
        let op_index = self.sampler.pick(&mut self.rng);
        let (kind, batch_size) = {
            let entry = &self.mix.entries()[op_index];
            (entry.kind, entry.batch_size.unwrap_or(1))
        };

        let Phase::Running(active) = &mut self.phase else {
            anyhow::bail!("an operation was issued to a session that is not running");
        };

        let outcome = match kind {
            OpKind::Insert(entity) => insert_one(active, &mut self.rng, entity).await,
            OpKind::BulkInsert(entity) => {
                insert_bulk(active, &mut self.rng, entity, batch_size).await
            }
            OpKind::Find(entity) => find_one(active, &mut self.rng, entity).await,
            OpKind::Aggregate => aggregate(active, self.settings.aggregate_on_primary).await,
        };

        if let Err(err) = outcome.as_ref() {
            tracing::error!(
                operation = %self.mix.entries()[op_index].name,
                error = %err,
                "operation failed",
            );
        }

        self.stats.get_shard_mut().account(op_index, ctx, &outcome);
        outcome.map(|_| ControlFlow::Continue(()))
    }

    fn on_stop(&mut self) {
        // Handles and caches are discarded with the Active state.
        self.phase = Phase::Stopped;
        tracing::debug!("session stopped");
    }
}

// Generates one document, remembers its sample key, inserts it.
// The key is offered before the insert call; an insert failure propagates
// anyway and ends the run, so the cache cannot leak bad keys into
// measurements.
async fn insert_one(active: &mut Active, rng: &mut StdRng, entity: Entity) -> Result<OpOutcome> {
    let document = generate::generate(entity, rng);

    let caches = &mut active.caches;
    match entity {
        Entity::Product => caches
            .products
            .offer(rng, string_field(&document, "product_name")?),
        Entity::Category => caches
            .categories
            .offer(rng, string_field(&document, "category_name")?),
        Entity::Customer => caches.customers.offer(rng, string_field(&document, "name")?),
        Entity::Order => caches.orders.offer(rng, order_key(&document)?),
    }

    active.collection.insert_one(document).await?;
    Ok(OpOutcome::Performed)
}

// One insert_many call with `batch_size` independent documents. Does not
// touch the sample caches; see the module comment.
async fn insert_bulk(
    active: &mut Active,
    rng: &mut StdRng,
    entity: Entity,
    batch_size: usize,
) -> Result<OpOutcome> {
    let documents = (0..batch_size)
        .map(|_| generate::generate(entity, rng))
        .collect();
    active.collection.insert_many(documents).await?;
    Ok(OpOutcome::Performed)
}

// An indexed point lookup for a key sampled from the entity's cache. Skips
// the tick when no single insert has completed yet. A lookup miss is an
// uninteresting measurement, not an error.
async fn find_one(active: &mut Active, rng: &mut StdRng, entity: Entity) -> Result<OpOutcome> {
    let caches = &mut active.caches;
    let filter = match entity {
        Entity::Product => match caches.products.sample(rng) {
            Some(name) => field_filter("product_name", json!(name)),
            None => return Ok(OpOutcome::Skipped),
        },
        Entity::Category => match caches.categories.sample(rng) {
            Some(name) => field_filter("category_name", json!(name)),
            None => return Ok(OpOutcome::Skipped),
        },
        Entity::Customer => match caches.customers.sample(rng) {
            Some(name) => field_filter("name", json!(name)),
            None => return Ok(OpOutcome::Skipped),
        },
        Entity::Order => match caches.orders.sample(rng) {
            Some((customer_id, order_date)) => {
                let mut filter = field_filter("customer_id", json!(customer_id));
                filter.insert("order_date".to_owned(), json!(order_date));
                filter
            }
            None => return Ok(OpOutcome::Skipped),
        },
    };

    let _ = active.collection.find_one(filter).await?;
    Ok(OpOutcome::Performed)
}

// The fixed pipeline against the secondary handle (primary only when
// explicitly configured). The contract materializes the complete result
// set, which is then discarded - the cost is the measurement.
async fn aggregate(active: &mut Active, on_primary: bool) -> Result<OpOutcome> {
    let target = if on_primary {
        &active.collection
    } else {
        &active.collection_secondary
    };

    let _results = target.aggregate(&category_count_pipeline()).await?;
    Ok(OpOutcome::Performed)
}

fn field_filter(field: &str, value: Value) -> Document {
    let mut filter = Document::new();
    filter.insert(field.to_owned(), value);
    filter
}

fn string_field(document: &Document, field: &str) -> Result<String> {
    document
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .with_context(|| format!("the generated document has no text field {field:?}"))
}

fn order_key(document: &Document) -> Result<OrderKey> {
    let customer_id = document
        .get("customer_id")
        .and_then(Value::as_i64)
        .context("the generated order has no customer_id")?;
    let order_date = string_field(document, "order_date")?;
    Ok((customer_id, order_date))
}
