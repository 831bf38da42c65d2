use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;

/// Defines the configuration of a stress run.
pub struct Configuration {
    /// The maximum duration of the run.
    ///
    /// Sessions may finish earlier (e.g. when a session decides to break),
    /// but no session will be issued another operation after `max_duration`
    /// has elapsed.
    ///
    /// If `None`, the run duration is unlimited.
    pub max_duration: Option<Duration>,

    /// The number of simulated users.
    ///
    /// The tool spawns as many tokio tasks as this number specifies. Each
    /// task owns exactly one [`Session`] and performs its operations strictly
    /// sequentially.
    ///
    /// Must not be zero.
    pub users: u64,

    /// The maximum number of operations to be performed per second,
    /// counted across all sessions. If `None`, there is no rate limit.
    pub rate_limit_per_second: Option<f64>,

    /// Creates one [`Session`] per simulated user.
    pub session_factory: Arc<dyn SessionFactory>,
}

/// Contains all necessary context needed to execute a single operation.
pub struct OperationContext {
    /// The current ID of the operation being performed.
    ///
    /// The tool tries to issue operation IDs sequentially, however because
    /// of the parallelism the operations can be reordered. To be more precise,
    /// if an operation with ID `X` > 0 was issued, then the tool has attempted
    /// or will attempt to execute operations of IDs less than `X`.
    pub operation_id: u64,

    /// When the rate limiter scheduled this operation to start. Equal to
    /// `actual_start_time` when no rate limit is configured.
    ///
    /// Latency measured against this timestamp includes the time the
    /// operation spent waiting for a free slot, which corrects for
    /// coordinated omission.
    pub scheduled_start_time: Instant,

    /// When the worker actually started executing the operation.
    pub actual_start_time: Instant,
}

/// One simulated user of the system under test.
///
/// A session is owned by a single worker task and is never shared, so
/// implementations are free to keep mutable, unsynchronized state (caches,
/// rngs). The harness guarantees that `on_start` completes before the first
/// `execute`, that `execute` calls never overlap, and that `on_stop` runs
/// only between operations.
#[async_trait]
pub trait Session: Send {
    /// Called exactly once, before any operation is issued to this session.
    /// This is the place for provisioning work (collections, indexes).
    /// An error here is fatal for the whole run.
    async fn on_start(&mut self) -> Result<()>;

    /// Executes one operation tick.
    ///
    /// Returns `ControlFlow::Break` if the session decided to finish its
    /// work. Errors are not retried or suppressed; they propagate to the
    /// harness and stop the run - for a measurement tool, failures are
    /// signal, not noise.
    async fn execute(&mut self, ctx: &OperationContext) -> Result<ControlFlow<()>>;

    /// Called when the session leaves its operation loop without an error.
    /// Session-local state is discarded here; nothing persists.
    fn on_stop(&mut self);
}

/// Creates [`Session`] instances, one per simulated user.
pub trait SessionFactory: Send + Sync {
    fn create(&self) -> Box<dyn Session>;
}
