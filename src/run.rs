use std::future::Future;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;

use crate::configuration::{Configuration, OperationContext, SessionFactory};

// Rate limits operations by issuing timestamps indicating when the next
// operation should happen. Uses atomics, can be shared between threads.
struct RateLimiter {
    base: Instant,
    increment_nanos: u64,
    nanos_counter: AtomicU64,
}

impl RateLimiter {
    pub fn new(base: Instant, ops_per_second: f64) -> Self {
        let increment_nanos = (1_000_000_000f64 / ops_per_second) as u64;
        Self {
            base,
            increment_nanos,
            nanos_counter: AtomicU64::new(0),
        }
    }

    pub fn issue_next_start_time(&self) -> Instant {
        let nanos = self
            .nanos_counter
            .fetch_add(self.increment_nanos, Ordering::Relaxed);

        self.base + Duration::from_nanos(nanos)
    }
}

// When an operation ID equal or larger to this value is issued, the worker
// task will stop itself. This is used in the `ask_to_stop` method
// which sets the operation_counter to this value. The value of this constant
// is chosen to be very large so that it is impossible to reach it, and
// small enough so that operation execution attempts which happen after
// `ask_to_stop` do not overflow it.
const INVALID_OP_ID_THRESHOLD: u64 = 1u64 << 63u64;

// Represents shareable state and configuration of the worker tasks.
struct WorkerContext {
    operation_counter: AtomicU64,
    session_factory: Arc<dyn SessionFactory>,

    rate_limiter: Option<RateLimiter>,
}

impl WorkerContext {
    pub fn new(config: &Configuration, now: Instant) -> Self {
        Self {
            operation_counter: AtomicU64::new(0),
            session_factory: Arc::clone(&config.session_factory),

            rate_limiter: config
                .rate_limit_per_second
                .map(|rate| RateLimiter::new(now, rate)),
        }
    }

    // Prevents more operations from being issued. Workers notice this
    // between operations, so a session is never interrupted mid-call.
    pub fn ask_to_stop(&self) {
        self.operation_counter
            .store(INVALID_OP_ID_THRESHOLD, Ordering::Relaxed);
    }

    // Issues the next operation id. If the context got a signal to stop
    // the run, it will return `None`.
    fn issue_operation_id(&self) -> Option<u64> {
        let id = self.operation_counter.fetch_add(1, Ordering::Relaxed);
        (id < INVALID_OP_ID_THRESHOLD).then_some(id)
    }

    // Drives one session: creates it, runs its start hook, then repeatedly
    // executes operations until the run is asked to stop or an execution
    // either returns `Err` or `ControlFlow::Break`.
    pub async fn run_worker(&self) -> Result<()> {
        let mut session = self.session_factory.create();
        session.on_start().await?;

        while let Some(op_id) = self.issue_operation_id() {
            let scheduled_start_time = match &self.rate_limiter {
                Some(rate_limiter) => {
                    let start_time = rate_limiter.issue_next_start_time();
                    tokio::time::sleep_until(start_time).await;
                    start_time
                }
                None => Instant::now(),
            };

            let ctx = OperationContext {
                operation_id: op_id,
                scheduled_start_time,
                actual_start_time: Instant::now(),
            };

            match session.execute(&ctx).await {
                Ok(ControlFlow::Continue(_)) => continue,
                Ok(ControlFlow::Break(_)) => break,
                Err(err) => return Err(err),
            }
        }

        session.on_stop();
        Ok(())
    }
}

/// Allows stopping the run from the outside, e.g. on a signal.
/// The stop is always observed between operations, never mid-call.
pub struct RunController {
    ctx: Arc<WorkerContext>,
}

impl RunController {
    pub fn ask_to_stop(&self) {
        self.ctx.ask_to_stop();
    }
}

/// Starts the run described by `config` and returns a controller along with
/// a future which resolves when all the worker tasks are done.
pub fn run(config: Configuration) -> (RunController, impl Future<Output = Result<()>>) {
    let start_time = Instant::now();
    let ctx = Arc::new(WorkerContext::new(&config, start_time));

    let controller = RunController {
        ctx: Arc::clone(&ctx),
    };

    let run_future = async move {
        // Spawn one worker task per simulated user
        let mut worker_handles = (0..config.users)
            .map(|_| {
                let ctx_clone = Arc::clone(&ctx);
                let (fut, handle) = async move { ctx_clone.run_worker().await }.remote_handle();
                tokio::task::spawn(fut);
                handle
            })
            .collect::<FuturesUnordered<_>>();

        // If there is a time limit, spawn a task which will ask_to_stop
        // after the run period has elapsed
        let ctx_clone = Arc::clone(&ctx);
        let _stopper_handle = config.max_duration.map(move |duration| {
            let (fut, handle) = async move {
                tokio::time::sleep_until(start_time + duration).await;
                ctx_clone.ask_to_stop();
            }
            .remote_handle();
            tokio::task::spawn(fut);
            handle
        });

        let mut result: Result<()> = Ok(());

        while let Some(worker_result) = worker_handles.next().await {
            if let Err(err) = worker_result {
                result = Err(err);
                ctx.ask_to_stop();
            }
        }

        result
    };

    (controller, run_future)
}
