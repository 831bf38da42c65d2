//! Per-operation statistics.
//!
//! Each worker thread accounts into its own shard, so the hot path takes an
//! uncontended `parking_lot::Mutex`. The reporting side periodically locks
//! every shard, combines them into one `Stats` value and clears the shards.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hdrhistogram::Histogram;
use parking_lot::{Mutex, MutexGuard};
use thread_local::ThreadLocal;
use tokio::time::Instant;

use crate::configuration::OperationContext;
use crate::workload::WorkloadMix;

/// What a single operation tick amounted to.
///
/// A skipped tick (e.g. a find against a still-empty sample cache) performed
/// no database call and must not pollute the latency distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    Performed,
    Skipped,
}

#[derive(Clone, Copy)]
pub enum LatencyType {
    /// Measured from the moment the operation actually started.
    Raw,
    /// Measured from the moment the rate limiter scheduled the operation to
    /// start, which corrects for coordinated omission. Only meaningfully
    /// different from `Raw` when a rate limit is configured.
    AdjustedForCoordinatedOmission,
}

fn new_histogram() -> Histogram<u64> {
    // Auto-resizing, three significant digits, recording nanoseconds.
    Histogram::new(3).expect("three significant digits is a valid precision")
}

pub struct LatencyHistograms {
    pub raw: Histogram<u64>,
    pub co_fixed: Histogram<u64>,
}

impl LatencyHistograms {
    fn new() -> Self {
        Self {
            raw: new_histogram(),
            co_fixed: new_histogram(),
        }
    }
}

/// Counters for one workload mix entry.
pub struct OpStats {
    pub operations: u64,
    pub errors: u64,
    pub skipped: u64,
    pub latencies: Option<LatencyHistograms>,
}

impl OpStats {
    fn new(measure_latency: bool) -> Self {
        Self {
            operations: 0,
            errors: 0,
            skipped: 0,
            latencies: measure_latency.then(LatencyHistograms::new),
        }
    }

    fn clear(&mut self) {
        self.operations = 0;
        self.errors = 0;
        self.skipped = 0;
        if let Some(latencies) = &mut self.latencies {
            latencies.raw.reset();
            latencies.co_fixed.reset();
        }
    }

    fn combine(&mut self, other: &Self) {
        self.operations += other.operations;
        self.errors += other.errors;
        self.skipped += other.skipped;
        if let (Some(mine), Some(theirs)) = (&mut self.latencies, &other.latencies) {
            mine.raw.add(&theirs.raw).unwrap();
            mine.co_fixed.add(&theirs.co_fixed).unwrap();
        }
    }
}

/// Statistics for a whole workload mix, indexed the same way as the mix's
/// entry list.
pub struct Stats {
    per_op: Vec<OpStats>,
}

impl Stats {
    /// Records the outcome of one operation tick of mix entry `op_index`.
    /// Failed operations count as operations and as errors; skipped ticks
    /// count separately and record no latency.
    pub fn account(&mut self, op_index: usize, ctx: &OperationContext, outcome: &Result<OpOutcome>) {
        let op = &mut self.per_op[op_index];
        match outcome {
            Ok(OpOutcome::Performed) => {
                op.operations += 1;
                if let Some(latencies) = &mut op.latencies {
                    let now = Instant::now();
                    let _ = latencies
                        .raw
                        .record((now - ctx.actual_start_time).as_nanos() as u64);
                    let _ = latencies
                        .co_fixed
                        .record((now - ctx.scheduled_start_time).as_nanos() as u64);
                }
            }
            Ok(OpOutcome::Skipped) => op.skipped += 1,
            Err(_) => {
                op.operations += 1;
                op.errors += 1;
            }
        }
    }

    pub fn per_op(&self) -> &[OpStats] {
        &self.per_op
    }

    pub fn total_operations(&self) -> u64 {
        self.per_op.iter().map(|op| op.operations).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.per_op.iter().map(|op| op.errors).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.per_op.iter().map(|op| op.skipped).sum()
    }

    /// All per-operation histograms of the given type merged into one, or
    /// `None` when latency measurement is off.
    pub fn merged_latency(&self, typ: LatencyType) -> Option<Histogram<u64>> {
        let mut merged = None;
        for op in &self.per_op {
            let latencies = op.latencies.as_ref()?;
            let histogram = match typ {
                LatencyType::Raw => &latencies.raw,
                LatencyType::AdjustedForCoordinatedOmission => &latencies.co_fixed,
            };
            merged
                .get_or_insert_with(new_histogram)
                .add(histogram)
                .unwrap();
        }
        merged
    }

    pub fn clear(&mut self) {
        for op in &mut self.per_op {
            op.clear();
        }
    }

    pub fn combine(&mut self, other: &Self) {
        debug_assert_eq!(self.per_op.len(), other.per_op.len());
        for (mine, theirs) in self.per_op.iter_mut().zip(&other.per_op) {
            mine.combine(theirs);
        }
    }
}

pub struct StatsFactory {
    op_count: usize,
    measure_latency: bool,
}

impl StatsFactory {
    pub fn new(op_count: usize, measure_latency: bool) -> Self {
        Self {
            op_count,
            measure_latency,
        }
    }

    pub fn create(&self) -> Stats {
        Stats {
            per_op: (0..self.op_count)
                .map(|_| OpStats::new(self.measure_latency))
                .collect(),
        }
    }
}

/// A sharded statistics structure.
///
/// For each thread, a separate instance of the stats structure is kept,
/// and that thread keeps accounting its own statistics in that instance.
/// When it is time to report the statistics, stats from all threads are
/// collected into one object and returned, while the per-thread stats
/// objects are cleared.
///
/// Each shard is protected by a separate parking_lot::Mutex - assuming that
/// the structure is read infrequently, they will be uncontended most of the
/// time.
pub struct ShardedStats {
    shards: ThreadLocal<Arc<Mutex<Stats>>>,
    all: Mutex<Vec<Arc<Mutex<Stats>>>>,
    factory: StatsFactory,
}

impl ShardedStats {
    pub fn new(factory: StatsFactory) -> Self {
        Self {
            shards: ThreadLocal::new(),
            all: Mutex::new(Vec::new()),
            factory,
        }
    }

    /// Gets and locks access to this thread's stats shard.
    pub fn get_shard_mut(&self) -> MutexGuard<'_, Stats> {
        self.shards
            .get_or(|| {
                let shard = Arc::new(Mutex::new(self.factory.create()));
                self.all.lock().push(shard.clone());
                shard
            })
            .lock()
    }

    /// Combines statistics from all shards and clears them.
    pub fn get_combined_and_clear(&self) -> Stats {
        let mut combined = self.factory.create();
        for shard in self.all.lock().iter() {
            let shard = &mut shard.lock();
            combined.combine(shard);
            shard.clear();
        }
        combined
    }
}

/// Writes periodic one-line summaries and a final per-operation breakdown.
pub struct StatsPrinter {
    start_time: Instant,
    op_names: Vec<String>,
    latency_type: Option<LatencyType>,
}

impl StatsPrinter {
    pub fn new<T>(mix: &WorkloadMix<T>, latency_type: Option<LatencyType>) -> Self {
        Self {
            start_time: Instant::now(),
            op_names: mix.entries().iter().map(|e| e.name.clone()).collect(),
            latency_type,
        }
    }

    pub fn print_header(&self, out: &mut impl Write) -> Result<()> {
        if self.latency_type.is_some() {
            writeln!(
                out,
                "{:>6} {:>8} {:>7} {:>7} {:>10} {:>10} {:>10} {:>10}",
                "time", "ops", "errors", "skipped", "mean", "median", "99th", "max",
            )?;
        } else {
            writeln!(
                out,
                "{:>6} {:>8} {:>7} {:>7}",
                "time", "ops", "errors", "skipped",
            )?;
        }
        Ok(())
    }

    /// Prints one line covering the interval since the previous
    /// `get_combined_and_clear`.
    pub fn print_partial(&self, stats: &Stats, out: &mut impl Write) -> Result<()> {
        let elapsed = format!("{}s", (Instant::now() - self.start_time).as_secs());

        match self.latency_type.and_then(|typ| stats.merged_latency(typ)) {
            Some(histogram) => {
                writeln!(
                    out,
                    "{:>6} {:>8} {:>7} {:>7} {:>10} {:>10} {:>10} {:>10}",
                    elapsed,
                    stats.total_operations(),
                    stats.total_errors(),
                    stats.total_skipped(),
                    format_nanos(histogram.mean() as u64),
                    format_nanos(histogram.value_at_quantile(0.5)),
                    format_nanos(histogram.value_at_quantile(0.99)),
                    format_nanos(histogram.max()),
                )?;
            }
            None => {
                writeln!(
                    out,
                    "{:>6} {:>8} {:>7} {:>7}",
                    elapsed,
                    stats.total_operations(),
                    stats.total_errors(),
                    stats.total_skipped(),
                )?;
            }
        }
        Ok(())
    }

    /// Prints the end-of-run breakdown, one line per mix entry that
    /// performed at least one operation.
    pub fn print_final(&self, stats: &Stats, out: &mut impl Write) -> Result<()> {
        writeln!(out)?;
        writeln!(
            out,
            "{:<28} {:>10} {:>8} {:>8} {:>10} {:>10} {:>10}",
            "operation", "ops", "errors", "skipped", "median", "99th", "max",
        )?;

        for (name, op) in self.op_names.iter().zip(stats.per_op()) {
            if op.operations == 0 && op.skipped == 0 {
                continue;
            }

            let histogram = self.latency_type.map(|typ| match typ {
                LatencyType::Raw => op.latencies.as_ref().map(|l| &l.raw),
                LatencyType::AdjustedForCoordinatedOmission => {
                    op.latencies.as_ref().map(|l| &l.co_fixed)
                }
            });

            match histogram.flatten() {
                Some(histogram) => writeln!(
                    out,
                    "{:<28} {:>10} {:>8} {:>8} {:>10} {:>10} {:>10}",
                    name,
                    op.operations,
                    op.errors,
                    op.skipped,
                    format_nanos(histogram.value_at_quantile(0.5)),
                    format_nanos(histogram.value_at_quantile(0.99)),
                    format_nanos(histogram.max()),
                )?,
                None => writeln!(
                    out,
                    "{:<28} {:>10} {:>8} {:>8}",
                    name, op.operations, op.errors, op.skipped,
                )?,
            }
        }

        writeln!(
            out,
            "\ntotal: {} operations, {} errors, {} skipped",
            stats.total_operations(),
            stats.total_errors(),
            stats.total_skipped(),
        )?;
        Ok(())
    }
}

fn format_nanos(nanos: u64) -> String {
    format!("{:?}", Duration::from_nanos(nanos))
}
