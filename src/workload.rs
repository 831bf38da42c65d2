use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::{Distribution, WeightedIndex};

/// One selectable operation of a [`WorkloadMix`].
///
/// `weight` is a plain non-negative integer so that any weighted-random
/// algorithm can consume it; an entry with weight 0 is never selected.
/// `batch_size`, when present, is the document count of one multi-document
/// insert and must be positive. Variants of the same conceptual operation
/// with different batch sizes are independent entries with independent
/// weights.
#[derive(Debug, Clone)]
pub struct MixEntry<T> {
    pub name: String,
    pub weight: u64,
    pub batch_size: Option<usize>,
    pub kind: T,
}

/// A declarative registry of named, weighted operations.
///
/// Built once at startup and immutable afterwards: the registration phase
/// appends entries in order, then the mix is handed to a [`MixSampler`] (and
/// to the statistics layer, which reports per-entry counters by index).
#[derive(Debug, Default)]
pub struct WorkloadMix<T> {
    entries: Vec<MixEntry<T>>,
}

impl<T> WorkloadMix<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, weight: u64, kind: T) -> &mut Self {
        self.entries.push(MixEntry {
            name: name.into(),
            weight,
            batch_size: None,
            kind,
        });
        self
    }

    pub fn register_batched(
        &mut self,
        name: impl Into<String>,
        weight: u64,
        batch_size: usize,
        kind: T,
    ) -> &mut Self {
        self.entries.push(MixEntry {
            name: name.into(),
            weight,
            batch_size: Some(batch_size),
            kind,
        });
        self
    }

    pub fn entries(&self) -> &[MixEntry<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Samples entry indices of a [`WorkloadMix`] with probability proportional
/// to their weights.
///
/// Construction fails when the mix is empty or all weights are zero; both
/// are configuration errors and must surface before any session starts.
#[derive(Clone)]
pub struct MixSampler {
    index_dist: WeightedIndex<u64>,
}

impl MixSampler {
    pub fn new<T>(mix: &WorkloadMix<T>) -> Result<Self> {
        anyhow::ensure!(!mix.is_empty(), "the workload mix has no operations");

        let weights = mix.entries().iter().map(|entry| entry.weight);
        let index_dist = WeightedIndex::new(weights)
            .context("the workload mix needs at least one positive weight")?;

        Ok(Self { index_dist })
    }

    /// Picks the index of one mix entry.
    pub fn pick(&self, rng: &mut impl Rng) -> usize {
        self.index_dist.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn two_entry_mix(weight_a: u64, weight_b: u64) -> WorkloadMix<char> {
        let mut mix = WorkloadMix::new();
        mix.register("a", weight_a, 'a');
        mix.register("b", weight_b, 'b');
        mix
    }

    #[test]
    fn entries_keep_registration_order() {
        let mut mix = WorkloadMix::new();
        mix.register("single", 3, 0u8)
            .register_batched("bulk_10", 1, 10, 1u8)
            .register_batched("bulk_100", 1, 100, 2u8);

        let names: Vec<_> = mix.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["single", "bulk_10", "bulk_100"]);
        assert_eq!(mix.entries()[0].batch_size, None);
        assert_eq!(mix.entries()[2].batch_size, Some(100));
    }

    #[test]
    fn pick_ratio_follows_weights() {
        let mix = two_entry_mix(5, 1);
        let sampler = MixSampler::new(&mix).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let mut counts = [0u64; 2];
        for _ in 0..100_000 {
            counts[sampler.pick(&mut rng)] += 1;
        }

        // Expect a 5:1 split within 10%.
        let ratio = counts[0] as f64 / counts[1] as f64;
        assert!((4.5..=5.5).contains(&ratio), "observed ratio {ratio}");
    }

    #[test]
    fn zero_weight_entries_are_never_picked() {
        let mut mix = WorkloadMix::new();
        mix.register("never", 0, 'n');
        mix.register("always", 1, 'a');
        mix.register("never_either", 0, 'z');

        let sampler = MixSampler::new(&mix).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..10_000 {
            assert_eq!(sampler.pick(&mut rng), 1);
        }
    }

    #[test]
    fn degenerate_mixes_are_rejected() {
        assert!(MixSampler::new(&WorkloadMix::<char>::new()).is_err());
        assert!(MixSampler::new(&two_entry_mix(0, 0)).is_err());
    }
}
