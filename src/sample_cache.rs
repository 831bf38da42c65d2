use rand::Rng;

/// Once the cache is full, an offered key replaces a uniformly chosen slot
/// with probability `1 / REPLACE_ONE_IN`, and is dropped otherwise.
const REPLACE_ONE_IN: u32 = 10;

/// Number of cached keys per entity unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 1000;

/// A bounded buffer of keys of previously written documents, kept so that
/// read operations can target data which is known to exist without letting
/// memory grow with the run.
///
/// The replacement policy is a deliberately biased variant of reservoir
/// sampling: the replacement probability stays fixed at 1/10 once the buffer
/// is full instead of decaying with the number of keys seen. Every `offer` is
/// O(1) and allocation-free after the buffer fills up, and the contents stay
/// "a plausible existing key" rather than a statistically faithful sample -
/// which is all the workload needs. Do not "fix" this to classical reservoir
/// sampling without revisiting the expected traffic shape.
///
/// Keys are not deduplicated; the same key may occupy several slots.
/// Instances are owned by a single session and are never shared, so there is
/// no internal synchronization.
pub struct SampleCache<K> {
    slots: Vec<K>,
    capacity: usize,
}

impl<K> SampleCache<K> {
    /// Creates an empty cache holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Offers a key for admission.
    ///
    /// While the cache has room the key is always appended. At capacity, the
    /// key overwrites a uniformly chosen slot with probability 1/10 and is
    /// silently dropped otherwise.
    pub fn offer(&mut self, rng: &mut impl Rng, key: K) {
        if self.slots.len() < self.capacity {
            self.slots.push(key);
        } else if self.capacity > 0 && rng.gen_range(0..REPLACE_ONE_IN) == 0 {
            let slot = rng.gen_range(0..self.slots.len());
            self.slots[slot] = key;
        }
    }

    /// Returns a uniformly chosen key, or `None` while the cache is empty.
    ///
    /// An empty cache is not an error: the caller's contract is to skip its
    /// turn. Composite keys are sampled whole.
    pub fn sample(&self, rng: &mut impl Rng) -> Option<&K> {
        if self.slots.is_empty() {
            return None;
        }
        Some(&self.slots[rng.gen_range(0..self.slots.len())])
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn size_is_bounded_by_capacity() {
        let mut rng = StdRng::seed_from_u64(1);

        let check = |capacity: usize, offers: usize| {
            let mut rng = StdRng::seed_from_u64(2);
            let mut cache = SampleCache::new(capacity);
            for key in 0..offers {
                cache.offer(&mut rng, key);
                assert!(cache.len() <= capacity);
            }
            assert_eq!(cache.len(), offers.min(capacity));
        };

        check(0, 100);
        check(1, 1);
        check(10, 5);
        check(10, 10);
        check(10, 10_000);
        check(1000, 2000);

        // Capacity zero never stores and never panics.
        let mut empty = SampleCache::<u64>::new(0);
        empty.offer(&mut rng, 42);
        assert!(empty.sample(&mut rng).is_none());
    }

    #[test]
    fn sample_is_none_only_while_empty() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut cache = SampleCache::new(4);

        for _ in 0..10 {
            assert!(cache.sample(&mut rng).is_none());
        }

        cache.offer(&mut rng, "key");
        for _ in 0..1000 {
            assert_eq!(cache.sample(&mut rng), Some(&"key"));
        }

        // Stays non-empty no matter how many keys are offered past capacity.
        for _ in 0..100 {
            cache.offer(&mut rng, "other");
            assert!(cache.sample(&mut rng).is_some());
        }
    }

    #[test]
    fn sampling_does_not_favor_any_slot() {
        // Fill a full-sized cache, churn it with another 1000 distinct keys,
        // then check that no single surviving key dominates 10k draws.
        // A skewed replacement-index selection would concentrate draws.
        let mut rng = StdRng::seed_from_u64(4);
        let mut cache = SampleCache::new(1000);
        for key in 0..2000u64 {
            cache.offer(&mut rng, key);
        }
        assert_eq!(cache.len(), 1000);

        let mut draws: HashMap<u64, u32> = HashMap::new();
        for _ in 0..10_000 {
            let key = cache.sample(&mut rng).copied().unwrap();
            *draws.entry(key).or_default() += 1;
        }

        // Each distinct key occupies at most one slot here, so the expected
        // draw count per surviving key is ~10. Allow a wide margin.
        let max = draws.values().copied().max().unwrap();
        assert!(max <= 60, "a single key was drawn {max} times");
    }

    #[test]
    fn replacement_overwrites_existing_slots() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut cache = SampleCache::new(8);
        for _ in 0..8 {
            cache.offer(&mut rng, "old");
        }

        // With a 1/10 admission chance, 1000 offers make a lost update
        // astronomically unlikely.
        for _ in 0..1000 {
            cache.offer(&mut rng, "new");
        }

        let mut saw_new = false;
        for _ in 0..1000 {
            if cache.sample(&mut rng) == Some(&"new") {
                saw_new = true;
                break;
            }
        }
        assert!(saw_new);
        assert_eq!(cache.len(), 8);
    }

    #[test]
    fn composite_keys_are_sampled_whole() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut cache = SampleCache::new(4);
        cache.offer(&mut rng, (42u64, String::from("2024-05-01T00:00:00Z")));

        let (id, date) = cache.sample(&mut rng).unwrap();
        assert_eq!(*id, 42);
        assert_eq!(date, "2024-05-01T00:00:00Z");
    }
}
