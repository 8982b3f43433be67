// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity sample buffer with reservoir sampling.
//!
//! While the buffer is filling every sample is accepted. Once full, each new
//! sample replaces a random slot with probability `capacity / seen`, so the
//! retained set is a uniform random subset of everything offered (Algorithm R).
//!
//! ```text
//!   put ──> len < capacity ? ──yes──> push
//!                 │
//!                 no
//!                 v
//!      j = rand[0, insertion_count)
//!                 │
//!      j < capacity ? ──yes──> items[j] = sample
//!                 │
//!                 no ──> discard
//! ```

use crate::serializer::Serializer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct ReservoirBuffer<T, S> {
    items: Vec<T>,
    capacity: usize,
    /// Every `put` since the last resample, rejected ones included.
    insertion_count: usize,
    serializer: S,
    rng: StdRng,
}

impl<T, S: Serializer<T>> ReservoirBuffer<T, S> {
    pub fn new(capacity: usize, serializer: S) -> Self {
        Self::with_rng(capacity, serializer, StdRng::from_entropy())
    }

    /// Builds a buffer with a reproducible sampling sequence.
    pub fn with_seed(capacity: usize, serializer: S, seed: u64) -> Self {
        Self::with_rng(capacity, serializer, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, serializer: S, rng: StdRng) -> Self {
        ReservoirBuffer {
            items: Vec::with_capacity(capacity),
            capacity,
            insertion_count: 0,
            serializer,
            rng,
        }
    }

    /// Offers a sample. Returns whether it is held after the call.
    pub fn put(&mut self, sample: T) -> bool {
        if self.items.len() < self.capacity {
            self.items.push(sample);
            self.insertion_count += 1;
            return true;
        }

        // The population size for the draw is the count before this sample.
        let j = if self.insertion_count == 0 {
            0
        } else {
            self.rng.gen_range(0..self.insertion_count)
        };
        self.insertion_count += 1;
        if j < self.capacity {
            self.items[j] = sample;
            true
        } else {
            false
        }
    }

    /// Shrinks the reservoir and re-samples what it holds. Never grows it.
    pub fn resample(&mut self, new_capacity: usize) {
        if new_capacity >= self.capacity {
            return;
        }
        let previous = std::mem::take(&mut self.items);
        self.insertion_count = 0;
        self.capacity = new_capacity;
        self.items.reserve(new_capacity);
        for item in previous {
            self.put(item);
        }
    }

    /// Grows the capacity. Bounds are the caller's policy.
    pub fn increment_size(&mut self, delta: usize) {
        self.capacity += delta;
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }

    /// Empties the buffer in place.
    ///
    /// `insertion_count` is kept: a harvest continues the same sampling
    /// population, only `resample` starts a new one.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        self.serializer.serialize(&self.items)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn insertion_count(&self) -> usize {
        self.insertion_count
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct JsonSerializer;

    impl Serializer<u32> for JsonSerializer {
        fn serialize(&self, items: &[u32]) -> Result<Vec<u8>, serde_json::Error> {
            serde_json::to_vec(items)
        }
    }

    fn buffer(capacity: usize) -> ReservoirBuffer<u32, JsonSerializer> {
        ReservoirBuffer::with_seed(capacity, JsonSerializer, 42)
    }

    #[test]
    fn test_fill_phase_accepts_in_order() {
        let mut buf = buffer(10);
        for i in 0..10 {
            assert!(buf.put(i));
        }
        assert_eq!(buf.items(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(buf.remaining(), 0);
        assert_eq!(buf.insertion_count(), 10);
    }

    #[test]
    fn test_overflow_keeps_bound_and_counts_rejections() {
        let mut buf = buffer(10);
        let accepted = (0..1000).filter(|i| buf.put(*i)).count();
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.insertion_count(), 1000);
        assert!(accepted >= 10);
        assert!(accepted < 1000);
    }

    #[test]
    fn test_sampling_fairness() {
        const CAPACITY: usize = 10;
        const OFFERED: u32 = 100;
        const TRIALS: u32 = 20_000;

        let mut hits = vec![0u32; OFFERED as usize];
        for trial in 0..TRIALS {
            let mut buf = ReservoirBuffer::with_seed(CAPACITY, JsonSerializer, u64::from(trial));
            for i in 0..OFFERED {
                buf.put(i);
            }
            for item in buf.items() {
                hits[*item as usize] += 1;
            }
        }

        // Expected frequency is capacity / offered = 0.1, i.e. 2000 hits.
        // Standard deviation is about 42, so 300 is a very loose bound.
        let expected = f64::from(TRIALS) * CAPACITY as f64 / f64::from(OFFERED);
        for (item, count) in hits.iter().enumerate() {
            let diff = (f64::from(*count) - expected).abs();
            assert!(
                diff < 300.0,
                "item {item} retained {count} times, expected about {expected}"
            );
        }
    }

    #[test]
    fn test_resample_larger_is_noop() {
        let mut buf = buffer(10);
        for i in 0..15 {
            buf.put(i);
        }
        let before = buf.items().to_vec();
        buf.resample(10);
        buf.resample(20);
        assert_eq!(buf.capacity(), 10);
        assert_eq!(buf.items(), before.as_slice());
        assert_eq!(buf.insertion_count(), 15);
    }

    #[test]
    fn test_resample_shrinks() {
        let mut buf = buffer(10);
        for i in 0..10 {
            buf.put(i);
        }
        buf.resample(4);
        assert_eq!(buf.capacity(), 4);
        assert_eq!(buf.len(), 4);
        // Every previously held item is offered exactly once.
        assert_eq!(buf.insertion_count(), 10);
        for item in buf.items() {
            assert!(*item < 10);
        }
    }

    #[test]
    fn test_resample_keeps_partially_filled_buffer() {
        let mut buf = buffer(10);
        for i in 0..3 {
            buf.put(i);
        }
        buf.resample(5);
        assert_eq!(buf.items(), &[0, 1, 2]);
        assert_eq!(buf.insertion_count(), 3);
    }

    #[test]
    fn test_increment_size_is_unbounded() {
        let mut buf = buffer(10);
        buf.increment_size(100);
        assert_eq!(buf.capacity(), 110);
        assert_eq!(buf.remaining(), 110);
    }

    #[test]
    fn test_clear_keeps_capacity_and_insertion_count() {
        let mut buf = buffer(5);
        for i in 0..8 {
            buf.put(i);
        }
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 5);
        // Not reset by clear, only by resample.
        assert_eq!(buf.insertion_count(), 8);

        for i in 0..5 {
            assert!(buf.put(i));
        }
        assert_eq!(buf.items(), &[0, 1, 2, 3, 4]);
        assert_eq!(buf.insertion_count(), 13);
    }

    #[test]
    fn test_zero_capacity_rejects() {
        let mut buf = buffer(0);
        assert!(!buf.put(1));
        assert!(!buf.put(2));
        assert!(buf.is_empty());
        assert_eq!(buf.insertion_count(), 2);
    }

    #[test]
    fn test_serialize_does_not_mutate() {
        let mut buf = buffer(3);
        buf.put(7);
        buf.put(8);
        assert_eq!(buf.serialize().unwrap(), b"[7,8]".to_vec());
        assert_eq!(buf.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_len_never_exceeds_capacity(
            capacity in 0usize..50,
            ops in proptest::collection::vec((0u8..4, 0usize..60), 0..400),
        ) {
            let mut buf = buffer(capacity);
            for (n, (op, arg)) in ops.into_iter().enumerate() {
                match op {
                    0 | 1 => { buf.put(n as u32); }
                    2 => buf.resample(arg),
                    _ => buf.clear(),
                }
                prop_assert!(buf.len() <= buf.capacity());
            }
        }
    }
}
