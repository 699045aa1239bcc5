//! Time-decayed weighted reservoir sampling
//!
//! Each candidate gets the log-priority
//!
//! ```text
//! weight = ln(-ln(u)) - lambda * t        u ~ Uniform(0, 1)
//! ```
//!
//! which is the logarithm of `-ln(u) * exp(-lambda * t)`. Smaller weights
//! are preferred: once the reservoir is full a candidate only gets in by
//! beating the current maximum, which is evicted. Weights are compared in
//! log space so large timestamps never overflow. With `lambda = 0` this is
//! uniform reservoir sampling over the whole stream; larger `lambda` favors
//! recent points.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::rng::CutRng;

/// Outcome of offering a sample to a reservoir
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    /// Reservoir had room
    Admit,
    /// Admitted in place of the resident with this sequence number
    AdmitAndEvict(u64),
    /// Candidate lost against every resident
    Reject,
}

impl AdmitDecision {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, AdmitDecision::Reject)
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedEntry {
    weight: f64,
    sequence: u64,
}

impl PartialEq for WeightedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for WeightedEntry {}

impl PartialOrd for WeightedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WeightedEntry {
    // Max-heap on weight; among equal weights the older sample is evicted first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Per-tree reservoir
#[derive(Debug, Clone)]
pub struct Sampler {
    capacity: usize,
    lambda: f64,
    heap: BinaryHeap<WeightedEntry>,
}

impl Sampler {
    pub fn new(capacity: usize, lambda: f64) -> Self {
        Self {
            capacity,
            lambda,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Log-priority of a candidate admitted at `timestamp`
    pub fn weight(&self, timestamp: u64, rng: &mut CutRng) -> f64 {
        let u = rng.uniform_open();
        (-u.ln()).ln() - self.lambda * timestamp as f64
    }

    /// Decide whether the sample with `sequence` enters the reservoir
    pub fn offer(&mut self, sequence: u64, timestamp: u64, rng: &mut CutRng) -> AdmitDecision {
        let weight = self.weight(timestamp, rng);
        self.offer_weighted(sequence, weight)
    }

    fn offer_weighted(&mut self, sequence: u64, weight: f64) -> AdmitDecision {
        let candidate = WeightedEntry { weight, sequence };

        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
            return AdmitDecision::Admit;
        }

        match self.heap.peek() {
            Some(max) if candidate.weight < max.weight => {
                let victim = max.sequence;
                self.heap.pop();
                self.heap.push(candidate);
                AdmitDecision::AdmitAndEvict(victim)
            }
            _ => AdmitDecision::Reject,
        }
    }

    /// Largest resident weight, if any
    #[cfg(test)]
    pub(crate) fn max_weight(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.weight)
    }

    /// Sequence numbers currently retained, in no particular order
    pub fn sequences(&self) -> impl Iterator<Item = u64> + '_ {
        self.heap.iter().map(|e| e.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_until_full() {
        let mut sampler = Sampler::new(4, 0.0);
        let mut rng = CutRng::seeded(1);
        for seq in 0..4 {
            assert_eq!(sampler.offer(seq, seq, &mut rng), AdmitDecision::Admit);
        }
        assert!(sampler.is_full());
        assert_eq!(sampler.len(), 4);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut sampler = Sampler::new(8, 0.01);
        let mut rng = CutRng::seeded(2);
        for seq in 0..1000 {
            sampler.offer(seq, seq, &mut rng);
            assert!(sampler.len() <= 8);
        }
        assert_eq!(sampler.len(), 8);
    }

    #[test]
    fn test_evicts_maximum_weight() {
        let mut sampler = Sampler::new(2, 0.0);
        assert_eq!(sampler.offer_weighted(0, 1.0), AdmitDecision::Admit);
        assert_eq!(sampler.offer_weighted(1, 3.0), AdmitDecision::Admit);
        assert_eq!(sampler.offer_weighted(2, 5.0), AdmitDecision::Reject);
        assert_eq!(sampler.offer_weighted(3, 3.0), AdmitDecision::Reject);
        assert_eq!(sampler.offer_weighted(4, 2.0), AdmitDecision::AdmitAndEvict(1));
        assert_eq!(sampler.max_weight(), Some(2.0));

        let mut kept: Vec<u64> = sampler.sequences().collect();
        kept.sort_unstable();
        assert_eq!(kept, vec![0, 4]);
    }

    #[test]
    fn test_tie_evicts_older() {
        let mut sampler = Sampler::new(2, 0.0);
        sampler.offer_weighted(5, 1.0);
        sampler.offer_weighted(3, 1.0);
        assert_eq!(sampler.offer_weighted(9, 0.5), AdmitDecision::AdmitAndEvict(3));
    }

    #[test]
    fn test_decay_prefers_recent() {
        let capacity = 32;
        let mut sampler = Sampler::new(capacity, 0.05);
        let mut rng = CutRng::seeded(3);
        let total = 5000u64;
        for seq in 0..total {
            let decision = sampler.offer(seq, seq, &mut rng);
            if let AdmitDecision::AdmitAndEvict(victim) = decision {
                assert!(victim < seq);
            }
        }
        let mean_age: f64 = sampler
            .sequences()
            .map(|s| (total - s) as f64)
            .sum::<f64>()
            / capacity as f64;
        // with strong decay the reservoir concentrates on the last few hundred points
        assert!(mean_age < 500.0, "mean age {}", mean_age);
    }

    #[test]
    fn test_no_decay_keeps_old_points() {
        let capacity = 64;
        let mut sampler = Sampler::new(capacity, 0.0);
        let mut rng = CutRng::seeded(4);
        let total = 10_000u64;
        for seq in 0..total {
            sampler.offer(seq, seq, &mut rng);
        }
        let old = sampler.sequences().filter(|&s| s < total / 2).count();
        assert!(old > 0, "uniform reservoir should retain some early points");
    }
}
