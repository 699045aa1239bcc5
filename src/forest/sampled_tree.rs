//! One reservoir and the tree built over it

use tracing::{trace, warn};

use crate::error::Result;
use crate::rng::CutRng;
use crate::sampler::{AdmitDecision, Sampler};
use crate::tree::RandomCutTree;
use crate::types::Sample;

/// A [`Sampler`] and its [`RandomCutTree`], kept in lockstep: the tree
/// holds exactly the samples the reservoir retains.
#[derive(Debug, Clone)]
pub struct SampledTree {
    sampler: Sampler,
    tree: RandomCutTree,
    rng: CutRng,
}

impl SampledTree {
    pub fn new(dimensions: usize, sample_size: usize, lambda: f64, seed: u64) -> Self {
        Self {
            sampler: Sampler::new(sample_size, lambda),
            tree: RandomCutTree::new(dimensions, sample_size),
            rng: CutRng::seeded(seed),
        }
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn tree(&self) -> &RandomCutTree {
        &self.tree
    }

    /// Offer a shingle; on admission the tree evicts the victim and inserts
    pub fn update(&mut self, point: &[f64], timestamp: u64, sequence: u64) -> Result<AdmitDecision> {
        let decision = self.sampler.offer(sequence, timestamp, &mut self.rng);

        match decision {
            AdmitDecision::Reject => return Ok(decision),
            AdmitDecision::AdmitAndEvict(victim) => {
                if let Err(e) = self.tree.delete(victim) {
                    warn!(victim, "sampler victim missing from tree: {}", e);
                    return Err(e);
                }
                trace!(victim, sequence, "evicted");
            }
            AdmitDecision::Admit => {}
        }

        self.tree
            .insert(Sample::new(point.to_vec(), timestamp, sequence), &mut self.rng)?;
        Ok(decision)
    }
}
