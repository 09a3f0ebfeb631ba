//! Discrete action selection.
//!
//! Discrete outputs carry one logit per action of a branch. How an index is
//! picked from them is a fixed, configured policy:
//!
//! - `Argmax`: highest logit, lowest index on ties. Fully deterministic.
//! - `Sample`: categorical draw from `softmax(logits)` using a ChaCha8 RNG
//!   seeded from the configured seed. The RNG is re-created on every reload,
//!   so the same seed replays the same draws for the same sequence of ticks.
//!
//! Non-finite logits are treated as masked (probability 0).

use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscretePolicy {
    Argmax,
    #[default]
    Sample,
}

#[derive(Debug, Clone)]
pub struct ActionSampler {
    policy: DiscretePolicy,
    rng: ChaCha8Rng,
}

impl ActionSampler {
    pub fn new(policy: DiscretePolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn policy(&self) -> DiscretePolicy {
        self.policy
    }

    /// Picks an index, or `None` when no logit is finite.
    pub fn select(&mut self, logits: &[f32]) -> Option<usize> {
        match self.policy {
            DiscretePolicy::Argmax => argmax(logits),
            DiscretePolicy::Sample => {
                let max = logits
                    .iter()
                    .copied()
                    .filter(|l| l.is_finite())
                    .fold(f32::NEG_INFINITY, f32::max);
                if !max.is_finite() {
                    return None;
                }
                let weights: Vec<f64> = logits
                    .iter()
                    .map(|&l| if l.is_finite() { f64::from(l - max).exp() } else { 0.0 })
                    .collect();
                let dist = WeightedIndex::new(&weights).ok()?;
                Some(dist.sample(&mut self.rng))
            }
        }
    }
}

pub fn argmax(logits: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &l) in logits.iter().enumerate() {
        if !l.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if l <= b => {}
            _ => best = Some((i, l)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0.1, 0.9, 0.3], Some(1))]
    #[case(&[2.0, 2.0, 1.0], Some(0))]
    #[case(&[f32::NAN, -1.0], Some(1))]
    #[case(&[f32::NEG_INFINITY, f32::NAN], None)]
    fn argmax_breaks_ties_low(#[case] logits: &[f32], #[case] expected: Option<usize>) {
        assert_eq!(argmax(logits), expected);
    }

    #[test]
    fn sampling_is_reproducible_for_a_seed() {
        let logits = [0.0, 0.0, 0.0, 0.0];
        let mut a = ActionSampler::new(DiscretePolicy::Sample, 11);
        let mut b = ActionSampler::new(DiscretePolicy::Sample, 11);
        let da: Vec<_> = (0..32).map(|_| a.select(&logits)).collect();
        let db: Vec<_> = (0..32).map(|_| b.select(&logits)).collect();
        assert_eq!(da, db);
        assert!(da.iter().all(|i| matches!(i, Some(0..=3))));
    }

    #[test]
    fn sampling_never_picks_masked_actions() {
        let logits = [f32::NEG_INFINITY, 0.0, f32::NEG_INFINITY];
        let mut s = ActionSampler::new(DiscretePolicy::Sample, 3);
        for _ in 0..16 {
            assert_eq!(s.select(&logits), Some(1));
        }
    }
}
