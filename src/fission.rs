//! Branching-process model of neutron multiplication.
//!
//! A single neutron starts generation 0. At every step each neutron present
//! independently releases between `0` and `K` new neutrons according to an
//! [`OffspringDistribution`], and the next generation is the total released.
//! Repeating this many times yields an empirical distribution of the
//! neutron count per generation, collected in a [`GenerationResultTable`].

use crate::engine::Engine;
use crate::error::{Result, SimError};
use crate::stats::Histogram;
use rand::Rng;
use rand_distr::{Distribution, weighted::WeightedIndex};
use serde::{Deserialize, Serialize};
use std::iter;

/// Tolerance for floating point noise in `p[0]`.
const PROB_TOL: f64 = 1e-9;

/// Probabilities `p[i]` of releasing `i` neutrons in one step, `i in 0..=K`.
///
/// Always holds `K >= 1` non-negative entries summing to one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffspringDistribution {
    probs: Vec<f64>,
}

impl OffspringDistribution {
    /// Build the geometric law `p[i] = p_1 * common_ratio^(i-1)` for `i >= 1`,
    /// with `p[0]` taking the remaining mass.
    ///
    /// # Errors
    /// Returns [`SimError::InvalidConfiguration`] if `max_offspring` is zero and
    /// [`SimError::InvalidDistribution`] if the shape parameters are out of range
    /// or the tail `p[1..=K]` sums to more than one.
    pub fn geometric(max_offspring: usize, p_1: f64, common_ratio: f64) -> Result<Self> {
        if max_offspring == 0 {
            return Err(SimError::InvalidConfiguration(
                "maximum offspring count must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&p_1) {
            return Err(SimError::InvalidDistribution(format!(
                "p_1 must be in [0, 1], but is {p_1}"
            )));
        }
        if !(common_ratio >= 0.0 && common_ratio.is_finite()) {
            return Err(SimError::InvalidDistribution(format!(
                "common ratio must be finite and non-negative, but is {common_ratio}"
            )));
        }

        let mut probs = vec![0.0; max_offspring + 1];
        for (i, prob) in probs.iter_mut().enumerate().skip(1) {
            *prob = p_1 * common_ratio.powi((i - 1) as i32);
        }

        let tail_sum: f64 = probs[1..].iter().sum();
        // Negated so that a NaN sum is rejected too.
        if !(tail_sum <= 1.0 + PROB_TOL) {
            return Err(SimError::InvalidDistribution(format!(
                "p[1..={max_offspring}] sums to {tail_sum}, leaving a negative p[0]"
            )));
        }
        probs[0] = (1.0 - tail_sum).max(0.0);

        Ok(Self { probs })
    }

    /// Take explicit probabilities `p[0..=K]`.
    ///
    /// # Errors
    /// Returns [`SimError::InvalidDistribution`] unless there are at least two
    /// finite non-negative entries summing to one.
    pub fn from_probs(probs: Vec<f64>) -> Result<Self> {
        let dist = Self { probs };
        dist.validate()?;
        Ok(dist)
    }

    fn validate(&self) -> Result<()> {
        if self.probs.len() < 2 {
            return Err(SimError::InvalidDistribution(format!(
                "need probabilities for 0..=K with K >= 1, but got {} entries",
                self.probs.len()
            )));
        }
        if let Some((i, prob)) = self
            .probs
            .iter()
            .enumerate()
            .find(|(_, prob)| !(prob.is_finite() && **prob >= 0.0))
        {
            return Err(SimError::InvalidDistribution(format!(
                "p[{i}] must be finite and non-negative, but is {prob}"
            )));
        }
        let sum: f64 = self.probs.iter().sum();
        if (sum - 1.0).abs() > PROB_TOL {
            return Err(SimError::InvalidDistribution(format!(
                "probabilities must sum to 1 (tolerance: {PROB_TOL}), but sum to {sum}"
            )));
        }
        Ok(())
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    /// Maximum number of neutrons released by one neutron in one step.
    pub fn max_offspring(&self) -> usize {
        self.probs.len() - 1
    }

    /// Expected number of neutrons released per neutron.
    pub fn mean(&self) -> f64 {
        self.probs
            .iter()
            .enumerate()
            .map(|(i, &prob)| i as f64 * prob)
            .sum()
    }
}

/// What to do with trials whose final count exceeds the last bucket `K+1`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Leave them out of every bucket; rows then sum to less than one.
    Drop,
    /// Count them in the last bucket, which then reads "K+1 or more".
    #[default]
    Clamp,
}

/// Empirical neutron count distribution of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRow {
    /// 1-based generation index.
    pub generation: usize,
    /// `probs[j]` is the fraction of trials ending with `j` neutrons, `j in 0..=K+1`.
    pub probs: Vec<f64>,
    /// Fraction of trials ending with more than `K+1` neutrons.
    pub overflow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResultTable {
    max_offspring: usize,
    n_trials: usize,
    overflow_policy: OverflowPolicy,
    rows: Vec<GenerationRow>,
}

impl GenerationResultTable {
    pub fn max_offspring(&self) -> usize {
        self.max_offspring
    }

    pub fn n_trials(&self) -> usize {
        self.n_trials
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }

    pub fn rows(&self) -> &[GenerationRow] {
        &self.rows
    }

    /// Row of the 1-based `generation`, if it was simulated.
    pub fn row(&self, generation: usize) -> Option<&GenerationRow> {
        generation
            .checked_sub(1)
            .and_then(|i_row| self.rows.get(i_row))
    }
}

pub struct BranchingProcessSimulator {
    dist: OffspringDistribution,
    sampler: WeightedIndex<f64>,
    n_generations: usize,
    overflow_policy: OverflowPolicy,
}

impl BranchingProcessSimulator {
    /// Create a simulator over `n_generations` with a geometric offspring law.
    ///
    /// All validation happens here, before any sampling.
    pub fn new(
        max_offspring: usize,
        n_generations: usize,
        p_1: f64,
        common_ratio: f64,
    ) -> Result<Self> {
        let dist = OffspringDistribution::geometric(max_offspring, p_1, common_ratio)?;
        Self::from_distribution(dist, n_generations)
    }

    pub fn from_distribution(dist: OffspringDistribution, n_generations: usize) -> Result<Self> {
        dist.validate()?;
        if n_generations == 0 {
            return Err(SimError::InvalidConfiguration(
                "number of generations must be positive".to_string(),
            ));
        }
        let sampler = WeightedIndex::new(dist.probs())
            .map_err(|error| SimError::InvalidDistribution(error.to_string()))?;
        Ok(Self {
            dist,
            sampler,
            n_generations,
            overflow_policy: OverflowPolicy::default(),
        })
    }

    pub fn with_overflow_policy(mut self, overflow_policy: OverflowPolicy) -> Self {
        self.overflow_policy = overflow_policy;
        self
    }

    pub fn distribution(&self) -> &OffspringDistribution {
        &self.dist
    }

    pub fn n_generations(&self) -> usize {
        self.n_generations
    }

    /// Draw the number of neutrons released by one neutron, in `0..=K`.
    pub fn sample_offspring_count<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.sampler.sample(rng)
    }

    /// Population after `generation + 1` steps, starting from one neutron.
    ///
    /// `generation` is 0-based: `run_one_trial(rng, 0)` performs one step.
    pub fn run_one_trial<R: Rng + ?Sized>(&self, rng: &mut R, generation: usize) -> usize {
        self.populations(rng).nth(generation).unwrap_or(0)
    }

    /// Population after each of the first `steps` steps.
    pub fn trajectory<R: Rng + ?Sized>(&self, rng: &mut R, steps: usize) -> Vec<usize> {
        self.populations(rng).take(steps).collect()
    }

    /// Estimate the neutron count distribution of every generation.
    ///
    /// Each generation is estimated from its own `n_trials` independent trials.
    pub fn simulate(&self, engine: &mut Engine, n_trials: usize) -> Result<GenerationResultTable> {
        if n_trials == 0 {
            return Err(SimError::InvalidConfiguration(
                "number of trials must be positive".to_string(),
            ));
        }

        let n_bins = self.dist.max_offspring() + 2;
        let fold_overflow = self.overflow_policy == OverflowPolicy::Clamp;

        let mut rows = Vec::with_capacity(self.n_generations);
        for i_gen in 0..self.n_generations {
            let hist = engine.run_trials(
                n_trials,
                || Histogram::new(n_bins),
                |rng, hist| hist.add(self.run_one_trial(rng, i_gen)),
            );

            let row = GenerationRow {
                generation: i_gen + 1,
                probs: hist.frequencies(fold_overflow),
                overflow: hist.overflow_frequency(),
            };
            log::info!(
                "generation {} done (extinct {:.4}, overflow {:.4})",
                row.generation,
                row.probs[0],
                row.overflow
            );
            rows.push(row);
        }

        Ok(GenerationResultTable {
            max_offspring: self.dist.max_offspring(),
            n_trials,
            overflow_policy: self.overflow_policy,
            rows,
        })
    }

    /// Infinite sequence of populations after step 1, 2, ...
    ///
    /// An empty population draws nothing and stays empty.
    fn populations<'a, R: Rng + ?Sized>(
        &'a self,
        rng: &'a mut R,
    ) -> impl Iterator<Item = usize> + 'a {
        let mut count = 1;
        iter::from_fn(move || {
            count = (0..count)
                .map(|_| self.sample_offspring_count(rng))
                .sum();
            Some(count)
        })
    }
}
