//! The secretary problem under the "sample then leap" stopping rule.
//!
//! `n` candidates with distinct ranks (1 is best) arrive in random order. The
//! first `m` are only observed to set a standard; afterwards the first
//! candidate beating the standard is hired. The hire counts as a success if
//! their rank is within the top `s`. [`SelectionRule`] decides what happens
//! when the sample is empty or nobody beats the standard.

use crate::engine::Engine;
use crate::error::{Result, SimError};
use crate::stats::{Accumulator, AccumulatorReport};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

/// Fallback behaviour of the stopping rule.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionRule {
    /// An empty sample is a failure, and so is reaching the end without
    /// anybody beating the standard (the hire is scored as rank `n`).
    #[default]
    Original,
    /// An empty sample hires the first candidate, and reaching the end
    /// hires the last candidate with their real rank.
    Textbook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretaryProblem {
    n_candidates: usize,
    n_successful: usize,
    rule: SelectionRule,
}

/// Success rate for every sample size `m in 0..n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessCurve {
    pub n_candidates: usize,
    pub n_successful: usize,
    pub n_trials: usize,
    pub rates: Vec<AccumulatorReport>,
}

impl SuccessCurve {
    /// Sample size with the highest estimated success rate.
    pub fn best_sample_size(&self) -> usize {
        self.rates
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.mean.total_cmp(&b.mean))
            .map(|(m, _)| m)
            .unwrap_or(0)
    }
}

impl SecretaryProblem {
    /// `n_candidates` candidates, success meaning a hire among the best `n_successful`.
    pub fn new(n_candidates: usize, n_successful: usize) -> Result<Self> {
        if n_candidates == 0 {
            return Err(SimError::InvalidConfiguration(
                "number of candidates must be positive".to_string(),
            ));
        }
        if !(1..=n_candidates).contains(&n_successful) {
            return Err(SimError::InvalidConfiguration(format!(
                "number of successful ranks must be in 1..={n_candidates}, but is {n_successful}"
            )));
        }
        Ok(Self {
            n_candidates,
            n_successful,
            rule: SelectionRule::default(),
        })
    }

    pub fn with_rule(mut self, rule: SelectionRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn n_candidates(&self) -> usize {
        self.n_candidates
    }

    pub fn n_successful(&self) -> usize {
        self.n_successful
    }

    pub fn rule(&self) -> SelectionRule {
        self.rule
    }

    /// Run one interview with a sample of `sample_size` candidates.
    pub fn is_selection_successful<R: Rng + ?Sized>(&self, rng: &mut R, sample_size: usize) -> bool {
        let mut ranks: Vec<usize> = (1..=self.n_candidates).collect();
        ranks.shuffle(rng);

        let (sample, rest) = ranks.split_at(sample_size.min(self.n_candidates));
        let Some(&standard) = sample.iter().min() else {
            return match self.rule {
                SelectionRule::Original => false,
                SelectionRule::Textbook => ranks[0] <= self.n_successful,
            };
        };

        let chosen = match rest.iter().copied().find(|&rank| rank < standard) {
            Some(rank) => rank,
            None => match self.rule {
                SelectionRule::Original => self.n_candidates,
                SelectionRule::Textbook => ranks[self.n_candidates - 1],
            },
        };

        chosen <= self.n_successful
    }

    /// Estimate the success probability for one sample size.
    pub fn success_rate(
        &self,
        engine: &mut Engine,
        sample_size: usize,
        n_trials: usize,
    ) -> Result<AccumulatorReport> {
        if sample_size >= self.n_candidates {
            return Err(SimError::InvalidConfiguration(format!(
                "sample size must be below {}, but is {sample_size}",
                self.n_candidates
            )));
        }
        if n_trials == 0 {
            return Err(SimError::InvalidConfiguration(
                "number of trials must be positive".to_string(),
            ));
        }

        let acc = engine.run_trials(n_trials, Accumulator::new, |rng, acc| {
            let success = self.is_selection_successful(rng, sample_size);
            acc.add(if success { 1.0 } else { 0.0 });
        });
        Ok(acc.report())
    }

    /// Estimate the success probability for every sample size `0..n`.
    pub fn success_curve(&self, engine: &mut Engine, n_trials: usize) -> Result<SuccessCurve> {
        let rates = (0..self.n_candidates)
            .map(|sample_size| self.success_rate(engine, sample_size, n_trials))
            .collect::<Result<Vec<_>>>()?;

        let curve = SuccessCurve {
            n_candidates: self.n_candidates,
            n_successful: self.n_successful,
            n_trials,
            rates,
        };
        log::info!(
            "n = {}, s = {} ({:?} rule): best sample size {}",
            self.n_candidates,
            self.n_successful,
            self.rule,
            curve.best_sample_size()
        );
        Ok(curve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn invalid_arguments_are_rejected() {
        assert!(SecretaryProblem::new(0, 1).is_err());
        assert!(SecretaryProblem::new(5, 0).is_err());
        assert!(SecretaryProblem::new(5, 6).is_err());

        let problem = SecretaryProblem::new(5, 1).unwrap();
        let mut engine = Engine::new(0, 1).unwrap();
        assert!(matches!(
            problem.success_rate(&mut engine, 5, 100),
            Err(SimError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            problem.success_rate(&mut engine, 2, 0),
            Err(SimError::InvalidConfiguration(_))
        ));
    }

    fn textbook(n_candidates: usize, n_successful: usize) -> SecretaryProblem {
        SecretaryProblem::new(n_candidates, n_successful)
            .unwrap()
            .with_rule(SelectionRule::Textbook)
    }

    #[test]
    fn everyone_successful_always_succeeds() {
        let problem = textbook(8, 8);
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        for m in 0..8 {
            assert!(problem.is_selection_successful(&mut rng, m));
        }
    }

    #[test]
    fn single_candidate_is_always_hired() {
        let problem = textbook(1, 1);
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        assert!(problem.is_selection_successful(&mut rng, 0));
    }

    #[test]
    fn original_rule_fails_without_sample() {
        let problem = SecretaryProblem::new(10, 10).unwrap();
        assert_eq!(problem.rule(), SelectionRule::Original);
        let mut engine = Engine::new(5, 1).unwrap();
        let rate = problem.success_rate(&mut engine, 0, 1000).unwrap();
        assert_eq!(rate.mean, 0.0);
    }

    #[test]
    fn original_rule_scores_exhausted_search_as_worst_rank() {
        // With m = n - 1 only a best-ranked last candidate beats the standard.
        let problem = SecretaryProblem::new(10, 3).unwrap();
        let mut engine = Engine::new(31, 1).unwrap();
        let rate = problem.success_rate(&mut engine, 9, 20_000).unwrap();
        assert!((rate.mean - 0.1).abs() < 0.015, "rate {}", rate.mean);

        let mut engine = Engine::new(31, 1).unwrap();
        let rate = textbook(10, 3).success_rate(&mut engine, 9, 20_000).unwrap();
        assert!((rate.mean - 0.3).abs() < 0.02, "rate {}", rate.mean);
    }

    #[test]
    fn rules_agree_for_top_candidate_with_sample() {
        let original = SecretaryProblem::new(12, 1).unwrap();
        let leap = textbook(12, 1);
        for seed in 0..200 {
            for m in 1..12 {
                let mut rng_a = ChaCha12Rng::seed_from_u64(seed);
                let mut rng_b = ChaCha12Rng::seed_from_u64(seed);
                assert_eq!(
                    original.is_selection_successful(&mut rng_a, m),
                    leap.is_selection_successful(&mut rng_b, m)
                );
            }
        }
    }

    #[test]
    fn empty_sample_hires_uniformly() {
        let problem = textbook(10, 3);
        let mut engine = Engine::new(17, 1).unwrap();
        let rate = problem.success_rate(&mut engine, 0, 20_000).unwrap();
        assert!((rate.mean - 0.3).abs() < 0.02, "rate {}", rate.mean);
    }

    #[test]
    fn best_sample_size_is_near_n_over_e() {
        let problem = SecretaryProblem::new(30, 1).unwrap();
        let mut engine = Engine::new(23, 2).unwrap();
        let curve = problem.success_curve(&mut engine, 4000).unwrap();

        assert_eq!(curve.rates.len(), 30);
        let best = curve.best_sample_size();
        assert!((6..=17).contains(&best), "best sample size {best}");
        assert!((curve.rates[best].mean - 0.37).abs() < 0.05);
    }
}
