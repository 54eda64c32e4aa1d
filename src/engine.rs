use crate::error::{Result, SimError};
use crate::stats::Merge;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use std::{panic, thread};

/// Source of randomness and trial scheduler shared by the simulators.
///
/// Every batch of trials draws from fresh ChaCha streams derived from a single
/// seed, one stream per worker, so a run is fully determined by
/// `(seed, n_workers)` and the sequence of batches requested.
#[derive(Debug)]
pub struct Engine {
    seed: u64,
    n_workers: usize,
    n_batches: u64,
}

impl Engine {
    /// Create a new `Engine` with an explicit seed.
    pub fn new(seed: u64, n_workers: usize) -> Result<Self> {
        if n_workers == 0 {
            return Err(SimError::InvalidConfiguration(
                "number of workers must be positive".to_string(),
            ));
        }
        Ok(Self {
            seed,
            n_workers,
            n_batches: 0,
        })
    }

    /// Create a new `Engine` seeded from the thread-local generator.
    ///
    /// The drawn seed is logged so the run can be reproduced.
    pub fn from_entropy(n_workers: usize) -> Result<Self> {
        let seed = rand::rng().random();
        log::info!("drew seed {seed}");
        Self::new(seed, n_workers)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Run `n_trials` independent trials and reduce their accumulators.
    ///
    /// Each worker starts from `init()`, runs its share of trials with its own
    /// generator, and the partial results are merged in worker order.
    pub fn run_trials<A, I, F>(&mut self, n_trials: usize, init: I, trial: F) -> A
    where
        A: Merge + Send,
        I: Fn() -> A + Sync,
        F: Fn(&mut ChaCha12Rng, &mut A) + Sync,
    {
        let batch = self.n_batches;
        self.n_batches += 1;

        if self.n_workers == 1 {
            let mut acc = init();
            let mut rng = self.worker_rng(batch, 0);
            (0..n_trials).for_each(|_| trial(&mut rng, &mut acc));
            return acc;
        }

        let shares = split_trials(n_trials, self.n_workers);
        let (init, trial) = (&init, &trial);
        thread::scope(|scope| {
            let handles: Vec<_> = shares
                .iter()
                .enumerate()
                .map(|(i_worker, &share)| {
                    let mut rng = self.worker_rng(batch, i_worker);
                    scope.spawn(move || {
                        let mut acc = init();
                        (0..share).for_each(|_| trial(&mut rng, &mut acc));
                        log::debug!("worker {i_worker} finished {share} trials");
                        acc
                    })
                })
                .collect();

            let mut total = init();
            for handle in handles {
                let acc = handle
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload));
                total.merge(acc);
            }
            total
        })
    }

    fn worker_rng(&self, batch: u64, i_worker: usize) -> ChaCha12Rng {
        let mut rng = ChaCha12Rng::seed_from_u64(self.seed);
        rng.set_stream(batch * self.n_workers as u64 + i_worker as u64);
        rng
    }
}

/// Split `n_trials` into `n_workers` shares differing by at most one.
fn split_trials(n_trials: usize, n_workers: usize) -> Vec<usize> {
    let base = n_trials / n_workers;
    let remainder = n_trials % n_workers;
    (0..n_workers)
        .map(|i_worker| base + usize::from(i_worker < remainder))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Histogram;

    fn uniform_histogram(engine: &mut Engine, n_trials: usize) -> Histogram {
        engine.run_trials(
            n_trials,
            || Histogram::new(10),
            |rng, hist| hist.add(rng.random_range(0..10)),
        )
    }

    #[test]
    fn split_trials_covers_all_trials() {
        assert_eq!(split_trials(10, 3), vec![4, 3, 3]);
        assert_eq!(split_trials(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_trials(7, 1), vec![7]);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            Engine::new(0, 0),
            Err(SimError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn same_seed_gives_same_batches() {
        for n_workers in [1, 4] {
            let mut a = Engine::new(7, n_workers).unwrap();
            let mut b = Engine::new(7, n_workers).unwrap();
            let hist_a = uniform_histogram(&mut a, 1001);
            let hist_b = uniform_histogram(&mut b, 1001);
            assert_eq!(hist_a, hist_b);
            assert_eq!(hist_a.n_vals(), 1001);
        }
    }

    #[test]
    fn successive_batches_use_fresh_streams() {
        let mut engine = Engine::new(7, 2).unwrap();
        let first = uniform_histogram(&mut engine, 500);
        let second = uniform_histogram(&mut engine, 500);
        assert_ne!(first, second);
    }
}
