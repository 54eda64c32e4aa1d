use serde::{Deserialize, Serialize};

/// Combine two partial accumulations of the same quantity.
///
/// Used to reduce per-worker results; implementations must be
/// commutative and associative so worker order never changes the result.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

/// Running mean and variance (Welford).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn n_vals(&self) -> usize {
        self.n_vals
    }

    pub fn report(&self) -> AccumulatorReport {
        let std_dev = if self.n_vals > 1 {
            (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
        } else {
            f64::NAN
        };
        AccumulatorReport {
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev,
            sem: std_dev / (self.n_vals as f64).sqrt(),
        }
    }
}

impl Merge for Accumulator {
    /// Chan et al. pairwise update.
    fn merge(&mut self, other: Self) {
        if other.n_vals == 0 {
            return;
        }
        if self.n_vals == 0 {
            *self = other;
            return;
        }
        let n_a = self.n_vals as f64;
        let n_b = other.n_vals as f64;
        let n = n_a + n_b;
        let delta = other.mean - self.mean;

        self.mean += delta * n_b / n;
        self.diff_2_sum += other.diff_2_sum + delta * delta * n_a * n_b / n;
        self.n_vals += other.n_vals;
    }
}

/// Counts of non-negative integer outcomes in `n_bins` buckets.
///
/// Outcomes `>= n_bins` land in a separate overflow tally instead of a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: Vec<usize>,
    overflow: usize,
    n_vals: usize,
}

impl Histogram {
    pub fn new(n_bins: usize) -> Self {
        Self {
            counts: vec![0; n_bins],
            overflow: 0,
            n_vals: 0,
        }
    }

    pub fn add(&mut self, val: usize) {
        self.n_vals += 1;
        match self.counts.get_mut(val) {
            Some(count) => *count += 1,
            None => self.overflow += 1,
        }
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn overflow(&self) -> usize {
        self.overflow
    }

    pub fn n_vals(&self) -> usize {
        self.n_vals
    }

    /// Bucket frequencies relative to every added value.
    ///
    /// With `fold_overflow` the overflow tally is added to the last bucket,
    /// otherwise it is left out and the frequencies sum to less than one.
    pub fn frequencies(&self, fold_overflow: bool) -> Vec<f64> {
        let n_vals = self.n_vals as f64;
        let last = self.counts.len().saturating_sub(1);
        self.counts
            .iter()
            .enumerate()
            .map(|(i_bin, &count)| {
                let count = if fold_overflow && i_bin == last {
                    count + self.overflow
                } else {
                    count
                };
                if self.n_vals == 0 {
                    0.0
                } else {
                    count as f64 / n_vals
                }
            })
            .collect()
    }

    pub fn overflow_frequency(&self) -> f64 {
        if self.n_vals == 0 {
            return 0.0;
        }
        self.overflow as f64 / self.n_vals as f64
    }
}

impl Merge for Histogram {
    fn merge(&mut self, other: Self) {
        if self.counts.len() < other.counts.len() {
            self.counts.resize(other.counts.len(), 0);
        }
        for (count, other_count) in self.counts.iter_mut().zip(other.counts) {
            *count += other_count;
        }
        self.overflow += other.overflow;
        self.n_vals += other.n_vals;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_separates_overflow() {
        let mut hist = Histogram::new(3);
        for val in [0, 1, 1, 2, 3, 7] {
            hist.add(val);
        }
        assert_eq!(hist.counts(), &[1, 2, 1]);
        assert_eq!(hist.overflow(), 2);
        assert_eq!(hist.n_vals(), 6);

        let dropped = hist.frequencies(false);
        let sum: f64 = dropped.iter().sum();
        assert!((sum + hist.overflow_frequency() - 1.0).abs() < 1e-12);

        let folded = hist.frequencies(true);
        assert!((folded[2] - 3.0 / 6.0).abs() < 1e-12);
        assert!((folded.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_histogram_has_zero_frequencies() {
        let hist = Histogram::new(4);
        assert_eq!(hist.frequencies(true), vec![0.0; 4]);
        assert_eq!(hist.overflow_frequency(), 0.0);
    }

    #[test]
    fn histogram_merge_adds_counts() {
        let mut a = Histogram::new(2);
        a.add(0);
        a.add(5);
        let mut b = Histogram::new(2);
        b.add(1);
        b.add(1);
        a.merge(b);
        assert_eq!(a.counts(), &[1, 2]);
        assert_eq!(a.overflow(), 1);
        assert_eq!(a.n_vals(), 4);
    }

    #[test]
    fn accumulator_merge_matches_sequential() {
        let vals = [0.5, 1.0, 3.0, -2.0, 4.5, 0.0, 1.25];

        let mut seq = Accumulator::new();
        vals.iter().for_each(|&val| seq.add(val));

        let mut left = Accumulator::new();
        let mut right = Accumulator::new();
        vals[..3].iter().for_each(|&val| left.add(val));
        vals[3..].iter().for_each(|&val| right.add(val));
        left.merge(right);

        let (seq, merged) = (seq.report(), left.report());
        assert_eq!(left.n_vals(), vals.len());
        assert!((seq.mean - merged.mean).abs() < 1e-12);
        assert!((seq.std_dev - merged.std_dev).abs() < 1e-12);
    }

    #[test]
    fn accumulator_with_one_value_has_undefined_spread() {
        let mut acc = Accumulator::new();
        acc.add(2.0);
        let report = acc.report();
        assert_eq!(report.mean, 2.0);
        assert!(report.std_dev.is_nan());
    }
}
