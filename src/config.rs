use crate::fission::OverflowPolicy;
use crate::secretary::SelectionRule;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    pub fission: Option<FissionConfig>,
    pub secretary: Option<SecretaryConfig>,
}

/// Randomness and parallelism parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Seed of the random number generator, drawn at startup when absent.
    pub seed: Option<u64>,
    /// Number of worker threads sharing the trials.
    #[serde(default = "default_n_workers")]
    pub n_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            n_workers: default_n_workers(),
        }
    }
}

/// Fission branching process parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FissionConfig {
    /// Maximum number of neutrons released by one neutron.
    pub max_offspring: usize,
    /// Number of simulated generations.
    pub n_generations: usize,
    /// Probability of releasing exactly one neutron.
    pub p_1: f64,
    /// Ratio between the probabilities of releasing `i + 1` and `i` neutrons.
    pub common_ratio: f64,
    /// Number of trials per generation.
    #[serde(default = "default_n_trials")]
    pub n_trials: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

/// Secretary problem parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretaryConfig {
    /// Number of candidates interviewed.
    pub n_candidates: usize,
    /// Each entry `s` counts a hire within the top `s` ranks as a success.
    pub success_criteria: Vec<usize>,
    /// Number of trials per sample size.
    #[serde(default = "default_n_trials")]
    pub n_trials: usize,
    #[serde(default)]
    pub rule: SelectionRule,
}

fn default_n_workers() -> usize {
    1
}

fn default_n_trials() -> usize {
    10_000
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.engine.n_workers, 1..=256).context("invalid number of workers")?;

        if let Some(fission) = &self.fission {
            check_num(fission.max_offspring, 1..=64).context("invalid maximum offspring count")?;
            check_num(fission.n_generations, 1..=100).context("invalid number of generations")?;
            check_num(fission.p_1, 0.0..=1.0).context("invalid p_1")?;
            check_num(fission.common_ratio, 0.0..f64::INFINITY)
                .context("invalid common ratio")?;
            check_num(fission.n_trials, 1..=100_000_000).context("invalid number of trials")?;
        }

        if let Some(secretary) = &self.secretary {
            check_num(secretary.n_candidates, 1..=100_000)
                .context("invalid number of candidates")?;
            if secretary.success_criteria.is_empty() {
                bail!("success criteria must not be empty");
            }
            for &s in &secretary.success_criteria {
                check_num(s, 1..=secretary.n_candidates)
                    .context("invalid success criterion")?;
            }
            check_num(secretary.n_trials, 1..=100_000_000).context("invalid number of trials")?;
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
