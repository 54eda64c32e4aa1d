use crate::config::Config;
use crate::engine::Engine;
use crate::fission::BranchingProcessSimulator;
use crate::report::{save_msgpack, write_report};
use crate::secretary::SecretaryProblem;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Runs the configured simulations inside a simulation directory.
///
/// The directory holds `config.toml` and receives every output file.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn run_fission(&self) -> Result<()> {
        let fission = self
            .cfg
            .fission
            .as_ref()
            .context("config has no [fission] section")?;

        let sim = BranchingProcessSimulator::new(
            fission.max_offspring,
            fission.n_generations,
            fission.p_1,
            fission.common_ratio,
        )
        .context("failed to construct simulator")?
        .with_overflow_policy(fission.overflow);
        log::info!(
            "offspring distribution {:?} (mean {:.4})",
            sim.distribution().probs(),
            sim.distribution().mean()
        );

        let mut engine = self.engine()?;
        log::info!(
            "simulating {} generations with seed {} on {} workers",
            sim.n_generations(),
            engine.seed(),
            engine.n_workers()
        );
        let table = sim
            .simulate(&mut engine, fission.n_trials)
            .context("failed to simulate fission")?;
        log::info!(
            "estimated {} buckets per generation from {} trials each",
            table.max_offspring() + 2,
            table.n_trials()
        );

        let output_file = self.fission_output_file();
        write_report(&table, &output_file)
            .with_context(|| format!("failed to write {output_file:?}"))?;
        log::info!("wrote {output_file:?}");

        let results_file = self.fission_results_file();
        save_msgpack(&table, &results_file)
            .with_context(|| format!("failed to save {results_file:?}"))?;
        log::info!("wrote {results_file:?}");

        Ok(())
    }

    pub fn run_secretary(&self) -> Result<()> {
        let secretary = self
            .cfg
            .secretary
            .as_ref()
            .context("config has no [secretary] section")?;

        let mut engine = self.engine()?;
        log::info!(
            "simulating secretary problem with seed {} on {} workers",
            engine.seed(),
            engine.n_workers()
        );
        for &n_successful in &secretary.success_criteria {
            let problem = SecretaryProblem::new(secretary.n_candidates, n_successful)
                .context("failed to construct problem")?
                .with_rule(secretary.rule);
            let curve = problem
                .success_curve(&mut engine, secretary.n_trials)
                .with_context(|| format!("failed to simulate s = {n_successful}"))?;

            let output_file =
                self.secretary_output_file(problem.n_candidates(), problem.n_successful());
            write_report(&curve, &output_file)
                .with_context(|| format!("failed to write {output_file:?}"))?;
            log::info!("wrote {output_file:?}");
        }

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let patterns = [
            self.fission_output_file(),
            self.fission_results_file(),
            self.sim_dir.join("secretary_problem_n_*_s_*.txt"),
        ];
        for pattern in patterns {
            let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
            for file in glob(pattern)
                .context("failed to glob output files")?
                .filter_map(Result::ok)
            {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
                log::info!("removed {file:?}");
            }
        }
        Ok(())
    }

    fn engine(&self) -> Result<Engine> {
        let n_workers = self.cfg.engine.n_workers;
        let engine = match self.cfg.engine.seed {
            Some(seed) => Engine::new(seed, n_workers),
            None => Engine::from_entropy(n_workers),
        };
        engine.context("failed to construct engine")
    }

    fn fission_output_file(&self) -> PathBuf {
        self.sim_dir.join("fission_output.txt")
    }

    fn fission_results_file(&self) -> PathBuf {
        self.sim_dir.join("fission_results.msgpack")
    }

    fn secretary_output_file(&self, n_candidates: usize, n_successful: usize) -> PathBuf {
        self.sim_dir
            .join(format!("secretary_problem_n_{n_candidates}_s_{n_successful}.txt"))
    }
}
