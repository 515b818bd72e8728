use std::path::PathBuf;
use std::sync::atomic::Ordering;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bid_optimizers::ConvergenceRecord;
use crate::distribution_update::{ks_distance, symmetric_kl_divergence, update, KappaSchedule};
use crate::errors::{ScppError, ScppResult};
use crate::logger::{sanitize_filename, LogEvent, Logger};
use crate::price_distribution::{ExpectedPriceMethod, MarginalPriceDistribution};
use crate::price_fit::PriceFitterTrait;
use crate::simulationrun::{AuctionSimulator, SimulationRun};
use crate::utils::{format_vec, get_seed, TOTAL_SIMULATION_RUNS, VERBOSE_AUCTION};
use crate::{logln, warnln};

/// Seed offset of the random source used only for logged expected prices
const REPORT_SEED_OFFSET: u64 = 999_983;

#[derive(Debug, Clone)]
pub struct ConvergeConfig {
    pub max_iterations: usize,
    /// Stop once the KS distance between consecutive beliefs drops below this
    pub tolerance: f64,
    pub kappa: KappaSchedule,
    /// None uses the simulator's configured instance count
    pub instances_per_iteration: Option<usize>,
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 0.01,
            kappa: KappaSchedule::DECAYING { initial: 1.0 },
            instances_per_iteration: None,
        }
    }
}

impl ConvergeConfig {
    pub fn validate(&self) -> ScppResult<()> {
        if self.max_iterations == 0 {
            return Err(ScppError::Configuration("max_iterations must be at least 1".to_string()));
        }
        if !(self.tolerance > 0.0) {
            return Err(ScppError::Configuration(format!("tolerance must be positive, got {}", self.tolerance)));
        }
        if self.instances_per_iteration == Some(0) {
            return Err(ScppError::Configuration("instances_per_iteration must be at least 1".to_string()));
        }
        self.kappa.validate()
    }
}

/// Final belief of one price prediction search and how it got there
#[derive(Debug, Clone)]
pub struct ScppOutcome {
    pub belief: MarginalPriceDistribution,
    pub record: ConvergenceRecord,
    /// KS distance between consecutive beliefs, one entry per iteration
    pub ks_history: Vec<f64>,
    /// Symmetric KL divergence between consecutive beliefs, one entry per iteration
    pub kl_history: Vec<f64>,
    /// Step size used in each iteration
    pub kappa_history: Vec<f64>,
}

impl ScppOutcome {
    /// Converged while the step size alone could not force the KS distance
    /// under `tolerance`
    ///
    /// Consecutive beliefs are at most `kappa` apart in KS distance, so a stop
    /// in an iteration with `kappa < tolerance` says nothing about the beliefs.
    pub fn settled_before_step_bound(&self, tolerance: f64) -> bool {
        self.record.converged && self.kappa_history.last().map_or(false, |kappa| *kappa >= tolerance)
    }

    pub fn printout(&self, logger: &mut Logger, event: LogEvent) -> ScppResult<()> {
        let mut rng = StdRng::seed_from_u64(get_seed(REPORT_SEED_OFFSET));
        let expected = self.belief.expected_prices(ExpectedPriceMethod::BIN_CENTER_AVERAGE, &mut rng)?;
        logln!(
            logger,
            event,
            "Converged: {}, iterations: {}, final KS: {:.6}",
            self.record.converged,
            self.record.iteration_count,
            self.record.distance_metric
        );
        logln!(logger, event, "Expected closing prices: {}", format_vec(&expected));
        logln!(logger, event, "KS history: {}", format_vec(&self.ks_history));
        Ok(())
    }
}

/// The self-confirming price prediction search
///
/// Every iteration simulates the population against the current belief, fits
/// a new belief to the observed closing prices and blends it in with the
/// damped update. The loop is strictly sequential over iterations.
pub struct ScppConverge<F: PriceFitterTrait<Model = MarginalPriceDistribution>> {
    pub simulator: AuctionSimulator,
    pub fitter: F,
    pub config: ConvergeConfig,
    pub initial_belief: MarginalPriceDistribution,
}

impl<F: PriceFitterTrait<Model = MarginalPriceDistribution>> ScppConverge<F> {
    pub fn new(
        simulator: AuctionSimulator,
        fitter: F,
        config: ConvergeConfig,
        initial_belief: MarginalPriceDistribution,
    ) -> ScppResult<Self> {
        config.validate()?;
        if initial_belief.goods() != simulator.config.goods {
            return Err(ScppError::Configuration(format!(
                "initial belief covers {} goods, simulation has {}",
                initial_belief.goods(),
                simulator.config.goods
            )));
        }
        Ok(Self { simulator, fitter, config, initial_belief })
    }

    fn log_auctions(&self, run: &SimulationRun, scenario_name: &str, variant_name: &str, iteration: usize, logger: &mut Logger) {
        let path = PathBuf::from(format!(
            "log/{}/auctions-{}-iter{}.csv",
            sanitize_filename(scenario_name),
            sanitize_filename(variant_name),
            iteration + 1
        ));
        let receiver_id = logger.add_file_receiver(&path, vec![LogEvent::Auction]);
        run.log_auctions(logger);
        logger.remove_optional_receiver(receiver_id);
    }

    /// Run the update loop until the KS distance drops below tolerance or the
    /// iteration cap is reached
    ///
    /// # Arguments
    /// * `scenario_name` - Name of the scenario (for log file paths)
    /// * `variant_name` - Name of the variant being run
    /// * `logger` - Logger for event-based logging
    ///
    /// # Returns
    /// The final belief with its ConvergenceRecord. Hitting the cap is not an error.
    pub fn run(&self, scenario_name: &str, variant_name: &str, logger: &mut Logger) -> ScppResult<ScppOutcome> {
        let max_iterations = self.config.max_iterations;
        let instances = self.config.instances_per_iteration.unwrap_or(self.simulator.config.instances);
        let mut report_rng = StdRng::seed_from_u64(get_seed(REPORT_SEED_OFFSET));

        let mut belief = self.initial_belief.clone();
        let mut ks_history = Vec::with_capacity(max_iterations);
        let mut kl_history = Vec::with_capacity(max_iterations);
        let mut kappa_history = Vec::with_capacity(max_iterations);

        for iteration in 0..max_iterations {
            logln!(logger, LogEvent::Iteration, "\n=== {} - Iteration {} ===", variant_name, iteration + 1);

            let run = self.simulator.run_batch(&belief, instances, iteration as u64)?;
            TOTAL_SIMULATION_RUNS.fetch_add(1, Ordering::Relaxed);
            if VERBOSE_AUCTION.load(Ordering::Relaxed) {
                self.log_auctions(&run, scenario_name, variant_name, iteration, logger);
            }
            run.printout(logger, LogEvent::Iteration);

            let observed = self.fitter.fit(&run.observations)?;
            let kappa = self.config.kappa.kappa(iteration, max_iterations);
            let next = update(&belief, &observed, kappa)?;
            let ks = ks_distance(&belief, &next)?;
            let kl = symmetric_kl_divergence(&belief, &next)?;
            ks_history.push(ks);
            kl_history.push(kl);
            kappa_history.push(kappa);

            let expected = next.expected_prices(ExpectedPriceMethod::BIN_CENTER_AVERAGE, &mut report_rng)?;
            logln!(
                logger,
                LogEvent::Iteration,
                "kappa {:.4}, KS {:.6}, KL {:.6}, expected prices {}",
                kappa,
                ks,
                kl,
                format_vec(&expected)
            );

            belief = next;

            if ks < self.config.tolerance {
                logln!(logger, LogEvent::Convergence, "{}: Converged after {} iterations (KS {:.6})", variant_name, iteration + 1, ks);
                return Ok(ScppOutcome {
                    belief,
                    record: ConvergenceRecord {
                        distance_metric: ks,
                        iteration_count: iteration + 1,
                        converged: true,
                    },
                    ks_history,
                    kl_history,
                    kappa_history,
                });
            }
        }

        warnln!(logger, LogEvent::Convergence, "{}: Reached maximum iterations ({})", variant_name, max_iterations);
        let distance_metric = ks_history.last().copied().unwrap_or(f64::INFINITY);
        Ok(ScppOutcome {
            belief,
            record: ConvergenceRecord {
                distance_metric,
                iteration_count: max_iterations,
                converged: false,
            },
            ks_history,
            kl_history,
            kappa_history,
        })
    }

    /// Run one variant with its own log files and save the final belief
    ///
    /// # Arguments
    /// * `variant_description` - Description of the variant being run
    /// * `scenario_name` - Name of the scenario (for log file paths)
    /// * `variant_name` - Name of the variant (for log file paths)
    /// * `logger` - Logger for event-based logging
    pub fn run_variant(
        &self,
        variant_description: &str,
        scenario_name: &str,
        variant_name: &str,
        logger: &mut Logger,
    ) -> ScppResult<ScppOutcome> {
        let directory = PathBuf::from(format!("log/{}", sanitize_filename(scenario_name)));
        let iterations_receiver_id = logger.add_file_receiver(
            &directory.join(format!("iterations-{}.log", sanitize_filename(variant_name))),
            vec![LogEvent::Iteration, LogEvent::Convergence],
        );
        let variant_receiver_id = logger.add_file_receiver(
            &directory.join(format!("variant-{}.log", sanitize_filename(variant_name))),
            vec![LogEvent::Variant],
        );

        logln!(logger, LogEvent::Variant, "\n=== {} ===", variant_description);
        logln!(logger, LogEvent::Variant, "Population: {}", self.simulator.config.population_string());
        logln!(
            logger,
            LogEvent::Variant,
            "Reduction: {:?}, {}, tolerance {}, fitter {}",
            self.simulator.config.reduction,
            self.config.kappa.schedule_string(),
            self.config.tolerance,
            self.fitter.get_fitter_type()
        );

        let result = match self.run(scenario_name, variant_name, logger) {
            Ok(outcome) => outcome.printout(logger, LogEvent::Variant).map(|_| outcome),
            Err(e) => Err(e),
        };
        if let Ok(outcome) = &result {
            let belief_path = directory.join(format!("belief-{}.txt", sanitize_filename(variant_name)));
            if let Err(e) = outcome.belief.save_txt(&belief_path) {
                warnln!(logger, LogEvent::Variant, "Could not save belief to {}: {}", belief_path.display(), e);
            }
        }

        // Remove variant-specific receivers
        logger.remove_optional_receiver(variant_receiver_id);
        logger.remove_optional_receiver(iterations_receiver_id);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidders::AgentType;
    use crate::logger::MemoryReceiver;
    use crate::price_distribution::PriceGrid;
    use crate::price_fit::HistogramFitter;
    use crate::simulationrun::SimulationConfig;

    fn converge(config: ConvergeConfig) -> ScppConverge<HistogramFitter> {
        let grid = PriceGrid::default();
        let simulator = AuctionSimulator::new(SimulationConfig {
            goods: 2,
            agent_types: vec![AgentType::STRAIGHT_MV; 4],
            instances: 40,
            workers: 2,
            ..SimulationConfig::default()
        })
        .unwrap();
        let fitter = HistogramFitter::new(&grid).unwrap();
        let initial = MarginalPriceDistribution::uniform(&grid, 2).unwrap();
        ScppConverge::new(simulator, fitter, config, initial).unwrap()
    }

    #[test]
    fn test_cap_reached_reports_non_convergence() {
        let search = converge(ConvergeConfig { max_iterations: 3, tolerance: 1e-12, ..ConvergeConfig::default() });
        let mut logger = Logger::new();
        let (receiver, lines) = MemoryReceiver::new(vec![LogEvent::Validation]);
        logger.add_receiver(receiver);

        let outcome = search.run("test", "cap", &mut logger).unwrap();
        assert!(!outcome.record.converged);
        assert_eq!(outcome.record.iteration_count, 3);
        assert_eq!(outcome.ks_history.len(), 3);
        assert_eq!(outcome.kl_history.len(), 3);
        assert_eq!(outcome.record.distance_metric, outcome.ks_history[2]);
        assert_eq!(outcome.kappa_history.len(), 3);
        assert!(!outcome.settled_before_step_bound(1e-12));
        assert!(lines.borrow().contains("WARNING cap: Reached maximum iterations (3)"));
    }

    #[test]
    fn test_loose_tolerance_converges_immediately() {
        let search = converge(ConvergeConfig { max_iterations: 5, tolerance: 1.5, ..ConvergeConfig::default() });
        let mut logger = Logger::new();
        let outcome = search.run("test", "loose", &mut logger).unwrap();
        assert!(outcome.record.converged);
        assert_eq!(outcome.record.iteration_count, 1);
        // kappa 1 is already below the tolerance, so the stop was forced
        assert!(!outcome.settled_before_step_bound(1.5));
        for histogram in outcome.belief.data() {
            assert!((histogram.integral() - 1.0).abs() < 1e-8);
        }
    }

    #[test]
    fn test_zero_kappa_keeps_initial_belief() {
        let search = converge(ConvergeConfig {
            max_iterations: 2,
            tolerance: 1e-3,
            kappa: KappaSchedule::CONSTANT { kappa: 0.0 },
            ..ConvergeConfig::default()
        });
        let mut logger = Logger::new();
        let outcome = search.run("test", "frozen", &mut logger).unwrap();
        assert_eq!(outcome.belief, search.initial_belief);
        assert!(outcome.record.converged);
        assert_eq!(outcome.ks_history, vec![0.0]);
        assert!(!outcome.settled_before_step_bound(1e-3));
    }

    #[test]
    fn test_settled_needs_a_step_above_tolerance() {
        let search = converge(ConvergeConfig { max_iterations: 4, tolerance: 0.1, ..ConvergeConfig::default() });
        let mut outcome = ScppOutcome {
            belief: search.initial_belief.clone(),
            record: ConvergenceRecord { distance_metric: 0.05, iteration_count: 2, converged: true },
            ks_history: vec![0.6, 0.05],
            kl_history: vec![1.0, 0.01],
            kappa_history: vec![1.0, 0.75],
        };
        assert!(outcome.settled_before_step_bound(0.1));
        outcome.kappa_history = vec![1.0, 0.05];
        assert!(!outcome.settled_before_step_bound(0.1));
        outcome.kappa_history = vec![1.0, 0.75];
        outcome.record.converged = false;
        assert!(!outcome.settled_before_step_bound(0.1));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ConvergeConfig { tolerance: 0.0, ..ConvergeConfig::default() };
        assert!(matches!(config.validate(), Err(ScppError::Configuration(_))));
        let config = ConvergeConfig { kappa: KappaSchedule::CONSTANT { kappa: 2.0 }, ..ConvergeConfig::default() };
        assert!(matches!(config.validate(), Err(ScppError::Configuration(_))));
    }
}
