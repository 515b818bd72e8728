/// This file contains the AuctionSimulator, which runs batches of simultaneous
/// sealed-bid auctions for a population of bidders sharing one price belief.
/// Every instance draws fresh valuations, collects one bid vector per bidder and
/// reduces the bid matrix to the observed closing prices.
///
/// Batches are split over a fixed pool of workers. Each worker builds its own
/// population and random source, so nothing mutable crosses worker boundaries;
/// sub-batches are concatenated in worker order.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::bidders::{AgentType, Bidders};
use crate::bundles::{validate_lambda, MAX_GOODS};
use crate::errors::{ScppError, ScppResult};
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::price_distribution::MarginalPriceDistribution;
use crate::utils::{format_vec, get_seed};

/// Distance between the seed offsets of consecutive batches
const WORKER_SEED_STRIDE: u64 = 10_007;

/// Observable extracted from one instance's bid matrix
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum ReductionMode {
    /// Every bidder's bid vector
    ALL_BIDS,
    /// Per-good highest bid
    FIRST_PRICE,
    /// Per-good highest bid once that good's top bidder is removed
    SECOND_PRICE,
    /// Per-good highest bid once the designated bidder is removed
    HIGHEST_OTHER_BID { self_index: Option<usize> },
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub goods: usize,
    pub agent_types: Vec<AgentType>,
    pub min_valuation: f64,
    pub max_valuation: f64,
    /// None draws lambda uniformly from [1, goods] for every valuation
    pub lambda: Option<usize>,
    pub instances: usize,
    pub workers: usize,
    pub reduction: ReductionMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            goods: 5,
            agent_types: vec![AgentType::STRAIGHT_MV; 8],
            min_valuation: 0.0,
            max_valuation: 50.0,
            lambda: None,
            instances: 1000,
            workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            reduction: ReductionMode::FIRST_PRICE,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> ScppResult<()> {
        if self.goods == 0 {
            return Err(ScppError::Configuration("at least one good is required".to_string()));
        }
        if self.goods > MAX_GOODS {
            return Err(ScppError::Configuration(format!(
                "{} goods exceed the maximum of {}",
                self.goods, MAX_GOODS
            )));
        }
        if self.agent_types.is_empty() {
            return Err(ScppError::Configuration("at least one agent is required".to_string()));
        }
        if !(self.min_valuation >= 0.0 && self.min_valuation <= self.max_valuation) {
            return Err(ScppError::Configuration(format!(
                "valuation range [{}, {}] is invalid",
                self.min_valuation, self.max_valuation
            )));
        }
        if let Some(lambda) = self.lambda {
            validate_lambda(lambda, self.goods)
                .map_err(|e| ScppError::Configuration(e.to_string()))?;
        }
        if self.instances == 0 {
            return Err(ScppError::Configuration("instances must be at least 1".to_string()));
        }
        if self.workers == 0 {
            return Err(ScppError::Configuration("workers must be at least 1".to_string()));
        }
        for agent_type in &self.agent_types {
            agent_type.validate()?;
        }
        check_reduction(&self.reduction, self.agent_types.len())
    }

    pub fn population_string(&self) -> String {
        let names: Vec<String> = self.agent_types.iter().map(|t| t.agent_type_string()).collect();
        names.join(", ")
    }
}

fn check_reduction(mode: &ReductionMode, agents: usize) -> ScppResult<()> {
    match *mode {
        ReductionMode::SECOND_PRICE if agents < 2 => Err(ScppError::Configuration(
            "second price reduction needs at least two agents".to_string(),
        )),
        ReductionMode::HIGHEST_OTHER_BID { self_index: None } => Err(ScppError::Configuration(
            "highest other bid reduction needs a designated agent index".to_string(),
        )),
        ReductionMode::HIGHEST_OTHER_BID { .. } if agents < 2 => Err(ScppError::Configuration(
            "highest other bid reduction needs at least two agents".to_string(),
        )),
        ReductionMode::HIGHEST_OTHER_BID { self_index: Some(index) } if index >= agents => {
            Err(ScppError::Configuration(format!(
                "designated agent {} does not exist among {} agents",
                index, agents
            )))
        }
        _ => Ok(()),
    }
}

/// Reduce one instance's `agents x goods` bid matrix to observation rows
///
/// ALL_BIDS returns the matrix itself, every other mode a single row.
pub fn reduce(bid_matrix: &[Vec<f64>], mode: &ReductionMode) -> ScppResult<Vec<Vec<f64>>> {
    let goods = match bid_matrix.first() {
        Some(row) => row.len(),
        None => return Err(ScppError::Validation("empty bid matrix".to_string())),
    };
    if bid_matrix.iter().any(|row| row.len() != goods) {
        return Err(ScppError::Validation("bid matrix rows differ in length".to_string()));
    }
    check_reduction(mode, bid_matrix.len())?;

    let column_max = |good: usize, skip: Option<usize>| {
        bid_matrix
            .iter()
            .enumerate()
            .filter(|(agent, _)| Some(*agent) != skip)
            .map(|(_, row)| row[good])
            .fold(f64::NEG_INFINITY, f64::max)
    };

    let row = match *mode {
        ReductionMode::ALL_BIDS => return Ok(bid_matrix.to_vec()),
        ReductionMode::FIRST_PRICE => (0..goods).map(|good| column_max(good, None)).collect(),
        ReductionMode::SECOND_PRICE => (0..goods)
            .map(|good| {
                // first top bidder is removed, so tied top bids leave the tie value
                let winner = bid_matrix
                    .iter()
                    .enumerate()
                    .fold(0, |best, (agent, row)| if row[good] > bid_matrix[best][good] { agent } else { best });
                column_max(good, Some(winner))
            })
            .collect(),
        ReductionMode::HIGHEST_OTHER_BID { self_index } => {
            (0..goods).map(|good| column_max(good, self_index)).collect()
        }
    };
    Ok(vec![row])
}

/// Split `instances` over `workers`; the last worker takes the remainder
pub fn partition_instances(instances: usize, workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    let mut counts = vec![instances / workers; workers];
    counts[workers - 1] += instances % workers;
    counts
}

/// Results of a batch of auction instances
#[derive(Debug, Clone, Default)]
pub struct SimulationRun {
    /// Bid matrix of every instance
    pub bid_matrices: Vec<Vec<Vec<f64>>>,
    /// Reduced observations of every instance, concatenated in instance order
    pub observations: Vec<Vec<f64>>,
}

impl SimulationRun {
    pub fn instances(&self) -> usize {
        self.bid_matrices.len()
    }

    fn append(&mut self, other: SimulationRun) {
        self.bid_matrices.extend(other.bid_matrices);
        self.observations.extend(other.observations);
    }

    /// Per-good mean of the observations
    pub fn mean_observation(&self) -> Vec<f64> {
        let goods = self.observations.first().map(|row| row.len()).unwrap_or(0);
        let mut sums = vec![0.0; goods];
        for row in &self.observations {
            for (sum, value) in sums.iter_mut().zip(row) {
                *sum += value;
            }
        }
        let n = self.observations.len().max(1) as f64;
        sums.into_iter().map(|s| s / n).collect()
    }

    pub fn printout(&self, logger: &mut Logger, event: LogEvent) {
        logln!(
            logger,
            event,
            "Simulated {} instances, {} observations, mean observed prices {}",
            self.instances(),
            self.observations.len(),
            format_vec(&self.mean_observation())
        );
    }

    /// Write every bid as a CSV row `instance,agent,bid_0,...`
    pub fn log_auctions(&self, logger: &mut Logger) {
        let goods = self.observations.first().map(|row| row.len()).unwrap_or(0);
        let mut header = vec!["instance".to_string(), "agent".to_string()];
        header.extend((0..goods).map(|good| format!("bid_{}", good)));
        logln!(logger, LogEvent::Auction, "{}", header.join(","));
        for (instance, matrix) in self.bid_matrices.iter().enumerate() {
            for (agent, bids) in matrix.iter().enumerate() {
                let fields: Vec<String> = bids.iter().map(|b| format!("{:.4}", b)).collect();
                logln!(logger, LogEvent::Auction, "{},{},{}", instance, agent, fields.join(","));
            }
        }
    }
}

/// Runs auction instances for the configured population
pub struct AuctionSimulator {
    pub config: SimulationConfig,
    pool: ThreadPool,
}

impl AuctionSimulator {
    /// Validate the configuration and start the worker pool
    pub fn new(config: SimulationConfig) -> ScppResult<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .map_err(|e| ScppError::ThreadPool(e.to_string()))?;
        Ok(Self { config, pool })
    }

    /// One auction instance: fresh valuations, then one bid vector per bidder
    pub fn run_instance(
        &self,
        bidders: &mut Bidders,
        belief: &MarginalPriceDistribution,
        rng: &mut StdRng,
    ) -> ScppResult<Vec<Vec<f64>>> {
        bidders.random_valuations(self.config.lambda, rng)?;
        bidders.bid_matrix(belief, rng)
    }

    /// Sequential sub-batch with its own population and random source
    fn run_sub_batch(&self, belief: &MarginalPriceDistribution, instances: usize, seed: u64) -> ScppResult<SimulationRun> {
        let config = &self.config;
        let mut bidders = Bidders::from_types(&config.agent_types, config.goods, config.min_valuation, config.max_valuation)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut run = SimulationRun::default();
        for _ in 0..instances {
            let bid_matrix = self.run_instance(&mut bidders, belief, &mut rng)?;
            run.observations.extend(reduce(&bid_matrix, &config.reduction)?);
            run.bid_matrices.push(bid_matrix);
        }
        Ok(run)
    }

    /// Run `instances` independent instances over the worker pool
    ///
    /// # Arguments
    /// * `belief` - Price belief every bidder bids against
    /// * `instances` - Number of auction instances
    /// * `seed_offset` - Distinguishes the random streams of different batches
    ///
    /// # Returns
    /// All instances, sub-batches concatenated in worker order
    pub fn run_batch(
        &self,
        belief: &MarginalPriceDistribution,
        instances: usize,
        seed_offset: u64,
    ) -> ScppResult<SimulationRun> {
        if belief.goods() != self.config.goods {
            return Err(ScppError::Validation(format!(
                "belief covers {} goods, simulation has {}",
                belief.goods(),
                self.config.goods
            )));
        }
        let counts = partition_instances(instances, self.config.workers);
        let base = seed_offset.wrapping_mul(WORKER_SEED_STRIDE);

        let sub_batches = self.pool.install(|| {
            counts
                .par_iter()
                .enumerate()
                .map(|(worker, count)| self.run_sub_batch(belief, *count, get_seed(base.wrapping_add(worker as u64))))
                .collect::<ScppResult<Vec<SimulationRun>>>()
        })?;

        let mut run = SimulationRun::default();
        for sub_batch in sub_batches {
            run.append(sub_batch);
        }
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_distribution::PriceGrid;

    fn bid_matrix() -> Vec<Vec<f64>> {
        vec![vec![10.0, 3.0], vec![7.0, 9.0], vec![8.0, 9.0]]
    }

    #[test]
    fn test_reduce_first_price() {
        assert_eq!(reduce(&bid_matrix(), &ReductionMode::FIRST_PRICE).unwrap(), vec![vec![10.0, 9.0]]);
    }

    #[test]
    fn test_reduce_second_price_uses_per_good_winner() {
        // good 0: agent 0 removed, good 1: first of the tied agents removed
        assert_eq!(reduce(&bid_matrix(), &ReductionMode::SECOND_PRICE).unwrap(), vec![vec![8.0, 9.0]]);
    }

    #[test]
    fn test_reduce_highest_other_bid() {
        let mode = ReductionMode::HIGHEST_OTHER_BID { self_index: Some(2) };
        assert_eq!(reduce(&bid_matrix(), &mode).unwrap(), vec![vec![10.0, 9.0]]);
        let mode = ReductionMode::HIGHEST_OTHER_BID { self_index: Some(0) };
        assert_eq!(reduce(&bid_matrix(), &mode).unwrap(), vec![vec![8.0, 9.0]]);
    }

    #[test]
    fn test_reduce_all_bids_keeps_matrix() {
        assert_eq!(reduce(&bid_matrix(), &ReductionMode::ALL_BIDS).unwrap(), bid_matrix());
    }

    #[test]
    fn test_highest_other_bid_needs_index() {
        let mode = ReductionMode::HIGHEST_OTHER_BID { self_index: None };
        assert!(matches!(reduce(&bid_matrix(), &mode), Err(ScppError::Configuration(_))));

        let config = SimulationConfig { reduction: mode, workers: 1, ..SimulationConfig::default() };
        assert!(matches!(AuctionSimulator::new(config), Err(ScppError::Configuration(_))));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let config = SimulationConfig { lambda: Some(6), ..SimulationConfig::default() };
        assert!(matches!(config.validate(), Err(ScppError::Configuration(_))));
        let config = SimulationConfig { min_valuation: 10.0, max_valuation: 5.0, ..SimulationConfig::default() };
        assert!(matches!(config.validate(), Err(ScppError::Configuration(_))));
        let config = SimulationConfig {
            agent_types: vec![AgentType::STRAIGHT_MV],
            reduction: ReductionMode::SECOND_PRICE,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ScppError::Configuration(_))));
        let config = SimulationConfig {
            agent_types: vec![AgentType::STRAIGHT_MV],
            reduction: ReductionMode::HIGHEST_OTHER_BID { self_index: Some(0) },
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ScppError::Configuration(_))));
        assert!(matches!(AuctionSimulator::new(config), Err(ScppError::Configuration(_))));
        let config = SimulationConfig { goods: MAX_GOODS + 1, ..SimulationConfig::default() };
        assert!(matches!(config.validate(), Err(ScppError::Configuration(_))));
        let config = SimulationConfig { goods: usize::BITS as usize, ..SimulationConfig::default() };
        assert!(matches!(config.validate(), Err(ScppError::Configuration(_))));
    }

    #[test]
    fn test_partition_gives_remainder_to_last_worker() {
        assert_eq!(partition_instances(10, 3), vec![3, 3, 4]);
        assert_eq!(partition_instances(2, 4), vec![0, 0, 0, 2]);
        assert_eq!(partition_instances(9, 3).iter().sum::<usize>(), 9);
    }

    #[test]
    fn test_run_batch_returns_every_instance() {
        let belief = MarginalPriceDistribution::uniform(&PriceGrid::default(), 3).unwrap();
        for (instances, workers) in [(10, 3), (7, 7), (2, 4), (5, 1)] {
            let config = SimulationConfig {
                goods: 3,
                agent_types: vec![AgentType::STRAIGHT_MV, AgentType::TARGET_PRICE],
                instances,
                workers,
                ..SimulationConfig::default()
            };
            let simulator = AuctionSimulator::new(config).unwrap();
            let run = simulator.run_batch(&belief, instances, 1).unwrap();
            assert_eq!(run.instances(), instances);
            assert_eq!(run.observations.len(), instances);
            assert!(run.bid_matrices.iter().all(|m| m.len() == 2 && m.iter().all(|row| row.len() == 3)));
        }
    }

    #[test]
    fn test_run_batch_is_reproducible() {
        let belief = MarginalPriceDistribution::uniform(&PriceGrid::default(), 2).unwrap();
        let config = SimulationConfig {
            goods: 2,
            agent_types: vec![AgentType::STRAIGHT_MV; 3],
            reduction: ReductionMode::ALL_BIDS,
            workers: 2,
            ..SimulationConfig::default()
        };
        let simulator = AuctionSimulator::new(config).unwrap();
        let a = simulator.run_batch(&belief, 6, 4).unwrap();
        let b = simulator.run_batch(&belief, 6, 4).unwrap();
        assert_eq!(a.observations, b.observations);
        assert_eq!(a.observations.len(), 18);
    }
}
