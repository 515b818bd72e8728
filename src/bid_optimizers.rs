/// Joint local bid optimization
///
/// A bidder's bid vector is improved one good at a time against a fixed set of
/// joint price samples. Winning a good in a sample means bidding at least the
/// sampled closing price of that good. Sweeps go over the goods in order
/// 0, 1, ..., m-1 and stop at a fixed point or after the sweep cap.

use crate::bundles::BundleSpace;
use crate::errors::{ScppError, ScppResult};
use crate::joint_samples::JointPriceSamples;

/// Single coordinate update rule
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateRule {
    /// Sample average of the value good k adds to the bundle won on the other goods
    MARGINAL_VALUE,
    /// Best observed price of good k by sampled surplus, lowest on ties
    SAMPLED_SURPLUS,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalSearchConfig {
    pub max_iterations: usize,
    /// A sweep whose largest bid change is at most this counts as a fixed point
    pub convergence_tolerance: f64,
    pub rule: CoordinateRule,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_tolerance: 1e-10,
            rule: CoordinateRule::MARGINAL_VALUE,
        }
    }
}

impl LocalSearchConfig {
    pub fn validate(&self) -> ScppResult<()> {
        if self.max_iterations == 0 {
            return Err(ScppError::Configuration("local search needs max_iterations >= 1".to_string()));
        }
        if !(self.convergence_tolerance >= 0.0) {
            return Err(ScppError::Configuration(format!(
                "convergence tolerance must be non-negative, got {}",
                self.convergence_tolerance
            )));
        }
        Ok(())
    }
}

/// Outcome of a fixed point search, either the optimizer's sweeps or the outer update loop
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceRecord {
    pub distance_metric: f64,
    pub iteration_count: usize,
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct LocalSearchResult {
    pub bids: Vec<f64>,
    pub record: ConvergenceRecord,
    /// Every coordinate update in the order applied, as (good, new bid)
    pub trace: Vec<(usize, f64)>,
}

/// Trait for single coordinate bid update rules
pub trait BidOptimizerTrait {
    /// Best bid for `target` with every other bid held fixed
    ///
    /// # Arguments
    /// * `bundles` - The bundle space `revenue` is indexed by
    /// * `revenue` - Valuation of every bundle
    /// * `bids` - Current bid vector; only the other goods' entries are read
    /// * `target` - Index of the good to update
    /// * `samples` - Joint closing-price samples
    fn get_optimized_bid(
        &self,
        bundles: &BundleSpace,
        revenue: &[f64],
        bids: &[f64],
        target: usize,
        samples: &JointPriceSamples,
    ) -> ScppResult<f64>;

    /// Get the name/type of this optimizer
    fn get_optimizer_type(&self) -> String;
}

/// Canonical index of the bundle won against one sample
/// `skip` is treated as not won regardless of its bid
#[inline]
fn won_bundle_index(bids: &[f64], sample: &[f64], skip: Option<usize>) -> usize {
    bids.iter()
        .zip(sample)
        .enumerate()
        .fold(0usize, |index, (good, (bid, price))| {
            let won = Some(good) != skip && bid >= price;
            (index << 1) | won as usize
        })
}

fn check_inputs(
    bundles: &BundleSpace,
    revenue: &[f64],
    bids: &[f64],
    target: usize,
    samples: &JointPriceSamples,
) -> ScppResult<()> {
    let goods = bundles.goods();
    if revenue.len() != bundles.len() {
        return Err(ScppError::Validation(format!(
            "revenue table has {} entries for {} bundles",
            revenue.len(),
            bundles.len()
        )));
    }
    if bids.len() != goods || samples.goods() != goods {
        return Err(ScppError::Validation(format!(
            "bids ({}) and samples ({}) must cover {} goods",
            bids.len(),
            samples.goods(),
            goods
        )));
    }
    if target >= goods {
        return Err(ScppError::Validation(format!("target good {} out of range 0..{}", target, goods)));
    }
    if samples.is_empty() {
        return Err(ScppError::Validation("local search needs at least one joint sample".to_string()));
    }
    Ok(())
}

pub struct BidOptimizerMarginalValue;

impl BidOptimizerTrait for BidOptimizerMarginalValue {
    fn get_optimized_bid(
        &self,
        bundles: &BundleSpace,
        revenue: &[f64],
        bids: &[f64],
        target: usize,
        samples: &JointPriceSamples,
    ) -> ScppResult<f64> {
        check_inputs(bundles, revenue, bids, target, samples)?;
        let target_bit = 1usize << (bundles.goods() - 1 - target);

        let total: f64 = samples
            .rows()
            .iter()
            .map(|sample| {
                let without = won_bundle_index(bids, sample, Some(target));
                revenue[without | target_bit] - revenue[without]
            })
            .sum();
        Ok(total / samples.len() as f64)
    }

    fn get_optimizer_type(&self) -> String {
        "MarginalValue".to_string()
    }
}

pub struct BidOptimizerSampledSurplus;

impl BidOptimizerSampledSurplus {
    fn expected_surplus(revenue: &[f64], bids: &[f64], samples: &JointPriceSamples) -> f64 {
        let total: f64 = samples
            .rows()
            .iter()
            .map(|sample| {
                let paid: f64 = bids
                    .iter()
                    .zip(sample)
                    .filter(|(bid, price)| bid >= price)
                    .map(|(_, price)| *price)
                    .sum();
                revenue[won_bundle_index(bids, sample, None)] - paid
            })
            .sum();
        total / samples.len() as f64
    }
}

impl BidOptimizerTrait for BidOptimizerSampledSurplus {
    fn get_optimized_bid(
        &self,
        bundles: &BundleSpace,
        revenue: &[f64],
        bids: &[f64],
        target: usize,
        samples: &JointPriceSamples,
    ) -> ScppResult<f64> {
        check_inputs(bundles, revenue, bids, target, samples)?;

        let mut trial = bids.to_vec();
        let mut best: Option<(f64, f64)> = None;
        // ascending candidates; only a strictly better surplus replaces the best
        for candidate in samples.distinct_values(target) {
            trial[target] = candidate;
            let surplus = Self::expected_surplus(revenue, &trial, samples);
            match best {
                Some((_, best_surplus)) if surplus <= best_surplus => {}
                _ => best = Some((candidate, surplus)),
            }
        }
        best.map(|(bid, _)| bid)
            .ok_or_else(|| ScppError::Validation("no candidate bids in the samples".to_string()))
    }

    fn get_optimizer_type(&self) -> String {
        "SampledSurplus".to_string()
    }
}

/// Coordinate ascent over a bidder's bid vector
pub struct JointLocalBidOptimizer {
    config: LocalSearchConfig,
    optimizer: Box<dyn BidOptimizerTrait>,
}

impl JointLocalBidOptimizer {
    pub fn new(config: LocalSearchConfig) -> ScppResult<Self> {
        config.validate()?;
        let optimizer: Box<dyn BidOptimizerTrait> = match config.rule {
            CoordinateRule::MARGINAL_VALUE => Box::new(BidOptimizerMarginalValue),
            CoordinateRule::SAMPLED_SURPLUS => Box::new(BidOptimizerSampledSurplus),
        };
        Ok(Self { config, optimizer })
    }

    pub fn get_optimizer_type(&self) -> String {
        self.optimizer.get_optimizer_type()
    }

    /// New bid for `target`, other coordinates held at `bids`
    pub fn update_one_coordinate(
        &self,
        bundles: &BundleSpace,
        revenue: &[f64],
        bids: &[f64],
        target: usize,
        samples: &JointPriceSamples,
    ) -> ScppResult<f64> {
        self.optimizer.get_optimized_bid(bundles, revenue, bids, target, samples)
    }

    /// Sweep the goods in order until a sweep changes no bid by more than the
    /// convergence tolerance, or `max_iterations` sweeps have run
    ///
    /// Within a sweep each update sees the bids already updated earlier in the
    /// same sweep. Reaching the cap is reported through `record.converged`.
    pub fn local_search(
        &self,
        bundles: &BundleSpace,
        revenue: &[f64],
        initial_bids: &[f64],
        samples: &JointPriceSamples,
        max_iterations: usize,
    ) -> ScppResult<LocalSearchResult> {
        if max_iterations == 0 {
            return Err(ScppError::InvalidParameter("local search needs at least one sweep".to_string()));
        }

        let mut bids = initial_bids.to_vec();
        let mut trace = Vec::new();
        let mut tolerance = f64::INFINITY;

        for iteration in 1..=max_iterations {
            let previous = bids.clone();
            for target in 0..bundles.goods() {
                let bid = self.update_one_coordinate(bundles, revenue, &bids, target, samples)?;
                bids[target] = bid;
                trace.push((target, bid));
            }

            tolerance = bids
                .iter()
                .zip(&previous)
                .map(|(new, old)| (new - old).abs())
                .fold(0.0, f64::max);

            if tolerance <= self.config.convergence_tolerance {
                return Ok(LocalSearchResult {
                    bids,
                    record: ConvergenceRecord {
                        distance_metric: tolerance,
                        iteration_count: iteration,
                        converged: true,
                    },
                    trace,
                });
            }
        }

        Ok(LocalSearchResult {
            bids,
            record: ConvergenceRecord {
                distance_metric: tolerance,
                iteration_count: max_iterations,
                converged: false,
            },
            trace,
        })
    }

    /// `local_search` with the configured sweep cap
    pub fn search(
        &self,
        bundles: &BundleSpace,
        revenue: &[f64],
        initial_bids: &[f64],
        samples: &JointPriceSamples,
    ) -> ScppResult<LocalSearchResult> {
        self.local_search(bundles, revenue, initial_bids, samples, self.config.max_iterations)
    }
}

/// Two goods, values [45, 20], substitutes, 1000 joint samples in four groups
#[cfg(test)]
pub(crate) fn worked_example() -> (BundleSpace, Vec<f64>, JointPriceSamples) {
    let bundles = BundleSpace::new(2).unwrap();
    let revenue = crate::bundles::revenue(&bundles, &[45.0, 20.0], 1).unwrap();
    let samples = JointPriceSamples::from_weighted(
        2,
        &[
            (100, vec![20.0, 15.0]),
            (400, vec![20.0, 20.0]),
            (100, vec![30.0, 15.0]),
            (400, vec![30.0, 20.0]),
        ],
    )
    .unwrap();
    (bundles, revenue, samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimizer(rule: CoordinateRule) -> JointLocalBidOptimizer {
        JointLocalBidOptimizer::new(LocalSearchConfig { rule, ..LocalSearchConfig::default() }).unwrap()
    }

    #[test]
    fn test_worked_example_coordinate_trace() {
        let (bundles, revenue, samples) = worked_example();
        let search = optimizer(CoordinateRule::MARGINAL_VALUE);
        let mut bids = vec![25.0, 25.0];
        let mut trace = Vec::new();
        for target in [0, 1, 0, 1, 0] {
            bids[target] = search.update_one_coordinate(&bundles, &revenue, &bids, target, &samples).unwrap();
            trace.push(bids[target]);
        }
        let expected = [25.0, 10.0, 45.0, 0.0, 45.0];
        for (got, want) in trace.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "trace {:?}", trace);
        }
    }

    #[test]
    fn test_worked_example_local_search() {
        let (bundles, revenue, samples) = worked_example();
        let result = optimizer(CoordinateRule::MARGINAL_VALUE)
            .local_search(&bundles, &revenue, &[25.0, 25.0], &samples, 100)
            .unwrap();
        assert!((result.bids[0] - 45.0).abs() < 1e-9);
        assert!(result.bids[1].abs() < 1e-9);
        assert!(result.record.converged);
        assert_eq!(result.record.iteration_count, 3);
        assert!(result.record.distance_metric.abs() < 1e-9);
        assert_eq!(result.trace.len(), 6);
    }

    #[test]
    fn test_cap_reached_is_not_an_error() {
        let (bundles, revenue, samples) = worked_example();
        let result = optimizer(CoordinateRule::MARGINAL_VALUE)
            .local_search(&bundles, &revenue, &[25.0, 25.0], &samples, 1)
            .unwrap();
        assert!(!result.record.converged);
        assert_eq!(result.record.iteration_count, 1);
        assert!((result.record.distance_metric - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_local_search_is_deterministic() {
        let (bundles, revenue, samples) = worked_example();
        let search = optimizer(CoordinateRule::SAMPLED_SURPLUS);
        let a = search.local_search(&bundles, &revenue, &[25.0, 25.0], &samples, 50).unwrap();
        let b = search.local_search(&bundles, &revenue, &[25.0, 25.0], &samples, 50).unwrap();
        assert_eq!(a.bids, b.bids);
        assert_eq!(a.record, b.record);
    }

    #[test]
    fn test_sampled_surplus_picks_observed_prices() {
        let (bundles, revenue, samples) = worked_example();
        let search = optimizer(CoordinateRule::SAMPLED_SURPLUS);
        // surplus 3.5 at 20 against 1.0 at 30
        assert_eq!(search.update_one_coordinate(&bundles, &revenue, &[25.0, 25.0], 0, &samples).unwrap(), 20.0);
        // surplus 17 at 15 against 1.0 at 20
        assert_eq!(search.update_one_coordinate(&bundles, &revenue, &[45.0, 25.0], 1, &samples).unwrap(), 15.0);
    }

    #[test]
    fn test_sampled_surplus_ties_go_to_the_lowest_bid() {
        let bundles = BundleSpace::new(1).unwrap();
        // bidding 5 or 10 both average a surplus of 10 / 3
        let samples = JointPriceSamples::new(1, vec![vec![5.0], vec![5.0], vec![10.0]]).unwrap();
        let revenue = vec![0.0, 10.0];
        let bid = optimizer(CoordinateRule::SAMPLED_SURPLUS)
            .update_one_coordinate(&bundles, &revenue, &[7.0], 0, &samples)
            .unwrap();
        assert_eq!(bid, 5.0);
    }

    #[test]
    fn test_mismatched_inputs_are_rejected() {
        let (bundles, revenue, samples) = worked_example();
        let search = optimizer(CoordinateRule::MARGINAL_VALUE);
        assert!(matches!(
            search.update_one_coordinate(&bundles, &revenue[..3], &[1.0, 1.0], 0, &samples),
            Err(ScppError::Validation(_))
        ));
        assert!(matches!(
            search.update_one_coordinate(&bundles, &revenue, &[1.0, 1.0], 2, &samples),
            Err(ScppError::Validation(_))
        ));
        let empty = JointPriceSamples::new(2, Vec::new()).unwrap();
        assert!(matches!(
            search.update_one_coordinate(&bundles, &revenue, &[1.0, 1.0], 0, &empty),
            Err(ScppError::Validation(_))
        ));
    }
}
