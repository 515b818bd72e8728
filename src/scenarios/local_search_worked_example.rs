/// Two goods, per-good values [45, 20], perfect substitutes, starting bids [25, 25],
/// 1000 joint price samples in four groups:
///
/// - 100 x [20, 15], 400 x [20, 20], 100 x [30, 15], 400 x [30, 20]
///
/// The marginal value rule must walk 25, 10, 45, 0, 45 and stop at [45, 0]
/// after three sweeps. The sampled surplus rule is run as a second variant and
/// must only ever bid observed prices.

use crate::bid_optimizers::{CoordinateRule, JointLocalBidOptimizer, LocalSearchConfig};
use crate::bundles::{revenue, BundleSpace};
use crate::joint_samples::JointPriceSamples;
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::scenarios::{check, finish};
use crate::utils::{almost_equal, format_vec};

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "local_search_worked_example",
    run,
});

const EXPECTED_TRACE: [f64; 5] = [25.0, 10.0, 45.0, 0.0, 45.0];

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let bundles = BundleSpace::new(2)?;
    let revenue = revenue(&bundles, &[45.0, 20.0], 1)?;
    let samples = JointPriceSamples::from_weighted(
        2,
        &[
            (100, vec![20.0, 15.0]),
            (400, vec![20.0, 20.0]),
            (100, vec![30.0, 15.0]),
            (400, vec![30.0, 20.0]),
        ],
    )?;
    let initial_bids = [25.0, 25.0];

    let marginal = JointLocalBidOptimizer::new(LocalSearchConfig::default())?;
    let result = marginal.local_search(&bundles, &revenue, &initial_bids, &samples, 100)?;

    logln!(logger, LogEvent::Scenario, "{} rule:", marginal.get_optimizer_type());
    for (good, bid) in &result.trace {
        logln!(logger, LogEvent::Scenario, "  update good {} -> {:.4}", good, bid);
    }
    logln!(
        logger,
        LogEvent::Scenario,
        "  final bids {}, converged {}, sweeps {}, tolerance {:.3e}",
        format_vec(&result.bids),
        result.record.converged,
        result.record.iteration_count,
        result.record.distance_metric
    );

    let surplus = JointLocalBidOptimizer::new(LocalSearchConfig {
        rule: CoordinateRule::SAMPLED_SURPLUS,
        ..LocalSearchConfig::default()
    })?;
    let surplus_result = surplus.local_search(&bundles, &revenue, &initial_bids, &samples, 100)?;
    logln!(
        logger,
        LogEvent::Scenario,
        "{} rule: final bids {}, converged {}, sweeps {}",
        surplus.get_optimizer_type(),
        format_vec(&surplus_result.bids),
        surplus_result.record.converged,
        surplus_result.record.iteration_count
    );

    logln!(logger, LogEvent::Scenario, "");
    let mut errors: Vec<String> = Vec::new();

    let trace: Vec<f64> = result.trace.iter().take(EXPECTED_TRACE.len()).map(|(_, bid)| *bid).collect();
    let trace_matches = trace.len() == EXPECTED_TRACE.len()
        && trace.iter().zip(EXPECTED_TRACE).all(|(got, want)| almost_equal(*got, want, 1e-9));
    check(
        logger,
        &mut errors,
        trace_matches,
        format!("Coordinate updates follow {}: {}", format_vec(&EXPECTED_TRACE), format_vec(&trace)),
    );

    check(
        logger,
        &mut errors,
        almost_equal(result.bids[0], 45.0, 1e-9) && almost_equal(result.bids[1], 0.0, 1e-9),
        format!("Final bids are [45, 0]: {}", format_vec(&result.bids)),
    );

    check(
        logger,
        &mut errors,
        result.record.converged && result.record.iteration_count == 3 && result.record.distance_metric.abs() < 1e-9,
        format!(
            "Converged after 3 sweeps with zero tolerance: converged {}, sweeps {}, tolerance {:.3e}",
            result.record.converged, result.record.iteration_count, result.record.distance_metric
        ),
    );

    let observed_only = surplus_result
        .bids
        .iter()
        .enumerate()
        .all(|(good, bid)| samples.distinct_values(good).contains(bid));
    check(
        logger,
        &mut errors,
        observed_only,
        format!("Sampled surplus bids are observed prices: {}", format_vec(&surplus_result.bids)),
    );

    finish(scenario_name, errors)
}
