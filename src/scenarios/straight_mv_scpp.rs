/// Self-confirming price prediction for a population of straight marginal value
/// bidders in simultaneous first price auctions.
///
/// With the decaying step size the distance between consecutive beliefs is
/// bounded by the step size, so convergence only counts when it happens while
/// the step size is still above the tolerance.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bidders::AgentType;
use crate::converge::{ConvergeConfig, ScppConverge};
use crate::distribution_update::KappaSchedule;
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::price_distribution::{ExpectedPriceMethod, MarginalPriceDistribution, PriceGrid};
use crate::price_fit::HistogramFitter;
use crate::scenarios::{check, finish};
use crate::simulationrun::{AuctionSimulator, ReductionMode, SimulationConfig};
use crate::utils::{format_vec, get_seed, PDF_TOLERANCE};

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "straight_mv_scpp",
    run,
});

const GOODS: usize = 3;
const MAX_VALUATION: f64 = 50.0;
const TOLERANCE: f64 = 0.05;

/// Prepare the search: five straight MV bidders on three goods
fn prepare_scppconverge() -> Result<ScppConverge<HistogramFitter>, Box<dyn std::error::Error>> {
    let grid = PriceGrid::default();
    let simulator = AuctionSimulator::new(SimulationConfig {
        goods: GOODS,
        agent_types: vec![AgentType::STRAIGHT_MV; 5],
        max_valuation: MAX_VALUATION,
        instances: 500,
        reduction: ReductionMode::FIRST_PRICE,
        ..SimulationConfig::default()
    })?;
    let converge_config = ConvergeConfig {
        max_iterations: 40,
        tolerance: TOLERANCE,
        kappa: KappaSchedule::DECAYING { initial: 1.0 },
        instances_per_iteration: None,
    };
    Ok(ScppConverge::new(
        simulator,
        HistogramFitter::new(&grid)?,
        converge_config,
        MarginalPriceDistribution::uniform(&grid, GOODS)?,
    )?)
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let scpp_converge = prepare_scppconverge()?;
    let outcome = scpp_converge.run_variant("Straight MV bidders, first price", scenario_name, "straight-mv", logger)?;

    let mut rng = StdRng::seed_from_u64(get_seed(1));
    let expected = outcome.belief.expected_prices(ExpectedPriceMethod::BIN_CENTER_AVERAGE, &mut rng)?;

    logln!(logger, LogEvent::Scenario, "");
    let mut errors: Vec<String> = Vec::new();

    check(
        logger,
        &mut errors,
        outcome.settled_before_step_bound(TOLERANCE),
        format!(
            "Search settled before the step size forced it: {} iterations, final KS {:.4}, final kappa {:.4}",
            outcome.record.iteration_count,
            outcome.record.distance_metric,
            outcome.kappa_history.last().copied().unwrap_or(0.0)
        ),
    );

    let first = outcome.ks_history.first().copied().unwrap_or(0.0);
    let last = outcome.ks_history.last().copied().unwrap_or(0.0);
    check(
        logger,
        &mut errors,
        outcome.ks_history.len() == 1 || last < first,
        format!("KS distance shrinks over the search: {:.4} -> {:.4}", first, last),
    );

    check(
        logger,
        &mut errors,
        expected.iter().all(|p| *p > 0.0 && *p < MAX_VALUATION),
        format!("Expected closing prices lie inside (0, {}): {}", MAX_VALUATION, format_vec(&expected)),
    );

    check(
        logger,
        &mut errors,
        outcome.belief.data().iter().all(|h| (h.integral() - 1.0).abs() < PDF_TOLERANCE),
        "Final belief is a valid PDF for every good".to_string(),
    );

    finish(scenario_name, errors)
}
