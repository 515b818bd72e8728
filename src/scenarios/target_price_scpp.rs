/// In this scenario we compare price predictions for three populations in
/// simultaneous first price auctions on three goods:
///
/// - Variant A: target price bidders
///
/// - Variant B: risk aware bidders with zero risk aversion, which must behave
///   exactly like variant A and therefore reach the identical belief
///
/// - Variant C: risk aware bidders with risk aversion 1, reported for comparison

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bidders::AgentType;
use crate::converge::{ConvergeConfig, ScppConverge, ScppOutcome};
use crate::distribution_update::{ks_distance, KappaSchedule};
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::price_distribution::{ExpectedPriceMethod, MarginalPriceDistribution, PriceGrid};
use crate::price_fit::HistogramFitter;
use crate::scenarios::{check, finish};
use crate::simulationrun::{AuctionSimulator, ReductionMode, SimulationConfig};
use crate::utils::{format_vec, get_seed};

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "target_price_scpp",
    run,
});

const GOODS: usize = 3;
const TOLERANCE: f64 = 0.05;

fn prepare_scppconverge(agent_type: AgentType) -> Result<ScppConverge<HistogramFitter>, Box<dyn std::error::Error>> {
    let grid = PriceGrid::default();
    let simulator = AuctionSimulator::new(SimulationConfig {
        goods: GOODS,
        agent_types: vec![agent_type; 6],
        instances: 400,
        reduction: ReductionMode::FIRST_PRICE,
        ..SimulationConfig::default()
    })?;
    let converge_config = ConvergeConfig {
        max_iterations: 30,
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

fn expected_prices(outcome: &ScppOutcome) -> Result<Vec<f64>, Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(get_seed(1));
    Ok(outcome.belief.expected_prices(ExpectedPriceMethod::BIN_CENTER_AVERAGE, &mut rng)?)
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let outcome_a = prepare_scppconverge(AgentType::TARGET_PRICE)?
        .run_variant("Target price bidders", scenario_name, "target-price", logger)?;
    let outcome_b = prepare_scppconverge(AgentType::RISK_AWARE { risk_aversion: 0.0 })?
        .run_variant("Risk aware bidders, A = 0", scenario_name, "risk-aware-0", logger)?;
    let outcome_c = prepare_scppconverge(AgentType::RISK_AWARE { risk_aversion: 1.0 })?
        .run_variant("Risk aware bidders, A = 1", scenario_name, "risk-aware-1", logger)?;

    let expected_a = expected_prices(&outcome_a)?;
    let expected_c = expected_prices(&outcome_c)?;
    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "Expected prices, target price: {}", format_vec(&expected_a));
    logln!(logger, LogEvent::Scenario, "Expected prices, risk aware A = 1: {}", format_vec(&expected_c));

    let mut errors: Vec<String> = Vec::new();

    for (name, outcome) in [("A", &outcome_a), ("B", &outcome_b), ("C", &outcome_c)] {
        check(
            logger,
            &mut errors,
            outcome.settled_before_step_bound(TOLERANCE),
            format!(
                "Variant {} settled before the step size forced it: {} iterations, final KS {:.4}",
                name, outcome.record.iteration_count, outcome.record.distance_metric
            ),
        );
    }

    let distance = ks_distance(&outcome_a.belief, &outcome_b.belief)?;
    check(
        logger,
        &mut errors,
        distance == 0.0,
        format!("Variant B (risk aware, A = 0) reproduces Variant A (target price): KS {:.6}", distance),
    );

    finish(scenario_name, errors)
}
