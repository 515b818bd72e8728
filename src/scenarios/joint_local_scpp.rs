/// Joint local bidders in simultaneous second price auctions on two goods.
///
/// Each bidder draws joint price samples from the current belief, starts from
/// its straight MV bids and runs local search. A small instance, since every
/// bid is an optimization.
///
/// The second variant runs straight MV bidders on the same goods so the two
/// beliefs can be compared.

use crate::bidders::AgentType;
use crate::converge::{ConvergeConfig, ScppConverge};
use crate::distribution_update::{ks_distance, KappaSchedule};
use crate::logger::{Logger, LogEvent};
use crate::logln;
use crate::price_distribution::{MarginalPriceDistribution, PriceGrid};
use crate::price_fit::HistogramFitter;
use crate::scenarios::{check, finish};
use crate::simulationrun::{AuctionSimulator, ReductionMode, SimulationConfig};
use crate::utils::PDF_TOLERANCE;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "joint_local_scpp",
    run,
});

const GOODS: usize = 2;
const TOLERANCE: f64 = 0.15;

fn prepare_scppconverge(agent_type: AgentType) -> Result<ScppConverge<HistogramFitter>, Box<dyn std::error::Error>> {
    let grid = PriceGrid::default();
    let simulator = AuctionSimulator::new(SimulationConfig {
        goods: GOODS,
        agent_types: vec![agent_type; 4],
        instances: 100,
        reduction: ReductionMode::SECOND_PRICE,
        ..SimulationConfig::default()
    })?;
    let converge_config = ConvergeConfig {
        max_iterations: 10,
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
    let joint_local = AgentType::JOINT_LOCAL { samples: 50, max_iterations: 10 };
    let outcome_a = prepare_scppconverge(joint_local)?
        .run_variant("Joint local bidders, second price", scenario_name, "joint-local", logger)?;
    let outcome_b = prepare_scppconverge(AgentType::STRAIGHT_MV)?
        .run_variant("Straight MV bidders, second price", scenario_name, "straight-mv", logger)?;

    let distance = ks_distance(&outcome_a.belief, &outcome_b.belief)?;
    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "KS distance between the joint local and straight MV beliefs: {:.4}", distance);

    let mut errors: Vec<String> = Vec::new();

    check(
        logger,
        &mut errors,
        outcome_a.settled_before_step_bound(TOLERANCE),
        format!(
            "Joint local search settled before the step size forced it: {} iterations, final KS {:.4}",
            outcome_a.record.iteration_count, outcome_a.record.distance_metric
        ),
    );

    check(
        logger,
        &mut errors,
        outcome_a.ks_history.iter().all(|ks| (0.0..=1.0).contains(ks)),
        "Every KS distance lies in [0, 1]".to_string(),
    );

    check(
        logger,
        &mut errors,
        outcome_a.belief.data().iter().all(|h| (h.integral() - 1.0).abs() < PDF_TOLERANCE),
        "Final joint local belief is a valid PDF for every good".to_string(),
    );

    finish(scenario_name, errors)
}
