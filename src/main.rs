mod errors;
mod utils;
mod logger;
mod bundles;
mod joint_samples;
mod price_distribution;
mod price_fit;
mod distribution_update;
mod bid_optimizers;
mod bidder;
mod bidders;
mod simulationrun;
mod converge;
mod scenarios;

use logger::{Logger, LogEvent, ConsoleReceiver, sanitize_filename};
use std::path::PathBuf;

use scenarios::get_scenario_catalog;
use utils::{RAND_SEED, TOTAL_SIMULATION_RUNS};
use std::sync::atomic::Ordering;

/// Scenario run when no arguments are given
const DEFAULT_SCENARIO: &str = "straight_mv_scpp";

fn parse_number(args: &[String], position: usize, name: &str, default: u64) -> u64 {
    match args.get(position) {
        None => default,
        Some(arg) => match arg.parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Error: Invalid {} parameter '{}'. Expected a number.", name, arg);
                std::process::exit(1);
            }
        },
    }
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    // Parse and filter out --verbose and --fastbreak arguments
    let mut args = Vec::new();
    let mut skip_next = false;
    let mut fastbreak = false;
    for (i, arg) in raw_args.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--verbose" {
            if i + 1 < raw_args.len() && raw_args[i + 1] == "auction" {
                utils::VERBOSE_AUCTION.store(true, Ordering::Relaxed);
                skip_next = true;
            }
            continue;
        }
        if arg == "--fastbreak" {
            fastbreak = true;
            continue;
        }
        args.push(arg.clone());
    }

    let all_scenarios = get_scenario_catalog();

    if args.len() > 1 && args[1] == "list" {
        for s in &all_scenarios {
            println!("{}", s.short_name);
        }
        return;
    }

    if args.len() <= 1 {
        // Default behavior: one scenario with iteration level output on the console
        let mut logger = Logger::new();
        logger.add_receiver(ConsoleReceiver::new(vec![
            LogEvent::Iteration,
            LogEvent::Convergence,
            LogEvent::Variant,
            LogEvent::Scenario,
        ]));
        match all_scenarios.iter().find(|s| s.short_name == DEFAULT_SCENARIO) {
            Some(scenario) => {
                if let Err(e) = (scenario.run)(scenario.short_name, &mut logger) {
                    eprintln!("Error running scenario: {}", e);
                    std::process::exit(1);
                }
            }
            None => {
                eprintln!("Error: default scenario '{}' is not registered.", DEFAULT_SCENARIO);
                std::process::exit(1);
            }
        }
        return;
    }

    let scenario_arg = &args[1];
    let runs = parse_number(&args, 2, "runs", 1);
    let start_seed = parse_number(&args, 3, "start seed", 0);

    // Filter scenarios: if "all", use all scenarios; otherwise filter to the named scenario
    let scenarios: Vec<_> = if scenario_arg == "all" {
        all_scenarios.clone()
    } else {
        match all_scenarios.iter().find(|s| s.short_name == scenario_arg) {
            Some(scenario) => vec![scenario.clone()],
            None => {
                eprintln!("Error: Scenario '{}' not found.", scenario_arg);
                eprintln!("Available scenarios:");
                for s in &all_scenarios {
                    eprintln!("  - {}", s.short_name);
                }
                std::process::exit(1);
            }
        }
    };

    // Scenario level checks are shown on the console only for a single named run
    let mut logger = Logger::new();
    if scenario_arg != "all" && runs == 1 {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation, LogEvent::Scenario]));
    } else {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation]));
    }

    let summary_receiver_id = logger.add_file_receiver(&PathBuf::from("log/summary.log"), vec![LogEvent::Validation]);

    TOTAL_SIMULATION_RUNS.store(0, Ordering::Relaxed);

    let target = if scenario_arg == "all" {
        "all scenarios".to_string()
    } else {
        format!("scenario '{}'", scenario_arg)
    };
    if runs > 1 {
        logln!(&mut logger, LogEvent::Validation, "Running {} {} times...\n", target, runs);
    } else {
        logln!(&mut logger, LogEvent::Validation, "Running {}...\n", target);
    }

    // Outer loop for scenarios
    'scenarios: for scenario in &scenarios {
        log!(&mut logger, LogEvent::Validation, "{}: ", scenario.short_name);

        let scenario_receiver_id = logger.add_file_receiver(
            &PathBuf::from(format!("log/{}/scenario.log", sanitize_filename(scenario.short_name))),
            vec![LogEvent::Scenario],
        );

        // Inner loop over seeds
        for seed in start_seed..(start_seed + runs) {
            if runs > 1 {
                log!(&mut logger, LogEvent::Validation, "[{}/{}] ", seed - start_seed + 1, runs);
            }

            RAND_SEED.store(seed, Ordering::Relaxed);

            match (scenario.run)(scenario.short_name, &mut logger) {
                Ok(()) => {
                    if runs > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✓");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✓ PASSED");
                    }
                }
                Err(e) => {
                    if runs > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✗");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✗ FAILED: {}", e);
                    }

                    // If fastbreak is enabled, stop immediately on first failure
                    if fastbreak {
                        logger.remove_optional_receiver(scenario_receiver_id);
                        logln!(&mut logger, LogEvent::Validation, "\nStopping scenario execution due to failure (--fastbreak enabled)");
                        logln!(&mut logger, LogEvent::Validation, "Error at seed {}: {}", seed, e);
                        break 'scenarios;
                    }
                }
            }

            // Flush to ensure validation is written to summary.log
            let _ = logger.flush();
        }

        logger.remove_optional_receiver(scenario_receiver_id);
    }

    let final_count = TOTAL_SIMULATION_RUNS.load(Ordering::Relaxed);
    logln!(&mut logger, LogEvent::Validation, "\nTotal price update iterations completed: {}", final_count);

    logger.remove_optional_receiver(summary_receiver_id);
}
