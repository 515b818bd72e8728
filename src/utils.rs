use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Seed of the current run, set by main before each scenario iteration
pub static RAND_SEED: AtomicU64 = AtomicU64::new(0);

/// Number of outer update iterations executed since the counter was reset
pub static TOTAL_SIMULATION_RUNS: AtomicU64 = AtomicU64::new(0);

/// When set, every simulated auction instance is written to a CSV log
pub static VERBOSE_AUCTION: AtomicBool = AtomicBool::new(false);

/// Absolute tolerance used when checking that a histogram integrates to one
pub const PDF_TOLERANCE: f64 = 1e-8;

/// Derive a seed for one random source from the global run seed
///
/// Every random source in the program uses a distinct `offset` so that two
/// sources never share a stream while the whole run stays reproducible.
pub fn get_seed(offset: u64) -> u64 {
    RAND_SEED
        .load(Ordering::Relaxed)
        .wrapping_mul(1_000_003)
        .wrapping_add(offset)
}

/// Compare two floats within an absolute tolerance
pub fn almost_equal(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Format a float slice as `[a, b, c]` with fixed precision for logging
pub fn format_vec(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{:.4}", v)).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_seed_differs_per_offset() {
        assert_ne!(get_seed(1), get_seed(2));
    }

    #[test]
    fn test_format_vec() {
        assert_eq!(format_vec(&[1.0, 2.5]), "[1.0000, 2.5000]");
    }
}
