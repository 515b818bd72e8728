/// Damped update of a price belief and distances between beliefs
///
/// Both distributions handed to any function here must cover the same goods
/// with identical bin edges; anything else is a validation error because the
/// bin-by-bin arithmetic would be meaningless.

use crate::errors::{ScppError, ScppResult};
use crate::price_distribution::{MarginalHistogram, MarginalPriceDistribution};
use crate::utils::PDF_TOLERANCE;

/// Value written in place of a negative blended density
/// Keeps a small positive probability on every price
pub const ZERO_EPSILON: f64 = 0.00001;

/// Blended histograms closer to one than this are left unscaled
const RENORMALIZE_THRESHOLD: f64 = 1e-12;

/// Step size of the damped update over the outer iterations
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KappaSchedule {
    /// Same step size in every iteration
    CONSTANT { kappa: f64 },
    /// `initial * (T - t) / T` for iteration `t` of `T`
    DECAYING { initial: f64 },
}

impl KappaSchedule {
    pub fn kappa(&self, iteration: usize, max_iterations: usize) -> f64 {
        match *self {
            KappaSchedule::CONSTANT { kappa } => kappa,
            KappaSchedule::DECAYING { initial } => {
                let total = max_iterations.max(1) as f64;
                let remaining = max_iterations.saturating_sub(iteration) as f64;
                initial * remaining / total
            }
        }
    }

    pub fn validate(&self) -> ScppResult<()> {
        let value = match *self {
            KappaSchedule::CONSTANT { kappa } => kappa,
            KappaSchedule::DECAYING { initial } => initial,
        };
        if !(0.0..=1.0).contains(&value) {
            return Err(ScppError::Configuration(format!("kappa must lie in [0, 1], got {}", value)));
        }
        Ok(())
    }

    pub fn schedule_string(&self) -> String {
        match *self {
            KappaSchedule::CONSTANT { kappa } => format!("constant kappa {:.3}", kappa),
            KappaSchedule::DECAYING { initial } => format!("decaying kappa from {:.3}", initial),
        }
    }
}

/// Check that two beliefs are comparable bin by bin
fn check_compatible(a: &MarginalPriceDistribution, b: &MarginalPriceDistribution) -> ScppResult<()> {
    if a.goods() != b.goods() {
        return Err(ScppError::Validation(format!(
            "distributions cover {} and {} goods",
            a.goods(),
            b.goods()
        )));
    }
    for (good, (ha, hb)) in a.data().iter().zip(b.data()).enumerate() {
        if ha.bin_edges != hb.bin_edges {
            return Err(ScppError::Validation(format!("good {}: bin edges differ", good)));
        }
        if ha.density.len() != hb.density.len() {
            return Err(ScppError::Validation(format!("good {}: bin counts differ", good)));
        }
    }
    Ok(())
}

/// Damped update `old + kappa * (new - old)` of every good's density
///
/// Any finite `kappa >= 0` is accepted; above one the step over-relaxes and
/// can push bins negative. Negative blended densities are replaced by
/// `ZERO_EPSILON` and each histogram is rescaled to integrate to one.
/// `kappa == 0` returns the old belief unchanged. Neither input is modified.
pub fn update(
    old: &MarginalPriceDistribution,
    new: &MarginalPriceDistribution,
    kappa: f64,
) -> ScppResult<MarginalPriceDistribution> {
    check_compatible(old, new)?;
    if !kappa.is_finite() || kappa < 0.0 {
        return Err(ScppError::InvalidParameter(format!("kappa must be finite and non-negative, got {}", kappa)));
    }
    if kappa == 0.0 {
        return Ok(old.clone());
    }

    let mut blended_data = Vec::with_capacity(old.goods());
    for (good, (ho, hn)) in old.data().iter().zip(new.data()).enumerate() {
        // (1 - kappa) * old + kappa * new, which reproduces new exactly at kappa 1
        let mut density: Vec<f64> = ho
            .density
            .iter()
            .zip(&hn.density)
            .map(|(o, n)| (1.0 - kappa) * o + kappa * n)
            .map(|d| if d < 0.0 { ZERO_EPSILON } else { d })
            .collect();

        let mut histogram = MarginalHistogram::new(density.clone(), ho.bin_edges.clone());
        let integral = histogram.integral();
        if !(integral > 0.0) {
            return Err(ScppError::Validation(format!("good {}: blended histogram has no mass", good)));
        }
        if (integral - 1.0).abs() > RENORMALIZE_THRESHOLD {
            density.iter_mut().for_each(|d| *d /= integral);
            histogram = MarginalHistogram::new(density, ho.bin_edges.clone());
        }

        let renormalized = histogram.integral();
        if (renormalized - 1.0).abs() > PDF_TOLERANCE {
            return Err(ScppError::Validation(format!(
                "good {}: renormalization failed, integral = {}",
                good, renormalized
            )));
        }
        blended_data.push(histogram);
    }

    MarginalPriceDistribution::from_histograms(blended_data)
}

/// Largest per-good Kolmogorov-Smirnov statistic, max_j max_x |F_j(x) - F'_j(x)|
pub fn ks_distance(a: &MarginalPriceDistribution, b: &MarginalPriceDistribution) -> ScppResult<f64> {
    check_compatible(a, b)?;
    let mut distance: f64 = 0.0;
    for (ha, hb) in a.data().iter().zip(b.data()) {
        let mut cumulative_a = 0.0;
        let mut cumulative_b = 0.0;
        for (pa, pb) in ha.masses().iter().zip(hb.masses()) {
            cumulative_a += pa;
            cumulative_b += pb;
            distance = distance.max((cumulative_a - cumulative_b).abs());
        }
    }
    Ok(distance)
}

/// Σ_goods Σ_bins p * ln(p / q) over bin probabilities
/// Zero probabilities are replaced by machine epsilon before taking logarithms
pub fn kl_divergence(a: &MarginalPriceDistribution, b: &MarginalPriceDistribution) -> ScppResult<f64> {
    check_compatible(a, b)?;
    let floor = |p: f64| if p == 0.0 { f64::EPSILON } else { p };
    let mut divergence = 0.0;
    for (ha, hb) in a.data().iter().zip(b.data()) {
        for (pa, pb) in ha.masses().iter().zip(hb.masses()) {
            let p = floor(*pa);
            let q = floor(pb);
            divergence += p * (p.ln() - q.ln());
        }
    }
    Ok(divergence)
}

/// KL(a || b) + KL(b || a)
pub fn symmetric_kl_divergence(a: &MarginalPriceDistribution, b: &MarginalPriceDistribution) -> ScppResult<f64> {
    Ok(kl_divergence(a, b)? + kl_divergence(b, a)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_distribution::PriceGrid;

    fn belief(samples: &[f64]) -> MarginalPriceDistribution {
        let rows: Vec<Vec<f64>> = samples.iter().map(|p| vec![*p, 10.0 - *p]).collect();
        MarginalPriceDistribution::from_samples(&rows, &PriceGrid::new(0.0, 10.0, 1.0).edges().unwrap()).unwrap()
    }

    fn a() -> MarginalPriceDistribution {
        belief(&[1.0, 2.5, 2.7, 3.3, 9.0, 0.2, 0.3])
    }

    fn b() -> MarginalPriceDistribution {
        belief(&[5.5, 6.1, 7.0, 7.2, 4.4])
    }

    #[test]
    fn test_update_with_zero_kappa_keeps_old() {
        assert_eq!(update(&a(), &b(), 0.0).unwrap(), a());
    }

    #[test]
    fn test_update_with_unit_kappa_gives_new() {
        let updated = update(&a(), &b(), 1.0).unwrap();
        for (hu, hb) in updated.data().iter().zip(b().data()) {
            for (u, n) in hu.density.iter().zip(&hb.density) {
                assert!((u - n).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_update_blends_and_stays_normalized() {
        let updated = update(&a(), &b(), 0.5).unwrap();
        for histogram in updated.data() {
            assert!((histogram.integral() - 1.0).abs() < 1e-8);
        }
        let expected = 0.5 * a().data()[0].density[2] + 0.5 * b().data()[0].density[2];
        assert!((updated.data()[0].density[2] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_update_does_not_touch_inputs() {
        let old = a();
        let new = b();
        let _ = update(&old, &new, 0.3).unwrap();
        assert_eq!(old, a());
        assert_eq!(new, b());
    }

    #[test]
    fn test_update_rejects_mismatched_edges() {
        let other = MarginalPriceDistribution::uniform(&PriceGrid::new(0.0, 10.0, 2.0), 2).unwrap();
        assert!(matches!(update(&a(), &other, 0.5), Err(ScppError::Validation(_))));
        assert!(matches!(ks_distance(&a(), &other), Err(ScppError::Validation(_))));
        let one_good = MarginalPriceDistribution::uniform(&PriceGrid::new(0.0, 10.0, 1.0), 1).unwrap();
        assert!(matches!(kl_divergence(&a(), &one_good), Err(ScppError::Validation(_))));
    }

    #[test]
    fn test_update_rejects_invalid_kappa() {
        assert!(matches!(update(&a(), &b(), -0.1), Err(ScppError::InvalidParameter(_))));
        assert!(matches!(update(&a(), &b(), f64::NAN), Err(ScppError::InvalidParameter(_))));
        assert!(matches!(update(&a(), &b(), f64::INFINITY), Err(ScppError::InvalidParameter(_))));
    }

    #[test]
    fn test_update_over_relaxation_clamps_negative_bins() {
        let edges = vec![0.0, 1.0, 2.0];
        let old = MarginalPriceDistribution::from_histograms(vec![MarginalHistogram::new(vec![0.9, 0.1], edges.clone())]).unwrap();
        let new = MarginalPriceDistribution::from_histograms(vec![MarginalHistogram::new(vec![0.0, 1.0], edges)]).unwrap();
        // 1.5 * 0 - 0.5 * 0.9 < 0 on bin 0, 1.5 * 1 - 0.5 * 0.1 = 1.45 on bin 1
        let updated = update(&old, &new, 1.5).unwrap();
        let histogram = &updated.data()[0];
        let integral = 1.45 + ZERO_EPSILON;
        assert!((histogram.density[0] - ZERO_EPSILON / integral).abs() < 1e-15);
        assert!((histogram.density[1] - 1.45 / integral).abs() < 1e-12);
        assert!(histogram.density[0] > 0.0);
        assert!((histogram.integral() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_update_with_zero_kappa_keeps_slightly_unnormalized_old() {
        let edges = vec![0.0, 1.0, 2.0];
        // integral 1 + 1e-10, inside the accepted tolerance
        let old = MarginalPriceDistribution::from_histograms(vec![MarginalHistogram::new(vec![0.5000000001, 0.5], edges.clone())]).unwrap();
        let new = MarginalPriceDistribution::from_histograms(vec![MarginalHistogram::new(vec![0.2, 0.8], edges)]).unwrap();
        assert_eq!(update(&old, &new, 0.0).unwrap(), old);
    }

    #[test]
    fn test_ks_symmetric_and_zero_on_self() {
        assert_eq!(ks_distance(&a(), &b()).unwrap(), ks_distance(&b(), &a()).unwrap());
        assert_eq!(ks_distance(&a(), &a()).unwrap(), 0.0);
    }

    #[test]
    fn test_ks_value() {
        // good 0 of a() has 6/7 of its mass below 4 while b() has none
        let ks = ks_distance(&a(), &b()).unwrap();
        assert!((ks - 6.0 / 7.0).abs() < 1e-12, "ks = {}", ks);
    }

    #[test]
    fn test_kl_divergence() {
        assert!(kl_divergence(&a(), &a()).unwrap().abs() < 1e-12);
        assert!(kl_divergence(&a(), &b()).unwrap() > 0.0);
        let symmetric = symmetric_kl_divergence(&a(), &b()).unwrap();
        assert!((symmetric - symmetric_kl_divergence(&b(), &a()).unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_kappa_schedules() {
        assert_eq!(KappaSchedule::CONSTANT { kappa: 0.2 }.kappa(7, 10), 0.2);
        let decaying = KappaSchedule::DECAYING { initial: 1.0 };
        assert_eq!(decaying.kappa(0, 10), 1.0);
        assert!((decaying.kappa(5, 10) - 0.5).abs() < 1e-12);
        assert!(KappaSchedule::CONSTANT { kappa: -0.1 }.validate().is_err());
    }
}
