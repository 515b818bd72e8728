/// Marginal closing-price beliefs stored as one normalized histogram per good
///
/// Bins are closed-open `[e_i, e_{i+1})` except the last one which is closed on
/// both ends. A histogram is a valid PDF when `Σ density[i] * width[i] == 1`.
/// Instances are never mutated after construction: the update rule produces a
/// new belief so the previous one stays available for distance measurement.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::distributions::WeightedIndex;
use rand_distr::Distribution;

use crate::errors::{ScppError, ScppResult};
use crate::joint_samples::JointPriceSamples;
use crate::utils::PDF_TOLERANCE;

/// Tolerance for interpolated probabilities slightly outside [0, 1]
const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Evenly spaced price bins shared by every belief of one search
#[derive(Debug, Clone, PartialEq)]
pub struct PriceGrid {
    pub min_price: f64,
    pub max_price: f64,
    pub bin_width: f64,
}

impl Default for PriceGrid {
    fn default() -> Self {
        Self {
            min_price: 0.0,
            max_price: 50.0,
            bin_width: 1.0,
        }
    }
}

impl PriceGrid {
    pub fn new(min_price: f64, max_price: f64, bin_width: f64) -> Self {
        Self { min_price, max_price, bin_width }
    }

    /// Bin edges from min_price to max_price; the last bin is shorter when the
    /// range is not a multiple of the width
    pub fn edges(&self) -> ScppResult<Vec<f64>> {
        if !(self.bin_width > 0.0) || !(self.max_price > self.min_price) {
            return Err(ScppError::Configuration(format!(
                "price grid needs max_price > min_price and bin_width > 0, got [{}, {}] width {}",
                self.min_price, self.max_price, self.bin_width
            )));
        }
        let bins = ((self.max_price - self.min_price) / self.bin_width - 1e-9).ceil() as usize;
        let mut edges: Vec<f64> = (0..bins)
            .map(|i| self.min_price + i as f64 * self.bin_width)
            .collect();
        edges.push(self.max_price);
        Ok(edges)
    }
}

/// How to compute an expected price from a histogram
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpectedPriceMethod {
    /// Σ mass[i] * center[i]; the histogram must be a valid PDF
    BIN_CENTER_AVERAGE,
    /// Σ mass[i] * left_edge[i] after normalizing the masses
    DENSITY_WEIGHTED_EDGE_AVERAGE,
    /// Mean of `samples` draws made with `sample`
    INVERSE_TRANSFORM_SAMPLE { samples: usize },
}

/// Histogram of one good: density per bin and the bin edges
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalHistogram {
    pub density: Vec<f64>,
    pub bin_edges: Vec<f64>,
}

impl MarginalHistogram {
    pub fn new(density: Vec<f64>, bin_edges: Vec<f64>) -> Self {
        Self { density, bin_edges }
    }

    pub fn bins(&self) -> usize {
        self.density.len()
    }

    pub fn widths(&self) -> Vec<f64> {
        self.bin_edges.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn centers(&self) -> Vec<f64> {
        self.bin_edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Probability mass of every bin (density * width)
    pub fn masses(&self) -> Vec<f64> {
        self.density
            .iter()
            .zip(self.bin_edges.windows(2))
            .map(|(d, w)| d * (w[1] - w[0]))
            .collect()
    }

    /// Σ density * width
    pub fn integral(&self) -> f64 {
        self.masses().iter().sum()
    }

    /// Index of the bin containing `x`; values outside the edges map to the boundary bins
    pub fn bin_index(&self, x: f64) -> usize {
        let last = self.bins() - 1;
        if x >= self.bin_edges[last + 1] {
            return last;
        }
        let edges_at_or_below = self.bin_edges.partition_point(|edge| *edge <= x);
        edges_at_or_below.saturating_sub(1).min(last)
    }

    /// Check shape, sign, edge ordering and that the histogram integrates to one
    pub fn validate(&self) -> ScppResult<()> {
        if self.density.is_empty() {
            return Err(ScppError::Validation("histogram has no bins".to_string()));
        }
        if self.bin_edges.len() != self.density.len() + 1 {
            return Err(ScppError::Validation(format!(
                "histogram has {} bins but {} edges (expected {})",
                self.density.len(),
                self.bin_edges.len(),
                self.density.len() + 1
            )));
        }
        if self.density.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(ScppError::Validation("histogram density must be finite and non-negative".to_string()));
        }
        if self.bin_edges.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(ScppError::Validation("bin edges must be strictly increasing".to_string()));
        }
        let integral = self.integral();
        if (integral - 1.0).abs() > PDF_TOLERANCE {
            return Err(ScppError::Validation(format!(
                "marginal distribution must be a valid PDF, integral = {}",
                integral
            )));
        }
        Ok(())
    }
}

/// Per-good marginal closing-price distribution
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalPriceDistribution {
    data: Vec<MarginalHistogram>,
}

impl MarginalPriceDistribution {
    /// Build from already normalized histograms
    pub fn from_histograms(data: Vec<MarginalHistogram>) -> ScppResult<Self> {
        if data.is_empty() {
            return Err(ScppError::Validation("distribution needs at least one good".to_string()));
        }
        for (good, histogram) in data.iter().enumerate() {
            histogram.validate().map_err(|e| match e {
                ScppError::Validation(message) => ScppError::Validation(format!("good {}: {}", good, message)),
                other => other,
            })?;
        }
        Ok(Self { data })
    }

    /// Build a normalized histogram per good from raw price vectors
    ///
    /// Every good uses `bin_edges`. Prices at or above the last edge are
    /// counted in the last (closed) bin, prices below the first edge in the first.
    pub fn from_samples(samples: &[Vec<f64>], bin_edges: &[f64]) -> ScppResult<Self> {
        let goods = match samples.first() {
            Some(first) => first.len(),
            None => return Err(ScppError::Validation("cannot build a histogram from zero samples".to_string())),
        };
        if bin_edges.len() < 2 {
            return Err(ScppError::Validation("need at least two bin edges".to_string()));
        }

        let template = MarginalHistogram::new(vec![0.0; bin_edges.len() - 1], bin_edges.to_vec());
        let widths = template.widths();
        let mut counts = vec![vec![0usize; template.bins()]; goods];

        for (row, sample) in samples.iter().enumerate() {
            if sample.len() != goods {
                return Err(ScppError::Validation(format!(
                    "sample {} has {} prices, expected {}",
                    row,
                    sample.len(),
                    goods
                )));
            }
            for (good, price) in sample.iter().enumerate() {
                if !price.is_finite() {
                    return Err(ScppError::Validation(format!("sample {} has a non-finite price", row)));
                }
                counts[good][template.bin_index(*price)] += 1;
            }
        }

        let total = samples.len() as f64;
        let data = counts
            .into_iter()
            .map(|good_counts| {
                let density = good_counts
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| *c as f64 / (total * w))
                    .collect();
                MarginalHistogram::new(density, bin_edges.to_vec())
            })
            .collect();

        Self::from_histograms(data)
    }

    /// Uniform belief over the grid for every good
    pub fn uniform(grid: &PriceGrid, goods: usize) -> ScppResult<Self> {
        let edges = grid.edges()?;
        let span = edges[edges.len() - 1] - edges[0];
        let density = vec![1.0 / span; edges.len() - 1];
        Self::from_histograms(vec![MarginalHistogram::new(density, edges); goods])
    }

    /// One row of raw counts per good over unit bins `0, 1, ..., len`
    pub fn from_count_rows(rows: &[Vec<f64>]) -> ScppResult<Self> {
        let data = rows
            .iter()
            .enumerate()
            .map(|(good, counts)| {
                let total: f64 = counts.iter().sum();
                if !(total > 0.0) {
                    return Err(ScppError::Validation(format!("good {} has no counts", good)));
                }
                let density = counts.iter().map(|c| c / total).collect();
                let edges = (0..=counts.len()).map(|e| e as f64).collect();
                Ok(MarginalHistogram::new(density, edges))
            })
            .collect::<ScppResult<Vec<_>>>()?;
        Self::from_histograms(data)
    }

    /// Parse the text format: per good, one line of densities then one line of edges
    pub fn from_serialized(text: &str) -> ScppResult<Self> {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.is_empty() || lines.len() % 2 != 0 {
            return Err(ScppError::Parse(format!(
                "expected alternating density / edge lines, found {} lines",
                lines.len()
            )));
        }

        let parse_line = |line: &str, line_no: usize| -> ScppResult<Vec<f64>> {
            line.split_whitespace()
                .map(|token| {
                    token.parse::<f64>().map_err(|e| {
                        ScppError::Parse(format!("line {}: '{}' is not a number ({})", line_no + 1, token, e))
                    })
                })
                .collect()
        };

        let mut data = Vec::with_capacity(lines.len() / 2);
        for pair in 0..lines.len() / 2 {
            let density = parse_line(lines[2 * pair], 2 * pair)?;
            let bin_edges = parse_line(lines[2 * pair + 1], 2 * pair + 1)?;
            data.push(MarginalHistogram::new(density, bin_edges));
        }
        Self::from_histograms(data)
    }

    pub fn copy_of(other: &MarginalPriceDistribution) -> Self {
        other.clone()
    }

    pub fn to_serialized(&self) -> String {
        let join = |values: &[f64]| values.iter().map(|v| format!("{}", v)).collect::<Vec<_>>().join(" ");
        let mut text = String::new();
        for histogram in &self.data {
            text.push_str(&join(&histogram.density));
            text.push('\n');
            text.push_str(&join(&histogram.bin_edges));
            text.push('\n');
        }
        text
    }

    pub fn save_txt(&self, path: &Path) -> ScppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_serialized())?;
        Ok(())
    }

    pub fn load_txt(path: &Path) -> ScppResult<Self> {
        Self::from_serialized(&fs::read_to_string(path)?)
    }

    pub fn goods(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[MarginalHistogram] {
        &self.data
    }

    pub fn histogram(&self, good: usize) -> ScppResult<&MarginalHistogram> {
        self.data.get(good).ok_or_else(|| {
            ScppError::Validation(format!("good {} out of range, distribution has {} goods", good, self.data.len()))
        })
    }

    /// Expected closing price of one good
    pub fn expected_price(&self, good: usize, method: ExpectedPriceMethod, rng: &mut StdRng) -> ScppResult<f64> {
        let histogram = self.histogram(good)?;
        match method {
            ExpectedPriceMethod::BIN_CENTER_AVERAGE => {
                histogram.validate()?;
                Ok(histogram
                    .masses()
                    .iter()
                    .zip(histogram.centers())
                    .map(|(p, c)| p * c)
                    .sum())
            }
            ExpectedPriceMethod::DENSITY_WEIGHTED_EDGE_AVERAGE => {
                let masses = histogram.masses();
                let total: f64 = masses.iter().sum();
                if !(total > 0.0) {
                    return Err(ScppError::Validation(format!("good {} has zero probability mass", good)));
                }
                Ok(masses
                    .iter()
                    .zip(&histogram.bin_edges)
                    .map(|(p, edge)| p / total * edge)
                    .sum())
            }
            ExpectedPriceMethod::INVERSE_TRANSFORM_SAMPLE { samples } => {
                if samples == 0 {
                    return Err(ScppError::InvalidParameter("inverse transform sampling needs at least one sample".to_string()));
                }
                let sampler = Self::bin_sampler(histogram, good)?;
                let sum: f64 = (0..samples)
                    .map(|_| histogram.bin_edges[sampler.sample(rng)])
                    .sum();
                Ok(sum / samples as f64)
            }
        }
    }

    /// Expected price of every good
    pub fn expected_prices(&self, method: ExpectedPriceMethod, rng: &mut StdRng) -> ScppResult<Vec<f64>> {
        (0..self.goods()).map(|good| self.expected_price(good, method, rng)).collect()
    }

    fn bin_sampler(histogram: &MarginalHistogram, good: usize) -> ScppResult<WeightedIndex<f64>> {
        WeightedIndex::new(histogram.masses())
            .map_err(|e| ScppError::Validation(format!("good {} cannot be sampled: {}", good, e)))
    }

    /// Draw `n` joint price vectors from the independent marginals
    ///
    /// Each price is obtained with one categorical draw over the bin masses and
    /// reported as the LEFT edge of the chosen bin.
    pub fn sample(&self, n: usize, rng: &mut StdRng) -> ScppResult<JointPriceSamples> {
        let samplers = self
            .data
            .iter()
            .enumerate()
            .map(|(good, histogram)| Self::bin_sampler(histogram, good))
            .collect::<ScppResult<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(n);
        for _ in 0..n {
            let row = self
                .data
                .iter()
                .zip(&samplers)
                .map(|(histogram, sampler)| histogram.bin_edges[sampler.sample(rng)])
                .collect();
            rows.push(row);
        }
        JointPriceSamples::new(self.goods(), rows)
    }

    /// Pr[closing price of `good` <= x], linear interpolation of the cumulative mass over the edges
    pub fn cdf(&self, x: f64, good: usize) -> ScppResult<f64> {
        let histogram = self.histogram(good)?;
        let edges = &histogram.bin_edges;
        if x <= edges[0] {
            return Ok(0.0);
        }
        if x >= edges[edges.len() - 1] {
            return Ok(1.0);
        }

        let masses = histogram.masses();
        let bin = histogram.bin_index(x);
        let below: f64 = masses[..bin].iter().sum();
        let fraction = (x - edges[bin]) / (edges[bin + 1] - edges[bin]);
        let value = below + fraction * masses[bin];

        if value < -PROBABILITY_TOLERANCE || value > 1.0 + PROBABILITY_TOLERANCE {
            return Err(ScppError::Domain(format!(
                "cdf({}) of good {} = {} lies outside [0, 1]",
                x, good, value
            )));
        }
        Ok(value.clamp(0.0, 1.0))
    }

    /// Density at `x`, interpolated between bin centers
    /// Outside the bin-center range the boundary bin's density is returned
    pub fn pdf(&self, x: f64, good: usize) -> ScppResult<f64> {
        let histogram = self.histogram(good)?;
        let centers = histogram.centers();
        let density = &histogram.density;
        let last = centers.len() - 1;

        if x <= centers[0] {
            return Ok(density[0]);
        }
        if x >= centers[last] {
            return Ok(density[last]);
        }

        let upper = centers.partition_point(|c| *c <= x);
        let lower = upper - 1;
        let fraction = (x - centers[lower]) / (centers[upper] - centers[lower]);
        Ok(density[lower] + fraction * (density[upper] - density[lower]))
    }

    /// Probability of winning exactly `bundle` with `bids`, treating goods as independent
    pub fn win_probability(&self, bundle: &[bool], bids: &[f64]) -> ScppResult<f64> {
        if bundle.len() != self.goods() || bids.len() != self.goods() {
            return Err(ScppError::Validation(format!(
                "bundle ({}) and bids ({}) must both cover {} goods",
                bundle.len(),
                bids.len(),
                self.goods()
            )));
        }
        let mut probability = 1.0;
        for (good, (held, bid)) in bundle.iter().zip(bids).enumerate() {
            let cdf = self.cdf(*bid, good)?;
            probability *= if *held { cdf } else { 1.0 - cdf };
        }
        Ok(probability)
    }

    /// Upper partial variance of every good around the given expected prices
    ///
    /// Sums `(left_edge - E)^2 * mass` over the bins whose left edge lies above E.
    pub fn upper_partial_variance(&self, expected_prices: &[f64]) -> ScppResult<Vec<f64>> {
        if expected_prices.len() != self.goods() {
            return Err(ScppError::Validation(format!(
                "{} expected prices given for {} goods",
                expected_prices.len(),
                self.goods()
            )));
        }
        Ok(self
            .data
            .iter()
            .zip(expected_prices)
            .map(|(histogram, expected)| {
                histogram
                    .masses()
                    .iter()
                    .zip(&histogram.bin_edges)
                    .filter(|(_, edge)| **edge > *expected)
                    .map(|(p, edge)| (edge - expected).powi(2) * p)
                    .sum()
            })
            .collect())
    }

    /// Square root of the upper partial variance, in units of price
    pub fn upper_partial_std(&self, expected_prices: &[f64]) -> ScppResult<Vec<f64>> {
        Ok(self
            .upper_partial_variance(expected_prices)?
            .into_iter()
            .map(f64::sqrt)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn two_bin_distribution() -> MarginalPriceDistribution {
        // good 0: mass 0.25 on [0,1), 0.75 on [1,2]
        // good 1: uniform on [0,4]
        MarginalPriceDistribution::from_histograms(vec![
            MarginalHistogram::new(vec![0.25, 0.75], vec![0.0, 1.0, 2.0]),
            MarginalHistogram::new(vec![0.25, 0.25], vec![0.0, 2.0, 4.0]),
        ])
        .unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_grid_edges() {
        assert_eq!(PriceGrid::new(0.0, 3.0, 1.0).edges().unwrap(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(PriceGrid::new(0.0, 2.5, 1.0).edges().unwrap(), vec![0.0, 1.0, 2.0, 2.5]);
        assert!(PriceGrid::new(1.0, 1.0, 1.0).edges().is_err());
    }

    #[test]
    fn test_constructed_distributions_are_valid_pdfs() {
        let samples = vec![vec![0.5, 49.0], vec![3.2, 50.0], vec![3.9, 12.0], vec![60.0, -1.0]];
        let edges = PriceGrid::default().edges().unwrap();
        let from_samples = MarginalPriceDistribution::from_samples(&samples, &edges).unwrap();
        let uniform = MarginalPriceDistribution::uniform(&PriceGrid::new(0.0, 7.0, 0.5), 3).unwrap();
        let counts = MarginalPriceDistribution::from_count_rows(&[vec![1.0, 0.0, 3.0], vec![2.0, 2.0, 2.0]]).unwrap();
        for dist in [from_samples, uniform, counts] {
            for histogram in dist.data() {
                assert!((histogram.integral() - 1.0).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_from_samples_bins_boundaries() {
        let edges = vec![0.0, 1.0, 2.0];
        let samples = vec![vec![0.0], vec![1.0], vec![2.0], vec![5.0]];
        let dist = MarginalPriceDistribution::from_samples(&samples, &edges).unwrap();
        // 0.0 -> bin 0, 1.0 -> bin 1, 2.0 (closed last edge) -> bin 1, 5.0 clamps to bin 1
        assert_eq!(dist.data()[0].density, vec![0.25, 0.75]);
    }

    #[test]
    fn test_invalid_pdf_is_rejected() {
        let result = MarginalPriceDistribution::from_histograms(vec![MarginalHistogram::new(vec![0.3, 0.3], vec![0.0, 1.0, 2.0])]);
        assert!(matches!(result, Err(ScppError::Validation(_))));
        let result = MarginalPriceDistribution::from_histograms(vec![MarginalHistogram::new(vec![0.5, 0.5], vec![0.0, 1.0])]);
        assert!(matches!(result, Err(ScppError::Validation(_))));
        let result = MarginalPriceDistribution::from_histograms(vec![MarginalHistogram::new(vec![0.5, 0.5], vec![0.0, 1.0, 1.0])]);
        assert!(matches!(result, Err(ScppError::Validation(_))));
    }

    #[test]
    fn test_expected_prices() {
        let dist = two_bin_distribution();
        let mut rng = StdRng::seed_from_u64(7);
        let centers = dist.expected_prices(ExpectedPriceMethod::BIN_CENTER_AVERAGE, &mut rng).unwrap();
        assert_close(centers[0], 0.25 * 0.5 + 0.75 * 1.5);
        assert_close(centers[1], 2.0);
        let edges = dist.expected_prices(ExpectedPriceMethod::DENSITY_WEIGHTED_EDGE_AVERAGE, &mut rng).unwrap();
        assert_close(edges[0], 0.75);
        assert_close(edges[1], 1.0);
    }

    #[test]
    fn test_inverse_transform_expectation_uses_left_edges() {
        let dist = two_bin_distribution();
        let mut rng = StdRng::seed_from_u64(11);
        let estimate = dist
            .expected_price(0, ExpectedPriceMethod::INVERSE_TRANSFORM_SAMPLE { samples: 20000 }, &mut rng)
            .unwrap();
        // left edges 0 and 1 with masses 0.25 / 0.75
        assert!((estimate - 0.75).abs() < 0.02, "estimate {}", estimate);
    }

    #[test]
    fn test_sample_reports_left_edges() {
        let dist = two_bin_distribution();
        let mut rng = StdRng::seed_from_u64(3);
        let samples = dist.sample(500, &mut rng).unwrap();
        assert_eq!(samples.len(), 500);
        for row in samples.rows() {
            assert!(row[0] == 0.0 || row[0] == 1.0);
            assert!(row[1] == 0.0 || row[1] == 2.0);
        }
    }

    #[test]
    fn test_cdf_interpolates_and_clamps() {
        let dist = two_bin_distribution();
        assert_close(dist.cdf(-1.0, 0).unwrap(), 0.0);
        assert_close(dist.cdf(0.5, 0).unwrap(), 0.125);
        assert_close(dist.cdf(1.0, 0).unwrap(), 0.25);
        assert_close(dist.cdf(1.5, 0).unwrap(), 0.625);
        assert_close(dist.cdf(2.0, 0).unwrap(), 1.0);
        assert_close(dist.cdf(9.0, 0).unwrap(), 1.0);
        assert_close(dist.cdf(3.0, 1).unwrap(), 0.75);
    }

    #[test]
    fn test_pdf_clamps_outside_bin_centers() {
        let dist = two_bin_distribution();
        assert_close(dist.pdf(0.0, 0).unwrap(), 0.25);
        assert_close(dist.pdf(-10.0, 0).unwrap(), 0.25);
        assert_close(dist.pdf(1.0, 0).unwrap(), 0.5);
        assert_close(dist.pdf(1.9, 0).unwrap(), 0.75);
        assert_close(dist.pdf(100.0, 0).unwrap(), 0.75);
    }

    #[test]
    fn test_win_probability_assumes_independence() {
        let dist = two_bin_distribution();
        let bids = [1.0, 3.0];
        assert_close(dist.win_probability(&[true, true], &bids).unwrap(), 0.25 * 0.75);
        assert_close(dist.win_probability(&[true, false], &bids).unwrap(), 0.25 * 0.25);
        assert_close(dist.win_probability(&[false, false], &bids).unwrap(), 0.75 * 0.25);
        let total: f64 = crate::bundles::BundleSpace::new(2)
            .unwrap()
            .iter()
            .map(|b| dist.win_probability(b, &bids).unwrap())
            .sum();
        assert_close(total, 1.0);
    }

    #[test]
    fn test_serialized_round_trip() {
        let dist = MarginalPriceDistribution::from_samples(
            &[vec![0.3, 7.7], vec![1.1, 2.2], vec![9.9, 0.1]],
            &PriceGrid::new(0.0, 10.0, 0.5).edges().unwrap(),
        )
        .unwrap();
        let text = dist.to_serialized();
        assert_eq!(text.lines().count(), 4);
        let restored = MarginalPriceDistribution::from_serialized(&text).unwrap();
        assert_eq!(restored, dist);
    }

    #[test]
    fn test_save_and_load_txt() {
        let dist = two_bin_distribution();
        let path = std::env::temp_dir().join(format!("scpp-belief-{}", std::process::id())).join("belief.txt");
        dist.save_txt(&path).unwrap();
        let loaded = MarginalPriceDistribution::load_txt(&path).unwrap();
        assert_eq!(loaded, dist);
        let _ = fs::remove_file(&path);
        assert!(matches!(MarginalPriceDistribution::load_txt(&path), Err(ScppError::Io(_))));
    }

    #[test]
    fn test_malformed_serialized_input() {
        assert!(matches!(MarginalPriceDistribution::from_serialized("1 0\n0 1 x\n"), Err(ScppError::Parse(_))));
        assert!(matches!(MarginalPriceDistribution::from_serialized("1\n"), Err(ScppError::Parse(_))));
        assert!(matches!(MarginalPriceDistribution::from_serialized("1 1\n0 1\n"), Err(ScppError::Validation(_))));
    }

    #[test]
    fn test_upper_partial_variance() {
        let dist = MarginalPriceDistribution::from_count_rows(&[vec![1.0, 1.0, 1.0, 1.0]]).unwrap();
        // left edges 0,1,2,3 with mass 0.25; edges above 1.5 are 2 and 3
        let upv = dist.upper_partial_variance(&[1.5]).unwrap();
        assert_close(upv[0], 0.25 * 0.25 + 0.25 * 2.25);
        let ups = dist.upper_partial_std(&[1.5]).unwrap();
        assert_close(ups[0], upv[0].sqrt());
    }

    #[test]
    fn test_copy_is_independent_value() {
        let dist = two_bin_distribution();
        let copy = MarginalPriceDistribution::copy_of(&dist);
        assert_eq!(copy, dist);
    }
}
