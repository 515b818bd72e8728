/// Fitting of price models to simulated closing prices
///
/// The update loop only needs "fit a model to these samples" and joint local
/// bidders only need "draw joint samples", so both sides depend on these
/// traits rather than on the histogram type directly. Per-good densities are
/// read through `MarginalPriceDistribution::pdf`.

use rand::rngs::StdRng;

use crate::errors::ScppResult;
use crate::joint_samples::JointPriceSamples;
use crate::price_distribution::{MarginalPriceDistribution, PriceGrid};

/// A fitted price model that can be sampled
pub trait PriceModelTrait {
    /// Draw `n` joint price vectors
    fn sample_joint(&self, n: usize, rng: &mut StdRng) -> ScppResult<JointPriceSamples>;
}

/// Fitting primitive turning observed price vectors into a model
pub trait PriceFitterTrait {
    type Model: PriceModelTrait;

    fn fit(&self, samples: &[Vec<f64>]) -> ScppResult<Self::Model>;

    /// Get the name/type of this fitter
    fn get_fitter_type(&self) -> String;
}

impl PriceModelTrait for MarginalPriceDistribution {
    fn sample_joint(&self, n: usize, rng: &mut StdRng) -> ScppResult<JointPriceSamples> {
        self.sample(n, rng)
    }
}

/// Fits one normalized histogram per good over fixed bin edges
///
/// All histograms fitted by one fitter share the edges, which the update
/// rule and the distance metrics require.
pub struct HistogramFitter {
    bin_edges: Vec<f64>,
}

impl HistogramFitter {
    pub fn new(grid: &PriceGrid) -> ScppResult<Self> {
        Ok(Self { bin_edges: grid.edges()? })
    }

    pub fn bin_edges(&self) -> &[f64] {
        &self.bin_edges
    }
}

impl PriceFitterTrait for HistogramFitter {
    type Model = MarginalPriceDistribution;

    fn fit(&self, samples: &[Vec<f64>]) -> ScppResult<MarginalPriceDistribution> {
        MarginalPriceDistribution::from_samples(samples, &self.bin_edges)
    }

    fn get_fitter_type(&self) -> String {
        format!("Histogram ({} bins)", self.bin_edges.len() - 1)
    }
}
