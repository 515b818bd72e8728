use rand::rngs::StdRng;
use rand::Rng;

use crate::bundles::{revenue, validate_lambda, BundleSpace};
use crate::errors::{ScppError, ScppResult};
use crate::price_distribution::MarginalPriceDistribution;

/// Private valuation of one bidder: per-good values, lambda and the derived
/// revenue table over every bundle
#[derive(Debug, Clone)]
pub struct BidderValuation {
    pub values: Vec<f64>,
    pub lambda: usize,
    pub revenue: Vec<f64>,
    pub bundles: BundleSpace,
}

impl BidderValuation {
    pub fn new(values: Vec<f64>, lambda: usize) -> ScppResult<Self> {
        let bundles = BundleSpace::new(values.len())?;
        let revenue = revenue(&bundles, &values, lambda)?;
        Ok(Self { values, lambda, revenue, bundles })
    }

    pub fn goods(&self) -> usize {
        self.values.len()
    }

    /// Surplus-maximizing bundle at fixed prices; the lowest index wins ties
    pub fn best_bundle(&self, prices: &[f64]) -> usize {
        let mut best = (0, self.revenue[0]);
        for (index, bundle) in self.bundles.iter().enumerate().skip(1) {
            let cost: f64 = bundle.iter().zip(prices).filter(|(held, _)| **held).map(|(_, p)| *p).sum();
            let surplus = self.revenue[index] - cost;
            if surplus > best.1 {
                best = (index, surplus);
            }
        }
        best.0
    }

    /// Marginal value of every good at fixed prices
    ///
    /// The marginal value of good j is the best surplus when j is free minus the
    /// best surplus when j is unavailable.
    pub fn marginal_values(&self, prices: &[f64]) -> Vec<f64> {
        (0..self.goods())
            .map(|good| {
                let mut with_good = f64::NEG_INFINITY;
                let mut without_good = f64::NEG_INFINITY;
                for (index, bundle) in self.bundles.iter().enumerate() {
                    let cost: f64 = bundle
                        .iter()
                        .zip(prices)
                        .enumerate()
                        .filter(|(other, (held, _))| **held && *other != good)
                        .map(|(_, (_, p))| *p)
                        .sum();
                    let surplus = self.revenue[index] - cost;
                    if bundle[good] {
                        with_good = with_good.max(surplus);
                    } else {
                        without_good = without_good.max(surplus);
                    }
                }
                (with_good - without_good).max(0.0)
            })
            .collect()
    }
}

/// Contract every simulated bidder implements
pub trait BidderTrait {
    fn bidder_id(&self) -> usize;

    /// Bid vector against the shared closing-price belief
    fn bid(&self, belief: &MarginalPriceDistribution, rng: &mut StdRng) -> ScppResult<Vec<f64>>;

    /// Draw new per-good values and, when `lambda` is None, a new lambda in [1, m]
    /// Mutates only this bidder's own valuation
    fn random_valuation(&mut self, lambda: Option<usize>, rng: &mut StdRng) -> ScppResult<()>;

    fn valuation(&self) -> &BidderValuation;

    /// Get a string representation of the bidding strategy
    fn get_bidder_type(&self) -> String;
}

/// Trait for the pricing part of a bidder
pub trait BidStrategyTrait {
    fn get_bids(
        &self,
        valuation: &BidderValuation,
        belief: &MarginalPriceDistribution,
        rng: &mut StdRng,
    ) -> ScppResult<Vec<f64>>;

    fn get_strategy_type(&self) -> String;
}

/// Bidder drawing values uniformly from [min_valuation, max_valuation] and
/// delegating bidding to a strategy
pub struct BidderGeneral {
    pub bidder_id: usize,
    pub min_valuation: f64,
    pub max_valuation: f64,
    pub valuation: BidderValuation,
    pub strategy: Box<dyn BidStrategyTrait>,
}

impl BidderGeneral {
    pub fn new(
        bidder_id: usize,
        goods: usize,
        min_valuation: f64,
        max_valuation: f64,
        strategy: Box<dyn BidStrategyTrait>,
    ) -> ScppResult<Self> {
        if goods == 0 {
            return Err(ScppError::Configuration("a bidder needs at least one good".to_string()));
        }
        if !(min_valuation >= 0.0 && min_valuation <= max_valuation) {
            return Err(ScppError::Configuration(format!(
                "valuation range [{}, {}] is invalid",
                min_valuation, max_valuation
            )));
        }
        Ok(Self {
            bidder_id,
            min_valuation,
            max_valuation,
            valuation: BidderValuation::new(vec![0.0; goods], 1)?,
            strategy,
        })
    }

    pub fn set_valuation(&mut self, valuation: BidderValuation) -> ScppResult<()> {
        if valuation.goods() != self.valuation.goods() {
            return Err(ScppError::Validation(format!(
                "valuation covers {} goods, bidder bids on {}",
                valuation.goods(),
                self.valuation.goods()
            )));
        }
        self.valuation = valuation;
        Ok(())
    }
}

impl BidderTrait for BidderGeneral {
    fn bidder_id(&self) -> usize {
        self.bidder_id
    }

    fn bid(&self, belief: &MarginalPriceDistribution, rng: &mut StdRng) -> ScppResult<Vec<f64>> {
        if belief.goods() != self.valuation.goods() {
            return Err(ScppError::Validation(format!(
                "belief covers {} goods, bidder bids on {}",
                belief.goods(),
                self.valuation.goods()
            )));
        }
        self.strategy.get_bids(&self.valuation, belief, rng)
    }

    fn random_valuation(&mut self, lambda: Option<usize>, rng: &mut StdRng) -> ScppResult<()> {
        let goods = self.valuation.goods();
        let lambda = match lambda {
            Some(lambda) => {
                validate_lambda(lambda, goods)?;
                lambda
            }
            None => rng.gen_range(1..=goods),
        };
        let values = (0..goods)
            .map(|_| rng.gen_range(self.min_valuation..=self.max_valuation))
            .collect();
        self.valuation = BidderValuation::new(values, lambda)?;
        Ok(())
    }

    fn valuation(&self) -> &BidderValuation {
        &self.valuation
    }

    fn get_bidder_type(&self) -> String {
        self.strategy.get_strategy_type()
    }
}
