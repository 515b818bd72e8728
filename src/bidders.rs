pub use crate::bidder::{BidStrategyTrait, BidderGeneral, BidderTrait, BidderValuation};

use rand::rngs::StdRng;

use crate::bid_optimizers::{JointLocalBidOptimizer, LocalSearchConfig};
use crate::errors::{ScppError, ScppResult};
use crate::price_distribution::{ExpectedPriceMethod, MarginalPriceDistribution};
use crate::price_fit::PriceModelTrait;

/// Point prediction every strategy derives from the belief
const EXPECTED_PRICE_METHOD: ExpectedPriceMethod = ExpectedPriceMethod::BIN_CENTER_AVERAGE;

/// Bidding strategy of a simulated agent
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum AgentType {
    /// Bid the marginal value of each good against expected prices
    STRAIGHT_MV,
    /// Bid the expected price on every good of the surplus maximizing bundle
    TARGET_PRICE,
    /// Target price against `E[p] + risk_aversion * upper partial std`
    RISK_AWARE { risk_aversion: f64 },
    /// Local search against joint samples drawn from the belief
    JOINT_LOCAL { samples: usize, max_iterations: usize },
}

impl AgentType {
    pub fn agent_type_string(&self) -> String {
        match self {
            AgentType::STRAIGHT_MV => "StraightMV".to_string(),
            AgentType::TARGET_PRICE => "TargetPrice".to_string(),
            AgentType::RISK_AWARE { risk_aversion } => format!("RiskAware(A={:.2})", risk_aversion),
            AgentType::JOINT_LOCAL { samples, max_iterations } => {
                format!("JointLocal(samples={}, sweeps={})", samples, max_iterations)
            }
        }
    }

    pub fn validate(&self) -> ScppResult<()> {
        match *self {
            AgentType::RISK_AWARE { risk_aversion } if !(risk_aversion >= 0.0) => Err(ScppError::Configuration(
                format!("risk aversion must be non-negative, got {}", risk_aversion),
            )),
            AgentType::JOINT_LOCAL { samples, max_iterations } if samples == 0 || max_iterations == 0 => {
                Err(ScppError::Configuration(
                    "joint local bidders need samples >= 1 and max_iterations >= 1".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Marginal value bidding against expected prices
pub struct StrategyStraightMV;

impl BidStrategyTrait for StrategyStraightMV {
    fn get_bids(
        &self,
        valuation: &BidderValuation,
        belief: &MarginalPriceDistribution,
        rng: &mut StdRng,
    ) -> ScppResult<Vec<f64>> {
        let prices = belief.expected_prices(EXPECTED_PRICE_METHOD, rng)?;
        Ok(valuation.marginal_values(&prices))
    }

    fn get_strategy_type(&self) -> String {
        "StraightMV".to_string()
    }
}

/// Bid the given prices on the bundle that maximizes surplus at those prices
fn target_bids(valuation: &BidderValuation, prices: &[f64]) -> Vec<f64> {
    let bundle = &valuation.bundles.bundles()[valuation.best_bundle(prices)];
    bundle
        .iter()
        .zip(prices)
        .map(|(held, price)| if *held { *price } else { 0.0 })
        .collect()
}

pub struct StrategyTargetPrice;

impl BidStrategyTrait for StrategyTargetPrice {
    fn get_bids(
        &self,
        valuation: &BidderValuation,
        belief: &MarginalPriceDistribution,
        rng: &mut StdRng,
    ) -> ScppResult<Vec<f64>> {
        let prices = belief.expected_prices(EXPECTED_PRICE_METHOD, rng)?;
        Ok(target_bids(valuation, &prices))
    }

    fn get_strategy_type(&self) -> String {
        "TargetPrice".to_string()
    }
}

/// Target price bidding with prices inflated by their upside risk
pub struct StrategyRiskAware {
    pub risk_aversion: f64,
}

impl BidStrategyTrait for StrategyRiskAware {
    fn get_bids(
        &self,
        valuation: &BidderValuation,
        belief: &MarginalPriceDistribution,
        rng: &mut StdRng,
    ) -> ScppResult<Vec<f64>> {
        let expected = belief.expected_prices(EXPECTED_PRICE_METHOD, rng)?;
        let upside = belief.upper_partial_std(&expected)?;
        let prices: Vec<f64> = expected
            .iter()
            .zip(&upside)
            .map(|(e, ups)| e + self.risk_aversion * ups)
            .collect();
        Ok(target_bids(valuation, &prices))
    }

    fn get_strategy_type(&self) -> String {
        format!("RiskAware(A={:.2})", self.risk_aversion)
    }
}

/// Straight MV bids refined by local search against joint samples of the belief
pub struct StrategyJointLocal {
    pub samples: usize,
    pub optimizer: JointLocalBidOptimizer,
}

impl StrategyJointLocal {
    pub fn new(samples: usize, max_iterations: usize) -> ScppResult<Self> {
        let optimizer = JointLocalBidOptimizer::new(LocalSearchConfig {
            max_iterations,
            ..LocalSearchConfig::default()
        })?;
        Ok(Self { samples, optimizer })
    }
}

impl BidStrategyTrait for StrategyJointLocal {
    fn get_bids(
        &self,
        valuation: &BidderValuation,
        belief: &MarginalPriceDistribution,
        rng: &mut StdRng,
    ) -> ScppResult<Vec<f64>> {
        let samples = belief.sample_joint(self.samples, rng)?;
        let prices = belief.expected_prices(EXPECTED_PRICE_METHOD, rng)?;
        let initial = valuation.marginal_values(&prices);
        let result = self.optimizer.search(&valuation.bundles, &valuation.revenue, &initial, &samples)?;
        Ok(result.bids)
    }

    fn get_strategy_type(&self) -> String {
        format!("JointLocal({})", self.optimizer.get_optimizer_type())
    }
}

/// Container for the bidders of one simulated population
pub struct Bidders {
    pub bidders: Vec<Box<dyn BidderTrait>>,
}

impl Bidders {
    pub fn new() -> Self {
        Self { bidders: Vec::new() }
    }

    /// Convert an AgentType into its bidding strategy
    fn create_strategy(agent_type: &AgentType) -> ScppResult<Box<dyn BidStrategyTrait>> {
        agent_type.validate()?;
        Ok(match *agent_type {
            AgentType::STRAIGHT_MV => Box::new(StrategyStraightMV),
            AgentType::TARGET_PRICE => Box::new(StrategyTargetPrice),
            AgentType::RISK_AWARE { risk_aversion } => Box::new(StrategyRiskAware { risk_aversion }),
            AgentType::JOINT_LOCAL { samples, max_iterations } => {
                Box::new(StrategyJointLocal::new(samples, max_iterations)?)
            }
        })
    }

    /// Build a population with one bidder per entry of `agent_types`
    pub fn from_types(
        agent_types: &[AgentType],
        goods: usize,
        min_valuation: f64,
        max_valuation: f64,
    ) -> ScppResult<Self> {
        let mut bidders = Self::new();
        for agent_type in agent_types {
            bidders.add(agent_type.clone(), goods, min_valuation, max_valuation)?;
        }
        Ok(bidders)
    }

    /// Add a bidder to the population
    ///
    /// # Arguments
    /// * `agent_type` - Bidding strategy of the new bidder
    /// * `goods` - Number of goods on offer
    /// * `min_valuation`, `max_valuation` - Range per-good values are drawn from
    ///
    /// # Returns
    /// The bidder_id of the just added bidder
    pub fn add(
        &mut self,
        agent_type: AgentType,
        goods: usize,
        min_valuation: f64,
        max_valuation: f64,
    ) -> ScppResult<usize> {
        let bidder_id = self.bidders.len();
        let strategy = Self::create_strategy(&agent_type)?;
        self.bidders.push(Box::new(BidderGeneral::new(
            bidder_id,
            goods,
            min_valuation,
            max_valuation,
            strategy,
        )?));
        Ok(bidder_id)
    }

    pub fn is_empty(&self) -> bool {
        self.bidders.is_empty()
    }

    /// Draw a fresh valuation for every bidder
    pub fn random_valuations(&mut self, lambda: Option<usize>, rng: &mut StdRng) -> ScppResult<()> {
        for bidder in &mut self.bidders {
            bidder.random_valuation(lambda, rng)?;
        }
        Ok(())
    }

    /// One bid vector per bidder, in bidder order
    pub fn bid_matrix(&self, belief: &MarginalPriceDistribution, rng: &mut StdRng) -> ScppResult<Vec<Vec<f64>>> {
        if self.is_empty() {
            return Err(ScppError::Configuration("population has no bidders".to_string()));
        }
        self.bidders.iter().map(|bidder| bidder.bid(belief, rng)).collect()
    }
}

impl Default for Bidders {
    fn default() -> Self {
        Self::new()
    }
}
