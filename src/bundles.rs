/// Bundles of goods and bundle valuations
///
/// A bundle is an indicator vector over the `m` goods. All `2^m` bundles are
/// enumerated in binary counting order with good 0 as the most significant
/// bit, so for two goods the order is `[F,F] [F,T] [T,F] [T,T]`. Valuation and
/// revenue tables are indexed by this order everywhere in the crate.

use crate::errors::{ScppError, ScppResult};

/// Largest number of goods whose `2^m` bundles are enumerated
pub const MAX_GOODS: usize = 20;

/// Every bundle over a fixed number of goods, in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct BundleSpace {
    goods: usize,
    bundles: Vec<Vec<bool>>,
}

impl BundleSpace {
    pub fn new(goods: usize) -> ScppResult<Self> {
        if goods > MAX_GOODS {
            return Err(ScppError::InvalidParameter(format!(
                "{} goods exceed the enumerable maximum of {}",
                goods, MAX_GOODS
            )));
        }
        let count = 1usize << goods;
        let bundles = (0..count)
            .map(|index| (0..goods).map(|good| Self::holds(index, good, goods)).collect())
            .collect();
        Ok(Self { goods, bundles })
    }

    #[inline]
    fn holds(index: usize, good: usize, goods: usize) -> bool {
        (index >> (goods - 1 - good)) & 1 == 1
    }

    pub fn goods(&self) -> usize {
        self.goods
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn bundles(&self) -> &[Vec<bool>] {
        &self.bundles
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<bool>> {
        self.bundles.iter()
    }

    /// Canonical index of an indicator vector
    #[inline]
    pub fn index_of(&self, bundle: &[bool]) -> usize {
        bundle.iter().fold(0usize, |index, &held| (index << 1) | held as usize)
    }
}

/// Check that lambda lies in [1, goods]
pub fn validate_lambda(lambda: usize, goods: usize) -> ScppResult<()> {
    if lambda < 1 || lambda > goods {
        return Err(ScppError::InvalidParameter(format!(
            "lambda = {} must lie in [1, {}]",
            lambda, goods
        )));
    }
    Ok(())
}

/// Value of a bundle to a bidder with per-good values `values`
///
/// The bidder needs `lambda` goods: a bundle holding at least `lambda` goods is
/// worth the sum of its `lambda` highest per-good values, any smaller bundle is
/// worth nothing. `lambda = 1` makes the goods perfect substitutes (value of
/// the best good held), `lambda = m` perfect complements (sum of all values,
/// realized only when every good is held).
pub fn valuation(bundle: &[bool], values: &[f64], lambda: usize) -> ScppResult<f64> {
    if bundle.len() != values.len() {
        return Err(ScppError::Validation(format!(
            "bundle has {} goods but {} values were given",
            bundle.len(),
            values.len()
        )));
    }
    validate_lambda(lambda, values.len())?;

    let mut held: Vec<f64> = bundle
        .iter()
        .zip(values)
        .filter(|(h, _)| **h)
        .map(|(_, v)| *v)
        .collect();

    if held.len() < lambda {
        return Ok(0.0);
    }

    held.sort_by(|a, b| b.total_cmp(a));
    Ok(held.iter().take(lambda).sum())
}

/// Valuation of every bundle in the space, indexed by canonical bundle order
pub fn revenue(bundles: &BundleSpace, values: &[f64], lambda: usize) -> ScppResult<Vec<f64>> {
    bundles
        .iter()
        .map(|bundle| valuation(bundle, values, lambda))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_two_goods() {
        let space = BundleSpace::new(2).unwrap();
        assert_eq!(space.len(), 4);
        assert_eq!(space.bundles()[0], vec![false, false]);
        assert_eq!(space.bundles()[1], vec![false, true]);
        assert_eq!(space.bundles()[2], vec![true, false]);
        assert_eq!(space.bundles()[3], vec![true, true]);
    }

    #[test]
    fn test_too_many_goods_is_rejected() {
        assert!(matches!(BundleSpace::new(MAX_GOODS + 1), Err(ScppError::InvalidParameter(_))));
        assert!(matches!(BundleSpace::new(usize::BITS as usize), Err(ScppError::InvalidParameter(_))));
    }

    #[test]
    fn test_index_of_round_trips() {
        let space = BundleSpace::new(4).unwrap();
        for (index, bundle) in space.iter().enumerate() {
            assert_eq!(space.index_of(bundle), index);
        }
    }

    #[test]
    fn test_substitutes_take_the_best_good() {
        let values = [45.0, 20.0];
        assert_eq!(valuation(&[true, true], &values, 1).unwrap(), 45.0);
        assert_eq!(valuation(&[false, true], &values, 1).unwrap(), 20.0);
        assert_eq!(valuation(&[false, false], &values, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_complements_need_every_good() {
        let values = [10.0, 5.0, 7.0];
        assert_eq!(valuation(&[true, true, true], &values, 3).unwrap(), 22.0);
        assert_eq!(valuation(&[true, false, true], &values, 3).unwrap(), 0.0);
    }

    #[test]
    fn test_intermediate_lambda_sums_best_goods() {
        let values = [10.0, 5.0, 7.0];
        assert_eq!(valuation(&[true, true, true], &values, 2).unwrap(), 17.0);
        assert_eq!(valuation(&[false, true, true], &values, 2).unwrap(), 12.0);
        assert_eq!(valuation(&[true, false, false], &values, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_lambda_out_of_range_is_rejected() {
        let values = [10.0, 5.0];
        assert!(matches!(valuation(&[true, true], &values, 0), Err(ScppError::InvalidParameter(_))));
        assert!(matches!(valuation(&[true, true], &values, 3), Err(ScppError::InvalidParameter(_))));
    }

    #[test]
    fn test_revenue_table_follows_bundle_order() {
        let space = BundleSpace::new(2).unwrap();
        let table = revenue(&space, &[45.0, 20.0], 1).unwrap();
        assert_eq!(table, vec![0.0, 20.0, 45.0, 45.0]);
    }
}
