use crate::errors::{ScppError, ScppResult};

/// Fixed set of joint closing-price vectors, one row per sample
///
/// Produced once per optimizer call (from a fitted joint model or from
/// independent marginals) and only read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct JointPriceSamples {
    goods: usize,
    rows: Vec<Vec<f64>>,
}

impl JointPriceSamples {
    pub fn new(goods: usize, rows: Vec<Vec<f64>>) -> ScppResult<Self> {
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != goods) {
            return Err(ScppError::Validation(format!(
                "joint sample {} has {} prices, expected {}",
                index,
                row.len(),
                goods
            )));
        }
        Ok(Self { goods, rows })
    }

    /// Repeat each price vector `count` times, in the order given
    pub fn from_weighted(goods: usize, weighted: &[(usize, Vec<f64>)]) -> ScppResult<Self> {
        let rows = weighted
            .iter()
            .flat_map(|(count, row)| std::iter::repeat(row.clone()).take(*count))
            .collect();
        Self::new(goods, rows)
    }

    pub fn goods(&self) -> usize {
        self.goods
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Distinct sampled prices of one good in ascending order
    pub fn distinct_values(&self, good: usize) -> Vec<f64> {
        let mut values: Vec<f64> = self.rows.iter().map(|row| row[good]).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();
        values
    }
}
