//! Standard errors from observed Fisher information.
//!
//! A parameter whose information does not exceed the configured epsilon gets
//! a `NaN` standard error: its precision is undefined, which is a valid
//! outcome rather than a failure.

use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::irf::ItemParameters;
use crate::matrix::ResponseMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemStandardErrors {
    pub discrimination: f64,
    pub difficulty: f64,
}

#[inline]
pub fn standard_error_from_information(information: f64, epsilon: f64) -> f64 {
    if information > epsilon {
        1.0 / information.sqrt()
    } else {
        f64::NAN
    }
}

/// Standard errors of one item over the respondents who answered it.
pub fn item_standard_errors(
    column: ArrayView1<'_, Option<bool>>,
    theta: &[f64],
    item: ItemParameters,
    epsilon: f64,
) -> ItemStandardErrors {
    let a = item.discrimination;
    let b = item.difficulty;
    let (info_a, info_b) = column
        .iter()
        .zip(theta)
        .filter(|(response, _)| response.is_some())
        .fold((0.0, 0.0), |(info_a, info_b), (_, &t)| {
            let p = item.probability(t);
            let pq = p * (1.0 - p);
            (info_a + (t - b) * (t - b) * pq, info_b + a * a * pq)
        });

    ItemStandardErrors {
        discrimination: standard_error_from_information(info_a, epsilon),
        difficulty: standard_error_from_information(info_b, epsilon),
    }
}

pub fn compute_item_standard_errors(
    matrix: &ResponseMatrix,
    items: &[ItemParameters],
    theta: &[f64],
    epsilon: f64,
) -> Vec<ItemStandardErrors> {
    items
        .par_iter()
        .enumerate()
        .map(|(j, &item)| item_standard_errors(matrix.item_column(j), theta, item, epsilon))
        .collect()
}

/// Standard error of a theta estimate from the test information of the
/// items the respondent answered.
pub fn ability_standard_error<I>(items: I, theta: f64, epsilon: f64) -> f64
where
    I: Iterator<Item = ItemParameters>,
{
    let information: f64 = items.map(|item| item.information(theta)).sum();
    standard_error_from_information(information, epsilon)
}
