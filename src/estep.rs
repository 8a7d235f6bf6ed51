//! Ability estimation (E-step of JMLE).
//!
//! Each respondent's theta is the maximum-likelihood solution given the
//! current item parameters, found by undamped Newton-Raphson from zero.

use rayon::prelude::*;

use crate::config::CalibrationConfig;
use crate::irf::ItemParameters;
use crate::matrix::ResponseMatrix;
use crate::utils::{indicator, newton_raphson};

/// Maximum-likelihood theta for one response pattern.
///
/// `observations` yields `(correct, item)` for every answered item and is
/// cloned once per Newton iteration. Returns `None` when it is empty.
pub fn estimate_theta<I>(observations: I, config: &CalibrationConfig) -> Option<f64>
where
    I: Iterator<Item = (bool, ItemParameters)> + Clone,
{
    if observations.clone().next().is_none() {
        return None;
    }

    let theta = newton_raphson(0.0, config.theta_bounds, 1.0, &config.newton, |theta| {
        observations
            .clone()
            .fold((0.0, 0.0), |(d1, d2), (correct, item)| {
                let a = item.discrimination;
                let p = item.probability(theta);
                (d1 + a * (indicator(correct) - p), d2 - a * a * p * (1.0 - p))
            })
    });
    Some(theta)
}

/// `(correct, item)` pairs for the items respondent `i` answered.
pub(crate) fn respondent_observations<'a>(
    matrix: &'a ResponseMatrix,
    items: &'a [ItemParameters],
    respondent: usize,
) -> impl Iterator<Item = (bool, ItemParameters)> + Clone + 'a {
    matrix
        .respondent_row(respondent)
        .into_iter()
        .zip(items.iter())
        .filter_map(|(response, item)| response.map(|correct| (correct, *item)))
}

/// Re-estimate every respondent in parallel, in place.
///
/// Respondents with no answered items keep their previous theta. Returns the
/// number of respondents updated.
pub fn e_step(
    matrix: &ResponseMatrix,
    items: &[ItemParameters],
    theta: &mut [f64],
    config: &CalibrationConfig,
) -> usize {
    let updates: Vec<Option<f64>> = (0..matrix.respondent_count())
        .into_par_iter()
        .map(|i| estimate_theta(respondent_observations(matrix, items, i), config))
        .collect();

    let mut updated = 0;
    for (current, update) in theta.iter_mut().zip(updates) {
        if let Some(value) = update {
            *current = value;
            updated += 1;
        }
    }
    updated
}
