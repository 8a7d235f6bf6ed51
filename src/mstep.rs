//! Item parameter estimation (M-step of JMLE).
//!
//! Difficulty and discrimination are solved one after the other by damped
//! Newton-Raphson with abilities held fixed. Every step is scaled by
//! `config.damping` (one half by default) since `a` and `b` are coupled
//! through the response probability.

use ndarray::ArrayView1;
use rayon::prelude::*;

use crate::config::CalibrationConfig;
use crate::irf::{ItemParameters, probability};
use crate::matrix::ResponseMatrix;
use crate::utils::{indicator, newton_raphson};

/// New parameters for one item and the largest absolute change made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemUpdate {
    pub parameters: ItemParameters,
    pub change: f64,
}

fn item_observations<'a>(
    column: ArrayView1<'a, Option<bool>>,
    theta: &'a [f64],
) -> impl Iterator<Item = (bool, f64)> + Clone + 'a {
    column
        .into_iter()
        .zip(theta.iter())
        .filter_map(|(response, &t)| response.map(|correct| (correct, t)))
}

/// Damped Newton solve for difficulty at fixed discrimination.
pub fn estimate_difficulty<I>(
    observations: I,
    current: ItemParameters,
    config: &CalibrationConfig,
) -> f64
where
    I: Iterator<Item = (bool, f64)> + Clone,
{
    let a = current.discrimination;
    newton_raphson(
        current.difficulty,
        config.difficulty_bounds,
        config.damping,
        &config.newton,
        |b| {
            observations.clone().fold((0.0, 0.0), |(d1, d2), (correct, theta)| {
                let p = probability(theta, a, b);
                (d1 + a * (p - indicator(correct)), d2 - a * a * p * (1.0 - p))
            })
        },
    )
}

/// Damped Newton solve for discrimination at fixed difficulty.
pub fn estimate_discrimination<I>(
    observations: I,
    current: ItemParameters,
    config: &CalibrationConfig,
) -> f64
where
    I: Iterator<Item = (bool, f64)> + Clone,
{
    let b = current.difficulty;
    newton_raphson(
        current.discrimination,
        config.discrimination_bounds,
        config.damping,
        &config.newton,
        |a| {
            observations.clone().fold((0.0, 0.0), |(d1, d2), (correct, theta)| {
                let p = probability(theta, a, b);
                let centered = theta - b;
                (
                    d1 + centered * (indicator(correct) - p),
                    d2 - centered * centered * p * (1.0 - p),
                )
            })
        },
    )
}

/// Difficulty first, then discrimination against the new difficulty.
///
/// Returns `None` for an item nobody answered.
pub fn update_item<I>(
    observations: I,
    current: ItemParameters,
    config: &CalibrationConfig,
) -> Option<ItemUpdate>
where
    I: Iterator<Item = (bool, f64)> + Clone,
{
    if observations.clone().next().is_none() {
        return None;
    }

    let difficulty = estimate_difficulty(observations.clone(), current, config);
    let with_difficulty = ItemParameters::new(current.discrimination, difficulty);
    let discrimination = estimate_discrimination(observations, with_difficulty, config);

    let parameters = ItemParameters::new(discrimination, difficulty);
    let change = (discrimination - current.discrimination)
        .abs()
        .max((difficulty - current.difficulty).abs());
    Some(ItemUpdate { parameters, change })
}

/// Re-estimate every item in parallel, in place, and return the largest
/// parameter change of the round.
pub fn m_step(
    matrix: &ResponseMatrix,
    theta: &[f64],
    items: &mut [ItemParameters],
    config: &CalibrationConfig,
) -> f64 {
    let updates: Vec<Option<ItemUpdate>> = items
        .par_iter()
        .enumerate()
        .map(|(j, &current)| {
            let observations = item_observations(matrix.item_column(j), theta);
            update_item(observations, current, config)
        })
        .collect();

    let mut max_change = 0.0_f64;
    for (item, update) in items.iter_mut().zip(updates) {
        if let Some(update) = update {
            *item = update.parameters;
            max_change = max_change.max(update.change);
        }
    }
    max_change
}
