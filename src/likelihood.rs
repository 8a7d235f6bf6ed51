//! Joint log-likelihood of a response matrix under the 2PL model.

use rayon::prelude::*;

use crate::irf::ItemParameters;
use crate::matrix::ResponseMatrix;
use crate::utils::log_sigmoid;

/// Log-likelihood of one response pattern at a fixed theta.
#[inline]
pub fn log_likelihood_2pl<I>(observations: I, theta: f64) -> f64
where
    I: Iterator<Item = (bool, ItemParameters)>,
{
    observations
        .map(|(correct, item)| {
            let z = item.discrimination * (theta - item.difficulty);
            if correct {
                log_sigmoid(z)
            } else {
                log_sigmoid(-z)
            }
        })
        .sum()
}

/// Sum of every respondent's log-likelihood at their current theta.
///
/// Missing cells contribute nothing. The per-respondent terms are summed
/// sequentially so the total does not depend on thread scheduling.
pub fn joint_log_likelihood(
    matrix: &ResponseMatrix,
    items: &[ItemParameters],
    theta: &[f64],
) -> f64 {
    (0..matrix.respondent_count())
        .into_par_iter()
        .map(|i| {
            let observations = matrix
                .respondent_row(i)
                .into_iter()
                .zip(items.iter())
                .filter_map(|(response, item)| response.map(|correct| (correct, *item)));
            log_likelihood_2pl(observations, theta[i])
        })
        .collect::<Vec<f64>>()
        .iter()
        .sum()
}
