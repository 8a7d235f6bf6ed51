//! Joint maximum likelihood (JMLE) calibration of the 2PL model.
//!
//! One run owns its response matrix, item parameters and abilities. Each
//! round re-estimates every theta, re-centres them to zero mean (moving the
//! difficulties by the same amount so the likelihood is unchanged), then
//! re-estimates every item. The run stops once the largest parameter change
//! of a round falls below the convergence tolerance, or when the iteration
//! budget is spent. Running out of iterations is reported, not raised.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::{Bounds, CalibrationConfig};
use crate::error::CalibrationError;
use crate::estep::{e_step, respondent_observations};
use crate::irf::ItemParameters;
use crate::likelihood::joint_log_likelihood;
use crate::matrix::{ExcludedItem, ItemId, RespondentId, ResponseMatrix, ResponseRow};
use crate::mstep::m_step;
use crate::source::ResponseSource;
use crate::standard_errors::{ability_standard_error, compute_item_standard_errors};
use crate::utils::{clamped_logit, logit, mean};

const CENTERING_BISECTION_STEPS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationStatus {
    Converged,
    MaxIterationsReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCalibration {
    pub item_id: ItemId,
    pub discrimination: f64,
    pub difficulty: f64,
    /// `NaN` when the item carries no information about `a`.
    pub se_discrimination: f64,
    /// `NaN` when the item carries no information about `b`.
    pub se_difficulty: f64,
    /// Classical proportion correct the item was initialised from.
    pub p_value: f64,
}

impl ItemCalibration {
    pub fn parameters(&self) -> ItemParameters {
        ItemParameters::new(self.discrimination, self.difficulty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespondentAbility {
    pub respondent_id: RespondentId,
    pub theta: f64,
    pub standard_error: f64,
    pub items_answered: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub iteration: usize,
    pub max_change: f64,
    pub log_likelihood: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub competency_id: String,
    pub item_count: usize,
    pub respondent_count: usize,
    /// Rounds completed when the run stopped.
    pub iterations: usize,
    pub converged: bool,
    pub status: CalibrationStatus,
    /// Largest parameter change of the final round.
    pub max_change: f64,
    pub log_likelihood: f64,
    pub item_calibrations: Vec<ItemCalibration>,
    pub abilities: Vec<RespondentAbility>,
    pub excluded_items: Vec<ExcludedItem>,
    pub history: Vec<IterationSummary>,
}

impl CalibrationResult {
    pub fn item(&self, item_id: &str) -> Option<&ItemCalibration> {
        self.item_calibrations.iter().find(|c| c.item_id == item_id)
    }

    /// Calibrated parameters keyed by item, as consumed by ability scoring.
    pub fn item_parameters(&self) -> HashMap<ItemId, ItemParameters> {
        self.item_calibrations
            .iter()
            .map(|c| (c.item_id.clone(), c.parameters()))
            .collect()
    }
}

/// Subtract the mean from every theta and return the shift applied.
///
/// If the plain mean would push a theta already at a bound outside it, the
/// shift `c` solving `sum(clamp(theta - c)) = 0` is found by bisection, so
/// the centred thetas both average zero and stay inside `bounds`.
pub fn center_abilities(theta: &mut [f64], bounds: Bounds) -> f64 {
    if theta.is_empty() {
        return 0.0;
    }

    let mean_theta = mean(theta);
    let shift = if theta.iter().all(|&t| bounds.contains(t - mean_theta)) {
        mean_theta
    } else {
        bounded_shift(theta, bounds)
    };

    for t in theta.iter_mut() {
        *t = bounds.clamp(*t - shift);
    }
    shift
}

fn bounded_shift(theta: &[f64], bounds: Bounds) -> f64 {
    let total = |c: f64| theta.iter().map(|&t| bounds.clamp(t - c)).sum::<f64>();
    let min = theta.iter().copied().fold(f64::INFINITY, f64::min);
    let max = theta.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    // total(lo) = n * upper > 0 and total(hi) = n * lower < 0.
    let mut lo = min - bounds.upper;
    let mut hi = max - bounds.lower;
    for _ in 0..CENTERING_BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if total(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Starting values: `b` from the item's p-value, `a` at its configured
/// default, theta from each respondent's proportion correct.
pub fn initial_estimates(
    matrix: &ResponseMatrix,
    config: &CalibrationConfig,
) -> (Vec<ItemParameters>, Vec<f64>) {
    let floor = config.init_probability_floor;

    let items = matrix
        .item_p_values()
        .iter()
        .map(|&p| {
            let b = -logit(p.clamp(floor, 1.0 - floor));
            ItemParameters::new(config.initial_discrimination, config.difficulty_bounds.clamp(b))
        })
        .collect();

    let theta = (0..matrix.respondent_count())
        .map(|i| match matrix.respondent_totals(i) {
            (_, 0) => 0.0,
            (correct, answered) => config
                .theta_bounds
                .clamp(clamped_logit(correct, answered, floor)),
        })
        .collect();

    (items, theta)
}

/// Runs JMLE calibrations with one configuration.
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    config: CalibrationConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Result<Self, CalibrationError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    /// Abort with [`CalibrationError::Cancelled`] once `flag` is set. The flag
    /// is checked before every round.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn calibrate<I>(
        &self,
        competency_id: &str,
        rows: I,
    ) -> Result<CalibrationResult, CalibrationError>
    where
        I: IntoIterator,
        I::Item: Into<ResponseRow>,
    {
        let matrix = ResponseMatrix::build(rows, &self.config);
        self.calibrate_matrix(competency_id, matrix)
    }

    pub fn calibrate_source<S>(
        &self,
        source: &S,
        competency_id: &str,
    ) -> Result<CalibrationResult, CalibrationError>
    where
        S: ResponseSource + ?Sized,
    {
        let rows = source
            .responses(competency_id)
            .ok_or_else(|| CalibrationError::NotFound(competency_id.to_string()))?;
        self.calibrate(competency_id, rows)
    }

    pub fn calibrate_matrix(
        &self,
        competency_id: &str,
        matrix: ResponseMatrix,
    ) -> Result<CalibrationResult, CalibrationError> {
        let config = &self.config;

        if matrix.respondent_count() < config.min_respondents {
            return Err(CalibrationError::InsufficientRespondents {
                found: matrix.respondent_count(),
                required: config.min_respondents,
            });
        }
        if matrix.item_count() < config.min_items {
            return Err(CalibrationError::InsufficientItems {
                found: matrix.item_count(),
                required: config.min_items,
            });
        }

        log::debug!(
            "initializing calibration of {competency_id}: {} respondents, {} items ({} excluded)",
            matrix.respondent_count(),
            matrix.item_count(),
            matrix.excluded_items().len()
        );
        let (mut items, mut theta) = initial_estimates(&matrix, config);

        let mut status = CalibrationStatus::MaxIterationsReached;
        let mut iterations = 0;
        let mut max_change = f64::INFINITY;
        let mut history = Vec::new();

        for iteration in 1..=config.max_iterations {
            if self.is_cancelled() {
                log::info!("calibration of {competency_id} cancelled before iteration {iteration}");
                return Err(CalibrationError::Cancelled { iteration });
            }

            e_step(&matrix, &items, &mut theta, config);

            let shift = center_abilities(&mut theta, config.theta_bounds);
            for item in items.iter_mut() {
                item.difficulty = config.difficulty_bounds.clamp(item.difficulty - shift);
            }

            max_change = m_step(&matrix, &theta, &mut items, config);
            iterations = iteration;

            let log_likelihood = joint_log_likelihood(&matrix, &items, &theta);
            log::debug!(
                "{competency_id} iteration {iteration}: max change {max_change:.6}, log-likelihood {log_likelihood:.4}"
            );
            history.push(IterationSummary {
                iteration,
                max_change,
                log_likelihood,
            });

            if max_change < config.convergence_tolerance {
                status = CalibrationStatus::Converged;
                break;
            }
        }

        match status {
            CalibrationStatus::Converged => log::info!(
                "calibration of {competency_id} converged after {iterations} iterations"
            ),
            CalibrationStatus::MaxIterationsReached => log::warn!(
                "calibration of {competency_id} did not converge within {iterations} iterations (max change {max_change:.4})"
            ),
        }

        let standard_errors =
            compute_item_standard_errors(&matrix, &items, &theta, config.information_epsilon);

        let item_calibrations = matrix
            .item_ids()
            .iter()
            .zip(&items)
            .zip(standard_errors)
            .zip(matrix.item_p_values())
            .map(|(((item_id, item), se), &p_value)| ItemCalibration {
                item_id: item_id.clone(),
                discrimination: item.discrimination,
                difficulty: item.difficulty,
                se_discrimination: se.discrimination,
                se_difficulty: se.difficulty,
                p_value,
            })
            .collect();

        let abilities = matrix
            .respondent_ids()
            .iter()
            .enumerate()
            .map(|(i, respondent_id)| RespondentAbility {
                respondent_id: respondent_id.clone(),
                theta: theta[i],
                standard_error: ability_standard_error(
                    respondent_observations(&matrix, &items, i).map(|(_, item)| item),
                    theta[i],
                    config.information_epsilon,
                ),
                items_answered: matrix.respondent_totals(i).1,
            })
            .collect();

        let log_likelihood = history.last().map_or(f64::NAN, |h| h.log_likelihood);
        let item_count = matrix.item_count();
        let respondent_count = matrix.respondent_count();

        Ok(CalibrationResult {
            competency_id: competency_id.to_string(),
            item_count,
            respondent_count,
            iterations,
            converged: status == CalibrationStatus::Converged,
            status,
            max_change,
            log_likelihood,
            item_calibrations,
            abilities,
            excluded_items: matrix.into_excluded_items(),
            history,
        })
    }
}

/// Calibrate with the default configuration.
pub fn calibrate<I>(competency_id: &str, rows: I) -> Result<CalibrationResult, CalibrationError>
where
    I: IntoIterator,
    I::Item: Into<ResponseRow>,
{
    Calibrator::default().calibrate(competency_id, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::THETA_BOUNDS;
    use approx::assert_abs_diff_eq;

    fn small_config() -> CalibrationConfig {
        CalibrationConfig {
            min_respondents: 4,
            min_items: 3,
            ..CalibrationConfig::default()
        }
    }

    /// Guttman-like pattern: respondent `r` answers the easiest `r % 4 + 1`
    /// items correctly, with a few reversals so no item is perfect.
    fn small_rows() -> Vec<ResponseRow> {
        let mut rows = Vec::new();
        for r in 0..40 {
            let level = r % 4;
            for item in 0..4 {
                let mut correct = item <= level;
                if r % 7 == item {
                    correct = !correct;
                }
                rows.push(ResponseRow::new(
                    format!("p{r:02}"),
                    format!("q{item}"),
                    if correct { 1.0 } else { 0.0 },
                ));
            }
        }
        rows
    }

    #[test]
    fn centering_uses_plain_mean_inside_bounds() {
        let mut theta = vec![-1.0, 0.5, 2.0, 1.3];
        let shift = center_abilities(&mut theta, THETA_BOUNDS);
        assert_abs_diff_eq!(shift, 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(mean(&theta), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(theta[0], -1.7, epsilon = 1e-12);
    }

    #[test]
    fn centering_keeps_bound_respondents_in_range() {
        let mut theta = vec![4.0, -1.0, -1.5, -2.0];
        center_abilities(&mut theta, THETA_BOUNDS);
        assert!(theta.iter().all(|&t| THETA_BOUNDS.contains(t)));
        assert_abs_diff_eq!(mean(&theta), 0.0, epsilon = 1e-9);
        assert_eq!(theta[0], 4.0);
    }

    #[test]
    fn initial_estimates_follow_classical_statistics() {
        let config = small_config();
        let matrix = ResponseMatrix::build(small_rows(), &config);
        let (items, theta) = initial_estimates(&matrix, &config);

        for (item, &p) in items.iter().zip(matrix.item_p_values()) {
            assert_eq!(item.discrimination, 1.0);
            assert_abs_diff_eq!(item.difficulty, -logit(p), epsilon = 1e-12);
        }
        // Easier items start with lower difficulty.
        assert!(items[0].difficulty < items[3].difficulty);
        for (i, &t) in theta.iter().enumerate() {
            let (correct, answered) = matrix.respondent_totals(i);
            let expected = THETA_BOUNDS.clamp(clamped_logit(correct, answered, 0.01));
            assert_abs_diff_eq!(t, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn small_run_respects_bounds_and_reports_history() {
        let calibrator = Calibrator::new(small_config()).unwrap();
        let result = calibrator.calibrate("algebra", small_rows()).unwrap();

        assert_eq!(result.competency_id, "algebra");
        assert_eq!(result.item_count, 4);
        assert_eq!(result.respondent_count, 40);
        assert_eq!(result.history.len(), result.iterations);
        assert_eq!(result.converged, result.status == CalibrationStatus::Converged);
        assert_eq!(result.history.last().unwrap().max_change, result.max_change);
        for item in &result.item_calibrations {
            assert!(calibrator.config().discrimination_bounds.contains(item.discrimination));
            assert!(calibrator.config().difficulty_bounds.contains(item.difficulty));
        }
        let thetas: Vec<f64> = result.abilities.iter().map(|a| a.theta).collect();
        assert!(thetas.iter().all(|&t| THETA_BOUNDS.contains(t)));
        assert_abs_diff_eq!(mean(&thetas), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn exhausted_budget_is_not_an_error() {
        let config = CalibrationConfig {
            max_iterations: 1,
            convergence_tolerance: 1e-12,
            ..small_config()
        };
        let result = Calibrator::new(config)
            .unwrap()
            .calibrate("algebra", small_rows())
            .unwrap();
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
        assert_eq!(result.status, CalibrationStatus::MaxIterationsReached);
    }

    #[test]
    fn thresholds_are_checked_before_iterating() {
        let config = CalibrationConfig {
            min_respondents: 41,
            ..small_config()
        };
        let err = Calibrator::new(config)
            .unwrap()
            .calibrate("algebra", small_rows())
            .unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::InsufficientRespondents {
                found: 40,
                required: 41
            }
        ));
        assert!(err.is_insufficient_data());

        let config = CalibrationConfig {
            min_items: 5,
            ..small_config()
        };
        let err = Calibrator::new(config)
            .unwrap()
            .calibrate("algebra", small_rows())
            .unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::InsufficientItems {
                found: 4,
                required: 5
            }
        ));
    }

    #[test]
    fn raised_flag_cancels_before_first_round() {
        let flag = Arc::new(AtomicBool::new(true));
        let err = Calibrator::new(small_config())
            .unwrap()
            .with_cancellation(flag)
            .calibrate("algebra", small_rows())
            .unwrap_err();
        assert!(matches!(err, CalibrationError::Cancelled { iteration: 1 }));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = CalibrationConfig {
            damping: 0.0,
            ..CalibrationConfig::default()
        };
        assert!(matches!(
            Calibrator::new(config),
            Err(CalibrationError::InvalidConfig(_))
        ));
    }
}
