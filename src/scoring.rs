//! Scoring a single respondent against already-calibrated items.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::error::CalibrationError;
use crate::estep::estimate_theta;
use crate::irf::ItemParameters;
use crate::matrix::{ItemId, dichotomize};
use crate::standard_errors::ability_standard_error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    pub theta: f64,
    /// `NaN` when no item contributed information.
    pub standard_error: f64,
    pub items_used: usize,
}

/// Dichotomized responses to the scored items that have calibrated
/// parameters, ordered by item id so repeated calls sum in the same order.
fn usable_observations<'a, S>(
    scores: S,
    calibrated: &HashMap<ItemId, ItemParameters>,
    config: &CalibrationConfig,
) -> Vec<(bool, ItemParameters)>
where
    S: IntoIterator<Item = (&'a ItemId, &'a f64)>,
{
    let mut usable: Vec<(&ItemId, bool, ItemParameters)> = scores
        .into_iter()
        .filter(|(_, score)| score.is_finite())
        .filter_map(|(item_id, &score)| {
            calibrated
                .get(item_id)
                .map(|&item| (item_id, dichotomize(score, config.pass_threshold), item))
        })
        .collect();
    usable.sort_by(|a, b| a.0.cmp(b.0));
    usable
        .into_iter()
        .map(|(_, correct, item)| (correct, item))
        .collect()
}

/// Theta for one respondent, or `0.0` when none of their scored items has
/// calibrated parameters.
///
/// Fails with [`CalibrationError::InvalidConfig`] when `config` does not
/// validate.
pub fn estimate_ability<'a, S>(
    scores: S,
    calibrated: &HashMap<ItemId, ItemParameters>,
    config: &CalibrationConfig,
) -> Result<f64, CalibrationError>
where
    S: IntoIterator<Item = (&'a ItemId, &'a f64)>,
{
    Ok(estimate_ability_detailed(scores, calibrated, config)?.theta)
}

pub fn estimate_ability_detailed<'a, S>(
    scores: S,
    calibrated: &HashMap<ItemId, ItemParameters>,
    config: &CalibrationConfig,
) -> Result<AbilityEstimate, CalibrationError>
where
    S: IntoIterator<Item = (&'a ItemId, &'a f64)>,
{
    config.validate()?;

    let observations = usable_observations(scores, calibrated, config);
    let Some(theta) = estimate_theta(observations.iter().copied(), config) else {
        return Ok(AbilityEstimate {
            theta: 0.0,
            standard_error: f64::NAN,
            items_used: 0,
        });
    };

    Ok(AbilityEstimate {
        theta,
        standard_error: ability_standard_error(
            observations.iter().map(|&(_, item)| item),
            theta,
            config.information_epsilon,
        ),
        items_used: observations.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bounds;
    use std::collections::BTreeMap;

    fn calibrated() -> HashMap<ItemId, ItemParameters> {
        [
            ("q1", ItemParameters::new(1.2, -1.0)),
            ("q2", ItemParameters::new(0.9, 0.0)),
            ("q3", ItemParameters::new(1.7, 0.8)),
            ("q4", ItemParameters::new(1.1, 1.5)),
        ]
        .into_iter()
        .map(|(id, item)| (id.to_string(), item))
        .collect()
    }

    fn scores(raw: &[(&str, f64)]) -> HashMap<ItemId, f64> {
        raw.iter().map(|&(id, s)| (id.to_string(), s)).collect()
    }

    #[test]
    fn empty_scores_give_exactly_zero() {
        let config = CalibrationConfig::default();
        let empty: HashMap<ItemId, f64> = HashMap::new();
        assert_eq!(estimate_ability(&empty, &calibrated(), &config).unwrap(), 0.0);
        let detailed = estimate_ability_detailed(&empty, &calibrated(), &config).unwrap();
        assert_eq!(detailed.items_used, 0);
        assert!(detailed.standard_error.is_nan());
    }

    #[test]
    fn uncalibrated_and_missing_scores_are_ignored() {
        let config = CalibrationConfig::default();
        let only_unknown = scores(&[("x1", 1.0), ("q2", f64::NAN)]);
        assert_eq!(estimate_ability(&only_unknown, &calibrated(), &config).unwrap(), 0.0);

        let mixed = scores(&[("x1", 1.0), ("q1", 1.0), ("q3", 0.0), ("q2", f64::NAN)]);
        let reference = scores(&[("q1", 1.0), ("q3", 0.0)]);
        let detailed = estimate_ability_detailed(&mixed, &calibrated(), &config).unwrap();
        assert_eq!(detailed.items_used, 2);
        assert_eq!(
            detailed.theta,
            estimate_ability(&reference, &calibrated(), &config).unwrap()
        );
    }

    #[test]
    fn scoring_is_deterministic_across_map_instances() {
        let config = CalibrationConfig::default();
        let raw = [("q1", 0.9), ("q2", 0.5), ("q3", 0.2), ("q4", 0.7)];
        let first = estimate_ability(&scores(&raw), &calibrated(), &config).unwrap();
        let second = estimate_ability(&scores(&raw), &calibrated(), &config).unwrap();
        assert_eq!(first, second);

        let ordered: BTreeMap<ItemId, f64> =
            raw.iter().map(|&(id, s)| (id.to_string(), s)).collect();
        assert_eq!(estimate_ability(&ordered, &calibrated(), &config).unwrap(), first);
    }

    #[test]
    fn partial_credit_is_dichotomized_at_threshold() {
        let config = CalibrationConfig::default();
        let graded = scores(&[("q1", 0.5), ("q2", 0.49), ("q3", 0.75)]);
        let binary = scores(&[("q1", 1.0), ("q2", 0.0), ("q3", 1.0)]);
        assert_eq!(
            estimate_ability(&graded, &calibrated(), &config).unwrap(),
            estimate_ability(&binary, &calibrated(), &config).unwrap()
        );
    }

    #[test]
    fn stronger_pattern_scores_higher_with_finite_error() {
        let config = CalibrationConfig::default();
        let weak = estimate_ability_detailed(
            &scores(&[("q1", 1.0), ("q2", 0.0), ("q3", 0.0), ("q4", 0.0)]),
            &calibrated(),
            &config,
        )
        .unwrap();
        let strong = estimate_ability_detailed(
            &scores(&[("q1", 1.0), ("q2", 1.0), ("q3", 1.0), ("q4", 0.0)]),
            &calibrated(),
            &config,
        )
        .unwrap();
        assert!(strong.theta > weak.theta);
        assert!(strong.standard_error.is_finite() && strong.standard_error > 0.0);
    }

    #[test]
    fn inverted_bounds_are_rejected_instead_of_panicking() {
        let config = CalibrationConfig {
            theta_bounds: Bounds::new(4.0, -4.0),
            ..CalibrationConfig::default()
        };
        let answered = scores(&[("q1", 1.0), ("q3", 0.0)]);
        assert!(matches!(
            estimate_ability(&answered, &calibrated(), &config),
            Err(CalibrationError::InvalidConfig(_))
        ));

        let config = CalibrationConfig {
            theta_bounds: Bounds::new(f64::NAN, 4.0),
            ..CalibrationConfig::default()
        };
        assert!(matches!(
            estimate_ability_detailed(&answered, &calibrated(), &config),
            Err(CalibrationError::InvalidConfig(_))
        ));
    }
}
