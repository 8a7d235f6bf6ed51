//! Python bindings, built with the `python` feature.

use std::collections::HashMap;

use numpy::{PyArray1, PyReadonlyArray1, ToPyArray};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::calibration::Calibrator;
use crate::config::CalibrationConfig;
use crate::irf::{ItemParameters, probability};
use crate::scoring::estimate_ability_detailed;

/// Probability of a correct response at each theta for one 2PL item
#[pyfunction]
pub fn irf_2pl<'py>(
    py: Python<'py>,
    theta: PyReadonlyArray1<f64>,
    discrimination: f64,
    difficulty: f64,
) -> Bound<'py, PyArray1<f64>> {
    theta
        .as_array()
        .mapv(|t| probability(t, discrimination, difficulty))
        .to_pyarray(py)
}

/// JMLE calibration of `(respondent_id, item_id, score)` rows.
///
/// `config_toml` overrides any subset of the calibration settings.
#[pyfunction]
#[pyo3(signature = (competency_id, rows, config_toml=None))]
pub fn calibrate_jmle<'py>(
    py: Python<'py>,
    competency_id: &str,
    rows: Vec<(String, String, f64)>,
    config_toml: Option<&str>,
) -> PyResult<Bound<'py, PyDict>> {
    let config = match config_toml {
        Some(source) => CalibrationConfig::from_toml_str(source)?,
        None => CalibrationConfig::default(),
    };
    let calibrator = Calibrator::new(config)?;
    let result = py.detach(|| calibrator.calibrate(competency_id, rows))?;

    let items: Vec<(String, f64, f64, f64, f64)> = result
        .item_calibrations
        .iter()
        .map(|c| {
            (
                c.item_id.clone(),
                c.discrimination,
                c.difficulty,
                c.se_discrimination,
                c.se_difficulty,
            )
        })
        .collect();
    let excluded: Vec<String> = result
        .excluded_items
        .iter()
        .map(|e| e.item_id.clone())
        .collect();

    let out = PyDict::new(py);
    out.set_item("competency_id", &result.competency_id)?;
    out.set_item("item_count", result.item_count)?;
    out.set_item("respondent_count", result.respondent_count)?;
    out.set_item("iterations", result.iterations)?;
    out.set_item("converged", result.converged)?;
    out.set_item("max_change", result.max_change)?;
    out.set_item("log_likelihood", result.log_likelihood)?;
    out.set_item("item_calibrations", items)?;
    out.set_item("excluded_items", excluded)?;
    Ok(out)
}

/// Theta and its standard error for one respondent.
#[pyfunction]
pub fn estimate_ability(
    scores: HashMap<String, f64>,
    parameters: HashMap<String, (f64, f64)>,
) -> PyResult<(f64, f64)> {
    let calibrated: HashMap<String, ItemParameters> = parameters
        .into_iter()
        .map(|(id, (a, b))| (id, ItemParameters::new(a, b)))
        .collect();
    let config = CalibrationConfig::default();
    let estimate = estimate_ability_detailed(&scores, &calibrated, &config)?;
    Ok((estimate.theta, estimate.standard_error))
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(irf_2pl, m)?)?;
    m.add_function(wrap_pyfunction!(calibrate_jmle, m)?)?;
    m.add_function(wrap_pyfunction!(estimate_ability, m)?)?;
    Ok(())
}
