//! Joint maximum likelihood calibration of the two-parameter logistic (2PL)
//! item response model.
//!
//! This crate provides:
//! - Construction of a dichotomous response matrix with missing data and
//!   extreme-item filtering
//! - The overflow-safe 2PL item response function
//! - Newton-Raphson ability (E-step) and item parameter (M-step) estimators
//! - The JMLE loop with mean-centring, convergence tracking and standard errors
//! - Scoring of a single respondent against calibrated items
//! - Synthetic response simulation
//!
//! Python bindings are available behind the `python` feature.

pub mod utils;

pub mod calibration;
pub mod config;
pub mod error;
pub mod estep;
pub mod irf;
pub mod likelihood;
pub mod matrix;
pub mod mstep;
pub mod scoring;
pub mod simulation;
pub mod source;
pub mod standard_errors;

#[cfg(feature = "python")]
pub mod python;

pub use calibration::{
    CalibrationResult, CalibrationStatus, Calibrator, ItemCalibration, IterationSummary,
    RespondentAbility, calibrate,
};
pub use config::{Bounds, CalibrationConfig, NewtonConfig};
pub use error::CalibrationError;
pub use irf::{ItemParameters, probability};
pub use matrix::{ExcludedItem, ItemId, RespondentId, ResponseMatrix, ResponseRow};
pub use scoring::{AbilityEstimate, estimate_ability, estimate_ability_detailed};
pub use source::{InMemoryResponseSource, ResponseSource};

/// Python module for jmle_rs
#[cfg(feature = "python")]
#[pyo3::pymodule]
fn jmle_rs(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    python::register(m)?;
    Ok(())
}
