//! Failures that abort a calibration before any estimation happens.
//!
//! Numerical degeneracies met while iterating (flat likelihoods, items with
//! no information, respondents without usable answers) are not errors; the
//! estimators skip them and carry on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    /// The response source has no data for this competency.
    #[error("competency not found: {0}")]
    NotFound(String),

    #[error(
        "insufficient respondents for calibration: {found} retained, at least {required} required"
    )]
    InsufficientRespondents { found: usize, required: usize },

    #[error("insufficient items for calibration: {found} retained, at least {required} required")]
    InsufficientItems { found: usize, required: usize },

    #[error("invalid calibration configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse calibration configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The caller's cancellation flag was raised before round `iteration` started.
    #[error("calibration cancelled before iteration {iteration}")]
    Cancelled { iteration: usize },
}

impl CalibrationError {
    /// Returns `true` when more data could make a retry succeed.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            CalibrationError::InsufficientRespondents { .. }
                | CalibrationError::InsufficientItems { .. }
        )
    }
}

#[cfg(feature = "python")]
impl From<CalibrationError> for pyo3::PyErr {
    fn from(err: CalibrationError) -> Self {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
