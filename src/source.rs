//! Where response rows come from.
//!
//! Calibration only consumes rows; looking them up per competency is the
//! caller's business. A source answers `None` for a competency it does not
//! know, which calibration reports as [`CalibrationError::NotFound`].
//!
//! [`CalibrationError::NotFound`]: crate::error::CalibrationError::NotFound

use std::collections::HashMap;

use crate::matrix::ResponseRow;

pub trait ResponseSource {
    fn responses(&self, competency_id: &str) -> Option<Box<dyn Iterator<Item = ResponseRow> + '_>>;
}

/// Rows held in memory, keyed by competency.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResponseSource {
    competencies: HashMap<String, Vec<ResponseRow>>,
}

impl InMemoryResponseSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a competency, appending `rows` to any already held.
    pub fn insert<I>(&mut self, competency_id: impl Into<String>, rows: I)
    where
        I: IntoIterator,
        I::Item: Into<ResponseRow>,
    {
        self.competencies
            .entry(competency_id.into())
            .or_default()
            .extend(rows.into_iter().map(Into::into));
    }
}

impl ResponseSource for InMemoryResponseSource {
    fn responses(&self, competency_id: &str) -> Option<Box<dyn Iterator<Item = ResponseRow> + '_>> {
        let rows = self.competencies.get(competency_id)?;
        Some(Box::new(rows.iter().cloned()))
    }
}
