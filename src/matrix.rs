//! Dichotomous response matrix with missing-data support.
//!
//! Raw `(respondent, item, score)` rows are dichotomized at the configured
//! pass threshold, items with extreme classical difficulty are dropped, and
//! the survivors are laid out in a dense `respondents x items` array whose
//! cells are `None` where the item was never administered.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;

pub type ItemId = String;
pub type RespondentId = String;

/// One answer as delivered by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRow {
    pub respondent_id: RespondentId,
    pub item_id: ItemId,
    /// Normalized score in `[0, 1]`.
    pub score: f64,
}

impl ResponseRow {
    pub fn new(respondent_id: impl Into<String>, item_id: impl Into<String>, score: f64) -> Self {
        Self {
            respondent_id: respondent_id.into(),
            item_id: item_id.into(),
            score,
        }
    }
}

impl<R: Into<String>, I: Into<String>> From<(R, I, f64)> for ResponseRow {
    fn from((respondent_id, item_id, score): (R, I, f64)) -> Self {
        Self::new(respondent_id, item_id, score)
    }
}

/// An item dropped because its p-value fell outside the calibration window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedItem {
    pub item_id: ItemId,
    pub p_value: f64,
    pub attempts: usize,
}

#[inline]
pub fn dichotomize(score: f64, threshold: f64) -> bool {
    score >= threshold
}

#[derive(Debug, Clone)]
pub struct ResponseMatrix {
    item_ids: Vec<ItemId>,
    respondent_ids: Vec<RespondentId>,
    item_p_values: Vec<f64>,
    responses: Array2<Option<bool>>,
    excluded_items: Vec<ExcludedItem>,
}

impl ResponseMatrix {
    /// Build the filtered matrix from a stream of raw rows.
    ///
    /// Non-finite scores are skipped. A repeated `(respondent, item)` pair
    /// keeps the last score seen.
    pub fn build<I>(rows: I, config: &CalibrationConfig) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ResponseRow>,
    {
        let mut by_respondent: BTreeMap<RespondentId, BTreeMap<ItemId, f64>> = BTreeMap::new();
        let mut observed_items: BTreeSet<ItemId> = BTreeSet::new();
        let mut skipped = 0usize;

        for row in rows {
            let row: ResponseRow = row.into();
            if !row.score.is_finite() {
                skipped += 1;
                continue;
            }
            observed_items.insert(row.item_id.clone());
            by_respondent
                .entry(row.respondent_id)
                .or_default()
                .insert(row.item_id, row.score);
        }
        if skipped > 0 {
            log::warn!("skipped {skipped} response rows with non-finite scores");
        }

        let threshold = config.pass_threshold;
        let mut item_ids = Vec::new();
        let mut item_p_values = Vec::new();
        let mut excluded_items = Vec::new();

        for item_id in observed_items {
            let mut attempts = 0usize;
            let mut correct = 0usize;
            for scores in by_respondent.values() {
                if let Some(&score) = scores.get(&item_id) {
                    attempts += 1;
                    if dichotomize(score, threshold) {
                        correct += 1;
                    }
                }
            }
            if attempts == 0 {
                continue;
            }
            let p_value = correct as f64 / attempts as f64;
            if p_value < config.min_p_value || p_value > config.max_p_value {
                log::debug!(
                    "excluding item {item_id}: p-value {p_value:.3} over {attempts} attempts"
                );
                excluded_items.push(ExcludedItem {
                    item_id,
                    p_value,
                    attempts,
                });
                continue;
            }
            item_ids.push(item_id);
            item_p_values.push(p_value);
        }

        let retained: Vec<(RespondentId, BTreeMap<ItemId, f64>)> = by_respondent
            .into_iter()
            .filter(|(_, scores)| item_ids.iter().any(|id| scores.contains_key(id)))
            .collect();

        let mut responses = Array2::from_elem((retained.len(), item_ids.len()), None);
        let mut respondent_ids = Vec::with_capacity(retained.len());
        for (i, (respondent_id, scores)) in retained.into_iter().enumerate() {
            for (j, item_id) in item_ids.iter().enumerate() {
                responses[[i, j]] = scores
                    .get(item_id)
                    .map(|&score| dichotomize(score, threshold));
            }
            respondent_ids.push(respondent_id);
        }

        Self {
            item_ids,
            respondent_ids,
            item_p_values,
            responses,
            excluded_items,
        }
    }

    pub fn item_count(&self) -> usize {
        self.item_ids.len()
    }

    pub fn respondent_count(&self) -> usize {
        self.respondent_ids.len()
    }

    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }

    pub fn respondent_ids(&self) -> &[RespondentId] {
        &self.respondent_ids
    }

    /// Classical proportion correct of each retained item.
    pub fn item_p_values(&self) -> &[f64] {
        &self.item_p_values
    }

    pub fn excluded_items(&self) -> &[ExcludedItem] {
        &self.excluded_items
    }

    pub fn response(&self, respondent: usize, item: usize) -> Option<bool> {
        self.responses[[respondent, item]]
    }

    pub fn respondent_row(&self, respondent: usize) -> ArrayView1<'_, Option<bool>> {
        self.responses.row(respondent)
    }

    pub fn item_column(&self, item: usize) -> ArrayView1<'_, Option<bool>> {
        self.responses.column(item)
    }

    /// `(correct, answered)` counts of one respondent over retained items.
    pub fn respondent_totals(&self, respondent: usize) -> (usize, usize) {
        self.respondent_row(respondent)
            .iter()
            .flatten()
            .fold((0, 0), |(correct, answered), &x| {
                (correct + usize::from(x), answered + 1)
            })
    }

    pub(crate) fn into_excluded_items(self) -> Vec<ExcludedItem> {
        self.excluded_items
    }
}
