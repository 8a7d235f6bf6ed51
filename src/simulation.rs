//! Synthetic 2PL response data with known generating parameters.

use ndarray::Array2;
use rand::prelude::*;
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;
use rayon::prelude::*;

use crate::irf::ItemParameters;
use crate::matrix::ResponseRow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelDesign {
    pub n_respondents: usize,
    pub n_items: usize,
    pub discrimination_range: (f64, f64),
    pub difficulty_range: (f64, f64),
    pub seed: u64,
}

impl Default for PanelDesign {
    fn default() -> Self {
        Self {
            n_respondents: 300,
            n_items: 10,
            discrimination_range: (0.8, 2.0),
            difficulty_range: (-2.0, 2.0),
            seed: 0,
        }
    }
}

/// True abilities and item parameters that responses are drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPanel {
    pub theta: Vec<f64>,
    pub items: Vec<ItemParameters>,
}

impl SyntheticPanel {
    pub fn new(theta: Vec<f64>, items: Vec<ItemParameters>) -> Self {
        Self { theta, items }
    }

    /// Draw `theta ~ N(0, 1)` and uniform `a`, `b` from the design ranges.
    pub fn generate(design: &PanelDesign) -> Self {
        let mut rng = Pcg64::seed_from_u64(design.seed);
        let theta = (0..design.n_respondents)
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect();
        let (a_lo, a_hi) = design.discrimination_range;
        let (b_lo, b_hi) = design.difficulty_range;
        let items = (0..design.n_items)
            .map(|_| {
                let a = rng.random_range(a_lo..=a_hi);
                let b = rng.random_range(b_lo..=b_hi);
                ItemParameters::new(a, b)
            })
            .collect();
        Self { theta, items }
    }

    pub fn respondent_id(index: usize) -> String {
        format!("resp-{index:05}")
    }

    pub fn item_id(index: usize) -> String {
        format!("item-{index:03}")
    }

    /// Simulate dichotomous responses; each cell is left unanswered with
    /// probability `missing_rate`.
    pub fn simulate(&self, missing_rate: f64, seed: u64) -> Array2<Option<bool>> {
        let n_items = self.items.len();

        let responses: Vec<Vec<Option<bool>>> = self
            .theta
            .par_iter()
            .enumerate()
            .map(|(i, &theta_i)| {
                let mut rng = Pcg64::seed_from_u64(seed.wrapping_add(i as u64));
                self.items
                    .iter()
                    .map(|item| {
                        let skip: f64 = rng.random();
                        let u: f64 = rng.random();
                        (skip >= missing_rate).then_some(u < item.probability(theta_i))
                    })
                    .collect()
            })
            .collect();

        let mut result = Array2::from_elem((self.theta.len(), n_items), None);
        for (i, row) in responses.iter().enumerate() {
            for (j, &val) in row.iter().enumerate() {
                result[[i, j]] = val;
            }
        }
        result
    }

    /// Simulated responses as rows with scores of `1.0` or `0.0`.
    pub fn rows(&self, missing_rate: f64, seed: u64) -> Vec<ResponseRow> {
        let responses = self.simulate(missing_rate, seed);
        responses
            .indexed_iter()
            .filter_map(|((i, j), response)| {
                response.map(|correct| {
                    ResponseRow::new(
                        Self::respondent_id(i),
                        Self::item_id(j),
                        if correct { 1.0 } else { 0.0 },
                    )
                })
            })
            .collect()
    }
}
