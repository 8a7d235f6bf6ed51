//! Two-parameter logistic item response function.

/// Beyond this magnitude the logistic is 0 or 1 to machine precision.
pub const EXPONENT_LIMIT: f64 = 35.0;

/// Calibrated parameters of one item.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ItemParameters {
    pub discrimination: f64,
    pub difficulty: f64,
}

impl ItemParameters {
    pub const fn new(discrimination: f64, difficulty: f64) -> Self {
        Self {
            discrimination,
            difficulty,
        }
    }

    #[inline]
    pub fn probability(&self, theta: f64) -> f64 {
        probability(theta, self.discrimination, self.difficulty)
    }

    #[inline]
    pub fn information(&self, theta: f64) -> f64 {
        item_information(theta, self.discrimination, self.difficulty)
    }
}

/// Probability of a correct response under the 2PL model.
///
/// The exponent is tested before calling `exp`, so extreme abilities return
/// exactly `0.0` or `1.0` instead of overflowing.
#[inline]
pub fn probability(theta: f64, a: f64, b: f64) -> f64 {
    let exponent = -a * (theta - b);
    if exponent > EXPONENT_LIMIT {
        0.0
    } else if exponent < -EXPONENT_LIMIT {
        1.0
    } else {
        1.0 / (1.0 + exponent.exp())
    }
}

/// Fisher information an item carries about `theta`.
#[inline]
pub fn item_information(theta: f64, a: f64, b: f64) -> f64 {
    let p = probability(theta, a, b);
    a * a * p * (1.0 - p)
}
