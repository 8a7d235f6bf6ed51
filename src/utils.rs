//! Shared numeric helpers.

use crate::config::{Bounds, NewtonConfig};

pub const EPSILON: f64 = 1e-10;

#[inline]
pub fn indicator(correct: bool) -> f64 {
    if correct { 1.0 } else { 0.0 }
}

/// Log-odds of a probability. Callers clamp `p` away from 0 and 1 first.
#[inline]
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Proportion of `correct` out of `total`, floored and capped at
/// `[floor, 1 - floor]` before the logit so perfect scores stay finite.
#[inline]
pub fn clamped_logit(correct: usize, total: usize, floor: f64) -> f64 {
    let p = correct as f64 / total as f64;
    logit(p.clamp(floor, 1.0 - floor))
}

/// One-dimensional Newton-Raphson maximisation inside `bounds`.
///
/// `derivatives` returns the first and second derivative of the
/// log-likelihood at the current point. Each step is scaled by `damping`
/// and the iterate clamped back into `bounds`. Iteration stops when the
/// curvature is flatter than `flatness_epsilon`, when the damped step
/// (measured before clamping) is below `tolerance`, or after
/// `max_iterations`. A step cut short by a bound still counts at its
/// unclamped size.
pub fn newton_raphson<F>(
    start: f64,
    bounds: Bounds,
    damping: f64,
    newton: &NewtonConfig,
    mut derivatives: F,
) -> f64
where
    F: FnMut(f64) -> (f64, f64),
{
    let mut x = start;
    for _ in 0..newton.max_iterations {
        let (d1, d2) = derivatives(x);
        if d2.abs() < newton.flatness_epsilon {
            break;
        }
        let delta = damping * d1 / d2;
        x = bounds.clamp(x - delta);
        if delta.abs() < newton.tolerance {
            break;
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn logit_is_zero_at_one_half() {
        assert_abs_diff_eq!(logit(0.5), 0.0, epsilon = 1e-15);
        assert!(logit(0.9) > 0.0);
        assert!(logit(0.1) < 0.0);
    }

    #[test]
    fn log_sigmoid_matches_naive_form_in_safe_range() {
        for &x in &[-5.0_f64, -0.3, 0.0, 0.7, 6.0] {
            let naive: f64 = (1.0 / (1.0 + (-x).exp())).ln();
            assert_abs_diff_eq!(log_sigmoid(x), naive, epsilon = 1e-12);
        }
        assert!(log_sigmoid(-800.0).is_finite());
    }

    #[test]
    fn clamped_logit_keeps_perfect_scores_finite() {
        let hi = clamped_logit(10, 10, 0.01);
        let lo = clamped_logit(0, 10, 0.01);
        assert_abs_diff_eq!(hi, logit(0.99), epsilon = 1e-12);
        assert_abs_diff_eq!(lo, -hi, epsilon = 1e-12);
    }

    #[test]
    fn newton_finds_maximum_of_concave_quadratic() {
        // l(x) = -(x - 1.5)^2
        let x = newton_raphson(0.0, Bounds::new(-4.0, 4.0), 1.0, &NewtonConfig::default(), |x| {
            (-2.0 * (x - 1.5), -2.0)
        });
        assert_abs_diff_eq!(x, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn newton_respects_bounds_and_flat_curvature() {
        let bounds = Bounds::new(-1.0, 1.0);
        let clamped = newton_raphson(0.0, bounds, 1.0, &NewtonConfig::default(), |x| {
            (-2.0 * (x - 3.0), -2.0)
        });
        assert_eq!(clamped, 1.0);

        let flat = newton_raphson(0.7, Bounds::new(-4.0, 4.0), 1.0, &NewtonConfig::default(), |_| {
            (5.0, 0.0)
        });
        assert_eq!(flat, 0.7);
    }

    #[test]
    fn step_against_a_bound_does_not_count_as_converged() {
        // Pinned at the upper bound: the applied move is zero, the damped
        // step is not, so the loop runs its full budget.
        let newton = NewtonConfig::default();
        let mut calls = 0;
        let x = newton_raphson(1.0, Bounds::new(-1.0, 1.0), 0.5, &newton, |x| {
            calls += 1;
            (-2.0 * (x - 3.0), -2.0)
        });
        assert_eq!(x, 1.0);
        assert_eq!(calls, newton.max_iterations);

        // Free to move: stops as soon as the damped step is under tolerance.
        let mut calls = 0;
        newton_raphson(0.0, Bounds::new(-4.0, 4.0), 1.0, &newton, |x| {
            calls += 1;
            (-2.0 * (x - 0.5), -2.0)
        });
        assert_eq!(calls, 2);
    }

    #[test]
    fn damping_slows_but_still_converges() {
        let newton = NewtonConfig {
            max_iterations: 200,
            ..NewtonConfig::default()
        };
        let x = newton_raphson(-3.0, Bounds::new(-4.0, 4.0), 0.5, &newton, |x| {
            (-2.0 * (x + 0.25), -2.0)
        });
        assert_abs_diff_eq!(x, -0.25, epsilon = 1e-3);
    }

    #[test]
    fn mean_of_empty_slice_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_abs_diff_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
    }
}
