//! Bounded-velocity pose interpolator.
//!
//! Produces the control-pose series the Servo Driver streams into the
//! robot once a new target arrives: a Softplus-shaped ramp from the
//! current control pose to the new target, followed by a short hold tail
//! at the target so the series always ends settled.
//!
//! # Algorithm
//!
//! Given a raw difference pose `diff` and a time budget `t`, the factor
//! curve is built on the normalized window `x ∈ [-4, 4]`:
//!
//! ```text
//! softplus(x) = ln(1 + e^x)
//! f(x) = 1 - softplus(-x) / softplus(4)
//! ```
//!
//! `f` rises from ~0 to ~1 across the window; at `x = 0` (the midpoint,
//! reached at `t = t_budget`) it sits at `f(0) ≈ 0.8312506868394661` — the
//! curve does not hit 1 exactly at the requested time budget, it keeps
//! easing in for a symmetric tail of the same length. `n = floor(2 * t /
//! h)` samples cover the ramp at tick period `h`; a further
//! `ceil(n / 2)` samples hold the factor at exactly `1.0` so the series
//! always ends settled even though the ramp alone does not.
//!
//! Each control pose in the output series is `base + diff * factor`.

use cobot_tools::Pose;

const SOFTPLUS_XLIM: f64 = 4.0;

fn softplus(x: f64) -> f64 {
    (1.0 + x.exp()).ln()
}

/// Builds the Softplus factor series for a ramp from a zero-time budget
/// `t_budget` sampled at tick period `h`.
///
/// Returns the factors only (not the sample times); factor `i` is applied
/// at tick `i` of the output series, `i * h` seconds after the ramp
/// starts.
fn diff_factors(t_budget: f64, h: f64) -> Vec<f64> {
    let ylim = softplus(SOFTPLUS_XLIM);
    let n = (2.0 * t_budget / h).floor().max(0.0);
    let n_usize = n as usize;

    let mut factors = Vec::with_capacity(n_usize + n_usize.div_ceil(2));
    for i in 1..=n_usize {
        let t = -t_budget + (i as f64) * h;
        let x = t / t_budget * SOFTPLUS_XLIM;
        factors.push(1.0 - softplus(-x) / ylim);
    }
    let hold_len = n_usize.div_ceil(2);
    factors.extend(std::iter::repeat(1.0).take(hold_len));
    factors
}

/// Per-axis velocity limits used to size the ramp's time budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityLimits {
    pub v_lim_pos: f64,
    pub v_lim_rot: f64,
}

/// Builds the control-pose series for one target update.
///
/// `base` is the control pose the series starts from (the last pose
/// actually commanded to the robot); `diff` is the already-normalized
/// difference pose (position deltas in the same unit as `v_lim_pos`,
/// rotation deltas in degrees, already wrapped to `[-180, 180)`).
///
/// `nominal_interval` is the target update cadence used when the move is
/// small enough to complete within one update (`SPEC_FULL.md` §4.4); when
/// the velocity-bound time budget exceeds it, the ramp is stretched to
/// that larger budget instead.
pub fn build_control_series(
    base: Pose,
    diff: Pose,
    nominal_interval: f64,
    tick_period: f64,
    limits: VelocityLimits,
) -> Vec<Pose> {
    let t_lim_pos = diff.max_abs_pos() / limits.v_lim_pos;
    let t_lim_rot = diff.max_abs_rot() / limits.v_lim_rot;
    let t_budget = t_lim_pos.max(t_lim_rot).max(tick_period);

    let effective_budget = if t_budget <= nominal_interval { nominal_interval } else { t_budget };

    diff_factors(effective_budget, tick_period)
        .into_iter()
        .map(|factor| base + diff * factor)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softplus_matches_known_midpoint_value() {
        let ylim = softplus(SOFTPLUS_XLIM);
        let mid = 1.0 - softplus(0.0) / ylim;
        assert!((mid - 0.8312506868394661).abs() < 1e-12);
    }

    #[test]
    fn factor_series_ends_with_a_settled_hold_tail() {
        let factors = diff_factors(0.05, 0.008);
        let n = (2.0 * 0.05 / 0.008_f64).floor() as usize;
        let tail = &factors[n..];
        assert!(tail.iter().all(|&f| f == 1.0));
        assert_eq!(tail.len(), n.div_ceil(2));
    }

    #[test]
    fn factor_series_is_monotonically_nondecreasing_on_the_ramp() {
        let factors = diff_factors(0.05, 0.008);
        for pair in factors.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-12);
        }
    }

    #[test]
    fn build_control_series_moves_from_base_toward_base_plus_diff() {
        let base = Pose::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let diff = Pose::new(10.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let limits = VelocityLimits { v_lim_pos: 200.0, v_lim_rot: 60.0 };
        let series = build_control_series(base, diff, 0.05, 0.008, limits);
        assert!(!series.is_empty());
        let last = *series.last().unwrap();
        assert!((last.x() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn large_moves_stretch_the_time_budget_past_the_nominal_interval() {
        let base = Pose::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        // at v_lim_pos = 200, a 40-unit move needs 0.2s, well past a 0.05s nominal interval
        let diff = Pose::new(40.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let limits = VelocityLimits { v_lim_pos: 200.0, v_lim_rot: 60.0 };
        let stretched = build_control_series(base, diff, 0.05, 0.008, limits);
        let nominal = build_control_series(base, Pose::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0), 0.05, 0.008, limits);
        assert!(stretched.len() > nominal.len());
    }

    proptest::proptest! {
        #[test]
        fn series_always_ends_at_base_plus_diff(
            dx in -50.0..50.0_f64,
            dy in -50.0..50.0_f64,
            dz in -50.0..50.0_f64,
        ) {
            let base = Pose::new(1.0, 2.0, 3.0, 0.0, 0.0, 0.0);
            let diff = Pose::new(dx, dy, dz, 0.0, 0.0, 0.0);
            let limits = VelocityLimits { v_lim_pos: 200.0, v_lim_rot: 60.0 };
            let series = build_control_series(base, diff, 0.05, 0.008, limits);
            let last = *series.last().unwrap();
            let expected = base + diff;
            for i in 0..3 {
                prop_assert!((last[i] - expected[i]).abs() < 1e-6);
            }
        }
    }
}
