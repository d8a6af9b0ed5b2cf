//! TCP pose data model: [`Pose`], [`TargetMessage`], [`PoseSeries`],
//! [`SharedFeedback`], angle wrapping, and the coordinate axis transform.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Index, IndexMut, Mul, Sub};
use thiserror::Error;

/// Wraps an angle (degrees) into `[0, 360)`.
pub fn wrap360(theta: f64) -> f64 {
    theta.rem_euclid(360.0)
}

/// Wraps an angle (degrees) into `[-180, 180)`.
pub fn wrap180(theta: f64) -> f64 {
    (theta + 180.0).rem_euclid(360.0) - 180.0
}

/// A 6-DoF TCP pose: position in millimetres, rotation in degrees.
///
/// Stored as a flat `[x, y, z, rx, ry, rz]` array so that the interpolator
/// and coordinate transform can treat it as a plain vector; named accessors
/// are provided for readability at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose(pub [f64; 6]);

impl Pose {
    pub const ZERO: Pose = Pose([0.0; 6]);

    pub fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        Self([x, y, z, rx, ry, rz])
    }

    pub fn x(&self) -> f64 {
        self.0[0]
    }
    pub fn y(&self) -> f64 {
        self.0[1]
    }
    pub fn z(&self) -> f64 {
        self.0[2]
    }
    pub fn rx(&self) -> f64 {
        self.0[3]
    }
    pub fn ry(&self) -> f64 {
        self.0[4]
    }
    pub fn rz(&self) -> f64 {
        self.0[5]
    }

    /// `wrap360` applied to the rotational components only; the position
    /// components (mm) are never wrapped.
    pub fn wrap360_rot(&self) -> Pose {
        let mut out = *self;
        for i in 3..6 {
            out.0[i] = wrap360(out.0[i]);
        }
        out
    }

    /// `wrap180` applied to the rotational components only.
    pub fn wrap180_rot(&self) -> Pose {
        let mut out = *self;
        for i in 3..6 {
            out.0[i] = wrap180(out.0[i]);
        }
        out
    }

    /// Maximum absolute value over the positional components.
    pub fn max_abs_pos(&self) -> f64 {
        self.0[..3].iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// Maximum absolute value over the rotational components.
    pub fn max_abs_rot(&self) -> f64 {
        self.0[3..].iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }
}

impl Index<usize> for Pose {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl IndexMut<usize> for Pose {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.0[i]
    }
}

impl Add for Pose {
    type Output = Pose;
    fn add(self, rhs: Pose) -> Pose {
        let mut out = [0.0; 6];
        for i in 0..6 {
            out[i] = self.0[i] + rhs.0[i];
        }
        Pose(out)
    }
}

impl Sub for Pose {
    type Output = Pose;
    fn sub(self, rhs: Pose) -> Pose {
        let mut out = [0.0; 6];
        for i in 0..6 {
            out[i] = self.0[i] - rhs.0[i];
        }
        Pose(out)
    }
}

impl Mul<f64> for Pose {
    type Output = Pose;
    fn mul(self, factor: f64) -> Pose {
        let mut out = [0.0; 6];
        for i in 0..6 {
            out[i] = self.0[i] * factor;
        }
        Pose(out)
    }
}

/// Automatic branch-selection mode for the `fig` arm-configuration code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FigureMode {
    /// Prefers branch continuity with the previous commanded pose.
    Preserve,
    /// Prefers whichever branch keeps the target reachable.
    AvoidError,
}

/// A [`Pose`] with an attached arm-configuration (`fig`) code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseWithFigure {
    pub pose: Pose,
    pub fig: i32,
}

/// Digital pad state carried alongside a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pad {
    /// Hold: while asserted, the planner freezes command emission.
    #[serde(default)]
    pub b0: bool,
    /// Origin reset: while asserted, the planner relocks its anchors.
    #[serde(default, rename = "bA")]
    pub b_a: bool,
}

/// A single raw position/orientation triple as carried on the wire, e.g.
/// `{"x": 1.0, "y": 2.0, "z": 3.0}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A single teleoperation target, as received from the live feeder or read
/// from a replay file.
///
/// Angular unit (radians vs. degrees) is a session-wide configuration
/// option, not encoded in the message itself; the planner's coordinate
/// normalisation step performs the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetMessage {
    pub pos: Vec3,
    pub ori: Vec3,
    #[serde(default)]
    pub pad: Pad,
    pub time: f64,
}

impl TargetMessage {
    /// Lays the message out as a flat `[x, y, z, rx, ry, rz]` pose, prior to
    /// any axis permutation, scaling, or unit conversion.
    pub fn as_raw_pose(&self) -> Pose {
        Pose::new(self.pos.x, self.pos.y, self.pos.z, self.ori.x, self.ori.y, self.ori.z)
    }
}

/// A nonempty, ordered sequence of commanded poses for consecutive control
/// ticks. Produced by one planner update; consumed atomically (in order) by
/// the servo driver, with a newly enqueued series preempting any unconsumed
/// tail of a prior one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSeries(Vec<Pose>);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoseSeriesError {
    #[error("pose series must contain at least one pose")]
    Empty,
}

impl PoseSeries {
    pub fn new(poses: Vec<Pose>) -> Result<Self, PoseSeriesError> {
        if poses.is_empty() {
            return Err(PoseSeriesError::Empty);
        }
        Ok(Self(poses))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn as_slice(&self) -> &[Pose] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Pose> {
        self.0.get(index)
    }

    pub fn into_vec(self) -> Vec<Pose> {
        self.0
    }
}

/// The servo driver's most recently observed robot pose, shared with the
/// planner. The servo process is the sole writer; the planner is the sole
/// reader. `valid` transitions `false -> true` exactly once, on the first
/// successful pose read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SharedFeedback {
    pub last_robot_pose: Pose,
    pub valid: bool,
}

impl SharedFeedback {
    pub const fn invalid() -> Self {
        Self { last_robot_pose: Pose::ZERO, valid: false }
    }
}

/// Which of the six axes (`x, y, z, rx, ry, rz`) feeds a given output axis,
/// and with what sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisTerm {
    source: usize,
    sign: f64,
}

/// A permutation-with-sign over the six pose axes, split into two
/// independent halves: the positional axes (`x, y, z`) and the rotational
/// axes (`rx, ry, rz`). Construction validates that each half is a signed
/// permutation of its own three axes and rejects any mapping that crosses
/// between the two halves. Application is `out[i] = sign[i] * in[permute[i]]`
/// — pure, stateless, and branch-free.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisMap {
    terms: [AxisTerm; 6],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AxisMapError {
    #[error("axis expression `{0}` is not a recognised signed axis name")]
    UnrecognisedAxis(String),
    #[error("axis expression `{0}` maps across the positional/rotational boundary")]
    CrossHalfMapping(String),
    #[error("positional half is not a permutation of x, y, z (duplicate or missing axis)")]
    NotAPositionalPermutation,
    #[error("rotational half is not a permutation of rx, ry, rz (duplicate or missing axis)")]
    NotARotationalPermutation,
}

const AXIS_NAMES: [&str; 6] = ["x", "y", "z", "rx", "ry", "rz"];

fn parse_axis_expr(expr: &str) -> Option<(f64, usize)> {
    let (sign, name) = match expr.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, expr.strip_prefix('+').unwrap_or(expr)),
    };
    let idx = AXIS_NAMES.iter().position(|&n| n == name)?;
    Some((sign, idx))
}

impl AxisMap {
    /// `spec[i]` is the signed source-axis expression (e.g. `"-x"`, `"z"`)
    /// that feeds output axis `AXIS_NAMES[i]`.
    pub fn from_spec(spec: [&str; 6]) -> Result<Self, AxisMapError> {
        let mut terms = [AxisTerm { source: 0, sign: 1.0 }; 6];
        for (i, expr) in spec.iter().enumerate() {
            let (sign, source) = parse_axis_expr(expr).ok_or_else(|| AxisMapError::UnrecognisedAxis(expr.to_string()))?;
            let output_is_rotational = i >= 3;
            let source_is_rotational = source >= 3;
            if output_is_rotational != source_is_rotational {
                return Err(AxisMapError::CrossHalfMapping(expr.to_string()));
            }
            terms[i] = AxisTerm { source, sign };
        }

        let mut pos_seen = [false; 3];
        for term in &terms[0..3] {
            pos_seen[term.source] = true;
        }
        if pos_seen.iter().any(|&seen| !seen) {
            return Err(AxisMapError::NotAPositionalPermutation);
        }

        let mut rot_seen = [false; 3];
        for term in &terms[3..6] {
            rot_seen[term.source - 3] = true;
        }
        if rot_seen.iter().any(|&seen| !seen) {
            return Err(AxisMapError::NotARotationalPermutation);
        }

        Ok(Self { terms })
    }

    /// The default axis map for the live MQTT feeder: `x=-x, y=z, z=y,
    /// rx=-rx, ry=rz, rz=ry` (the `xd/yd/zd` rate channels in the wire
    /// schema are not driven independently; see `SPEC_FULL.md` §11).
    pub fn default_live() -> Self {
        Self::from_spec(["-x", "z", "y", "-rx", "rz", "ry"]).expect("default axis map is a valid signed permutation")
    }

    pub fn apply(&self, pose: Pose) -> Pose {
        let mut out = [0.0; 6];
        for i in 0..6 {
            let term = self.terms[i];
            out[i] = term.sign * pose.0[term.source];
        }
        Pose(out)
    }

    /// The inverse mapping: applying `self` then `self.inverse()` (or vice
    /// versa) yields the identity transform.
    pub fn inverse(&self) -> AxisMap {
        let mut terms = [AxisTerm { source: 0, sign: 1.0 }; 6];
        for (i, term) in self.terms.iter().enumerate() {
            terms[term.source] = AxisTerm { source: i, sign: term.sign };
        }
        Self { terms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap360_basic() {
        assert_eq!(wrap360(0.0), 0.0);
        assert_eq!(wrap360(359.9), 359.9);
        assert_eq!(wrap360(360.0), 0.0);
        assert_eq!(wrap360(-10.0), 350.0);
        assert_eq!(wrap360(720.0 + 15.0), 15.0);
    }

    #[test]
    fn wrap180_basic() {
        assert_eq!(wrap180(0.0), 0.0);
        assert!((wrap180(180.0) - (-180.0)).abs() < 1e-9);
        assert_eq!(wrap180(-181.0), 179.0);
        assert_eq!(wrap180(181.0), -179.0);
    }

    #[test]
    fn wrap180_periodic() {
        for k in -3..=3 {
            let theta = 47.25;
            let shifted = theta + 360.0 * k as f64;
            assert!((wrap180(shifted) - wrap180(theta)).abs() < 1e-9);
        }
    }

    #[test]
    fn pose_arithmetic() {
        let a = Pose::new(1.0, 2.0, 3.0, 10.0, 20.0, 30.0);
        let b = Pose::new(0.5, 0.5, 0.5, 5.0, 5.0, 5.0);
        let sum = a + b;
        assert_eq!(sum.x(), 1.5);
        assert_eq!(sum.rz(), 35.0);
        let diff = a - b;
        assert_eq!(diff.z(), 2.5);
        let scaled = a * 2.0;
        assert_eq!(scaled.y(), 4.0);
    }

    #[test]
    fn wrap360_rot_leaves_position_untouched() {
        let pose = Pose::new(560.0, 150.0, 460.0, -10.0, 370.0, 0.0);
        let wrapped = pose.wrap360_rot();
        assert_eq!(wrapped.x(), 560.0);
        assert_eq!(wrapped.y(), 150.0);
        assert_eq!(wrapped.z(), 460.0);
        assert_eq!(wrapped.rx(), 350.0);
        assert_eq!(wrapped.ry(), 10.0);
    }

    #[test]
    fn axis_map_default_live_round_trip() {
        let map = AxisMap::default_live();
        let inv = map.inverse();
        let pose = Pose::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let round = inv.apply(map.apply(pose));
        for i in 0..6 {
            assert!((round.0[i] - pose.0[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn axis_map_rejects_cross_half_mapping() {
        let err = AxisMap::from_spec(["rx", "y", "z", "x", "ry", "rz"]).unwrap_err();
        assert_eq!(err, AxisMapError::CrossHalfMapping("rx".to_string()));
    }

    #[test]
    fn axis_map_rejects_non_permutation() {
        let err = AxisMap::from_spec(["x", "x", "z", "rx", "ry", "rz"]).unwrap_err();
        assert_eq!(err, AxisMapError::NotAPositionalPermutation);
    }

    #[test]
    fn target_message_deserialises_wire_format() {
        let json = r#"{"pos":{"x":1.0,"y":2.0,"z":3.0},"ori":{"x":0.1,"y":0.2,"z":0.3},"pad":{"b0":true},"time":12.5}"#;
        let msg: TargetMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.pos.x, 1.0);
        assert!(msg.pad.b0);
        assert!(!msg.pad.b_a);
        assert_eq!(msg.time, 12.5);
    }

    #[test]
    fn pose_series_rejects_empty() {
        assert_eq!(PoseSeries::new(Vec::new()).unwrap_err(), PoseSeriesError::Empty);
    }

    proptest::proptest! {
        #[test]
        fn wrap360_always_in_range(theta in -1.0e6_f64..1.0e6_f64) {
            let w = wrap360(theta);
            proptest::prop_assert!(w >= 0.0 && w < 360.0);
        }

        #[test]
        fn wrap180_always_in_range(theta in -1.0e6_f64..1.0e6_f64) {
            let w = wrap180(theta);
            proptest::prop_assert!(w >= -180.0 && w < 180.0);
        }

        #[test]
        fn wrap180_periodic_prop(theta in -1.0e4_f64..1.0e4_f64, k in -100_i32..100) {
            let shifted = theta + 360.0 * k as f64;
            proptest::prop_assert!((wrap180(shifted) - wrap180(theta)).abs() < 1e-6);
        }
    }
}
