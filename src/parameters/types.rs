//! The standard parameter types and their defaults.

use super::{Constraint::*, Dimension::*, ParameterType};

pub static A: ParameterType = ParameterType {
    id: "a",
    description: "Maximum (desired) car-following acceleration.",
    dimension: Acceleration,
    default: Some(1.25),
    constraints: &[Positive],
};

pub static B: ParameterType = ParameterType {
    id: "b",
    description: "Maximum comfortable car-following deceleration.",
    dimension: Acceleration,
    default: Some(2.09),
    constraints: &[Positive, GreaterThan(&B0), LessThan(&BCRIT)],
};

pub static B0: ParameterType = ParameterType {
    id: "b0",
    description: "Maximum adjustment deceleration, e.g. when speed limit drops.",
    dimension: Acceleration,
    default: Some(0.5),
    constraints: &[Positive, LessThan(&B)],
};

pub static BCRIT: ParameterType = ParameterType {
    id: "bCrit",
    description: "Maximum critical deceleration, e.g. stop for an amber light.",
    dimension: Acceleration,
    default: Some(3.5),
    constraints: &[Positive, GreaterThan(&B)],
};

pub static S0: ParameterType = ParameterType {
    id: "s0",
    description: "Stopping distance.",
    dimension: Length,
    default: Some(3.0),
    constraints: &[Positive],
};

pub static T: ParameterType = ParameterType {
    id: "T",
    description: "Current desired headway.",
    dimension: Duration,
    default: Some(1.2),
    constraints: &[Positive],
};

pub static TMIN: ParameterType = ParameterType {
    id: "Tmin",
    description: "Minimum desired headway, accepted during lane changes.",
    dimension: Duration,
    default: Some(0.56),
    constraints: &[Positive, LessThan(&TMAX)],
};

pub static TMAX: ParameterType = ParameterType {
    id: "Tmax",
    description: "Normal desired headway.",
    dimension: Duration,
    default: Some(1.2),
    constraints: &[Positive, GreaterThan(&TMIN)],
};

pub static TAU: ParameterType = ParameterType {
    id: "tau",
    description: "Headway relaxation time.",
    dimension: Duration,
    default: Some(25.0),
    constraints: &[Positive],
};

pub static DT: ParameterType = ParameterType {
    id: "dt",
    description: "Re-plan interval.",
    dimension: Duration,
    default: Some(0.5),
    constraints: &[Positive],
};

pub static LOOKAHEAD: ParameterType = ParameterType {
    id: "Look-ahead",
    description: "Distance ahead covered by perception.",
    dimension: Length,
    default: Some(295.0),
    constraints: &[Positive],
};

pub static LOOKBACK: ParameterType = ParameterType {
    id: "Look-back",
    description: "Distance behind covered by perception.",
    dimension: Length,
    default: Some(200.0),
    constraints: &[Positive],
};

pub static LOOKAHEAD_SPLITS: ParameterType = ParameterType {
    id: "Look-ahead splits",
    description: "Distance perceived beyond a split on lanes that leave the route.",
    dimension: Length,
    default: Some(100.0),
    constraints: &[Positive],
};

pub static T0: ParameterType = ParameterType {
    id: "t0",
    description: "Look-ahead time for mandatory lane changes.",
    dimension: Duration,
    default: Some(43.0),
    constraints: &[Positive],
};

pub static VCONG: ParameterType = ParameterType {
    id: "vCong",
    description: "Speed below which traffic is considered congested.",
    dimension: Speed,
    default: Some(60.0 / 3.6),
    constraints: &[Positive],
};

pub static LCDUR: ParameterType = ParameterType {
    id: "lcDur",
    description: "Regular lane change duration.",
    dimension: Duration,
    default: Some(3.0),
    constraints: &[Positive],
};

pub static FSPEED: ParameterType = ParameterType {
    id: "fSpeed",
    description: "Speed limit adherence factor.",
    dimension: Dimensionless,
    default: Some(1.0),
    constraints: &[Positive],
};

pub static DELTA: ParameterType = ParameterType {
    id: "delta",
    description: "Acceleration flattening exponent towards the desired speed.",
    dimension: Dimensionless,
    default: Some(4.0),
    constraints: &[Positive],
};

pub static DFREE: ParameterType = ParameterType {
    id: "dFree",
    description: "Free lane change desire threshold.",
    dimension: Dimensionless,
    default: Some(0.365),
    constraints: &[UnitInterval, LessThan(&DSYNC)],
};

pub static DSYNC: ParameterType = ParameterType {
    id: "dSync",
    description: "Synchronized lane change desire threshold.",
    dimension: Dimensionless,
    default: Some(0.577),
    constraints: &[UnitInterval, GreaterThan(&DFREE), LessThan(&DCOOP)],
};

pub static DCOOP: ParameterType = ParameterType {
    id: "dCoop",
    description: "Cooperative lane change desire threshold.",
    dimension: Dimensionless,
    default: Some(0.788),
    constraints: &[UnitInterval, GreaterThan(&DSYNC)],
};

pub static DLEFT: ParameterType = ParameterType {
    id: "dLeft",
    description: "Current total desire to change to the left.",
    dimension: Dimensionless,
    default: Some(0.0),
    constraints: &[],
};

pub static DRIGHT: ParameterType = ParameterType {
    id: "dRight",
    description: "Current total desire to change to the right.",
    dimension: Dimensionless,
    default: Some(0.0),
    constraints: &[],
};

pub static DLC: ParameterType = ParameterType {
    id: "dLaneChange",
    description: "Desire of the lane change in progress.",
    dimension: Dimensionless,
    default: Some(0.0),
    constraints: &[UnitInterval],
};

pub static LAMBDA_V: ParameterType = ParameterType {
    id: "lambdaV",
    description: "Weight of voluntary desire relative to mandatory desire.",
    dimension: Dimensionless,
    default: Some(1.0),
    constraints: &[PositiveZero],
};

pub static POLITENESS: ParameterType = ParameterType {
    id: "p",
    description: "Politeness towards followers in the target lane.",
    dimension: Dimensionless,
    default: Some(0.2),
    constraints: &[UnitInterval],
};

pub static KEEP_BIAS: ParameterType = ParameterType {
    id: "keepBias",
    description: "Desire to keep right when nothing argues against it.",
    dimension: Dimensionless,
    default: Some(0.4),
    constraints: &[PositiveZero],
};

pub static LC_MIN_GAP: ParameterType = ParameterType {
    id: "lcMinGap",
    description: "Minimum net gap to a leader or follower in the target lane.",
    dimension: Length,
    default: Some(2.0),
    constraints: &[PositiveZero],
};

/// All standard parameter types with their defaults.
pub static DEFAULTS: &[&ParameterType] = &[
    &A,
    &B,
    &B0,
    &BCRIT,
    &S0,
    &T,
    &TMIN,
    &TMAX,
    &TAU,
    &DT,
    &LOOKAHEAD,
    &LOOKBACK,
    &LOOKAHEAD_SPLITS,
    &T0,
    &VCONG,
    &LCDUR,
    &FSPEED,
    &DELTA,
    &DFREE,
    &DSYNC,
    &DCOOP,
    &DLEFT,
    &DRIGHT,
    &DLC,
    &LAMBDA_V,
    &POLITENESS,
    &KEEP_BIAS,
    &LC_MIN_GAP,
];
