use crate::{GtuId, LaneId, LinkId};
use std::fmt;

/// An error raised by the [Parameters](crate::Parameters) store.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterError {
    /// The parameter is not set and its type defines no default.
    Missing { id: &'static str },
    /// The value failed one of the parameter type's constraints.
    ConstraintViolated {
        id: &'static str,
        value: f64,
        constraint: &'static str,
    },
    /// A reset was requested for a parameter that was not set as resettable.
    NotResettable { id: &'static str },
}

/// An error raised while generating or building an operational plan.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanError {
    /// The lanes ahead are too short to hold the path the plan needs.
    PathTooShort { required: f64, available: f64 },
    /// A perception category needed by the planner is not configured.
    MissingPerception(&'static str),
    /// The GTU is not registered on any lane.
    NotOnNetwork(GtuId),
    /// The GTU has no tactical planner.
    NoPlanner(GtuId),
    Parameter(ParameterError),
    Network(NetworkError),
}

/// A broken invariant of the lane topology.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkError {
    UnknownLane(LaneId),
    UnknownLink(LinkId),
    /// A successor does not list the lane as its predecessor, or vice versa.
    AsymmetricConnection { from: LaneId, to: LaneId },
    /// A lane's left/right neighbour does not point back at it.
    AsymmetricAdjacency { lane: LaneId, other: LaneId },
    /// A lane is registered with a GTU that does not exist.
    DanglingRegistration { lane: LaneId, gtu: GtuId },
    /// No route connects the two links.
    NoRoute { from: LinkId, to: LinkId },
}

/// Any error raised by this crate.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Parameter(ParameterError),
    Plan(PlanError),
    Network(NetworkError),
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { id } => write!(f, "parameter {} is not set and has no default", id),
            Self::ConstraintViolated {
                id,
                value,
                constraint,
            } => write!(
                f,
                "value {} for parameter {} violates constraint: {}",
                value, id, constraint
            ),
            Self::NotResettable { id } => write!(f, "parameter {} has no value to reset to", id),
        }
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathTooShort {
                required,
                available,
            } => write!(
                f,
                "path of {:.3} m is required but only {:.3} m of lane is available",
                required, available
            ),
            Self::MissingPerception(category) => {
                write!(f, "perception category {} is not available", category)
            }
            Self::NotOnNetwork(gtu) => write!(f, "GTU {:?} is not registered on a lane", gtu),
            Self::NoPlanner(gtu) => write!(f, "GTU {:?} has no tactical planner", gtu),
            Self::Parameter(err) => err.fmt(f),
            Self::Network(err) => err.fmt(f),
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLane(lane) => write!(f, "lane {:?} does not exist", lane),
            Self::UnknownLink(link) => write!(f, "link {:?} does not exist", link),
            Self::AsymmetricConnection { from, to } => {
                write!(f, "connection {:?} -> {:?} is not symmetric", from, to)
            }
            Self::AsymmetricAdjacency { lane, other } => {
                write!(f, "lanes {:?} and {:?} are not mutually adjacent", lane, other)
            }
            Self::DanglingRegistration { lane, gtu } => {
                write!(f, "lane {:?} registers unknown GTU {:?}", lane, gtu)
            }
            Self::NoRoute { from, to } => write!(f, "no route from {:?} to {:?}", from, to),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter(err) => err.fmt(f),
            Self::Plan(err) => err.fmt(f),
            Self::Network(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ParameterError {}
impl std::error::Error for PlanError {}
impl std::error::Error for NetworkError {}
impl std::error::Error for Error {}

impl From<ParameterError> for PlanError {
    fn from(err: ParameterError) -> Self {
        Self::Parameter(err)
    }
}

impl From<NetworkError> for PlanError {
    fn from(err: NetworkError) -> Self {
        Self::Network(err)
    }
}

impl From<ParameterError> for Error {
    fn from(err: ParameterError) -> Self {
        Self::Parameter(err)
    }
}

impl From<NetworkError> for Error {
    fn from(err: NetworkError) -> Self {
        Self::Network(err)
    }
}

impl From<PlanError> for Error {
    fn from(err: PlanError) -> Self {
        // Unwrap nested errors so callers can match on the underlying concern
        match err {
            PlanError::Network(err) => Self::Network(err),
            PlanError::Parameter(err) => Self::Parameter(err),
            err => Self::Plan(err),
        }
    }
}
