//! Hierarchical GTU types and lane compatibility.

use crate::GtuTypeId;
use slotmap::SlotMap;
use smallvec::SmallVec;

pub const ROAD_USER: &str = "ROAD_USER";
pub const VEHICLE: &str = "VEHICLE";
pub const CAR: &str = "CAR";
pub const TRUCK: &str = "TRUCK";
pub const BUS: &str = "BUS";
pub const VAN: &str = "VAN";
pub const EMERGENCY_VEHICLE: &str = "EMERGENCY_VEHICLE";
pub const BICYCLE: &str = "BICYCLE";
pub const PEDESTRIAN: &str = "PEDESTRIAN";

/// A named GTU type with an optional parent type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GtuType {
    pub name: String,
    pub parent: Option<GtuTypeId>,
}

/// The registry of GTU types.
#[derive(Clone, Debug, Default)]
pub struct GtuTypes {
    types: SlotMap<GtuTypeId, GtuType>,
}

impl GtuTypes {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a registry holding the standard road user hierarchy.
    pub fn with_defaults() -> Self {
        let mut types = Self::new();
        let road_user = types.insert(ROAD_USER, None);
        let vehicle = types.insert(VEHICLE, Some(road_user));
        for name in [CAR, TRUCK, BUS, VAN, EMERGENCY_VEHICLE] {
            types.insert(name, Some(vehicle));
        }
        types.insert(BICYCLE, Some(road_user));
        types.insert(PEDESTRIAN, Some(road_user));
        types
    }

    /// Registers a type, returning the existing ID if an equal type is already registered.
    pub fn insert(&mut self, name: &str, parent: Option<GtuTypeId>) -> GtuTypeId {
        let ty = GtuType {
            name: name.to_owned(),
            parent,
        };
        if let Some((id, _)) = self.types.iter().find(|(_, other)| **other == ty) {
            return id;
        }
        self.types.insert(ty)
    }

    /// Gets a type by ID.
    pub fn get(&self, id: GtuTypeId) -> Option<&GtuType> {
        self.types.get(id)
    }

    /// Finds a type by name.
    pub fn by_name(&self, name: &str) -> Option<GtuTypeId> {
        self.types
            .iter()
            .find(|(_, ty)| ty.name == name)
            .map(|(id, _)| id)
    }

    /// Whether `ty` is `ancestor` or descends from it.
    pub fn is_of_type(&self, ty: GtuTypeId, ancestor: GtuTypeId) -> bool {
        let mut current = Some(ty);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.types.get(id).and_then(|ty| ty.parent);
        }
        false
    }
}

/// The GTU types allowed to use a lane.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Compatibility {
    #[default]
    All,
    /// Only these types and their descendants.
    Only(SmallVec<[GtuTypeId; 4]>),
}

impl Compatibility {
    /// Whether the GTU type may use the lane.
    pub fn allows(&self, ty: GtuTypeId, types: &GtuTypes) -> bool {
        match self {
            Self::All => true,
            Self::Only(allowed) => allowed.iter().any(|a| types.is_of_type(ty, *a)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn type_hierarchy() {
        let types = GtuTypes::with_defaults();
        let car = types.by_name(CAR).unwrap();
        let vehicle = types.by_name(VEHICLE).unwrap();
        let road_user = types.by_name(ROAD_USER).unwrap();
        let bicycle = types.by_name(BICYCLE).unwrap();
        assert!(types.is_of_type(car, vehicle));
        assert!(types.is_of_type(car, road_user));
        assert!(!types.is_of_type(bicycle, vehicle));
        assert!(!types.is_of_type(vehicle, car));
    }

    #[test]
    fn insert_is_value_based() {
        let mut types = GtuTypes::with_defaults();
        let vehicle = types.by_name(VEHICLE);
        let car = types.by_name(CAR).unwrap();
        assert_eq!(types.insert(CAR, vehicle), car);
        assert_ne!(types.insert(CAR, None), car);
    }

    #[test]
    fn compatibility() {
        let types = GtuTypes::with_defaults();
        let vehicle = types.by_name(VEHICLE).unwrap();
        let truck = types.by_name(TRUCK).unwrap();
        let pedestrian = types.by_name(PEDESTRIAN).unwrap();
        let road = Compatibility::Only(smallvec![vehicle]);
        assert!(road.allows(truck, &types));
        assert!(!road.allows(pedestrian, &types));
        assert!(Compatibility::All.allows(pedestrian, &types));
    }
}
