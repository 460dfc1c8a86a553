//! The data model: `Container`, `Item`, `Placement`, `WasteEntry`, and the
//! `World` they live in.
//!
//! Constructors validate on the way in and return `CoreError::InvalidInput`
//! rather than panicking, mirroring the teacher's `Box3D::new` pattern.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;
use crate::geometry::{Aabb, Vec3};

fn validate_dimension(value: f64, name: &str) -> Result<(), CoreError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(CoreError::invalid_input(format!(
            "{name} must be positive, got {value}"
        )));
    }
    Ok(())
}

fn validate_mass(value: f64) -> Result<(), CoreError> {
    if value < 0.0 || value.is_nan() || value.is_infinite() {
        return Err(CoreError::invalid_input(format!(
            "mass must be non-negative, got {value}"
        )));
    }
    Ok(())
}

fn validate_priority(value: u8) -> Result<(), CoreError> {
    if value > 100 {
        return Err(CoreError::invalid_input(format!(
            "priority must be in [0,100], got {value}"
        )));
    }
    Ok(())
}

/// A rectangular storage container. Immutable after registration; its
/// interior is the half-open box `[0,W) x [0,D) x [0,H)`. By convention the
/// open face items enter and leave through is y = 0.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Container {
    pub id: String,
    pub zone: String,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl Container {
    pub fn new(
        id: impl Into<String>,
        zone: impl Into<String>,
        width: f64,
        depth: f64,
        height: f64,
    ) -> Result<Self, CoreError> {
        validate_dimension(width, "width")?;
        validate_dimension(depth, "depth")?;
        validate_dimension(height, "height")?;
        Ok(Self {
            id: id.into(),
            zone: zone.into(),
            width,
            depth,
            height,
        })
    }

    pub fn volume(&self) -> f64 {
        self.width * self.depth * self.height
    }

    /// The container's own bounding box, rooted at the origin.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_corner_and_dims(Vec3::zero(), (self.width, self.depth, self.height))
    }
}

/// A catalog item. Only the original `(w, d, h)` are authoritative; any
/// rotation belongs to a `Placement`, not the item itself.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    pub mass: f64,
    pub priority: u8,
    pub preferred_zone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<chrono::DateTime<chrono::Utc>>,
    pub usage_limit: u32,
}

impl Item {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        width: f64,
        depth: f64,
        height: f64,
        mass: f64,
        priority: u8,
        preferred_zone: impl Into<String>,
        expiry_date: Option<chrono::DateTime<chrono::Utc>>,
        usage_limit: u32,
    ) -> Result<Self, CoreError> {
        validate_dimension(width, "width")?;
        validate_dimension(depth, "depth")?;
        validate_dimension(height, "height")?;
        validate_mass(mass)?;
        validate_priority(priority)?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            width,
            depth,
            height,
            mass,
            priority,
            preferred_zone: preferred_zone.into(),
            expiry_date,
            usage_limit,
        })
    }

    pub fn volume(&self) -> f64 {
        self.width * self.depth * self.height
    }

    pub fn dims(&self) -> (f64, f64, f64) {
        (self.width, self.depth, self.height)
    }
}

/// One of the (<=6) axis-aligned permutations a box's catalog dimensions may
/// be placed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Orientation {
    /// (w, d, h) unchanged.
    Wdh,
    /// (w, h, d)
    Whd,
    /// (d, w, h)
    Dwh,
    /// (d, h, w)
    Dhw,
    /// (h, w, d)
    Hwd,
    /// (h, d, w)
    Hdw,
}

impl Orientation {
    pub const ALL: [Orientation; 6] = [
        Orientation::Wdh,
        Orientation::Whd,
        Orientation::Dwh,
        Orientation::Dhw,
        Orientation::Hwd,
        Orientation::Hdw,
    ];

    /// Permutes `(w, d, h)` according to this orientation.
    pub fn apply(&self, w: f64, d: f64, h: f64) -> (f64, f64, f64) {
        match self {
            Orientation::Wdh => (w, d, h),
            Orientation::Whd => (w, h, d),
            Orientation::Dwh => (d, w, h),
            Orientation::Dhw => (d, h, w),
            Orientation::Hwd => (h, w, d),
            Orientation::Hdw => (h, d, w),
        }
    }
}

/// An active placement of an item inside a container.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Placement {
    pub item_id: String,
    pub container_id: String,
    pub orientation: Orientation,
    pub min_corner: (f64, f64, f64),
    pub effective_dims: (f64, f64, f64),
}

impl Placement {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_corner_and_dims(Vec3::from_tuple(self.min_corner), self.effective_dims)
    }
}

/// The reason an item was routed to the waste manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum WasteReason {
    Expired,
    OutOfUses,
    Damaged,
    Manual,
}

/// An append-only waste-manifest row.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WasteEntry {
    pub item_id: String,
    pub name: String,
    pub reason: WasteReason,
    pub container_id: String,
    pub position: (f64, f64, f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_rejects_non_positive_dimension() {
        assert!(Container::new("C1", "Z", 0.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn item_rejects_out_of_range_priority() {
        let err = Item::new("I1", "widget", 1.0, 1.0, 1.0, 1.0, 101, "Z", None, 1);
        assert!(err.is_err());
    }

    #[test]
    fn item_rejects_negative_mass() {
        let err = Item::new("I1", "widget", 1.0, 1.0, 1.0, -1.0, 50, "Z", None, 1);
        assert!(err.is_err());
    }

    #[test]
    fn orientation_permutes_dims() {
        assert_eq!(Orientation::Hdw.apply(2.0, 3.0, 4.0), (4.0, 3.0, 2.0));
    }
}
