//! Axis-aligned box algebra: containment, overlap, volume, and the
//! orientations of a box.
//!
//! Every overlap/containment test in this crate goes through the functions
//! here so that exactly one epsilon convention exists.

/// Numerical tolerance used by every overlap/containment comparison in the
/// crate. Fixed by the data model: placements within this distance on all
/// three axes are treated as touching, not overlapping.
pub const EPSILON: f64 = 1e-6;

/// A point in container-local space. Width maps to x, depth to y, height to z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    #[inline]
    pub const fn from_tuple(t: (f64, f64, f64)) -> Self {
        Self::new(t.0, t.1, t.2)
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// An axis-aligned box `[min.x, max.x) × [min.y, max.y) × [min.z, max.z)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Builds the box from a min-corner and effective dimensions, as used by
    /// a `Placement`.
    pub fn from_corner_and_dims(corner: Vec3, dims: (f64, f64, f64)) -> Self {
        Self {
            min: corner,
            max: Vec3::new(corner.x + dims.0, corner.y + dims.1, corner.z + dims.2),
        }
    }

    pub fn dims(&self) -> (f64, f64, f64) {
        (
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }

    pub fn volume(&self) -> f64 {
        let (w, d, h) = self.dims();
        w * d * h
    }
}

/// True iff the two boxes' interiors intersect under the epsilon rule: two
/// boxes touching at a shared face (within `EPSILON`) do not overlap.
pub fn overlap(a: &Aabb, b: &Aabb) -> bool {
    overlap_1d(a.min.x, a.max.x, b.min.x, b.max.x)
        && overlap_1d(a.min.y, a.max.y, b.min.y, b.max.y)
        && overlap_1d(a.min.z, a.max.z, b.min.z, b.max.z)
}

fn overlap_1d(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> bool {
    a_min < b_max - EPSILON && b_min < a_max - EPSILON
}

/// True iff `inner` lies fully inside `outer`, inclusive of the upper face
/// within `EPSILON`.
pub fn contains(outer: &Aabb, inner: &Aabb) -> bool {
    inner.min.x >= outer.min.x - EPSILON
        && inner.min.y >= outer.min.y - EPSILON
        && inner.min.z >= outer.min.z - EPSILON
        && inner.max.x <= outer.max.x + EPSILON
        && inner.max.y <= outer.max.y + EPSILON
        && inner.max.z <= outer.max.z + EPSILON
}

pub fn volume(b: &Aabb) -> f64 {
    b.volume()
}

/// The up-to-six axis-aligned permutations of `(w, d, h)`, deduplicated when
/// two or more dimensions tie (a cube has exactly one orientation, a box with
/// two equal extents has three).
pub fn orientations(w: f64, d: f64, h: f64) -> Vec<(f64, f64, f64)> {
    let perms: [(f64, f64, f64); 6] = [
        (w, d, h),
        (w, h, d),
        (d, w, h),
        (d, h, w),
        (h, w, d),
        (h, d, w),
    ];
    let mut out: Vec<(f64, f64, f64)> = Vec::with_capacity(6);
    for p in perms {
        let dup = out.iter().any(|&q: &(f64, f64, f64)| {
            (q.0 - p.0).abs() < EPSILON && (q.1 - p.1).abs() < EPSILON && (q.2 - p.2).abs() < EPSILON
        });
        if !dup {
            out.push(p);
        }
    }
    out
}

/// L-infinity (Chebyshev) distance between the closest points of two boxes;
/// 0 if they touch or overlap. Used by the placement planner's contact bonus.
pub fn linf_distance(a: &Aabb, b: &Aabb) -> f64 {
    let dx = axis_gap(a.min.x, a.max.x, b.min.x, b.max.x);
    let dy = axis_gap(a.min.y, a.max.y, b.min.y, b.max.y);
    let dz = axis_gap(a.min.z, a.max.z, b.min.z, b.max.z);
    dx.max(dy).max(dz)
}

fn axis_gap(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> f64 {
    if a_max < b_min {
        b_min - a_max
    } else if b_max < a_min {
        a_min - b_max
    } else {
        0.0
    }
}

/// True iff the x/z extents of two boxes overlap (ignoring y) — the
/// "extraction corridor" test the retrieval planner's blocker predicate uses.
pub fn xz_extents_overlap(a: &Aabb, b: &Aabb) -> bool {
    overlap_1d(a.min.x, a.max.x, b.min.x, b.max.x) && overlap_1d(a.min.z, a.max.z, b.min.z, b.max.z)
}
