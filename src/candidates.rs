//! Extreme-point candidate position generator (§4.C in the planning notes):
//! given an incoming box and the boxes already placed in a container,
//! enumerate the finite set of min-corner positions worth trying.

use crate::geometry::{self, Aabb, Vec3};

/// Seed origin plus the three "right/behind/above" corners of every placed
/// box, filtered to candidates whose box would still fit inside the
/// container and deduplicated. Iterative, not recursive — there is no
/// subdivision to recurse into.
pub fn extreme_points(
    dims: (f64, f64, f64),
    container_bounds: &Aabb,
    placed: &[Aabb],
) -> Vec<Vec3> {
    let mut seeds = Vec::with_capacity(1 + placed.len() * 3);
    seeds.push(Vec3::zero());
    for b in placed {
        seeds.push(Vec3::new(b.max.x, b.min.y, b.min.z));
        seeds.push(Vec3::new(b.min.x, b.max.y, b.min.z));
        seeds.push(Vec3::new(b.min.x, b.min.y, b.max.z));
    }

    let mut out: Vec<Vec3> = Vec::with_capacity(seeds.len());
    for corner in seeds {
        let candidate = Aabb::from_corner_and_dims(corner, dims);
        if !geometry::contains(container_bounds, &candidate) {
            continue;
        }
        let dup = out.iter().any(|p: &Vec3| {
            (p.x - corner.x).abs() < geometry::EPSILON
                && (p.y - corner.y).abs() < geometry::EPSILON
                && (p.z - corner.z).abs() < geometry::EPSILON
        });
        if !dup {
            out.push(corner);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(w: f64, d: f64, h: f64) -> Aabb {
        Aabb::from_corner_and_dims(Vec3::zero(), (w, d, h))
    }

    #[test]
    fn empty_container_yields_only_origin() {
        let c = container(10.0, 10.0, 10.0);
        let pts = extreme_points((2.0, 2.0, 2.0), &c, &[]);
        assert_eq!(pts, vec![Vec3::zero()]);
    }

    #[test]
    fn one_placed_box_yields_origin_plus_three_corners() {
        let c = container(10.0, 10.0, 10.0);
        let placed = Aabb::from_corner_and_dims(Vec3::zero(), (2.0, 2.0, 2.0));
        let pts = extreme_points((2.0, 2.0, 2.0), &c, &[placed]);
        assert_eq!(pts.len(), 4);
        assert!(pts.contains(&Vec3::new(2.0, 0.0, 0.0)));
        assert!(pts.contains(&Vec3::new(0.0, 2.0, 0.0)));
        assert!(pts.contains(&Vec3::new(0.0, 0.0, 2.0)));
    }

    #[test]
    fn candidates_that_escape_the_container_are_discarded() {
        let c = container(3.0, 3.0, 3.0);
        let placed = Aabb::from_corner_and_dims(Vec3::zero(), (2.0, 2.0, 2.0));
        let pts = extreme_points((2.0, 2.0, 2.0), &c, &[placed]);
        // (2,0,0)+(2,2,2) escapes x=3 (4 > 3); likewise the other two corners.
        assert!(pts.is_empty());
    }

    #[test]
    fn duplicate_corners_from_aligned_boxes_are_deduplicated() {
        let c = container(20.0, 20.0, 20.0);
        let a = Aabb::from_corner_and_dims(Vec3::new(0.0, 0.0, 0.0), (2.0, 2.0, 2.0));
        let b = Aabb::from_corner_and_dims(Vec3::new(0.0, 0.0, 2.0), (2.0, 2.0, 2.0));
        let pts = extreme_points((2.0, 2.0, 2.0), &c, &[a, b]);
        let count_at_0_0_4 = pts
            .iter()
            .filter(|p| (p.x - 0.0).abs() < 1e-9 && (p.y - 0.0).abs() < 1e-9 && (p.z - 4.0).abs() < 1e-9)
            .count();
        assert_eq!(count_at_0_0_4, 1);
    }
}
