//! Axis-aligned bounding box helpers on top of parry's [`Aabb`].

use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::Aabb;
use nalgebra::{Point3, Vector3};

/// Convenience queries the mesher and implicit builders need on bounds.
pub trait AabbExt {
    /// Smallest box containing every point, or `None` for an empty iterator.
    fn from_point_iter<'a, I: IntoIterator<Item = &'a Point3<Real>>>(points: I) -> Option<Aabb>;

    /// Largest edge length of the box.
    fn max_dim(&self) -> Real;

    /// Box grown by `amount` on every side.
    fn expanded(&self, amount: Real) -> Aabb;

    /// True when the box has no usable volume to sample.
    fn is_degenerate(&self) -> bool;

    /// Euclidean distance from `p` to the box; zero inside.
    fn distance_to(&self, p: &Point3<Real>) -> Real;
}

impl AabbExt for Aabb {
    fn from_point_iter<'a, I: IntoIterator<Item = &'a Point3<Real>>>(points: I) -> Option<Aabb> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mins, maxs) = iter.fold((*first, *first), |(mins, maxs), p| {
            (mins.inf(p), maxs.sup(p))
        });
        Some(Aabb::new(mins, maxs))
    }

    #[inline]
    fn max_dim(&self) -> Real {
        let e = self.maxs - self.mins;
        e.x.max(e.y).max(e.z)
    }

    #[inline]
    fn expanded(&self, amount: Real) -> Aabb {
        let d = Vector3::repeat(amount);
        Aabb::new(self.mins - d, self.maxs + d)
    }

    #[inline]
    fn is_degenerate(&self) -> bool {
        let m = self.max_dim();
        !m.is_finite() || m <= Real::EPSILON
    }

    fn distance_to(&self, p: &Point3<Real>) -> Real {
        let clamped = p.coords.sup(&self.mins.coords).inf(&self.maxs.coords);
        (p.coords - clamped).norm()
    }
}

/// A zero-volume box at the origin, used for empty or degenerate inputs.
pub fn degenerate() -> Aabb {
    Aabb::new(Point3::origin(), Point3::origin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_dim_and_expand() {
        let bb = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 3.0, 2.0));
        assert_eq!(bb.max_dim(), 3.0);
        let e = bb.expanded(0.5);
        assert_eq!(e.mins, Point3::new(-0.5, -0.5, -0.5));
        assert_eq!(e.maxs, Point3::new(1.5, 3.5, 2.5));
    }

    #[test]
    fn degenerate_detection() {
        assert!(degenerate().is_degenerate());
        let flat = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0));
        assert!(!flat.is_degenerate());
    }

    #[test]
    fn distance_outside_box() {
        let bb = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(bb.distance_to(&Point3::new(0.5, 0.5, 0.5)), 0.0);
        assert!((bb.distance_to(&Point3::new(3.0, 0.5, 0.5)) - 2.0).abs() < 1e-12);
    }
}
