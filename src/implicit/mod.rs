//! Bounded implicit functions built from meshes and composed with Boolean combinators.
//!
//! A field is negative inside the solid, positive outside and zero on the
//! boundary. Combinators are evaluated lazily per query; nothing is
//! materialized beyond the leaf representations.

pub mod bvh;
pub mod grid;
pub mod winding;

use crate::aabb::{self, AabbExt};
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::mesh::Mesh;
use nalgebra::Point3;

pub use grid::DistanceGrid;
pub use winding::WindingField;

/// A scalar field over 3D space plus the box outside which it is not sampled.
#[derive(Debug, Clone)]
pub enum ImplicitFunction {
    /// Exact winding-number field
    Winding(WindingField),
    /// Approximate trilinear signed-distance grid
    Grid(DistanceGrid),
    /// Minimum of the children
    Union(Vec<ImplicitFunction>),
    /// Maximum of the children
    Intersection(Vec<ImplicitFunction>),
    /// `minuend` with the union of `subtrahends` removed
    Difference {
        minuend: Box<ImplicitFunction>,
        subtrahends: Vec<ImplicitFunction>,
    },
}

impl ImplicitFunction {
    pub fn value(&self, p: &Point3<Real>) -> Real {
        match self {
            ImplicitFunction::Winding(field) => field.value(p),
            ImplicitFunction::Grid(grid) => grid.value(p),
            ImplicitFunction::Union(children) => {
                children.iter().map(|c| c.value(p)).fold(Real::INFINITY, Real::min)
            },
            ImplicitFunction::Intersection(children) => {
                children.iter().map(|c| c.value(p)).fold(Real::NEG_INFINITY, Real::max)
            },
            ImplicitFunction::Difference { minuend, subtrahends } => {
                let removed = subtrahends
                    .iter()
                    .map(|c| c.value(p))
                    .fold(Real::INFINITY, Real::min);
                minuend.value(p).max(-removed)
            },
        }
    }

    /// Bounds computed structurally from the children.
    pub fn bounds(&self) -> Aabb {
        match self {
            ImplicitFunction::Winding(field) => field.bounds(),
            ImplicitFunction::Grid(grid) => grid.bounds(),
            ImplicitFunction::Union(children) => merge_all(children.iter().map(|c| c.bounds())),
            ImplicitFunction::Intersection(children) => children
                .iter()
                .map(|c| c.bounds())
                .reduce(|a, b| a.intersection(&b).unwrap_or_else(aabb::degenerate))
                .unwrap_or_else(aabb::degenerate),
            ImplicitFunction::Difference { minuend, subtrahends } => merge_all(
                std::iter::once(minuend.bounds()).chain(subtrahends.iter().map(|c| c.bounds())),
            ),
        }
    }

    /// N-ary union; a single child is returned as-is.
    pub fn union(mut children: Vec<ImplicitFunction>) -> ImplicitFunction {
        if children.len() == 1 {
            children.remove(0)
        } else {
            ImplicitFunction::Union(children)
        }
    }

    /// N-ary intersection; a single child is returned as-is.
    pub fn intersection(mut children: Vec<ImplicitFunction>) -> ImplicitFunction {
        if children.len() == 1 {
            children.remove(0)
        } else {
            ImplicitFunction::Intersection(children)
        }
    }

    /// `minuend` minus the union of `subtrahends`.
    pub fn difference(minuend: ImplicitFunction, subtrahends: Vec<ImplicitFunction>) -> ImplicitFunction {
        if subtrahends.is_empty() {
            return minuend;
        }
        ImplicitFunction::Difference {
            minuend: Box::new(minuend),
            subtrahends,
        }
    }
}

fn merge_all(boxes: impl Iterator<Item = Aabb>) -> Aabb {
    boxes
        .filter(|b| !b.is_degenerate())
        .reduce(|a, b| Aabb::new(a.mins.inf(&b.mins), a.maxs.sup(&b.maxs)))
        .unwrap_or_else(aabb::degenerate)
}

/// Turn an already transformed mesh into a bounded implicit function.
///
/// `exact` selects the winding-number field; otherwise a signed-distance grid
/// with cell size `max_dim / cell_count_hint` is sampled. Zero-extent meshes
/// never divide by their max dimension and yield degenerate bounds.
pub fn build(mesh: &Mesh, exact: bool, cell_count_hint: u32) -> ImplicitFunction {
    if exact {
        return ImplicitFunction::Winding(WindingField::new(mesh));
    }
    let bounds = mesh.bounding_box();
    let cell_size = if bounds.is_degenerate() || cell_count_hint == 0 {
        0.0
    } else {
        bounds.max_dim() / cell_count_hint as Real
    };
    ImplicitFunction::Grid(DistanceGrid::new(mesh, cell_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix4, Vector3};

    fn pair(exact: bool) -> (ImplicitFunction, ImplicitFunction) {
        let a = Mesh::cube(1.0);
        let b = a.transformed(&Matrix4::new_translation(&Vector3::new(0.5, 0.0, 0.0)));
        (build(&a, exact, 16), build(&b, exact, 16))
    }

    #[test]
    fn combinator_signs() {
        for exact in [true, false] {
            let (a, b) = pair(exact);
            let only_a = Point3::new(0.25, 0.5, 0.5);
            let both = Point3::new(0.75, 0.5, 0.5);
            let only_b = Point3::new(1.25, 0.5, 0.5);

            let u = ImplicitFunction::union(vec![a.clone(), b.clone()]);
            assert!(u.value(&only_a) < 0.0 && u.value(&both) < 0.0 && u.value(&only_b) < 0.0);

            let i = ImplicitFunction::intersection(vec![a.clone(), b.clone()]);
            assert!(i.value(&only_a) > 0.0 && i.value(&both) < 0.0 && i.value(&only_b) > 0.0);

            let d = ImplicitFunction::difference(a, vec![b]);
            assert!(d.value(&only_a) < 0.0 && d.value(&both) > 0.0 && d.value(&only_b) > 0.0);
        }
    }

    #[test]
    fn structural_bounds() {
        let (a, b) = pair(true);
        let u = ImplicitFunction::union(vec![a.clone(), b.clone()]).bounds();
        assert_eq!((u.mins.x, u.maxs.x), (0.0, 1.5));
        let i = ImplicitFunction::intersection(vec![a.clone(), b.clone()]).bounds();
        assert_eq!((i.mins.x, i.maxs.x), (0.5, 1.0));
        let d = ImplicitFunction::difference(a, vec![b]).bounds();
        assert_eq!((d.mins.x, d.maxs.x), (0.0, 1.5));
    }

    #[test]
    fn degenerate_mesh_never_divides_by_zero() {
        let dot = Mesh::new(vec![Point3::origin(); 3], vec![[0, 1, 2]]).expect("valid");
        let f = build(&dot, false, 64);
        assert!(f.bounds().is_degenerate());
        assert!(f.value(&Point3::new(1.0, 0.0, 0.0)).is_finite());
    }
}
