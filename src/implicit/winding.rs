//! Exact implicit field from the mesh's generalized winding number.

use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::implicit::bvh::TriangleBvh;
use crate::mesh::Mesh;
use nalgebra::Point3;

/// `-(w - 0.5)`: negative inside, positive outside, zero on the surface.
#[derive(Debug, Clone)]
pub struct WindingField {
    bvh: TriangleBvh,
    bounds: Aabb,
}

impl WindingField {
    /// Build the hierarchy and run one warm-up query at the origin so the
    /// far-field moments exist before sampling starts.
    pub fn new(mesh: &Mesh) -> Self {
        let field = WindingField {
            bvh: TriangleBvh::new(mesh),
            bounds: mesh.bounding_box(),
        };
        let warm_up = field.value(&Point3::origin());
        tracing::debug!(triangles = field.bvh.triangle_count(), warm_up, "built winding-number field");
        field
    }

    pub const fn bounds(&self) -> Aabb {
        self.bounds
    }

    #[inline]
    pub fn value(&self, p: &Point3<Real>) -> Real {
        -(self.bvh.winding_number(p) - 0.5)
    }
}
