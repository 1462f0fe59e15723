//! Binary Space Partitioning (BSP) tree implementation
//!
//! The algorithms live behind [`BspOps`] so the splitting strategy can be
//! swapped without touching the Boolean code.

pub mod node;
pub mod serial;
pub mod traits;

pub use node::Node;
pub use serial::SerialBspOps;
pub use traits::{BalancedSplittingStrategy, BspOps, SplittingPlaneStrategy};

use crate::mesh::polygon::Polygon;

impl Node {
    /// Creates a new BSP node from polygons
    pub fn from_polygons(polygons: &[Polygon]) -> Self {
        let mut node = Self::new();
        if !polygons.is_empty() {
            node.build(polygons);
        }
        node
    }

    /// Invert all polygons in the BSP tree
    pub fn invert(&mut self) {
        SerialBspOps::new().invert(self);
    }

    /// Recursively remove all polygons that are inside this BSP tree
    pub fn clip_polygons(&self, polygons: &[Polygon]) -> Vec<Polygon> {
        SerialBspOps::new().clip_polygons(self, polygons)
    }

    /// Remove all polygons in this BSP tree that are inside the other BSP tree
    pub fn clip_to(&mut self, bsp: &Node) {
        SerialBspOps::new().clip_to(self, bsp);
    }

    /// Return all polygons in this BSP tree
    pub fn all_polygons(&self) -> Vec<Polygon> {
        SerialBspOps::new().all_polygons(self)
    }

    /// Build a BSP tree from the given polygons
    pub fn build(&mut self, polygons: &[Polygon]) {
        SerialBspOps::new().build(self, polygons);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::vertex::Vertex;
    use nalgebra::Point3;

    fn tri(z: f64) -> Polygon {
        Polygon::new(vec![
            Vertex::new(Point3::new(0.0, 0.0, z)),
            Vertex::new(Point3::new(1.0, 0.0, z)),
            Vertex::new(Point3::new(0.0, 1.0, z)),
        ])
        .expect("valid triangle")
    }

    #[test]
    fn build_keeps_every_polygon() {
        let polys = vec![tri(0.0), tri(1.0), tri(-1.0)];
        let node = Node::from_polygons(&polys);
        assert_eq!(node.all_polygons().len(), 3);
    }

    #[test]
    fn invert_twice_is_identity() {
        let polys = vec![tri(0.0), tri(2.0)];
        let mut node = Node::from_polygons(&polys);
        let before: Vec<_> = node.all_polygons().iter().map(|p| p.plane.normal).collect();
        node.invert();
        node.invert();
        let after: Vec<_> = node.all_polygons().iter().map(|p| p.plane.normal).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn clip_drops_polygons_behind_single_plane() {
        let node = Node::from_polygons(&[tri(0.0)]);
        // Plane normal is +z: polygons below z=0 are "inside"
        let kept = node.clip_polygons(&[tri(1.0), tri(-1.0)]);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].vertices.iter().all(|v| v.pos.z > 0.0));
    }
}
