use crate::float_types::{EPSILON, Real};
use crate::mesh::Mesh;
use hashbrown::HashMap;
use nalgebra::Point3;

impl Mesh {
    /// Checks if the mesh is a closed 2-manifold
    ///
    /// ### Returns
    /// Returns `true` if every edge appears exactly 2 times
    ///
    /// ### Notes:
    /// - Positions are quantized so that coincident but unwelded vertices
    ///   still count as the same edge endpoint.
    pub fn is_manifold(&self) -> bool {
        const QUANTIZATION_FACTOR: Real = 1e7;

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        struct QuantizedPoint(i64, i64, i64);

        fn quantize_point(p: &Point3<Real>) -> QuantizedPoint {
            QuantizedPoint(
                (p.x * QUANTIZATION_FACTOR).round() as i64,
                (p.y * QUANTIZATION_FACTOR).round() as i64,
                (p.z * QUANTIZATION_FACTOR).round() as i64,
            )
        }

        if self.faces.is_empty() {
            return false;
        }

        let mut edge_counts: HashMap<(QuantizedPoint, QuantizedPoint), u32> = HashMap::new();
        for f in &self.faces {
            for &(i0, i1) in &[(0, 1), (1, 2), (2, 0)] {
                let p0 = quantize_point(&self.vertices[f[i0]]);
                let p1 = quantize_point(&self.vertices[f[i1]]);
                let key = if p0 < p1 { (p0, p1) } else { (p1, p0) };
                *edge_counts.entry(key).or_insert(0) += 1;
            }
        }

        edge_counts.values().all(|&count| count == 2)
    }

    /// **Split T-junctions**
    ///
    /// BSP clipping cuts neighbouring fragments at different points, so after
    /// welding a vertex of one fragment can sit in the middle of an edge of
    /// another. Every face whose open edge passes through such a vertex is fanned
    /// from its opposite corner, which keeps the winding and the covered area.
    ///
    /// Returns the number of faces that were split.
    pub(crate) fn split_t_junctions(&mut self) -> usize {
        const MAX_PASSES: usize = 32;

        let mut by_x: Vec<usize> = (0..self.vertices.len()).collect();
        by_x.sort_by(|&i, &j| self.vertices[i].x.total_cmp(&self.vertices[j].x));

        let mut total = 0;
        for _ in 0..MAX_PASSES {
            let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
            for f in &self.faces {
                for i in 0..3 {
                    let (v1, v2) = (f[i], f[(i + 1) % 3]);
                    let edge = if v1 < v2 { (v1, v2) } else { (v2, v1) };
                    *edge_count.entry(edge).or_insert(0) += 1;
                }
            }
            if edge_count.values().all(|&count| count != 1) {
                break;
            }

            let mut faces = Vec::with_capacity(self.faces.len());
            let mut split = 0;
            for &f in &self.faces {
                let hit = (0..3).find_map(|i| {
                    let (a, b) = (f[i], f[(i + 1) % 3]);
                    let edge = if a < b { (a, b) } else { (b, a) };
                    if edge_count.get(&edge) != Some(&1) {
                        return None;
                    }
                    let inner = self.vertices_on_edge(&by_x, a, b);
                    (!inner.is_empty()).then_some((i, inner))
                });
                match hit {
                    Some((i, inner)) => {
                        let (a, b, c) = (f[i], f[(i + 1) % 3], f[(i + 2) % 3]);
                        let mut prev = a;
                        for v in inner.into_iter().chain(std::iter::once(b)) {
                            faces.push([prev, v, c]);
                            prev = v;
                        }
                        split += 1;
                    },
                    None => faces.push(f),
                }
            }
            self.faces = faces;
            if split == 0 {
                break;
            }
            total += split;
        }

        if total > 0 {
            self.normals = None;
        }
        total
    }

    /// Vertices lying strictly inside segment `a`-`b`, ordered from `a` to `b`.
    /// `by_x` holds every vertex index sorted by x coordinate.
    fn vertices_on_edge(&self, by_x: &[usize], a: usize, b: usize) -> Vec<usize> {
        let (pa, pb) = (self.vertices[a], self.vertices[b]);
        let d = pb - pa;
        let len_sq = d.norm_squared();
        if len_sq <= EPSILON * EPSILON {
            return Vec::new();
        }
        let len = len_sq.sqrt();
        let lo = pa.x.min(pb.x) - EPSILON;
        let hi = pa.x.max(pb.x) + EPSILON;

        let start = by_x.partition_point(|&i| self.vertices[i].x < lo);
        let mut hits: Vec<(Real, usize)> = by_x[start..]
            .iter()
            .take_while(|&&i| self.vertices[i].x <= hi)
            .filter(|&&i| i != a && i != b)
            .filter_map(|&i| {
                let p = self.vertices[i];
                let t = (p - pa).dot(&d) / len_sq;
                let along = t * len;
                if along <= EPSILON || along >= len - EPSILON {
                    return None;
                }
                ((pa + d * t - p).norm() <= EPSILON).then_some((t, i))
            })
            .collect();
        hits.sort_by(|x, y| x.0.total_cmp(&y.0));
        hits.into_iter().map(|(_, i)| i).collect()
    }
}
