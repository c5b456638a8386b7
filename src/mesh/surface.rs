//! Triangulated surface with named attributes.
//!
//! A [`Surface`] is a face-vertex triangle mesh (a 2-manifold with boundary)
//! carrying named point-data and cell-data arrays. Pipeline stages take a
//! surface by reference and return a new one with arrays appended; only
//! splitting produces a surface with a fresh point/cell index space.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::error::{MapError, Result};
use crate::mesh::attributes::AttributeSet;

/// A triangulated surface mesh with named point and cell attributes.
#[derive(Debug, Clone)]
pub struct Surface {
    points: Vec<Point3<f64>>,
    triangles: Vec<[usize; 3]>,
    point_data: AttributeSet,
    cell_data: AttributeSet,
}

impl Surface {
    /// Build a surface from points and triangles, checking index bounds.
    pub fn new(points: Vec<Point3<f64>>, triangles: Vec<[usize; 3]>) -> Result<Self> {
        for (t, tri) in triangles.iter().enumerate() {
            for &v in tri {
                if v >= points.len() {
                    return Err(MapError::InvalidPointIndex {
                        triangle: t,
                        point: v,
                    });
                }
            }
        }
        Ok(Self {
            points,
            triangles,
            point_data: AttributeSet::points(),
            cell_data: AttributeSet::cells(),
        })
    }

    /// Create an empty surface.
    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            triangles: Vec::new(),
            point_data: AttributeSet::points(),
            cell_data: AttributeSet::cells(),
        }
    }

    // ==================== Accessors ====================

    /// Number of points.
    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// True when the surface has no triangles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Position of a point.
    #[inline]
    pub fn point(&self, i: usize) -> &Point3<f64> {
        &self.points[i]
    }

    /// All point positions.
    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// A triangle's three point indices.
    #[inline]
    pub fn triangle(&self, t: usize) -> [usize; 3] {
        self.triangles[t]
    }

    /// All triangles.
    #[inline]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Point-attached attributes.
    #[inline]
    pub fn point_data(&self) -> &AttributeSet {
        &self.point_data
    }

    /// Mutable point-attached attributes.
    #[inline]
    pub fn point_data_mut(&mut self) -> &mut AttributeSet {
        &mut self.point_data
    }

    /// Cell-attached attributes.
    #[inline]
    pub fn cell_data(&self) -> &AttributeSet {
        &self.cell_data
    }

    /// Mutable cell-attached attributes.
    #[inline]
    pub fn cell_data_mut(&mut self) -> &mut AttributeSet {
        &mut self.cell_data
    }

    // ==================== Geometry ====================

    /// Area of a triangle.
    pub fn triangle_area(&self, t: usize) -> f64 {
        let [a, b, c] = self.triangles[t];
        let e1 = self.points[b] - self.points[a];
        let e2 = self.points[c] - self.points[a];
        0.5 * e1.cross(&e2).norm()
    }

    /// Centroid of a triangle.
    pub fn triangle_centroid(&self, t: usize) -> Point3<f64> {
        let [a, b, c] = self.triangles[t];
        Point3::from(
            (self.points[a].coords + self.points[b].coords + self.points[c].coords) / 3.0,
        )
    }

    /// Total surface area.
    pub fn surface_area(&self) -> f64 {
        (0..self.triangles.len()).map(|t| self.triangle_area(t)).sum()
    }

    // ==================== Topology ====================

    /// Unique vertex neighbors for every point, in ascending order.
    pub fn vertex_adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.points.len()];
        for tri in &self.triangles {
            for i in 0..3 {
                let a = tri[i];
                let b = tri[(i + 1) % 3];
                adjacency[a].push(b);
                adjacency[b].push(a);
            }
        }
        for list in &mut adjacency {
            list.sort_unstable();
            list.dedup();
        }
        adjacency
    }

    /// Count of adjacent triangles per undirected edge.
    fn edge_use_counts(&self) -> HashMap<(usize, usize), usize> {
        let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
        for tri in &self.triangles {
            for i in 0..3 {
                let a = tri[i];
                let b = tri[(i + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Extract the ordered open boundary loops of the surface.
    ///
    /// Each loop is a cyclic sequence of point indices, traversed opposite to
    /// the interior triangle winding. Fails on a non-manifold boundary
    /// (a vertex with more than one outgoing boundary edge) since such a
    /// boundary cannot serve as a mapping Dirichlet curve.
    pub fn boundary_loops(&self) -> Result<Vec<Vec<usize>>> {
        let counts = self.edge_use_counts();

        // Directed boundary edges, reversed relative to triangle winding.
        let mut next: HashMap<usize, usize> = HashMap::new();
        for tri in &self.triangles {
            for i in 0..3 {
                let a = tri[i];
                let b = tri[(i + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                if counts[&key] == 1 {
                    if next.insert(b, a).is_some() {
                        return Err(MapError::DegenerateGeometry(format!(
                            "non-manifold boundary at point {b}"
                        )));
                    }
                }
            }
        }

        let mut loops = Vec::new();
        let mut visited: HashMap<usize, bool> = next.keys().map(|&v| (v, false)).collect();

        let mut starts: Vec<usize> = next.keys().copied().collect();
        starts.sort_unstable();
        for start in starts {
            if visited[&start] {
                continue;
            }
            let mut ring = Vec::new();
            let mut v = start;
            loop {
                ring.push(v);
                visited.insert(v, true);
                v = match next.get(&v) {
                    Some(&w) => w,
                    None => {
                        return Err(MapError::DegenerateGeometry(format!(
                            "open boundary chain at point {v}"
                        )))
                    }
                };
                if v == start {
                    break;
                }
            }
            loops.push(ring);
        }
        Ok(loops)
    }

    /// Label each triangle with a connected component id (0-based, by
    /// discovery order). Triangles are connected when they share an edge.
    pub fn connected_components(&self) -> Vec<usize> {
        // Map each undirected edge to the triangles using it.
        let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (t, tri) in self.triangles.iter().enumerate() {
            for i in 0..3 {
                let a = tri[i];
                let b = tri[(i + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                edge_faces.entry(key).or_default().push(t);
            }
        }

        let mut labels = vec![usize::MAX; self.triangles.len()];
        let mut component = 0;
        let mut stack = Vec::new();
        for seed in 0..self.triangles.len() {
            if labels[seed] != usize::MAX {
                continue;
            }
            stack.push(seed);
            labels[seed] = component;
            while let Some(t) = stack.pop() {
                let tri = self.triangles[t];
                for i in 0..3 {
                    let a = tri[i];
                    let b = tri[(i + 1) % 3];
                    let key = if a < b { (a, b) } else { (b, a) };
                    for &other in &edge_faces[&key] {
                        if labels[other] == usize::MAX {
                            labels[other] = component;
                            stack.push(other);
                        }
                    }
                }
            }
            component += 1;
        }
        labels
    }

    /// Number of connected components.
    pub fn num_components(&self) -> usize {
        self.connected_components().iter().max().map_or(0, |m| m + 1)
    }

    // ==================== Extraction ====================

    /// Build a new surface from a subset of triangles, compacting the point
    /// array and subsetting every attribute array. Point and cell ids are not
    /// preserved.
    pub fn extract_triangles(&self, tri_indices: &[usize]) -> Surface {
        let mut point_map: HashMap<usize, usize> = HashMap::new();
        let mut point_order: Vec<usize> = Vec::new();
        let mut triangles = Vec::with_capacity(tri_indices.len());

        for &t in tri_indices {
            let tri = self.triangles[t];
            let mut mapped = [0usize; 3];
            for (k, &v) in tri.iter().enumerate() {
                let idx = *point_map.entry(v).or_insert_with(|| {
                    point_order.push(v);
                    point_order.len() - 1
                });
                mapped[k] = idx;
            }
            triangles.push(mapped);
        }

        let points = point_order.iter().map(|&i| self.points[i]).collect();

        Surface {
            points,
            triangles,
            point_data: self.point_data.subset(&point_order),
            cell_data: self.cell_data.subset(tri_indices),
        }
    }

    // ==================== Validation ====================

    /// Check structural invariants: triangle indices in bounds, attribute
    /// array lengths matching the point and cell counts.
    pub fn validate(&self) -> Result<()> {
        for (t, tri) in self.triangles.iter().enumerate() {
            for &v in tri {
                if v >= self.points.len() {
                    return Err(MapError::InvalidPointIndex {
                        triangle: t,
                        point: v,
                    });
                }
            }
        }
        self.point_data.validate_len(self.points.len())?;
        self.cell_data.validate_len(self.triangles.len())?;
        Ok(())
    }
}
