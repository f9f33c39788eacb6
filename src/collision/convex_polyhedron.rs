//! Convex polyhedron shape built on a shared half-edge mesh.

use std::sync::Arc;

use glam::DVec3;

use super::narrowphase::GjkAlgorithm;
use super::queries::{RaycastHit, RaycastQuery};
use super::shapes::{box_inertia, SupportHint, SupportMap};
use crate::{
    config::{NarrowPhaseConfig, DEFAULT_OBJECT_MARGIN},
    core::{
        half_edge::{HalfEdge, HalfEdgeFace, HalfEdgeVertex},
        mesh::{Aabb, PolyhedronMesh},
        Matrix3,
    },
    error::{CollisionError, Result},
};

const PARALLEL_RAY_EPSILON: f64 = 1e-12;

/// Convex polyhedron instance: a shared mesh plus per-instance scaling and margin.
///
/// Cloning a shape clones the `Arc`, never the half-edge structure.
#[derive(Debug, Clone)]
pub struct ConvexPolyhedronShape {
    mesh: Arc<PolyhedronMesh>,
    scaling: DVec3,
    margin: f64,
    bounds: Aabb,
    edge_hill_climbing: bool,
}

impl ConvexPolyhedronShape {
    pub fn new(mesh: Arc<PolyhedronMesh>) -> Self {
        let mut shape = Self {
            mesh,
            scaling: DVec3::ONE,
            margin: DEFAULT_OBJECT_MARGIN,
            bounds: Aabb::empty(),
            edge_hill_climbing: false,
        };
        shape.compute_local_bounds();
        shape
    }

    /// Replaces the collision margin; negative values are clamped to zero.
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin.max(0.0);
        self.compute_local_bounds();
        self
    }

    /// Walk vertex adjacency instead of scanning every vertex for support queries.
    pub fn set_edge_hill_climbing(&mut self, enabled: bool) {
        self.edge_hill_climbing = enabled;
    }

    pub fn is_edge_hill_climbing(&self) -> bool {
        self.edge_hill_climbing
    }

    pub fn mesh(&self) -> &Arc<PolyhedronMesh> {
        &self.mesh
    }

    pub fn local_scaling(&self) -> DVec3 {
        self.scaling
    }

    pub fn set_local_scaling(&mut self, scaling: DVec3) -> Result<()> {
        if !scaling.is_finite() || scaling.cmple(DVec3::ZERO).any() {
            return Err(CollisionError::InvalidScaling {
                x: scaling.x,
                y: scaling.y,
                z: scaling.z,
            });
        }
        self.scaling = scaling;
        self.compute_local_bounds();
        Ok(())
    }

    /// Rescans the scaled vertices, caches the margin-inflated bounds and returns them.
    pub fn compute_local_bounds(&mut self) -> Aabb {
        self.bounds = Aabb::from_points(self.mesh.vertices().iter().map(|v| *v * self.scaling))
            .inflate(self.margin);
        self.bounds
    }

    /// Farthest point along `direction`, optionally inflated by the margin.
    pub fn support_point(&self, direction: DVec3, use_margin: bool) -> Result<DVec3> {
        self.local_support_point(direction, use_margin, &mut SupportHint::default())
    }

    /// Whether `point` (local space) lies inside the margin-inflated polyhedron.
    /// Points on the surface count as inside.
    pub fn test_point_inside(&self, point: DVec3) -> Result<bool> {
        GjkAlgorithm::test_point_inside(self, point, &NarrowPhaseConfig::default())
    }

    /// Clips the ray against every face plane of the scaled polyhedron.
    ///
    /// Works in local space and ignores the margin. A ray starting inside the
    /// polyhedron reports no hit.
    pub fn raycast(&self, query: &RaycastQuery) -> Option<RaycastHit> {
        let mut t_enter = 0.0;
        let mut t_exit = query.max_distance;
        let mut enter_normal = None;

        for face in 0..self.nb_faces() {
            let normal = self.face_normal(face);
            let anchor = self.vertex_position(self.mesh.structure().face_vertices(face).next()?);
            let denom = normal.dot(query.direction);
            let dist = normal.dot(anchor - query.origin);

            if denom.abs() < PARALLEL_RAY_EPSILON {
                if dist < 0.0 {
                    return None;
                }
                continue;
            }

            let t = dist / denom;
            if denom < 0.0 {
                if t > t_enter {
                    t_enter = t;
                    enter_normal = Some(normal);
                }
            } else if t < t_exit {
                t_exit = t;
            }

            if t_enter > t_exit {
                return None;
            }
        }

        let normal = enter_normal?;
        Some(RaycastHit {
            point: query.origin + query.direction * t_enter,
            normal,
            distance: t_enter,
        })
    }

    pub fn nb_vertices(&self) -> usize {
        self.mesh.nb_vertices()
    }

    pub fn nb_faces(&self) -> usize {
        self.mesh.nb_faces()
    }

    pub fn nb_half_edges(&self) -> usize {
        self.mesh.structure().nb_half_edges()
    }

    pub fn vertex(&self, index: usize) -> &HalfEdgeVertex {
        self.mesh.structure().vertex(index)
    }

    pub fn face(&self, index: usize) -> &HalfEdgeFace {
        self.mesh.structure().face(index)
    }

    pub fn half_edge(&self, index: usize) -> &HalfEdge {
        self.mesh.structure().half_edge(index)
    }

    /// Scaled local position of a vertex.
    pub fn vertex_position(&self, index: usize) -> DVec3 {
        self.mesh.vertex(index) * self.scaling
    }

    /// Outward unit normal of a face under the current scaling.
    pub fn face_normal(&self, face: usize) -> DVec3 {
        (self.mesh.face_normal(face) / self.scaling).normalize()
    }

    /// Bytes used by this instance, excluding the shared mesh.
    pub fn size_in_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
    }

    fn argmax_scan(&self, direction: DVec3) -> usize {
        let mut best = 0;
        let mut best_dot = f64::NEG_INFINITY;
        for (index, vertex) in self.mesh.vertices().iter().enumerate() {
            let dot = vertex.dot(direction);
            if dot > best_dot {
                best_dot = dot;
                best = index;
            }
        }
        best
    }

    fn argmax_hill_climb(&self, direction: DVec3, start: usize) -> usize {
        let structure = self.mesh.structure();
        let mut current = start.min(self.nb_vertices() - 1);
        let mut current_dot = self.mesh.vertex(current).dot(direction);
        // Strict improvement on a convex hull cannot revisit a vertex.
        for _ in 0..self.nb_vertices() {
            let mut improved = false;
            for neighbor in structure.vertex_neighbors(current) {
                let dot = self.mesh.vertex(neighbor).dot(direction);
                if dot > current_dot {
                    current = neighbor;
                    current_dot = dot;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }
        current
    }
}

impl SupportMap for ConvexPolyhedronShape {
    fn local_support_point_without_margin(&self, direction: DVec3, hint: &mut SupportHint) -> DVec3 {
        // argmax over scaled vertices of v*s . d equals argmax of v . (d*s)
        let scaled_direction = direction * self.scaling;
        let index = if self.edge_hill_climbing {
            self.argmax_hill_climb(scaled_direction, hint.vertex.unwrap_or(0))
        } else {
            self.argmax_scan(scaled_direction)
        };
        hint.vertex = Some(index);
        self.vertex_position(index)
    }

    fn margin(&self) -> f64 {
        self.margin
    }

    fn local_bounds(&self) -> Aabb {
        self.bounds
    }

    /// Bounding-box approximation of the inertia tensor, over the
    /// margin-inflated bounds.
    fn local_inertia_tensor(&self, mass: f64) -> Result<Matrix3> {
        box_inertia(mass, self.bounds.extent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube(half: f64) -> ConvexPolyhedronShape {
        let mesh = PolyhedronMesh::cuboid(DVec3::splat(half)).expect("cube cooks");
        ConvexPolyhedronShape::new(Arc::new(mesh)).with_margin(0.0)
    }

    #[test]
    fn support_reaches_the_extreme_face() {
        let shape = cube(1.0);
        let p = shape.support_point(DVec3::X, false).unwrap();
        assert_relative_eq!(p.x, 1.0);
    }

    #[test]
    fn hill_climb_matches_linear_scan() {
        let mut climbing = cube(1.0);
        climbing.set_local_scaling(DVec3::new(2.0, 0.5, 1.0)).unwrap();
        let scanning = climbing.clone();
        climbing.set_edge_hill_climbing(true);

        let mut hint = SupportHint::default();
        for i in 0..32 {
            let angle = i as f64 * 0.37;
            let dir = DVec3::new(angle.cos(), (angle * 1.7).sin(), angle.sin() - 0.3);
            let a = climbing.local_support_point(dir, false, &mut hint).unwrap();
            let b = scanning.support_point(dir, false).unwrap();
            assert_relative_eq!(a.dot(dir), b.dot(dir), epsilon = 1e-12);
        }
    }

    #[test]
    fn scaling_updates_bounds() {
        let mut shape = cube(1.0).with_margin(0.1);
        shape.set_local_scaling(DVec3::new(2.0, 1.0, 3.0)).unwrap();
        let bounds = shape.local_bounds();
        assert_relative_eq!(bounds.max.x, 2.1, epsilon = 1e-12);
        assert_relative_eq!(bounds.min.z, -3.1, epsilon = 1e-12);
    }

    #[test]
    fn non_positive_scaling_is_rejected() {
        let mut shape = cube(1.0);
        assert!(matches!(
            shape.set_local_scaling(DVec3::new(1.0, 0.0, 1.0)),
            Err(CollisionError::InvalidScaling { .. })
        ));
        assert_eq!(shape.local_scaling(), DVec3::ONE);
    }

    #[test]
    fn inertia_uses_bounding_box_proxy() {
        let shape = cube(1.0);
        let inertia = shape.local_inertia_tensor(6.0).unwrap();
        assert_relative_eq!(inertia.get(0, 0), 4.0, epsilon = 1e-12);
        assert_relative_eq!(inertia.get(1, 1), 4.0, epsilon = 1e-12);
        assert_relative_eq!(inertia.get(1, 2), 0.0);
    }

    #[test]
    fn flat_polyhedron_has_no_inertia() {
        let vertices = vec![
            DVec3::new(-1.0, -1.0, 0.0),
            DVec3::new(1.0, -1.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(-1.0, 1.0, 0.0),
        ];
        let faces = vec![vec![0, 1, 2, 3], vec![3, 2, 1, 0]];
        let mesh = PolyhedronMesh::builder(vertices, faces).build().expect("two-sided quad");
        let shape = ConvexPolyhedronShape::new(Arc::new(mesh)).with_margin(0.0);
        assert!(matches!(
            shape.local_inertia_tensor(1.0),
            Err(CollisionError::NonPositiveExtent { axis: 2, .. })
        ));
    }

    #[test]
    fn ray_hits_the_near_face() {
        let shape = cube(1.0);
        let query = RaycastQuery::new(DVec3::new(-5.0, 0.2, 0.0), DVec3::X, 100.0);
        let hit = shape.raycast(&query).expect("ray should hit");
        assert_relative_eq!(hit.distance, 4.0, epsilon = 1e-12);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn ray_from_inside_or_beyond_range_misses() {
        let shape = cube(1.0);
        assert!(shape
            .raycast(&RaycastQuery::new(DVec3::ZERO, DVec3::X, 100.0))
            .is_none());
        assert!(shape
            .raycast(&RaycastQuery::new(DVec3::new(-5.0, 0.0, 0.0), DVec3::X, 3.0))
            .is_none());
        assert!(shape
            .raycast(&RaycastQuery::new(DVec3::new(-5.0, 3.0, 0.0), DVec3::X, 100.0))
            .is_none());
    }

    #[test]
    fn points_inside_and_outside() {
        let shape = cube(1.0);
        assert!(shape.test_point_inside(DVec3::new(0.3, -0.6, 0.75)).unwrap());
        assert!(!shape.test_point_inside(DVec3::new(1.5, 0.0, 0.0)).unwrap());
    }

    #[test]
    fn instances_share_one_mesh() {
        let shape = cube(1.0);
        let copy = shape.clone();
        assert!(Arc::ptr_eq(shape.mesh(), copy.mesh()));
        assert!(shape.size_in_bytes() < std::mem::size_of::<PolyhedronMesh>() + 64);
    }
}
