//! Convex shape variants and the support-mapping capability they share.

use glam::DVec3;

use super::convex_polyhedron::ConvexPolyhedronShape;
use super::queries::{Raycast, RaycastHit, RaycastQuery};
use crate::{
    config::DEFAULT_OBJECT_MARGIN,
    core::{mesh::Aabb, Matrix3, Transform},
    error::{CollisionError, Result},
};

/// Per-query cache of the last support vertex.
///
/// Hill-climbing polyhedra start their walk here; consecutive directions in a
/// GJK loop are close, so the walk usually takes a step or two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportHint {
    pub vertex: Option<usize>,
}

/// Support-mapping capability shared by every convex shape.
pub trait SupportMap {
    /// Farthest point of the core shape (no margin) along `direction`, in
    /// local space. `direction` is non-zero but need not be normalised.
    fn local_support_point_without_margin(&self, direction: DVec3, hint: &mut SupportHint)
        -> DVec3;

    fn margin(&self) -> f64;

    /// Local bounds, margin included.
    fn local_bounds(&self) -> Aabb;

    fn local_inertia_tensor(&self, mass: f64) -> Result<Matrix3>;

    fn local_support_point(
        &self,
        direction: DVec3,
        use_margin: bool,
        hint: &mut SupportHint,
    ) -> Result<DVec3> {
        let unit = direction
            .try_normalize()
            .ok_or(CollisionError::ZeroDirection)?;
        let point = self.local_support_point_without_margin(direction, hint);
        Ok(if use_margin {
            point + unit * self.margin()
        } else {
            point
        })
    }

    /// World-space support point of the shape placed at `transform`.
    fn support_point(
        &self,
        transform: &Transform,
        direction: DVec3,
        use_margin: bool,
        hint: &mut SupportHint,
    ) -> Result<DVec3> {
        let local = self.local_support_point(transform.inverse_rotate(direction), use_margin, hint)?;
        Ok(transform.transform_point(local))
    }
}

/// Box centred on the origin. The margin is added outside the half extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxShape {
    half_extents: DVec3,
    margin: f64,
}

impl BoxShape {
    pub fn new(half_extents: DVec3) -> Self {
        Self {
            half_extents: half_extents.abs(),
            margin: DEFAULT_OBJECT_MARGIN,
        }
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin.max(0.0);
        self
    }

    pub fn half_extents(&self) -> DVec3 {
        self.half_extents
    }
}

impl SupportMap for BoxShape {
    fn local_support_point_without_margin(&self, direction: DVec3, _hint: &mut SupportHint) -> DVec3 {
        DVec3::new(
            if direction.x < 0.0 { -self.half_extents.x } else { self.half_extents.x },
            if direction.y < 0.0 { -self.half_extents.y } else { self.half_extents.y },
            if direction.z < 0.0 { -self.half_extents.z } else { self.half_extents.z },
        )
    }

    fn margin(&self) -> f64 {
        self.margin
    }

    fn local_bounds(&self) -> Aabb {
        Aabb::new(-self.half_extents, self.half_extents).inflate(self.margin)
    }

    fn local_inertia_tensor(&self, mass: f64) -> Result<Matrix3> {
        box_inertia(mass, self.local_bounds().extent())
    }
}

/// Sphere: a point core inflated by its radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereShape {
    radius: f64,
}

impl SphereShape {
    pub fn new(radius: f64) -> Self {
        Self {
            radius: radius.abs(),
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl SupportMap for SphereShape {
    fn local_support_point_without_margin(&self, _direction: DVec3, _hint: &mut SupportHint) -> DVec3 {
        DVec3::ZERO
    }

    fn margin(&self) -> f64 {
        self.radius
    }

    fn local_bounds(&self) -> Aabb {
        Aabb::new(DVec3::ZERO, DVec3::ZERO).inflate(self.radius)
    }

    fn local_inertia_tensor(&self, mass: f64) -> Result<Matrix3> {
        if self.radius <= 0.0 {
            return Err(CollisionError::NonPositiveExtent {
                axis: 0,
                extent: self.radius,
            });
        }
        Ok(Matrix3::from_diagonal(DVec3::splat(
            0.4 * mass * self.radius * self.radius,
        )))
    }
}

/// Zero-extent shape used for point containment queries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointShape;

impl SupportMap for PointShape {
    fn local_support_point_without_margin(&self, _direction: DVec3, _hint: &mut SupportHint) -> DVec3 {
        DVec3::ZERO
    }

    fn margin(&self) -> f64 {
        0.0
    }

    fn local_bounds(&self) -> Aabb {
        Aabb::new(DVec3::ZERO, DVec3::ZERO)
    }

    fn local_inertia_tensor(&self, _mass: f64) -> Result<Matrix3> {
        Ok(Matrix3::ZERO)
    }
}

/// Closed set of convex shapes the narrow phase understands.
#[derive(Debug, Clone)]
pub enum CollisionShape {
    ConvexPolyhedron(ConvexPolyhedronShape),
    Box(BoxShape),
    Sphere(SphereShape),
    Point(PointShape),
}

impl CollisionShape {
    pub fn name(&self) -> &'static str {
        match self {
            CollisionShape::ConvexPolyhedron(_) => "convex polyhedron",
            CollisionShape::Box(_) => "box",
            CollisionShape::Sphere(_) => "sphere",
            CollisionShape::Point(_) => "point",
        }
    }

    /// Ray query in the shape's local frame. `query.direction` must be normalised.
    pub fn raycast_local(&self, query: &RaycastQuery) -> Option<RaycastHit> {
        match self {
            CollisionShape::ConvexPolyhedron(shape) => shape.raycast(query),
            CollisionShape::Box(shape) => Raycast::ray_box(query, shape.half_extents()),
            CollisionShape::Sphere(shape) => Raycast::ray_sphere(query, shape.radius()),
            CollisionShape::Point(_) => None,
        }
    }
}

impl SupportMap for CollisionShape {
    fn local_support_point_without_margin(&self, direction: DVec3, hint: &mut SupportHint) -> DVec3 {
        match self {
            CollisionShape::ConvexPolyhedron(shape) => {
                shape.local_support_point_without_margin(direction, hint)
            }
            CollisionShape::Box(shape) => shape.local_support_point_without_margin(direction, hint),
            CollisionShape::Sphere(shape) => shape.local_support_point_without_margin(direction, hint),
            CollisionShape::Point(shape) => shape.local_support_point_without_margin(direction, hint),
        }
    }

    fn margin(&self) -> f64 {
        match self {
            CollisionShape::ConvexPolyhedron(shape) => shape.margin(),
            CollisionShape::Box(shape) => shape.margin(),
            CollisionShape::Sphere(shape) => shape.margin(),
            CollisionShape::Point(shape) => shape.margin(),
        }
    }

    fn local_bounds(&self) -> Aabb {
        match self {
            CollisionShape::ConvexPolyhedron(shape) => shape.local_bounds(),
            CollisionShape::Box(shape) => shape.local_bounds(),
            CollisionShape::Sphere(shape) => shape.local_bounds(),
            CollisionShape::Point(shape) => shape.local_bounds(),
        }
    }

    fn local_inertia_tensor(&self, mass: f64) -> Result<Matrix3> {
        match self {
            CollisionShape::ConvexPolyhedron(shape) => shape.local_inertia_tensor(mass),
            CollisionShape::Box(shape) => shape.local_inertia_tensor(mass),
            CollisionShape::Sphere(shape) => shape.local_inertia_tensor(mass),
            CollisionShape::Point(shape) => shape.local_inertia_tensor(mass),
        }
    }
}

impl From<ConvexPolyhedronShape> for CollisionShape {
    fn from(shape: ConvexPolyhedronShape) -> Self {
        CollisionShape::ConvexPolyhedron(shape)
    }
}

impl From<BoxShape> for CollisionShape {
    fn from(shape: BoxShape) -> Self {
        CollisionShape::Box(shape)
    }
}

impl From<SphereShape> for CollisionShape {
    fn from(shape: SphereShape) -> Self {
        CollisionShape::Sphere(shape)
    }
}

impl From<PointShape> for CollisionShape {
    fn from(shape: PointShape) -> Self {
        CollisionShape::Point(shape)
    }
}

/// Inertia of a solid box with the given half extents: `(m/3)(ey² + ez²)` and
/// so on down the diagonal.
pub(crate) fn box_inertia(mass: f64, half_extents: DVec3) -> Result<Matrix3> {
    for axis in 0..3 {
        let extent = half_extents[axis];
        if extent <= 0.0 || extent.is_nan() {
            return Err(CollisionError::NonPositiveExtent { axis, extent });
        }
    }
    let factor = mass / 3.0;
    let sq = half_extents * half_extents;
    Ok(Matrix3::from_diagonal(DVec3::new(
        factor * (sq.y + sq.z),
        factor * (sq.x + sq.z),
        factor * (sq.x + sq.y),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DQuat;

    #[test]
    fn variants_report_their_names() {
        let shapes: [CollisionShape; 3] = [
            BoxShape::new(DVec3::ONE).into(),
            SphereShape::new(1.0).into(),
            PointShape.into(),
        ];
        let names: Vec<&str> = shapes.iter().map(CollisionShape::name).collect();
        assert_eq!(names, ["box", "sphere", "point"]);
    }

    #[test]
    fn box_support_picks_the_matching_corner() {
        let shape = BoxShape::new(DVec3::new(1.0, 2.0, 3.0)).with_margin(0.0);
        let mut hint = SupportHint::default();
        let p = shape
            .local_support_point(DVec3::new(1.0, -1.0, 1.0), false, &mut hint)
            .unwrap();
        assert_eq!(p, DVec3::new(1.0, -2.0, 3.0));
    }

    #[test]
    fn margin_pushes_support_along_direction() {
        let shape = BoxShape::new(DVec3::ONE).with_margin(0.5);
        let mut hint = SupportHint::default();
        let p = shape.local_support_point(DVec3::X * 10.0, true, &mut hint).unwrap();
        assert_relative_eq!(p.x, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn zero_direction_is_rejected() {
        let shape = SphereShape::new(1.0);
        let mut hint = SupportHint::default();
        assert_eq!(
            shape.local_support_point(DVec3::ZERO, true, &mut hint),
            Err(CollisionError::ZeroDirection)
        );
    }

    #[test]
    fn world_support_follows_the_transform() {
        let shape = CollisionShape::from(BoxShape::new(DVec3::new(2.0, 1.0, 1.0)).with_margin(0.0));
        let transform = Transform::new(
            DVec3::new(10.0, 0.0, 0.0),
            DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2),
        );
        let mut hint = SupportHint::default();
        let p = shape
            .support_point(&transform, DVec3::Y, false, &mut hint)
            .unwrap();
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn sphere_inertia_is_two_fifths_m_r_squared() {
        let inertia = SphereShape::new(2.0).local_inertia_tensor(5.0).unwrap();
        assert_relative_eq!(inertia.get(0, 0), 8.0, epsilon = 1e-12);
        assert_relative_eq!(inertia.get(0, 1), 0.0);
    }

    #[test]
    fn box_inertia_uses_inflated_extents() {
        let inertia = BoxShape::new(DVec3::splat(0.5))
            .with_margin(0.5)
            .local_inertia_tensor(3.0)
            .unwrap();
        assert_relative_eq!(inertia.get(0, 0), 2.0, epsilon = 1e-12);
        assert_relative_eq!(inertia.get(2, 2), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_extent_is_rejected() {
        assert!(matches!(
            box_inertia(1.0, DVec3::new(1.0, 0.0, 1.0)),
            Err(CollisionError::NonPositiveExtent { axis: 1, .. })
        ));
    }
}
