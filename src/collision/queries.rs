use glam::DVec3;

use super::pair::ProxyShape;
use super::shapes::CollisionShape;
use crate::{core::Transform, utils::arena::Handle};

const PARALLEL_EPSILON: f64 = 1e-12;

/// Result of a ray cast against a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub point: DVec3,
    pub normal: DVec3,
    /// Distance along the normalised ray direction.
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastQuery {
    pub origin: DVec3,
    pub direction: DVec3,
    pub max_distance: f64,
}

impl RaycastQuery {
    pub fn new(origin: DVec3, direction: DVec3, max_distance: f64) -> Self {
        Self {
            origin,
            direction,
            max_distance,
        }
    }
}

pub struct Raycast;

impl Raycast {
    /// Casts a world-space ray against `shape` placed at `transform`.
    ///
    /// Rays starting inside a shape report no hit. Margins are ignored.
    pub fn cast_shape(
        query: &RaycastQuery,
        shape: &CollisionShape,
        transform: &Transform,
    ) -> Option<RaycastHit> {
        let direction = query.direction.try_normalize()?;
        let local = RaycastQuery {
            origin: transform.inverse_transform_point(query.origin),
            direction: transform.inverse_rotate(direction),
            max_distance: query.max_distance,
        };
        shape.raycast_local(&local).map(|hit| RaycastHit {
            point: transform.transform_point(hit.point),
            normal: transform.rotate(hit.normal),
            distance: hit.distance,
        })
    }

    /// Casts against every proxy and returns the hits sorted by distance.
    pub fn cast_proxies<'p>(
        query: &RaycastQuery,
        proxies: impl IntoIterator<Item = &'p ProxyShape>,
    ) -> Vec<(Handle, RaycastHit)> {
        let mut hits: Vec<(Handle, RaycastHit)> = proxies
            .into_iter()
            .filter_map(|proxy| {
                Self::cast_shape(query, &proxy.shape, &proxy.transform).map(|hit| (proxy.id, hit))
            })
            .collect();
        hits.sort_by(|a, b| a.1.distance.total_cmp(&b.1.distance));
        hits
    }

    /// Local-space sphere test; `query.direction` must be normalised.
    pub(crate) fn ray_sphere(query: &RaycastQuery, radius: f64) -> Option<RaycastHit> {
        let oc = query.origin;
        let c = oc.length_squared() - radius * radius;
        if c <= 0.0 {
            return None;
        }
        let b = oc.dot(query.direction);
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let t = -b - discriminant.sqrt();
        if t < 0.0 || t > query.max_distance {
            return None;
        }
        let point = query.origin + query.direction * t;
        Some(RaycastHit {
            point,
            normal: point / radius,
            distance: t,
        })
    }

    /// Local-space slab test against a box centred on the origin.
    pub(crate) fn ray_box(query: &RaycastQuery, half_extents: DVec3) -> Option<RaycastHit> {
        let mut t_min = 0.0;
        let mut t_max = query.max_distance;
        let mut normal = None;

        for axis in 0..3 {
            let origin = query.origin[axis];
            let dir = query.direction[axis];
            let (min, max) = (-half_extents[axis], half_extents[axis]);

            if dir.abs() < PARALLEL_EPSILON {
                if origin < min || origin > max {
                    return None;
                }
                continue;
            }

            let inv_dir = 1.0 / dir;
            let (t_near, t_far) = {
                let t1 = (min - origin) * inv_dir;
                let t2 = (max - origin) * inv_dir;
                if t1 <= t2 {
                    (t1, t2)
                } else {
                    (t2, t1)
                }
            };

            if t_near > t_min {
                t_min = t_near;
                let mut axis_normal = DVec3::ZERO;
                axis_normal[axis] = -dir.signum();
                normal = Some(axis_normal);
            }
            t_max = t_max.min(t_far);
            if t_min > t_max {
                return None;
            }
        }

        Some(RaycastHit {
            point: query.origin + query.direction * t_min,
            normal: normal?,
            distance: t_min,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::{BoxShape, SphereShape};
    use approx::assert_relative_eq;
    use glam::DQuat;

    #[test]
    fn sphere_hit_reports_entry_point() {
        let shape = CollisionShape::from(SphereShape::new(1.0));
        let query = RaycastQuery::new(DVec3::new(0.0, 0.0, -5.0), DVec3::new(0.0, 0.0, 2.0), 10.0);
        let hit = Raycast::cast_shape(&query, &shape, &Transform::from_position(DVec3::Y * 0.5))
            .expect("ray should hit");
        assert_relative_eq!(hit.normal.length(), 1.0, epsilon = 1e-12);
        assert!(hit.normal.z < 0.0);
        assert!(hit.distance > 4.0 && hit.distance < 4.2);
    }

    #[test]
    fn rotated_box_hit_normal_is_world_space() {
        let shape = CollisionShape::from(BoxShape::new(DVec3::ONE));
        let transform = Transform::new(
            DVec3::new(5.0, 0.0, 0.0),
            DQuat::from_rotation_y(std::f64::consts::FRAC_PI_2),
        );
        let query = RaycastQuery::new(DVec3::ZERO, DVec3::X, 100.0);
        let hit = Raycast::cast_shape(&query, &shape, &transform).expect("ray should hit");
        assert_relative_eq!(hit.distance, 4.0, epsilon = 1e-9);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-9);
        assert_relative_eq!(hit.point.x, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn proxies_are_sorted_by_distance() {
        let sphere = std::sync::Arc::new(CollisionShape::from(SphereShape::new(0.5)));
        let proxies: Vec<ProxyShape> = [8.0, 3.0, 5.0]
            .into_iter()
            .enumerate()
            .map(|(i, x)| {
                ProxyShape::new(
                    Handle::from_index(i as u32),
                    Handle::from_index(i as u32),
                    sphere.clone(),
                    Transform::from_position(DVec3::new(x, 0.0, 0.0)),
                )
            })
            .collect();
        let hits = Raycast::cast_proxies(&RaycastQuery::new(DVec3::ZERO, DVec3::X, 100.0), &proxies);
        let order: Vec<usize> = hits.iter().map(|(id, _)| id.index()).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn zero_direction_never_hits() {
        let shape = CollisionShape::from(SphereShape::new(1.0));
        let query = RaycastQuery::new(DVec3::new(0.0, 0.0, -5.0), DVec3::ZERO, 10.0);
        assert!(Raycast::cast_shape(&query, &shape, &Transform::IDENTITY).is_none());
    }
}
