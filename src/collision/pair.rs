use std::sync::Arc;

use super::contact::ContactManifoldSet;
use super::shapes::{CollisionShape, SupportMap};
use crate::{
    core::{mesh::Aabb, Transform},
    utils::arena::Handle,
};

/// A shape attached to a body and placed in the world.
#[derive(Debug, Clone)]
pub struct ProxyShape {
    pub id: Handle,
    pub body: Handle,
    pub shape: Arc<CollisionShape>,
    pub transform: Transform,
}

impl ProxyShape {
    pub fn new(id: Handle, body: Handle, shape: Arc<CollisionShape>, transform: Transform) -> Self {
        Self {
            id,
            body,
            shape,
            transform,
        }
    }

    /// World bounds of the rotated local bounds (margin included).
    pub fn world_bounds(&self) -> Aabb {
        let local = self.shape.local_bounds();
        let corners = (0..8).map(|i| {
            let corner = glam::DVec3::new(
                if i & 1 == 0 { local.min.x } else { local.max.x },
                if i & 2 == 0 { local.min.y } else { local.max.y },
                if i & 4 == 0 { local.min.z } else { local.max.z },
            );
            self.transform.transform_point(corner)
        });
        Aabb::from_points(corners)
    }
}

/// Two proxies whose bounds overlap, with the manifolds found between them.
#[derive(Debug, Clone)]
pub struct OverlappingPair {
    pub proxy_a: ProxyShape,
    pub proxy_b: ProxyShape,
    pub manifold_set: ContactManifoldSet,
}

impl OverlappingPair {
    pub fn new(proxy_a: ProxyShape, proxy_b: ProxyShape) -> Self {
        Self {
            proxy_a,
            proxy_b,
            manifold_set: ContactManifoldSet::default(),
        }
    }

    /// Order-independent key of the two proxies.
    pub fn key(&self) -> (Handle, Handle) {
        let (a, b) = (self.proxy_a.id, self.proxy_b.id);
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn bounds_overlap(&self) -> bool {
        self.proxy_a.world_bounds().overlaps(&self.proxy_b.world_bounds())
    }

    pub fn has_contacts(&self) -> bool {
        !self.manifold_set.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::{BoxShape, SphereShape};
    use glam::DVec3;

    fn proxy(index: u32, shape: CollisionShape, position: DVec3) -> ProxyShape {
        ProxyShape::new(
            Handle::from_index(index),
            Handle::from_index(index),
            Arc::new(shape),
            Transform::from_position(position),
        )
    }

    #[test]
    fn key_is_order_independent() {
        let a = proxy(4, SphereShape::new(1.0).into(), DVec3::ZERO);
        let b = proxy(2, SphereShape::new(1.0).into(), DVec3::X);
        let ab = OverlappingPair::new(a.clone(), b.clone());
        let ba = OverlappingPair::new(b, a);
        assert_eq!(ab.key(), ba.key());
    }

    #[test]
    fn world_bounds_follow_position() {
        let a = proxy(0, BoxShape::new(DVec3::ONE).with_margin(0.0).into(), DVec3::ZERO);
        let near = proxy(1, SphereShape::new(0.5).into(), DVec3::new(1.4, 0.0, 0.0));
        let far = proxy(2, SphereShape::new(0.5).into(), DVec3::new(3.0, 0.0, 0.0));
        assert!(OverlappingPair::new(a.clone(), near).bounds_overlap());
        assert!(!OverlappingPair::new(a, far).bounds_overlap());
    }
}
