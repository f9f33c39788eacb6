use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::{
    config::{
        MANIFOLD_NORMAL_TOLERANCE, MAX_CONTACT_POINTS_IN_MANIFOLD, MAX_MANIFOLDS_IN_SET,
        PERSISTENT_CONTACT_DISTANCE,
    },
    utils::arena::{Arena, Handle},
};

/// One contact between two shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    /// Witness on shape A, in A's local frame.
    pub local_point_a: DVec3,
    /// Witness on shape B, in B's local frame.
    pub local_point_b: DVec3,
    /// World-space unit normal from A towards B.
    pub normal: DVec3,
    pub penetration_depth: f64,
}

/// Contact points of one pair sharing a common normal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactManifold {
    normal: DVec3,
    points: Vec<ContactPoint>,
}

impl ContactManifold {
    /// Empty manifold; callers add at least one point before it reaches a callback.
    pub fn new(normal: DVec3) -> Self {
        Self {
            normal,
            points: Vec::with_capacity(MAX_CONTACT_POINTS_IN_MANIFOLD),
        }
    }

    pub fn from_point(point: ContactPoint) -> Self {
        let mut manifold = Self::new(point.normal);
        manifold.add_point(point);
        manifold
    }

    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    pub fn points(&self) -> &[ContactPoint] {
        &self.points
    }

    pub fn nb_contact_points(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn accepts_normal(&self, normal: DVec3) -> bool {
        self.normal.dot(normal) >= MANIFOLD_NORMAL_TOLERANCE
    }

    /// Adds a point, merging it with a nearby existing one. A full manifold
    /// drops whichever point is shallowest, the new one included.
    pub fn add_point(&mut self, point: ContactPoint) {
        if let Some(existing) = self.points.iter_mut().find(|p| {
            p.local_point_a.distance_squared(point.local_point_a)
                <= PERSISTENT_CONTACT_DISTANCE * PERSISTENT_CONTACT_DISTANCE
        }) {
            *existing = point;
            return;
        }

        if self.points.len() < MAX_CONTACT_POINTS_IN_MANIFOLD {
            self.points.push(point);
            return;
        }

        if let Some((index, shallowest)) = self
            .points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.penetration_depth.total_cmp(&b.penetration_depth))
        {
            if shallowest.penetration_depth < point.penetration_depth {
                self.points[index] = point;
            }
        }
    }

    pub fn deepest(&self) -> Option<&ContactPoint> {
        self.points
            .iter()
            .max_by(|a, b| a.penetration_depth.total_cmp(&b.penetration_depth))
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

#[derive(Debug, Clone)]
struct ManifoldNode {
    manifold: ContactManifold,
    next: Option<Handle>,
}

/// Manifolds of one overlapping pair.
///
/// Manifolds live in an arena; their order is a singly-linked list that new
/// manifolds are prepended to.
#[derive(Debug, Clone)]
pub struct ContactManifoldSet {
    nodes: Arena<ManifoldNode>,
    head: Option<Handle>,
    max_manifolds: usize,
}

impl Default for ContactManifoldSet {
    fn default() -> Self {
        Self::new(MAX_MANIFOLDS_IN_SET)
    }
}

impl ContactManifoldSet {
    pub fn new(max_manifolds: usize) -> Self {
        Self {
            nodes: Arena::new(),
            head: None,
            max_manifolds: max_manifolds.max(1),
        }
    }

    pub fn first(&self) -> Option<Handle> {
        self.head
    }

    pub fn next_of(&self, handle: Handle) -> Option<Handle> {
        self.nodes.get(handle).and_then(|node| node.next)
    }

    pub fn get(&self, handle: Handle) -> Option<&ContactManifold> {
        self.nodes.get(handle).map(|node| &node.manifold)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut ContactManifold> {
        self.nodes.get_mut(handle).map(|node| &mut node.manifold)
    }

    /// Manifolds in list order.
    pub fn iter(&self) -> impl Iterator<Item = &ContactManifold> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.nodes.get(cursor?)?;
            cursor = node.next;
            Some(&node.manifold)
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_contact_points(&self) -> usize {
        self.iter().map(ContactManifold::nb_contact_points).sum()
    }

    /// Prepends a manifold, ignoring the set's manifold limit.
    pub fn insert(&mut self, manifold: ContactManifold) -> Handle {
        let handle = self.nodes.insert(ManifoldNode {
            manifold,
            next: self.head,
        });
        self.head = Some(handle);
        handle
    }

    /// Routes a point to the manifold with a matching normal, opening a new
    /// manifold while the set has room and otherwise using the closest normal.
    pub fn add_contact_point(&mut self, point: ContactPoint) -> Handle {
        let mut best: Option<(Handle, f64)> = None;
        let mut cursor = self.head;
        while let Some(handle) = cursor {
            let Some(node) = self.nodes.get(handle) else {
                break;
            };
            let alignment = node.manifold.normal().dot(point.normal);
            if best.map_or(true, |(_, b)| alignment > b) {
                best = Some((handle, alignment));
            }
            cursor = node.next;
        }

        let target = match best {
            Some((handle, alignment)) if alignment >= MANIFOLD_NORMAL_TOLERANCE => Some(handle),
            Some((handle, _)) if self.len() >= self.max_manifolds => Some(handle),
            _ => None,
        };

        match target.and_then(|handle| self.nodes.get_mut(handle).map(|node| (handle, node))) {
            Some((handle, node)) => {
                node.manifold.add_point(point);
                handle
            }
            None => self.insert(ContactManifold::from_point(point)),
        }
    }

    pub fn remove(&mut self, handle: Handle) -> Option<ContactManifold> {
        let next = self.nodes.get(handle)?.next;
        if self.head == Some(handle) {
            self.head = next;
        } else {
            let mut cursor = self.head;
            while let Some(current) = cursor {
                let node = self.nodes.get_mut(current)?;
                if node.next == Some(handle) {
                    node.next = next;
                    break;
                }
                cursor = node.next;
            }
        }
        self.nodes.remove(handle).map(|node| node.manifold)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, normal: DVec3, depth: f64) -> ContactPoint {
        ContactPoint {
            local_point_a: DVec3::new(x, 0.0, 0.0),
            local_point_b: DVec3::new(x, 0.0, 0.0),
            normal,
            penetration_depth: depth,
        }
    }

    #[test]
    fn full_manifold_evicts_shallowest() {
        let mut manifold = ContactManifold::new(DVec3::Y);
        for (i, depth) in [0.3, 0.1, 0.4, 0.2].into_iter().enumerate() {
            manifold.add_point(point(i as f64, DVec3::Y, depth));
        }
        manifold.add_point(point(10.0, DVec3::Y, 0.25));
        assert_eq!(manifold.nb_contact_points(), MAX_CONTACT_POINTS_IN_MANIFOLD);
        assert!(manifold.points().iter().all(|p| p.penetration_depth != 0.1));

        manifold.add_point(point(11.0, DVec3::Y, 0.01));
        assert!(manifold.points().iter().all(|p| p.local_point_a.x != 11.0));
        assert_eq!(manifold.deepest().map(|p| p.penetration_depth), Some(0.4));
    }

    #[test]
    fn nearby_points_are_merged() {
        let mut manifold = ContactManifold::from_point(point(0.0, DVec3::Y, 0.1));
        manifold.add_point(point(0.01, DVec3::Y, 0.2));
        assert_eq!(manifold.nb_contact_points(), 1);
        assert_eq!(manifold.points()[0].penetration_depth, 0.2);
    }

    #[test]
    fn points_are_routed_by_normal() {
        let mut set = ContactManifoldSet::default();
        let up = set.add_contact_point(point(0.0, DVec3::Y, 0.1));
        let again = set.add_contact_point(point(1.0, DVec3::Y, 0.1));
        let side = set.add_contact_point(point(0.0, DVec3::X, 0.1));
        assert_eq!(up, again);
        assert_ne!(up, side);
        assert_eq!(set.len(), 2);
        assert_eq!(set.total_contact_points(), 3);
        // Newest manifold comes first.
        assert_eq!(set.first(), Some(side));
        assert_eq!(set.next_of(side), Some(up));
        assert_eq!(set.next_of(up), None);
    }

    #[test]
    fn set_respects_manifold_limit() {
        let mut set = ContactManifoldSet::new(2);
        set.add_contact_point(point(0.0, DVec3::X, 0.1));
        set.add_contact_point(point(0.0, DVec3::Y, 0.1));
        set.add_contact_point(point(0.0, DVec3::Z, 0.1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn removal_relinks_the_list() {
        let mut set = ContactManifoldSet::default();
        let a = set.insert(ContactManifold::from_point(point(0.0, DVec3::X, 0.1)));
        let b = set.insert(ContactManifold::from_point(point(0.0, DVec3::Y, 0.1)));
        let c = set.insert(ContactManifold::from_point(point(0.0, DVec3::Z, 0.1)));
        assert!(set.remove(b).is_some());
        assert_eq!(set.next_of(c), Some(a));
        assert!(set.get(b).is_none());
        assert_eq!(set.iter().count(), 2);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.first(), None);
    }
}
