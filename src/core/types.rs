use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use super::matrix::Matrix3;

/// Rigid placement of a shape: position and orientation, no scale.
///
/// Non-uniform scale lives on the shape itself so that many instances can
/// share the same mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    pub fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: DVec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn transform_point(&self, local: DVec3) -> DVec3 {
        self.position + self.rotation * local
    }

    pub fn inverse_transform_point(&self, world: DVec3) -> DVec3 {
        self.rotation.conjugate() * (world - self.position)
    }

    pub fn rotate(&self, local: DVec3) -> DVec3 {
        self.rotation * local
    }

    pub fn inverse_rotate(&self, world: DVec3) -> DVec3 {
        self.rotation.conjugate() * world
    }

    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.conjugate();
        Transform {
            position: rotation * -self.position,
            rotation,
        }
    }

    /// Applies `other` in the local frame of `self`.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.transform_point(other.position),
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    pub fn rotation_matrix(&self) -> Matrix3 {
        Matrix3::from(DMat3::from_quat(self.rotation))
    }
}
