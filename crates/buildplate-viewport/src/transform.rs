//! Logical model transforms.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::frame::euler_to_quat;

/// Position (mm), rotation (XYZ Euler, radians) and scale of a model in
/// the logical build-plate frame (Z up, origin at the plate centre).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: DVec3,
    pub rotation: DVec3,
    pub scale: DVec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: DVec3::ZERO,
        rotation: DVec3::ZERO,
        scale: DVec3::ONE,
    };

    pub fn rotation_quat(&self) -> DQuat {
        euler_to_quat(self.rotation)
    }

    /// Merge the provided fields. Returns true if anything changed.
    pub fn apply(&mut self, patch: &TransformPatch) -> bool {
        let mut changed = false;
        if let Some(position) = patch.position {
            changed |= self.position != position;
            self.position = position;
        }
        if let Some(rotation) = patch.rotation {
            changed |= self.rotation != rotation;
            self.rotation = rotation;
        }
        if let Some(scale) = patch.scale {
            changed |= self.scale != scale;
            self.scale = scale;
        }
        changed
    }
}

/// Partial transform update; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformPatch {
    pub position: Option<DVec3>,
    pub rotation: Option<DVec3>,
    pub scale: Option<DVec3>,
}

impl TransformPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, position: DVec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn rotation(mut self, rotation: DVec3) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn scale(mut self, scale: DVec3) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Patch that sets every field.
    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            position: Some(transform.position),
            rotation: Some(transform.rotation),
            scale: Some(transform.scale),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.rotation.is_none() && self.scale.is_none()
    }
}
