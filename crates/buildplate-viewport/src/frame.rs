//! # Placement frame
//!
//! All corner-enumeration math lives here so that rendering, gizmo
//! inversion, validation and snap-to-plate agree.
//!
//! The logical frame is Z-up with the origin at the centre of the plate
//! surface: X spans the width, Y the depth, Z the height. The render frame
//! is Y-up. A [`PlacementFrame`] maps between the two for one build volume.
//!
//! Geometry is centred on its bounding box at load time, so a model is
//! described by its extents alone.

use buildplate_devicedb::PrintableArea;
use glam::{DMat3, DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::geometry::Aabb;
use crate::transform::Transform;

/// Fraction of the depth the plate asset sits in front of the plate centre.
pub const PLATE_OFFSET_FACTOR: f64 = 0.04;

/// Rotation applied to everything on the plate: 270° about X.
pub fn base_rotation() -> DQuat {
    DQuat::from_rotation_x(3.0 * std::f64::consts::FRAC_PI_2)
}

/// XYZ Euler angles (radians) to a quaternion, `R = Rx·Ry·Rz`.
pub fn euler_to_quat(euler: DVec3) -> DQuat {
    DQuat::from_rotation_x(euler.x) * DQuat::from_rotation_y(euler.y) * DQuat::from_rotation_z(euler.z)
}

/// Quaternion to XYZ Euler angles; inverse of [`euler_to_quat`] for
/// `y` in `[-π/2, π/2]`.
pub fn quat_to_euler(rotation: DQuat) -> DVec3 {
    let m = DMat3::from_quat(rotation.normalize());
    let m11 = m.x_axis.x;
    let m12 = m.y_axis.x;
    let m13 = m.z_axis.x;
    let m22 = m.y_axis.y;
    let m23 = m.z_axis.y;
    let m32 = m.y_axis.z;
    let m33 = m.z_axis.z;

    let y = m13.clamp(-1.0, 1.0).asin();
    if m13.abs() < 0.999_999_9 {
        DVec3::new((-m23).atan2(m33), y, (-m12).atan2(m11))
    } else {
        // Gimbal lock: fold Z into X
        DVec3::new(m32.atan2(m22), y, 0.0)
    }
}

/// The 8 corners of a box of the given size centred on the origin.
pub fn corners(extents: DVec3) -> [DVec3; 8] {
    let h = extents * 0.5;
    [
        DVec3::new(-h.x, -h.y, -h.z),
        DVec3::new(h.x, -h.y, -h.z),
        DVec3::new(-h.x, h.y, -h.z),
        DVec3::new(h.x, h.y, -h.z),
        DVec3::new(-h.x, -h.y, h.z),
        DVec3::new(h.x, -h.y, h.z),
        DVec3::new(-h.x, h.y, h.z),
        DVec3::new(h.x, h.y, h.z),
    ]
}

fn rotated_bounds(extents: DVec3, rotation: DVec3, scale: DVec3) -> Aabb {
    let q = euler_to_quat(rotation);
    Aabb::from_points(corners(extents).into_iter().map(|c| q * (c * scale)))
}

/// Height to raise a centred model so its lowest point touches Z = 0.
pub fn lowest_face_lift(extents: DVec3, rotation: DVec3, scale: DVec3) -> f64 {
    -rotated_bounds(extents, rotation, scale).min.z
}

/// Logical-frame bounds of a placed model.
///
/// The box bottom is always at `transform.position.z`: the lift is applied
/// before translation.
pub fn placed_bounds(extents: DVec3, transform: &Transform) -> Aabb {
    let local = rotated_bounds(extents, transform.rotation, transform.scale);
    let lift = DVec3::new(0.0, 0.0, -local.min.z);
    Aabb::new(
        transform.position + (local.min + lift),
        transform.position + (local.max + lift),
    )
}

/// Render-frame transform of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldTransform {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for WorldTransform {
    fn default() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
        }
    }
}

impl WorldTransform {
    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Mapping between the logical plate frame and the render frame for one
/// printable area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementFrame {
    rotation: DQuat,
    offset: DVec3,
    area: PrintableArea,
}

impl PlacementFrame {
    pub fn for_area(area: &PrintableArea) -> Self {
        Self {
            rotation: base_rotation(),
            offset: DVec3::new(
                0.0,
                -area.depth / 2.0 - area.depth * PLATE_OFFSET_FACTOR,
                area.height / 2.0,
            ),
            area: *area,
        }
    }

    pub fn base_rotation(&self) -> DQuat {
        self.rotation
    }

    /// Render-space position of the logical origin.
    pub fn offset(&self) -> DVec3 {
        self.offset
    }

    pub fn area(&self) -> &PrintableArea {
        &self.area
    }

    pub fn to_render(&self, logical: DVec3) -> DVec3 {
        self.offset + self.rotation * logical
    }

    pub fn to_logical(&self, render: DVec3) -> DVec3 {
        self.rotation.inverse() * (render - self.offset)
    }

    /// Transform for the build-plate asset (centred geometry).
    pub fn plate_matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rotation, self.offset)
    }

    /// Transform for a box of the printable-area size resting on the plate.
    pub fn printable_area_matrix(&self) -> DMat4 {
        let center = DVec3::new(0.0, 0.0, self.area.height / 2.0);
        DMat4::from_rotation_translation(self.rotation, self.to_render(center))
    }

    /// Render transform of a model: base rotation, then model rotation,
    /// lifted so the lowest face rests at `position.z`.
    pub fn world_from_logical(&self, transform: &Transform, extents: DVec3) -> WorldTransform {
        let lift = lowest_face_lift(extents, transform.rotation, transform.scale);
        let logical_center = transform.position + DVec3::new(0.0, 0.0, lift);
        WorldTransform {
            translation: self.to_render(logical_center),
            rotation: self.rotation * transform.rotation_quat(),
            scale: transform.scale,
        }
    }

    /// Exact inverse of [`Self::world_from_logical`].
    pub fn logical_from_world(&self, world: &WorldTransform, extents: DVec3) -> Transform {
        let model_rotation = (self.rotation.inverse() * world.rotation).normalize();
        let rotation = quat_to_euler(model_rotation);
        let lift = lowest_face_lift(extents, rotation, world.scale);
        let logical_center = self.to_logical(world.translation);
        Transform {
            position: logical_center - DVec3::new(0.0, 0.0, lift),
            rotation,
            scale: world.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const EPS: f64 = 1e-9;

    fn area() -> PrintableArea {
        PrintableArea::new(330.0, 240.0, 300.0)
    }

    #[test]
    fn test_base_rotation_maps_z_to_render_up() {
        let up = base_rotation() * DVec3::Z;
        assert!(up.abs_diff_eq(DVec3::Y, EPS));
        let depth = base_rotation() * DVec3::Y;
        assert!(depth.abs_diff_eq(DVec3::NEG_Z, EPS));
    }

    #[test]
    fn test_lift_identity_is_half_height() {
        let lift = lowest_face_lift(DVec3::new(10.0, 20.0, 30.0), DVec3::ZERO, DVec3::ONE);
        assert!((lift - 15.0).abs() < EPS);
    }

    #[test]
    fn test_lift_after_quarter_turn() {
        // Rotating 90° about X stands the Y extent upright
        let lift = lowest_face_lift(
            DVec3::new(10.0, 20.0, 30.0),
            DVec3::new(FRAC_PI_2, 0.0, 0.0),
            DVec3::ONE,
        );
        assert!((lift - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_lift_scales() {
        let lift = lowest_face_lift(DVec3::splat(10.0), DVec3::ZERO, DVec3::new(1.0, 1.0, 3.0));
        assert!((lift - 15.0).abs() < EPS);
    }

    #[test]
    fn test_placed_bounds_bottom_at_position_z() {
        let transform = Transform {
            position: DVec3::new(5.0, -3.0, 12.5),
            rotation: DVec3::new(0.3, -0.7, 1.1),
            scale: DVec3::new(1.5, 0.5, 2.0),
        };
        let bounds = placed_bounds(DVec3::new(10.0, 20.0, 30.0), &transform);
        assert_eq!(bounds.min.z, 12.5);
    }

    #[test]
    fn test_placed_bounds_identity() {
        let bounds = placed_bounds(DVec3::new(10.0, 20.0, 30.0), &Transform::IDENTITY);
        assert_eq!(bounds.min, DVec3::new(-5.0, -10.0, 0.0));
        assert_eq!(bounds.max, DVec3::new(5.0, 10.0, 30.0));
    }

    #[test]
    fn test_euler_round_trip() {
        for euler in [
            DVec3::ZERO,
            DVec3::new(0.1, 0.2, 0.3),
            DVec3::new(-2.5, 1.2, 3.0),
            DVec3::new(PI / 3.0, -PI / 4.0, -PI / 6.0),
        ] {
            let back = quat_to_euler(euler_to_quat(euler));
            assert!(back.abs_diff_eq(euler, 1e-9), "{euler:?} -> {back:?}");
        }
    }

    #[test]
    fn test_euler_gimbal_lock_preserves_rotation() {
        let euler = DVec3::new(0.4, FRAC_PI_2, 0.3);
        let q = euler_to_quat(euler);
        let back = euler_to_quat(quat_to_euler(q));
        assert!(q.dot(back).abs() > 1.0 - 1e-9);
    }

    #[test]
    fn test_identity_model_sits_on_plate_origin() {
        let frame = PlacementFrame::for_area(&area());
        let world = frame.world_from_logical(&Transform::IDENTITY, DVec3::new(10.0, 10.0, 20.0));
        // Lifted 10 along render Y from the plate origin
        let expected = frame.offset() + DVec3::new(0.0, 10.0, 0.0);
        assert!(world.translation.abs_diff_eq(expected, EPS));
        assert!(world.rotation.abs_diff_eq(frame.base_rotation(), EPS));
    }

    #[test]
    fn test_frame_offset() {
        let frame = PlacementFrame::for_area(&area());
        assert!(frame
            .offset()
            .abs_diff_eq(DVec3::new(0.0, -120.0 - 9.6, 150.0), EPS));
    }

    #[test]
    fn test_world_logical_round_trip() {
        let frame = PlacementFrame::for_area(&area());
        let transform = Transform {
            position: DVec3::new(12.0, -40.0, 3.0),
            rotation: DVec3::new(0.2, -0.4, 2.0),
            scale: DVec3::new(1.0, 2.0, 0.5),
        };
        let extents = DVec3::new(25.0, 10.0, 40.0);
        let world = frame.world_from_logical(&transform, extents);
        let back = frame.logical_from_world(&world, extents);
        assert!(back.position.abs_diff_eq(transform.position, 1e-9));
        assert!(back.rotation.abs_diff_eq(transform.rotation, 1e-9));
        assert!(back.scale.abs_diff_eq(transform.scale, 1e-12));
    }

    #[test]
    fn test_printable_area_box_rests_on_plate() {
        let frame = PlacementFrame::for_area(&area());
        let m = frame.printable_area_matrix();
        let bottom = m.transform_point3(DVec3::new(0.0, 0.0, -150.0));
        // The box's -Z face maps onto the logical plate
        assert!(frame.to_logical(bottom).abs_diff_eq(DVec3::ZERO, 1e-9));
    }
}
