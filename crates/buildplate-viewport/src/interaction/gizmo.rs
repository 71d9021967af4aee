//! Transform gizmo.
//!
//! Works purely in render space on a [`WorldTransform`]. Translate and
//! rotate use the world axes, scale uses the object's local axes. A drag
//! projects the pointer ray onto a constraint plane through the pivot and
//! derives the new transform from the drag start, so the result never
//! accumulates rounding from intermediate steps.

use buildplate_core::{ManipulationMode, ModelId};
use glam::{DQuat, DVec3};

use crate::frame::WorldTransform;
use crate::interaction::camera::Ray;
use crate::interaction::picking::ray_segment;

const EPSILON: f64 = 1e-9;

/// Handle being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GizmoAxis {
    X,
    Y,
    Z,
    /// Centre handle: free move in the view plane, rotate about the view
    /// direction, or uniform scale.
    Uniform,
}

impl GizmoAxis {
    pub const AXES: [GizmoAxis; 3] = [GizmoAxis::X, GizmoAxis::Y, GizmoAxis::Z];

    pub fn unit(self) -> Option<DVec3> {
        match self {
            GizmoAxis::X => Some(DVec3::X),
            GizmoAxis::Y => Some(DVec3::Y),
            GizmoAxis::Z => Some(DVec3::Z),
            GizmoAxis::Uniform => None,
        }
    }

    fn index(self) -> Option<usize> {
        match self {
            GizmoAxis::X => Some(0),
            GizmoAxis::Y => Some(1),
            GizmoAxis::Z => Some(2),
            GizmoAxis::Uniform => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    /// Mode the drag began in; later mode switches apply to the next drag.
    mode: ManipulationMode,
    axis: GizmoAxis,
    /// Constraint direction in render space.
    direction: DVec3,
    plane_normal: DVec3,
    start: WorldTransform,
    start_point: DVec3,
}

/// Transform gizmo attached to at most one model.
#[derive(Debug, Clone)]
pub struct Gizmo {
    mode: ManipulationMode,
    target: Option<ModelId>,
    transform: WorldTransform,
    drag: Option<DragState>,
    min_scale: f64,
}

impl Gizmo {
    pub fn new(min_scale: f64) -> Self {
        Self {
            mode: ManipulationMode::Translate,
            target: None,
            transform: WorldTransform::default(),
            drag: None,
            min_scale,
        }
    }

    pub fn mode(&self) -> ManipulationMode {
        self.mode
    }

    /// Takes effect on the next drag. A drag in progress keeps its mode.
    pub fn set_mode(&mut self, mode: ManipulationMode) {
        self.mode = mode;
    }

    pub fn target(&self) -> Option<ModelId> {
        self.target
    }

    pub fn is_attached(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn dragged_axis(&self) -> Option<GizmoAxis> {
        self.drag.map(|d| d.axis)
    }

    pub fn transform(&self) -> &WorldTransform {
        &self.transform
    }

    /// Attach to a model, or follow its transform if already attached.
    pub fn attach(&mut self, id: ModelId, transform: WorldTransform) {
        if self.target != Some(id) {
            self.drag = None;
        }
        self.target = Some(id);
        if self.drag.is_none() {
            self.transform = transform;
        }
    }

    pub fn detach(&mut self) {
        self.target = None;
        self.drag = None;
    }

    /// Which handle, if any, the ray passes within `threshold` of. Axis
    /// handles are segments of `length` from the pivot.
    pub fn hit_handle(&self, ray: &Ray, length: f64, threshold: f64) -> Option<GizmoAxis> {
        self.target?;
        let pivot = self.transform.translation;

        let (_, center_distance) = ray_segment(ray, pivot, pivot);
        if center_distance <= threshold {
            return Some(GizmoAxis::Uniform);
        }

        GizmoAxis::AXES
            .into_iter()
            .filter_map(|axis| {
                let direction = self.handle_direction(axis)?;
                let (t, distance) = ray_segment(ray, pivot, pivot + direction * length);
                (distance <= threshold).then_some((t, axis))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, axis)| axis)
    }

    /// Mode currently driving the handles: the drag's while one is active.
    fn active_mode(&self) -> ManipulationMode {
        self.drag.map_or(self.mode, |d| d.mode)
    }

    fn handle_direction(&self, axis: GizmoAxis) -> Option<DVec3> {
        let unit = axis.unit()?;
        Some(match self.active_mode() {
            ManipulationMode::Scale => self.transform.rotation * unit,
            _ => unit,
        })
    }

    /// Start dragging a handle. `view_dir` points from the eye into the
    /// scene. Returns false if detached or the ray misses the constraint
    /// plane.
    pub fn begin_drag(&mut self, axis: GizmoAxis, ray: &Ray, view_dir: DVec3) -> bool {
        if self.target.is_none() {
            return false;
        }
        let view_dir = view_dir.normalize_or_zero();
        let direction = self.handle_direction(axis).unwrap_or(view_dir);

        let mode = self.mode;
        let plane_normal = match (mode, axis) {
            (ManipulationMode::Rotate, _) => direction,
            (_, GizmoAxis::Uniform) => view_dir,
            _ => {
                // Plane containing the axis, facing the camera as much as possible
                let n = direction.cross(view_dir).cross(direction);
                if n.length_squared() < EPSILON {
                    view_dir
                } else {
                    n.normalize()
                }
            }
        };

        let pivot = self.transform.translation;
        let Some(t) = ray.intersect_plane(pivot, plane_normal) else {
            return false;
        };
        self.drag = Some(DragState {
            mode,
            axis,
            direction,
            plane_normal,
            start: self.transform,
            start_point: ray.at(t),
        });
        true
    }

    /// Move the drag to a new pointer ray. Returns the updated transform,
    /// or `None` if not dragging or the ray misses the plane.
    pub fn drag(&mut self, ray: &Ray) -> Option<WorldTransform> {
        let drag = self.drag?;
        let pivot = drag.start.translation;
        let t = ray.intersect_plane(pivot, drag.plane_normal)?;
        let point = ray.at(t);

        let mut next = drag.start;
        match drag.mode {
            ManipulationMode::Translate => {
                let delta = point - drag.start_point;
                next.translation = match drag.axis {
                    GizmoAxis::Uniform => pivot + delta,
                    _ => pivot + drag.direction * delta.dot(drag.direction),
                };
            }
            ManipulationMode::Rotate => {
                let from = drag.start_point - pivot;
                let to = point - pivot;
                if from.length_squared() < EPSILON || to.length_squared() < EPSILON {
                    return None;
                }
                let angle = from.cross(to).dot(drag.direction).atan2(from.dot(to));
                next.rotation =
                    (DQuat::from_axis_angle(drag.direction, angle) * drag.start.rotation).normalize();
            }
            ManipulationMode::Scale => {
                let ratio = match drag.axis {
                    GizmoAxis::Uniform => {
                        let from = (drag.start_point - pivot).length();
                        if from < EPSILON {
                            return None;
                        }
                        (point - pivot).length() / from
                    }
                    _ => {
                        let from = (drag.start_point - pivot).dot(drag.direction);
                        if from.abs() < EPSILON {
                            return None;
                        }
                        (point - pivot).dot(drag.direction) / from
                    }
                };
                let min = self.min_scale;
                next.scale = match drag.axis.index() {
                    Some(i) => {
                        let mut scale = drag.start.scale;
                        scale[i] = (scale[i] * ratio).max(min);
                        scale
                    }
                    None => (drag.start.scale * ratio).max(DVec3::splat(min)),
                };
            }
        }

        self.transform = next;
        Some(next)
    }

    /// Finish the drag, keeping the current transform.
    pub fn end_drag(&mut self) -> bool {
        self.drag.take().is_some()
    }

    /// Abort the drag. Returns the transform from before it started.
    pub fn cancel_drag(&mut self) -> Option<WorldTransform> {
        let drag = self.drag.take()?;
        self.transform = drag.start;
        Some(drag.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn attached(mode: ManipulationMode) -> Gizmo {
        let mut gizmo = Gizmo::new(0.01);
        gizmo.set_mode(mode);
        gizmo.attach(ModelId::new(), WorldTransform::default());
        gizmo
    }

    /// Looking straight down -Y from above.
    fn ray_above(x: f64, z: f64) -> Ray {
        Ray::new(DVec3::new(x, 100.0, z), DVec3::NEG_Y)
    }

    #[test]
    fn test_detached_gizmo_does_not_drag() {
        let mut gizmo = Gizmo::new(0.01);
        assert!(!gizmo.begin_drag(GizmoAxis::X, &ray_above(0.0, 0.0), DVec3::NEG_Y));
        assert!(gizmo.drag(&ray_above(1.0, 0.0)).is_none());
    }

    #[test]
    fn test_translate_along_axis() {
        let mut gizmo = attached(ManipulationMode::Translate);
        assert!(gizmo.begin_drag(GizmoAxis::X, &ray_above(0.0, 0.0), DVec3::NEG_Y));
        let moved = gizmo.drag(&ray_above(12.0, 7.0)).expect("Should move");
        // Z component of the pointer motion is discarded
        assert!(moved.translation.abs_diff_eq(DVec3::new(12.0, 0.0, 0.0), 1e-9));
        assert!(gizmo.end_drag());
        assert!(!gizmo.is_dragging());
    }

    #[test]
    fn test_translate_uniform_moves_in_view_plane() {
        let mut gizmo = attached(ManipulationMode::Translate);
        assert!(gizmo.begin_drag(GizmoAxis::Uniform, &ray_above(0.0, 0.0), DVec3::NEG_Y));
        let moved = gizmo.drag(&ray_above(3.0, -4.0)).expect("Should move");
        assert!(moved.translation.abs_diff_eq(DVec3::new(3.0, 0.0, -4.0), 1e-9));
    }

    #[test]
    fn test_rotate_about_axis() {
        let mut gizmo = attached(ManipulationMode::Rotate);
        assert!(gizmo.begin_drag(GizmoAxis::Y, &ray_above(10.0, 0.0), DVec3::NEG_Y));
        let rotated = gizmo.drag(&ray_above(0.0, -10.0)).expect("Should rotate");
        // +X to -Z is a positive quarter turn about +Y
        let expected = DQuat::from_rotation_y(FRAC_PI_2);
        assert!(rotated.rotation.abs_diff_eq(expected, 1e-9));
        assert_eq!(rotated.translation, DVec3::ZERO);
    }

    #[test]
    fn test_scale_along_local_axis() {
        let mut gizmo = attached(ManipulationMode::Scale);
        assert!(gizmo.begin_drag(GizmoAxis::X, &ray_above(10.0, 0.0), DVec3::NEG_Y));
        let scaled = gizmo.drag(&ray_above(25.0, 0.0)).expect("Should scale");
        assert!(scaled.scale.abs_diff_eq(DVec3::new(2.5, 1.0, 1.0), 1e-9));
    }

    #[test]
    fn test_scale_clamped_to_minimum() {
        let mut gizmo = attached(ManipulationMode::Scale);
        assert!(gizmo.begin_drag(GizmoAxis::Uniform, &ray_above(10.0, 0.0), DVec3::NEG_Y));
        let scaled = gizmo.drag(&ray_above(0.0, 0.0)).expect("Should scale");
        assert_eq!(scaled.scale, DVec3::splat(0.01));
    }

    #[test]
    fn test_cancel_restores_start() {
        let mut gizmo = attached(ManipulationMode::Translate);
        gizmo.begin_drag(GizmoAxis::Z, &ray_above(0.0, 0.0), DVec3::NEG_Y);
        gizmo.drag(&ray_above(0.0, 40.0));
        let restored = gizmo.cancel_drag().expect("Should have been dragging");
        assert_eq!(restored, WorldTransform::default());
        assert_eq!(*gizmo.transform(), WorldTransform::default());
        assert!(gizmo.cancel_drag().is_none());
    }

    #[test]
    fn test_mode_switch_mid_drag_keeps_drag_mode() {
        let mut gizmo = attached(ManipulationMode::Translate);
        assert!(gizmo.begin_drag(GizmoAxis::X, &ray_above(0.0, 0.0), DVec3::NEG_Y));
        let moved = gizmo.drag(&ray_above(30.0, 0.0)).expect("Should move");
        assert!(moved.translation.abs_diff_eq(DVec3::new(30.0, 0.0, 0.0), 1e-9));

        gizmo.set_mode(ManipulationMode::Rotate);
        let moved = gizmo.drag(&ray_above(40.0, 0.0)).expect("Should keep moving");
        assert!(moved.translation.abs_diff_eq(DVec3::new(40.0, 0.0, 0.0), 1e-9));
        assert_eq!(moved.rotation, DQuat::IDENTITY);
        assert!(gizmo.end_drag());

        // The new mode applies to the next drag
        assert_eq!(gizmo.mode(), ManipulationMode::Rotate);
        assert!(gizmo.begin_drag(GizmoAxis::Y, &ray_above(50.0, 0.0), DVec3::NEG_Y));
        let rotated = gizmo.drag(&ray_above(40.0, -10.0)).expect("Should rotate");
        assert!(rotated.translation.abs_diff_eq(DVec3::new(40.0, 0.0, 0.0), 1e-9));
        assert!(rotated.rotation.abs_diff_eq(DQuat::from_rotation_y(FRAC_PI_2), 1e-9));
    }

    #[test]
    fn test_hit_handle() {
        let gizmo = attached(ManipulationMode::Translate);
        assert_eq!(
            gizmo.hit_handle(&ray_above(20.0, 0.5), 30.0, 1.0),
            Some(GizmoAxis::X)
        );
        assert_eq!(
            gizmo.hit_handle(&ray_above(0.2, 0.2), 30.0, 1.0),
            Some(GizmoAxis::Uniform)
        );
        assert_eq!(gizmo.hit_handle(&ray_above(20.0, 20.0), 30.0, 1.0), None);
    }

    #[test]
    fn test_detach_drops_drag() {
        let mut gizmo = attached(ManipulationMode::Translate);
        gizmo.begin_drag(GizmoAxis::X, &ray_above(0.0, 0.0), DVec3::NEG_Y);
        gizmo.detach();
        assert!(!gizmo.is_attached());
        assert!(!gizmo.is_dragging());
    }
}
