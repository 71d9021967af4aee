//! # Interaction
//!
//! Orbit camera, ray picking, the transform gizmo and the controller that
//! turns pointer input into selection, hover and transform updates.

pub mod camera;
pub mod controller;
pub mod gizmo;
pub mod picking;

pub use camera::{screen_to_ndc, OrbitCamera, Ray};
pub use controller::InteractionController;
pub use gizmo::{Gizmo, GizmoAxis};
pub use picking::{pick, ray_segment, ray_triangle, PickHit};
