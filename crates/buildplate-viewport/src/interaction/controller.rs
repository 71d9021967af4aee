//! Pointer handling for the viewport.
//!
//! The controller owns the camera, the gizmo and the hovered model. It
//! never holds model references: every handler re-reads the store and the
//! renderer it is given.

use std::sync::Arc;

use buildplate_core::{AppEvent, EventBus, InteractionEvent, ManipulationMode, ModelId};
use buildplate_settings::{CameraSettings, InteractionSettings};
use glam::{DVec2, DVec3};
use tokio::sync::watch;

use crate::interaction::camera::{OrbitCamera, Ray};
use crate::interaction::gizmo::{Gizmo, GizmoAxis};
use crate::interaction::picking::{pick, PickHit};
use crate::scene::{RenderBackend, SceneRenderer, ViewParams};
use crate::store::ModelStore;
use crate::transform::TransformPatch;

/// Gizmo handle length as a fraction of camera distance.
const HANDLE_SCALE: f64 = 0.15;

/// Pointer movement, in pixels, below which a press-release counts as a
/// click.
const CLICK_SLOP: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointerState {
    Idle,
    Orbiting,
    Dragging(ModelId),
}

pub struct InteractionController {
    camera: OrbitCamera,
    gizmo: Gizmo,
    hovered: Option<ModelId>,
    tool: watch::Receiver<Option<ManipulationMode>>,
    line_threshold: f64,
    bus: Arc<EventBus>,
    width: f64,
    height: f64,
    pointer: PointerState,
    press: Option<DVec2>,
    last: Option<DVec2>,
    moved: bool,
}

impl InteractionController {
    pub fn new(
        camera: &CameraSettings,
        interaction: &InteractionSettings,
        tool: watch::Receiver<Option<ManipulationMode>>,
        bus: Arc<EventBus>,
    ) -> Self {
        let mut controller = Self {
            camera: OrbitCamera::from_settings(camera, interaction.orbit_speed),
            gizmo: Gizmo::new(interaction.min_scale),
            hovered: None,
            tool,
            line_threshold: interaction.line_pick_threshold,
            bus,
            width: 1.0,
            height: 1.0,
            pointer: PointerState::Idle,
            press: None,
            last: None,
            moved: false,
        };
        controller.apply_tool_mode();
        controller
    }

    fn publish(&self, event: InteractionEvent) {
        let _ = self.bus.publish(AppEvent::Interaction(event));
    }

    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
        self.camera.update_aspect_ratio(self.width, self.height);
    }

    pub fn viewport_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn view_params(&self) -> ViewParams {
        self.camera.view_params()
    }

    pub fn gizmo(&self) -> &Gizmo {
        &self.gizmo
    }

    pub fn hovered(&self) -> Option<ModelId> {
        self.hovered
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.pointer, PointerState::Dragging(_))
    }

    pub fn mode(&self) -> ManipulationMode {
        self.gizmo.mode()
    }

    fn apply_tool_mode(&mut self) -> Option<ManipulationMode> {
        let requested = *self.tool.borrow_and_update();
        self.gizmo.set_mode(requested.unwrap_or_default());
        requested
    }

    /// Pick up a new tool broadcast. Returns true if the mode changed.
    pub fn sync_tool(&mut self) -> bool {
        if !matches!(self.tool.has_changed(), Ok(true)) {
            return false;
        }
        let requested = self.apply_tool_mode();
        tracing::debug!("Gizmo mode {}", self.gizmo.mode());
        self.publish(InteractionEvent::ToolChanged { mode: requested });
        true
    }

    pub fn ray_at(&self, x: f64, y: f64) -> Ray {
        self.camera.ray_from_screen(x, y, self.width, self.height)
    }

    pub fn pick_at<B: RenderBackend>(
        &self,
        renderer: &SceneRenderer<B>,
        x: f64,
        y: f64,
    ) -> Option<PickHit> {
        pick(renderer.graph(), &self.ray_at(x, y), self.line_threshold)
    }

    /// Select the model under the pointer, or clear the selection on a miss.
    pub fn click<B: RenderBackend>(
        &mut self,
        store: &mut ModelStore,
        renderer: &SceneRenderer<B>,
        x: f64,
        y: f64,
    ) -> Option<ModelId> {
        let picked = self.pick_at(renderer, x, y).map(|hit| hit.model_id);
        store.select_model(picked);
        picked
    }

    /// Update the hovered model. Returns true if it changed.
    pub fn hover<B: RenderBackend>(&mut self, renderer: &SceneRenderer<B>, x: f64, y: f64) -> bool {
        let hovered = self.pick_at(renderer, x, y).map(|hit| hit.model_id);
        self.set_hovered(hovered)
    }

    fn set_hovered(&mut self, hovered: Option<ModelId>) -> bool {
        if self.hovered == hovered {
            return false;
        }
        self.hovered = hovered;
        self.publish(InteractionEvent::HoverChanged { hovered });
        true
    }

    /// Pointer left the canvas.
    pub fn pointer_leave(&mut self) -> bool {
        self.set_hovered(None)
    }

    /// Press: grab a gizmo handle if one is under the pointer, otherwise
    /// start orbiting.
    pub fn pointer_down<B: RenderBackend>(
        &mut self,
        store: &ModelStore,
        renderer: &SceneRenderer<B>,
        x: f64,
        y: f64,
    ) {
        let position = DVec2::new(x, y);
        self.press = Some(position);
        self.last = Some(position);
        self.moved = false;

        let ray = self.ray_at(x, y);
        let length = self.camera.distance * HANDLE_SCALE;
        let threshold = self.line_threshold.max(length * 0.08);
        let handle = self.gizmo.hit_handle(&ray, length, threshold);
        match handle {
            Some(axis) if self.begin_gizmo_drag(store, renderer, axis, &ray) => {}
            _ => self.pointer = PointerState::Orbiting,
        }
    }

    /// Start a gizmo drag on `axis`. Suspends camera orbit.
    pub fn begin_gizmo_drag<B: RenderBackend>(
        &mut self,
        store: &ModelStore,
        renderer: &SceneRenderer<B>,
        axis: GizmoAxis,
        ray: &Ray,
    ) -> bool {
        let Some(id) = self.gizmo.target() else {
            return false;
        };
        if !store.contains(id) || !renderer.has_instance(id) {
            return false;
        }
        let view_dir = (self.camera.target - self.camera.eye_position()).normalize_or_zero();
        if !self.gizmo.begin_drag(axis, ray, view_dir) {
            return false;
        }
        self.camera.set_orbit_enabled(false);
        self.pointer = PointerState::Dragging(id);
        tracing::debug!("Drag {:?} {} on {}", axis, self.gizmo.mode(), id);
        self.publish(InteractionEvent::DragStarted {
            id,
            mode: self.gizmo.mode(),
        });
        true
    }

    /// Move: continue a drag, orbit, and track hover.
    pub fn pointer_move<B: RenderBackend>(
        &mut self,
        store: &mut ModelStore,
        renderer: &SceneRenderer<B>,
        x: f64,
        y: f64,
    ) {
        let position = DVec2::new(x, y);
        if let Some(press) = self.press {
            if press.distance(position) > CLICK_SLOP {
                self.moved = true;
            }
        }
        let delta = self.last.map(|last| position - last).unwrap_or(DVec2::ZERO);
        self.last = Some(position);

        match self.pointer {
            PointerState::Dragging(_) => {
                let ray = self.ray_at(x, y);
                self.drag_to(store, renderer, &ray);
            }
            PointerState::Orbiting => {
                self.camera.orbit(delta.x, -delta.y);
                self.hover(renderer, x, y);
            }
            PointerState::Idle => {
                self.hover(renderer, x, y);
            }
        }
    }

    /// Apply one gizmo change: convert back to the logical frame and write
    /// the model's transform. Returns false if the model or its instance
    /// disappeared.
    pub fn drag_to<B: RenderBackend>(
        &mut self,
        store: &mut ModelStore,
        renderer: &SceneRenderer<B>,
        ray: &Ray,
    ) -> bool {
        let PointerState::Dragging(id) = self.pointer else {
            return false;
        };
        let Some(extents) = renderer.extents(id).filter(|_| store.contains(id)) else {
            self.finish_drag(id, true);
            return false;
        };
        let Some(world) = self.gizmo.drag(ray) else {
            return false;
        };
        let logical = renderer.placement_frame().logical_from_world(&world, extents);
        store.update_transform(id, TransformPatch::from_transform(&logical));
        true
    }

    /// Release: end a drag, or treat a still press as a click.
    pub fn pointer_up<B: RenderBackend>(
        &mut self,
        store: &mut ModelStore,
        renderer: &SceneRenderer<B>,
        x: f64,
        y: f64,
    ) {
        let pointer = self.pointer;
        let was_click = self.press.is_some() && !self.moved;
        self.press = None;
        self.last = None;

        match pointer {
            PointerState::Dragging(id) => {
                self.gizmo.end_drag();
                self.finish_drag(id, false);
            }
            PointerState::Orbiting | PointerState::Idle => {
                self.pointer = PointerState::Idle;
                if was_click {
                    self.click(store, renderer, x, y);
                }
            }
        }
    }

    /// Abort a drag and restore the transform from before it.
    pub fn cancel_drag<B: RenderBackend>(
        &mut self,
        store: &mut ModelStore,
        renderer: &SceneRenderer<B>,
    ) -> bool {
        let PointerState::Dragging(id) = self.pointer else {
            return false;
        };
        if let Some(start) = self.gizmo.cancel_drag() {
            if let Some(extents) = renderer.extents(id) {
                let logical = renderer.placement_frame().logical_from_world(&start, extents);
                store.update_transform(id, TransformPatch::from_transform(&logical));
            }
        }
        self.finish_drag(id, true);
        true
    }

    fn finish_drag(&mut self, id: ModelId, cancelled: bool) {
        if cancelled {
            self.gizmo.cancel_drag();
        }
        // Orbit comes back whatever ended the drag
        self.camera.set_orbit_enabled(true);
        self.pointer = PointerState::Idle;
        self.publish(InteractionEvent::DragEnded { id, cancelled });
    }

    /// Attach the gizmo to the selected model's instance, or detach it.
    pub fn update_gizmo_attachment<B: RenderBackend>(
        &mut self,
        store: &ModelStore,
        renderer: &SceneRenderer<B>,
    ) {
        let target = store
            .selected_model_id()
            .and_then(|id| renderer.world_transform(id).map(|world| (id, world)));
        match target {
            Some((id, world)) => {
                if let PointerState::Dragging(dragged) = self.pointer {
                    if dragged != id {
                        self.finish_drag(dragged, true);
                    }
                }
                self.gizmo.attach(id, world);
            }
            None => {
                if let PointerState::Dragging(dragged) = self.pointer {
                    self.finish_drag(dragged, true);
                }
                self.gizmo.detach();
            }
        }
    }

    pub fn zoom(&mut self, delta: f64) -> bool {
        self.camera.zoom(delta)
    }

    pub fn pan(&mut self, delta_x: f64, delta_y: f64) -> bool {
        self.camera.pan(delta_x, delta_y)
    }

    /// Frame the printable volume.
    pub fn fit_to_volume(&mut self, center: DVec3, size: DVec3) {
        self.camera.fit_to_bounds(center - size * 0.5, center + size * 0.5);
    }
}
