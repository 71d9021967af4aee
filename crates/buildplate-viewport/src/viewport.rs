//! # Viewport
//!
//! Wires the model store, scene renderer, interaction controller,
//! placement monitor and adjustment panel together.
//!
//! The store publishes every mutation on the event bus. A bus subscription
//! queues the store events; [`Viewport::pump`] drains the queue and
//! dispatches:
//!
//! - model list or transform changed: reconcile the scene, revalidate
//! - printer changed: rebuild the build plate, revalidate
//! - selection or validation changed: restyle instances, re-attach the gizmo
//!
//! [`Viewport::frame`] is one render-loop tick. Nothing here blocks; loads
//! finish on the runtime and are picked up by the next tick.

use std::collections::VecDeque;
use std::sync::Arc;

use buildplate_core::{
    AppEvent, EventBus, EventCategory, EventFilter, ModelId, Notification, StoreEvent,
    SubscriptionId,
};
use buildplate_devicedb::{lookup_sample, BuildVolumeRegistry};
use buildplate_settings::{LightingSettings, ViewportConfig};
use glam::DVec3;
use parking_lot::Mutex;

use crate::error::{PanelResult, RenderResult};
use crate::interaction::InteractionController;
use crate::loader::GeometryLoader;
use crate::placement::{snap_in_store, PlacementMonitor};
use crate::scene::{RenderBackend, SceneRenderer};
use crate::store::ModelStore;
use crate::tools::{AdjustmentPanel, AdjustmentTool, MaterialSlot, PanelValues};
use crate::transform::TransformPatch;

/// Upper bound on dispatch rounds per pump. Validation writes back to the
/// store, which queues one more round; anything beyond that is a loop.
const MAX_PUMP_ROUNDS: usize = 8;

#[derive(Debug, Default, Clone, Copy)]
struct Dirty {
    reconcile: bool,
    revalidate: bool,
    plate: bool,
    visuals: bool,
    panel: bool,
    selection: bool,
}

impl Dirty {
    fn mark(&mut self, event: &StoreEvent) {
        if event.changes_model_list() {
            self.reconcile = true;
            self.revalidate = true;
            self.visuals = true;
            return;
        }
        match event {
            StoreEvent::ModelAdded { .. }
            | StoreEvent::ModelRemoved { .. }
            | StoreEvent::ModelsCleared => {}
            StoreEvent::TransformChanged { .. } => {
                self.reconcile = true;
                self.revalidate = true;
                self.visuals = true;
                self.panel = true;
            }
            StoreEvent::PrinterChanged { .. } => {
                self.plate = true;
                self.revalidate = true;
            }
            StoreEvent::SelectionChanged { .. } => {
                self.visuals = true;
                self.panel = true;
                self.selection = true;
            }
            StoreEvent::ValidationChanged { .. } => {
                self.visuals = true;
            }
        }
    }

    fn any(&self) -> bool {
        self.reconcile || self.revalidate || self.plate || self.visuals || self.panel
    }
}

pub struct Viewport<B: RenderBackend> {
    bus: Arc<EventBus>,
    store: ModelStore,
    renderer: SceneRenderer<B>,
    controller: InteractionController,
    panel: AdjustmentPanel,
    monitor: PlacementMonitor,
    lighting: LightingSettings,
    queue: Arc<Mutex<VecDeque<StoreEvent>>>,
    subscription: SubscriptionId,
    notifications: Vec<Notification>,
}

impl<B: RenderBackend> Viewport<B> {
    /// Viewport over the built-in printer table.
    pub fn new(config: &ViewportConfig, backend: B, loader: Arc<dyn GeometryLoader>) -> Self {
        Self::with_registry(config, BuildVolumeRegistry::builtin(), backend, loader)
    }

    pub fn with_registry(
        config: &ViewportConfig,
        registry: BuildVolumeRegistry,
        backend: B,
        loader: Arc<dyn GeometryLoader>,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let subscription = {
            let queue = queue.clone();
            bus.subscribe(
                EventFilter::Categories(vec![EventCategory::Store]),
                move |event| {
                    if let AppEvent::Store(event) = event {
                        queue.lock().push_back(event);
                    }
                },
            )
        };

        let store = ModelStore::with_printer(bus.clone(), registry, &config.printer.default_printer);
        let mut renderer = SceneRenderer::new(
            backend,
            loader,
            bus.clone(),
            config.appearance.clone(),
            store.build_volume(),
        );
        renderer.set_build_volume(store.build_volume(), &store);

        let panel = AdjustmentPanel::new();
        let controller = InteractionController::new(
            &config.camera,
            &config.interaction,
            panel.subscribe(),
            bus.clone(),
        );

        tracing::info!(
            "Viewport ready on {} ({})",
            store.build_volume().printer_name,
            store.build_volume().printable_area
        );

        Self {
            bus,
            store,
            renderer,
            controller,
            panel,
            monitor: PlacementMonitor::new(config.placement.scale_mode),
            lighting: config.lighting.clone(),
            queue,
            subscription,
            notifications: Vec::new(),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Direct store access. Changes take effect on the next
    /// [`Self::pump`] or [`Self::frame`].
    pub fn store_mut(&mut self) -> &mut ModelStore {
        &mut self.store
    }

    pub fn renderer(&self) -> &SceneRenderer<B> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut SceneRenderer<B> {
        &mut self.renderer
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut InteractionController {
        &mut self.controller
    }

    pub fn panel(&self) -> &AdjustmentPanel {
        &self.panel
    }

    pub fn monitor(&self) -> &PlacementMonitor {
        &self.monitor
    }

    pub fn hovered(&self) -> Option<ModelId> {
        self.controller.hovered()
    }

    /// Toasts raised so far (load failures and placement errors), oldest
    /// first. Draining.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, notification: Notification) {
        tracing::warn!("{}: {}", notification.title, notification.description);
        let _ = self
            .bus
            .publish(AppEvent::Notification(notification.clone()));
        self.notifications.push(notification);
    }

    /// Dispatch queued store events until the store is quiet.
    pub fn pump(&mut self) {
        let tool_changed = self.controller.sync_tool();
        let mut rounds = 0;
        loop {
            let events: Vec<StoreEvent> = self.queue.lock().drain(..).collect();
            if events.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > MAX_PUMP_ROUNDS {
                tracing::warn!("Store events still arriving after {} rounds", MAX_PUMP_ROUNDS);
                break;
            }
            let mut dirty = Dirty::default();
            for event in &events {
                dirty.mark(event);
            }
            self.dispatch(dirty);
        }
        if tool_changed {
            self.panel.sync_from_model(&self.store);
        }
    }

    fn dispatch(&mut self, dirty: Dirty) {
        if dirty.plate {
            self.renderer
                .set_build_volume(self.store.build_volume(), &self.store);
        }
        if dirty.reconcile {
            self.renderer.reconcile(&self.store);
        }
        if dirty.revalidate {
            self.revalidate();
        }
        if dirty.selection {
            let renderer = &self.renderer;
            let result = self.panel.apply_pending_drop(
                &mut self.store,
                |id| renderer.extents(id),
                self.monitor.scale_mode(),
            );
            if let Err(e) = result {
                tracing::debug!("Drop to plate deferred: {}", e);
            }
        }
        if dirty.panel {
            self.panel.sync_from_model(&self.store);
        }
        if dirty.any() {
            self.refresh_visuals();
        }
    }

    fn revalidate(&mut self) {
        let renderer = &self.renderer;
        if let Some(toast) = self
            .monitor
            .revalidate(&mut self.store, |id| renderer.extents(id))
        {
            self.notify(toast);
        }
    }

    fn refresh_visuals(&mut self) {
        self.renderer.apply_visuals(
            &self.store,
            self.store.selected_model_id(),
            self.controller.hovered(),
        );
        self.controller
            .update_gizmo_attachment(&self.store, &self.renderer);
    }

    /// Apply finished loads. Returns how many were handled.
    pub fn drain_loads(&mut self) -> usize {
        let handled = self.renderer.drain_completions(&self.store);
        for toast in self.renderer.take_notifications() {
            self.notifications.push(toast);
        }
        if handled > 0 {
            // New instances bring extents, which changes validation
            self.revalidate();
            self.pump();
            self.refresh_visuals();
        }
        handled
    }

    /// One render-loop tick.
    pub fn frame(&mut self) -> RenderResult<()> {
        self.drain_loads();
        self.pump();
        self.renderer
            .render(&self.controller.view_params(), &self.lighting)
    }

    /// Wait until no load is in flight and everything has been applied.
    pub async fn settle(&mut self) {
        loop {
            self.pump();
            self.renderer.settle().await;
            if self.drain_loads() == 0 {
                break;
            }
        }
        self.pump();
    }

    // Store operations. Each one pumps, so the scene is current on return.

    pub fn set_active_printer(&mut self, printer_id: &str) {
        self.store.set_active_printer(printer_id);
        self.pump();
    }

    /// Add a model; `name` defaults to the file's basename.
    pub fn add_model(&mut self, path: &str, name: Option<&str>) -> Option<ModelId> {
        let id = self.store.add_model(path, name);
        self.pump();
        id
    }

    pub fn remove_model(&mut self, id: ModelId) {
        self.store.remove_model(id);
        self.pump();
    }

    pub fn select_model(&mut self, id: Option<ModelId>) {
        self.store.select_model(id);
        self.pump();
    }

    pub fn update_transform(&mut self, id: ModelId, patch: TransformPatch) {
        self.store.update_transform(id, patch);
        self.pump();
    }

    pub fn clear_all(&mut self) {
        self.store.clear_all();
        self.pump();
    }

    /// Replace the plate contents with a sample model. `None` for unknown
    /// sample ids, leaving the plate untouched.
    pub fn load_sample(&mut self, sample_id: &str) -> Option<ModelId> {
        let sample = lookup_sample(sample_id)?;
        tracing::info!("Loading sample {}", sample.model_name);
        self.store.clear_all();
        let id = self.store.add_model(&sample.file_path, Some(&sample.model_name));
        self.pump();
        id
    }

    /// Snap a model onto the plate. False if it is unknown or not loaded.
    pub fn snap_to_build_plate(&mut self, id: ModelId) -> bool {
        let Some(extents) = self.renderer.extents(id) else {
            return false;
        };
        let snapped = snap_in_store(&mut self.store, id, extents, self.monitor.scale_mode());
        self.pump();
        snapped
    }

    /// Retry a failed load.
    pub fn retry_load(&mut self, id: ModelId) -> bool {
        let retried = self.renderer.retry_load(id);
        if retried {
            self.renderer.reconcile(&self.store);
        }
        retried
    }

    // Pointer input, in pixels from the top-left of the canvas.

    pub fn resize(&mut self, width: f64, height: f64) {
        self.controller.set_viewport_size(width, height);
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.controller
            .pointer_down(&self.store, &self.renderer, x, y);
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        let hovered = self.controller.hovered();
        self.controller
            .pointer_move(&mut self.store, &self.renderer, x, y);
        self.pump();
        if self.controller.hovered() != hovered {
            self.refresh_visuals();
        }
    }

    pub fn pointer_up(&mut self, x: f64, y: f64) {
        self.controller
            .pointer_up(&mut self.store, &self.renderer, x, y);
        self.pump();
    }

    pub fn pointer_leave(&mut self) {
        if self.controller.pointer_leave() {
            self.refresh_visuals();
        }
    }

    /// Press and release at the same spot.
    pub fn click(&mut self, x: f64, y: f64) -> Option<ModelId> {
        let picked = self
            .controller
            .click(&mut self.store, &self.renderer, x, y);
        self.pump();
        picked
    }

    /// Abort a gizmo drag, restoring the model.
    pub fn cancel_drag(&mut self) -> bool {
        let cancelled = self
            .controller
            .cancel_drag(&mut self.store, &self.renderer);
        self.pump();
        cancelled
    }

    // Adjustment panel.

    pub fn toggle_tool(&mut self, tool: AdjustmentTool) -> Option<AdjustmentTool> {
        let active = self.panel.toggle_tool(tool, &self.store);
        self.pump();
        active
    }

    pub fn apply_panel_values(&mut self, values: PanelValues) -> PanelResult<bool> {
        let applied = self.panel.apply_values(values, &mut self.store);
        self.pump();
        applied
    }

    pub fn set_uniform_scaling(&mut self, enabled: bool) {
        self.panel.set_uniform_scaling(enabled);
    }

    pub fn set_grid_placement(&mut self, enabled: bool) {
        self.panel.set_grid_placement(enabled);
    }

    pub fn set_drop_to_plate(&mut self, enabled: bool) -> PanelResult<bool> {
        let renderer = &self.renderer;
        let snapped = self.panel.set_drop_to_plate(
            enabled,
            &mut self.store,
            |id| renderer.extents(id),
            self.monitor.scale_mode(),
        );
        self.pump();
        snapped
    }

    pub fn cancel_tool(&mut self) {
        self.panel.cancel();
        self.pump();
    }

    pub fn confirm_tool(&mut self) -> Option<AdjustmentTool> {
        let tool = self.panel.confirm();
        self.pump();
        tool
    }

    pub fn select_material(&mut self, slot: MaterialSlot) -> Option<MaterialSlot> {
        self.panel.select_material(slot)
    }

    /// Point the camera at the printable volume.
    pub fn frame_build_volume(&mut self) {
        let frame = *self.renderer.placement_frame();
        let area = frame.area();
        let center = frame.to_render(DVec3::new(0.0, 0.0, area.height / 2.0));
        let size = DVec3::from_array(area.size());
        self.controller.fit_to_volume(center, size);
    }
}

impl<B: RenderBackend> Drop for Viewport<B> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}
