//! # Scene renderer
//!
//! Owns every mesh instance and GPU handle. [`SceneRenderer::reconcile`]
//! diffs the store's model list against the live instances:
//!
//! 1. models without an instance and without a load in flight (or a
//!    recorded failure) start an async load;
//! 2. models with an instance get their world transform re-applied;
//! 3. instances whose model is gone are detached and released in the same
//!    call, so no later frame can reference them.
//!
//! Loads report over an unbounded channel that the render loop drains with
//! [`SceneRenderer::drain_completions`]. A completion for a model that has
//! left the store is dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use buildplate_core::{AppEvent, EventBus, ModelId, Notification, SceneEvent};
use buildplate_devicedb::BuildVolume;
use buildplate_settings::{AppearanceSettings, LightingSettings};
use glam::{DMat4, DVec3, Mat4};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{LoadError, LoadResult, RenderResult};
use crate::frame::{PlacementFrame, WorldTransform};
use crate::geometry::{LineSet, MeshGeometry};
use crate::loader::{prepare_geometry, GeometryLoader};
use crate::scene::backend::{DrawItem, FrameSubmission, RenderBackend, UploadData};
use crate::scene::graph::{NodeGeometry, NodeId, NodeKind, SceneGraph, SceneNode};
use crate::scene::material::Material;
use crate::store::{Model, ModelStore};

/// Toast title for geometry load failures.
pub const LOAD_ERROR_TITLE: &str = "Error loading model";

/// A loaded model in the scene.
#[derive(Debug, Clone)]
struct Instance {
    mesh: NodeId,
    outline: NodeId,
    extents: DVec3,
    triangles: usize,
    world: WorldTransform,
}

#[derive(Debug, Clone, PartialEq)]
enum LoadState {
    Pending,
    Failed(String),
}

#[derive(Debug)]
enum Completion {
    Model {
        id: ModelId,
        path: String,
        result: LoadResult<MeshGeometry>,
    },
    Plate {
        generation: u64,
        printer_id: String,
        result: LoadResult<MeshGeometry>,
    },
}

/// Counters for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RendererStats {
    pub instances: usize,
    pub pending_loads: usize,
    pub failed_loads: usize,
    pub triangles: usize,
    pub nodes: usize,
}

impl std::fmt::Display for RendererStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} instances, {} loading, {} failed, {} triangles",
            self.instances, self.pending_loads, self.failed_loads, self.triangles
        )
    }
}

/// Camera state a frame is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    pub view: DMat4,
    pub projection: DMat4,
    pub eye: DVec3,
}

fn to_f32(m: DMat4) -> Mat4 {
    Mat4::from_cols_array(&m.to_cols_array().map(|v| v as f32))
}

pub struct SceneRenderer<B: RenderBackend> {
    backend: B,
    graph: SceneGraph,
    instances: BTreeMap<ModelId, Instance>,
    loads: HashMap<ModelId, LoadState>,
    loader: Arc<dyn GeometryLoader>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    tasks: Vec<JoinHandle<()>>,
    frame: PlacementFrame,
    plate: Option<NodeId>,
    printable_area: Option<NodeId>,
    plate_generation: u64,
    appearance: AppearanceSettings,
    bus: Arc<EventBus>,
    notifications: Vec<Notification>,
}

impl<B: RenderBackend> SceneRenderer<B> {
    pub fn new(
        backend: B,
        loader: Arc<dyn GeometryLoader>,
        bus: Arc<EventBus>,
        appearance: AppearanceSettings,
        volume: &BuildVolume,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            graph: SceneGraph::new(),
            instances: BTreeMap::new(),
            loads: HashMap::new(),
            loader,
            tx,
            rx,
            tasks: Vec::new(),
            frame: PlacementFrame::for_area(&volume.printable_area),
            plate: None,
            printable_area: None,
            plate_generation: 0,
            appearance,
            bus,
            notifications: Vec::new(),
        }
    }

    fn publish(&self, event: SceneEvent) {
        // Nobody listening is fine
        let _ = self.bus.publish(AppEvent::Scene(event));
    }

    fn notify(&mut self, notification: Notification) {
        let _ = self
            .bus
            .publish(AppEvent::Notification(notification.clone()));
        self.notifications.push(notification);
    }

    /// Bring instances in line with the store's model list.
    pub fn reconcile(&mut self, store: &ModelStore) {
        for model in store.models() {
            if self.instances.contains_key(&model.id) {
                self.apply_transform(model);
            } else if !self.loads.contains_key(&model.id) {
                self.start_load(model.id, &model.file_path);
            }
        }

        let stale: Vec<ModelId> = self
            .instances
            .keys()
            .filter(|id| !store.contains(**id))
            .copied()
            .collect();
        for id in stale {
            self.release_instance(id);
        }

        // Failures of removed models are forgotten; pending loads stay
        // until their completion is discarded.
        self.loads
            .retain(|id, state| *state == LoadState::Pending || store.contains(*id));
    }

    fn start_load(&mut self, id: ModelId, path: &str) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                self.fail_load(id, LoadError::NoRuntime(path.to_string()).to_string());
                return;
            }
        };

        tracing::info!("Loading {} from {}", id, path);
        self.loads.insert(id, LoadState::Pending);
        self.publish(SceneEvent::LoadStarted {
            id,
            path: path.to_string(),
        });

        let loader = self.loader.clone();
        let tx = self.tx.clone();
        let path = path.to_string();
        let task = runtime.spawn(async move {
            let result = loader.load(&path).await;
            // Receiver gone means the renderer was dropped
            let _ = tx.send(Completion::Model { id, path, result });
        });
        self.tasks.push(task);
    }

    fn fail_load(&mut self, id: ModelId, message: String) {
        tracing::warn!("Failed to load {}: {}", id, message);
        self.loads.insert(id, LoadState::Failed(message.clone()));
        self.publish(SceneEvent::LoadFailed {
            id,
            error: message.clone(),
        });
        self.notify(Notification::error(LOAD_ERROR_TITLE, message));
    }

    /// Forget a recorded failure so the next reconcile loads again.
    /// Returns false if there was no failure for `id`.
    pub fn retry_load(&mut self, id: ModelId) -> bool {
        match self.loads.get(&id) {
            Some(LoadState::Failed(_)) => {
                self.loads.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Apply finished loads. Never blocks. Returns the number handled.
    pub fn drain_completions(&mut self, store: &ModelStore) -> usize {
        let mut handled = 0;
        while let Ok(completion) = self.rx.try_recv() {
            handled += 1;
            match completion {
                Completion::Model { id, path, result } => {
                    self.complete_model(store, id, &path, result)
                }
                Completion::Plate {
                    generation,
                    printer_id,
                    result,
                } => self.complete_plate(generation, &printer_id, result),
            }
        }
        handled
    }

    fn complete_model(
        &mut self,
        store: &ModelStore,
        id: ModelId,
        path: &str,
        result: LoadResult<MeshGeometry>,
    ) {
        self.loads.remove(&id);
        // Re-fetch: the model may have been removed while loading
        let Some(model) = store.model(id) else {
            tracing::debug!("Discarding load of removed {}", id);
            self.publish(SceneEvent::LoadDiscarded { id });
            return;
        };
        if self.instances.contains_key(&id) {
            return;
        }

        let geometry = match result.and_then(|g| prepare_geometry(path, g)) {
            Ok(geometry) => geometry,
            Err(e) => {
                self.fail_load(id, e.to_string());
                return;
            }
        };

        let model = model.clone();
        if let Err(e) = self.attach_instance(&model, geometry) {
            self.fail_load(id, e.to_string());
        }
    }

    fn attach_instance(&mut self, model: &Model, geometry: MeshGeometry) -> RenderResult<()> {
        let outline = geometry.feature_edges(self.appearance.outline_edge_angle_deg);
        let mesh_handle = self.backend.upload(UploadData::Mesh(&geometry))?;
        let outline_handle = match self.backend.upload(UploadData::Lines(&outline)) {
            Ok(handle) => handle,
            Err(e) => {
                self.backend.release(mesh_handle);
                return Err(e);
            }
        };

        let extents = geometry.extents();
        let triangles = geometry.triangle_count();
        let world = self.frame.world_from_logical(&model.transform(), extents);

        let mesh = self.graph.insert(
            SceneNode::new(
                NodeKind::ModelMesh,
                NodeGeometry::Mesh(Arc::new(geometry)),
                mesh_handle,
                Material::model(&self.appearance),
            )
            .with_local(world.to_matrix())
            .with_tag(model.id),
            None,
        );
        let outline = self.graph.insert(
            SceneNode::new(
                NodeKind::Outline,
                NodeGeometry::Lines(Arc::new(outline)),
                outline_handle,
                Material::outline(&self.appearance),
            )
            .hidden(),
            Some(mesh),
        );

        self.instances.insert(
            model.id,
            Instance {
                mesh,
                outline,
                extents,
                triangles,
                world,
            },
        );
        tracing::info!("Loaded {} ({} triangles)", model.id, triangles);
        self.publish(SceneEvent::LoadCompleted {
            id: model.id,
            triangles,
        });
        Ok(())
    }

    fn apply_transform(&mut self, model: &Model) {
        let Some(instance) = self.instances.get_mut(&model.id) else {
            return;
        };
        instance.world = self
            .frame
            .world_from_logical(&model.transform(), instance.extents);
        if let Some(node) = self.graph.get_mut(instance.mesh) {
            node.local = instance.world.to_matrix();
        }
    }

    /// Detach and release one subtree, each handle exactly once.
    fn release_node(&mut self, node: NodeId) {
        for removed in self.graph.detach(node) {
            self.backend.release(removed.handle);
        }
    }

    fn release_instance(&mut self, id: ModelId) {
        let Some(instance) = self.instances.remove(&id) else {
            return;
        };
        self.release_node(instance.mesh);
        tracing::debug!("Released instance of {}", id);
        self.publish(SceneEvent::InstanceReleased { id });
    }

    /// Recompute outline visibility, hover tint and invalid tint.
    pub fn apply_visuals(
        &mut self,
        store: &ModelStore,
        selected: Option<ModelId>,
        hovered: Option<ModelId>,
    ) {
        for (id, instance) in &self.instances {
            let material = Material::model_state(
                &self.appearance,
                hovered == Some(*id),
                store.has_errors(*id),
            );
            if let Some(node) = self.graph.get_mut(instance.mesh) {
                node.material = material;
            }
            if let Some(node) = self.graph.get_mut(instance.outline) {
                node.visible = selected == Some(*id);
            }
        }
    }

    /// Replace the build plate and printable-area box, then re-place every
    /// instance in the new frame.
    pub fn set_build_volume(&mut self, volume: &BuildVolume, store: &ModelStore) {
        self.frame = PlacementFrame::for_area(&volume.printable_area);

        if let Some(plate) = self.plate.take() {
            self.release_node(plate);
        }
        if let Some(area) = self.printable_area.take() {
            self.release_node(area);
        }

        let size = DVec3::from_array(volume.printable_area.size());
        let edges = LineSet::box_edges(size);
        match self.backend.upload(UploadData::Lines(&edges)) {
            Ok(handle) => {
                let node = SceneNode::new(
                    NodeKind::PrintableArea,
                    NodeGeometry::Lines(Arc::new(edges)),
                    handle,
                    Material::printable_area(&self.appearance),
                )
                .with_local(self.frame.printable_area_matrix());
                self.printable_area = Some(self.graph.insert(node, None));
            }
            Err(e) => tracing::warn!("Printable area upload failed: {}", e),
        }

        self.plate_generation += 1;
        self.start_plate_load(volume);

        for model in store.models() {
            self.apply_transform(model);
        }
    }

    fn start_plate_load(&mut self, volume: &BuildVolume) {
        let printer_id = volume.printer_id.clone();
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                let error = LoadError::NoRuntime(volume.asset.path.clone()).to_string();
                tracing::warn!("Build plate for {} not loaded: {}", printer_id, error);
                self.publish(SceneEvent::BuildPlateFailed { printer_id, error });
                return;
            }
        };

        let generation = self.plate_generation;
        let loader = self.loader.clone();
        let tx = self.tx.clone();
        let path = volume.asset.path.clone();
        let task = runtime.spawn(async move {
            let result = loader.load(&path).await;
            let _ = tx.send(Completion::Plate {
                generation,
                printer_id,
                result,
            });
        });
        self.tasks.push(task);
    }

    fn complete_plate(
        &mut self,
        generation: u64,
        printer_id: &str,
        result: LoadResult<MeshGeometry>,
    ) {
        if generation != self.plate_generation {
            tracing::debug!("Dropping stale build plate for {}", printer_id);
            return;
        }
        let geometry = match result.and_then(|g| prepare_geometry(printer_id, g)) {
            Ok(geometry) => geometry,
            Err(e) => {
                tracing::warn!("Build plate for {} failed: {}", printer_id, e);
                self.publish(SceneEvent::BuildPlateFailed {
                    printer_id: printer_id.to_string(),
                    error: e.to_string(),
                });
                return;
            }
        };
        let handle = match self.backend.upload(UploadData::Mesh(&geometry)) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Build plate upload failed: {}", e);
                return;
            }
        };
        let node = SceneNode::new(
            NodeKind::BuildPlate,
            NodeGeometry::Mesh(Arc::new(geometry)),
            handle,
            Material::plate(&self.appearance),
        )
        .with_local(self.frame.plate_matrix());
        self.plate = Some(self.graph.insert(node, None));
        tracing::info!("Build plate loaded for {}", printer_id);
        self.publish(SceneEvent::BuildPlateLoaded {
            printer_id: printer_id.to_string(),
        });
    }

    /// Wait for every spawned load to finish. Completions still need
    /// draining afterwards.
    pub async fn settle(&mut self) {
        while !self.tasks.is_empty() {
            let tasks = std::mem::take(&mut self.tasks);
            for task in tasks {
                if let Err(e) = task.await {
                    tracing::warn!("Load task ended abnormally: {}", e);
                }
            }
        }
    }

    /// Build the draw list for the current scene.
    pub fn frame_submission(&self, view: &ViewParams, lighting: &LightingSettings) -> FrameSubmission {
        let mut items = Vec::new();
        self.graph.visit_visible(|_, node, world| {
            items.push(DrawItem {
                handle: node.handle,
                kind: node.geometry.kind(),
                model_matrix: to_f32(world),
                material: node.material,
            });
        });
        FrameSubmission {
            view: to_f32(view.view),
            projection: to_f32(view.projection),
            camera_position: view.eye.as_vec3(),
            lighting: lighting.clone(),
            items,
        }
    }

    /// Submit one frame to the backend.
    pub fn render(&mut self, view: &ViewParams, lighting: &LightingSettings) -> RenderResult<()> {
        self.tasks.retain(|t| !t.is_finished());
        let submission = self.frame_submission(view, lighting);
        self.backend.draw(&submission)
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn has_instance(&self, id: ModelId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn instance_ids(&self) -> Vec<ModelId> {
        self.instances.keys().copied().collect()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Extents of the loaded, centred geometry.
    pub fn extents(&self, id: ModelId) -> Option<DVec3> {
        self.instances.get(&id).map(|i| i.extents)
    }

    pub fn world_transform(&self, id: ModelId) -> Option<WorldTransform> {
        self.instances.get(&id).map(|i| i.world)
    }

    pub fn mesh_node(&self, id: ModelId) -> Option<NodeId> {
        self.instances.get(&id).map(|i| i.mesh)
    }

    pub fn outline_node(&self, id: ModelId) -> Option<NodeId> {
        self.instances.get(&id).map(|i| i.outline)
    }

    pub fn is_loading(&self, id: ModelId) -> bool {
        self.loads.get(&id) == Some(&LoadState::Pending)
    }

    pub fn load_failure(&self, id: ModelId) -> Option<&str> {
        match self.loads.get(&id) {
            Some(LoadState::Failed(message)) => Some(message),
            _ => None,
        }
    }

    pub fn has_build_plate(&self) -> bool {
        self.plate.is_some()
    }

    pub fn printable_area_node(&self) -> Option<NodeId> {
        self.printable_area
    }

    pub fn placement_frame(&self) -> &PlacementFrame {
        &self.frame
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn appearance(&self) -> &AppearanceSettings {
        &self.appearance
    }

    pub fn stats(&self) -> RendererStats {
        let failed_loads = self
            .loads
            .values()
            .filter(|s| matches!(s, LoadState::Failed(_)))
            .count();
        RendererStats {
            instances: self.instances.len(),
            pending_loads: self.loads.len() - failed_loads,
            failed_loads,
            triangles: self.instances.values().map(|i| i.triangles).sum(),
            nodes: self.graph.len(),
        }
    }
}

impl<B: RenderBackend> Drop for SceneRenderer<B> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
