//! # Model store
//!
//! Single source of truth for placed models, the selection, the active
//! printer and the current placement errors. Every mutation publishes a
//! [`StoreEvent`] on the shared [`EventBus`] after it has been applied.
//!
//! Unknown ids are ignored rather than reported: callers may hold ids
//! that went stale while a load was in flight.

use std::sync::Arc;

use buildplate_core::{AppEvent, EventBus, ModelId, StoreEvent};
use buildplate_devicedb::{BuildVolume, BuildVolumeRegistry};
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::placement::ValidationError;
use crate::transform::{Transform, TransformPatch};

/// Attempts at generating a fresh id before `add_model` gives up.
const MAX_ID_ATTEMPTS: usize = 8;

/// A mesh placed on the build plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub name: String,
    /// Geometry source; never changes after the model is added.
    pub file_path: String,
    pub position: DVec3,
    /// XYZ Euler angles in radians.
    pub rotation: DVec3,
    pub scale: DVec3,
}

impl Model {
    fn new(id: ModelId, file_path: &str, name: Option<&str>) -> Self {
        let name = name
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_name(file_path));
        Self {
            id,
            name,
            file_path: file_path.to_string(),
            position: DVec3::ZERO,
            rotation: DVec3::ZERO,
            scale: DVec3::ONE,
        }
    }

    pub fn transform(&self) -> Transform {
        Transform {
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
        }
    }

    fn set_transform(&mut self, transform: Transform) {
        self.position = transform.position;
        self.rotation = transform.rotation;
        self.scale = transform.scale;
    }
}

fn default_name(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("Model")
        .to_string()
}

/// Serialisable view of the logical store state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub printer_id: String,
    pub selected: Option<ModelId>,
    pub models: Vec<Model>,
    pub validation_errors: Vec<ValidationError>,
}

pub struct ModelStore {
    bus: Arc<EventBus>,
    registry: BuildVolumeRegistry,
    models: Vec<Model>,
    selected: Option<ModelId>,
    build_volume: BuildVolume,
    validation_errors: Vec<ValidationError>,
    revision: u64,
}

impl ModelStore {
    /// Create an empty store on the registry's default printer.
    pub fn new(bus: Arc<EventBus>, registry: BuildVolumeRegistry) -> Self {
        let build_volume = registry.default_volume().clone();
        Self {
            bus,
            registry,
            models: Vec::new(),
            selected: None,
            build_volume,
            validation_errors: Vec::new(),
            revision: 0,
        }
    }

    /// Create an empty store on the given printer (unknown ids fall back).
    pub fn with_printer(bus: Arc<EventBus>, registry: BuildVolumeRegistry, printer_id: &str) -> Self {
        let mut store = Self::new(bus, registry);
        store.build_volume = store.registry.resolve(printer_id).clone();
        store
    }

    fn emit(&mut self, event: StoreEvent) {
        self.revision += 1;
        if let Err(e) = self.bus.publish(AppEvent::Store(event)) {
            tracing::trace!("Store event unobserved: {}", e);
        }
    }

    /// Switch printer. Always clears the selection.
    pub fn set_active_printer(&mut self, printer_id: &str) {
        self.build_volume = self.registry.resolve(printer_id).clone();
        tracing::info!(
            "Active printer: {} ({})",
            self.build_volume.printer_name,
            self.build_volume.printable_area
        );
        let printer_id = self.build_volume.printer_id.clone();
        self.emit(StoreEvent::PrinterChanged { printer_id });
        if self.selected.take().is_some() {
            self.emit(StoreEvent::SelectionChanged { selected: None });
        }
    }

    /// Append a model with an identity transform.
    ///
    /// Returns `None` only if no unused id could be generated.
    pub fn add_model(&mut self, path: &str, name: Option<&str>) -> Option<ModelId> {
        let id = (0..MAX_ID_ATTEMPTS)
            .map(|_| ModelId::new())
            .find(|id| !self.contains(*id));
        let Some(id) = id else {
            tracing::warn!("Could not generate a unique id for {}", path);
            return None;
        };

        let model = Model::new(id, path, name);
        tracing::debug!("Adding {} '{}' from {}", id, model.name, path);
        self.models.push(model);
        self.emit(StoreEvent::ModelAdded {
            id,
            path: path.to_string(),
        });
        Some(id)
    }

    pub fn remove_model(&mut self, id: ModelId) {
        let before = self.models.len();
        self.models.retain(|m| m.id != id);
        if self.models.len() == before {
            return;
        }
        tracing::debug!("Removed {}", id);
        self.emit(StoreEvent::ModelRemoved { id });

        if self.selected == Some(id) {
            self.selected = None;
            self.emit(StoreEvent::SelectionChanged { selected: None });
        }

        let error_count = self.validation_errors.len();
        self.validation_errors.retain(|e| e.model_id != id);
        if self.validation_errors.len() != error_count {
            let error_count = self.validation_errors.len();
            self.emit(StoreEvent::ValidationChanged { error_count });
        }
    }

    /// Set or clear the selection. The id is not checked for existence.
    pub fn select_model(&mut self, id: Option<ModelId>) {
        if self.selected == id {
            return;
        }
        self.selected = id;
        self.emit(StoreEvent::SelectionChanged { selected: id });
    }

    /// Merge the provided transform fields into a model.
    pub fn update_transform(&mut self, id: ModelId, patch: TransformPatch) {
        if patch.is_empty() {
            return;
        }
        let Some(model) = self.models.iter_mut().find(|m| m.id == id) else {
            return;
        };
        let mut transform = model.transform();
        if !transform.apply(&patch) {
            return;
        }
        model.set_transform(transform);
        self.emit(StoreEvent::TransformChanged { id });
    }

    /// Remove every model, the selection and all placement errors.
    pub fn clear_all(&mut self) {
        let had_selection = self.selected.take().is_some();
        let had_errors = !self.validation_errors.is_empty();
        self.models.clear();
        self.validation_errors.clear();
        tracing::debug!("Cleared all models");

        self.emit(StoreEvent::ModelsCleared);
        if had_selection {
            self.emit(StoreEvent::SelectionChanged { selected: None });
        }
        if had_errors {
            self.emit(StoreEvent::ValidationChanged { error_count: 0 });
        }
    }

    /// Replace the placement error list. Publishes only if it changed.
    pub fn set_validation_errors(&mut self, errors: Vec<ValidationError>) {
        if self.validation_errors == errors {
            return;
        }
        let error_count = errors.len();
        self.validation_errors = errors;
        self.emit(StoreEvent::ValidationChanged { error_count });
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.models.iter().any(|m| m.id == id)
    }

    pub fn model_ids(&self) -> Vec<ModelId> {
        self.models.iter().map(|m| m.id).collect()
    }

    /// The selection as stored; may name a model that no longer exists.
    pub fn selected_model_id(&self) -> Option<ModelId> {
        self.selected
    }

    /// The selected model, if the selection resolves.
    pub fn selected_model(&self) -> Option<&Model> {
        self.selected.and_then(|id| self.model(id))
    }

    pub fn active_printer(&self) -> &str {
        &self.build_volume.printer_id
    }

    pub fn build_volume(&self) -> &BuildVolume {
        &self.build_volume
    }

    pub fn registry(&self) -> &BuildVolumeRegistry {
        &self.registry
    }

    pub fn validation_errors(&self) -> &[ValidationError] {
        &self.validation_errors
    }

    pub fn errors_for(&self, id: ModelId) -> impl Iterator<Item = &ValidationError> {
        self.validation_errors.iter().filter(move |e| e.model_id == id)
    }

    pub fn has_errors(&self, id: ModelId) -> bool {
        self.errors_for(id).next().is_some()
    }

    /// Number of events published so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            printer_id: self.build_volume.printer_id.clone(),
            selected: self.selected,
            models: self.models.clone(),
            validation_errors: self.validation_errors.clone(),
        }
    }
}

impl std::fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore")
            .field("printer", &self.build_volume.printer_id)
            .field("models", &self.models.len())
            .field("selected", &self.selected)
            .field("validation_errors", &self.validation_errors.len())
            .field("revision", &self.revision)
            .finish()
    }
}
