//! # Adjustment tool panel
//!
//! Numeric editing of the selected model's transform, plus the toolbar
//! state that chooses the gizmo mode. The active mode is broadcast over a
//! [`ToolSignal`] that the interaction controller subscribes to.

use buildplate_core::{ManipulationMode, ModelId};
use buildplate_settings::ScaleMode;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{PanelError, PanelResult};
use crate::placement::snap_in_store;
use crate::store::ModelStore;
use crate::transform::TransformPatch;

/// Toolbar tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentTool {
    Move,
    Rotate,
    Scale,
    Multiply,
}

impl AdjustmentTool {
    /// Gizmo mode requested by the tool. Multiply has none.
    pub fn manipulation_mode(self) -> Option<ManipulationMode> {
        match self {
            AdjustmentTool::Move => Some(ManipulationMode::Translate),
            AdjustmentTool::Rotate => Some(ManipulationMode::Rotate),
            AdjustmentTool::Scale => Some(ManipulationMode::Scale),
            AdjustmentTool::Multiply => None,
        }
    }
}

impl std::fmt::Display for AdjustmentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjustmentTool::Move => write!(f, "move"),
            AdjustmentTool::Rotate => write!(f, "rotate"),
            AdjustmentTool::Scale => write!(f, "scale"),
            AdjustmentTool::Multiply => write!(f, "multiply"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialSlot {
    Material1,
    Material2,
}

/// Sender side of the gizmo-mode broadcast.
#[derive(Debug)]
pub struct ToolSignal {
    tx: watch::Sender<Option<ManipulationMode>>,
}

impl Default for ToolSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ManipulationMode>> {
        self.tx.subscribe()
    }

    /// Publish a mode. Receivers see a change even if the value repeats.
    pub fn broadcast(&self, mode: Option<ManipulationMode>) {
        self.tx.send_replace(mode);
    }

    pub fn current(&self) -> Option<ManipulationMode> {
        *self.tx.borrow()
    }
}

/// Text field contents of the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelValues {
    pub x: String,
    pub y: String,
    pub z: String,
    /// Scale as a percentage change; filled by the scale tool only.
    pub x_percent: Option<String>,
    pub y_percent: Option<String>,
    pub z_percent: Option<String>,
    pub copies: String,
}

impl Default for PanelValues {
    fn default() -> Self {
        Self {
            x: "0".to_string(),
            y: "0".to_string(),
            z: "0".to_string(),
            x_percent: None,
            y_percent: None,
            z_percent: None,
            copies: "1".to_string(),
        }
    }
}

impl PanelValues {
    pub fn xyz(x: &str, y: &str, z: &str) -> Self {
        Self {
            x: x.to_string(),
            y: y.to_string(),
            z: z.to_string(),
            ..Self::default()
        }
    }

    fn formatted(v: DVec3) -> Self {
        Self {
            x: format!("{:.2}", v.x),
            y: format!("{:.2}", v.y),
            z: format!("{:.2}", v.z),
            x_percent: None,
            y_percent: None,
            z_percent: None,
            copies: "1".to_string(),
        }
    }
}

fn parse_field(field: &str, value: &str, empty: f64) -> PanelResult<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(empty);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PanelError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Toolbar and numeric input state.
#[derive(Debug, Default)]
pub struct AdjustmentPanel {
    active_tool: Option<AdjustmentTool>,
    values: PanelValues,
    uniform_scaling: bool,
    drop_to_plate: bool,
    grid_placement: bool,
    selected_material: Option<MaterialSlot>,
    signal: ToolSignal,
}

impl AdjustmentPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ManipulationMode>> {
        self.signal.subscribe()
    }

    pub fn signal(&self) -> &ToolSignal {
        &self.signal
    }

    pub fn active_tool(&self) -> Option<AdjustmentTool> {
        self.active_tool
    }

    pub fn values(&self) -> &PanelValues {
        &self.values
    }

    pub fn uniform_scaling(&self) -> bool {
        self.uniform_scaling
    }

    pub fn drop_to_plate(&self) -> bool {
        self.drop_to_plate
    }

    pub fn grid_placement(&self) -> bool {
        self.grid_placement
    }

    pub fn selected_material(&self) -> Option<MaterialSlot> {
        self.selected_material
    }

    pub fn set_uniform_scaling(&mut self, enabled: bool) {
        self.uniform_scaling = enabled;
    }

    pub fn set_grid_placement(&mut self, enabled: bool) {
        self.grid_placement = enabled;
    }

    fn reset_transient(&mut self) {
        self.values = PanelValues::default();
        self.uniform_scaling = false;
        self.drop_to_plate = false;
        self.grid_placement = false;
    }

    fn set_active(&mut self, tool: Option<AdjustmentTool>) {
        self.active_tool = tool;
        if tool.is_none() {
            self.reset_transient();
        }
        self.signal
            .broadcast(tool.and_then(AdjustmentTool::manipulation_mode));
    }

    /// Activate `tool`, or deactivate it if it is already active.
    pub fn toggle_tool(&mut self, tool: AdjustmentTool, store: &ModelStore) -> Option<AdjustmentTool> {
        let next = if self.active_tool == Some(tool) {
            None
        } else {
            Some(tool)
        };
        tracing::debug!(
            "Tool {}",
            next.map_or_else(|| "none".to_string(), |t| t.to_string())
        );
        self.set_active(next);
        self.sync_from_model(store);
        next
    }

    /// Refresh the fields from the selected model. Returns false if there
    /// is nothing to show.
    pub fn sync_from_model(&mut self, store: &ModelStore) -> bool {
        let Some(model) = store.selected_model() else {
            return false;
        };
        let copies = std::mem::take(&mut self.values.copies);
        let mut values = match self.active_tool {
            Some(AdjustmentTool::Move) => PanelValues::formatted(model.position),
            Some(AdjustmentTool::Rotate) => PanelValues::formatted(DVec3::new(
                model.rotation.x.to_degrees(),
                model.rotation.y.to_degrees(),
                model.rotation.z.to_degrees(),
            )),
            Some(AdjustmentTool::Scale) => {
                let percent = (model.scale - DVec3::ONE) * 100.0;
                PanelValues {
                    x_percent: Some(format!("{:.2}", percent.x)),
                    y_percent: Some(format!("{:.2}", percent.y)),
                    z_percent: Some(format!("{:.2}", percent.z)),
                    ..PanelValues::formatted(model.scale)
                }
            }
            Some(AdjustmentTool::Multiply) | None => {
                self.values.copies = copies;
                return false;
            }
        };
        values.copies = copies;
        self.values = values;
        true
    }

    /// Store the edited fields and write them to the selected model.
    ///
    /// Returns `Ok(false)` when nothing was applied (no selection, or a tool
    /// without a transform). A field that does not parse leaves the store
    /// untouched.
    pub fn apply_values(&mut self, values: PanelValues, store: &mut ModelStore) -> PanelResult<bool> {
        self.values = values;
        let Some(id) = store.selected_model_id().filter(|id| store.contains(*id)) else {
            return Ok(false);
        };

        let patch = match self.active_tool {
            Some(AdjustmentTool::Move) => {
                TransformPatch::new().position(self.parse_xyz("position", 0.0)?)
            }
            Some(AdjustmentTool::Rotate) => {
                let degrees = self.parse_xyz("rotation", 0.0)?;
                TransformPatch::new().rotation(DVec3::new(
                    degrees.x.to_radians(),
                    degrees.y.to_radians(),
                    degrees.z.to_radians(),
                ))
            }
            Some(AdjustmentTool::Scale) => {
                let scale = if self.uniform_scaling && !self.values.x.trim().is_empty() {
                    DVec3::splat(parse_field("scale.x", &self.values.x, 1.0)?)
                } else {
                    self.parse_xyz("scale", 1.0)?
                };
                TransformPatch::new().scale(scale)
            }
            Some(AdjustmentTool::Multiply) | None => return Ok(false),
        };

        store.update_transform(id, patch);
        Ok(true)
    }

    fn parse_xyz(&self, prefix: &str, empty: f64) -> PanelResult<DVec3> {
        Ok(DVec3::new(
            parse_field(&format!("{}.x", prefix), &self.values.x, empty)?,
            parse_field(&format!("{}.y", prefix), &self.values.y, empty)?,
            parse_field(&format!("{}.z", prefix), &self.values.z, empty)?,
        ))
    }

    /// Toggle "drop down model". Enabling it snaps the selected model onto
    /// the plate and clears the flag again. With no selection the request
    /// stays pending until [`Self::apply_pending_drop`] finds one.
    pub fn set_drop_to_plate<F>(
        &mut self,
        enabled: bool,
        store: &mut ModelStore,
        extents_of: F,
        scale_mode: ScaleMode,
    ) -> PanelResult<bool>
    where
        F: Fn(ModelId) -> Option<DVec3>,
    {
        self.drop_to_plate = enabled;
        self.apply_pending_drop(store, extents_of, scale_mode)
    }

    /// Carry out a pending drop request. Returns true if a model was snapped.
    pub fn apply_pending_drop<F>(
        &mut self,
        store: &mut ModelStore,
        extents_of: F,
        scale_mode: ScaleMode,
    ) -> PanelResult<bool>
    where
        F: Fn(ModelId) -> Option<DVec3>,
    {
        if !self.drop_to_plate {
            return Ok(false);
        }
        let Some(id) = store.selected_model_id().filter(|id| store.contains(*id)) else {
            return Ok(false);
        };
        let Some(extents) = extents_of(id) else {
            return Err(PanelError::GeometryNotLoaded(id.to_string()));
        };
        let snapped = snap_in_store(store, id, extents, scale_mode);
        self.drop_to_plate = false;
        Ok(snapped)
    }

    /// Deactivate the tool and discard every transient setting.
    pub fn cancel(&mut self) {
        self.set_active(None);
    }

    /// Deactivate the tool. Returns the tool that was confirmed.
    pub fn confirm(&mut self) -> Option<AdjustmentTool> {
        let tool = self.active_tool;
        tracing::info!(
            "Confirm {:?}: copies={} grid_placement={}",
            tool,
            self.values.copies,
            self.grid_placement
        );
        self.set_active(None);
        tool
    }

    /// Select a material slot, or clear it if already selected.
    pub fn select_material(&mut self, slot: MaterialSlot) -> Option<MaterialSlot> {
        self.selected_material = if self.selected_material == Some(slot) {
            None
        } else {
            Some(slot)
        };
        self.selected_material
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildplate_core::EventBus;
    use buildplate_devicedb::BuildVolumeRegistry;
    use std::sync::Arc;

    fn store_with_selection() -> (ModelStore, ModelId) {
        let mut store = ModelStore::new(Arc::new(EventBus::new()), BuildVolumeRegistry::builtin());
        let id = store
            .add_model("/models/cube.stl", None)
            .expect("Should add model");
        store.select_model(Some(id));
        (store, id)
    }

    #[test]
    fn test_toggle_broadcasts_mode() {
        let (store, _) = store_with_selection();
        let mut panel = AdjustmentPanel::new();
        let rx = panel.subscribe();

        assert_eq!(panel.toggle_tool(AdjustmentTool::Rotate, &store), Some(AdjustmentTool::Rotate));
        assert_eq!(*rx.borrow(), Some(ManipulationMode::Rotate));

        assert_eq!(panel.toggle_tool(AdjustmentTool::Multiply, &store), Some(AdjustmentTool::Multiply));
        assert_eq!(*rx.borrow(), None);

        assert_eq!(panel.toggle_tool(AdjustmentTool::Multiply, &store), None);
        assert_eq!(panel.active_tool(), None);
        assert_eq!(*rx.borrow(), None);
    }

    #[test]
    fn test_sync_formats_values() {
        let (mut store, id) = store_with_selection();
        store.update_transform(
            id,
            TransformPatch::new()
                .position(DVec3::new(1.5, -2.0, 3.456))
                .rotation(DVec3::new(std::f64::consts::FRAC_PI_2, 0.0, 0.0))
                .scale(DVec3::new(1.5, 1.0, 0.25)),
        );
        let mut panel = AdjustmentPanel::new();

        panel.toggle_tool(AdjustmentTool::Move, &store);
        assert_eq!(panel.values().x, "1.50");
        assert_eq!(panel.values().y, "-2.00");
        assert_eq!(panel.values().z, "3.46");

        panel.toggle_tool(AdjustmentTool::Rotate, &store);
        assert_eq!(panel.values().x, "90.00");

        panel.toggle_tool(AdjustmentTool::Scale, &store);
        assert_eq!(panel.values().x, "1.50");
        assert_eq!(panel.values().x_percent.as_deref(), Some("50.00"));
        assert_eq!(panel.values().z_percent.as_deref(), Some("-75.00"));
    }

    #[test]
    fn test_apply_rotation_degrees() {
        let (mut store, id) = store_with_selection();
        let mut panel = AdjustmentPanel::new();
        panel.toggle_tool(AdjustmentTool::Rotate, &store);

        let applied = panel
            .apply_values(PanelValues::xyz("0", "0", "90"), &mut store)
            .expect("Should parse");
        assert!(applied);
        let model = store.model(id).expect("Should exist");
        assert!((model.rotation.z - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_scaling_copies_x() {
        let (mut store, id) = store_with_selection();
        let mut panel = AdjustmentPanel::new();
        panel.toggle_tool(AdjustmentTool::Scale, &store);
        panel.set_uniform_scaling(true);

        panel
            .apply_values(PanelValues::xyz("2", "7", "9"), &mut store)
            .expect("Should parse");
        assert_eq!(store.model(id).expect("Should exist").scale, DVec3::splat(2.0));
    }

    #[test]
    fn test_empty_fields_use_defaults() {
        let (mut store, id) = store_with_selection();
        let mut panel = AdjustmentPanel::new();
        panel.toggle_tool(AdjustmentTool::Scale, &store);
        panel
            .apply_values(PanelValues::xyz("3", "", " "), &mut store)
            .expect("Should parse");
        assert_eq!(
            store.model(id).expect("Should exist").scale,
            DVec3::new(3.0, 1.0, 1.0)
        );
    }

    #[test]
    fn test_invalid_number_leaves_store() {
        let (mut store, id) = store_with_selection();
        let mut panel = AdjustmentPanel::new();
        panel.toggle_tool(AdjustmentTool::Move, &store);
        let revision = store.revision();

        let err = panel
            .apply_values(PanelValues::xyz("10", "abc", "0"), &mut store)
            .expect_err("Should reject text");
        assert_eq!(
            err,
            PanelError::InvalidNumber {
                field: "position.y".to_string(),
                value: "abc".to_string()
            }
        );
        assert_eq!(store.revision(), revision);
        assert_eq!(store.model(id).expect("Should exist").position, DVec3::ZERO);
        // The typed text is kept
        assert_eq!(panel.values().y, "abc");
    }

    #[test]
    fn test_apply_without_selection_is_noop() {
        let (mut store, _) = store_with_selection();
        store.select_model(None);
        let mut panel = AdjustmentPanel::new();
        panel.toggle_tool(AdjustmentTool::Move, &store);
        let applied = panel
            .apply_values(PanelValues::xyz("1", "2", "3"), &mut store)
            .expect("Should not fail");
        assert!(!applied);
    }

    #[test]
    fn test_drop_to_plate_snaps_and_resets() {
        let (mut store, id) = store_with_selection();
        store.update_transform(id, TransformPatch::new().position(DVec3::new(0.0, 0.0, 25.0)));
        let mut panel = AdjustmentPanel::new();
        panel.toggle_tool(AdjustmentTool::Move, &store);

        let snapped = panel
            .set_drop_to_plate(true, &mut store, |_| Some(DVec3::splat(10.0)), ScaleMode::UniformX)
            .expect("Should snap");
        assert!(snapped);
        assert!(!panel.drop_to_plate());
        assert!(store.model(id).expect("Should exist").position.z.abs() < 1e-9);
    }

    #[test]
    fn test_drop_to_plate_without_geometry() {
        let (mut store, id) = store_with_selection();
        let mut panel = AdjustmentPanel::new();
        let err = panel
            .set_drop_to_plate(true, &mut store, |_| None, ScaleMode::UniformX)
            .expect_err("Should need geometry");
        assert_eq!(err, PanelError::GeometryNotLoaded(id.to_string()));
        assert!(panel.drop_to_plate());
    }

    #[test]
    fn test_cancel_resets_everything() {
        let (store, _) = store_with_selection();
        let mut panel = AdjustmentPanel::new();
        let rx = panel.subscribe();
        panel.toggle_tool(AdjustmentTool::Scale, &store);
        panel.set_uniform_scaling(true);
        panel.set_grid_placement(true);

        panel.cancel();
        assert_eq!(panel.active_tool(), None);
        assert_eq!(panel.values(), &PanelValues::default());
        assert!(!panel.uniform_scaling());
        assert!(!panel.grid_placement());
        assert_eq!(*rx.borrow(), None);
    }

    #[test]
    fn test_confirm_returns_tool() {
        let (store, _) = store_with_selection();
        let mut panel = AdjustmentPanel::new();
        panel.toggle_tool(AdjustmentTool::Multiply, &store);
        assert_eq!(panel.confirm(), Some(AdjustmentTool::Multiply));
        assert_eq!(panel.active_tool(), None);
    }

    #[test]
    fn test_material_toggle() {
        let mut panel = AdjustmentPanel::new();
        assert_eq!(panel.select_material(MaterialSlot::Material1), Some(MaterialSlot::Material1));
        assert_eq!(panel.select_material(MaterialSlot::Material2), Some(MaterialSlot::Material2));
        assert_eq!(panel.select_material(MaterialSlot::Material2), None);
    }
}
