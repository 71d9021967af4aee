//! # Placement validation
//!
//! Checks that each placed model lies inside the printable area of the
//! active build volume and keeps the store's error list current.
//!
//! Bounds are inclusive: X in `[-W/2, W/2]`, Y in `[-D/2, D/2]` and Z in
//! `[0, H]`. Each violated bound yields one [`ValidationError`], so a model
//! can carry up to six.

use buildplate_core::{ModelId, Notification};
use buildplate_devicedb::{BuildVolume, PrintableArea};
use buildplate_settings::ScaleMode;
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::frame::placed_bounds;
use crate::geometry::Aabb;
use crate::store::{Model, ModelStore};
use crate::transform::{Transform, TransformPatch};

/// Toast title for placement problems.
pub const PLACEMENT_ERROR_TITLE: &str = "Model placement error";

/// Logical axis a bound applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
        }
    }
}

/// One violated bound of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub model_id: ModelId,
    pub axis: Axis,
    pub message: String,
    /// Distance past the bound, in mm.
    pub exceeded: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// The transform used for bounds under the given scale mode.
pub fn effective_transform(model: &Model, scale_mode: ScaleMode) -> Transform {
    let mut transform = model.transform();
    if scale_mode == ScaleMode::UniformX {
        transform.scale = DVec3::splat(model.scale.x);
    }
    transform
}

fn check_bounds(id: ModelId, bounds: &Aabb, area: &PrintableArea) -> Vec<ValidationError> {
    let half_w = area.half_width();
    let half_d = area.half_depth();
    let limits = [
        (Axis::X, -half_w - bounds.min.x, "left edge"),
        (Axis::X, bounds.max.x - half_w, "right edge"),
        (Axis::Y, -half_d - bounds.min.y, "front edge"),
        (Axis::Y, bounds.max.y - half_d, "back edge"),
        (Axis::Z, -bounds.min.z, "below build plate"),
        (Axis::Z, bounds.max.z - area.height, "beyond height limit"),
    ];

    limits
        .into_iter()
        .filter(|(_, exceeded, _)| *exceeded > 0.0)
        .map(|(axis, exceeded, what)| {
            let message = match axis {
                Axis::Z => format!("Model extends {} by {:.2}mm", what, exceeded),
                _ => format!("Model extends beyond {} by {:.2}mm", what, exceeded),
            };
            ValidationError {
                model_id: id,
                axis,
                message,
                exceeded,
            }
        })
        .collect()
}

/// Check one model against a build volume.
///
/// A model whose geometry has not loaded (`extents` is `None`) is valid.
pub fn validate_printable_area(
    model: &Model,
    extents: Option<DVec3>,
    volume: &BuildVolume,
    scale_mode: ScaleMode,
) -> ValidationResult {
    let Some(extents) = extents else {
        return ValidationResult::from_errors(Vec::new());
    };
    let bounds = placed_bounds(extents, &effective_transform(model, scale_mode));
    ValidationResult::from_errors(check_bounds(model.id, &bounds, &volume.printable_area))
}

/// Copy of `model` moved vertically so its lowest point rests on the plate.
pub fn snap_to_build_plate(model: &Model, extents: DVec3, scale_mode: ScaleMode) -> Model {
    let bounds = placed_bounds(extents, &effective_transform(model, scale_mode));
    let mut snapped = model.clone();
    snapped.position.z -= bounds.min.z;
    snapped
}

/// Snap the model in place through the store. Returns false if the model
/// is unknown.
pub fn snap_in_store(
    store: &mut ModelStore,
    id: ModelId,
    extents: DVec3,
    scale_mode: ScaleMode,
) -> bool {
    let Some(model) = store.model(id) else {
        return false;
    };
    let snapped = snap_to_build_plate(model, extents, scale_mode);
    store.update_transform(id, TransformPatch::new().position(snapped.position));
    true
}

/// Validate every model in the store against its active build volume.
pub fn validate_all<F>(store: &ModelStore, extents_of: F, scale_mode: ScaleMode) -> Vec<ValidationError>
where
    F: Fn(ModelId) -> Option<DVec3>,
{
    let volume = store.build_volume();
    store
        .models()
        .iter()
        .flat_map(|model| {
            validate_printable_area(model, extents_of(model.id), volume, scale_mode).errors
        })
        .collect()
}

/// Re-runs validation and decides when to raise a toast.
#[derive(Debug, Clone, Default)]
pub struct PlacementMonitor {
    scale_mode: ScaleMode,
}

impl PlacementMonitor {
    pub fn new(scale_mode: ScaleMode) -> Self {
        Self { scale_mode }
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.scale_mode
    }

    pub fn set_scale_mode(&mut self, scale_mode: ScaleMode) {
        self.scale_mode = scale_mode;
    }

    /// Validate all models and write the result to the store.
    ///
    /// Returns a notification only if errors exist and their number differs
    /// from the previous run.
    pub fn revalidate<F>(&mut self, store: &mut ModelStore, extents_of: F) -> Option<Notification>
    where
        F: Fn(ModelId) -> Option<DVec3>,
    {
        let previous_count = store.validation_errors().len();
        let errors = validate_all(store, extents_of, self.scale_mode);
        let notification = match errors.first() {
            Some(first) if errors.len() != previous_count => {
                tracing::debug!("{} placement errors (was {})", errors.len(), previous_count);
                Some(Notification::error(PLACEMENT_ERROR_TITLE, first.message.clone()))
            }
            _ => None,
        };
        store.set_validation_errors(errors);
        notification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildplate_core::EventBus;
    use buildplate_devicedb::{AssetFormat, BuildVolumeRegistry};
    use std::sync::Arc;

    fn s3() -> BuildVolume {
        BuildVolume::new(
            "ultimaker-s3",
            "Ultimaker S3",
            AssetFormat::Obj,
            PrintableArea::new(230.0, 190.0, 200.0),
        )
    }

    fn model_at(position: DVec3) -> Model {
        Model {
            id: ModelId::new(),
            name: "box".to_string(),
            file_path: "box.stl".to_string(),
            position,
            rotation: DVec3::ZERO,
            scale: DVec3::ONE,
        }
    }

    #[test]
    fn test_unloaded_model_is_valid() {
        let result = validate_printable_area(
            &model_at(DVec3::new(1000.0, 0.0, 0.0)),
            None,
            &s3(),
            ScaleMode::UniformX,
        );
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_all_six_bounds() {
        let model = model_at(DVec3::new(0.0, 0.0, -10.0));
        let result = validate_printable_area(
            &model,
            Some(DVec3::new(300.0, 250.0, 250.0)),
            &s3(),
            ScaleMode::UniformX,
        );
        assert!(!result.is_valid);
        let messages: Vec<_> = result.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Model extends beyond left edge by 35.00mm",
                "Model extends beyond right edge by 35.00mm",
                "Model extends beyond front edge by 30.00mm",
                "Model extends beyond back edge by 30.00mm",
                "Model extends below build plate by 10.00mm",
                "Model extends beyond height limit by 40.00mm",
            ]
        );
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let result = validate_printable_area(
            &model_at(DVec3::ZERO),
            Some(DVec3::new(230.0, 190.0, 200.0)),
            &s3(),
            ScaleMode::UniformX,
        );
        assert!(result.is_valid);
    }

    #[test]
    fn test_uniform_x_ignores_other_scale_components() {
        let mut model = model_at(DVec3::ZERO);
        model.scale = DVec3::new(1.0, 1.0, 5.0);
        let extents = Some(DVec3::new(50.0, 50.0, 50.0));

        let uniform = validate_printable_area(&model, extents, &s3(), ScaleMode::UniformX);
        assert!(uniform.is_valid);

        let per_axis = validate_printable_area(&model, extents, &s3(), ScaleMode::PerAxis);
        assert_eq!(per_axis.errors.len(), 1);
        assert_eq!(per_axis.errors[0].axis, Axis::Z);
        assert!((per_axis.errors[0].exceeded - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_snap_to_build_plate() {
        let mut model = model_at(DVec3::new(0.0, 0.0, -12.0));
        model.rotation = DVec3::new(0.4, 0.9, -0.3);
        let extents = DVec3::new(20.0, 30.0, 40.0);
        let snapped = snap_to_build_plate(&model, extents, ScaleMode::UniformX);
        let result = validate_printable_area(&snapped, Some(extents), &s3(), ScaleMode::UniformX);
        assert!(result.errors.iter().all(|e| e.axis != Axis::Z));
        assert_eq!(snapped.position.x, model.position.x);
        assert_eq!(snapped.position.y, model.position.y);
    }

    #[test]
    fn test_monitor_toasts_on_count_change_only() {
        let mut store = ModelStore::new(Arc::new(EventBus::new()), BuildVolumeRegistry::builtin());
        store.set_active_printer("ultimaker-s3");
        let id = store.add_model("box.stl", None).expect("Should add model");
        let extents = |_: ModelId| Some(DVec3::new(200.0, 150.0, 100.0));
        let mut monitor = PlacementMonitor::default();

        assert!(monitor.revalidate(&mut store, extents).is_none());

        store.update_transform(id, TransformPatch::new().position(DVec3::new(20.0, 0.0, 0.0)));
        let toast = monitor
            .revalidate(&mut store, extents)
            .expect("Should raise a toast");
        assert_eq!(toast.title, PLACEMENT_ERROR_TITLE);
        assert_eq!(toast.description, "Model extends beyond right edge by 5.00mm");

        // Still one error while dragging further
        store.update_transform(id, TransformPatch::new().position(DVec3::new(22.0, 0.0, 0.0)));
        assert!(monitor.revalidate(&mut store, extents).is_none());
        assert_eq!(store.validation_errors().len(), 1);

        // Back inside: errors cleared, no toast
        store.update_transform(id, TransformPatch::new().position(DVec3::ZERO));
        assert!(monitor.revalidate(&mut store, extents).is_none());
        assert!(store.validation_errors().is_empty());
    }
}
