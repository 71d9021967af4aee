//! End-to-end scenarios through the viewport facade with a headless backend.

use std::sync::Arc;

use buildplate_core::ModelId;
use buildplate_settings::ViewportConfig;
use buildplate_viewport::placement::Axis;
use buildplate_viewport::{
    validate_printable_area, AdjustmentTool, HeadlessBackend, LoadError, MemoryLoader,
    MeshGeometry, PanelValues, TransformPatch, Viewport, LOAD_ERROR_TITLE, PLACEMENT_ERROR_TITLE,
};
use glam::DVec3;

const S3: &str = "ultimaker-s3";

fn viewport(loader: &Arc<MemoryLoader>, printer: &str) -> Viewport<HeadlessBackend> {
    let mut config = ViewportConfig::default();
    config.printer.default_printer = printer.to_string();
    Viewport::new(&config, HeadlessBackend::new(), loader.clone())
}

fn loader_with(path: &str, size: DVec3) -> Arc<MemoryLoader> {
    let loader = MemoryLoader::new();
    loader.insert(path, MeshGeometry::cuboid(size));
    loader.into_shared()
}

async fn loaded_model(vp: &mut Viewport<HeadlessBackend>, path: &str) -> ModelId {
    let id = vp.add_model(path, None).expect("Should add model");
    vp.settle().await;
    assert!(vp.renderer().has_instance(id), "Instance should exist");
    id
}

#[tokio::test]
async fn test_scenario_model_fits_build_volume() {
    let loader = loader_with("/models/block.stl", DVec3::new(200.0, 150.0, 100.0));
    let mut vp = viewport(&loader, S3);
    let id = loaded_model(&mut vp, "/models/block.stl").await;

    let model = vp.store().model(id).expect("Should exist").clone();
    assert_eq!(model.position, DVec3::ZERO);

    let result = validate_printable_area(
        &model,
        vp.renderer().extents(id),
        vp.store().build_volume(),
        vp.monitor().scale_mode(),
    );
    assert!(result.is_valid);
    assert!(result.errors.is_empty());
    assert!(vp.store().validation_errors().is_empty());
    assert!(vp.take_notifications().is_empty());
}

#[tokio::test]
async fn test_scenario_model_beyond_right_edge() {
    let loader = loader_with("/models/block.stl", DVec3::new(200.0, 150.0, 100.0));
    let mut vp = viewport(&loader, S3);
    let id = loaded_model(&mut vp, "/models/block.stl").await;

    vp.update_transform(id, TransformPatch::new().position(DVec3::new(20.0, 0.0, 0.0)));

    let errors = vp.store().validation_errors().to_vec();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].axis, Axis::X);
    assert_eq!(errors[0].model_id, id);
    assert!((errors[0].exceeded - 5.0).abs() < 1e-9);
    assert_eq!(errors[0].message, "Model extends beyond right edge by 5.00mm");

    let toasts = vp.take_notifications();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].title, PLACEMENT_ERROR_TITLE);
    assert_eq!(toasts[0].description, errors[0].message);

    // Same error count again: no second toast
    vp.update_transform(id, TransformPatch::new().position(DVec3::new(21.0, 0.0, 0.0)));
    assert_eq!(vp.store().validation_errors().len(), 1);
    assert!(vp.take_notifications().is_empty());
}

#[tokio::test]
async fn test_scenario_failed_load_keeps_model() {
    let loader = MemoryLoader::new();
    loader.insert_error(
        "bad/path.stl",
        LoadError::Parse {
            path: "bad/path.stl".to_string(),
            reason: "truncated".to_string(),
        },
    );
    let loader = loader.into_shared();
    let mut vp = viewport(&loader, S3);

    let before = vp.store().models().len();
    let id = vp.add_model("bad/path.stl", None).expect("Should add model");
    vp.settle().await;

    assert_eq!(vp.store().models().len(), before + 1);
    assert!(vp.store().contains(id));
    assert!(!vp.renderer().has_instance(id));
    assert!(vp.renderer().load_failure(id).is_some());

    let toasts = vp.take_notifications();
    let load_toasts: Vec<_> = toasts
        .iter()
        .filter(|t| t.title == LOAD_ERROR_TITLE)
        .collect();
    assert_eq!(load_toasts.len(), 1);
    assert!(load_toasts[0].description.contains("truncated"));

    // Later frames do not retry on their own
    vp.frame().expect("Should render");
    vp.settle().await;
    assert_eq!(loader.load_count("bad/path.stl"), 1);
}

#[tokio::test]
async fn test_scenario_printer_change_clears_selection() {
    let loader = loader_with("/models/cube.stl", DVec3::splat(20.0));
    let mut vp = viewport(&loader, S3);
    let id = loaded_model(&mut vp, "/models/cube.stl").await;

    vp.select_model(Some(id));
    assert_eq!(vp.store().selected_model_id(), Some(id));
    assert_eq!(vp.controller().gizmo().target(), Some(id));

    vp.set_active_printer("other-printer");
    assert_eq!(vp.store().selected_model_id(), None);
    assert!(!vp.controller().gizmo().is_attached());
    // Unknown id falls back to the default printer
    assert_eq!(vp.store().active_printer(), "ultimaker-s7");
    // The model itself survives the printer change
    assert!(vp.renderer().has_instance(id));
}

#[tokio::test]
async fn test_scenario_tool_toggle_keeps_transform() {
    let loader = loader_with("/models/cube.stl", DVec3::splat(20.0));
    let mut vp = viewport(&loader, S3);
    let id = loaded_model(&mut vp, "/models/cube.stl").await;
    vp.select_model(Some(id));

    vp.toggle_tool(AdjustmentTool::Rotate);
    vp.apply_panel_values(PanelValues::xyz("0", "0", "90"))
        .expect("Should apply");
    let rotated = vp.store().model(id).expect("Should exist").transform();
    assert!((rotated.rotation.z - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

    vp.toggle_tool(AdjustmentTool::Scale);
    vp.set_uniform_scaling(true);
    assert!(vp.panel().uniform_scaling());

    // Off, then on again
    assert_eq!(vp.toggle_tool(AdjustmentTool::Scale), None);
    assert!(!vp.panel().uniform_scaling());
    assert!(!vp.panel().drop_to_plate());
    assert!(!vp.panel().grid_placement());
    assert_eq!(vp.toggle_tool(AdjustmentTool::Scale), Some(AdjustmentTool::Scale));
    assert!(!vp.panel().uniform_scaling());

    let after = vp.store().model(id).expect("Should exist").transform();
    assert_eq!(after, rotated);
    assert_eq!(vp.panel().values().x, "1.00");
}

#[tokio::test]
async fn test_load_sample_replaces_plate() {
    let loader = MemoryLoader::new();
    loader.insert("/models/cube.stl", MeshGeometry::cuboid(DVec3::splat(20.0)));
    loader.insert(
        "/models/boomBracket.stl",
        MeshGeometry::cuboid(DVec3::new(40.0, 20.0, 10.0)),
    );
    let loader = loader.into_shared();
    let mut vp = viewport(&loader, S3);
    let old = loaded_model(&mut vp, "/models/cube.stl").await;

    assert_eq!(vp.load_sample("no-such-sample"), None);
    assert!(vp.store().contains(old));

    let id = vp.load_sample("boom-bracket").expect("Should add sample");
    vp.settle().await;
    assert!(!vp.store().contains(old));
    assert!(!vp.renderer().has_instance(old));
    let model = vp.store().model(id).expect("Should exist");
    assert_eq!(model.name, "Boom Bracket");
    assert_eq!(model.file_path, "/models/boomBracket.stl");
    assert!(vp.renderer().has_instance(id));
}
