use buildplate_settings::{ScaleMode, SettingsError, ViewportConfig};
use tempfile::TempDir;

#[test]
fn test_toml_round_trip() {
    let dir = TempDir::new().expect("Should create temp dir");
    let path = dir.path().join("viewport.toml");

    let mut config = ViewportConfig::default();
    config.printer.default_printer = "ultimaker-method-x".to_string();
    config.placement.scale_mode = ScaleMode::PerAxis;
    config.interaction.line_pick_threshold = 2.5;

    config.save_to_file(&path).expect("Should save");
    let loaded = ViewportConfig::load_from_file(&path).expect("Should load");
    assert_eq!(loaded, config);
}

#[test]
fn test_json_round_trip_in_nested_dir() {
    let dir = TempDir::new().expect("Should create temp dir");
    let path = dir.path().join("nested").join("viewport.json");

    let config = ViewportConfig::default();
    config.save_to_file(&path).expect("Should save");

    let text = std::fs::read_to_string(&path).expect("Should read");
    assert!(text.contains("\"model_color\": \"#4a90e2\""));

    let loaded = ViewportConfig::load_from_file(&path).expect("Should load");
    assert_eq!(loaded, config);
}

#[test]
fn test_load_rejects_invalid_values() {
    let dir = TempDir::new().expect("Should create temp dir");
    let path = dir.path().join("viewport.toml");
    std::fs::write(&path, "[camera]\nfov_degrees = 270.0\n").expect("Should write");

    let err = ViewportConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Config(_)));
}

#[test]
fn test_load_rejects_bad_colour() {
    let dir = TempDir::new().expect("Should create temp dir");
    let path = dir.path().join("viewport.toml");
    std::fs::write(&path, "[appearance]\nmodel_color = \"blue\"\n").expect("Should write");

    let err = ViewportConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::TomlError(_)));
}

#[test]
fn test_load_or_default_missing_file() {
    let dir = TempDir::new().expect("Should create temp dir");
    let config = ViewportConfig::load_or_default(&dir.path().join("absent.toml"))
        .expect("Should fall back to defaults");
    assert_eq!(config, ViewportConfig::default());
}
