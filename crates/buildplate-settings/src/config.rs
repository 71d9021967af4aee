//! Viewport configuration sections and file I/O.

use buildplate_core::Color;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};

/// How a model's scale feeds placement bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Use `scale.x` for every axis.
    #[default]
    UniformX,
    /// Use each scale component on its own axis.
    PerAxis,
}

impl std::fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleMode::UniformX => write!(f, "uniform_x"),
            ScaleMode::PerAxis => write!(f, "per_axis"),
        }
    }
}

/// Printer selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrinterSettings {
    /// Printer id activated at startup. Unknown ids fall back to the
    /// registry default.
    pub default_printer: String,
}

impl Default for PrinterSettings {
    fn default() -> Self {
        Self {
            default_printer: "ultimaker-s7".to_string(),
        }
    }
}

/// Placement validation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PlacementSettings {
    pub scale_mode: ScaleMode,
}

/// Colours and material parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppearanceSettings {
    /// Base colour of loaded models.
    pub model_color: Color,
    /// Fraction the hovered model's colour moves toward white.
    pub hover_lerp: f32,
    /// Emissive tint for models outside the printable area.
    pub invalid_emissive: Color,
    pub invalid_emissive_intensity: f32,
    /// Selection outline.
    pub outline_color: Color,
    pub outline_opacity: f32,
    /// Minimum dihedral angle in degrees for an edge to be outlined.
    pub outline_edge_angle_deg: f64,
    /// Build-plate mesh colour.
    pub plate_color: Color,
    /// Printable-area wireframe.
    pub printable_area_color: Color,
    pub printable_area_opacity: f32,
    pub specular: Color,
    pub shininess: f32,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            model_color: Color::from_hex(0x4a90e2),
            hover_lerp: 0.2,
            invalid_emissive: Color::from_hex(0xff0000),
            invalid_emissive_intensity: 0.3,
            outline_color: Color::BLACK,
            outline_opacity: 0.9,
            outline_edge_angle_deg: 1.0,
            plate_color: Color::from_hex(0xd9d9d9),
            printable_area_color: Color::from_hex(0x00ff00),
            printable_area_opacity: 0.5,
            specular: Color::from_hex(0x222222),
            shininess: 30.0,
        }
    }
}

/// A directional light in the render frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectionalLight {
    pub direction: [f32; 3],
    pub intensity: f32,
}

/// Scene lighting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightingSettings {
    pub ambient_intensity: f32,
    pub directional: Vec<DirectionalLight>,
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            ambient_intensity: 0.7,
            directional: vec![
                DirectionalLight {
                    direction: [1.0, 1.0, 1.0],
                    intensity: 0.6,
                },
                DirectionalLight {
                    direction: [-1.0, -1.0, -1.0],
                    intensity: 0.3,
                },
                DirectionalLight {
                    direction: [0.0, 1.0, 0.0],
                    intensity: 0.4,
                },
            ],
        }
    }
}

/// Orbit camera
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
    /// Vertical field of view in degrees.
    pub fov_degrees: f64,
    pub near: f64,
    pub far: f64,
    /// Orbit distance limits.
    pub min_distance: f64,
    pub max_distance: f64,
    /// Initial eye position; the camera looks at the origin.
    pub initial_position: [f64; 3],
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            min_distance: 50.0,
            max_distance: 1000.0,
            initial_position: [200.0, 200.0, 200.0],
        }
    }
}

/// Picking and gizmo behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InteractionSettings {
    /// Distance within which a ray hits a line segment.
    pub line_pick_threshold: f64,
    /// Smallest scale factor a gizmo drag may produce.
    pub min_scale: f64,
    /// Radians of orbit per pixel of pointer travel.
    pub orbit_speed: f64,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            line_pick_threshold: 1.0,
            min_scale: 0.01,
            orbit_speed: 0.005,
        }
    }
}

/// Complete viewport configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ViewportConfig {
    pub printer: PrinterSettings,
    pub placement: PlacementSettings,
    pub appearance: AppearanceSettings,
    pub lighting: LightingSettings,
    pub camera: CameraSettings,
    pub interaction: InteractionSettings,
}

enum FileFormat {
    Json,
    Toml,
}

fn file_format(path: &Path) -> ConfigResult<FileFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(FileFormat::Json),
        Some("toml") => Ok(FileFormat::Toml),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

impl ViewportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = file_format(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match format {
            FileFormat::Json => serde_json::from_str(&content)?,
            FileFormat::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded viewport config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let format = file_format(path)?;

        let content = match format {
            FileFormat::Json => serde_json::to_string_pretty(self)?,
            FileFormat::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.printer.default_printer.trim().is_empty() {
            return Err(ConfigError::MissingKey("printer.default_printer".to_string()));
        }

        let appearance = &self.appearance;
        for (key, value) in [
            ("appearance.hover_lerp", appearance.hover_lerp),
            ("appearance.outline_opacity", appearance.outline_opacity),
            (
                "appearance.printable_area_opacity",
                appearance.printable_area_opacity,
            ),
            (
                "appearance.invalid_emissive_intensity",
                appearance.invalid_emissive_intensity,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::out_of_range(key, value));
            }
        }
        if !(0.0..180.0).contains(&appearance.outline_edge_angle_deg) {
            return Err(ConfigError::out_of_range(
                "appearance.outline_edge_angle_deg",
                appearance.outline_edge_angle_deg,
            ));
        }
        if appearance.shininess < 0.0 {
            return Err(ConfigError::out_of_range(
                "appearance.shininess",
                appearance.shininess,
            ));
        }

        if self.lighting.ambient_intensity < 0.0 {
            return Err(ConfigError::out_of_range(
                "lighting.ambient_intensity",
                self.lighting.ambient_intensity,
            ));
        }
        for light in &self.lighting.directional {
            if light.direction.iter().all(|c| *c == 0.0) {
                return Err(ConfigError::out_of_range(
                    "lighting.directional.direction",
                    "[0, 0, 0]",
                ));
            }
        }

        let camera = &self.camera;
        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            return Err(ConfigError::out_of_range(
                "camera.fov_degrees",
                camera.fov_degrees,
            ));
        }
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(ConfigError::out_of_range("camera.far", camera.far));
        }
        if !(camera.min_distance > 0.0 && camera.max_distance >= camera.min_distance) {
            return Err(ConfigError::out_of_range(
                "camera.max_distance",
                camera.max_distance,
            ));
        }

        let interaction = &self.interaction;
        if interaction.line_pick_threshold < 0.0 {
            return Err(ConfigError::out_of_range(
                "interaction.line_pick_threshold",
                interaction.line_pick_threshold,
            ));
        }
        if interaction.min_scale <= 0.0 {
            return Err(ConfigError::out_of_range(
                "interaction.min_scale",
                interaction.min_scale,
            ));
        }
        if interaction.orbit_speed <= 0.0 {
            return Err(ConfigError::out_of_range(
                "interaction.orbit_speed",
                interaction.orbit_speed,
            ));
        }

        Ok(())
    }
}

/// Platform config location, e.g. `~/.config/buildplate/viewport.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("buildplate").join("viewport.toml"))
}
