//! Viewport configuration.
//!
//! [`ViewportConfig`] groups the tunables of the build-plate viewport:
//! default printer, placement rules, appearance, lighting, camera and
//! picking. Files are TOML or JSON, chosen by extension.

pub mod config;
pub mod error;

pub use config::{
    default_config_path, AppearanceSettings, CameraSettings, DirectionalLight,
    InteractionSettings, LightingSettings, PlacementSettings, PrinterSettings, ScaleMode,
    ViewportConfig,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
