//! # Buildplate
//!
//! Build-plate preview and model placement for 3D printers.
//!
//! ## Architecture
//!
//! Buildplate is organized as a workspace with multiple crates:
//!
//! 1. **buildplate-core** - Model ids, colours, errors and the event bus
//! 2. **buildplate-devicedb** - Printer build volumes and plate assets
//! 3. **buildplate-settings** - Viewport configuration (TOML/JSON)
//! 4. **buildplate-viewport** - Model store, scene renderer, picking, gizmo,
//!    placement validation and the adjustment tool panel
//! 5. **buildplate** - Binary that runs a headless preview session

pub mod session;

pub use buildplate_core::{AppEvent, Color, EventBus, ManipulationMode, ModelId, Notification};
pub use buildplate_devicedb::{BuildVolume, BuildVolumeRegistry, PrintableArea};
pub use buildplate_settings::{default_config_path, ScaleMode, ViewportConfig};
pub use buildplate_viewport::{
    AdjustmentPanel, AdjustmentTool, AssetLoader, HeadlessBackend, InteractionController,
    MeshGeometry, Model, ModelStore, PlacementMonitor, SceneRenderer, TransformPatch,
    ValidationError, Viewport,
};
pub use session::{SessionOptions, SessionReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Console output with pretty formatting, filtered by `RUST_LOG`
/// (defaults to `info`).
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
