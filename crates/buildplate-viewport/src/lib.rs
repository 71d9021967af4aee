//! # Buildplate Viewport
//!
//! The build-plate scene editor core:
//! - [`store`]: models, selection, active printer and placement errors
//! - [`frame`]: mapping between the logical plate frame and render space
//! - [`scene`]: scene graph, reconciliation and render backends
//! - [`interaction`]: camera, picking and the transform gizmo
//! - [`placement`]: build-volume validation and plate snapping
//! - [`tools`]: the adjustment tool panel
//! - [`viewport`]: the facade that wires it all together

pub mod error;
pub mod frame;
pub mod geometry;
pub mod interaction;
pub mod loader;
pub mod placement;
pub mod scene;
pub mod store;
pub mod tools;
pub mod transform;
pub mod viewport;

pub use error::{
    LoadError, LoadResult, PanelError, PanelResult, RenderError, RenderResult, ViewportError,
};
pub use frame::{placed_bounds, PlacementFrame, WorldTransform};
pub use geometry::{Aabb, LineSet, MeshGeometry};
pub use interaction::{Gizmo, GizmoAxis, InteractionController, OrbitCamera, PickHit, Ray};
pub use loader::{AssetLoader, GeometryLoader, MemoryLoader};
pub use placement::{
    snap_to_build_plate, validate_printable_area, Axis, PlacementMonitor, ValidationError,
    ValidationResult, PLACEMENT_ERROR_TITLE,
};
pub use scene::{
    GlBackend, HeadlessBackend, RenderBackend, RendererStats, SceneRenderer, ViewParams,
    LOAD_ERROR_TITLE,
};
pub use store::{Model, ModelStore, StoreSnapshot};
pub use tools::{AdjustmentPanel, AdjustmentTool, MaterialSlot, PanelValues, ToolSignal};
pub use transform::{Transform, TransformPatch};
pub use viewport::Viewport;
