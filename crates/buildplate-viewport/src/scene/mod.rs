//! # Scene
//!
//! Renderer-owned scene graph, materials, render backends and the
//! reconciliation between the model store and GPU resources.

pub mod backend;
pub mod gl;
pub mod graph;
pub mod material;
pub mod renderer;
pub mod shaders;

pub use backend::{
    DrawItem, FrameSubmission, HeadlessBackend, MeshHandle, PrimitiveKind, RenderBackend,
    UploadData, UploadRecord,
};
pub use gl::GlBackend;
pub use graph::{NodeGeometry, NodeId, NodeKind, SceneGraph, SceneNode};
pub use material::Material;
pub use renderer::{RendererStats, SceneRenderer, ViewParams, LOAD_ERROR_TITLE};
