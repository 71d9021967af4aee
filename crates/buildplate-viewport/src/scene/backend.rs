//! Render backend seam.
//!
//! The scene renderer owns every GPU resource through a [`MeshHandle`];
//! backends only upload, release and draw what they are given.

use std::collections::BTreeMap;

use buildplate_settings::LightingSettings;
use glam::{Mat4, Vec3};

use crate::error::{RenderError, RenderResult};
use crate::geometry::{LineSet, MeshGeometry};
use crate::scene::material::Material;

/// Opaque handle to uploaded vertex data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(u64);

impl MeshHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MeshHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// Data to upload.
#[derive(Debug, Clone, Copy)]
pub enum UploadData<'a> {
    Mesh(&'a MeshGeometry),
    Lines(&'a LineSet),
}

impl UploadData<'_> {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            UploadData::Mesh(_) => PrimitiveKind::Triangles,
            UploadData::Lines(_) => PrimitiveKind::Lines,
        }
    }

    pub fn primitive_count(&self) -> usize {
        match self {
            UploadData::Mesh(mesh) => mesh.triangle_count(),
            UploadData::Lines(lines) => lines.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Triangles,
    Lines,
}

/// One visible node in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub handle: MeshHandle,
    pub kind: PrimitiveKind,
    pub model_matrix: Mat4,
    pub material: Material,
}

/// Everything a backend needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSubmission {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub lighting: LightingSettings,
    pub items: Vec<DrawItem>,
}

impl FrameSubmission {
    pub fn triangle_items(&self) -> impl Iterator<Item = &DrawItem> {
        self.items.iter().filter(|i| i.kind == PrimitiveKind::Triangles)
    }

    pub fn line_items(&self) -> impl Iterator<Item = &DrawItem> {
        self.items.iter().filter(|i| i.kind == PrimitiveKind::Lines)
    }
}

pub trait RenderBackend {
    /// Upload vertex data and return a handle for later draws.
    fn upload(&mut self, data: UploadData<'_>) -> RenderResult<MeshHandle>;

    /// Free the resources behind `handle`. Called exactly once per handle.
    fn release(&mut self, handle: MeshHandle);

    /// Draw one frame.
    fn draw(&mut self, frame: &FrameSubmission) -> RenderResult<()>;
}

/// What the headless backend remembers about a live upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRecord {
    pub kind: PrimitiveKind,
    pub primitives: usize,
}

/// Backend that records calls instead of drawing.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_handle: u64,
    live: BTreeMap<MeshHandle, UploadRecord>,
    uploads: Vec<MeshHandle>,
    releases: Vec<MeshHandle>,
    invalid_releases: Vec<MeshHandle>,
    frames: usize,
    last_frame: Option<FrameSubmission>,
    fail_uploads: bool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following upload fail.
    pub fn set_fail_uploads(&mut self, fail: bool) {
        self.fail_uploads = fail;
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, handle: MeshHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn record(&self, handle: MeshHandle) -> Option<UploadRecord> {
        self.live.get(&handle).copied()
    }

    pub fn uploads(&self) -> &[MeshHandle] {
        &self.uploads
    }

    pub fn releases(&self) -> &[MeshHandle] {
        &self.releases
    }

    /// Releases of handles that were unknown or already released.
    pub fn invalid_releases(&self) -> &[MeshHandle] {
        &self.invalid_releases
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameSubmission> {
        self.last_frame.as_ref()
    }
}

impl RenderBackend for HeadlessBackend {
    fn upload(&mut self, data: UploadData<'_>) -> RenderResult<MeshHandle> {
        if self.fail_uploads {
            return Err(RenderError::Buffer("uploads disabled".to_string()));
        }
        self.next_handle += 1;
        let handle = MeshHandle(self.next_handle);
        self.live.insert(
            handle,
            UploadRecord {
                kind: data.kind(),
                primitives: data.primitive_count(),
            },
        );
        self.uploads.push(handle);
        Ok(handle)
    }

    fn release(&mut self, handle: MeshHandle) {
        if self.live.remove(&handle).is_some() {
            self.releases.push(handle);
        } else {
            tracing::warn!("Release of unknown {}", handle);
            self.invalid_releases.push(handle);
        }
    }

    fn draw(&mut self, frame: &FrameSubmission) -> RenderResult<()> {
        if let Some(item) = frame.items.iter().find(|i| !self.live.contains_key(&i.handle)) {
            return Err(RenderError::Backend(format!(
                "frame references released {}",
                item.handle
            )));
        }
        self.frames += 1;
        self.last_frame = Some(frame.clone());
        Ok(())
    }
}
