//! Geometry loading.
//!
//! Loaders only parse; centring and the empty-geometry check happen in
//! [`prepare_geometry`] so every loader is treated the same.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use buildplate_devicedb::AssetFormat;
use parking_lot::Mutex;

use crate::error::{LoadError, LoadResult};
use crate::geometry::MeshGeometry;

/// Source of mesh geometry for models and build plates.
#[async_trait]
pub trait GeometryLoader: Send + Sync {
    /// Load and parse the geometry at `path`.
    async fn load(&self, path: &str) -> LoadResult<MeshGeometry>;
}

/// Reject empty meshes and centre the rest on their bounding box.
pub fn prepare_geometry(path: &str, geometry: MeshGeometry) -> LoadResult<MeshGeometry> {
    if geometry.is_empty() {
        return Err(LoadError::EmptyGeometry(path.to_string()));
    }
    Ok(geometry.centered())
}

/// Parse STL data (binary or ASCII).
pub fn parse_stl(path: &str, data: &[u8]) -> LoadResult<MeshGeometry> {
    let mut cursor = Cursor::new(data);
    let stl = stl_io::read_stl(&mut cursor).map_err(|e| LoadError::parse(path, e))?;
    tracing::debug!("STL {} contains {} faces", path, stl.faces.len());

    let vertex = |i: usize| -> Option<[f32; 3]> {
        stl.vertices.get(i).map(|v| [v[0], v[1], v[2]])
    };
    let triangles = stl.faces.iter().filter_map(|face| {
        Some([
            vertex(face.vertices[0])?,
            vertex(face.vertices[1])?,
            vertex(face.vertices[2])?,
        ])
    });
    Ok(MeshGeometry::from_triangles(triangles))
}

fn obj_index(token: &str, count: usize, path: &str, line: usize) -> LoadResult<u32> {
    let raw = token.split('/').next().unwrap_or_default();
    let index: i64 = raw
        .parse()
        .map_err(|_| LoadError::parse(path, format!("line {}: bad vertex index '{}'", line, token)))?;
    // 1-based; negative indices count back from the last vertex
    let resolved = match index {
        i if i > 0 => i - 1,
        i if i < 0 => count as i64 + i,
        _ => -1,
    };
    if resolved < 0 || resolved as usize >= count {
        return Err(LoadError::parse(
            path,
            format!("line {}: vertex index {} out of range", line, index),
        ));
    }
    Ok(resolved as u32)
}

/// Parse the vertex and face records of a Wavefront OBJ file.
///
/// Polygons are fan-triangulated. Texture coordinates, normals, groups
/// and materials are ignored.
pub fn parse_obj(path: &str, text: &str) -> LoadResult<MeshGeometry> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    for (n, line) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = line.split('#').next().unwrap_or_default();
        let mut args = line.split_whitespace();
        match args.next() {
            Some("v") => {
                let mut coord = [0.0f32; 3];
                for c in &mut coord {
                    let token = args.next().ok_or_else(|| {
                        LoadError::parse(path, format!("line {}: vertex needs 3 coordinates", line_no))
                    })?;
                    *c = token.parse().map_err(|_| {
                        LoadError::parse(path, format!("line {}: bad coordinate '{}'", line_no, token))
                    })?;
                }
                positions.push(coord);
            }
            Some("f") => {
                let face = args
                    .map(|t| obj_index(t, positions.len(), path, line_no))
                    .collect::<LoadResult<Vec<u32>>>()?;
                if face.len() < 3 {
                    return Err(LoadError::parse(
                        path,
                        format!("line {}: face needs at least 3 vertices", line_no),
                    ));
                }
                for i in 1..face.len() - 1 {
                    indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                }
            }
            _ => {}
        }
    }

    tracing::debug!(
        "OBJ {} contains {} vertices, {} triangles",
        path,
        positions.len(),
        indices.len() / 3
    );
    Ok(MeshGeometry::new(positions, indices))
}

/// Parse `data` according to the format implied by `path`.
pub fn parse_by_extension(path: &str, data: &[u8]) -> LoadResult<MeshGeometry> {
    match AssetFormat::from_path(path) {
        Some(AssetFormat::Stl) => parse_stl(path, data),
        Some(AssetFormat::Obj) => {
            let text = std::str::from_utf8(data).map_err(|e| LoadError::parse(path, e))?;
            parse_obj(path, text)
        }
        None => {
            let extension = Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or(path);
            Err(LoadError::UnsupportedFormat(extension.to_string()))
        }
    }
}

/// Loads STL and OBJ files from disk.
///
/// Absolute asset paths such as `/build-plates/x.obj` are resolved under
/// the asset root when one is set.
#[derive(Debug, Clone, Default)]
pub struct AssetLoader {
    root: Option<PathBuf>,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.trim_start_matches(['/', '\\'])),
            None => PathBuf::from(path),
        }
    }
}

#[async_trait]
impl GeometryLoader for AssetLoader {
    async fn load(&self, path: &str) -> LoadResult<MeshGeometry> {
        let file = self.resolve(path);
        tracing::debug!("Reading {}", file.display());
        let data = tokio::fs::read(&file)
            .await
            .map_err(|e| LoadError::io(path, e))?;
        parse_by_extension(path, &data)
    }
}

/// In-memory loader keyed by path.
///
/// Unknown paths fail with a not-found I/O error. Counts calls per path.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    entries: Mutex<HashMap<String, LoadResult<MeshGeometry>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, geometry: MeshGeometry) {
        self.entries.lock().insert(path.to_string(), Ok(geometry));
    }

    pub fn insert_error(&self, path: &str, error: LoadError) {
        self.entries.lock().insert(path.to_string(), Err(error));
    }

    pub fn remove(&self, path: &str) {
        self.entries.lock().remove(path);
    }

    pub fn load_count(&self, path: &str) -> usize {
        self.calls.lock().get(path).copied().unwrap_or(0)
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl GeometryLoader for MemoryLoader {
    async fn load(&self, path: &str) -> LoadResult<MeshGeometry> {
        *self.calls.lock().entry(path.to_string()).or_default() += 1;
        let entry = self.entries.lock().get(path).cloned();
        tokio::task::yield_now().await;
        entry.unwrap_or_else(|| {
            Err(LoadError::Io {
                path: path.to_string(),
                reason: "not found".to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    const ASCII_STL: &str = "solid tri
facet normal 0 0 1
  outer loop
    vertex 0 0 0
    vertex 10 0 0
    vertex 0 10 0
  endloop
endfacet
endsolid tri
";

    #[test]
    fn test_parse_ascii_stl() {
        let geometry = parse_stl("tri.stl", ASCII_STL.as_bytes()).expect("Should parse STL");
        assert_eq!(geometry.triangle_count(), 1);
        assert_eq!(geometry.extents(), DVec3::new(10.0, 10.0, 0.0));
    }

    #[test]
    fn test_parse_stl_garbage() {
        let err = parse_stl("bad.stl", b"definitely not an stl").expect_err("Should fail");
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn test_parse_obj_fan_triangulation() {
        let text = "# quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1/1/1 2/2/2 3/3/3 4/4/4\n";
        let geometry = parse_obj("quad.obj", text).expect("Should parse OBJ");
        assert_eq!(geometry.triangle_count(), 2);
        assert_eq!(geometry.indices(), &[0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_parse_obj_negative_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let geometry = parse_obj("neg.obj", text).expect("Should parse OBJ");
        assert_eq!(geometry.indices(), &[0, 1, 2]);
    }

    #[test]
    fn test_parse_obj_errors() {
        let err = parse_obj("bad.obj", "v 0 0\n").expect_err("Should fail");
        assert!(err.to_string().contains("line 1"));

        let err = parse_obj("bad.obj", "v 0 0 0\nf 1 2 3\n").expect_err("Should fail");
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_by_extension("part.3mf", b"").expect_err("Should fail");
        assert_eq!(err, LoadError::UnsupportedFormat("3mf".to_string()));
    }

    #[test]
    fn test_prepare_geometry() {
        let empty = MeshGeometry::new(Vec::new(), Vec::new());
        assert_eq!(
            prepare_geometry("empty.stl", empty),
            Err(LoadError::EmptyGeometry("empty.stl".to_string()))
        );

        let offset = MeshGeometry::from_triangles([[[10.0, 10.0, 10.0], [12.0, 10.0, 10.0], [10.0, 14.0, 10.0]]]);
        let centered = prepare_geometry("tri.stl", offset).expect("Should accept geometry");
        assert!(centered.bounds().center().abs_diff_eq(DVec3::ZERO, 1e-6));
    }

    #[test]
    fn test_asset_loader_resolve() {
        let loader = AssetLoader::with_root("/srv/assets");
        assert_eq!(
            loader.resolve("/build-plates/ultimaker-s7.obj"),
            PathBuf::from("/srv/assets/build-plates/ultimaker-s7.obj")
        );
        assert_eq!(AssetLoader::new().resolve("a.stl"), PathBuf::from("a.stl"));
    }

    #[tokio::test]
    async fn test_asset_loader_reads_file() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        std::fs::write(dir.path().join("tri.stl"), ASCII_STL).expect("Should write file");
        let loader = AssetLoader::with_root(dir.path());
        let geometry = loader.load("/tri.stl").await.expect("Should load");
        assert_eq!(geometry.triangle_count(), 1);

        let err = loader.load("/missing.stl").await.expect_err("Should fail");
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[tokio::test]
    async fn test_memory_loader() {
        let loader = MemoryLoader::new();
        loader.insert("cube.stl", MeshGeometry::cuboid(DVec3::splat(10.0)));
        assert!(loader.load("cube.stl").await.is_ok());
        assert!(loader.load("other.stl").await.is_err());
        assert_eq!(loader.load_count("cube.stl"), 1);
    }
}
