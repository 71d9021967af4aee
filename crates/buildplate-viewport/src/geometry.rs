//! # Mesh geometry
//!
//! Indexed triangle meshes and line sets as held by the scene renderer,
//! plus the bounding-box accumulator used for centring and picking.

use glam::DVec3;
use std::collections::HashMap;

/// Axis-aligned bounding box accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// An inverted box that any point will grow.
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::MAX),
            max: DVec3::splat(f64::MIN),
        }
    }

    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut bounds = Self::empty();
        for point in points {
            bounds.extend(point);
        }
        bounds
    }

    pub fn extend(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    pub fn size(&self) -> DVec3 {
        if self.is_valid() {
            self.max - self.min
        } else {
            DVec3::ZERO
        }
    }

    pub fn center(&self) -> DVec3 {
        if self.is_valid() {
            (self.min + self.max) * 0.5
        } else {
            DVec3::ZERO
        }
    }

    /// Slab test. Returns the entry distance along `direction`, or zero if
    /// the origin is inside.
    pub fn intersect_ray(&self, origin: DVec3, direction: DVec3) -> Option<f64> {
        if !self.is_valid() {
            return None;
        }
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < 1e-12 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inv;
            let mut t1 = (self.max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        if t_max < 0.0 {
            None
        } else {
            Some(t_min.max(0.0))
        }
    }
}

/// Indexed triangle mesh with per-vertex normals.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    indices: Vec<u32>,
    bounds: Aabb,
}

fn to_dvec(p: [f32; 3]) -> DVec3 {
    DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64)
}

impl MeshGeometry {
    /// Build from positions and triangle indices.
    ///
    /// Triangles referencing missing vertices and a trailing partial
    /// triangle are dropped.
    pub fn new(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        let count = positions.len();
        let indices: Vec<u32> = indices
            .chunks_exact(3)
            .filter(|tri| tri.iter().all(|&i| (i as usize) < count))
            .flatten()
            .copied()
            .collect();

        let bounds = Aabb::from_points(positions.iter().copied().map(to_dvec));
        let normals = Self::vertex_normals(&positions, &indices);
        Self {
            positions,
            normals,
            indices,
            bounds,
        }
    }

    /// Build from a flat triangle soup (three vertices per triangle).
    pub fn from_triangles(triangles: impl IntoIterator<Item = [[f32; 3]; 3]>) -> Self {
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for triangle in triangles {
            for vertex in triangle {
                indices.push(positions.len() as u32);
                positions.push(vertex);
            }
        }
        Self::new(positions, indices)
    }

    /// Axis-aligned box centred on the origin.
    pub fn cuboid(size: DVec3) -> Self {
        let h = (size * 0.5).as_vec3();
        #[rustfmt::skip]
        let positions = vec![
            [-h.x, -h.y, -h.z], [h.x, -h.y, -h.z], [h.x, h.y, -h.z], [-h.x, h.y, -h.z],
            [-h.x, -h.y,  h.z], [h.x, -h.y,  h.z], [h.x, h.y,  h.z], [-h.x, h.y,  h.z],
        ];
        #[rustfmt::skip]
        let indices = vec![
            // Bottom (-Z)
            0, 2, 1,  0, 3, 2,
            // Top (+Z)
            4, 5, 6,  4, 6, 7,
            // Front (-Y)
            0, 1, 5,  0, 5, 4,
            // Back (+Y)
            3, 7, 6,  3, 6, 2,
            // Left (-X)
            0, 4, 7,  0, 7, 3,
            // Right (+X)
            1, 2, 6,  1, 6, 5,
        ];
        Self::new(positions, indices)
    }

    fn vertex_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
        let mut accum = vec![DVec3::ZERO; positions.len()];
        for tri in indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (pa, pb, pc) = (
                to_dvec(positions[a]),
                to_dvec(positions[b]),
                to_dvec(positions[c]),
            );
            // Area-weighted
            let face = (pb - pa).cross(pc - pa);
            accum[a] += face;
            accum[b] += face;
            accum[c] += face;
        }
        accum
            .into_iter()
            .map(|n| {
                let n = n.normalize_or_zero();
                if n == DVec3::ZERO {
                    [0.0, 0.0, 1.0]
                } else {
                    n.as_vec3().to_array()
                }
            })
            .collect()
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.triangle_count() == 0
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Bounding-box size.
    pub fn extents(&self) -> DVec3 {
        self.bounds.size()
    }

    /// Triangles as world-precision corner triples.
    pub fn triangles(&self) -> impl Iterator<Item = [DVec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |tri| {
            [
                to_dvec(self.positions[tri[0] as usize]),
                to_dvec(self.positions[tri[1] as usize]),
                to_dvec(self.positions[tri[2] as usize]),
            ]
        })
    }

    /// Translate so the bounding box is centred on the origin.
    pub fn centered(mut self) -> Self {
        if !self.bounds.is_valid() {
            return self;
        }
        let center = self.bounds.center().as_vec3();
        for p in &mut self.positions {
            p[0] -= center.x;
            p[1] -= center.y;
            p[2] -= center.z;
        }
        self.bounds = Aabb::from_points(self.positions.iter().copied().map(to_dvec));
        self
    }

    /// Interleaved `[x, y, z, nx, ny, nz, r, g, b, a]` vertices (40-byte stride).
    pub fn interleaved(&self, color: [f32; 4]) -> Vec<f32> {
        let mut data = Vec::with_capacity(self.positions.len() * 10);
        for (p, n) in self.positions.iter().zip(&self.normals) {
            data.extend_from_slice(p);
            data.extend_from_slice(n);
            data.extend_from_slice(&color);
        }
        data
    }

    /// Edges whose adjacent faces meet at `threshold_deg` or more, plus
    /// boundary edges. Vertices are matched by position so split-normal
    /// meshes (such as STL soups) weld correctly.
    pub fn feature_edges(&self, threshold_deg: f64) -> LineSet {
        const PRECISION: f64 = 1e4;
        let threshold_dot = threshold_deg.to_radians().cos();
        let key = |p: [f32; 3]| -> [i64; 3] {
            [
                (p[0] as f64 * PRECISION).round() as i64,
                (p[1] as f64 * PRECISION).round() as i64,
                (p[2] as f64 * PRECISION).round() as i64,
            ]
        };

        // Half-edge key -> (endpoints, face normal); None once matched
        type Entry = Option<([f32; 3], [f32; 3], DVec3)>;
        let mut pending: HashMap<([i64; 3], [i64; 3]), Entry> = HashMap::new();
        let mut segments = Vec::new();

        for tri in self.indices.chunks_exact(3) {
            let corners = [
                self.positions[tri[0] as usize],
                self.positions[tri[1] as usize],
                self.positions[tri[2] as usize],
            ];
            let keys = corners.map(key);
            if keys[0] == keys[1] || keys[1] == keys[2] || keys[2] == keys[0] {
                continue;
            }
            let normal = (to_dvec(corners[1]) - to_dvec(corners[0]))
                .cross(to_dvec(corners[2]) - to_dvec(corners[0]))
                .normalize_or_zero();

            for j in 0..3 {
                let next = (j + 1) % 3;
                let forward = (keys[j], keys[next]);
                let reverse = (keys[next], keys[j]);
                match pending.get_mut(&reverse) {
                    Some(slot) => {
                        if let Some((a, b, other)) = slot.take() {
                            if normal.dot(other) <= threshold_dot {
                                segments.push([a, b]);
                            }
                        }
                    }
                    None => {
                        pending
                            .entry(forward)
                            .or_insert(Some((corners[j], corners[next], normal)));
                    }
                }
            }
        }

        segments.extend(pending.into_values().flatten().map(|(a, b, _)| [a, b]));
        LineSet::new(segments)
    }
}

/// A set of independent line segments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineSet {
    segments: Vec<[[f32; 3]; 2]>,
}

impl LineSet {
    pub fn new(segments: Vec<[[f32; 3]; 2]>) -> Self {
        Self { segments }
    }

    /// The 12 edges of an axis-aligned box centred on the origin.
    pub fn box_edges(size: DVec3) -> Self {
        let h = (size * 0.5).as_vec3();
        let corner = |x: f32, y: f32, z: f32| [x * h.x, y * h.y, z * h.z];
        let mut segments = Vec::with_capacity(12);
        for (y, z) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            segments.push([corner(-1.0, y, z), corner(1.0, y, z)]);
        }
        for (x, z) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            segments.push([corner(x, -1.0, z), corner(x, 1.0, z)]);
        }
        for (x, y) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            segments.push([corner(x, y, -1.0), corner(x, y, 1.0)]);
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[[[f32; 3]; 2]] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment endpoints in world precision.
    pub fn segments_f64(&self) -> impl Iterator<Item = [DVec3; 2]> + '_ {
        self.segments
            .iter()
            .map(|[a, b]| [to_dvec(*a), to_dvec(*b)])
    }

    /// Interleaved vertices in the same layout as meshes, normals zeroed.
    pub fn interleaved(&self, color: [f32; 4]) -> Vec<f32> {
        let mut data = Vec::with_capacity(self.segments.len() * 20);
        for segment in &self.segments {
            for point in segment {
                data.extend_from_slice(point);
                data.extend_from_slice(&[0.0, 0.0, 0.0]);
                data.extend_from_slice(&color);
            }
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_accumulate() {
        let mut bounds = Aabb::empty();
        assert!(!bounds.is_valid());
        bounds.extend(DVec3::new(1.0, 2.0, 3.0));
        bounds.extend(DVec3::new(-1.0, 0.0, 5.0));
        assert!(bounds.is_valid());
        assert_eq!(bounds.size(), DVec3::new(2.0, 2.0, 2.0));
        assert_eq!(bounds.center(), DVec3::new(0.0, 1.0, 4.0));
    }

    #[test]
    fn test_ray_box_slab() {
        let bounds = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        let hit = bounds.intersect_ray(DVec3::new(0.0, 0.0, 10.0), DVec3::NEG_Z);
        assert_eq!(hit, Some(9.0));
        assert!(bounds
            .intersect_ray(DVec3::new(5.0, 0.0, 10.0), DVec3::NEG_Z)
            .is_none());
        assert!(bounds.intersect_ray(DVec3::new(0.0, 0.0, 10.0), DVec3::Z).is_none());
        assert_eq!(bounds.intersect_ray(DVec3::ZERO, DVec3::X), Some(0.0));
    }

    #[test]
    fn test_cuboid_dimensions() {
        let mesh = MeshGeometry::cuboid(DVec3::new(10.0, 20.0, 30.0));
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.extents(), DVec3::new(10.0, 20.0, 30.0));
        assert_eq!(mesh.bounds().center(), DVec3::ZERO);
    }

    #[test]
    fn test_invalid_indices_dropped() {
        let mesh = MeshGeometry::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2, 0, 1, 9, 2],
        );
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_centered_moves_bounds_to_origin() {
        let mesh = MeshGeometry::from_triangles([[
            [10.0, 10.0, 10.0],
            [12.0, 10.0, 10.0],
            [10.0, 14.0, 16.0],
        ]])
        .centered();
        assert_eq!(mesh.bounds().center(), DVec3::ZERO);
        assert_eq!(mesh.extents(), DVec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_cuboid_feature_edges() {
        // Shared cube vertices: 12 hard edges; face diagonals are coplanar
        let mesh = MeshGeometry::cuboid(DVec3::splat(2.0));
        assert_eq!(mesh.feature_edges(1.0).len(), 12);
    }

    #[test]
    fn test_feature_edges_weld_triangle_soup() {
        let cube = MeshGeometry::cuboid(DVec3::splat(2.0));
        let soup = MeshGeometry::from_triangles(cube.triangles().map(|t| {
            t.map(|p| p.as_vec3().to_array())
        }));
        assert_eq!(soup.vertex_count(), 36);
        assert_eq!(soup.feature_edges(1.0).len(), 12);
    }

    #[test]
    fn test_open_triangle_has_boundary_edges() {
        let mesh = MeshGeometry::from_triangles([[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ]]);
        assert_eq!(mesh.feature_edges(1.0).len(), 3);
    }

    #[test]
    fn test_box_edges() {
        let lines = LineSet::box_edges(DVec3::new(2.0, 4.0, 6.0));
        assert_eq!(lines.len(), 12);
        let bounds = Aabb::from_points(lines.segments_f64().flatten());
        assert_eq!(bounds.size(), DVec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_interleaved_stride() {
        let mesh = MeshGeometry::cuboid(DVec3::ONE);
        let data = mesh.interleaved([1.0, 1.0, 1.0, 1.0]);
        assert_eq!(data.len(), mesh.vertex_count() * 10);
        assert_eq!(std::mem::size_of::<f32>() * 10, 40);
    }
}
