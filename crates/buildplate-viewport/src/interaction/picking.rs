//! Ray hit-testing against model subtrees of the scene graph.
//!
//! Only subtrees whose root carries a model tag are tested, so the build
//! plate and printable-area box never intercept a click. Hidden nodes
//! (an unselected model's outline) are skipped.

use buildplate_core::ModelId;
use glam::DVec3;

use crate::interaction::camera::Ray;
use crate::scene::{NodeGeometry, NodeId, SceneGraph};

const EPSILON: f64 = 1e-9;

/// Nearest intersection of a ray with a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub node: NodeId,
    pub model_id: ModelId,
    /// Distance from the ray origin, in render units.
    pub distance: f64,
    pub point: DVec3,
}

/// Möller-Trumbore. `direction` need not be unit length; the returned `t`
/// is in units of `direction`.
pub fn ray_triangle(origin: DVec3, direction: DVec3, tri: &[DVec3; 3]) -> Option<f64> {
    let edge1 = tri[1] - tri[0];
    let edge2 = tri[2] - tri[0];
    let h = direction.cross(edge2);
    let det = edge1.dot(h);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - tri[0];
    let u = inv_det * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = inv_det * direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = inv_det * edge2.dot(q);
    (t > EPSILON).then_some(t)
}

/// Closest approach between a ray and a segment.
///
/// Returns `(ray_t, distance)` where `ray_t` is along the unit ray.
pub fn ray_segment(ray: &Ray, a: DVec3, b: DVec3) -> (f64, f64) {
    let seg = b - a;
    let w0 = ray.origin - a;
    let seg_len_sq = seg.length_squared();
    let d_dot_seg = ray.direction.dot(seg);
    let d_dot_w = ray.direction.dot(w0);
    let seg_dot_w = seg.dot(w0);
    let denom = seg_len_sq - d_dot_seg * d_dot_seg;

    let mut s = if seg_len_sq < EPSILON {
        0.0
    } else if denom.abs() < EPSILON {
        // Parallel; any point works, pick the segment start
        0.0
    } else {
        ((seg_dot_w - d_dot_seg * d_dot_w) / denom).clamp(0.0, 1.0)
    };
    let mut t = d_dot_seg * s - d_dot_w;
    if t < 0.0 {
        t = 0.0;
        if seg_len_sq >= EPSILON {
            s = (-seg_dot_w / seg_len_sq).clamp(0.0, 1.0);
        }
    }
    let on_ray = ray.at(t);
    let on_seg = a + seg * s;
    (t, on_ray.distance(on_seg))
}

fn hit_node(graph: &SceneGraph, id: NodeId, ray: &Ray, line_threshold: f64) -> Option<(f64, DVec3)> {
    let node = graph.get(id)?;
    let world = graph.world_matrix(id)?;
    match &node.geometry {
        NodeGeometry::Mesh(mesh) => {
            let inverse = world.inverse();
            let origin = inverse.transform_point3(ray.origin);
            let direction = inverse.transform_vector3(ray.direction);
            // Same parameter as the world ray, since the map is affine
            mesh.bounds().intersect_ray(origin, direction)?;
            let t = mesh
                .triangles()
                .filter_map(|tri| ray_triangle(origin, direction, &tri))
                .fold(f64::INFINITY, f64::min);
            t.is_finite().then(|| (t, ray.at(t)))
        }
        NodeGeometry::Lines(lines) => {
            let threshold_sq = line_threshold * line_threshold;
            lines
                .segments_f64()
                .filter_map(|[a, b]| {
                    let (t, distance) =
                        ray_segment(ray, world.transform_point3(a), world.transform_point3(b));
                    (distance * distance <= threshold_sq).then_some(t)
                })
                .min_by(|a, b| a.total_cmp(b))
                .map(|t| (t, ray.at(t)))
        }
    }
}

/// Intersect `ray` with every visible node of every tagged subtree and
/// return the nearest hit, with the tag found walking up from the node.
pub fn pick(graph: &SceneGraph, ray: &Ray, line_threshold: f64) -> Option<PickHit> {
    let mut best: Option<PickHit> = None;
    for root in graph.roots() {
        if graph.tag_of(*root).is_none() {
            continue;
        }
        let mut stack = vec![*root];
        while let Some(id) = stack.pop() {
            let Some(node) = graph.get(id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            stack.extend(node.children.iter().copied());

            let Some((distance, point)) = hit_node(graph, id, ray, line_threshold) else {
                continue;
            };
            let Some(model_id) = graph.tag_of(id) else {
                continue;
            };
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(PickHit {
                    node: id,
                    model_id,
                    distance,
                    point,
                });
            }
        }
    }
    best
}
