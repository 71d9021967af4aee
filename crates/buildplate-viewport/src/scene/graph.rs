//! Scene graph of renderer-owned nodes.
//!
//! Nodes form a forest. A node's world matrix is the product of its
//! ancestors' local matrices and its own. Detaching a node removes its
//! whole subtree and hands the nodes back so the caller can release their
//! GPU handles.

use std::collections::HashMap;
use std::sync::Arc;

use buildplate_core::ModelId;
use glam::DMat4;

use crate::geometry::{LineSet, MeshGeometry};
use crate::scene::backend::{MeshHandle, PrimitiveKind};
use crate::scene::material::Material;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A loaded model; tagged with its id.
    ModelMesh,
    /// Selection outline, child of a model mesh.
    Outline,
    BuildPlate,
    /// Wireframe box of the printable area.
    PrintableArea,
}

#[derive(Debug, Clone)]
pub enum NodeGeometry {
    Mesh(Arc<MeshGeometry>),
    Lines(Arc<LineSet>),
}

impl NodeGeometry {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            NodeGeometry::Mesh(_) => PrimitiveKind::Triangles,
            NodeGeometry::Lines(_) => PrimitiveKind::Lines,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub local: DMat4,
    pub visible: bool,
    /// Model this node belongs to; set on model meshes only.
    pub tag: Option<ModelId>,
    pub geometry: NodeGeometry,
    pub handle: MeshHandle,
    pub material: Material,
}

impl SceneNode {
    pub fn new(kind: NodeKind, geometry: NodeGeometry, handle: MeshHandle, material: Material) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            local: DMat4::IDENTITY,
            visible: true,
            tag: None,
            geometry,
            handle,
            material,
        }
    }

    pub fn with_local(mut self, local: DMat4) -> Self {
        self.local = local;
        self
    }

    pub fn with_tag(mut self, tag: ModelId) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: HashMap<NodeId, SceneNode>,
    roots: Vec<NodeId>,
    next_id: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under `parent`, or as a root. A missing parent makes
    /// the node a root.
    pub fn insert(&mut self, mut node: SceneNode, parent: Option<NodeId>) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        node.children.clear();
        node.parent = None;
        match parent.and_then(|p| self.nodes.get_mut(&p).map(|n| (p, n))) {
            Some((p, parent_node)) => {
                parent_node.children.push(id);
                node.parent = Some(p);
            }
            None => self.roots.push(id),
        }
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its descendants. Returns the removed nodes,
    /// parents before children.
    pub fn detach(&mut self, id: NodeId) -> Vec<SceneNode> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        match node.parent {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children.iter().rev().copied());
                removed.push(node);
            }
        }
        removed
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    fn ancestry(&self, id: NodeId) -> Vec<&SceneNode> {
        let mut chain = Vec::new();
        let mut cursor = self.nodes.get(&id);
        while let Some(node) = cursor {
            chain.push(node);
            cursor = node.parent.and_then(|p| self.nodes.get(&p));
        }
        chain
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<DMat4> {
        if !self.contains(id) {
            return None;
        }
        Some(
            self.ancestry(id)
                .iter()
                .rev()
                .fold(DMat4::IDENTITY, |acc, node| acc * node.local),
        )
    }

    /// True if the node and every ancestor are visible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let chain = self.ancestry(id);
        !chain.is_empty() && chain.iter().all(|n| n.visible)
    }

    /// First tag found walking from the node up to its root.
    pub fn tag_of(&self, id: NodeId) -> Option<ModelId> {
        self.ancestry(id).iter().find_map(|n| n.tag)
    }

    /// Visit visible nodes depth-first with their world matrices.
    pub fn visit_visible<F>(&self, mut visit: F)
    where
        F: FnMut(NodeId, &SceneNode, DMat4),
    {
        let mut stack: Vec<(NodeId, DMat4)> = self
            .roots
            .iter()
            .rev()
            .map(|r| (*r, DMat4::IDENTITY))
            .collect();
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.local;
            visit(id, node, world);
            stack.extend(node.children.iter().rev().map(|c| (*c, world)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn lines_node(kind: NodeKind, handle: u64) -> SceneNode {
        SceneNode::new(
            kind,
            NodeGeometry::Lines(Arc::new(LineSet::box_edges(DVec3::ONE))),
            MeshHandle::new(handle),
            Material::line(buildplate_core::Color::BLACK, 1.0),
        )
    }

    #[test]
    fn test_detach_returns_subtree() {
        let mut graph = SceneGraph::new();
        let id = ModelId::new();
        let mesh = graph.insert(lines_node(NodeKind::ModelMesh, 1).with_tag(id), None);
        let outline = graph.insert(lines_node(NodeKind::Outline, 2).hidden(), Some(mesh));
        let other = graph.insert(lines_node(NodeKind::BuildPlate, 3), None);

        assert_eq!(graph.tag_of(outline), Some(id));
        assert_eq!(graph.tag_of(other), None);

        let removed = graph.detach(mesh);
        let handles: Vec<_> = removed.iter().map(|n| n.handle.raw()).collect();
        assert_eq!(handles, vec![1, 2]);
        assert_eq!(graph.roots(), &[other]);
        assert!(!graph.contains(outline));
        assert!(graph.detach(mesh).is_empty());
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut graph = SceneGraph::new();
        let parent = graph.insert(
            lines_node(NodeKind::ModelMesh, 1)
                .with_local(DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0))),
            None,
        );
        let child = graph.insert(
            lines_node(NodeKind::Outline, 2).with_local(DMat4::from_scale(DVec3::splat(2.0))),
            Some(parent),
        );
        let world = graph.world_matrix(child).expect("Should have a world matrix");
        assert_eq!(world.transform_point3(DVec3::ONE), DVec3::new(3.0, 2.0, 2.0));
    }

    #[test]
    fn test_visit_skips_hidden_subtrees() {
        let mut graph = SceneGraph::new();
        let parent = graph.insert(lines_node(NodeKind::ModelMesh, 1).hidden(), None);
        let child = graph.insert(lines_node(NodeKind::Outline, 2), Some(parent));
        graph.insert(lines_node(NodeKind::BuildPlate, 3), None);

        let mut seen = Vec::new();
        graph.visit_visible(|_, node, _| seen.push(node.handle.raw()));
        assert_eq!(seen, vec![3]);
        assert!(!graph.is_visible(child));
    }
}
