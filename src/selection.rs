//! Node and face selection.

use crate::{BrushFaceHandle, NodeId};

/// Selected nodes in selection order, or selected brush faces. The two are
/// mutually exclusive: selecting one kind clears the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    nodes: Vec<NodeId>,
    faces: Vec<BrushFaceHandle>,
}

impl Selection {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn faces(&self) -> &[BrushFaceHandle] {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.faces.is_empty()
    }

    pub fn has_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }

    pub fn is_node_selected(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn is_face_selected(&self, face: BrushFaceHandle) -> bool {
        self.faces.contains(&face)
    }

    pub fn select_nodes(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.faces.clear();
        for node in nodes {
            if !self.nodes.contains(&node) {
                self.nodes.push(node);
            }
        }
    }

    pub fn select_faces(&mut self, faces: impl IntoIterator<Item = BrushFaceHandle>) {
        self.nodes.clear();
        for face in faces {
            if !self.faces.contains(&face) {
                self.faces.push(face);
            }
        }
    }

    pub fn deselect_nodes(&mut self, nodes: &[NodeId]) {
        self.nodes.retain(|n| !nodes.contains(n));
    }

    pub fn deselect_faces(&mut self, faces: &[BrushFaceHandle]) {
        self.faces.retain(|f| !faces.contains(f));
    }

    /// Drop every node and every face of the given nodes.
    pub(crate) fn forget_nodes(&mut self, nodes: &[NodeId]) {
        self.nodes.retain(|n| !nodes.contains(n));
        self.faces.retain(|f| !nodes.contains(&f.node));
    }

    /// Replace the face selection, keeping its order.
    pub(crate) fn set_faces(&mut self, faces: Vec<BrushFaceHandle>) {
        self.nodes.clear();
        self.faces = faces;
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.faces.clear();
    }
}
