//! Captured node and face state for undo.

use std::collections::BTreeMap;

use brushwork_geometry::{Brush, BrushFace};
use thiserror::Error;

use crate::{BrushFaceHandle, Document, Node, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("node {0} no longer exists")]
    MissingNode(NodeId),
    #[error("node {0} is not a brush")]
    NotABrush(NodeId),
    #[error("node {0} is not an entity")]
    NotAnEntity(NodeId),
    #[error("node {0} is not a group")]
    NotAGroup(NodeId),
    #[error("face {0} does not exist")]
    InvalidFaceIndex(BrushFaceHandle),
    #[error("face {0} no longer lies in its captured plane")]
    FacePlaneChanged(BrushFaceHandle),
    #[error("restored brush {0} would leave the world bounds")]
    OutOfWorldBounds(NodeId),
}

/// The restorable state of one node or face.
#[derive(Debug, Clone)]
pub enum Capture {
    Brush { node: NodeId, brush: Brush },
    Entity { node: NodeId, properties: BTreeMap<String, String> },
    Group { node: NodeId, name: String },
    Face { handle: BrushFaceHandle, face: BrushFace },
}

impl Capture {
    fn validate(&self, document: &Document, errors: &mut Vec<SnapshotError>) {
        let id = match self {
            Capture::Brush { node, .. } | Capture::Entity { node, .. } | Capture::Group { node, .. } => *node,
            Capture::Face { handle, .. } => handle.node,
        };
        let Some(node) = document.node(id) else {
            errors.push(SnapshotError::MissingNode(id));
            return;
        };

        match (self, node.kind()) {
            (Capture::Brush { brush, .. }, NodeKind::Brush(_)) => {
                if !document.world_bounds().contains(&brush.bounds()) {
                    errors.push(SnapshotError::OutOfWorldBounds(id));
                }
            }
            (Capture::Brush { .. }, _) => errors.push(SnapshotError::NotABrush(id)),
            (Capture::Entity { .. }, NodeKind::Entity { .. }) => {}
            (Capture::Entity { .. }, _) => errors.push(SnapshotError::NotAnEntity(id)),
            (Capture::Group { .. }, NodeKind::Group { .. }) => {}
            (Capture::Group { .. }, _) => errors.push(SnapshotError::NotAGroup(id)),
            (Capture::Face { handle, face }, NodeKind::Brush(brush)) => match brush.brush().faces().get(handle.face) {
                None => errors.push(SnapshotError::InvalidFaceIndex(*handle)),
                Some(current) if !current.plane().is_equivalent(face.plane()) => {
                    errors.push(SnapshotError::FacePlaneChanged(*handle));
                }
                Some(_) => {}
            },
            (Capture::Face { .. }, _) => errors.push(SnapshotError::NotABrush(id)),
        }
    }

    /// Only called after [`Capture::validate`] found nothing wrong.
    fn apply(&self, document: &mut Document) {
        match self {
            Capture::Brush { node, brush } => document.replace_brush(*node, brush.clone()),
            Capture::Entity { node, properties } => {
                if let Some(NodeKind::Entity { properties: target }) = document.node_mut(*node).map(|n| &mut n.kind) {
                    *target = properties.clone();
                }
            }
            Capture::Group { node, name } => {
                if let Some(NodeKind::Group { name: target }) = document.node_mut(*node).map(|n| &mut n.kind) {
                    *target = name.clone();
                }
            }
            Capture::Face { handle, face } => {
                if let Some(target) = document.node_mut(handle.node).and_then(Node::as_brush_mut) {
                    target.restore_face(handle.face, face.clone());
                }
            }
        }
    }
}

impl Node {
    /// The restorable state of this node itself. Worlds and layers carry none.
    pub fn take_snapshot(&self) -> Option<Capture> {
        match &self.kind {
            NodeKind::World | NodeKind::Layer { .. } => None,
            NodeKind::Group { name } => Some(Capture::Group {
                node: self.id,
                name: name.clone(),
            }),
            NodeKind::Entity { properties } => Some(Capture::Entity {
                node: self.id,
                properties: properties.clone(),
            }),
            NodeKind::Brush(brush) => Some(Capture::Brush {
                node: self.id,
                brush: brush.brush().clone(),
            }),
        }
    }
}

/// State captured before an edit, restored on undo.
///
/// Restoring is all-or-nothing: every capture is checked against the document
/// first, and the document is only touched if all of them still apply.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    captures: Vec<Capture>,
}

impl Snapshot {
    pub fn new(captures: Vec<Capture>) -> Self {
        Self { captures }
    }

    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn validate(&self, document: &Document) -> Result<(), Vec<SnapshotError>> {
        let mut errors = Vec::new();
        for capture in &self.captures {
            capture.validate(document, &mut errors);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn restore(&self, document: &mut Document) -> Result<(), Vec<SnapshotError>> {
        self.validate(document)?;
        for capture in &self.captures {
            capture.apply(document);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bevy_math::Vec3;

    use super::*;
    use crate::EditorConfig;

    fn document_with_cube() -> (Document, NodeId) {
        let mut document = Document::new(EditorConfig::default());
        let cube = document.build_cube(16.0).unwrap();
        let id = document.insert_node(document.default_layer(), NodeKind::brush(cube));
        (document, id)
    }

    #[test]
    fn restore_puts_back_brush_and_faces() {
        let (mut document, id) = document_with_cube();
        let snapshot = document.take_snapshot(&[id]);
        let face_snapshot = document.take_face_snapshot(&[BrushFaceHandle::new(id, 0)]);
        let before = document.brush(id).unwrap().clone();

        document.perform_select_nodes(&[id]);
        assert!(document.perform_transform(&bevy_math::Mat4::from_translation(Vec3::X * 16.0), true));
        assert_ne!(document.brush(id).unwrap().bounds(), before.bounds());

        snapshot.restore(&mut document).unwrap();
        assert_eq!(document.brush(id).unwrap().vertex_positions(), before.vertex_positions());

        document.perform_select_faces(&[BrushFaceHandle::new(id, 0)]);
        document.perform_rotate_textures(30.0);
        face_snapshot.restore(&mut document).unwrap();
        assert_eq!(document.brush(id).unwrap().faces()[0], before.faces()[0]);
    }

    #[test]
    fn restore_is_all_or_nothing() {
        let (mut document, id) = document_with_cube();
        let group = document.insert_node(document.default_layer(), NodeKind::group("g"));
        let snapshot = Snapshot::new(vec![
            Capture::Group {
                node: group,
                name: "renamed".to_owned(),
            },
            Capture::Brush {
                node: group,
                brush: document.brush(id).unwrap().clone(),
            },
            Capture::Face {
                handle: BrushFaceHandle::new(id, 9),
                face: document.brush(id).unwrap().faces()[0].clone(),
            },
        ]);

        let errors = snapshot.restore(&mut document).unwrap_err();
        assert_eq!(
            errors,
            vec![
                SnapshotError::NotABrush(group),
                SnapshotError::InvalidFaceIndex(BrushFaceHandle::new(id, 9))
            ]
        );
        assert!(matches!(document.node(group).unwrap().kind(), NodeKind::Group { name } if name == "g"));
    }

    #[test]
    fn missing_node_is_reported() {
        let (mut document, id) = document_with_cube();
        let snapshot = document.take_snapshot(&[id]);
        document.perform_remove_nodes(&[id]);
        assert_eq!(
            snapshot.restore(&mut document).unwrap_err(),
            vec![SnapshotError::MissingNode(id)]
        );
    }

    #[test]
    fn face_capture_needs_the_same_plane() {
        let (mut document, id) = document_with_cube();
        let top = document.brush(id).unwrap().find_face_by_normal(Vec3::Z).unwrap();
        let handle = BrushFaceHandle::new(id, top);
        let face_snapshot = document.take_face_snapshot(&[handle]);

        document.perform_select_nodes(&[id]);
        assert!(document.perform_transform(&bevy_math::Mat4::from_translation(Vec3::Z * 16.0), true));
        let moved = document.brush(id).unwrap().clone();

        assert_eq!(
            face_snapshot.restore(&mut document).unwrap_err(),
            vec![SnapshotError::FacePlaneChanged(handle)]
        );
        assert_eq!(document.brush(id).unwrap(), &moved);
    }
}
