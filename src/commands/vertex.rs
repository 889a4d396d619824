//! Vertex tool commands. The same command object can be done and undone any
//! number of times: every do snapshots the current state before editing.

use bevy_math::Vec3;
use brushwork_commands::{Command, downcast_command};
use brushwork_geometry::{Polygon3, Segment3};
use tracing::{debug, warn};

use super::HeldSnapshot;
use crate::handles::{BrushHandle, HandleBrushMap};
use crate::{Document, NodeId};

fn same_brushes(a: &[NodeId], b: &[NodeId]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// Moves vertices, edges or faces of one or more brushes by a delta.
///
/// Two moves collate when they act on the same brushes and the second starts
/// where the first ended, so a whole drag undoes in one step.
pub struct MoveHandlesCommand<H: BrushHandle> {
    name: String,
    brushes: Vec<NodeId>,
    brush_handles: Vec<(NodeId, Vec<H>)>,
    old_handles: Vec<H>,
    new_handles: Vec<H>,
    delta: Vec3,
    snapshot: HeldSnapshot,
}

pub type MoveBrushVerticesCommand = MoveHandlesCommand<Vec3>;
pub type MoveBrushEdgesCommand = MoveHandlesCommand<Segment3>;
pub type MoveBrushFacesCommand = MoveHandlesCommand<Polygon3>;

impl<H: BrushHandle> MoveHandlesCommand<H> {
    /// Panics if `delta` is zero.
    pub fn new(handles: HandleBrushMap<H>, delta: Vec3) -> Self {
        assert!(delta != Vec3::ZERO, "cannot move brush {} by a zero delta", H::PLURAL.to_lowercase());
        let extracted = handles.extract();
        Self {
            name: format!("Move Brush {}", H::PLURAL),
            brushes: extracted.brushes,
            brush_handles: extracted.brush_handles,
            old_handles: extracted.handles,
            new_handles: Vec::new(),
            delta,
            snapshot: HeldSnapshot::default(),
        }
    }

    pub fn delta(&self) -> Vec3 {
        self.delta
    }

    pub fn brushes(&self) -> &[NodeId] {
        &self.brushes
    }

    pub fn old_handles(&self) -> &[H] {
        &self.old_handles
    }

    /// Handle positions after the last do. Empty before the first.
    pub fn new_handles(&self) -> &[H] {
        &self.new_handles
    }
}

impl<H: BrushHandle> Command<Document> for MoveHandlesCommand<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        if !document.can_move_handles(&self.brush_handles, self.delta) {
            warn!("{}: refused by {} brushes", self.name, self.brushes.len());
            return false;
        }
        let snapshot = document.take_snapshot(&self.brushes);
        self.new_handles = document.perform_move_handles(&self.brush_handles, self.delta);
        self.snapshot.store(snapshot);
        document
            .handle_selection_mut()
            .replace(&self.old_handles, &self.new_handles);
        debug!("{} by {}", self.name, self.delta);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        if !self.snapshot.restore(document, &self.name) {
            return false;
        }
        document
            .handle_selection_mut()
            .replace(&self.new_handles, &self.old_handles);
        true
    }

    fn collate_with(&mut self, other: &dyn Command<Document>) -> bool {
        let Some(other) = downcast_command::<Document, Self>(other) else {
            return false;
        };
        if !same_brushes(&self.brushes, &other.brushes) || self.new_handles != other.old_handles {
            return false;
        }
        self.delta += other.delta;
        self.new_handles = other.new_handles.clone();
        true
    }
}

// ---------------------------------------------------------------------------
// Remove
// ---------------------------------------------------------------------------

/// Removes vertices, edges or faces. Removing an edge or a face removes all
/// of its vertices.
pub struct RemoveHandlesCommand<H: BrushHandle> {
    name: String,
    brushes: Vec<NodeId>,
    brush_handles: Vec<(NodeId, Vec<H>)>,
    handles: Vec<H>,
    snapshot: HeldSnapshot,
}

pub type RemoveBrushVerticesCommand = RemoveHandlesCommand<Vec3>;
pub type RemoveBrushEdgesCommand = RemoveHandlesCommand<Segment3>;
pub type RemoveBrushFacesCommand = RemoveHandlesCommand<Polygon3>;

impl<H: BrushHandle> RemoveHandlesCommand<H> {
    pub fn new(handles: HandleBrushMap<H>) -> Self {
        let extracted = handles.extract();
        Self {
            name: format!("Remove Brush {}", H::PLURAL),
            brushes: extracted.brushes,
            brush_handles: extracted.brush_handles,
            handles: extracted.handles,
            snapshot: HeldSnapshot::default(),
        }
    }

    pub fn handles(&self) -> &[H] {
        &self.handles
    }
}

impl<H: BrushHandle> Command<Document> for RemoveHandlesCommand<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        if !document.can_remove_handles(&self.brush_handles) {
            warn!("{}: refused", self.name);
            return false;
        }
        let snapshot = document.take_snapshot(&self.brushes);
        document.perform_remove_handles(&self.brush_handles);
        self.snapshot.store(snapshot);
        document.handle_selection_mut().deselect(&self.handles);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        if !self.snapshot.restore(document, &self.name) {
            return false;
        }
        document.handle_selection_mut().select(&self.handles);
        true
    }
}

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

pub struct AddBrushVerticesCommand {
    brushes: Vec<NodeId>,
    brush_vertices: Vec<(NodeId, Vec<Vec3>)>,
    snapshot: HeldSnapshot,
}

impl AddBrushVerticesCommand {
    /// `vertices` maps each new position to the brushes that receive it.
    pub fn new(vertices: HandleBrushMap<Vec3>) -> Self {
        let extracted = vertices.extract();
        Self {
            brushes: extracted.brushes,
            brush_vertices: extracted.brush_handles,
            snapshot: HeldSnapshot::default(),
        }
    }
}

impl Command<Document> for AddBrushVerticesCommand {
    fn name(&self) -> &str {
        "Add Brush Vertices"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        if !document.can_add_vertices(&self.brush_vertices) {
            warn!("adding vertices refused");
            return false;
        }
        let snapshot = document.take_snapshot(&self.brushes);
        document.perform_add_vertices(&self.brush_vertices);
        self.snapshot.store(snapshot);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        self.snapshot.restore(document, "Add Brush Vertices")
    }
}

#[cfg(test)]
mod tests {
    use brushwork_commands::UndoableCommand;

    use super::*;
    use crate::{EditorConfig, NodeKind};

    fn document_with_cube() -> (Document, NodeId) {
        let mut document = Document::new(EditorConfig::default());
        let cube = document.build_cube(16.0).unwrap();
        let id = document.insert_node(document.default_layer(), NodeKind::brush(cube));
        document.perform_select_nodes(&[id]);
        (document, id)
    }

    fn move_vertex(document: &Document, vertex: Vec3, delta: Vec3) -> UndoableCommand<Document> {
        UndoableCommand::<Document>::new(Box::new(MoveBrushVerticesCommand::new(
            document.handle_brush_map(&[vertex]),
            delta,
        )))
    }

    #[test]
    fn redo_takes_a_fresh_snapshot() {
        let (mut document, id) = document_with_cube();
        let original = document.brush(id).unwrap().clone();
        let mut command = move_vertex(&document, Vec3::splat(8.0), Vec3::new(2.0, 0.0, 0.0));

        assert!(command.perform_do(&mut document));
        let moved = document.brush(id).unwrap().clone();
        for _ in 0..3 {
            assert!(command.perform_undo(&mut document));
            assert_eq!(document.brush(id).unwrap(), &original);
            assert!(command.perform_do(&mut document));
            assert_eq!(document.brush(id).unwrap(), &moved);
        }
    }

    #[test]
    fn handle_selection_follows_moves() {
        let (mut document, _) = document_with_cube();
        let vertex = Vec3::splat(8.0);
        document.handle_selection_mut().select(&[vertex]);
        let mut command = move_vertex(&document, vertex, Vec3::new(2.0, 0.0, 0.0));

        command.perform_do(&mut document);
        assert_eq!(document.handle_selection().selected::<Vec3>(), &[Vec3::new(10.0, 8.0, 8.0)]);
        command.perform_undo(&mut document);
        assert_eq!(document.handle_selection().selected::<Vec3>(), &[vertex]);
    }

    #[test]
    fn refused_move_changes_nothing() {
        let (mut document, id) = document_with_cube();
        document.render_cache(id);
        let mut command = move_vertex(&document, Vec3::splat(8.0), Vec3::splat(-24.0));
        assert!(!command.perform_do(&mut document));
        assert!(document.brush_node(id).unwrap().render_cache().is_valid());
    }

    #[test]
    fn continuous_moves_collate() {
        let (mut document, _) = document_with_cube();
        let mut first = move_vertex(&document, Vec3::splat(8.0), Vec3::new(1.0, 0.0, 0.0));
        first.perform_do(&mut document);
        let mut second = move_vertex(&document, Vec3::new(9.0, 8.0, 8.0), Vec3::new(1.0, 0.0, 0.0));
        second.perform_do(&mut document);
        assert!(first.collate_with(&second));

        let mut unrelated = move_vertex(&document, Vec3::splat(-8.0), Vec3::new(-1.0, 0.0, 0.0));
        unrelated.perform_do(&mut document);
        assert!(!first.collate_with(&unrelated));

        let command = downcast_command::<Document, MoveBrushVerticesCommand>(first.command()).unwrap();
        assert_eq!(command.delta(), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(command.new_handles(), &[Vec3::new(10.0, 8.0, 8.0)]);
    }

    #[test]
    #[should_panic]
    fn zero_delta_panics() {
        let (document, _) = document_with_cube();
        move_vertex(&document, Vec3::splat(8.0), Vec3::ZERO);
    }

    #[test]
    fn remove_and_add_vertex() {
        let (mut document, id) = document_with_cube();
        let vertex = Vec3::splat(8.0);
        let mut remove = UndoableCommand::<Document>::new(Box::new(RemoveBrushVerticesCommand::new(
            document.handle_brush_map(&[vertex]),
        )));
        assert!(remove.perform_do(&mut document));
        assert_eq!(document.brush(id).unwrap().vertex_count(), 7);

        let mut add = UndoableCommand::<Document>::new(Box::new(AddBrushVerticesCommand::new(
            [(vertex, vec![id])].into_iter().collect(),
        )));
        assert!(add.perform_do(&mut document));
        assert_eq!(document.brush(id).unwrap().vertex_count(), 8);
        assert!(add.perform_undo(&mut document));
        assert!(remove.perform_undo(&mut document));
        assert!(document.brush(id).unwrap().has_vertex(vertex));
    }

    #[test]
    fn edge_moves_collate_on_the_moved_edge() {
        let (mut document, id) = document_with_cube();
        let edge = Segment3::new(Vec3::new(8.0, 8.0, -8.0), Vec3::splat(8.0));
        let delta = Vec3::new(1.0, 1.0, 0.0);
        let mut first = UndoableCommand::<Document>::new(Box::new(MoveBrushEdgesCommand::new(
            document.handle_brush_map(&[edge]),
            delta,
        )));
        assert!(first.perform_do(&mut document));
        let moved = edge.translated(delta);
        assert!(document.brush(id).unwrap().has_edge(&moved));

        let mut second = UndoableCommand::<Document>::new(Box::new(MoveBrushEdgesCommand::new(
            document.handle_brush_map(&[moved]),
            delta,
        )));
        assert!(second.perform_do(&mut document));
        assert!(first.collate_with(&second));
        assert!(first.perform_undo(&mut document));
        assert!(document.brush(id).unwrap().has_edge(&edge));
    }
}
