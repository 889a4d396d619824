//! The user-level editing API: every edit is built as a command and submitted
//! to the history so it can be undone.

use std::path::Path;

use bevy_math::{Vec2, Vec3};
use brushwork_commands::CommandHistory;
use brushwork_geometry::{ChangeBrushFaceAttributesRequest, Polygon3, Segment3};
use tracing::{debug, info, warn};

use crate::commands::{
    AddBrushVerticesCommand, AddRemoveNodesCommand, ChangeBrushFaceAttributesCommand, ChangeEntityAttributesCommand,
    CopyTexCoordSystemFromFaceCommand, DocumentCommand, DuplicateNodesCommand, FindPlanePointsCommand,
    MoveHandlesCommand, MoveTexturesCommand, RemoveHandlesCommand, RenameGroupsCommand, ReparentNodesCommand,
    ResizeBrushesCommand, RotateTexturesCommand, SelectionCommand, ShearTexturesCommand, SnapBrushVerticesCommand,
    TransformObjectsCommand,
};
use crate::handles::{BrushHandle, HandleBrushMap};
use crate::issues::{Issue, QuickFix};
use crate::{BrushFaceHandle, Document, EditorConfig, NodeId, NodeKind};

pub struct Editor {
    document: Document,
    history: CommandHistory<Document>,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let history = CommandHistory::new(config.history_limit, config.collation_window());
        Self {
            document: Document::new(config),
            history,
        }
    }

    /// An editor configured from a JSON file, or with defaults if the file
    /// does not exist.
    pub fn from_config_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config = EditorConfig::load_or_default(path)?;
        Ok(Self::new(config))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct access for building documents outside of the history.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn history(&self) -> &CommandHistory<Document> {
        &self.history
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn submit(&mut self, command: DocumentCommand) -> bool {
        self.history.submit(command, &mut self.document)
    }

    pub fn undo(&mut self) -> Option<String> {
        self.history.undo(&mut self.document)
    }

    pub fn redo(&mut self) -> Option<String> {
        self.history.redo(&mut self.document)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Replay the commands recorded since the last selection change.
    pub fn repeat_last_commands(&mut self) -> bool {
        self.history.repeat(&mut self.document)
    }

    pub fn begin_transaction(&mut self, name: impl Into<String>) {
        self.history.begin_transaction(name);
    }

    pub fn commit_transaction(&mut self) -> bool {
        self.history.commit_transaction(&mut self.document)
    }

    pub fn rollback_transaction(&mut self) -> bool {
        self.history.rollback_transaction(&mut self.document)
    }

    /// Run `f` in a transaction. It is committed if `f` succeeds and rolled
    /// back otherwise.
    fn transaction(&mut self, name: &str, f: impl FnOnce(&mut Self) -> bool) -> bool {
        self.begin_transaction(name);
        if f(self) {
            self.commit_transaction()
        } else {
            self.rollback_transaction();
            false
        }
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node under the current parent.
    pub fn add_node(&mut self, kind: NodeKind) -> Option<NodeId> {
        let parent = self.document.current_parent();
        self.add_node_to(parent, kind)
    }

    pub fn add_node_to(&mut self, parent: NodeId, kind: NodeKind) -> Option<NodeId> {
        let node = self.document.new_node(parent, kind);
        let id = node.root();
        self.submit(Box::new(AddRemoveNodesCommand::add(vec![node])))
            .then_some(id)
    }

    pub fn remove_nodes(&mut self, ids: Vec<NodeId>) -> bool {
        self.submit(Box::new(AddRemoveNodesCommand::remove(ids)))
    }

    /// Deselect and remove the selected nodes as one undo step.
    pub fn remove_selected(&mut self) -> bool {
        let selected = self.document.selected_nodes().to_vec();
        if selected.is_empty() {
            return false;
        }
        self.transaction("Delete Objects", |editor| {
            editor.submit(Box::new(SelectionCommand::deselect_all())) && editor.remove_nodes(selected)
        })
    }

    /// Duplicate the selected nodes. Returns the ids of the copies.
    pub fn duplicate_objects(&mut self) -> Vec<NodeId> {
        if !self.submit(Box::new(DuplicateNodesCommand::new())) {
            return Vec::new();
        }
        self.document.selected_nodes().to_vec()
    }

    /// Move nodes with their subtrees under `new_parent`.
    pub fn reparent_nodes(&mut self, ids: Vec<NodeId>, new_parent: NodeId) -> bool {
        self.submit(Box::new(ReparentNodesCommand::new(ids, new_parent)))
    }

    // ------------------------------------------------------------------
    // Entities and groups
    // ------------------------------------------------------------------

    pub fn set_entity_property(&mut self, key: &str, value: &str) -> bool {
        self.submit(Box::new(ChangeEntityAttributesCommand::set(key, value)))
    }

    pub fn remove_entity_property(&mut self, key: &str) -> bool {
        self.submit(Box::new(ChangeEntityAttributesCommand::remove(key)))
    }

    pub fn rename_entity_property(&mut self, old_key: &str, new_key: &str) -> bool {
        self.submit(Box::new(ChangeEntityAttributesCommand::rename(old_key, new_key)))
    }

    /// Give every selected group the same name. Blank names are refused.
    pub fn rename_groups(&mut self, name: &str) -> bool {
        if name.trim().is_empty() {
            debug!("ignoring blank group name");
            return false;
        }
        self.submit(Box::new(RenameGroupsCommand::new(name)))
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn select(&mut self, nodes: Vec<NodeId>) -> bool {
        self.submit(Box::new(SelectionCommand::select(nodes)))
    }

    pub fn select_faces(&mut self, faces: Vec<BrushFaceHandle>) -> bool {
        self.submit(Box::new(SelectionCommand::select_faces(faces)))
    }

    pub fn select_all_nodes(&mut self) -> bool {
        self.submit(Box::new(SelectionCommand::select_all_nodes()))
    }

    pub fn select_all_faces(&mut self) -> bool {
        self.submit(Box::new(SelectionCommand::select_all_faces()))
    }

    pub fn convert_to_face_selection(&mut self) -> bool {
        self.submit(Box::new(SelectionCommand::convert_to_faces()))
    }

    pub fn deselect(&mut self, nodes: Vec<NodeId>) -> bool {
        self.submit(Box::new(SelectionCommand::deselect(nodes)))
    }

    pub fn deselect_faces(&mut self, faces: Vec<BrushFaceHandle>) -> bool {
        self.submit(Box::new(SelectionCommand::deselect_faces(faces)))
    }

    pub fn deselect_all(&mut self) -> bool {
        self.submit(Box::new(SelectionCommand::deselect_all()))
    }

    // ------------------------------------------------------------------
    // Vertex tool
    // ------------------------------------------------------------------

    fn move_handles<H: BrushHandle>(&mut self, handles: &[H], delta: Vec3) -> bool {
        if delta == Vec3::ZERO || handles.is_empty() {
            return false;
        }
        let map: HandleBrushMap<H> = self.document.handle_brush_map(handles);
        self.submit(Box::new(MoveHandlesCommand::new(map, delta)))
    }

    fn remove_handles<H: BrushHandle>(&mut self, handles: &[H]) -> bool {
        if handles.is_empty() {
            return false;
        }
        let map: HandleBrushMap<H> = self.document.handle_brush_map(handles);
        self.submit(Box::new(RemoveHandlesCommand::new(map)))
    }

    /// Move vertices of the selected brushes. A zero delta does nothing.
    pub fn move_vertices(&mut self, vertices: &[Vec3], delta: Vec3) -> bool {
        self.move_handles(vertices, delta)
    }

    pub fn move_edges(&mut self, edges: &[Segment3], delta: Vec3) -> bool {
        self.move_handles(edges, delta)
    }

    pub fn move_faces(&mut self, faces: &[Polygon3], delta: Vec3) -> bool {
        self.move_handles(faces, delta)
    }

    /// Add the given points as vertices to every selected brush.
    pub fn add_vertices(&mut self, positions: &[Vec3]) -> bool {
        let brushes = self.document.selected_brushes();
        if positions.is_empty() || brushes.is_empty() {
            return false;
        }
        let map: HandleBrushMap<Vec3> = positions
            .iter()
            .map(|position| (*position, brushes.clone()))
            .collect();
        self.submit(Box::new(AddBrushVerticesCommand::new(map)))
    }

    pub fn remove_vertices(&mut self, vertices: &[Vec3]) -> bool {
        self.remove_handles(vertices)
    }

    pub fn remove_edges(&mut self, edges: &[Segment3]) -> bool {
        self.remove_handles(edges)
    }

    pub fn remove_faces(&mut self, faces: &[Polygon3]) -> bool {
        self.remove_handles(faces)
    }

    /// Move the given faces along `delta`, resizing their brushes.
    pub fn resize_brushes(&mut self, faces: Vec<BrushFaceHandle>, delta: Vec3) -> bool {
        if delta == Vec3::ZERO || faces.is_empty() {
            return false;
        }
        self.submit(Box::new(ResizeBrushesCommand::new(faces, delta)))
    }

    // ------------------------------------------------------------------
    // Object transforms
    // ------------------------------------------------------------------

    fn texture_lock(&self) -> bool {
        self.document.config().texture_lock
    }

    pub fn translate_objects(&mut self, delta: Vec3) -> bool {
        if delta == Vec3::ZERO {
            return false;
        }
        let lock = self.texture_lock();
        self.submit(Box::new(TransformObjectsCommand::translate(delta, lock)))
    }

    /// Rotate the selected objects by `angle` radians about `axis` through `center`.
    pub fn rotate_objects(&mut self, center: Vec3, axis: Vec3, angle: f32) -> bool {
        if angle == 0.0 || axis.try_normalize().is_none() {
            return false;
        }
        let lock = self.texture_lock();
        self.submit(Box::new(TransformObjectsCommand::rotate(center, axis, angle, lock)))
    }

    pub fn scale_objects(&mut self, center: Vec3, factors: Vec3) -> bool {
        let lock = self.texture_lock();
        self.submit(Box::new(TransformObjectsCommand::scale(center, factors, lock)))
    }

    pub fn flip_objects(&mut self, center: Vec3, axis: usize) -> bool {
        let lock = self.texture_lock();
        self.submit(Box::new(TransformObjectsCommand::flip(center, axis, lock)))
    }

    pub fn shear_objects(&mut self, center: Vec3, axis: Vec3, offset: Vec3) -> bool {
        if offset == Vec3::ZERO {
            return false;
        }
        let lock = self.texture_lock();
        self.submit(Box::new(TransformObjectsCommand::shear(center, axis, offset, lock)))
    }

    // ------------------------------------------------------------------
    // Brush geometry
    // ------------------------------------------------------------------

    /// Snap the selected brushes to the configured grid.
    pub fn snap_vertices(&mut self) -> bool {
        let grid = self.document.config().grid_size;
        self.snap_vertices_to(grid)
    }

    pub fn snap_vertices_to(&mut self, snap_to: f32) -> bool {
        self.submit(Box::new(SnapBrushVerticesCommand::new(snap_to)))
    }

    pub fn find_plane_points(&mut self) -> bool {
        self.submit(Box::new(FindPlanePointsCommand::new()))
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    pub fn set_face_attributes(&mut self, request: ChangeBrushFaceAttributesRequest) -> bool {
        if request.is_empty() {
            debug!("ignoring an empty face attribute request");
            return false;
        }
        self.submit(Box::new(ChangeBrushFaceAttributesCommand::new(request)))
    }

    pub fn move_textures(&mut self, camera_up: Vec3, camera_right: Vec3, offset: Vec2) -> bool {
        if offset == Vec2::ZERO {
            return false;
        }
        self.submit(Box::new(MoveTexturesCommand::new(camera_up, camera_right, offset)))
    }

    /// Rotate the textures of the selected faces by `angle` degrees.
    pub fn rotate_textures(&mut self, angle: f32) -> bool {
        if angle == 0.0 {
            return false;
        }
        self.submit(Box::new(RotateTexturesCommand::new(angle)))
    }

    pub fn shear_textures(&mut self, factors: Vec2) -> bool {
        if factors == Vec2::ZERO {
            return false;
        }
        self.submit(Box::new(ShearTexturesCommand::new(factors)))
    }

    /// Give the selected faces the texture alignment of `source`.
    pub fn copy_tex_coord_system_from_face(&mut self, source: BrushFaceHandle) -> bool {
        let Some(face) = self.document.face(source) else {
            warn!("no face {} on {}", source.face, source.node);
            return false;
        };
        let command =
            CopyTexCoordSystemFromFaceCommand::new(face.take_tex_coord_snapshot(), face.attributes().clone(), *face.plane());
        self.submit(Box::new(command))
    }

    // ------------------------------------------------------------------
    // Issues
    // ------------------------------------------------------------------

    pub fn issues(&mut self, node: NodeId) -> Vec<Issue> {
        self.document.issues(node)
    }

    /// Fix `issue` by selecting what it concerns and running the command the
    /// fix maps to, as one undo step.
    pub fn apply_quick_fix(&mut self, issue: &Issue, fix: QuickFix) -> bool {
        if !issue.kind.quick_fixes().contains(&fix) {
            warn!("{fix:?} does not fix '{}'", issue.description);
            return false;
        }
        info!("applying {fix:?} to {}", issue.node);
        let node = issue.node;
        let face = issue.face;
        self.transaction(&format!("Fix {}", issue.description), move |editor| match fix {
            QuickFix::SnapVertices => editor.select(vec![node]) && editor.snap_vertices_to(1.0),
            QuickFix::FindPlanePoints => editor.select(vec![node]) && editor.find_plane_points(),
            QuickFix::ResetTextureScale => {
                let faces = match face {
                    Some(face) => vec![BrushFaceHandle::new(node, face)],
                    None => return false,
                };
                let mut request = ChangeBrushFaceAttributesRequest::new();
                request.set_scale(1.0, 1.0);
                editor.select_faces(faces) && editor.set_face_attributes(request)
            }
            QuickFix::DeleteObjects => editor.select(vec![node]) && editor.remove_selected(),
            QuickFix::MoveBrushesToParent => {
                let Some(entity) = editor.document.node(node) else {
                    return false;
                };
                let Some(parent) = entity.parent() else {
                    return false;
                };
                let brushes = entity.children().to_vec();
                editor.reparent_nodes(brushes, parent)
            }
        })
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}
