use bevy_math::{Mat3, Mat4, Vec3};
use brushwork_commands::{Command, downcast_command};
use tracing::{debug, warn};

use super::{DocumentCommand, HeldSnapshot};
use crate::{BrushFaceHandle, Document, NodeId};

// ---------------------------------------------------------------------------
// Resize
// ---------------------------------------------------------------------------

/// Moves brush faces along a delta, growing or shrinking their brushes.
pub struct ResizeBrushesCommand {
    faces: Vec<BrushFaceHandle>,
    new_faces: Vec<BrushFaceHandle>,
    delta: Vec3,
    snapshot: HeldSnapshot,
}

impl ResizeBrushesCommand {
    /// Panics if `delta` is zero.
    pub fn new(faces: Vec<BrushFaceHandle>, delta: Vec3) -> Self {
        assert!(delta != Vec3::ZERO, "cannot resize brushes by a zero delta");
        Self {
            faces,
            new_faces: Vec::new(),
            delta,
            snapshot: HeldSnapshot::default(),
        }
    }

    pub fn delta(&self) -> Vec3 {
        self.delta
    }

    pub fn new_faces(&self) -> &[BrushFaceHandle] {
        &self.new_faces
    }

    fn brushes(&self) -> Vec<NodeId> {
        let mut brushes: Vec<NodeId> = self.faces.iter().map(|f| f.node).collect();
        brushes.sort();
        brushes.dedup();
        brushes
    }
}

impl Command<Document> for ResizeBrushesCommand {
    fn name(&self) -> &str {
        "Resize Brushes"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        if !document.can_resize_brushes(&self.faces, self.delta) {
            warn!("resizing {} faces by {} refused", self.faces.len(), self.delta);
            return false;
        }
        let snapshot = document.take_snapshot(&self.brushes());
        self.new_faces = document.perform_resize_brushes(&self.faces, self.delta);
        self.snapshot.store(snapshot);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        self.snapshot.restore(document, "Resize Brushes")
    }

    fn collate_with(&mut self, other: &dyn Command<Document>) -> bool {
        let Some(other) = downcast_command::<Document, Self>(other) else {
            return false;
        };
        if other.faces != self.new_faces {
            return false;
        }
        self.delta += other.delta;
        self.new_faces = other.new_faces.clone();
        true
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformAction {
    Translate,
    Rotate,
    Scale,
    Flip,
    Shear,
}

impl TransformAction {
    pub fn name(self) -> &'static str {
        match self {
            TransformAction::Translate => "Move Objects",
            TransformAction::Rotate => "Rotate Objects",
            TransformAction::Scale => "Scale Objects",
            TransformAction::Flip => "Flip Objects",
            TransformAction::Shear => "Shear Objects",
        }
    }
}

fn about(center: Vec3, linear: Mat4) -> Mat4 {
    Mat4::from_translation(center) * linear * Mat4::from_translation(-center)
}

/// Applies an affine transform to the selected objects.
///
/// Consecutive transforms of the same action and texture lock collate by
/// composing their matrices.
pub struct TransformObjectsCommand {
    action: TransformAction,
    transform: Mat4,
    lock_textures: bool,
    snapshot: HeldSnapshot,
}

impl TransformObjectsCommand {
    pub fn new(action: TransformAction, transform: Mat4, lock_textures: bool) -> Self {
        Self {
            action,
            transform,
            lock_textures,
            snapshot: HeldSnapshot::default(),
        }
    }

    /// Panics if `delta` is zero.
    pub fn translate(delta: Vec3, lock_textures: bool) -> Self {
        assert!(delta != Vec3::ZERO, "cannot move objects by a zero delta");
        Self::new(TransformAction::Translate, Mat4::from_translation(delta), lock_textures)
    }

    /// Rotate by `angle` radians about `axis` through `center`. Panics if the
    /// angle or the axis is zero.
    pub fn rotate(center: Vec3, axis: Vec3, angle: f32, lock_textures: bool) -> Self {
        assert!(angle != 0.0, "cannot rotate objects by a zero angle");
        let Some(axis) = axis.try_normalize() else {
            panic!("cannot rotate objects about a zero axis");
        };
        Self::new(
            TransformAction::Rotate,
            about(center, Mat4::from_axis_angle(axis, angle)),
            lock_textures,
        )
    }

    pub fn scale(center: Vec3, factors: Vec3, lock_textures: bool) -> Self {
        Self::new(
            TransformAction::Scale,
            about(center, Mat4::from_scale(factors)),
            lock_textures,
        )
    }

    /// Mirror along one coordinate axis (0, 1 or 2) through `center`.
    pub fn flip(center: Vec3, axis: usize, lock_textures: bool) -> Self {
        assert!(axis < 3, "flip axis must be 0, 1 or 2, got {axis}");
        let mut factors = Vec3::ONE;
        factors[axis] = -1.0;
        Self::new(
            TransformAction::Flip,
            about(center, Mat4::from_scale(factors)),
            lock_textures,
        )
    }

    /// Move every point by `offset` times its distance from `center` along
    /// `axis`. Panics if `offset` is zero.
    pub fn shear(center: Vec3, axis: Vec3, offset: Vec3, lock_textures: bool) -> Self {
        assert!(offset != Vec3::ZERO, "cannot shear objects by a zero offset");
        let linear = Mat3::from_cols(
            Vec3::X + offset * axis.x,
            Vec3::Y + offset * axis.y,
            Vec3::Z + offset * axis.z,
        );
        Self::new(
            TransformAction::Shear,
            about(center, Mat4::from_mat3(linear)),
            lock_textures,
        )
    }

    pub fn action(&self) -> TransformAction {
        self.action
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }
}

impl Command<Document> for TransformObjectsCommand {
    fn name(&self) -> &str {
        self.action.name()
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        if !document.has_selected_nodes() || !document.can_transform(&self.transform) {
            warn!("{}: refused", self.action.name());
            return false;
        }
        let snapshot = document.take_snapshot(document.selected_nodes());
        if !document.perform_transform(&self.transform, self.lock_textures) {
            return false;
        }
        self.snapshot.store(snapshot);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        self.snapshot.restore(document, self.action.name())
    }

    fn collate_with(&mut self, other: &dyn Command<Document>) -> bool {
        let Some(other) = downcast_command::<Document, Self>(other) else {
            return false;
        };
        if other.action != self.action || other.lock_textures != self.lock_textures {
            return false;
        }
        self.transform = other.transform * self.transform;
        true
    }

    fn repeat(&self, document: &Document) -> Option<DocumentCommand> {
        document
            .has_selected_nodes()
            .then(|| Box::new(Self::new(self.action, self.transform, self.lock_textures)) as DocumentCommand)
    }
}

// ---------------------------------------------------------------------------
// Snap vertices
// ---------------------------------------------------------------------------

pub struct SnapBrushVerticesCommand {
    snap_to: f32,
    snapshot: HeldSnapshot,
}

impl SnapBrushVerticesCommand {
    /// Panics unless `snap_to` is positive.
    pub fn new(snap_to: f32) -> Self {
        assert!(snap_to > 0.0, "snap distance must be positive, got {snap_to}");
        Self {
            snap_to,
            snapshot: HeldSnapshot::default(),
        }
    }
}

impl Command<Document> for SnapBrushVerticesCommand {
    fn name(&self) -> &str {
        "Snap Brush Vertices"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        let brushes = document.selected_brushes();
        if brushes.is_empty() {
            return false;
        }
        let snapshot = document.take_snapshot(&brushes);
        if !document.perform_snap_vertices(self.snap_to) {
            debug!("no vertex needed snapping to {}", self.snap_to);
            return false;
        }
        self.snapshot.store(snapshot);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        self.snapshot.restore(document, "Snap Brush Vertices")
    }

    fn collate_with(&mut self, other: &dyn Command<Document>) -> bool {
        downcast_command::<Document, Self>(other).is_some_and(|other| other.snap_to == self.snap_to)
    }
}

// ---------------------------------------------------------------------------
// Find plane points
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FindPlanePointsCommand {
    snapshot: HeldSnapshot,
}

impl FindPlanePointsCommand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Command<Document> for FindPlanePointsCommand {
    fn name(&self) -> &str {
        "Find Plane Points"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        let brushes = document.selected_brushes();
        if brushes.is_empty() {
            return false;
        }
        let snapshot = document.take_snapshot(&brushes);
        if !document.perform_find_plane_points() {
            return false;
        }
        self.snapshot.store(snapshot);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        self.snapshot.restore(document, "Find Plane Points")
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
        (document, id)
    }

    #[test]
    fn resizes_collate_along_the_moved_face() {
        let (mut document, id) = document_with_cube();
        let top = document.brush(id).unwrap().find_face_by_normal(Vec3::Z).unwrap();
        let mut first = UndoableCommand::<Document>::new(Box::new(ResizeBrushesCommand::new(
            vec![BrushFaceHandle::new(id, top)],
            Vec3::Z * 4.0,
        )));
        assert!(first.perform_do(&mut document));

        let resized = document.brush(id).unwrap().find_face_by_normal(Vec3::Z).unwrap();
        let mut second = UndoableCommand::<Document>::new(Box::new(ResizeBrushesCommand::new(
            vec![BrushFaceHandle::new(id, resized)],
            Vec3::Z * 4.0,
        )));
        assert!(second.perform_do(&mut document));
        assert_eq!(document.brush(id).unwrap().bounds().max.z, 16.0);
        assert!(first.collate_with(&second));

        assert!(first.perform_undo(&mut document));
        assert_eq!(document.brush(id).unwrap().bounds().max.z, 8.0);
        assert!(first.perform_do(&mut document));
        assert_eq!(document.brush(id).unwrap().bounds().max.z, 16.0);
    }

    #[test]
    fn transforms_need_selected_nodes() {
        let (mut document, id) = document_with_cube();
        let mut command = UndoableCommand::<Document>::new(Box::new(TransformObjectsCommand::translate(Vec3::X * 8.0, true)));
        assert!(!command.perform_do(&mut document));

        document.perform_select_nodes(&[id]);
        assert!(command.perform_do(&mut document));
        assert_eq!(document.brush(id).unwrap().bounds().min.x, 0.0);
        assert!(command.perform_undo(&mut document));
        assert_eq!(document.brush(id).unwrap().bounds().min.x, -8.0);
    }

    #[test]
    fn same_transforms_compose() {
        let (mut document, id) = document_with_cube();
        document.perform_select_nodes(&[id]);
        let mut first = UndoableCommand::<Document>::new(Box::new(TransformObjectsCommand::translate(Vec3::X * 8.0, true)));
        let mut second = UndoableCommand::<Document>::new(Box::new(TransformObjectsCommand::translate(Vec3::Y * 8.0, true)));
        let mut flip = UndoableCommand::<Document>::new(Box::new(TransformObjectsCommand::flip(Vec3::ZERO, 2, true)));
        first.perform_do(&mut document);
        second.perform_do(&mut document);
        flip.perform_do(&mut document);
        assert!(first.collate_with(&second));
        assert!(!first.collate_with(&flip));

        let command = downcast_command::<Document, TransformObjectsCommand>(first.command()).unwrap();
        assert_eq!(command.transform().w_axis.truncate(), Vec3::new(8.0, 8.0, 0.0));
        assert!(first.repeat(&document).is_some());
    }

    #[test]
    fn shear_matrix_moves_along_offset() {
        let command = TransformObjectsCommand::shear(Vec3::ZERO, Vec3::Z, Vec3::X, false);
        let moved = command.transform().transform_point3(Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(moved, Vec3::new(2.0, 0.0, 2.0));
    }

    #[test]
    #[should_panic]
    fn zero_shear_panics() {
        TransformObjectsCommand::shear(Vec3::ZERO, Vec3::Z, Vec3::ZERO, false);
    }

    #[test]
    #[should_panic(expected = "zero axis")]
    fn rotation_about_zero_axis_panics() {
        TransformObjectsCommand::rotate(Vec3::ZERO, Vec3::ZERO, 0.5, true);
    }

    #[test]
    #[should_panic(expected = "zero angle")]
    fn rotation_by_zero_angle_panics() {
        TransformObjectsCommand::rotate(Vec3::ZERO, Vec3::Z, 0.0, true);
    }

    #[test]
    fn snap_without_changes_is_not_recorded() {
        let (mut document, id) = document_with_cube();
        document.perform_select_nodes(&[id]);
        let mut command = UndoableCommand::<Document>::new(Box::new(SnapBrushVerticesCommand::new(1.0)));
        assert!(!command.perform_do(&mut document));
    }

    #[test]
    fn find_plane_points_round_trip() {
        let (mut document, id) = document_with_cube();
        document.perform_select_nodes(&[id]);
        document.perform_transform(&Mat4::from_rotation_z(0.3), false);
        let before = document.brush(id).unwrap().clone();

        let mut command = UndoableCommand::<Document>::new(Box::new(FindPlanePointsCommand::new()));
        assert!(command.perform_do(&mut document));
        assert!(command.perform_undo(&mut document));
        assert_eq!(document.brush(id).unwrap(), &before);
    }
}
