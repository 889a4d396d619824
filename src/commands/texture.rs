use bevy_math::{Vec2, Vec3};
use brushwork_commands::{Command, downcast_command};
use brushwork_geometry::{BrushFaceAttributes, BrushPlane, ChangeBrushFaceAttributesRequest, TexCoordSnapshot};
use tracing::debug;

use super::{DocumentCommand, HeldSnapshot};
use crate::Document;

fn repeat_on_faces(document: &Document, command: impl FnOnce() -> DocumentCommand) -> Option<DocumentCommand> {
    document.has_selected_brush_faces().then(command)
}

// ---------------------------------------------------------------------------
// Face attributes
// ---------------------------------------------------------------------------

/// Applies a [`ChangeBrushFaceAttributesRequest`] to every selected face.
pub struct ChangeBrushFaceAttributesCommand {
    request: ChangeBrushFaceAttributesRequest,
    snapshot: HeldSnapshot,
}

impl ChangeBrushFaceAttributesCommand {
    pub fn new(request: ChangeBrushFaceAttributesRequest) -> Self {
        Self {
            request,
            snapshot: HeldSnapshot::default(),
        }
    }

    pub fn request(&self) -> &ChangeBrushFaceAttributesRequest {
        &self.request
    }
}

impl Command<Document> for ChangeBrushFaceAttributesCommand {
    fn name(&self) -> &str {
        self.request.name()
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        let faces = document.selected_brush_faces();
        if faces.is_empty() {
            return false;
        }
        let snapshot = document.take_face_snapshot(&faces);
        if !document.perform_change_brush_face_attributes(&self.request) {
            return false;
        }
        self.snapshot.store(snapshot);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        self.snapshot.restore(document, self.request.name())
    }

    fn collate_with(&mut self, other: &dyn Command<Document>) -> bool {
        match downcast_command::<Document, Self>(other) {
            Some(other) => self.request.collate_with(&other.request),
            None => false,
        }
    }

    fn repeat(&self, document: &Document) -> Option<DocumentCommand> {
        repeat_on_faces(document, || Box::new(Self::new(self.request.clone())))
    }
}

// ---------------------------------------------------------------------------
// Inverse-op texture commands
// ---------------------------------------------------------------------------

/// Moves the textures of the selected faces in camera space.
pub struct MoveTexturesCommand {
    camera_up: Vec3,
    camera_right: Vec3,
    offset: Vec2,
}

impl MoveTexturesCommand {
    /// Panics if `offset` is zero.
    pub fn new(camera_up: Vec3, camera_right: Vec3, offset: Vec2) -> Self {
        assert!(offset != Vec2::ZERO, "cannot move textures by a zero offset");
        Self {
            camera_up,
            camera_right,
            offset,
        }
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    fn apply(&self, document: &mut Document, offset: Vec2) -> bool {
        document.perform_move_textures(self.camera_up, self.camera_right, offset)
    }
}

impl Command<Document> for MoveTexturesCommand {
    fn name(&self) -> &str {
        "Move Textures"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        self.apply(document, self.offset)
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        self.apply(document, -self.offset)
    }

    fn collate_with(&mut self, other: &dyn Command<Document>) -> bool {
        let Some(other) = downcast_command::<Document, Self>(other) else {
            return false;
        };
        if other.camera_up != self.camera_up || other.camera_right != self.camera_right {
            return false;
        }
        self.offset += other.offset;
        true
    }

    fn repeat(&self, document: &Document) -> Option<DocumentCommand> {
        repeat_on_faces(document, || {
            Box::new(Self::new(self.camera_up, self.camera_right, self.offset))
        })
    }
}

pub struct RotateTexturesCommand {
    angle: f32,
}

impl RotateTexturesCommand {
    /// `angle` in degrees. Panics if it is zero.
    pub fn new(angle: f32) -> Self {
        assert!(angle != 0.0, "cannot rotate textures by a zero angle");
        Self { angle }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }
}

impl Command<Document> for RotateTexturesCommand {
    fn name(&self) -> &str {
        "Rotate Textures"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        document.perform_rotate_textures(self.angle)
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        document.perform_rotate_textures(-self.angle)
    }

    fn collate_with(&mut self, other: &dyn Command<Document>) -> bool {
        let Some(other) = downcast_command::<Document, Self>(other) else {
            return false;
        };
        self.angle += other.angle;
        true
    }

    fn repeat(&self, document: &Document) -> Option<DocumentCommand> {
        repeat_on_faces(document, || Box::new(Self::new(self.angle)))
    }
}

pub struct ShearTexturesCommand {
    factors: Vec2,
}

impl ShearTexturesCommand {
    /// Panics if both factors are zero.
    pub fn new(factors: Vec2) -> Self {
        assert!(factors != Vec2::ZERO, "cannot shear textures by zero factors");
        Self { factors }
    }

    pub fn factors(&self) -> Vec2 {
        self.factors
    }
}

impl Command<Document> for ShearTexturesCommand {
    fn name(&self) -> &str {
        "Shear Textures"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        document.perform_shear_textures(self.factors)
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        document.perform_shear_textures(-self.factors)
    }

    fn collate_with(&mut self, other: &dyn Command<Document>) -> bool {
        let Some(other) = downcast_command::<Document, Self>(other) else {
            return false;
        };
        self.factors += other.factors;
        true
    }

    fn repeat(&self, document: &Document) -> Option<DocumentCommand> {
        repeat_on_faces(document, || Box::new(Self::new(self.factors)))
    }
}

// ---------------------------------------------------------------------------
// Copy texture projection
// ---------------------------------------------------------------------------

/// Gives the selected faces the texture projection of a source face.
pub struct CopyTexCoordSystemFromFaceCommand {
    tex_coord_snapshot: Option<TexCoordSnapshot>,
    attributes: BrushFaceAttributes,
    source_plane: BrushPlane,
    snapshot: HeldSnapshot,
}

impl CopyTexCoordSystemFromFaceCommand {
    pub fn new(
        tex_coord_snapshot: Option<TexCoordSnapshot>,
        attributes: BrushFaceAttributes,
        source_plane: BrushPlane,
    ) -> Self {
        Self {
            tex_coord_snapshot,
            attributes,
            source_plane,
            snapshot: HeldSnapshot::default(),
        }
    }
}

impl Command<Document> for CopyTexCoordSystemFromFaceCommand {
    fn name(&self) -> &str {
        "Copy Texture Alignment"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        let faces = document.selected_brush_faces();
        if faces.is_empty() {
            debug!("no faces to copy a texture alignment to");
            return false;
        }
        let snapshot = document.take_face_snapshot(&faces);
        if !document.perform_copy_tex_coord_system_from_face(
            self.tex_coord_snapshot.as_ref(),
            &self.attributes,
            &self.source_plane,
        ) {
            return false;
        }
        self.snapshot.store(snapshot);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        self.snapshot.restore(document, "Copy Texture Alignment")
    }

    fn repeat(&self, document: &Document) -> Option<DocumentCommand> {
        repeat_on_faces(document, || {
            Box::new(Self::new(
                self.tex_coord_snapshot,
                self.attributes.clone(),
                self.source_plane,
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use brushwork_commands::UndoableCommand;

    use super::*;
    use crate::{BrushFaceHandle, EditorConfig, NodeId, NodeKind};

    fn document_with_selected_cube() -> (Document, NodeId) {
        let mut document = Document::new(EditorConfig::default());
        let cube = document.build_cube(16.0).unwrap();
        let id = document.insert_node(document.default_layer(), NodeKind::brush(cube));
        document.perform_select_nodes(&[id]);
        (document, id)
    }

    #[test]
    fn attribute_changes_restore_the_faces() {
        let (mut document, id) = document_with_selected_cube();
        let before = document.brush(id).unwrap().clone();
        let mut request = ChangeBrushFaceAttributesRequest::new();
        request.set_texture("rock").set_scale(2.0, 2.0);

        let mut command = UndoableCommand::<Document>::new(Box::new(ChangeBrushFaceAttributesCommand::new(request)));
        assert!(command.perform_do(&mut document));
        assert!(document.brush(id).unwrap().faces().iter().all(|f| f.texture_name() == "rock"));
        assert!(command.perform_undo(&mut document));
        assert_eq!(document.brush(id).unwrap(), &before);
    }

    #[test]
    fn attribute_changes_need_faces() {
        let mut document = Document::new(EditorConfig::default());
        let mut request = ChangeBrushFaceAttributesRequest::new();
        request.set_rotation(45.0);
        let mut command = UndoableCommand::<Document>::new(Box::new(ChangeBrushFaceAttributesCommand::new(request)));
        assert!(!command.perform_do(&mut document));
    }

    #[test]
    fn rotations_collate_and_undo_by_the_sum() {
        let (mut document, id) = document_with_selected_cube();
        let mut first = UndoableCommand::<Document>::new(Box::new(RotateTexturesCommand::new(10.0)));
        let mut second = UndoableCommand::<Document>::new(Box::new(RotateTexturesCommand::new(15.0)));
        first.perform_do(&mut document);
        second.perform_do(&mut document);
        assert!(first.collate_with(&second));

        let command = downcast_command::<Document, RotateTexturesCommand>(first.command()).unwrap();
        assert_eq!(command.angle(), 25.0);
        assert!(first.perform_undo(&mut document));
        for face in document.brush(id).unwrap().faces() {
            assert!(face.attributes().rotation.abs() < 1e-3);
        }
    }

    #[test]
    fn texture_moves_collate_for_the_same_camera() {
        let mut first = MoveTexturesCommand::new(Vec3::Z, Vec3::X, Vec2::new(1.0, 0.0));
        let same = MoveTexturesCommand::new(Vec3::Z, Vec3::X, Vec2::new(0.0, 2.0));
        let other = MoveTexturesCommand::new(Vec3::Y, Vec3::X, Vec2::new(0.0, 2.0));
        assert!(first.collate_with(&same));
        assert!(!first.collate_with(&other));
        assert_eq!(first.offset(), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn texture_moves_undo() {
        let (mut document, id) = document_with_selected_cube();
        let before = document.brush(id).unwrap().clone();
        let mut command = UndoableCommand::<Document>::new(Box::new(MoveTexturesCommand::new(Vec3::Z, Vec3::X, Vec2::new(4.0, 2.0))));
        assert!(command.perform_do(&mut document));
        assert_ne!(document.brush(id).unwrap(), &before);
        assert!(command.perform_undo(&mut document));
        for (face, original) in document.brush(id).unwrap().faces().iter().zip(before.faces()) {
            assert!((face.attributes().offset - original.attributes().offset).length() < 1e-3);
        }
    }

    #[test]
    fn repeat_needs_selected_faces() {
        let (mut document, _) = document_with_selected_cube();
        let command = ShearTexturesCommand::new(Vec2::new(0.5, 0.0));
        assert!(command.repeat(&document).is_some());
        document.perform_deselect_all();
        assert!(command.repeat(&document).is_none());
    }

    #[test]
    #[should_panic]
    fn zero_rotation_panics() {
        RotateTexturesCommand::new(0.0);
    }

    #[test]
    fn copy_alignment_round_trip() {
        let (mut document, id) = document_with_selected_cube();
        let top = document.brush(id).unwrap().find_face_by_normal(Vec3::Z).unwrap();
        let source = document.face(BrushFaceHandle::new(id, top)).unwrap().clone();
        let before = document.brush(id).unwrap().clone();

        let mut command = UndoableCommand::<Document>::new(Box::new(CopyTexCoordSystemFromFaceCommand::new(
            source.take_tex_coord_snapshot(),
            source.attributes().clone(),
            *source.plane(),
        )));
        document.perform_rotate_textures(30.0);
        let rotated = document.brush(id).unwrap().clone();
        assert!(command.perform_do(&mut document));
        assert!(command.perform_undo(&mut document));
        assert_eq!(document.brush(id).unwrap(), &rotated);
        assert_ne!(document.brush(id).unwrap(), &before);
    }
}
