//! Every undoable edit of a [`Document`].
//!
//! Commands come in four flavours:
//! - snapshot commands capture the affected nodes or faces before the edit
//!   and restore them on undo (brush edits, entity properties, group names),
//! - vertex commands do the same but take a fresh snapshot on every redo,
//! - inverse-op commands (texture moves, rotations, shears) undo by applying
//!   the opposite edit,
//! - node commands hand subtrees back and forth between the tree and the
//!   command.

mod entity;
mod geometry;
mod nodes;
mod selection;
mod texture;
mod vertex;

pub use entity::{ChangeEntityAttributesCommand, EntityAttributeChange, RenameGroupsCommand};
pub use geometry::{
    FindPlanePointsCommand, ResizeBrushesCommand, SnapBrushVerticesCommand, TransformAction, TransformObjectsCommand,
};
pub use nodes::{AddRemoveNodesCommand, DuplicateNodesCommand, ReparentNodesCommand};
pub use selection::{SelectionAction, SelectionCommand};
pub use texture::{
    ChangeBrushFaceAttributesCommand, CopyTexCoordSystemFromFaceCommand, MoveTexturesCommand, RotateTexturesCommand,
    ShearTexturesCommand,
};
pub use vertex::{
    AddBrushVerticesCommand, MoveBrushEdgesCommand, MoveBrushFacesCommand, MoveBrushVerticesCommand,
    MoveHandlesCommand, RemoveBrushEdgesCommand, RemoveBrushFacesCommand, RemoveBrushVerticesCommand,
    RemoveHandlesCommand,
};

use brushwork_commands::Command;
use tracing::warn;

use crate::{Document, Snapshot};

pub type DocumentCommand = Box<dyn Command<Document>>;

/// The snapshot a command holds while it is done.
#[derive(Debug, Default)]
pub(crate) struct HeldSnapshot(Option<Snapshot>);

impl HeldSnapshot {
    /// Hold `snapshot`, dropping any previous one.
    pub(crate) fn store(&mut self, snapshot: Snapshot) {
        self.0 = Some(snapshot);
    }

    /// Restore the held snapshot and let go of it. The snapshot is kept if
    /// the document refused it.
    pub(crate) fn restore(&mut self, document: &mut Document, command: &str) -> bool {
        let Some(snapshot) = self.0.as_ref() else {
            panic!("undoing '{command}' without a snapshot");
        };
        if document.restore_snapshot(snapshot).is_err() {
            warn!("could not undo '{command}'");
            return false;
        }
        self.0 = None;
        true
    }
}
