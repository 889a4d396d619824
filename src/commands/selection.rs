use brushwork_commands::Command;

use crate::selection::Selection;
use crate::{BrushFaceHandle, Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    SelectNodes(Vec<NodeId>),
    SelectFaces(Vec<BrushFaceHandle>),
    SelectAllNodes,
    SelectAllFaces,
    ConvertToFaces,
    DeselectNodes(Vec<NodeId>),
    DeselectFaces(Vec<BrushFaceHandle>),
    DeselectAll,
}

impl SelectionAction {
    fn name(&self) -> &'static str {
        match self {
            SelectionAction::SelectNodes(_) => "Select Objects",
            SelectionAction::SelectFaces(_) => "Select Faces",
            SelectionAction::SelectAllNodes => "Select All",
            SelectionAction::SelectAllFaces => "Select All Faces",
            SelectionAction::ConvertToFaces => "Convert to Face Selection",
            SelectionAction::DeselectNodes(_) => "Deselect Objects",
            SelectionAction::DeselectFaces(_) => "Deselect Faces",
            SelectionAction::DeselectAll => "Select None",
        }
    }
}

/// Changes the selection. Never counts as a modification and stops repeat
/// from replaying edits made under an earlier selection.
pub struct SelectionCommand {
    action: SelectionAction,
    previous: Option<Selection>,
}

impl SelectionCommand {
    pub fn new(action: SelectionAction) -> Self {
        Self { action, previous: None }
    }

    pub fn select(nodes: Vec<NodeId>) -> Self {
        Self::new(SelectionAction::SelectNodes(nodes))
    }

    pub fn select_faces(faces: Vec<BrushFaceHandle>) -> Self {
        Self::new(SelectionAction::SelectFaces(faces))
    }

    pub fn select_all_nodes() -> Self {
        Self::new(SelectionAction::SelectAllNodes)
    }

    pub fn select_all_faces() -> Self {
        Self::new(SelectionAction::SelectAllFaces)
    }

    pub fn convert_to_faces() -> Self {
        Self::new(SelectionAction::ConvertToFaces)
    }

    pub fn deselect(nodes: Vec<NodeId>) -> Self {
        Self::new(SelectionAction::DeselectNodes(nodes))
    }

    pub fn deselect_faces(faces: Vec<BrushFaceHandle>) -> Self {
        Self::new(SelectionAction::DeselectFaces(faces))
    }

    pub fn deselect_all() -> Self {
        Self::new(SelectionAction::DeselectAll)
    }

    pub fn action(&self) -> &SelectionAction {
        &self.action
    }
}

impl Command<Document> for SelectionCommand {
    fn name(&self) -> &str {
        self.action.name()
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        self.previous = Some(document.selection().clone());
        match &self.action {
            SelectionAction::SelectNodes(nodes) => document.perform_select_nodes(nodes),
            SelectionAction::SelectFaces(faces) => document.perform_select_faces(faces),
            SelectionAction::SelectAllNodes => document.perform_select_all_nodes(),
            SelectionAction::SelectAllFaces => document.perform_select_all_faces(),
            SelectionAction::ConvertToFaces => document.perform_convert_to_face_selection(),
            SelectionAction::DeselectNodes(nodes) => document.perform_deselect_nodes(nodes),
            SelectionAction::DeselectFaces(faces) => document.perform_deselect_faces(faces),
            SelectionAction::DeselectAll => document.perform_deselect_all(),
        }
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        let Some(previous) = self.previous.take() else {
            panic!("undoing '{}' before it was done", self.action.name());
        };
        document.restore_selection(previous);
        true
    }

    fn modification_count(&self) -> usize {
        0
    }

    fn is_repeat_delimiter(&self) -> bool {
        true
    }
}
