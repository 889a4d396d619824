use std::mem;

use brushwork_commands::Command;
use tracing::{debug, warn};

use super::DocumentCommand;
use crate::selection::Selection;
use crate::document::NodePosition;
use crate::{DetachedNode, Document, NodeId};

/// Either side of a node swap: the ids currently in the tree, or the
/// subtrees the command holds while they are out of it.
#[derive(Debug)]
enum Contents {
    Attached(Vec<NodeId>),
    Detached(Vec<DetachedNode>),
}

impl Default for Contents {
    fn default() -> Self {
        Contents::Attached(Vec::new())
    }
}

impl Contents {
    fn attach(&mut self, document: &mut Document) -> bool {
        let Contents::Detached(nodes) = mem::take(self) else {
            panic!("attaching nodes that are already in the document");
        };
        if !document.can_add_nodes(&nodes) {
            warn!("cannot add {} nodes", nodes.len());
            *self = Contents::Detached(nodes);
            return false;
        }
        *self = Contents::Attached(document.perform_add_nodes(nodes));
        true
    }

    fn detach(&mut self, document: &mut Document) -> bool {
        let Contents::Attached(ids) = mem::take(self) else {
            panic!("detaching nodes that are not in the document");
        };
        if !document.can_remove_nodes(&ids) {
            warn!("cannot remove nodes {ids:?}");
            *self = Contents::Attached(ids);
            return false;
        }
        *self = Contents::Detached(document.perform_remove_nodes(&ids));
        true
    }
}

// ---------------------------------------------------------------------------
// Add / remove
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Remove,
}

/// Adds detached subtrees to the document, or removes nodes from it. Removed
/// subtrees are kept by the command and go back with the same ids.
pub struct AddRemoveNodesCommand {
    action: Action,
    contents: Contents,
}

impl AddRemoveNodesCommand {
    pub fn add(nodes: Vec<DetachedNode>) -> Self {
        Self {
            action: Action::Add,
            contents: Contents::Detached(nodes),
        }
    }

    pub fn remove(ids: Vec<NodeId>) -> Self {
        Self {
            action: Action::Remove,
            contents: Contents::Attached(ids),
        }
    }
}

impl Command<Document> for AddRemoveNodesCommand {
    fn name(&self) -> &str {
        match self.action {
            Action::Add => "Add Objects",
            Action::Remove => "Remove Objects",
        }
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        match self.action {
            Action::Add => self.contents.attach(document),
            Action::Remove => self.contents.detach(document),
        }
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        match self.action {
            Action::Add => self.contents.detach(document),
            Action::Remove => self.contents.attach(document),
        }
    }
}

// ---------------------------------------------------------------------------
// Duplicate
// ---------------------------------------------------------------------------

/// Copies the selected nodes and selects the copies.
#[derive(Default)]
pub struct DuplicateNodesCommand {
    /// Empty until the first do.
    contents: Contents,
    copies: Vec<NodeId>,
    previous_selection: Selection,
    prepared: bool,
}

impl DuplicateNodesCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of the copies, known after the first do.
    pub fn copies(&self) -> &[NodeId] {
        &self.copies
    }
}

impl Command<Document> for DuplicateNodesCommand {
    fn name(&self) -> &str {
        "Duplicate Objects"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        if !self.prepared {
            if !document.has_selected_nodes() {
                return false;
            }
            let selected = document.selected_nodes().to_vec();
            let (nodes, copies) = document.prepare_duplicates(&selected);
            if nodes.is_empty() {
                return false;
            }
            self.contents = Contents::Detached(nodes);
            self.copies = copies;
            self.prepared = true;
        }

        let previous_selection = document.selection().clone();
        if !self.contents.attach(document) {
            return false;
        }
        self.previous_selection = previous_selection;
        document.perform_deselect_all();
        document.perform_select_nodes(&self.copies);
        debug!("duplicated into {:?}", self.copies);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        if !self.contents.detach(document) {
            return false;
        }
        document.restore_selection(mem::take(&mut self.previous_selection));
        true
    }

    fn repeat(&self, document: &Document) -> Option<DocumentCommand> {
        document
            .has_selected_nodes()
            .then(|| Box::new(Self::new()) as DocumentCommand)
    }
}

// ---------------------------------------------------------------------------
// Reparent
// ---------------------------------------------------------------------------

/// Moves nodes under a new parent. Undo puts each one back at its old index.
pub struct ReparentNodesCommand {
    nodes: Vec<NodeId>,
    new_parent: NodeId,
    /// Filled while done.
    positions: Vec<NodePosition>,
}

impl ReparentNodesCommand {
    pub fn new(nodes: Vec<NodeId>, new_parent: NodeId) -> Self {
        Self {
            nodes,
            new_parent,
            positions: Vec::new(),
        }
    }
}

impl Command<Document> for ReparentNodesCommand {
    fn name(&self) -> &str {
        "Reparent Objects"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        if !document.can_reparent_nodes(&self.nodes, self.new_parent) {
            warn!("cannot move {:?} to {}", self.nodes, self.new_parent);
            return false;
        }
        self.positions = document.perform_reparent_nodes(&self.nodes, self.new_parent);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        if !document.can_restore_positions(&self.positions) {
            warn!("cannot move {:?} back", self.nodes);
            return false;
        }
        document.perform_restore_positions(&mem::take(&mut self.positions));
        true
    }
}
