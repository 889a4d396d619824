use brushwork_commands::{Command, downcast_command};
use tracing::debug;

use super::HeldSnapshot;
use crate::{Document, NodeId};

// ---------------------------------------------------------------------------
// Entity properties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityAttributeChange {
    Set { key: String, value: String },
    Remove { key: String },
    Rename { old_key: String, new_key: String },
}

/// Edits one property of the selected entities, or of the entities owning
/// selected brushes.
pub struct ChangeEntityAttributesCommand {
    change: EntityAttributeChange,
    /// Entities touched by the last do.
    entities: Vec<NodeId>,
    snapshot: HeldSnapshot,
}

impl ChangeEntityAttributesCommand {
    fn new(change: EntityAttributeChange) -> Self {
        Self {
            change,
            entities: Vec::new(),
            snapshot: HeldSnapshot::default(),
        }
    }

    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(EntityAttributeChange::Set {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::new(EntityAttributeChange::Remove { key: key.into() })
    }

    pub fn rename(old_key: impl Into<String>, new_key: impl Into<String>) -> Self {
        Self::new(EntityAttributeChange::Rename {
            old_key: old_key.into(),
            new_key: new_key.into(),
        })
    }

    pub fn change(&self) -> &EntityAttributeChange {
        &self.change
    }
}

impl Command<Document> for ChangeEntityAttributesCommand {
    fn name(&self) -> &str {
        match self.change {
            EntityAttributeChange::Set { .. } => "Set Property",
            EntityAttributeChange::Remove { .. } => "Remove Property",
            EntityAttributeChange::Rename { .. } => "Rename Property",
        }
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        let entities = document.selected_entities();
        if entities.is_empty() {
            return false;
        }
        let snapshot = document.take_node_snapshot(&entities);
        let changed = match &self.change {
            EntityAttributeChange::Set { key, value } => document.perform_set_entity_property(&entities, key, value),
            EntityAttributeChange::Remove { key } => document.perform_remove_entity_property(&entities, key),
            EntityAttributeChange::Rename { old_key, new_key } => {
                document.perform_rename_entity_property(&entities, old_key, new_key)
            }
        };
        if !changed {
            debug!("{:?} changed nothing", self.change);
            return false;
        }
        self.snapshot.store(snapshot);
        self.entities = entities;
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        let name = self.name().to_owned();
        self.snapshot.restore(document, &name)
    }

    /// Successive values typed into the same property of the same entities
    /// become one edit.
    fn collate_with(&mut self, other: &dyn Command<Document>) -> bool {
        let Some(other) = downcast_command::<Document, Self>(other) else {
            return false;
        };
        let same_key = match (&self.change, &other.change) {
            (EntityAttributeChange::Set { key, .. }, EntityAttributeChange::Set { key: other_key, .. }) => {
                key == other_key
            }
            _ => false,
        };
        if !same_key || self.entities != other.entities {
            return false;
        }
        self.change = other.change.clone();
        true
    }
}

// ---------------------------------------------------------------------------
// Group names
// ---------------------------------------------------------------------------

pub struct RenameGroupsCommand {
    name: String,
    snapshot: HeldSnapshot,
}

impl RenameGroupsCommand {
    /// Panics if `name` is blank.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.trim().is_empty(), "group names cannot be blank");
        Self {
            name,
            snapshot: HeldSnapshot::default(),
        }
    }
}

impl Command<Document> for RenameGroupsCommand {
    fn name(&self) -> &str {
        "Rename Groups"
    }

    fn do_perform(&mut self, document: &mut Document) -> bool {
        let groups = document.selected_groups();
        if groups.is_empty() {
            return false;
        }
        let snapshot = document.take_node_snapshot(&groups);
        if !document.perform_rename_groups(&groups, &self.name) {
            return false;
        }
        self.snapshot.store(snapshot);
        true
    }

    fn do_undo(&mut self, document: &mut Document) -> bool {
        self.snapshot.restore(document, "Rename Groups")
    }
}
