use std::any::Any;

use tracing::debug;

// ---------------------------------------------------------------------------
// Document side
// ---------------------------------------------------------------------------

/// Dirty tracking on the document a command edits. The document compares its
/// count against a saved checkpoint to decide whether it has unsaved changes.
pub trait ModificationTracker {
    fn increment_modification_count(&mut self, delta: usize);
    fn decrement_modification_count(&mut self, delta: usize);
}

// ---------------------------------------------------------------------------
// Command trait
// ---------------------------------------------------------------------------

/// Object-safe access to the concrete command type, used for collation.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An undoable edit of a document `D`.
///
/// Implementors only provide the raw do/undo steps. State bookkeeping and
/// modification counting live in [`UndoableCommand`].
pub trait Command<D>: AsAny {
    fn name(&self) -> &str;

    /// Apply the edit. Returning false means nothing was changed.
    fn do_perform(&mut self, document: &mut D) -> bool;

    /// Revert a successful [`Command::do_perform`].
    fn do_undo(&mut self, document: &mut D) -> bool;

    /// How many modifications this command counts for. Commands that do not
    /// touch document content, such as selection changes, return 0.
    fn modification_count(&self) -> usize {
        1
    }

    /// Merge `other`, which was executed right after `self`, into `self`.
    /// Only called when both commands have the same concrete type.
    fn collate_with(&mut self, _other: &dyn Command<D>) -> bool {
        false
    }

    /// A repeat delimiter clears the list of commands that repeat would replay.
    fn is_repeat_delimiter(&self) -> bool {
        false
    }

    /// A fresh command that applies the same edit to the current document
    /// state, or None if this command cannot be repeated there.
    fn repeat(&self, _document: &D) -> Option<Box<dyn Command<D>>> {
        None
    }
}

/// Downcast a command to its concrete type.
pub fn downcast_command<D: 'static, T: 'static>(command: &dyn Command<D>) -> Option<&T> {
    command.as_any().downcast_ref::<T>()
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandState {
    /// Never executed, or undone.
    #[default]
    Default,
    Done,
    Undoing,
}

/// A command together with its execution state and accumulated modification count.
pub struct UndoableCommand<D> {
    command: Box<dyn Command<D>>,
    state: CommandState,
    modification_count: usize,
}

impl<D: ModificationTracker + 'static> UndoableCommand<D> {
    pub fn new(command: Box<dyn Command<D>>) -> Self {
        let modification_count = command.modification_count();
        Self {
            command,
            state: CommandState::Default,
            modification_count,
        }
    }

    pub fn name(&self) -> &str {
        self.command.name()
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn modification_count(&self) -> usize {
        self.modification_count
    }

    pub fn command(&self) -> &dyn Command<D> {
        &*self.command
    }

    pub fn perform_do(&mut self, document: &mut D) -> bool {
        assert_eq!(
            self.state,
            CommandState::Default,
            "command '{}' executed twice",
            self.command.name()
        );
        if !self.command.do_perform(document) {
            debug!("command '{}' failed", self.command.name());
            return false;
        }
        self.state = CommandState::Done;
        document.increment_modification_count(self.modification_count);
        debug!("did '{}'", self.command.name());
        true
    }

    pub fn perform_undo(&mut self, document: &mut D) -> bool {
        assert_eq!(
            self.state,
            CommandState::Done,
            "command '{}' undone before it was done",
            self.command.name()
        );
        self.state = CommandState::Undoing;
        if !self.command.do_undo(document) {
            self.state = CommandState::Done;
            debug!("undo of '{}' failed", self.command.name());
            return false;
        }
        self.state = CommandState::Default;
        document.decrement_modification_count(self.modification_count);
        debug!("undid '{}'", self.command.name());
        true
    }

    /// Fold a later, already executed command of the same type into this one.
    pub fn collate_with(&mut self, other: &UndoableCommand<D>) -> bool {
        if (*self.command).as_any().type_id() != (*other.command).as_any().type_id() {
            return false;
        }
        if !self.command.collate_with(&*other.command) {
            return false;
        }
        self.modification_count += other.modification_count;
        debug!("collated '{}'", self.command.name());
        true
    }

    pub fn is_repeat_delimiter(&self) -> bool {
        self.command.is_repeat_delimiter()
    }

    pub fn repeat(&self, document: &D) -> Option<Box<dyn Command<D>>> {
        self.command.repeat(document)
    }

    /// Wrap a command whose effects are already applied.
    pub(crate) fn done(command: Box<dyn Command<D>>) -> Self {
        let mut undoable = Self::new(command);
        undoable.state = CommandState::Done;
        undoable
    }
}
