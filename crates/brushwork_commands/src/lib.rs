//! Document-agnostic undo/redo: the command state machine, command groups
//! and the [`CommandHistory`] that stores, collates and repeats commands.

mod command;
mod group;
mod history;

pub use command::{AsAny, Command, CommandState, ModificationTracker, UndoableCommand, downcast_command};
pub use group::CommandGroup;
pub use history::{CommandHistory, DEFAULT_COLLATION_WINDOW, DEFAULT_HISTORY_LIMIT};
