use tracing::warn;

use crate::{Command, CommandState, ModificationTracker, UndoableCommand};

// ---------------------------------------------------------------------------
// CommandGroup: atomic multi-step command
// ---------------------------------------------------------------------------

/// Commands committed together by a transaction. Redo replays them in order,
/// undo reverts them in reverse order.
///
/// Members keep their own state, so after a refused step the group only
/// touches members that are still applied (undo) or not yet applied (redo).
pub struct CommandGroup<D> {
    name: String,
    commands: Vec<UndoableCommand<D>>,
}

impl<D: ModificationTracker + 'static> CommandGroup<D> {
    pub fn new(name: impl Into<String>, commands: Vec<UndoableCommand<D>>) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[UndoableCommand<D>] {
        &self.commands
    }
}

impl<D: ModificationTracker + 'static> Command<D> for CommandGroup<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_perform(&mut self, document: &mut D) -> bool {
        let mut applied = Vec::new();
        for index in 0..self.commands.len() {
            if self.commands[index].state() == CommandState::Done {
                continue;
            }
            if !self.commands[index].perform_do(document) {
                for &done in applied.iter().rev() {
                    let command: &mut UndoableCommand<D> = &mut self.commands[done];
                    if !command.perform_undo(document) {
                        warn!("'{}' left partially applied: undo of '{}' refused", self.name, command.name());
                        break;
                    }
                }
                return false;
            }
            applied.push(index);
        }
        true
    }

    fn do_undo(&mut self, document: &mut D) -> bool {
        let mut reverted = Vec::new();
        for index in (0..self.commands.len()).rev() {
            if self.commands[index].state() != CommandState::Done {
                continue;
            }
            if !self.commands[index].perform_undo(document) {
                for &undone in reverted.iter().rev() {
                    let command: &mut UndoableCommand<D> = &mut self.commands[undone];
                    if !command.perform_do(document) {
                        warn!("'{}' left partially undone: redo of '{}' refused", self.name, command.name());
                        break;
                    }
                }
                return false;
            }
            reverted.push(index);
        }
        true
    }

    /// Members count their own modifications.
    fn modification_count(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::tests::{Counter, add, scale};

    fn group(counter: &mut Counter) -> CommandGroup<Counter> {
        let mut commands = vec![UndoableCommand::new(add(2)), UndoableCommand::new(scale(3))];
        for command in &mut commands {
            assert!(command.perform_do(counter));
        }
        CommandGroup::new("Group", commands)
    }

    #[test]
    fn undo_reverts_in_reverse_order() {
        let mut counter = Counter::default();
        let mut group = group(&mut counter);
        assert_eq!(counter.value, 6);
        assert!(group.do_undo(&mut counter));
        assert_eq!(counter.value, 0);
        assert!(group.do_perform(&mut counter));
        assert_eq!(counter.value, 6);
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn failing_member_rolls_back() {
        let mut counter = Counter::default();
        let mut group = group(&mut counter);
        assert!(group.do_undo(&mut counter));
        counter.value = 99;
        assert!(!group.do_perform(&mut counter));
        assert_eq!(counter.value, 99);
        assert_eq!(counter.modifications, 0);
    }

    #[test]
    fn refused_member_undo_restores_the_group() {
        let mut counter = Counter::default();
        let mut group = group(&mut counter);
        counter.frozen = true;
        assert!(!group.do_undo(&mut counter));
        assert_eq!(counter.value, 6);
        assert!(group.commands().iter().all(|c| c.state() == CommandState::Done));

        counter.frozen = false;
        assert!(group.do_undo(&mut counter));
        assert_eq!((counter.value, counter.modifications), (0, 0));
    }
}
