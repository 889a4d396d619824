use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{Command, CommandGroup, ModificationTracker, UndoableCommand};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_COLLATION_WINDOW: Duration = Duration::from_millis(1000);

struct Transaction<D> {
    name: String,
    commands: Vec<UndoableCommand<D>>,
    last_executed: Option<Instant>,
}

// ---------------------------------------------------------------------------
// CommandHistory
// ---------------------------------------------------------------------------

/// Undo and redo stacks for a document `D`, with collation of rapid edits,
/// nested transactions and repeat of the last repeatable commands.
pub struct CommandHistory<D> {
    undo_stack: Vec<UndoableCommand<D>>,
    redo_stack: Vec<UndoableCommand<D>>,
    transactions: Vec<Transaction<D>>,
    repeat_stack: Vec<Box<dyn Command<D>>>,
    /// Whether the last stored command added an entry to the repeat stack.
    last_stored_repeatable: bool,
    /// When the top undo entry last executed, as long as it may still collate.
    last_executed: Option<Instant>,
    history_limit: usize,
    collation_window: Duration,
}

impl<D: ModificationTracker + 'static> Default for CommandHistory<D> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT, DEFAULT_COLLATION_WINDOW)
    }
}

impl<D: ModificationTracker + 'static> CommandHistory<D> {
    /// `history_limit` of 0 keeps every entry.
    pub fn new(history_limit: usize, collation_window: Duration) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            transactions: Vec::new(),
            repeat_stack: Vec::new(),
            last_stored_repeatable: false,
            last_executed: None,
            history_limit,
            collation_window,
        }
    }

    pub fn set_collation_window(&mut self, window: Duration) {
        self.collation_window = window;
    }

    pub fn set_history_limit(&mut self, limit: usize) {
        self.history_limit = limit;
        self.enforce_limit();
    }

    pub fn can_undo(&self) -> bool {
        self.transactions.is_empty() && !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.transactions.is_empty() && !self.redo_stack.is_empty()
    }

    pub fn undo_name(&self) -> Option<&str> {
        self.undo_stack.last().map(|c| c.name())
    }

    pub fn redo_name(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.name())
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn in_transaction(&self) -> bool {
        !self.transactions.is_empty()
    }

    pub fn can_repeat(&self) -> bool {
        !self.repeat_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.transactions.clear();
        self.repeat_stack.clear();
        self.last_stored_repeatable = false;
        self.last_executed = None;
        info!("cleared command history");
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Execute `command`. On success it is collated into the previous command
    /// or stored; on failure it is dropped and the history is unchanged.
    pub fn submit(&mut self, command: Box<dyn Command<D>>, document: &mut D) -> bool {
        let mut command = UndoableCommand::new(command);
        if !command.perform_do(document) {
            return false;
        }

        let now = Instant::now();
        let window = self.collation_window;
        let within = |last: Option<Instant>| last.is_some_and(|t| now.duration_since(t) <= window);

        if let Some(transaction) = self.transactions.last_mut() {
            let collated = within(transaction.last_executed)
                && transaction
                    .commands
                    .last_mut()
                    .is_some_and(|top| top.collate_with(&command));
            if !collated {
                transaction.commands.push(command);
            }
            transaction.last_executed = Some(now);
            return true;
        }

        let collated = within(self.last_executed)
            && self
                .undo_stack
                .last_mut()
                .is_some_and(|top| top.collate_with(&command));
        if collated {
            if self.last_stored_repeatable {
                self.repeat_stack.pop();
                self.record_repeat_of_top(document);
            }
        } else {
            self.store(command, document);
        }
        self.last_executed = Some(now);
        self.redo_stack.clear();
        true
    }

    pub fn undo(&mut self, document: &mut D) -> Option<String> {
        if !self.transactions.is_empty() {
            warn!("cannot undo inside a transaction");
            return None;
        }
        let mut command = self.undo_stack.pop()?;
        self.last_executed = None;
        self.last_stored_repeatable = false;
        if !command.perform_undo(document) {
            warn!("undo of '{}' failed", command.name());
            self.undo_stack.push(command);
            return None;
        }
        let name = command.name().to_owned();
        debug!("undo '{name}'");
        self.redo_stack.push(command);
        Some(name)
    }

    pub fn redo(&mut self, document: &mut D) -> Option<String> {
        if !self.transactions.is_empty() {
            warn!("cannot redo inside a transaction");
            return None;
        }
        let mut command = self.redo_stack.pop()?;
        self.last_executed = None;
        self.last_stored_repeatable = false;
        if !command.perform_do(document) {
            warn!("redo of '{}' failed", command.name());
            self.redo_stack.push(command);
            return None;
        }
        let name = command.name().to_owned();
        debug!("redo '{name}'");
        self.undo_stack.push(command);
        Some(name)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    pub fn begin_transaction(&mut self, name: impl Into<String>) {
        let name = name.into();
        debug!("begin transaction '{name}'");
        self.transactions.push(Transaction {
            name,
            commands: Vec::new(),
            last_executed: None,
        });
    }

    /// Store the commands of the innermost transaction as one entry. Returns
    /// false if there was no open transaction.
    pub fn commit_transaction(&mut self, document: &mut D) -> bool {
        let Some(transaction) = self.transactions.pop() else {
            warn!("commit without an open transaction");
            return false;
        };
        debug!(
            "commit transaction '{}' with {} commands",
            transaction.name,
            transaction.commands.len()
        );
        self.store_transaction(transaction, document);
        true
    }

    /// Undo and discard every command of the innermost transaction.
    ///
    /// Stops at the first refused undo. The commands that are still applied
    /// are then committed under the transaction's name so the document and the
    /// history agree, and false is returned.
    pub fn rollback_transaction(&mut self, document: &mut D) -> bool {
        let Some(mut transaction) = self.transactions.pop() else {
            warn!("rollback without an open transaction");
            return false;
        };
        debug!("rollback transaction '{}'", transaction.name);
        while let Some(mut command) = transaction.commands.pop() {
            if !command.perform_undo(document) {
                warn!(
                    "rollback of '{}' stopped: undo of '{}' refused, keeping {} applied commands",
                    transaction.name,
                    command.name(),
                    transaction.commands.len() + 1
                );
                transaction.commands.push(command);
                self.store_transaction(transaction, document);
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Repeat
    // ------------------------------------------------------------------

    /// Replay the commands recorded since the last repeat delimiter as one
    /// transaction.
    pub fn repeat(&mut self, document: &mut D) -> bool {
        let copies: Vec<Box<dyn Command<D>>> = self
            .repeat_stack
            .iter()
            .filter_map(|command| command.repeat(document))
            .collect();
        if copies.is_empty() {
            return false;
        }

        let name = if copies.len() == 1 {
            "Repeat 1 Command".to_owned()
        } else {
            format!("Repeat {} Commands", copies.len())
        };
        debug!("{name}");
        self.begin_transaction(name);
        for copy in copies {
            if !self.submit(copy, document) {
                self.rollback_transaction(document);
                return false;
            }
        }
        self.commit_transaction(document)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn store(&mut self, command: UndoableCommand<D>, document: &D) {
        if command.is_repeat_delimiter() {
            self.repeat_stack.clear();
            self.last_stored_repeatable = false;
        } else {
            self.last_stored_repeatable = false;
            if let Some(copy) = command.repeat(document) {
                self.repeat_stack.push(copy);
                self.last_stored_repeatable = true;
            }
        }
        self.undo_stack.push(command);
        self.enforce_limit();
    }

    /// Store a closed transaction as one group, in the enclosing transaction
    /// if there is one.
    fn store_transaction(&mut self, transaction: Transaction<D>, document: &D) {
        if transaction.commands.is_empty() {
            return;
        }
        let group = UndoableCommand::done(Box::new(CommandGroup::new(transaction.name, transaction.commands)));
        match self.transactions.last_mut() {
            Some(parent) => {
                parent.commands.push(group);
                parent.last_executed = None;
            }
            None => {
                self.store(group, document);
                self.last_executed = None;
                self.redo_stack.clear();
            }
        }
    }

    fn record_repeat_of_top(&mut self, document: &D) {
        self.last_stored_repeatable = false;
        if let Some(copy) = self.undo_stack.last().and_then(|top| top.repeat(document)) {
            self.repeat_stack.push(copy);
            self.last_stored_repeatable = true;
        }
    }

    fn enforce_limit(&mut self) {
        if self.history_limit > 0 && self.undo_stack.len() > self.history_limit {
            let excess = self.undo_stack.len() - self.history_limit;
            self.undo_stack.drain(..excess);
            debug!("evicted {excess} history entries");
        }
    }
}
