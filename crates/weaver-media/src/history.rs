//! Grouped undo/redo history.
//!
//! Provides:
//! - `UndoManager` trait for abstracting undo implementations
//! - `EditHistory<C>` - groups of recorded edits with explicit cutoffs
//!
//! Consecutive edits merge into one undo group until `cutoff()` closes it.
//! The history only stores edits; the document applies them, which lets it
//! re-capture the current state of embeds when an edit is reverted.

/// Trait for managing undo/redo operations.
///
/// Implementations must actually perform the undo/redo, not just track state.
pub trait UndoManager {
    /// Check if undo is available.
    fn can_undo(&self) -> bool;

    /// Check if redo is available.
    fn can_redo(&self) -> bool;

    /// Perform undo. Returns true if successful.
    fn undo(&mut self) -> bool;

    /// Perform redo. Returns true if successful.
    fn redo(&mut self) -> bool;

    /// Clear all undo/redo history.
    fn clear_history(&mut self);
}

/// A recorded splice: `deleted` was replaced by `inserted` at `pos`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit<C> {
    /// Char position where the edit occurred
    pub pos: usize,
    /// Content that was removed (empty for pure insertions)
    pub deleted: Vec<C>,
    /// Content that was added (empty for pure deletions)
    pub inserted: Vec<C>,
}

/// Edits undone or redone together.
pub type EditGroup<C> = Vec<Edit<C>>;

/// Undo and redo stacks of edit groups.
#[derive(Debug, Clone)]
pub struct EditHistory<C> {
    open: EditGroup<C>,
    undo_stack: Vec<EditGroup<C>>,
    redo_stack: Vec<EditGroup<C>>,
    max_groups: usize,
}

impl<C> Default for EditHistory<C> {
    fn default() -> Self {
        Self::new(100)
    }
}

impl<C> EditHistory<C> {
    pub fn new(max_groups: usize) -> Self {
        Self {
            open: Vec::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_groups,
        }
    }

    /// Record a user edit into the open group.
    pub fn record(&mut self, edit: Edit<C>) {
        // New edits invalidate anything undone
        self.redo_stack.clear();
        self.open.push(edit);
    }

    /// Close the open group so the next edit starts a new one.
    pub fn cutoff(&mut self) {
        if self.open.is_empty() {
            return;
        }
        let group = std::mem::take(&mut self.open);
        self.push_undo(group);
    }

    pub fn can_undo(&self) -> bool {
        !self.open.is_empty() || !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Pop the most recent group for reverting.
    pub fn take_undo(&mut self) -> Option<EditGroup<C>> {
        self.cutoff();
        self.undo_stack.pop()
    }

    /// Pop the most recently undone group for re-applying.
    pub fn take_redo(&mut self) -> Option<EditGroup<C>> {
        self.redo_stack.pop()
    }

    /// Push a reverted group, in original edit order.
    pub fn push_redo(&mut self, group: EditGroup<C>) {
        self.redo_stack.push(group);
    }

    /// Push a re-applied group without touching the redo stack.
    pub fn push_undo(&mut self, group: EditGroup<C>) {
        self.undo_stack.push(group);
        // Trim if over max
        while self.undo_stack.len() > self.max_groups {
            self.undo_stack.remove(0);
        }
    }

    pub fn clear(&mut self) {
        self.open.clear();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Number of closed undo groups.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}
