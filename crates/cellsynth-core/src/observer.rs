//! Change notification for rendering and audio consumers.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::GenerationSummary;
use crate::cell::Cell;

/// Receives committed cell changes from a grid.
///
/// Callbacks run synchronously on the thread that mutated the grid. They only
/// ever see a shared borrow of the changed cell, so an observer cannot reach
/// back into the grid it is watching.
pub trait CellObserver: Send {
    /// Called once for every cell whose amplitude or frequency changed.
    fn on_cell_changed(&mut self, cell: &Cell);

    /// Called after all cell callbacks of a generation have fired.
    fn on_generation(&mut self, _summary: &GenerationSummary) {}
}

/// Shared handle owned by the integration layer.
pub type SharedObserver = Arc<Mutex<dyn CellObserver>>;

/// Handle returned by [`ObserverSet::attach`], used to detach later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Non-owning list of observers.
///
/// Observers are held through [`Weak`] references; once their owner drops the
/// last strong handle they are pruned on the next notification.
#[derive(Default)]
pub struct ObserverSet {
    next_id: u64,
    entries: Vec<(ObserverId, Weak<Mutex<dyn CellObserver>>)>,
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("attached", &self.entries.len())
            .field("live", &self.len())
            .finish()
    }
}

impl ObserverSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer without taking ownership of it.
    pub fn attach<O>(&mut self, observer: &Arc<Mutex<O>>) -> ObserverId
    where
        O: CellObserver + 'static,
    {
        let weak = Arc::downgrade(observer);
        self.push(weak)
    }

    /// Register an already type-erased observer.
    pub fn attach_shared(&mut self, observer: &SharedObserver) -> ObserverId {
        self.push(Arc::downgrade(observer))
    }

    fn push(&mut self, weak: Weak<Mutex<dyn CellObserver>>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, weak));
        id
    }

    /// Remove an observer; returns `false` if the id was unknown.
    pub fn detach(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Number of observers whose owners are still alive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn for_each_live(&mut self, mut visit: impl FnMut(&mut dyn CellObserver)) {
        self.entries.retain(|(_, weak)| weak.strong_count() > 0);
        for (_, weak) in &self.entries {
            let Some(observer) = weak.upgrade() else {
                continue;
            };
            let mut guard = observer.lock().unwrap_or_else(PoisonError::into_inner);
            visit(&mut *guard);
        }
    }

    /// Notify every observer about `changed` cell indices, in the given order.
    pub(crate) fn notify_cells(&mut self, cells: &[Cell], changed: &[usize]) {
        if changed.is_empty() || self.entries.is_empty() {
            return;
        }
        self.for_each_live(|observer| {
            for &index in changed {
                observer.on_cell_changed(&cells[index]);
            }
        });
    }

    pub(crate) fn notify_generation(&mut self, summary: &GenerationSummary) {
        if self.entries.is_empty() {
            return;
        }
        self.for_each_live(|observer| observer.on_generation(summary));
    }
}
