//! Bookkeeping for in-flight asynchronous tasks.
//!
//! A task slot only records that some worker owns the handle. Cancelling a
//! task frees the slot without touching the worker; the worker notices at
//! completion time and drops its event.

use crate::handle::TaskHandle;
use crate::table::HandleTable;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of one task, so a worker can tell its own slot
/// apart from a newer task that reused the same handle after a cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskTicket(u64);

struct TaskHandleSlot {
    ticket: TaskTicket,
}

pub struct TaskRegistry {
    tasks: HandleTable<TaskHandleSlot>,
    next_ticket: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: HandleTable::new("tasks"),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Reserve a task handle before the worker starts.
    pub fn begin(&self) -> (TaskHandle, TaskTicket) {
        let ticket = TaskTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        let index = self.tasks.allocate(TaskHandleSlot { ticket });
        (TaskHandle::from_index(index), ticket)
    }

    /// Release the handle. Second and later calls return `false`.
    pub fn end(&self, handle: TaskHandle) -> bool {
        self.tasks.release(handle.index())
    }

    pub fn is_live(&self, handle: TaskHandle) -> bool {
        self.tasks.contains(handle.index())
    }

    /// Finish the task owning `ticket`: if its handle is still live, run
    /// `emit` and release the handle, both under the task lock. Returns
    /// `false`, without calling `emit`, when the task was cancelled.
    pub fn complete(
        &self,
        handle: TaskHandle,
        ticket: TaskTicket,
        emit: impl FnOnce(TaskHandle),
    ) -> bool {
        self.tasks
            .release_if(handle.index(), |slot| slot.ticket == ticket, |_| emit(handle))
    }

    /// Number of live task handles.
    pub fn outstanding(&self) -> usize {
        self.tasks.live()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_end_lifecycle() {
        let tasks = TaskRegistry::new();
        let (handle, _) = tasks.begin();
        assert!(tasks.is_live(handle));
        assert_eq!(tasks.outstanding(), 1);

        assert!(tasks.end(handle));
        assert!(!tasks.is_live(handle));
        assert!(!tasks.end(handle));
        assert_eq!(tasks.outstanding(), 0);
    }

    #[test]
    fn test_complete_emits_once_then_releases() {
        let tasks = TaskRegistry::new();
        let (handle, ticket) = tasks.begin();
        let mut emitted = Vec::new();

        assert!(tasks.complete(handle, ticket, |h| emitted.push(h)));
        assert!(!tasks.complete(handle, ticket, |h| emitted.push(h)));
        assert_eq!(emitted, vec![handle]);
        assert!(!tasks.is_live(handle));
    }

    #[test]
    fn test_complete_after_cancel_is_suppressed() {
        let tasks = TaskRegistry::new();
        let (handle, ticket) = tasks.begin();
        assert!(tasks.end(handle));

        assert!(!tasks.complete(handle, ticket, |_| panic!("cancelled task emitted")));
    }

    #[test]
    fn test_stale_worker_cannot_touch_reused_handle() {
        let tasks = TaskRegistry::new();
        let (old, old_ticket) = tasks.begin();
        assert!(tasks.end(old));

        let (new, new_ticket) = tasks.begin();
        assert_eq!(new, old, "freed handle is reused first");
        assert_ne!(new_ticket, old_ticket);

        assert!(!tasks.complete(old, old_ticket, |_| panic!("stale worker emitted")));
        assert!(tasks.is_live(new));
        assert!(tasks.complete(new, new_ticket, |_| {}));
    }
}
