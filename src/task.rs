//! Per-module task registry.
//!
//! A task is an independently schedulable unit attached to a module via an
//! index in `[0, max_tasks_per_module)`. Only module classes that override
//! `run_task` may register tasks.

use std::any::Any;

/// Identifies a registered task by its slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub usize);

/// Sentinel returned by `register_task` when the module's task array is
/// full.
pub const INVALID_TASK_ID: TaskId = TaskId(usize::MAX);

/// A schedulable unit attached to a module: a back-pointer (implicit, via
/// the slot's owning module) plus an opaque user argument handed to
/// `ModuleClass::run_task` on every invocation.
pub struct Task {
    arg: Box<dyn Any + Send>,
}

impl Task {
    pub(crate) fn new(arg: Box<dyn Any + Send>) -> Self {
        Self { arg }
    }

    /// The opaque argument this task carries.
    #[must_use]
    pub fn arg(&self) -> &dyn Any {
        self.arg.as_ref()
    }
}

/// The bounded set of tasks attached to one module.
pub struct TaskRegistry {
    slots: Vec<Option<Task>>,
}

impl TaskRegistry {
    /// Creates an empty registry with room for up to `capacity` tasks.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    /// Registers `arg` in the first free slot, or returns
    /// [`INVALID_TASK_ID`] if the registry is full.
    pub fn register(&mut self, arg: Box<dyn Any + Send>) -> TaskId {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(Task::new(arg));
                return TaskId(i);
            }
        }
        INVALID_TASK_ID
    }

    /// Borrows the task at `id`, if present.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.slots.get(id.0)?.as_ref()
    }

    /// Number of currently registered (non-null) tasks.
    #[must_use]
    pub fn num_tasks(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Destroys all tasks, e.g. as part of module destruction.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Iterates the ids of all currently registered tasks.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.is_some().then_some(TaskId(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_task_fails_past_capacity() {
        let mut reg = TaskRegistry::new(2);
        assert_eq!(reg.register(Box::new(1u32)), TaskId(0));
        assert_eq!(reg.register(Box::new(2u32)), TaskId(1));
        assert_eq!(reg.register(Box::new(3u32)), INVALID_TASK_ID);
    }

    #[test]
    fn num_tasks_counts_non_null_slots() {
        let mut reg = TaskRegistry::new(4);
        reg.register(Box::new(1u32));
        reg.register(Box::new(2u32));
        assert_eq!(reg.num_tasks(), 2);
        reg.clear();
        assert_eq!(reg.num_tasks(), 0);
    }
}
