//! Moves the active-task pointer along the fixed task ordering.
//!
//! Ordering comes from each task's explicit `sequence` field, never from list
//! position, so a reordered or partially updated task list keeps a stable
//! notion of "next".

use comms::types::TaskStatus;

use crate::state_store::SessionState;

/// Result of trying to advance the active-task pointer
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// The pointer moved, the caller should broadcast the change carrying both
    /// ids so remote stores can drop their own echo
    Moved {
        task_id: String,
        previous_task_id: Option<String>,
    },
    /// The active task is already the last one, nothing was mutated
    NoFurtherItems,
}

/// Advance to the task after the active one in sequence order.
///
/// With no active task yet, advancing moves to the first task. On the last
/// task this is a pure no-op signalling the caller to offer "finish" instead
/// of "next".
pub fn advance(state: &mut SessionState) -> Advance {
    // tasks are kept sorted by sequence by the store
    let next_id = match state.active_task_id.as_deref() {
        Some(active) => {
            let position = state.tasks.iter().position(|t| t.id == active);
            match position {
                Some(position) => state.tasks.get(position + 1).map(|t| t.id.clone()),
                // dangling pointer, start over from the beginning
                None => state.tasks.first().map(|t| t.id.clone()),
            }
        }
        None => state.tasks.first().map(|t| t.id.clone()),
    };

    match next_id {
        Some(task_id) => {
            let previous_task_id = state.active_task_id.clone();
            state.set_active_task(Some(task_id.clone()));

            Advance::Moved {
                task_id,
                previous_task_id,
            }
        }
        None => Advance::NoFurtherItems,
    }
}

/// Whether every task of the room has been estimated.
/// A room without tasks has nothing to finish and reports `false`.
pub fn all_tasks_finished(state: &SessionState) -> bool {
    !state.tasks.is_empty()
        && state
            .tasks
            .iter()
            .all(|t| t.status == TaskStatus::Finished)
}
