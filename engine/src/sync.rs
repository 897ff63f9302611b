//! Maps the unordered, at-least-once inbound event stream onto session store
//! mutations.
//!
//! Every recognized event applies zero or one mutation. The mutations themselves
//! are idempotent or monotonic, so applying a duplicated or late event converges
//! to the same state instead of corrupting it.

use comms::event::Event;
use comms::types::TaskStatus;
use tracing::debug;

use crate::navigator;
use crate::state_store::{Notice, RoomLifecycle, SessionState};

/// Side effects the synchronizer asks the session loop to carry out
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEffect {
    /// Another participant acted, surface it to the local user
    Notify(Notice),
    /// The existence probe resolved
    RoomExists(bool),
    /// Every task is finished, schedule the hand-off to the external navigator
    SessionCompleted,
}

/// Applies inbound events to the session store and reports the side effects.
///
/// Never fails: a malformed line is already rejected by the transport, and an
/// event referencing unknown ids degrades to a logged no-op inside the store.
pub struct EventSynchronizer;

impl EventSynchronizer {
    pub fn apply(&self, state: &mut SessionState, event: &Event) -> Vec<SyncEffect> {
        let mut effects = Vec::new();

        match event {
            Event::RoomExistsResponse(event) => {
                effects.push(SyncEffect::RoomExists(event.exists));
            }
            Event::UserJoined(event) => {
                let is_self = state.is_local_user(&event.user.user_id);
                let display_name = event.user.display_name.clone();

                state.add_user(event.user.clone());

                if !is_self {
                    effects.push(SyncEffect::Notify(Notice::UserJoined { display_name }));
                }
            }
            Event::UserListUpdated(event) => {
                state.replace_user_list(event.users.values().cloned().collect());
            }
            Event::RoomInfo(event) => {
                state.set_creator(&event.creator_id);
                state.replace_tasks(event.tasks.clone());
                state.lifecycle = RoomLifecycle::Active;
            }
            Event::VoteRegistered(event) => {
                let is_self = state.is_local_user(&event.user_id);
                let display_name = state
                    .display_name_of(&event.user_id)
                    .unwrap_or(&event.user_id)
                    .to_string();

                state.register_vote(&event.task_id, &event.user_id, event.vote);

                if !is_self {
                    let notice = match event.vote {
                        Some(_) => Notice::VoteCast { display_name },
                        None => Notice::VoteRetracted { display_name },
                    };
                    effects.push(SyncEffect::Notify(notice));
                }
            }
            Event::AllVotesIn(event) => {
                if state.set_task_status(&event.task_id, TaskStatus::Finished) {
                    effects.push(SyncEffect::Notify(Notice::AllVotesIn {
                        task_id: event.task_id.clone(),
                    }));
                }

                if navigator::all_tasks_finished(state) {
                    state.lifecycle = RoomLifecycle::Completed;
                    effects.push(SyncEffect::SessionCompleted);
                }
            }
            Event::VotingStarted(event) => {
                state.set_task_status(&event.task_id, TaskStatus::InProgress);
                state.set_active_task(Some(event.task_id.clone()));
            }
            Event::TasksUpdated(event) => {
                state.replace_tasks(event.tasks.clone());
            }
            Event::TaskChanged(event) => {
                // a move we initiated locally comes back as an echo, drop it
                if state.active_task_id.as_deref() == Some(event.task_id.as_str()) {
                    debug!(task_id = %event.task_id, "dropping stale task_changed echo");
                    return effects;
                }

                state.set_active_task(Some(event.task_id.clone()));

                if state.active_task_id.as_deref() == Some(event.task_id.as_str()) {
                    effects.push(SyncEffect::Notify(Notice::TaskChanged {
                        task_id: event.task_id.clone(),
                    }));
                }
            }
            Event::UserLeft(event) => {
                state.mark_user_inactive(&event.user_id);

                if !state.is_local_user(&event.user_id) {
                    effects.push(SyncEffect::Notify(Notice::UserLeft {
                        display_name: event.display_name.clone(),
                    }));
                }
            }
            Event::VotingSessionCompleted(_) => {
                state.lifecycle = RoomLifecycle::Completed;
                effects.push(SyncEffect::SessionCompleted);
            }
        }

        effects
    }
}
