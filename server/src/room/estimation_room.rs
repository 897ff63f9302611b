use std::collections::{hash_map::Entry, HashMap};

use comms::{
    event::{self, Event},
    types::{Task, TaskStatus, User},
};
use tokio::sync::broadcast;
use tracing::warn;

const BROADCAST_CHANNEL_CAPACITY: usize = 100;

/// [EstimationRoom] holds the authoritative state of one estimation session and
/// its primary broadcast channel. Every mutation is broadcast to all
/// subscribers, every guard mirrors the rules the clients enforce locally so
/// both sides converge on the same view.
#[derive(Debug)]
pub struct EstimationRoom {
    room_id: String,
    creator_id: String,
    users: HashMap<String, User>,
    tasks: Vec<Task>,
    active_task_id: Option<String>,
    broadcast_tx: broadcast::Sender<Event>,
}

impl EstimationRoom {
    pub fn new(room_id: &str, creator: User, mut tasks: Vec<Task>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        tasks.sort_by_key(|task| task.sequence);

        let creator_id = creator.user_id.clone();
        let users = HashMap::from([(creator.user_id.clone(), creator)]);

        EstimationRoom {
            room_id: String::from(room_id),
            creator_id,
            users,
            tasks,
            active_task_id: None,
            broadcast_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.broadcast_tx.subscribe()
    }

    pub fn room_info(&self) -> Event {
        Event::RoomInfo(event::RoomInfoReplyEvent {
            creator_id: self.creator_id.clone(),
            tasks: self.tasks.clone(),
        })
    }

    /// Add a participant to the room and broadcast that they joined.
    ///
    /// Joining with a user id that is already an active participant only
    /// refreshes the user list, the arrival is never announced twice. The
    /// returned receiver is subscribed before anything is broadcast, so the
    /// joiner observes their own arrival.
    pub fn join(&mut self, user: User) -> broadcast::Receiver<Event> {
        let broadcast_rx = self.broadcast_tx.subscribe();

        let announce = match self.users.entry(user.user_id.clone()) {
            Entry::Occupied(mut entry) => {
                let was_inactive = !entry.get().active;
                entry.get_mut().active = true;

                was_inactive
            }
            Entry::Vacant(entry) => {
                entry.insert(user.clone());

                true
            }
        };

        if announce {
            let _ = self
                .broadcast_tx
                .send(Event::UserJoined(event::UserJoinedBroadcastEvent { user }));
        }
        self.broadcast_user_list();

        broadcast_rx
    }

    /// Mark a participant inactive and broadcast the departure. Their votes
    /// stay on the tasks they were cast on.
    pub fn leave(&mut self, user_id: &str) {
        let Some(user) = self.users.get_mut(user_id) else {
            return;
        };
        if !user.active {
            return;
        }
        user.active = false;
        let display_name = user.display_name.clone();

        let _ = self
            .broadcast_tx
            .send(Event::UserLeft(event::UserLeftBroadcastEvent {
                user_id: String::from(user_id),
                display_name,
            }));
        self.broadcast_user_list();
    }

    /// Record or retract (`None`) a vote and broadcast it. When every active
    /// participant has voted on an in-progress task, the task is finished and
    /// the completion is broadcast as well.
    pub fn register_vote(&mut self, task_id: &str, user_id: &str, vote: Option<f64>) {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) else {
            warn!(room_id = %self.room_id, task_id, "vote for an unknown task ignored");
            return;
        };

        match vote {
            Some(value) => {
                task.votes.insert(String::from(user_id), value);
            }
            None => {
                task.votes.remove(user_id);
            }
        }

        // a departed user's stale vote never holds the task open
        let mut active_users = self.users.values().filter(|user| user.active).peekable();
        let all_votes_in = task.status == TaskStatus::InProgress
            && active_users.peek().is_some()
            && active_users.all(|user| task.votes.contains_key(&user.user_id));

        let _ = self
            .broadcast_tx
            .send(Event::VoteRegistered(event::VoteRegisteredBroadcastEvent {
                task_id: String::from(task_id),
                user_id: String::from(user_id),
                vote,
            }));

        if all_votes_in {
            task.status = TaskStatus::Finished;

            let _ = self
                .broadcast_tx
                .send(Event::AllVotesIn(event::AllVotesInBroadcastEvent {
                    task_id: String::from(task_id),
                    percentage: 100.0,
                }));
        }
    }

    /// Open the vote on a task. Only a task that has not started yet can be
    /// opened, and only while no other task is in progress.
    pub fn start_voting(&mut self, task_id: &str) {
        let another_in_progress = self
            .tasks
            .iter()
            .any(|task| task.status == TaskStatus::InProgress && task.id != task_id);

        let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) else {
            warn!(room_id = %self.room_id, task_id, "cannot start voting on an unknown task");
            return;
        };
        if task.status != TaskStatus::NotStarted {
            warn!(
                room_id = %self.room_id,
                task_id,
                status = ?task.status,
                "voting can only start on a task that has not started",
            );
            return;
        }
        if another_in_progress {
            warn!(room_id = %self.room_id, task_id, "another task is already in progress");
            return;
        }

        task.status = TaskStatus::InProgress;
        self.active_task_id = Some(String::from(task_id));

        let _ = self
            .broadcast_tx
            .send(Event::VotingStarted(event::VotingStartedBroadcastEvent {
                task_id: String::from(task_id),
                status: TaskStatus::InProgress,
            }));
    }

    /// Move the active pointer to another task, closing out the previous one
    /// if it was still in progress.
    pub fn change_task(&mut self, task_id: &str, previous_task_id: Option<&str>) {
        if !self.tasks.iter().any(|task| task.id == task_id) {
            warn!(room_id = %self.room_id, task_id, "cannot change to an unknown task");
            return;
        }

        // close out whichever task this room considers active, the client-sent
        // previous id is only echoed for the broadcast
        let departing = self.active_task_id.clone().or(previous_task_id.map(String::from));
        if let Some(previous) = departing {
            if let Some(task) = self.tasks.iter_mut().find(|task| task.id == previous) {
                if task.status == TaskStatus::InProgress {
                    task.status = TaskStatus::Finished;
                }
            }
        }

        self.active_task_id = Some(String::from(task_id));

        let _ = self
            .broadcast_tx
            .send(Event::TaskChanged(event::TaskChangedBroadcastEvent {
                task_id: String::from(task_id),
                previous_task_id: previous_task_id.map(String::from),
            }));
        let _ = self
            .broadcast_tx
            .send(Event::TasksUpdated(event::TasksUpdatedBroadcastEvent {
                tasks: self.tasks.clone(),
            }));
    }

    /// Close the whole session once every task is finished
    pub fn finish_voting(&mut self) {
        if self
            .tasks
            .iter()
            .any(|task| task.status != TaskStatus::Finished)
        {
            warn!(room_id = %self.room_id, "session finish requested with unfinished tasks");
            return;
        }

        let _ = self.broadcast_tx.send(Event::VotingSessionCompleted(
            event::VotingSessionCompletedBroadcastEvent,
        ));
    }

    fn broadcast_user_list(&self) {
        let _ = self
            .broadcast_tx
            .send(Event::UserListUpdated(event::UserListUpdatedBroadcastEvent {
                users: self.users.clone(),
            }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_with_two_tasks() -> EstimationRoom {
        EstimationRoom::new(
            "sprint-7",
            User::new("ann-id", "ann"),
            vec![
                Task::new("A", "login flow", 1),
                Task::new("B", "search page", 2),
            ],
        )
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        events
    }

    #[test]
    fn join_announces_a_user_only_once() {
        let mut room = room_with_two_tasks();

        let mut rx = room.join(User::new("bob-id", "bob"));
        let joins = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, Event::UserJoined(_)))
            .count();
        assert_eq!(joins, 1, "the joiner observes their own arrival");

        let _rx2 = room.join(User::new("bob-id", "bob"));
        let joins = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, Event::UserJoined(_)))
            .count();
        assert_eq!(joins, 0, "the second join only refreshes the user list");
    }

    #[test]
    fn all_active_votes_finish_the_task() {
        let mut room = room_with_two_tasks();
        let mut rx = room.subscribe();

        room.start_voting("A");
        room.register_vote("A", "ann-id", Some(5.0));

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::AllVotesIn(e) if e.task_id == "A")));
        assert_eq!(room.tasks[0].status, TaskStatus::Finished);
    }

    #[test]
    fn voting_cannot_restart_a_finished_task() {
        let mut room = room_with_two_tasks();

        room.start_voting("A");
        room.register_vote("A", "ann-id", Some(5.0));

        let mut rx = room.subscribe();
        room.start_voting("A");

        assert!(drain(&mut rx).is_empty());
        assert_eq!(room.tasks[0].status, TaskStatus::Finished);
    }

    #[test]
    fn departed_users_do_not_hold_the_vote_open() {
        let mut room = room_with_two_tasks();
        let _rx = room.join(User::new("bob-id", "bob"));

        room.start_voting("A");
        room.leave("bob-id");
        room.register_vote("A", "ann-id", Some(3.0));

        assert_eq!(room.tasks[0].status, TaskStatus::Finished);
    }

    #[test]
    fn finish_is_refused_while_tasks_are_open() {
        let mut room = room_with_two_tasks();
        let mut rx = room.subscribe();

        room.finish_voting();

        assert!(drain(&mut rx).is_empty());
    }
}
