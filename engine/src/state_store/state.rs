use circular_queue::CircularQueue;
use comms::types::{Task, TaskStatus, User};
use tracing::{debug, warn};

const MAX_NOTICES_TO_STORE: usize = 100;

/// A user facing notification about another participant's action.
/// Formatting is left to the presentation collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    UserJoined { display_name: String },
    UserLeft { display_name: String },
    VoteCast { display_name: String },
    VoteRetracted { display_name: String },
    TaskChanged { task_id: String },
    AllVotesIn { task_id: String },
}

#[derive(Debug, Clone)]
pub enum ServerConnectionStatus {
    Uninitialized,
    Connecting,
    Connected { addr: String },
    Errored { err: String },
}

/// Lifecycle of the locally mirrored room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomLifecycle {
    /// No room has been requested yet
    Idle,
    /// The existence probe is in flight
    Probing,
    /// The probe resolved negative or timed out
    NotFound,
    /// The room exists, the local participant has not completed the join handshake
    Gathering,
    /// The room is live and voting
    Active,
    /// Every task has been estimated, the session is over
    Completed,
}

/// SessionState is the canonical local copy of one estimation room.
///
/// Mutations are total: an event referencing an id that is not locally known yet
/// (a race with the room-info handshake) degrades to a logged no-op instead of an
/// error, favouring eventual convergence over failing fast.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub server_connection_status: ServerConnectionStatus,
    pub lifecycle: RoomLifecycle,
    /// The room this session mirrors
    pub room_id: Option<String>,
    /// The id of the participant that created the room
    pub creator_id: Option<String>,
    /// Local participant identity, set once a display name has been picked
    pub local_user: Option<User>,
    /// Participants of the room
    pub users: Vec<User>,
    /// Tasks being estimated, kept sorted by their sequence field
    pub tasks: Vec<Task>,
    /// The task currently accepting votes
    pub active_task_id: Option<String>,
    /// Bounded feed of notifications for the presentation collaborator
    pub notices: CircularQueue<Notice>,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            server_connection_status: ServerConnectionStatus::Uninitialized,
            lifecycle: RoomLifecycle::Idle,
            room_id: None,
            creator_id: None,
            local_user: None,
            users: Vec::new(),
            tasks: Vec::new(),
            active_task_id: None,
            notices: CircularQueue::with_capacity(MAX_NOTICES_TO_STORE),
        }
    }
}

fn status_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::NotStarted => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::Finished => 2,
    }
}

impl SessionState {
    /// Install a freshly created room wholesale. Used only by the creator, once.
    pub fn create_room(&mut self, room_id: &str, creator: User, mut tasks: Vec<Task>) {
        tasks.sort_by_key(|t| t.sequence);

        self.room_id = Some(String::from(room_id));
        self.creator_id = Some(creator.user_id.clone());
        self.local_user = Some(creator.clone());
        self.users = vec![creator];
        self.tasks = tasks;
        self.active_task_id = None;
        self.lifecycle = RoomLifecycle::Active;
    }

    /// Append a user unless their id is already present.
    /// The no-op on duplicates is what makes the join handshake idempotent.
    pub fn add_user(&mut self, user: User) {
        if self.users.iter().any(|u| u.user_id == user.user_id) {
            debug!(user_id = %user.user_id, "ignoring duplicate user join");
            return;
        }

        self.users.push(user);
    }

    /// Authoritative replacement of the whole participant list
    pub fn replace_user_list(&mut self, mut users: Vec<User>) {
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        self.users = users;
    }

    /// Flip a participant's active flag off, keeping their votes attributable
    pub fn mark_user_inactive(&mut self, user_id: &str) {
        match self.users.iter_mut().find(|u| u.user_id == user_id) {
            Some(user) => user.active = false,
            None => debug!(user_id, "ignoring departure of unknown user"),
        }
    }

    /// Move the active-task pointer. Ignored when the target id is not a known task.
    pub fn set_active_task(&mut self, task_id: Option<String>) {
        if let Some(id) = task_id.as_deref() {
            if self.task(id).is_none() {
                debug!(task_id = id, "ignoring active-task change to unknown task");
                return;
            }
        }

        self.active_task_id = task_id;
    }

    /// Set or retract a vote. `None` removes the user's vote.
    ///
    /// The task is cloned, mutated and swapped back in, so a concurrently held
    /// snapshot never observes a half-updated vote map.
    pub fn register_vote(&mut self, task_id: &str, user_id: &str, vote: Option<f64>) {
        let Some(position) = self.tasks.iter().position(|t| t.id == task_id) else {
            debug!(task_id, "ignoring vote for unknown task");
            return;
        };

        let mut task = self.tasks[position].clone();
        match vote {
            Some(value) => {
                task.votes.insert(String::from(user_id), value);
            }
            None => {
                task.votes.remove(user_id);
            }
        }

        self.tasks[position] = task;
    }

    /// Apply a forward-only status transition.
    ///
    /// A regressive request is an anomaly: it is logged and rejected, never applied
    /// silently. The authoritative remote state wins on the next full reconciliation.
    /// Returns whether the transition was applied.
    pub fn set_task_status(&mut self, task_id: &str, status: TaskStatus) -> bool {
        let Some(position) = self.tasks.iter().position(|t| t.id == task_id) else {
            debug!(task_id, "ignoring status change for unknown task");
            return false;
        };

        let current = self.tasks[position].status;
        if status_rank(status) < status_rank(current) {
            warn!(
                task_id,
                ?current,
                requested = ?status,
                "rejecting regressive task status transition"
            );
            return false;
        }
        if status_rank(status) == status_rank(current) {
            return false;
        }

        // at most one task may be voting at a time
        if status == TaskStatus::InProgress
            && self
                .tasks
                .iter()
                .any(|t| t.status == TaskStatus::InProgress && t.id != task_id)
        {
            warn!(
                task_id,
                "rejecting in-progress transition while another task is voting"
            );
            return false;
        }

        let mut task = self.tasks[position].clone();
        task.status = status;
        self.tasks[position] = task;

        true
    }

    /// The explicit revote reset: clears votes and puts the task back to not started.
    /// This is the only sanctioned way out of the finished status.
    pub fn reset_task(&mut self, task_id: &str) {
        let Some(position) = self.tasks.iter().position(|t| t.id == task_id) else {
            debug!(task_id, "ignoring reset of unknown task");
            return;
        };

        let mut task = self.tasks[position].clone();
        task.votes.clear();
        task.status = TaskStatus::NotStarted;
        self.tasks[position] = task;
    }

    /// Authoritative replacement of the whole task list.
    /// The active pointer is dropped if it no longer resolves to a known task.
    pub fn replace_tasks(&mut self, mut tasks: Vec<Task>) {
        tasks.sort_by_key(|t| t.sequence);
        self.tasks = tasks;

        if let Some(active) = self.active_task_id.as_deref() {
            if self.task(active).is_none() {
                warn!(
                    task_id = active,
                    "active task disappeared from authoritative task list"
                );
                self.active_task_id = None;
            }
        }
    }

    pub fn set_creator(&mut self, creator_id: &str) {
        self.creator_id = Some(String::from(creator_id));
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.active_task_id.as_deref().and_then(|id| self.task(id))
    }

    pub fn display_name_of(&self, user_id: &str) -> Option<&str> {
        self.users
            .iter()
            .find(|u| u.user_id == user_id)
            .map(|u| u.display_name.as_str())
    }

    pub fn is_local_user(&self, user_id: &str) -> bool {
        self.local_user
            .as_ref()
            .map(|u| u.user_id == user_id)
            .unwrap_or(false)
    }

    pub fn mark_connection_request_start(&mut self) {
        self.server_connection_status = ServerConnectionStatus::Connecting;
    }

    /// Processes the result of a connection request to change the state of the session
    pub fn process_connection_request_result(&mut self, result: anyhow::Result<String>) {
        self.server_connection_status = match result {
            Ok(addr) => ServerConnectionStatus::Connected { addr },
            Err(err) => ServerConnectionStatus::Errored {
                err: err.to_string(),
            },
        }
    }
}
