use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Task, TaskStatus, User};

/// Reply to a [crate::command::RoomExistsCommand] probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomExistsReplyEvent {
    /// Whether the probed room id is known to the authority
    #[serde(rename = "e")]
    pub exists: bool,
}

/// A user has joined the room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserJoinedBroadcastEvent {
    #[serde(rename = "u")]
    pub user: User,
}

/// Authoritative replacement of the whole participant list, keyed by user id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserListUpdatedBroadcastEvent {
    #[serde(rename = "us")]
    pub users: HashMap<String, User>,
}

/// Welcome reply carrying the authoritative copy of the room for a joining user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfoReplyEvent {
    /// The id of the user that created the room
    #[serde(rename = "c")]
    pub creator_id: String,
    #[serde(rename = "ts")]
    pub tasks: Vec<Task>,
}

/// A participant has cast or retracted a vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRegisteredBroadcastEvent {
    #[serde(rename = "tid")]
    pub task_id: String,
    #[serde(rename = "u")]
    pub user_id: String,
    /// `None` means the vote was retracted
    #[serde(rename = "v")]
    pub vote: Option<f64>,
}

/// Every active participant has voted on the task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllVotesInBroadcastEvent {
    #[serde(rename = "tid")]
    pub task_id: String,
    /// Completed percentage of the vote at the time of the broadcast
    #[serde(rename = "p")]
    pub percentage: f64,
}

/// Voting has been opened on a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingStartedBroadcastEvent {
    #[serde(rename = "tid")]
    pub task_id: String,
    #[serde(rename = "s")]
    pub status: TaskStatus,
}

/// Authoritative replacement of the whole task list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksUpdatedBroadcastEvent {
    #[serde(rename = "ts")]
    pub tasks: Vec<Task>,
}

/// The active-task pointer moved.
/// Carries the previous task id so a client that initiated the move can drop the echo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskChangedBroadcastEvent {
    #[serde(rename = "tid")]
    pub task_id: String,
    #[serde(rename = "p")]
    pub previous_task_id: Option<String>,
}

/// A user has left the room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLeftBroadcastEvent {
    #[serde(rename = "u")]
    pub user_id: String,
    #[serde(rename = "n")]
    pub display_name: String,
}

/// The whole estimation session is over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingSessionCompletedBroadcastEvent;

/// Events that can be sent to the client.
/// Events may originate from other participants of the room, the recipient is a single client session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum Event {
    RoomExistsResponse(RoomExistsReplyEvent),
    UserJoined(UserJoinedBroadcastEvent),
    UserListUpdated(UserListUpdatedBroadcastEvent),
    RoomInfo(RoomInfoReplyEvent),
    VoteRegistered(VoteRegisteredBroadcastEvent),
    AllVotesIn(AllVotesInBroadcastEvent),
    VotingStarted(VotingStartedBroadcastEvent),
    TasksUpdated(TasksUpdatedBroadcastEvent),
    TaskChanged(TaskChangedBroadcastEvent),
    UserLeft(UserLeftBroadcastEvent),
    VotingSessionCompleted(VotingSessionCompletedBroadcastEvent),
}
