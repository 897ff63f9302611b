use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A participant of an estimation room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique id of the user within the room, stable for the session lifetime
    #[serde(rename = "u")]
    pub user_id: String,
    /// The name the user picked when joining
    #[serde(rename = "n")]
    pub display_name: String,
    /// Whether the user currently has a live connection to the room
    #[serde(rename = "a")]
    pub active: bool,
}

impl User {
    pub fn new(user_id: &str, display_name: &str) -> Self {
        User {
            user_id: String::from(user_id),
            display_name: String::from(display_name),
            active: true,
        }
    }
}

/// Voting status of a single task, transitions are forward-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Finished,
}

/// One unit of work being estimated by the room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "id")]
    pub id: String,
    /// Human readable summary of the work
    #[serde(rename = "d")]
    pub description: String,
    /// Explicit ordering of the task within the room, does not rely on list position
    #[serde(rename = "q")]
    pub sequence: u32,
    #[serde(rename = "s")]
    pub status: TaskStatus,
    /// Votes cast for this task, keyed by user id
    #[serde(rename = "v")]
    pub votes: HashMap<String, f64>,
}

impl Task {
    pub fn new(id: &str, description: &str, sequence: u32) -> Self {
        Task {
            id: String::from(id),
            description: String::from(description),
            sequence,
            status: TaskStatus::NotStarted,
            votes: HashMap::new(),
        }
    }
}
