use serde::{Deserialize, Serialize};

use crate::types::{Task, User};

/// Client Command for registering a new room with the authority.
/// Sent once by the room creator, the tasks are supplied at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRoomCommand {
    // The id of the room to create.
    #[serde(rename = "r")]
    pub room: String,
    // The creator of the room.
    #[serde(rename = "u")]
    pub user: User,
    // The tasks the room will estimate.
    #[serde(rename = "ts")]
    pub tasks: Vec<Task>,
}

/// Client Command for joining an existing room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomCommand {
    // The room to join.
    #[serde(rename = "r")]
    pub room: String,
    // The joining participant.
    #[serde(rename = "u")]
    pub user: User,
}

/// Client Command probing whether a room id is known to the authority.
/// The only failure signal of a bad room id, since join has no failure reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomExistsCommand {
    // The room to probe.
    #[serde(rename = "r")]
    pub room: String,
}

/// Client Command recording or retracting a vote for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterVoteCommand {
    #[serde(rename = "r")]
    pub room: String,
    #[serde(rename = "tid")]
    pub task_id: String,
    #[serde(rename = "u")]
    pub user_id: String,
    // `None` retracts a previously cast vote.
    #[serde(rename = "v")]
    pub vote: Option<f64>,
}

/// Client Command opening a task for voting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartVotingCommand {
    #[serde(rename = "r")]
    pub room: String,
    #[serde(rename = "tid")]
    pub task_id: String,
    #[serde(rename = "u")]
    pub user_id: String,
}

/// Client Command moving the active-task pointer.
/// Carries the previous task id so remote stores can drop their own echo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeTaskCommand {
    #[serde(rename = "r")]
    pub room: String,
    #[serde(rename = "tid")]
    pub task_id: String,
    #[serde(rename = "p")]
    pub previous_task_id: Option<String>,
    #[serde(rename = "u")]
    pub user_id: String,
}

/// Client Command ending the estimation session for the whole room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishVotingCommand {
    #[serde(rename = "r")]
    pub room: String,
}

/// A command which can be sent to the authority by a single client session.
/// All commands are processed in the context of one room paired with an individual connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_ct", rename_all = "snake_case")]
pub enum ClientCommand {
    CreateRoom(CreateRoomCommand),
    JoinRoom(JoinRoomCommand),
    RoomExists(RoomExistsCommand),
    RegisterVote(RegisterVoteCommand),
    StartVoting(StartVotingCommand),
    ChangeTask(ChangeTaskCommand),
    FinishVoting(FinishVotingCommand),
}

#[cfg(test)]
mod tests {
    use super::*;

    // given a command enum, and an expect string, asserts that command is serialized / deserialized appropiately
    fn assert_command_serialization(command: &ClientCommand, expected: &str) {
        let serialized = serde_json::to_string(&command).unwrap();
        assert_eq!(serialized, expected);
        let deserialized: ClientCommand = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, *command);
    }

    #[test]
    fn test_create_room_command() {
        let command = ClientCommand::CreateRoom(CreateRoomCommand {
            room: "R1".to_string(),
            user: User::new("u1", "alice"),
            tasks: vec![Task::new("A", "first", 0)],
        });

        assert_command_serialization(
            &command,
            r#"{"_ct":"create_room","r":"R1","u":{"u":"u1","n":"alice","a":true},"ts":[{"id":"A","d":"first","q":0,"s":"not_started","v":{}}]}"#,
        );
    }

    #[test]
    fn test_join_room_command() {
        let command = ClientCommand::JoinRoom(JoinRoomCommand {
            room: "R1".to_string(),
            user: User::new("u2", "bob"),
        });

        assert_command_serialization(
            &command,
            r#"{"_ct":"join_room","r":"R1","u":{"u":"u2","n":"bob","a":true}}"#,
        );
    }

    #[test]
    fn test_room_exists_command() {
        let command = ClientCommand::RoomExists(RoomExistsCommand {
            room: "R1".to_string(),
        });

        assert_command_serialization(&command, r#"{"_ct":"room_exists","r":"R1"}"#);
    }

    #[test]
    fn test_register_vote_command() {
        let command = ClientCommand::RegisterVote(RegisterVoteCommand {
            room: "R1".to_string(),
            task_id: "A".to_string(),
            user_id: "u1".to_string(),
            vote: Some(5.0),
        });

        assert_command_serialization(
            &command,
            r#"{"_ct":"register_vote","r":"R1","tid":"A","u":"u1","v":5.0}"#,
        );
    }

    #[test]
    fn test_register_vote_command_retracts_with_null() {
        let command = ClientCommand::RegisterVote(RegisterVoteCommand {
            room: "R1".to_string(),
            task_id: "A".to_string(),
            user_id: "u1".to_string(),
            vote: None,
        });

        assert_command_serialization(
            &command,
            r#"{"_ct":"register_vote","r":"R1","tid":"A","u":"u1","v":null}"#,
        );
    }

    #[test]
    fn test_start_voting_command() {
        let command = ClientCommand::StartVoting(StartVotingCommand {
            room: "R1".to_string(),
            task_id: "A".to_string(),
            user_id: "u1".to_string(),
        });

        assert_command_serialization(
            &command,
            r#"{"_ct":"start_voting","r":"R1","tid":"A","u":"u1"}"#,
        );
    }

    #[test]
    fn test_change_task_command() {
        let command = ClientCommand::ChangeTask(ChangeTaskCommand {
            room: "R1".to_string(),
            task_id: "B".to_string(),
            previous_task_id: Some("A".to_string()),
            user_id: "u1".to_string(),
        });

        assert_command_serialization(
            &command,
            r#"{"_ct":"change_task","r":"R1","tid":"B","p":"A","u":"u1"}"#,
        );
    }

    #[test]
    fn test_finish_voting_command() {
        let command = ClientCommand::FinishVoting(FinishVotingCommand {
            room: "R1".to_string(),
        });

        assert_command_serialization(&command, r#"{"_ct":"finish_voting","r":"R1"}"#);
    }
}
