//! The two-phase join handshake.
//!
//! A participant first probes whether the room id is valid at all, because the
//! join command has no failure reply: the only signal of a bad room id is the
//! absence of any room-info response within the probe window. Once the probe
//! resolves positive and the participant has picked an identity, the join intent
//! is emitted exactly once per (room, user) pair, no matter how often the
//! surrounding loop re-evaluates the preconditions.

use comms::command::{ClientCommand, JoinRoomCommand, RoomExistsCommand};
use comms::types::User;
use tracing::debug;

/// Where the existence probe currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Idle,
    Awaiting,
    Exists,
    Missing,
}

/// Single-shot existence check for a room id
#[derive(Debug)]
pub struct ExistenceProbe {
    status: ProbeStatus,
}

impl ExistenceProbe {
    pub fn new() -> Self {
        ExistenceProbe {
            status: ProbeStatus::Idle,
        }
    }

    pub fn status(&self) -> ProbeStatus {
        self.status
    }

    /// Start the probe. Returns the outbound command, or `None` if the probe
    /// has already been started once.
    pub fn begin(&mut self, room_id: &str) -> Option<ClientCommand> {
        if self.status != ProbeStatus::Idle {
            debug!(room_id, "existence probe already started");
            return None;
        }

        self.status = ProbeStatus::Awaiting;

        Some(ClientCommand::RoomExists(RoomExistsCommand {
            room: String::from(room_id),
        }))
    }

    /// Record the authority's reply. A reply arriving after the deadline
    /// already expired the probe is ignored.
    pub fn resolve(&mut self, exists: bool) {
        if self.status != ProbeStatus::Awaiting {
            debug!(exists, "ignoring probe reply in status {:?}", self.status);
            return;
        }

        self.status = if exists {
            ProbeStatus::Exists
        } else {
            ProbeStatus::Missing
        };
    }

    /// The deadline passed without any reply, treat the room as missing.
    pub fn expire(&mut self) {
        if self.status == ProbeStatus::Awaiting {
            self.status = ProbeStatus::Missing;
        }
    }
}

impl Default for ExistenceProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    NotJoined,
    Joined,
}

/// One-shot latch emitting the join intent for a (room, user) pair.
///
/// `evaluate` may be called arbitrarily often, on reconnects, state republishes
/// or any other re-evaluation of the preconditions, and still emits the join
/// command exactly once per pair.
#[derive(Debug)]
pub struct JoinCoordinator {
    state: JoinState,
    joined_pair: Option<(String, String)>,
}

impl JoinCoordinator {
    pub fn new() -> Self {
        JoinCoordinator {
            state: JoinState::NotJoined,
            joined_pair: None,
        }
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    /// Emit the join command iff the transport is connected, the room id is
    /// known, the local identity exists and this (room, user) pair has not
    /// joined before.
    pub fn evaluate(
        &mut self,
        connected: bool,
        room_id: Option<&str>,
        user: Option<&User>,
    ) -> Option<ClientCommand> {
        if !connected {
            return None;
        }
        let (room_id, user) = match (room_id, user) {
            (Some(room_id), Some(user)) => (room_id, user),
            _ => return None,
        };

        let pair = (String::from(room_id), user.user_id.clone());
        if self.joined_pair.as_ref() == Some(&pair) {
            return None;
        }

        self.state = JoinState::Joined;
        self.joined_pair = Some(pair);

        Some(ClientCommand::JoinRoom(JoinRoomCommand {
            room: String::from(room_id),
            user: user.clone(),
        }))
    }
}

impl Default for JoinCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_emitted_once_for_repeated_evaluations() {
        let mut coordinator = JoinCoordinator::new();
        let user = User::new("u1", "alice");
        let mut emitted = 0;

        for _ in 0..50 {
            if coordinator.evaluate(true, Some("R1"), Some(&user)).is_some() {
                emitted += 1;
            }
        }

        assert_eq!(emitted, 1);
        assert_eq!(coordinator.state(), JoinState::Joined);
    }

    #[test]
    fn test_join_waits_for_all_preconditions() {
        let mut coordinator = JoinCoordinator::new();
        let user = User::new("u1", "alice");

        assert!(coordinator.evaluate(false, Some("R1"), Some(&user)).is_none());
        assert!(coordinator.evaluate(true, None, Some(&user)).is_none());
        assert!(coordinator.evaluate(true, Some("R1"), None).is_none());
        assert_eq!(coordinator.state(), JoinState::NotJoined);

        assert!(coordinator.evaluate(true, Some("R1"), Some(&user)).is_some());
    }

    #[test]
    fn test_join_fires_again_for_a_different_room() {
        let mut coordinator = JoinCoordinator::new();
        let user = User::new("u1", "alice");

        assert!(coordinator.evaluate(true, Some("R1"), Some(&user)).is_some());
        assert!(coordinator.evaluate(true, Some("R1"), Some(&user)).is_none());
        assert!(coordinator.evaluate(true, Some("R2"), Some(&user)).is_some());
    }

    #[test]
    fn test_probe_begins_only_once() {
        let mut probe = ExistenceProbe::new();

        assert!(probe.begin("R1").is_some());
        assert!(probe.begin("R1").is_none());
        assert_eq!(probe.status(), ProbeStatus::Awaiting);
    }

    #[test]
    fn test_probe_resolves_to_exists() {
        let mut probe = ExistenceProbe::new();
        probe.begin("R1");

        probe.resolve(true);

        assert_eq!(probe.status(), ProbeStatus::Exists);
    }

    #[test]
    fn test_probe_expires_without_a_reply() {
        let mut probe = ExistenceProbe::new();
        probe.begin("R1");

        probe.expire();

        assert_eq!(probe.status(), ProbeStatus::Missing);
        // a late reply no longer flips the resolved probe
        probe.resolve(true);
        assert_eq!(probe.status(), ProbeStatus::Missing);
    }

    #[test]
    fn test_expire_before_begin_is_a_no_op() {
        let mut probe = ExistenceProbe::new();

        probe.expire();

        assert_eq!(probe.status(), ProbeStatus::Idle);
    }
}
