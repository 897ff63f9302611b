use comms::types::Task;

/// Actions the external presentation collaborator can feed into the session loop
#[derive(Debug, Clone)]
pub enum Action {
    ConnectToServerRequest { addr: String },
    /// Register a brand new room with the authority and install it locally
    CreateRoom {
        room_id: String,
        display_name: String,
        tasks: Vec<Task>,
    },
    /// Ask the authority whether the given room id exists before committing to join
    ProbeRoom { room_id: String },
    /// The local participant picked a display name, unlocking the join handshake
    ProvideIdentity { display_name: String },
    CastVote { vote: f64 },
    RetractVote,
    StartVoting { task_id: String },
    NextTask,
    FinishSession,
    Exit,
}
