use std::sync::Arc;

use anyhow::Context;
use comms::{
    command::ClientCommand,
    event::{self, Event},
    types::User,
};
use tokio::{
    sync::{mpsc, Mutex},
    task::{AbortHandle, JoinSet},
};
use tracing::warn;

use crate::room::{EstimationRoom, RoomRegistry};

struct Attachment {
    room_id: String,
    user_id: String,
    room: Arc<Mutex<EstimationRoom>>,
    abort_handle: AbortHandle,
}

/// [RoomSession] ties one client connection to at most one estimation room
/// and funnels the room's broadcasts into a single per-session channel.
pub(super) struct RoomSession {
    session_id: String,
    registry: Arc<RoomRegistry>,
    attachment: Option<Attachment>,
    join_set: JoinSet<()>,
    mpsc_tx: mpsc::Sender<Event>,
    mpsc_rx: mpsc::Receiver<Event>,
}

impl RoomSession {
    pub fn new(session_id: &str, registry: Arc<RoomRegistry>) -> Self {
        let (mpsc_tx, mpsc_rx) = mpsc::channel(100);

        RoomSession {
            session_id: String::from(session_id),
            registry,
            attachment: None,
            join_set: JoinSet::new(),
            mpsc_tx,
            mpsc_rx,
        }
    }

    /// Handle a single client command. A command that cannot be honored is
    /// logged and dropped, only transport failures end the session.
    pub async fn handle_command(&mut self, cmd: ClientCommand) -> anyhow::Result<()> {
        match cmd {
            ClientCommand::RoomExists(cmd) => {
                let exists = self.registry.room_exists(&cmd.room).await;

                self.mpsc_tx
                    .send(Event::RoomExistsResponse(event::RoomExistsReplyEvent {
                        exists,
                    }))
                    .await?;
            }
            ClientCommand::CreateRoom(cmd) => {
                if self.attachment.is_some() {
                    warn!(session_id = %self.session_id, "session already attached to a room, create ignored");
                    return Ok(());
                }

                match self
                    .registry
                    .create_room(&cmd.room, cmd.user.clone(), cmd.tasks)
                    .await
                {
                    Ok(room) => self.attach(&cmd.room, cmd.user, room).await?,
                    Err(err) => {
                        warn!(session_id = %self.session_id, %err, "could not create room");
                    }
                }
            }
            ClientCommand::JoinRoom(cmd) => {
                if self.attachment.is_some() {
                    warn!(session_id = %self.session_id, "session already attached to a room, join ignored");
                    return Ok(());
                }

                match self.registry.get(&cmd.room).await {
                    Some(room) => self.attach(&cmd.room, cmd.user, room).await?,
                    // the existence probe precedes a join, so this only happens on a misbehaving client
                    None => {
                        warn!(session_id = %self.session_id, room = %cmd.room, "join to an unknown room ignored");
                    }
                }
            }
            ClientCommand::RegisterVote(cmd) => {
                if let Some(room) = self.attached_room(&cmd.room) {
                    room.lock()
                        .await
                        .register_vote(&cmd.task_id, &cmd.user_id, cmd.vote);
                }
            }
            ClientCommand::StartVoting(cmd) => {
                if let Some(room) = self.attached_room(&cmd.room) {
                    room.lock().await.start_voting(&cmd.task_id);
                }
            }
            ClientCommand::ChangeTask(cmd) => {
                if let Some(room) = self.attached_room(&cmd.room) {
                    room.lock()
                        .await
                        .change_task(&cmd.task_id, cmd.previous_task_id.as_deref());
                }
            }
            ClientCommand::FinishVoting(cmd) => {
                if let Some(room) = self.attached_room(&cmd.room) {
                    room.lock().await.finish_voting();
                }
            }
        }

        Ok(())
    }

    /// Leave the attached room, if any, and stop forwarding its broadcasts
    pub async fn leave(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            attachment.room.lock().await.leave(&attachment.user_id);
            attachment.abort_handle.abort();
        }
    }

    /// Receive the next event destined for this session, whether a direct
    /// reply or a broadcast forwarded from the attached room
    pub async fn recv(&mut self) -> anyhow::Result<Event> {
        self.mpsc_rx
            .recv()
            .await
            .context("could not recv from the room channel")
    }

    fn attached_room(&self, room_id: &str) -> Option<Arc<Mutex<EstimationRoom>>> {
        match self.attachment.as_ref() {
            Some(attachment) if attachment.room_id == room_id => Some(Arc::clone(&attachment.room)),
            _ => {
                warn!(session_id = %self.session_id, room_id, "command for a room this session is not part of");

                None
            }
        }
    }

    /// Join the room and spawn a task forwarding its broadcasts into this
    /// session's channel. The subscription is taken before the join is
    /// announced, so no event between join and forwarding can be missed.
    async fn attach(
        &mut self,
        room_id: &str,
        user: User,
        room: Arc<Mutex<EstimationRoom>>,
    ) -> anyhow::Result<()> {
        let user_id = user.user_id.clone();
        let (room_info, mut broadcast_rx) = {
            let mut guard = room.lock().await;
            let broadcast_rx = guard.join(user);

            (guard.room_info(), broadcast_rx)
        };

        // the room description is the first thing the client sees after joining
        self.mpsc_tx.send(room_info).await?;

        let abort_handle = self.join_set.spawn({
            let mpsc_tx = self.mpsc_tx.clone();

            async move {
                while let Ok(event) = broadcast_rx.recv().await {
                    let _ = mpsc_tx.send(event).await;
                }
            }
        });

        self.attachment = Some(Attachment {
            room_id: String::from(room_id),
            user_id,
            room,
            abort_handle,
        });

        Ok(())
    }
}
