use std::{pin::Pin, time::Duration};

use anyhow::Context;
use comms::{
    command::{self, ClientCommand},
    types::{TaskStatus, User},
};
use nanoid::nanoid;
use tokio::{
    sync::{
        broadcast,
        mpsc::{self, UnboundedReceiver, UnboundedSender},
    },
    time::{sleep, Sleep},
};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::{
    connector::{CommandSink, Connector},
    join::{ExistenceProbe, JoinCoordinator, ProbeStatus},
    navigator::{self, Advance},
    sync::{EventSynchronizer, SyncEffect},
    Interrupted, Terminator,
};

use super::{action::Action, RoomLifecycle, SessionState};

/// How long the existence probe waits for a reply before treating the room as missing
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Fixed delay before handing control back to the external navigator, once the
/// session completed or the room turned out not to exist
const REDIRECT_DELAY: Duration = Duration::from_secs(8);

type ServerHandle = (
    comms::transport::client::EventStream,
    Box<dyn CommandSink>,
);

/// Owns the [SessionState] and runs the run-to-completion event loop around it.
///
/// Every inbound event and every local action is handled to completion before
/// the next one is processed, which is what keeps the store's unsynchronized
/// mutations safe without locks. State snapshots are published after each pass
/// for any presentation collaborator to consume.
pub struct StateStore {
    state_tx: UnboundedSender<SessionState>,
}

impl StateStore {
    pub fn new() -> (Self, UnboundedReceiver<SessionState>) {
        let (state_tx, state_rx) = mpsc::unbounded_channel::<SessionState>();

        (StateStore { state_tx }, state_rx)
    }
}

async fn send_join_if_ready(
    join: &mut JoinCoordinator,
    probe: &ExistenceProbe,
    state: &SessionState,
    command_writer: &mut dyn CommandSink,
) -> anyhow::Result<()> {
    // the probe gates the whole handshake, a creator never probes and never joins
    if probe.status() != ProbeStatus::Exists {
        return Ok(());
    }

    if let Some(cmd) = join.evaluate(true, state.room_id.as_deref(), state.local_user.as_ref()) {
        command_writer
            .send(&cmd)
            .await
            .context("could not join room")?;
    }

    Ok(())
}

impl StateStore {
    pub async fn main_loop<C: Connector>(
        self,
        mut connector: C,
        mut terminator: Terminator,
        mut action_rx: UnboundedReceiver<Action>,
        mut interrupt_rx: broadcast::Receiver<Interrupted>,
    ) -> anyhow::Result<Interrupted> {
        let mut opt_server_handle: Option<ServerHandle> = None;
        let mut state = SessionState::default();
        let synchronizer = EventSynchronizer;
        let mut probe = ExistenceProbe::new();
        let mut join = JoinCoordinator::new();
        // deferred one-shot timers, cancelled implicitly when the loop is torn down
        let mut probe_deadline: Option<Pin<Box<Sleep>>> = None;
        let mut redirect: Option<(Pin<Box<Sleep>>, Interrupted)> = None;

        // the initial state once
        self.state_tx.send(state.clone())?;

        let result = loop {
            if let Some((event_stream, command_writer)) = opt_server_handle.as_mut() {
                tokio::select! {
                    // Handle inbound events from the authority as they come in
                    maybe_event = event_stream.next() => match maybe_event {
                        Some(Ok(event)) => {
                            for effect in synchronizer.apply(&mut state, &event) {
                                match effect {
                                    SyncEffect::Notify(notice) => state.push_notice(notice),
                                    SyncEffect::RoomExists(exists) => {
                                        probe.resolve(exists);
                                        probe_deadline = None;

                                        if exists {
                                            state.lifecycle = RoomLifecycle::Gathering;
                                        } else {
                                            state.lifecycle = RoomLifecycle::NotFound;
                                            redirect = Some((
                                                Box::pin(sleep(REDIRECT_DELAY)),
                                                Interrupted::RoomNotFound,
                                            ));
                                        }
                                    }
                                    SyncEffect::SessionCompleted => {
                                        redirect = Some((
                                            Box::pin(sleep(REDIRECT_DELAY)),
                                            Interrupted::SessionEnded,
                                        ));
                                    }
                                }
                            }

                            send_join_if_ready(&mut join, &probe, &state, command_writer.as_mut())
                                .await?;
                        },
                        // a malformed line is logged and dropped, never fatal
                        Some(Err(err)) => {
                            warn!(%err, "dropping malformed event from the authority");
                        },
                        // authority disconnected, drop the handles and start over clean;
                        // the probe and its timers belong to the dropped connection, only
                        // the join latch survives so the same identity never re-emits its join
                        None => {
                            opt_server_handle = None;
                            state = SessionState::default();
                            probe = ExistenceProbe::new();
                            probe_deadline = None;
                            redirect = None;
                        },
                    },
                    // Handle the actions coming from the presentation collaborator
                    Some(action) = action_rx.recv() => match action {
                        Action::CreateRoom { room_id, display_name, tasks } => {
                            let creator = User::new(&nanoid!(), &display_name);
                            state.create_room(&room_id, creator.clone(), tasks.clone());

                            command_writer
                                .send(&ClientCommand::CreateRoom(command::CreateRoomCommand {
                                    room: room_id,
                                    user: creator,
                                    tasks,
                                }))
                                .await
                                .context("could not create room")?;
                        },
                        Action::ProbeRoom { room_id } => {
                            if let Some(cmd) = probe.begin(&room_id) {
                                state.room_id = Some(room_id);
                                state.lifecycle = RoomLifecycle::Probing;
                                probe_deadline = Some(Box::pin(sleep(PROBE_TIMEOUT)));

                                command_writer
                                    .send(&cmd)
                                    .await
                                    .context("could not probe room existence")?;
                            }
                        },
                        Action::ProvideIdentity { display_name } => {
                            if state.local_user.is_none() {
                                state.local_user = Some(User::new(&nanoid!(), &display_name));
                            }

                            send_join_if_ready(&mut join, &probe, &state, command_writer.as_mut())
                                .await?;
                        },
                        action @ (Action::CastVote { .. } | Action::RetractVote) => {
                            let vote = match action {
                                Action::CastVote { vote } => Some(vote),
                                _ => None,
                            };

                            if let (Some(room), Some(user), Some(task_id)) = (
                                state.room_id.clone(),
                                state.local_user.clone(),
                                state.active_task_id.clone(),
                            ) {
                                // optimistic local apply, the broadcast echo converges to the same state
                                state.register_vote(&task_id, &user.user_id, vote);

                                command_writer
                                    .send(&ClientCommand::RegisterVote(command::RegisterVoteCommand {
                                        room,
                                        task_id,
                                        user_id: user.user_id,
                                        vote,
                                    }))
                                    .await
                                    .context("could not register vote")?;
                            }
                        },
                        Action::StartVoting { task_id } => {
                            if let (Some(room), Some(user)) =
                                (state.room_id.clone(), state.local_user.clone())
                            {
                                state.set_task_status(&task_id, TaskStatus::InProgress);
                                state.set_active_task(Some(task_id.clone()));

                                command_writer
                                    .send(&ClientCommand::StartVoting(command::StartVotingCommand {
                                        room,
                                        task_id,
                                        user_id: user.user_id,
                                    }))
                                    .await
                                    .context("could not start voting")?;
                            }
                        },
                        Action::NextTask => {
                            if let (Some(room), Some(user)) =
                                (state.room_id.clone(), state.local_user.clone())
                            {
                                match navigator::advance(&mut state) {
                                    Advance::Moved { task_id, previous_task_id } => {
                                        command_writer
                                            .send(&ClientCommand::ChangeTask(command::ChangeTaskCommand {
                                                room,
                                                task_id,
                                                previous_task_id,
                                                user_id: user.user_id,
                                            }))
                                            .await
                                            .context("could not change task")?;
                                    }
                                    Advance::NoFurtherItems => {
                                        debug!("no further tasks to advance to");
                                    }
                                }
                            }
                        },
                        Action::FinishSession => {
                            if navigator::all_tasks_finished(&state) {
                                if let Some(room) = state.room_id.clone() {
                                    command_writer
                                        .send(&ClientCommand::FinishVoting(command::FinishVotingCommand {
                                            room,
                                        }))
                                        .await
                                        .context("could not finish voting")?;
                                }
                            } else {
                                warn!("finish requested while tasks are still open");
                            }
                        },
                        Action::Exit => {
                            let _ = terminator.terminate(Interrupted::UserInt);

                            break Interrupted::UserInt;
                        },
                        Action::ConnectToServerRequest { .. } => {
                            debug!("already connected, ignoring connection request");
                        },
                    },
                    // The probe ran out of time without any reply, the room id is bad
                    _ = async { probe_deadline.as_mut().unwrap().await }, if probe_deadline.is_some() => {
                        probe.expire();
                        probe_deadline = None;
                        state.lifecycle = RoomLifecycle::NotFound;
                        redirect = Some((
                            Box::pin(sleep(REDIRECT_DELAY)),
                            Interrupted::RoomNotFound,
                        ));
                    },
                    // The fixed redirect delay elapsed, hand control to the external navigator
                    _ = async { redirect.as_mut().map(|(timer, _)| timer).unwrap().await }, if redirect.is_some() => {
                        let (_, reason) = redirect.take().unwrap();
                        let _ = terminator.terminate(reason);

                        break reason;
                    },
                    // Catch and handle interrupt signal to gracefully shutdown
                    Ok(interrupted) = interrupt_rx.recv() => {
                        break interrupted;
                    }
                }
            } else {
                tokio::select! {
                    Some(action) = action_rx.recv() => match action {
                        Action::ConnectToServerRequest { addr } => {
                            state.mark_connection_request_start();
                            // emit state to re-render anything depending on the connection status
                            self.state_tx.send(state.clone())?;

                            match connector.connect(&addr).await {
                                Ok(server_handle) => {
                                    // set the server handle and change status for further processing
                                    let _ = opt_server_handle.insert(server_handle);
                                    state.process_connection_request_result(Ok(addr));
                                },
                                Err(err) => {
                                    state.process_connection_request_result(Err(err));
                                }
                            }
                        },
                        Action::Exit => {
                            let _ = terminator.terminate(Interrupted::UserInt);

                            break Interrupted::UserInt;
                        },
                        _ => (),
                    },
                    // Catch and handle interrupt signal to gracefully shutdown
                    Ok(interrupted) = interrupt_rx.recv() => {
                        break interrupted;
                    }
                }
            }

            self.state_tx.send(state.clone())?;
        };

        Ok(result)
    }
}
