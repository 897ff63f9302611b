use std::sync::Arc;

use comms::transport;
use nanoid::nanoid;
use tokio::{net::TcpStream, sync::broadcast};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::room::RoomRegistry;

use self::room_session::RoomSession;

mod room_session;

/// Given a tcp stream and the room registry, handles the client session until
/// the stream is closed or the server shuts down
pub async fn handle_user_session(
    registry: Arc<RoomRegistry>,
    mut quit_rx: broadcast::Receiver<()>,
    stream: TcpStream,
) -> anyhow::Result<()> {
    let session_id = nanoid!();
    // Split the tcp stream into a command stream and an event writer with better ergonomics
    let (mut commands, mut event_writer) = transport::server::split_tcp_stream(stream);
    let mut room_session = RoomSession::new(&session_id, registry);

    debug!(session_id = %session_id, "session started");

    loop {
        tokio::select! {
            cmd = commands.next() => match cmd {
                // The client disconnected, other participants must learn about the departure
                None => {
                    room_session.leave().await;
                    break;
                }
                Some(Ok(cmd)) => {
                    room_session.handle_command(cmd).await?;
                }
                // a malformed line is logged and skipped, the connection stays up
                Some(Err(err)) => {
                    warn!(session_id = %session_id, %err, "dropping malformed command");
                }
            },
            // Replies and forwarded room broadcasts are written back to the client
            Ok(event) = room_session.recv() => {
                event_writer.write(&event).await?;
            }
            // If the server is shutting down we can just close the tcp stream,
            // there is nobody left to notify about the departure
            Ok(_) = quit_rx.recv() => {
                drop(event_writer);
                debug!(session_id = %session_id, "gracefully shutting down session tcp stream");
                break;
            }
        }
    }

    Ok(())
}
