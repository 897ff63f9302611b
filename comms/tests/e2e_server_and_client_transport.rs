#![cfg(all(feature = "client", feature = "server"))]

use comms::{
    command::{self, ClientCommand},
    event::{self, Event},
    transport,
    types::User,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::StreamExt;

const PORT: usize = 8091;

#[tokio::test]
async fn assert_server_client_transport() {
    let (server_collected_commands, client_collected_events) =
        tokio::join!(execute_server(), execute_client());

    assert!(server_collected_commands.is_ok());
    assert!(client_collected_events.is_ok());

    assert_eq!(
        server_collected_commands.unwrap(),
        vec![
            ClientCommand::JoinRoom(command::JoinRoomCommand {
                room: "room-1".into(),
                user: User::new("user-1", "alice"),
            }),
            ClientCommand::RegisterVote(command::RegisterVoteCommand {
                room: "room-1".into(),
                task_id: "task-1".into(),
                user_id: "user-1".into(),
                vote: Some(8.0),
            }),
        ]
    );

    assert_eq!(
        client_collected_events.unwrap(),
        vec![Event::RoomInfo(event::RoomInfoReplyEvent {
            creator_id: "user-0".into(),
            tasks: Vec::default(),
        })]
    );
}

async fn execute_server() -> anyhow::Result<Vec<ClientCommand>> {
    // bind to the example port to wait for client connection
    let listener = TcpListener::bind(format!("0.0.0.0:{}", PORT))
        .await
        .expect("could not bind to the port");

    // accept the only client connection we will have
    let tcp_stream = match listener.accept().await {
        Ok((tcp_stream, _addr)) => tcp_stream,
        Err(e) => return Err(anyhow::anyhow!("failed to accept client: {}", e)),
    };

    // break the client connection into higher level API for ease of use
    let (mut command_stream, mut event_writer) = transport::server::split_tcp_stream(tcp_stream);
    // store commands received from the client
    let mut collected_commands = Vec::new();

    // welcome the user with the authoritative copy of the room
    event_writer
        .write(&Event::RoomInfo(event::RoomInfoReplyEvent {
            creator_id: "user-0".into(),
            tasks: Vec::default(),
        }))
        .await?;

    // collect the two commands the client side of this test will send
    while let Some(Ok(command)) = command_stream.next().await {
        collected_commands.push(command);

        if collected_commands.len() == 2 {
            break;
        }
    }

    Ok(collected_commands)
}

async fn execute_client() -> anyhow::Result<Vec<Event>> {
    // let the server bind first
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let tcp_stream = TcpStream::connect(format!("127.0.0.1:{}", PORT)).await?;
    let (mut event_stream, mut command_writer) = transport::client::split_tcp_stream(tcp_stream);
    let mut collected_events = Vec::new();

    command_writer
        .write(&ClientCommand::JoinRoom(command::JoinRoomCommand {
            room: "room-1".into(),
            user: User::new("user-1", "alice"),
        }))
        .await?;

    command_writer
        .write(&ClientCommand::RegisterVote(command::RegisterVoteCommand {
            room: "room-1".into(),
            task_id: "task-1".into(),
            user_id: "user-1".into(),
            vote: Some(8.0),
        }))
        .await?;

    // collect the single welcome event sent by the server side of this test
    while let Some(Ok(event)) = event_stream.next().await {
        collected_events.push(event);

        if collected_events.len() == 1 {
            break;
        }
    }

    Ok(collected_events)
}
