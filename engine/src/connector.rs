use async_trait::async_trait;
use comms::{
    command::ClientCommand,
    transport::client::{self, EventStream},
};
use tokio::net::TcpStream;

/// Write half of a connection to the room authority
#[async_trait]
pub trait CommandSink: Send {
    async fn send(&mut self, command: &ClientCommand) -> anyhow::Result<()>;
}

/// Opens a connection to the room authority, yielding the inbound event stream
/// and the outbound command sink.
///
/// Injected into the session loop instead of a shared connection handle, so tests
/// can supply a channel backed fake.
#[async_trait]
pub trait Connector: Send {
    async fn connect(&mut self, addr: &str) -> anyhow::Result<(EventStream, Box<dyn CommandSink>)>;
}

#[async_trait]
impl CommandSink for client::CommandWriter {
    async fn send(&mut self, command: &ClientCommand) -> anyhow::Result<()> {
        self.write(command).await
    }
}

/// Connects to the authority over TCP using the line delimited JSON transport from [comms]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&mut self, addr: &str) -> anyhow::Result<(EventStream, Box<dyn CommandSink>)> {
        let stream = TcpStream::connect(addr).await?;
        let (event_stream, command_writer) = client::split_tcp_stream(stream);

        Ok((event_stream, Box::new(command_writer)))
    }
}
