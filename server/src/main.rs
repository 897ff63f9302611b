use std::sync::Arc;

use anyhow::Context;
use tokio::{
    net::TcpListener,
    signal::unix::{signal, SignalKind},
    sync::broadcast,
    task::JoinSet,
};
use tracing::{info, warn};

use crate::room::RoomRegistry;

mod room;
mod session;

const PORT: u16 = 8080;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let registry = Arc::new(RoomRegistry::new());
    let mut join_set: JoinSet<anyhow::Result<()>> = JoinSet::new();

    let mut interrupt =
        signal(SignalKind::interrupt()).expect("failed to create interrupt signal stream");
    let server = TcpListener::bind(format!("0.0.0.0:{}", PORT))
        .await
        .expect("could not bind to the port");
    let (quit_tx, quit_rx) = broadcast::channel::<()>(1);

    info!(port = PORT, "listening");
    loop {
        tokio::select! {
            _ = interrupt.recv() => {
                info!("server interrupted, gracefully shutting down");
                quit_tx.send(()).context("failed to send quit signal").unwrap();
                break;
            }
            Ok((socket, _)) = server.accept() => {
                join_set.spawn(session::handle_user_session(
                    Arc::clone(&registry),
                    quit_rx.resubscribe(),
                    socket,
                ));
            }
        }
    }

    while let Some(result) = join_set.join_next().await {
        if let Ok(Err(err)) = result {
            warn!(%err, "session ended with an error");
        }
    }
    info!("server shut down");
}
