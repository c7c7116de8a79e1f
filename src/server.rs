use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::relay::Relay;

/// How long a closing connection may spend flushing queued frames.
const WRITER_GRACE: Duration = Duration::from_secs(1);

/// WebSocket front of the relay: one task per accepted socket.
pub struct RelayServer {
    listener: TcpListener,
    relay: Relay,
    config: RelayConfig,
}

impl RelayServer {
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        info!(
            "signaling relay listening on {} (path {})",
            listener.local_addr()?,
            config.path
        );
        Ok(Self {
            listener,
            relay: Relay::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn relay(&self) -> Relay {
        self.relay.clone()
    }

    /// Accepts connections until `shutdown` resolves, then closes every open socket
    /// and waits for each one to leave its room.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let stats_task = self
            .config
            .stats_interval
            .map(|period| tokio::spawn(log_stats(self.relay.clone(), period)));

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let relay = self.relay.clone();
                        let config = self.config.clone();
                        let stop = stop_rx.clone();
                        connections.spawn(async move {
                            if let Err(e) = serve_connection(relay, stream, peer_addr, config, stop).await {
                                debug!("{}: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => error!("failed to accept connection: {}", e),
                },
                // Reap finished tasks so the set does not grow with churn.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        info!(
            "signaling relay shutting down, closing {} connections",
            connections.len()
        );
        let _ = stop_tx.send(true);
        while connections.join_next().await.is_some() {}

        if let Some(task) = stats_task {
            task.abort();
        }
        match serde_json::to_string(&self.relay.stats()) {
            Ok(stats) => info!("final stats: {}", stats),
            Err(e) => warn!("could not encode stats: {}", e),
        }
        Ok(())
    }
}

/// Rejects handshakes for any path other than the relay endpoint.
fn endpoint_guard(
    path: String,
) -> impl FnOnce(&Request, Response) -> std::result::Result<Response, ErrorResponse> {
    move |request: &Request, response: Response| {
        if request.uri().path() == path {
            return Ok(response);
        }
        let mut rejection =
            ErrorResponse::new(Some(format!("no relay at {}", request.uri().path())));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    }
}

async fn serve_connection(
    relay: Relay,
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: RelayConfig,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    let ws_stream = tokio::select! {
        handshake = accept_hdr_async(stream, endpoint_guard(config.path)) => handshake?,
        _ = stopped(&mut stop) => return Ok(()),
    };
    let (mut write, mut read) = ws_stream.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(config.outbound_queue);
    let mut conn = relay.on_connect(outbound_tx).await;
    debug!("{} accepted from {}", conn.id(), peer_addr);

    // Drain forwarded messages into the socket, then close it once every sender is gone.
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if write.send(msg).await.is_err() {
                return;
            }
        }
        let _ = write.close().await;
    });

    let mut result = Ok(());
    loop {
        let frame = tokio::select! {
            frame = read.next() => frame,
            _ = stopped(&mut stop) => {
                debug!("{} closed by shutdown", conn.id());
                break;
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                relay.on_message(&mut conn, &text).await;
            }
            Some(Ok(Message::Binary(bytes))) => {
                relay.on_bytes(&mut conn, bytes).await;
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                result = Err(e.into());
                break;
            }
        }
    }

    relay.on_close(&mut conn).await;
    drop(conn);
    if timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    result
}

/// Resolves once shutdown has been signalled, including before this call.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            // Sender gone without signalling: nothing will ever stop us.
            std::future::pending::<()>().await;
        }
    }
}

async fn log_stats(relay: Relay, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let snapshot = relay.stats();
        info!(
            "relay stats: live={} rooms={} relayed={} deliveries={} skipped={} malformed={} unknown_room={}",
            relay.live_connections().await,
            relay.room_count().await,
            snapshot.relayed,
            snapshot.deliveries,
            snapshot.skipped,
            snapshot.malformed,
            snapshot.unknown_room,
        );
    }
}
