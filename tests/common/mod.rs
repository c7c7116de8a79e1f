#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use log::info;
use log::LevelFilter::Debug;
use signaling_relay::{Relay, RelayConfig, RelayServer};
use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const SILENCE: Duration = Duration::from_millis(200);
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub fn setup() {
    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                chrono::Local::now().format("%H:%M:%S.%6f"),
                record.args()
            )
        })
        .filter(None, Debug)
        .is_test(true)
        .try_init();

    info!("common setup");
}

pub struct TestRelay {
    pub addr: SocketAddr,
    pub relay: Relay,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<signaling_relay::Result<()>>,
}

impl TestRelay {
    pub async fn start() -> Self {
        setup();
        let config = RelayConfig::default().with_listen_addr("127.0.0.1:0".parse().unwrap());
        let server = RelayServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let relay = server.relay();

        let (stop, stopped) = oneshot::channel();
        let handle = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));

        Self {
            addr,
            relay,
            stop: Some(stop),
            handle,
        }
    }

    pub async fn client(&self) -> Client {
        self.client_at("/").await.unwrap()
    }

    pub async fn client_at(
        &self,
        path: &str,
    ) -> Result<Client, tokio_tungstenite::tungstenite::Error> {
        let url = format!("ws://{}{}", self.addr, path);
        let (ws, _) = connect_async(url.as_str()).await?;
        Ok(ws)
    }

    /// Polls until `meeting_id` has exactly `count` members (0 meaning no room).
    pub async fn wait_for_members(&self, meeting_id: &str, count: usize) {
        let deadline = Instant::now() + RECV_TIMEOUT;
        loop {
            let members = self.relay.room_members(meeting_id).await.map_or(0, |m| m.len());
            if members == count {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "room {meeting_id} has {members} members, expected {count}"
            );
            sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

pub fn join_frame(meeting_id: &str, from: &str) -> String {
    format!(r#"{{"type":"join","meetingId":"{meeting_id}","from":"{from}"}}"#)
}

pub async fn send(client: &mut Client, text: &str) {
    client.send(Message::Text(text.to_string())).await.unwrap();
}

/// Next text frame, failing the test if none arrives in time.
pub async fn recv(client: &mut Client) -> String {
    loop {
        let frame = timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

/// Next frame of any kind, `None` once the stream has ended.
pub async fn next_frame(
    client: &mut Client,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    timeout(RECV_TIMEOUT, client.next())
        .await
        .expect("timed out waiting for a frame")
}

/// True if nothing arrives for `SILENCE`.
pub async fn is_silent(client: &mut Client) -> bool {
    timeout(SILENCE, client.next()).await.is_err()
}
