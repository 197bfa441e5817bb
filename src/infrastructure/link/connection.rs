//! Serial Bridge Connection
//!
//! Connects to a TCP serial bridge (a Bluetooth serial module exposed over a
//! socket) and pumps text between it and the link service.

use crate::domain::models::LinkCommand;
use crate::infrastructure::link::transport::{LinkRequest, TransportEvent};
use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Configuration for connection behavior
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// host:port of the bridge
    pub address: String,
    /// Maximum connection attempts
    pub max_connect_retries: u32,
    /// Delay between attempts in milliseconds
    pub connect_retry_delay_ms: u64,
}

/// Reader and writer tasks of an established connection
pub struct ConnectionTasks {
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

impl ConnectionTasks {
    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// TCP serial bridge connection handler
pub struct BridgeConnection {
    event_sender: mpsc::UnboundedSender<LinkCommand>,
    config: ConnectionConfig,
}

impl BridgeConnection {
    /// Create a new connection handler
    pub fn new(event_sender: mpsc::UnboundedSender<LinkCommand>, config: ConnectionConfig) -> Self {
        Self {
            event_sender,
            config,
        }
    }

    /// Connect and start pumping.
    ///
    /// `requests` is the receiving end of the session's
    /// [`ChannelLink`](crate::infrastructure::link::transport::ChannelLink).
    pub async fn connect(
        &self,
        requests: mpsc::UnboundedReceiver<LinkRequest>,
    ) -> Result<ConnectionTasks> {
        let stream = self.connect_with_retry().await?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Could not disable Nagle on bridge socket: {}", e);
        }
        let (read_half, write_half) = stream.into_split();

        self.send_event(TransportEvent::Connected);

        let reader = tokio::spawn(read_loop(read_half, self.event_sender.clone()));
        let writer = tokio::spawn(write_loop(write_half, requests));
        Ok(ConnectionTasks { reader, writer })
    }

    async fn connect_with_retry(&self) -> Result<TcpStream> {
        let attempts = self.config.max_connect_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            info!(
                "Connecting to serial bridge {} (attempt {}/{})",
                self.config.address, attempt, attempts
            );
            match TcpStream::connect(&self.config.address).await {
                Ok(stream) => {
                    info!("Serial bridge connected");
                    return Ok(stream);
                }
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(tokio::time::Duration::from_millis(
                            self.config.connect_retry_delay_ms,
                        ))
                        .await;
                    }
                }
            }
        }

        error!("Failed to connect after {} attempts", attempts);
        match last_error {
            Some(e) => Err(e).with_context(|| format!("connecting to {}", self.config.address)),
            None => anyhow::bail!("connecting to {}", self.config.address),
        }
    }

    fn send_event(&self, event: TransportEvent) {
        let _ = self.event_sender.send(LinkCommand::Transport(event));
    }
}

async fn read_loop(read_half: OwnedReadHalf, sender: mpsc::UnboundedSender<LinkCommand>) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if sender
                    .send(LinkCommand::Transport(TransportEvent::Received(line)))
                    .is_err()
                {
                    break;
                }
            }
            Ok(None) => {
                info!("Serial bridge closed the connection");
                break;
            }
            Err(e) => {
                warn!("Serial bridge read error: {}", e);
                break;
            }
        }
    }
    let _ = sender.send(LinkCommand::Transport(TransportEvent::Disconnected));
}

async fn write_loop(mut write_half: OwnedWriteHalf, mut requests: mpsc::UnboundedReceiver<LinkRequest>) {
    while let Some(request) = requests.recv().await {
        match request {
            LinkRequest::Write(text) => {
                let line = format!("{}\n", text);
                if let Err(e) = write_half.write_all(line.as_bytes()).await {
                    warn!("Serial bridge write failed: {}", e);
                    break;
                }
            }
            LinkRequest::ReadRssi => debug!("RSSI is not available over a TCP bridge"),
        }
    }
    let _ = write_half.shutdown().await;
}
