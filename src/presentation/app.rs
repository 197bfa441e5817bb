use crate::domain::models::{LinkCommand, SessionEvent};
use crate::domain::panel::{LaunchPanel, PanelOptions};
use crate::domain::session::Session;
use crate::domain::settings::SettingsService;
use crate::infrastructure::link::connection::{BridgeConnection, ConnectionConfig, ConnectionTasks};
use crate::infrastructure::link::service::{LinkHandle, LinkService};
use crate::infrastructure::link::transport::{ChannelLink, LinkRequest, TransportEvent};
use crate::presentation::console::{self, Input};
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// How the controller reaches the launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMode {
    /// TCP serial bridge at host:port
    Bridge(String),
    /// No hardware: outbound frames are echoed back locally
    Loopback,
}

pub struct LaunchApp {
    handle: LinkHandle,
    service_thread: Option<std::thread::JoinHandle<()>>,
    connection: Option<ConnectionTasks>,
}

impl LaunchApp {
    pub async fn start(settings: SettingsService, mode: LinkMode) -> Result<Self> {
        let settings = Arc::new(Mutex::new(settings));
        let (mut config, options, connect) = {
            let guard = settings
                .lock()
                .map_err(|_| anyhow::anyhow!("Lock error"))?;
            let s = guard.get();
            (
                s.session_config().context("invalid link settings")?,
                PanelOptions::from(s),
                ConnectionConfig {
                    address: String::new(),
                    max_connect_retries: s.link.max_connect_retries,
                    connect_retry_delay_ms: s.link.connect_retry_delay_ms,
                },
            )
        };

        let (link, requests) = ChannelLink::pair();
        if mode == LinkMode::Loopback {
            config.loopback = true;
        }

        let panel = LaunchPanel::new(Session::new(config, link), options);
        let (service, handle) = LinkService::new(panel);
        let events = handle.subscribe();
        let service_thread = service
            .spawn_thread()
            .context("spawning link service thread")?;

        tokio::spawn(print_events(events, settings));

        let connection = match mode {
            LinkMode::Bridge(address) => {
                let config = ConnectionConfig { address, ..connect };
                let bridge = BridgeConnection::new(handle.transport_sender(), config);
                match bridge.connect(requests).await {
                    Ok(tasks) => Some(tasks),
                    Err(e) => {
                        handle.shutdown();
                        let _ = tokio::task::spawn_blocking(move || service_thread.join()).await;
                        return Err(e);
                    }
                }
            }
            LinkMode::Loopback => {
                info!("Loopback mode: no device attached");
                tokio::spawn(discard_requests(requests));
                handle.transport_event(TransportEvent::Connected);
                None
            }
        };

        Ok(Self {
            handle,
            service_thread: Some(service_thread),
            connection,
        })
    }

    pub fn handle(&self) -> &LinkHandle {
        &self.handle
    }

    /// Read operator commands from stdin until `quit` or end of input
    pub async fn run_console(&mut self) -> Result<()> {
        println!("{}", console::HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Input>() {
                Ok(Input::Quit) => break,
                Ok(input) => self.apply(input).await,
                Err(e) => println!("{}", e),
            }
        }
        Ok(())
    }

    async fn apply(&self, input: Input) {
        let command = match input {
            Input::Ping => LinkCommand::Ping,
            Input::Validate => LinkCommand::Validate,
            Input::SetCode(code) => {
                let ack = self.handle.set_code(&code);
                tokio::spawn(async move {
                    if ack.await.is_ok() {
                        println!("Code {} accepted by device", code);
                    }
                });
                return;
            }
            Input::Arm => LinkCommand::ArmPressed,
            Input::Disarm => LinkCommand::ArmReleased,
            Input::Fire => LinkCommand::FirePressed,
            Input::Release => LinkCommand::FireReleased,
            Input::Continuity(on) => LinkCommand::Continuity(on),
            Input::Stop => LinkCommand::StopRecording,
            Input::Status => {
                match self.handle.snapshot().await {
                    Some(state) => println!("{}", console::status(&state)),
                    None => println!("link service is not running"),
                }
                return;
            }
            Input::Help => {
                println!("{}", console::HELP);
                return;
            }
            Input::Quit => return,
        };
        if !self.handle.send(command) {
            warn!("Link service is not running");
        }
    }

    pub async fn shutdown(mut self) {
        self.handle.shutdown();
        if let Some(connection) = self.connection.take() {
            connection.abort();
        }
        if let Some(thread) = self.service_thread.take() {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => {}
                _ => error!("Link service thread panicked"),
            }
        }
    }
}

async fn print_events(
    mut events: broadcast::Receiver<SessionEvent>,
    settings: Arc<Mutex<SettingsService>>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let SessionEvent::ValidationCodeChanged(code) = &event {
                    match settings.lock() {
                        Ok(mut s) => {
                            if let Err(e) = s.update_validation_code(code) {
                                warn!("Could not persist validation code: {}", e);
                            }
                        }
                        Err(_) => error!("Settings lock poisoned"),
                    }
                }
                println!("{}", console::describe(&event));
            }
            Err(broadcast::error::RecvError::Lagged(n)) => debug!("Console missed {} events", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn discard_requests(mut requests: mpsc::UnboundedReceiver<LinkRequest>) {
    while let Some(request) = requests.recv().await {
        debug!("Loopback link dropped {:?}", request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::StateChange;
    use std::time::Duration;
    use tokio::time::timeout;

    fn loopback_settings(dir: &tempfile::TempDir) -> SettingsService {
        let mut settings = SettingsService::with_path(dir.path().join("settings.json"));
        settings.get_mut().link.loopback_delay_ms = 10;
        settings
    }

    async fn wait_for(
        events: &mut broadcast::Receiver<SessionEvent>,
        matches: impl Fn(&SessionEvent) -> bool,
    ) -> bool {
        let wait = async {
            while let Ok(event) = events.recv().await {
                if matches(&event) {
                    return true;
                }
            }
            false
        };
        timeout(Duration::from_secs(5), wait).await.unwrap_or(false)
    }

    #[tokio::test]
    async fn test_loopback_session_validates_and_arms() {
        let dir = tempfile::tempdir().unwrap();
        let app = LaunchApp::start(loopback_settings(&dir), LinkMode::Loopback)
            .await
            .unwrap();
        let mut events = app.handle().subscribe();

        app.apply(Input::Validate).await;
        assert!(
            wait_for(&mut events, |e| matches!(
                e,
                SessionEvent::Changed(StateChange::Validated(c)) if c.new
            ))
            .await
        );

        app.apply(Input::Arm).await;
        assert!(
            wait_for(&mut events, |e| matches!(
                e,
                SessionEvent::Changed(StateChange::Armed(c)) if c.new
            ))
            .await
        );

        let state = app.handle().snapshot().await.unwrap();
        assert!(state.connected);
        assert!(state.armed);

        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_acknowledged_code_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let app = LaunchApp::start(loopback_settings(&dir), LinkMode::Loopback)
            .await
            .unwrap();
        let mut events = app.handle().subscribe();

        app.apply(Input::Validate).await;
        assert!(
            wait_for(&mut events, |e| matches!(
                e,
                SessionEvent::Changed(StateChange::Validated(c)) if c.new
            ))
            .await
        );

        let ack = app.handle().set_code("4321");
        timeout(Duration::from_secs(5), ack).await.unwrap().unwrap();

        let mut persisted = false;
        for _ in 0..50 {
            if SettingsService::with_path(path.clone()).get().validation_code == "4321" {
                persisted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(persisted);

        app.shutdown().await;
    }
}
