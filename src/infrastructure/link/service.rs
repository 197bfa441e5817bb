//! Link Service Module
//!
//! Owns the launch panel (and through it the session) on a single task.
//! User commands and transport events arrive as [`LinkCommand`]s and are
//! applied strictly one at a time, interleaved with the session's own timer
//! work.

use crate::domain::models::{
    LinkCommand, MessageSeverity, SessionEvent, SessionState, StatusMessage,
};
use crate::domain::panel::LaunchPanel;
use crate::infrastructure::link::transport::{Link, TransportEvent};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Cloneable front door to a running [`LinkService`]
#[derive(Clone)]
pub struct LinkHandle {
    sender: mpsc::UnboundedSender<LinkCommand>,
    events: broadcast::Sender<SessionEvent>,
}

impl LinkHandle {
    /// Queue a command. Returns false once the service has stopped.
    pub fn send(&self, command: LinkCommand) -> bool {
        self.sender.send(command).is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Sender transport adapters deliver their events through
    pub fn transport_sender(&self) -> mpsc::UnboundedSender<LinkCommand> {
        self.sender.clone()
    }

    pub fn transport_event(&self, event: TransportEvent) -> bool {
        self.send(LinkCommand::Transport(event))
    }

    /// Request a code change; the receiver resolves once the device
    /// acknowledges it.
    pub fn set_code(&self, code: &str) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let callback = Box::new(move || {
            let _ = tx.send(());
        });
        self.send(LinkCommand::SetCode(code.to_string(), callback));
        rx
    }

    pub async fn snapshot(&self) -> Option<SessionState> {
        let (tx, rx) = oneshot::channel();
        if !self.send(LinkCommand::Snapshot(tx)) {
            return None;
        }
        rx.await.ok()
    }

    pub fn shutdown(&self) {
        self.send(LinkCommand::Shutdown);
    }
}

pub struct LinkService<L: Link> {
    panel: LaunchPanel<L>,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
}

impl<L: Link + 'static> LinkService<L> {
    pub fn new(panel: LaunchPanel<L>) -> (Self, LinkHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let handle = LinkHandle {
            sender,
            events: panel.session().events().clone(),
        };
        (Self { panel, commands }, handle)
    }

    /// Run the service on a dedicated thread with its own single-threaded
    /// runtime.
    pub fn spawn_thread(self) -> std::io::Result<std::thread::JoinHandle<()>> {
        std::thread::Builder::new()
            .name("launch-link".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("Failed to create tokio runtime for the link: {}", e);
                        return;
                    }
                };
                rt.block_on(self.run());
            })
    }

    pub async fn run(mut self) {
        info!("Link service started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(LinkCommand::Shutdown) => break,
                    Some(command) => self.dispatch(command),
                },
                Some(task) = self.panel.session_mut().next_scheduled() => {
                    self.panel.session_mut().run_scheduled(task);
                }
            }
        }
        info!("Link service stopped");
    }

    fn dispatch(&mut self, command: LinkCommand) {
        debug!("Link command: {:?}", command);
        match command {
            LinkCommand::Ping => self.panel.ping(),
            LinkCommand::Validate => {
                if let Err(e) = self.panel.validate() {
                    self.report(format!("Validation not sent: {}", e));
                }
            }
            LinkCommand::SetCode(code, callback) => {
                if let Err(e) = self.panel.set_code(&code, callback) {
                    self.report(format!("Set code not sent: {}", e));
                }
            }
            LinkCommand::ArmPressed => self.panel.arm_pressed(),
            LinkCommand::ArmReleased => self.panel.arm_released(),
            LinkCommand::FirePressed => self.panel.fire_pressed(),
            LinkCommand::FireReleased => self.panel.fire_released(),
            LinkCommand::Continuity(enable) => self.panel.continuity(enable),
            LinkCommand::StopRecording => self.panel.stop_recording(),
            LinkCommand::Transport(event) => self.panel.transport_event(event),
            LinkCommand::Snapshot(reply) => {
                let _ = reply.send(self.panel.session().state().clone());
            }
            LinkCommand::Shutdown => {}
        }
    }

    fn report(&self, message: String) {
        warn!("{}", message);
        let _ = self
            .panel
            .session()
            .events()
            .send(SessionEvent::LogMessage(StatusMessage {
                message,
                severity: MessageSeverity::Warning,
            }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::PanelOptions;
    use crate::domain::session::{Session, SessionConfig};
    use crate::infrastructure::link::transport::testing::RecordingLink;
    use std::time::Duration;

    fn start(loopback: bool) -> (LinkHandle, RecordingLink, tokio::task::JoinHandle<()>) {
        let link = RecordingLink::new();
        let config = SessionConfig {
            validation_code: "9876".into(),
            loopback,
            ..Default::default()
        };
        let panel = LaunchPanel::new(Session::new(config, link.clone()), PanelOptions::default());
        let (service, handle) = LinkService::new(panel);
        let task = tokio::spawn(service.run());
        (handle, link, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_reach_the_session() {
        let (handle, link, task) = start(false);
        handle.transport_event(TransportEvent::Connected);
        handle.transport_event(TransportEvent::Received("~VALIDATE|98".into()));
        handle.transport_event(TransportEvent::Received("76~".into()));
        handle.send(LinkCommand::Ping);

        let state = handle.snapshot().await.unwrap();
        assert!(state.connected);
        assert!(state.validated);
        assert_eq!(link.sent(), vec!["~PING~"]);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loopback_validation_through_service() {
        let (handle, link, task) = start(true);
        handle.send(LinkCommand::Validate);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let state = handle.snapshot().await.unwrap();
        assert!(state.validated);
        assert_eq!(link.sent(), vec!["~VALIDATE|9876~"]);

        let ack = handle.set_code("2468");
        ack.await.unwrap();

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rssi_polled_by_service() {
        let (handle, link, task) = start(false);
        handle.transport_event(TransportEvent::Connected);
        tokio::time::sleep(Duration::from_millis(4100)).await;
        handle.snapshot().await.unwrap();
        assert_eq!(link.rssi_requests(), 2);

        handle.transport_event(TransportEvent::Disconnected);
        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.snapshot().await.unwrap();
        assert_eq!(link.rssi_requests(), 2);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_misuse_reported_as_log_message() {
        let (handle, _link, task) = start(true);
        let mut rx = handle.subscribe();
        handle.send(LinkCommand::Validate);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        handle.set_code("12|34");
        handle.snapshot().await.unwrap();

        let mut warned = false;
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::LogMessage(msg) = event {
                warned |= msg.severity == MessageSeverity::Warning;
            }
        }
        assert!(warned);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_service() {
        let (handle, _link, task) = start(false);
        drop(handle);
        task.await.unwrap();
    }
}
