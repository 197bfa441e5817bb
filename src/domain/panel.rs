//! Launch panel control flow
//!
//! What the launch screen does when its buttons are pressed, minus the
//! rendering: it drives the session, the countdown and the recording trigger.

use crate::domain::countdown::Countdown;
use crate::domain::models::{SessionEvent, SetCodeCallback};
use crate::domain::session::{Session, SessionError};
use crate::domain::settings::Settings;
use crate::infrastructure::link::transport::{Link, TransportEvent};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PanelOptions {
    pub auto_record: bool,
    pub auto_countdown: bool,
    pub countdown_from: u32,
    pub countdown_period: Duration,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for PanelOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            auto_record: settings.auto_record,
            auto_countdown: settings.auto_countdown,
            countdown_from: settings.countdown_from,
            countdown_period: settings.countdown_period(),
        }
    }
}

pub struct LaunchPanel<L: Link> {
    session: Session<L>,
    countdown: Countdown,
    options: PanelOptions,
    recording: bool,
}

impl<L: Link> LaunchPanel<L> {
    pub fn new(session: Session<L>, options: PanelOptions) -> Self {
        let countdown = Countdown::new(session.events().clone());
        Self {
            session,
            countdown,
            options,
            recording: false,
        }
    }

    pub fn session(&self) -> &Session<L> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<L> {
        &mut self.session
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Arm button pressed: arm, start recording and the countdown
    pub fn arm_pressed(&mut self) {
        let state = self.session.state();
        if !(state.connected && state.validated) {
            debug!("Arm button ignored: not connected and validated");
            return;
        }

        self.session.set_armed(true);
        self.set_recording(true);
        if self.options.auto_countdown {
            self.countdown
                .start(self.options.countdown_from, self.options.countdown_period);
        }
    }

    /// Arm button released or cancelled
    pub fn arm_released(&mut self) {
        self.session.set_armed(false);
        self.countdown.stop();
    }

    pub fn fire_pressed(&mut self) {
        self.session.set_fire(true);
        self.countdown.stop();
    }

    pub fn fire_released(&mut self) {
        self.session.set_fire(false);
    }

    pub fn stop_recording(&mut self) {
        self.set_recording(false);
    }

    pub fn continuity(&mut self, enable: bool) {
        self.session.set_continuity(enable);
    }

    pub fn validate(&mut self) -> Result<(), SessionError> {
        self.session.validate()
    }

    pub fn ping(&mut self) {
        self.session.ping();
    }

    pub fn set_code(&mut self, code: &str, callback: SetCodeCallback) -> Result<(), SessionError> {
        self.session.request_set_code(code, callback)
    }

    pub fn transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.session.on_connected(),
            TransportEvent::Disconnected => {
                self.session.on_disconnected();
                self.countdown.stop();
            }
            TransportEvent::Received(chunk) => self.session.handle_chunk(&chunk),
            TransportEvent::Rssi(rssi) => self.session.on_rssi_update(rssi),
        }
    }

    fn set_recording(&mut self, recording: bool) {
        if !self.options.auto_record || self.recording == recording {
            return;
        }
        self.recording = recording;
        let _ = self
            .session
            .events()
            .send(SessionEvent::RecordingRequested(recording));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionConfig;
    use crate::infrastructure::link::transport::testing::RecordingLink;
    use tokio::sync::broadcast;

    fn panel(options: PanelOptions) -> (LaunchPanel<RecordingLink>, RecordingLink) {
        let link = RecordingLink::new();
        let config = SessionConfig {
            validation_code: "9876".into(),
            ..Default::default()
        };
        let session = Session::new(config, link.clone());
        (LaunchPanel::new(session, options), link)
    }

    fn ready(panel: &mut LaunchPanel<RecordingLink>, link: &RecordingLink) {
        panel.transport_event(TransportEvent::Connected);
        panel.transport_event(TransportEvent::Received("~VALIDATE|9876~".into()));
        link.clear();
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_button_needs_connection_and_validation() {
        let (mut panel, link) = panel(PanelOptions::default());
        panel.arm_pressed();
        assert!(!panel.session().state().armed);

        panel.transport_event(TransportEvent::Connected);
        panel.arm_pressed();
        assert!(!panel.session().state().armed);
        assert!(link.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_fire_sequence() {
        let (mut panel, link) = panel(PanelOptions::default());
        ready(&mut panel, &link);
        let mut rx = panel.session().subscribe();

        panel.arm_pressed();
        assert!(panel.is_recording());
        panel.fire_pressed();
        panel.fire_released();
        panel.arm_released();

        assert_eq!(
            link.sent(),
            vec!["~ARM_ON~", "~FIRE_ON~", "~FIRE_OFF~", "~ARM_OFF~"]
        );
        let events = drain(&mut rx);
        assert!(events.contains(&SessionEvent::RecordingRequested(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_runs_until_fire() {
        let (mut panel, link) = panel(PanelOptions::default());
        ready(&mut panel, &link);
        let mut rx = panel.session().subscribe();

        panel.arm_pressed();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        panel.fire_pressed();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let ticks: Vec<u32> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::CountdownTick(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![5, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_flags_disabled() {
        let options = PanelOptions {
            auto_record: false,
            auto_countdown: false,
            ..Default::default()
        };
        let (mut panel, link) = panel(options);
        ready(&mut panel, &link);
        let mut rx = panel.session().subscribe();

        panel.arm_pressed();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!panel.is_recording());
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .all(|e| !matches!(e, SessionEvent::CountdownTick(_) | SessionEvent::RecordingRequested(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_recording_once() {
        let (mut panel, link) = panel(PanelOptions::default());
        ready(&mut panel, &link);
        let mut rx = panel.session().subscribe();

        panel.arm_pressed();
        panel.stop_recording();
        panel.stop_recording();
        let recording: Vec<SessionEvent> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::RecordingRequested(_)))
            .collect();
        assert_eq!(
            recording,
            vec![
                SessionEvent::RecordingRequested(true),
                SessionEvent::RecordingRequested(false)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_stops_countdown() {
        let (mut panel, link) = panel(PanelOptions::default());
        ready(&mut panel, &link);
        panel.arm_pressed();
        panel.transport_event(TransportEvent::Disconnected);
        assert!(!panel.session().state().validated);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!panel.countdown.is_running());
    }
}
