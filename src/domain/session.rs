//! Launcher Session
//!
//! Connection, validation, arming and continuity state for one controller
//! paired with one launcher.
//!
//! The session is owned by a single task. Transport events and user commands
//! are applied one at a time; timer work (loopback echoes, signal polling)
//! runs in spawned tasks that post back into the session's own queue, and is
//! both aborted and fenced off by a connection epoch when the link drops.

use crate::domain::models::{
    update, SessionEvent, SessionState, SetCodeCallback, StateChange,
};
use crate::infrastructure::link::codec::{DecodeMode, Frame, FrameCodec, FrameDecoder};
use crate::infrastructure::link::error::ProtocolError;
use crate::infrastructure::link::protocol::{Command, DEFAULT_VALIDATION_CODE};
use crate::infrastructure::link::transport::Link;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the session event broadcast channel
pub const EVENT_CAPACITY: usize = 64;

/// Delay before an outbound frame is echoed back in loopback testing
pub const LOOPBACK_DELAY_MS: u64 = 1000;

/// Signal strength polling period while connected
pub const RSSI_POLL_INTERVAL_MS: u64 = 2000;

/// What `set_armed` does to the stored flag while unvalidated.
///
/// The arm frame itself is never sent without validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmPolicy {
    /// The flag follows the request even though the frame is suppressed.
    #[default]
    Legacy,
    /// The flag is left untouched.
    Strict,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Code the device must echo back for the session to become validated
    pub validation_code: String,
    pub codec: FrameCodec,
    pub decode_mode: DecodeMode,
    /// Feed outbound frames back into the inbound handler
    pub loopback: bool,
    pub loopback_delay: Duration,
    pub rssi_poll_interval: Duration,
    pub arm_policy: ArmPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validation_code: DEFAULT_VALIDATION_CODE.to_string(),
            codec: FrameCodec::default(),
            decode_mode: DecodeMode::default(),
            loopback: false,
            loopback_delay: Duration::from_millis(LOOPBACK_DELAY_MS),
            rssi_poll_interval: Duration::from_millis(RSSI_POLL_INTERVAL_MS),
            arm_policy: ArmPolicy::default(),
        }
    }
}

/// Work posted back to the session by its timer tasks
#[derive(Debug, Clone, PartialEq)]
pub enum Scheduled {
    Echo { epoch: u64, text: String },
    PollRssi { epoch: u64 },
}

impl Scheduled {
    fn epoch(&self) -> u64 {
        match self {
            Self::Echo { epoch, .. } | Self::PollRssi { epoch } => *epoch,
        }
    }
}

struct PendingSetCode {
    code: String,
    callback: SetCodeCallback,
}

pub struct Session<L: Link> {
    config: SessionConfig,
    link: L,
    decoder: FrameDecoder,
    state: SessionState,
    pending_set_code: Option<PendingSetCode>,
    events: broadcast::Sender<SessionEvent>,
    scheduled_tx: mpsc::UnboundedSender<Scheduled>,
    scheduled_rx: mpsc::UnboundedReceiver<Scheduled>,
    epoch: u64,
    echoes: Vec<JoinHandle<()>>,
    rssi_poller: Option<JoinHandle<()>>,
}

impl<L: Link> Session<L> {
    pub fn new(config: SessionConfig, link: L) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self::with_events(config, link, events)
    }

    /// Create a session publishing on an existing event channel
    pub fn with_events(
        config: SessionConfig,
        link: L,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (scheduled_tx, scheduled_rx) = mpsc::unbounded_channel();
        Self {
            decoder: FrameDecoder::new(config.codec, config.decode_mode),
            config,
            link,
            state: SessionState::default(),
            pending_set_code: None,
            events,
            scheduled_tx,
            scheduled_rx,
            epoch: 0,
            echoes: Vec::new(),
            rssi_poller: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &broadcast::Sender<SessionEvent> {
        &self.events
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn validation_code(&self) -> &str {
        &self.config.validation_code
    }

    pub fn has_pending_set_code(&self) -> bool {
        self.pending_set_code.is_some()
    }

    // ---- outbound -------------------------------------------------------

    pub fn ping(&mut self) {
        if !self.state.connected {
            debug!("Ping ignored: not connected");
            return;
        }
        self.transmit_plain(Command::Ping);
    }

    /// Send the locally held validation code
    pub fn validate(&mut self) -> Result<(), SessionError> {
        let code = self.config.validation_code.clone();
        self.request_validation(&code)
    }

    /// Send a VALIDATE frame carrying `code`. Re-validation is always allowed.
    pub fn request_validation(&mut self, code: &str) -> Result<(), SessionError> {
        let text = self.transmit(Command::Validate, Some(code))?;
        if self.config.loopback {
            self.schedule_echo(text);
        }
        Ok(())
    }

    /// Ask the device to replace its validation code.
    ///
    /// Ignored while unvalidated. A request made while another is still
    /// pending replaces it; the earlier callback is dropped without running.
    pub fn request_set_code(
        &mut self,
        code: &str,
        callback: SetCodeCallback,
    ) -> Result<(), SessionError> {
        if !self.state.validated {
            debug!("Set code ignored: not validated");
            return Ok(());
        }

        let text = self.config.codec.encode(Command::SetCode, Some(code))?;
        if self.pending_set_code.is_some() {
            debug!("Replacing pending set code request");
        }
        self.pending_set_code = Some(PendingSetCode {
            code: code.to_string(),
            callback,
        });
        self.write(Command::SetCode, &text);

        if self.config.loopback {
            self.schedule_echo(text);
        }
        Ok(())
    }

    pub fn set_armed(&mut self, armed: bool) {
        if !self.state.validated {
            debug!("Arm command suppressed: not validated");
            if self.config.arm_policy == ArmPolicy::Legacy {
                self.set_armed_flag(armed);
            }
            return;
        }

        self.set_armed_flag(armed);
        self.transmit_plain(Command::arm(armed));
    }

    pub fn set_fire(&mut self, enable: bool) {
        if !self.state.validated {
            debug!("Fire command ignored: not validated");
            return;
        }

        if enable && self.state.armed {
            self.transmit_plain(Command::FireOn);
        } else if !enable {
            self.transmit_plain(Command::FireOff);
        } else {
            info!("Fire command ignored: not armed");
        }
    }

    pub fn set_continuity(&mut self, enable: bool) {
        if !self.state.validated {
            debug!("Continuity command ignored: not validated");
            return;
        }

        self.transmit_plain(Command::continuity(enable));

        if self.config.loopback {
            self.handle_frame(Frame::new(Command::continuity_ack(enable), None));
        }
    }

    // ---- inbound --------------------------------------------------------

    /// Feed a chunk delivered by the transport
    pub fn handle_chunk(&mut self, chunk: &str) {
        for frame in self.decoder.push(chunk) {
            self.handle_frame(frame);
        }
    }

    /// Handle the full text of one frame, bypassing the stream decoder
    pub fn handle_text(&mut self, text: &str) {
        let frame = self.config.codec.parse(text);
        self.handle_frame(frame);
    }

    pub fn handle_frame(&mut self, frame: Frame) {
        let Some(command) = frame.kind() else {
            debug!("Unknown command ignored: {:?}", frame.command);
            return;
        };

        match command {
            Command::Validate => {
                if frame.value.as_deref() == Some(self.config.validation_code.as_str()) {
                    self.set_validated(true);
                } else {
                    debug!("Validation code mismatch");
                }
            }
            Command::DeviceId => {
                if let Some(c) = update(&mut self.state.device_id, frame.value) {
                    info!("Device id: {:?}", c.new);
                    self.emit(SessionEvent::Changed(StateChange::DeviceId(c)));
                }
            }
            Command::Version => {
                if let Some(c) = update(&mut self.state.device_version, frame.value) {
                    info!("Firmware version: {:?}", c.new);
                    self.emit(SessionEvent::Changed(StateChange::DeviceVersion(c)));
                }
            }
            Command::ContinuityOk => self.set_continuity_flag(true),
            Command::ContinuityNone => self.set_continuity_flag(false),
            Command::RequestValidation => {
                info!("Device requested validation");
                self.set_validated(false);
            }
            Command::SetCode => self.resolve_set_code(),
            Command::LowVoltageBattery | Command::HighVoltageBattery => {
                self.update_battery(command, frame.value.as_deref())
            }
            other => debug!("Command {} has no inbound meaning", other),
        }
    }

    // ---- lifecycle ------------------------------------------------------

    pub fn on_connected(&mut self) {
        if let Some(c) = update(&mut self.state.connected, true) {
            info!("Device connected");
            self.emit(SessionEvent::Changed(StateChange::Connected(c)));
        }
        self.start_rssi_polling();
    }

    pub fn on_disconnected(&mut self) {
        if let Some(c) = update(&mut self.state.connected, false) {
            info!("Device disconnected");
            self.emit(SessionEvent::Changed(StateChange::Connected(c)));
        }
        self.set_validated(false);
        self.cancel_scheduled();
        self.decoder.reset();
        if self.pending_set_code.take().is_some() {
            debug!("Pending set code request dropped on disconnect");
        }
    }

    pub fn on_rssi_update(&mut self, rssi: f32) {
        if let Some(c) = update(&mut self.state.rssi, rssi) {
            self.emit(SessionEvent::Changed(StateChange::Rssi(c)));
        }
    }

    // ---- scheduled work -------------------------------------------------

    /// Wait for the next piece of timer work
    pub async fn next_scheduled(&mut self) -> Option<Scheduled> {
        self.scheduled_rx.recv().await
    }

    /// Run timer work, discarding anything scheduled before the last
    /// disconnect.
    pub fn run_scheduled(&mut self, task: Scheduled) {
        if task.epoch() != self.epoch {
            debug!("Discarding stale scheduled task: {:?}", task);
            return;
        }

        match task {
            Scheduled::Echo { text, .. } => {
                debug!("Loopback echo: {}", text);
                self.handle_text(&text);
            }
            Scheduled::PollRssi { .. } => {
                if let Err(e) = self.link.request_rssi() {
                    debug!("RSSI request failed: {}", e);
                }
            }
        }
    }

    /// Run every piece of timer work that is already queued
    pub fn run_due(&mut self) -> usize {
        let mut count = 0;
        while let Ok(task) = self.scheduled_rx.try_recv() {
            self.run_scheduled(task);
            count += 1;
        }
        count
    }

    fn schedule_echo(&mut self, text: String) {
        let tx = self.scheduled_tx.clone();
        let epoch = self.epoch;
        let delay = self.config.loopback_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Scheduled::Echo { epoch, text });
        });
        self.echoes.retain(|h| !h.is_finished());
        self.echoes.push(handle);
    }

    fn start_rssi_polling(&mut self) {
        if let Some(handle) = self.rssi_poller.take() {
            handle.abort();
        }

        let tx = self.scheduled_tx.clone();
        let epoch = self.epoch;
        let period = self.config.rssi_poll_interval;
        self.rssi_poller = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                if tx.send(Scheduled::PollRssi { epoch }).is_err() {
                    break;
                }
            }
        }));
    }

    fn cancel_scheduled(&mut self) {
        self.epoch += 1;
        if let Some(handle) = self.rssi_poller.take() {
            handle.abort();
        }
        for handle in self.echoes.drain(..) {
            handle.abort();
        }
    }

    // ---- helpers --------------------------------------------------------

    fn transmit(&mut self, command: Command, value: Option<&str>) -> Result<String, ProtocolError> {
        let text = self.config.codec.encode(command, value)?;
        self.write(command, &text);
        Ok(text)
    }

    fn transmit_plain(&mut self, command: Command) {
        if let Err(e) = self.transmit(command, None) {
            warn!("Could not encode {}: {}", command, e);
        }
    }

    fn write(&mut self, command: Command, text: &str) {
        debug!("Sending {}", text);
        if let Err(e) = self.link.send(text) {
            warn!("Failed to send {}: {}", command, e);
        }
    }

    fn set_validated(&mut self, validated: bool) {
        if let Some(c) = update(&mut self.state.validated, validated) {
            info!("Validated {}", c.new);
            self.emit(SessionEvent::Changed(StateChange::Validated(c)));
        }
    }

    fn set_armed_flag(&mut self, armed: bool) {
        if let Some(c) = update(&mut self.state.armed, armed) {
            info!("Armed {}", c.new);
            self.emit(SessionEvent::Changed(StateChange::Armed(c)));
        }
    }

    fn set_continuity_flag(&mut self, continuity: bool) {
        if let Some(c) = update(&mut self.state.continuity, continuity) {
            info!("Continuity {}", c.new);
            self.emit(SessionEvent::Changed(StateChange::Continuity(c)));
        }
    }

    fn resolve_set_code(&mut self) {
        let Some(pending) = self.pending_set_code.take() else {
            debug!("Set code acknowledgement with nothing pending");
            return;
        };

        info!("Validation code changed");
        self.config.validation_code = pending.code.clone();
        self.emit(SessionEvent::ValidationCodeChanged(pending.code));
        (pending.callback)();
    }

    fn update_battery(&mut self, command: Command, value: Option<&str>) {
        let Some(volts) = value.and_then(|v| v.trim().parse::<f32>().ok()) else {
            debug!("Unreadable battery level for {}: {:?}", command, value);
            return;
        };

        let change = if command == Command::LowVoltageBattery {
            update(&mut self.state.lv_battery, volts).map(StateChange::LowVoltageBattery)
        } else {
            update(&mut self.state.hv_battery, volts).map(StateChange::HighVoltageBattery)
        };
        if let Some(change) = change {
            self.emit(SessionEvent::Changed(change));
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl<L: Link> Drop for Session<L> {
    fn drop(&mut self) {
        self.cancel_scheduled();
    }
}
