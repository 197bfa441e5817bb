use crate::infrastructure::link::transport::TransportEvent;
use tokio::sync::oneshot;

/// Snapshot of everything the launcher session tracks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub connected: bool,
    pub validated: bool,
    pub armed: bool,
    pub continuity: bool,
    pub device_id: Option<String>,
    pub device_version: Option<String>,
    /// Signal strength in dBm
    pub rssi: f32,
    /// Logic battery in volts
    pub lv_battery: f32,
    /// Igniter battery in volts
    pub hv_battery: f32,
}

/// A value transition
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub old: T,
    pub new: T,
}

/// Replace `slot` with `new`, returning the transition if the value differed.
pub fn update<T: PartialEq + Clone>(slot: &mut T, new: T) -> Option<Change<T>> {
    if *slot == new {
        return None;
    }
    let old = std::mem::replace(slot, new.clone());
    Some(Change { old, new })
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Connected(Change<bool>),
    Validated(Change<bool>),
    Armed(Change<bool>),
    Continuity(Change<bool>),
    DeviceId(Change<Option<String>>),
    DeviceVersion(Change<Option<String>>),
    Rssi(Change<f32>),
    LowVoltageBattery(Change<f32>),
    HighVoltageBattery(Change<f32>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Changed(StateChange),
    /// The device acknowledged a new validation code; persist it.
    ValidationCodeChanged(String),
    /// Countdown value; 0 means the countdown finished.
    CountdownTick(u32),
    /// Start or stop video recording (an external recorder acts on it)
    RecordingRequested(bool),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// Invoked once the device acknowledges a set-code request.
pub type SetCodeCallback = Box<dyn FnOnce() + Send + 'static>;

/// Requests handled by the link service task
pub enum LinkCommand {
    Ping,
    Validate,
    SetCode(String, SetCodeCallback),
    ArmPressed,
    ArmReleased,
    FirePressed,
    FireReleased,
    Continuity(bool),
    StopRecording,
    Transport(TransportEvent),
    Snapshot(oneshot::Sender<SessionState>),
    Shutdown,
}

impl std::fmt::Debug for LinkCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ping => f.write_str("Ping"),
            Self::Validate => f.write_str("Validate"),
            Self::SetCode(code, _) => f.debug_tuple("SetCode").field(code).finish(),
            Self::ArmPressed => f.write_str("ArmPressed"),
            Self::ArmReleased => f.write_str("ArmReleased"),
            Self::FirePressed => f.write_str("FirePressed"),
            Self::FireReleased => f.write_str("FireReleased"),
            Self::Continuity(on) => f.debug_tuple("Continuity").field(on).finish(),
            Self::StopRecording => f.write_str("StopRecording"),
            Self::Transport(event) => f.debug_tuple("Transport").field(event).finish(),
            Self::Snapshot(_) => f.write_str("Snapshot"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_reports_only_real_changes() {
        let mut armed = false;
        assert_eq!(update(&mut armed, false), None);
        assert_eq!(
            update(&mut armed, true),
            Some(Change {
                old: false,
                new: true
            })
        );
        assert!(armed);
    }

    #[test]
    fn test_update_optional_text() {
        let mut id: Option<String> = None;
        let change = update(&mut id, Some("LX-01".to_string())).unwrap();
        assert_eq!(change.old, None);
        assert_eq!(change.new.as_deref(), Some("LX-01"));
        assert!(update(&mut id, Some("LX-01".to_string())).is_none());
    }
}
