//! Operator console: text commands in, session events out.

use crate::domain::models::{MessageSeverity, SessionEvent, SessionState, StateChange};
use std::str::FromStr;

pub const HELP: &str = "\
commands:
  ping              ping the launcher
  validate          send the stored validation code
  setcode <code>    change the validation code (requires validation)
  arm | disarm      press / release the arm button
  fire | release    press / release the fire button
  cty on|off        start / stop continuity testing
  stop              stop recording
  status            show session state
  help              show this text
  quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Ping,
    Validate,
    SetCode(String),
    Arm,
    Disarm,
    Fire,
    Release,
    Continuity(bool),
    Stop,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("unknown command {0:?} (try \"help\")")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl FromStr for Input {
    type Err = InputError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Err(InputError::Usage("help"));
        };
        let arg = words.next();

        let input = match (word.to_lowercase().as_str(), arg) {
            ("ping", None) => Self::Ping,
            ("validate", None) => Self::Validate,
            ("setcode", Some(code)) => Self::SetCode(code.to_string()),
            ("setcode", None) => return Err(InputError::Usage("setcode <code>")),
            ("arm", None) => Self::Arm,
            ("disarm", None) => Self::Disarm,
            ("fire", None) => Self::Fire,
            ("release", None) => Self::Release,
            ("cty", Some("on")) => Self::Continuity(true),
            ("cty", Some("off")) => Self::Continuity(false),
            ("cty", _) => return Err(InputError::Usage("cty on|off")),
            ("stop", None) => Self::Stop,
            ("status", None) => Self::Status,
            ("help", _) | ("?", _) => Self::Help,
            ("quit", _) | ("exit", _) => Self::Quit,
            _ => return Err(InputError::Unknown(line.trim().to_string())),
        };
        Ok(input)
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// One line describing an event
pub fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Changed(change) => match change {
            StateChange::Connected(c) => {
                if c.new { "Connected".into() } else { "Not Connected".into() }
            }
            StateChange::Validated(c) => {
                if c.new { "Validated".into() } else { "Not Validated".into() }
            }
            StateChange::Armed(c) => format!("Armed: {}", on_off(c.new)),
            StateChange::Continuity(c) => format!("Continuity: {}", on_off(c.new)),
            StateChange::DeviceId(c) => format!("Device: {}", text(&c.new)),
            StateChange::DeviceVersion(c) => format!("Firmware: {}", text(&c.new)),
            StateChange::Rssi(c) => format!("Signal: {}", c.new),
            StateChange::LowVoltageBattery(c) => format!("LV Batt: {}v", c.new),
            StateChange::HighVoltageBattery(c) => format!("HV Batt: {}v", c.new),
        },
        SessionEvent::ValidationCodeChanged(_) => "Validation code updated".into(),
        SessionEvent::CountdownTick(0) => "Countdown finished".into(),
        SessionEvent::CountdownTick(v) => format!("{}...", v),
        SessionEvent::RecordingRequested(true) => "Recording".into(),
        SessionEvent::RecordingRequested(false) => "Recording stopped".into(),
        SessionEvent::LogMessage(msg) => {
            let tag = match msg.severity {
                MessageSeverity::Info => "info",
                MessageSeverity::Success => "ok",
                MessageSeverity::Warning => "warning",
                MessageSeverity::Error => "error",
            };
            format!("[{}] {}", tag, msg.message)
        }
    }
}

/// Multi-line status report
pub fn status(state: &SessionState) -> String {
    format!(
        "connected: {}\nvalidated: {}\narmed: {}\ncontinuity: {}\ndevice: {}\nfirmware: {}\nsignal: {}\nLV batt: {}v\nHV batt: {}v",
        state.connected,
        state.validated,
        state.armed,
        state.continuity,
        text(&state.device_id),
        text(&state.device_version),
        state.rssi,
        state.lv_battery,
        state.hv_battery,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Change, StatusMessage};

    #[test]
    fn test_parse_commands() {
        assert_eq!("ping".parse::<Input>(), Ok(Input::Ping));
        assert_eq!(" ARM ".parse::<Input>(), Ok(Input::Arm));
        assert_eq!("setcode 4321".parse::<Input>(), Ok(Input::SetCode("4321".into())));
        assert_eq!("cty off".parse::<Input>(), Ok(Input::Continuity(false)));
        assert_eq!("exit".parse::<Input>(), Ok(Input::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "setcode".parse::<Input>(),
            Err(InputError::Usage("setcode <code>"))
        );
        assert_eq!("cty maybe".parse::<Input>(), Err(InputError::Usage("cty on|off")));
        assert!(matches!("launch now".parse::<Input>(), Err(InputError::Unknown(_))));
        assert!("".parse::<Input>().is_err());
    }

    #[test]
    fn test_describe_events() {
        let connected = SessionEvent::Changed(StateChange::Connected(Change {
            old: false,
            new: true,
        }));
        assert_eq!(describe(&connected), "Connected");
        assert_eq!(describe(&SessionEvent::CountdownTick(3)), "3...");
        assert_eq!(describe(&SessionEvent::CountdownTick(0)), "Countdown finished");
        let warning = SessionEvent::LogMessage(StatusMessage {
            message: "Set code not sent".into(),
            severity: MessageSeverity::Warning,
        });
        assert_eq!(describe(&warning), "[warning] Set code not sent");
    }

    #[test]
    fn test_status_report() {
        let state = SessionState {
            connected: true,
            device_id: Some("LX-01".into()),
            ..Default::default()
        };
        let report = status(&state);
        assert!(report.contains("connected: true"));
        assert!(report.contains("device: LX-01"));
        assert!(report.contains("firmware: -"));
    }
}
