//! Launcher Command Protocol
//!
//! This module contains the fixed command vocabulary spoken by the launcher
//! firmware over the serial link.

/// Default framing marker placed at both ends of every frame
pub const DEFAULT_DELIMITER: char = '~';

/// Default separator between a command token and its value
pub const DEFAULT_SEPARATOR: char = '|';

/// Validation code used when none has been stored yet.
///
/// Set `LAUNCH_VALIDATION_CODE` at build time to bake in the code paired with
/// your firmware.
pub const DEFAULT_VALIDATION_CODE: &str = match option_env!("LAUNCH_VALIDATION_CODE") {
    Some(code) => code,
    None => "0000",
};

/// Launcher commands
///
/// Tokens are compared by exact, case-sensitive string equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Liveness probe
    Ping,
    /// Prove possession of the validation code (echoed back by the device)
    Validate,
    /// Replace the validation code stored on the device
    SetCode,
    /// Arm the igniter
    ArmOn,
    /// Disarm the igniter
    ArmOff,
    /// Energize the igniter (only honored while armed)
    FireOn,
    /// De-energize the igniter
    FireOff,
    /// Begin continuity testing
    ContinuityOn,
    /// End continuity testing
    ContinuityOff,
    /// Inbound: continuity detected
    ContinuityOk,
    /// Inbound: no continuity
    ContinuityNone,
    /// Inbound: device identifier
    DeviceId,
    /// Inbound: firmware version
    Version,
    /// Inbound: the device asks the controller to validate again
    RequestValidation,
    /// Inbound: low voltage (logic) battery level in volts
    LowVoltageBattery,
    /// Inbound: high voltage (igniter) battery level in volts
    HighVoltageBattery,
}

impl Command {
    /// Every command in the catalog
    pub const ALL: [Command; 16] = [
        Self::Ping,
        Self::Validate,
        Self::SetCode,
        Self::ArmOn,
        Self::ArmOff,
        Self::FireOn,
        Self::FireOff,
        Self::ContinuityOn,
        Self::ContinuityOff,
        Self::ContinuityOk,
        Self::ContinuityNone,
        Self::DeviceId,
        Self::Version,
        Self::RequestValidation,
        Self::LowVoltageBattery,
        Self::HighVoltageBattery,
    ];

    /// Get the wire token for this command
    pub fn token(&self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Validate => "VALIDATE",
            Self::SetCode => "SETCODE",
            Self::ArmOn => "ARM_ON",
            Self::ArmOff => "ARM_OFF",
            Self::FireOn => "FIRE_ON",
            Self::FireOff => "FIRE_OFF",
            Self::ContinuityOn => "CTY_ON",
            Self::ContinuityOff => "CTY_OFF",
            Self::ContinuityOk => "CTY_OK",
            Self::ContinuityNone => "CTY_NONE",
            Self::DeviceId => "DEVICEID",
            Self::Version => "VERSION",
            Self::RequestValidation => "REQ_VALID",
            Self::LowVoltageBattery => "LV_BATT",
            Self::HighVoltageBattery => "HV_BATT",
        }
    }

    /// Look up a command by its wire token
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.token() == token)
    }

    /// Arm or disarm command for the requested state
    pub fn arm(enable: bool) -> Self {
        if enable {
            Self::ArmOn
        } else {
            Self::ArmOff
        }
    }

    /// Continuity request for the requested state
    pub fn continuity(enable: bool) -> Self {
        if enable {
            Self::ContinuityOn
        } else {
            Self::ContinuityOff
        }
    }

    /// The acknowledgement the device answers a continuity request with in
    /// loopback testing.
    pub fn continuity_ack(enable: bool) -> Self {
        if enable {
            Self::ContinuityOk
        } else {
            Self::ContinuityNone
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        for (i, a) in Command::ALL.iter().enumerate() {
            for b in &Command::ALL[i + 1..] {
                assert_ne!(a.token(), b.token());
            }
        }
    }

    #[test]
    fn test_from_token() {
        assert_eq!(Command::from_token("VALIDATE"), Some(Command::Validate));
        assert_eq!(Command::from_token("REQ_VALID"), Some(Command::RequestValidation));
        assert_eq!(Command::from_token("validate"), None);
        assert_eq!(Command::from_token("BOGUS"), None);
    }

    #[test]
    fn test_tokens_avoid_reserved_characters() {
        for command in Command::ALL {
            assert!(!command.token().contains(DEFAULT_DELIMITER));
            assert!(!command.token().contains(DEFAULT_SEPARATOR));
        }
    }

    #[test]
    fn test_state_helpers() {
        assert_eq!(Command::arm(true), Command::ArmOn);
        assert_eq!(Command::arm(false), Command::ArmOff);
        assert_eq!(Command::continuity(true), Command::ContinuityOn);
        assert_eq!(Command::continuity_ack(false), Command::ContinuityNone);
    }
}
