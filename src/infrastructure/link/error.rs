//! Error types for the serial link.
//!
//! Protocol-level problems on the wire (malformed frames, unknown tokens) are
//! never errors; they are logged and dropped. These types only cover misuse
//! of the codec by the caller and failures of the underlying transport.

/// Misuse of the frame codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A token or value contains one of the reserved framing characters.
    #[error("{field} {text:?} contains reserved character {reserved:?}")]
    ReservedCharacter {
        /// Which part of the frame was rejected ("token" or "value").
        field: &'static str,
        /// The offending text.
        text: String,
        /// The reserved character found in it.
        reserved: char,
    },

    /// Delimiter and separator must be distinct characters.
    #[error("delimiter and separator must differ (both {0:?})")]
    AmbiguousFraming(char),
}

/// Errors raised by a transport adapter.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The writer half of the transport has gone away.
    #[error("transport channel closed")]
    ChannelClosed,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_character_display() {
        let e = ProtocolError::ReservedCharacter {
            field: "value",
            text: "12|34".into(),
            reserved: '|',
        };
        assert_eq!(e.to_string(), "value \"12|34\" contains reserved character '|'");
    }

    #[test]
    fn test_transport_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: TransportError = io_err.into();
        assert!(matches!(e, TransportError::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }
}
