//! Frame codec for the launcher serial link.
//!
//! Every message is a single line of text bounded by a delimiter, with an
//! optional value after a separator:
//!
//! ```text
//! ~VALIDATE|9876~
//! ~PING~
//! ```
//!
//! The transport hands us newline-trimmed chunks in arbitrary fragments.
//! [`FrameDecoder`] accumulates them until a trailing delimiter closes the
//! frame.

use crate::infrastructure::link::error::ProtocolError;
use crate::infrastructure::link::protocol::{Command, DEFAULT_DELIMITER, DEFAULT_SEPARATOR};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw command token. Unknown tokens are kept so they can be logged.
    pub command: String,
    /// Value following the separator, if any.
    pub value: Option<String>,
}

impl Frame {
    pub fn new(command: Command, value: Option<&str>) -> Self {
        Self {
            command: command.token().to_string(),
            value: value.map(str::to_string),
        }
    }

    /// Resolve the token against the command catalog
    pub fn kind(&self) -> Option<Command> {
        Command::from_token(&self.command)
    }
}

/// How a completed span of buffered text is turned into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    /// The whole span is parsed as one frame, even if several frames arrived
    /// concatenated in one chunk. Matches the deployed firmware tooling.
    #[default]
    Aggregate,
    /// Every delimiter-bounded frame in the span is yielded separately.
    Split,
}

/// Delimiter/separator pair used to encode and parse frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    delimiter: char,
    separator: char,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            separator: DEFAULT_SEPARATOR,
        }
    }
}

impl FrameCodec {
    pub fn new(delimiter: char, separator: char) -> Result<Self, ProtocolError> {
        if delimiter == separator {
            return Err(ProtocolError::AmbiguousFraming(delimiter));
        }
        let codec = Self {
            delimiter,
            separator,
        };
        // Catalog tokens must stay encodable.
        for command in Command::ALL {
            codec.check("token", command.token())?;
        }
        Ok(codec)
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Encode a command, rejecting values that would break the framing.
    pub fn encode(&self, command: Command, value: Option<&str>) -> Result<String, ProtocolError> {
        self.check("token", command.token())?;
        if let Some(value) = value {
            self.check("value", value)?;
        }
        Ok(self.encode_unchecked(command.token(), value))
    }

    /// Encode without checking for reserved characters.
    ///
    /// The caller guarantees neither `token` nor `value` contains the
    /// delimiter or the separator.
    pub fn encode_unchecked(&self, token: &str, value: Option<&str>) -> String {
        let mut out = String::with_capacity(token.len() + value.map_or(0, |v| v.len() + 1) + 2);
        out.push(self.delimiter);
        out.push_str(token);
        if let Some(value) = value {
            out.push(self.separator);
            out.push_str(value);
        }
        out.push(self.delimiter);
        out
    }

    /// Parse the text of one frame.
    ///
    /// Leading and trailing delimiters are stripped. With more than one
    /// separator only the first two parts are used.
    pub fn parse(&self, text: &str) -> Frame {
        let stripped = text.trim_matches(self.delimiter);
        let mut parts = stripped.split(self.separator);
        let command = parts.next().unwrap_or_default().to_string();
        let value = parts.next().map(str::to_string);
        if parts.next().is_some() {
            debug!("Malformed frame {:?}: extra separators ignored", text);
        }
        Frame { command, value }
    }

    fn check(&self, field: &'static str, text: &str) -> Result<(), ProtocolError> {
        for reserved in [self.delimiter, self.separator] {
            if text.contains(reserved) {
                return Err(ProtocolError::ReservedCharacter {
                    field,
                    text: text.to_string(),
                    reserved,
                });
            }
        }
        Ok(())
    }
}

/// Streaming decoder fed with transport chunks.
///
/// A chunk starting with the delimiter opens a frame; chunks are appended
/// while a frame is open, and the frame closes as soon as the buffered text
/// ends with the delimiter.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    codec: FrameCodec,
    mode: DecodeMode,
    buffer: String,
    inside: bool,
}

impl FrameDecoder {
    pub fn new(codec: FrameCodec, mode: DecodeMode) -> Self {
        Self {
            codec,
            mode,
            buffer: String::new(),
            inside: false,
        }
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Feed one chunk, returning every frame it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<Frame> {
        let chunk = chunk.trim_matches(|c| c == '\r' || c == '\n');
        trace!("Chunk received: {:?}", chunk);

        if chunk.starts_with(self.codec.delimiter) {
            self.inside = true;
        }

        if !self.inside {
            if !chunk.is_empty() {
                debug!("Dropping chunk outside of a frame: {:?}", chunk);
            }
            return Vec::new();
        }

        self.buffer.push_str(chunk);

        // A lone delimiter only opens a frame.
        let opener_only = self.buffer.len() == self.codec.delimiter.len_utf8();
        if opener_only || !self.buffer.ends_with(self.codec.delimiter) {
            return Vec::new();
        }

        self.inside = false;
        let text = std::mem::take(&mut self.buffer);
        match self.mode {
            DecodeMode::Aggregate => vec![self.codec.parse(&text)],
            DecodeMode::Split => self.split(&text),
        }
    }

    /// Discard any partially received frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.inside = false;
    }

    /// True while a frame has been opened but not yet closed
    pub fn is_pending(&self) -> bool {
        self.inside
    }

    fn split(&self, text: &str) -> Vec<Frame> {
        text.split(self.codec.delimiter)
            .filter(|body| !body.is_empty())
            .map(|body| self.codec.parse(body))
            .collect()
    }
}
