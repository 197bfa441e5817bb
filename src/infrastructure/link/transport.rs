//! Transport seam between the session and the physical link.
//!
//! The session never talks to Bluetooth or sockets directly. It writes
//! encoded frames through a [`Link`] and receives [`TransportEvent`]s from
//! whatever adapter owns the connection.

use crate::infrastructure::link::error::TransportError;
use tokio::sync::mpsc;

/// Outbound half of a transport.
///
/// Writes are best effort; the session logs failures and carries on.
pub trait Link: Send {
    /// Write one encoded frame.
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Ask the transport for a fresh signal strength sample.
    ///
    /// The answer, if any, arrives later as [`TransportEvent::Rssi`].
    fn request_rssi(&mut self) -> Result<(), TransportError>;
}

/// Inbound events delivered by a transport adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// A newline-trimmed text chunk, arbitrarily fragmented.
    Received(String),
    /// Signal strength sample in dBm.
    Rssi(f32),
}

/// Requests a [`ChannelLink`] forwards to the task owning the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkRequest {
    Write(String),
    ReadRssi,
}

/// [`Link`] that forwards requests over an unbounded channel to a writer
/// task.
#[derive(Debug, Clone)]
pub struct ChannelLink {
    sender: mpsc::UnboundedSender<LinkRequest>,
}

impl ChannelLink {
    pub fn new(sender: mpsc::UnboundedSender<LinkRequest>) -> Self {
        Self { sender }
    }

    /// Create a link together with the receiving end for the writer task
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<LinkRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Link for ChannelLink {
    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.sender
            .send(LinkRequest::Write(text.to_string()))
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn request_rssi(&mut self) -> Result<(), TransportError> {
        self.sender
            .send(LinkRequest::ReadRssi)
            .map_err(|_| TransportError::ChannelClosed)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Test double recording everything the session writes.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingLink {
        sent: Arc<Mutex<Vec<String>>>,
        rssi_requests: Arc<Mutex<usize>>,
    }

    impl RecordingLink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        pub fn clear(&self) {
            self.sent.lock().unwrap().clear();
        }

        pub fn rssi_requests(&self) -> usize {
            *self.rssi_requests.lock().unwrap()
        }
    }

    impl Link for RecordingLink {
        fn send(&mut self, text: &str) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn request_rssi(&mut self) -> Result<(), TransportError> {
            *self.rssi_requests.lock().unwrap() += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_link_forwards_requests() {
        let (mut link, mut rx) = ChannelLink::pair();
        link.send("~PING~").unwrap();
        link.request_rssi().unwrap();
        assert_eq!(rx.try_recv().unwrap(), LinkRequest::Write("~PING~".into()));
        assert_eq!(rx.try_recv().unwrap(), LinkRequest::ReadRssi);
    }

    #[test]
    fn test_channel_link_reports_closed_writer() {
        let (mut link, rx) = ChannelLink::pair();
        drop(rx);
        assert!(matches!(
            link.send("~PING~"),
            Err(TransportError::ChannelClosed)
        ));
    }
}
