//! Launcher Link Module
//!
//! Text framing and transport plumbing between the controller and the
//! launcher's serial module.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      LinkService                         │
//! │  (Owns the launch panel, runs commands and timers)       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌────────────┐
//! │ Transport │  │ Connection │  │   Codec    │
//! │           │  │            │  │            │
//! │ - Link    │  │ - TCP      │  │ - Framing  │
//! │   seam    │  │   bridge   │  │ - Streaming│
//! │ - Events  │  │ - Retries  │  │   decoder  │
//! └───────────┘  └────────────┘  └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Command catalog and framing constants
//! - [`codec`] - Frame encoding, parsing and the streaming decoder
//! - [`transport`] - The [`Link`](transport::Link) seam and transport events
//! - [`connection`] - TCP serial bridge adapter
//! - [`service`] - Link service actor and its handle
//! - [`error`] - Codec and transport errors

pub mod codec;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;

pub use service::{LinkHandle, LinkService};
