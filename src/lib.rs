//! wabridge - Messaging Bridge
//!
//! Pairs this process as a linked device (or reconnects with the stored
//! identity), logs inbound text messages, and sends outbound text messages
//! on request over HTTP or from the command line.
//!
//! One process owns one device and one long-lived session.

pub mod messaging;
pub mod server;
