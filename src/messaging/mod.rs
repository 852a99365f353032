//! Messaging Session Module
//!
//! Session bootstrap, connection lifecycle, inbound event dispatch and
//! outbound sends for a single paired device. The network itself sits behind
//! [`MessagingBackend`]; the bundled [`LoopbackBackend`] stands in for it in
//! tests and local runs.

pub mod bootstrap;
pub mod client;
pub mod dispatcher;
pub mod jid;
pub mod loopback;
pub mod pairing;
pub mod shutdown;
pub mod store;
pub mod traits;
pub mod trigger;

pub use bootstrap::{BootstrapPath, Bootstrapper};
pub use client::{SessionClient, SessionPhase};
pub use dispatcher::{EventDispatcher, InboundEvent};
pub use jid::{Jid, JidParseError};
pub use loopback::{LoopbackBackend, LoopbackConfig};
pub use pairing::{run_pairing_flow, CodeRenderer, PairingOutcome, TerminalQrRenderer};
pub use shutdown::{hold_until_shutdown, shutdown_signal};
pub use store::{CredentialStore, Identity, MemoryCredentialStore, SqliteCredentialStore};
pub use traits::{BridgeError, BridgeResult, MessagingBackend};
pub use trigger::{dispatch_text, DispatchError};
