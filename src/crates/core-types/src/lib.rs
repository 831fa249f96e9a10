//! Office Link shared wire types
//!
//! Lowest layer of the workspace: the `{event, data}` envelope, the event
//! kinds the backend emits with their payload shapes, and the commands the
//! client sends back. No I/O lives here.

pub mod commands;
pub mod connection;
pub mod envelope;
pub mod events;
pub mod payloads;

pub use commands::{ActionCommand, Command, TypedCommand};
pub use connection::{ConnectionState, ConnectionStatus, ConnectionUpdate};
pub use envelope::Envelope;
pub use events::{EventKind, WILDCARD_TAG};
pub use payloads::*;
