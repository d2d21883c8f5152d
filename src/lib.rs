//! TN3270 terminal protocol core: an EBCDIC codec, a fixed-geometry screen
//! buffer, a field table, an incremental outbound stream parser, an
//! executor that applies parsed orders, a Read-Modified reply builder, a
//! minimal Telnet framing adapter, and the `Core` facade wiring them
//! together behind one session-level API.

/// Structured error types shared by every component.
pub mod error;

/// EBCDIC codec (component C1).
pub mod codec;

/// Buffer-address encoding (12/14/16-bit), shared by the parser and replier.
pub mod address;

/// Screen buffer: character grid, cursor, keyboard lock (component C2).
pub mod screen;

/// Field table: Start-Field-derived fields, MDT bits, address→field lookup
/// (component C3).
pub mod field;

/// Wire-level constants: command/order/WCC/AID byte values.
pub mod codes;

/// Incremental outbound stream parser (component C4).
pub mod parser;

/// Executor: applies parsed orders to the screen and field table
/// (component C5).
pub mod executor;

/// Replier: builds Read Buffer / Read Modified / Read Modified All / short
/// read reply frames (component C6).
pub mod replier;

/// Telnet framing adapter: IAC de-doubling, end-of-record signalling, and
/// BINARY/EOR/TERMINAL-TYPE negotiation.
pub mod telnet;

/// Session configuration.
pub mod config;

/// The `Core` facade: wires the components above together behind the
/// session-level public API.
pub mod core;

pub use crate::core::{Core, FeedOutcome, FieldSnapshot, ScreenSnapshot};
pub use crate::error::{CoreError, CoreResult};
