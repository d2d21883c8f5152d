//! Core configuration (§7.2, AMBIENT).
//!
//! Modeled after the teacher's `SessionConfig`/`ConfigValue` pattern, trimmed
//! to what the core actually needs: a plain serializable struct, no
//! change-listener bus, no file persistence (the collaborator that owns a
//! socket and a `Core` is free to load/save this however it likes; that is
//! explicitly out of scope here per `spec.md §1`).

use serde::{Deserialize, Serialize};

use crate::screen::ScreenSize;

/// Lenient/strict policy shared by the parser's `UnknownOrder` recovery and
/// the executor's unknown SFE/MF attribute-type recovery (`SPEC_FULL.md` §9:
/// "the same lenient/strict switch governs unknown orders and unknown SFE/MF
/// pair types uniformly").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownOrderPolicy {
    /// Skip the unrecognised byte as data / ignore the unrecognised pair type.
    Lenient,
    /// Fail the record / the order with a `ParseError`.
    Strict,
}

impl Default for UnknownOrderPolicy {
    fn default() -> Self {
        UnknownOrderPolicy::Lenient
    }
}

/// Everything a `Core` needs to know before it can be constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// The primary screen's geometry.
    pub screen_size: ScreenSize,
    /// Geometry to switch to on `EraseWriteAlternate` (§9's "single
    /// configured alternate geometry" resolution).
    pub alternate_screen_size: ScreenSize,
    /// EBCDIC codepage the `Codec` translates.
    pub codepage: crate::codec::CodePage,
    /// Shared lenient/strict policy for unknown orders and attribute types.
    pub unknown_order_policy: UnknownOrderPolicy,
    /// Bytes the parser may accumulate without completing an order or seeing
    /// `EndRecord` before surfacing `ProtocolTimeout`.
    pub stall_ceiling: usize,
    /// Terminal type string sent in Telnet TERMINAL-TYPE subnegotiations.
    pub terminal_type: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            screen_size: ScreenSize::Model2,
            alternate_screen_size: ScreenSize::Model3,
            codepage: crate::codec::CodePage::Cp037,
            unknown_order_policy: UnknownOrderPolicy::Lenient,
            stall_ceiling: 64 * 1024,
            terminal_type: crate::telnet::DEFAULT_TERMINAL_TYPE.to_string(),
        }
    }
}

impl CoreConfig {
    pub fn is_strict(&self) -> bool {
        self.unknown_order_policy == UnknownOrderPolicy::Strict
    }
}
