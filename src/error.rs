//! Structured error types for the TN3270 protocol core.
//!
//! Every error kind named in the data model (parsing, screen/field access,
//! codec translation, reply generation) gets its own struct-variant enum with
//! the specific fields a caller needs to build a diagnostic line, plus a
//! top-level [`CoreError`] that wraps all four so library consumers can
//! match on one type or drill into the specific kind.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type returned by [`crate::core::Core`] operations.
#[derive(Debug)]
pub enum CoreError {
    /// Outbound data-stream parsing errors.
    Parse(ParseError),
    /// Screen buffer / field access errors.
    Screen(ScreenError),
    /// EBCDIC codec errors.
    Codec(CodecError),
    /// Inbound Read-Modified reply generation errors.
    Reply(ReplyError),
}

/// Errors raised while parsing the outbound (host to terminal) byte stream.
#[derive(Debug)]
pub enum ParseError {
    /// The first byte of a record is not a recognised command code.
    InvalidCommand { byte: u8, position: usize },
    /// A 2-byte address field could not be decoded under any of the
    /// 12/14/16-bit encodings, or decoded to an address outside the buffer.
    InvalidAddress { position: usize },
    /// An order byte is not one of the ten recognised orders. Recoverable in
    /// lenient mode (the order and its data are skipped); fatal in strict mode.
    UnknownOrder { byte: u8, position: usize },
    /// A record ended mid-order; only ever surfaced if the stream never
    /// resumes (see [`ProtocolTimeout`](ParseError::ProtocolTimeout)).
    TruncatedOrder { position: usize },
    /// The parser accumulated more bytes than the stall window without
    /// completing an order or seeing an end-of-record.
    ProtocolTimeout,
}

/// Errors raised by [`crate::screen::ScreenBuffer`] / [`crate::field::FieldTable`].
#[derive(Debug)]
pub enum ScreenError {
    /// A write targeted a cell governed by a protected field.
    ProtectedWrite { address: u16 },
    /// A non-digit byte was written into a numeric field.
    NumericOnly { address: u16 },
    /// An input run is longer than the field it was written into.
    FieldOverflow { address: u16, length: usize },
    /// The keyboard is locked; operator input is rejected.
    KeyboardLocked,
}

/// Errors raised by [`crate::codec`].
#[derive(Debug)]
pub enum CodecError {
    /// A host byte (ASCII/Latin-1 code point) has no mapping in the active
    /// codepage's bijective subset.
    InvalidCharacter { byte: u8 },
    /// A caller-supplied output buffer was too small.
    BufferOverflow { needed: usize, available: usize },
}

/// Errors raised by [`crate::replier`].
#[derive(Debug)]
pub enum ReplyError {
    /// A caller-supplied output buffer was too small for the reply.
    BufferOverflow { needed: usize, available: usize },
    /// No AID is armed (no key has been pressed since the last reply), so
    /// there is nothing to reply with.
    NoAidArmed,
}

pub type CoreResult<T> = Result<T, CoreError>;
pub type ParseResult<T> = Result<T, ParseError>;
pub type ScreenResult<T> = Result<T, ScreenError>;
pub type CodecResult<T> = Result<T, CodecError>;
pub type ReplyResult<T> = Result<T, ReplyError>;

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Parse(err) => write!(f, "parse error: {err}"),
            CoreError::Screen(err) => write!(f, "screen error: {err}"),
            CoreError::Codec(err) => write!(f, "codec error: {err}"),
            CoreError::Reply(err) => write!(f, "reply error: {err}"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidCommand { byte, position } =>
                write!(f, "invalid command code 0x{byte:02X} at offset {position}"),
            ParseError::InvalidAddress { position } =>
                write!(f, "invalid buffer address at offset {position}"),
            ParseError::UnknownOrder { byte, position } =>
                write!(f, "unknown order code 0x{byte:02X} at offset {position}"),
            ParseError::TruncatedOrder { position } =>
                write!(f, "order truncated at offset {position}"),
            ParseError::ProtocolTimeout =>
                write!(f, "stream stalled without completing an order or record"),
        }
    }
}

impl fmt::Display for ScreenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenError::ProtectedWrite { address } =>
                write!(f, "write to protected field at address {address}"),
            ScreenError::NumericOnly { address } =>
                write!(f, "non-numeric byte written into numeric field at address {address}"),
            ScreenError::FieldOverflow { address, length } =>
                write!(f, "input at address {address} exceeds field length {length}"),
            ScreenError::KeyboardLocked =>
                write!(f, "keyboard is locked"),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::InvalidCharacter { byte } =>
                write!(f, "byte 0x{byte:02X} has no mapping in the active codepage"),
            CodecError::BufferOverflow { needed, available } =>
                write!(f, "buffer overflow: needed {needed} bytes, had {available}"),
        }
    }
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyError::BufferOverflow { needed, available } =>
                write!(f, "reply buffer overflow: needed {needed} bytes, had {available}"),
            ReplyError::NoAidArmed =>
                write!(f, "no AID armed; nothing to reply with"),
        }
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            CoreError::Parse(err) => Some(err),
            CoreError::Screen(err) => Some(err),
            CoreError::Codec(err) => Some(err),
            CoreError::Reply(err) => Some(err),
        }
    }
}

impl StdError for ParseError {}
impl StdError for ScreenError {}
impl StdError for CodecError {}
impl StdError for ReplyError {}

impl From<ParseError> for CoreError {
    fn from(err: ParseError) -> Self { CoreError::Parse(err) }
}
impl From<ScreenError> for CoreError {
    fn from(err: ScreenError) -> Self { CoreError::Screen(err) }
}
impl From<CodecError> for CoreError {
    fn from(err: CodecError) -> Self { CoreError::Codec(err) }
}
impl From<ReplyError> for CoreError {
    fn from(err: ReplyError) -> Self { CoreError::Reply(err) }
}
