//! Incremental outbound stream parser (component C4).
//!
//! Grounded on `lib3270::protocol::DataStreamParser`'s order dispatch table
//! (`process_start_field`/`process_set_buffer_address`/etc. shapes), but
//! re-architected from a one-shot `&[u8]` slice parser into a persistent
//! state machine that survives fragmented `feed` calls: incoming bytes are
//! appended to a `pending` accumulator, parsed as far as possible, and the
//! consumed prefix is drained, leaving only a genuinely incomplete order's
//! bytes buffered. This is what makes `feed(xs); feed(ys)` produce the same
//! events as `feed(xs ++ ys)` for any split.
//!
//! `EndRecord` is not observed inside `feed`: per the telnet framing layer,
//! the core never sees `IAC EOR` as data, so the adapter calls
//! [`StreamParser::end_record`] once it has consumed one itself.

use log::{debug, trace, warn};

use crate::address::{self, AddressMode};
use crate::codes::{ORDER_EUA, ORDER_GE, ORDER_IC, ORDER_MF, ORDER_PT, ORDER_RA, ORDER_SA, ORDER_SBA, ORDER_SF, ORDER_SFE};
use crate::codes::{CMD_ERASE_ALL_UNPROTECTED, CMD_ERASE_WRITE, CMD_ERASE_WRITE_ALTERNATE, CMD_READ_BUFFER, CMD_READ_MODIFIED, CMD_READ_MODIFIED_ALL, CMD_WRITE, CMD_WRITE_STRUCTURED_FIELD};
use crate::error::{ParseError, ParseResult};
use crate::screen::Address;

/// Which outbound command began the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Write,
    EraseWrite,
    EraseWriteAlternate,
    EraseAllUnprotected,
    WriteStructuredField,
    ReadBuffer,
    ReadModified,
    ReadModifiedAll,
}

impl Command {
    fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            CMD_WRITE => Command::Write,
            CMD_ERASE_WRITE => Command::EraseWrite,
            CMD_ERASE_WRITE_ALTERNATE => Command::EraseWriteAlternate,
            CMD_ERASE_ALL_UNPROTECTED => Command::EraseAllUnprotected,
            CMD_WRITE_STRUCTURED_FIELD => Command::WriteStructuredField,
            CMD_READ_BUFFER => Command::ReadBuffer,
            CMD_READ_MODIFIED => Command::ReadModified,
            CMD_READ_MODIFIED_ALL => Command::ReadModifiedAll,
            _ => return None,
        })
    }

    /// Read-family commands carry no WCC and no body.
    fn is_read_family(self) -> bool {
        matches!(self, Command::ReadBuffer | Command::ReadModified | Command::ReadModifiedAll)
    }
}

/// A decoded order and its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKind {
    StartField(u8),
    StartFieldExtended(Vec<(u8, u8)>),
    SetBufferAddress(Address),
    SetAttribute(u8, u8),
    ModifyField(Vec<(u8, u8)>),
    InsertCursor,
    ProgramTab,
    RepeatToAddress(Address, u8),
    EraseUnprotectedToAddress(Address),
    GraphicEscape(u8),
}

/// Events the parser emits, in wire order, for the executor to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Command byte (+ WCC, for write-family commands) consumed.
    BeginCommand { command: Command, wcc: Option<u8> },
    Order(OrderKind),
    /// One non-order EBCDIC byte in order-or-data mode.
    Data(u8),
    /// Telnet EOR observed; record is complete.
    EndRecord,
}

/// Consumer of parser events. Also receives recoverable-warning notice for
/// `UnknownOrder` in lenient mode (the byte is skipped as data, not fatal).
pub trait EventSink {
    fn event(&mut self, event: Event);
    fn unknown_order_warning(&mut self, byte: u8, position: usize) {
        let _ = (byte, position);
    }
}

/// Runtime policy knobs for the parser (see `SPEC_FULL.md` §9).
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// If true, `UnknownOrder` fails the record instead of being skipped.
    pub strict_unknown_order: bool,
    /// Bytes the parser may accumulate without completing an order or
    /// seeing `EndRecord` before surfacing `ProtocolTimeout`.
    pub stall_ceiling: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig { strict_unknown_order: false, stall_ceiling: 64 * 1024 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Command,
    Wcc(Command),
    OrderOrData(Command),
    /// A fatal parse error occurred; discard bytes until the next `EndRecord`.
    Resyncing,
}

/// Incremental, restartable outbound data-stream parser.
#[derive(Debug)]
pub struct StreamParser {
    pending: Vec<u8>,
    mode: Mode,
    address_mode: AddressMode,
    buffer_size: usize,
    config: ParserConfig,
    position: usize,
}

impl StreamParser {
    pub fn new(address_mode: AddressMode, buffer_size: usize, config: ParserConfig) -> Self {
        StreamParser { pending: Vec::new(), mode: Mode::Command, address_mode, buffer_size, config, position: 0 }
    }

    /// Retarget address decoding, e.g. after `Core` switches between the
    /// primary and alternate screen (their sizes may imply different address
    /// widths and always imply a different valid address range). Only safe
    /// to call between records.
    pub fn set_address_mode(&mut self, address_mode: AddressMode, buffer_size: usize) {
        self.address_mode = address_mode;
        self.buffer_size = buffer_size;
    }

    /// Feed more outbound bytes (already de-IACed by the telnet layer).
    pub fn feed(&mut self, bytes: &[u8], sink: &mut dyn EventSink) -> ParseResult<()> {
        self.pending.extend_from_slice(bytes);
        loop {
            match self.try_step(sink) {
                Ok(true) => continue,
                Ok(false) => break,
                Err(err) => {
                    self.mode = Mode::Resyncing;
                    self.pending.clear();
                    return Err(err);
                }
            }
        }
        if self.pending.len() > self.config.stall_ceiling {
            return Err(ParseError::ProtocolTimeout);
        }
        Ok(())
    }

    /// Called by the telnet adapter once it has consumed `IAC EOR`.
    pub fn end_record(&mut self, sink: &mut dyn EventSink) {
        debug!("end of record; {} bytes left unconsumed", self.pending.len());
        self.pending.clear();
        self.mode = Mode::Command;
        self.position = 0;
        sink.event(Event::EndRecord);
    }

    /// Attempt to consume one unit (command, WCC, order, or data byte) from
    /// `pending`. Returns `Ok(true)` if progress was made (keep looping),
    /// `Ok(false)` if more bytes are needed, or `Err` on a fatal parse error.
    fn try_step(&mut self, sink: &mut dyn EventSink) -> Result<bool, ParseError> {
        match self.mode {
            Mode::Resyncing => {
                self.pending.clear();
                Ok(false)
            }
            Mode::Command => {
                let Some(&byte) = self.pending.first() else { return Ok(false) };
                let command = Command::from_byte(byte).ok_or(ParseError::InvalidCommand { byte, position: self.position })?;
                self.drain(1);
                debug!("begin command {command:?}");
                if command.is_read_family() {
                    sink.event(Event::BeginCommand { command, wcc: None });
                    self.mode = Mode::OrderOrData(command);
                } else {
                    self.mode = Mode::Wcc(command);
                }
                Ok(true)
            }
            Mode::Wcc(command) => {
                let Some(&wcc) = self.pending.first() else { return Ok(false) };
                self.drain(1);
                sink.event(Event::BeginCommand { command, wcc: Some(wcc) });
                self.mode = Mode::OrderOrData(command);
                Ok(true)
            }
            Mode::OrderOrData(command) => {
                let Some(&byte) = self.pending.first() else { return Ok(false) };
                match self.try_order(byte) {
                    OrderAttempt::NotAnOrder => {
                        self.drain(1);
                        trace!("data byte 0x{byte:02X}");
                        sink.event(Event::Data(byte));
                        Ok(true)
                    }
                    OrderAttempt::NeedMoreBytes => Ok(false),
                    OrderAttempt::Invalid(err) => Err(err),
                    OrderAttempt::Unknown => {
                        if self.config.strict_unknown_order {
                            Err(ParseError::UnknownOrder { byte, position: self.position })
                        } else {
                            warn!("unknown order byte 0x{byte:02X} at {}; skipped as data", self.position);
                            sink.unknown_order_warning(byte, self.position);
                            self.drain(1);
                            sink.event(Event::Data(byte));
                            Ok(true)
                        }
                    }
                    OrderAttempt::Order(consumed, kind) => {
                        trace!("order {kind:?}");
                        self.drain(consumed);
                        sink.event(Event::Order(kind));
                        let _ = command;
                        Ok(true)
                    }
                }
            }
        }
    }

    fn try_order(&self, byte: u8) -> OrderAttempt {
        let buf = &self.pending[..];
        match byte {
            ORDER_SF => {
                if buf.len() < 2 { return OrderAttempt::NeedMoreBytes; }
                OrderAttempt::Order(2, OrderKind::StartField(buf[1]))
            }
            ORDER_SFE => {
                if buf.len() < 2 { return OrderAttempt::NeedMoreBytes; }
                let count = buf[1] as usize;
                let needed = 2 + count * 2;
                if buf.len() < needed { return OrderAttempt::NeedMoreBytes; }
                let pairs = (0..count).map(|i| (buf[2 + i * 2], buf[3 + i * 2])).collect();
                OrderAttempt::Order(needed, OrderKind::StartFieldExtended(pairs))
            }
            ORDER_SBA => {
                if buf.len() < 3 { return OrderAttempt::NeedMoreBytes; }
                match self.decode_bounded_address(buf[1], buf[2]) {
                    Ok(addr) => OrderAttempt::Order(3, OrderKind::SetBufferAddress(addr)),
                    Err(err) => OrderAttempt::Invalid(err),
                }
            }
            ORDER_SA => {
                if buf.len() < 3 { return OrderAttempt::NeedMoreBytes; }
                OrderAttempt::Order(3, OrderKind::SetAttribute(buf[1], buf[2]))
            }
            ORDER_MF => {
                if buf.len() < 2 { return OrderAttempt::NeedMoreBytes; }
                let count = buf[1] as usize;
                let needed = 2 + count * 2;
                if buf.len() < needed { return OrderAttempt::NeedMoreBytes; }
                let pairs = (0..count).map(|i| (buf[2 + i * 2], buf[3 + i * 2])).collect();
                OrderAttempt::Order(needed, OrderKind::ModifyField(pairs))
            }
            ORDER_IC => OrderAttempt::Order(1, OrderKind::InsertCursor),
            ORDER_PT => OrderAttempt::Order(1, OrderKind::ProgramTab),
            ORDER_RA => {
                if buf.len() < 4 { return OrderAttempt::NeedMoreBytes; }
                match self.decode_bounded_address(buf[1], buf[2]) {
                    Ok(addr) => OrderAttempt::Order(4, OrderKind::RepeatToAddress(addr, buf[3])),
                    Err(err) => OrderAttempt::Invalid(err),
                }
            }
            ORDER_EUA => {
                if buf.len() < 3 { return OrderAttempt::NeedMoreBytes; }
                match self.decode_bounded_address(buf[1], buf[2]) {
                    Ok(addr) => OrderAttempt::Order(3, OrderKind::EraseUnprotectedToAddress(addr)),
                    Err(err) => OrderAttempt::Invalid(err),
                }
            }
            ORDER_GE => {
                if buf.len() < 2 { return OrderAttempt::NeedMoreBytes; }
                OrderAttempt::Order(2, OrderKind::GraphicEscape(buf[1]))
            }
            _ => OrderAttempt::NotAnOrder,
        }
    }

    /// Decode a 2-byte buffer address and reject one that names a cell
    /// outside this screen's geometry (`spec.md §8`'s "SBA to an address >
    /// rows*cols is rejected as InvalidAddress" boundary behaviour, applied
    /// uniformly to every order that carries an address operand).
    fn decode_bounded_address(&self, b1: u8, b2: u8) -> Result<Address, ParseError> {
        let addr = address::decode_address(b1, b2, self.address_mode, self.position)?;
        if addr as usize >= self.buffer_size {
            return Err(ParseError::InvalidAddress { position: self.position });
        }
        Ok(addr)
    }

    fn drain(&mut self, n: usize) {
        self.pending.drain(..n);
        self.position += n;
    }
}

enum OrderAttempt {
    NotAnOrder,
    NeedMoreBytes,
    Invalid(ParseError),
    Unknown,
    Order(usize, OrderKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }
    impl EventSink for Recorder {
        fn event(&mut self, event: Event) {
            self.events.push(event);
        }
    }

    fn parser() -> StreamParser {
        StreamParser::new(AddressMode::TwelveBit, 1920, ParserConfig::default())
    }

    #[test]
    fn scenario_s1_parses_in_one_feed() {
        let mut p = parser();
        let mut rec = Recorder::default();
        let bytes = [0xF5, 0xC3, 0x11, 0x40, 0x40, 0xC8, 0xC5, 0xD3, 0xD3, 0xD6];
        p.feed(&bytes, &mut rec).unwrap();
        p.end_record(&mut rec);
        assert_eq!(rec.events[0], Event::BeginCommand { command: Command::EraseWrite, wcc: Some(0xC3) });
        assert_eq!(rec.events[1], Event::Order(OrderKind::SetBufferAddress(0)));
        assert_eq!(rec.events.last(), Some(&Event::EndRecord));
    }

    #[test]
    fn split_feed_produces_identical_events() {
        let bytes = [0xF5, 0xC3, 0x11, 0x40, 0x40, 0xC8, 0xC5, 0xD3, 0xD3, 0xD6];
        for split in 0..=bytes.len() {
            let mut whole = parser();
            let mut whole_sink = Recorder::default();
            whole.feed(&bytes, &mut whole_sink).unwrap();
            whole.end_record(&mut whole_sink);

            let mut split_parser = parser();
            let mut split_sink = Recorder::default();
            split_parser.feed(&bytes[..split], &mut split_sink).unwrap();
            split_parser.feed(&bytes[split..], &mut split_sink).unwrap();
            split_parser.end_record(&mut split_sink);

            assert_eq!(whole_sink.events, split_sink.events, "mismatch at split {split}");
        }
    }

    #[test]
    fn read_modified_has_no_wcc_and_no_body() {
        let mut p = parser();
        let mut rec = Recorder::default();
        p.feed(&[0xF6], &mut rec).unwrap();
        p.end_record(&mut rec);
        assert_eq!(rec.events, vec![Event::BeginCommand { command: Command::ReadModified, wcc: None }, Event::EndRecord]);
    }

    #[test]
    fn unknown_command_byte_is_invalid_command() {
        let mut p = parser();
        let mut rec = Recorder::default();
        let err = p.feed(&[0xAB], &mut rec).unwrap_err();
        assert!(matches!(err, ParseError::InvalidCommand { byte: 0xAB, .. }));
    }

    #[test]
    fn unknown_order_skipped_as_data_in_lenient_mode() {
        let mut p = parser();
        let mut rec = Recorder::default();
        // 0xFF is not a recognised order byte.
        p.feed(&[0xF1, 0x00, 0xFF], &mut rec).unwrap();
        assert!(rec.events.contains(&Event::Data(0xFF)));
    }

    #[test]
    fn unknown_order_fails_in_strict_mode() {
        let mut p = StreamParser::new(AddressMode::TwelveBit, 1920, ParserConfig { strict_unknown_order: true, ..ParserConfig::default() });
        let mut rec = Recorder::default();
        let err = p.feed(&[0xF1, 0x00, 0xFF], &mut rec).unwrap_err();
        assert!(matches!(err, ParseError::UnknownOrder { byte: 0xFF, .. }));
    }

    #[test]
    fn sba_beyond_buffer_is_invalid_address() {
        // 12-bit encoding of address 1920 on a 1920-cell buffer: in bounds
        // for the encoding (< 4096) but not for this screen's geometry.
        let mut p = StreamParser::new(AddressMode::TwelveBit, 1920, ParserConfig::default());
        let mut rec = Recorder::default();
        let (hi, lo) = address::encode_address(1920, AddressMode::TwelveBit);
        let err = p.feed(&[0xF1, 0x00, 0x11, hi, lo], &mut rec).unwrap_err();
        assert!(matches!(err, ParseError::InvalidAddress { .. }));
    }

    #[test]
    fn truncated_sba_waits_for_more_bytes() {
        let mut p = parser();
        let mut rec = Recorder::default();
        p.feed(&[0xF1, 0x00, 0x11, 0x40], &mut rec).unwrap();
        assert!(rec.events.iter().all(|e| !matches!(e, Event::Order(_))));
        p.feed(&[0x40], &mut rec).unwrap();
        assert!(rec.events.iter().any(|e| matches!(e, Event::Order(OrderKind::SetBufferAddress(0)))));
    }

    #[test]
    fn sfe_pair_list_parses() {
        let mut p = parser();
        let mut rec = Recorder::default();
        p.feed(&[0xF1, 0x00, 0x29, 0x02, 0x41, 0xF1, 0x42, 0xF2], &mut rec).unwrap();
        assert!(rec.events.contains(&Event::Order(OrderKind::StartFieldExtended(vec![(0x41, 0xF1), (0x42, 0xF2)]))));
    }
}
