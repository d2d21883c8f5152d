//! Core facade (component C1-C6 wiring, §4.8, AMBIENT).
//!
//! `Core` is the single per-session, single-threaded object `spec.md §5`
//! describes: it owns one primary and one pre-configured alternate
//! `(ScreenBuffer, FieldTable)` pair, one `StreamParser`, one `Executor`, one
//! `Codec`, and the `TelnetAdapter` that sits in front of them. Nothing here
//! has a teacher counterpart as a single type — it plays the role the
//! teacher's `Session`/`Controller` pair plays, but built bottom-up from the
//! components above rather than carrying over either of those types' wider
//! responsibilities (connection management, UI state) which are explicitly
//! out of scope (`spec.md §1`).
//!
//! `EraseWrite`/`EraseWriteAlternate` select which buffer pair is active
//! *before* the executor clears it, not after reading the returned
//! [`Effect`] — the effect is still surfaced to the caller (e.g. for
//! logging), but by the time `begin_command` runs, `Core` has already
//! decided which geometry it is clearing.

use log::{info, warn};

use crate::address::AddressMode;
use crate::codec::{CodePage, Codec};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::executor::{self, Effect, Executor};
use crate::field::{Field, FieldTable};
use crate::parser::{Command, Event, EventSink, StreamParser};
use crate::replier::{self, ReplyRequest};
use crate::screen::{Address, ScreenBuffer};
use crate::telnet::{TelnetAdapter, TelnetSink};

pub use crate::codes::Aid;

type BufferPair = (ScreenBuffer, FieldTable);

fn new_pair(rows: usize, cols: usize) -> BufferPair {
    (ScreenBuffer::new(rows, cols), FieldTable::new(rows * cols))
}

/// Read-only view of one field, for [`ScreenSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSnapshot {
    pub start_address: Address,
    pub length: usize,
    pub protected: bool,
    pub numeric: bool,
    pub modified: bool,
}

impl From<&Field> for FieldSnapshot {
    fn from(field: &Field) -> Self {
        FieldSnapshot {
            start_address: field.start_address,
            length: field.length,
            protected: field.attribute.is_protected(),
            numeric: field.attribute.is_numeric(),
            modified: field.attribute.is_modified(),
        }
    }
}

/// A read-only snapshot of the currently active screen: raw cell bytes
/// (row-major, one `code_point` per cell), the field table, and cursor
/// state. `spec.md §6`'s `Core.snapshot_screen()`.
#[derive(Debug, Clone)]
pub struct ScreenSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub cursor: Address,
    pub keyboard_locked: bool,
    pub cells: Vec<u8>,
    pub fields: Vec<FieldSnapshot>,
}

impl ScreenSnapshot {
    /// Decode `cells` through `codec` into a host-readable `String`, row by
    /// row with `\n` separators.
    pub fn decode_text(&self, codec: &Codec) -> String {
        self.cells
            .chunks(self.cols)
            .map(|row| codec.decode_alloc(row))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The outcome of one [`Core::feed`] call.
#[derive(Debug, Clone, Default)]
pub struct FeedOutcome {
    /// Number of `EndRecord` events observed (0 if `bytes` contained no
    /// complete record, e.g. a fragment still awaiting more data).
    pub records_completed: usize,
    /// Telnet negotiation reply bytes that must be written back to the
    /// socket, if any.
    pub telnet_reply: Vec<u8>,
}

enum Segment {
    Data(Vec<u8>),
    EndRecord,
}

#[derive(Default)]
struct Collector(Vec<Segment>);

impl TelnetSink for Collector {
    fn data(&mut self, bytes: &[u8]) {
        self.0.push(Segment::Data(bytes.to_vec()));
    }
    fn end_record(&mut self) {
        self.0.push(Segment::EndRecord);
    }
}

/// Bridges parser `Event`s to the executor, holding the buffer-pair
/// selection for the duration of one `feed` call. Not exposed outside this
/// module — `Core` is the only thing that drives a `StreamParser`.
struct Dispatch<'a> {
    executor: &'a mut Executor,
    primary: &'a mut BufferPair,
    alternate: &'a mut BufferPair,
    using_alternate: &'a mut bool,
    effects: Vec<Effect>,
    error: Option<CoreError>,
    aborted_record: bool,
    records_completed: usize,
    new_address_mode: Option<(AddressMode, usize)>,
}

impl<'a> Dispatch<'a> {
    fn active(&mut self) -> (&mut ScreenBuffer, &mut FieldTable) {
        let pair: &mut BufferPair = if *self.using_alternate { &mut *self.alternate } else { &mut *self.primary };
        (&mut pair.0, &mut pair.1)
    }
}

impl<'a> EventSink for Dispatch<'a> {
    fn event(&mut self, event: Event) {
        match event {
            Event::BeginCommand { command, wcc } => {
                self.aborted_record = false;
                match command {
                    Command::EraseWrite => *self.using_alternate = false,
                    Command::EraseWriteAlternate => *self.using_alternate = true,
                    _ => {}
                }
                if matches!(command, Command::EraseWrite | Command::EraseWriteAlternate) {
                    let (screen, _) = self.active();
                    let size = screen.buffer_size();
                    self.new_address_mode = Some((AddressMode::for_buffer_size(size), size));
                }
                let (screen, fields) = self.active();
                let effect = self.executor.begin_command(command, wcc, screen, fields);
                if effect != Effect::None {
                    self.effects.push(effect);
                }
            }
            Event::Order(order) => {
                if self.aborted_record {
                    return;
                }
                let (screen, fields) = self.active();
                if let Err(err) = self.executor.apply_order(&order, screen, fields) {
                    warn!("executor rejected order, discarding rest of record: {err}");
                    self.error.get_or_insert(CoreError::Parse(err));
                    self.aborted_record = true;
                }
            }
            Event::Data(byte) => {
                if self.aborted_record {
                    return;
                }
                let (screen, _) = self.active();
                self.executor.apply_data(byte, screen);
            }
            Event::EndRecord => {
                if !self.aborted_record {
                    let (screen, _) = self.active();
                    let effect = self.executor.end_record(screen);
                    if effect != Effect::None {
                        self.effects.push(effect);
                    }
                }
                self.aborted_record = false;
                self.records_completed += 1;
            }
        }
    }
}

/// Owns the whole TN3270 session state: screen geometry (primary and
/// alternate), field table, parser, executor, codec, and telnet framing.
/// Single-threaded, single session per instance (`spec.md §5`).
pub struct Core {
    config: CoreConfig,
    codec: Codec,
    telnet: TelnetAdapter,
    parser: StreamParser,
    executor: Executor,
    primary: BufferPair,
    alternate: BufferPair,
    using_alternate: bool,
    alarm_pending: bool,
}

impl Core {
    /// Construct with the given primary geometry and codepage, and the rest
    /// of `CoreConfig` left at its defaults (a Model 3 alternate screen,
    /// lenient unknown-order policy). Matches `spec.md §6`'s `Core.new`.
    pub fn new(rows: usize, cols: usize, codepage: CodePage) -> Self {
        let mut config = CoreConfig { codepage, ..CoreConfig::default() };
        config.screen_size = crate::screen::ScreenSize::Custom { rows: rows as u16, cols: cols as u16 };
        Self::with_config(config)
    }

    /// Construct with full control over geometry, codepage, and policy.
    pub fn with_config(config: CoreConfig) -> Self {
        let primary = new_pair(config.screen_size.rows(), config.screen_size.cols());
        let alternate = new_pair(config.alternate_screen_size.rows(), config.alternate_screen_size.cols());
        let address_mode = AddressMode::for_buffer_size(primary.0.buffer_size());
        let parser_config = crate::parser::ParserConfig { strict_unknown_order: config.is_strict(), stall_ceiling: config.stall_ceiling };
        let executor_config = crate::executor::ExecutorConfig { strict_unknown_attribute_type: config.is_strict() };
        info!("core: new session, primary {}x{}", config.screen_size.rows(), config.screen_size.cols());
        Core {
            codec: Codec::new(config.codepage),
            telnet: TelnetAdapter::new(config.terminal_type.clone()),
            parser: StreamParser::new(address_mode, primary.0.buffer_size(), parser_config),
            executor: Executor::new(executor_config),
            primary,
            alternate,
            using_alternate: false,
            alarm_pending: false,
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The byte sequence to send unprompted at connect time (Telnet option
    /// offers for BINARY/EOR/TERMINAL-TYPE).
    pub fn telnet_greeting(&self) -> Vec<u8> {
        TelnetAdapter::greeting()
    }

    fn active(&self) -> (&ScreenBuffer, &FieldTable) {
        let pair = if self.using_alternate { &self.alternate } else { &self.primary };
        (&pair.0, &pair.1)
    }

    fn active_mut(&mut self) -> (&mut ScreenBuffer, &mut FieldTable) {
        let pair = if self.using_alternate { &mut self.alternate } else { &mut self.primary };
        (&mut pair.0, &mut pair.1)
    }

    /// Feed raw bytes off the wire (Telnet framing included). Drives the
    /// telnet adapter, the stream parser, and the executor in sequence, and
    /// returns how many records completed plus any Telnet reply bytes that
    /// must be written back to the socket.
    pub fn feed(&mut self, bytes: &[u8]) -> CoreResult<FeedOutcome> {
        let mut collector = Collector::default();
        let telnet_reply = self.telnet.feed(bytes, &mut collector);

        let mut dispatch = Dispatch {
            executor: &mut self.executor,
            primary: &mut self.primary,
            alternate: &mut self.alternate,
            using_alternate: &mut self.using_alternate,
            effects: Vec::new(),
            error: None,
            aborted_record: false,
            records_completed: 0,
            new_address_mode: None,
        };

        let mut parse_error = None;
        for segment in collector.0 {
            match segment {
                Segment::Data(data) => {
                    if let Err(err) = self.parser.feed(&data, &mut dispatch) {
                        parse_error = Some(err);
                        break;
                    }
                }
                Segment::EndRecord => {
                    self.parser.end_record(&mut dispatch);
                }
            }
        }

        let effects = dispatch.effects;
        let exec_error = dispatch.error;
        let records_completed = dispatch.records_completed;
        let new_address_mode = dispatch.new_address_mode;
        drop(dispatch);

        if let Some((mode, size)) = new_address_mode {
            self.parser.set_address_mode(mode, size);
        }
        for effect in effects {
            if effect == Effect::Alarm {
                self.alarm_pending = true;
            }
        }

        if let Some(err) = parse_error {
            return Err(CoreError::Parse(err));
        }
        if let Some(err) = exec_error {
            return Err(err);
        }
        Ok(FeedOutcome { records_completed, telnet_reply })
    }

    /// A read-only view of the currently active screen: cells, fields, and
    /// cursor. `spec.md §6`'s `Core.snapshot_screen()`.
    pub fn snapshot_screen(&self) -> ScreenSnapshot {
        let (screen, fields) = self.active();
        let cells = (0..screen.buffer_size() as Address).map(|addr| screen.read(addr).code_point).collect();
        let fields = fields.fields().iter().map(FieldSnapshot::from).collect();
        ScreenSnapshot {
            rows: screen.rows(),
            cols: screen.cols(),
            cursor: screen.cursor(),
            keyboard_locked: screen.is_keyboard_locked(),
            cells,
            fields,
        }
    }

    /// Whether a sound-alarm WCC has fired since the last call, clearing it.
    pub fn take_alarm(&mut self) -> bool {
        std::mem::take(&mut self.alarm_pending)
    }

    /// Arm `aid` as the operator's attention key. `spec.md §6`'s
    /// `Core.press_aid(aid)`.
    pub fn press_aid(&mut self, aid: Aid) -> CoreResult<()> {
        let (screen, _) = self.active_mut();
        if screen.is_keyboard_locked() {
            return Err(crate::error::ScreenError::KeyboardLocked.into());
        }
        executor::press_aid(aid, screen);
        Ok(())
    }

    /// Write operator input starting at `addr` into the governing field,
    /// setting its MDT bit. Rejects the entire input with no partial write
    /// on the first invalid byte (`SPEC_FULL.md` §9's resolution for numeric
    /// field validation). `spec.md §6`'s `Core.type(addr, chars)`, renamed
    /// because `type` is a reserved word.
    pub fn type_input(&mut self, addr: Address, text: &str) -> CoreResult<()> {
        let bytes = self.codec.encode_alloc(text)?;
        let (screen, fields) = self.active_mut();
        if screen.is_keyboard_locked() {
            return Err(crate::error::ScreenError::KeyboardLocked.into());
        }

        let field_id = fields.field_id_at(addr);
        let field = *fields.get(field_id);
        if field.attribute.is_protected() {
            return Err(crate::error::ScreenError::ProtectedWrite { address: addr }.into());
        }

        let (content_start, content_len) = if field.synthetic {
            (field.start_address, field.length)
        } else {
            (screen.next_address(field.start_address, 1), field.length.saturating_sub(1))
        };
        let offset = wrap_offset(content_start, addr, screen.buffer_size());
        if offset + bytes.len() > content_len {
            return Err(crate::error::ScreenError::FieldOverflow { address: addr, length: content_len }.into());
        }

        if field.attribute.is_numeric() && bytes.iter().any(|&b| !(0xF0..=0xF9).contains(&b)) {
            return Err(crate::error::ScreenError::NumericOnly { address: addr }.into());
        }

        for (i, &b) in bytes.iter().enumerate() {
            let target = screen.next_address(addr, i);
            screen.write(target, b);
        }
        fields.set_mdt(field_id, true);
        // The cursor follows the operator's typing, landing just past the
        // last character written (matches real 3270 keyboard behavior).
        screen.set_cursor(screen.next_address(addr, bytes.len()));
        Ok(())
    }

    /// Build a reply frame into `out`. `spec.md §6`'s
    /// `Core.build_reply(kind, into)`.
    pub fn build_reply(&mut self, request: ReplyRequest, out: &mut [u8]) -> CoreResult<usize> {
        let mode = AddressMode::for_buffer_size(self.active().0.buffer_size());
        let (screen, fields) = self.active_mut();
        replier::build(request, screen, fields, mode, out).map_err(CoreError::from)
    }

    /// Frame `reply_bytes` for the wire: Telnet IAC-doubling plus a
    /// terminating `IAC EOR`.
    pub fn frame_for_wire(&self, reply_bytes: &[u8]) -> Vec<u8> {
        crate::telnet::frame_outbound(reply_bytes)
    }
}

/// Forward distance from `start` to `addr`, wrapping at `size`.
fn wrap_offset(start: Address, addr: Address, size: usize) -> usize {
    ((addr as usize) + size - (start as usize)) % size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::Aid;

    fn feed_record(core: &mut Core, data: &[u8]) -> FeedOutcome {
        let mut framed = data.to_vec();
        framed.extend_from_slice(&[0xFF, 0xEF]); // IAC EOR
        core.feed(&framed).unwrap()
    }

    #[test]
    fn scenario_s1_erase_write_hello_snapshot() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        let outcome = feed_record(&mut core, &[0xF5, 0xC3, 0x11, 0x40, 0x40, 0xC8, 0xC5, 0xD3, 0xD3, 0xD6]);
        assert_eq!(outcome.records_completed, 1);
        let snap = core.snapshot_screen();
        assert_eq!(&snap.cells[0..5], &[0xC8, 0xC5, 0xD3, 0xD3, 0xD6]);
        assert!(!snap.keyboard_locked);
    }

    #[test]
    fn erase_write_alternate_switches_geometry() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        feed_record(&mut core, &[0x7E, 0x00]);
        let snap = core.snapshot_screen();
        assert_eq!(snap.rows, 32);
        assert_eq!(snap.cols, 80);
    }

    #[test]
    fn erase_write_switches_back_to_primary() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        feed_record(&mut core, &[0x7E, 0x00]);
        feed_record(&mut core, &[0xF5, 0x00]);
        let snap = core.snapshot_screen();
        assert_eq!(snap.rows, 24);
    }

    #[test]
    fn press_aid_while_unlocked_then_build_reply() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        feed_record(&mut core, &[0xF5, 0xC3, 0x11, 0x40, 0x40, 0xC8, 0xC5, 0xD3, 0xD3, 0xD6]);
        core.press_aid(Aid::Enter).unwrap();
        let mut out = [0u8; 64];
        let n = core.build_reply(ReplyRequest::ReadModified, &mut out).unwrap();
        assert_eq!(out[0], Aid::Enter.to_byte());
        assert!(n >= 3);
    }

    #[test]
    fn press_aid_rejected_while_keyboard_locked() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        let err = core.press_aid(Aid::Enter).unwrap_err();
        assert!(matches!(err, CoreError::Screen(crate::error::ScreenError::KeyboardLocked)));
    }

    #[test]
    fn type_input_sets_mdt_and_writes_bytes() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        // EraseWrite, unlock keyboard (WCC restore-keyboard), SF unprotected at 0.
        feed_record(&mut core, &[0xF5, 0x02, 0x11, 0x40, 0x40, 0x1D, 0x00]);
        core.type_input(1, "HI").unwrap();
        let snap = core.snapshot_screen();
        assert_eq!(snap.cells[1], core.codec.encode('H').unwrap());
        assert!(snap.fields.iter().any(|f| f.modified));
    }

    #[test]
    fn type_input_rejects_protected_field() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        feed_record(&mut core, &[0xF5, 0x02, 0x11, 0x40, 0x40, 0x1D, 0x20]);
        let err = core.type_input(1, "H").unwrap_err();
        assert!(matches!(err, CoreError::Screen(crate::error::ScreenError::ProtectedWrite { .. })));
    }

    #[test]
    fn type_input_rejects_entire_paste_on_bad_numeric_byte() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        // numeric unprotected field (0x10) at address 0.
        feed_record(&mut core, &[0xF5, 0x02, 0x11, 0x40, 0x40, 0x1D, 0x10]);
        let err = core.type_input(1, "1X").unwrap_err();
        assert!(matches!(err, CoreError::Screen(crate::error::ScreenError::NumericOnly { .. })));
        let snap = core.snapshot_screen();
        assert_eq!(snap.cells[1], 0); // no partial write
    }

    #[test]
    fn type_input_on_unformatted_screen_writes_into_synthetic_field() {
        // EraseWrite, unlock keyboard, no SF order at all: the whole buffer
        // is still the synthetic field `FieldTable::reset()` installs, with
        // no attribute cell consuming address 0.
        let mut core = Core::new(24, 80, CodePage::Cp037);
        feed_record(&mut core, &[0xF5, 0x02]);
        core.type_input(0, "X").unwrap();
        let snap = core.snapshot_screen();
        assert_eq!(snap.cells[0], core.codec.encode('X').unwrap());
        assert!(snap.fields.iter().any(|f| f.modified));
    }

    #[test]
    fn type_input_rejects_field_overflow() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        // unprotected field at 0, next field (protected) starts at 4, content is addrs 1..4.
        feed_record(&mut core, &[0xF5, 0x02, 0x11, 0x40, 0x40, 0x1D, 0x00, 0x11, 0x40, 0x44, 0x1D, 0x20]);
        let err = core.type_input(1, "TOOLONG").unwrap_err();
        assert!(matches!(err, CoreError::Screen(crate::error::ScreenError::FieldOverflow { .. })));
    }

    #[test]
    fn split_feed_across_records_reports_records_completed() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        let outcome1 = core.feed(&[0xF5, 0x00]).unwrap();
        assert_eq!(outcome1.records_completed, 0);
        let outcome2 = core.feed(&[0xFF, 0xEF]).unwrap();
        assert_eq!(outcome2.records_completed, 1);
    }

    #[test]
    fn telnet_negotiation_reply_surfaces_from_feed() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        let outcome = core.feed(&[0xFF, 0xFD, 0x00]).unwrap(); // IAC DO BINARY
        assert_eq!(outcome.telnet_reply, vec![0xFF, 0xFB, 0x00]); // IAC WILL BINARY
    }

    #[test]
    fn invalid_command_byte_surfaces_as_core_error() {
        let mut core = Core::new(24, 80, CodePage::Cp037);
        let err = core.feed(&[0xAB, 0xFF, 0xEF]).unwrap_err();
        assert!(matches!(err, CoreError::Parse(crate::error::ParseError::InvalidCommand { .. })));
    }
}
