//! Executor (component C5): applies parser events to `ScreenBuffer` and
//! `FieldTable` under 3270 order semantics.
//!
//! Grounded on `lib3270::protocol::ProtocolProcessor3270`'s `process_*`
//! handlers, but several of those are bugged in ways this rewrite fixes:
//! `process_insert_cursor` is a literal no-op there; `process_set_attribute`
//! and `process_modify_field` decode their operand bytes and then discard
//! them without applying anything; `repeat_to_address`/
//! `erase_unprotected_to_address` (on `Display3270`, called from here) used
//! an inclusive non-wrapping range, so a stop address numerically less than
//! the current one silently did nothing instead of filling around the wrap,
//! which is the documented real-hardware behaviour this rewrite restores.
//!
//! The Executor itself holds no reference to `ScreenBuffer`/`FieldTable`
//! across calls — only the small amount of state a single command's
//! application needs (`cur`, the transient character attribute, and the
//! in-flight WCC) — matching the data model's "borrows mutable access for
//! the duration of a single command's application" ownership rule. The
//! caller (`Core`) owns the buffers and passes them in per call.

use log::{debug, trace};

use crate::codes::{self, Aid};
use crate::error::{ParseError, ParseResult};
use crate::field::{ExtendedAttributes, Field, FieldAttribute};
use crate::field::FieldTable;
use crate::parser::{Command, OrderKind};
use crate::screen::{Address, ScreenBuffer};

/// A side effect the caller must act on outside the buffers themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// `WCC.sound-alarm` was set; surface an alarm to the outside world.
    Alarm,
    /// `EraseWriteAlternate` was applied; the caller must swap in the
    /// configured alternate-size `ScreenBuffer`/`FieldTable` pair before any
    /// further `Order`/`Data` events in this record are applied.
    SwitchToAlternateScreen,
}

/// Lenient/strict policy for unrecognised SFE/MF extended-attribute pair
/// types — the same switch the parser uses for unknown orders (see
/// `SPEC_FULL.md` §9: "the same lenient/strict switch governs unknown
/// orders and unknown SFE/MF pair types uniformly").
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub strict_unknown_attribute_type: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig { strict_unknown_attribute_type: false }
    }
}

/// Per-command application state: current address, the transient character
/// attribute set by SA (not persisted into `Cell`, which stores only the raw
/// EBCDIC byte — see `SPEC_FULL.md` §3), and the in-flight WCC.
#[derive(Debug)]
pub struct Executor {
    config: ExecutorConfig,
    cur: Address,
    char_attr: ExtendedAttributes,
    ge_pending: bool,
    pending_wcc: Option<u8>,
    position: usize,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Executor { config, cur: 0, char_attr: ExtendedAttributes::default(), ge_pending: false, pending_wcc: None, position: 0 }
    }

    pub fn current_address(&self) -> Address {
        self.cur
    }

    /// Whether the next `Data` byte follows a `GraphicEscape` order (i.e.
    /// should be interpreted from the alternate character set, not
    /// implemented here — see module docs).
    pub fn graphic_escape_pending(&self) -> bool {
        self.ge_pending
    }

    /// Apply a `BeginCommand` event: the command's pre-order screen effect,
    /// and (if this is a write-family command) the WCC's reset-MDT effect,
    /// which happens *before* any orders per §4.4.
    pub fn begin_command(&mut self, command: Command, wcc: Option<u8>, screen: &mut ScreenBuffer, fields: &mut FieldTable) -> Effect {
        debug!("executor: begin {command:?} wcc={wcc:?}");
        self.position = 0;
        self.char_attr = ExtendedAttributes::default();
        self.ge_pending = false;
        self.pending_wcc = wcc;

        let mut effect = Effect::None;
        match command {
            Command::Write => {
                self.cur = screen.cursor();
            }
            Command::EraseWrite => {
                screen.clear();
                fields.reset();
                self.cur = 0;
            }
            Command::EraseWriteAlternate => {
                effect = Effect::SwitchToAlternateScreen;
                screen.clear();
                fields.reset();
                self.cur = 0;
            }
            Command::EraseAllUnprotected => {
                self.cur = screen.cursor();
                clear_unprotected(screen, fields);
            }
            Command::ReadBuffer | Command::ReadModified | Command::ReadModifiedAll | Command::WriteStructuredField => {
                // No screen mutation; Replier (for reads) or the
                // structured-field framing skip (§9) handles these.
            }
        }

        if let Some(wcc) = wcc {
            if wcc & codes::WCC_RESET_MDT != 0 {
                reset_all_mdt(fields);
            }
        }
        effect
    }

    /// Apply one decoded order.
    pub fn apply_order(&mut self, order: &OrderKind, screen: &mut ScreenBuffer, fields: &mut FieldTable) -> ParseResult<()> {
        trace!("executor: order {order:?} at cur={}", self.cur);
        self.position += 1;
        match order {
            OrderKind::StartField(attr_byte) => {
                let id = fields.add_field(self.cur, FieldAttribute::new(*attr_byte));
                let glyph = fields.get(id).attribute.base_byte();
                screen.write(self.cur, glyph);
                self.cur = screen.next_address(self.cur, 1);
                self.char_attr = ExtendedAttributes::default();
            }
            OrderKind::StartFieldExtended(pairs) => {
                let mut attribute = FieldAttribute::default();
                self.apply_pairs_to(pairs, &mut attribute)?;
                let id = fields.add_field(self.cur, attribute);
                let glyph = fields.get(id).attribute.base_byte();
                screen.write(self.cur, glyph);
                self.cur = screen.next_address(self.cur, 1);
                self.char_attr = ExtendedAttributes::default();
            }
            OrderKind::SetBufferAddress(addr) => {
                self.cur = *addr;
            }
            OrderKind::SetAttribute(kind, value) => {
                let mut attr = self.char_attr;
                self.apply_pair_to_extended(*kind, *value, &mut attr)?;
                self.char_attr = attr;
            }
            OrderKind::ModifyField(pairs) => {
                let id = fields.field_id_at(self.cur);
                let mut attribute = fields.get(id).attribute;
                self.apply_pairs_to(pairs, &mut attribute)?;
                fields.get_mut(id).attribute = attribute;
            }
            OrderKind::InsertCursor => {
                screen.set_cursor(self.cur);
            }
            OrderKind::ProgramTab => {
                self.apply_program_tab(fields);
                self.char_attr = ExtendedAttributes::default();
            }
            OrderKind::RepeatToAddress(stop, ch) => {
                self.apply_repeat_to_address(*stop, *ch, screen);
            }
            OrderKind::EraseUnprotectedToAddress(stop) => {
                self.apply_erase_unprotected_to_address(*stop, screen, fields);
            }
            OrderKind::GraphicEscape(_byte) => {
                // Alternate (APL/text) character set selection for the next
                // data byte. No alternate glyph table is implemented (out of
                // scope per spec.md §1's symbol-set Non-goal); the flag is
                // tracked only so the next Data byte is still consumed
                // correctly and doesn't desync `cur`.
                self.ge_pending = true;
            }
        }
        Ok(())
    }

    /// Apply one literal data byte: written as-is (the chosen `Cell`
    /// representation stores the raw EBCDIC byte, not a decoded glyph).
    pub fn apply_data(&mut self, byte: u8, screen: &mut ScreenBuffer) {
        self.position += 1;
        screen.write(self.cur, byte);
        self.cur = screen.next_address(self.cur, 1);
        self.ge_pending = false;
    }

    /// Apply the WCC's keyboard-restore and sound-alarm effects, which fire
    /// at `EndRecord`, not at `BeginCommand`.
    pub fn end_record(&mut self, screen: &mut ScreenBuffer) -> Effect {
        let wcc = self.pending_wcc.take();
        let Some(wcc) = wcc else { return Effect::None };
        if wcc & codes::WCC_RESTORE_KEYBOARD != 0 {
            screen.unlock_keyboard();
        }
        if wcc & codes::WCC_SOUND_ALARM != 0 {
            screen.request_alarm();
            return Effect::Alarm;
        }
        Effect::None
    }

    fn apply_program_tab(&mut self, fields: &FieldTable) {
        let n = fields.fields().len();
        if n == 0 {
            return;
        }
        let start_id = fields.field_id_at(self.cur);
        let buffer_size = fields.buffer_size();
        for step in 1..=n {
            let id = (start_id + step) % n;
            let field: &Field = fields.get(id);
            if !field.attribute.is_protected() {
                self.cur = ((field.start_address as usize + 1) % buffer_size) as Address;
                return;
            }
        }
    }

    fn apply_repeat_to_address(&mut self, stop: Address, ch: u8, screen: &mut ScreenBuffer) {
        let size = screen.buffer_size();
        let count = if stop == self.cur { size } else { wrap_distance(self.cur, stop, size) };
        for i in 0..count {
            let addr = screen.next_address(self.cur, i);
            screen.write(addr, ch);
        }
        self.cur = stop;
    }

    fn apply_erase_unprotected_to_address(&mut self, stop: Address, screen: &mut ScreenBuffer, fields: &FieldTable) {
        let size = screen.buffer_size();
        let count = if stop == self.cur { size } else { wrap_distance(self.cur, stop, size) };
        for i in 0..count {
            let addr = screen.next_address(self.cur, i);
            if !fields.field_at(addr).is_protected() {
                screen.write(addr, 0x00);
            }
        }
        self.cur = stop;
    }

    fn apply_pairs_to(&mut self, pairs: &[(u8, u8)], attribute: &mut FieldAttribute) -> ParseResult<()> {
        for &(kind, value) in pairs {
            if kind == codes::XA_BASIC {
                *attribute = FieldAttribute::new(value);
            } else {
                let mut extended = attribute.extended;
                self.apply_pair_to_extended(kind, value, &mut extended)?;
                attribute.extended = extended;
            }
        }
        Ok(())
    }

    fn apply_pair_to_extended(&mut self, kind: u8, value: u8, extended: &mut ExtendedAttributes) -> ParseResult<()> {
        match kind {
            codes::XA_HIGHLIGHTING => extended.highlighting = Some(value),
            codes::XA_FOREGROUND => extended.foreground_color = Some(value),
            codes::XA_BACKGROUND => extended.background_color = Some(value),
            codes::XA_CHARSET => extended.character_set = Some(value),
            codes::XA_VALIDATION => extended.validation = Some(value),
            codes::XA_OUTLINING => extended.outlining = Some(value),
            _ => {
                if self.config.strict_unknown_attribute_type {
                    return Err(ParseError::UnknownOrder { byte: kind, position: self.position });
                }
            }
        }
        Ok(())
    }
}

/// `(stop - cur) mod size`, the number of cells strictly between `cur` and
/// `stop` (exclusive of `stop`) walking forward with wraparound.
fn wrap_distance(cur: Address, stop: Address, size: usize) -> usize {
    ((stop as usize) + size - (cur as usize)) % size
}

fn clear_unprotected(screen: &mut ScreenBuffer, fields: &mut FieldTable) {
    let unprotected_ids: Vec<_> = fields
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.attribute.is_protected())
        .map(|(id, _)| id)
        .collect();
    for &id in &unprotected_ids {
        let field = *fields.get(id);
        for offset in 0..field.length {
            let addr = ((field.start_address as usize + offset) % screen.buffer_size()) as Address;
            screen.write(addr, 0x00);
        }
        fields.set_mdt(id, false);
    }
}

fn reset_all_mdt(fields: &mut FieldTable) {
    for id in 0..fields.fields().len() {
        fields.set_mdt(id, false);
    }
}

/// The AID-arming half of operator input (`Core::press_aid` delegates here).
pub fn press_aid(aid: Aid, screen: &mut ScreenBuffer) {
    screen.arm_aid(aid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldAttribute;

    fn setup(rows: usize, cols: usize) -> (ScreenBuffer, FieldTable, Executor) {
        let screen = ScreenBuffer::new(rows, cols);
        let fields = FieldTable::new(rows * cols);
        let executor = Executor::new(ExecutorConfig::default());
        (screen, fields, executor)
    }

    #[test]
    fn scenario_s1_erase_write_hello() {
        let (mut screen, mut fields, mut executor) = setup(24, 80);
        executor.begin_command(Command::EraseWrite, Some(0xC3), &mut screen, &mut fields);
        executor.apply_order(&OrderKind::SetBufferAddress(0), &mut screen, &mut fields).unwrap();
        for b in [0xC8, 0xC5, 0xD3, 0xD3, 0xD6] {
            executor.apply_data(b, &mut screen);
        }
        executor.end_record(&mut screen);
        assert_eq!(screen.read(0).code_point, 0xC8);
        assert_eq!(executor.current_address(), 5);
        assert!(!screen.is_keyboard_locked());
        assert_eq!(fields.modified_fields().count(), 0);
    }

    #[test]
    fn scenario_s4_repeat_to_address_wraps_full_buffer() {
        let (mut screen, mut fields, mut executor) = setup(24, 80);
        executor.begin_command(Command::EraseWrite, Some(0x00), &mut screen, &mut fields);
        executor.apply_order(&OrderKind::SetBufferAddress(0), &mut screen, &mut fields).unwrap();
        executor.apply_order(&OrderKind::RepeatToAddress(0, b'X'), &mut screen, &mut fields).unwrap();
        for addr in 0..screen.buffer_size() as Address {
            assert_eq!(screen.read(addr).code_point, b'X');
        }
        assert_eq!(executor.current_address(), 0);
    }

    #[test]
    fn start_field_writes_attribute_cell_and_advances_cursor() {
        let (mut screen, mut fields, mut executor) = setup(24, 80);
        executor.begin_command(Command::EraseWrite, Some(0x00), &mut screen, &mut fields);
        executor.apply_order(&OrderKind::StartField(0x20), &mut screen, &mut fields).unwrap();
        assert!(fields.field_at(0).is_protected());
        assert_eq!(executor.current_address(), 1);
    }

    #[test]
    fn insert_cursor_sets_screen_cursor_to_current_address() {
        let (mut screen, mut fields, mut executor) = setup(24, 80);
        executor.begin_command(Command::EraseWrite, Some(0x00), &mut screen, &mut fields);
        executor.apply_order(&OrderKind::SetBufferAddress(42), &mut screen, &mut fields).unwrap();
        executor.apply_order(&OrderKind::InsertCursor, &mut screen, &mut fields).unwrap();
        assert_eq!(screen.cursor(), 42);
    }

    #[test]
    fn erase_all_unprotected_resets_mdt_and_clears_cells() {
        let (mut screen, mut fields, mut executor) = setup(24, 80);
        executor.begin_command(Command::EraseWrite, Some(0x00), &mut screen, &mut fields);
        let id = fields.add_field(10, FieldAttribute::new(0));
        fields.set_mdt(id, true);
        screen.write(11, 0xC1);
        executor.begin_command(Command::EraseAllUnprotected, Some(0x00), &mut screen, &mut fields);
        assert!(!fields.get(id).attribute.is_modified());
        assert_eq!(screen.read(11).code_point, 0);
    }

    #[test]
    fn program_tab_lands_on_next_unprotected_field_content() {
        let (mut screen, mut fields, mut executor) = setup(24, 80);
        executor.begin_command(Command::EraseWrite, Some(0x00), &mut screen, &mut fields);
        fields.add_field(10, FieldAttribute::new(0x20)); // protected
        fields.add_field(20, FieldAttribute::new(0x00)); // unprotected
        executor.apply_order(&OrderKind::SetBufferAddress(0), &mut screen, &mut fields).unwrap();
        executor.apply_order(&OrderKind::ProgramTab, &mut screen, &mut fields).unwrap();
        assert_eq!(executor.current_address(), 21);
    }

    #[test]
    fn sfe_basic_pair_sets_protected_flag() {
        let (mut screen, mut fields, mut executor) = setup(24, 80);
        executor.begin_command(Command::EraseWrite, Some(0x00), &mut screen, &mut fields);
        executor
            .apply_order(&OrderKind::StartFieldExtended(vec![(codes::XA_BASIC, 0x20)]), &mut screen, &mut fields)
            .unwrap();
        assert!(fields.field_at(0).is_protected());
    }

    #[test]
    fn unknown_attribute_type_strict_mode_errors() {
        let mut executor = Executor::new(ExecutorConfig { strict_unknown_attribute_type: true });
        let mut screen = ScreenBuffer::new(24, 80);
        let mut fields = FieldTable::new(1920);
        executor.begin_command(Command::EraseWrite, Some(0x00), &mut screen, &mut fields);
        let result = executor.apply_order(&OrderKind::StartFieldExtended(vec![(0xEE, 0x01)]), &mut screen, &mut fields);
        assert!(result.is_err());
    }

    #[test]
    fn wcc_reset_mdt_applies_before_orders() {
        let (mut screen, mut fields, mut executor) = setup(24, 80);
        let id = fields.add_field(10, FieldAttribute::new(0));
        fields.set_mdt(id, true);
        executor.begin_command(Command::Write, Some(codes::WCC_RESET_MDT), &mut screen, &mut fields);
        assert!(!fields.get(id).attribute.is_modified());
    }

    #[test]
    fn graphic_escape_flag_clears_on_next_data_byte() {
        let (mut screen, mut fields, mut executor) = setup(24, 80);
        executor.begin_command(Command::EraseWrite, Some(0x00), &mut screen, &mut fields);
        executor.apply_order(&OrderKind::GraphicEscape(0x41), &mut screen, &mut fields).unwrap();
        assert!(executor.graphic_escape_pending());
        executor.apply_data(0xC1, &mut screen);
        assert!(!executor.graphic_escape_pending());
    }

    #[test]
    fn alarm_effect_surfaces_at_end_record() {
        let (mut screen, mut fields, mut executor) = setup(24, 80);
        executor.begin_command(Command::Write, Some(codes::WCC_SOUND_ALARM), &mut screen, &mut fields);
        let effect = executor.end_record(&mut screen);
        assert_eq!(effect, Effect::Alarm);
        assert!(screen.take_alarm());
    }
}
