//! Screen buffer (component C2): fixed-geometry character grid, cursor,
//! keyboard lock, and wrap-around address arithmetic.
//!
//! Grounded on `lib3270::display::Display3270`, generalized from its fixed
//! `ScreenSize` enum to arbitrary `(rows, cols)` geometry (sessions bind to
//! whatever the host negotiates) and fixing two bugs present there:
//! `repeat_to_address`/`erase_unprotected_to_address` used an inclusive
//! `start..=end` range with no wraparound, so a stop address numerically
//! less than the current address silently did nothing instead of wrapping;
//! here wraparound is handled by the caller (the executor) walking
//! `next_address` rather than a raw range.

use serde::{Deserialize, Serialize};

use crate::codes::Aid;
use crate::error::{ScreenError, ScreenResult};
use crate::field::FieldTable;

/// A buffer address: an offset into `[0, rows*cols)`, row-major.
pub type Address = u16;

/// Named standard 3270 geometries, plus an escape hatch for anything else a
/// host might bind to (e.g. a negotiated alternate screen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenSize {
    /// Model 2: 24x80 (1920 cells).
    Model2,
    /// Model 3: 32x80 (2560 cells).
    Model3,
    /// Model 4: 43x80 (3440 cells).
    Model4,
    /// Model 5: 27x132 (3564 cells).
    Model5,
    /// Any other negotiated geometry.
    Custom { rows: u16, cols: u16 },
}

impl ScreenSize {
    pub fn rows(&self) -> usize {
        match self {
            Self::Model2 => 24,
            Self::Model3 => 32,
            Self::Model4 => 43,
            Self::Model5 => 27,
            Self::Custom { rows, .. } => *rows as usize,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            Self::Model2 | Self::Model3 | Self::Model4 => 80,
            Self::Model5 => 132,
            Self::Custom { cols, .. } => *cols as usize,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.rows() * self.cols()
    }
}

/// One screen position. `code_point` is the raw EBCDIC byte last written
/// there — whether it is an attribute cell or data is derived from the
/// `FieldTable`, never stored here (see `SPEC_FULL.md` §1-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub code_point: u8,
}

/// The fixed-geometry character grid plus cursor and keyboard-lock state.
#[derive(Debug)]
pub struct ScreenBuffer {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    cursor: Address,
    keyboard_locked: bool,
    alarm_pending: bool,
    aid_pending: Option<Aid>,
}

impl ScreenBuffer {
    /// `rows*cols` cells cleared to NUL, cursor at 0, keyboard locked.
    pub fn new(rows: usize, cols: usize) -> Self {
        ScreenBuffer {
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
            cursor: 0,
            keyboard_locked: true,
            alarm_pending: false,
            aid_pending: None,
        }
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }
    pub fn buffer_size(&self) -> usize { self.rows * self.cols }

    /// Clear every cell to NUL, reset cursor to 0. Dimensions are preserved.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::default();
        }
        self.cursor = 0;
        self.aid_pending = None;
    }

    pub fn read(&self, addr: Address) -> Cell {
        self.cells[self.wrap(addr)]
    }

    /// Unconditional write. This is the host/executor path — 3270 hosts may
    /// always write, protected or not.
    pub fn write(&mut self, addr: Address, code_point: u8) {
        let idx = self.wrap(addr);
        self.cells[idx].code_point = code_point;
    }

    /// Operator-input path: fails with `ProtectedWrite` (no mutation) if the
    /// governing field is protected.
    pub fn write_checked(&mut self, addr: Address, code_point: u8, fields: &FieldTable) -> ScreenResult<()> {
        if fields.field_at(addr).is_protected() {
            return Err(ScreenError::ProtectedWrite { address: addr });
        }
        self.write(addr, code_point);
        Ok(())
    }

    pub fn set_cursor(&mut self, addr: Address) {
        self.cursor = self.wrap(addr) as Address;
    }

    pub fn cursor(&self) -> Address {
        self.cursor
    }

    pub fn address_of(&self, row: usize, col: usize) -> Address {
        (((row % self.rows) * self.cols) + (col % self.cols)) as Address
    }

    pub fn coords_of(&self, addr: Address) -> (usize, usize) {
        let a = self.wrap(addr);
        (a / self.cols, a % self.cols)
    }

    /// `(addr + n) mod buffer_size`.
    pub fn next_address(&self, addr: Address, n: usize) -> Address {
        let size = self.buffer_size();
        (((addr as usize) + n) % size) as Address
    }

    pub fn lock_keyboard(&mut self) {
        self.keyboard_locked = true;
    }

    pub fn unlock_keyboard(&mut self) {
        self.keyboard_locked = false;
    }

    pub fn is_keyboard_locked(&self) -> bool {
        self.keyboard_locked
    }

    pub fn request_alarm(&mut self) {
        self.alarm_pending = true;
    }

    /// Take and clear the pending alarm signal.
    pub fn take_alarm(&mut self) -> bool {
        std::mem::take(&mut self.alarm_pending)
    }

    /// Arm the AID the operator just pressed, overwriting any prior unread one.
    pub fn arm_aid(&mut self, aid: Aid) {
        self.aid_pending = Some(aid);
    }

    pub fn aid_pending(&self) -> Option<Aid> {
        self.aid_pending
    }

    /// Take and clear the pending AID (consumed once the Replier builds a reply).
    pub fn take_aid(&mut self) -> Option<Aid> {
        self.aid_pending.take()
    }

    fn wrap(&self, addr: Address) -> usize {
        (addr as usize) % self.buffer_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldTable;

    #[test]
    fn new_buffer_is_all_nul_and_locked() {
        let buf = ScreenBuffer::new(24, 80);
        assert_eq!(buf.cursor(), 0);
        assert!(buf.is_keyboard_locked());
        assert_eq!(buf.read(0).code_point, 0);
    }

    #[test]
    fn set_cursor_wraps() {
        let mut buf = ScreenBuffer::new(24, 80);
        buf.set_cursor(1920);
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn next_address_wraps() {
        let buf = ScreenBuffer::new(24, 80);
        assert_eq!(buf.next_address(1919, 1), 0);
    }

    #[test]
    fn write_checked_rejects_protected_field() {
        let mut buf = ScreenBuffer::new(24, 80);
        let mut fields = FieldTable::new(1920);
        fields.add_field(0, crate::field::FieldAttribute::new(0x20)); // protected
        let result = buf.write_checked(1, 0xC1, &fields);
        assert!(result.is_err());
        assert_eq!(buf.read(1).code_point, 0);
    }

    #[test]
    fn address_and_coords_round_trip() {
        let buf = ScreenBuffer::new(24, 80);
        let addr = buf.address_of(2, 5);
        assert_eq!(buf.coords_of(addr), (2, 5));
    }

    #[test]
    fn clear_resets_cells_and_cursor() {
        let mut buf = ScreenBuffer::new(24, 80);
        buf.write(5, 0xC1);
        buf.set_cursor(5);
        buf.clear();
        assert_eq!(buf.read(5).code_point, 0);
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn aid_arms_and_is_taken_once() {
        let mut buf = ScreenBuffer::new(24, 80);
        assert_eq!(buf.aid_pending(), None);
        buf.arm_aid(crate::codes::Aid::Enter);
        assert_eq!(buf.take_aid(), Some(crate::codes::Aid::Enter));
        assert_eq!(buf.take_aid(), None);
    }

    #[test]
    fn clear_also_clears_pending_aid() {
        let mut buf = ScreenBuffer::new(24, 80);
        buf.arm_aid(crate::codes::Aid::Enter);
        buf.clear();
        assert_eq!(buf.aid_pending(), None);
    }
}
