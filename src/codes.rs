//! Wire-level constants: command codes, order opcodes, WCC bits, and AID
//! byte values.
//!
//! Grounded on `lib3270::codes`, but that module's `CMD_*` constants are
//! 5250-style values (`CMD_WRITE = 0x01`, `CMD_ERASE_WRITE = 0x05`, …) left
//! over from the teacher's dual-protocol history; this module uses the real
//! IBM 3270 command bytes. The order opcodes and most AID values the
//! teacher already has right for 3270 and are kept unchanged — including
//! the historical PF10-12 and PF22-24 gaps (`0x7A..0x7C`, `0x4A..0x4C`)
//! rather than a naive continuation of the PF1-9/PF13-21 sequence, since a
//! real 3270 host expects exactly these bytes.

/// 3270 command codes (the first byte of an outbound record).
pub const CMD_WRITE: u8 = 0xF1;
pub const CMD_ERASE_WRITE: u8 = 0xF5;
pub const CMD_ERASE_WRITE_ALTERNATE: u8 = 0x7E;
pub const CMD_READ_BUFFER: u8 = 0xF2;
pub const CMD_READ_MODIFIED: u8 = 0xF6;
pub const CMD_READ_MODIFIED_ALL: u8 = 0x6E;
pub const CMD_ERASE_ALL_UNPROTECTED: u8 = 0x6F;
pub const CMD_WRITE_STRUCTURED_FIELD: u8 = 0xF3;

/// Order opcodes embedded in the data stream.
pub const ORDER_SF: u8 = 0x1D;
pub const ORDER_SFE: u8 = 0x29;
pub const ORDER_SBA: u8 = 0x11;
pub const ORDER_SA: u8 = 0x28;
pub const ORDER_MF: u8 = 0x2C;
pub const ORDER_IC: u8 = 0x13;
pub const ORDER_PT: u8 = 0x05;
pub const ORDER_RA: u8 = 0x3C;
pub const ORDER_EUA: u8 = 0x12;
pub const ORDER_GE: u8 = 0x08;

/// Write Control Character bits.
pub const WCC_RESET_MDT: u8 = 0x01;
pub const WCC_RESTORE_KEYBOARD: u8 = 0x02;
pub const WCC_SOUND_ALARM: u8 = 0x04;
pub const WCC_RESET_PARTITION: u8 = 0x40;
pub const WCC_START_PRINTER: u8 = 0x08;

/// Extended attribute type bytes (SFE/SA/MF pair types).
/// `XA_BASIC` marks a pair that carries an ordinary (non-extended) field
/// attribute byte, the same shape as a plain Start Field operand.
pub const XA_BASIC: u8 = 0xC0;
pub const XA_HIGHLIGHTING: u8 = 0x41;
pub const XA_FOREGROUND: u8 = 0x42;
pub const XA_CHARSET: u8 = 0x43;
pub const XA_BACKGROUND: u8 = 0x45;
pub const XA_VALIDATION: u8 = 0xC1;
pub const XA_OUTLINING: u8 = 0xC2;

/// Attention Identifier byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aid {
    NoAid,
    Enter,
    Clear,
    PA1,
    PA2,
    PA3,
    PF1, PF2, PF3, PF4, PF5, PF6, PF7, PF8, PF9, PF10, PF11, PF12,
    PF13, PF14, PF15, PF16, PF17, PF18, PF19, PF20, PF21, PF22, PF23, PF24,
    SysReq,
}

impl Aid {
    pub fn to_byte(self) -> u8 {
        match self {
            Aid::NoAid => 0x60,
            Aid::Enter => 0x7D,
            Aid::Clear => 0x6D,
            Aid::PA1 => 0x6C,
            Aid::PA2 => 0x6E,
            Aid::PA3 => 0x6B,
            Aid::PF1 => 0xF1,
            Aid::PF2 => 0xF2,
            Aid::PF3 => 0xF3,
            Aid::PF4 => 0xF4,
            Aid::PF5 => 0xF5,
            Aid::PF6 => 0xF6,
            Aid::PF7 => 0xF7,
            Aid::PF8 => 0xF8,
            Aid::PF9 => 0xF9,
            Aid::PF10 => 0x7A,
            Aid::PF11 => 0x7B,
            Aid::PF12 => 0x7C,
            Aid::PF13 => 0xC1,
            Aid::PF14 => 0xC2,
            Aid::PF15 => 0xC3,
            Aid::PF16 => 0xC4,
            Aid::PF17 => 0xC5,
            Aid::PF18 => 0xC6,
            Aid::PF19 => 0xC7,
            Aid::PF20 => 0xC8,
            Aid::PF21 => 0xC9,
            Aid::PF22 => 0x4A,
            Aid::PF23 => 0x4B,
            Aid::PF24 => 0x4C,
            Aid::SysReq => 0xF0,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x60 => Aid::NoAid,
            0x7D => Aid::Enter,
            0x6D => Aid::Clear,
            0x6C => Aid::PA1,
            0x6E => Aid::PA2,
            0x6B => Aid::PA3,
            0xF1 => Aid::PF1,
            0xF2 => Aid::PF2,
            0xF3 => Aid::PF3,
            0xF4 => Aid::PF4,
            0xF5 => Aid::PF5,
            0xF6 => Aid::PF6,
            0xF7 => Aid::PF7,
            0xF8 => Aid::PF8,
            0xF9 => Aid::PF9,
            0x7A => Aid::PF10,
            0x7B => Aid::PF11,
            0x7C => Aid::PF12,
            0xC1 => Aid::PF13,
            0xC2 => Aid::PF14,
            0xC3 => Aid::PF15,
            0xC4 => Aid::PF16,
            0xC5 => Aid::PF17,
            0xC6 => Aid::PF18,
            0xC7 => Aid::PF19,
            0xC8 => Aid::PF20,
            0xC9 => Aid::PF21,
            0x4A => Aid::PF22,
            0x4B => Aid::PF23,
            0x4C => Aid::PF24,
            0xF0 => Aid::SysReq,
            _ => return None,
        })
    }

    /// Short-read AIDs (Clear and the PA keys) emit no body, only the AID
    /// byte and cursor address.
    pub fn is_short_read(self) -> bool {
        matches!(self, Aid::Clear | Aid::PA1 | Aid::PA2 | Aid::PA3)
    }
}
