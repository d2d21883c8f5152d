//! Replier (component C6): builds the inbound (terminal-to-host) byte frame
//! for Read Buffer / Read Modified / Read Modified All, and the short-read
//! frame for Clear/PA AIDs.
//!
//! Grounded on `lib3270::protocol::ProtocolProcessor3270`'s
//! `create_read_buffer_response`/`create_read_modified_response`/
//! `get_modified_fields`, rewritten to fix two bugs there: field content was
//! lossily converted through `ebcdic_to_ascii` into a `String` before being
//! re-encoded (losing any byte outside the codec's bijective subset), and
//! fields whose content trimmed to empty ASCII were skipped outright even
//! with MDT=1. This version reads and emits raw `Cell::code_point` bytes
//! directly — no decode round trip — and never skips a modified field.

use crate::address::{self, AddressMode};
use crate::codes::{Aid, ORDER_SBA, ORDER_SF};
use crate::error::{ReplyError, ReplyResult};
use crate::field::FieldTable;
use crate::screen::ScreenBuffer;

/// What kind of reply to build. Mirrors `spec.md §6`'s
/// `ReadBuffer | ReadModified | ReadModifiedAll | ShortRead(aid)` union.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyRequest {
    ReadBuffer,
    ReadModified,
    ReadModifiedAll,
    ShortRead(Aid),
}

/// Build the reply frame for `request` into `out`, returning the number of
/// bytes written. Fails with no partial write if `out` is too small, or with
/// `NoAidArmed` if an operator-triggered read is requested with no AID armed.
pub fn build(request: ReplyRequest, screen: &mut ScreenBuffer, fields: &FieldTable, mode: AddressMode, out: &mut [u8]) -> ReplyResult<usize> {
    let mut frame = Vec::new();
    match request {
        ReplyRequest::ReadBuffer => {
            frame.push(Aid::NoAid.to_byte());
            push_address(&mut frame, screen.cursor(), mode);
            write_read_buffer_body(&mut frame, screen, fields);
        }
        ReplyRequest::ReadModified | ReplyRequest::ReadModifiedAll => {
            let aid = screen.take_aid().ok_or(ReplyError::NoAidArmed)?;
            frame.push(aid.to_byte());
            push_address(&mut frame, screen.cursor(), mode);
            if !aid.is_short_read() {
                let include_protected = matches!(request, ReplyRequest::ReadModifiedAll);
                write_modified_fields_body(&mut frame, screen, fields, include_protected, mode);
            }
        }
        ReplyRequest::ShortRead(aid) => {
            frame.push(aid.to_byte());
            push_address(&mut frame, screen.cursor(), mode);
        }
    }

    if out.len() < frame.len() {
        return Err(ReplyError::BufferOverflow { needed: frame.len(), available: out.len() });
    }
    out[..frame.len()].copy_from_slice(&frame);
    Ok(frame.len())
}

fn push_address(frame: &mut Vec<u8>, addr: u16, mode: AddressMode) {
    let (hi, lo) = address::encode_address(addr, mode);
    frame.push(hi);
    frame.push(lo);
}

/// Address order: every attribute cell as `SF attribute-byte`; every other
/// cell as its raw EBCDIC byte (NUL included). The synthetic whole-buffer
/// field an unformatted screen starts with contributes no attribute cells —
/// a host never issued a real Start Field there.
fn write_read_buffer_body(frame: &mut Vec<u8>, screen: &ScreenBuffer, fields: &FieldTable) {
    for addr in 0..screen.buffer_size() as u16 {
        let field = fields.field_record_at(addr);
        if field.start_address == addr && !field.synthetic {
            frame.push(ORDER_SF);
            frame.push(field.attribute.base_byte());
        } else {
            frame.push(screen.read(addr).code_point);
        }
    }
}

/// Ascending-`start_address` order: `SBA <content-start> <content-bytes>`
/// per modified field, content stripped of trailing NULs only. Protected
/// fields are included only for Read Modified All.
fn write_modified_fields_body(frame: &mut Vec<u8>, screen: &ScreenBuffer, fields: &FieldTable, include_protected: bool, mode: AddressMode) {
    for (id, content_start, content_len) in fields.modified_fields() {
        if !include_protected && fields.get(id).attribute.is_protected() {
            continue;
        }
        let bytes: Vec<u8> = (0..content_len).map(|i| screen.read(screen.next_address(content_start, i)).code_point).collect();
        let trimmed_len = bytes.iter().rposition(|&b| b != 0x00).map(|i| i + 1).unwrap_or(0);
        frame.push(ORDER_SBA);
        push_address(frame, content_start, mode);
        frame.extend_from_slice(&bytes[..trimmed_len]);
    }
}
