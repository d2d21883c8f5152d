//! Field table (component C3): the ordered set of fields derived from
//! Start-Field orders, their MDT bits, and an O(1) address→field cache.
//!
//! Grounded on `lib3270::field` (`FieldAttribute`, `ExtendedAttributes`,
//! `FieldManager`), but `find_field_at` there is an O(n) reverse linear scan
//! over a sorted `Vec`; this reworks it into a dense `Vec<FieldId>` of
//! length `rows*cols`, rebuilt on every structural change, so the hot path
//! (`field_at`, called once per byte in the executor) is O(1) with no
//! allocation.

use crate::screen::Address;

/// Bit positions of the base attribute byte (same layout as the Start Field
/// order's operand byte).
const ATTR_PROTECTED: u8 = 0x20;
const ATTR_NUMERIC: u8 = 0x10;
const ATTR_DISPLAY: u8 = 0x0C;
const ATTR_MDT: u8 = 0x01;

pub const DISPLAY_NORMAL: u8 = 0x00;
pub const DISPLAY_INTENSIFIED: u8 = 0x08;
pub const DISPLAY_HIDDEN: u8 = 0x0C;

/// Extended attributes conveyed by SFE/SA/MF. Absent values default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtendedAttributes {
    pub highlighting: Option<u8>,
    pub foreground_color: Option<u8>,
    pub background_color: Option<u8>,
    pub character_set: Option<u8>,
    pub validation: Option<u8>,
    pub outlining: Option<u8>,
}

/// A field's formatting attribute: protected/numeric/display flags, the MDT
/// bit, and optional extended attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldAttribute {
    base: u8,
    pub extended: ExtendedAttributes,
}

impl FieldAttribute {
    pub fn new(base: u8) -> Self {
        FieldAttribute { base, extended: ExtendedAttributes::default() }
    }

    pub fn is_protected(&self) -> bool { self.base & ATTR_PROTECTED != 0 }
    pub fn is_numeric(&self) -> bool { self.base & ATTR_NUMERIC != 0 }
    pub fn display(&self) -> u8 { self.base & ATTR_DISPLAY }
    pub fn is_modified(&self) -> bool { self.base & ATTR_MDT != 0 }

    pub fn set_modified(&mut self, modified: bool) {
        if modified {
            self.base |= ATTR_MDT;
        } else {
            self.base &= !ATTR_MDT;
        }
    }

    /// The display-as-space glyph deposited at the attribute cell itself.
    pub fn base_byte(&self) -> u8 { self.base }
}

/// A contiguous, wraparound-aware range of cells governed by one attribute.
/// `start_address` is the *attribute cell*; content runs from
/// `start_address + 1` for `length - 1` cells (length includes the
/// attribute cell itself, matching the data model's "lengths sum to
/// rows*cols" invariant).
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub start_address: Address,
    pub length: usize,
    pub attribute: FieldAttribute,
    /// True only for the single whole-buffer field `reset()` installs for an
    /// unformatted screen. Its `start_address` is bookkeeping, not a real
    /// Start-Field attribute cell — the Replier must not emit an `SF` order
    /// for it in a Read Buffer reply (an unformatted buffer has no attribute
    /// cells at all). Cleared the moment a real `add_field` lands here.
    pub synthetic: bool,
}

/// Opaque handle into `FieldTable`'s internal vector. Valid only until the
/// next structural mutation (`reset`/`add_field`).
pub type FieldId = usize;

/// The ordered set of fields, sorted by `start_address`, plus a dense
/// `Address -> FieldId` cache rebuilt on every structural change.
#[derive(Debug)]
pub struct FieldTable {
    buffer_size: usize,
    fields: Vec<Field>,
    index: Vec<FieldId>,
}

impl FieldTable {
    /// An unformatted table: one field spanning the whole buffer,
    /// unprotected, normal, MDT=false.
    pub fn new(buffer_size: usize) -> Self {
        let mut table = FieldTable { buffer_size, fields: Vec::new(), index: Vec::new() };
        table.reset();
        table
    }

    /// Remove all fields, replacing them with a single unformatted field
    /// covering the entire buffer.
    pub fn reset(&mut self) {
        self.fields.clear();
        self.fields.push(Field {
            start_address: 0,
            length: self.buffer_size,
            attribute: FieldAttribute::default(),
            synthetic: true,
        });
        self.rebuild_index();
    }

    /// Insert (or replace, if one already starts at `attribute_address`) a
    /// field whose attribute cell is `attribute_address`. Recomputes lengths
    /// of the inserted field and its predecessor.
    pub fn add_field(&mut self, attribute_address: Address, attribute: FieldAttribute) -> FieldId {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.start_address == attribute_address) {
            existing.attribute = attribute;
            existing.synthetic = false;
        } else {
            self.fields.push(Field { start_address: attribute_address, length: 0, attribute, synthetic: false });
            self.fields.sort_by_key(|f| f.start_address);
        }
        self.recompute_lengths();
        self.rebuild_index();
        self.fields.iter().position(|f| f.start_address == attribute_address).unwrap()
    }

    /// The field governing `addr`. Always returns a value: the table's
    /// invariant is that fields cover the entire buffer.
    pub fn field_at(&self, addr: Address) -> &FieldAttribute {
        let idx = self.index[(addr as usize) % self.buffer_size];
        &self.fields[idx].attribute
    }

    pub fn field_record_at(&self, addr: Address) -> &Field {
        let idx = self.index[(addr as usize) % self.buffer_size];
        &self.fields[idx]
    }

    pub fn field_id_at(&self, addr: Address) -> FieldId {
        self.index[(addr as usize) % self.buffer_size]
    }

    pub fn get(&self, id: FieldId) -> &Field {
        &self.fields[id]
    }

    pub fn get_mut(&mut self, id: FieldId) -> &mut Field {
        &mut self.fields[id]
    }

    pub fn set_mdt(&mut self, id: FieldId, modified: bool) {
        self.fields[id].attribute.set_modified(modified);
    }

    /// Fields in ascending-address order starting at `id`, wrapping once
    /// around the table (restartable, finite: yields each field exactly once).
    pub fn iter_from(&self, id: FieldId) -> impl Iterator<Item = (FieldId, &Field)> {
        let n = self.fields.len();
        (0..n).map(move |i| {
            let idx = (id + i) % n;
            (idx, &self.fields[idx])
        })
    }

    /// Fields with MDT=1, in ascending `start_address` order (the table's
    /// natural order), as `(field_id, field_content_start, content_length)`.
    pub fn modified_fields(&self) -> impl Iterator<Item = (FieldId, Address, usize)> + '_ {
        self.fields.iter().enumerate().filter(|(_, f)| f.attribute.is_modified()).map(|(id, f)| {
            let (content_start, content_len) = if f.synthetic {
                (f.start_address, f.length)
            } else {
                (((f.start_address as usize + 1) % self.buffer_size) as Address, f.length.saturating_sub(1))
            };
            (id, content_start, content_len)
        })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn recompute_lengths(&mut self) {
        let n = self.fields.len();
        for i in 0..n {
            let start = self.fields[i].start_address as usize;
            let next_start = self.fields[(i + 1) % n].start_address as usize;
            let length = if n == 1 {
                self.buffer_size
            } else if next_start > start {
                next_start - start
            } else {
                self.buffer_size - start + next_start
            };
            self.fields[i].length = length;
        }
    }

    fn rebuild_index(&mut self) {
        self.index = vec![0; self.buffer_size];
        for (id, field) in self.fields.iter().enumerate() {
            for offset in 0..field.length {
                let addr = (field.start_address as usize + offset) % self.buffer_size;
                self.index[addr] = id;
            }
        }
    }
}
