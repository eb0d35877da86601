//! Uniform section record.
//!
//! Every format parser lowers its native section headers into this record;
//! downstream stages never reach back into format-specific fields.

use serde::{Deserialize, Serialize};

/// A section of the analyzed binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    /// Printable name; synthesized `section_i` when the format carries none.
    pub name: String,
    /// Virtual address the section loads at.
    pub virtual_address: u64,
    /// Size in memory.
    pub virtual_size: u64,
    /// Offset of the raw bytes in the original buffer.
    pub raw_offset: u64,
    /// Size of the raw bytes; zero for sections with no file backing.
    pub raw_size: u64,
    /// Raw format-specific flag bits.
    pub flags: u32,
    /// Display rendering of the flag bits.
    pub flags_str: String,
    /// Display rendering of the section type.
    pub type_str: String,
    /// True iff the format-specific executable bit is set.
    pub is_code: bool,
}

impl SectionRecord {
    /// Returns the raw byte range of this section within `buffer`, or `None`
    /// when the section has no file backing or the range is out of bounds.
    pub fn raw_range<'a>(&self, buffer: &'a [u8]) -> Option<&'a [u8]> {
        if self.raw_size == 0 {
            return None;
        }
        let start = usize::try_from(self.raw_offset).ok()?;
        let len = usize::try_from(self.raw_size).ok()?;
        let end = start.checked_add(len)?;
        buffer.get(start..end)
    }
}
