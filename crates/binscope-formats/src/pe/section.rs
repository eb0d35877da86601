//! PE section table parsing.

use binscope_core::SectionRecord;

use super::header::{
    read_u32, CODE_AND_EXECUTE, IMAGE_SCN_CNT_CODE, IMAGE_SCN_CNT_INITIALIZED_DATA,
    IMAGE_SCN_CNT_UNINITIALIZED_DATA, IMAGE_SCN_MEM_EXECUTE, IMAGE_SCN_MEM_READ,
    IMAGE_SCN_MEM_WRITE,
};

/// Size of one section-table entry.
pub const SECTION_HEADER_SIZE: usize = 40;

const FLAG_NAMES: &[(u32, &str)] = &[
    (IMAGE_SCN_CNT_CODE, "CODE"),
    (IMAGE_SCN_CNT_INITIALIZED_DATA, "INIT_DATA"),
    (IMAGE_SCN_CNT_UNINITIALIZED_DATA, "UNINIT_DATA"),
    (IMAGE_SCN_MEM_EXECUTE, "EXEC"),
    (IMAGE_SCN_MEM_READ, "READ"),
    (IMAGE_SCN_MEM_WRITE, "WRITE"),
];

/// Renders PE section characteristics as `CODE|EXEC|READ` style text, or the
/// raw hex when no known bit is set.
pub fn flags_string(flags: u32) -> String {
    let names: Vec<&str> = FLAG_NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        format!("{:#x}", flags)
    } else {
        names.join("|")
    }
}

/// Parses one 40-byte section-table entry at `offset`, falling back to a
/// synthesized name when the 8-byte field is empty.
pub fn parse_section(data: &[u8], offset: usize, index: usize) -> Option<SectionRecord> {
    let entry = data.get(offset..offset + SECTION_HEADER_SIZE)?;

    let name_bytes = &entry[0..8];
    let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(8);
    let mut name = String::from_utf8_lossy(&name_bytes[..name_end]).to_string();
    if name.is_empty() {
        name = format!("section_{}", index);
    }

    let virtual_size = read_u32(entry, 8)? as u64;
    let virtual_address = read_u32(entry, 12)? as u64;
    let raw_size = read_u32(entry, 16)? as u64;
    let raw_offset = read_u32(entry, 20)? as u64;
    let flags = read_u32(entry, 36)?;

    Some(SectionRecord {
        name,
        virtual_address,
        virtual_size,
        raw_offset,
        raw_size,
        flags,
        flags_str: flags_string(flags),
        type_str: if flags & IMAGE_SCN_CNT_CODE != 0 {
            "CODE".into()
        } else if flags & IMAGE_SCN_CNT_UNINITIALIZED_DATA != 0 {
            "BSS".into()
        } else {
            "DATA".into()
        },
        is_code: flags & CODE_AND_EXECUTE == CODE_AND_EXECUTE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &[u8], flags: u32) -> Vec<u8> {
        let mut e = vec![0u8; SECTION_HEADER_SIZE];
        e[..name.len()].copy_from_slice(name);
        e[8..12].copy_from_slice(&0x10u32.to_le_bytes()); // virtual_size
        e[12..16].copy_from_slice(&0x1000u32.to_le_bytes()); // virtual_address
        e[16..20].copy_from_slice(&0x10u32.to_le_bytes()); // raw_size
        e[20..24].copy_from_slice(&0x200u32.to_le_bytes()); // raw_offset
        e[36..40].copy_from_slice(&flags.to_le_bytes());
        e
    }

    #[test]
    fn parses_text_section() {
        let data = entry(b".text", 0x6000_0020);
        let sec = parse_section(&data, 0, 0).unwrap();
        assert_eq!(sec.name, ".text");
        assert_eq!(sec.virtual_address, 0x1000);
        assert_eq!(sec.raw_offset, 0x200);
        assert!(sec.is_code);
        assert_eq!(sec.flags_str, "CODE|EXEC|READ");
    }

    #[test]
    fn code_bit_alone_is_not_code() {
        // is_code requires both CNT_CODE and MEM_EXECUTE.
        let data = entry(b".rdata", IMAGE_SCN_CNT_CODE);
        let sec = parse_section(&data, 0, 0).unwrap();
        assert!(!sec.is_code);
    }

    #[test]
    fn empty_name_is_synthesized() {
        let data = entry(b"", 0x4000_0040);
        let sec = parse_section(&data, 0, 3).unwrap();
        assert_eq!(sec.name, "section_3");
        assert_eq!(sec.flags_str, "INIT_DATA|READ");
    }

    #[test]
    fn unknown_flags_render_hex() {
        let data = entry(b".weird", 0x0000_1000);
        let sec = parse_section(&data, 0, 0).unwrap();
        assert_eq!(sec.flags_str, "0x1000");
    }

    #[test]
    fn truncated_entry_is_rejected() {
        let data = entry(b".text", 0x6000_0020);
        assert!(parse_section(&data[..39], 0, 0).is_none());
    }
}
