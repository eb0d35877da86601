//! ELF section header parsing.

use binscope_core::SectionRecord;

use super::header::{ElfClass, Reader};

// Section types
pub const SHT_NULL: u32 = 0;
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_RELA: u32 = 4;
pub const SHT_HASH: u32 = 5;
pub const SHT_DYNAMIC: u32 = 6;
pub const SHT_NOTE: u32 = 7;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_REL: u32 = 9;
pub const SHT_DYNSYM: u32 = 11;

// Section flags
pub const SHF_WRITE: u64 = 0x1;
pub const SHF_ALLOC: u64 = 0x2;
pub const SHF_EXECINSTR: u64 = 0x4;

/// Raw fields of one section header, before name resolution.
#[derive(Debug, Clone)]
pub struct RawSection {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
}

impl RawSection {
    /// Parses one section header at `offset` using class-specific layout.
    pub fn parse(data: &[u8], offset: usize, class: ElfClass, reader: Reader) -> Option<Self> {
        match class {
            ElfClass::Elf32 => Some(Self {
                sh_name: reader.u32(data, offset)?,
                sh_type: reader.u32(data, offset + 4)?,
                sh_flags: reader.u32(data, offset + 8)? as u64,
                sh_addr: reader.u32(data, offset + 12)? as u64,
                sh_offset: reader.u32(data, offset + 16)? as u64,
                sh_size: reader.u32(data, offset + 20)? as u64,
            }),
            ElfClass::Elf64 => Some(Self {
                sh_name: reader.u32(data, offset)?,
                sh_type: reader.u32(data, offset + 4)?,
                sh_flags: reader.u64(data, offset + 8)?,
                sh_addr: reader.u64(data, offset + 16)?,
                sh_offset: reader.u64(data, offset + 24)?,
                sh_size: reader.u64(data, offset + 32)?,
            }),
        }
    }

    /// Lowers the raw header into the uniform record, given the resolved name.
    pub fn into_record(self, name: String) -> SectionRecord {
        let is_nobits = self.sh_type == SHT_NOBITS;
        SectionRecord {
            name,
            virtual_address: self.sh_addr,
            virtual_size: self.sh_size,
            raw_offset: self.sh_offset,
            raw_size: if is_nobits { 0 } else { self.sh_size },
            flags: self.sh_flags as u32,
            flags_str: flags_string(self.sh_flags),
            type_str: type_string(self.sh_type),
            is_code: self.sh_flags & SHF_EXECINSTR != 0,
        }
    }
}

/// Renders section flags as `ALLOC|EXEC` style text.
pub fn flags_string(flags: u64) -> String {
    let mut names = Vec::new();
    if flags & SHF_WRITE != 0 {
        names.push("WRITE");
    }
    if flags & SHF_ALLOC != 0 {
        names.push("ALLOC");
    }
    if flags & SHF_EXECINSTR != 0 {
        names.push("EXEC");
    }
    if names.is_empty() {
        format!("{:#x}", flags)
    } else {
        names.join("|")
    }
}

/// Returns the section type display string.
pub fn type_string(sh_type: u32) -> String {
    match sh_type {
        SHT_NULL => "NULL".into(),
        SHT_PROGBITS => "PROGBITS".into(),
        SHT_SYMTAB => "SYMTAB".into(),
        SHT_STRTAB => "STRTAB".into(),
        SHT_RELA => "RELA".into(),
        SHT_HASH => "HASH".into(),
        SHT_DYNAMIC => "DYNAMIC".into(),
        SHT_NOTE => "NOTE".into(),
        SHT_NOBITS => "NOBITS".into(),
        SHT_REL => "REL".into(),
        SHT_DYNSYM => "DYNSYM".into(),
        other => format!("{:#x}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::header::ElfData;

    #[test]
    fn flags_render_in_fixed_order() {
        assert_eq!(flags_string(0x6), "ALLOC|EXEC");
        assert_eq!(flags_string(0x7), "WRITE|ALLOC|EXEC");
        assert_eq!(flags_string(0x0), "0x0");
        assert_eq!(flags_string(0x10), "0x10");
    }

    #[test]
    fn nobits_section_has_no_raw_bytes() {
        let raw = RawSection {
            sh_name: 0,
            sh_type: SHT_NOBITS,
            sh_flags: SHF_ALLOC | SHF_WRITE,
            sh_addr: 0x1000,
            sh_offset: 0x500,
            sh_size: 0x200,
        };
        let rec = raw.into_record(".bss".into());
        assert_eq!(rec.raw_size, 0);
        assert_eq!(rec.virtual_size, 0x200);
        assert_eq!(rec.type_str, "NOBITS");
        assert!(!rec.is_code);
    }

    #[test]
    fn elf64_big_endian_fields_read_natively() {
        // 64-byte ELF64 section header, big-endian, with a > 32-bit address.
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(&1u32.to_be_bytes()); // sh_name
        data[4..8].copy_from_slice(&SHT_PROGBITS.to_be_bytes());
        data[8..16].copy_from_slice(&(SHF_ALLOC | SHF_EXECINSTR).to_be_bytes());
        data[16..24].copy_from_slice(&0x1_2345_6789u64.to_be_bytes()); // sh_addr
        data[24..32].copy_from_slice(&0x1000u64.to_be_bytes());
        data[32..40].copy_from_slice(&0x20u64.to_be_bytes());

        let reader = Reader {
            data_order: ElfData::Big,
        };
        let raw = RawSection::parse(&data, 0, ElfClass::Elf64, reader).unwrap();
        assert_eq!(raw.sh_addr, 0x1_2345_6789);
        assert_eq!(raw.sh_flags, SHF_ALLOC | SHF_EXECINSTR);
        assert_eq!(raw.sh_size, 0x20);
    }
}
