//! ELF identification and header constants.

/// ELF magic bytes.
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// ELF class: 32-bit or 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

/// Byte order of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfData {
    Little,
    Big,
}

/// Returns the `e_type` display name.
pub fn type_name(e_type: u16) -> String {
    match e_type {
        0 => "NONE".into(),
        1 => "REL (relocatable)".into(),
        2 => "EXEC (executable)".into(),
        3 => "DYN (shared object)".into(),
        4 => "CORE (core dump)".into(),
        other => format!("{:#06x}", other),
    }
}

/// Returns the architecture label for an `e_machine` value.
pub fn machine_name(machine: u16) -> String {
    match machine {
        0x02 => "SPARC".into(),
        0x03 => "x86".into(),
        0x08 => "MIPS".into(),
        0x14 => "PowerPC".into(),
        0x16 => "S390".into(),
        0x28 => "ARM".into(),
        0x2A => "SuperH".into(),
        0x32 => "IA-64".into(),
        0x3E => "AMD64".into(),
        0xB7 => "AArch64".into(),
        0xF3 => "RISC-V".into(),
        other => format!("unknown ({:#06x})", other),
    }
}

/// Word width implied by `e_machine`, when the machine pins one; machines
/// that come in both widths (RISC-V) fall back to the ELF class.
pub fn machine_bits(machine: u16) -> Option<u32> {
    match machine {
        0x02 | 0x03 | 0x08 | 0x14 | 0x28 | 0x2A => Some(32),
        0x16 | 0x32 | 0x3E | 0xB7 => Some(64),
        _ => None,
    }
}

/// Endian-aware fixed-width reads over a byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct Reader {
    pub data_order: ElfData,
}

impl Reader {
    pub fn u16(&self, data: &[u8], offset: usize) -> Option<u16> {
        let b = data.get(offset..offset + 2)?;
        Some(match self.data_order {
            ElfData::Little => u16::from_le_bytes([b[0], b[1]]),
            ElfData::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    pub fn u32(&self, data: &[u8], offset: usize) -> Option<u32> {
        let b = data.get(offset..offset + 4)?;
        let bytes = [b[0], b[1], b[2], b[3]];
        Some(match self.data_order {
            ElfData::Little => u32::from_le_bytes(bytes),
            ElfData::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn u64(&self, data: &[u8], offset: usize) -> Option<u64> {
        let b = data.get(offset..offset + 8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(b);
        Some(match self.data_order {
            ElfData::Little => u64::from_le_bytes(bytes),
            ElfData::Big => u64::from_be_bytes(bytes),
        })
    }

    /// Reads an address-sized field: u32 for ELF32, u64 for ELF64.
    pub fn addr(&self, data: &[u8], offset: usize, class: ElfClass) -> Option<u64> {
        match class {
            ElfClass::Elf32 => self.u32(data, offset).map(u64::from),
            ElfClass::Elf64 => self.u64(data, offset),
        }
    }
}
