use log::info;

use crate::error::CoreError;

pub const BIOS_SIZE: usize = 0x4000;
pub const EWRAM_SIZE: usize = 0x40000;
pub const IWRAM_SIZE: usize = 0x8000;
pub const PALETTE_SIZE: usize = 0x400;
pub const VRAM_SIZE: usize = 0x18000;
pub const OAM_SIZE: usize = 0x400;
pub const SRAM_SIZE: usize = 0x10000;
pub const ROM_MAX_SIZE: usize = 0x0200_0000;

pub struct Mem {
    pub bios: Vec<u8>,
    pub ewram: Vec<u8>,
    pub iwram: Vec<u8>,
    pub palette: Vec<u8>,
    pub vram: Vec<u8>,
    pub oam: Vec<u8>,
    pub rom: Vec<u8>,
    pub sram: Vec<u8>,
}

impl Default for Mem {
    fn default() -> Self { Self::new() }
}

impl Mem {
    pub fn new() -> Self {
        Self {
            bios: vec![0u8; BIOS_SIZE],
            ewram: vec![0u8; EWRAM_SIZE],
            iwram: vec![0u8; IWRAM_SIZE],
            palette: vec![0u8; PALETTE_SIZE],
            vram: vec![0u8; VRAM_SIZE],
            oam: vec![0u8; OAM_SIZE],
            rom: Vec::new(),
            sram: vec![0xFFu8; SRAM_SIZE],
        }
    }

    pub fn load_bios(&mut self, data: &[u8]) -> Result<(), CoreError> {
        if data.len() > BIOS_SIZE {
            return Err(CoreError::BiosSize { len: data.len() });
        }
        self.bios.fill(0);
        self.bios[..data.len()].copy_from_slice(data);
        info!("BIOS loaded ({} bytes)", data.len());
        Ok(())
    }

    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), CoreError> {
        if data.is_empty() || data.len() > ROM_MAX_SIZE {
            return Err(CoreError::RomSize { len: data.len() });
        }
        self.rom = data.to_vec();
        info!("ROM loaded ({} bytes)", data.len());
        Ok(())
    }
}

/// Little-endian reads from a byte slice. Out-of-range reads yield `None`.
pub fn read16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn read32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn write16(buf: &mut [u8], offset: usize, value: u16) {
    if let Some(bytes) = buf.get_mut(offset..offset + 2) {
        bytes.copy_from_slice(&value.to_le_bytes());
    }
}

pub fn write32(buf: &mut [u8], offset: usize, value: u32) {
    if let Some(bytes) = buf.get_mut(offset..offset + 4) {
        bytes.copy_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bios_image_is_bounded() {
        let mut mem = Mem::new();
        assert!(mem.load_bios(&[1, 2, 3, 4]).is_ok());
        assert_eq!(read32(&mem.bios, 0), Some(0x0403_0201));
        let err = mem.load_bios(&vec![0; BIOS_SIZE + 1]);
        assert!(matches!(err, Err(CoreError::BiosSize { len }) if len == BIOS_SIZE + 1));
    }

    #[test]
    fn empty_rom_is_rejected() {
        let mut mem = Mem::new();
        assert!(matches!(mem.load_rom(&[]), Err(CoreError::RomSize { len: 0 })));
        assert!(mem.load_rom(&[0; 16]).is_ok());
        assert_eq!(mem.rom.len(), 16);
    }

    #[test]
    fn slice_access_is_little_endian() {
        let mut buf = vec![0u8; 8];
        write32(&mut buf, 4, 0xDEAD_BEEF);
        write16(&mut buf, 0, 0x1234);
        assert_eq!(buf[..2], [0x34, 0x12]);
        assert_eq!(read16(&buf, 6), Some(0xDEAD));
        assert_eq!(read32(&buf, 6), None);
        write32(&mut buf, 6, 0);
        assert_eq!(read32(&buf, 4), Some(0xDEAD_BEEF));
    }
}
