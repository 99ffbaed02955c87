use crate::irq::InterruptController;

pub const IO_SIZE: usize = 0x400;

/// Memory-mapped registers not owned by the wait-state model or the clock.
///
/// The interrupt registers and POSTFLG are decoded; anything else is plain
/// storage so that software reading back what it wrote sees the same value.
pub struct Io {
    pub irq: InterruptController,
    pub postflg: u8,
    regs: Vec<u8>,
}

impl Default for Io {
    fn default() -> Self {
        Self {
            irq: InterruptController::new(),
            postflg: 0,
            regs: vec![0u8; IO_SIZE],
        }
    }
}

impl Io {
    pub fn new() -> Self { Self::default() }

    /// `offset` is relative to 0x04000000.
    pub fn read8(&self, offset: u32) -> u8 {
        match offset {
            0x200..=0x20B => self.irq.read8(offset),
            0x300 => self.postflg,
            0x301 => 0,
            o if (o as usize) < IO_SIZE => self.regs[o as usize],
            _ => 0,
        }
    }

    pub fn write8(&mut self, offset: u32, value: u8) {
        match offset {
            0x200..=0x20B => self.irq.write8(offset, value),
            0x300 => self.postflg = value & 1,
            o if (o as usize) < IO_SIZE => self.regs[o as usize] = value,
            _ => {}
        }
    }
}
