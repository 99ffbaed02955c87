//! Interrupt controller (IE/IF/IME at 0x04000200).

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum IrqLine {
    VBlank,
    HBlank,
    VCounter,
    Timer0,
    Timer1,
    Timer2,
    Timer3,
    Serial,
    Dma0,
    Dma1,
    Dma2,
    Dma3,
    Keypad,
    GamePak,
}

impl IrqLine {
    pub fn mask(self) -> u16 { 1 << self as u16 }
}

const IRQ_MASK: u16 = 0x3FFF;

#[derive(Clone, Debug, Default)]
pub struct InterruptController {
    ie: u16,
    if_: u16,
    ime: bool,
}

impl InterruptController {
    pub fn new() -> Self { Self::default() }

    pub fn ie(&self) -> u16 { self.ie }
    pub fn if_(&self) -> u16 { self.if_ }
    pub fn ime(&self) -> bool { self.ime }

    pub fn write_ie(&mut self, value: u16) { self.ie = value & IRQ_MASK; }

    /// Writing 1 to a bit acknowledges it.
    pub fn acknowledge(&mut self, value: u16) { self.if_ &= !value; }

    pub fn write_ime(&mut self, value: u16) { self.ime = value & 1 != 0; }

    pub fn request(&mut self, line: IrqLine) {
        self.if_ |= line.mask();
    }

    /// Pending and enabled sources, ignoring the master enable. Wakes the
    /// core from halt.
    pub fn irq_match(&self) -> u16 { self.ie & self.if_ }

    /// The mask handed to the core after each step.
    pub fn irq_line(&self) -> u16 {
        if self.ime { self.irq_match() } else { 0 }
    }

    pub fn read8(&self, offset: u32) -> u8 {
        match offset {
            0x200 => self.ie as u8,
            0x201 => (self.ie >> 8) as u8,
            0x202 => self.if_ as u8,
            0x203 => (self.if_ >> 8) as u8,
            0x208 => self.ime as u8,
            _ => 0,
        }
    }

    pub fn write8(&mut self, offset: u32, value: u8) {
        let value = value as u16;
        match offset {
            0x200 => self.write_ie((self.ie & 0xFF00) | value),
            0x201 => self.write_ie((self.ie & 0x00FF) | (value << 8)),
            0x202 => self.acknowledge(value),
            0x203 => self.acknowledge(value << 8),
            0x208 => self.write_ime(value),
            _ => {}
        }
    }
}
