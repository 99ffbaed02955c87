#[cfg(feature = "trace_bus")]
use log::trace;

use crate::error::CoreError;
use crate::io::Io;
use crate::mem::{self, Mem, BIOS_SIZE};
use crate::timing::Timing;
use crate::wait::WaitStates;

/// The core's view of the outside world.
///
/// The raw accessors charge the target region's wait states. The remaining
/// hooks are cycle accounting the core issues at fixed points; their
/// defaults do nothing so that test buses only implement memory.
pub trait BusAccess {
    fn read32(&mut self, addr: u32) -> u32;
    fn read16(&mut self, addr: u32) -> u16;
    fn read8(&mut self, addr: u32) -> u8;
    fn write32(&mut self, addr: u32, value: u32);
    fn write16(&mut self, addr: u32, value: u16);
    fn write8(&mut self, addr: u32, value: u8);

    /// Instruction fetch.
    fn fetch32(&mut self, addr: u32) -> u32 {
        self.read32(addr)
    }

    /// One internal (I) cycle while executing at `pc`.
    fn internal_cycle(&mut self, _pc: u32) {}

    fn internal_cycles(&mut self, pc: u32, cycles: u32) {
        for _ in 0..cycles {
            self.internal_cycle(pc);
        }
    }

    /// The next access is non-sequential.
    fn non_sequential(&mut self) {}

    /// Live program counter for the data accesses that follow. Stores have
    /// already stepped it past the fetch address.
    fn executing_at(&mut self, _pc: u32) {}

    /// The program counter was written with `target`.
    fn branched(&mut self, _target: u32) {}
}

const IO_WRAM_CONTROL: u32 = 0x800;

#[inline]
fn vram_offset(addr: u32) -> usize {
    let offset = addr & 0x1FFFF;
    (if offset >= 0x18000 { offset - 0x8000 } else { offset }) as usize
}

#[inline]
fn rom_open_bus(addr: u32) -> u16 {
    ((addr >> 1) & 0xFFFF) as u16
}

pub struct Bus {
    pub mem: Mem,
    pub io: Io,
    wait: WaitStates,
    timing: Timing,
    cpu_pc: u32,
}

impl Default for Bus {
    fn default() -> Self { Self::new() }
}

impl Bus {
    pub fn new() -> Self {
        Self {
            mem: Mem::new(),
            io: Io::new(),
            wait: WaitStates::new(),
            timing: Timing::new(),
            cpu_pc: 0,
        }
    }

    pub fn load_bios(&mut self, data: &[u8]) -> Result<(), CoreError> {
        self.mem.load_bios(data)
    }

    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), CoreError> {
        self.mem.load_rom(data)
    }

    pub fn wait(&self) -> &WaitStates { &self.wait }
    pub fn timing(&self) -> &Timing { &self.timing }
    pub fn timing_mut(&mut self) -> &mut Timing { &mut self.timing }
    pub fn cycles(&self) -> u64 { self.timing.cycles() }

    /// Clears wait configuration, timing and I/O; memories and images stay.
    pub fn reset(&mut self) {
        self.io = Io::new();
        self.wait = WaitStates::new();
        self.timing = Timing::new();
        self.cpu_pc = 0;
    }

    /// Video unit bus ownership, which adds a cycle to VRAM/OAM accesses.
    pub fn set_ppu_rendering(&mut self, rendering: bool, oam_rendering: bool) {
        self.wait.update_render_status(rendering, oam_rendering);
    }

    /// Idles one cycle with nothing executing.
    pub fn idle_cycle(&mut self) {
        self.wait.single_clock(&mut self.timing, self.cpu_pc);
    }

    fn single_clock(&mut self) {
        self.wait.single_clock(&mut self.timing, self.cpu_pc);
    }

    // I/O is byte-addressed; wider accesses are composed.

    fn io_read8(&self, addr: u32) -> u8 {
        let offset = addr & 0x00FF_FFFF;
        match offset {
            0x204 => self.wait.read_waitcnt0(),
            0x205 => self.wait.read_waitcnt1(),
            o if o & 0xFFFC == IO_WRAM_CONTROL => self.wait.read_wram_config8(o),
            o => self.io.read8(o),
        }
    }

    fn io_write8(&mut self, addr: u32, value: u8) {
        let offset = addr & 0x00FF_FFFF;
        match offset {
            0x204 => self.wait.write_waitcnt0(value),
            0x205 => self.wait.write_waitcnt1(value),
            0x301 => {
                if value & 0x80 == 0 {
                    self.timing.halt();
                } else {
                    self.timing.stop();
                }
            }
            o if o & 0xFFFC == IO_WRAM_CONTROL => self.wait.write_wram_config8(o, value),
            o => self.io.write8(o, value),
        }
    }

    fn io_read16(&self, addr: u32) -> u16 {
        self.io_read8(addr) as u16 | ((self.io_read8(addr + 1) as u16) << 8)
    }

    fn io_read32(&self, addr: u32) -> u32 {
        self.io_read16(addr) as u32 | ((self.io_read16(addr + 2) as u32) << 16)
    }

    fn io_write16(&mut self, addr: u32, value: u16) {
        self.io_write8(addr, value as u8);
        self.io_write8(addr + 1, (value >> 8) as u8);
    }

    fn io_write32(&mut self, addr: u32, value: u32) {
        self.io_write16(addr, value as u16);
        self.io_write16(addr + 2, (value >> 16) as u16);
    }

    fn bios_read32(&self, addr: u32) -> u32 {
        if (addr as usize) < BIOS_SIZE { mem::read32(&self.mem.bios, addr as usize).unwrap_or(0) } else { 0 }
    }

    fn bios_read16(&self, addr: u32) -> u16 {
        if (addr as usize) < BIOS_SIZE { mem::read16(&self.mem.bios, addr as usize).unwrap_or(0) } else { 0 }
    }

    fn rom_read16(&self, addr: u32) -> u16 {
        mem::read16(&self.mem.rom, (addr & 0x01FF_FFFE) as usize).unwrap_or_else(|| rom_open_bus(addr))
    }

    fn rom_read32(&self, addr: u32) -> u32 {
        let addr = addr & !3;
        mem::read32(&self.mem.rom, (addr & 0x01FF_FFFC) as usize).unwrap_or_else(|| {
            rom_open_bus(addr) as u32 | ((rom_open_bus(addr + 2) as u32) << 16)
        })
    }

    fn sram_read8(&self, addr: u32) -> u8 {
        self.mem.sram[(addr & 0xFFFF) as usize]
    }

    fn sram_write8(&mut self, addr: u32, value: u8) {
        self.mem.sram[(addr & 0xFFFF) as usize] = value;
    }
}

impl BusAccess for Bus {
    fn read32(&mut self, addr: u32) -> u32 {
        let raw = addr;
        let addr = addr & !3;
        let pc = self.cpu_pc;
        let value = match addr >> 24 {
            0x00 => {
                self.single_clock();
                self.bios_read32(addr)
            }
            0x02 => {
                self.wait.wram_access32(&mut self.timing, pc);
                mem::read32(&self.mem.ewram, (addr & 0x3FFFC) as usize).unwrap_or(0)
            }
            0x03 => {
                self.single_clock();
                mem::read32(&self.mem.iwram, (addr & 0x7FFC) as usize).unwrap_or(0)
            }
            0x04 => {
                self.single_clock();
                self.io_read32(addr)
            }
            0x05 => {
                self.wait.vram_access32(&mut self.timing, pc);
                mem::read32(&self.mem.palette, (addr & 0x3FC) as usize).unwrap_or(0)
            }
            0x06 => {
                self.wait.vram_access32(&mut self.timing, pc);
                mem::read32(&self.mem.vram, vram_offset(addr)).unwrap_or(0)
            }
            0x07 => {
                self.wait.oam_access(&mut self.timing, pc);
                mem::read32(&self.mem.oam, (addr & 0x3FC) as usize).unwrap_or(0)
            }
            0x08..=0x0D => {
                self.wait.rom_access32(&mut self.timing, pc, addr);
                self.rom_read32(addr)
            }
            0x0E | 0x0F => {
                self.wait.sram_access(&mut self.timing, pc);
                self.sram_read8(raw) as u32 * 0x0101_0101
            }
            _ => {
                self.single_clock();
                0
            }
        };
        #[cfg(feature = "trace_bus")]
        trace!("read32 {addr:#010X} -> {value:#010X}");
        value
    }

    fn read16(&mut self, addr: u32) -> u16 {
        let raw = addr;
        let addr = addr & !1;
        let pc = self.cpu_pc;
        match addr >> 24 {
            0x00 => {
                self.single_clock();
                self.bios_read16(addr)
            }
            0x02 => {
                self.wait.wram_access(&mut self.timing, pc);
                mem::read16(&self.mem.ewram, (addr & 0x3FFFE) as usize).unwrap_or(0)
            }
            0x03 => {
                self.single_clock();
                mem::read16(&self.mem.iwram, (addr & 0x7FFE) as usize).unwrap_or(0)
            }
            0x04 => {
                self.single_clock();
                self.io_read16(addr)
            }
            0x05 => {
                self.wait.vram_access(&mut self.timing, pc);
                mem::read16(&self.mem.palette, (addr & 0x3FE) as usize).unwrap_or(0)
            }
            0x06 => {
                self.wait.vram_access(&mut self.timing, pc);
                mem::read16(&self.mem.vram, vram_offset(addr)).unwrap_or(0)
            }
            0x07 => {
                self.wait.oam_access(&mut self.timing, pc);
                mem::read16(&self.mem.oam, (addr & 0x3FE) as usize).unwrap_or(0)
            }
            0x08..=0x0D => {
                self.wait.rom_access(&mut self.timing, pc, addr);
                self.rom_read16(addr)
            }
            0x0E | 0x0F => {
                self.wait.sram_access(&mut self.timing, pc);
                self.sram_read8(raw) as u16 * 0x0101
            }
            _ => {
                self.single_clock();
                0
            }
        }
    }

    fn read8(&mut self, addr: u32) -> u8 {
        let pc = self.cpu_pc;
        match addr >> 24 {
            0x00 => {
                self.single_clock();
                if (addr as usize) < BIOS_SIZE { self.mem.bios[addr as usize] } else { 0 }
            }
            0x02 => {
                self.wait.wram_access(&mut self.timing, pc);
                self.mem.ewram[(addr & 0x3FFFF) as usize]
            }
            0x03 => {
                self.single_clock();
                self.mem.iwram[(addr & 0x7FFF) as usize]
            }
            0x04 => {
                self.single_clock();
                self.io_read8(addr)
            }
            0x05 => {
                self.wait.vram_access(&mut self.timing, pc);
                self.mem.palette[(addr & 0x3FF) as usize]
            }
            0x06 => {
                self.wait.vram_access(&mut self.timing, pc);
                self.mem.vram[vram_offset(addr)]
            }
            0x07 => {
                self.wait.oam_access(&mut self.timing, pc);
                self.mem.oam[(addr & 0x3FF) as usize]
            }
            0x08..=0x0D => {
                self.wait.rom_access(&mut self.timing, pc, addr);
                let half = self.rom_read16(addr);
                (half >> ((addr & 1) * 8)) as u8
            }
            0x0E | 0x0F => {
                self.wait.sram_access(&mut self.timing, pc);
                self.sram_read8(addr)
            }
            _ => {
                self.single_clock();
                0
            }
        }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        #[cfg(feature = "trace_bus")]
        trace!("write32 {addr:#010X} <- {value:#010X}");
        let (raw, lane) = (addr, (value >> ((addr & 3) * 8)) as u8);
        let addr = addr & !3;
        let pc = self.cpu_pc;
        match addr >> 24 {
            0x02 => {
                self.wait.wram_access32(&mut self.timing, pc);
                mem::write32(&mut self.mem.ewram, (addr & 0x3FFFC) as usize, value);
            }
            0x03 => {
                self.single_clock();
                mem::write32(&mut self.mem.iwram, (addr & 0x7FFC) as usize, value);
            }
            0x04 => {
                self.single_clock();
                self.io_write32(addr, value);
            }
            0x05 => {
                self.wait.vram_access32(&mut self.timing, pc);
                mem::write32(&mut self.mem.palette, (addr & 0x3FC) as usize, value);
            }
            0x06 => {
                self.wait.vram_access32(&mut self.timing, pc);
                mem::write32(&mut self.mem.vram, vram_offset(addr), value);
            }
            0x07 => {
                self.wait.oam_access(&mut self.timing, pc);
                mem::write32(&mut self.mem.oam, (addr & 0x3FC) as usize, value);
            }
            0x08..=0x0D => self.wait.rom_access32(&mut self.timing, pc, addr),
            0x0E | 0x0F => {
                self.wait.sram_access(&mut self.timing, pc);
                self.sram_write8(raw, lane);
            }
            _ => self.single_clock(),
        }
    }

    fn write16(&mut self, addr: u32, value: u16) {
        let (raw, lane) = (addr, (value >> ((addr & 1) * 8)) as u8);
        let addr = addr & !1;
        let pc = self.cpu_pc;
        match addr >> 24 {
            0x02 => {
                self.wait.wram_access(&mut self.timing, pc);
                mem::write16(&mut self.mem.ewram, (addr & 0x3FFFE) as usize, value);
            }
            0x03 => {
                self.single_clock();
                mem::write16(&mut self.mem.iwram, (addr & 0x7FFE) as usize, value);
            }
            0x04 => {
                self.single_clock();
                self.io_write16(addr, value);
            }
            0x05 => {
                self.wait.vram_access(&mut self.timing, pc);
                mem::write16(&mut self.mem.palette, (addr & 0x3FE) as usize, value);
            }
            0x06 => {
                self.wait.vram_access(&mut self.timing, pc);
                mem::write16(&mut self.mem.vram, vram_offset(addr), value);
            }
            0x07 => {
                self.wait.oam_access(&mut self.timing, pc);
                mem::write16(&mut self.mem.oam, (addr & 0x3FE) as usize, value);
            }
            0x08..=0x0D => self.wait.rom_access(&mut self.timing, pc, addr),
            0x0E | 0x0F => {
                self.wait.sram_access(&mut self.timing, pc);
                self.sram_write8(raw, lane);
            }
            _ => self.single_clock(),
        }
    }

    fn write8(&mut self, addr: u32, value: u8) {
        let pc = self.cpu_pc;
        match addr >> 24 {
            0x02 => {
                self.wait.wram_access(&mut self.timing, pc);
                self.mem.ewram[(addr & 0x3FFFF) as usize] = value;
            }
            0x03 => {
                self.single_clock();
                self.mem.iwram[(addr & 0x7FFF) as usize] = value;
            }
            0x04 => {
                self.single_clock();
                self.io_write8(addr, value);
            }
            0x05 => {
                self.wait.vram_access(&mut self.timing, pc);
                self.mem.palette[(addr & 0x3FF) as usize] = value;
            }
            0x06 => {
                self.wait.vram_access(&mut self.timing, pc);
                self.mem.vram[vram_offset(addr)] = value;
            }
            0x07 => {
                self.wait.oam_access(&mut self.timing, pc);
                self.mem.oam[(addr & 0x3FF) as usize] = value;
            }
            0x08..=0x0D => self.wait.rom_access(&mut self.timing, pc, addr),
            0x0E | 0x0F => {
                self.wait.sram_access(&mut self.timing, pc);
                self.sram_write8(addr, value);
            }
            _ => self.single_clock(),
        }
    }

    fn fetch32(&mut self, addr: u32) -> u32 {
        let addr = addr & !3;
        self.cpu_pc = addr;
        match addr >> 24 {
            0x00 => {
                self.single_clock();
                self.bios_read32(addr)
            }
            0x02 => {
                self.wait.wram_access32_cpu(&mut self.timing);
                mem::read32(&self.mem.ewram, (addr & 0x3FFFC) as usize).unwrap_or(0)
            }
            0x03 => {
                self.single_clock();
                mem::read32(&self.mem.iwram, (addr & 0x7FFC) as usize).unwrap_or(0)
            }
            0x05 => {
                self.wait.vram_access32_cpu(&mut self.timing);
                mem::read32(&self.mem.palette, (addr & 0x3FC) as usize).unwrap_or(0)
            }
            0x06 => {
                self.wait.vram_access32_cpu(&mut self.timing);
                mem::read32(&self.mem.vram, vram_offset(addr)).unwrap_or(0)
            }
            0x07 => {
                self.wait.oam_access_cpu(&mut self.timing);
                mem::read32(&self.mem.oam, (addr & 0x3FC) as usize).unwrap_or(0)
            }
            0x08..=0x0D => {
                self.wait.rom_access32_cpu(&mut self.timing, addr);
                self.rom_read32(addr)
            }
            0x0E | 0x0F => {
                self.wait.sram_access_cpu(&mut self.timing);
                self.sram_read8(addr) as u32 * 0x0101_0101
            }
            _ => {
                self.single_clock();
                0
            }
        }
    }

    fn internal_cycle(&mut self, pc: u32) {
        self.cpu_pc = pc;
        self.wait.internal_cycle(&mut self.timing, pc);
    }

    fn internal_cycles(&mut self, pc: u32, cycles: u32) {
        self.cpu_pc = pc;
        self.wait.internal_cycles(&mut self.timing, pc, cycles);
    }

    fn non_sequential(&mut self) {
        self.wait.non_sequential_broadcast();
    }

    fn executing_at(&mut self, pc: u32) {
        self.cpu_pc = pc;
    }

    fn branched(&mut self, target: u32) {
        self.cpu_pc = target;
        self.wait.non_sequential_broadcast_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::PowerState;

    #[test]
    fn iwram_mirrors_and_costs_one_cycle() {
        let mut bus = Bus::new();
        bus.write32(0x0300_0010, 0x1234_5678);
        assert_eq!(bus.read32(0x0300_8010), 0x1234_5678);
        assert_eq!(bus.read16(0x0300_0012), 0x1234);
        assert_eq!(bus.read8(0x0300_0011), 0x56);
        assert_eq!(bus.cycles(), 4);
    }

    #[test]
    fn ewram_uses_configured_wait() {
        let mut bus = Bus::new();
        bus.write16(0x0200_0000, 0xBEEF);
        assert_eq!(bus.cycles(), 3);
        bus.read32(0x0200_0000);
        assert_eq!(bus.cycles(), 3 + 6);
        bus.write32(0x0400_0800, 0x0E00_0020);
        let before = bus.cycles();
        bus.read16(0x0204_0000);
        assert_eq!(bus.cycles() - before, 2);
    }

    #[test]
    fn vram_upper_mirror_folds_back() {
        let mut bus = Bus::new();
        bus.write16(0x0601_0000, 0x7FFF);
        assert_eq!(bus.read16(0x0601_8000), 0x7FFF);
        assert_eq!(vram_offset(0x0601_FFFE), 0x17FFE);
    }

    #[test]
    fn rom_reads_and_open_bus() {
        let mut bus = Bus::new();
        bus.load_rom(&[0x78, 0x56, 0x34, 0x12]).unwrap();
        assert_eq!(bus.read32(0x0800_0000), 0x1234_5678);
        assert_eq!(bus.read8(0x0800_0001), 0x56);
        // past the image the bus returns address bits
        assert_eq!(bus.read16(0x0800_0010), 0x0008);
        assert_eq!(bus.read32(0x0800_0010), 0x0009_0008);
        bus.write32(0x0800_0000, 0);
        assert_eq!(bus.read32(0x0800_0000), 0x1234_5678);
    }

    #[test]
    fn sram_is_byte_wide() {
        let mut bus = Bus::new();
        bus.write16(0x0E00_0001, 0xAB00);
        assert_eq!(bus.read8(0x0E00_0001), 0xAB);
        bus.write8(0x0E00_0002, 0x5A);
        assert_eq!(bus.read32(0x0E00_0002), 0x5A5A_5A5A);
        assert_eq!(bus.read16(0x0E01_0002), 0x5A5A);
    }

    #[test]
    fn waitcnt_routes_to_wait_model() {
        let mut bus = Bus::new();
        bus.write16(0x0400_0204, 0x4317);
        assert_eq!(bus.read16(0x0400_0204), 0x4317);
        assert!(bus.wait().prefetch_enabled());
        assert_eq!(bus.wait().sram_wait(), 9);
        assert_eq!(bus.read32(0x0400_0800), 0x0D00_0020);
    }

    #[test]
    fn haltcnt_sets_power_state() {
        let mut bus = Bus::new();
        bus.write8(0x0400_0301, 0x00);
        assert_eq!(bus.timing().power(), PowerState::Halted);
        bus.timing_mut().wake();
        bus.write8(0x0400_0301, 0x80);
        assert_eq!(bus.timing().power(), PowerState::Stopped);
        bus.write8(0x0400_0300, 1);
        assert_eq!(bus.read8(0x0400_0300), 1);
    }

    #[test]
    fn interrupt_registers_via_wide_access() {
        let mut bus = Bus::new();
        bus.write32(0x0400_0200, 0xFFFF_0001);
        assert_eq!(bus.io.irq.ie(), 0x0001);
        bus.io.irq.request(crate::irq::IrqLine::VBlank);
        bus.write16(0x0400_0208, 1);
        assert_eq!(bus.io.irq.irq_line(), 1);
        bus.write16(0x0400_0202, 1);
        assert_eq!(bus.io.irq.irq_line(), 0);
    }

    #[test]
    fn data_access_banks_prefetch_only_inside_cartridge() {
        let mut bus = Bus::new();
        bus.write16(0x0400_0204, 0x4000);
        assert!(bus.wait().prefetch_enabled());

        bus.executing_at(0x0800_0000);
        bus.read32(0x0300_0000);
        assert_eq!(bus.wait().pending_clocks(), 1);

        // a store near the end of the window runs with PC already outside it
        bus.executing_at(0x0E00_0000);
        bus.write32(0x0300_0000, 0);
        assert_eq!(bus.wait().pending_clocks(), 0);
    }

    #[test]
    fn fetch_from_rom_uses_cartridge_timing() {
        let mut bus = Bus::new();
        bus.load_rom(&[0u8; 16]).unwrap();
        bus.branched(0x0800_0000);
        bus.fetch32(0x0800_0000);
        assert_eq!(bus.cycles(), 8);
        bus.fetch32(0x0800_0004);
        assert_eq!(bus.cycles(), 8 + 6);
    }
}
