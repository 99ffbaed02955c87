#![forbid(unsafe_code)]

use std::path::Path;

use crate::bus::Bus;
use crate::cpu::{Cpu, CpuState};
use crate::error::CoreError;
use crate::irq::IrqLine;

pub mod bus;
pub mod cpu;
pub mod error;
pub mod io;
pub mod irq;
pub mod log_buffer;
pub mod mem;
pub mod timing;
pub mod wait;

/// First byte of the cartridge window.
pub const ROM_START: u32 = 0x0800_0000;

/// The CPU and everything it can address.
pub struct System {
    cpu: Cpu,
    bus: Bus,
    bios_loaded: bool,
    rom_loaded: bool,
}

impl System {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            bus: Bus::new(),
            bios_loaded: false,
            rom_loaded: false,
        }
    }

    /// Resets the CPU and the bus state. Boots through the BIOS when one is
    /// loaded, otherwise jumps straight into the cartridge.
    pub fn reset(&mut self) {
        self.cpu = Cpu::new();
        self.bus.reset();

        if self.bios_loaded {
            self.cpu.branch(&mut self.bus, 0);
        } else if self.rom_loaded {
            self.cpu.skip_boot(&mut self.bus, ROM_START);
        }
    }

    pub fn load_bios(&mut self, data: &[u8]) -> Result<(), CoreError> {
        self.bus.load_bios(data)?;
        self.bios_loaded = true;
        self.reset();
        Ok(())
    }

    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), CoreError> {
        self.bus.load_rom(data)?;
        self.rom_loaded = true;
        self.reset();
        Ok(())
    }

    pub fn load_bios_file(&mut self, path: &Path) -> Result<(), CoreError> {
        let data = std::fs::read(path)?;
        self.load_bios(&data)
    }

    pub fn load_rom_file(&mut self, path: &Path) -> Result<(), CoreError> {
        let data = std::fs::read(path)?;
        self.load_rom(&data)
    }

    /// Raises an interrupt source and updates the CPU's IRQ line.
    pub fn request_interrupt(&mut self, line: IrqLine) {
        self.bus.io.irq.request(line);
        self.cpu.trigger_irq(self.bus.io.irq.irq_line());
    }

    /// One pipeline step, or one idle cycle while halted. Returns the cycles
    /// it took.
    pub fn step(&mut self) -> Result<u32, CoreError> {
        let start = self.bus.cycles();

        if self.bus.timing().is_idle() {
            if self.bus.io.irq.irq_match() == 0 {
                self.bus.idle_cycle();
                return Ok((self.bus.cycles() - start) as u32);
            }
            self.bus.timing_mut().wake();
        }

        if self.cpu.state() == CpuState::Thumb {
            return Err(CoreError::ThumbUnsupported { pc: self.cpu.pc() });
        }

        self.cpu.step(&mut self.bus);
        self.cpu.trigger_irq(self.bus.io.irq.irq_line());
        Ok((self.bus.cycles() - start) as u32)
    }

    /// Steps until at least `budget` cycles have passed.
    pub fn run_cycles(&mut self, budget: u64) -> Result<u64, CoreError> {
        let mut spent = 0u64;
        while spent < budget {
            spent += self.step()? as u64;
        }
        Ok(spent)
    }

    pub fn cpu(&self) -> &Cpu { &self.cpu }
    pub fn bus(&self) -> &Bus { &self.bus }
    pub fn bus_mut(&mut self) -> &mut Bus { &mut self.bus }
    pub fn is_rom_loaded(&self) -> bool { self.rom_loaded }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}
