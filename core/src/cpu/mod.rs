//! ARM7TDMI core, ARM state.
//!
//! Execution is modeled as a three-stage pipeline of latches. `regs[15]` is
//! always the address of the word being fetched, so an instruction sees its
//! own address plus 8 when reading R15. Handlers advance the PC themselves;
//! any PC write goes through [`Cpu::branch`], which owns the two refill
//! bubbles.

mod arm;
mod block;
pub mod decode;
pub mod flags;
pub mod psr;
pub mod registers;
pub mod shifter;
mod transfer;

#[cfg(test)]
mod test_bus;

use log::{debug, warn};
#[cfg(feature = "trace_cpu")]
use log::trace;

use crate::bus::BusAccess;

pub use flags::Flags;
pub use psr::{Cpsr, CpuMode, CpuState};
pub use registers::RegisterFile;

use psr::{FIQ_DISABLE, IRQ_DISABLE, MODE_IRQ, MODE_SUPERVISOR, MODE_SYSTEM, MODE_UNDEFINED, THUMB_BIT};

const VECTOR_UNDEFINED: u32 = 0x04;
const VECTOR_SWI: u32 = 0x08;
const VECTOR_IRQ: u32 = 0x18;

const STACK_SVC: u32 = 0x0300_7FE0;
const STACK_IRQ: u32 = 0x0300_7FA0;
const STACK_SYS: u32 = 0x0300_7F00;

#[derive(Default, Clone, Debug)]
struct Pipeline {
    fetch: u32,
    decode: u32,
    execute: u32,
    /// Refill steps left after a PC write.
    bubbles: u8,
}

pub struct Cpu {
    regs: RegisterFile,
    flags: Flags,
    /// CPSR control byte: I, F, T and the mode bits.
    mode_flags: u32,
    pipe: Pipeline,
    irq_line: bool,
    irq_pending: bool,
}

impl Default for Cpu {
    fn default() -> Self { Self::new() }
}

impl Cpu {
    /// Hardware reset: Supervisor mode, interrupts masked, fetching from 0.
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::new(),
            flags: Flags::new(),
            mode_flags: MODE_SUPERVISOR | IRQ_DISABLE | FIQ_DISABLE,
            pipe: Pipeline { bubbles: 2, ..Pipeline::default() },
            irq_line: false,
            irq_pending: false,
        }
    }

    /// Register state the BIOS leaves behind before jumping to `entry`.
    pub fn skip_boot<B: BusAccess>(&mut self, bus: &mut B, entry: u32) {
        self.set_cpsr(MODE_SUPERVISOR);
        self.regs.write(13, STACK_SVC);
        self.set_cpsr(MODE_IRQ);
        self.regs.write(13, STACK_IRQ);
        self.set_cpsr(MODE_SYSTEM);
        self.regs.write(13, STACK_SYS);
        self.branch(bus, entry);
    }

    pub fn read_reg(&self, index: usize) -> u32 { self.regs.read(index) }
    pub fn write_reg(&mut self, index: usize, value: u32) { self.regs.write(index, value); }

    pub fn pc(&self) -> u32 { self.regs.pc() }
    pub fn registers(&self) -> &RegisterFile { &self.regs }
    pub fn flags(&self) -> &Flags { &self.flags }

    pub fn cpsr(&self) -> Cpsr { Cpsr::from_raw(self.flags.nzcv() | self.mode_flags) }
    pub fn spsr(&self) -> Option<u32> { self.regs.spsr(self.mode()) }
    pub fn mode(&self) -> CpuMode { CpuMode::from_bits(self.mode_flags) }

    pub fn state(&self) -> CpuState {
        if self.mode_flags & THUMB_BIT != 0 { CpuState::Thumb } else { CpuState::Arm }
    }

    pub fn irq_pending(&self) -> bool { self.irq_pending }
    pub fn is_refilling(&self) -> bool { self.pipe.bubbles > 0 }

    /// Replaces the whole CPSR, switching banks as needed.
    pub fn set_cpsr(&mut self, value: u32) {
        self.flags.set_nzcv(value);
        self.switch_bank(value);
        self.mode_flags = value & 0xFF;
        self.assert_irq();
    }

    /// Moves the live banked registers to the bank of `mode_bits`. The caller
    /// updates `mode_flags` afterwards.
    fn switch_bank(&mut self, mode_bits: u32) {
        let (from, to) = (self.mode(), CpuMode::from_bits(mode_bits));
        if from != to {
            debug!("mode {from:?} -> {to:?}");
            self.regs.switch_bank(from, to);
        }
    }

    /// Copies the SPSR of the current mode into the CPSR and returns the
    /// restored T bit (0 or 0x20).
    fn spsr_to_cpsr(&mut self) -> u32 {
        match self.regs.spsr(self.mode()) {
            Some(spsr) => {
                self.set_cpsr(spsr);
                spsr & THUMB_BIT
            }
            None => self.mode_flags & THUMB_BIT,
        }
    }

    pub(crate) fn enter_thumb(&mut self) {
        self.mode_flags |= THUMB_BIT;
    }

    /// Reloads the PC and schedules the two refill bubbles.
    pub fn branch<B: BusAccess>(&mut self, bus: &mut B, target: u32) {
        self.regs.set_pc(target);
        self.pipe.bubbles = 2;
        bus.branched(target);
    }

    // Guarded register writes. R15 as a destination is a branch.

    fn write_register<B: BusAccess>(&mut self, bus: &mut B, n: usize, value: u32) {
        if n < 15 {
            self.regs.write(n, value);
        } else {
            self.branch(bus, value & !3);
        }
    }

    /// Exception return: R15 as a destination also restores the CPSR.
    fn write_register_restore<B: BusAccess>(&mut self, bus: &mut B, n: usize, value: u32) {
        if n < 15 {
            self.regs.write(n, value);
        } else {
            self.write_pc_restore(bus, value);
        }
    }

    fn write_pc_restore<B: BusAccess>(&mut self, bus: &mut B, value: u32) {
        let mask = if self.spsr_to_cpsr() != 0 { !1 } else { !3 };
        self.branch(bus, value & mask);
    }

    fn read_user(&self, n: usize) -> u32 {
        self.regs.read_user(self.mode(), n)
    }

    /// User-bank write of a base register.
    fn write_user_base<B: BusAccess>(&mut self, bus: &mut B, n: usize, value: u32) {
        if n < 15 {
            self.regs.write_user(self.mode(), n, value);
        } else {
            self.branch(bus, value & !3);
        }
    }

    /// LDM with the S bit: the user bank unless R15 is also loaded, in which
    /// case the load is an exception return and uses the current bank.
    fn write_user_ldm<B: BusAccess>(&mut self, bus: &mut B, instr: u32, n: usize, value: u32) {
        if n < 15 {
            if instr & 0x8000 != 0 {
                self.regs.write(n, value);
            } else {
                self.regs.write_user(self.mode(), n, value);
            }
        } else {
            self.write_pc_restore(bus, value);
        }
    }

    // Data access. Both edges of a data access break the fetch sequence.

    pub fn read32<B: BusAccess>(&mut self, bus: &mut B, addr: u32) -> u32 {
        bus.executing_at(self.regs.pc());
        bus.non_sequential();
        let value = bus.read32(addr & !3).rotate_right((addr & 3) << 3);
        bus.non_sequential();
        value
    }

    pub fn read16<B: BusAccess>(&mut self, bus: &mut B, addr: u32) -> u32 {
        bus.executing_at(self.regs.pc());
        bus.non_sequential();
        let mut value = bus.read16(addr & !1) as u32;
        if addr & 1 != 0 {
            value = value.rotate_right(8);
        }
        bus.non_sequential();
        value
    }

    pub fn read8<B: BusAccess>(&mut self, bus: &mut B, addr: u32) -> u32 {
        bus.executing_at(self.regs.pc());
        bus.non_sequential();
        let value = bus.read8(addr) as u32;
        bus.non_sequential();
        value
    }

    pub fn write32<B: BusAccess>(&mut self, bus: &mut B, addr: u32, value: u32) {
        bus.executing_at(self.regs.pc());
        bus.non_sequential();
        bus.write32(addr & !3, value);
        bus.non_sequential();
    }

    pub fn write16<B: BusAccess>(&mut self, bus: &mut B, addr: u32, value: u32) {
        bus.executing_at(self.regs.pc());
        bus.non_sequential();
        bus.write16(addr & !1, value as u16);
        bus.non_sequential();
    }

    pub fn write8<B: BusAccess>(&mut self, bus: &mut B, addr: u32, value: u32) {
        bus.executing_at(self.regs.pc());
        bus.non_sequential();
        bus.write8(addr, value as u8);
        bus.non_sequential();
    }

    // Pipeline

    /// Advances one pipeline step: a refill bubble, IRQ entry or one
    /// instruction.
    pub fn step<B: BusAccess>(&mut self, bus: &mut B) {
        if self.pipe.bubbles > 0 {
            self.pipe.bubbles -= 1;
            self.execute_bubble(bus);
        } else if self.irq_pending {
            self.irq(bus);
        } else {
            self.execute_iteration(bus);
        }
    }

    fn execute_iteration<B: BusAccess>(&mut self, bus: &mut B) {
        self.pipe.fetch = bus.fetch32(self.regs.pc());
        let instr = self.pipe.execute;
        if self.flags.check_condition(instr) {
            let op = decode::table().lookup(instr);
            #[cfg(feature = "trace_cpu")]
            trace!("{:08X}: {instr:08X} {op:?}", self.regs.pc().wrapping_sub(8));
            self.execute(bus, instr, op);
        } else {
            self.regs.advance_pc();
        }
        self.pipe.execute = self.pipe.decode;
        self.pipe.decode = self.pipe.fetch;
    }

    fn execute_bubble<B: BusAccess>(&mut self, bus: &mut B) {
        self.pipe.fetch = bus.fetch32(self.regs.pc());
        self.regs.advance_pc();
        self.pipe.execute = self.pipe.decode;
        self.pipe.decode = self.pipe.fetch;
    }

    // Interrupts and exceptions

    /// Level of the interrupt line after the controller's mask is applied.
    pub fn trigger_irq(&mut self, mask: u16) {
        self.irq_line = mask != 0;
        self.assert_irq();
    }

    fn assert_irq(&mut self) {
        self.irq_pending = self.irq_line && self.mode_flags & IRQ_DISABLE == 0;
    }

    fn enter_exception<B: BusAccess>(&mut self, bus: &mut B, mode: u32, vector: u32) {
        let cpsr = self.cpsr().raw();
        let target = CpuMode::from_bits(mode);
        self.switch_bank(mode);
        self.regs.set_spsr(target, cpsr);
        self.mode_flags = (self.mode_flags & FIQ_DISABLE) | IRQ_DISABLE | mode;
        self.regs.write(14, self.regs.pc().wrapping_sub(4));
        self.assert_irq();
        self.branch(bus, vector);
        debug!("exception -> {target:?} vector {vector:#04X}, return {:#010X}", self.regs.read(14));
    }

    pub fn irq<B: BusAccess>(&mut self, bus: &mut B) {
        self.enter_exception(bus, MODE_IRQ, VECTOR_IRQ);
    }

    pub fn software_interrupt<B: BusAccess>(&mut self, bus: &mut B) {
        self.enter_exception(bus, MODE_SUPERVISOR, VECTOR_SWI);
    }

    pub fn undefined_instruction<B: BusAccess>(&mut self, bus: &mut B) {
        warn!("undefined instruction {:08X} at {:08X}", self.pipe.execute, self.regs.pc().wrapping_sub(8));
        self.enter_exception(bus, MODE_UNDEFINED, VECTOR_UNDEFINED);
    }

    // Multiplier. Early termination costs 1 to 4 internal cycles by the
    // number of significant bytes in Rs.

    fn multiply_cycles(rs: u32, signed: bool) -> u32 {
        let insignificant = |mask: u32| {
            let top = rs & mask;
            top == 0 || (signed && top == mask)
        };
        if insignificant(0xFFFF_FF00) {
            1
        } else if insignificant(0xFFFF_0000) {
            2
        } else if insignificant(0xFF00_0000) {
            3
        } else {
            4
        }
    }

    pub fn perform_mul32<B: BusAccess>(&mut self, bus: &mut B, rm: u32, rs: u32) -> u32 {
        bus.internal_cycles(self.regs.pc(), Self::multiply_cycles(rs, true));
        rm.wrapping_mul(rs)
    }

    pub fn perform_mul32_mla<B: BusAccess>(&mut self, bus: &mut B, rm: u32, rs: u32) -> u32 {
        bus.internal_cycles(self.regs.pc(), Self::multiply_cycles(rs, true) + 1);
        rm.wrapping_mul(rs)
    }

    pub fn perform_umul64<B: BusAccess>(&mut self, bus: &mut B, rm: u32, rs: u32) -> u64 {
        bus.internal_cycles(self.regs.pc(), Self::multiply_cycles(rs, false) + 1);
        rm as u64 * rs as u64
    }

    pub fn perform_umla64<B: BusAccess>(&mut self, bus: &mut B, rm: u32, rs: u32, hi: u32, lo: u32) -> u64 {
        bus.internal_cycles(self.regs.pc(), Self::multiply_cycles(rs, false) + 2);
        (rm as u64 * rs as u64).wrapping_add(((hi as u64) << 32) | lo as u64)
    }

    pub fn perform_mul64<B: BusAccess>(&mut self, bus: &mut B, rm: u32, rs: u32) -> u64 {
        bus.internal_cycles(self.regs.pc(), Self::multiply_cycles(rs, true) + 1);
        (rm as i32 as i64).wrapping_mul(rs as i32 as i64) as u64
    }

    pub fn perform_mla64<B: BusAccess>(&mut self, bus: &mut B, rm: u32, rs: u32, hi: u32, lo: u32) -> u64 {
        bus.internal_cycles(self.regs.pc(), Self::multiply_cycles(rs, true) + 2);
        let product = (rm as i32 as i64).wrapping_mul(rs as i32 as i64) as u64;
        product.wrapping_add(((hi as u64) << 32) | lo as u64)
    }
}
