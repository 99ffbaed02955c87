//! LDM/STM.
//!
//! Bits 24..20 select the addressing mode: P (before), U (up), S (user bank
//! or exception return), W (writeback) and L (load). Registers always move
//! lowest-numbered first at the lowest address. Register words go straight
//! to the bus: no rotation, no per-word sequence break.

use super::arm::rn;
use super::Cpu;
use crate::bus::BusAccess;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct BlockMode {
    before: bool,
    up: bool,
    user: bool,
    writeback: bool,
    load: bool,
}

impl BlockMode {
    fn decode(instr: u32) -> Self {
        let bits = (instr >> 20) & 0x1F;
        Self {
            before: bits & 0x10 != 0,
            up: bits & 0x08 != 0,
            user: bits & 0x04 != 0,
            writeback: bits & 0x02 != 0,
            load: bits & 0x01 != 0,
        }
    }

    /// IB and DA step before each access, IA and DB after.
    fn steps_first(self) -> bool {
        self.before == self.up
    }

    /// Lowest address touched, minus 4 when stepping first.
    fn start(self, base: u32, count: u32) -> u32 {
        if self.up { base } else { base.wrapping_sub(count * 4) }
    }

    fn final_base(self, base: u32, count: u32) -> u32 {
        if self.up { base.wrapping_add(count * 4) } else { base.wrapping_sub(count * 4) }
    }

    /// Address read for R15 when the list is empty.
    fn empty_list_address(self, base: u32) -> u32 {
        let step = if self.writeback { 0x40 } else { 4 };
        match (self.before, self.up) {
            (false, _) => base,
            (true, true) => base.wrapping_add(step),
            (true, false) => base.wrapping_sub(step),
        }
    }

    fn empty_list_base(self, base: u32) -> u32 {
        if self.up { base.wrapping_add(0x40) } else { base.wrapping_sub(0x40) }
    }
}

impl Cpu {
    pub(super) fn block_transfer<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.regs.advance_pc();
        let mode = BlockMode::decode(instr);
        if mode.load {
            self.block_load(bus, instr, mode);
        } else {
            self.block_store(bus, instr, mode);
        }
    }

    /// An empty list stores nothing and leaves the base alone.
    fn block_store<B: BusAccess>(&mut self, bus: &mut B, instr: u32, mode: BlockMode) {
        let list = instr & 0xFFFF;
        if list == 0 {
            return;
        }
        let count = list.count_ones();
        let base = self.regs.read(rn(instr));
        let final_base = mode.final_base(base, count);
        let mut address = mode.start(base, count);

        bus.executing_at(self.regs.pc());
        bus.non_sequential();
        let mut first = true;
        for r in (0..16).filter(|r| list & (1 << r) != 0) {
            if mode.steps_first() {
                address = address.wrapping_add(4);
            }
            let value = if mode.user { self.read_user(r) } else { self.regs.read(r) };
            bus.write32(address & !3, value);
            if !mode.steps_first() {
                address = address.wrapping_add(4);
            }
            // the base is updated once the first word is out
            if first && mode.writeback {
                self.write_register(bus, rn(instr), final_base);
            }
            first = false;
        }
        bus.non_sequential();
    }

    /// Writeback lands after the loads, so it overrides a loaded base.
    fn block_load<B: BusAccess>(&mut self, bus: &mut B, instr: u32, mode: BlockMode) {
        let list = instr & 0xFFFF;
        let base = self.regs.read(rn(instr));
        bus.executing_at(self.regs.pc());
        bus.non_sequential();

        if list != 0 {
            let count = list.count_ones();
            let mut address = mode.start(base, count);
            for r in (0..16).filter(|r| list & (1 << r) != 0) {
                if mode.steps_first() {
                    address = address.wrapping_add(4);
                }
                let value = bus.read32(address & !3);
                if mode.user {
                    self.write_user_ldm(bus, instr, r, value);
                } else {
                    self.write_register(bus, r, value);
                }
                if !mode.steps_first() {
                    address = address.wrapping_add(4);
                }
            }
            if mode.writeback {
                self.write_register(bus, rn(instr), mode.final_base(base, count));
            } else if !mode.before && !mode.up && !mode.user {
                // plain LDMDA breaks the sequence one extra time
                bus.non_sequential();
            }
        } else {
            let value = bus.read32(mode.empty_list_address(base) & !3);
            if mode.user {
                self.write_pc_restore(bus, value);
            } else {
                self.write_register(bus, 15, value);
            }
            if mode.writeback {
                self.write_register(bus, rn(instr), mode.empty_list_base(base));
            }
        }

        bus.non_sequential();
        bus.internal_cycle(self.regs.pc());
    }
}
