//! Single data transfers: LDR/STR, their byte and translated forms, and the
//! halfword and signed loads.
//!
//! The address stage always runs first and performs base writeback, so a
//! store of the base register sees the written-back value and a load into the
//! base overrides it.

use super::arm::{rd, rm, rn};
use super::Cpu;
use crate::bus::BusAccess;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Indexing {
    /// Access at the base, then write back base +/- offset.
    Post,
    /// As `Post`, with the base read and written in the User bank.
    PostUser,
    /// Access at base +/- offset; write back only with W set.
    Pre,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Width {
    Word,
    Half,
    Byte,
    SignedHalf,
    SignedByte,
}

impl Cpu {
    /// Halfword offset: Rm, or the split 8-bit immediate when bit 22 is set.
    fn halfword_offset(&self, instr: u32) -> u32 {
        if instr & 0x0040_0000 == 0 {
            self.regs.read(rm(instr))
        } else {
            ((instr & 0xF00) >> 4) | (instr & 0xF)
        }
    }

    fn offset_base(instr: u32, base: u32, offset: u32) -> u32 {
        if instr & 0x0080_0000 == 0 {
            base.wrapping_sub(offset)
        } else {
            base.wrapping_add(offset)
        }
    }

    fn transfer_address<B: BusAccess>(&mut self, bus: &mut B, instr: u32, offset: u32, indexing: Indexing) -> u32 {
        match indexing {
            Indexing::Post => {
                let base = self.regs.read(rn(instr));
                self.write_register(bus, rn(instr), Self::offset_base(instr, base, offset));
                base
            }
            Indexing::PostUser => {
                let base = self.read_user(rn(instr));
                self.write_user_base(bus, rn(instr), Self::offset_base(instr, base, offset));
                base
            }
            Indexing::Pre => {
                let address = Self::offset_base(instr, self.regs.read(rn(instr)), offset);
                if instr & 0x0020_0000 != 0 {
                    self.write_register(bus, rn(instr), address);
                }
                address
            }
        }
    }

    /// The PC advances before Rd is read, so storing R15 writes the
    /// instruction address plus 12.
    fn store<B: BusAccess>(&mut self, bus: &mut B, instr: u32, address: u32, width: Width) {
        self.regs.advance_pc();
        let value = self.regs.read(rd(instr));
        match width {
            Width::Word => self.write32(bus, address, value),
            Width::Byte => self.write8(bus, address, value),
            _ => self.write16(bus, address, value),
        }
    }

    fn load<B: BusAccess>(&mut self, bus: &mut B, instr: u32, address: u32, width: Width) {
        let value = match width {
            Width::Word => self.read32(bus, address),
            Width::Half => self.read16(bus, address),
            Width::Byte => self.read8(bus, address),
            Width::SignedHalf => self.read16(bus, address) as u16 as i16 as i32 as u32,
            Width::SignedByte => self.read8(bus, address) as u8 as i8 as i32 as u32,
        };
        self.regs.advance_pc();
        self.write_register(bus, rd(instr), value);
        bus.internal_cycle(self.regs.pc());
    }

    fn halfword_store<B: BusAccess>(&mut self, bus: &mut B, instr: u32, indexing: Indexing) {
        let address = self.transfer_address(bus, instr, self.halfword_offset(instr), indexing);
        self.store(bus, instr, address, Width::Half);
    }

    fn halfword_load<B: BusAccess>(&mut self, bus: &mut B, instr: u32, indexing: Indexing, width: Width) {
        let address = self.transfer_address(bus, instr, self.halfword_offset(instr), indexing);
        self.load(bus, instr, address, width);
    }

    fn imm_store<B: BusAccess>(&mut self, bus: &mut B, instr: u32, indexing: Indexing, width: Width) {
        let address = self.transfer_address(bus, instr, instr & 0xFFF, indexing);
        self.store(bus, instr, address, width);
    }

    fn imm_load<B: BusAccess>(&mut self, bus: &mut B, instr: u32, indexing: Indexing, width: Width) {
        let address = self.transfer_address(bus, instr, instr & 0xFFF, indexing);
        self.load(bus, instr, address, width);
    }

    fn reg_store<B: BusAccess>(&mut self, bus: &mut B, instr: u32, indexing: Indexing, width: Width) {
        let address = self.transfer_address(bus, instr, self.shifted_offset(instr), indexing);
        self.store(bus, instr, address, width);
    }

    fn reg_load<B: BusAccess>(&mut self, bus: &mut B, instr: u32, indexing: Indexing, width: Width) {
        let address = self.transfer_address(bus, instr, self.shifted_offset(instr), indexing);
        self.load(bus, instr, address, width);
    }

    // Halfword and signed

    pub(super) fn strh_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.halfword_store(bus, instr, Indexing::Post);
    }
    pub(super) fn ldrh_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.halfword_load(bus, instr, Indexing::Post, Width::Half);
    }
    pub(super) fn ldrsb_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.halfword_load(bus, instr, Indexing::Post, Width::SignedByte);
    }
    pub(super) fn ldrsh_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.halfword_load(bus, instr, Indexing::Post, Width::SignedHalf);
    }
    pub(super) fn strh_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.halfword_store(bus, instr, Indexing::Pre);
    }
    pub(super) fn ldrh_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.halfword_load(bus, instr, Indexing::Pre, Width::Half);
    }
    pub(super) fn ldrsb_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.halfword_load(bus, instr, Indexing::Pre, Width::SignedByte);
    }
    pub(super) fn ldrsh_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.halfword_load(bus, instr, Indexing::Pre, Width::SignedHalf);
    }

    // Word and byte, immediate offset

    pub(super) fn str_imm_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_store(bus, instr, Indexing::Post, Width::Word);
    }
    pub(super) fn ldr_imm_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_load(bus, instr, Indexing::Post, Width::Word);
    }
    pub(super) fn strt_imm<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_store(bus, instr, Indexing::PostUser, Width::Word);
    }
    pub(super) fn ldrt_imm<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_load(bus, instr, Indexing::PostUser, Width::Word);
    }
    pub(super) fn strb_imm_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_store(bus, instr, Indexing::Post, Width::Byte);
    }
    pub(super) fn ldrb_imm_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_load(bus, instr, Indexing::Post, Width::Byte);
    }
    pub(super) fn strbt_imm<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_store(bus, instr, Indexing::PostUser, Width::Byte);
    }
    pub(super) fn ldrbt_imm<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_load(bus, instr, Indexing::PostUser, Width::Byte);
    }
    pub(super) fn str_imm_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_store(bus, instr, Indexing::Pre, Width::Word);
    }
    pub(super) fn ldr_imm_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_load(bus, instr, Indexing::Pre, Width::Word);
    }
    pub(super) fn strb_imm_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_store(bus, instr, Indexing::Pre, Width::Byte);
    }
    pub(super) fn ldrb_imm_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.imm_load(bus, instr, Indexing::Pre, Width::Byte);
    }

    // Word and byte, scaled register offset

    pub(super) fn str_reg_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_store(bus, instr, Indexing::Post, Width::Word);
    }
    pub(super) fn ldr_reg_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_load(bus, instr, Indexing::Post, Width::Word);
    }
    pub(super) fn strt_reg<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_store(bus, instr, Indexing::PostUser, Width::Word);
    }
    pub(super) fn ldrt_reg<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_load(bus, instr, Indexing::PostUser, Width::Word);
    }
    pub(super) fn strb_reg_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_store(bus, instr, Indexing::Post, Width::Byte);
    }
    pub(super) fn ldrb_reg_post<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_load(bus, instr, Indexing::Post, Width::Byte);
    }
    pub(super) fn strbt_reg<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_store(bus, instr, Indexing::PostUser, Width::Byte);
    }
    pub(super) fn ldrbt_reg<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_load(bus, instr, Indexing::PostUser, Width::Byte);
    }
    pub(super) fn str_reg_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_store(bus, instr, Indexing::Pre, Width::Word);
    }
    pub(super) fn ldr_reg_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_load(bus, instr, Indexing::Pre, Width::Word);
    }
    pub(super) fn strb_reg_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_store(bus, instr, Indexing::Pre, Width::Byte);
    }
    pub(super) fn ldrb_reg_pre<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.reg_load(bus, instr, Indexing::Pre, Width::Byte);
    }
}

#[cfg(test)]
mod tests {
    use super::super::psr::{MODE_IRQ, MODE_SYSTEM};
    use super::super::test_bus::{exec, read32_le, write32_le, MockBus, EXEC_AT};
    use super::*;

    fn setup() -> (Cpu, MockBus) {
        let mut cpu = Cpu::new();
        cpu.set_cpsr(MODE_SYSTEM);
        (cpu, MockBus::new(0x200))
    }

    #[test]
    fn data_access_reports_live_pc() {
        let (mut cpu, mut bus) = setup();
        cpu.write_reg(1, 0x40);
        // STR R0, [R1]
        exec(&mut cpu, &mut bus, 0xE581_0000);
        // LDR R0, [R1]
        exec(&mut cpu, &mut bus, 0xE591_0000);
        assert_eq!(bus.data_pcs, [EXEC_AT + 12, EXEC_AT + 8]);
    }

    #[test]
    fn ldr_pre_and_post_index() {
        let (mut cpu, mut bus) = setup();
        write32_le(&mut bus.mem, 0x44, 0xCAFE_F00D);
        cpu.write_reg(1, 0x40);
        // LDR R0, [R1, #4]
        exec(&mut cpu, &mut bus, 0xE591_0004);
        assert_eq!(cpu.read_reg(0), 0xCAFE_F00D);
        assert_eq!(cpu.read_reg(1), 0x40);
        assert_eq!(bus.internal_cycles, 1);
        assert_eq!(cpu.pc(), EXEC_AT + 12);

        // LDR R0, [R1, #4]!
        exec(&mut cpu, &mut bus, 0xE5B1_0004);
        assert_eq!(cpu.read_reg(1), 0x44);

        // LDR R0, [R1], #-4
        exec(&mut cpu, &mut bus, 0xE411_0004);
        assert_eq!(cpu.read_reg(0), 0xCAFE_F00D);
        assert_eq!(cpu.read_reg(1), 0x40);
    }

    #[test]
    fn misaligned_word_load_rotates() {
        let (mut cpu, mut bus) = setup();
        write32_le(&mut bus.mem, 0x40, 0x1122_3344);
        cpu.write_reg(1, 0x41);
        // LDR R0, [R1]
        exec(&mut cpu, &mut bus, 0xE591_0000);
        assert_eq!(cpu.read_reg(0), 0x4411_2233);
    }

    #[test]
    fn store_pc_writes_plus_12() {
        let (mut cpu, mut bus) = setup();
        cpu.write_reg(1, 0x80);
        // STR PC, [R1]
        exec(&mut cpu, &mut bus, 0xE581_F000);
        assert_eq!(read32_le(&bus.mem, 0x80), EXEC_AT + 12);
        assert_eq!(bus.internal_cycles, 0);
    }

    #[test]
    fn load_into_base_wins_over_writeback() {
        let (mut cpu, mut bus) = setup();
        write32_le(&mut bus.mem, 0x40, 0x1234);
        cpu.write_reg(1, 0x40);
        // LDR R1, [R1], #4
        exec(&mut cpu, &mut bus, 0xE491_1004);
        assert_eq!(cpu.read_reg(1), 0x1234);
    }

    #[test]
    fn load_into_pc_branches() {
        let (mut cpu, mut bus) = setup();
        write32_le(&mut bus.mem, 0x40, 0x0000_0183);
        cpu.write_reg(1, 0x40);
        // LDR PC, [R1]
        exec(&mut cpu, &mut bus, 0xE591_F000);
        assert_eq!(cpu.pc(), 0x180);
        assert!(cpu.is_refilling());
    }

    #[test]
    fn byte_and_register_offset() {
        let (mut cpu, mut bus) = setup();
        cpu.write_reg(0, 0x1AB);
        cpu.write_reg(1, 0x40);
        cpu.write_reg(2, 2);
        // STRB R0, [R1, R2, LSL #2]
        exec(&mut cpu, &mut bus, 0xE7C1_0102);
        assert_eq!(bus.mem[0x48], 0xAB);
        assert_eq!(bus.mem[0x49], 0);
        // LDRB R3, [R1, -R2, LSL #2]! after seeding 0x38
        bus.mem[0x38] = 0x7F;
        exec(&mut cpu, &mut bus, 0xE771_3102);
        assert_eq!(cpu.read_reg(3), 0x7F);
        assert_eq!(cpu.read_reg(1), 0x38);
    }

    #[test]
    fn halfword_and_signed_loads() {
        let (mut cpu, mut bus) = setup();
        bus.mem[0x40..0x44].copy_from_slice(&[0x80, 0xFF, 0x7F, 0x01]);
        cpu.write_reg(1, 0x40);
        // LDRH R0, [R1]
        exec(&mut cpu, &mut bus, 0xE1D1_00B0);
        assert_eq!(cpu.read_reg(0), 0xFF80);
        // LDRSH R0, [R1]
        exec(&mut cpu, &mut bus, 0xE1D1_00F0);
        assert_eq!(cpu.read_reg(0), 0xFFFF_FF80);
        // LDRSB R0, [R1]
        exec(&mut cpu, &mut bus, 0xE1D1_00D0);
        assert_eq!(cpu.read_reg(0), 0xFFFF_FF80);
        // LDRSB R0, [R1, #2]
        exec(&mut cpu, &mut bus, 0xE1D1_00D2);
        assert_eq!(cpu.read_reg(0), 0x7F);
        // LDRH R0, [R1], #0x12 splits the immediate across nibbles
        exec(&mut cpu, &mut bus, 0xE0D1_01B2);
        assert_eq!(cpu.read_reg(1), 0x52);
    }

    #[test]
    fn halfword_store_register_offset() {
        let (mut cpu, mut bus) = setup();
        cpu.write_reg(0, 0xDEAD_BEEF);
        cpu.write_reg(1, 0x40);
        cpu.write_reg(2, 6);
        // STRH R0, [R1, R2]!
        exec(&mut cpu, &mut bus, 0xE1A1_00B2);
        assert_eq!(&bus.mem[0x46..0x48], &[0xEF, 0xBE]);
        assert_eq!(cpu.read_reg(1), 0x46);
    }

    #[test]
    fn translated_transfer_uses_user_base() {
        let (mut cpu, mut bus) = setup();
        cpu.write_reg(13, 0x40);
        cpu.set_cpsr(MODE_IRQ);
        cpu.write_reg(13, 0x100);
        write32_le(&mut bus.mem, 0x40, 0x55);
        // LDRT R0, [R13], #4
        exec(&mut cpu, &mut bus, 0xE4BD_0004);
        assert_eq!(cpu.read_reg(0), 0x55);
        assert_eq!(cpu.read_reg(13), 0x100);
        cpu.set_cpsr(MODE_SYSTEM);
        assert_eq!(cpu.read_reg(13), 0x44);
    }
}
