//! ARM-state dispatch and the non-memory instruction families.

use log::warn;

use super::decode::Opcode as Op;
use super::psr::{MODE_USER, THUMB_BIT};
use super::shifter::rotated_imm;
use super::Cpu;
use crate::bus::BusAccess;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AluOp {
    And, Eor, Sub, Rsb, Add, Adc, Sbc, Rsc,
    Tst, Teq, Cmp, Cmn, Orr, Mov, Bic, Mvn,
}

impl AluOp {
    /// Logical ops take C from the shifter when setting flags.
    fn is_logical(self) -> bool {
        matches!(
            self,
            AluOp::And | AluOp::Eor | AluOp::Tst | AluOp::Teq | AluOp::Orr | AluOp::Mov | AluOp::Bic | AluOp::Mvn
        )
    }

    fn is_compare(self) -> bool {
        matches!(self, AluOp::Tst | AluOp::Teq | AluOp::Cmp | AluOp::Cmn)
    }
}

/// Where a data-processing shift amount comes from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ShiftBy {
    Immediate,
    Register,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum LongMultiply {
    Unsigned,
    UnsignedAccumulate,
    Signed,
    SignedAccumulate,
}

#[inline]
pub(super) fn rn(instr: u32) -> usize { ((instr >> 16) & 0xF) as usize }
#[inline]
pub(super) fn rd(instr: u32) -> usize { ((instr >> 12) & 0xF) as usize }
#[inline]
pub(super) fn rs(instr: u32) -> usize { ((instr >> 8) & 0xF) as usize }
#[inline]
pub(super) fn rm(instr: u32) -> usize { (instr & 0xF) as usize }

impl Cpu {
    pub(super) fn execute<B: BusAccess>(&mut self, bus: &mut B, instr: u32, op: Op) {
        use ShiftBy::{Immediate as Imm, Register as Reg};
        match op {
            Op::And => self.alu(bus, instr, AluOp::And, false, Imm),
            Op::AndRs => self.alu(bus, instr, AluOp::And, false, Reg),
            Op::Ands => self.alu(bus, instr, AluOp::And, true, Imm),
            Op::AndsRs => self.alu(bus, instr, AluOp::And, true, Reg),
            Op::Eor => self.alu(bus, instr, AluOp::Eor, false, Imm),
            Op::EorRs => self.alu(bus, instr, AluOp::Eor, false, Reg),
            Op::Eors => self.alu(bus, instr, AluOp::Eor, true, Imm),
            Op::EorsRs => self.alu(bus, instr, AluOp::Eor, true, Reg),
            Op::Sub => self.alu(bus, instr, AluOp::Sub, false, Imm),
            Op::SubRs => self.alu(bus, instr, AluOp::Sub, false, Reg),
            Op::Subs => self.alu(bus, instr, AluOp::Sub, true, Imm),
            Op::SubsRs => self.alu(bus, instr, AluOp::Sub, true, Reg),
            Op::Rsb => self.alu(bus, instr, AluOp::Rsb, false, Imm),
            Op::RsbRs => self.alu(bus, instr, AluOp::Rsb, false, Reg),
            Op::Rsbs => self.alu(bus, instr, AluOp::Rsb, true, Imm),
            Op::RsbsRs => self.alu(bus, instr, AluOp::Rsb, true, Reg),
            Op::Add => self.alu(bus, instr, AluOp::Add, false, Imm),
            Op::AddRs => self.alu(bus, instr, AluOp::Add, false, Reg),
            Op::Adds => self.alu(bus, instr, AluOp::Add, true, Imm),
            Op::AddsRs => self.alu(bus, instr, AluOp::Add, true, Reg),
            Op::Adc => self.alu(bus, instr, AluOp::Adc, false, Imm),
            Op::AdcRs => self.alu(bus, instr, AluOp::Adc, false, Reg),
            Op::Adcs => self.alu(bus, instr, AluOp::Adc, true, Imm),
            Op::AdcsRs => self.alu(bus, instr, AluOp::Adc, true, Reg),
            Op::Sbc => self.alu(bus, instr, AluOp::Sbc, false, Imm),
            Op::SbcRs => self.alu(bus, instr, AluOp::Sbc, false, Reg),
            Op::Sbcs => self.alu(bus, instr, AluOp::Sbc, true, Imm),
            Op::SbcsRs => self.alu(bus, instr, AluOp::Sbc, true, Reg),
            Op::Rsc => self.alu(bus, instr, AluOp::Rsc, false, Imm),
            Op::RscRs => self.alu(bus, instr, AluOp::Rsc, false, Reg),
            Op::Rscs => self.alu(bus, instr, AluOp::Rsc, true, Imm),
            Op::RscsRs => self.alu(bus, instr, AluOp::Rsc, true, Reg),
            Op::Tst => self.alu(bus, instr, AluOp::Tst, true, Imm),
            Op::TstRs => self.alu(bus, instr, AluOp::Tst, true, Reg),
            Op::Teq => self.alu(bus, instr, AluOp::Teq, true, Imm),
            Op::TeqRs => self.alu(bus, instr, AluOp::Teq, true, Reg),
            Op::Cmp => self.alu(bus, instr, AluOp::Cmp, true, Imm),
            Op::CmpRs => self.alu(bus, instr, AluOp::Cmp, true, Reg),
            Op::Cmn => self.alu(bus, instr, AluOp::Cmn, true, Imm),
            Op::CmnRs => self.alu(bus, instr, AluOp::Cmn, true, Reg),
            Op::Orr => self.alu(bus, instr, AluOp::Orr, false, Imm),
            Op::OrrRs => self.alu(bus, instr, AluOp::Orr, false, Reg),
            Op::Orrs => self.alu(bus, instr, AluOp::Orr, true, Imm),
            Op::OrrsRs => self.alu(bus, instr, AluOp::Orr, true, Reg),
            Op::Mov => self.alu(bus, instr, AluOp::Mov, false, Imm),
            Op::MovRs => self.alu(bus, instr, AluOp::Mov, false, Reg),
            Op::Movs => self.alu(bus, instr, AluOp::Mov, true, Imm),
            Op::MovsRs => self.alu(bus, instr, AluOp::Mov, true, Reg),
            Op::Bic => self.alu(bus, instr, AluOp::Bic, false, Imm),
            Op::BicRs => self.alu(bus, instr, AluOp::Bic, false, Reg),
            Op::Bics => self.alu(bus, instr, AluOp::Bic, true, Imm),
            Op::BicsRs => self.alu(bus, instr, AluOp::Bic, true, Reg),
            Op::Mvn => self.alu(bus, instr, AluOp::Mvn, false, Imm),
            Op::MvnRs => self.alu(bus, instr, AluOp::Mvn, false, Reg),
            Op::Mvns => self.alu(bus, instr, AluOp::Mvn, true, Imm),
            Op::MvnsRs => self.alu(bus, instr, AluOp::Mvn, true, Reg),

            Op::Mrs => self.mrs(bus, instr),
            Op::Msr => self.msr(instr),
            Op::Bx => self.bx(bus, instr),

            Op::Mul => self.mul(bus, instr, false),
            Op::Muls => self.mul(bus, instr, true),
            Op::Mla => self.mla(bus, instr, false),
            Op::Mlas => self.mla(bus, instr, true),
            Op::Umull => self.multiply_long(bus, instr, LongMultiply::Unsigned, false),
            Op::Umulls => self.multiply_long(bus, instr, LongMultiply::Unsigned, true),
            Op::Umlal => self.multiply_long(bus, instr, LongMultiply::UnsignedAccumulate, false),
            Op::Umlals => self.multiply_long(bus, instr, LongMultiply::UnsignedAccumulate, true),
            Op::Smull => self.multiply_long(bus, instr, LongMultiply::Signed, false),
            Op::Smulls => self.multiply_long(bus, instr, LongMultiply::Signed, true),
            Op::Smlal => self.multiply_long(bus, instr, LongMultiply::SignedAccumulate, false),
            Op::Smlals => self.multiply_long(bus, instr, LongMultiply::SignedAccumulate, true),

            Op::StrhPost => self.strh_post(bus, instr),
            Op::LdrhPost => self.ldrh_post(bus, instr),
            Op::LdrsbPost => self.ldrsb_post(bus, instr),
            Op::LdrshPost => self.ldrsh_post(bus, instr),
            Op::StrhPre => self.strh_pre(bus, instr),
            Op::LdrhPre => self.ldrh_pre(bus, instr),
            Op::LdrsbPre => self.ldrsb_pre(bus, instr),
            Op::LdrshPre => self.ldrsh_pre(bus, instr),

            Op::StrImmPost => self.str_imm_post(bus, instr),
            Op::LdrImmPost => self.ldr_imm_post(bus, instr),
            Op::StrtImm => self.strt_imm(bus, instr),
            Op::LdrtImm => self.ldrt_imm(bus, instr),
            Op::StrbImmPost => self.strb_imm_post(bus, instr),
            Op::LdrbImmPost => self.ldrb_imm_post(bus, instr),
            Op::StrbtImm => self.strbt_imm(bus, instr),
            Op::LdrbtImm => self.ldrbt_imm(bus, instr),
            Op::StrRegPost => self.str_reg_post(bus, instr),
            Op::LdrRegPost => self.ldr_reg_post(bus, instr),
            Op::StrtReg => self.strt_reg(bus, instr),
            Op::LdrtReg => self.ldrt_reg(bus, instr),
            Op::StrbRegPost => self.strb_reg_post(bus, instr),
            Op::LdrbRegPost => self.ldrb_reg_post(bus, instr),
            Op::StrbtReg => self.strbt_reg(bus, instr),
            Op::LdrbtReg => self.ldrbt_reg(bus, instr),
            Op::StrImmPre => self.str_imm_pre(bus, instr),
            Op::LdrImmPre => self.ldr_imm_pre(bus, instr),
            Op::StrbImmPre => self.strb_imm_pre(bus, instr),
            Op::LdrbImmPre => self.ldrb_imm_pre(bus, instr),
            Op::StrRegPre => self.str_reg_pre(bus, instr),
            Op::LdrRegPre => self.ldr_reg_pre(bus, instr),
            Op::StrbRegPre => self.strb_reg_pre(bus, instr),
            Op::LdrbRegPre => self.ldrb_reg_pre(bus, instr),

            Op::Swp => self.swp(bus, instr),
            Op::Swpb => self.swpb(bus, instr),
            Op::BlockTransfer => self.block_transfer(bus, instr),
            Op::B => self.b(bus, instr),
            Op::Bl => self.bl(bus, instr),
            Op::Swi => self.software_interrupt(bus),
            Op::Undefined => self.undefined_instruction(bus),
        }
    }

    // Data processing

    /// Register-specified shifts advance the PC before any operand is read,
    /// so R15 operands see the instruction address plus 12.
    fn alu<B: BusAccess>(&mut self, bus: &mut B, instr: u32, op: AluOp, set_flags: bool, shift: ShiftBy) {
        if shift == ShiftBy::Register {
            self.regs.advance_pc();
        }
        let operand1 = self.regs.read(rn(instr));
        let shifter_carry = set_flags && op.is_logical();
        let operand2 = match (shift, shifter_carry) {
            (ShiftBy::Immediate, false) => self.operand2(instr),
            (ShiftBy::Immediate, true) => self.operand2_s(instr),
            (ShiftBy::Register, false) => self.operand2_reg(bus, instr),
            (ShiftBy::Register, true) => self.operand2_reg_s(bus, instr),
        };

        let result = if set_flags {
            self.alu_flags(op, operand1, operand2)
        } else {
            self.alu_value(op, operand1, operand2)
        };

        if shift == ShiftBy::Immediate {
            self.regs.advance_pc();
        }
        if op.is_compare() {
            return;
        }
        if set_flags {
            self.write_register_restore(bus, rd(instr), result);
        } else {
            self.write_register(bus, rd(instr), result);
        }
    }

    fn alu_value(&self, op: AluOp, a: u32, b: u32) -> u32 {
        match op {
            AluOp::And | AluOp::Tst => a & b,
            AluOp::Eor | AluOp::Teq => a ^ b,
            AluOp::Sub | AluOp::Cmp => a.wrapping_sub(b),
            AluOp::Rsb => b.wrapping_sub(a),
            AluOp::Add | AluOp::Cmn => a.wrapping_add(b),
            AluOp::Adc => a.wrapping_add(b).wrapping_add(self.flags.carry_bit()),
            AluOp::Sbc => a.wrapping_sub(b).wrapping_sub(self.flags.borrow_bit()),
            AluOp::Rsc => b.wrapping_sub(a).wrapping_sub(self.flags.borrow_bit()),
            AluOp::Orr => a | b,
            AluOp::Mov => b,
            AluOp::Bic => a & !b,
            AluOp::Mvn => !b,
        }
    }

    fn alu_flags(&mut self, op: AluOp, a: u32, b: u32) -> u32 {
        match op {
            AluOp::Sub | AluOp::Cmp => self.flags.sub_flags(a, b),
            AluOp::Rsb => self.flags.sub_flags(b, a),
            AluOp::Add | AluOp::Cmn => self.flags.add_flags(a, b),
            AluOp::Adc => self.flags.adc_flags(a, b),
            AluOp::Sbc => self.flags.sbc_flags(a, b),
            AluOp::Rsc => self.flags.sbc_flags(b, a),
            _ => {
                let result = self.alu_value(op, a, b);
                self.flags.set_nz(result);
                result
            }
        }
    }

    // Status register transfer

    fn mrs<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        let psr = if instr & 0x0040_0000 == 0 {
            self.cpsr().raw()
        } else {
            self.spsr().unwrap_or_else(|| self.cpsr().raw())
        };
        self.regs.advance_pc();
        self.write_register(bus, rd(instr), psr);
    }

    fn msr(&mut self, instr: u32) {
        match instr & 0x0240_0000 {
            0x0000_0000 => self.msr_cpsr(instr, self.regs.read(rm(instr))),
            0x0040_0000 => self.msr_spsr(instr, self.regs.read(rm(instr))),
            0x0200_0000 => self.flags.set_nzcv(rotated_imm(instr).0),
            _ => self.msr_spsr_flags(rotated_imm(instr).0),
        }
        self.regs.advance_pc();
    }

    /// Flags are always written. The control byte needs the c field and a
    /// privileged mode; T cannot be changed this way.
    fn msr_cpsr(&mut self, instr: u32, operand: u32) {
        self.flags.set_nzcv(operand);
        if instr & 0x1_0000 != 0 && self.mode_flags & 0x1F != MODE_USER {
            self.switch_bank(operand & 0x1F);
            self.mode_flags = operand & !THUMB_BIT & 0xFF;
            self.assert_irq();
        }
    }

    fn msr_spsr(&mut self, instr: u32, operand: u32) {
        let mode = self.mode();
        if let Some(old) = self.regs.spsr(mode) {
            let control = if instr & 0x1_0000 != 0 { operand & 0xFF } else { old & 0xFF };
            self.regs.set_spsr(mode, (operand & 0xF000_0000) | control);
        }
    }

    fn msr_spsr_flags(&mut self, operand: u32) {
        let mode = self.mode();
        if let Some(old) = self.regs.spsr(mode) {
            self.regs.set_spsr(mode, (operand & 0xF000_0000) | (old & 0xFF));
        }
    }

    // Branches

    fn bx<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        let target = self.regs.read(rm(instr));
        if target & 1 == 0 {
            self.branch(bus, target & !3);
        } else {
            warn!("BX into THUMB code at {:#010X}", target & !1);
            self.enter_thumb();
            self.branch(bus, target & !1);
        }
    }

    fn b<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        let offset = ((instr << 8) as i32 >> 6) as u32;
        self.branch(bus, self.regs.pc().wrapping_add(offset));
    }

    fn bl<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        self.regs.write(14, self.regs.pc().wrapping_sub(4));
        self.b(bus, instr);
    }

    // Multiply. R15 is never written; the high (or only) destination write
    // carries the PC advance.

    fn write_multiply_high(&mut self, instr: u32, value: u32) {
        self.regs.advance_pc();
        if rn(instr) != 15 {
            self.regs.write(rn(instr), value);
        }
    }

    fn write_multiply_low(&mut self, instr: u32, value: u32) {
        if rd(instr) != 15 {
            self.regs.write(rd(instr), value);
        }
    }

    /// Rd aliasing Rm leaves the product at zero and skips the multiplier.
    fn multiply_operands<B: BusAccess>(&mut self, bus: &mut B, instr: u32, accumulate: bool) -> u32 {
        if rn(instr) == rm(instr) {
            return 0;
        }
        let (m, s) = (self.regs.read(rm(instr)), self.regs.read(rs(instr)));
        if accumulate {
            self.perform_mul32_mla(bus, m, s)
        } else {
            self.perform_mul32(bus, m, s)
        }
    }

    fn mul<B: BusAccess>(&mut self, bus: &mut B, instr: u32, set_flags: bool) {
        let result = self.multiply_operands(bus, instr, false);
        if set_flags {
            self.flags.set_carry_false();
            self.flags.set_nz(result);
        }
        self.write_multiply_high(instr, result);
    }

    fn mla<B: BusAccess>(&mut self, bus: &mut B, instr: u32, set_flags: bool) {
        let product = self.multiply_operands(bus, instr, true);
        let result = product.wrapping_add(self.regs.read(rd(instr)));
        if set_flags {
            self.flags.set_carry_false();
            self.flags.set_nz(result);
        }
        self.write_multiply_high(instr, result);
    }

    fn multiply_long<B: BusAccess>(&mut self, bus: &mut B, instr: u32, kind: LongMultiply, set_flags: bool) {
        let (m, s) = (self.regs.read(rm(instr)), self.regs.read(rs(instr)));
        let (hi, lo) = (self.regs.read(rn(instr)), self.regs.read(rd(instr)));
        let result = match kind {
            LongMultiply::Unsigned => self.perform_umul64(bus, m, s),
            LongMultiply::UnsignedAccumulate => self.perform_umla64(bus, m, s, hi, lo),
            LongMultiply::Signed => self.perform_mul64(bus, m, s),
            LongMultiply::SignedAccumulate => self.perform_mla64(bus, m, s, hi, lo),
        };
        let (hi, lo) = ((result >> 32) as u32, result as u32);
        if set_flags {
            self.flags.set_carry_false();
            self.flags.set_negative(hi);
            self.flags.set_zero(hi | lo);
        }
        self.write_multiply_high(instr, hi);
        self.write_multiply_low(instr, lo);
    }

    // Swap

    fn swp<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        let base = self.regs.read(rn(instr));
        let data = self.read32(bus, base);
        bus.internal_cycle(self.regs.pc());
        let value = self.regs.read(rm(instr));
        self.write32(bus, base, value);
        self.regs.advance_pc();
        self.write_register(bus, rd(instr), data);
    }

    fn swpb<B: BusAccess>(&mut self, bus: &mut B, instr: u32) {
        let base = self.regs.read(rn(instr));
        let data = self.read8(bus, base);
        bus.internal_cycle(self.regs.pc());
        let value = self.regs.read(rm(instr));
        self.write8(bus, base, value);
        self.regs.advance_pc();
        self.write_register(bus, rd(instr), data);
    }
}
