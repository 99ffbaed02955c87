//! ARM decode table.
//!
//! Bits 27..20 and 7..4 of an instruction form a 12-bit class index. The
//! table maps every index to the handler that executes it and is expanded
//! once from the group layout below.

use std::fmt;
use std::sync::OnceLock;

pub const TABLE_SIZE: usize = 4096;

/// Handler selector. `Rs` marks data-processing forms whose shift amount comes
/// from a register; `Pre`/`Post` mark the indexing of single transfers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Opcode {
    And, AndRs, Ands, AndsRs,
    Eor, EorRs, Eors, EorsRs,
    Sub, SubRs, Subs, SubsRs,
    Rsb, RsbRs, Rsbs, RsbsRs,
    Add, AddRs, Adds, AddsRs,
    Adc, AdcRs, Adcs, AdcsRs,
    Sbc, SbcRs, Sbcs, SbcsRs,
    Rsc, RscRs, Rscs, RscsRs,
    Tst, TstRs,
    Teq, TeqRs,
    Cmp, CmpRs,
    Cmn, CmnRs,
    Orr, OrrRs, Orrs, OrrsRs,
    Mov, MovRs, Movs, MovsRs,
    Bic, BicRs, Bics, BicsRs,
    Mvn, MvnRs, Mvns, MvnsRs,

    Mrs,
    Msr,
    Bx,

    Mul, Muls, Mla, Mlas,
    Umull, Umulls, Umlal, Umlals,
    Smull, Smulls, Smlal, Smlals,

    StrhPost, LdrhPost, LdrsbPost, LdrshPost,
    StrhPre, LdrhPre, LdrsbPre, LdrshPre,

    StrImmPost, LdrImmPost, StrtImm, LdrtImm,
    StrbImmPost, LdrbImmPost, StrbtImm, LdrbtImm,
    StrRegPost, LdrRegPost, StrtReg, LdrtReg,
    StrbRegPost, LdrbRegPost, StrbtReg, LdrbtReg,
    StrImmPre, LdrImmPre, StrbImmPre, LdrbImmPre,
    StrRegPre, LdrRegPre, StrbRegPre, LdrbRegPre,

    Swp,
    Swpb,
    BlockTransfer,
    B,
    Bl,
    Swi,
    Undefined,
}

use Opcode::*;

/// One span of the class index space.
enum Group {
    /// Rows of 16 explicit entries.
    Rows(&'static [[Opcode; 16]]),
    /// Each handler repeated `width` times.
    Expanded { handlers: &'static [Opcode], width: usize },
    /// 16 rows; even nibbles take the row's handler, odd nibbles are undefined.
    Sparse(&'static [Opcode; 16]),
}

/// Data-processing row of the register-operand space. Even nibbles shift by
/// immediate, odd nibbles below 8 shift by register, and 9/B/D/F hold the
/// multiply and halfword encodings.
const fn dp_row(imm: Opcode, reg: Opcode, x9: Opcode, xb: Opcode, xd: Opcode, xf: Opcode) -> [Opcode; 16] {
    [imm, reg, imm, reg, imm, reg, imm, reg, imm, x9, imm, xb, imm, xd, imm, xf]
}

const U: Opcode = Undefined;

static REGISTER_OPERAND_ROWS: [[Opcode; 16]; 32] = [
    // 0x00-0x0F: multiplies and post-indexed halfword transfers
    dp_row(And, AndRs, Mul, StrhPost, U, U),
    dp_row(Ands, AndsRs, Muls, LdrhPost, LdrsbPost, LdrshPost),
    dp_row(Eor, EorRs, Mla, StrhPost, U, U),
    dp_row(Eors, EorsRs, Mlas, LdrhPost, LdrsbPost, LdrshPost),
    dp_row(Sub, SubRs, U, StrhPost, U, U),
    dp_row(Subs, SubsRs, U, LdrhPost, LdrsbPost, LdrshPost),
    dp_row(Rsb, RsbRs, U, StrhPost, U, U),
    dp_row(Rsbs, RsbsRs, U, LdrhPost, LdrsbPost, LdrshPost),
    dp_row(Add, AddRs, Umull, StrhPost, U, U),
    dp_row(Adds, AddsRs, Umulls, LdrhPost, LdrsbPost, LdrshPost),
    dp_row(Adc, AdcRs, Umlal, StrhPost, U, U),
    dp_row(Adcs, AdcsRs, Umlals, LdrhPost, LdrsbPost, LdrshPost),
    dp_row(Sbc, SbcRs, Smull, StrhPost, U, U),
    dp_row(Sbcs, SbcsRs, Smulls, LdrhPost, LdrsbPost, LdrshPost),
    dp_row(Rsc, RscRs, Smlal, StrhPost, U, U),
    dp_row(Rscs, RscsRs, Smlals, LdrhPost, LdrsbPost, LdrshPost),
    // 0x10-0x1F: status transfers, swaps, BX and pre-indexed halfword transfers
    [Mrs, U, U, U, U, U, U, U, U, Swp, U, StrhPre, U, U, U, U],
    dp_row(Tst, TstRs, U, LdrhPre, LdrsbPre, LdrshPre),
    [Msr, Bx, U, U, U, U, U, U, U, U, U, StrhPre, U, U, U, U],
    dp_row(Teq, TeqRs, U, LdrhPre, LdrsbPre, LdrshPre),
    [Mrs, U, U, U, U, U, U, U, U, Swpb, U, StrhPre, U, U, U, U],
    dp_row(Cmp, CmpRs, U, LdrhPre, LdrsbPre, LdrshPre),
    [Msr, U, U, U, U, U, U, U, U, U, U, StrhPre, U, U, U, U],
    dp_row(Cmn, CmnRs, U, LdrhPre, LdrsbPre, LdrshPre),
    dp_row(Orr, OrrRs, U, StrhPre, U, U),
    dp_row(Orrs, OrrsRs, U, LdrhPre, LdrsbPre, LdrshPre),
    dp_row(Mov, MovRs, U, StrhPre, U, U),
    dp_row(Movs, MovsRs, U, LdrhPre, LdrsbPre, LdrshPre),
    dp_row(Bic, BicRs, U, StrhPre, U, U),
    dp_row(Bics, BicsRs, U, LdrhPre, LdrsbPre, LdrshPre),
    dp_row(Mvn, MvnRs, U, StrhPre, U, U),
    dp_row(Mvns, MvnsRs, U, LdrhPre, LdrsbPre, LdrshPre),
];

// 0x20-0x3F
static IMMEDIATE_OPERAND: [Opcode; 32] = [
    And, Ands, Eor, Eors, Sub, Subs, Rsb, Rsbs,
    Add, Adds, Adc, Adcs, Sbc, Sbcs, Rsc, Rscs,
    U, Tst, Msr, Teq, U, Cmp, Msr, Cmn,
    Orr, Orrs, Mov, Movs, Bic, Bics, Mvn, Mvns,
];

// 0x40-0x5F
static IMMEDIATE_OFFSET: [Opcode; 32] = [
    StrImmPost, LdrImmPost, StrtImm, LdrtImm, StrbImmPost, LdrbImmPost, StrbtImm, LdrbtImm,
    StrImmPost, LdrImmPost, StrtImm, LdrtImm, StrbImmPost, LdrbImmPost, StrbtImm, LdrbtImm,
    StrImmPre, LdrImmPre, StrImmPre, LdrImmPre, StrbImmPre, LdrbImmPre, StrbImmPre, LdrbImmPre,
    StrImmPre, LdrImmPre, StrImmPre, LdrImmPre, StrbImmPre, LdrbImmPre, StrbImmPre, LdrbImmPre,
];

// 0x60-0x6F
static REGISTER_OFFSET_POST: [Opcode; 16] = [
    StrRegPost, LdrRegPost, StrtReg, LdrtReg, StrbRegPost, LdrbRegPost, StrbtReg, LdrbtReg,
    StrRegPost, LdrRegPost, StrtReg, LdrtReg, StrbRegPost, LdrbRegPost, StrbtReg, LdrbtReg,
];

// 0x70-0x7F
static REGISTER_OFFSET_PRE: [Opcode; 16] = [
    StrRegPre, LdrRegPre, StrRegPre, LdrRegPre, StrbRegPre, LdrbRegPre, StrbRegPre, LdrbRegPre,
    StrRegPre, LdrRegPre, StrRegPre, LdrRegPre, StrbRegPre, LdrbRegPre, StrbRegPre, LdrbRegPre,
];

static LAYOUT: [Group; 10] = [
    Group::Rows(&REGISTER_OPERAND_ROWS),
    Group::Expanded { handlers: &IMMEDIATE_OPERAND, width: 0x10 },
    Group::Expanded { handlers: &IMMEDIATE_OFFSET, width: 0x10 },
    Group::Sparse(&REGISTER_OFFSET_POST),
    Group::Sparse(&REGISTER_OFFSET_PRE),
    Group::Expanded { handlers: &[BlockTransfer], width: 0x200 },
    Group::Expanded { handlers: &[B], width: 0x100 },
    Group::Expanded { handlers: &[Bl], width: 0x100 },
    // coprocessor space
    Group::Expanded { handlers: &[Undefined], width: 0x300 },
    Group::Expanded { handlers: &[Swi], width: 0x100 },
];

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DecodeTableError {
    Length { expected: usize, found: usize },
}

impl fmt::Display for DecodeTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DecodeTableError::Length { expected, found } => {
                write!(f, "decode layout covers {found} class values, expected {expected}")
            }
        }
    }
}

impl std::error::Error for DecodeTableError {}

pub struct DecodeTable {
    entries: Box<[Opcode]>,
}

impl DecodeTable {
    pub fn build() -> Result<Self, DecodeTableError> {
        let mut entries = Vec::with_capacity(TABLE_SIZE);
        for group in LAYOUT.iter() {
            match group {
                Group::Rows(rows) => {
                    for row in rows.iter() {
                        entries.extend_from_slice(row);
                    }
                }
                Group::Expanded { handlers, width } => {
                    for &op in handlers.iter() {
                        entries.extend(std::iter::repeat_n(op, *width));
                    }
                }
                Group::Sparse(handlers) => {
                    for &op in handlers.iter() {
                        for nibble in 0..0x10 {
                            entries.push(if nibble & 1 == 0 { op } else { Undefined });
                        }
                    }
                }
            }
        }

        if entries.len() != TABLE_SIZE {
            return Err(DecodeTableError::Length { expected: TABLE_SIZE, found: entries.len() });
        }
        Ok(Self { entries: entries.into_boxed_slice() })
    }

    #[inline]
    pub fn index(instr: u32) -> usize {
        (((instr >> 16) & 0xFF0) | ((instr >> 4) & 0xF)) as usize
    }

    #[inline]
    pub fn lookup(&self, instr: u32) -> Opcode {
        self.entries[Self::index(instr)]
    }

    pub fn entry(&self, class: usize) -> Opcode {
        self.entries[class & (TABLE_SIZE - 1)]
    }
}

static TABLE: OnceLock<DecodeTable> = OnceLock::new();

/// The process-wide table. A layout that does not cover the class space is a
/// build defect, so this panics on first use rather than returning an error.
pub fn table() -> &'static DecodeTable {
    TABLE.get_or_init(|| DecodeTable::build().unwrap_or_else(|e| panic!("ARM decode table: {e}")))
}
