/// Condition flags kept in lazily-evaluated words.
///
/// N is bit 31 of `negative`, Z is set when `zero` is 0, and C/V live in
/// bit 31 of their words. A shifter carry-out that already sits in bit 31
/// can be stored as-is.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Flags {
    negative: u32,
    zero: u32,
    carry: u32,
    overflow: u32,
}

impl Flags {
    pub fn new() -> Self {
        // Z clear
        Self { negative: 0, zero: 1, carry: 0, overflow: 0 }
    }

    pub fn n(&self) -> bool { self.negative & 0x8000_0000 != 0 }
    pub fn z(&self) -> bool { self.zero == 0 }
    pub fn c(&self) -> bool { self.carry & 0x8000_0000 != 0 }
    pub fn v(&self) -> bool { self.overflow & 0x8000_0000 != 0 }

    pub fn set_nz(&mut self, result: u32) {
        self.negative = result;
        self.zero = result;
    }

    pub fn set_negative(&mut self, word: u32) { self.negative = word; }
    pub fn set_zero(&mut self, word: u32) { self.zero = word; }

    /// Stores bit 31 of `word` as the carry.
    pub fn set_carry(&mut self, word: u32) { self.carry = word; }

    pub fn set_carry_bit(&mut self, carry: bool) {
        self.carry = if carry { 0x8000_0000 } else { 0 };
    }

    pub fn set_carry_false(&mut self) { self.carry = 0; }

    pub fn set_overflow_bit(&mut self, overflow: bool) {
        self.overflow = if overflow { 0x8000_0000 } else { 0 };
    }

    /// Carry as 0 or 1.
    pub fn carry_bit(&self) -> u32 { self.carry >> 31 }

    /// Inverted carry as 0 or 1, the borrow of SBC/RSC.
    pub fn borrow_bit(&self) -> u32 { (!self.carry) >> 31 }

    pub fn add_flags(&mut self, a: u32, b: u32) -> u32 {
        let (result, carry) = a.overflowing_add(b);
        self.set_carry_bit(carry);
        self.overflow = (a ^ result) & (b ^ result);
        self.set_nz(result);
        result
    }

    pub fn adc_flags(&mut self, a: u32, b: u32) -> u32 {
        let wide = a as u64 + b as u64 + self.carry_bit() as u64;
        let result = wide as u32;
        self.set_carry_bit(wide > 0xFFFF_FFFF);
        self.overflow = (a ^ result) & (b ^ result);
        self.set_nz(result);
        result
    }

    pub fn sub_flags(&mut self, a: u32, b: u32) -> u32 {
        let result = a.wrapping_sub(b);
        self.set_carry_bit(a >= b);
        self.overflow = (a ^ b) & (a ^ result);
        self.set_nz(result);
        result
    }

    pub fn sbc_flags(&mut self, a: u32, b: u32) -> u32 {
        let borrow = self.borrow_bit();
        let result = a.wrapping_sub(b).wrapping_sub(borrow);
        self.set_carry_bit(a as u64 >= b as u64 + borrow as u64);
        self.overflow = (a ^ b) & (a ^ result);
        self.set_nz(result);
        result
    }

    pub fn cmp_flags(&mut self, a: u32, b: u32) { self.sub_flags(a, b); }
    pub fn cmn_flags(&mut self, a: u32, b: u32) { self.add_flags(a, b); }

    /// Flags packed into bits 31..28, everything else zero.
    pub fn nzcv(&self) -> u32 {
        (self.negative & 0x8000_0000)
            | ((self.z() as u32) << 30)
            | ((self.carry & 0x8000_0000) >> 2)
            | ((self.overflow & 0x8000_0000) >> 3)
    }

    pub fn set_nzcv(&mut self, word: u32) {
        self.negative = word;
        self.zero = !word & 0x4000_0000;
        self.carry = word << 2;
        self.overflow = word << 3;
    }

    /// Evaluates the condition field in bits 31..28 of `instr`.
    ///
    /// Odd encodings invert the even ones. 0xE and 0xF both execute: NV is
    /// reused on this core and behaves as AL.
    pub fn check_condition(&self, instr: u32) -> bool {
        let cond = instr >> 28;
        let passed = match cond >> 1 {
            0 => self.z(),                                  // EQ / NE
            1 => self.c(),                                  // CS / CC
            2 => self.n(),                                  // MI / PL
            3 => self.v(),                                  // VS / VC
            4 => self.c() && !self.z(),                     // HI / LS
            5 => self.n() == self.v(),                      // GE / LT
            6 => !self.z() && self.n() == self.v(),         // GT / LE
            _ => return true,                               // AL / NV
        };
        passed != (cond & 1 != 0)
    }
}

impl Default for Flags {
    fn default() -> Self { Self::new() }
}
