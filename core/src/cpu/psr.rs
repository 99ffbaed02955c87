use std::fmt;

pub const MODE_USER: u32 = 0x10;
pub const MODE_FIQ: u32 = 0x11;
pub const MODE_IRQ: u32 = 0x12;
pub const MODE_SUPERVISOR: u32 = 0x13;
pub const MODE_ABORT: u32 = 0x17;
pub const MODE_UNDEFINED: u32 = 0x1B;
pub const MODE_SYSTEM: u32 = 0x1F;

pub const IRQ_DISABLE: u32 = 0x80;
pub const FIQ_DISABLE: u32 = 0x40;
pub const THUMB_BIT: u32 = 0x20;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CpuState { Arm, Thumb }

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CpuMode {
    User,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
    System,
}

impl CpuMode {
    /// Unrecognised mode encodings are treated as User.
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x1F {
            MODE_FIQ => CpuMode::Fiq,
            MODE_IRQ => CpuMode::Irq,
            MODE_SUPERVISOR => CpuMode::Supervisor,
            MODE_ABORT => CpuMode::Abort,
            MODE_UNDEFINED => CpuMode::Undefined,
            MODE_SYSTEM => CpuMode::System,
            _ => CpuMode::User,
        }
    }

    pub fn to_bits(self) -> u32 {
        match self {
            CpuMode::User => MODE_USER,
            CpuMode::Fiq => MODE_FIQ,
            CpuMode::Irq => MODE_IRQ,
            CpuMode::Supervisor => MODE_SUPERVISOR,
            CpuMode::Abort => MODE_ABORT,
            CpuMode::Undefined => MODE_UNDEFINED,
            CpuMode::System => MODE_SYSTEM,
        }
    }

    /// Index of this mode's saved status slot. User and System have none.
    pub fn spsr_index(self) -> Option<usize> {
        match self {
            CpuMode::User | CpuMode::System => None,
            CpuMode::Fiq => Some(0),
            CpuMode::Irq => Some(1),
            CpuMode::Supervisor => Some(2),
            CpuMode::Abort => Some(3),
            CpuMode::Undefined => Some(4),
        }
    }

    pub fn is_privileged(self) -> bool {
        !matches!(self, CpuMode::User)
    }
}

/// A full status word value: NZCV in the top nibble, control byte at the bottom.
///
/// The live CPU keeps its flags and control bits apart (see `Flags` and
/// `Cpu::mode_flags`); this type is what gets composed for MRS, stored in the
/// SPSR banks and handed to callers that want a snapshot.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct Cpsr(u32);

impl fmt::Debug for Cpsr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpsr")
            .field("N", &self.n())
            .field("Z", &self.z())
            .field("C", &self.c())
            .field("V", &self.v())
            .field("I", &self.i())
            .field("F", &self.f())
            .field("T", &self.t())
            .field("mode", &self.mode())
            .finish()
    }
}

impl Cpsr {
    pub const fn from_raw(value: u32) -> Self { Self(value) }

    pub fn raw(&self) -> u32 { self.0 }

    pub fn n(&self) -> bool { self.0 & (1 << 31) != 0 }
    pub fn z(&self) -> bool { self.0 & (1 << 30) != 0 }
    pub fn c(&self) -> bool { self.0 & (1 << 29) != 0 }
    pub fn v(&self) -> bool { self.0 & (1 << 28) != 0 }
    pub fn i(&self) -> bool { self.0 & IRQ_DISABLE != 0 }
    pub fn f(&self) -> bool { self.0 & FIQ_DISABLE != 0 }
    pub fn t(&self) -> bool { self.0 & THUMB_BIT != 0 }

    pub fn nzcv(&self) -> u32 { self.0 & 0xF000_0000 }
    pub fn control(&self) -> u32 { self.0 & 0xFF }

    pub fn mode(&self) -> CpuMode { CpuMode::from_bits(self.0) }
    pub fn state(&self) -> CpuState { if self.t() { CpuState::Thumb } else { CpuState::Arm } }
}

impl fmt::Display for Cpsr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}{} {}{}{} {:?}",
            flag(self.n(), 'N'),
            flag(self.z(), 'Z'),
            flag(self.c(), 'C'),
            flag(self.v(), 'V'),
            flag(self.i(), 'I'),
            flag(self.f(), 'F'),
            flag(self.t(), 'T'),
            self.mode(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits_roundtrip() {
        for mode in [
            CpuMode::User,
            CpuMode::Fiq,
            CpuMode::Irq,
            CpuMode::Supervisor,
            CpuMode::Abort,
            CpuMode::Undefined,
            CpuMode::System,
        ] {
            assert_eq!(CpuMode::from_bits(mode.to_bits()), mode);
        }
        assert_eq!(CpuMode::from_bits(0x00), CpuMode::User);
    }

    #[test]
    fn cpsr_field_accessors() {
        let cpsr = Cpsr::from_raw(0xA000_00B3);
        assert!(cpsr.n());
        assert!(!cpsr.z());
        assert!(cpsr.c());
        assert!(!cpsr.v());
        assert!(cpsr.i());
        assert!(!cpsr.f());
        assert!(cpsr.t());
        assert_eq!(cpsr.mode(), CpuMode::Supervisor);
        assert_eq!(cpsr.state(), CpuState::Thumb);
        assert_eq!(cpsr.to_string(), "N-C- I-T Supervisor");
    }

    #[test]
    fn spsr_slots_only_for_exception_modes() {
        assert_eq!(CpuMode::User.spsr_index(), None);
        assert_eq!(CpuMode::System.spsr_index(), None);
        assert_eq!(CpuMode::Fiq.spsr_index(), Some(0));
        assert_eq!(CpuMode::Undefined.spsr_index(), Some(4));
    }
}
