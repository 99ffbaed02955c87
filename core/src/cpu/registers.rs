use super::psr::CpuMode;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Bank {
    User,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
}

impl Bank {
    fn of(mode: CpuMode) -> Self {
        match mode {
            CpuMode::User | CpuMode::System => Bank::User,
            CpuMode::Fiq => Bank::Fiq,
            CpuMode::Irq => Bank::Irq,
            CpuMode::Supervisor => Bank::Supervisor,
            CpuMode::Abort => Bank::Abort,
            CpuMode::Undefined => Bank::Undefined,
        }
    }
}

/// R0-R15 as seen by the current mode, plus the copies swapped out of view.
///
/// `usr` always holds the User/System R8-R14 while another bank is live
/// (R8-R12 only go stale there if the live bank is not FIQ, which is fine
/// since those modes share R8-R12 with User). It is indexed by `n & 7`.
#[derive(Clone, Debug)]
pub struct RegisterFile {
    regs: [u32; 16],
    usr: [u32; 7],
    fiq: [u32; 7],
    irq: [u32; 2],
    svc: [u32; 2],
    abt: [u32; 2],
    und: [u32; 2],
    spsr: [u32; 5],
}

impl Default for RegisterFile {
    fn default() -> Self { Self::new() }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            regs: [0; 16],
            usr: [0; 7],
            fiq: [0; 7],
            irq: [0; 2],
            svc: [0; 2],
            abt: [0; 2],
            und: [0; 2],
            spsr: [0; 5],
        }
    }

    #[inline]
    pub fn read(&self, n: usize) -> u32 { self.regs[n & 0xF] }

    #[inline]
    pub fn write(&mut self, n: usize, value: u32) { self.regs[n & 0xF] = value; }

    pub fn pc(&self) -> u32 { self.regs[15] }
    pub fn set_pc(&mut self, value: u32) { self.regs[15] = value; }

    pub fn advance_pc(&mut self) {
        self.regs[15] = self.regs[15].wrapping_add(4);
    }

    /// Raw shadow slot read. R15 has no shadow and reads the live PC.
    pub fn read_shadow(&self, n: usize) -> u32 {
        if n < 15 { self.usr[n & 7] } else { self.regs[15] }
    }

    /// R15 has no shadow slot; such writes are dropped.
    pub fn write_shadow(&mut self, n: usize, value: u32) {
        if let Some(slot) = self.usr.get_mut(n & 7) {
            *slot = value;
        }
    }

    /// Reads the User-mode view of register `n` while in `mode`.
    pub fn read_user(&self, mode: CpuMode, n: usize) -> u32 {
        if Self::routes_to_shadow(mode, n) { self.read_shadow(n) } else { self.read(n) }
    }

    /// Writes the User-mode view of register `n` while in `mode`. Callers
    /// guard R15 themselves.
    pub fn write_user(&mut self, mode: CpuMode, n: usize, value: u32) {
        if Self::routes_to_shadow(mode, n) {
            self.write_shadow(n, value);
        } else {
            self.write(n, value);
        }
    }

    fn routes_to_shadow(mode: CpuMode, n: usize) -> bool {
        match mode {
            CpuMode::User | CpuMode::System => false,
            CpuMode::Fiq => n >= 8,
            _ => n >= 13,
        }
    }

    fn bank_slot(&mut self, bank: Bank) -> Option<&mut [u32; 2]> {
        match bank {
            Bank::Irq => Some(&mut self.irq),
            Bank::Supervisor => Some(&mut self.svc),
            Bank::Abort => Some(&mut self.abt),
            Bank::Undefined => Some(&mut self.und),
            Bank::User | Bank::Fiq => None,
        }
    }

    /// Swaps the live R8-R14 from the `from` bank to the `to` bank.
    pub fn switch_bank(&mut self, from: CpuMode, to: CpuMode) {
        let (from, to) = (Bank::of(from), Bank::of(to));
        if from == to {
            return;
        }

        match from {
            Bank::User => self.usr.copy_from_slice(&self.regs[8..15]),
            Bank::Fiq => self.fiq.copy_from_slice(&self.regs[8..15]),
            other => {
                self.usr[..5].copy_from_slice(&self.regs[8..13]);
                let live = [self.regs[13], self.regs[14]];
                if let Some(slot) = self.bank_slot(other) {
                    *slot = live;
                }
            }
        }

        match to {
            Bank::User => self.regs[8..15].copy_from_slice(&self.usr),
            Bank::Fiq => self.regs[8..15].copy_from_slice(&self.fiq),
            other => {
                self.regs[8..13].copy_from_slice(&self.usr[..5]);
                let banked = self.bank_slot(other).map(|slot| *slot).unwrap_or_default();
                self.regs[13] = banked[0];
                self.regs[14] = banked[1];
            }
        }
    }

    pub fn spsr(&self, mode: CpuMode) -> Option<u32> {
        mode.spsr_index().map(|i| self.spsr[i])
    }

    /// Stores into the mode's SPSR slot; a no-op in User and System.
    pub fn set_spsr(&mut self, mode: CpuMode, value: u32) {
        if let Some(i) = mode.spsr_index() {
            self.spsr[i] = value;
        }
    }

    pub fn snapshot(&self) -> [u32; 16] { self.regs }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banked_sp_lr_switching() {
        let mut regs = RegisterFile::new();
        regs.write(13, 0xAAAA_BBBB);
        regs.write(14, 0xCCCC_DDDD);

        regs.switch_bank(CpuMode::System, CpuMode::Irq);
        regs.write(13, 0x1111_2222);
        regs.write(14, 0x3333_4444);

        regs.switch_bank(CpuMode::Irq, CpuMode::Supervisor);
        regs.write(13, 0x5555_6666);
        regs.write(14, 0x7777_8888);

        regs.switch_bank(CpuMode::Supervisor, CpuMode::User);
        assert_eq!(regs.read(13), 0xAAAA_BBBB);
        assert_eq!(regs.read(14), 0xCCCC_DDDD);

        regs.switch_bank(CpuMode::User, CpuMode::Irq);
        assert_eq!(regs.read(13), 0x1111_2222);
        assert_eq!(regs.read(14), 0x3333_4444);

        regs.switch_bank(CpuMode::Irq, CpuMode::Supervisor);
        assert_eq!(regs.read(13), 0x5555_6666);
        assert_eq!(regs.read(14), 0x7777_8888);
    }

    #[test]
    fn fiq_r8_r14_banked() {
        let mut regs = RegisterFile::new();
        for i in 8..=14 { regs.write(i, 0x1000_0000 + i as u32); }

        regs.switch_bank(CpuMode::System, CpuMode::Fiq);
        for i in 8..=14 { regs.write(i, 0x2000_0000 + i as u32); }

        regs.switch_bank(CpuMode::Fiq, CpuMode::System);
        for i in 8..=14 { assert_eq!(regs.read(i), 0x1000_0000 + i as u32); }

        regs.switch_bank(CpuMode::System, CpuMode::Fiq);
        for i in 8..=14 { assert_eq!(regs.read(i), 0x2000_0000 + i as u32); }
    }

    #[test]
    fn non_fiq_modes_share_r8_r12() {
        let mut regs = RegisterFile::new();
        regs.switch_bank(CpuMode::User, CpuMode::Irq);
        regs.write(10, 0xABCD);
        regs.switch_bank(CpuMode::Irq, CpuMode::Fiq);
        assert_ne!(regs.read(10), 0xABCD);
        regs.switch_bank(CpuMode::Fiq, CpuMode::User);
        assert_eq!(regs.read(10), 0xABCD);
    }

    #[test]
    fn same_bank_switch_is_noop() {
        let mut regs = RegisterFile::new();
        regs.write(13, 42);
        regs.switch_bank(CpuMode::User, CpuMode::System);
        assert_eq!(regs.read(13), 42);
    }

    #[test]
    fn user_view_routing() {
        let mut regs = RegisterFile::new();
        for i in 8..=14 { regs.write(i, 0x100 + i as u32); }
        regs.switch_bank(CpuMode::User, CpuMode::Fiq);
        for i in 8..=14 { regs.write(i, 0x200 + i as u32); }

        assert_eq!(regs.read_user(CpuMode::Fiq, 7), regs.read(7));
        assert_eq!(regs.read_user(CpuMode::Fiq, 8), 0x108);
        assert_eq!(regs.read_user(CpuMode::Fiq, 14), 0x10E);

        regs.write_user(CpuMode::Fiq, 13, 0xDEAD);
        regs.switch_bank(CpuMode::Fiq, CpuMode::Irq);
        assert_eq!(regs.read_user(CpuMode::Irq, 12), 0x10C);
        assert_eq!(regs.read_user(CpuMode::Irq, 13), 0xDEAD);

        regs.set_pc(0x0800_0010);
        assert_eq!(regs.read_user(CpuMode::Irq, 15), 0x0800_0010);
        assert_eq!(regs.read_user(CpuMode::System, 13), regs.read(13));
    }

    #[test]
    fn spsr_per_mode_storage() {
        let mut regs = RegisterFile::new();
        regs.set_spsr(CpuMode::Irq, 0xF000_0012);
        regs.set_spsr(CpuMode::Supervisor, 0x0000_0013);
        assert_eq!(regs.spsr(CpuMode::Irq), Some(0xF000_0012));
        assert_eq!(regs.spsr(CpuMode::Supervisor), Some(0x13));
        regs.set_spsr(CpuMode::User, 1);
        assert_eq!(regs.spsr(CpuMode::User), None);
        assert_eq!(regs.spsr(CpuMode::System), None);
    }
}
