use super::{decode, Cpu};
use crate::bus::BusAccess;

/// Address `exec` pretends the instruction was fetched from.
pub const EXEC_AT: u32 = 0x100;

/// Flat little-endian memory that grows on demand and counts the cycle hooks.
pub struct MockBus {
    pub mem: Vec<u8>,
    pub internal_cycles: u32,
    pub non_sequential: u32,
    pub branches: Vec<u32>,
    pub data_pcs: Vec<u32>,
}

impl MockBus {
    pub fn new(size: usize) -> Self {
        Self { mem: vec![0; size], internal_cycles: 0, non_sequential: 0, branches: Vec::new(), data_pcs: Vec::new() }
    }

    fn ensure_size(&mut self, addr: u32, size: usize) {
        let addr = addr as usize;
        if addr + size > self.mem.len() {
            self.mem.resize(addr + size, 0);
        }
    }
}

impl BusAccess for MockBus {
    fn read32(&mut self, addr: u32) -> u32 {
        self.ensure_size(addr, 4);
        let a = addr as usize;
        u32::from_le_bytes([self.mem[a], self.mem[a + 1], self.mem[a + 2], self.mem[a + 3]])
    }
    fn read16(&mut self, addr: u32) -> u16 {
        self.ensure_size(addr, 2);
        let a = addr as usize;
        u16::from_le_bytes([self.mem[a], self.mem[a + 1]])
    }
    fn read8(&mut self, addr: u32) -> u8 {
        self.ensure_size(addr, 1);
        self.mem[addr as usize]
    }
    fn write32(&mut self, addr: u32, value: u32) {
        self.ensure_size(addr, 4);
        let a = addr as usize;
        self.mem[a..a + 4].copy_from_slice(&value.to_le_bytes());
    }
    fn write16(&mut self, addr: u32, value: u16) {
        self.ensure_size(addr, 2);
        let a = addr as usize;
        self.mem[a..a + 2].copy_from_slice(&value.to_le_bytes());
    }
    fn write8(&mut self, addr: u32, value: u8) {
        self.ensure_size(addr, 1);
        self.mem[addr as usize] = value;
    }

    fn internal_cycle(&mut self, _pc: u32) {
        self.internal_cycles += 1;
    }

    fn non_sequential(&mut self) {
        self.non_sequential += 1;
    }

    fn executing_at(&mut self, pc: u32) {
        self.data_pcs.push(pc);
    }

    fn branched(&mut self, target: u32) {
        self.branches.push(target);
    }
}

pub fn write32_le(mem: &mut Vec<u8>, addr: usize, value: u32) {
    if addr + 4 > mem.len() {
        mem.resize(addr + 4, 0);
    }
    mem[addr..addr + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn read32_le(mem: &[u8], addr: usize) -> u32 {
    u32::from_le_bytes([mem[addr], mem[addr + 1], mem[addr + 2], mem[addr + 3]])
}

/// Runs one instruction as if it had reached execute at `EXEC_AT`, skipping
/// the fetch and the condition check.
pub fn exec(cpu: &mut Cpu, bus: &mut MockBus, instr: u32) {
    cpu.regs.set_pc(EXEC_AT + 8);
    cpu.pipe.execute = instr;
    cpu.execute(bus, instr, decode::table().lookup(instr));
}
