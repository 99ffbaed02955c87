//! Bus wait states and the cartridge prefetch buffer.
//!
//! Access costs live in two 32-entry tables indexed by `(address >> 24) | ns`
//! where `ns` is 0x10 for a non-sequential access. Region entries are only
//! populated for the cartridge windows (0x08-0x0D); other regions are charged
//! through their dedicated methods.

use log::debug;

/// Receiver of the cycles the wait model charges.
pub trait Clock {
    fn update_core(&mut self, clocks: u32);

    fn update_core_single(&mut self) {
        self.update_core(1);
    }
}

const NON_SEQUENTIAL: usize = 0x10;
const PREFETCH_ENABLE: u8 = 0x40;
const BUFFER_DEPTH: i32 = 8;

#[inline]
fn in_cartridge_window(pc: u32) -> bool {
    (0x0800_0000..0x0E00_0000).contains(&pc)
}

#[derive(Clone, Debug)]
pub struct WaitStates {
    wram_config: u32,
    wram_wait: u32,
    sram_wait: u32,
    waitcnt0: u8,
    waitcnt1: u8,
    rendering: u32,
    oam_rendering: u32,
    non_sequential: usize,
    buffer: i32,
    clocks: i32,
    clocks16: [u8; 0x20],
    clocks32: [u8; 0x20],
    prefetch: bool,
}

impl Default for WaitStates {
    fn default() -> Self { Self::new() }
}

impl WaitStates {
    pub fn new() -> Self {
        let mut wait = Self {
            wram_config: 0x0D00_0020,
            wram_wait: 3,
            sram_wait: 5,
            waitcnt0: 0,
            waitcnt1: 0,
            rendering: 1,
            oam_rendering: 1,
            non_sequential: NON_SEQUENTIAL,
            buffer: 0,
            clocks: 0,
            clocks16: [0; 0x20],
            clocks32: [0; 0x20],
            prefetch: false,
        };
        for region in 0..3 {
            wait.set_wait_state(region, 0);
        }
        wait
    }

    /// First access cycles for a 2-bit wait control field: 5, 4, 3 or 9.
    pub fn first_access(control: u8) -> u32 {
        match control & 3 {
            3 => 9,
            n => 5 - n as u32,
        }
    }

    /// Second access cycles: bit 2 selects 2, otherwise `2 << region` plus one.
    pub fn second_access(region: usize, control: u8) -> u32 {
        if control & 0x4 == 0 { (2 << region) + 1 } else { 2 }
    }

    /// Rebuilds the cost entries of ROM wait state `region` (0-2).
    pub fn set_wait_state(&mut self, region: usize, control: u8) {
        let first = Self::first_access(control);
        let second = Self::second_access(region, control);
        let base = region << 1;

        for slot in [base, base | 1] {
            self.clocks16[0x18 | slot] = first as u8;
            self.clocks32[0x18 | slot] = (first + second) as u8;
            self.clocks16[0x08 | slot] = second as u8;
            self.clocks32[0x08 | slot] = (second << 1) as u8;
        }
    }

    pub fn clocks16(&self, index: usize) -> u32 { self.clocks16[index & 0x1F] as u32 }
    pub fn clocks32(&self, index: usize) -> u32 { self.clocks32[index & 0x1F] as u32 }

    pub fn prefetch_enabled(&self) -> bool { self.prefetch }
    pub fn wram_wait(&self) -> u32 { self.wram_wait }
    pub fn sram_wait(&self) -> u32 { self.sram_wait }
    pub fn is_non_sequential(&self) -> bool { self.non_sequential != 0 }
    pub fn buffered(&self) -> i32 { self.buffer }
    pub fn pending_clocks(&self) -> i32 { self.clocks }

    // WAITCNT (0x04000204)

    pub fn write_waitcnt0(&mut self, data: u8) {
        self.sram_wait = Self::first_access(data);
        self.set_wait_state(0, data >> 2);
        self.set_wait_state(1, data >> 5);
        self.waitcnt0 = data;
        debug!("WAITCNT low <- {data:#04X} (sram {} clocks)", self.sram_wait);
    }

    pub fn read_waitcnt0(&self) -> u8 { self.waitcnt0 }

    pub fn write_waitcnt1(&mut self, data: u8) {
        self.set_wait_state(2, data);
        let enable = data & PREFETCH_ENABLE != 0;
        if !enable || enable != self.prefetch {
            self.reset_prebuffer();
        }
        self.prefetch = enable;
        self.waitcnt1 = data & 0x5F;
        debug!("WAITCNT high <- {data:#04X} (prefetch {})", if enable { "on" } else { "off" });
    }

    pub fn read_waitcnt1(&self) -> u8 { self.waitcnt1 }

    pub fn write_waitcnt16(&mut self, data: u16) {
        self.write_waitcnt0(data as u8);
        self.write_waitcnt1((data >> 8) as u8);
    }

    pub fn read_waitcnt16(&self) -> u16 {
        self.waitcnt0 as u16 | ((self.waitcnt1 as u16) << 8)
    }

    // Internal memory control (0x04000800)

    pub fn write_wram_config8(&mut self, address: u32, data: u8) {
        let data = data as u32;
        match address & 3 {
            0 => self.wram_config = (self.wram_config & 0xFFFF_FF00) | data,
            1 => self.wram_config = (self.wram_config & 0xFFFF_00FF) | (data << 8),
            2 => self.wram_config = (self.wram_config & 0xFF00_FFFF) | (data << 16),
            _ => {
                self.wram_wait = 0x10 - (data & 0xF);
                self.wram_config = (self.wram_config & 0x00FF_FFFF) | (data << 24);
                debug!("EWRAM wait <- {} clocks", self.wram_wait);
            }
        }
    }

    pub fn write_wram_config16(&mut self, address: u32, data: u16) {
        let data = data as u32;
        if address & 2 == 0 {
            self.wram_config = (self.wram_config & 0xFFFF_0000) | data;
        } else {
            self.wram_config = (data << 16) | (self.wram_config & 0xFFFF);
            self.wram_wait = 0x10 - ((data >> 8) & 0xF);
        }
    }

    pub fn write_wram_config32(&mut self, data: u32) {
        self.wram_config = data;
        self.wram_wait = 0x10 - ((data >> 24) & 0xF);
        debug!("EWRAM wait <- {} clocks", self.wram_wait);
    }

    pub fn read_wram_config8(&self, address: u32) -> u8 {
        match address & 3 {
            0 => (self.wram_config & 0x2F) as u8,
            3 => (self.wram_config >> 24) as u8,
            _ => 0,
        }
    }

    pub fn read_wram_config16(&self, address: u32) -> u16 {
        if address & 2 == 0 {
            (self.wram_config & 0x2F) as u16
        } else {
            ((self.wram_config >> 16) & 0xFF00) as u16
        }
    }

    pub fn read_wram_config32(&self) -> u32 {
        self.wram_config & 0xFF00_002F
    }

    // Sequencing

    pub fn non_sequential_broadcast(&mut self) {
        self.non_sequential = NON_SEQUENTIAL;
    }

    /// PC was written: the next access is non-sequential and the prefetch
    /// buffer no longer matches the fetch stream.
    pub fn non_sequential_broadcast_clear(&mut self) {
        self.non_sequential_broadcast();
        self.reset_prebuffer();
    }

    pub fn reset_prebuffer(&mut self) {
        self.clocks = 0;
        self.buffer = 0;
    }

    fn check_prebuffer_bug(&mut self, pc: u32) {
        if in_cartridge_window(pc) {
            self.non_sequential_broadcast();
        }
    }

    fn check_128k_boundary(&mut self, address: u32) {
        if address & 0x1FFFF == 0 {
            self.non_sequential_broadcast();
        }
    }

    // Internal (I) cycles

    pub fn internal_cycles<C: Clock>(&mut self, clock: &mut C, pc: u32, clocks: u32) {
        if self.prefetch {
            self.multi_clock(clock, pc, clocks);
        } else {
            clock.update_core(clocks);
            self.check_prebuffer_bug(pc);
        }
    }

    pub fn internal_cycle<C: Clock>(&mut self, clock: &mut C, pc: u32) {
        if self.prefetch {
            self.single_clock(clock, pc);
        } else {
            clock.update_core_single();
            self.check_prebuffer_bug(pc);
        }
    }

    /// Charges `clocks` and, while executing from the cartridge, lets the
    /// prefetcher bank them.
    pub fn multi_clock<C: Clock>(&mut self, clock: &mut C, pc: u32, clocks: u32) {
        clock.update_core(clocks);
        if in_cartridge_window(pc) {
            if self.clocks < 0xFF {
                self.clocks += clocks as i32;
            }
        } else {
            self.reset_prebuffer();
        }
    }

    pub fn single_clock<C: Clock>(&mut self, clock: &mut C, pc: u32) {
        clock.update_core_single();
        if in_cartridge_window(pc) {
            if self.clocks < 0xFF {
                self.clocks += 1;
            }
        } else {
            self.reset_prebuffer();
        }
    }

    /// Converts banked clocks into buffered halfwords before a data access
    /// to the cartridge, paying any deficit up front.
    fn drain_overdue_clocks<C: Clock>(&mut self, clock: &mut C, pc: u32) {
        if self.clocks > 0 && self.buffer < BUFFER_DEPTH {
            let region = (pc >> 24) as usize;
            loop {
                self.clocks -= self.clocks16(region) as i32;
                self.buffer += 1;
                if !(self.clocks > 0 && self.buffer < BUFFER_DEPTH) {
                    break;
                }
            }
            if self.clocks < 0 {
                clock.update_core(self.clocks.unsigned_abs());
                self.clocks = 0;
            }
        }
    }

    fn compute_clocks(&mut self, region: usize) {
        let cost = self.clocks16(region) as i32;
        while self.buffer < BUFFER_DEPTH && self.clocks >= cost {
            self.clocks -= cost;
            self.buffer += 1;
        }
    }

    fn drain_overdue_clocks_cpu<C: Clock>(&mut self, clock: &mut C) {
        if self.clocks < 0 {
            clock.update_core(self.clocks.unsigned_abs());
            self.clocks = 0;
        } else {
            clock.update_core_single();
        }
    }

    fn game_pak_fetch16(&mut self, region: usize) {
        self.clocks -= self.clocks16(region | self.non_sequential) as i32;
        self.non_sequential = 0;
    }

    fn game_pak_fetch32(&mut self, region: usize) {
        self.clocks -= self.clocks32(region | self.non_sequential) as i32;
        self.non_sequential = 0;
    }

    fn rom_read32_prefetch<C: Clock>(&mut self, clock: &mut C, region: usize) {
        self.compute_clocks(region);
        match self.buffer {
            0 => self.game_pak_fetch32(region),
            1 => {
                self.game_pak_fetch16(region);
                self.buffer = 0;
            }
            _ => {
                self.clocks += 1;
                self.buffer -= 2;
            }
        }
        self.drain_overdue_clocks_cpu(clock);
    }

    fn rom_read_no_prefetch<C: Clock>(&mut self, clock: &mut C, cost: u32) {
        clock.update_core(cost);
        self.non_sequential = 0;
    }

    // Region access costs. Data accesses go through `multi_clock` so they feed
    // the prefetcher; `*_cpu` variants are instruction fetches.

    pub fn wram_access<C: Clock>(&mut self, clock: &mut C, pc: u32) {
        self.multi_clock(clock, pc, self.wram_wait);
    }

    pub fn wram_access32<C: Clock>(&mut self, clock: &mut C, pc: u32) {
        self.multi_clock(clock, pc, self.wram_wait << 1);
    }

    pub fn wram_access32_cpu<C: Clock>(&mut self, clock: &mut C) {
        clock.update_core(self.wram_wait << 1);
    }

    pub fn rom_access<C: Clock>(&mut self, clock: &mut C, pc: u32, address: u32) {
        self.drain_overdue_clocks(clock, pc);
        self.check_128k_boundary(address);
        let cost = self.clocks16((address >> 24) as usize | self.non_sequential);
        clock.update_core(cost);
        self.non_sequential = 0;
    }

    pub fn rom_access32<C: Clock>(&mut self, clock: &mut C, pc: u32, address: u32) {
        self.drain_overdue_clocks(clock, pc);
        self.check_128k_boundary(address);
        let cost = self.clocks32((address >> 24) as usize | self.non_sequential);
        clock.update_core(cost);
        self.non_sequential = 0;
    }

    pub fn rom_access32_cpu<C: Clock>(&mut self, clock: &mut C, address: u32) {
        self.check_128k_boundary(address);
        let region = (address >> 24) as usize;
        if self.prefetch {
            self.rom_read32_prefetch(clock, region);
        } else {
            let cost = self.clocks32(region | self.non_sequential);
            self.rom_read_no_prefetch(clock, cost);
        }
    }

    pub fn sram_access<C: Clock>(&mut self, clock: &mut C, pc: u32) {
        self.multi_clock(clock, pc, self.sram_wait);
    }

    pub fn sram_access_cpu<C: Clock>(&mut self, clock: &mut C) {
        self.reset_prebuffer();
        clock.update_core(self.sram_wait);
    }

    pub fn vram_access<C: Clock>(&mut self, clock: &mut C, pc: u32) {
        self.multi_clock(clock, pc, self.rendering);
    }

    pub fn vram_access32<C: Clock>(&mut self, clock: &mut C, pc: u32) {
        self.multi_clock(clock, pc, self.rendering << 1);
    }

    pub fn vram_access32_cpu<C: Clock>(&mut self, clock: &mut C) {
        clock.update_core(self.rendering << 1);
    }

    pub fn oam_access<C: Clock>(&mut self, clock: &mut C, pc: u32) {
        self.multi_clock(clock, pc, self.oam_rendering);
    }

    pub fn oam_access_cpu<C: Clock>(&mut self, clock: &mut C) {
        clock.update_core(self.oam_rendering);
    }

    /// Extra VRAM/OAM cost while the video unit owns the bus.
    pub fn update_render_status(&mut self, rendering: bool, oam_rendering: bool) {
        self.rendering = rendering as u32;
        self.oam_rendering = oam_rendering as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter { clocks: u32 }

    impl Clock for Counter {
        fn update_core(&mut self, clocks: u32) { self.clocks += clocks; }
    }

    const ROM: u32 = 0x0800_0000;
    const IWRAM: u32 = 0x0300_0000;

    #[test]
    fn wait_tables_default() {
        let wait = WaitStates::new();
        // WS0: N=5, S=3; WS1: N=5, S=5; WS2: N=5, S=9
        assert_eq!(wait.clocks16(0x18), 5);
        assert_eq!(wait.clocks16(0x08), 3);
        assert_eq!(wait.clocks32(0x18), 8);
        assert_eq!(wait.clocks32(0x08), 6);
        assert_eq!(wait.clocks16(0x0A), 5);
        assert_eq!(wait.clocks16(0x0C), 9);
        assert_eq!(wait.clocks32(0x1D), 14);
        assert_eq!(wait.clocks16(0x03), 0);
        assert_eq!(wait.wram_wait(), 3);
        assert_eq!(wait.sram_wait(), 5);
    }

    #[test]
    fn first_and_second_access_encoding() {
        assert_eq!(
            [0, 1, 2, 3].map(WaitStates::first_access),
            [5, 4, 3, 9]
        );
        assert_eq!(WaitStates::second_access(0, 0), 3);
        assert_eq!(WaitStates::second_access(1, 0), 5);
        assert_eq!(WaitStates::second_access(2, 0), 9);
        assert_eq!(WaitStates::second_access(2, 4), 2);
    }

    #[test]
    fn waitcnt_rebuilds_tables() {
        let mut wait = WaitStates::new();
        // SRAM=3 (9 clocks), WS0 N=3 S=2, WS1 N=4 S=5
        wait.write_waitcnt16(0x4000 | (0b0_01 << 5) | (0b1_10 << 2) | 0b11);
        assert_eq!(wait.sram_wait(), 9);
        assert_eq!(wait.clocks16(0x18), 3);
        assert_eq!(wait.clocks16(0x08), 2);
        assert_eq!(wait.clocks32(0x18), 5);
        assert_eq!(wait.clocks32(0x08), 4);
        assert_eq!(wait.clocks16(0x1A), 4);
        assert_eq!(wait.clocks16(0x0A), 5);
        assert!(wait.prefetch_enabled());
        assert_eq!(wait.read_waitcnt16(), 0x4000 | (0b0_01 << 5) | (0b1_10 << 2) | 0b11);
        // high byte masked to 0x5F on readback
        wait.write_waitcnt1(0xFF);
        assert_eq!(wait.read_waitcnt1(), 0x5F);
    }

    #[test]
    fn wram_config_readback_and_wait() {
        let mut wait = WaitStates::new();
        assert_eq!(wait.read_wram_config32(), 0x0D00_0020);
        wait.write_wram_config32(0x0E00_00FF);
        assert_eq!(wait.wram_wait(), 2);
        assert_eq!(wait.read_wram_config32(), 0x0E00_002F);
        assert_eq!(wait.read_wram_config8(0x0400_0800), 0x2F);
        assert_eq!(wait.read_wram_config8(0x0400_0801), 0);
        assert_eq!(wait.read_wram_config8(0x0400_0803), 0x0E);
        assert_eq!(wait.read_wram_config16(0x0400_0802), 0x0E00);

        wait.write_wram_config8(0x0400_0803, 0x0D);
        assert_eq!(wait.wram_wait(), 3);
        wait.write_wram_config16(0x0400_0802, 0x0F00);
        assert_eq!(wait.wram_wait(), 1);
    }

    #[test]
    fn non_sequential_is_consumed_once() {
        let mut wait = WaitStates::new();
        let mut clock = Counter::default();
        assert!(wait.is_non_sequential());
        wait.rom_access(&mut clock, IWRAM, ROM + 0x100);
        assert_eq!(clock.clocks, 5);
        assert!(!wait.is_non_sequential());
        wait.rom_access(&mut clock, IWRAM, ROM + 0x102);
        assert_eq!(clock.clocks, 8);
    }

    #[test]
    fn crossing_128k_forces_non_sequential() {
        let mut wait = WaitStates::new();
        let mut clock = Counter::default();
        wait.rom_access32_cpu(&mut clock, ROM + 0x1FFFC);
        let before = clock.clocks;
        wait.rom_access32_cpu(&mut clock, ROM + 0x20000);
        assert_eq!(clock.clocks - before, 8);
        wait.rom_access32_cpu(&mut clock, ROM + 0x20004);
        assert_eq!(clock.clocks - before, 8 + 6);
    }

    #[test]
    fn idle_cycle_in_cartridge_breaks_sequence_without_prefetch() {
        let mut wait = WaitStates::new();
        let mut clock = Counter::default();
        wait.rom_access32_cpu(&mut clock, ROM);
        assert!(!wait.is_non_sequential());
        wait.internal_cycle(&mut clock, IWRAM);
        assert!(!wait.is_non_sequential());
        wait.internal_cycle(&mut clock, ROM + 8);
        assert!(wait.is_non_sequential());
        assert_eq!(clock.clocks, 8 + 2);
    }

    #[test]
    fn prefetch_hides_sequential_fetch_latency() {
        let mut wait = WaitStates::new();
        let mut clock = Counter::default();
        wait.write_waitcnt1(PREFETCH_ENABLE);

        // empty buffer: the first fetch pays N32 on the bus
        wait.rom_access32_cpu(&mut clock, ROM);
        assert_eq!(clock.clocks, 8);

        // idle time while executing from ROM fills the buffer
        wait.internal_cycles(&mut clock, ROM + 8, 12);
        assert_eq!(clock.clocks, 20);
        assert_eq!(wait.pending_clocks(), 12);

        // 12 banked clocks buy four sequential halfwords (3 each)
        wait.rom_access32_cpu(&mut clock, ROM + 4);
        assert_eq!(wait.buffered(), 2);
        assert_eq!(clock.clocks, 21);
    }

    #[test]
    fn disabling_prefetch_resets_buffer() {
        let mut wait = WaitStates::new();
        let mut clock = Counter::default();
        wait.write_waitcnt1(PREFETCH_ENABLE);
        wait.internal_cycles(&mut clock, ROM, 30);
        assert_eq!(wait.pending_clocks(), 30);
        wait.write_waitcnt1(0);
        assert_eq!(wait.pending_clocks(), 0);
        assert_eq!(wait.buffered(), 0);
    }

    #[test]
    fn branch_clear_resets_buffer() {
        let mut wait = WaitStates::new();
        let mut clock = Counter::default();
        wait.write_waitcnt1(PREFETCH_ENABLE);
        wait.rom_access32_cpu(&mut clock, ROM);
        wait.internal_cycles(&mut clock, ROM, 10);
        wait.non_sequential_broadcast_clear();
        assert!(wait.is_non_sequential());
        assert_eq!(wait.pending_clocks(), 0);
    }

    #[test]
    fn render_status_sets_vram_cost() {
        let mut wait = WaitStates::new();
        let mut clock = Counter::default();
        wait.vram_access32_cpu(&mut clock);
        assert_eq!(clock.clocks, 2);
        wait.update_render_status(false, false);
        wait.vram_access32_cpu(&mut clock);
        wait.oam_access_cpu(&mut clock);
        assert_eq!(clock.clocks, 2);
    }
}
