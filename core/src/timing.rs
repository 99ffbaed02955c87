use log::debug;

use crate::wait::Clock;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum PowerState {
    #[default]
    Running,
    Halted,
    Stopped,
}

/// Master cycle counter. Peripherals that would advance with the core hang
/// off `update_core`; here it only accumulates.
#[derive(Clone, Debug, Default)]
pub struct Timing {
    cycles: u64,
    power: PowerState,
}

impl Timing {
    pub fn new() -> Self { Self::default() }

    pub fn cycles(&self) -> u64 { self.cycles }
    pub fn power(&self) -> PowerState { self.power }

    pub fn is_idle(&self) -> bool { self.power != PowerState::Running }

    pub fn halt(&mut self) {
        debug!("HALTCNT: halt at cycle {}", self.cycles);
        self.power = PowerState::Halted;
    }

    pub fn stop(&mut self) {
        debug!("HALTCNT: stop at cycle {}", self.cycles);
        self.power = PowerState::Stopped;
    }

    pub fn wake(&mut self) {
        if self.power != PowerState::Running {
            debug!("woken from {:?} at cycle {}", self.power, self.cycles);
            self.power = PowerState::Running;
        }
    }
}

impl Clock for Timing {
    fn update_core(&mut self, clocks: u32) {
        self.cycles += clocks as u64;
    }
}
