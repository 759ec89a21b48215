//! GPIO loopback exercise used by the `chip_test` check.
//!
//! One pin drives a deterministic level pattern while a second pin, jumpered
//! to the first, samples it back. The helper only reports what it saw; the
//! caller decides what to log.

use embassy_time::Timer;
use esp_hal::gpio::{Input, Level, Output};

/// Settle time between driving a level and sampling it back.
const SETTLE_MS: u64 = 2;

/// Level driven on the given cycle; alternates starting high.
pub fn level_for_cycle(cycle: u32) -> Level {
    if cycle % 2 == 0 {
        Level::High
    } else {
        Level::Low
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GpioTestReport {
    pub cycles: u32,
    pub mismatches: u32,
}

impl GpioTestReport {
    pub fn passed(&self) -> bool {
        self.cycles > 0 && self.mismatches == 0
    }
}

pub struct GpioTest<'d> {
    drive: Output<'d>,
    sense: Input<'d>,
}

impl<'d> GpioTest<'d> {
    pub fn new(drive: Output<'d>, sense: Input<'d>) -> Self {
        Self { drive, sense }
    }

    pub async fn run(&mut self, cycles: u32) -> GpioTestReport {
        let mut mismatches = 0;
        for cycle in 0..cycles {
            let level = level_for_cycle(cycle);
            self.drive.set_level(level);
            Timer::after_millis(SETTLE_MS).await;
            if self.sense.is_high() != (level == Level::High) {
                mismatches += 1;
            }
        }
        GpioTestReport { cycles, mismatches }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_alternates_starting_high() {
        assert_eq!(level_for_cycle(0), Level::High);
        assert_eq!(level_for_cycle(1), Level::Low);
        assert_eq!(level_for_cycle(2), Level::High);
    }

    #[test]
    fn report_passes_only_on_clean_nonempty_runs() {
        assert!(GpioTestReport {
            cycles: 16,
            mismatches: 0
        }
        .passed());
        assert!(!GpioTestReport {
            cycles: 16,
            mismatches: 1
        }
        .passed());
        assert!(!GpioTestReport::default().passed());
    }
}
