// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::{LogicLevel, LogicVector};

/// Number of user-project I/O pads.
pub const MPRJ_IO_PADS: u8 = 38;

/// The chip's I/O pad ring as seen from the testbench.
///
/// A pad whose output enable is set shows the peripheral's output bit. Any
/// other pad shows what the testbench drives, or Z if nothing drives it.
#[derive(Debug, Clone)]
pub struct PadRing {
    tb_drive: LogicVector,
    out: LogicVector,
    oe: u64,
}

impl Default for PadRing {
    fn default() -> Self {
        Self::new()
    }
}

impl PadRing {
    pub fn new() -> Self {
        Self {
            tb_drive: LogicVector::high_z(MPRJ_IO_PADS),
            out: LogicVector::new(MPRJ_IO_PADS, 0),
            oe: 0,
        }
    }

    /// Drives pads `hi..=lo` from the testbench with `value` (LSB on `lo`).
    pub fn drive_gpio_in(&mut self, (hi, lo): (u8, u8), value: u64) {
        for pad in lo..=hi.min(MPRJ_IO_PADS - 1) {
            let level = LogicLevel::from((value >> (pad - lo)) & 1 == 1);
            self.tb_drive.set_bit(pad, level);
        }
    }

    pub fn release_gpio_in(&mut self, (hi, lo): (u8, u8)) {
        for pad in lo..=hi.min(MPRJ_IO_PADS - 1) {
            self.tb_drive.set_bit(pad, LogicLevel::HighZ);
        }
    }

    /// Sets output value and output enable for eight pads starting at `lsb`.
    pub fn set_outputs(&mut self, lsb: u8, value: u8, enable: u8) {
        for i in 0..8u8 {
            let pad = lsb + i;
            if pad >= MPRJ_IO_PADS {
                break;
            }
            self.out.set_bit(pad, LogicLevel::from((value >> i) & 1 == 1));
            if (enable >> i) & 1 == 1 {
                self.oe |= 1u64 << pad;
            } else {
                self.oe &= !(1u64 << pad);
            }
        }
    }

    pub fn level(&self, pad: u8) -> LogicLevel {
        if pad >= MPRJ_IO_PADS {
            return LogicLevel::Unknown;
        }
        if self.oe & (1u64 << pad) != 0 {
            self.out.bit(pad)
        } else {
            self.tb_drive.bit(pad)
        }
    }

    /// Reads eight pads starting at `lsb` as a peripheral input byte.
    /// Undriven pads read as 0.
    pub fn input_byte(&self, lsb: u8) -> u8 {
        (0..8u8).fold(0u8, |acc, i| match self.level(lsb + i) {
            LogicLevel::High => acc | (1u8 << i),
            _ => acc,
        })
    }

    /// Returns pads `hi..=lo` as a vector (LSB on `lo`).
    pub fn monitor_gpio(&self, (hi, lo): (u8, u8)) -> LogicVector {
        let hi = hi.min(MPRJ_IO_PADS - 1);
        let lo = lo.min(hi);
        let mut v = LogicVector::new(hi - lo + 1, 0);
        for pad in lo..=hi {
            v.set_bit(pad - lo, self.level(pad));
        }
        v
    }
}
