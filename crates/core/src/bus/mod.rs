// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Wishbone classic signal bundle.
//!
//! Models that sit on the bus never reach into a signal hierarchy; they see the
//! handshake lines only through [`WishboneSlavePort`].

pub mod interconnect;

use crate::signals::{LogicLevel, LogicVector};

pub const WB_ADDR_WIDTH: u8 = 32;
pub const WB_DATA_WIDTH: u8 = 32;

/// Slave-side view of a synchronous request/acknowledge bus.
pub trait WishboneSlavePort {
    fn cyc(&self) -> LogicLevel;
    fn stb(&self) -> LogicLevel;
    fn we(&self) -> LogicLevel;
    fn adr(&self) -> LogicVector;
    /// Data driven by the master on a write.
    fn dat_w(&self) -> LogicVector;

    fn set_ack(&mut self, level: bool);
    /// Data returned to the master on a read.
    fn set_dat_r(&mut self, value: u32);
}

/// A resolved request as seen by a slave in the sampling phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WishboneRequest {
    pub addr: u32,
    pub write: bool,
    pub dat_w: LogicVector,
}

/// Result of sampling the handshake lines once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSample {
    /// cyc and stb are not both asserted.
    Idle,
    /// A control line or the address could not be resolved to 0/1.
    Indeterminate,
    Request(WishboneRequest),
}

impl BusSample {
    /// Samples cyc, stb, we and adr. Write data is captured unresolved; it is
    /// up to the slave to decide how much of it must be defined.
    pub fn take<P: WishboneSlavePort + ?Sized>(port: &P) -> Self {
        let (Some(cyc), Some(stb), Some(we), Some(addr)) = (
            port.cyc().to_bool(),
            port.stb().to_bool(),
            port.we().to_bool(),
            port.adr().to_u32(),
        ) else {
            return BusSample::Indeterminate;
        };

        if !(cyc && stb) {
            return BusSample::Idle;
        }
        BusSample::Request(WishboneRequest {
            addr,
            write: we,
            dat_w: port.dat_w(),
        })
    }
}

/// Shared Wishbone request lines plus the response lines of the register
/// bridge. Other slaves on the bus return their responses through the
/// interconnect in [`crate::testbench`].
///
/// Master-driven lines power up as X and stay undefined until the master
/// leaves reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishboneSignals {
    cyc: LogicLevel,
    stb: LogicLevel,
    we: LogicLevel,
    adr: LogicVector,
    dat_w: LogicVector,
    ack: bool,
    dat_r: u32,
}

impl Default for WishboneSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl WishboneSignals {
    pub fn new() -> Self {
        Self {
            cyc: LogicLevel::Unknown,
            stb: LogicLevel::Unknown,
            we: LogicLevel::Unknown,
            adr: LogicVector::unknown(WB_ADDR_WIDTH),
            dat_w: LogicVector::unknown(WB_DATA_WIDTH),
            ack: false,
            dat_r: 0,
        }
    }

    /// Drives every master line low (reset state).
    pub fn reset_master(&mut self) {
        self.cyc = LogicLevel::Low;
        self.stb = LogicLevel::Low;
        self.we = LogicLevel::Low;
        self.adr = LogicVector::new(WB_ADDR_WIDTH, 0);
        self.dat_w = LogicVector::new(WB_DATA_WIDTH, 0);
    }

    pub fn drive_request(&mut self, addr: u32, write: bool, dat_w: LogicVector) {
        self.cyc = LogicLevel::High;
        self.stb = LogicLevel::High;
        self.we = LogicLevel::from(write);
        self.adr = LogicVector::new(WB_ADDR_WIDTH, addr as u64);
        self.dat_w = dat_w;
    }

    /// Ends the current transfer. Address and data keep their last value.
    pub fn release(&mut self) {
        self.cyc = LogicLevel::Low;
        self.stb = LogicLevel::Low;
        self.we = LogicLevel::Low;
    }

    /// Overrides individual master lines; used to inject X/Z in tests.
    pub fn force_lines(&mut self, cyc: LogicLevel, stb: LogicLevel, we: LogicLevel) {
        self.cyc = cyc;
        self.stb = stb;
        self.we = we;
    }

    pub fn force_adr(&mut self, adr: LogicVector) {
        self.adr = adr;
    }

    pub fn ack(&self) -> bool {
        self.ack
    }

    pub fn dat_r(&self) -> u32 {
        self.dat_r
    }
}

impl WishboneSlavePort for WishboneSignals {
    fn cyc(&self) -> LogicLevel {
        self.cyc
    }

    fn stb(&self) -> LogicLevel {
        self.stb
    }

    fn we(&self) -> LogicLevel {
        self.we
    }

    fn adr(&self) -> LogicVector {
        self.adr
    }

    fn dat_w(&self) -> LogicVector {
        self.dat_w
    }

    fn set_ack(&mut self, level: bool) {
        self.ack = level;
    }

    fn set_dat_r(&mut self, value: u32) {
        self.dat_r = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_lines_are_undefined() {
        let sig = WishboneSignals::new();
        assert_eq!(sig.cyc(), LogicLevel::Unknown);
        assert_eq!(BusSample::take(&sig), BusSample::Indeterminate);
    }

    #[test]
    fn test_sample_idle_and_request() {
        let mut sig = WishboneSignals::new();
        sig.reset_master();
        assert_eq!(BusSample::take(&sig), BusSample::Idle);

        sig.drive_request(0x3000_0004, true, LogicVector::new(32, 0xAA));
        let BusSample::Request(req) = BusSample::take(&sig) else {
            panic!("expected a request");
        };
        assert_eq!(req.addr, 0x3000_0004);
        assert!(req.write);
        assert_eq!(req.dat_w.to_u32(), Some(0xAA));

        sig.release();
        assert_eq!(BusSample::take(&sig), BusSample::Idle);
    }

    #[test]
    fn test_strobe_without_cycle_is_not_a_request() {
        let mut sig = WishboneSignals::new();
        sig.reset_master();
        sig.force_lines(LogicLevel::Low, LogicLevel::High, LogicLevel::Low);
        assert_eq!(BusSample::take(&sig), BusSample::Idle);
    }

    #[test]
    fn test_undefined_address_is_indeterminate_even_when_idle() {
        let mut sig = WishboneSignals::new();
        sig.reset_master();
        sig.force_adr(LogicVector::high_z(32));
        assert_eq!(BusSample::take(&sig), BusSample::Indeterminate);
    }
}
