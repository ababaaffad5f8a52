// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register bridge model: a memory-mapped 32-bit word at a fixed bus address
//! that lets firmware and the testbench exchange 16-bit values.
//!
//! Bits [15:0] are the output register (written by firmware, read by the
//! testbench). Bits [31:16] are the input register (written by the testbench,
//! read by firmware).
//!
//! [`RegisterBridge::tick`] is invoked once per rising clock edge, after the
//! edge has settled. A request addressed to the bridge in cycle N is
//! acknowledged in cycle N+1 and released in cycle N+2. Sampling resumes in
//! cycle N+3, so transactions never overlap.
//!
//! A write whose low 16 data bits are X/Z is dropped with a warning and is
//! never acknowledged. From the master's side this looks like a stalled bus.

use crate::bus::{BusSample, WishboneSlavePort};
use crate::{SimResult, SimulationError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Bus address firmware uses for the bridge word.
pub const VGPIO_ADDRESS: u32 = 0x30FF_FFFC;

/// Handle returned by [`RegisterBridge::start`]. Dropping it does not stop
/// the monitor.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
}

impl MonitorHandle {
    /// Asks the monitor to exit before it samples the next transaction.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterState {
    output: u16,
    input: u16,
}

impl RegisterState {
    /// Input register in the upper half, output register in the lower half.
    pub fn combined_read_word(&self) -> u32 {
        ((self.input as u32) << 16) | self.output as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct BridgeStats {
    pub writes: u64,
    pub reads: u64,
    pub dropped_writes: u64,
    pub foreign: u64,
    pub indeterminate: u64,
}

/// What the bridge did during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    /// `start` has not been called.
    Inactive,
    /// The monitor honoured a stop request and will not sample again.
    Stopped,
    NoTransaction,
    Indeterminate,
    Foreign { addr: u32 },
    WriteAccepted { value: u16 },
    ReadAccepted,
    MalformedWrite,
    Acknowledged { read_word: Option<u32> },
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Acknowledge { read: bool },
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

#[derive(Debug)]
pub struct RegisterBridge {
    address: u32,
    regs: RegisterState,
    phase: Phase,
    lifecycle: Lifecycle,
    stop: Arc<AtomicBool>,
    stats: BridgeStats,
}

impl Default for RegisterBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBridge {
    pub fn new() -> Self {
        Self::with_address(VGPIO_ADDRESS)
    }

    pub fn with_address(address: u32) -> Self {
        tracing::info!("Register bridge at {:#010x}", address);
        tracing::debug!("  bits [15:0]  = output (firmware writes)");
        tracing::debug!("  bits [31:16] = input (firmware reads)");
        Self {
            address,
            regs: RegisterState::default(),
            phase: Phase::Idle,
            lifecycle: Lifecycle::Created,
            stop: Arc::new(AtomicBool::new(false)),
            stats: BridgeStats::default(),
        }
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    /// Starts bus monitoring. May be called once per bridge.
    pub fn start(&mut self) -> SimResult<MonitorHandle> {
        if self.lifecycle != Lifecycle::Created {
            return Err(SimulationError::MonitorAlreadyStarted);
        }
        tracing::info!("Starting Wishbone monitor on {:#010x}", self.address);
        self.lifecycle = Lifecycle::Running;
        Ok(MonitorHandle {
            stop: Arc::clone(&self.stop),
        })
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn output(&self) -> u16 {
        self.regs.output
    }

    pub fn input(&self) -> u16 {
        self.regs.input
    }

    /// Stores the low 16 bits of `value` into the input register.
    pub fn set_input(&mut self, value: u32) {
        self.regs.input = (value & 0xFFFF) as u16;
        tracing::info!("Testbench set input [31:16] to {:#06x}", self.regs.input);
    }

    pub fn combined_read_word(&self) -> u32 {
        self.regs.combined_read_word()
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    pub fn output_wait(&self, expected: u32) -> OutputWait {
        OutputWait::new(expected)
    }

    pub fn tick<P: WishboneSlavePort + ?Sized>(&mut self, port: &mut P) -> BridgeEvent {
        match self.phase {
            Phase::Acknowledge { read } => {
                port.set_ack(true);
                let read_word = read.then(|| self.regs.combined_read_word());
                if let Some(word) = read_word {
                    port.set_dat_r(word);
                }
                self.phase = Phase::Release;
                BridgeEvent::Acknowledged { read_word }
            }
            Phase::Release => {
                port.set_ack(false);
                port.set_dat_r(0);
                self.phase = Phase::Idle;
                BridgeEvent::Released
            }
            Phase::Idle => self.monitor(port),
        }
    }

    fn monitor<P: WishboneSlavePort + ?Sized>(&mut self, port: &P) -> BridgeEvent {
        match self.lifecycle {
            Lifecycle::Created => return BridgeEvent::Inactive,
            Lifecycle::Stopped => return BridgeEvent::Stopped,
            Lifecycle::Running => {}
        }
        if self.stop.load(Ordering::SeqCst) {
            tracing::info!("Wishbone monitor stopped");
            self.lifecycle = Lifecycle::Stopped;
            return BridgeEvent::Stopped;
        }

        let req = match BusSample::take(port) {
            BusSample::Idle => return BridgeEvent::NoTransaction,
            BusSample::Indeterminate => {
                self.stats.indeterminate += 1;
                return BridgeEvent::Indeterminate;
            }
            BusSample::Request(req) => req,
        };

        if req.addr != self.address {
            self.stats.foreign += 1;
            return BridgeEvent::Foreign { addr: req.addr };
        }

        if req.write {
            let Some(value) = req.dat_w.low_bits(16) else {
                tracing::warn!("Register bridge: invalid data {} to write", req.dat_w);
                self.stats.dropped_writes += 1;
                return BridgeEvent::MalformedWrite;
            };
            self.regs.output = value as u16;
            self.stats.writes += 1;
            self.phase = Phase::Acknowledge { read: false };
            tracing::info!("Register bridge: write output [15:0] = {:#06x}", value);
            BridgeEvent::WriteAccepted {
                value: value as u16,
            }
        } else {
            self.stats.reads += 1;
            self.phase = Phase::Acknowledge { read: true };
            tracing::info!(
                "Register bridge: read output [15:0] = {:#06x}, input [31:16] = {:#06x}",
                self.regs.output,
                self.regs.input
            );
            BridgeEvent::ReadAccepted
        }
    }
}

/// Predicate for "output register equals a value", re-evaluated once per
/// clock edge by whoever owns the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputWait {
    expected: u16,
}

impl OutputWait {
    pub fn new(expected: u32) -> Self {
        Self {
            expected: (expected & 0xFFFF) as u16,
        }
    }

    pub fn expected(&self) -> u16 {
        self.expected
    }

    /// `output` is the register value as it stood when the edge began, so a
    /// write decoded on edge N first satisfies the wait on its ack edge N+1.
    pub fn is_satisfied(&self, output: u16) -> bool {
        output == self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::WishboneSignals;
    use crate::signals::{LogicLevel, LogicVector};

    fn idle_bus() -> WishboneSignals {
        let mut sig = WishboneSignals::new();
        sig.reset_master();
        sig
    }

    fn running_bridge() -> RegisterBridge {
        let mut bridge = RegisterBridge::new();
        bridge.start().unwrap();
        bridge
    }

    #[test]
    fn test_write_ack_timing() {
        let mut bridge = running_bridge();
        let mut sig = idle_bus();

        sig.drive_request(VGPIO_ADDRESS, true, LogicVector::new(32, 0xFFFF_0001));
        assert_eq!(
            bridge.tick(&mut sig),
            BridgeEvent::WriteAccepted { value: 1 }
        );
        assert!(!sig.ack());
        assert_eq!(bridge.output(), 1);

        assert_eq!(
            bridge.tick(&mut sig),
            BridgeEvent::Acknowledged { read_word: None }
        );
        assert!(sig.ack());
        assert_eq!(sig.dat_r(), 0);

        sig.release();
        assert_eq!(bridge.tick(&mut sig), BridgeEvent::Released);
        assert!(!sig.ack());

        assert_eq!(bridge.tick(&mut sig), BridgeEvent::NoTransaction);
        assert_eq!(bridge.stats().writes, 1);
    }

    #[test]
    fn test_read_returns_combined_word_for_one_cycle() {
        let mut bridge = running_bridge();
        let mut sig = idle_bus();
        bridge.set_input(0x005A);

        sig.drive_request(VGPIO_ADDRESS, true, LogicVector::new(32, 0x0007));
        bridge.tick(&mut sig);
        bridge.tick(&mut sig);
        sig.release();
        bridge.tick(&mut sig);

        sig.drive_request(VGPIO_ADDRESS, false, LogicVector::new(32, 0));
        assert_eq!(bridge.tick(&mut sig), BridgeEvent::ReadAccepted);
        assert_eq!(sig.dat_r(), 0);

        assert_eq!(
            bridge.tick(&mut sig),
            BridgeEvent::Acknowledged {
                read_word: Some(0x005A_0007)
            }
        );
        assert!(sig.ack());
        assert_eq!(sig.dat_r(), 0x005A_0007);

        sig.release();
        bridge.tick(&mut sig);
        assert!(!sig.ack());
        assert_eq!(sig.dat_r(), 0);
    }

    #[test]
    fn test_read_word_uses_input_at_drive_time() {
        let mut bridge = running_bridge();
        let mut sig = idle_bus();

        sig.drive_request(VGPIO_ADDRESS, false, LogicVector::new(32, 0));
        bridge.tick(&mut sig);
        bridge.set_input(0x1_00C3);
        bridge.tick(&mut sig);
        assert_eq!(sig.dat_r(), 0x00C3_0000);
    }

    #[test]
    fn test_foreign_address_is_ignored() {
        let mut bridge = running_bridge();
        let mut sig = idle_bus();

        sig.drive_request(0x3000_0004, true, LogicVector::new(32, 0x55));
        for _ in 0..4 {
            assert_eq!(
                bridge.tick(&mut sig),
                BridgeEvent::Foreign { addr: 0x3000_0004 }
            );
            assert!(!sig.ack());
        }
        assert_eq!(bridge.output(), 0);

        sig.drive_request(VGPIO_ADDRESS - 4, true, LogicVector::new(32, 0x55));
        assert!(matches!(bridge.tick(&mut sig), BridgeEvent::Foreign { .. }));
        assert_eq!(bridge.output(), 0);
    }

    #[test]
    fn test_malformed_write_is_dropped_without_ack() {
        let mut bridge = running_bridge();
        let mut sig = idle_bus();

        let data: LogicVector = "0000000000000000000000000000x001".parse().unwrap();
        sig.drive_request(VGPIO_ADDRESS, true, data);
        for _ in 0..5 {
            assert_eq!(bridge.tick(&mut sig), BridgeEvent::MalformedWrite);
            assert!(!sig.ack());
        }
        assert_eq!(bridge.output(), 0);
        assert_eq!(bridge.stats().dropped_writes, 5);
        assert_eq!(bridge.stats().writes, 0);
    }

    #[test]
    fn test_undefined_upper_data_bits_are_tolerated() {
        let mut bridge = running_bridge();
        let mut sig = idle_bus();

        let data: LogicVector = "zzzzzzzzzzzzzzzz0000000000000011".parse().unwrap();
        sig.drive_request(VGPIO_ADDRESS, true, data);
        assert_eq!(
            bridge.tick(&mut sig),
            BridgeEvent::WriteAccepted { value: 3 }
        );
    }

    #[test]
    fn test_indeterminate_lines_are_skipped() {
        let mut bridge = running_bridge();
        let mut sig = WishboneSignals::new();
        assert_eq!(bridge.tick(&mut sig), BridgeEvent::Indeterminate);

        sig.reset_master();
        sig.drive_request(VGPIO_ADDRESS, true, LogicVector::new(32, 9));
        sig.force_lines(LogicLevel::High, LogicLevel::High, LogicLevel::Unknown);
        assert_eq!(bridge.tick(&mut sig), BridgeEvent::Indeterminate);
        assert_eq!(bridge.output(), 0);
        assert_eq!(bridge.stats().indeterminate, 2);
    }

    #[test]
    fn test_inactive_until_started() {
        let mut bridge = RegisterBridge::new();
        let mut sig = idle_bus();
        sig.drive_request(VGPIO_ADDRESS, true, LogicVector::new(32, 4));
        assert_eq!(bridge.tick(&mut sig), BridgeEvent::Inactive);
        assert_eq!(bridge.output(), 0);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let mut bridge = RegisterBridge::new();
        assert!(bridge.start().is_ok());
        assert!(matches!(
            bridge.start(),
            Err(SimulationError::MonitorAlreadyStarted)
        ));
    }

    #[test]
    fn test_stop_completes_inflight_transaction() {
        let mut bridge = RegisterBridge::new();
        let handle = bridge.start().unwrap();
        let mut sig = idle_bus();

        sig.drive_request(VGPIO_ADDRESS, false, LogicVector::new(32, 0));
        bridge.tick(&mut sig);
        assert!(!handle.is_stop_requested());
        handle.stop();
        assert!(handle.is_stop_requested());
        assert!(matches!(
            bridge.tick(&mut sig),
            BridgeEvent::Acknowledged { .. }
        ));
        assert_eq!(bridge.tick(&mut sig), BridgeEvent::Released);
        assert!(!sig.ack());
        assert_eq!(bridge.tick(&mut sig), BridgeEvent::Stopped);
        assert!(!bridge.is_running());
        assert_eq!(bridge.tick(&mut sig), BridgeEvent::Stopped);
        assert!(bridge.start().is_err());
    }

    #[test]
    fn test_output_wait_masks_expected_value() {
        let mut bridge = running_bridge();
        let mut sig = idle_bus();
        let wait = bridge.output_wait(0x1_0002);
        assert_eq!(wait.expected(), 2);
        assert!(!wait.is_satisfied(bridge.output()));

        sig.drive_request(VGPIO_ADDRESS, true, LogicVector::new(32, 2));
        bridge.tick(&mut sig);
        assert!(wait.is_satisfied(bridge.output()));
    }

    #[test]
    fn test_every_output_value_round_trips() {
        let mut bridge = running_bridge();
        let mut sig = idle_bus();
        for value in [0u16, 1, 0x7FFF, 0x8000, 0xA5A5, 0xFFFF] {
            sig.drive_request(VGPIO_ADDRESS, true, LogicVector::new(32, value as u64));
            bridge.tick(&mut sig);
            bridge.tick(&mut sig);
            sig.release();
            bridge.tick(&mut sig);
            assert_eq!(bridge.output(), value);
        }
    }
}
