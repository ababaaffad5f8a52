// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Scripted bus master standing in for the CPU running checkpoint firmware.
//!
//! The master issues Wishbone classic single transfers: it drives cyc/stb and
//! holds the request until ack, samples read data on the ack cycle, then idles
//! for a configurable gap before the next transfer.

use crate::bus::WishboneSignals;
use crate::signals::LogicVector;
use crate::{SimResult, SimulationError, VGPIO_ADDRESS};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareOp {
    /// Burn cycles without touching the bus (pad setup, boot code).
    Delay(u32),
    WriteWord { addr: u32, value: u32 },
    ReadWord { addr: u32 },
    /// Write with an arbitrary four-state data pattern.
    WriteRaw { addr: u32, data: LogicVector },
    /// Read-modify-write of the bridge word, replacing the low half.
    Checkpoint(u16),
    /// Poll the bridge until the input half equals the value.
    WaitInput(u16),
    /// Read the bridge input half and store it to `addr`.
    CopyInputTo { addr: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareProgram {
    pub name: String,
    pub ops: Vec<FirmwareOp>,
}

impl FirmwareProgram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ops: Vec::new(),
        }
    }

    pub fn delay(mut self, cycles: u32) -> Self {
        self.ops.push(FirmwareOp::Delay(cycles));
        self
    }

    pub fn write_word(mut self, addr: u32, value: u32) -> Self {
        self.ops.push(FirmwareOp::WriteWord { addr, value });
        self
    }

    pub fn read_word(mut self, addr: u32) -> Self {
        self.ops.push(FirmwareOp::ReadWord { addr });
        self
    }

    pub fn write_raw(mut self, addr: u32, data: LogicVector) -> Self {
        self.ops.push(FirmwareOp::WriteRaw { addr, data });
        self
    }

    pub fn checkpoint(mut self, value: u16) -> Self {
        self.ops.push(FirmwareOp::Checkpoint(value));
        self
    }

    pub fn wait_input(mut self, value: u16) -> Self {
        self.ops.push(FirmwareOp::WaitInput(value));
        self
    }

    pub fn copy_input_to(mut self, addr: u32) -> Self {
        self.ops.push(FirmwareOp::CopyInputTo { addr });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteData {
    Word(LogicVector),
    MergeLow16(u16),
    UpperOfLastRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MicroOp {
    Delay(u32),
    Read { addr: u32, poll_input: Option<u16> },
    Write { addr: u32, data: WriteData },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    op: MicroOp,
    issued_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Held,
    Waiting(u32),
    Busy(InFlight),
    Done,
}

/// A completed bus transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Transfer {
    pub addr: u32,
    pub write: bool,
    /// Data returned on a read, or the resolved part of the write data.
    pub data: u32,
    pub issued_at: u64,
    pub acked_at: u64,
}

#[derive(Debug)]
pub struct WishboneMaster {
    program: VecDeque<FirmwareOp>,
    micro: VecDeque<MicroOp>,
    state: State,
    vgpio_address: u32,
    issue_gap: u32,
    stall_limit: Option<u64>,
    last_read: u32,
    transfers: Vec<Transfer>,
}

impl WishboneMaster {
    pub fn new(vgpio_address: u32) -> Self {
        Self {
            program: VecDeque::new(),
            micro: VecDeque::new(),
            state: State::Held,
            vgpio_address,
            issue_gap: 1,
            stall_limit: None,
            last_read: 0,
            transfers: Vec::new(),
        }
    }

    pub fn with_issue_gap(mut self, cycles: u32) -> Self {
        self.issue_gap = cycles;
        self
    }

    pub fn with_stall_limit(mut self, cycles: Option<u64>) -> Self {
        self.stall_limit = cycles;
        self
    }

    pub fn load(&mut self, program: &FirmwareProgram) {
        tracing::info!(
            "Loading firmware '{}' ({} ops)",
            program.name,
            program.ops.len()
        );
        self.program = program.ops.iter().cloned().collect();
        self.micro.clear();
        self.state = State::Held;
        self.transfers.clear();
        self.last_read = 0;
    }

    /// Lets the master fetch its first operation on the next edge.
    pub fn release_reset(&mut self) {
        if self.state == State::Held {
            self.state = State::Waiting(0);
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Advances the master by one rising edge. `ack` and `dat_r` are the
    /// combined slave responses registered in the previous cycle.
    pub fn on_rising_edge(
        &mut self,
        cycle: u64,
        lines: &mut WishboneSignals,
        ack: bool,
        dat_r: u32,
    ) -> SimResult<()> {
        match self.state {
            State::Held => {
                lines.reset_master();
                return Ok(());
            }
            State::Done => return Ok(()),
            State::Busy(inflight) => {
                if !ack {
                    let waited = cycle - inflight.issued_at;
                    if let Some(limit) = self.stall_limit {
                        if waited >= limit {
                            let addr = match inflight.op {
                                MicroOp::Read { addr, .. } | MicroOp::Write { addr, .. } => addr,
                                MicroOp::Delay(_) => 0,
                            };
                            return Err(SimulationError::BusStall {
                                addr,
                                cycles: waited,
                            });
                        }
                    }
                    return Ok(());
                }
                self.complete(cycle, inflight, lines, dat_r);
                self.state = State::Waiting(self.issue_gap);
            }
            State::Waiting(_) => {}
        }
        self.advance(cycle, lines);
        Ok(())
    }

    fn complete(&mut self, cycle: u64, inflight: InFlight, lines: &mut WishboneSignals, dat_r: u32) {
        lines.release();
        let (addr, write, data) = match inflight.op {
            MicroOp::Read { addr, poll_input } => {
                self.last_read = dat_r;
                if let Some(expected) = poll_input {
                    if (dat_r >> 16) as u16 != expected {
                        self.micro.push_front(inflight.op);
                    }
                }
                (addr, false, dat_r)
            }
            MicroOp::Write { addr, data } => {
                let value = self.resolve(data).known_bits() as u32;
                (addr, true, value)
            }
            MicroOp::Delay(_) => return,
        };
        tracing::debug!(
            "Master: {} {:#010x} = {:#010x} ({} cycles)",
            if write { "write" } else { "read" },
            addr,
            data,
            cycle - inflight.issued_at
        );
        self.transfers.push(Transfer {
            addr,
            write,
            data,
            issued_at: inflight.issued_at,
            acked_at: cycle,
        });
    }

    fn advance(&mut self, cycle: u64, lines: &mut WishboneSignals) {
        loop {
            if let State::Waiting(n) = self.state {
                if n > 0 {
                    self.state = State::Waiting(n - 1);
                    return;
                }
            }
            let Some(op) = self.next_micro() else {
                tracing::info!("Firmware finished at cycle {}", cycle);
                self.state = State::Done;
                return;
            };
            match op {
                MicroOp::Delay(n) => self.state = State::Waiting(n),
                MicroOp::Read { addr, .. } => {
                    lines.drive_request(addr, false, LogicVector::new(32, 0));
                    self.state = State::Busy(InFlight {
                        op,
                        issued_at: cycle,
                    });
                    return;
                }
                MicroOp::Write { addr, data } => {
                    lines.drive_request(addr, true, self.resolve(data));
                    self.state = State::Busy(InFlight {
                        op,
                        issued_at: cycle,
                    });
                    return;
                }
            }
        }
    }

    fn resolve(&self, data: WriteData) -> LogicVector {
        match data {
            WriteData::Word(v) => v,
            WriteData::MergeLow16(v) => {
                LogicVector::new(32, ((self.last_read & 0xFFFF_0000) | v as u32) as u64)
            }
            WriteData::UpperOfLastRead => LogicVector::new(32, (self.last_read >> 16) as u64),
        }
    }

    fn next_micro(&mut self) -> Option<MicroOp> {
        if let Some(op) = self.micro.pop_front() {
            return Some(op);
        }
        let bridge = self.vgpio_address;
        match self.program.pop_front()? {
            FirmwareOp::Delay(n) => self.micro.push_back(MicroOp::Delay(n)),
            FirmwareOp::WriteWord { addr, value } => self.micro.push_back(MicroOp::Write {
                addr,
                data: WriteData::Word(LogicVector::new(32, value as u64)),
            }),
            FirmwareOp::ReadWord { addr } => self.micro.push_back(MicroOp::Read {
                addr,
                poll_input: None,
            }),
            FirmwareOp::WriteRaw { addr, data } => self.micro.push_back(MicroOp::Write {
                addr,
                data: WriteData::Word(data),
            }),
            FirmwareOp::Checkpoint(value) => {
                self.micro.push_back(MicroOp::Read {
                    addr: bridge,
                    poll_input: None,
                });
                self.micro.push_back(MicroOp::Write {
                    addr: bridge,
                    data: WriteData::MergeLow16(value),
                });
            }
            FirmwareOp::WaitInput(expected) => self.micro.push_back(MicroOp::Read {
                addr: bridge,
                poll_input: Some(expected),
            }),
            FirmwareOp::CopyInputTo { addr } => {
                self.micro.push_back(MicroOp::Read {
                    addr: bridge,
                    poll_input: None,
                });
                self.micro.push_back(MicroOp::Write {
                    addr,
                    data: WriteData::UpperOfLastRead,
                });
            }
        }
        self.micro.pop_front()
    }
}

impl Default for WishboneMaster {
    fn default() -> Self {
        Self::new(VGPIO_ADDRESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::WishboneSlavePort;
    use crate::signals::LogicLevel;

    fn run_until_request(
        master: &mut WishboneMaster,
        lines: &mut WishboneSignals,
        cycle: &mut u64,
    ) {
        for _ in 0..16 {
            *cycle += 1;
            master.on_rising_edge(*cycle, lines, false, 0).unwrap();
            if lines.cyc() == LogicLevel::High {
                return;
            }
        }
        panic!("master never issued a request");
    }

    #[test]
    fn test_master_holds_request_until_ack() {
        let mut master = WishboneMaster::new(VGPIO_ADDRESS);
        master.load(&FirmwareProgram::new("t").write_word(0x3000_0004, 0xAA));
        let mut lines = WishboneSignals::new();
        let mut cycle = 0;

        master.on_rising_edge(cycle, &mut lines, false, 0).unwrap();
        assert_eq!(lines.cyc(), LogicLevel::Low);

        master.release_reset();
        run_until_request(&mut master, &mut lines, &mut cycle);
        assert_eq!(lines.adr().to_u32(), Some(0x3000_0004));
        assert_eq!(lines.we(), LogicLevel::High);

        for _ in 0..3 {
            cycle += 1;
            master.on_rising_edge(cycle, &mut lines, false, 0).unwrap();
            assert_eq!(lines.cyc(), LogicLevel::High);
        }

        cycle += 1;
        master.on_rising_edge(cycle, &mut lines, true, 0).unwrap();
        assert_eq!(lines.cyc(), LogicLevel::Low);
        assert!(!master.is_done());

        cycle += 1;
        master.on_rising_edge(cycle, &mut lines, false, 0).unwrap();
        assert!(master.is_done());
        assert_eq!(master.transfers().len(), 1);
        assert_eq!(master.transfers()[0].data, 0xAA);
    }

    #[test]
    fn test_checkpoint_is_read_modify_write() {
        let mut master = WishboneMaster::new(VGPIO_ADDRESS).with_issue_gap(0);
        master.load(&FirmwareProgram::new("t").checkpoint(3));
        master.release_reset();
        let mut lines = WishboneSignals::new();
        let mut cycle = 0;

        run_until_request(&mut master, &mut lines, &mut cycle);
        assert_eq!(lines.we(), LogicLevel::Low);
        assert_eq!(lines.adr().to_u32(), Some(VGPIO_ADDRESS));

        cycle += 1;
        master
            .on_rising_edge(cycle, &mut lines, true, 0x1234_0002)
            .unwrap();
        assert_eq!(lines.we(), LogicLevel::High);
        assert_eq!(lines.dat_w().to_u32(), Some(0x1234_0003));
    }

    #[test]
    fn test_wait_input_polls_until_match() {
        let mut master = WishboneMaster::new(VGPIO_ADDRESS).with_issue_gap(0);
        master.load(&FirmwareProgram::new("t").wait_input(0x5A));
        master.release_reset();
        let mut lines = WishboneSignals::new();
        let mut cycle = 0;

        run_until_request(&mut master, &mut lines, &mut cycle);
        cycle += 1;
        master.on_rising_edge(cycle, &mut lines, true, 0).unwrap();
        assert!(!master.is_done());
        assert_eq!(lines.cyc(), LogicLevel::High);

        cycle += 1;
        master
            .on_rising_edge(cycle, &mut lines, true, 0x005A_0000)
            .unwrap();
        assert!(master.is_done());
        assert_eq!(master.transfers().len(), 2);
    }

    #[test]
    fn test_stall_limit_reports_bus_stall() {
        let mut master = WishboneMaster::new(VGPIO_ADDRESS).with_stall_limit(Some(4));
        master.load(&FirmwareProgram::new("t").read_word(0x3000_0000));
        master.release_reset();
        let mut lines = WishboneSignals::new();
        let mut cycle = 0;
        run_until_request(&mut master, &mut lines, &mut cycle);

        let mut result = Ok(());
        for _ in 0..4 {
            cycle += 1;
            result = master.on_rising_edge(cycle, &mut lines, false, 0);
        }
        assert!(matches!(
            result,
            Err(SimulationError::BusStall {
                addr: 0x3000_0000,
                cycles: 4
            })
        ));
    }

    #[test]
    fn test_raw_write_logs_known_bits() {
        let data: LogicVector = "xxxxxxxx_xxxxxxxx_00000000_00000101".parse().unwrap();
        let mut master = WishboneMaster::new(VGPIO_ADDRESS);
        master.load(&FirmwareProgram::new("t").write_raw(VGPIO_ADDRESS, data));
        master.release_reset();
        let mut lines = WishboneSignals::new();
        let mut cycle = 0;
        run_until_request(&mut master, &mut lines, &mut cycle);

        cycle += 1;
        master.on_rising_edge(cycle, &mut lines, true, 0).unwrap();
        assert_eq!(master.transfers().len(), 1);
        assert!(master.transfers()[0].write);
        assert_eq!(master.transfers()[0].data, 0x0005);
    }

    #[test]
    fn test_delay_consumes_cycles() {
        let mut master = WishboneMaster::new(VGPIO_ADDRESS).with_issue_gap(0);
        master.load(&FirmwareProgram::new("t").delay(5).read_word(0x10));
        master.release_reset();
        let mut lines = WishboneSignals::new();

        for cycle in 1..=5 {
            master.on_rising_edge(cycle, &mut lines, false, 0).unwrap();
            assert_ne!(lines.cyc(), LogicLevel::High);
        }
        master.on_rising_edge(6, &mut lines, false, 0).unwrap();
        assert_eq!(lines.cyc(), LogicLevel::High);
    }
}
