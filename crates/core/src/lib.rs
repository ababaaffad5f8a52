// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bridge;
pub mod bus;
pub mod firmware;
pub mod peripherals;
pub mod scenarios;
pub mod signals;
pub mod testbench;


pub use bridge::{BridgeEvent, MonitorHandle, OutputWait, RegisterBridge, VGPIO_ADDRESS};
pub use testbench::{CycleRecord, Testbench, TestbenchObserver};

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Wishbone monitor already started")]
    MonitorAlreadyStarted,
    #[error("Simulation timed out after {cycles} cycles")]
    Timeout { cycles: u64 },
    #[error("Bus transfer to {addr:#010x} not acknowledged after {cycles} cycles")]
    BusStall { addr: u32, cycles: u64 },
    #[error("Invalid testbench configuration: {0}")]
    Config(String),
}

pub type SimResult<T> = Result<T, SimulationError>;
