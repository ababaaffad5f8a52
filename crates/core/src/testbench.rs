// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Cycle-based harness: one clock, the firmware master, the register bridge,
//! the GPIO banks and the pad ring.
//!
//! Each [`Testbench::step`] is one rising edge. Within an edge the master
//! reacts first (it sees the slave responses registered in the previous
//! cycle), then the slaves sample the settled request lines.

use crate::bridge::{BridgeEvent, BridgeStats, MonitorHandle, RegisterBridge};
use crate::bus::interconnect::UserBus;
use crate::bus::{BusSample, WishboneSignals, WishboneSlavePort};
use crate::firmware::{FirmwareProgram, WishboneMaster};
use crate::peripherals::pads::PadRing;
use crate::signals::{LogicLevel, LogicVector};
use crate::{SimResult, SimulationError};
use std::sync::Arc;
use vgpio_config::TestbenchConfig;

/// Bus and register state after one edge, for waveform dumps and tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleRecord {
    pub cycle: u64,
    pub cyc: LogicLevel,
    pub stb: LogicLevel,
    pub we: LogicLevel,
    pub adr: LogicVector,
    pub dat_w: LogicVector,
    pub ack: bool,
    pub dat_r: u32,
    pub output: u16,
    pub input: u16,
    pub event: BridgeEvent,
}

pub trait TestbenchObserver: std::fmt::Debug + Send + Sync {
    fn on_cycle(&self, _record: &CycleRecord) {}
    fn on_checkpoint(&self, _value: u16, _cycle: u64) {}
}

#[derive(Debug)]
pub struct Testbench {
    config: TestbenchConfig,
    signals: WishboneSignals,
    bridge: RegisterBridge,
    monitor: Option<MonitorHandle>,
    master: WishboneMaster,
    user_bus: UserBus,
    pads: PadRing,
    cycle: u64,
    /// Bridge output as it stood when the latest edge began.
    edge_output: u16,
    observers: Vec<Arc<dyn TestbenchObserver>>,
}

impl Testbench {
    pub fn new(config: &TestbenchConfig) -> SimResult<Self> {
        config
            .validate()
            .map_err(|e| SimulationError::Config(format!("{:#}", e)))?;
        let master = WishboneMaster::new(config.vgpio_address)
            .with_issue_gap(config.issue_gap_cycles)
            .with_stall_limit(config.bus_stall_limit);

        Ok(Self {
            config: config.clone(),
            signals: WishboneSignals::new(),
            bridge: RegisterBridge::with_address(config.vgpio_address),
            monitor: None,
            master,
            user_bus: UserBus::from_config(config),
            pads: PadRing::new(),
            cycle: 0,
            edge_output: 0,
            observers: Vec::new(),
        })
    }

    pub fn config(&self) -> &TestbenchConfig {
        &self.config
    }

    pub fn add_observer(&mut self, observer: Arc<dyn TestbenchObserver>) {
        self.observers.push(observer);
    }

    pub fn load_firmware(&mut self, program: &FirmwareProgram) {
        self.master.load(program);
    }

    /// Starts the bridge's bus monitor.
    pub fn start_bridge(&mut self) -> SimResult<MonitorHandle> {
        let handle = self.bridge.start()?;
        self.monitor = Some(handle.clone());
        Ok(handle)
    }

    pub fn stop_bridge(&self) {
        if let Some(handle) = &self.monitor {
            handle.stop();
        }
    }

    /// Holds the master in reset for the configured number of cycles, then
    /// lets the firmware run.
    pub fn release_reset(&mut self) -> SimResult<()> {
        for _ in 0..self.config.reset_cycles {
            self.step()?;
        }
        tracing::info!("Reset released at cycle {}", self.cycle);
        self.master.release_reset();
        Ok(())
    }

    /// Advances the simulation by one rising clock edge.
    pub fn step(&mut self) -> SimResult<BridgeEvent> {
        if self.cycle >= self.config.timeout_cycles {
            return Err(SimulationError::Timeout { cycles: self.cycle });
        }
        self.cycle += 1;

        let ack_in = self.signals.ack() || self.user_bus.ack();
        let dat_in = self.signals.dat_r() | self.user_bus.dat_r();
        self.master
            .on_rising_edge(self.cycle, &mut self.signals, ack_in, dat_in)?;

        let sample = BusSample::take(&self.signals);
        self.user_bus.tick(&sample);
        self.edge_output = self.bridge.output();
        let event = self.bridge.tick(&mut self.signals);
        self.user_bus.update_pads(&mut self.pads);

        tracing::debug!(
            "edge {}: {:?} ack={} dat_r={:#010x} output={:#06x}",
            self.cycle,
            event,
            self.signals.ack() || self.user_bus.ack(),
            self.signals.dat_r() | self.user_bus.dat_r(),
            self.bridge.output()
        );

        if !self.observers.is_empty() {
            let record = self.record(event);
            for observer in &self.observers {
                observer.on_cycle(&record);
            }
        }
        Ok(event)
    }

    pub fn clock_cycles(&mut self, n: u64) -> SimResult<()> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// Blocks until the bridge output register equals `expected & 0xFFFF`.
    /// Returns the number of edges waited; 0 if it already matched.
    ///
    /// A write decoded on edge N resolves the wait on edge N+1, the edge that
    /// asserts ack.
    pub fn wait_output(&mut self, expected: u32) -> SimResult<u64> {
        let wait = self.bridge.output_wait(expected);
        let start = self.cycle;
        while !wait.is_satisfied(self.edge_output) {
            self.step()?;
        }
        tracing::info!(
            "Checkpoint {} reached at cycle {}",
            wait.expected(),
            self.cycle
        );
        for observer in &self.observers {
            observer.on_checkpoint(wait.expected(), self.cycle);
        }
        Ok(self.cycle - start)
    }

    /// Runs until the firmware master has executed its whole program.
    pub fn run_firmware_to_end(&mut self) -> SimResult<u64> {
        let start = self.cycle;
        while !self.master.is_done() {
            self.step()?;
        }
        Ok(self.cycle - start)
    }

    pub fn set_input(&mut self, value: u32) {
        self.bridge.set_input(value);
    }

    pub fn output(&self) -> u16 {
        self.bridge.output()
    }

    pub fn drive_gpio_in(&mut self, pads: (u8, u8), value: u64) {
        tracing::info!("Driving pads [{}:{}] with {:#x}", pads.0, pads.1, value);
        self.pads.drive_gpio_in(pads, value);
    }

    pub fn release_gpio_in(&mut self, pads: (u8, u8)) {
        self.pads.release_gpio_in(pads);
    }

    pub fn monitor_gpio(&self, pads: (u8, u8)) -> LogicVector {
        self.pads.monitor_gpio(pads)
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn bridge(&self) -> &RegisterBridge {
        &self.bridge
    }

    pub fn master(&self) -> &WishboneMaster {
        &self.master
    }

    pub fn user_bus(&self) -> &UserBus {
        &self.user_bus
    }

    pub fn signals(&self) -> &WishboneSignals {
        &self.signals
    }

    pub fn bridge_stats(&self) -> BridgeStats {
        self.bridge.stats()
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "cycle": self.cycle,
            "bridge": {
                "address": self.bridge.address(),
                "output": self.bridge.output(),
                "input": self.bridge.input(),
                "running": self.bridge.is_running(),
                "stop_requested": self
                    .monitor
                    .as_ref()
                    .is_some_and(|h| h.is_stop_requested()),
                "stats": self.bridge.stats(),
            },
            "firmware_done": self.master.is_done(),
            "transfers": self.master.transfers().len(),
            "peripherals": self
                .user_bus
                .peripherals
                .iter()
                .map(|p| (p.name.clone(), p.dev.snapshot()))
                .collect::<serde_json::Map<_, _>>(),
        })
    }

    fn record(&self, event: BridgeEvent) -> CycleRecord {
        CycleRecord {
            cycle: self.cycle,
            cyc: self.signals.cyc(),
            stb: self.signals.stb(),
            we: self.signals.we(),
            adr: self.signals.adr(),
            dat_w: self.signals.dat_w(),
            ack: self.signals.ack(),
            dat_r: self.signals.dat_r(),
            output: self.bridge.output(),
            input: self.bridge.input(),
            event,
        }
    }
}
