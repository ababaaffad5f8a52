// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Built-in checkpoint scenarios.
//!
//! Each scenario pairs a firmware program with a testbench script. Firmware
//! reports progress by writing checkpoint numbers to the register bridge; the
//! script waits for each checkpoint, stimulates pads and checks pad outputs.

use crate::bridge::BridgeStats;
use crate::firmware::FirmwareProgram;
use crate::peripherals::gpio::{GPIO0_BASE, GPIO1_BASE, GPIO_DATAI, GPIO_DATAO, GPIO_DIR};
use crate::{SimulationError, Testbench};

/// Cycles the firmware spends between checkpoints (pad setup, loop
/// overhead). Keeps pad checks stable for a few cycles after a checkpoint.
const STEP_CYCLES: u32 = 16;
const BOOT_CYCLES: u32 = 64;
/// Cycles the script lets pads settle before sampling them.
const SETTLE_CYCLES: u64 = 4;

const GPIO0_PADS: (u8, u8) = (15, 8);
const GPIO1_PADS: (u8, u8) = (23, 16);

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("after checkpoint {checkpoint}: {message}")]
    Assertion { checkpoint: u16, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CheckpointHit {
    pub value: u16,
    pub cycle: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub cycles: u64,
    pub checkpoints: Vec<CheckpointHit>,
    pub transfers: usize,
    pub bridge: BridgeStats,
}

/// Script-side view of a running testbench.
pub struct ScenarioContext<'a> {
    tb: &'a mut Testbench,
    checkpoints: Vec<CheckpointHit>,
}

impl<'a> ScenarioContext<'a> {
    pub fn new(tb: &'a mut Testbench) -> Self {
        Self {
            tb,
            checkpoints: Vec::new(),
        }
    }

    pub fn testbench(&mut self) -> &mut Testbench {
        &mut *self.tb
    }

    fn last_checkpoint(&self) -> u16 {
        self.checkpoints.last().map(|c| c.value).unwrap_or(0)
    }

    pub fn checkpoint(&mut self, value: u16, what: &str) -> Result<(), ScenarioError> {
        self.tb.wait_output(value as u32)?;
        tracing::info!("[TEST] {}", what);
        self.checkpoints.push(CheckpointHit {
            value,
            cycle: self.tb.cycle(),
        });
        Ok(())
    }

    pub fn settle(&mut self) -> Result<(), ScenarioError> {
        self.tb.clock_cycles(SETTLE_CYCLES)?;
        Ok(())
    }

    pub fn expect_pads(&mut self, pads: (u8, u8), expected: u64) -> Result<(), ScenarioError> {
        let observed = self.tb.monitor_gpio(pads);
        tracing::info!("[TEST] Observed pads [{}:{}]: {}", pads.0, pads.1, observed);
        if observed.to_u64() != Some(expected) {
            return Err(ScenarioError::Assertion {
                checkpoint: self.last_checkpoint(),
                message: format!(
                    "pads [{}:{}] expected {:#04x}, observed {}",
                    pads.0, pads.1, expected, observed
                ),
            });
        }
        Ok(())
    }

    /// Checks the data of the most recent firmware read from `addr`.
    pub fn expect_firmware_read(&mut self, addr: u32, expected: u32) -> Result<(), ScenarioError> {
        let observed = self
            .tb
            .master()
            .transfers()
            .iter()
            .rev()
            .find(|t| !t.write && t.addr == addr)
            .map(|t| t.data);
        if observed != Some(expected) {
            return Err(ScenarioError::Assertion {
                checkpoint: self.last_checkpoint(),
                message: format!(
                    "firmware read of {:#010x} expected {:#x}, got {:?}",
                    addr, expected, observed
                ),
            });
        }
        Ok(())
    }
}

pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn firmware(&self) -> FirmwareProgram;
    fn drive(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError>;
}

pub fn all() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(Gpio0Scenario),
        Box::new(Gpio1Scenario),
        Box::new(SystemIntegrationScenario),
    ]
}

pub fn by_name(name: &str) -> Option<Box<dyn Scenario>> {
    all().into_iter().find(|s| s.name() == name)
}

/// Loads the scenario firmware, starts the bridge, releases reset and runs
/// the script to completion.
pub fn run(scenario: &dyn Scenario, tb: &mut Testbench) -> Result<ScenarioReport, ScenarioError> {
    tracing::info!("[TEST] start {}", scenario.name());
    tb.load_firmware(&scenario.firmware());
    tb.start_bridge()?;
    tb.release_reset()?;

    let mut ctx = ScenarioContext::new(tb);
    let outcome = scenario.drive(&mut ctx);
    let checkpoints = ctx.checkpoints;

    // Stop the monitor on every exit path, including failures.
    tb.stop_bridge();
    outcome?;
    tracing::info!("[TEST] {} completed successfully", scenario.name());
    Ok(ScenarioReport {
        name: scenario.name().to_string(),
        cycles: tb.cycle(),
        checkpoints,
        transfers: tb.master().transfers().len(),
        bridge: tb.bridge_stats(),
    })
}

fn boot(name: &str) -> FirmwareProgram {
    FirmwareProgram::new(name).delay(BOOT_CYCLES)
}

/// Single-bank direction and data walk on GPIO0.
pub struct Gpio0Scenario;

impl Scenario for Gpio0Scenario {
    fn name(&self) -> &'static str {
        "gpio0"
    }

    fn description(&self) -> &'static str {
        "GPIO0 input capture and output patterns on pads 15:8"
    }

    fn firmware(&self) -> FirmwareProgram {
        boot("gpio0")
            .checkpoint(1)
            .delay(STEP_CYCLES)
            .write_word(GPIO0_BASE + GPIO_DIR, 0x00)
            .checkpoint(2)
            .delay(STEP_CYCLES)
            .read_word(GPIO0_BASE + GPIO_DATAI)
            .checkpoint(3)
            .delay(STEP_CYCLES)
            .write_word(GPIO0_BASE + GPIO_DIR, 0xFF)
            .checkpoint(4)
            .delay(STEP_CYCLES)
            .write_word(GPIO0_BASE + GPIO_DATAO, 0xAA)
            .checkpoint(5)
            .delay(STEP_CYCLES)
            .write_word(GPIO0_BASE + GPIO_DATAO, 0x55)
            .checkpoint(6)
            .delay(STEP_CYCLES)
            .write_word(GPIO0_BASE + GPIO_DATAO, 0x00)
            .checkpoint(7)
    }

    fn drive(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError> {
        ctx.checkpoint(1, "Firmware ready - GPIO pads configured")?;
        ctx.checkpoint(2, "GPIO0 direction set to input (0x00)")?;

        ctx.testbench().drive_gpio_in(GPIO0_PADS, 0x3C);
        ctx.checkpoint(3, "Firmware read GPIO0 input data")?;
        ctx.expect_firmware_read(GPIO0_BASE + GPIO_DATAI, 0x3C)?;

        ctx.checkpoint(4, "GPIO0 direction set to output (0xFF)")?;
        ctx.checkpoint(5, "GPIO0 output set to 0xAA")?;
        ctx.settle()?;
        ctx.expect_pads(GPIO0_PADS, 0xAA)?;

        ctx.checkpoint(6, "GPIO0 output set to 0x55")?;
        ctx.settle()?;
        ctx.expect_pads(GPIO0_PADS, 0x55)?;

        ctx.checkpoint(7, "GPIO0 output set to 0x00")?;
        ctx.settle()?;
        ctx.expect_pads(GPIO0_PADS, 0x00)
    }
}

/// Single-bank direction and data walk on GPIO1.
pub struct Gpio1Scenario;

impl Scenario for Gpio1Scenario {
    fn name(&self) -> &'static str {
        "gpio1"
    }

    fn description(&self) -> &'static str {
        "GPIO1 input capture and output patterns on pads 23:16"
    }

    fn firmware(&self) -> FirmwareProgram {
        boot("gpio1")
            .checkpoint(1)
            .delay(STEP_CYCLES)
            .write_word(GPIO1_BASE + GPIO_DIR, 0x00)
            .checkpoint(2)
            .delay(STEP_CYCLES)
            .read_word(GPIO1_BASE + GPIO_DATAI)
            .checkpoint(3)
            .delay(STEP_CYCLES)
            .write_word(GPIO1_BASE + GPIO_DIR, 0xFF)
            .checkpoint(4)
            .delay(STEP_CYCLES)
            .write_word(GPIO1_BASE + GPIO_DATAO, 0xCC)
            .checkpoint(5)
            .delay(STEP_CYCLES)
            .write_word(GPIO1_BASE + GPIO_DATAO, 0x33)
            .checkpoint(6)
            .delay(STEP_CYCLES)
            .write_word(GPIO1_BASE + GPIO_DATAO, 0x00)
            .checkpoint(7)
    }

    fn drive(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError> {
        ctx.checkpoint(1, "Firmware ready - GPIO pads configured")?;
        ctx.checkpoint(2, "GPIO1 direction set to input (0x00)")?;

        ctx.testbench().drive_gpio_in(GPIO1_PADS, 0x5A);
        ctx.checkpoint(3, "Firmware read GPIO1 input data")?;
        ctx.expect_firmware_read(GPIO1_BASE + GPIO_DATAI, 0x5A)?;

        ctx.checkpoint(4, "GPIO1 direction set to output (0xFF)")?;
        ctx.checkpoint(5, "GPIO1 output set to 0xCC")?;
        ctx.settle()?;
        ctx.expect_pads(GPIO1_PADS, 0xCC)?;

        ctx.checkpoint(6, "GPIO1 output set to 0x33")?;
        ctx.settle()?;
        ctx.expect_pads(GPIO1_PADS, 0x33)?;

        ctx.checkpoint(7, "GPIO1 output set to 0x00")?;
        ctx.settle()?;
        ctx.expect_pads(GPIO1_PADS, 0x00)
    }
}

/// Both banks together, mixed directions, and an input-register round trip
/// through the bridge.
pub struct SystemIntegrationScenario;

impl Scenario for SystemIntegrationScenario {
    fn name(&self) -> &'static str {
        "system_integration"
    }

    fn description(&self) -> &'static str {
        "GPIO0 and GPIO1 together, mixed directions, bridge input echo"
    }

    fn firmware(&self) -> FirmwareProgram {
        boot("system_integration")
            .checkpoint(1)
            .delay(STEP_CYCLES)
            .write_word(GPIO0_BASE + GPIO_DIR, 0xFF)
            .write_word(GPIO1_BASE + GPIO_DIR, 0xFF)
            .checkpoint(2)
            .delay(STEP_CYCLES)
            .write_word(GPIO0_BASE + GPIO_DATAO, 0x12)
            .write_word(GPIO1_BASE + GPIO_DATAO, 0x34)
            .checkpoint(3)
            .delay(STEP_CYCLES)
            .write_word(GPIO0_BASE + GPIO_DIR, 0x00)
            .write_word(GPIO1_BASE + GPIO_DIR, 0x00)
            .checkpoint(4)
            .delay(STEP_CYCLES)
            .read_word(GPIO0_BASE + GPIO_DATAI)
            .read_word(GPIO1_BASE + GPIO_DATAI)
            .checkpoint(5)
            .delay(STEP_CYCLES)
            .write_word(GPIO0_BASE + GPIO_DIR, 0x0F)
            .write_word(GPIO1_BASE + GPIO_DIR, 0xF0)
            .checkpoint(6)
            .delay(STEP_CYCLES)
            .write_word(GPIO0_BASE + GPIO_DATAO, 0xAA)
            .write_word(GPIO1_BASE + GPIO_DATAO, 0x55)
            .checkpoint(7)
            .delay(STEP_CYCLES)
            .read_word(GPIO0_BASE + GPIO_DATAI)
            .read_word(GPIO1_BASE + GPIO_DATAI)
            .checkpoint(8)
            .wait_input(0x00A5)
            .copy_input_to(GPIO0_BASE + GPIO_DATAO)
            .checkpoint(9)
    }

    fn drive(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), ScenarioError> {
        ctx.checkpoint(1, "Firmware ready - all GPIO pads configured")?;
        ctx.checkpoint(2, "Both GPIO0 and GPIO1 set to output mode")?;
        ctx.checkpoint(3, "GPIO0 output=0x12, GPIO1 output=0x34")?;
        ctx.settle()?;
        ctx.expect_pads(GPIO0_PADS, 0x12)?;
        ctx.expect_pads(GPIO1_PADS, 0x34)?;

        ctx.checkpoint(4, "Both GPIO0 and GPIO1 set to input mode")?;
        ctx.testbench().drive_gpio_in(GPIO0_PADS, 0xAB);
        ctx.testbench().drive_gpio_in(GPIO1_PADS, 0xCD);

        ctx.checkpoint(5, "Firmware read both GPIO inputs")?;
        ctx.expect_firmware_read(GPIO0_BASE + GPIO_DATAI, 0xAB)?;
        ctx.expect_firmware_read(GPIO1_BASE + GPIO_DATAI, 0xCD)?;

        ctx.checkpoint(6, "GPIO0 DIR=0x0F, GPIO1 DIR=0xF0")?;
        ctx.checkpoint(7, "GPIO0 output=0xAA (lower nibble), GPIO1 output=0x55 (upper nibble)")?;
        ctx.settle()?;
        // Output nibbles come from DATAO, the others from the testbench drive.
        ctx.expect_pads(GPIO0_PADS, 0xAA)?;
        ctx.expect_pads(GPIO1_PADS, 0x5D)?;

        ctx.checkpoint(8, "Firmware read mixed input/output configuration")?;
        ctx.expect_firmware_read(GPIO0_BASE + GPIO_DATAI, 0xAA)?;
        ctx.expect_firmware_read(GPIO1_BASE + GPIO_DATAI, 0x5D)?;

        ctx.testbench().set_input(0x00A5);
        ctx.checkpoint(9, "Firmware echoed bridge input to GPIO0")?;
        ctx.settle()?;
        ctx.expect_pads((11, 8), 0x5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_are_unique() {
        let names: Vec<_> = all().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["gpio0", "gpio1", "system_integration"]);
        assert!(by_name("gpio1").is_some());
        assert!(by_name("gpio2").is_none());
    }

    #[test]
    fn test_firmware_checkpoints_are_sequential() {
        for scenario in all() {
            let checkpoints: Vec<u16> = scenario
                .firmware()
                .ops
                .iter()
                .filter_map(|op| match op {
                    crate::firmware::FirmwareOp::Checkpoint(v) => Some(*v),
                    _ => None,
                })
                .collect();
            let expected: Vec<u16> = (1..=checkpoints.len() as u16).collect();
            assert_eq!(checkpoints, expected, "{}", scenario.name());
        }
    }
}
