// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCHEMA_VERSION: &str = "1.0";

/// Fixed bus address of the register bridge word.
pub const DEFAULT_VGPIO_ADDRESS: u32 = 0x30FF_FFFC;

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_timeout_cycles() -> u64 {
    1_000_000
}

fn default_vgpio_address() -> u32 {
    DEFAULT_VGPIO_ADDRESS
}

fn default_reset_cycles() -> u32 {
    10
}

fn default_issue_gap_cycles() -> u32 {
    1
}

fn default_gpio_banks() -> Vec<GpioBankConfig> {
    vec![
        GpioBankConfig {
            id: "gpio0".to_string(),
            base_address: 0x3000_0000,
            pad_lsb: 8,
        },
        GpioBankConfig {
            id: "gpio1".to_string(),
            base_address: 0x3001_0000,
            pad_lsb: 16,
        },
    ]
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GpioBankConfig {
    pub id: String,
    pub base_address: u32,
    /// Lowest of the eight pads this bank drives.
    pub pad_lsb: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TestbenchConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Scenario to run when the command line does not name one.
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default = "default_timeout_cycles")]
    pub timeout_cycles: u64,
    #[serde(default = "default_vgpio_address")]
    pub vgpio_address: u32,
    #[serde(default = "default_reset_cycles")]
    pub reset_cycles: u32,
    /// Idle cycles the firmware master inserts between transfers.
    #[serde(default = "default_issue_gap_cycles")]
    pub issue_gap_cycles: u32,
    /// Fail the run if a single transfer waits this long for ack.
    #[serde(default)]
    pub bus_stall_limit: Option<u64>,
    #[serde(default = "default_gpio_banks")]
    pub gpio_banks: Vec<GpioBankConfig>,
}

impl Default for TestbenchConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            scenario: None,
            timeout_cycles: default_timeout_cycles(),
            vgpio_address: default_vgpio_address(),
            reset_cycles: default_reset_cycles(),
            issue_gap_cycles: default_issue_gap_cycles(),
            bus_stall_limit: None,
            gpio_banks: default_gpio_banks(),
        }
    }
}

impl TestbenchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read testbench config at {:?}", path.as_ref()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Testbench Config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        if self.timeout_cycles == 0 {
            anyhow::bail!("'timeout_cycles' must be greater than zero");
        }

        if self.vgpio_address & 0x3 != 0 {
            anyhow::bail!(
                "'vgpio_address' {:#010x} must be word aligned",
                self.vgpio_address
            );
        }

        if self.bus_stall_limit == Some(0) {
            anyhow::bail!("'bus_stall_limit' must be greater than zero when set");
        }

        for (i, bank) in self.gpio_banks.iter().enumerate() {
            if bank.id.trim().is_empty() {
                anyhow::bail!("GPIO bank #{} has an empty id", i);
            }
            if bank.pad_lsb > 30 {
                anyhow::bail!(
                    "GPIO bank '{}' pad_lsb {} leaves fewer than 8 pads",
                    bank.id,
                    bank.pad_lsb
                );
            }
            if bank.base_address & 0xFFFF != 0 {
                anyhow::bail!(
                    "GPIO bank '{}' base {:#010x} must be 64KB aligned",
                    bank.id,
                    bank.base_address
                );
            }
            if (bank.base_address..=bank.base_address | 0xFFFF).contains(&self.vgpio_address) {
                anyhow::bail!(
                    "GPIO bank '{}' overlaps the vgpio address {:#010x}",
                    bank.id,
                    self.vgpio_address
                );
            }
            for other in &self.gpio_banks[i + 1..] {
                if other.base_address == bank.base_address {
                    anyhow::bail!(
                        "GPIO banks '{}' and '{}' share base {:#010x}",
                        bank.id,
                        other.id,
                        bank.base_address
                    );
                }
                if other.pad_lsb.abs_diff(bank.pad_lsb) < 8 {
                    anyhow::bail!(
                        "GPIO banks '{}' and '{}' drive overlapping pads",
                        bank.id,
                        other.id
                    );
                }
            }
        }

        if self.reset_cycles == 0 {
            tracing::warn!("reset_cycles is 0; firmware starts on the first edge");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TestbenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vgpio_address, 0x30FF_FFFC);
        assert_eq!(config.timeout_cycles, 1_000_000);
        assert_eq!(config.gpio_banks.len(), 2);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TestbenchConfig::from_yaml("{}").unwrap();
        assert_eq!(config, TestbenchConfig::default());
    }

    #[test]
    fn test_invalid_version() {
        let err = TestbenchConfig::from_yaml("schema_version: \"2.0\"").unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = TestbenchConfig::from_yaml("timeout_cycles: 0").unwrap_err();
        assert!(err.to_string().contains("timeout_cycles"));
    }

    #[test]
    fn test_unaligned_address_rejected() {
        let err = TestbenchConfig::from_yaml("vgpio_address: 0x30FFFFFE").unwrap_err();
        assert!(err.to_string().contains("word aligned"));
    }

    #[test]
    fn test_overlapping_pads_rejected() {
        let yaml = r#"
gpio_banks:
  - id: a
    base_address: 0x30000000
    pad_lsb: 8
  - id: b
    base_address: 0x30010000
    pad_lsb: 12
"#;
        let err = TestbenchConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("overlapping pads"));
    }

    #[test]
    fn test_bank_covering_vgpio_rejected() {
        let yaml = r#"
gpio_banks:
  - id: a
    base_address: 0x30FF0000
    pad_lsb: 8
"#;
        let err = TestbenchConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("overlaps the vgpio address"));
    }
}
