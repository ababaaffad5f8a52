// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::time::{SystemTime, UNIX_EPOCH};
use vgpio_config::TestbenchConfig;

fn write_temp_file(prefix: &str, contents: &str) -> std::path::PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("vgpio-config-tests");
    let _ = std::fs::create_dir_all(&dir);

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = dir.join(format!("{}-{}.yaml", prefix, nonce));
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

#[test]
fn test_full_config_parses() {
    let yaml = r#"
schema_version: "1.0"
scenario: gpio1
timeout_cycles: 50000
vgpio_address: 0x30FFFFFC
reset_cycles: 4
issue_gap_cycles: 0
bus_stall_limit: 200
gpio_banks:
  - id: "gpio1"
    base_address: 0x30010000
    pad_lsb: 16
"#;
    let path = write_temp_file("full", yaml);
    let config = TestbenchConfig::from_file(&path).unwrap();
    assert_eq!(config.scenario.as_deref(), Some("gpio1"));
    assert_eq!(config.timeout_cycles, 50_000);
    assert_eq!(config.reset_cycles, 4);
    assert_eq!(config.issue_gap_cycles, 0);
    assert_eq!(config.bus_stall_limit, Some(200));
    assert_eq!(config.gpio_banks.len(), 1);
    assert_eq!(config.gpio_banks[0].pad_lsb, 16);
}

#[test]
fn test_unknown_fields_rejected() {
    let err = TestbenchConfig::from_yaml("max_steps: 10").unwrap_err();
    assert!(format!("{:#}", err).contains("max_steps"));
}

#[test]
fn test_missing_file_reports_path() {
    let err = TestbenchConfig::from_file("/nonexistent/tb.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read testbench config"));
}
