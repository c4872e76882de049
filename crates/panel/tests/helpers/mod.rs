#![allow(dead_code)]

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use serde_json::Value;

/// One section with a 5V annunciator, an analog 9V gauge and a 27V solenoid,
/// one small controller board and one MOSFET driver.
pub const INVENTORY_JSON: &str = r#"{
  "sections": [
    {"id": "s1", "name": "Overhead", "sort_order": 0},
    {"id": "s2", "name": "Glareshield", "sort_order": 1}
  ],
  "component_types": [
    {"id": "t-ann", "name": "Annunciator", "default_pin_count": 1, "pin_types": ["digital"], "power_rail": "FIVE_V", "typical_current_ma": 80.0},
    {"id": "t-gauge", "name": "Gauge", "default_pin_count": 2, "pin_types": ["analog"], "power_rail": "NINE_V", "typical_current_ma": 20.0},
    {"id": "t-sol", "name": "Solenoid", "default_pin_count": 1, "pin_types": ["digital"], "power_rail": "TWENTY_SEVEN_V", "typical_current_ma": 80.0}
  ],
  "components": [
    {"id": "c1", "name": "MASTER CAUTION", "panel_section_id": "s1", "component_type_id": "t-ann", "sort_order": 0},
    {"id": "c2", "name": "FUEL FLOW", "panel_section_id": "s1", "component_type_id": "t-gauge", "sort_order": 1},
    {"id": "c3", "name": "STARTER", "panel_section_id": "s1", "component_type_id": "t-sol", "sort_order": 2}
  ],
  "boards": [
    {"id": "b1", "name": "Mega 1", "digital_pin_count": 4, "analog_pin_count": 2, "pwm_pins": [2, 3]}
  ],
  "mosfet_boards": [
    {"id": "m1", "name": "Driver 1", "channel_count": 8}
  ]
}"#;

pub fn panel() -> Command {
    let mut cmd = Command::cargo_bin("panel").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

pub fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("inventory.json").write_str(INVENTORY_JSON).unwrap();
    temp
}

pub fn stdout_json(output: &std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}
