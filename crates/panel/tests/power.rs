use assert_fs::prelude::*;

mod helpers;
use helpers::*;

const EPS: f64 = 1e-9;

fn budget_json(temp: &assert_fs::TempDir, args: &[&str]) -> serde_json::Value {
    let output = panel()
        .current_dir(temp.path())
        .args(["power", "budget"])
        .args(args)
        .args(["-f", "json"])
        .output()
        .unwrap();
    stdout_json(&output)
}

#[test]
fn test_budget_all_on() {
    let temp = workspace();
    let budget = budget_json(&temp, &[]);

    assert_eq!(budget["scenario"], "all-on");
    assert_eq!(budget["rail_currents"]["FIVE_V"], 80.0);
    assert_eq!(budget["rail_currents"]["NINE_V"], 20.0);
    assert_eq!(budget["rail_currents"]["TWENTY_SEVEN_V"], 80.0);

    // One controller (100 mA) and one driver (20 mA) on 5V
    let expected = (0.4 + 0.18 + 0.6) / 0.87 + 2.24;
    let total = budget["psu_demand"]["total_watts"].as_f64().unwrap();
    assert!((total - expected).abs() < EPS, "{total}");
    assert_eq!(budget["utilization_level"], "green");
}

#[test]
fn test_budget_cold_dark() {
    let temp = workspace();
    let budget = budget_json(&temp, &["cold_dark"]);

    assert_eq!(budget["scenario"], "cold-dark");
    assert_eq!(budget["rail_currents"]["FIVE_V"], 80.0);
    assert_eq!(budget["rail_currents"]["NINE_V"], 0.0);
    assert_eq!(budget["rail_currents"]["TWENTY_SEVEN_V"], 0.0);
}

#[test]
fn test_budget_custom_toggles() {
    let temp = workspace();

    let budget = budget_json(&temp, &["custom"]);
    let infrastructure = 0.6 / 0.87;
    let total = budget["psu_demand"]["total_watts"].as_f64().unwrap();
    assert!((total - infrastructure).abs() < EPS, "{total}");
    assert_eq!(budget["sections"], serde_json::json!([]));

    let budget = budget_json(&temp, &["custom", "--on", "s1"]);
    assert_eq!(budget["rail_currents"]["TWENTY_SEVEN_V"], 80.0);
    assert_eq!(budget["sections"][0]["section_id"], "s1");
}

#[test]
fn test_budget_reads_panel_toml() {
    let temp = workspace();
    temp.child("panel.toml")
        .write_str("[psu]\ncapacity_watts = 3.0\n")
        .unwrap();

    let budget = budget_json(&temp, &[]);
    assert_eq!(budget["capacity_watts"], 3.0);
    assert_eq!(budget["utilization_level"], "red");
}

#[test]
fn test_budget_explicit_config_and_scenario() {
    let temp = workspace();
    temp.child("conf/taxi.toml")
        .write_str(
            r#"
[[scenario]]
name = "taxi"
label = "Taxi"
default = 0.5
rails = { TWENTY_SEVEN_V = 0.0 }
"#,
        )
        .unwrap();

    let budget = budget_json(&temp, &["taxi", "--config", "conf/taxi.toml"]);
    assert_eq!(budget["scenario_label"], "Taxi");
    assert_eq!(budget["rail_currents"]["FIVE_V"], 40.0);
    assert_eq!(budget["rail_currents"]["TWENTY_SEVEN_V"], 0.0);
}

#[test]
fn test_budget_unknown_scenario() {
    let temp = workspace();
    let output = panel()
        .current_dir(temp.path())
        .args(["power", "budget", "takeoff"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("takeoff"));
}

#[test]
fn test_budget_rejects_bad_config() {
    let temp = workspace();
    temp.child("panel.toml")
        .write_str("[psu]\nefficiency = 1.5\n")
        .unwrap();

    let output = panel()
        .current_dir(temp.path())
        .args(["power", "budget"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("efficiency"));
}

#[test]
fn test_scenarios_lists_builtin_and_configured() {
    let temp = workspace();
    temp.child("panel.toml")
        .write_str("[[scenario]]\nname = \"taxi\"\ndefault = 0.5\n")
        .unwrap();

    let output = panel()
        .current_dir(temp.path())
        .args(["power", "scenarios", "-f", "json"])
        .output()
        .unwrap();
    let scenarios = stdout_json(&output);
    let names: Vec<&str> = scenarios
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["all-on", "cold-dark", "cruise", "night", "custom", "taxi"]
    );
}
