use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scenario::{PowerScenario, ScenarioSet};
use crate::{PowerError, Rail};

/// Top-level `panel.toml` configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Power supply section
    #[serde(default)]
    pub psu: PsuConfig,

    /// Fixed logic-board overhead
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Additional named scenarios (`[[scenario]]` tables)
    #[serde(default, rename = "scenario", skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<ScenarioConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsuConfig {
    #[serde(default = "default_capacity_watts")]
    pub capacity_watts: f64,
    /// Step-down converter efficiency, in (0, 1]
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
}

impl Default for PsuConfig {
    fn default() -> Self {
        Self {
            capacity_watts: default_capacity_watts(),
            efficiency: default_efficiency(),
        }
    }
}

fn default_capacity_watts() -> f64 {
    350.0
}

fn default_efficiency() -> f64 {
    0.87
}

/// Current drawn by the boards themselves, always on the 5V rail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureConfig {
    #[serde(default = "default_board_current_ma")]
    pub board_current_ma: f64,
    #[serde(default = "default_mosfet_board_current_ma")]
    pub mosfet_board_current_ma: f64,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            board_current_ma: default_board_current_ma(),
            mosfet_board_current_ma: default_mosfet_board_current_ma(),
        }
    }
}

fn default_board_current_ma() -> f64 {
    100.0
}

fn default_mosfet_board_current_ma() -> f64 {
    20.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub default: f64,
    /// Component type name -> fraction
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub types: BTreeMap<String, f64>,
    /// Rail name (e.g. `NINE_V`) -> fraction
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rails: BTreeMap<String, f64>,
}

impl ScenarioConfig {
    fn to_scenario(&self) -> Result<PowerScenario, PowerError> {
        if self.name.trim().is_empty() {
            return Err(PowerError::Config("scenario name is required".to_string()));
        }
        check_fraction(&self.name, "default", self.default)?;

        let label = self.label.clone().unwrap_or_else(|| self.name.clone());
        let mut scenario = PowerScenario::new(self.name.clone(), label, self.default);

        for (type_name, &fraction) in &self.types {
            check_fraction(&self.name, type_name, fraction)?;
            scenario = scenario.with_type(type_name.clone(), fraction);
        }

        for (rail_name, &fraction) in &self.rails {
            let rail: Rail = rail_name.parse().map_err(|_| {
                PowerError::Config(format!(
                    "scenario {}: unknown rail {rail_name}",
                    self.name
                ))
            })?;
            check_fraction(&self.name, rail_name, fraction)?;
            scenario = scenario.with_rail(rail, fraction);
        }

        Ok(scenario)
    }
}

fn check_fraction(scenario: &str, key: &str, fraction: f64) -> Result<(), PowerError> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(PowerError::Config(format!(
            "scenario {scenario}: fraction for {key} must be between 0 and 1, got {fraction}"
        )));
    }
    Ok(())
}

impl PanelConfig {
    /// Parse and validate from TOML string
    pub fn parse(content: &str) -> Result<Self, PowerError> {
        let config: PanelConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PowerError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn validate(&self) -> Result<(), PowerError> {
        let efficiency = self.psu.efficiency;
        if !(efficiency > 0.0 && efficiency <= 1.0) {
            return Err(PowerError::Config(format!(
                "psu.efficiency must be in (0, 1], got {efficiency}"
            )));
        }
        if !self.psu.capacity_watts.is_finite() {
            return Err(PowerError::Config(
                "psu.capacity_watts must be a finite number".to_string(),
            ));
        }
        for (key, value) in [
            ("board_current_ma", self.infrastructure.board_current_ma),
            (
                "mosfet_board_current_ma",
                self.infrastructure.mosfet_board_current_ma,
            ),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PowerError::Config(format!(
                    "infrastructure.{key} must be a non-negative number, got {value}"
                )));
            }
        }

        // Scenario errors surface here rather than at first use
        self.scenario_set().map(|_| ())
    }

    /// Built-in scenarios plus the configured ones
    pub fn scenario_set(&self) -> Result<ScenarioSet, PowerError> {
        let mut set = ScenarioSet::default();
        for scenario in &self.scenarios {
            set.insert(scenario.to_scenario()?)?;
        }
        Ok(set)
    }

    /// Logic-board current for the given number of controller and MOSFET boards
    pub fn infrastructure_current_ma(&self, boards: usize, mosfet_boards: usize) -> f64 {
        boards as f64 * self.infrastructure.board_current_ma
            + mosfet_boards as f64 * self.infrastructure.mosfet_board_current_ma
    }
}
