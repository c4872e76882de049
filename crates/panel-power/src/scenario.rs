//! Operating scenarios and per-component activation fractions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PowerComponent, PowerError, Rail};

/// Per-section on/off switches used by the custom scenario, keyed by section id
pub type SectionToggles = BTreeMap<String, bool>;

pub const CUSTOM: &str = "custom";

/// One row of a scenario's activation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum ActivationRule {
    TypeName { name: String, fraction: f64 },
    Rail { rail: Rail, fraction: f64 },
    Default { fraction: f64 },
}

impl ActivationRule {
    /// Evaluation order: type names, then rails, then the default
    fn precedence(&self) -> u8 {
        match self {
            ActivationRule::TypeName { .. } => 0,
            ActivationRule::Rail { .. } => 1,
            ActivationRule::Default { .. } => 2,
        }
    }

    fn matches(&self, type_name: &str, rail: Rail) -> bool {
        match self {
            ActivationRule::TypeName { name, .. } => name == type_name,
            ActivationRule::Rail { rail: r, .. } => *r == rail,
            ActivationRule::Default { .. } => true,
        }
    }

    pub fn fraction(&self) -> f64 {
        match self {
            ActivationRule::TypeName { fraction, .. }
            | ActivationRule::Rail { fraction, .. }
            | ActivationRule::Default { fraction } => *fraction,
        }
    }
}

impl fmt::Display for ActivationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationRule::TypeName { name, fraction } => write!(f, "{name} = {fraction}"),
            ActivationRule::Rail { rail, fraction } => write!(f, "{rail} = {fraction}"),
            ActivationRule::Default { fraction } => write!(f, "default = {fraction}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Ordered decision table; the first matching rule wins
    Rules { rules: Vec<ActivationRule> },
    /// Whole panel sections switched on or off by the caller
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerScenario {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: ScenarioKind,
}

impl PowerScenario {
    /// A rule-based scenario that activates everything at `default`
    pub fn new(name: impl Into<String>, label: impl Into<String>, default: f64) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: ScenarioKind::Rules {
                rules: vec![ActivationRule::Default { fraction: default }],
            },
        }
    }

    pub fn custom() -> Self {
        Self {
            name: CUSTOM.to_string(),
            label: "Custom".to_string(),
            kind: ScenarioKind::Custom,
        }
    }

    pub fn with_type(self, name: impl Into<String>, fraction: f64) -> Self {
        self.with_rule(ActivationRule::TypeName {
            name: name.into(),
            fraction,
        })
    }

    pub fn with_rail(self, rail: Rail, fraction: f64) -> Self {
        self.with_rule(ActivationRule::Rail { rail, fraction })
    }

    /// Insert a rule behind every rule of equal or higher precedence.
    /// Rules added to the custom scenario are ignored.
    pub fn with_rule(mut self, rule: ActivationRule) -> Self {
        if let ScenarioKind::Rules { rules } = &mut self.kind {
            let at = rules
                .iter()
                .position(|r| r.precedence() > rule.precedence())
                .unwrap_or(rules.len());
            rules.insert(at, rule);
        }
        self
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.kind, ScenarioKind::Custom)
    }

    pub fn rules(&self) -> &[ActivationRule] {
        match &self.kind {
            ScenarioKind::Rules { rules } => rules,
            ScenarioKind::Custom => &[],
        }
    }

    pub fn all_on() -> Self {
        Self::new("all-on", "All On", 1.0)
    }

    pub fn cold_dark() -> Self {
        Self::new("cold-dark", "Cold & Dark", 0.0).with_rail(Rail::FiveV, 1.0)
    }

    pub fn cruise() -> Self {
        Self::new("cruise", "Cruise", 0.6)
            .with_type("Annunciator", 0.1)
            .with_type("Backlight", 0.0)
    }

    pub fn night() -> Self {
        Self::new("night", "Night", 0.6)
            .with_type("Backlight", 1.0)
            .with_type("Annunciator", 0.1)
    }

    pub fn builtin() -> Vec<Self> {
        vec![
            Self::all_on(),
            Self::cold_dark(),
            Self::cruise(),
            Self::night(),
            Self::custom(),
        ]
    }
}

/// Activation fraction of a component under a scenario.
///
/// Custom scenarios switch whole sections: a section toggled on draws its
/// full typical current, anything else draws nothing.
pub fn activation(
    component: &PowerComponent,
    scenario: &PowerScenario,
    toggles: Option<&SectionToggles>,
) -> f64 {
    match &scenario.kind {
        ScenarioKind::Custom => {
            let on = toggles
                .and_then(|t| t.get(&component.panel_section_id))
                .copied()
                .unwrap_or(false);
            if on { 1.0 } else { 0.0 }
        }
        ScenarioKind::Rules { rules } => rules
            .iter()
            .find(|rule| rule.matches(&component.component_type, component.power_rail))
            .map(ActivationRule::fraction)
            .unwrap_or(0.0),
    }
}

/// Named scenarios available to a budget request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSet {
    scenarios: Vec<PowerScenario>,
}

impl Default for ScenarioSet {
    fn default() -> Self {
        Self {
            scenarios: PowerScenario::builtin(),
        }
    }
}

impl ScenarioSet {
    /// Add a scenario, replacing any scenario with the same name
    pub fn insert(&mut self, scenario: PowerScenario) -> Result<(), PowerError> {
        if normalize_name(&scenario.name) == CUSTOM && !scenario.is_custom() {
            return Err(PowerError::Config(
                "scenario name \"custom\" is reserved".to_string(),
            ));
        }

        let key = normalize_name(&scenario.name);
        match self
            .scenarios
            .iter_mut()
            .find(|s| normalize_name(&s.name) == key)
        {
            Some(existing) => {
                log::debug!("Scenario {} replaced by configuration", existing.name);
                *existing = scenario;
            }
            None => self.scenarios.push(scenario),
        }
        Ok(())
    }

    /// Look up a scenario by name. `Cold_Dark` and `cold-dark` are the same.
    pub fn get(&self, name: &str) -> Result<&PowerScenario, PowerError> {
        let key = normalize_name(name);
        self.scenarios
            .iter()
            .find(|s| normalize_name(&s.name) == key)
            .ok_or_else(|| PowerError::UnknownScenario(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PowerScenario> {
        self.scenarios.iter()
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(type_name: &str, rail: Rail, section: &str) -> PowerComponent {
        PowerComponent {
            id: format!("{type_name}-{section}"),
            name: type_name.to_uppercase(),
            panel_section_id: section.to_string(),
            panel_section_name: section.to_string(),
            component_type: type_name.to_string(),
            power_rail: rail,
            typical_current_ma: 80.0,
            standby_current_ma: 0.0,
        }
    }

    #[test]
    fn test_type_override_beats_rail_override() {
        let scenario = PowerScenario::new("test", "Test", 0.5)
            .with_rail(Rail::FiveV, 0.2)
            .with_type("Annunciator", 0.9);

        assert_eq!(
            activation(&component("Annunciator", Rail::FiveV, "s1"), &scenario, None),
            0.9
        );
        assert_eq!(
            activation(&component("Toggle", Rail::FiveV, "s1"), &scenario, None),
            0.2
        );
        assert_eq!(
            activation(&component("Toggle", Rail::NineV, "s1"), &scenario, None),
            0.5
        );
    }

    #[test]
    fn test_rules_are_kept_in_precedence_order() {
        let scenario = PowerScenario::new("test", "Test", 0.5)
            .with_rail(Rail::NineV, 0.0)
            .with_type("Gauge", 1.0)
            .with_rail(Rail::FiveV, 0.3);

        let kinds: Vec<u8> = scenario.rules().iter().map(|r| r.precedence()).collect();
        assert_eq!(kinds, vec![0, 1, 1, 2]);
        assert_eq!(scenario.rules()[1], ActivationRule::Rail { rail: Rail::NineV, fraction: 0.0 });
    }

    #[test]
    fn test_cold_dark() {
        let scenario = PowerScenario::cold_dark();
        assert_eq!(
            activation(&component("Annunciator", Rail::FiveV, "s1"), &scenario, None),
            1.0
        );
        assert_eq!(
            activation(&component("Gauge", Rail::NineV, "s1"), &scenario, None),
            0.0
        );
        assert_eq!(
            activation(&component("Solenoid", Rail::TwentySevenV, "s1"), &scenario, None),
            0.0
        );
    }

    #[test]
    fn test_cruise_annunciator() {
        let scenario = PowerScenario::cruise();
        let annunciator = component("Annunciator", Rail::TwentySevenV, "s1");
        let fraction = activation(&annunciator, &scenario, None);
        assert_eq!(fraction, 0.1);
        assert!((annunciator.typical_current_ma * fraction - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_uses_section_toggles() {
        let scenario = PowerScenario::custom();
        let mut toggles = SectionToggles::new();
        toggles.insert("s1".to_string(), true);
        toggles.insert("s2".to_string(), false);

        assert_eq!(
            activation(&component("Toggle", Rail::FiveV, "s1"), &scenario, Some(&toggles)),
            1.0
        );
        assert_eq!(
            activation(&component("Toggle", Rail::FiveV, "s2"), &scenario, Some(&toggles)),
            0.0
        );
        assert_eq!(
            activation(&component("Toggle", Rail::FiveV, "s3"), &scenario, Some(&toggles)),
            0.0
        );
        assert_eq!(
            activation(&component("Toggle", Rail::FiveV, "s1"), &scenario, None),
            0.0
        );
    }

    #[test]
    fn test_custom_ignores_rules() {
        let scenario = PowerScenario::custom().with_type("Toggle", 1.0);
        assert!(scenario.rules().is_empty());
    }

    #[test]
    fn test_scenario_lookup() {
        let set = ScenarioSet::default();
        assert_eq!(set.get("cold-dark").unwrap().label, "Cold & Dark");
        assert_eq!(set.get("COLD_DARK").unwrap().name, "cold-dark");
        assert!(set.get("custom").unwrap().is_custom());
        assert!(matches!(
            set.get("takeoff"),
            Err(PowerError::UnknownScenario(name)) if name == "takeoff"
        ));
    }

    #[test]
    fn test_scenario_insert_replaces_builtin() {
        let mut set = ScenarioSet::default();
        set.insert(PowerScenario::new("cruise", "Long Cruise", 0.4))
            .unwrap();
        set.insert(PowerScenario::new("taxi", "Taxi", 0.5)).unwrap();

        assert_eq!(set.get("cruise").unwrap().label, "Long Cruise");
        assert_eq!(set.get("taxi").unwrap().label, "Taxi");
        assert_eq!(set.iter().count(), 6);
        assert!(set.insert(PowerScenario::new("Custom", "Mine", 1.0)).is_err());
    }
}
