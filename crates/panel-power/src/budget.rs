//! Rail currents, PSU demand and utilization grading.

use std::collections::BTreeMap;
use std::fmt;

use panel_bom::{Inventory, InventoryData};
use serde::{Deserialize, Serialize};

use crate::scenario::{activation, PowerScenario, SectionToggles};
use crate::{PanelConfig, PowerComponent, PowerError, Rail};

/// Rail that carries the logic-board overhead
pub const INFRASTRUCTURE_RAIL: Rail = Rail::FiveV;

/// Above this share of capacity the supply is overloaded
const RED_THRESHOLD: f64 = 0.9;
/// At or above this share of capacity headroom is getting thin
const AMBER_THRESHOLD: f64 = 0.7;

/// Current per rail in mA. Rails nothing draws from are absent.
pub type RailCurrents = BTreeMap<Rail, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RailPowerDetail {
    pub rail: Rail,
    pub voltage: f64,
    pub current_ma: f64,
    /// Power delivered on the rail
    pub watts: f64,
    /// Power taken from the supply to deliver `watts`
    pub psu_watts: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsuDemandResult {
    /// Sum of every rail's PSU-side draw plus infrastructure
    pub total_watts: f64,
    pub per_rail: Vec<RailPowerDetail>,
    /// PSU-side draw of the logic boards
    pub infrastructure_watts: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtilizationLevel {
    Green,
    Amber,
    Red,
}

impl fmt::Display for UtilizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UtilizationLevel::Green => write!(f, "green"),
            UtilizationLevel::Amber => write!(f, "amber"),
            UtilizationLevel::Red => write!(f, "red"),
        }
    }
}

/// Current per rail for one panel section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionPower {
    pub section_id: String,
    pub section_name: String,
    pub rail_currents: RailCurrents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerBudget {
    pub scenario: String,
    pub scenario_label: String,
    pub rail_currents: RailCurrents,
    pub psu_demand: PsuDemandResult,
    pub capacity_watts: f64,
    /// `None` when the capacity is not positive
    pub utilization: Option<f64>,
    pub utilization_level: UtilizationLevel,
    pub sections: Vec<SectionPower>,
}

/// Scenario-weighted current per rail.
///
/// Components without a rail or without typical draw are skipped.
pub fn rail_currents_ma(
    components: &[PowerComponent],
    scenario: &PowerScenario,
    toggles: Option<&SectionToggles>,
) -> RailCurrents {
    let mut currents = RailCurrents::new();
    for component in components {
        if component.power_rail == Rail::None || component.typical_current_ma == 0.0 {
            continue;
        }
        let fraction = activation(component, scenario, toggles);
        *currents.entry(component.power_rail).or_insert(0.0) +=
            component.typical_current_ma * fraction;
    }
    currents
}

/// PSU-side demand for the given rail currents.
///
/// Every rail except the direct 27V bus goes through a step-down converter,
/// so its draw is divided by `efficiency`. Infrastructure current sits on the
/// 5V rail and is converted the same way.
pub fn psu_demand_watts(
    rail_currents: &RailCurrents,
    efficiency: f64,
    infrastructure_current_ma: f64,
) -> PsuDemandResult {
    let per_rail: Vec<RailPowerDetail> = rail_currents
        .iter()
        .filter(|(rail, _)| **rail != Rail::None)
        .map(|(&rail, &current_ma)| {
            let watts = current_ma * rail.voltage() / 1000.0;
            let psu_watts = if rail.is_direct() {
                watts
            } else {
                watts / efficiency
            };
            RailPowerDetail {
                rail,
                voltage: rail.voltage(),
                current_ma,
                watts,
                psu_watts,
            }
        })
        .collect();

    let infrastructure_watts =
        infrastructure_current_ma * INFRASTRUCTURE_RAIL.voltage() / 1000.0 / efficiency;
    let total_watts = per_rail.iter().map(|r| r.psu_watts).sum::<f64>() + infrastructure_watts;

    PsuDemandResult {
        total_watts,
        per_rail,
        infrastructure_watts,
    }
}

/// Grade demand against capacity. A non-positive capacity is always red.
pub fn utilization_level(demand_watts: f64, capacity_watts: f64) -> UtilizationLevel {
    if capacity_watts <= 0.0 {
        return UtilizationLevel::Red;
    }
    let ratio = demand_watts / capacity_watts;
    if ratio > RED_THRESHOLD {
        UtilizationLevel::Red
    } else if ratio >= AMBER_THRESHOLD {
        UtilizationLevel::Amber
    } else {
        UtilizationLevel::Green
    }
}

/// Electrical load records for every component instance in the inventory.
///
/// Components whose type or section is missing from the snapshot are skipped.
pub fn power_components(data: &InventoryData) -> Vec<PowerComponent> {
    data.components
        .iter()
        .filter_map(|instance| {
            let Some(component_type) = data.find_component_type(&instance.component_type_id)
            else {
                log::warn!(
                    "Skipping {}: component type {} not found",
                    instance.name,
                    instance.component_type_id
                );
                return None;
            };
            let Some(section) = data.find_section(&instance.panel_section_id) else {
                log::warn!(
                    "Skipping {}: section {} not found",
                    instance.name,
                    instance.panel_section_id
                );
                return None;
            };

            Some(PowerComponent {
                id: instance.id.clone(),
                name: instance.name.clone(),
                panel_section_id: section.id.clone(),
                panel_section_name: section.name.clone(),
                component_type: component_type.name.clone(),
                power_rail: instance.effective_rail(component_type),
                typical_current_ma: component_type.typical_current_ma,
                standby_current_ma: component_type.standby_current_ma,
            })
        })
        .collect()
}

/// Rail currents per section, in section order. Sections drawing nothing are left out.
fn section_breakdown(
    data: &InventoryData,
    components: &[PowerComponent],
    scenario: &PowerScenario,
    toggles: Option<&SectionToggles>,
) -> Vec<SectionPower> {
    let mut sections: Vec<_> = data.sections.iter().collect();
    sections.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.name.cmp(&b.name))
    });

    sections
        .into_iter()
        .filter_map(|section| {
            let members: Vec<PowerComponent> = components
                .iter()
                .filter(|c| c.panel_section_id == section.id)
                .cloned()
                .collect();
            let rail_currents = rail_currents_ma(&members, scenario, toggles);
            if rail_currents.values().all(|&ma| ma == 0.0) {
                return None;
            }
            Some(SectionPower {
                section_id: section.id.clone(),
                section_name: section.name.clone(),
                rail_currents,
            })
        })
        .collect()
}

/// Full power budget for the inventory under a named scenario.
pub fn power_budget<I: Inventory>(
    inventory: &I,
    config: &PanelConfig,
    scenario_name: &str,
    toggles: Option<&SectionToggles>,
) -> Result<PowerBudget, PowerError> {
    let scenarios = config.scenario_set()?;
    let scenario = scenarios.get(scenario_name)?;

    let data = inventory.snapshot()?;
    let components = power_components(&data);

    let rail_currents = rail_currents_ma(&components, scenario, toggles);
    let infrastructure_ma =
        config.infrastructure_current_ma(data.boards.len(), data.mosfet_boards.len());
    let psu_demand = psu_demand_watts(&rail_currents, config.psu.efficiency, infrastructure_ma);

    let capacity_watts = config.psu.capacity_watts;
    let utilization = (capacity_watts > 0.0).then(|| psu_demand.total_watts / capacity_watts);
    let utilization_level = utilization_level(psu_demand.total_watts, capacity_watts);

    log::info!(
        "Power budget ({}): {:.2} W of {:.0} W, {}",
        scenario.label,
        psu_demand.total_watts,
        capacity_watts,
        utilization_level
    );

    Ok(PowerBudget {
        scenario: scenario.name.clone(),
        scenario_label: scenario.label.clone(),
        sections: section_breakdown(&data, &components, scenario, toggles),
        rail_currents,
        psu_demand,
        capacity_watts,
        utilization,
        utilization_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_bom::MemoryInventory;

    const EPS: f64 = 1e-9;

    fn component(type_name: &str, rail: Rail, ma: f64, section: &str) -> PowerComponent {
        PowerComponent {
            id: format!("{type_name}-{section}"),
            name: type_name.to_uppercase(),
            panel_section_id: section.to_string(),
            panel_section_name: section.to_uppercase(),
            component_type: type_name.to_string(),
            power_rail: rail,
            typical_current_ma: ma,
            standby_current_ma: 1.0,
        }
    }

    fn currents(entries: &[(Rail, f64)]) -> RailCurrents {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_rail_currents_skip_unpowered_components() {
        let components = vec![
            component("Toggle", Rail::None, 50.0, "s1"),
            component("Encoder", Rail::FiveV, 0.0, "s1"),
            component("Annunciator", Rail::FiveV, 80.0, "s1"),
            component("Gauge", Rail::NineV, 20.0, "s1"),
            component("Gauge", Rail::NineV, 30.0, "s2"),
        ];
        let result = rail_currents_ma(&components, &PowerScenario::all_on(), None);

        assert_eq!(result, currents(&[(Rail::FiveV, 80.0), (Rail::NineV, 50.0)]));
        assert!(!result.contains_key(&Rail::TwentySevenV));
        assert!(!result.contains_key(&Rail::None));
    }

    #[test]
    fn test_cold_dark_only_low_rail() {
        let components = vec![
            component("Annunciator", Rail::FiveV, 80.0, "s1"),
            component("Gauge", Rail::NineV, 20.0, "s1"),
            component("Solenoid", Rail::TwentySevenV, 500.0, "s1"),
        ];
        let result = rail_currents_ma(&components, &PowerScenario::cold_dark(), None);

        assert_eq!(result[&Rail::FiveV], 80.0);
        assert_eq!(result[&Rail::NineV], 0.0);
        assert_eq!(result[&Rail::TwentySevenV], 0.0);
    }

    #[test]
    fn test_cruise_annunciator_draw() {
        let components = vec![component("Annunciator", Rail::FiveV, 80.0, "s1")];
        let result = rail_currents_ma(&components, &PowerScenario::cruise(), None);
        assert!((result[&Rail::FiveV] - 8.0).abs() < EPS);
    }

    #[test]
    fn test_custom_without_toggles_draws_nothing() {
        let components = vec![component("Annunciator", Rail::FiveV, 80.0, "s1")];
        let result = rail_currents_ma(&components, &PowerScenario::custom(), None);
        assert_eq!(result[&Rail::FiveV], 0.0);

        let mut toggles = SectionToggles::new();
        toggles.insert("s1".to_string(), true);
        let result = rail_currents_ma(&components, &PowerScenario::custom(), Some(&toggles));
        assert_eq!(result[&Rail::FiveV], 80.0);
    }

    #[test]
    fn test_direct_rail_has_no_conversion_loss() {
        let demand = psu_demand_watts(&currents(&[(Rail::TwentySevenV, 80.0)]), 0.87, 0.0);
        assert!((demand.per_rail[0].watts - 2.24).abs() < EPS);
        assert!((demand.per_rail[0].psu_watts - 2.24).abs() < EPS);
        assert!((demand.total_watts - 2.24).abs() < EPS);
        assert_eq!(demand.per_rail[0].voltage, 28.0);
    }

    #[test]
    fn test_converted_rail_divides_by_efficiency() {
        let demand = psu_demand_watts(&currents(&[(Rail::NineV, 20.0)]), 0.87, 0.0);
        let rail = &demand.per_rail[0];
        assert!((rail.watts - 0.18).abs() < EPS);
        assert!((rail.psu_watts - 0.18 / 0.87).abs() < EPS);
        assert!((demand.total_watts - 0.206_896_551_7).abs() < 1e-6);
    }

    #[test]
    fn test_infrastructure_is_lossy_five_volt_draw() {
        let demand = psu_demand_watts(&RailCurrents::new(), 0.8, 200.0);
        assert!(demand.per_rail.is_empty());
        assert!((demand.infrastructure_watts - 1.25).abs() < EPS);
        assert!((demand.total_watts - 1.25).abs() < EPS);

        let demand = psu_demand_watts(
            &currents(&[(Rail::FiveV, 100.0), (Rail::TwentySevenV, 100.0)]),
            0.5,
            100.0,
        );
        // 0.5 W / 0.5 + 2.8 W + 0.5 W / 0.5
        assert!((demand.total_watts - 4.8).abs() < EPS);
    }

    #[test]
    fn test_utilization_levels() {
        assert_eq!(utilization_level(245.0, 350.0), UtilizationLevel::Amber);
        assert_eq!(utilization_level(244.0, 350.0), UtilizationLevel::Green);
        assert_eq!(utilization_level(315.0, 350.0), UtilizationLevel::Amber);
        assert_eq!(utilization_level(316.0, 350.0), UtilizationLevel::Red);
        assert_eq!(utilization_level(0.0, 0.0), UtilizationLevel::Red);
        assert_eq!(utilization_level(10.0, 0.0), UtilizationLevel::Red);
        assert_eq!(utilization_level(10.0, -5.0), UtilizationLevel::Red);
    }

    const INVENTORY: &str = r#"{
        "sections": [
            {"id": "s1", "name": "Overhead", "sort_order": 0},
            {"id": "s2", "name": "Glareshield", "sort_order": 1},
            {"id": "s3", "name": "Spare", "sort_order": 2}
        ],
        "component_types": [
            {"id": "t1", "name": "Annunciator", "default_pin_count": 1, "power_rail": "FIVE_V", "typical_current_ma": 80.0},
            {"id": "t2", "name": "Gauge", "default_pin_count": 2, "power_rail": "NINE_V", "typical_current_ma": 20.0},
            {"id": "t3", "name": "Solenoid", "default_pin_count": 1, "power_rail": "TWENTY_SEVEN_V", "typical_current_ma": 80.0}
        ],
        "components": [
            {"id": "c1", "name": "MASTER CAUTION", "panel_section_id": "s1", "component_type_id": "t1"},
            {"id": "c2", "name": "OIL PRESS", "panel_section_id": "s2", "component_type_id": "t2"},
            {"id": "c3", "name": "STARTER", "panel_section_id": "s2", "component_type_id": "t3"}
        ],
        "boards": [
            {"id": "b1", "name": "Mega 1", "digital_pin_count": 54, "analog_pin_count": 16}
        ]
    }"#;

    fn inventory() -> MemoryInventory {
        MemoryInventory::new(InventoryData::parse(INVENTORY).unwrap())
    }

    #[test]
    fn test_power_budget_all_on() {
        let config = PanelConfig::default();
        let budget = power_budget(&inventory(), &config, "all-on", None).unwrap();

        assert_eq!(budget.scenario_label, "All On");
        assert_eq!(
            budget.rail_currents,
            currents(&[
                (Rail::FiveV, 80.0),
                (Rail::NineV, 20.0),
                (Rail::TwentySevenV, 80.0)
            ])
        );

        // 0.4/0.87 + 0.18/0.87 + 2.24 + 100mA * 5V / 0.87
        let expected = 0.4 / 0.87 + 0.18 / 0.87 + 2.24 + 0.5 / 0.87;
        assert!((budget.psu_demand.total_watts - expected).abs() < EPS);
        assert_eq!(budget.utilization_level, UtilizationLevel::Green);
        assert!((budget.utilization.unwrap() - expected / 350.0).abs() < EPS);

        let names: Vec<_> = budget.sections.iter().map(|s| s.section_name.as_str()).collect();
        assert_eq!(names, vec!["Overhead", "Glareshield"]);
    }

    #[test]
    fn test_orphaned_components_are_skipped() {
        let mut data = InventoryData::parse(INVENTORY).unwrap();
        data.components[0].panel_section_id = "gone".to_string();
        data.components[1].component_type_id = "gone".to_string();

        let components = power_components(&data);
        let ids: Vec<_> = components.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c3"]);

        let budget = power_budget(
            &MemoryInventory::new(data),
            &PanelConfig::default(),
            "all-on",
            None,
        )
        .unwrap();
        assert_eq!(
            budget.rail_currents,
            currents(&[(Rail::TwentySevenV, 80.0)])
        );
        assert_eq!(budget.sections.len(), 1);
        assert_eq!(budget.sections[0].section_id, "s2");
    }

    #[test]
    fn test_power_budget_custom_sections() {
        let config = PanelConfig::default();
        let mut toggles = SectionToggles::new();
        toggles.insert("s2".to_string(), true);

        let budget = power_budget(&inventory(), &config, "custom", Some(&toggles)).unwrap();
        assert_eq!(budget.rail_currents[&Rail::FiveV], 0.0);
        assert_eq!(budget.rail_currents[&Rail::NineV], 20.0);
        assert_eq!(budget.rail_currents[&Rail::TwentySevenV], 80.0);
        assert_eq!(budget.sections.len(), 1);
        assert_eq!(budget.sections[0].section_id, "s2");
    }

    #[test]
    fn test_power_budget_zero_capacity_is_red() {
        let mut config = PanelConfig::default();
        config.psu.capacity_watts = 0.0;

        let budget = power_budget(&inventory(), &config, "cold-dark", None).unwrap();
        assert_eq!(budget.utilization, None);
        assert_eq!(budget.utilization_level, UtilizationLevel::Red);
    }

    #[test]
    fn test_power_budget_unknown_scenario() {
        let err = power_budget(&inventory(), &PanelConfig::default(), "takeoff", None).unwrap_err();
        assert!(matches!(err, PowerError::UnknownScenario(_)));
    }

    #[test]
    fn test_power_budget_json_keys() {
        let budget = power_budget(&inventory(), &PanelConfig::default(), "cruise", None).unwrap();
        let json = serde_json::to_value(&budget).unwrap();
        assert_eq!(json["utilization_level"], "green");
        assert!(json["rail_currents"]["TWENTY_SEVEN_V"].is_number());
        assert!(json["psu_demand"]["total_watts"].is_number());
    }
}
