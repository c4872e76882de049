//! Power budgeting for overhead panel builds.
//!
//! Current draw is modelled per supply rail under a named operating
//! [`PowerScenario`]. Rail currents are converted to watts, step-down
//! converter losses and the fixed logic-board overhead are added, and the
//! resulting PSU demand is graded against the supply's capacity.

pub mod budget;
pub mod config;
pub mod error;
#[cfg(feature = "table")]
mod power_table;
pub mod scenario;

use serde::{Deserialize, Serialize};

pub use panel_bom::Rail;

pub use budget::{
    power_budget, power_components, psu_demand_watts, rail_currents_ma, utilization_level,
    PowerBudget, PsuDemandResult, RailCurrents, RailPowerDetail, SectionPower, UtilizationLevel,
};
pub use config::{InfrastructureConfig, PanelConfig, PsuConfig, ScenarioConfig};
pub use error::PowerError;
pub use scenario::{
    activation, ActivationRule, PowerScenario, ScenarioKind, ScenarioSet, SectionToggles,
};

/// Electrical load of one component instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerComponent {
    pub id: String,
    pub name: String,
    pub panel_section_id: String,
    pub panel_section_name: String,
    pub component_type: String,
    pub power_rail: Rail,
    pub typical_current_ma: f64,
    /// Recorded for reference; budgets use the typical draw
    pub standby_current_ma: f64,
}
