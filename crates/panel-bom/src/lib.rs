//! Pin allocation planning for overhead panel builds.
//!
//! The crate models the wiring inventory of a panel build (sections,
//! component types and instances, microcontroller boards, pin assignments and
//! MOSFET driver boards) and implements the two operations that work on it:
//!
//! * [`calculate`] - a pure, deterministic plan that packs every unmet pin
//!   requirement of a panel section onto the free capacity of the existing
//!   boards and estimates what is still missing.
//! * [`apply`] - commits a previously calculated plan inside a single
//!   [`Inventory::transaction`], re-checking every referenced row and pin
//!   slot before it writes.
//!
//! Persistence is not owned here. Everything is read and written through the
//! [`Inventory`] trait; [`MemoryInventory`] is the bundled implementation
//! backed by a JSON snapshot file.

pub mod allocate;
pub mod apply;
#[cfg(feature = "table")]
mod bom_table;
pub mod capacity;
pub mod error;
pub mod inventory;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use allocate::{
    calculate, calculate_from_snapshot, AllocationContext, AllocationRequest, BomCalculationResult,
    ComponentAllocation, PinAllocation,
};
pub use apply::{apply, ApplyResult, CreatedAssignment};
pub use capacity::BoardCapacity;
pub use error::BomError;
pub use inventory::{FileInventory, Inventory, InventoryData, InventoryTx, MemoryInventory};

/// Digital pins on a board added to cover a shortfall (Arduino Mega layout)
pub const NEW_BOARD_DIGITAL_PINS: u32 = 54;

/// Analog pins on a board added to cover a shortfall
pub const NEW_BOARD_ANALOG_PINS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    #[default]
    Digital,
    Analog,
}

impl PinType {
    /// Pin count of a freshly added board for this pin type
    pub fn new_board_capacity(self) -> u32 {
        match self {
            PinType::Digital => NEW_BOARD_DIGITAL_PINS,
            PinType::Analog => NEW_BOARD_ANALOG_PINS,
        }
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinType::Digital => write!(f, "digital"),
            PinType::Analog => write!(f, "analog"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    Input,
    #[default]
    Output,
    Pwm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WiringStatus {
    #[default]
    Planned,
    Wired,
    Tested,
}

/// Supply rail a component draws from.
///
/// `TwentySevenV` is the aircraft bus wired straight from the supply; loads
/// on it are switched through MOSFET channels rather than driven from a
/// microcontroller pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rail {
    FiveV,
    NineV,
    TwentySevenV,
    #[default]
    None,
}

impl Rail {
    /// Voltage used for wattage calculations. The 27V bus is budgeted at 28V.
    pub fn voltage(self) -> f64 {
        match self {
            Rail::FiveV => 5.0,
            Rail::NineV => 9.0,
            Rail::TwentySevenV => 28.0,
            Rail::None => 0.0,
        }
    }

    /// Whether the rail is fed from the supply without a step-down converter
    pub fn is_direct(self) -> bool {
        self == Rail::TwentySevenV
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rail::FiveV => "FIVE_V",
            Rail::NineV => "NINE_V",
            Rail::TwentySevenV => "TWENTY_SEVEN_V",
            Rail::None => "NONE",
        }
    }
}

impl fmt::Display for Rail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rail {
    type Err = BomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIVE_V" => Ok(Rail::FiveV),
            "NINE_V" => Ok(Rail::NineV),
            "TWENTY_SEVEN_V" => Ok(Rail::TwentySevenV),
            "NONE" => Ok(Rail::None),
            _ => Err(BomError::Validation(format!("unknown power rail: {s}"))),
        }
    }
}

/// A pin on a microcontroller board, `D{n}` or `A{n}`.
///
/// Ordering sorts every digital pin before every analog pin, then by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PinId {
    Digital(u32),
    Analog(u32),
}

impl PinId {
    pub fn pin_type(self) -> PinType {
        match self {
            PinId::Digital(_) => PinType::Digital,
            PinId::Analog(_) => PinType::Analog,
        }
    }

    pub fn number(self) -> u32 {
        match self {
            PinId::Digital(n) | PinId::Analog(n) => n,
        }
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinId::Digital(n) => write!(f, "D{n}"),
            PinId::Analog(n) => write!(f, "A{n}"),
        }
    }
}

impl FromStr for PinId {
    type Err = BomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BomError::Validation(format!("invalid pin identifier: {s:?}"));

        let mut chars = s.chars();
        let prefix = chars.next().ok_or_else(invalid)?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let number: u32 = digits.parse().map_err(|_| invalid())?;

        match prefix {
            'D' => Ok(PinId::Digital(number)),
            'A' => Ok(PinId::Analog(number)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for PinId {
    type Error = BomError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PinId> for String {
    fn from(pin: PinId) -> Self {
        pin.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentType {
    pub id: String,
    pub name: String,
    pub default_pin_count: u32,
    /// Pin types the component connects to; the first one drives allocation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pin_types: Vec<PinType>,
    #[serde(default)]
    pub pwm_required: bool,
    #[serde(default)]
    pub power_rail: Rail,
    #[serde(default)]
    pub typical_current_ma: f64,
    #[serde(default)]
    pub standby_current_ma: f64,
}

impl ComponentType {
    /// Pin type used when allocating pins for this type
    pub fn pin_type(&self) -> PinType {
        self.pin_types.first().copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
    pub id: String,
    pub name: String,
    pub panel_section_id: String,
    pub component_type_id: String,
    /// Overrides the type's rail when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_rail: Option<Rail>,
    #[serde(default)]
    pub sort_order: i32,
}

impl ComponentInstance {
    pub fn effective_rail(&self, component_type: &ComponentType) -> Rail {
        self.power_rail.unwrap_or(component_type.power_rail)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    pub digital_pin_count: u32,
    pub analog_pin_count: u32,
    /// PWM-capable digital pin numbers, in preference order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pwm_pins: Vec<u32>,
}

impl Board {
    /// Whether the pin exists on this board
    pub fn has_pin(&self, pin: PinId) -> bool {
        match pin {
            PinId::Digital(n) => n < self.digital_pin_count,
            PinId::Analog(n) => n < self.analog_pin_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinAssignment {
    pub id: String,
    pub board_id: String,
    pub pin_number: PinId,
    #[serde(default)]
    pub pin_mode: PinMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_instance_id: Option<String>,
    #[serde(default)]
    pub wiring_status: WiringStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosfetChannel {
    pub channel_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_instance_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosfetBoard {
    pub id: String,
    pub name: String,
    pub channel_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<MosfetChannel>,
}

impl MosfetBoard {
    /// Channels not driving any component
    pub fn free_channels(&self) -> u32 {
        let occupied = self
            .channels
            .iter()
            .filter(|c| c.component_instance_id.is_some())
            .count() as u32;
        self.channel_count.saturating_sub(occupied)
    }
}
