//! BOM calculation: pack a section's unmet pin needs onto existing boards.
//!
//! Components are served first-come-first-served in build order and boards
//! are searched by name, so the same snapshot always yields the same plan.
//! The plan is only a proposal; [`crate::apply`] commits it.

use serde::{Deserialize, Serialize};

use crate::capacity::BoardCapacity;
use crate::inventory::{Inventory, InventoryData};
use crate::{BomError, ComponentInstance, ComponentType, PinId, PinType, Rail};

/// Pins proposed for one component on one board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAllocation {
    pub board_id: String,
    pub board_name: String,
    pub pins: Vec<PinId>,
}

/// Unmet pin need of one component instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    pub component_instance_id: String,
    pub component_name: String,
    pub component_type: String,
    pub pins_needed: u32,
    pub pin_type: PinType,
    pub pwm_required: bool,
    pub power_rail: Rail,
}

impl AllocationRequest {
    pub fn new(
        instance: &ComponentInstance,
        component_type: &ComponentType,
        assigned: u32,
    ) -> Self {
        Self {
            component_instance_id: instance.id.clone(),
            component_name: instance.name.clone(),
            component_type: component_type.name.clone(),
            pins_needed: component_type.default_pin_count.saturating_sub(assigned),
            pin_type: component_type.pin_type(),
            pwm_required: component_type.pwm_required,
            power_rail: instance.effective_rail(component_type),
        }
    }
}

/// A component's request together with the pins proposed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAllocation {
    pub component_instance_id: String,
    pub component_name: String,
    pub component_type: String,
    pub pins_needed: u32,
    pub pin_type: PinType,
    pub pwm_required: bool,
    pub power_rail: Rail,
    pub allocations: Vec<PinAllocation>,
}

impl ComponentAllocation {
    fn new(request: AllocationRequest, allocations: Vec<PinAllocation>) -> Self {
        Self {
            component_instance_id: request.component_instance_id,
            component_name: request.component_name,
            component_type: request.component_type,
            pins_needed: request.pins_needed,
            pin_type: request.pin_type,
            pwm_required: request.pwm_required,
            power_rail: request.power_rail,
            allocations,
        }
    }

    /// Pins proposed across every board
    pub fn allocated_pins(&self) -> u32 {
        self.allocations.iter().map(|a| a.pins.len() as u32).sum()
    }

    /// Pins that no existing board could provide
    pub fn unmet_pins(&self) -> u32 {
        self.pins_needed.saturating_sub(self.allocated_pins())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomCalculationResult {
    pub section_id: String,
    pub section_name: String,
    pub components: Vec<ComponentAllocation>,
    /// Estimated boards to add, assuming standard-size boards
    pub new_boards_needed: u32,
    /// One channel per unmet pin on the 27V bus
    pub mosfet_channels_needed: u32,
    pub mosfet_channels_available: u32,
    /// Pins that could not be placed on any existing board
    #[serde(default)]
    pub unallocated_pins: u32,
}

impl BomCalculationResult {
    /// Pins the plan would assign if applied
    pub fn total_pins_planned(&self) -> u32 {
        self.components.iter().map(|c| c.allocated_pins()).sum()
    }

    /// MOSFET channels missing for the 27V loads of this section
    pub fn mosfet_shortfall(&self) -> u32 {
        self.mosfet_channels_needed
            .saturating_sub(self.mosfet_channels_available)
    }

    /// Whether the existing boards and drivers cover the whole section
    pub fn is_satisfied(&self) -> bool {
        self.new_boards_needed == 0 && self.mosfet_shortfall() == 0
    }
}

/// Board capacities for the duration of one calculation.
///
/// Holds the boards in search order; claimed pins stay claimed until the
/// context is dropped.
#[derive(Debug, Clone)]
pub struct AllocationContext {
    boards: Vec<BoardCapacity>,
}

impl AllocationContext {
    pub fn new(boards: Vec<BoardCapacity>) -> Self {
        Self { boards }
    }

    /// Build capacities for every board in the snapshot, ordered by name
    pub fn from_snapshot(data: &InventoryData) -> Self {
        let boards = data
            .boards_by_name()
            .into_iter()
            .map(|board| BoardCapacity::from_snapshot(board, &data.pin_assignments))
            .collect();
        Self::new(boards)
    }

    pub fn boards(&self) -> &[BoardCapacity] {
        &self.boards
    }

    /// Claim pins for one request, spilling over to later boards as each one
    /// runs out. Returns one allocation per board that contributed.
    pub fn allocate(&mut self, request: &AllocationRequest) -> Vec<PinAllocation> {
        let mut allocations = Vec::new();
        let mut remaining = request.pins_needed as usize;

        for board in self.boards.iter_mut() {
            if remaining == 0 {
                break;
            }

            let pins = board.free_pins(request.pin_type, request.pwm_required, remaining);
            if pins.is_empty() {
                continue;
            }

            board.claim(&pins, request.pwm_required);
            remaining -= pins.len();
            log::debug!(
                "Allocated {} pin(s) on {} to {}",
                pins.len(),
                board.board_name,
                request.component_name
            );

            allocations.push(PinAllocation {
                board_id: board.board_id.clone(),
                board_name: board.board_name.clone(),
                pins,
            });
        }

        allocations
    }
}

/// Calculate the pin plan for a panel section from the current inventory.
pub fn calculate<I: Inventory>(
    inventory: &I,
    section_id: &str,
) -> Result<BomCalculationResult, BomError> {
    validate_section_id(section_id)?;
    let snapshot = inventory.snapshot()?;
    calculate_from_snapshot(&snapshot, section_id)
}

/// Calculate the pin plan for a panel section from an inventory snapshot.
pub fn calculate_from_snapshot(
    data: &InventoryData,
    section_id: &str,
) -> Result<BomCalculationResult, BomError> {
    validate_section_id(section_id)?;
    let section = data
        .find_section(section_id)
        .ok_or_else(|| BomError::not_found("section", section_id))?;

    let mut requests = Vec::new();
    for instance in data.components_in_section(&section.id) {
        let component_type = data
            .find_component_type(&instance.component_type_id)
            .ok_or_else(|| BomError::not_found("component type", &instance.component_type_id))?;
        let assigned = data.assigned_pin_count(&instance.id);
        requests.push(AllocationRequest::new(instance, component_type, assigned));
    }

    let mut context = AllocationContext::from_snapshot(data);
    let mut components = Vec::with_capacity(requests.len());
    let mut new_boards_needed = 0;
    let mut mosfet_channels_needed = 0;
    let mut unallocated_pins = 0;

    for request in requests {
        if request.pins_needed == 0 {
            components.push(ComponentAllocation::new(request, Vec::new()));
            continue;
        }

        if request.power_rail.is_direct() {
            mosfet_channels_needed += request.pins_needed;
        }

        let allocations = context.allocate(&request);
        let component = ComponentAllocation::new(request, allocations);

        let unmet = component.unmet_pins();
        if unmet > 0 {
            let per_board = component.pin_type.new_board_capacity();
            new_boards_needed += unmet.div_ceil(per_board);
            unallocated_pins += unmet;
            log::warn!(
                "{} still needs {unmet} {} pin(s) after searching {} board(s)",
                component.component_name,
                component.pin_type,
                context.boards().len()
            );
        }

        components.push(component);
    }

    let mosfet_channels_available = data.mosfet_boards.iter().map(|m| m.free_channels()).sum();

    let result = BomCalculationResult {
        section_id: section.id.clone(),
        section_name: section.name.clone(),
        components,
        new_boards_needed,
        mosfet_channels_needed,
        mosfet_channels_available,
        unallocated_pins,
    };

    log::info!(
        "BOM for {}: {} pin(s) planned, {} new board(s), {}/{} MOSFET channel(s)",
        result.section_name,
        result.total_pins_planned(),
        result.new_boards_needed,
        result.mosfet_channels_needed,
        result.mosfet_channels_available
    );

    Ok(result)
}

fn validate_section_id(section_id: &str) -> Result<(), BomError> {
    if section_id.trim().is_empty() {
        return Err(BomError::Validation("section id is required".to_string()));
    }
    Ok(())
}
