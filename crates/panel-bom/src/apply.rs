//! Commit a calculated BOM plan as planned pin assignments.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::allocate::BomCalculationResult;
use crate::inventory::{Inventory, InventoryTx};
use crate::{BomError, PinAssignment, PinId, PinMode, WiringStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedAssignment {
    pub component_instance_id: String,
    pub component_name: String,
    pub board_id: String,
    pub board_name: String,
    pub pin_number: PinId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub section_id: String,
    pub section_name: String,
    pub total_pins_created: usize,
    pub assignments: Vec<CreatedAssignment>,
}

/// Write every pin of `plan` as a planned assignment, all or nothing.
///
/// The plan may be stale: each section, component, board and pin slot is
/// re-checked inside the transaction. A pin taken since the plan was
/// calculated fails the whole call with [`BomError::Conflict`] and nothing is
/// written; the caller is expected to recalculate.
pub fn apply<I: Inventory>(
    inventory: &I,
    plan: &BomCalculationResult,
) -> Result<ApplyResult, BomError> {
    if plan.section_id.trim().is_empty() {
        return Err(BomError::Validation("section id is required".to_string()));
    }

    let result = inventory.transaction(|tx| apply_in(tx, plan))?;

    log::info!(
        "Applied BOM for {}: created {} pin assignment(s)",
        result.section_name,
        result.total_pins_created
    );
    Ok(result)
}

fn apply_in(
    tx: &mut dyn InventoryTx,
    plan: &BomCalculationResult,
) -> Result<ApplyResult, BomError> {
    let section = tx
        .section(&plan.section_id)?
        .ok_or_else(|| BomError::not_found("section", &plan.section_id))?;

    let mut assignments = Vec::new();

    for component in &plan.components {
        if component.pins_needed == 0 || component.allocations.is_empty() {
            continue;
        }

        let instance = tx
            .component(&component.component_instance_id)?
            .ok_or_else(|| BomError::not_found("component", &component.component_instance_id))?;
        if instance.panel_section_id != section.id {
            return Err(BomError::Validation(format!(
                "component {} does not belong to section {}",
                instance.name, section.name
            )));
        }

        let pin_mode = if component.pwm_required {
            PinMode::Pwm
        } else {
            PinMode::Output
        };

        for allocation in &component.allocations {
            let board = tx
                .board(&allocation.board_id)?
                .ok_or_else(|| BomError::not_found("board", &allocation.board_id))?;

            for &pin in &allocation.pins {
                if !board.has_pin(pin) {
                    return Err(BomError::Validation(format!(
                        "pin {pin} does not exist on board {}",
                        board.name
                    )));
                }

                if let Some(existing) = tx.pin_assignment_at(&board.id, pin)? {
                    log::debug!(
                        "Pin {pin} on {} already taken by assignment {}",
                        board.name,
                        existing.id
                    );
                    return Err(BomError::Conflict {
                        board: board.name.clone(),
                        pin,
                    });
                }

                tx.create_pin_assignment(PinAssignment {
                    id: Uuid::new_v4().to_string(),
                    board_id: board.id.clone(),
                    pin_number: pin,
                    pin_mode,
                    component_instance_id: Some(instance.id.clone()),
                    wiring_status: WiringStatus::Planned,
                    description: Some(format!(
                        "{} ({}) - auto-allocated",
                        instance.name, component.component_type
                    )),
                    created_at: Utc::now(),
                })?;

                assignments.push(CreatedAssignment {
                    component_instance_id: instance.id.clone(),
                    component_name: instance.name.clone(),
                    board_id: board.id.clone(),
                    board_name: board.name.clone(),
                    pin_number: pin,
                });
            }
        }
    }

    Ok(ApplyResult {
        section_id: section.id,
        section_name: section.name,
        total_pins_created: assignments.len(),
        assignments,
    })
}
