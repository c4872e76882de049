//! In-memory pin inventory of a single microcontroller board.

use std::collections::BTreeSet;

use crate::{Board, PinAssignment, PinId, PinMode, PinType};

/// Free/used view of one board's pins during a single allocation run.
///
/// Built from a persistence snapshot and then mutated as pins are claimed;
/// the snapshot stays the source of truth.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardCapacity {
    pub board_id: String,
    pub board_name: String,
    pub digital_pin_count: u32,
    pub analog_pin_count: u32,
    pub pwm_pins: Vec<u32>,
    used_digital: BTreeSet<PinId>,
    used_analog: BTreeSet<PinId>,
    used_pwm: BTreeSet<PinId>,
}

impl BoardCapacity {
    /// Empty capacity for `board`.
    ///
    /// PWM pins outside the digital range are dropped, as are repeats; the
    /// remaining pins keep their declared order.
    pub fn new(board: &Board) -> Self {
        let mut pwm_pins: Vec<u32> = Vec::with_capacity(board.pwm_pins.len());
        for &n in &board.pwm_pins {
            if n >= board.digital_pin_count {
                log::warn!(
                    "Ignoring PWM pin D{n} outside the pin range of board {}",
                    board.name
                );
            } else if !pwm_pins.contains(&n) {
                pwm_pins.push(n);
            }
        }

        Self {
            board_id: board.id.clone(),
            board_name: board.name.clone(),
            digital_pin_count: board.digital_pin_count,
            analog_pin_count: board.analog_pin_count,
            pwm_pins,
            used_digital: BTreeSet::new(),
            used_analog: BTreeSet::new(),
            used_pwm: BTreeSet::new(),
        }
    }

    /// Build a board's capacity from its pin assignments in the snapshot.
    ///
    /// Assignments for other boards are skipped. Pins beyond the declared
    /// counts are ignored.
    pub fn from_snapshot<'a>(
        board: &Board,
        assignments: impl IntoIterator<Item = &'a PinAssignment>,
    ) -> Self {
        let mut capacity = Self::new(board);

        for assignment in assignments {
            if assignment.board_id != board.id {
                continue;
            }
            let pin = assignment.pin_number;
            if !board.has_pin(pin) {
                log::warn!(
                    "Ignoring assignment {} for {pin} outside the pin range of board {}",
                    assignment.id,
                    board.name
                );
                continue;
            }
            capacity.mark_used(pin, assignment.pin_mode == PinMode::Pwm);
        }

        capacity
    }

    /// Return up to `count` free pins in scan order.
    ///
    /// PWM requests walk the declared PWM pin list; everything else walks
    /// `D0..` or `A0..` in ascending order. Plain digital requests may take
    /// PWM-capable pins. A short result means the board ran out.
    pub fn free_pins(&self, pin_type: PinType, pwm_required: bool, count: usize) -> Vec<PinId> {
        if count == 0 {
            return Vec::new();
        }

        if pwm_required {
            return self
                .pwm_pins
                .iter()
                .map(|&n| PinId::Digital(n))
                .filter(|pin| !self.used_digital.contains(pin) && !self.used_pwm.contains(pin))
                .take(count)
                .collect();
        }

        match pin_type {
            PinType::Analog => (0..self.analog_pin_count)
                .map(PinId::Analog)
                .filter(|pin| !self.used_analog.contains(pin))
                .take(count)
                .collect(),
            PinType::Digital => (0..self.digital_pin_count)
                .map(PinId::Digital)
                .filter(|pin| !self.used_digital.contains(pin))
                .take(count)
                .collect(),
        }
    }

    /// Mark pins as taken so later requests in the same run skip them.
    pub fn claim(&mut self, pins: &[PinId], pwm: bool) {
        for &pin in pins {
            self.mark_used(pin, pwm);
        }
    }

    pub fn is_used(&self, pin: PinId) -> bool {
        match pin {
            PinId::Digital(_) => self.used_digital.contains(&pin) || self.used_pwm.contains(&pin),
            PinId::Analog(_) => self.used_analog.contains(&pin),
        }
    }

    /// Number of free pins of the given kind
    pub fn free_count(&self, pin_type: PinType, pwm_required: bool) -> usize {
        let total = if pwm_required {
            self.pwm_pins.len()
        } else {
            match pin_type {
                PinType::Digital => self.digital_pin_count as usize,
                PinType::Analog => self.analog_pin_count as usize,
            }
        };
        self.free_pins(pin_type, pwm_required, total).len()
    }

    fn mark_used(&mut self, pin: PinId, pwm: bool) {
        match pin {
            PinId::Digital(_) => {
                self.used_digital.insert(pin);
                if pwm {
                    self.used_pwm.insert(pin);
                }
            }
            PinId::Analog(_) => {
                self.used_analog.insert(pin);
            }
        }
    }
}
