use std::io::{self, Write};

use colored::Colorize;
use comfy_table::{Cell, Color, Table};
use itertools::Itertools;

use crate::{ApplyResult, BomCalculationResult, Rail};

impl BomCalculationResult {
    /// Write the plan as a formatted table followed by a capacity summary
    pub fn write_table<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(comfy_table::ContentArrangement::DynamicFullWidth);

        for component in &self.components {
            let unmet = component.unmet_pins();
            let fully_pinned = component.pins_needed == 0;

            let pins = component
                .allocations
                .iter()
                .map(|a| format!("{}: {}", a.board_name, a.pins.iter().join(",")))
                .join("\n");

            let kind = if component.pwm_required {
                format!("{} (pwm)", component.pin_type)
            } else {
                component.pin_type.to_string()
            };

            let name_cell = if fully_pinned {
                Cell::new(&component.component_name).fg(Color::DarkGrey)
            } else if unmet > 0 {
                Cell::new(&component.component_name).fg(Color::Red)
            } else {
                Cell::new(&component.component_name)
            };

            let rail_cell = if component.power_rail == Rail::TwentySevenV {
                Cell::new(component.power_rail).fg(Color::Yellow)
            } else {
                Cell::new(component.power_rail)
            };

            let missing_cell = if unmet > 0 {
                Cell::new(unmet).fg(Color::Red)
            } else {
                Cell::new("")
            };

            table.add_row(vec![
                name_cell,
                Cell::new(&component.component_type),
                Cell::new(kind),
                rail_cell,
                Cell::new(component.pins_needed),
                Cell::new(pins),
                missing_cell,
            ]);
        }

        table.set_header(vec![
            "Component",
            "Type",
            "Pins",
            "Rail",
            "Needed",
            "Allocation",
            "Missing",
        ]);

        writeln!(writer, "{} ({})", self.section_name.bold(), self.section_id)?;
        writeln!(writer, "{table}")?;

        writeln!(writer, "Pins planned: {}", self.total_pins_planned())?;
        let boards = format!("New boards needed: {}", self.new_boards_needed);
        if self.new_boards_needed > 0 {
            writeln!(writer, "{}", boards.red())?;
        } else {
            writeln!(writer, "{boards}")?;
        }

        let mosfet = format!(
            "MOSFET channels: {} needed, {} available",
            self.mosfet_channels_needed, self.mosfet_channels_available
        );
        if self.mosfet_shortfall() > 0 {
            writeln!(writer, "{}", mosfet.red())?;
        } else {
            writeln!(writer, "{mosfet}")?;
        }

        Ok(())
    }
}

impl ApplyResult {
    /// Write the created assignments as a formatted table
    pub fn write_table<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(comfy_table::ContentArrangement::DynamicFullWidth);

        for assignment in &self.assignments {
            table.add_row(vec![
                assignment.component_name.clone(),
                assignment.board_name.clone(),
                assignment.pin_number.to_string(),
            ]);
        }
        table.set_header(vec!["Component", "Board", "Pin"]);

        writeln!(writer, "{} ({})", self.section_name.bold(), self.section_id)?;
        writeln!(writer, "{table}")?;
        writeln!(
            writer,
            "{}",
            format!("Created {} pin assignment(s)", self.total_pins_created).green()
        )?;
        Ok(())
    }
}
