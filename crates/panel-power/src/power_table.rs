use std::io::{self, Write};

use colored::Colorize;
use comfy_table::{Cell, Color, Table};
use itertools::Itertools;

use crate::{PowerBudget, Rail, UtilizationLevel};

impl PowerBudget {
    /// Write per-rail demand, the section breakdown and the utilization summary
    pub fn write_table<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut rails = Table::new();
        rails.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        rails.set_content_arrangement(comfy_table::ContentArrangement::DynamicFullWidth);
        rails.set_header(vec!["Rail", "Current (mA)", "Rail W", "PSU W"]);

        for detail in &self.psu_demand.per_rail {
            let rail_cell = if detail.rail.is_direct() {
                Cell::new(detail.rail).fg(Color::Yellow)
            } else {
                Cell::new(detail.rail)
            };
            rails.add_row(vec![
                rail_cell,
                Cell::new(format!("{:.1}", detail.current_ma)),
                Cell::new(format!("{:.2}", detail.watts)),
                Cell::new(format!("{:.2}", detail.psu_watts)),
            ]);
        }
        rails.add_row(vec![
            Cell::new("infrastructure").fg(Color::DarkGrey),
            Cell::new(""),
            Cell::new(""),
            Cell::new(format!("{:.2}", self.psu_demand.infrastructure_watts)),
        ]);

        writeln!(writer, "{} ({})", self.scenario_label.bold(), self.scenario)?;
        writeln!(writer, "{rails}")?;

        if !self.sections.is_empty() {
            let mut sections = Table::new();
            sections.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
            sections.set_content_arrangement(comfy_table::ContentArrangement::DynamicFullWidth);
            sections.set_header(vec!["Section", "Current (mA)"]);

            for section in &self.sections {
                let currents = section
                    .rail_currents
                    .iter()
                    .filter(|(rail, ma)| **rail != Rail::None && **ma > 0.0)
                    .map(|(rail, ma)| format!("{rail}: {ma:.1}"))
                    .join("\n");
                sections.add_row(vec![Cell::new(&section.section_name), Cell::new(currents)]);
            }
            writeln!(writer, "{sections}")?;
        }

        let summary = match self.utilization {
            Some(ratio) => format!(
                "PSU demand: {:.2} W of {:.0} W ({:.0}%, {})",
                self.psu_demand.total_watts,
                self.capacity_watts,
                ratio * 100.0,
                self.utilization_level
            ),
            None => format!(
                "PSU demand: {:.2} W, no supply capacity configured ({})",
                self.psu_demand.total_watts,
                self.utilization_level
            ),
        };
        let summary = match self.utilization_level {
            UtilizationLevel::Green => summary.green(),
            UtilizationLevel::Amber => summary.yellow(),
            UtilizationLevel::Red => summary.red(),
        };
        writeln!(writer, "{summary}")?;

        Ok(())
    }
}
