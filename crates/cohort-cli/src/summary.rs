//! Terminal tables for command results.

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use cohort_model::StepDelta;

use crate::commands::{FilterOutcome, FlattenOutcome};

pub fn print_filter_summary(outcome: &FilterOutcome) {
    println!("Prediction times: {}", outcome.bundle.n_rows());
    if let Some(dir) = &outcome.saved_to {
        println!("Output: {}", dir.display());
    }
    println!("{}", flow_chart_table(&outcome.bundle.filter_steps));
}

pub fn print_flatten_summary(outcome: &FlattenOutcome) {
    println!("Output: {}", outcome.output.display());
    let mut table = Table::new();
    table.set_header(vec![header_cell("Column"), header_cell("Nulls")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (name, nulls) in &outcome.columns {
        table.add_row(vec![Cell::new(name), count_cell(*nulls)]);
    }
    println!("{table}");
    println!("Rows: {}", outcome.rows);
}

/// One row per step plus the final population.
pub fn flow_chart_table(steps: &[StepDelta]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Step"),
        header_cell("Rows before"),
        header_cell("Rows after"),
        header_cell("Dropped"),
        header_cell("Entities before"),
        header_cell("Entities after"),
        header_cell("Dropped"),
    ]);
    apply_summary_table_style(&mut table);
    for index in [0, 2, 3, 4, 5, 6, 7] {
        align_column(&mut table, index, CellAlignment::Right);
    }

    for step in steps {
        let name = if step.is_empty_result() {
            Cell::new(&step.step_name)
                .fg(Color::Yellow)
                .add_attribute(Attribute::Bold)
        } else {
            Cell::new(&step.step_name)
        };
        table.add_row(vec![
            dim_cell(step.step_index),
            name,
            Cell::new(step.n_rows_before),
            Cell::new(step.n_rows_after),
            count_cell(step.n_dropped()),
            Cell::new(step.n_entities_before),
            Cell::new(step.n_entities_after),
            count_cell(step.n_entities_dropped()),
        ]);
    }
    if let Some(last) = steps.last() {
        table.add_row(vec![
            dim_cell("-"),
            Cell::new("FINAL")
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
            dim_cell("-"),
            Cell::new(last.n_rows_after).add_attribute(Attribute::Bold),
            dim_cell("-"),
            dim_cell("-"),
            Cell::new(last.n_entities_after).add_attribute(Attribute::Bold),
            dim_cell("-"),
        ]);
    }
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize) -> Cell {
    if count > 0 {
        Cell::new(count).fg(Color::Red).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
