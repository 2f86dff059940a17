use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use regio_cli::types::RunResult;
use regio_model::{Diagnostic, Severity};
use regio_report::{MeasureSummary, RunReport};

pub fn print_summary(result: &RunResult) {
    let report = &result.report;
    println!("Anchor date: {}", report.anchor_date);
    println!("Input fingerprint: {}", report.input_fingerprint);
    if result.dry_run {
        println!("Output: {} (dry run, nothing written)", result.output_dir.display());
    } else {
        println!("Output: {}", result.output_dir.display());
    }
    if let Some(path) = &result.run_report {
        println!("Run report: {}", path.display());
    }
    println!(
        "Events: {} in registry, {} suppressed, {} injected, {} replayed",
        report.events.registry,
        report.events.suppressed,
        report.events.injected,
        report.events.replayed
    );
    println!(
        "Mapping: {} observed keys, {} mapped to another code, {} anchor codes",
        report.replay.observed_keys, report.replay.changed_keys, report.replay.anchor_codes
    );
    println!("{}", measure_table(report));
    let warnings: Vec<&Diagnostic> = result
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.is_warning())
        .collect();
    if !warnings.is_empty() {
        println!();
        println!("Warnings:");
        println!("{}", diagnostic_table(&warnings));
    }
}

pub fn measure_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Measure"),
        header_cell("Input rows"),
        header_cell("Dropped"),
        header_cell("Output rows"),
        header_cell("Coverage"),
        header_cell("Anchor codes"),
    ]);
    apply_summary_table_style(&mut table);
    for column in 1..=3 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    let mut total_input = 0usize;
    let mut total_output = 0usize;
    for summary in &report.measures {
        total_input += summary.input_rows;
        total_output += summary.output_rows;
        table.add_row(vec![
            Cell::new(&summary.name)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(summary.input_rows),
            count_cell(
                summary.dropped_filtered + summary.dropped_zero_total,
                Color::Yellow,
            ),
            Cell::new(summary.output_rows),
            coverage_cell(summary),
            anchor_cell(summary),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(total_input).add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(total_output).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
    ]);
    table
}

pub fn diagnostic_table(diagnostics: &[&Diagnostic]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Severity"),
        header_cell("Kind"),
        header_cell("Code"),
        header_cell("Period"),
        header_cell("Message"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Center);
    for diagnostic in diagnostics {
        table.add_row(vec![
            severity_cell(diagnostic.severity),
            Cell::new(format!("{:?}", diagnostic.kind)),
            optional_cell(diagnostic.code.as_ref()),
            optional_cell(diagnostic.period.as_ref()),
            Cell::new(&diagnostic.message),
        ]);
    }
    table
}

fn coverage_cell(summary: &MeasureSummary) -> Cell {
    let Some(coverage) = &summary.coverage else {
        return dim_cell("-");
    };
    let mismatches = coverage.mismatches();
    let worst = coverage
        .worst_relative()
        .map(|relative| format!(" (max {:.3}%)", relative * 100.0))
        .unwrap_or_default();
    if mismatches == 0 {
        Cell::new(format!("ok{worst}")).fg(Color::Green)
    } else {
        Cell::new(format!("{mismatches} off{worst}"))
            .fg(Color::Red)
            .add_attribute(Attribute::Bold)
    }
}

fn anchor_cell(summary: &MeasureSummary) -> Cell {
    let Some(coverage) = &summary.anchor_coverage else {
        return dim_cell("-");
    };
    let text = format!("{:.1}%", coverage.share * 100.0);
    if coverage.unknown_codes.is_empty() {
        Cell::new(text).fg(Color::Green)
    } else {
        Cell::new(format!("{text}, {} unknown", coverage.unknown_codes.len())).fg(Color::Yellow)
    }
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
        .set_width(120);
}

pub fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn severity_cell(severity: Severity) -> Cell {
    match severity {
        Severity::Warning => Cell::new("WARN").fg(Color::Yellow),
        Severity::Info => dim_cell("INFO"),
    }
}

pub fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

pub fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn optional_cell<T: ToString>(value: Option<&T>) -> Cell {
    match value {
        Some(value) => Cell::new(value.to_string()),
        None => dim_cell("-"),
    }
}

pub fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
