use std::cmp::Ordering;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use einv_model::{CoverageStatus, Exception, Severity};

use crate::types::{RunResult, SearchMatch, TraceResult};

pub fn print_run_summary(result: &RunResult) {
    println!("Batch: {}", result.data_dir.display());
    if let Some(path) = &result.report_path {
        println!("Findings report: {}", path.display());
    }
    println!(
        "Checks: {} catalog, {} custom",
        result.checks_run, result.custom_checks_run
    );

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Severity"),
        header_cell("Exceptions"),
        header_cell("SLA (h)"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    for severity in [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ] {
        let count = result.findings.count_at(severity);
        table.add_row(vec![
            severity_cell(severity),
            count_cell(count, severity_color(severity)),
            dim_cell(severity.sla_hours()),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(result.findings.exceptions.len()).add_attribute(Attribute::Bold),
        dim_cell("-"),
    ]);
    println!("{table}");

    print_exception_table(&result.findings.exceptions);
    print_flag_table(result);
}

fn print_exception_table(exceptions: &[Exception]) {
    if exceptions.is_empty() {
        return;
    }
    let mut ordered: Vec<&Exception> = exceptions.iter().collect();
    ordered.sort_by(|a, b| {
        let severity = a.severity.sort_order().cmp(&b.severity.sort_order());
        if severity != Ordering::Equal {
            return severity;
        }
        let check = a.check_id.cmp(&b.check_id);
        if check != Ordering::Equal {
            return check;
        }
        a.id.cmp(&b.id)
    });
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Check"),
        header_cell("Severity"),
        header_cell("Invoice"),
        header_cell("Field"),
        header_cell("Observed"),
        header_cell("Expected"),
        header_cell("Message"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    for exception in ordered {
        table.add_row(vec![
            Cell::new(exception.check_id.clone())
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            severity_cell(exception.severity),
            text_cell(exception.invoice_number.as_deref()),
            text_cell(exception.field.as_deref()),
            text_cell(exception.observed.as_deref()),
            text_cell(exception.expected.as_deref()),
            Cell::new(exception.message.clone()),
        ]);
    }
    println!();
    println!("Exceptions:");
    println!("{table}");
}

fn print_flag_table(result: &RunResult) {
    let flags = &result.findings.flags;
    if flags.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Check"),
        header_cell("Kind"),
        header_cell("Confidence"),
        header_cell("Invoice"),
        header_cell("Matched"),
        header_cell("Message"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for flag in flags {
        table.add_row(vec![
            Cell::new(flag.check_id.clone())
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(flag.kind.as_str()),
            confidence_cell(flag.confidence),
            text_cell(flag.invoice_number.as_deref()),
            text_cell(flag.matched_invoice_number.as_deref()),
            Cell::new(flag.message.clone()),
        ]);
    }
    println!();
    println!("Investigation flags:");
    println!("{table}");
}

pub fn print_trace_summary(result: &TraceResult, gaps_only: bool) {
    if !result.issues.is_empty() {
        println!("Catalog consistency:");
        for issue in &result.issues {
            let level = match issue.level {
                einv_trace::ConsistencyLevel::Error => "error",
                einv_trace::ConsistencyLevel::Warning => "warning",
            };
            println!("- [{level}] {}", issue.message);
        }
        println!();
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Requirement"),
        header_cell("Business Term"),
        header_cell("Mandatory"),
        header_cell("Dataset"),
        header_cell("In Template"),
        header_cell("Pop %"),
        header_cell("Rules"),
        header_cell("Controls"),
        header_cell("Status"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Center);
    align_column(&mut table, 4, CellAlignment::Center);
    align_column(&mut table, 5, CellAlignment::Right);
    align_column(&mut table, 6, CellAlignment::Right);
    align_column(&mut table, 7, CellAlignment::Right);
    for row in &result.rows {
        if gaps_only && row.coverage_status == CoverageStatus::Covered {
            continue;
        }
        table.add_row(vec![
            Cell::new(row.requirement_id.clone())
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(row.business_term.clone()),
            flag_cell(row.mandatory),
            Cell::new(row.dataset.clone()),
            flag_cell(row.in_template),
            population_cell(row.population_pct),
            Cell::new(row.rule_count),
            Cell::new(row.control_count),
            status_cell(row.coverage_status),
        ]);
    }
    println!("{table}");

    let summary = &result.summary;
    println!(
        "Coverage: {covered}/{total} covered, {no_control} without controls, \
         {no_rule} without rules, {not_in_template} not in template",
        covered = summary.covered,
        total = summary.total,
        no_control = summary.no_control,
        no_rule = summary.no_rule,
        not_in_template = summary.not_in_template,
    );
    if summary.mandatory_not_in_template > 0 || summary.mandatory_no_rule > 0 {
        println!(
            "Mandatory gaps: {not_in_template} not in template, {no_rule} without rules, \
             {no_control} without controls",
            not_in_template = summary.mandatory_not_in_template,
            no_rule = summary.mandatory_no_rule,
            no_control = summary.mandatory_no_control,
        );
    }
}

pub fn print_search_matches(query: &str, matches: &[SearchMatch]) {
    if matches.is_empty() {
        println!("No matches for \"{query}\"");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Score"),
        header_cell("Invoice"),
        header_cell("Vendor"),
        header_cell("Seller TRN"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for m in matches {
        table.add_row(vec![
            Cell::new(format!("{:.0}%", m.score * 100.0)).add_attribute(Attribute::Bold),
            Cell::new(m.invoice_number.clone()),
            Cell::new(m.vendor_name.clone()),
            Cell::new(m.seller_trn.clone()),
        ]);
    }
    println!("{table}");
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

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(200);
    if table.column_count() >= 6 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Fixed(12)),
            ColumnConstraint::UpperBoundary(Width::Fixed(10)),
            ColumnConstraint::UpperBoundary(Width::Fixed(14)),
            ColumnConstraint::UpperBoundary(Width::Fixed(18)),
            ColumnConstraint::UpperBoundary(Width::Fixed(18)),
            ColumnConstraint::UpperBoundary(Width::Percentage(40)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn severity_cell(severity: Severity) -> Cell {
    let cell = Cell::new(severity.as_str().to_uppercase()).fg(severity_color(severity));
    match severity {
        Severity::Critical => cell.add_attribute(Attribute::Bold),
        _ => cell,
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Critical | Severity::High => Color::Red,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Grey,
    }
}

fn status_cell(status: CoverageStatus) -> Cell {
    match status {
        CoverageStatus::Covered => Cell::new(status.as_str()).fg(Color::Green),
        CoverageStatus::NoControl => Cell::new(status.as_str()).fg(Color::Yellow),
        CoverageStatus::NoRule | CoverageStatus::NotInTemplate => Cell::new(status.as_str())
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
    }
}

fn confidence_cell(confidence: u8) -> Cell {
    if confidence >= 90 {
        Cell::new(confidence)
            .fg(Color::Red)
            .add_attribute(Attribute::Bold)
    } else {
        Cell::new(confidence).fg(Color::Yellow)
    }
}

fn population_cell(pct: Option<f64>) -> Cell {
    match pct {
        Some(value) => Cell::new(format!("{value:.1}")),
        None => dim_cell("-"),
    }
}

fn flag_cell(value: bool) -> Cell {
    if value {
        Cell::new("✓")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold)
    } else {
        dim_cell("-")
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn text_cell(value: Option<&str>) -> Cell {
    match value {
        Some(text) if !text.is_empty() => Cell::new(text),
        _ => dim_cell("-"),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
