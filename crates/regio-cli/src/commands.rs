use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};
use tracing::info_span;

use regio_cli::pipeline::{harmonize, load_run_config, prepare_events};
use regio_cli::types::{RunOptions, RunResult};
use regio_core::ChangeShape;
use regio_ingest::read_code_list;
use regio_model::{OverrideKind, RegionCode};
use regio_report::write_crosswalk_file;

use crate::cli::{ChangesArgs, ClosureArgs, CrosswalkArgs, HarmonizeArgs};
use crate::summary::{align_column, apply_table_style, count_cell, dim_cell, header_cell};

pub fn run_harmonize(args: &HarmonizeArgs) -> Result<RunResult> {
    let options = RunOptions {
        config_path: args.config.path.clone(),
        anchor_date: args.anchor_date,
        scope: args.scope.map(Into::into),
        output_dir: args.output_dir.clone(),
        dry_run: args.dry_run,
    };
    harmonize(&options)
}

pub fn run_closure(args: &ClosureArgs) -> Result<()> {
    let config = load_run_config(&RunOptions::new(&args.config.path))?;
    let events = prepare_events(&config)?;
    let seeds = args
        .codes
        .iter()
        .map(|raw| {
            config
                .codes
                .normalize(raw)
                .with_context(|| format!("parse code {raw:?}"))
        })
        .collect::<Result<BTreeSet<RegionCode>>>()?;
    let graph = if args.raw {
        events.raw_graph()
    } else {
        events.overridden_graph()
    };
    let closure = graph.closure(seeds.iter().cloned());

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Code"),
        header_cell("Seed"),
        header_cell("Successors"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    for code in &closure {
        let successors: Vec<String> = graph
            .successors(code)
            .iter()
            .map(|(date, to)| format!("{to} ({date})"))
            .collect();
        let code_cell = if graph.contains(code) {
            Cell::new(code)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold)
        } else {
            dim_cell(code)
        };
        table.add_row(vec![
            code_cell,
            if seeds.contains(code) {
                Cell::new("✓").fg(Color::Green)
            } else {
                dim_cell("-")
            },
            if successors.is_empty() {
                dim_cell("-")
            } else {
                Cell::new(successors.join(", "))
            },
        ]);
    }
    let source = if args.raw { "raw registry" } else { "overridden events" };
    println!("Closure over the {source}: {} codes", closure.len());
    println!("{table}");
    Ok(())
}

pub fn run_changes(args: &ChangesArgs) -> Result<()> {
    let config = load_run_config(&RunOptions::new(&args.config.path))?;
    let events = prepare_events(&config)?;

    println!(
        "Registry: {} events on {} dates ({} duplicates removed)",
        events.store.len(),
        events.store.dates().len(),
        events.store.duplicates_removed()
    );
    println!("{}", shape_table(&events.store.change_shapes()));

    if !events.outcome.applications().is_empty() {
        let mut table = Table::new();
        table.set_header(vec![
            header_cell("Override"),
            header_cell("Kind"),
            header_cell("Edge"),
            header_cell("Removed"),
            header_cell("Added"),
            header_cell("Justification"),
        ]);
        apply_table_style(&mut table);
        align_column(&mut table, 3, CellAlignment::Right);
        align_column(&mut table, 4, CellAlignment::Right);
        for application in events.outcome.applications() {
            let kind = match application.kind {
                OverrideKind::Suppress => Cell::new("suppress").fg(Color::Yellow),
                OverrideKind::Inject => Cell::new("inject").fg(Color::Green),
            };
            let removed = if application.kind == OverrideKind::Suppress && application.removed == 0
            {
                Cell::new(0).fg(Color::Red).add_attribute(Attribute::Bold)
            } else {
                count_cell(application.removed, Color::Yellow)
            };
            table.add_row(vec![
                Cell::new(&application.name),
                kind,
                Cell::new(format!("{} -> {}", application.from, application.to)),
                removed,
                count_cell(application.added, Color::Green),
                Cell::new(&application.justification),
            ]);
        }
        println!();
        println!("Overrides:");
        println!("{table}");
    }

    if !events.diagnostics.is_empty() {
        println!();
        for diagnostic in &events.diagnostics {
            println!("- {}", diagnostic.message);
        }
    }
    Ok(())
}

fn shape_table(shapes: &[ChangeShape]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Date"),
        header_cell("Events"),
        header_cell("Splits"),
        header_cell("Merges"),
    ]);
    apply_table_style(&mut table);
    for column in 1..=3 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for shape in shapes {
        table.add_row(vec![
            Cell::new(shape.date),
            Cell::new(shape.events),
            count_cell(shape.splits(), Color::Yellow),
            count_cell(shape.merges(), Color::Yellow),
        ]);
    }
    table
}

pub fn run_crosswalk(args: &CrosswalkArgs) -> Result<()> {
    let mut options = RunOptions::new(&args.config.path);
    options.anchor_date = args.anchor_date;
    let config = load_run_config(&options)?;
    let valid_on = args.date.unwrap_or_else(|| Utc::now().date_naive());
    let span = info_span!("crosswalk", %valid_on, anchor_date = %config.anchor_date);
    let _guard = span.enter();

    let events = prepare_events(&config)?;
    let codes = read_code_list(&args.codes, &config.codes)
        .with_context(|| format!("read code list {}", args.codes.display()))?;
    let replayer = events.replayer(&config)?;
    let (crosswalk, report) = replayer
        .crosswalk(&codes, valid_on)
        .context("build crosswalk")?;

    if let Some(path) = &args.output {
        let path = write_crosswalk_file(path, &crosswalk).context("write crosswalk")?;
        println!("Crosswalk: {}", path.display());
    } else {
        let mut table = Table::new();
        table.set_header(vec![header_cell("Code"), header_cell("Anchor code")]);
        apply_table_style(&mut table);
        for (code, anchor) in crosswalk.iter() {
            let anchor_cell = if code == anchor {
                dim_cell(anchor)
            } else {
                Cell::new(anchor).fg(Color::Blue)
            };
            table.add_row(vec![Cell::new(code), anchor_cell]);
        }
        println!("{table}");
    }
    println!(
        "{} codes valid on {valid_on} mapped to {} ({} changed)",
        crosswalk.len(),
        config.anchor_date,
        report.changed_keys
    );
    for (anchor, sources) in crosswalk.merged_targets() {
        let sources: Vec<&str> = sources.into_iter().map(RegionCode::as_str).collect();
        println!("- {anchor} <- {}", sources.join(", "));
    }
    for diagnostic in &report.diagnostics {
        println!("- {}", diagnostic.message);
    }
    Ok(())
}
