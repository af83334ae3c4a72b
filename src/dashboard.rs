use log::{debug, info, warn};

use objection_stats::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::dashboard::config_reader::*;
use crate::dashboard::io_common::InputKind;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod server;

#[derive(Debug, Snafu)]
pub enum DashboardError {
    #[snafu(display("The input file {path} does not exist"))]
    MissingInput { path: String },
    #[snafu(display("Cannot read {path}: only .xlsx and .csv files are supported"))]
    UnsupportedInput { path: String },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no worksheet or no header row"))]
    EmptyExcel { path: String },
    #[snafu(display("Cannot find the worksheet {name}"))]
    MissingWorksheet { name: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("The CSV file {path} has no header row"))]
    EmptyCsv { path: String },
    #[snafu(display("Error parsing line {lineno} of the CSV file {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error opening JSON file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Invalid cutoff date {value:?}, expected YYYY-MM-DD"))]
    InvalidCutoff {
        source: chrono::ParseError,
        value: String,
    },
    #[snafu(display("Invalid bind address {value:?}"))]
    InvalidBind {
        source: std::net::AddrParseError,
        value: String,
    },
    #[snafu(display("Invalid PORT value {value:?}"))]
    InvalidPort {
        source: std::num::ParseIntError,
        value: String,
    },
    #[snafu(display("Cannot prepare the objection table"))]
    Report { source: ReportErrors },
    #[snafu(display("The table loading task failed"))]
    BackgroundTask { source: tokio::task::JoinError },
    #[snafu(display("Cannot start the async runtime"))]
    Runtime { source: std::io::Error },
    #[snafu(display("Cannot listen on {addr}"))]
    Bind {
        source: std::io::Error,
        addr: String,
    },
    #[snafu(display("Server error"))]
    Serve { source: std::io::Error },
    #[snafu(display("Cannot write the report to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Difference detected between the computed report and the reference {path}"))]
    ReferenceMismatch { path: String },
}

pub type DashResult<T> = Result<T, DashboardError>;

/// The message of an error followed by the messages of all its causes.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Reads the configured source file into a raw table, picking the reader by extension.
pub fn read_source(settings: &Settings) -> DashResult<RawTable> {
    let path = settings.input_path.display().to_string();
    ensure!(
        settings.input_path.exists(),
        MissingInputSnafu { path: path.clone() }
    );
    info!("Attempting to read objection file {:?}", path);
    match InputKind::from_path(&settings.input_path) {
        Some(InputKind::Excel) => io_excel::read_excel_table(&path, settings.worksheet.as_deref()),
        Some(InputKind::Csv) => io_csv::read_csv_table(&path),
        None => UnsupportedInputSnafu { path }.fail(),
    }
}

/// Reads and prepares the table every query runs against.
pub fn load_table(settings: &Settings) -> DashResult<ObjectionTable> {
    let raw = read_source(settings)?;
    debug!(
        "load_table: headers: {:?}, {} rows",
        raw.headers,
        raw.len()
    );
    let table = prepare_table(raw, &settings.columns, &settings.rules).context(ReportSnafu {})?;
    info!(
        "Loaded {} records ({} source rows, {} excluded), labels {:?}",
        table.records.len(),
        table.source_rows,
        table.excluded_rows,
        table.labels
    );
    Ok(table)
}

pub fn filters_from_args(args: &Args) -> Filters {
    Filters {
        municipality: Selection::from_param(args.muni.as_deref()),
        department: Selection::from_param(args.dept.as_deref()),
        objection_type: Selection::from_param(args.objection_type.as_deref()),
    }
}

fn write_output(out: &str, contents: &str) -> DashResult<()> {
    if out == "stdout" || out.is_empty() {
        println!("{}", contents);
        Ok(())
    } else {
        fs::write(out, contents).context(WritingOutputSnafu { path: out })
    }
}

/// Compares a report with a stored one. Prints a line diff on mismatch.
pub fn check_reference(reference_path: &str, report: &ReportData) -> DashResult<()> {
    let contents = fs::read_to_string(reference_path).context(OpeningJsonSnafu {
        path: reference_path,
    })?;
    let reference: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    let computed: JSValue = serde_json::to_value(report).context(ParsingJsonSnafu {})?;
    let pretty_reference = serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
    let pretty_computed = serde_json::to_string_pretty(&computed).context(ParsingJsonSnafu {})?;
    if pretty_reference != pretty_computed {
        warn!("Found differences with the reference report");
        print_diff(pretty_reference.as_str(), pretty_computed.as_str(), "\n");
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("The report matches the reference {}", reference_path);
    Ok(())
}

/// Computes one report and writes it, instead of serving it.
pub fn run_report(
    settings: &Settings,
    filters: &Filters,
    out: &str,
    reference: Option<&str>,
) -> DashResult<()> {
    let table = load_table(settings)?;
    let report = build_report(&table, filters);
    info!(
        "Report for {:?}: {} cards over {:?}",
        filters,
        report.cards.len(),
        report.config.labels
    );
    let pretty = serde_json::to_string_pretty(&report).context(ParsingJsonSnafu {})?;
    write_output(out, &pretty)?;
    if let Some(reference_path) = reference {
        check_reference(reference_path, &report)?;
    }
    Ok(())
}

/// Entry point: either writes one report (with --out) or serves the dashboard API.
pub fn run(args: &Args) -> DashResult<()> {
    let port = std::env::var("PORT").ok();
    let settings = resolve_settings(args, port.as_deref())?;

    if let Some(out) = &args.out {
        let filters = filters_from_args(args);
        return run_report(&settings, &filters, out, args.reference.as_deref());
    }
    if args.reference.is_some() {
        warn!("--reference is only used together with --out, ignoring it");
    }

    // Queries are short synchronous scans: one thread serves them all.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context(RuntimeSnafu {})?;
    runtime.block_on(server::serve(settings))
}
