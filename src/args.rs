use clap::Parser;

/// This is a dashboard service for administrative objection records.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the input table, the column names and the report rules.
    /// Relative paths inside the file are resolved against the directory of the file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The spreadsheet containing the objection records (.xlsx or .csv).
    /// Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default: first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (date, YYYY-MM-DD) The last day included in the reports.
    #[clap(long, value_parser)]
    pub cutoff: Option<String>,

    /// (year) If specified, the year used for the quarter labels instead of the year of the cutoff date.
    #[clap(long, value_parser)]
    pub year: Option<i32>,

    /// (address, default 0.0.0.0:5000) The address the HTTP server listens on. When not given, the PORT
    /// environment variable overrides the port of the configured address.
    #[clap(long, value_parser)]
    pub bind: Option<String>,

    /// (file path, 'stdout' or empty) If specified, no server is started: the report for the given filters
    /// is written in JSON format to this location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference report in JSON format. If provided with --out, objdash will
    /// check that the computed report matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (default ALL) The municipality to report on, with --out.
    #[clap(long, value_parser)]
    pub muni: Option<String>,

    /// (default ALL) The department to report on, with --out.
    #[clap(long, value_parser)]
    pub dept: Option<String>,

    /// (default ALL) The objection type to report on, with --out.
    #[clap(long = "type", value_parser)]
    pub objection_type: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
