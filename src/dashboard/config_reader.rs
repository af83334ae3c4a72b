use crate::dashboard::*;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub const DEFAULT_INPUT: &str = "تقرير_الاعتراضات.xlsx";
pub const DEFAULT_BIND: &str = "0.0.0.0:5000";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceSettings {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColumnSettings {
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub objection_type: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
    pub municipality: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReportSettings {
    #[serde(rename = "cutoffDate")]
    pub cutoff_date: Option<String>,
    #[serde(rename = "yearOverride")]
    pub year_override: Option<i32>,
    #[serde(rename = "approvedStatus")]
    pub approved_status: Option<String>,
    #[serde(rename = "excludedKeywords")]
    pub excluded_keywords: Option<Vec<String>>,
    #[serde(rename = "topTypesLimit")]
    pub top_types_limit: Option<usize>,
    #[serde(rename = "unspecifiedTypeLabel")]
    pub unspecified_type_label: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerSettings {
    pub bind: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub columns: ColumnSettings,
    #[serde(default)]
    pub report: ReportSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Everything the service needs, resolved once at startup.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Settings {
    pub input_path: PathBuf,
    pub worksheet: Option<String>,
    pub columns: ColumnNames,
    pub rules: ReportRules,
    pub bind: SocketAddr,
}

pub fn read_config(path: &str) -> DashResult<DashboardConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: DashboardConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

/// Reads the configuration file named on the command line, if any, and
/// resolves the final settings.
///
/// `port` is the value of the PORT environment variable.
pub fn resolve_settings(args: &Args, port: Option<&str>) -> DashResult<Settings> {
    let (config, root) = match &args.config {
        Some(p) => {
            let config = read_config(p)?;
            let root = Path::new(p)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            (config, root)
        }
        None => (DashboardConfig::default(), PathBuf::new()),
    };
    settings_from(config, &root, args, port)
}

/// The command line wins over the environment, which wins over the
/// configuration file, which wins over the defaults.
pub fn settings_from(
    config: DashboardConfig,
    config_root: &Path,
    args: &Args,
    port: Option<&str>,
) -> DashResult<Settings> {
    let input_path = match (&args.input, &config.source.file_path) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(p)) => config_root.join(p),
        (None, None) => PathBuf::from(DEFAULT_INPUT),
    };
    let worksheet = args
        .excel_worksheet_name
        .clone()
        .or(config.source.excel_worksheet_name);

    let default_columns = ColumnNames::default();
    let c = config.columns;
    let columns = ColumnNames {
        date: c.date.unwrap_or(default_columns.date),
        objection_type: c.objection_type.unwrap_or(default_columns.objection_type),
        department: c.department.unwrap_or(default_columns.department),
        status: c.status.unwrap_or(default_columns.status),
        municipality: c.municipality.unwrap_or(default_columns.municipality),
    };

    let default_rules = ReportRules::default();
    let r = config.report;
    let cutoff = match args.cutoff.as_ref().or(r.cutoff_date.as_ref()) {
        Some(s) => parse_cutoff(s)?,
        None => default_rules.cutoff,
    };
    let rules = ReportRules {
        cutoff,
        year_override: args.year.or(r.year_override),
        approved_status: r.approved_status.unwrap_or(default_rules.approved_status),
        excluded_keywords: r
            .excluded_keywords
            .unwrap_or(default_rules.excluded_keywords),
        top_types_limit: r.top_types_limit.unwrap_or(default_rules.top_types_limit),
        unspecified_type_label: r
            .unspecified_type_label
            .unwrap_or(default_rules.unspecified_type_label),
    };

    let bind = match &args.bind {
        Some(b) => parse_bind(b)?,
        None => {
            let b = config.server.bind.unwrap_or_else(|| DEFAULT_BIND.to_string());
            let mut addr = parse_bind(&b)?;
            if let Some(p) = port {
                let value = p.trim();
                let port_num = value
                    .parse::<u16>()
                    .context(InvalidPortSnafu { value })?;
                addr.set_port(port_num);
            }
            addr
        }
    };

    let settings = Settings {
        input_path,
        worksheet,
        columns,
        rules,
        bind,
    };
    info!("settings: {:?}", settings);
    Ok(settings)
}

fn parse_cutoff(value: &str) -> DashResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").context(InvalidCutoffSnafu { value })
}

fn parse_bind(value: &str) -> DashResult<SocketAddr> {
    value
        .trim()
        .parse::<SocketAddr>()
        .context(InvalidBindSnafu { value })
}
