// ********* Input data structures ***********

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::Display;

/// The reserved filter value meaning "no filter" for one dimension.
pub const ALL_SENTINEL: &str = "ALL";

/// One cell of the source table, before any interpretation.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// A cell the spreadsheet itself stores as a date.
    DateTime(NaiveDateTime),
}

impl Cell {
    /// The textual form of the cell, as scanned by the exclusion filter and
    /// used for the display fields of a record.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
            Cell::Number(f) => f.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// The source table as read from disk: every column is kept, including the
/// ones that are not used by the reports.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The names of the five columns a report needs.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnNames {
    pub date: String,
    pub objection_type: String,
    pub department: String,
    pub status: String,
    pub municipality: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            date: "تاريخ تقديم الاعتراض".to_string(),
            objection_type: "نوع الرقابة".to_string(),
            department: "اسم الادارة".to_string(),
            status: "حالة الاعتراض".to_string(),
            municipality: "اسم البلدية".to_string(),
        }
    }
}

impl ColumnNames {
    /// All the required names, in a stable order.
    pub fn required(&self) -> [&str; 5] {
        [
            self.date.as_str(),
            self.objection_type.as_str(),
            self.department.as_str(),
            self.status.as_str(),
            self.municipality.as_str(),
        ]
    }
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReportRules {
    /// The last day included in any report.
    pub cutoff: NaiveDate,
    /// When unset, the year of the cutoff date is used.
    pub year_override: Option<i32>,
    /// A record is approved when its status equals this value exactly.
    pub approved_status: String,
    /// Rows containing any of these keywords (after normalization) in any
    /// cell are dropped before anything else happens.
    pub excluded_keywords: Vec<String>,
    /// The number of objection types shown individually when no type is selected.
    pub top_types_limit: usize,
    /// The title of the card grouping all the types outside the top ranking.
    pub unspecified_type_label: String,
}

impl Default for ReportRules {
    fn default() -> Self {
        ReportRules {
            cutoff: NaiveDate::from_ymd_opt(2025, 12, 13).unwrap_or_default(),
            year_override: None,
            approved_status: "مكتمل - مقبول".to_string(),
            excluded_keywords: vec![
                "إجادة".to_string(),
                "اجادة".to_string(),
                "إجاده".to_string(),
                "اجاده".to_string(),
            ],
            top_types_limit: 50,
            unspecified_type_label: "نوع رقابه غير محدد".to_string(),
        }
    }
}

impl ReportRules {
    /// The year all the quarter labels refer to.
    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        self.year_override.unwrap_or_else(|| self.cutoff.year())
    }
}

/// The selection for one filter dimension.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default)]
pub enum Selection {
    #[default]
    All,
    Value(String),
}

impl Selection {
    /// Interprets a raw query parameter. An absent parameter means no filter.
    pub fn from_param(param: Option<&str>) -> Selection {
        match param {
            None => Selection::All,
            Some(ALL_SENTINEL) => Selection::All,
            Some(s) => Selection::Value(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Selection::All => ALL_SENTINEL,
            Selection::Value(s) => s.as_str(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Filters {
    pub municipality: Selection,
    pub department: Selection,
    pub objection_type: Selection,
}

// ******** Output data structures *********

/// The distinct values offered by the dashboard selectors.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    pub municipalities: Vec<String>,
    pub departments: Vec<String>,
    pub types: Vec<String>,
}

/// Per-quarter counts, aligned index for index with the quarter labels.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub total: Vec<u64>,
    pub approved: Vec<u64>,
}

impl Series {
    pub fn grand_total(&self) -> u64 {
        self.total.iter().sum()
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub title: String,
    pub slug: String,
    pub series: Series,
}

/// Echo of the parameters a report was computed with.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub labels: Vec<String>,
    pub year: i32,
    pub cutoff: String,
    pub muni: String,
    pub dept: String,
    #[serde(rename = "type")]
    pub objection_type: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub config: ReportConfig,
    pub cards: Vec<Card>,
    pub excluded_rows: u64,
}

/// Errors that prevent a table from being prepared.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ReportErrors {
    /// The names of the required columns absent from the header.
    MissingColumns(Vec<String>),
}

impl Error for ReportErrors {}

impl Display for ReportErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportErrors::MissingColumns(names) => {
                write!(f, "missing columns: {}", names.join(", "))
            }
        }
    }
}
