use std::path::Path;

use calamine::DataType;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use objection_stats::Cell;

/// The file formats the source table can be read from.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputKind {
    Excel,
    Csv,
}

impl InputKind {
    /// Decides the reader from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<InputKind> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" => Some(InputKind::Excel),
            "csv" => Some(InputKind::Csv),
            _ => None,
        }
    }
}

/// Excel stores dates as a number of days since 1899-12-30.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

pub fn cell_from_excel(cell: &DataType) -> Cell {
    match cell {
        DataType::Empty => Cell::Empty,
        DataType::String(s) if s.trim().is_empty() => Cell::Empty,
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Bool(b) => Cell::Bool(*b),
        DataType::DateTime(serial) => match excel_serial_to_datetime(*serial) {
            Some(dt) => Cell::DateTime(dt),
            None => Cell::Number(*serial),
        },
        // Error cells (#N/A, #REF!...) count as missing values.
        #[allow(unreachable_patterns)]
        _ => Cell::Empty,
    }
}
