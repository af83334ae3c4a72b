pub mod builder;
mod config;
use log::{debug, info, warn};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub use crate::config::*;

// **** Typed records ****

/// One objection, with its fields resolved from the source columns.
/// The text fields hold the trimmed display form.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Record {
    pub submitted: NaiveDate,
    pub objection_type: String,
    pub department: String,
    pub status: String,
    pub municipality: String,
}

/// The normalized forms of the filterable fields. Only used for equality.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NormalizedKeys {
    pub municipality: String,
    pub department: String,
    pub objection_type: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PreparedRecord {
    pub record: Record,
    /// Between 1 and 4.
    pub quarter: u32,
    pub keys: NormalizedKeys,
    pub approved: bool,
}

/// The table every query runs against. It is built once and never modified.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ObjectionTable {
    pub records: Vec<PreparedRecord>,
    pub rules: ReportRules,
    pub year: i32,
    pub labels: Vec<String>,
    /// Rows dropped by the keyword exclusion.
    pub excluded_rows: u64,
    /// Rows in the source, before any filtering.
    pub source_rows: u64,
}

/// The outcome of the keyword exclusion.
#[derive(PartialEq, Debug, Clone)]
pub struct ExclusionResult {
    pub kept: RawTable,
    pub removed_rows: u64,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
struct ColumnIndexes {
    date: usize,
    objection_type: usize,
    department: usize,
    status: usize,
    municipality: usize,
}

static SLUG_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\x{0600}-\x{06FF}]+").expect("valid slug pattern"));

// Tried in order. Month-first comes before day-first for ambiguous dates.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"];

// **** Normalization ****

/// Canonical form of a value, used for keyword matching and for filter equality.
///
/// Trims, folds the Arabic letter variants (alef forms, alef maqsura, ta marbuta)
/// and lowercases. Applying it twice gives the same result as applying it once.
pub fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            'أ' | 'إ' | 'آ' => 'ا',
            'ى' => 'ي',
            'ة' => 'ه',
            c => c,
        })
        .collect::<String>()
        .to_lowercase()
}

pub fn normalize_cell(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        c => normalize(&c.as_text()),
    }
}

/// A URL and file name friendly identifier for a card title.
pub fn safe_slug(title: &str) -> String {
    let n = normalize(title);
    let slug = SLUG_SEPARATORS.replace_all(&n, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "x".to_string()
    } else {
        slug.to_string()
    }
}

// **** Loading ****

/// Drops every row where some cell contains one of the keywords.
///
/// All the columns are scanned, not only the ones used by the reports.
/// Keywords that normalize to an empty string are ignored: they would match
/// every row.
pub fn exclude_rows(table: RawTable, keywords: &[String]) -> ExclusionResult {
    let keys: Vec<String> = keywords
        .iter()
        .map(|k| normalize(k))
        .filter(|k| !k.is_empty())
        .collect();
    if keys.is_empty() {
        return ExclusionResult {
            kept: table,
            removed_rows: 0,
        };
    }

    let RawTable { headers, rows } = table;
    let mut kept: Vec<Vec<Cell>> = Vec::with_capacity(rows.len());
    let mut removed_rows: u64 = 0;
    for (idx, row) in rows.into_iter().enumerate() {
        let hit = row.iter().any(|cell| {
            let n = normalize_cell(cell);
            !n.is_empty() && keys.iter().any(|k| n.contains(k.as_str()))
        });
        if hit {
            debug!("exclude_rows: dropping row {}", idx);
            removed_rows += 1;
        } else {
            kept.push(row);
        }
    }
    ExclusionResult {
        kept: RawTable {
            headers,
            rows: kept,
        },
        removed_rows,
    }
}

/// Reads a date out of a cell. Returns None when the cell holds no date.
pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Text(s) => parse_date_text(s.trim()),
        _ => None,
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS.iter() {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS.iter() {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_local().date())
}

pub fn quarter_of(date: NaiveDate) -> u32 {
    date.month0() / 3 + 1
}

/// The labels from Q1 of the year up to the quarter of the cutoff, included.
pub fn quarter_labels_up_to(cutoff: NaiveDate, year: i32) -> Vec<String> {
    (1..=quarter_of(cutoff))
        .map(|q| format!("{}-Q{}", year, q))
        .collect()
}

fn resolve_columns(headers: &[String], columns: &ColumnNames) -> Result<ColumnIndexes, ReportErrors> {
    let positions: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .rev()
        .map(|(idx, h)| (h.trim(), idx))
        .collect();
    let missing: Vec<String> = columns
        .required()
        .iter()
        .filter(|name| !positions.contains_key(name.trim()))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ReportErrors::MissingColumns(missing));
    }
    let find = |name: &str| positions[name.trim()];
    Ok(ColumnIndexes {
        date: find(&columns.date),
        objection_type: find(&columns.objection_type),
        department: find(&columns.department),
        status: find(&columns.status),
        municipality: find(&columns.municipality),
    })
}

fn text_at(row: &[Cell], idx: usize) -> String {
    row.get(idx)
        .map(|c| c.as_text().trim().to_string())
        .unwrap_or_default()
}

/// Builds the table the queries run against.
///
/// In order: drops the rows matching an excluded keyword, checks the required
/// columns, drops the rows without a readable date or outside the range from
/// January 1st of the year to the cutoff, and tags each remaining row with its
/// quarter.
pub fn prepare_table(
    raw: RawTable,
    columns: &ColumnNames,
    rules: &ReportRules,
) -> Result<ObjectionTable, ReportErrors> {
    let source_rows = raw.len() as u64;
    let exclusion = exclude_rows(raw, &rules.excluded_keywords);
    info!(
        "prepare_table: {} source rows, {} excluded by keyword",
        source_rows, exclusion.removed_rows
    );

    let idx = resolve_columns(&exclusion.kept.headers, columns)?;

    let year = rules.year();
    let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(rules.cutoff);
    let labels = quarter_labels_up_to(rules.cutoff, year);

    let mut records: Vec<PreparedRecord> = Vec::with_capacity(exclusion.kept.len());
    let mut undated: u64 = 0;
    let mut out_of_range: u64 = 0;
    for row in exclusion.kept.rows.iter() {
        let submitted = match row.get(idx.date).and_then(parse_date) {
            Some(d) => d,
            None => {
                undated += 1;
                continue;
            }
        };
        if submitted < start || submitted > rules.cutoff {
            out_of_range += 1;
            continue;
        }
        let record = Record {
            submitted,
            objection_type: text_at(row, idx.objection_type),
            department: text_at(row, idx.department),
            status: text_at(row, idx.status),
            municipality: text_at(row, idx.municipality),
        };
        let keys = NormalizedKeys {
            municipality: normalize(&record.municipality),
            department: normalize(&record.department),
            objection_type: normalize(&record.objection_type),
        };
        let approved = record.status == rules.approved_status;
        records.push(PreparedRecord {
            quarter: quarter_of(submitted),
            record,
            keys,
            approved,
        });
    }

    if undated > 0 {
        warn!("prepare_table: {} rows without a readable date were dropped", undated);
    }
    info!(
        "prepare_table: {} rows kept for {} (up to {}), {} outside the date range",
        records.len(),
        year,
        rules.cutoff,
        out_of_range
    );

    Ok(ObjectionTable {
        records,
        rules: rules.clone(),
        year,
        labels,
        excluded_rows: exclusion.removed_rows,
        source_rows,
    })
}

// **** Queries ****

/// The sorted distinct values of each filterable field. Empty values are skipped.
pub fn build_options(table: &ObjectionTable) -> Options {
    let mut municipalities: BTreeSet<&str> = BTreeSet::new();
    let mut departments: BTreeSet<&str> = BTreeSet::new();
    let mut types: BTreeSet<&str> = BTreeSet::new();
    for r in table.records.iter() {
        for (set, value) in [
            (&mut municipalities, &r.record.municipality),
            (&mut departments, &r.record.department),
            (&mut types, &r.record.objection_type),
        ] {
            if !value.is_empty() {
                set.insert(value.as_str());
            }
        }
    }
    Options {
        municipalities: into_sorted_vec(municipalities),
        departments: into_sorted_vec(departments),
        types: into_sorted_vec(types),
    }
}

fn into_sorted_vec(set: BTreeSet<&str>) -> Vec<String> {
    set.into_iter().map(|s| s.to_string()).collect()
}

fn matches(selection: &Option<String>, key: &str) -> bool {
    match selection {
        None => true,
        Some(k) => k == key,
    }
}

fn selection_key(selection: &Selection) -> Option<String> {
    match selection {
        Selection::All => None,
        Selection::Value(s) => Some(normalize(s)),
    }
}

/// Counts the records of each quarter. Records in a quarter past the labels
/// are not counted.
fn build_series(records: &[&PreparedRecord], num_labels: usize) -> Series {
    let mut total = vec![0u64; num_labels];
    let mut approved = vec![0u64; num_labels];
    for r in records {
        let q = (r.quarter - 1) as usize;
        if q < num_labels {
            total[q] += 1;
            if r.approved {
                approved[q] += 1;
            }
        }
    }
    Series { total, approved }
}

/// The types ranked by number of records, largest first.
///
/// Ties keep the order in which the types first appear in the table.
/// Records without a type are not ranked.
fn rank_types<'a>(records: &[&'a PreparedRecord]) -> Vec<(&'a str, u64)> {
    let mut ranked: Vec<(&'a str, u64)> = Vec::new();
    let mut positions: HashMap<&'a str, usize> = HashMap::new();
    for r in records {
        let t = r.record.objection_type.as_str();
        if t.is_empty() {
            continue;
        }
        match positions.get(t) {
            Some(pos) => ranked[*pos].1 += 1,
            None => {
                positions.insert(t, ranked.len());
                ranked.push((t, 1));
            }
        }
    }
    // Stable sort: keeps the first appearance order among equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

fn make_card(title: &str, records: &[&PreparedRecord], num_labels: usize) -> Card {
    Card {
        title: title.to_string(),
        slug: safe_slug(title),
        series: build_series(records, num_labels),
    }
}

/// Computes the cards shown by the dashboard for the given filters.
///
/// When no type is selected, each of the `top_types_limit` largest types gets
/// its own card and every other record lands in a single catch-all card.
/// The cards then partition the filtered records and are sorted by total,
/// largest first.
pub fn build_report(table: &ObjectionTable, filters: &Filters) -> ReportData {
    let num_labels = table.labels.len();
    let muni_key = selection_key(&filters.municipality);
    let dept_key = selection_key(&filters.department);
    let type_key = selection_key(&filters.objection_type);

    let selected: Vec<&PreparedRecord> = table
        .records
        .iter()
        .filter(|r| {
            matches(&muni_key, &r.keys.municipality)
                && matches(&dept_key, &r.keys.department)
                && matches(&type_key, &r.keys.objection_type)
        })
        .collect();
    debug!(
        "build_report: {} records match {:?}",
        selected.len(),
        filters
    );

    let mut cards: Vec<Card> = Vec::new();
    if !selected.is_empty() {
        match &filters.objection_type {
            Selection::All => {
                let ranked = rank_types(&selected);
                let top: HashSet<&str> = ranked
                    .iter()
                    .take(table.rules.top_types_limit)
                    .map(|(t, _)| *t)
                    .collect();
                let catch_all = table.rules.unspecified_type_label.as_str();
                let mut groups: BTreeMap<&str, Vec<&PreparedRecord>> = BTreeMap::new();
                for r in selected.iter().copied() {
                    let t = r.record.objection_type.as_str();
                    let label = if top.contains(t) { t } else { catch_all };
                    groups.entry(label).or_default().push(r);
                }
                cards = groups
                    .iter()
                    .map(|(title, records)| make_card(title, records, num_labels))
                    .collect();
                cards.sort_by_key(|c| std::cmp::Reverse(c.series.grand_total()));
            }
            Selection::Value(t) => {
                cards.push(make_card(t, &selected, num_labels));
            }
        }
    }

    ReportData {
        config: ReportConfig {
            labels: table.labels.clone(),
            year: table.year,
            cutoff: table.rules.cutoff.format("%Y-%m-%d").to_string(),
            muni: filters.municipality.as_str().to_string(),
            dept: filters.department.as_str().to_string(),
            objection_type: filters.objection_type.as_str().to_string(),
        },
        cards,
        excluded_rows: table.excluded_rows,
    }
}
