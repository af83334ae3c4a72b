// Primitives for reading CSV files.

use objection_stats::builder::Builder;

use crate::dashboard::*;

const BOM: char = '\u{feff}';

/// Reads a comma-separated table. The first line holds the column names.
pub fn read_csv_table(path: &str) -> DashResult<RawTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();

    let header_line = records
        .next()
        .context(EmptyCsvSnafu { path })?
        .context(CsvLineParseSnafu { path, lineno: 1_usize })?;
    let headers: Vec<String> = header_line
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            if idx == 0 {
                h.trim_start_matches(BOM).to_string()
            } else {
                h.to_string()
            }
        })
        .collect();
    debug!("read_csv_table: header: {:?}", headers);

    let mut builder = Builder::new(&headers);
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        let cells: Vec<&str> = line.iter().collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if cells.len() > builder.num_columns() {
            debug!(
                "read_csv_table: line {} has {} fields for {} columns, ignoring the extra fields",
                lineno,
                cells.len(),
                builder.num_columns()
            );
        }
        builder.add_text_row(&cells);
    }
    let table = builder.build();
    info!("read_csv_table: {} rows read from {:?}", table.len(), path);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("objections.csv");
        fs::write(&p, contents).unwrap();
        (dir, p.display().to_string())
    }

    #[test]
    fn reads_headers_and_rows() {
        let (_dir, p) = write_csv("\u{feff}date, type ,dept\n2025-01-15,Building,Permits\n\n2025-02-01,,Permits,extra\n");
        let table = read_csv_table(&p).unwrap();
        assert_eq!(table.headers, vec!["date", "type", "dept"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][1], Cell::Text("Building".to_string()));
        assert_eq!(table.rows[1][1], Cell::Empty);
        assert_eq!(table.rows[1].len(), 4);
    }

    #[test]
    fn empty_file_has_no_header() {
        let (_dir, p) = write_csv("");
        let err = read_csv_table(&p).unwrap_err();
        assert!(matches!(err, DashboardError::EmptyCsv { .. }));
    }

    #[test]
    fn arabic_content_is_kept() {
        let (_dir, p) = write_csv("اسم البلدية,نوع الرقابة\nبلدية الشمال,رقابة المباني\n");
        let table = read_csv_table(&p).unwrap();
        assert_eq!(table.headers[0], "اسم البلدية");
        assert_eq!(table.rows[0][0], Cell::Text("بلدية الشمال".to_string()));
    }
}
