// Reading the objection table from an Excel workbook.

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use objection_stats::builder::Builder;

use crate::dashboard::io_common::cell_from_excel;
use crate::dashboard::*;

/// Reads one worksheet: the first row holds the column names, every other
/// non-blank row is a record.
pub fn read_excel_table(path: &str, worksheet_name: Option<&str>) -> DashResult<RawTable> {
    let wrange = get_range(path, worksheet_name)?;
    let mut rows = wrange.rows();
    let header_row = rows.next().context(EmptyExcelSnafu { path })?;
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| cell_from_excel(c).as_text())
        .collect();
    debug!("read_excel_table: header: {:?}", headers);

    let mut builder = Builder::new(&headers);
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(cell_from_excel).collect();
        if cells.iter().all(|c| *c == Cell::Empty) {
            continue;
        }
        builder.add_row(cells);
    }
    let table = builder.build();
    info!("read_excel_table: {} rows read from {:?}", table.len(), path);
    Ok(table)
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> DashResult<Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        let wrange = workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let wrange = workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    }
}
