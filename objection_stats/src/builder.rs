pub use crate::config::*;

/// A builder for assembling a raw table row by row.
///
/// The spreadsheet readers use it, and it is the easiest way to feed the
/// report functions from code.
///
/// ```
/// use objection_stats::builder::Builder;
///
/// let mut builder = Builder::new(&["date".to_string(), "type".to_string()]);
/// builder.add_text_row(&["2025-01-15", "building"]);
/// builder.add_text_row(&["2025-07-01", ""]);
///
/// let table = builder.build();
/// assert_eq!(table.len(), 2);
/// ```
pub struct Builder {
    pub(crate) _headers: Vec<String>,
    pub(crate) _rows: Vec<Vec<Cell>>,
}

impl Builder {
    /// Header names are trimmed: a column is found by its visible name.
    pub fn new(headers: &[String]) -> Builder {
        Builder {
            _headers: headers.iter().map(|h| h.trim().to_string()).collect(),
            _rows: Vec::new(),
        }
    }

    pub fn num_columns(&self) -> usize {
        self._headers.len()
    }

    /// Adds a row of cells. Rows shorter than the header are read as if the
    /// missing cells were empty.
    pub fn add_row(&mut self, cells: Vec<Cell>) {
        self._rows.push(cells);
    }

    /// Adds a row made only of text. Blank strings become empty cells.
    pub fn add_text_row(&mut self, cells: &[&str]) {
        let row = cells
            .iter()
            .map(|s| {
                if s.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(s.to_string())
                }
            })
            .collect();
        self.add_row(row);
    }

    pub fn build(self) -> RawTable {
        RawTable {
            headers: self._headers,
            rows: self._rows,
        }
    }
}
