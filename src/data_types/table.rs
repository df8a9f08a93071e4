
use std::fmt;

/// A single spreadsheet cell after loading.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Cell {
    /// Blank cell, treated as a missing value downstream
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Converts raw text into a cell. The text is kept as written so that names such as "007" survive;
    /// numeric columns are read through `as_i64`/`as_f64`.
    /// # Arguments
    /// * `raw` - the raw text, surrounding whitespace is ignored
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        // "nan"/"NaN" are how missing values show up in exported frames
        if trimmed.is_empty() || trimmed.parse::<f64>().is_ok_and(|f| f.is_nan()) {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Returns the cell as an integer if it is exactly representable as one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Cell::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>().ok()
                        .filter(|f| f.fract() == 0.0 && f.is_finite())
                        .map(|f| f as i64)
                })
            },
            _ => None
        }
    }

    /// Returns the cell as a float if it holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Empty => None
        }
    }

    /// Returns the cell as text, None if it is empty.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            other => Some(other.to_string())
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::Int(value as i64)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// An in-memory table loaded from a spreadsheet or delimited file.
/// Rows are padded with empty cells so that every row has one cell per column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    /// Column names, in file order
    columns: Vec<String>,
    /// Row-major cell data
    rows: Vec<Vec<Cell>>
}

impl Table {
    /// Constructor
    /// # Arguments
    /// * `columns` - the column names
    /// * `rows` - row data; short rows are padded and long rows are truncated to the column count
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows.into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self {
            columns, rows
        }
    }

    /// Builds a table with positional column names ("0", "1", ...), used when a file has no header.
    pub fn without_header(rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let columns = (0..width).map(|i| i.to_string()).collect();
        Self::new(columns, rows)
    }

    /// Returns the index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns all cells for a column by index
    pub fn column_cells(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |r| &r[index])
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    // getters
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse(""), Cell::Empty);
        assert_eq!(Cell::parse("  "), Cell::Empty);
        assert_eq!(Cell::parse("NaN"), Cell::Empty);
        assert_eq!(Cell::parse(" chr1 "), Cell::Text("chr1".to_string()));

        // numeric-looking text keeps its spelling
        assert_eq!(Cell::parse("007"), Cell::Text("007".to_string()));
        assert_eq!(Cell::parse("007").as_text(), Some("007".to_string()));
        assert_eq!(Cell::parse("1.10").as_text(), Some("1.10".to_string()));
        assert_eq!(Cell::parse("12").as_i64(), Some(12));
        assert_eq!(Cell::parse("12.0").as_i64(), Some(12));
        assert_eq!(Cell::parse("0.25").as_f64(), Some(0.25));
        assert_eq!(Cell::parse("0.25").as_i64(), None);
    }

    #[test]
    fn test_cell_conversions() {
        assert_eq!(Cell::Float(10.0).as_i64(), Some(10));
        assert_eq!(Cell::Float(10.5).as_i64(), None);
        assert_eq!(Cell::Text("7".to_string()).as_i64(), Some(7));
        assert_eq!(Cell::Int(3).as_f64(), Some(3.0));
        assert_eq!(Cell::Empty.as_text(), None);
        assert_eq!(Cell::Int(3).as_text(), Some("3".to_string()));
    }

    #[test]
    fn test_table_padding() {
        let table = Table::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Cell::Int(1)], vec![Cell::Int(1), Cell::Int(2), Cell::Int(3)]]
        );
        assert_eq!(table.rows()[0], vec![Cell::Int(1), Cell::Empty]);
        assert_eq!(table.rows()[1], vec![Cell::Int(1), Cell::Int(2)]);
        assert_eq!(table.column_index("b"), Some(1));
        assert_eq!(table.column_index("c"), None);

        let headerless = Table::without_header(vec![vec![Cell::from("s1")], vec![Cell::from("s2"), Cell::Int(4)]]);
        assert_eq!(headerless.columns(), &["0".to_string(), "1".to_string()]);
        assert_eq!(headerless.rows()[0][1], Cell::Empty);
    }
}
