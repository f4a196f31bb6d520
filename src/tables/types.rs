use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Widest a single cell may render in a text preview.
const MAX_CELL_WIDTH: usize = 40;

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Empty,
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Numeric view of the cell. Text cells count when they parse cleanly.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => parse_number(s),
            Value::Empty => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            // Whole numbers print without the trailing ".0" a spreadsheet never shows
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Empty => Ok(()),
        }
    }
}

/// Parse a user- or sheet-supplied number. Decimal commas are not numbers.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Comparison semantics chosen for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Numeric,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One named data source, replaced wholesale on every refresh.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    /// blake3 hex digest of the bytes the table was parsed from
    digest: String,
    loaded_at: DateTime<Utc>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
            digest: String::new(),
            loaded_at: Utc::now(),
        }
    }

    pub fn with_digest(mut self, digest: String) -> Self {
        self.digest = digest;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Find a column by exact name, then case-insensitively.
    pub fn resolve_column(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                let wanted = name.to_lowercase();
                self.columns
                    .iter()
                    .position(|c| c.name.to_lowercase() == wanted)
            })
    }
}

/// A filtered view over a table: row indices in original order.
#[derive(Debug, Clone)]
pub struct Selection {
    table: Arc<Table>,
    rows: Vec<usize>,
}

impl Selection {
    pub fn all(table: Arc<Table>) -> Self {
        let rows = (0..table.row_count()).collect();
        Self { table, rows }
    }

    pub fn empty(table: Arc<Table>) -> Self {
        Self {
            table,
            rows: Vec::new(),
        }
    }

    pub(crate) fn from_indices(table: Arc<Table>, rows: Vec<usize>) -> Self {
        Self { table, rows }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn indices(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> + '_ {
        self.rows.iter().map(|&i| self.table.rows()[i].as_slice())
    }

    /// Render the first `limit` rows as an aligned plain-text table.
    pub fn render(&self, limit: usize) -> String {
        let headers: Vec<String> = self
            .table
            .columns()
            .iter()
            .map(|c| clip(&c.name))
            .collect();
        let body: Vec<Vec<String>> = self
            .rows()
            .take(limit)
            .map(|row| row.iter().map(|v| clip(&v.to_string())).collect())
            .collect();

        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in &body {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let mut out = String::new();
        push_line(&mut out, &headers, &widths);
        for row in &body {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

fn clip(cell: &str) -> String {
    let flat = cell.replace('\n', " ");
    if flat.chars().count() > MAX_CELL_WIDTH {
        let mut s: String = flat.chars().take(MAX_CELL_WIDTH - 1).collect();
        s.push('…');
        s
    } else {
        flat
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = w))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Arc<Table> {
        Arc::new(Table::new(
            "naps",
            vec![
                Column::new("Nombre", ColumnKind::Text),
                Column::new("Puertos", ColumnKind::Numeric),
            ],
            vec![
                vec![Value::Text("NAP-01".into()), Value::Number(8.0)],
                vec![Value::Text("NAP-02".into()), Value::Number(16.0)],
                vec![Value::Text("NAP-03".into()), Value::Empty],
            ],
        ))
    }

    #[test]
    fn test_resolve_column_case_insensitive() {
        let table = sample();
        assert_eq!(table.resolve_column("Nombre"), Some(0));
        assert_eq!(table.resolve_column("puertos"), Some(1));
        assert_eq!(table.resolve_column("Estado"), None);
    }

    #[test]
    fn test_number_display_drops_trailing_zero() {
        assert_eq!(Value::Number(16.0).to_string(), "16");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Empty.to_string(), "");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("-1.5"), Some(-1.5));
        assert_eq!(parse_number("12,5"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_render_limits_rows() {
        let selection = Selection::all(sample());
        let text = selection.render(2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Nombre"));
        assert!(lines[1].contains("NAP-01"));
        assert!(lines[2].contains("16"));
        assert!(!text.contains("NAP-03"));
    }

    #[test]
    fn test_render_clips_long_cells() {
        let table = Arc::new(Table::new(
            "tickets",
            vec![Column::new("Detalle", ColumnKind::Text)],
            vec![vec![Value::Text("x".repeat(100))]],
        ));
        let text = Selection::all(table).render(5);
        let row = text.lines().nth(1).unwrap();
        assert_eq!(row.chars().count(), MAX_CELL_WIDTH);
        assert!(row.ends_with('…'));
    }
}
