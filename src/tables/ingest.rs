use anyhow::{Context, Result};
use tracing::debug;

use super::types::{parse_number, Column, ColumnKind, Table, Value};

/// Download one CSV export and parse it into a table.
pub async fn fetch_table(client: &reqwest::Client, name: &str, url: &str) -> Result<Table> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch sheet '{}'", name))?
        .error_for_status()
        .with_context(|| format!("Sheet '{}' returned an error status", name))?;

    let body = resp
        .bytes()
        .await
        .with_context(|| format!("Failed to read sheet '{}' body", name))?;

    let digest = blake3::hash(&body).to_hex().to_string();
    let table = parse_csv(name, &body)?.with_digest(digest);

    debug!(
        table = name,
        rows = table.row_count(),
        columns = table.columns().len(),
        bytes = body.len(),
        "sheet fetched"
    );
    Ok(table)
}

/// Parse CSV bytes (first line is the header) into a typed table.
///
/// Short rows are padded with empty cells, long rows truncated, and rows with
/// no content at all dropped. A column is numeric when every non-empty cell
/// parses as a number.
pub fn parse_csv(name: &str, bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers = normalize_headers(
        reader
            .headers()
            .with_context(|| format!("Failed to read header of '{}'", name))?
            .iter(),
    );
    let width = headers.len();

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Malformed CSV record {} in '{}'", line + 1, name))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        row.resize(width, String::new());
        raw_rows.push(row);
    }

    let columns: Vec<Column> = headers
        .into_iter()
        .enumerate()
        .map(|(i, header)| Column::new(header, infer_kind(raw_rows.iter().map(|r| r[i].as_str()))))
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&columns)
                .map(|(cell, col)| to_value(cell, col.kind))
                .collect()
        })
        .collect();

    Ok(Table::new(name, columns, rows))
}

/// Blank headers become `Unnamed: N`; repeats get a `.N` suffix.
fn normalize_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (i, header) in raw.enumerate() {
        let header = header.trim_start_matches('\u{feff}').trim();
        let base = if header.is_empty() {
            format!("Unnamed: {}", i)
        } else {
            header.to_string()
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while out.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        out.push(candidate);
    }
    out
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut seen = false;
    for cell in cells {
        if cell.trim().is_empty() {
            continue;
        }
        if parse_number(cell).is_none() {
            return ColumnKind::Text;
        }
        seen = true;
    }
    if seen {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

fn to_value(cell: String, kind: ColumnKind) -> Value {
    if cell.trim().is_empty() {
        return Value::Empty;
    }
    match kind {
        ColumnKind::Numeric => parse_number(&cell).map(Value::Number).unwrap_or(Value::Text(cell)),
        ColumnKind::Text => Value::Text(cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_infers_column_kinds() {
        let csv = "Cliente,Plan,Deuda\nAna,100MB,1500\nLuis,300MB,\nMarta,100MB,0.5\n";
        let table = parse_csv("clientes_cuentas", csv.as_bytes()).unwrap();

        assert_eq!(table.name(), "clientes_cuentas");
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_names(), vec!["Cliente", "Plan", "Deuda"]);
        assert_eq!(table.columns()[0].kind, ColumnKind::Text);
        assert_eq!(table.columns()[1].kind, ColumnKind::Text);
        assert_eq!(table.columns()[2].kind, ColumnKind::Numeric);
        assert_eq!(table.rows()[0][2], Value::Number(1500.0));
        assert_eq!(table.rows()[1][2], Value::Empty);
    }

    #[test]
    fn test_all_empty_column_is_text() {
        let csv = "Nombre,Notas\nAna,\nLuis,\n";
        let table = parse_csv("t", csv.as_bytes()).unwrap();
        assert_eq!(table.columns()[1].kind, ColumnKind::Text);
    }

    #[test]
    fn test_short_rows_padded_and_blank_rows_dropped() {
        let csv = "A,B,C\n1,x\n,,\n2,y,z,extra\n";
        let table = parse_csv("t", csv.as_bytes()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0].len(), 3);
        assert_eq!(table.rows()[0][2], Value::Empty);
        assert_eq!(table.rows()[1].len(), 3);
        assert_eq!(table.rows()[1][2], Value::Text("z".into()));
    }

    #[test]
    fn test_headers_normalized() {
        let csv = "Estado,,Estado\na,b,c\n";
        let table = parse_csv("t", csv.as_bytes()).unwrap();
        assert_eq!(table.column_names(), vec!["Estado", "Unnamed: 1", "Estado.1"]);
    }

    #[test]
    fn test_quoted_fields_keep_commas() {
        let csv = "Direccion,Zona\n\"Calle 5, Nro 10\",Norte\n";
        let table = parse_csv("t", csv.as_bytes()).unwrap();
        assert_eq!(table.rows()[0][0], Value::Text("Calle 5, Nro 10".into()));
    }
}
