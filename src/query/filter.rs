use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use super::types::{FilterClause, Operator};
use crate::tables::types::{parse_number, ColumnKind, Selection, Table, Value};

/// Literal separators that turn one `contains` value into alternatives.
const TOKEN_SEPARATORS: &[&str] = &[" y ", " o "];

#[derive(Debug, Clone, Copy)]
enum Target {
    Column(usize),
    AllText,
}

/// Apply `filters` to `table`. Never fails: an evaluation error yields no rows.
pub fn apply(table: Arc<Table>, filters: &[FilterClause]) -> Selection {
    match try_apply(&table, filters) {
        Ok(rows) => {
            debug!(
                table = table.name(),
                clauses = filters.len(),
                matched = rows.len(),
                total = table.row_count(),
                "filters applied"
            );
            Selection::from_indices(table, rows)
        }
        Err(e) => {
            warn!(table = table.name(), "filter pass failed, returning no rows: {:#}", e);
            Selection::empty(table)
        }
    }
}

/// Row indices of `table` matching every clause, in table order.
pub fn try_apply(table: &Table, filters: &[FilterClause]) -> Result<Vec<usize>> {
    let mut rows: Vec<usize> = (0..table.row_count()).collect();

    for clause in filters {
        if clause.value.trim().is_empty() {
            debug!(clause = %clause, "clause has no value, not narrowing");
            continue;
        }

        let column = clause.column.trim();
        let target = if column.is_empty() {
            Target::AllText
        } else {
            match table.resolve_column(column) {
                Some(idx) => Target::Column(idx),
                None => {
                    let available: Vec<&str> =
                        table.column_names().into_iter().take(5).collect();
                    warn!(
                        table = table.name(),
                        column,
                        available = %available.join(", "),
                        "column not found, skipping clause"
                    );
                    continue;
                }
            }
        };

        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if row_matches(table, row, target, clause)? {
                kept.push(row);
            }
        }
        rows = kept;
    }

    Ok(rows)
}

fn cell(table: &Table, row: usize, col: usize) -> Result<&Value> {
    table.rows()[row].get(col).ok_or_else(|| {
        anyhow!(
            "row {} of '{}' has no cell for column '{}'",
            row,
            table.name(),
            table.columns()[col].name
        )
    })
}

fn row_matches(table: &Table, row: usize, target: Target, clause: &FilterClause) -> Result<bool> {
    match target {
        Target::AllText => {
            for (col, column) in table.columns().iter().enumerate() {
                if column.kind == ColumnKind::Text
                    && text_contains(cell(table, row, col)?, &clause.value)
                {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Target::Column(col) => {
            let kind = table.columns()[col].kind;
            Ok(cell_matches(cell(table, row, col)?, kind, clause.operator, &clause.value))
        }
    }
}

fn cell_matches(cell: &Value, kind: ColumnKind, op: Operator, value: &str) -> bool {
    match op {
        Operator::Equals => match kind {
            ColumnKind::Text => text_equals(cell, value),
            ColumnKind::Numeric => numeric_equals(cell, value),
        },
        // Text exclusion is substring-based, not the inverse of exact equality
        Operator::NotEquals => match kind {
            ColumnKind::Text => !text_contains(cell, value),
            ColumnKind::Numeric => !numeric_equals(cell, value),
        },
        Operator::GreaterThan => compare(cell, value, |a, b| a > b),
        Operator::LessThan => compare(cell, value, |a, b| a < b),
        Operator::Contains => {
            let tokens = split_tokens(value);
            let single = |token: &str| match kind {
                ColumnKind::Text => text_contains(cell, token),
                ColumnKind::Numeric => numeric_equals(cell, token),
            };
            match tokens.as_slice() {
                [] => single(value),
                [only] => single(*only),
                many => many.iter().any(|t| single(*t)),
            }
        }
    }
}

/// Split a compound value such as `"Resuelto o Cerrado"` into alternatives.
pub fn split_tokens(value: &str) -> Vec<&str> {
    let mut parts = vec![value];
    for sep in TOKEN_SEPARATORS.iter().copied().chain(std::iter::once(",")) {
        parts = parts.into_iter().flat_map(|p| p.split(sep)).collect();
    }
    parts
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

fn text_equals(cell: &Value, value: &str) -> bool {
    if cell.is_empty() {
        return false;
    }
    cell.to_string().trim().to_lowercase() == value.trim().to_lowercase()
}

fn text_contains(cell: &Value, needle: &str) -> bool {
    if cell.is_empty() {
        return false;
    }
    cell.to_string()
        .to_lowercase()
        .contains(&needle.trim().to_lowercase())
}

fn numeric_equals(cell: &Value, value: &str) -> bool {
    match parse_number(value) {
        Some(n) => cell.as_number() == Some(n),
        None => !cell.is_empty() && cell.to_string() == value.trim(),
    }
}

fn compare(cell: &Value, value: &str, cmp: impl Fn(f64, f64) -> bool) -> bool {
    let Some(target) = parse_number(value) else {
        return false;
    };
    cell.as_number().is_some_and(|actual| cmp(actual, target))
}
