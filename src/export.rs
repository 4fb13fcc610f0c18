use unicode_width::UnicodeWidthStr;

use crate::engine::{Table, Value};

/// Rows rendered in the Markdown preview before it is truncated.
pub const MARKDOWN_ROW_LIMIT: usize = 50;

/// Render a result table as a Markdown table.
///
/// Only the first [`MARKDOWN_ROW_LIMIT`] rows are shown, followed by a
/// "... and N more rows" line. Columns are padded to their display width so
/// the table also reads well as plain text.
pub fn to_markdown(table: &Table) -> String {
    if table.columns.is_empty() {
        return "(no columns)".to_string();
    }

    let shown = table.rows.len().min(MARKDOWN_ROW_LIMIT);
    let headers: Vec<String> = table.columns.iter().map(|c| markdown_escape(c)).collect();
    let cells: Vec<Vec<String>> = table.rows[..shown]
        .iter()
        .map(|row| row.iter().map(cell_to_markdown).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.width().max(3)).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width());
            }
        }
    }

    let mut output = String::new();
    output.push_str(&markdown_row(&headers, &widths));
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&markdown_row(&separator, &widths));
    for row in &cells {
        output.push_str(&markdown_row(row, &widths));
    }

    if table.rows.len() > shown {
        output.push_str(&format!("\n... and {} more rows\n", table.rows.len() - shown));
    }
    output
}

/// Rows as JSON objects keyed by column name, NULL as JSON null.
pub fn to_json(table: &Table) -> Vec<serde_json::Value> {
    table
        .rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (i, cell) in row.iter().enumerate() {
                let name = table
                    .columns
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", i));
                obj.insert(name, cell.to_json());
            }
            serde_json::Value::Object(obj)
        })
        .collect()
}

fn markdown_row(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            format!("{}{}", cell, " ".repeat(w.saturating_sub(cell.width())))
        })
        .collect();
    format!("| {} |\n", padded.join(" | "))
}

fn cell_to_markdown(cell: &Value) -> String {
    match cell {
        Value::Null => "NULL".to_string(),
        other => markdown_escape(&other.display()),
    }
}

fn markdown_escape(s: &str) -> String {
    s.replace('|', "\\|").replace(['\r', '\n'], " ")
}
