use std::collections::HashMap;

use serde_json::Value as Json;

use super::value::Value;
use crate::error::{Result, SqlToolError};

/// Rows with named columns; the shape of both input tables and results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// The named input tables of one execution. Lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: HashMap<String, Table>,
}

impl TableSet {
    /// Build from `{"name": [{"col": value, ...}, ...], ...}`, given either
    /// as a JSON object or as a string holding one. A table's columns are
    /// the union of its rows' keys in first-appearance order; missing cells
    /// are NULL.
    pub fn from_json(value: &Json) -> Result<TableSet> {
        let parsed;
        let value = match value {
            Json::String(text) => {
                parsed = serde_json::from_str::<Json>(text).map_err(|e| {
                    SqlToolError::validation(format!("Invalid tables JSON: {}", e))
                })?;
                &parsed
            }
            other => other,
        };
        let object = value.as_object().ok_or_else(|| {
            SqlToolError::validation("Tables must be a JSON object with table names as keys.")
        })?;

        let mut set = TableSet::default();
        for (name, data) in object {
            let rows = data.as_array().ok_or_else(|| {
                SqlToolError::validation(format!(
                    "Table '{}' must be an array of row objects.",
                    name
                ))
            })?;
            let mut objects = Vec::with_capacity(rows.len());
            let mut columns: Vec<String> = Vec::new();
            for row in rows {
                let fields = row.as_object().ok_or_else(|| {
                    SqlToolError::validation(format!(
                        "Each row in table '{}' must be an object.",
                        name
                    ))
                })?;
                for key in fields.keys() {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
                objects.push(fields);
            }
            let rows = objects
                .into_iter()
                .map(|fields| {
                    columns
                        .iter()
                        .map(|c| fields.get(c).map(Value::from_json).unwrap_or(Value::Null))
                        .collect()
                })
                .collect();
            set.insert(name, Table { columns, rows });
        }
        Ok(set)
    }

    pub fn insert(&mut self, name: &str, table: Table) {
        self.tables.insert(name.to_lowercase(), table);
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_union_of_columns() {
        let set = TableSet::from_json(&json!({
            "t": [{"a": 1}, {"b": "x", "a": 2}]
        }))
        .unwrap();
        let t = set.get("T").unwrap();
        assert_eq!(t.columns, vec!["a", "b"]);
        assert_eq!(t.rows[0], vec![Value::Int(1), Value::Null]);
        assert_eq!(t.rows[1], vec![Value::Int(2), Value::Text("x".into())]);
    }

    #[test]
    fn test_accepts_json_string() {
        let set = TableSet::from_json(&json!("{\"t\": []}")).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("t").unwrap().row_count(), 0);
    }

    #[test]
    fn test_validation_errors() {
        let err = TableSet::from_json(&json!([1])).unwrap_err();
        assert_eq!(err.error_type(), "ValidationError");
        let err = TableSet::from_json(&json!({"t": {"a": 1}})).unwrap_err();
        assert!(err.to_string().contains("must be an array of row objects"));
        let err = TableSet::from_json(&json!({"t": [1]})).unwrap_err();
        assert!(err.to_string().contains("Each row in table 't'"));
        let err = TableSet::from_json(&json!("not json")).unwrap_err();
        assert!(err.to_string().contains("Invalid tables JSON"));
    }
}
