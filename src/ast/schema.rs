//! Table schemas supplied to the optimizer.
//!
//! A schema maps table names to ordered column lists with a type tag per
//! column. Lookups are case-insensitive; declaration order is kept so star
//! expansion lists columns the way the caller wrote them.
use serde_json::Value;

use crate::dialect::canonical_type;
use crate::error::{Result, SqlToolError};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    /// Canonical upper-case type name, e.g. `DATE`, `BOOLEAN`, `INT`.
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    tables: Vec<TableSchema>,
}

/// Broad type families used when canonicalizing literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Boolean,
    Date,
    Timestamp,
    Numeric,
    Text,
    Other,
}

impl TypeFamily {
    pub fn of(data_type: &str) -> Self {
        let head = data_type
            .split('(')
            .next()
            .unwrap_or(data_type)
            .trim()
            .to_uppercase();
        match head.as_str() {
            "BOOLEAN" => TypeFamily::Boolean,
            "DATE" => TypeFamily::Date,
            "TIMESTAMP" | "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => TypeFamily::Timestamp,
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "DECIMAL" | "DOUBLE"
            | "FLOAT" | "REAL" => TypeFamily::Numeric,
            "TEXT" | "VARCHAR" | "CHAR" => TypeFamily::Text,
            _ => TypeFamily::Other,
        }
    }
}

impl Schema {
    /// Build a schema from `{"table": {"column": "TYPE", ...}, ...}`, given
    /// either as a JSON object or as a string holding one.
    pub fn from_json(value: &Value) -> Result<Schema> {
        let parsed;
        let value = match value {
            Value::String(text) => {
                parsed = serde_json::from_str::<Value>(text).map_err(|e| {
                    SqlToolError::validation(format!("Invalid schema JSON: {}", e))
                })?;
                &parsed
            }
            other => other,
        };

        let tables = value
            .as_object()
            .ok_or_else(|| SqlToolError::validation("Schema must be a JSON object"))?;

        let mut schema = Schema::default();
        for (table_name, columns) in tables {
            let columns = columns.as_object().ok_or_else(|| {
                SqlToolError::validation(format!(
                    "Schema for table '{}' must be an object of column types",
                    table_name
                ))
            })?;
            let columns = columns
                .iter()
                .map(|(name, ty)| ColumnSchema {
                    name: name.clone(),
                    data_type: match ty {
                        Value::String(s) => canonical_type(s),
                        other => canonical_type(&other.to_string()),
                    },
                })
                .collect();
            schema.tables.push(TableSchema {
                name: table_name.clone(),
                columns,
            });
        }
        Ok(schema)
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        // Qualified references (`db.t`) fall back to the bare table name.
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .or_else(|| {
                let bare = name.rsplit('.').next().unwrap_or(name);
                self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(bare))
            })
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
    fn test_from_object_preserves_order() {
        let schema = Schema::from_json(&json!({
            "users": {"id": "INT", "name": "VARCHAR", "active": "BOOLEAN"}
        }))
        .unwrap();
        let users = schema.table("USERS").unwrap();
        let names: Vec<&str> = users.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "active"]);
        assert_eq!(users.column("Active").unwrap().data_type, "BOOLEAN");
    }

    #[test]
    fn test_from_string() {
        let schema =
            Schema::from_json(&Value::String(r#"{"t": {"d": "date"}}"#.into())).unwrap();
        assert_eq!(schema.table("t").unwrap().columns[0].data_type, "DATE");
    }

    #[test]
    fn test_rejects_non_object() {
        let err = Schema::from_json(&json!([1, 2])).unwrap_err();
        assert_eq!(err.error_type(), "ValidationError");
        let err = Schema::from_json(&json!({"t": 5})).unwrap_err();
        assert_eq!(err.error_type(), "ValidationError");
        assert!(Schema::from_json(&Value::String("{oops".into())).is_err());
    }

    #[test]
    fn test_qualified_lookup() {
        let schema = Schema::from_json(&json!({"t": {"a": "INT"}})).unwrap();
        assert!(schema.table("db.t").is_some());
        assert!(schema.table("u").is_none());
    }

    #[test]
    fn test_type_family() {
        assert_eq!(TypeFamily::of("DATE"), TypeFamily::Date);
        assert_eq!(TypeFamily::of("DECIMAL(10,2)"), TypeFamily::Numeric);
        assert_eq!(TypeFamily::of("BOOLEAN"), TypeFamily::Boolean);
        assert_eq!(TypeFamily::of("JSON"), TypeFamily::Other);
    }
}
