//! Name resolution for the schema-aware passes.
use crate::ast::schema::{Schema, TableSchema};
use crate::ast::types::*;

/// A FROM source visible to column references.
#[derive(Debug, Clone)]
pub struct Source<'a> {
    /// Name other clauses qualify columns with; `None` for verbatim factors.
    pub qualifier: Option<String>,
    /// Column list when the schema describes the source.
    pub table: Option<&'a TableSchema>,
}

impl Source<'_> {
    pub fn matches(&self, qualifier: &str) -> bool {
        let last = qualifier.rsplit('.').next().unwrap_or(qualifier);
        self.qualifier
            .as_deref()
            .map_or(false, |q| q.eq_ignore_ascii_case(last))
    }
}

/// Sources of one SELECT block, in FROM/JOIN order.
pub fn select_sources<'a>(
    select: &SelectQuery,
    schema: &'a Schema,
    ctes: &[String],
) -> Vec<Source<'a>> {
    select
        .from
        .iter()
        .chain(select.joins.iter().map(|j| &j.table))
        .map(|t| table_source(t, schema, ctes))
        .collect()
}

pub fn table_source<'a>(table: &TableRef, schema: &'a Schema, ctes: &[String]) -> Source<'a> {
    match table {
        TableRef::Table {
            schema: db,
            name,
            alias,
        } => {
            let shadowed = db.is_none() && ctes.contains(&name.to_lowercase());
            let described = if shadowed {
                None
            } else {
                let full = match db {
                    Some(db) => format!("{}.{}", db, name),
                    None => name.clone(),
                };
                schema.table(&full)
            };
            Source {
                qualifier: Some(alias.clone().unwrap_or_else(|| name.clone())),
                table: described,
            }
        }
        TableRef::Subquery { alias, .. } => Source {
            qualifier: Some(alias.clone()),
            table: None,
        },
        TableRef::Function { name, alias, .. } => Source {
            qualifier: Some(alias.clone().unwrap_or_else(|| name.clone())),
            table: None,
        },
        TableRef::Raw(_) => Source {
            qualifier: None,
            table: None,
        },
    }
}

/// Type of a column reference resolved within a single scope. Unqualified
/// names resolve only when exactly one described source has the column and
/// no undescribed source could also provide it.
pub fn column_type<'a>(
    scope: &[Source<'a>],
    table: Option<&str>,
    name: &str,
) -> Option<&'a str> {
    match table {
        Some(q) => {
            let source = scope.iter().find(|s| s.matches(q))?;
            source
                .table?
                .column(name)
                .map(|c| c.data_type.as_str())
        }
        None => {
            if scope.iter().any(|s| s.table.is_none()) {
                return None;
            }
            let mut hits = scope
                .iter()
                .filter_map(|s| s.table?.column(name));
            let first = hits.next()?;
            if hits.next().is_some() {
                return None;
            }
            Some(first.data_type.as_str())
        }
    }
}

/// Output name of a projection item, when it has one.
pub fn output_name(item: &SelectItem) -> Option<&str> {
    match item {
        SelectItem::Expression {
            alias: Some(alias), ..
        } => Some(alias),
        SelectItem::Expression {
            expr: Expression::Column { name, .. },
            alias: None,
        } => Some(name),
        _ => None,
    }
}
