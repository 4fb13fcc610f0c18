/// SQL pretty-printer / formatter.
///
/// Converts a Query AST into well-indented, readable SQL. Clause layout lives
/// here; everything inside a clause (expressions, identifiers, table names)
/// is rendered single-line by the compiler's [`Generator`], which keeps the
/// output stable under repeated formatting.
use super::compiler::{GenerateOptions, Generator};
use super::types::*;

const INDENT: &str = "    ";

/// Format a query AST into pretty-printed generic SQL.
pub fn format_sql(query: &Query) -> String {
    format_with(query, &GenerateOptions::default())
}

/// Format a query AST for the dialect and identifier policy in `opts`.
pub fn format_with(query: &Query, opts: &GenerateOptions) -> String {
    let gen = Generator::new(*opts);
    format_query(&gen, query, 0)
}

fn indent(level: usize) -> String {
    INDENT.repeat(level)
}

fn format_query(gen: &Generator, query: &Query, depth: usize) -> String {
    match query {
        Query::Select(s) => format_select(gen, s, depth),
        Query::Insert(i) => format_insert(gen, i, depth),
        Query::Update(u) => format_update(gen, u, depth),
        Query::Delete(d) => format_delete(gen, d, depth),
        Query::With(cte) => format_cte(gen, cte, depth),
        Query::Raw(raw) => format!("{}{}", indent(depth), raw.sql),
    }
}

fn format_select(gen: &Generator, select: &SelectQuery, depth: usize) -> String {
    let prefix = indent(depth);
    let mut parts: Vec<String> = Vec::new();
    let limit = gen.row_limit(select);

    // SELECT [DISTINCT] [TOP n]
    let mut select_clause = format!("{}{}", prefix, gen.select_head(select, &limit));

    if select.projections.is_empty() {
        select_clause.push_str(" *");
    } else if select.projections.len() == 1 {
        select_clause.push_str(&format!(" {}", gen.select_item(&select.projections[0])));
    } else {
        for (i, item) in select.projections.iter().enumerate() {
            let comma = if i < select.projections.len() - 1 {
                ","
            } else {
                ""
            };
            select_clause.push_str(&format!(
                "\n{}{}{}{}",
                prefix,
                INDENT,
                gen.select_item(item),
                comma
            ));
        }
    }
    parts.push(select_clause);

    // FROM
    if !select.from.is_empty() {
        if select.from.len() == 1 {
            parts.push(format!(
                "{}FROM {}",
                prefix,
                format_table_ref(gen, &select.from[0], depth)
            ));
        } else {
            let mut from_clause = format!("{}FROM", prefix);
            for (i, table) in select.from.iter().enumerate() {
                let comma = if i < select.from.len() - 1 { "," } else { "" };
                from_clause.push_str(&format!(
                    "\n{}{}{}{}",
                    prefix,
                    INDENT,
                    format_table_ref(gen, table, depth + 1),
                    comma
                ));
            }
            parts.push(from_clause);
        }
    }

    // JOINs
    for join in &select.joins {
        parts.push(format_join(gen, join, depth));
    }

    if let Some(ref filter) = select.filter {
        parts.push(format!("{}WHERE {}", prefix, gen.expr(filter)));
    }

    if !select.group_by.is_empty() {
        let groups: Vec<String> = select.group_by.iter().map(|g| gen.expr(g)).collect();
        parts.push(format!("{}GROUP BY {}", prefix, groups.join(", ")));
    }

    if let Some(ref having) = select.having {
        parts.push(format!("{}HAVING {}", prefix, gen.expr(having)));
    }

    if let Some(windows) = gen.window_clause(select) {
        parts.push(format!("{}{}", prefix, windows));
    }

    // Set operations bind before the trailing ORDER BY / LIMIT of the chain
    if let Some(ref set_op) = select.set_op {
        parts.push(format!("{}{}", prefix, Generator::set_operator(set_op)));
        parts.push(format_query(gen, &set_op.right, depth));
    }

    if !select.order_by.is_empty() {
        let orders: Vec<String> = select.order_by.iter().map(|o| gen.order_by(o)).collect();
        parts.push(format!("{}ORDER BY {}", prefix, orders.join(", ")));
    } else if limit.order_placeholder {
        parts.push(format!("{}ORDER BY (SELECT NULL)", prefix));
    }

    for clause in limit.clauses {
        parts.push(format!("{}{}", prefix, clause));
    }

    parts.join("\n")
}

fn format_table_ref(gen: &Generator, table: &TableRef, depth: usize) -> String {
    match table {
        TableRef::Subquery { query, alias } => format!(
            "(\n{}\n{}){}",
            format_query(gen, query, depth + 1),
            indent(depth),
            gen.alias_clause(alias)
        ),
        other => gen.table_ref(other),
    }
}

fn format_join(gen: &Generator, join: &Join, depth: usize) -> String {
    let prefix = indent(depth);
    let table_str = format_table_ref(gen, &join.table, depth);

    let condition_str = match &join.condition {
        Some(JoinCondition::On(expr)) => {
            format!("\n{}{}ON {}", prefix, INDENT, gen.expr(expr))
        }
        _ => gen
            .join_condition(join)
            .map(|cond| format!(" {}", cond))
            .unwrap_or_default(),
    };

    format!(
        "{}{} {}{}",
        prefix,
        gen.join_keyword(join),
        table_str,
        condition_str
    )
}

fn format_cte(gen: &Generator, cte: &CTEQuery, depth: usize) -> String {
    let prefix = indent(depth);
    let ctes: Vec<String> = cte
        .ctes
        .iter()
        .map(|c| {
            format!(
                "{} AS (\n{}\n{})",
                gen.cte_name(c),
                format_query(gen, &c.query, depth + 1),
                prefix
            )
        })
        .collect();

    format!(
        "{}{}{}\n{}",
        prefix,
        gen.with_keyword(cte),
        ctes.join(", "),
        format_query(gen, &cte.body, depth)
    )
}

fn format_returning(gen: &Generator, items: &[SelectItem], prefix: &str) -> String {
    if items.is_empty() {
        return String::new();
    }
    let items: Vec<String> = items.iter().map(|i| gen.select_item(i)).collect();
    format!("\n{}RETURNING {}", prefix, items.join(", "))
}

fn format_insert(gen: &Generator, insert: &InsertQuery, depth: usize) -> String {
    let prefix = indent(depth);
    let table = gen.table_ref(&insert.table);
    let columns = if insert.columns.is_empty() {
        String::new()
    } else {
        let cols: Vec<String> = insert.columns.iter().map(|c| gen.ident(c)).collect();
        format!(" ({})", cols.join(", "))
    };

    let source = match &insert.source {
        InsertSource::Values(rows) => {
            let row_strs: Vec<String> = rows
                .iter()
                .map(|row| {
                    let vals: Vec<String> = row.iter().map(|v| gen.expr(v)).collect();
                    format!("{}{}({})", prefix, INDENT, vals.join(", "))
                })
                .collect();
            format!("{}VALUES\n{}", prefix, row_strs.join(",\n"))
        }
        InsertSource::Query(q) => format_query(gen, q, depth),
    };

    format!(
        "{}INSERT INTO {}{}\n{}{}",
        prefix,
        table,
        columns,
        source,
        format_returning(gen, &insert.returning, &prefix)
    )
}

fn format_update(gen: &Generator, update: &UpdateQuery, depth: usize) -> String {
    let prefix = indent(depth);
    let sets: Vec<String> = update
        .assignments
        .iter()
        .map(|a| format!("{}{}{}", prefix, INDENT, gen.assignment(a)))
        .collect();

    let filter = match &update.filter {
        Some(f) => format!("\n{}WHERE {}", prefix, gen.expr(f)),
        None => String::new(),
    };

    format!(
        "{}UPDATE {}\n{}SET\n{}{}{}",
        prefix,
        gen.table_ref(&update.table),
        prefix,
        sets.join(",\n"),
        filter,
        format_returning(gen, &update.returning, &prefix)
    )
}

fn format_delete(gen: &Generator, delete: &DeleteQuery, depth: usize) -> String {
    let prefix = indent(depth);
    let filter = match &delete.filter {
        Some(f) => format!("\n{}WHERE {}", prefix, gen.expr(f)),
        None => String::new(),
    };

    format!(
        "{}DELETE FROM {}{}{}",
        prefix,
        gen.table_ref(&delete.table),
        filter,
        format_returning(gen, &delete.returning, &prefix)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parser::parse_single;
    use crate::dialect::Dialect;

    fn format_roundtrip(sql: &str) -> String {
        let query = parse_single(sql, None).expect("Failed to parse");
        format_sql(&query)
    }

    #[test]
    fn test_format_simple_select() {
        assert_eq!(format_roundtrip("SELECT * FROM users"), "SELECT *\nFROM users");
    }

    #[test]
    fn test_format_multicolumn_select() {
        let result = format_roundtrip("SELECT id, name, email FROM users");
        assert_eq!(result, "SELECT\n    id,\n    name,\n    email\nFROM users");
    }

    #[test]
    fn test_format_select_with_where() {
        let result = format_roundtrip("SELECT id, name FROM users WHERE age > 18");
        assert!(result.ends_with("\nWHERE age > 18"));
    }

    #[test]
    fn test_format_join() {
        let result =
            format_roundtrip("SELECT * FROM users JOIN orders ON users.id = orders.user_id");
        assert_eq!(
            result,
            "SELECT *\nFROM users\nJOIN orders\n    ON users.id = orders.user_id"
        );
    }

    #[test]
    fn test_format_join_using_stays_inline() {
        let result = format_roundtrip("SELECT * FROM a JOIN b USING (id)");
        assert!(result.contains("\nJOIN b USING (id)"));
    }

    #[test]
    fn test_format_group_by_having() {
        let result = format_roundtrip(
            "SELECT dept, COUNT(*) FROM emp GROUP BY dept HAVING COUNT(*) > 5",
        );
        assert!(result.contains("\nGROUP BY dept"));
        assert!(result.contains("\nHAVING COUNT(*) > 5"));
    }

    #[test]
    fn test_format_order_by_limit() {
        let result = format_roundtrip("SELECT * FROM users ORDER BY name ASC LIMIT 10 OFFSET 5");
        assert!(result.ends_with("ORDER BY name ASC\nLIMIT 10\nOFFSET 5"));
    }

    #[test]
    fn test_format_derived_table_indented() {
        let result = format_roundtrip("SELECT x FROM (SELECT a AS x FROM t) AS sub");
        assert_eq!(
            result,
            "SELECT x\nFROM (\n    SELECT a AS x\n    FROM t\n) AS sub"
        );
    }

    #[test]
    fn test_format_cte() {
        let result = format_roundtrip(
            "WITH active AS (SELECT * FROM users WHERE active = TRUE) SELECT * FROM active",
        );
        assert_eq!(
            result,
            "WITH active AS (\n    SELECT *\n    FROM users\n    WHERE active = TRUE\n)\nSELECT *\nFROM active"
        );
    }

    #[test]
    fn test_format_insert() {
        let result =
            format_roundtrip("INSERT INTO users (name, email) VALUES ('John', 'john@example.com')");
        assert_eq!(
            result,
            "INSERT INTO users (name, email)\nVALUES\n    ('John', 'john@example.com')"
        );
    }

    #[test]
    fn test_format_update() {
        let result = format_roundtrip("UPDATE users SET name = 'Jane' WHERE id = 1");
        assert_eq!(result, "UPDATE users\nSET\n    name = 'Jane'\nWHERE id = 1");
    }

    #[test]
    fn test_format_delete() {
        let result = format_roundtrip("DELETE FROM users WHERE id = 1");
        assert_eq!(result, "DELETE FROM users\nWHERE id = 1");
    }

    #[test]
    fn test_format_is_reparseable() {
        let test_cases = vec![
            "SELECT * FROM users",
            "SELECT id, name FROM users WHERE age > 18",
            "SELECT * FROM users ORDER BY name LIMIT 10",
            "INSERT INTO users (name) VALUES ('John')",
            "UPDATE users SET name = 'Jane' WHERE id = 1",
            "DELETE FROM users WHERE id = 1",
        ];

        for sql in test_cases {
            let formatted = format_roundtrip(sql);
            let reparsed = parse_single(&formatted, None);
            assert!(
                reparsed.is_ok(),
                "Formatted SQL not reparseable: {} -> {} -> {:?}",
                sql,
                formatted,
                reparsed.err()
            );
        }
    }

    #[test]
    fn test_format_is_idempotent() {
        let test_cases = vec![
            "select a, b from t1 join t2 on t1.id = t2.id where a > 1 and b < 2 order by a desc",
            "SELECT x FROM (SELECT a AS x FROM t WHERE a IN (SELECT b FROM u)) AS sub",
            "WITH c AS (SELECT 1 AS n) SELECT n FROM c UNION ALL SELECT 2",
            "SELECT COUNT(*) FILTER (WHERE x > 1) FROM t GROUP BY y HAVING SUM(z) > 0",
        ];
        for sql in test_cases {
            let once = format_roundtrip(sql);
            let twice = format_roundtrip(&once);
            assert_eq!(once, twice, "not idempotent for {}", sql);
        }
    }

    #[test]
    fn test_format_window_function() {
        let result = format_roundtrip(
            "SELECT name, ROW_NUMBER() OVER (PARTITION BY dept ORDER BY salary DESC) FROM employees",
        );
        assert!(result.contains("ROW_NUMBER() OVER (PARTITION BY dept ORDER BY salary DESC)"));
    }

    #[test]
    fn test_format_union() {
        let result = format_roundtrip("SELECT id FROM users UNION ALL SELECT id FROM admins");
        assert_eq!(
            result,
            "SELECT id\nFROM users\nUNION ALL\nSELECT id\nFROM admins"
        );
    }

    #[test]
    fn test_format_dialect_top() {
        let query = parse_single("SELECT id, name FROM users LIMIT 3", None).unwrap();
        let opts = GenerateOptions::for_dialect(Some(Dialect::TSql));
        assert!(format_with(&query, &opts).starts_with("SELECT TOP 3\n    id,"));
    }

    #[test]
    fn test_format_identify() {
        let query = parse_single("SELECT id FROM users", None).unwrap();
        let opts = GenerateOptions {
            dialect: Some(Dialect::MySql),
            identify: true,
            normalize: false,
        };
        assert_eq!(format_with(&query, &opts), "SELECT `id`\nFROM `users`");
    }
}
