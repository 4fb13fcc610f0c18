use serde_json::{json, Value};
use sqlkit::plugin::{ToolRegistry, ToolResponse};
use sqlkit::tools::ToolMessage;

fn invoke(tool: &str, parameters: Value) -> ToolResponse {
    ToolRegistry::with_defaults().invoke(tool, &parameters)
}

fn payload(response: &ToolResponse) -> Value {
    response.json().cloned().expect("response has a JSON message")
}

#[test]
fn test_beautify_is_idempotent() {
    let queries = [
        "select a,b from t1 left join t2 on t1.id=t2.id where a>1 and (b<2 or c is null) order by a desc limit 5",
        "with x as (select id from users where active) select * from x union select id from admins",
        "select dept, count(*) filter (where salary > 10) from emp group by dept having sum(salary) > 0",
        "insert into t (a, b) select a, b from s where a in (1, 2, 3)",
        "update t set a = a + 1 where b between 1 and 10",
    ];
    for sql in queries {
        let first = payload(&invoke("beautify", json!({ "sql": sql })));
        let formatted = first["formatted_sql"].as_str().unwrap().to_string();
        let second = payload(&invoke("beautify", json!({ "sql": formatted })));
        assert_eq!(second["formatted_sql"], formatted.as_str(), "for {}", sql);
    }
}

#[test]
fn test_convert_round_trip_is_stable() {
    let sql = "SELECT u.name, COUNT(*) AS n FROM users AS u WHERE u.age >= 21 AND u.name LIKE 'A%' \
               GROUP BY u.name ORDER BY n DESC LIMIT 10";
    for dialect in ["mysql", "tsql", "bigquery", "oracle", "snowflake", "sqlite"] {
        let there = payload(&invoke(
            "convert",
            json!({"sql": sql, "source_dialect": "postgres", "target_dialect": dialect, "pretty": false}),
        ));
        let back = payload(&invoke(
            "convert",
            json!({
                "sql": there["transpiled_sql"],
                "source_dialect": dialect,
                "target_dialect": "postgres",
                "pretty": false
            }),
        ));
        assert_eq!(
            back["transpiled_sql"],
            "SELECT u.name, COUNT(*) AS n FROM users AS u WHERE u.age >= 21 AND u.name LIKE 'A%' \
             GROUP BY u.name ORDER BY n DESC LIMIT 10",
            "via {}",
            dialect
        );
    }
}

#[test]
fn test_metadata_for_aliased_table() {
    let response = invoke("extract_metadata", json!({"sql": "SELECT a.x FROM t a"}));
    assert!(response.success);
    let meta = payload(&response);
    assert_eq!(meta["tables"], json!([{"name": "t", "alias": "a"}]));
    assert_eq!(meta["columns"], json!([{"name": "x", "table": "a"}]));
    assert_eq!(meta["joins"], json!([]));
    assert_eq!(meta["where_conditions"], json!([]));
}

#[test]
fn test_metadata_clause_order() {
    let meta = payload(&invoke(
        "extract_metadata",
        json!({
            "sql": "SELECT o.id, UPPER(c.name) AS cname FROM orders o \
                    LEFT JOIN customers c ON o.customer_id = c.id \
                    WHERE o.total > 10 AND c.active = TRUE \
                    ORDER BY o.id DESC"
        }),
    ));
    assert_eq!(meta["query_type"], "Select");
    assert_eq!(
        meta["joins"],
        json!([{"type": "LEFT", "table": "customers", "on_condition": "o.customer_id = c.id"}])
    );
    assert_eq!(meta["where_conditions"], json!(["o.total > 10", "c.active = TRUE"]));
    assert_eq!(meta["aliases"], json!([{"alias": "cname", "expression": "UPPER(c.name)"}]));
    assert_eq!(meta["order_by"], json!([{"expression": "o.id", "desc": true}]));
    assert_eq!(meta["functions"][0]["name"], "UPPER");
}

#[test]
fn test_check_syntax_reports_unclosed_parenthesis() {
    let response = invoke(
        "check_syntax",
        json!({"sql": "SELECT * FROM users WHERE (id = 1 AND name = 'John'"}),
    );
    // An invalid query is a report, not a tool failure.
    assert!(response.success);
    let report = payload(&response);
    assert_eq!(report["valid"], false);
    assert_eq!(report["line"], 1);
    assert_eq!(report["column"], 27);
}

#[test]
fn test_optimize_removes_tautology() {
    let response = invoke(
        "optimize",
        json!({
            "sql": "SELECT * FROM users WHERE active = TRUE OR active = FALSE",
            "pretty": false
        }),
    );
    let result = payload(&response);
    assert_eq!(result["optimized_sql"], "SELECT * FROM users");
    assert_eq!(result["passes"][0], "pushdown_predicates");
}

#[test]
fn test_optimize_pushdown_and_prune() {
    let response = invoke(
        "optimize",
        json!({
            "sql": "SELECT s.a FROM (SELECT a, b FROM t) AS s WHERE s.a > 1 + 1",
            "pretty": false
        }),
    );
    assert_eq!(
        payload(&response)["optimized_sql"],
        "SELECT s.a FROM (SELECT a FROM t WHERE a > 2) AS s"
    );
}

#[test]
fn test_execute_filters_rows() {
    let response = invoke(
        "execute_on_json",
        json!({
            "sql": "SELECT * FROM users WHERE age > 25",
            "tables": {"users": [
                {"id": 1, "name": "Alice", "age": 30},
                {"id": 2, "name": "Bob", "age": 22}
            ]}
        }),
    );
    assert!(response.success);
    let result = payload(&response);
    assert_eq!(result["success"], true);
    assert_eq!(result["row_count"], 1);
    assert_eq!(result["data"], json!([{"id": 1, "name": "Alice", "age": 30}]));
}

#[test]
fn test_execute_aggregates_and_joins() {
    let tables = json!({
        "users": [
            {"id": 1, "name": "Alice"},
            {"id": 2, "name": "Bob"},
            {"id": 3, "name": "Carol"}
        ],
        "orders": [
            {"user_id": 1, "total": 10.5},
            {"user_id": 1, "total": 4.5},
            {"user_id": 2, "total": 7}
        ]
    });
    let response = invoke(
        "execute_on_json",
        json!({
            "sql": "SELECT u.name, COUNT(o.total) AS n, SUM(o.total) AS spent \
                    FROM users u LEFT JOIN orders o ON u.id = o.user_id \
                    GROUP BY u.name ORDER BY spent DESC NULLS LAST",
            "tables": tables
        }),
    );
    let result = payload(&response);
    assert_eq!(
        result["data"],
        json!([
            {"name": "Alice", "n": 2, "spent": 15.0},
            {"name": "Bob", "n": 1, "spent": 7},
            {"name": "Carol", "n": 0, "spent": null}
        ])
    );
}

#[test]
fn test_execute_errors_are_failures() {
    let response = invoke(
        "execute_on_json",
        json!({"sql": "SELECT x FROM t", "tables": {"t": [{"a": 1}]}}),
    );
    assert!(!response.success);
    assert_eq!(payload(&response)["error_type"], "ExecutionError");

    let response = invoke(
        "execute_on_json",
        json!({"sql": "SELECT 1", "tables": {"t": "nope"}}),
    );
    assert_eq!(payload(&response)["error_type"], "ValidationError");
}

#[test]
fn test_unsupported_dialect_in_every_tool() {
    let calls = [
        ("convert", json!({"sql": "SELECT 1", "target_dialect": "cobol"})),
        ("beautify", json!({"sql": "SELECT 1", "dialect": "cobol"})),
        ("extract_metadata", json!({"sql": "SELECT 1", "dialect": "cobol"})),
        ("check_syntax", json!({"sql": "SELECT 1", "dialect": "cobol"})),
        ("optimize", json!({"sql": "SELECT 1", "dialect": "cobol"})),
        (
            "execute_on_json",
            json!({"sql": "SELECT 1", "dialect": "cobol", "tables": {}}),
        ),
    ];
    for (tool, params) in calls {
        let response = invoke(tool, params);
        assert!(!response.success, "{} should fail", tool);
        assert_eq!(response.messages.len(), 2);
        assert!(matches!(
            &response.messages[0],
            ToolMessage::Text { text } if text.contains("Unsupported dialect: 'cobol'")
        ));
        let body = payload(&response);
        assert_eq!(body["error_type"], "UnsupportedDialect", "for {}", tool);
        assert_eq!(body["success"], false);
    }
}

#[test]
fn test_every_supported_dialect_is_accepted() {
    for dialect in sqlkit::dialect::Dialect::ALL {
        let response = invoke(
            "convert",
            json!({"sql": "SELECT a FROM t WHERE b = 1", "target_dialect": dialect.name()}),
        );
        assert!(response.success, "convert to {} failed", dialect.name());
    }
}
