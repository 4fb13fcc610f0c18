//! Benchmarks for the sqlkit pipeline.
//!
//! Covers parsing, dialect rendering, pretty printing, the optimizer
//! pipeline and the JSON executor.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use sqlkit::ast::{compile_with, format_sql, parse_single, parse_sql, GenerateOptions, Optimizer};
use sqlkit::dialect::Dialect;
use sqlkit::engine::{execute, TableSet};

const SIMPLE_SELECT: &str = "SELECT * FROM users";

const FILTERED: &str =
    "SELECT id, name, email FROM users WHERE age > 18 AND status = 'active' ORDER BY name LIMIT 20";

const MULTI_JOIN: &str = "SELECT u.name, o.id, p.name AS product, oi.quantity \
    FROM users u \
    JOIN orders o ON u.id = o.user_id \
    JOIN order_items oi ON o.id = oi.order_id \
    LEFT JOIN products p ON oi.product_id = p.id \
    WHERE o.status = 'completed' AND u.active = TRUE";

const AGGREGATION: &str = "SELECT department, COUNT(*) AS headcount, AVG(salary) AS avg_salary \
    FROM employees \
    WHERE hire_date > DATE '2020-01-01' \
    GROUP BY department \
    HAVING COUNT(*) > 5 \
    ORDER BY avg_salary DESC";

const CTE_QUERY: &str = "WITH active AS (SELECT id, name FROM users WHERE status = 'active'), \
    spend AS (SELECT user_id, SUM(total) AS total FROM orders GROUP BY user_id) \
    SELECT a.name, s.total FROM active a JOIN spend s ON a.id = s.user_id \
    WHERE s.total > 1000";

const SUBQUERY: &str = "SELECT u.name FROM users u \
    WHERE u.id IN (SELECT DISTINCT user_id FROM orders WHERE total > 500) \
    AND EXISTS (SELECT 1 FROM reviews r WHERE r.user_id = u.id AND r.rating > 4)";

const REDUNDANT: &str = "SELECT * FROM (SELECT id, name, age FROM users) AS sub \
    WHERE 1 = 1 AND sub.age > 10 + 8 AND NOT (sub.name IS NULL) AND (sub.id = sub.id OR TRUE)";

fn cases() -> [(&'static str, &'static str); 7] {
    [
        ("simple_select", SIMPLE_SELECT),
        ("filtered", FILTERED),
        ("multi_join", MULTI_JOIN),
        ("aggregation", AGGREGATION),
        ("cte", CTE_QUERY),
        ("subquery", SUBQUERY),
        ("redundant", REDUNDANT),
    ]
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    for (name, sql) in cases() {
        group.bench_with_input(BenchmarkId::new("parse", name), sql, |b, sql| {
            b.iter(|| parse_single(black_box(sql), None).unwrap());
        });
    }
    let batch = cases().map(|(_, sql)| sql).join(";\n");
    group.bench_function("parse_batch", |b| {
        b.iter(|| parse_sql(black_box(&batch), None).unwrap());
    });
    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    let targets = [Dialect::Postgres, Dialect::TSql, Dialect::BigQuery];
    for (name, sql) in cases() {
        let ast = parse_single(sql, None).unwrap();
        for dialect in targets {
            let opts = GenerateOptions::for_dialect(Some(dialect));
            group.bench_with_input(
                BenchmarkId::new(format!("compile_{}", dialect.name()), name),
                &ast,
                |b, ast| b.iter(|| compile_with(black_box(ast), &opts)),
            );
        }
        group.bench_with_input(BenchmarkId::new("format", name), &ast, |b, ast| {
            b.iter(|| format_sql(black_box(ast)));
        });
    }
    group.finish();
}

fn bench_optimization(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimization");
    let optimizer = Optimizer::with_defaults();
    for (name, sql) in cases() {
        let ast = parse_single(sql, None).unwrap();
        group.bench_with_input(BenchmarkId::new("optimize", name), &ast, |b, ast| {
            b.iter(|| optimizer.optimize(black_box(ast.clone())).unwrap());
        });
    }
    group.finish();
}

fn sample_tables(rows: usize) -> TableSet {
    let users: Vec<_> = (0..rows)
        .map(|i| json!({"id": i, "name": format!("user{}", i), "age": 18 + (i % 50), "dept": i % 7}))
        .collect();
    let orders: Vec<_> = (0..rows * 3)
        .map(|i| json!({"id": i, "user_id": i % rows, "total": (i * 37) % 500}))
        .collect();
    TableSet::from_json(&json!({"users": users, "orders": orders})).unwrap()
}

fn bench_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution");
    let queries = [
        ("filter", "SELECT name FROM users WHERE age > 40 ORDER BY name"),
        (
            "group_by",
            "SELECT dept, COUNT(*), AVG(age) FROM users GROUP BY dept ORDER BY dept",
        ),
        (
            "join",
            "SELECT u.name, SUM(o.total) AS spent FROM users u JOIN orders o ON u.id = o.user_id \
             GROUP BY u.name ORDER BY spent DESC LIMIT 10",
        ),
    ];
    for rows in [50usize, 200] {
        let tables = sample_tables(rows);
        for (name, sql) in queries {
            let ast = parse_single(sql, None).unwrap();
            group.bench_with_input(
                BenchmarkId::new(name, rows),
                &ast,
                |b, ast| b.iter(|| execute(black_box(ast), &tables).unwrap()),
            );
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parsing,
    bench_generation,
    bench_optimization,
    bench_execution,
);
criterion_main!(benches);
