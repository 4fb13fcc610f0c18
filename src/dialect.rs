//! Supported SQL dialects.
//!
//! The set of names is part of the plugin's public contract: callers pass
//! these strings verbatim. Each dialect knows which `sqlparser` dialect reads
//! it and how the generator should render the constructs that differ between
//! engines (quoting, row limits, concatenation, literals, functions, types).
use std::any::TypeId;
use std::fmt;
use std::str::FromStr;

use sqlparser::dialect as sp;
use sqlparser::dialect::Dialect as _;

use crate::error::SqlToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Athena,
    BigQuery,
    ClickHouse,
    Databricks,
    Doris,
    Dremio,
    Drill,
    Druid,
    DuckDb,
    Dune,
    Exasol,
    Fabric,
    Hive,
    Materialize,
    MySql,
    Oracle,
    Postgres,
    Presto,
    Prql,
    Redshift,
    RisingWave,
    SingleStore,
    Snowflake,
    Spark,
    Spark2,
    Sqlite,
    StarRocks,
    Tableau,
    Teradata,
    Trino,
    TSql,
}

/// How a dialect delimits identifiers that need quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    Double,
    Backtick,
    Bracket,
}

/// How a dialect restricts the number of returned rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `LIMIT n OFFSET m`
    Limit,
    /// `SELECT TOP n ...`, falling back to `OFFSET .. FETCH` when an offset is present.
    Top,
    /// `OFFSET m ROWS FETCH FIRST n ROWS ONLY`
    Fetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatStyle {
    /// `a || b`
    Pipes,
    /// `CONCAT(a, b)`
    Function,
    /// `a + b`
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalStyle {
    /// `INTERVAL '1' DAY`
    Standard,
    /// `INTERVAL '1 DAY'`
    Quoted,
    /// `INTERVAL 1 DAY`
    Bare,
}

impl Dialect {
    pub const ALL: [Dialect; 31] = [
        Dialect::Athena,
        Dialect::BigQuery,
        Dialect::ClickHouse,
        Dialect::Databricks,
        Dialect::Doris,
        Dialect::Dremio,
        Dialect::Drill,
        Dialect::Druid,
        Dialect::DuckDb,
        Dialect::Dune,
        Dialect::Exasol,
        Dialect::Fabric,
        Dialect::Hive,
        Dialect::Materialize,
        Dialect::MySql,
        Dialect::Oracle,
        Dialect::Postgres,
        Dialect::Presto,
        Dialect::Prql,
        Dialect::Redshift,
        Dialect::RisingWave,
        Dialect::SingleStore,
        Dialect::Snowflake,
        Dialect::Spark,
        Dialect::Spark2,
        Dialect::Sqlite,
        Dialect::StarRocks,
        Dialect::Tableau,
        Dialect::Teradata,
        Dialect::Trino,
        Dialect::TSql,
    ];

    /// The identifier callers use for this dialect.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Athena => "athena",
            Dialect::BigQuery => "bigquery",
            Dialect::ClickHouse => "clickhouse",
            Dialect::Databricks => "databricks",
            Dialect::Doris => "doris",
            Dialect::Dremio => "dremio",
            Dialect::Drill => "drill",
            Dialect::Druid => "druid",
            Dialect::DuckDb => "duckdb",
            Dialect::Dune => "dune",
            Dialect::Exasol => "exasol",
            Dialect::Fabric => "fabric",
            Dialect::Hive => "hive",
            Dialect::Materialize => "materialize",
            Dialect::MySql => "mysql",
            Dialect::Oracle => "oracle",
            Dialect::Postgres => "postgres",
            Dialect::Presto => "presto",
            Dialect::Prql => "prql",
            Dialect::Redshift => "redshift",
            Dialect::RisingWave => "risingwave",
            Dialect::SingleStore => "singlestore",
            Dialect::Snowflake => "snowflake",
            Dialect::Spark => "spark",
            Dialect::Spark2 => "spark2",
            Dialect::Sqlite => "sqlite",
            Dialect::StarRocks => "starrocks",
            Dialect::Tableau => "tableau",
            Dialect::Teradata => "teradata",
            Dialect::Trino => "trino",
            Dialect::TSql => "tsql",
        }
    }

    /// Parse an optional dialect parameter. Empty or whitespace-only input
    /// means "auto-detect" and yields `None`.
    pub fn from_param(value: Option<&str>) -> Result<Option<Dialect>, SqlToolError> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => name.parse().map(Some),
        }
    }

    /// Label used in responses: the dialect name, or `auto-detected`.
    pub fn label(dialect: Option<Dialect>) -> &'static str {
        dialect.map(|d| d.name()).unwrap_or("auto-detected")
    }

    /// The `sqlparser` dialect used to read SQL written in this dialect.
    pub fn parser_dialect(&self) -> Box<dyn sp::Dialect> {
        match self {
            Dialect::BigQuery => Box::new(sp::BigQueryDialect {}),
            Dialect::ClickHouse => Box::new(sp::ClickHouseDialect {}),
            Dialect::Databricks | Dialect::Spark | Dialect::Spark2 => {
                Box::new(sp::DatabricksDialect {})
            }
            Dialect::Doris | Dialect::MySql | Dialect::SingleStore | Dialect::StarRocks => {
                Box::new(sp::MySqlDialect {})
            }
            Dialect::DuckDb => Box::new(sp::DuckDbDialect {}),
            Dialect::Fabric | Dialect::TSql => Box::new(sp::MsSqlDialect {}),
            Dialect::Hive => Box::new(sp::HiveDialect {}),
            Dialect::Materialize | Dialect::Postgres | Dialect::RisingWave => {
                Box::new(sp::PostgreSqlDialect {})
            }
            Dialect::Redshift => Box::new(sp::RedshiftSqlDialect {}),
            Dialect::Snowflake => Box::new(sp::SnowflakeDialect {}),
            Dialect::Sqlite => Box::new(sp::SQLiteDialect {}),
            Dialect::Athena
            | Dialect::Dremio
            | Dialect::Drill
            | Dialect::Druid
            | Dialect::Dune
            | Dialect::Exasol
            | Dialect::Oracle
            | Dialect::Presto
            | Dialect::Prql
            | Dialect::Tableau
            | Dialect::Teradata
            | Dialect::Trino => Box::new(AutoDialect::default()),
        }
    }

    pub fn quote_style(&self) -> QuoteStyle {
        match self {
            Dialect::BigQuery
            | Dialect::Databricks
            | Dialect::Doris
            | Dialect::Drill
            | Dialect::Hive
            | Dialect::MySql
            | Dialect::SingleStore
            | Dialect::Spark
            | Dialect::Spark2
            | Dialect::StarRocks => QuoteStyle::Backtick,
            Dialect::Fabric | Dialect::TSql | Dialect::Tableau => QuoteStyle::Bracket,
            _ => QuoteStyle::Double,
        }
    }

    pub fn limit_style(&self) -> LimitStyle {
        match self {
            Dialect::Fabric | Dialect::TSql | Dialect::Teradata => LimitStyle::Top,
            Dialect::Oracle => LimitStyle::Fetch,
            _ => LimitStyle::Limit,
        }
    }

    pub fn concat_style(&self) -> ConcatStyle {
        match self {
            Dialect::Doris | Dialect::MySql | Dialect::SingleStore | Dialect::StarRocks => {
                ConcatStyle::Function
            }
            Dialect::Fabric | Dialect::TSql => ConcatStyle::Plus,
            _ => ConcatStyle::Pipes,
        }
    }

    pub fn interval_style(&self) -> IntervalStyle {
        match self {
            Dialect::Postgres
            | Dialect::Materialize
            | Dialect::RisingWave
            | Dialect::Redshift
            | Dialect::Snowflake => IntervalStyle::Quoted,
            Dialect::BigQuery
            | Dialect::MySql
            | Dialect::Doris
            | Dialect::SingleStore
            | Dialect::StarRocks
            | Dialect::Hive
            | Dialect::Spark
            | Dialect::Spark2
            | Dialect::Databricks
            | Dialect::ClickHouse => IntervalStyle::Bare,
            _ => IntervalStyle::Standard,
        }
    }

    /// Whether `TRUE`/`FALSE` literals exist; otherwise `1`/`0` are emitted.
    pub fn supports_boolean_literals(&self) -> bool {
        !matches!(self, Dialect::Fabric | Dialect::TSql | Dialect::Oracle)
    }

    pub fn supports_ilike(&self) -> bool {
        matches!(
            self,
            Dialect::Postgres
                | Dialect::Materialize
                | Dialect::RisingWave
                | Dialect::Redshift
                | Dialect::Snowflake
                | Dialect::DuckDb
                | Dialect::ClickHouse
                | Dialect::Databricks
                | Dialect::Spark
                | Dialect::Exasol
        )
    }

    /// Whether `DATE '...'` literals are accepted; otherwise a CAST is emitted.
    pub fn supports_typed_literals(&self) -> bool {
        !matches!(self, Dialect::Fabric | Dialect::TSql)
    }

    /// Whether `expr::TYPE` casts are understood.
    pub fn supports_double_colon_cast(&self) -> bool {
        matches!(
            self,
            Dialect::Postgres
                | Dialect::Materialize
                | Dialect::RisingWave
                | Dialect::Redshift
                | Dialect::DuckDb
                | Dialect::Snowflake
        )
    }

    /// Whether `WITH RECURSIVE` is spelled out; T-SQL and Oracle infer it.
    pub fn supports_recursive_keyword(&self) -> bool {
        !matches!(self, Dialect::Fabric | Dialect::TSql | Dialect::Oracle)
    }

    /// Oracle rejects `AS` between a table and its alias.
    pub fn supports_table_alias_as(&self) -> bool {
        !matches!(self, Dialect::Oracle)
    }

    /// Rename a canonical function name for this dialect.
    pub fn function_name<'a>(&self, canonical: &'a str) -> &'a str {
        match (self, canonical) {
            (Dialect::TSql | Dialect::Fabric, "LENGTH") => "LEN",
            (Dialect::TSql | Dialect::Fabric, "CEIL") => "CEILING",
            (Dialect::TSql | Dialect::Fabric, "CURRENT_TIMESTAMP") => "GETDATE",
            (Dialect::TSql | Dialect::Fabric, "RANDOM") => "RAND",
            (
                Dialect::MySql | Dialect::Doris | Dialect::SingleStore | Dialect::StarRocks,
                "LENGTH",
            ) => "CHAR_LENGTH",
            (
                Dialect::MySql
                | Dialect::Doris
                | Dialect::SingleStore
                | Dialect::StarRocks
                | Dialect::Sqlite,
                "STRING_AGG",
            ) => "GROUP_CONCAT",
            (
                Dialect::MySql
                | Dialect::Doris
                | Dialect::SingleStore
                | Dialect::StarRocks
                | Dialect::BigQuery
                | Dialect::Hive
                | Dialect::Spark
                | Dialect::Spark2
                | Dialect::Databricks,
                "RANDOM",
            ) => "RAND",
            (Dialect::Oracle | Dialect::Sqlite | Dialect::BigQuery, "SUBSTRING") => "SUBSTR",
            (Dialect::Oracle | Dialect::Snowflake, "STRING_AGG") => "LISTAGG",
            _ => canonical,
        }
    }

    /// Render a canonical data type name (see [`canonical_type`]) for this dialect.
    pub fn data_type(&self, canonical: &str) -> String {
        let (head, suffix) = split_type(canonical);
        let mapped = match (self, head.as_str()) {
            (Dialect::BigQuery, "INT" | "INTEGER" | "BIGINT" | "SMALLINT") => "INT64",
            (Dialect::BigQuery, "DOUBLE" | "FLOAT" | "REAL") => "FLOAT64",
            (Dialect::BigQuery, "TEXT" | "VARCHAR" | "CHAR") => return "STRING".to_string(),
            (Dialect::BigQuery, "BOOLEAN") => "BOOL",
            (Dialect::BigQuery, "DECIMAL") => "NUMERIC",
            (Dialect::Hive | Dialect::Spark | Dialect::Spark2 | Dialect::Databricks, "TEXT") => {
                "STRING"
            }
            (
                Dialect::MySql | Dialect::Doris | Dialect::SingleStore | Dialect::StarRocks,
                "TEXT" | "VARCHAR",
            ) => return "CHAR".to_string(),
            (
                Dialect::MySql | Dialect::Doris | Dialect::SingleStore | Dialect::StarRocks,
                "INT" | "INTEGER" | "BIGINT",
            ) => "SIGNED",
            (Dialect::TSql | Dialect::Fabric, "TEXT") => "VARCHAR(MAX)",
            (Dialect::TSql | Dialect::Fabric, "BOOLEAN") => "BIT",
            (Dialect::TSql | Dialect::Fabric, "DOUBLE") => "FLOAT",
            (Dialect::TSql | Dialect::Fabric, "TIMESTAMP") => "DATETIME2",
            (Dialect::Oracle, "VARCHAR") => "VARCHAR2",
            (Dialect::Oracle, "TEXT") => "CLOB",
            (
                Dialect::Postgres | Dialect::Materialize | Dialect::RisingWave | Dialect::Redshift,
                "DOUBLE",
            ) => "DOUBLE PRECISION",
            _ => return canonical.to_string(),
        };
        format!("{}{}", mapped, suffix)
    }
}

/// Map dialect-specific type spellings onto one canonical upper-case name.
pub fn canonical_type(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let (head, suffix) = split_type(&upper);
    let canonical = match head.as_str() {
        "INT64" | "SIGNED" | "LONG" => "BIGINT",
        "INT4" => "INT",
        "INT8" => "BIGINT",
        "FLOAT64" | "FLOAT8" | "DOUBLE PRECISION" => "DOUBLE",
        "FLOAT4" => "REAL",
        "STRING" | "CLOB" => "TEXT",
        "VARCHAR2" | "NVARCHAR" | "NVARCHAR2" | "CHARACTER VARYING" => "VARCHAR",
        "BOOL" | "BIT" => "BOOLEAN",
        "DATETIME2" | "DATETIME" => "TIMESTAMP",
        "NUMERIC" | "NUMBER" => "DECIMAL",
        other => other,
    };
    if suffix == "(MAX)" {
        return canonical.to_string();
    }
    format!("{}{}", canonical, suffix)
}

/// Split `VARCHAR(255)` into `("VARCHAR", "(255)")`.
fn split_type(ty: &str) -> (String, &str) {
    match ty.find('(') {
        Some(idx) => (ty[..idx].trim_end().to_string(), &ty[idx..]),
        None => (ty.to_string(), ""),
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dialect {
    type Err = SqlToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Dialect::ALL
            .iter()
            .copied()
            .find(|d| d.name() == needle)
            .ok_or_else(|| SqlToolError::UnsupportedDialect(s.trim().to_string()))
    }
}

/// Parsing dialect for auto-detected input and for dialects without a
/// dedicated `sqlparser` implementation.
///
/// Behaves as `GenericDialect` (the parser's `dialect_of!` checks see it as
/// one) but also accepts `agg(..) FILTER (WHERE ..)`.
#[derive(Debug, Default)]
pub struct AutoDialect(sp::GenericDialect);

impl sp::Dialect for AutoDialect {
    fn dialect(&self) -> TypeId {
        TypeId::of::<sp::GenericDialect>()
    }

    fn is_delimited_identifier_start(&self, ch: char) -> bool {
        self.0.is_delimited_identifier_start(ch)
    }

    fn is_identifier_start(&self, ch: char) -> bool {
        self.0.is_identifier_start(ch)
    }

    fn is_identifier_part(&self, ch: char) -> bool {
        self.0.is_identifier_part(ch)
    }

    fn supports_filter_during_aggregation(&self) -> bool {
        true
    }

    fn supports_unicode_string_literal(&self) -> bool {
        self.0.supports_unicode_string_literal()
    }

    fn supports_group_by_expr(&self) -> bool {
        self.0.supports_group_by_expr()
    }

    fn supports_connect_by(&self) -> bool {
        self.0.supports_connect_by()
    }

    fn supports_match_recognize(&self) -> bool {
        self.0.supports_match_recognize()
    }

    fn supports_start_transaction_modifier(&self) -> bool {
        self.0.supports_start_transaction_modifier()
    }

    fn supports_window_function_null_treatment_arg(&self) -> bool {
        self.0.supports_window_function_null_treatment_arg()
    }

    fn supports_dictionary_syntax(&self) -> bool {
        self.0.supports_dictionary_syntax()
    }

    fn supports_window_clause_named_window_reference(&self) -> bool {
        self.0.supports_window_clause_named_window_reference()
    }

    fn supports_parenthesized_set_variables(&self) -> bool {
        self.0.supports_parenthesized_set_variables()
    }

    fn supports_select_wildcard_except(&self) -> bool {
        self.0.supports_select_wildcard_except()
    }

    fn support_map_literal_syntax(&self) -> bool {
        self.0.support_map_literal_syntax()
    }

    fn allow_extract_custom(&self) -> bool {
        self.0.allow_extract_custom()
    }

    fn allow_extract_single_quotes(&self) -> bool {
        self.0.allow_extract_single_quotes()
    }

    fn supports_create_index_with_clause(&self) -> bool {
        self.0.supports_create_index_with_clause()
    }

    fn supports_explain_with_utility_options(&self) -> bool {
        self.0.supports_explain_with_utility_options()
    }

    fn supports_limit_comma(&self) -> bool {
        self.0.supports_limit_comma()
    }

    fn supports_asc_desc_in_column_definition(&self) -> bool {
        self.0.supports_asc_desc_in_column_definition()
    }

    fn supports_try_convert(&self) -> bool {
        self.0.supports_try_convert()
    }

    fn supports_comment_on(&self) -> bool {
        self.0.supports_comment_on()
    }

    fn supports_load_extension(&self) -> bool {
        self.0.supports_load_extension()
    }

    fn supports_named_fn_args_with_assignment_operator(&self) -> bool {
        self.0.supports_named_fn_args_with_assignment_operator()
    }

    fn supports_struct_literal(&self) -> bool {
        self.0.supports_struct_literal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_names_roundtrip() {
        assert_eq!(Dialect::ALL.len(), 31);
        for dialect in Dialect::ALL {
            assert_eq!(dialect.name().parse::<Dialect>().unwrap(), dialect);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("MySQL".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!(" tsql ".parse::<Dialect>().unwrap(), Dialect::TSql);
    }

    #[test]
    fn test_unknown_dialect() {
        let err = "oracle9i".parse::<Dialect>().unwrap_err();
        assert_eq!(err, SqlToolError::UnsupportedDialect("oracle9i".into()));
    }

    #[test]
    fn test_from_param_empty_is_auto() {
        assert_eq!(Dialect::from_param(None).unwrap(), None);
        assert_eq!(Dialect::from_param(Some("  ")).unwrap(), None);
        assert_eq!(
            Dialect::from_param(Some("postgres")).unwrap(),
            Some(Dialect::Postgres)
        );
        assert!(Dialect::from_param(Some("nope")).is_err());
    }

    #[test]
    fn test_label() {
        assert_eq!(Dialect::label(None), "auto-detected");
        assert_eq!(Dialect::label(Some(Dialect::DuckDb)), "duckdb");
    }

    #[test]
    fn test_function_renames() {
        assert_eq!(Dialect::TSql.function_name("LENGTH"), "LEN");
        assert_eq!(Dialect::MySql.function_name("STRING_AGG"), "GROUP_CONCAT");
        assert_eq!(Dialect::Postgres.function_name("LENGTH"), "LENGTH");
        assert_eq!(Dialect::Oracle.function_name("SUBSTRING"), "SUBSTR");
    }

    #[test]
    fn test_data_types() {
        assert_eq!(Dialect::BigQuery.data_type("INT"), "INT64");
        assert_eq!(Dialect::BigQuery.data_type("VARCHAR(10)"), "STRING");
        assert_eq!(Dialect::TSql.data_type("BOOLEAN"), "BIT");
        assert_eq!(Dialect::Postgres.data_type("DOUBLE"), "DOUBLE PRECISION");
        assert_eq!(Dialect::Oracle.data_type("VARCHAR(20)"), "VARCHAR2(20)");
        assert_eq!(Dialect::DuckDb.data_type("DATE"), "DATE");
    }

    #[test]
    fn test_canonical_type() {
        assert_eq!(canonical_type("int64"), "BIGINT");
        assert_eq!(canonical_type("STRING"), "TEXT");
        assert_eq!(canonical_type("varchar2(20)"), "VARCHAR(20)");
        assert_eq!(canonical_type("VARCHAR(MAX)"), "VARCHAR");
        assert_eq!(canonical_type("DOUBLE PRECISION"), "DOUBLE");
        assert_eq!(canonical_type("date"), "DATE");
    }

    #[test]
    fn test_render_traits() {
        assert_eq!(Dialect::MySql.quote_style(), QuoteStyle::Backtick);
        assert_eq!(Dialect::TSql.quote_style(), QuoteStyle::Bracket);
        assert_eq!(Dialect::Postgres.quote_style(), QuoteStyle::Double);
        assert_eq!(Dialect::TSql.limit_style(), LimitStyle::Top);
        assert_eq!(Dialect::Oracle.limit_style(), LimitStyle::Fetch);
        assert!(!Dialect::TSql.supports_boolean_literals());
        assert!(Dialect::Postgres.supports_ilike());
        assert!(!Dialect::MySql.supports_ilike());
    }

    #[test]
    fn test_auto_dialect_is_generic_with_filter() {
        let auto: Box<dyn sp::Dialect> = Box::new(AutoDialect::default());
        assert!(auto.is::<sp::GenericDialect>());
        assert!(sp::Dialect::supports_filter_during_aggregation(auto.as_ref()));
        assert!(sp::Dialect::supports_limit_comma(auto.as_ref()));
        assert!(Dialect::Trino.parser_dialect().is::<sp::GenericDialect>());
    }
}
