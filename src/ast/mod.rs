/// Unified Query AST and SQL processing pipeline.
///
/// Every tool runs some prefix of this pipeline:
///
/// ```text
/// SQL text (any supported dialect)
///       ↓
/// sqlparser frontend      (parser.rs)
///       ↓
/// Unified Query AST       (types.rs, visit.rs)
///       ↓
/// Analysis / Optimization (metadata.rs, optimizer/, schema.rs)
///       ↓
/// Dialect-aware generator (compiler.rs, formatter.rs)
///       ↓
/// SQL text (target dialect) or in-memory execution (crate::engine)
/// ```
pub mod compiler;
pub mod formatter;
pub mod metadata;
pub mod optimizer;
pub mod parser;
pub mod schema;
pub mod types;
pub mod visit;

// Re-export key types for convenience
pub use compiler::{compile, compile_with, GenerateOptions};
pub use formatter::{format_sql, format_with};
pub use metadata::{extract_metadata, QueryMetadata};
pub use optimizer::{OptimizationPass, Optimizer};
pub use parser::{parse_single, parse_sql};
pub use schema::Schema;
pub use types::*;
