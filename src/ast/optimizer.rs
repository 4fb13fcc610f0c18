/// AST optimization and transformation infrastructure.
///
/// Provides a pass-based system for rewriting query ASTs. Each pass takes a
/// query, returns a possibly rewritten query and preserves its result set.
/// Passes run in a fixed order; the expression-level passes repeat until the
/// tree stops changing.
use std::sync::Arc;

use tracing::debug;

use super::schema::Schema;
use super::types::*;
use crate::error::Result;

mod rewrite;
mod schema_passes;
mod scope;
mod simplify;

pub use rewrite::{PruneProjections, PushdownPredicates};
pub use schema_passes::{CanonicalizeTypes, ExpandStars, ValidateSchema};
pub use simplify::{FoldConstants, NormalizePredicates, RemoveRedundantNesting, SimplifyBooleans};

/// Upper bound on rounds of the fixed-point stage.
const MAX_ROUNDS: usize = 16;

/// A single optimization or transformation pass over a query AST.
///
/// Passes should be pure functions: given the same input, they produce
/// the same output. This makes them composable and testable.
pub trait OptimizationPass: Send + Sync {
    /// Unique name identifying this pass.
    fn name(&self) -> &str;

    /// Optional description of what this pass does.
    fn description(&self) -> &str {
        ""
    }

    /// Transform a query, returning the optimized version.
    /// Returns the query unchanged if no optimization applies.
    fn transform(&self, query: Query) -> Result<Query>;
}

enum Stage {
    Once(Box<dyn OptimizationPass>),
    /// Passes repeated as a group until the query no longer changes.
    FixedPoint(Vec<Box<dyn OptimizationPass>>),
}

/// Manages and executes a pipeline of optimization passes.
#[derive(Default)]
pub struct Optimizer {
    stages: Vec<Stage>,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an optimizer with the default passes and no schema.
    pub fn with_defaults() -> Self {
        Self::with_schema(None)
    }

    /// The default pipeline. Schema-aware passes are only included when a
    /// schema is supplied.
    pub fn with_schema(schema: Option<Arc<Schema>>) -> Self {
        let mut opt = Self::new();
        if let Some(schema) = &schema {
            opt.add_pass(Box::new(ValidateSchema {
                schema: schema.clone(),
            }));
            opt.add_pass(Box::new(ExpandStars {
                schema: schema.clone(),
            }));
        }
        opt.add_pass(Box::new(PushdownPredicates));
        opt.add_pass(Box::new(PruneProjections));
        if let Some(schema) = schema {
            opt.add_pass(Box::new(CanonicalizeTypes { schema }));
        }
        opt.add_fixed_point(vec![
            Box::new(NormalizePredicates),
            Box::new(FoldConstants),
            Box::new(SimplifyBooleans),
            Box::new(RemoveRedundantNesting),
        ]);
        opt
    }

    /// Add an optimization pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn OptimizationPass>) {
        self.stages.push(Stage::Once(pass));
    }

    /// Add a group of passes that repeats until it reaches a fixed point.
    pub fn add_fixed_point(&mut self, passes: Vec<Box<dyn OptimizationPass>>) {
        self.stages.push(Stage::FixedPoint(passes));
    }

    /// Run all optimization passes on a query in order.
    pub fn optimize(&self, query: Query) -> Result<Query> {
        let mut current = query;
        for stage in &self.stages {
            match stage {
                Stage::Once(pass) => {
                    current = pass.transform(current)?;
                    debug!(pass = pass.name(), "optimizer pass applied");
                }
                Stage::FixedPoint(passes) => {
                    for round in 1..=MAX_ROUNDS {
                        let before = current.clone();
                        for pass in passes {
                            current = pass.transform(current)?;
                        }
                        if current == before {
                            debug!(rounds = round, "optimizer reached fixed point");
                            break;
                        }
                    }
                }
            }
        }
        Ok(current)
    }

    /// List registered pass names in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.stages
            .iter()
            .flat_map(|stage| match stage {
                Stage::Once(pass) => vec![pass.name()],
                Stage::FixedPoint(passes) => passes.iter().map(|p| p.name()).collect(),
            })
            .collect()
    }
}
