pub mod ast;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod export;
pub mod manifest;
pub mod plugin;
pub mod runtime;
pub mod temporal;
pub mod tools;

#[cfg(feature = "python")]
pub mod python;

pub use error::{Result, SqlToolError};
