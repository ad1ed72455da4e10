//! Core engine: recipe types, parsing, expressions and execution.

pub mod config;
pub mod error;
pub mod executor;
pub mod expr;
pub mod parser;
pub mod resolver;
pub mod store;
pub mod types;
