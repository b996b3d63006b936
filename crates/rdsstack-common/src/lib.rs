//! # rdsstack-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire rdsstack workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives that the construct layer and
//! the stack assemblers build upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
