//! CLI command implementations.

pub mod classes;
pub mod common;
pub mod info;
pub mod run;
