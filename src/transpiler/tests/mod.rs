//! Transpiler test modules.
//!
//! - `core`: expression, SELECT and CTE chain layout
//! - `dialects`: dbt and plain generator output

mod core;
