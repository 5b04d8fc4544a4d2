//! # cteforge: warehouse model compiler
//!
//! > **Describe the model in a sheet. Get the pipeline.**
//!
//! cteforge turns a tabular model definition (Model, Table Setup and
//! Column Mappings sheets) into one SQL statement: a chain of CTEs that
//! reads every source system, applies merge rules, unions the sources,
//! adds a surrogate key and audit columns, and ends in a typed projection.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use cteforge::prelude::*;
//!
//! let workbook = Workbook::load("orders.json".as_ref())?;
//! let compiled = cteforge::compile(&workbook, &CompileOptions::new(Dialect::Dbt, "prod"))?;
//! std::fs::write(compiled.file_name(Dialect::Dbt), compiled.sql)?;
//! ```
//!
//! ## Pipeline
//!
//! | CTE                   | Built by                         |
//! |-----------------------|----------------------------------|
//! | reference tables      | [`compiler::reference`]          |
//! | one per source system | [`compiler::source`]             |
//! | `combined_sources`    | [`compiler::pipeline`]           |
//! | `combined_sources_pk` | [`compiler::pipeline`]           |
//! | `pre_final`           | [`compiler::pipeline`]           |
//! | `final`               | [`compiler::pipeline`]           |

pub mod ast;
pub mod batch;
pub mod compiler;
pub mod config;
pub mod emitter;
pub mod error;
pub mod model;
pub mod transpiler;
pub mod workbook;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::batch::{BatchReport, UnitOutcome, run_batch};
    pub use crate::compiler::{CompileOptions, CompiledModel, Plan, Warning, WarningKind, plan};
    pub use crate::config::Settings;
    pub use crate::error::*;
    pub use crate::model::*;
    pub use crate::transpiler::{Dialect, ToSql};
    pub use crate::workbook::Workbook;
}

/// Compile one workbook into model SQL.
///
/// # Example
///
/// ```
/// use cteforge::{CompileOptions, compile};
/// use cteforge::transpiler::Dialect;
/// use cteforge::workbook::Workbook;
///
/// let workbook = Workbook::from_json(r#"{
///     "Model": [{"Table Zone": "conformed", "Model Primary Key Name": "id",
///                "Materialized": "incremental", "Model Name": "Orders",
///                "Source Systems": "A"}],
///     "Table Setup": [{"Source System Alias": "a_src", "Source System": "A",
///                      "Primary Table Alias": "o",
///                      "Primary Table Name dbt": "orders_{Environment}"}],
///     "Column Mappings": [{"Target Column": "Order ID", "Ordinal Position": 1,
///                          "Data Type": "STRING", "A": "id"}]
/// }"#).unwrap();
///
/// let compiled = compile(&workbook, &CompileOptions::new(Dialect::Dbt, "prod")).unwrap();
/// assert_eq!(compiled.model_name, "Orders");
/// assert!(compiled.sql.contains("id AS order_id"));
/// ```
pub fn compile(
    workbook: &workbook::Workbook,
    options: &compiler::CompileOptions,
) -> error::ForgeResult<compiler::CompiledModel> {
    compiler::compile(workbook, options)
}

pub use compiler::CompileOptions;
