//! Configuration to CTE pipeline compiler.
//!
//! Stages run strictly forward:
//!
//! ```text
//! Configuration ─┬─> reference::resolve ──> reference CTEs
//!                └─> source::build_source_cte (per source alias)
//!                          └─> pipeline::assemble ──> emitter::emit
//! ```
//!
//! [`plan`] produces the IR only; [`compile`] also converts the workbook
//! and emits text.

pub mod merge_rule;
pub mod pipeline;
pub mod reference;
pub mod source;

use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::ast::{Cte, Query};
use crate::emitter;
use crate::error::ForgeResult;
use crate::model::{Configuration, ModelSpec};
use crate::transpiler::Dialect;
use crate::workbook::Workbook;
use reference::ResolvedReferences;

/// Inputs of one compilation besides the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub dialect: Dialect,
    /// Substituted for `{Environment}` in table names and filters.
    pub environment: String,
}

impl CompileOptions {
    pub fn new(dialect: Dialect, environment: impl Into<String>) -> Self {
        Self {
            dialect,
            environment: environment.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    /// A `[`-prefixed merge rule is not a valid precedence list.
    MalformedMergeRule,
    /// A join row names a source system missing from the model's list.
    UnknownSourceSystem,
    /// A JOIN / LEFT JOIN row without a table alias.
    MissingJoinTable,
    /// A source CTE projects no columns.
    EmptyProjection,
}

/// A recoverable problem; compilation continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The compiled IR of one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub model: ModelSpec,
    pub references: ResolvedReferences,
    pub query: Query,
    pub warnings: Vec<Warning>,
}

impl Plan {
    /// The source CTE named `alias`. Reference CTEs come first in the chain
    /// and may share the name, so they are skipped.
    pub fn source_cte(&self, alias: &str) -> Option<&Cte> {
        self.query
            .ctes()
            .skip(self.references.tables.len())
            .find(|cte| cte.name == alias)
    }
}

/// Build the full CTE pipeline for a configuration.
pub fn plan(config: &Configuration, environment: &str) -> Plan {
    let model = &config.model;
    let mut warnings = Vec::new();
    let mut query = Query::default();

    let declared = config
        .joins
        .iter()
        .filter_map(|join| join.source_system.as_deref().map(|system| (join.row, system)));
    for (row, system) in declared {
        if !model.source_system_list.iter().any(|listed| listed == system) {
            warnings.push(Warning::new(
                WarningKind::UnknownSourceSystem,
                format!(
                    "Table Setup row {} uses source system '{}' which is not listed in Source Systems",
                    row, system
                ),
            ));
        }
    }

    let references = reference::resolve(&config.joins, environment);
    reference::emit_reference_ctes(&references, &mut query);

    let aliases = config.source_aliases();
    for alias in &aliases {
        let joins: Vec<_> = config.joins_for(alias).collect();
        let built = source::build_source_cte(alias, &joins, &config.mappings, model);
        warnings.extend(built.warnings);
        query.push_cte(built.cte);
    }

    pipeline::assemble(&mut query, &aliases, model, &config.mappings);

    debug!(
        model = %model.model_name,
        ctes = query.ctes().count(),
        warnings = warnings.len(),
        "planned model"
    );

    Plan {
        model: model.clone(),
        references,
        query,
        warnings,
    }
}

/// Compiled SQL of one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModel {
    pub model_name: String,
    pub sql: String,
    pub warnings: Vec<Warning>,
}

impl CompiledModel {
    /// Output file name: lower-cased model name plus the dialect extension.
    pub fn file_name(&self, dialect: Dialect) -> String {
        format!(
            "{}.{}",
            self.model_name.to_lowercase(),
            dialect.generator().file_extension()
        )
    }
}

/// Compile one workbook: convert rows, plan, and emit SQL text.
pub fn compile(workbook: &Workbook, options: &CompileOptions) -> ForgeResult<CompiledModel> {
    let config = workbook.to_configuration(options.dialect)?;
    let plan = plan(&config, &options.environment);
    for warning in &plan.warnings {
        warn!(model = %plan.model.model_name, "{}", warning);
    }
    let sql = emitter::emit(&plan, options.dialect);
    Ok(CompiledModel {
        model_name: plan.model.model_name,
        sql,
        warnings: plan.warnings,
    })
}
