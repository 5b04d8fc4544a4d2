//! Typed configuration model.
//!
//! These entities are produced once per compilation unit by
//! [`crate::workbook`] and are read-only for every later stage.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("static pattern is valid"));

/// Normalize free text to an identifier: lower-case, with every run of
/// non-word characters replaced by a single underscore.
///
/// ```
/// use cteforge::model::normalize_identifier;
///
/// assert_eq!(normalize_identifier("Order ID"), "order_id");
/// assert_eq!(normalize_identifier("Net Amount (USD)"), "net_amount_usd_");
/// ```
pub fn normalize_identifier(name: &str) -> String {
    NON_WORD.replace_all(&name.to_lowercase(), "_").into_owned()
}

/// Processing stage of the records produced by a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Zone {
    Sanitized,
    Conformed,
    Other(String),
}

impl Zone {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "sanitized" => Zone::Sanitized,
            "conformed" => Zone::Conformed,
            other => Zone::Other(other.to_string()),
        }
    }

    /// Name used as the prefix of the audit columns.
    pub fn as_str(&self) -> &str {
        match self {
            Zone::Sanitized => "sanitized",
            Zone::Conformed => "conformed",
            Zone::Other(name) => name,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model-level metadata, taken from the first row of the Model sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSpec {
    pub zone: Zone,
    pub primary_key_name: String,
    pub materialization: String,
    pub model_name: String,
    pub source_system_list: Vec<String>,
}

/// Join kind of a Table Setup row. Only `Join` and `LeftJoin` are emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JoinType {
    Join,
    LeftJoin,
    Other(String),
}

impl JoinType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "JOIN" => JoinType::Join,
            "LEFT JOIN" => JoinType::LeftJoin,
            _ => JoinType::Other(value.trim().to_string()),
        }
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self, JoinType::Join | JoinType::LeftJoin)
    }
}

/// One row of the Table Setup sheet, with the dialect-specific column
/// variants already selected.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct JoinRow {
    /// 1-based row number in the sheet.
    pub row: usize,
    pub source_system_alias: String,
    /// Required on the first row of each source-system alias only.
    pub source_system: Option<String>,
    /// Required on the first row of each source-system alias only.
    pub primary_table_alias: Option<String>,
    pub primary_table_override: Option<String>,
    pub primary_table_name: Option<String>,
    pub primary_filter: Option<String>,
    pub joined_table_alias: Option<String>,
    pub joined_table_name: Option<String>,
    pub joined_filter: Option<String>,
    pub common_table_alias: Option<String>,
    pub join_type: Option<JoinType>,
    pub join_condition: Option<String>,
    pub latest_code: Option<String>,
}

impl JoinRow {
    /// The driving table of the source CTE this row belongs to.
    pub fn driving_alias(&self) -> Option<&str> {
        self.primary_table_override
            .as_deref()
            .or(self.primary_table_alias.as_deref())
    }
}

/// Source column of a mapping for one source system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceColumn<'a> {
    /// The system has a column in the sheet but this cell is blank.
    Null,
    Named(&'a str),
}

/// One row of the Column Mappings sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMapping {
    /// Normalized target identifier.
    pub target_column: String,
    pub ordinal_position: i64,
    pub data_type: String,
    pub merge_rule: Option<String>,
    /// One entry per source-system header of the sheet; `None` for blank cells.
    pub sources: BTreeMap<String, Option<String>>,
}

impl ColumnMapping {
    /// Returns `None` when the sheet has no column for `system`.
    pub fn source_for(&self, system: &str) -> Option<SourceColumn<'_>> {
        self.sources.get(system).map(|cell| match cell {
            Some(name) => SourceColumn::Named(name),
            None => SourceColumn::Null,
        })
    }
}

/// Audit columns synthesized for every model, in their fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditKind {
    CreatedBatchId,
    CreatedDateTime,
    UpdatedBatchId,
    UpdatedDateTime,
    RecordVersion,
}

impl AuditKind {
    pub const ALL: [AuditKind; 5] = [
        AuditKind::CreatedBatchId,
        AuditKind::CreatedDateTime,
        AuditKind::UpdatedBatchId,
        AuditKind::UpdatedDateTime,
        AuditKind::RecordVersion,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            AuditKind::CreatedBatchId => "created_batch_id",
            AuditKind::CreatedDateTime => "created_date_time",
            AuditKind::UpdatedBatchId => "updated_batch_id",
            AuditKind::UpdatedDateTime => "updated_date_time",
            AuditKind::RecordVersion => "record_version",
        }
    }

    pub fn ordinal_position(&self) -> i64 {
        1000 + *self as i64
    }

    pub fn column_name(&self, zone: &Zone) -> String {
        format!("{}_{}", zone, self.suffix())
    }
}

/// A complete, typed compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    pub model: ModelSpec,
    pub joins: Vec<JoinRow>,
    pub mappings: Vec<ColumnMapping>,
}

impl Configuration {
    /// Distinct source-system aliases in first-seen order.
    pub fn source_aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = Vec::new();
        for join in &self.joins {
            if !aliases.contains(&join.source_system_alias.as_str()) {
                aliases.push(&join.source_system_alias);
            }
        }
        aliases
    }

    /// All join rows of one source-system alias, in sheet order.
    pub fn joins_for<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = &'a JoinRow> + 'a {
        self.joins
            .iter()
            .filter(move |j| j.source_system_alias == alias)
    }
}
