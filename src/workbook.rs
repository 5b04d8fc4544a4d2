//! Row-set configuration documents.
//!
//! A [`Workbook`] is the untyped tabular document: named sheets holding rows
//! keyed by column header. [`Workbook::to_configuration`] is the only place
//! where cells are read, and it converts them into the typed entities of
//! [`crate::model`]. Blank or missing cells become `None`; they are never
//! coerced into placeholder text.
//!
//! On disk a workbook is a JSON object of sheet name to row array:
//!
//! ```json
//! {
//!   "Model": [{ "Table Zone": "sanitized", "Model Name": "Orders", ... }],
//!   "Table Setup": [{ "Source System Alias": "A", ... }],
//!   "Column Mappings": [{ "Target Column": "Order ID", "A": "id", ... }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::{ForgeError, ForgeResult};
use crate::model::{
    ColumnMapping, Configuration, JoinRow, JoinType, ModelSpec, Zone, normalize_identifier,
};
use crate::transpiler::Dialect;

/// Sheet names and column headers of the document.
pub mod headers {
    pub const MODEL_SHEET: &str = "Model";
    pub const TABLE_SETUP_SHEET: &str = "Table Setup";
    pub const COLUMN_MAPPINGS_SHEET: &str = "Column Mappings";

    pub const TABLE_ZONE: &str = "Table Zone";
    pub const PRIMARY_KEY_NAME: &str = "Model Primary Key Name";
    pub const MATERIALIZED: &str = "Materialized";
    pub const MODEL_NAME: &str = "Model Name";
    pub const SOURCE_SYSTEMS: &str = "Source Systems";

    pub const SOURCE_SYSTEM_ALIAS: &str = "Source System Alias";
    pub const SOURCE_SYSTEM: &str = "Source System";
    pub const PRIMARY_TABLE_ALIAS: &str = "Primary Table Alias";
    pub const PRIMARY_TABLE_OVERRIDE: &str = "Primary Table Override";
    pub const PRIMARY_TABLE_NAME: &str = "Primary Table Name";
    pub const PRIMARY_TABLE_NAME_DBT: &str = "Primary Table Name dbt";
    pub const FILTER_SPECIFICATION: &str = "Filter Specification";
    pub const FILTER_SPECIFICATION_DBT: &str = "Filter Specification dbt";
    pub const JOINED_TABLE_ALIAS: &str = "Joined Table Alias";
    pub const JOINED_TABLE_NAME: &str = "Joined Table Name";
    pub const JOINED_TABLE_NAME_DBT: &str = "Joined Table Name dbt";
    pub const JOINED_FILTER: &str = "Filter Specification2";
    pub const COMMON_TABLE_ALIAS: &str = "Common Table Alias";
    pub const JOIN_TYPE: &str = "Join Type";
    pub const JOIN_CONDITION: &str = "Join Condition";
    pub const LATEST_CODE: &str = "latest_code";

    pub const TARGET_COLUMN: &str = "Target Column";
    pub const ORDINAL_POSITION: &str = "Ordinal Position";
    pub const DATA_TYPE: &str = "Data Type";
    pub const MERGE_RULE: &str = "Merge Rule";

    /// Column Mappings headers that are not source-system columns.
    pub const MAPPING_VOCABULARY: &[&str] = &[TARGET_COLUMN, ORDINAL_POSITION, DATA_TYPE, MERGE_RULE];
}

use headers::*;

/// Which Table Setup headers to read for the dialect-dependent fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnVariants {
    pub primary_table_name: &'static str,
    pub primary_filter: &'static str,
    pub joined_table_name: &'static str,
    pub joined_filter: &'static str,
}

impl ColumnVariants {
    pub const DBT: ColumnVariants = ColumnVariants {
        primary_table_name: PRIMARY_TABLE_NAME_DBT,
        primary_filter: FILTER_SPECIFICATION_DBT,
        joined_table_name: JOINED_TABLE_NAME_DBT,
        joined_filter: JOINED_FILTER,
    };

    pub const PLAIN: ColumnVariants = ColumnVariants {
        primary_table_name: PRIMARY_TABLE_NAME,
        primary_filter: FILTER_SPECIFICATION,
        joined_table_name: JOINED_TABLE_NAME,
        joined_filter: JOINED_FILTER,
    };

    pub fn of(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Dbt => Self::DBT,
            Dialect::Plain => Self::PLAIN,
        }
    }
}

/// One sheet row: header to cell value.
pub type Row = serde_json::Map<String, Value>;

/// Untyped tabular configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workbook {
    sheets: BTreeMap<String, Vec<Row>>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a workbook from its JSON text.
    pub fn from_json(text: &str) -> ForgeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a workbook file.
    pub fn load(path: &Path) -> ForgeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Add or replace a sheet.
    pub fn with_sheet(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.sheets.insert(name.into(), rows);
        self
    }

    fn sheet(&self, name: &'static str) -> ForgeResult<Sheet<'_>> {
        self.sheets
            .get(name)
            .map(|rows| Sheet { name, rows })
            .ok_or_else(|| ForgeError::ConfigurationMissing(format!("sheet '{}' not found", name)))
    }

    /// Convert the three sheets into a typed [`Configuration`], reading the
    /// dialect's column variants for the Table Setup sheet.
    pub fn to_configuration(&self, dialect: Dialect) -> ForgeResult<Configuration> {
        let variants = ColumnVariants::of(dialect);
        let model = self.model_spec()?;
        let joins = self.join_rows(&variants)?;
        let mappings = self.column_mappings()?;
        Ok(Configuration {
            model,
            joins,
            mappings,
        })
    }

    fn model_spec(&self) -> ForgeResult<ModelSpec> {
        let sheet = self.sheet(MODEL_SHEET)?;
        let row = sheet
            .rows
            .first()
            .ok_or_else(|| ForgeError::missing(MODEL_SHEET, "no model row"))?;

        let source_systems = sheet.required(row, 1, SOURCE_SYSTEMS)?;
        let source_system_list = source_systems
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(ModelSpec {
            zone: Zone::parse(&sheet.required(row, 1, TABLE_ZONE)?),
            primary_key_name: sheet.required(row, 1, PRIMARY_KEY_NAME)?,
            materialization: sheet.required(row, 1, MATERIALIZED)?,
            model_name: sheet.required(row, 1, MODEL_NAME)?,
            source_system_list,
        })
    }

    fn join_rows(&self, variants: &ColumnVariants) -> ForgeResult<Vec<JoinRow>> {
        let sheet = self.sheet(TABLE_SETUP_SHEET)?;
        if sheet.rows.is_empty() {
            return Err(ForgeError::missing(TABLE_SETUP_SHEET, "no join rows"));
        }

        // The first row of an alias group decides the source system and the
        // driving table; later rows of the group may carry join columns only.
        let mut leading: BTreeSet<String> = BTreeSet::new();
        sheet
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let n = i + 1;
                let source_system_alias = sheet.required(row, n, SOURCE_SYSTEM_ALIAS)?;
                let (source_system, primary_table_alias) = if leading.insert(source_system_alias.clone()) {
                    (
                        Some(sheet.required(row, n, SOURCE_SYSTEM)?),
                        Some(sheet.required(row, n, PRIMARY_TABLE_ALIAS)?),
                    )
                } else {
                    (
                        sheet.optional(row, n, SOURCE_SYSTEM)?,
                        sheet.optional(row, n, PRIMARY_TABLE_ALIAS)?,
                    )
                };
                Ok(JoinRow {
                    row: n,
                    source_system_alias,
                    source_system,
                    primary_table_alias,
                    primary_table_override: sheet.optional(row, n, PRIMARY_TABLE_OVERRIDE)?,
                    primary_table_name: sheet.optional(row, n, variants.primary_table_name)?,
                    primary_filter: sheet.optional(row, n, variants.primary_filter)?,
                    joined_table_alias: sheet.optional(row, n, JOINED_TABLE_ALIAS)?,
                    joined_table_name: sheet.optional(row, n, variants.joined_table_name)?,
                    joined_filter: sheet.optional(row, n, variants.joined_filter)?,
                    common_table_alias: sheet.optional(row, n, COMMON_TABLE_ALIAS)?,
                    join_type: sheet.optional(row, n, JOIN_TYPE)?.map(|t| JoinType::parse(&t)),
                    join_condition: sheet.optional(row, n, JOIN_CONDITION)?,
                    latest_code: sheet.optional(row, n, LATEST_CODE)?,
                })
            })
            .collect()
    }

    fn column_mappings(&self) -> ForgeResult<Vec<ColumnMapping>> {
        let sheet = self.sheet(COLUMN_MAPPINGS_SHEET)?;
        let source_headers: Vec<&str> = sheet
            .headers()
            .into_iter()
            .filter(|h| !MAPPING_VOCABULARY.contains(h))
            .collect();

        sheet
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let n = i + 1;
                let mut sources = BTreeMap::new();
                for header in &source_headers {
                    sources.insert(header.to_string(), sheet.optional(row, n, header)?);
                }
                Ok(ColumnMapping {
                    target_column: normalize_identifier(&sheet.required(row, n, TARGET_COLUMN)?),
                    ordinal_position: sheet.integer(row, n, ORDINAL_POSITION)?,
                    data_type: sheet.required(row, n, DATA_TYPE)?,
                    merge_rule: sheet.optional(row, n, MERGE_RULE)?,
                    sources,
                })
            })
            .collect()
    }
}

struct Sheet<'a> {
    name: &'static str,
    rows: &'a [Row],
}

impl<'a> Sheet<'a> {
    /// Every header used by any row of the sheet.
    fn headers(&self) -> BTreeSet<&'a str> {
        self.rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect()
    }

    fn optional(&self, row: &Row, n: usize, column: &str) -> ForgeResult<Option<String>> {
        match row.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Some(Value::Number(num)) => Ok(Some(number_text(num))),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(ForgeError::invalid(
                self.name,
                n,
                column,
                format!("expected a scalar cell, found {}", other),
            )),
        }
    }

    fn required(&self, row: &Row, n: usize, column: &str) -> ForgeResult<String> {
        self.optional(row, n, column)?
            .ok_or_else(|| ForgeError::missing(self.name, format!("row {} has no '{}'", n, column)))
    }

    fn integer(&self, row: &Row, n: usize, column: &str) -> ForgeResult<i64> {
        let text = self.required(row, n, column)?;
        if let Ok(value) = text.parse::<i64>() {
            return Ok(value);
        }
        match text.parse::<f64>() {
            Ok(value) if value.fract() == 0.0 && value.is_finite() => Ok(value as i64),
            _ => Err(ForgeError::invalid(
                self.name,
                n,
                column,
                format!("expected an integer, found '{}'", text),
            )),
        }
    }
}

/// Render a numeric cell as text; integral floats lose their `.0`.
fn number_text(num: &serde_json::Number) -> String {
    if let Some(i) = num.as_i64() {
        return i.to_string();
    }
    match num.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => (f as i64).to_string(),
        _ => num.to_string(),
    }
}
