//! Transpiler traits.

use crate::model::ModelSpec;

/// Trait for dialect-specific SQL generation.
///
/// Everything the two output dialects disagree on goes through here; the
/// shared CTE layout lives in [`super::ToSql`].
pub trait SqlGenerator {
    /// Leading block placed before `WITH` (materialization, unique key).
    fn config_header(&self, model: &ModelSpec) -> String;
    /// Trailing block that consumes the `final` CTE.
    fn footer(&self, model: &ModelSpec) -> String;
    /// Whether the last CTE keeps its `,` separator before the footer.
    fn trailing_separator(&self) -> bool;
    /// Deterministic hash over the given columns.
    fn surrogate_key(&self, columns: &[String]) -> String;
    /// Identifier of the current run, as a SQL expression.
    fn run_identifier(&self) -> String;
    fn current_timestamp(&self) -> String;
    /// `value` unless NULL, else `fallback`.
    fn null_fallback(&self, value: &str, fallback: &str) -> String {
        format!("COALESCE({}, {})", value, fallback)
    }
    /// Reference to the model's own previous materialization.
    fn prior_relation(&self, model_name: &str) -> String;
    fn timestamp_type(&self) -> &str {
        "TIMESTAMP"
    }
    /// Extension of the generated model file.
    fn file_extension(&self) -> &str {
        "sql"
    }
}

/// Quote a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
