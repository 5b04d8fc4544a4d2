use super::super::traits::{SqlGenerator, quote_literal};
use crate::model::ModelSpec;

/// dbt model files: Jinja config block, dbt_utils surrogate keys and the
/// `tag_inserts_and_updates` macro as the final statement.
pub struct DbtGenerator;

impl SqlGenerator for DbtGenerator {
    fn config_header(&self, model: &ModelSpec) -> String {
        format!(
            "{{{{\n  config(\n    materialized={},\n    unique_key=[{}]\n  )\n}}}}\n",
            quote_literal(&model.materialization),
            quote_literal(&model.primary_key_name)
        )
    }

    fn footer(&self, model: &ModelSpec) -> String {
        format!(
            "{{{{\n  tag_inserts_and_updates(\n    source_data = 'SELECT * FROM final',\n    unique_id = [{}]\n  )\n}}}}\n",
            quote_literal(&model.primary_key_name)
        )
    }

    fn trailing_separator(&self) -> bool {
        true
    }

    fn surrogate_key(&self, columns: &[String]) -> String {
        let quoted: Vec<String> = columns.iter().map(|c| quote_literal(c)).collect();
        format!(
            "{{{{ dbt_utils.generate_surrogate_key([{}]) }}}}",
            quoted.join(", ")
        )
    }

    fn run_identifier(&self) -> String {
        "'{{ invocation_id }}'".to_string()
    }

    fn current_timestamp(&self) -> String {
        "sysdate()".to_string()
    }

    fn null_fallback(&self, value: &str, fallback: &str) -> String {
        format!("nvl({}, {})", value, fallback)
    }

    fn prior_relation(&self, _model_name: &str) -> String {
        "{{ this }}".to_string()
    }

    fn timestamp_type(&self) -> &str {
        "TIMESTAMP_NTZ"
    }
}
