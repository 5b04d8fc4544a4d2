use super::super::traits::SqlGenerator;
use crate::model::ModelSpec;

/// Stand-alone SQL: no templating, the run identifier is bound as
/// `:batch_id` and the statement ends in a plain `SELECT`.
pub struct PlainGenerator;

impl SqlGenerator for PlainGenerator {
    fn config_header(&self, model: &ModelSpec) -> String {
        format!(
            "-- materialized: {}\n-- unique_key: {}\n",
            model.materialization, model.primary_key_name
        )
    }

    fn footer(&self, _model: &ModelSpec) -> String {
        "SELECT * FROM final\n".to_string()
    }

    fn trailing_separator(&self) -> bool {
        false
    }

    fn surrogate_key(&self, columns: &[String]) -> String {
        let parts: Vec<String> = columns
            .iter()
            .map(|c| format!("COALESCE(CAST({} AS VARCHAR), '')", c))
            .collect();
        format!("MD5({})", parts.join(" || '-' || "))
    }

    fn run_identifier(&self) -> String {
        ":batch_id".to_string()
    }

    fn current_timestamp(&self) -> String {
        "CURRENT_TIMESTAMP".to_string()
    }

    fn prior_relation(&self, model_name: &str) -> String {
        model_name.to_lowercase()
    }
}
