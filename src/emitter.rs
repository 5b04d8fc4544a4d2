//! Output emitter: dialect header, CTE chain, dialect footer.

use crate::compiler::Plan;
use crate::transpiler::{Dialect, ToSql};

/// Serialize a plan into the final model text.
pub fn emit(plan: &Plan, dialect: Dialect) -> String {
    let generator = dialect.generator();
    let mut sql = generator.config_header(&plan.model);
    sql.push('\n');
    sql.push_str(&plan.query.render(generator.as_ref()));
    sql.push_str(&generator.footer(&plan.model));
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Cte, Query, Select};
    use crate::compiler::reference::ResolvedReferences;
    use crate::model::{ModelSpec, Zone};
    use pretty_assertions::assert_eq;

    fn plan() -> Plan {
        let mut query = Query::default();
        query.push_cte(Cte::select("final", Select::star_from("pre_final")));
        Plan {
            model: ModelSpec {
                zone: Zone::Sanitized,
                primary_key_name: "id".into(),
                materialization: "incremental".into(),
                model_name: "Orders".into(),
                source_system_list: vec![],
            },
            references: ResolvedReferences::default(),
            query,
            warnings: vec![],
        }
    }

    #[test]
    fn test_dbt_wrapping() {
        assert_eq!(
            emit(&plan(), Dialect::Dbt),
            "{{
  config(
    materialized='incremental',
    unique_key=['id']
  )
}}

WITH

final AS (
  SELECT *
  FROM pre_final
),

{{
  tag_inserts_and_updates(
    source_data = 'SELECT * FROM final',
    unique_id = ['id']
  )
}}
"
        );
    }

    #[test]
    fn test_plain_wrapping() {
        assert_eq!(
            emit(&plan(), Dialect::Plain),
            "-- materialized: incremental
-- unique_key: id

WITH

final AS (
  SELECT *
  FROM pre_final
)

SELECT * FROM final
"
        );
    }
}
