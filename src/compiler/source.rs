//! One CTE per source system.

use tracing::debug;

use super::merge_rule::{latest_alias, resolve_column};
use super::{Warning, WarningKind};
use crate::ast::{Cte, Expr, Join, JoinKind, Relation, Select};
use crate::model::{ColumnMapping, JoinRow, JoinType, ModelSpec, Zone};

/// A built source CTE and the warnings raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCte {
    pub cte: Cte,
    pub warnings: Vec<Warning>,
}

/// Build the CTE named `alias` from its join rows.
///
/// The first join row decides the source system and the driving table
/// (override alias, else primary alias). Mappings without a column for the
/// source system are left out of the projection.
pub fn build_source_cte(
    alias: &str,
    joins: &[&JoinRow],
    mappings: &[ColumnMapping],
    model: &ModelSpec,
) -> SourceCte {
    let mut warnings = Vec::new();
    let leading = joins
        .first()
        .and_then(|first| Some((first.source_system.as_deref()?, first.driving_alias()?)));
    let Some((source_system, primary_alias)) = leading else {
        return SourceCte {
            cte: Cte::select(alias, Select::new(Relation::Named(alias.to_string()))),
            warnings,
        };
    };

    let mut select = Select::new(Relation::Named(primary_alias.to_string()));
    let mut group_keys: Vec<String> = Vec::new();

    for mapping in mappings {
        let Some(source) = mapping.source_for(source_system) else {
            continue;
        };
        let resolved = resolve_column(mapping, source, &model.zone, primary_alias);
        if let Some(key) = resolved.group_key {
            group_keys.push(key);
        }
        warnings.extend(resolved.warning);
        select.columns.push(resolved.item);
    }

    if select.columns.is_empty() {
        warnings.push(Warning::new(
            WarningKind::EmptyProjection,
            format!("source '{}' maps no columns for system '{}'", alias, source_system),
        ));
    }

    for row in joins {
        match &row.join_type {
            Some(kind) if kind.is_materialized() => match join_for(row, kind) {
                Some(join) => select.joins.push(join),
                None => {
                    warnings.push(Warning::new(
                        WarningKind::MissingJoinTable,
                        format!(
                            "Table Setup row {} has a join type but no common or joined table alias",
                            row.row
                        ),
                    ));
                }
            },
            _ => {}
        }
    }

    if model.zone == Zone::Conformed && !group_keys.is_empty() {
        select.joins.push(latest_join(primary_alias, &model.primary_key_name));
        select.group_by = group_keys
            .iter()
            .map(|key| Expr::qualified(primary_alias, key))
            .collect();
    }

    debug!(
        cte = alias,
        columns = select.columns.len(),
        joins = select.joins.len(),
        grouped = !select.group_by.is_empty(),
        "built source CTE"
    );

    SourceCte {
        cte: Cte::select(alias, select),
        warnings,
    }
}

fn join_for(row: &JoinRow, kind: &JoinType) -> Option<Join> {
    let table = row
        .common_table_alias
        .as_ref()
        .or(row.joined_table_alias.as_ref())?;
    Some(Join {
        kind: match kind {
            JoinType::LeftJoin => JoinKind::Left,
            _ => JoinKind::Inner,
        },
        relation: Relation::Named(table.clone()),
        alias: row.joined_table_alias.clone(),
        on: row.join_condition.clone().map(Expr::Raw),
    })
}

/// `LEFT JOIN <p>_existing AS latest_<p> ON <p>.<pk> = latest_<p>.<pk>`
fn latest_join(primary_alias: &str, primary_key: &str) -> Join {
    let latest = latest_alias(primary_alias);
    Join {
        kind: JoinKind::Left,
        relation: Relation::Named(format!("{}_existing", primary_alias)),
        on: Some(
            Expr::qualified(primary_alias, primary_key).equals(Expr::qualified(&latest, primary_key)),
        ),
        alias: Some(latest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::ToSql;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn model(zone: Zone) -> ModelSpec {
        ModelSpec {
            zone,
            primary_key_name: "customer_id".into(),
            materialization: "incremental".into(),
            model_name: "Customers".into(),
            source_system_list: vec!["crm".into()],
        }
    }

    fn mapping(target: &str, ordinal: i64, rule: Option<&str>, sources: &[(&str, Option<&str>)]) -> ColumnMapping {
        ColumnMapping {
            target_column: target.into(),
            ordinal_position: ordinal,
            data_type: "VARCHAR".into(),
            merge_rule: rule.map(String::from),
            sources: sources
                .iter()
                .map(|&(k, v)| (k.to_string(), v.map(String::from)))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn driving_row() -> JoinRow {
        JoinRow {
            row: 1,
            source_system_alias: "crm_src".into(),
            source_system: Some("crm".into()),
            primary_table_alias: Some("c".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_projection_skips_unmapped_systems() {
        let mappings = vec![
            mapping("customer_id", 1, None, &[("crm", Some("id")), ("erp", Some("no"))]),
            mapping("erp_only", 2, None, &[("erp", Some("x"))]),
            mapping("phone", 3, None, &[("crm", None)]),
        ];
        let row = driving_row();
        let built = build_source_cte("crm_src", &[&row], &mappings, &model(Zone::Sanitized));
        assert_eq!(
            built.cte.to_sql(),
            "crm_src AS (\n  SELECT\n    id AS customer_id,\n    NULL AS phone\n  FROM c\n)"
        );
        assert!(built.warnings.is_empty());
    }

    #[test]
    fn test_override_alias_drives_from_clause() {
        let mut row = driving_row();
        row.primary_table_override = Some("c_dedup".into());
        let mappings = vec![mapping("customer_id", 1, None, &[("crm", Some("id"))])];
        let built = build_source_cte("crm_src", &[&row], &mappings, &model(Zone::Sanitized));
        let select = built.cte.as_select().unwrap();
        assert_eq!(select.from, Relation::Named("c_dedup".into()));
    }

    #[test]
    fn test_only_explicit_join_kinds_are_emitted() {
        let first = driving_row();
        let mut left = driving_row();
        left.join_type = Some(JoinType::LeftJoin);
        left.common_table_alias = Some("addresses".into());
        left.joined_table_alias = Some("a".into());
        left.join_condition = Some("a.customer_id = c.id".into());
        let mut cross = driving_row();
        cross.join_type = Some(JoinType::Other("CROSS JOIN".into()));
        cross.joined_table_alias = Some("x".into());
        let mut inner = driving_row();
        inner.join_type = Some(JoinType::Join);
        inner.joined_table_alias = Some("s".into());

        let mappings = vec![mapping("customer_id", 1, None, &[("crm", Some("id"))])];
        let built = build_source_cte("crm_src", &[&first, &left, &cross, &inner], &mappings, &model(Zone::Sanitized));
        assert_eq!(
            built.cte.to_sql(),
            "crm_src AS (\n  SELECT id AS customer_id\n  FROM c\n  LEFT JOIN addresses AS a\n    ON a.customer_id = c.id\n  JOIN s AS s\n)"
        );
    }

    #[test]
    fn test_follow_up_row_with_join_columns_only() {
        let first = driving_row();
        let follow_up = JoinRow {
            row: 2,
            source_system_alias: "crm_src".into(),
            joined_table_alias: Some("a".into()),
            join_type: Some(JoinType::LeftJoin),
            join_condition: Some("a.customer_id = c.id".into()),
            ..Default::default()
        };
        let mappings = vec![mapping("customer_id", 1, None, &[("crm", Some("id"))])];
        let built = build_source_cte("crm_src", &[&first, &follow_up], &mappings, &model(Zone::Sanitized));
        assert!(built.warnings.is_empty());
        assert_eq!(
            built.cte.to_sql(),
            "crm_src AS (\n  SELECT id AS customer_id\n  FROM c\n  LEFT JOIN a AS a\n    ON a.customer_id = c.id\n)"
        );
    }

    #[test]
    fn test_join_without_alias_is_reported() {
        let first = driving_row();
        let mut broken = driving_row();
        broken.row = 2;
        broken.join_type = Some(JoinType::Join);
        let mappings = vec![mapping("customer_id", 1, None, &[("crm", Some("id"))])];
        let built = build_source_cte("crm_src", &[&first, &broken], &mappings, &model(Zone::Sanitized));
        assert!(built.cte.as_select().unwrap().joins.is_empty());
        assert_eq!(built.warnings[0].kind, WarningKind::MissingJoinTable);
    }

    #[test]
    fn test_group_by_adds_latest_join_and_grouping() {
        let mappings = vec![
            mapping("customer_id", 1, Some("group by"), &[("crm", Some("id"))]),
            mapping("region", 2, Some("group by"), &[("crm", Some("region"))]),
            mapping("updated_at", 3, Some("max"), &[("crm", Some("ts"))]),
        ];
        let row = driving_row();
        let built = build_source_cte("crm_src", &[&row], &mappings, &model(Zone::Conformed));
        let select = built.cte.as_select().unwrap();

        let latest: Vec<&Join> = select
            .joins
            .iter()
            .filter(|j| j.relation == Relation::Named("c_existing".into()))
            .collect();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].alias.as_deref(), Some("latest_c"));
        assert_eq!(
            select.group_by,
            vec![Expr::qualified("c", "customer_id"), Expr::qualified("c", "region")]
        );
        assert_eq!(
            built.cte.to_sql(),
            "crm_src AS (\n  SELECT\n    c.id AS customer_id,\n    c.region AS region,\n    max(ts) AS updated_at\n  FROM c\n  LEFT JOIN c_existing AS latest_c\n    ON c.customer_id = latest_c.customer_id\n  GROUP BY\n    c.customer_id,\n    c.region\n)"
        );
    }

    #[test]
    fn test_no_group_by_without_group_rule() {
        let mappings = vec![mapping("updated_at", 1, Some("max"), &[("crm", Some("ts"))])];
        let row = driving_row();
        let built = build_source_cte("crm_src", &[&row], &mappings, &model(Zone::Conformed));
        let select = built.cte.as_select().unwrap();
        assert!(select.group_by.is_empty());
        assert!(select.joins.is_empty());
    }

    #[test]
    fn test_malformed_rule_warning_is_collected() {
        let mappings = vec![mapping("email", 1, Some("[oops"), &[("crm", Some("mail"))])];
        let row = driving_row();
        let built = build_source_cte("crm_src", &[&row], &mappings, &model(Zone::Conformed));
        assert_eq!(built.warnings.len(), 1);
        assert_eq!(built.warnings[0].kind, WarningKind::MalformedMergeRule);
        assert_eq!(built.cte.as_select().unwrap().output_names(), vec!["email"]);
    }

    #[test]
    fn test_empty_projection_warning() {
        let row = driving_row();
        let built = build_source_cte("crm_src", &[&row], &[], &model(Zone::Sanitized));
        assert_eq!(built.warnings[0].kind, WarningKind::EmptyProjection);
    }
}
