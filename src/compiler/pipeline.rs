//! Union, surrogate key, audit columns and the final typed projection.

use serde::Serialize;

use crate::ast::{Cte, CteBody, Expr, Join, JoinKind, Query, Relation, Select, SelectItem, SqlType};
use crate::model::{AuditKind, ColumnMapping, ModelSpec, Zone};

pub const COMBINED_SOURCES: &str = "combined_sources";
pub const COMBINED_SOURCES_PK: &str = "combined_sources_pk";
pub const PRE_FINAL: &str = "pre_final";
pub const FINAL: &str = "final";

/// Natural key hashed into the sanitized-zone primary key.
pub const SURROGATE_KEY_COLUMNS: [&str; 2] = ["source_system_name", "source_system_record_id"];

const SRC: &str = "src";
const PRIOR: &str = "pcr";

/// A column of the `final` projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalColumn {
    pub name: String,
    pub ordinal_position: i64,
    pub data_type: SqlType,
}

fn audit_type(kind: AuditKind) -> SqlType {
    match kind {
        AuditKind::CreatedBatchId | AuditKind::UpdatedBatchId => SqlType::Varchar,
        AuditKind::CreatedDateTime | AuditKind::UpdatedDateTime => SqlType::Timestamp,
        AuditKind::RecordVersion => SqlType::Integer,
    }
}

/// Mapped and audit columns in output order.
///
/// Stable sort on ordinal position, so ties keep sheet order and audit
/// columns (1000-1004, appended last) follow every mapped column below
/// 1000. A name that occurs twice keeps only its last sorted occurrence.
pub fn final_columns(zone: &Zone, mappings: &[ColumnMapping]) -> Vec<FinalColumn> {
    let mut columns: Vec<FinalColumn> = mappings
        .iter()
        .map(|m| FinalColumn {
            name: m.target_column.clone(),
            ordinal_position: m.ordinal_position,
            data_type: SqlType::Declared(m.data_type.clone()),
        })
        .chain(AuditKind::ALL.iter().map(|kind| FinalColumn {
            name: kind.column_name(zone),
            ordinal_position: kind.ordinal_position(),
            data_type: audit_type(*kind),
        }))
        .collect();
    columns.sort_by_key(|c| c.ordinal_position);

    let mut deduped: Vec<FinalColumn> = Vec::with_capacity(columns.len());
    for column in columns {
        deduped.retain(|c| c.name != column.name);
        deduped.push(column);
    }
    deduped
}

/// `SELECT * FROM a UNION ALL SELECT * FROM b ...`
pub fn combined_sources(aliases: &[&str]) -> Cte {
    let selects = aliases.iter().map(|a| Select::star_from(*a)).collect();
    Cte::new(COMBINED_SOURCES, CteBody::UnionAll(selects))
}

/// Passthrough of the union; sanitized models get the surrogate key first.
pub fn combined_sources_pk(model: &ModelSpec) -> Cte {
    let mut select = Select::new(Relation::Named(COMBINED_SOURCES.to_string()));
    if model.zone == Zone::Sanitized {
        let key_columns = SURROGATE_KEY_COLUMNS.iter().map(|c| c.to_string()).collect();
        select = select.column(Expr::SurrogateKey(key_columns).as_alias(&model.primary_key_name));
    }
    Cte::select(COMBINED_SOURCES_PK, select.column(SelectItem::new(Expr::Star)))
}

/// Audit columns computed against the prior materialization of the model.
pub fn pre_final(model: &ModelSpec) -> Cte {
    let zone = &model.zone;
    let prior = |kind: AuditKind| Expr::qualified(PRIOR, kind.column_name(zone));
    let name = |kind: AuditKind| kind.column_name(zone);

    let version = Expr::case_when(Expr::IsNull(Box::new(prior(AuditKind::RecordVersion))), Expr::Int(1))
        .otherwise(Expr::Nested(Box::new(prior(AuditKind::RecordVersion).plus(Expr::Int(1)))));

    let pk = &model.primary_key_name;
    let select = Select::new(Relation::Named(COMBINED_SOURCES_PK.to_string()))
        .alias(SRC)
        .column(SelectItem::new(Expr::QualifiedStar(SRC.to_string())))
        .column(
            prior(AuditKind::CreatedBatchId)
                .or_else(Expr::RunId)
                .as_alias(name(AuditKind::CreatedBatchId)),
        )
        .column(Expr::RunId.as_alias(name(AuditKind::UpdatedBatchId)))
        .column(
            prior(AuditKind::CreatedDateTime)
                .or_else(Expr::CurrentTimestamp)
                .as_alias(name(AuditKind::CreatedDateTime)),
        )
        .column(Expr::CurrentTimestamp.as_alias(name(AuditKind::UpdatedDateTime)))
        .column(version.as_alias(name(AuditKind::RecordVersion)))
        .join(Join {
            kind: JoinKind::Left,
            relation: Relation::Prior {
                model_name: model.model_name.clone(),
            },
            alias: Some(PRIOR.to_string()),
            on: Some(Expr::qualified(SRC, pk).equals(Expr::qualified(PRIOR, pk))),
        });
    Cte::select(PRE_FINAL, select)
}

/// Explicit, cast column list in ordinal order.
pub fn final_projection(model: &ModelSpec, mappings: &[ColumnMapping]) -> Cte {
    let mut select = Select::new(Relation::Named(PRE_FINAL.to_string()));
    if model.zone == Zone::Sanitized {
        select = select.column(SelectItem::new(Expr::col(&model.primary_key_name)));
    }
    for column in final_columns(&model.zone, mappings) {
        let cast = Expr::col(&column.name).cast(column.data_type);
        select = select.column(cast.as_alias(column.name));
    }
    Cte::select(FINAL, select)
}

/// Append the four pipeline stages after the source CTEs.
pub fn assemble(query: &mut Query, aliases: &[&str], model: &ModelSpec, mappings: &[ColumnMapping]) {
    query.push_cte(combined_sources(aliases));
    query.push_cte(combined_sources_pk(model));
    query.push_cte(pre_final(model));
    query.push_cte(final_projection(model, mappings));
}
