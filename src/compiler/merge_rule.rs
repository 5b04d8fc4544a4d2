//! Merge rules: how a conformed column is computed when several incoming
//! rows map to one output row.
//!
//! | Rule text | Projection |
//! |-----------|------------|
//! | empty | `source AS target` |
//! | `group by` | `primary.source AS target`, grouped on `primary.target` |
//! | `max` / `min` | `max(source) AS target` |
//! | `[ {...}, ... ]` | precedence COALESCE over `latest_<primary>` and `<primary>` |
//! | anything else | `source AS target` |
//!
//! Rules only apply in the conformed zone; every other zone projects the
//! source column as is.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Warning, WarningKind};
use crate::ast::{Expr, SelectItem};
use crate::model::{ColumnMapping, SourceColumn, Zone};

/// One tier of a JSON precedence rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrecedenceItem {
    pub precedence: i64,
    pub comparison_column: String,
    pub comparison_value: Value,
    #[serde(default = "default_operator")]
    pub operator: String,
}

fn default_operator() -> String {
    "max".to_string()
}

impl PrecedenceItem {
    /// The comparison value as literal text.
    pub fn comparison_text(&self) -> String {
        match &self.comparison_value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeRule {
    Passthrough,
    GroupBy,
    Aggregate(String),
    /// Tiers sorted by ascending precedence.
    Precedence(Vec<PrecedenceItem>),
    /// Non-empty text that names no rule; treated as passthrough.
    Unrecognized(String),
}

impl MergeRule {
    /// Classify rule text. `Err` carries the JSON parse failure of a
    /// `[`-prefixed rule.
    pub fn parse(text: Option<&str>) -> Result<Self, String> {
        let text = text.map(str::trim).unwrap_or_default();
        match text {
            "" => Ok(MergeRule::Passthrough),
            "group by" => Ok(MergeRule::GroupBy),
            "max" | "min" => Ok(MergeRule::Aggregate(text.to_string())),
            rule if rule.starts_with('[') => {
                let mut items: Vec<PrecedenceItem> =
                    serde_json::from_str(rule).map_err(|e| e.to_string())?;
                if items.is_empty() {
                    return Err("precedence list is empty".to_string());
                }
                items.sort_by_key(|item| item.precedence);
                Ok(MergeRule::Precedence(items))
            }
            other => Ok(MergeRule::Unrecognized(other.to_string())),
        }
    }
}

/// Projection of one mapping inside one source CTE.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    pub item: SelectItem,
    /// Set when the column is a GROUP BY key.
    pub group_key: Option<String>,
    pub warning: Option<Warning>,
}

impl ResolvedColumn {
    fn plain(item: SelectItem) -> Self {
        Self {
            item,
            group_key: None,
            warning: None,
        }
    }
}

fn source_expr(source: SourceColumn<'_>) -> Expr {
    match source {
        SourceColumn::Null => Expr::Null,
        SourceColumn::Named(name) => Expr::col(name),
    }
}

fn qualified(table: &str, source: SourceColumn<'_>) -> Expr {
    match source {
        SourceColumn::Null => Expr::Null,
        SourceColumn::Named(name) => Expr::qualified(table, name),
    }
}

/// Alias under which the previously materialized rows are joined.
pub fn latest_alias(primary_alias: &str) -> String {
    format!("latest_{}", primary_alias)
}

/// Resolve the projection of `mapping` for one source system.
pub fn resolve_column(
    mapping: &ColumnMapping,
    source: SourceColumn<'_>,
    zone: &Zone,
    primary_alias: &str,
) -> ResolvedColumn {
    let target = &mapping.target_column;
    let passthrough = || source_expr(source).as_alias(target);

    if *zone != Zone::Conformed {
        return ResolvedColumn::plain(passthrough());
    }

    match MergeRule::parse(mapping.merge_rule.as_deref()) {
        Ok(MergeRule::Passthrough) => ResolvedColumn::plain(passthrough()),
        Ok(MergeRule::GroupBy) => ResolvedColumn {
            item: qualified(primary_alias, source).as_alias(target),
            group_key: Some(target.clone()),
            warning: None,
        },
        Ok(MergeRule::Aggregate(func)) => {
            ResolvedColumn::plain(Expr::call(func, vec![source_expr(source)]).as_alias(target))
        }
        Ok(MergeRule::Precedence(items)) => ResolvedColumn::plain(
            precedence_expr(&items, source, primary_alias).as_alias(target),
        ),
        Ok(MergeRule::Unrecognized(rule)) => {
            debug!(column = %target, rule = %rule, "unrecognized merge rule, using passthrough");
            ResolvedColumn::plain(passthrough())
        }
        Err(message) => {
            ResolvedColumn {
                item: passthrough(),
                group_key: None,
                warning: Some(Warning::new(
                    WarningKind::MalformedMergeRule,
                    format!("invalid JSON for merge rule of column '{}': {}", target, message),
                )),
            }
        }
    }
}

/// `COALESCE(op(CASE WHEN <tag matches> THEN <value> END), ...)`, one
/// argument per tier in ascending precedence. Both the tag and the value
/// prefer the latest materialized row over the incoming one.
fn precedence_expr(items: &[PrecedenceItem], source: SourceColumn<'_>, primary_alias: &str) -> Expr {
    let latest = latest_alias(primary_alias);
    let tiers = items
        .iter()
        .map(|item| {
            let tag = Expr::Coalesce(vec![
                Expr::qualified(&latest, &item.comparison_column),
                Expr::qualified(primary_alias, &item.comparison_column),
            ]);
            let condition = tag.equals(Expr::StringLit(item.comparison_text()));
            let value = match source {
                SourceColumn::Null => Expr::Null,
                SourceColumn::Named(_) => Expr::Coalesce(vec![
                    qualified(&latest, source),
                    qualified(primary_alias, source),
                ]),
            };
            Expr::call(&item.operator, vec![Expr::case_when(condition, value)])
        })
        .collect();
    Expr::Coalesce(tiers)
}
