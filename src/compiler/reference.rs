//! Reference tables: the lookup CTEs every source CTE selects from.

use serde::Serialize;
use tracing::debug;

use crate::ast::{Cte, Query, Select};
use crate::model::JoinRow;

/// Placeholder replaced by the deployment environment.
pub const ENVIRONMENT_TOKEN: &str = "{Environment}";

/// Replace every environment placeholder in `text`.
pub fn substitute_environment(text: &str, environment: &str) -> String {
    text.replace(ENVIRONMENT_TOKEN, environment)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceTable {
    pub table_name: String,
    /// Verbatim clause appended after `FROM`.
    pub filter: Option<String>,
}

/// Alias to reference table, in first-definition order.
///
/// Redefining an alias replaces its table and filter but keeps its
/// position: the last row naming an alias wins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReferenceTables {
    entries: Vec<(String, ReferenceTable)>,
}

impl ReferenceTables {
    pub fn insert(&mut self, alias: &str, table: ReferenceTable) {
        match self.entries.iter_mut().find(|(a, _)| a == alias) {
            Some((_, existing)) => *existing = table,
            None => self.entries.push((alias.to_string(), table)),
        }
    }

    pub fn get(&self, alias: &str) -> Option<&ReferenceTable> {
        self.entries
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, table)| table)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReferenceTable)> {
        self.entries.iter().map(|(a, t)| (a.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResolvedReferences {
    pub tables: ReferenceTables,
    /// Latest-code fragments in row order.
    pub latest_code: Vec<String>,
}

/// Derive the reference tables from the join rows.
///
/// Per row, a joined table is registered under its common alias (else its
/// joined alias), then the primary table under the primary alias. The
/// dialect's column variants were already selected when the rows were
/// read, so this is a pure function of rows and environment.
pub fn resolve(joins: &[JoinRow], environment: &str) -> ResolvedReferences {
    let mut resolved = ResolvedReferences::default();
    let env = |text: &Option<String>| text.as_deref().map(|t| substitute_environment(t, environment));

    for row in joins {
        if let Some(name) = &row.joined_table_name {
            let alias = row
                .common_table_alias
                .as_deref()
                .or(row.joined_table_alias.as_deref());
            if let Some(alias) = alias {
                resolved.tables.insert(
                    alias,
                    ReferenceTable {
                        table_name: substitute_environment(name, environment),
                        filter: env(&row.joined_filter),
                    },
                );
            }
        }

        if let (Some(name), Some(alias)) = (&row.primary_table_name, &row.primary_table_alias) {
            resolved.tables.insert(
                alias,
                ReferenceTable {
                    table_name: substitute_environment(name, environment),
                    filter: env(&row.primary_filter),
                },
            );
        }

        if let Some(code) = &row.latest_code {
            resolved.latest_code.push(code.clone());
        }
    }

    debug!(
        tables = resolved.tables.len(),
        fragments = resolved.latest_code.len(),
        "resolved reference tables"
    );
    resolved
}

/// Append one `SELECT *` CTE per reference table.
///
/// When more than one latest-code fragment was collected only the last one
/// is spliced in after the reference CTEs; a single fragment is ignored.
pub fn emit_reference_ctes(resolved: &ResolvedReferences, query: &mut Query) {
    for (alias, table) in resolved.tables.iter() {
        let select = Select::star_from(&table.table_name).filter(table.filter.clone());
        query.push_cte(Cte::select(alias, select));
    }

    if let [_, .., last] = resolved.latest_code.as_slice() {
        query.push_raw(last.clone());
    }
}
