//! SQL transpiler for the pipeline IR.
//!
//! Every node renders through a [`SqlGenerator`] so dialect-specific pieces
//! (surrogate keys, run identifiers, self references) stay out of the
//! compiler stages. Layout is fixed: one CTE per block, two-space body
//! indent, one projected column per line.

pub mod dialect;
pub mod sql;
pub mod traits;

#[cfg(test)]
mod tests;

use crate::ast::*;
pub use dialect::Dialect;
pub use traits::{SqlGenerator, quote_literal};

const BODY: &str = "  ";
const ITEM: &str = "    ";

/// Trait for converting IR nodes to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string using the default dialect.
    fn to_sql(&self) -> String {
        self.to_sql_with_dialect(Dialect::default())
    }
    /// Convert this node to a SQL string with a specific dialect.
    fn to_sql_with_dialect(&self, dialect: Dialect) -> String {
        self.render(dialect.generator().as_ref())
    }
    fn render(&self, generator: &dyn SqlGenerator) -> String;
}

impl ToSql for Expr {
    fn render(&self, g: &dyn SqlGenerator) -> String {
        match self {
            Expr::Star => "*".to_string(),
            Expr::QualifiedStar(table) => format!("{}.*", table),
            Expr::Column(name) => name.clone(),
            Expr::Qualified { table, column } => format!("{}.{}", table, column),
            Expr::Null => "NULL".to_string(),
            Expr::Int(n) => n.to_string(),
            Expr::StringLit(s) => quote_literal(s),
            Expr::Raw(sql) => sql.clone(),
            Expr::Call { name, args } => format!("{}({})", name, render_list(args, g)),
            Expr::Coalesce(args) => format!("COALESCE({})", render_list(args, g)),
            Expr::CaseWhen {
                condition,
                then,
                otherwise,
            } => {
                let mut sql = format!("CASE WHEN {} THEN {}", condition.render(g), then.render(g));
                if let Some(value) = otherwise {
                    sql.push_str(" ELSE ");
                    sql.push_str(&value.render(g));
                }
                sql.push_str(" END");
                sql
            }
            Expr::Binary { left, op, right } => {
                let op = match op {
                    BinaryOp::Eq => "=",
                    BinaryOp::Plus => "+",
                };
                format!("{} {} {}", left.render(g), op, right.render(g))
            }
            Expr::IsNull(expr) => format!("{} IS NULL", expr.render(g)),
            Expr::Nested(expr) => format!("({})", expr.render(g)),
            Expr::Cast { expr, data_type } => {
                format!("{}::{}", expr.render(g), data_type.render(g))
            }
            Expr::SurrogateKey(columns) => g.surrogate_key(columns),
            Expr::RunId => g.run_identifier(),
            Expr::CurrentTimestamp => g.current_timestamp(),
            Expr::NullFallback { value, fallback } => {
                g.null_fallback(&value.render(g), &fallback.render(g))
            }
        }
    }
}

fn render_list(exprs: &[Expr], g: &dyn SqlGenerator) -> String {
    exprs
        .iter()
        .map(|e| e.render(g))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ToSql for SqlType {
    fn render(&self, g: &dyn SqlGenerator) -> String {
        match self {
            SqlType::Declared(name) => name.clone(),
            SqlType::Varchar => "VARCHAR".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::Timestamp => g.timestamp_type().to_string(),
        }
    }
}

impl ToSql for SelectItem {
    fn render(&self, g: &dyn SqlGenerator) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.expr.render(g), alias),
            None => self.expr.render(g),
        }
    }
}

impl ToSql for Relation {
    fn render(&self, g: &dyn SqlGenerator) -> String {
        match self {
            Relation::Named(name) => name.clone(),
            Relation::Prior { model_name } => g.prior_relation(model_name),
        }
    }
}

impl ToSql for Join {
    fn render(&self, g: &dyn SqlGenerator) -> String {
        let kind = match self.kind {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
        };
        let mut sql = format!("{}{} {}", BODY, kind, self.relation.render(g));
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(alias);
        }
        if let Some(on) = &self.on {
            sql.push('\n');
            sql.push_str(ITEM);
            sql.push_str("ON ");
            sql.push_str(&on.render(g));
        }
        sql
    }
}

/// Renders the body lines of a SELECT, indented for a CTE.
impl ToSql for Select {
    fn render(&self, g: &dyn SqlGenerator) -> String {
        let mut lines: Vec<String> = Vec::new();

        match self.columns.as_slice() {
            [] => lines.push(format!("{}SELECT *", BODY)),
            [single] => lines.push(format!("{}SELECT {}", BODY, single.render(g))),
            columns => {
                lines.push(format!("{}SELECT", BODY));
                let items: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{}{}", ITEM, c.render(g)))
                    .collect();
                lines.push(items.join(",\n"));
            }
        }

        let mut from = format!("{}FROM {}", BODY, self.from.render(g));
        if let Some(alias) = &self.from_alias {
            from.push_str(" AS ");
            from.push_str(alias);
        }
        lines.push(from);

        for join in &self.joins {
            lines.push(join.render(g));
        }

        if let Some(filter) = &self.filter {
            lines.push(format!("{}{}", BODY, filter));
        }

        if !self.group_by.is_empty() {
            lines.push(format!("{}GROUP BY", BODY));
            let keys: Vec<String> = self
                .group_by
                .iter()
                .map(|k| format!("{}{}", ITEM, k.render(g)))
                .collect();
            lines.push(keys.join(",\n"));
        }

        lines.join("\n")
    }
}

impl ToSql for Cte {
    fn render(&self, g: &dyn SqlGenerator) -> String {
        let body = match &self.body {
            CteBody::Select(select) => select.render(g),
            CteBody::UnionAll(selects) => selects
                .iter()
                .map(|s| s.render(g))
                .collect::<Vec<_>>()
                .join(&format!("\n{}UNION ALL\n", BODY)),
        };
        format!("{} AS (\n{}\n)", self.name, body)
    }
}

/// Renders `WITH` and the CTE chain. Each CTE is followed by `,` except the
/// last one when the dialect closes the statement without a separator.
impl ToSql for Query {
    fn render(&self, g: &dyn SqlGenerator) -> String {
        let mut sql = String::from("WITH\n\n");
        let last_cte = self
            .items
            .iter()
            .rposition(|item| matches!(item, QueryItem::Cte(_)));

        for (i, item) in self.items.iter().enumerate() {
            match item {
                QueryItem::Cte(cte) => {
                    sql.push_str(&cte.render(g));
                    if Some(i) == last_cte && !g.trailing_separator() {
                        sql.push_str("\n\n");
                    } else {
                        sql.push_str(",\n\n");
                    }
                }
                QueryItem::Raw(fragment) => {
                    sql.push_str(BODY);
                    sql.push_str(fragment);
                    sql.push_str("\n\n");
                }
            }
        }
        sql
    }
}
