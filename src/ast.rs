//! Structured SQL IR for the generated CTE pipeline.
//!
//! Compiler stages build these nodes; text is only produced by
//! [`crate::transpiler::ToSql`] at the very end.

use serde::Serialize;

/// A chain of CTEs in emission order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Query {
    pub items: Vec<QueryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryItem {
    Cte(Cte),
    /// Verbatim SQL spliced between CTEs (latest-code fragments).
    Raw(String),
}

impl Query {
    pub fn push_cte(&mut self, cte: Cte) {
        self.items.push(QueryItem::Cte(cte));
    }

    pub fn push_raw(&mut self, sql: impl Into<String>) {
        self.items.push(QueryItem::Raw(sql.into()));
    }

    pub fn ctes(&self) -> impl Iterator<Item = &Cte> {
        self.items.iter().filter_map(|item| match item {
            QueryItem::Cte(cte) => Some(cte),
            QueryItem::Raw(_) => None,
        })
    }

    pub fn cte(&self, name: &str) -> Option<&Cte> {
        self.ctes().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cte {
    pub name: String,
    pub body: CteBody,
}

impl Cte {
    pub fn new(name: impl Into<String>, body: CteBody) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    pub fn select(name: impl Into<String>, select: Select) -> Self {
        Self::new(name, CteBody::Select(select))
    }

    /// The single SELECT of this CTE, if it is not a union.
    pub fn as_select(&self) -> Option<&Select> {
        match &self.body {
            CteBody::Select(select) => Some(select),
            CteBody::UnionAll(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CteBody {
    Select(Select),
    UnionAll(Vec<Select>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Select {
    pub columns: Vec<SelectItem>,
    pub from: Relation,
    pub from_alias: Option<String>,
    pub joins: Vec<Join>,
    /// Verbatim trailing clause (`WHERE ...`, `QUALIFY ...`).
    pub filter: Option<String>,
    pub group_by: Vec<Expr>,
}

impl Select {
    pub fn new(relation: Relation) -> Self {
        Self {
            columns: vec![],
            from: relation,
            from_alias: None,
            joins: vec![],
            filter: None,
            group_by: vec![],
        }
    }

    /// `SELECT * FROM <name>`
    pub fn star_from(name: impl Into<String>) -> Self {
        Self::new(Relation::Named(name.into())).column(SelectItem::new(Expr::Star))
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.from_alias = Some(alias.into());
        self
    }

    pub fn column(mut self, item: SelectItem) -> Self {
        self.columns.push(item);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn filter(mut self, clause: Option<String>) -> Self {
        self.filter = clause;
        self
    }

    /// Output name of each projected column (alias, else bare column name).
    pub fn output_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|item| match (&item.alias, &item.expr) {
                (Some(alias), _) => Some(alias.as_str()),
                (None, Expr::Column(name)) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }
}

/// A table reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Relation {
    Named(String),
    /// The model's own previous materialization.
    Prior { model_name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Join {
    pub kind: JoinKind,
    pub relation: Relation,
    pub alias: Option<String>,
    pub on: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Eq,
    Plus,
}

/// Target type of a cast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlType {
    /// Type name taken from the configuration, emitted as written.
    Declared(String),
    Varchar,
    Integer,
    /// Dialect timestamp type.
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Star,
    QualifiedStar(String),
    Column(String),
    Qualified { table: String, column: String },
    Null,
    Int(i64),
    StringLit(String),
    /// Configuration-supplied SQL, emitted verbatim.
    Raw(String),
    Call { name: String, args: Vec<Expr> },
    Coalesce(Vec<Expr>),
    CaseWhen {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    IsNull(Box<Expr>),
    Nested(Box<Expr>),
    Cast { expr: Box<Expr>, data_type: SqlType },
    /// Deterministic hash over the named columns.
    SurrogateKey(Vec<String>),
    /// Identifier of the current run.
    RunId,
    CurrentTimestamp,
    /// `value` unless it is NULL, else `fallback`.
    NullFallback { value: Box<Expr>, fallback: Box<Expr> },
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Qualified {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    pub fn equals(self, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op: BinaryOp::Eq,
            right: Box::new(right),
        }
    }

    pub fn plus(self, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op: BinaryOp::Plus,
            right: Box::new(right),
        }
    }

    pub fn case_when(condition: Expr, then: Expr) -> Self {
        Expr::CaseWhen {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: None,
        }
    }

    pub fn otherwise(self, value: Expr) -> Self {
        match self {
            Expr::CaseWhen {
                condition, then, ..
            } => Expr::CaseWhen {
                condition,
                then,
                otherwise: Some(Box::new(value)),
            },
            other => other,
        }
    }

    pub fn cast(self, data_type: SqlType) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            data_type,
        }
    }

    pub fn or_else(self, fallback: Expr) -> Self {
        Expr::NullFallback {
            value: Box::new(self),
            fallback: Box::new(fallback),
        }
    }

    pub fn as_alias(self, alias: impl Into<String>) -> SelectItem {
        SelectItem::aliased(self, alias)
    }
}
