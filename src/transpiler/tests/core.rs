//! Layout tests shared by every dialect.

use crate::ast::*;
use crate::transpiler::ToSql;
use pretty_assertions::assert_eq;

#[test]
fn test_expression_rendering() {
    assert_eq!(Expr::qualified("c", "id").to_sql(), "c.id");
    assert_eq!(Expr::QualifiedStar("src".into()).to_sql(), "src.*");
    assert_eq!(Expr::StringLit("it's".into()).to_sql(), "'it''s'");
    assert_eq!(
        Expr::call("max", vec![Expr::col("ts")]).to_sql(),
        "max(ts)"
    );
    assert_eq!(
        Expr::Coalesce(vec![Expr::col("a"), Expr::Null]).to_sql(),
        "COALESCE(a, NULL)"
    );
    assert_eq!(
        Expr::col("amount").cast(SqlType::Declared("NUMBER(10,2)".into())).to_sql(),
        "amount::NUMBER(10,2)"
    );
}

#[test]
fn test_case_when() {
    let without_else = Expr::case_when(Expr::col("a").equals(Expr::Int(1)), Expr::col("b"));
    assert_eq!(without_else.to_sql(), "CASE WHEN a = 1 THEN b END");

    let with_else = Expr::case_when(Expr::IsNull(Box::new(Expr::col("v"))), Expr::Int(1))
        .otherwise(Expr::Nested(Box::new(Expr::col("v").plus(Expr::Int(1)))));
    assert_eq!(with_else.to_sql(), "CASE WHEN v IS NULL THEN 1 ELSE (v + 1) END");
}

#[test]
fn test_select_without_columns_is_star() {
    let select = Select::new(Relation::Named("orders".into()));
    assert_eq!(select.to_sql(), "  SELECT *\n  FROM orders");
}

#[test]
fn test_select_layout() {
    let select = Select::new(Relation::Named("orders".into()))
        .alias("o")
        .column(Expr::qualified("o", "id").as_alias("order_id"))
        .column(SelectItem::new(Expr::col("amt")))
        .join(Join {
            kind: JoinKind::Inner,
            relation: Relation::Named("customers".into()),
            alias: Some("c".into()),
            on: Some(Expr::Raw("c.id = o.customer_id".into())),
        })
        .filter(Some("WHERE o.deleted = false".into()));
    assert_eq!(
        select.to_sql(),
        "  SELECT\n    o.id AS order_id,\n    amt\n  FROM orders AS o\n  JOIN customers AS c\n    ON c.id = o.customer_id\n  WHERE o.deleted = false"
    );
}

#[test]
fn test_group_by_layout() {
    let mut select = Select::new(Relation::Named("c".into())).column(Expr::qualified("c", "id").as_alias("id"));
    select.group_by = vec![Expr::qualified("c", "id"), Expr::qualified("c", "region")];
    assert_eq!(
        select.to_sql(),
        "  SELECT c.id AS id\n  FROM c\n  GROUP BY\n    c.id,\n    c.region"
    );
}

#[test]
fn test_join_without_condition() {
    let join = Join {
        kind: JoinKind::Left,
        relation: Relation::Named("t".into()),
        alias: None,
        on: None,
    };
    assert_eq!(join.to_sql(), "  LEFT JOIN t");
}

#[test]
fn test_query_with_raw_fragment() {
    let mut query = Query::default();
    query.push_cte(Cte::select("a", Select::star_from("x")));
    query.push_raw("b AS (SELECT 1)");
    query.push_cte(Cte::select("final", Select::star_from("a")));
    assert_eq!(
        query.to_sql(),
        "WITH\n\na AS (\n  SELECT *\n  FROM x\n),\n\n  b AS (SELECT 1)\n\nfinal AS (\n  SELECT *\n  FROM a\n),\n\n"
    );
}
