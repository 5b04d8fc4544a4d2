//! End-to-end compilation tests: document in, model SQL out.

use cteforge::batch::{UnitOutcome, run_batch};
use cteforge::compiler::{CompileOptions, WarningKind, compile, plan};
use cteforge::error::ForgeError;
use cteforge::transpiler::Dialect;
use cteforge::workbook::Workbook;
use pretty_assertions::assert_eq;
use std::fs;

const ORDERS: &str = r#"{
  "Model": [{
    "Table Zone": "sanitized",
    "Model Primary Key Name": "id",
    "Materialized": "incremental",
    "Model Name": "Orders",
    "Source Systems": "A"
  }],
  "Table Setup": [{
    "Source System Alias": "A",
    "Source System": "A",
    "Primary Table Alias": "o",
    "Primary Table Name": "Orders_{Environment}",
    "Primary Table Name dbt": "Orders_{Environment}"
  }],
  "Column Mappings": [
    { "Target Column": "order_id", "Ordinal Position": 1, "Data Type": "STRING", "A": "id" },
    { "Target Column": "amount", "Ordinal Position": 2, "Data Type": "NUMBER", "A": "amt" }
  ]
}"#;

const CUSTOMERS: &str = r#"{
  "Model": [{
    "Table Zone": "conformed",
    "Model Primary Key Name": "customer_id",
    "Materialized": "incremental",
    "Model Name": "Customers",
    "Source Systems": "crm, erp"
  }],
  "Table Setup": [
    {
      "Source System Alias": "crm_src",
      "Source System": "crm",
      "Primary Table Alias": "c",
      "Primary Table Name": "crm_{Environment}.customers",
      "Filter Specification": "WHERE is_deleted = false"
    },
    {
      "Source System Alias": "crm_src",
      "Source System": "crm",
      "Primary Table Alias": "c",
      "Joined Table Alias": "a",
      "Joined Table Name": "crm_{Environment}.addresses",
      "Join Type": "LEFT JOIN",
      "Join Condition": "a.customer_id = c.id"
    },
    {
      "Source System Alias": "erp_src",
      "Source System": "erp",
      "Primary Table Alias": "e",
      "Primary Table Name": "erp_{Environment}.clients"
    }
  ],
  "Column Mappings": [
    { "Target Column": "Customer ID", "Ordinal Position": 1, "Data Type": "VARCHAR",
      "Merge Rule": "group by", "crm": "id", "erp": "client_no" },
    { "Target Column": "Email", "Ordinal Position": 2, "Data Type": "VARCHAR",
      "Merge Rule": "[{\"precedence\": 2, \"comparison_column\": \"source\", \"comparison_value\": \"ERP\"}, {\"precedence\": 1, \"comparison_column\": \"source\", \"comparison_value\": \"CRM\"}]",
      "crm": "email", "erp": "mail" },
    { "Target Column": "Region", "Ordinal Position": 3, "Data Type": "VARCHAR", "crm": "region", "erp": "" }
  ]
}"#;

fn dbt(environment: &str) -> CompileOptions {
    CompileOptions::new(Dialect::Dbt, environment)
}

#[test]
fn test_orders_end_to_end_dbt() {
    let workbook = Workbook::from_json(ORDERS).unwrap();
    let compiled = compile(&workbook, &dbt("prod")).unwrap();
    assert!(compiled.warnings.is_empty());
    assert_eq!(
        compiled.sql,
        "{{
  config(
    materialized='incremental',
    unique_key=['id']
  )
}}

WITH

o AS (
  SELECT *
  FROM Orders_prod
),

A AS (
  SELECT
    id AS order_id,
    amt AS amount
  FROM o
),

combined_sources AS (
  SELECT *
  FROM A
),

combined_sources_pk AS (
  SELECT
    {{ dbt_utils.generate_surrogate_key(['source_system_name', 'source_system_record_id']) }} AS id,
    *
  FROM combined_sources
),

pre_final AS (
  SELECT
    src.*,
    nvl(pcr.sanitized_created_batch_id, '{{ invocation_id }}') AS sanitized_created_batch_id,
    '{{ invocation_id }}' AS sanitized_updated_batch_id,
    nvl(pcr.sanitized_created_date_time, sysdate()) AS sanitized_created_date_time,
    sysdate() AS sanitized_updated_date_time,
    CASE WHEN pcr.sanitized_record_version IS NULL THEN 1 ELSE (pcr.sanitized_record_version + 1) END AS sanitized_record_version
  FROM combined_sources_pk AS src
  LEFT JOIN {{ this }} AS pcr
    ON src.id = pcr.id
),

final AS (
  SELECT
    id,
    order_id::STRING AS order_id,
    amount::NUMBER AS amount,
    sanitized_created_batch_id::VARCHAR AS sanitized_created_batch_id,
    sanitized_created_date_time::TIMESTAMP_NTZ AS sanitized_created_date_time,
    sanitized_updated_batch_id::VARCHAR AS sanitized_updated_batch_id,
    sanitized_updated_date_time::TIMESTAMP_NTZ AS sanitized_updated_date_time,
    sanitized_record_version::INTEGER AS sanitized_record_version
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
    assert!(!compiled.sql.contains("GROUP BY"));
}

#[test]
fn test_follow_up_join_row_with_join_columns_only() {
    let text = ORDERS.replace(
        r#""Primary Table Name dbt": "Orders_{Environment}"
  }],"#,
        r#""Primary Table Name dbt": "Orders_{Environment}"
  }, {
    "Source System Alias": "A",
    "Joined Table Alias": "c",
    "Joined Table Name dbt": "Customers_{Environment}",
    "Join Type": "LEFT JOIN",
    "Join Condition": "c.id = o.customer_id"
  }],"#,
    );
    assert_ne!(text, ORDERS);
    let workbook = Workbook::from_json(&text).unwrap();
    let compiled = compile(&workbook, &dbt("prod")).unwrap();
    assert!(compiled.warnings.is_empty());
    assert!(compiled.sql.contains("c AS (\n  SELECT *\n  FROM Customers_prod\n)"));
    assert!(compiled.sql.contains("  FROM o\n  LEFT JOIN c AS c\n    ON c.id = o.customer_id\n)"));
}

#[test]
fn test_orders_plain_dialect() {
    let workbook = Workbook::from_json(ORDERS).unwrap();
    let compiled = compile(&workbook, &CompileOptions::new(Dialect::Plain, "dev")).unwrap();
    assert!(compiled.sql.starts_with("-- materialized: incremental\n-- unique_key: id\n"));
    assert!(compiled.sql.contains("FROM Orders_dev"));
    assert!(compiled.sql.contains("MD5(COALESCE(CAST(source_system_name AS VARCHAR), '')"));
    assert!(compiled.sql.contains("LEFT JOIN orders AS pcr"));
    assert!(compiled.sql.ends_with("  FROM pre_final\n)\n\nSELECT * FROM final\n"));
}

#[test]
fn test_compilation_is_deterministic() {
    let workbook = Workbook::from_json(CUSTOMERS).unwrap();
    let first = compile(&workbook, &dbt("qa")).unwrap();
    let second = compile(&workbook, &dbt("qa")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_conformed_merge_rules() {
    let workbook = Workbook::from_json(CUSTOMERS).unwrap();
    let config = workbook.to_configuration(Dialect::Plain).unwrap();
    let plan = plan(&config, "qa");

    let names: Vec<&str> = plan.query.ctes().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["c", "a", "e", "crm_src", "erp_src", "combined_sources", "combined_sources_pk", "pre_final", "final"]
    );
    assert_eq!(plan.references.tables.get("a").unwrap().table_name, "crm_qa.addresses");

    let crm = plan.query.cte("crm_src").unwrap().as_select().unwrap();
    assert_eq!(crm.output_names(), vec!["customer_id", "email", "region"]);
    assert_eq!(crm.group_by.len(), 1);

    let erp = plan.query.cte("erp_src").unwrap().as_select().unwrap();
    assert_eq!(erp.output_names(), vec!["customer_id", "email", "region"]);

    assert!(plan.warnings.is_empty());
}

#[test]
fn test_conformed_has_no_surrogate_key() {
    let workbook = Workbook::from_json(CUSTOMERS).unwrap();
    let compiled = compile(&workbook, &dbt("qa")).unwrap();
    assert!(!compiled.sql.contains("generate_surrogate_key"));
    assert!(compiled.sql.contains("LEFT JOIN a AS a\n    ON a.customer_id = c.id"));
    assert!(compiled.sql.contains("LEFT JOIN c_existing AS latest_c"));
    assert!(compiled.sql.contains("conformed_record_version::INTEGER AS conformed_record_version"));
}

#[test]
fn test_malformed_rule_is_a_warning() {
    let text = CUSTOMERS.replace(r#""Merge Rule": "group by""#, r#""Merge Rule": "[not json""#);
    let workbook = Workbook::from_json(&text).unwrap();
    let compiled = compile(&workbook, &dbt("qa")).unwrap();
    assert!(!compiled.warnings.is_empty());
    assert!(
        compiled
            .warnings
            .iter()
            .all(|w| w.kind == WarningKind::MalformedMergeRule)
    );
    assert!(!compiled.sql.contains("GROUP BY"));
}

#[test]
fn test_missing_model_sheet_is_error() {
    let workbook = Workbook::from_json(r#"{"Table Setup": [], "Column Mappings": []}"#).unwrap();
    let err = compile(&workbook, &dbt("qa")).unwrap_err();
    assert!(matches!(err, ForgeError::ConfigurationMissing(_)));
}

#[test]
fn test_batch_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("sales");
    fs::create_dir(&nested).unwrap();
    fs::write(nested.join("orders.json"), ORDERS).unwrap();
    fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    fs::write(dir.path().join("empty.json"), r#"{"Model": []}"#).unwrap();

    let report = run_batch(dir.path(), "json", &dbt("prod")).unwrap();
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.written(), 1);
    assert_eq!(report.failed(), 2);
    assert!(!report.is_success());

    let written = nested.join("orders.sql");
    assert!(written.exists());
    assert!(fs::read_to_string(&written).unwrap().contains("FROM Orders_prod"));
    assert!(!dir.path().join("broken.sql").exists());
    assert!(!dir.path().join("empty.sql").exists());

    match &report.outcomes[0] {
        UnitOutcome::Failed { input, .. } => assert!(input.ends_with("broken.json")),
        other => panic!("expected failure, got {:?}", other),
    }
}
