pub mod dbt;
pub mod plain;
