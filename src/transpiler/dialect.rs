use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::transpiler::sql::dbt::DbtGenerator;
use crate::transpiler::sql::plain::PlainGenerator;
use crate::transpiler::traits::SqlGenerator;

/// Supported output dialects.
///
/// The dialect also decides which Table Setup column variants are read,
/// see [`crate::workbook::ColumnVariants`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Dbt,
    #[serde(alias = "snowflake")]
    Plain,
}

impl Dialect {
    pub fn generator(&self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::Dbt => Box::new(DbtGenerator),
            Dialect::Plain => Box::new(PlainGenerator),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Dbt => "dbt",
            Dialect::Plain => "plain",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dbt" => Ok(Dialect::Dbt),
            "plain" | "snowflake" => Ok(Dialect::Plain),
            other => Err(format!("unknown dialect '{}': expected dbt or plain", other)),
        }
    }
}
