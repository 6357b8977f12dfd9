//! Building blocks of the `querybridge` command-line tool.
//!
//! Table changes are read from JSON files in the camelCase layout of
//! [`DatabaseTableSchemaChange`]; every command writes JSON to stdout.

use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use serde::Serialize;

use querybridge_core::catalog::{TypeDescription, TypeParameter, TypeSuggestion};
use querybridge_core::prelude::*;
use querybridge_driver::Driver;

/// Dialect selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Mysql,
    Postgres,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Mysql => Self::MySql,
            DialectArg::Postgres => Self::Postgres,
            DialectArg::Sqlite => Self::Sqlite,
        }
    }
}

// ================================================================
// Change files
// ================================================================

/// Reads a table change from a JSON file.
///
/// # Errors
///
/// Fails when the file cannot be read or does not hold a table change.
pub fn load_change(path: &Path) -> anyhow::Result<DatabaseTableSchemaChange> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse table change in {}", path.display()))
}

/// A plan as printed by `plan` and `apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    pub strategy: &'static str,
    pub statements: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<&SchemaChangePlan> for PlanReport {
    fn from(plan: &SchemaChangePlan) -> Self {
        let strategy = match plan.strategy {
            ChangeStrategy::Empty => "empty",
            ChangeStrategy::Create => "create",
            ChangeStrategy::Alter => "alter",
            ChangeStrategy::Recreate => "recreate",
        };
        Self {
            strategy,
            statements: plan.statements.clone(),
            warnings: plan.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Plans `change` for `dialect` without a database.
///
/// # Errors
///
/// Fails when the dialect cannot express the change.
pub fn plan_change(
    dialect: Dialect,
    change: &DatabaseTableSchemaChange,
) -> anyhow::Result<PlanReport> {
    let dialect = for_dialect(dialect);
    let plan = plan_table_schema_change(dialect.as_ref(), change)?;
    Ok(PlanReport::from(&plan))
}

/// Plans `change` and runs it through `driver`.
///
/// # Errors
///
/// Fails when planning fails or a statement is rejected; nothing is applied
/// in either case.
pub async fn apply_change<D: Driver>(
    driver: &D,
    change: &DatabaseTableSchemaChange,
) -> anyhow::Result<PlanReport> {
    let plan = driver
        .apply_table_schema_change(change)
        .await
        .with_context(|| {
            format!(
                "Failed to apply change to table '{}'",
                change.old_name().or(change.new_name()).unwrap_or_default()
            )
        })?;
    Ok(PlanReport::from(&plan))
}

// ================================================================
// Type catalog
// ================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterReport {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    pub min: u32,
    pub max: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<u32>,
    pub required: bool,
}

impl From<&TypeParameter> for ParameterReport {
    fn from(parameter: &TypeParameter) -> Self {
        Self {
            name: parameter.name,
            description: parameter.description,
            min: parameter.min,
            max: parameter.max,
            default: parameter.default,
            required: parameter.required,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeReport {
    pub name: &'static str,
    pub description: String,
    pub parameters: Vec<ParameterReport>,
}

impl From<&TypeSuggestion> for TypeReport {
    fn from(suggestion: &TypeSuggestion) -> Self {
        // Dynamic descriptions are previewed with the parameter defaults.
        let defaults: Vec<String> = suggestion
            .parameters
            .iter()
            .filter_map(|p| p.default.map(|d| d.to_string()))
            .collect();
        let description = match suggestion.description {
            TypeDescription::Static(text) => text.to_string(),
            TypeDescription::Dynamic(_) => suggestion.describe(&defaults),
        };
        Self {
            name: suggestion.name,
            description,
            parameters: suggestion
                .parameters
                .iter()
                .map(ParameterReport::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeGroupReport {
    pub group: &'static str,
    pub types: Vec<TypeReport>,
}

/// The type catalog of `dialect`, grouped as a UI would offer it.
#[must_use]
pub fn type_catalog(dialect: Dialect) -> Vec<TypeGroupReport> {
    for_dialect(dialect)
        .column_type_selector()
        .groups
        .iter()
        .map(|group| TypeGroupReport {
            group: group.name,
            types: group.suggestions.iter().map(TypeReport::from).collect(),
        })
        .collect()
}

/// Validates a type string such as `decimal(10, 2)` for `dialect`.
///
/// # Errors
///
/// Fails with the offending parameter when the type is invalid.
pub fn validate_type(dialect: Dialect, type_string: &str) -> anyhow::Result<String> {
    Ok(for_dialect(dialect)
        .column_type_selector()
        .validate(type_string)?)
}
