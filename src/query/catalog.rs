//! The fixed set of statements that may run against the `costs` table.
//!
//! Callers pick a variant; they never supply SQL. Scalar statements bind
//! positional `?` values in declaration order (start date, then end date).
//! Row-set statements use `:name` placeholders filled from a
//! [`ParameterBag`](super::ParameterBag).
//!
//! All row-set statements leave out rows whose service is `Tax`, except
//! [`RowSetQuery::TaxOverview`] which reports both sums side by side.

use serde::Serialize;

use crate::error::QueryError;

const ROW_COUNT: &str = r#"
SELECT
    CAST(count(*) AS REAL) as row_count
FROM costs
LIMIT 1
"#;

const TOTAL: &str = r#"
SELECT
    CAST(COALESCE(SUM(cost), 0) AS REAL) as total
FROM costs
WHERE
    date >= ?
    AND date < ?
    AND service != 'Tax'
LIMIT 1
"#;

const TOTAL_INCLUDING_TAX: &str = r#"
SELECT
    CAST(COALESCE(SUM(cost), 0) AS REAL) as total
FROM costs
WHERE
    date >= ?
    AND date < ?
LIMIT 1
"#;

const TAX_OVERVIEW: &str = r#"
SELECT
    'Including Tax' as service,
    CAST(COALESCE(SUM(cost), 0) AS TEXT) as cost,
    strftime(:date_format, date) as date
FROM costs as inc_tax
WHERE
    inc_tax.date >= :start_date
    AND inc_tax.date < :end_date
GROUP BY strftime(:date_format, inc_tax.date)
UNION ALL
SELECT
    'Excluding Tax' as service,
    CAST(COALESCE(SUM(cost), 0) AS TEXT) as cost,
    strftime(:date_format, date) as date
FROM costs as exc_tax
WHERE
    exc_tax.date >= :start_date
    AND exc_tax.date < :end_date
    AND exc_tax.service != 'Tax'
GROUP BY strftime(:date_format, exc_tax.date)
ORDER BY date ASC, service DESC
"#;

const PER_UNIT: &str = r#"
SELECT
    unit,
    CAST(COALESCE(SUM(cost), 0) AS TEXT) as cost,
    strftime(:date_format, date) as date
FROM costs
WHERE
    date >= :start_date
    AND date < :end_date
    AND service != 'Tax'
GROUP BY strftime(:date_format, costs.date), unit
ORDER BY date ASC, unit ASC
"#;

const PER_UNIT_FOR_UNIT: &str = r#"
SELECT
    unit,
    CAST(COALESCE(SUM(cost), 0) AS TEXT) as cost,
    strftime(:date_format, date) as date
FROM costs
WHERE
    date >= :start_date
    AND date < :end_date
    AND service != 'Tax'
    AND unit = :unit
GROUP BY strftime(:date_format, costs.date), unit
ORDER BY date ASC, unit ASC
"#;

// Accounts without distinct environments are stored as "null" and shown
// as production.
const PER_UNIT_ENVIRONMENT: &str = r#"
SELECT
    unit,
    IIF(environment != 'null', environment, 'production') as environment,
    CAST(COALESCE(SUM(cost), 0) AS TEXT) as cost,
    strftime(:date_format, date) as date
FROM costs
WHERE
    date >= :start_date
    AND date < :end_date
    AND service != 'Tax'
GROUP BY
    strftime(:date_format, costs.date),
    unit,
    IIF(costs.environment != 'null', costs.environment, 'production')
ORDER BY date ASC, unit ASC, environment ASC
"#;

const PER_UNIT_ENVIRONMENT_FOR_UNIT: &str = r#"
SELECT
    unit,
    IIF(environment != 'null', environment, 'production') as environment,
    CAST(COALESCE(SUM(cost), 0) AS TEXT) as cost,
    strftime(:date_format, date) as date
FROM costs
WHERE
    date >= :start_date
    AND date < :end_date
    AND service != 'Tax'
    AND unit = :unit
GROUP BY
    strftime(:date_format, costs.date),
    unit,
    IIF(costs.environment != 'null', costs.environment, 'production')
ORDER BY date ASC, unit ASC, environment ASC
"#;

const DETAILED: &str = r#"
SELECT
    unit,
    IIF(environment != 'null', environment, 'production') as environment,
    organisation,
    account_id,
    account_name,
    label,
    service,
    CAST(COALESCE(SUM(cost), 0) AS TEXT) as cost,
    strftime(:date_format, date) as date
FROM costs
WHERE
    date >= :start_date
    AND date < :end_date
    AND service != 'Tax'
GROUP BY
    strftime(:date_format, costs.date),
    unit,
    IIF(costs.environment != 'null', costs.environment, 'production'),
    organisation,
    account_id,
    service
ORDER BY date ASC, unit ASC, environment ASC, organisation ASC, account_id ASC, service ASC
"#;

const DETAILED_FOR_UNIT: &str = r#"
SELECT
    unit,
    IIF(environment != 'null', environment, 'production') as environment,
    organisation,
    account_id,
    account_name,
    label,
    service,
    CAST(COALESCE(SUM(cost), 0) AS TEXT) as cost,
    strftime(:date_format, date) as date
FROM costs
WHERE
    date >= :start_date
    AND date < :end_date
    AND service != 'Tax'
    AND unit = :unit
GROUP BY
    strftime(:date_format, costs.date),
    unit,
    IIF(costs.environment != 'null', costs.environment, 'production'),
    organisation,
    account_id,
    service
ORDER BY date ASC, unit ASC, environment ASC, organisation ASC, account_id ASC, service ASC
"#;

/// Statements returning a single number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarQuery {
    /// Number of rows in the table, takes no arguments
    RowCount,
    /// Sum of cost in `[start, end)` without tax
    Total,
    /// Sum of cost in `[start, end)` including tax
    TotalIncludingTax,
}

impl ScalarQuery {
    pub const ALL: [ScalarQuery; 3] = [
        ScalarQuery::RowCount,
        ScalarQuery::Total,
        ScalarQuery::TotalIncludingTax,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScalarQuery::RowCount => "row_count",
            ScalarQuery::Total => "total",
            ScalarQuery::TotalIncludingTax => "total_including_tax",
        }
    }

    pub fn statement(&self) -> &'static str {
        match self {
            ScalarQuery::RowCount => ROW_COUNT,
            ScalarQuery::Total => TOTAL,
            ScalarQuery::TotalIncludingTax => TOTAL_INCLUDING_TAX,
        }
    }

    /// Find a catalog entry by name or by its exact statement text
    pub fn lookup(query: &str) -> Result<Self, QueryError> {
        Self::ALL
            .into_iter()
            .find(|q| q.name() == query || q.statement() == query)
            .ok_or_else(|| QueryError::UnknownQuery(query.trim().to_string()))
    }
}

/// Statements returning cost rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSetQuery {
    TaxOverview,
    PerUnit,
    PerUnitForUnit,
    PerUnitEnvironment,
    PerUnitEnvironmentForUnit,
    Detailed,
    DetailedForUnit,
}

impl RowSetQuery {
    pub const ALL: [RowSetQuery; 7] = [
        RowSetQuery::TaxOverview,
        RowSetQuery::PerUnit,
        RowSetQuery::PerUnitForUnit,
        RowSetQuery::PerUnitEnvironment,
        RowSetQuery::PerUnitEnvironmentForUnit,
        RowSetQuery::Detailed,
        RowSetQuery::DetailedForUnit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RowSetQuery::TaxOverview => "tax_overview",
            RowSetQuery::PerUnit => "per_unit",
            RowSetQuery::PerUnitForUnit => "per_unit_for_unit",
            RowSetQuery::PerUnitEnvironment => "per_unit_environment",
            RowSetQuery::PerUnitEnvironmentForUnit => "per_unit_environment_for_unit",
            RowSetQuery::Detailed => "detailed",
            RowSetQuery::DetailedForUnit => "detailed_for_unit",
        }
    }

    pub fn statement(&self) -> &'static str {
        match self {
            RowSetQuery::TaxOverview => TAX_OVERVIEW,
            RowSetQuery::PerUnit => PER_UNIT,
            RowSetQuery::PerUnitForUnit => PER_UNIT_FOR_UNIT,
            RowSetQuery::PerUnitEnvironment => PER_UNIT_ENVIRONMENT,
            RowSetQuery::PerUnitEnvironmentForUnit => PER_UNIT_ENVIRONMENT_FOR_UNIT,
            RowSetQuery::Detailed => DETAILED,
            RowSetQuery::DetailedForUnit => DETAILED_FOR_UNIT,
        }
    }

    /// The unit-filtered sibling of this statement, if it has one
    pub fn for_unit(&self) -> Option<Self> {
        match self {
            RowSetQuery::PerUnit | RowSetQuery::PerUnitForUnit => Some(RowSetQuery::PerUnitForUnit),
            RowSetQuery::PerUnitEnvironment | RowSetQuery::PerUnitEnvironmentForUnit => {
                Some(RowSetQuery::PerUnitEnvironmentForUnit)
            }
            RowSetQuery::Detailed | RowSetQuery::DetailedForUnit => Some(RowSetQuery::DetailedForUnit),
            RowSetQuery::TaxOverview => None,
        }
    }

    pub fn lookup(query: &str) -> Result<Self, QueryError> {
        Self::ALL
            .into_iter()
            .find(|q| q.name() == query || q.statement() == query)
            .ok_or_else(|| QueryError::UnknownQuery(query.trim().to_string()))
    }
}
