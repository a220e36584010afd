//! Named report views built on the query catalog.
//!
//! A view picks the statement to run, fills its parameters from a date
//! range and interval, and packages the result with the column ordering
//! and filter options a caller needs to render it.

mod table;

pub use table::{tabulate, CostTable, TableRow};

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::dates::{DateRange, Interval};
use crate::db::{column_values, Cost};
use crate::error::QueryError;
use crate::query::{ParameterBag, QueryExecutor, RowSetQuery, ScalarQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Total,
    TaxOverview,
    Unit,
    UnitEnvironment,
    Detailed,
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total" => Ok(Self::Total),
            "tax-overview" => Ok(Self::TaxOverview),
            "unit" => Ok(Self::Unit),
            "unit-environment" => Ok(Self::UnitEnvironment),
            "detailed" => Ok(Self::Detailed),
            _ => Err(format!("Unknown view: {}", s)),
        }
    }
}

impl View {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::TaxOverview => "tax-overview",
            Self::Unit => "unit",
            Self::UnitEnvironment => "unit-environment",
            Self::Detailed => "detailed",
        }
    }

    /// Columns, in display order, that identify a row of this view
    pub fn column_order(&self) -> &'static [&'static str] {
        match self {
            Self::Total => &[],
            Self::TaxOverview => &["service"],
            Self::Unit => &["unit"],
            Self::UnitEnvironment => &["unit", "environment"],
            Self::Detailed => &["account_id", "unit", "environment", "service"],
        }
    }

    /// Whether the view has a unit-filtered statement
    pub fn filters_by_unit(&self) -> bool {
        matches!(self, Self::Unit | Self::UnitEnvironment | Self::Detailed)
    }

    /// Row-set statement for this view; a non-empty unit filter selects the
    /// filtered variant where one exists. `None` for the scalar total.
    pub fn query(&self, unit: Option<&str>) -> Option<RowSetQuery> {
        let base = match self {
            Self::Total => return None,
            Self::TaxOverview => RowSetQuery::TaxOverview,
            Self::Unit => RowSetQuery::PerUnit,
            Self::UnitEnvironment => RowSetQuery::PerUnitEnvironment,
            Self::Detailed => RowSetQuery::Detailed,
        };
        match unit {
            Some(unit) if !unit.is_empty() && self.filters_by_unit() => {
                Some(base.for_unit().unwrap_or(base))
            }
            _ => Some(base),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRequest {
    pub range: DateRange,
    pub interval: Interval,
    pub unit: Option<String>,
}

impl ViewRequest {
    pub fn new(range: DateRange, interval: Interval) -> Self {
        Self {
            range,
            interval,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    fn unit_filter(&self) -> Option<&str> {
        self.unit.as_deref().filter(|u| !u.is_empty())
    }

    pub fn parameters(&self) -> ParameterBag {
        ParameterBag::grouped(&self.range, self.interval, self.unit_filter())
    }
}

/// Request values echoed back with every response. Only the values that
/// shaped the result are included.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEcho {
    pub start_date: String,
    pub end_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewResponse {
    #[serde(rename = "type")]
    pub view: View,
    pub request: RequestEcho,
    pub column_order: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub column_values: BTreeMap<String, Vec<Value>>,
    /// Every bucket label in the range, so empty buckets can be shown
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub date_range: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Cost>>,
    /// Rows pivoted by date bucket with row and column totals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<CostTable>,
}

pub async fn run_view(
    executor: &QueryExecutor,
    view: View,
    request: &ViewRequest,
) -> Result<ViewResponse, QueryError> {
    let grouped = view != View::Total;
    let mut response = ViewResponse {
        view,
        request: RequestEcho {
            start_date: request.range.start_date(),
            end_date: request.range.end_date(),
            interval: grouped.then_some(request.interval),
            unit: request
                .unit_filter()
                .filter(|_| view.filters_by_unit())
                .map(str::to_string),
        },
        column_order: view.column_order().iter().map(|c| c.to_string()).collect(),
        column_values: BTreeMap::new(),
        date_range: Vec::new(),
        total: None,
        rows: None,
        table: None,
    };

    debug!(view = %view, empty_range = request.range.is_empty(), "Running view");

    match view.query(request.unit_filter()) {
        None => {
            let args = [request.range.start_date(), request.range.end_date()];
            response.total = Some(executor.run_scalar(ScalarQuery::Total, &args).await?);
        }
        Some(query) => {
            let rows = executor.run_many(query, &request.parameters()).await?;
            let dates = request.range.labels(request.interval);
            response.column_values = column_values(&rows, view.column_order());
            response.table = Some(tabulate(&rows, view.column_order(), &dates));
            response.date_range = dates;
            response.rows = Some(rows);
        }
    }

    Ok(response)
}
