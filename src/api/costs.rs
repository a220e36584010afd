//! Cost report endpoints.
//!
//! Dates in paths are `YYYY-MM-DD` and describe the half-open range
//! `[start_date, end_date)`: all of January 2024 is
//! `2024-01-01/2024-02-01`.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use crate::dates::{format_date, parse_date, DateRange, Interval, MAX_BILLING_MONTHS};
use crate::views::{run_view, View, ViewRequest, ViewResponse};
use crate::AppState;

/// Optional filters for grouped views
#[derive(Debug, Default, Deserialize)]
pub struct UnitFilter {
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BillingRangeParams {
    /// How many billing months to cover, ending with the current one
    #[serde(default = "default_months")]
    pub months: u32,
}

fn default_months() -> u32 {
    12
}

/// Longest window the recent endpoint will cover, in intervals
const MAX_RECENT_PERIODS: u32 = 366;

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    /// Number of whole intervals before the current one
    #[serde(default = "default_periods")]
    pub periods: u32,
    pub unit: Option<String>,
}

fn default_periods() -> u32 {
    12
}

#[derive(Debug, Serialize)]
pub struct BillingRangeResponse {
    pub start_date: String,
    pub end_date: String,
    pub months: u32,
    pub cutover_day: u32,
}

fn check_version(state: &AppState, version: &str) -> Result<(), ApiError> {
    if version == state.config.reporting.api_version {
        Ok(())
    } else {
        Err(ApiError::not_found(format!("Unknown API version: {}", version)))
    }
}

fn check_count(field: &str, value: u32, max: u32) -> Result<(), ApiError> {
    let mut builder = ValidationErrorBuilder::new();
    if value == 0 || value > max {
        builder.add(field, format!("must be between 1 and {}", max));
    }
    builder.finish()
}

fn view_request(
    view: View,
    range: DateRange,
    interval: Interval,
    unit: Option<String>,
) -> Result<ViewRequest, ApiError> {
    let mut request = ViewRequest::new(range, interval);
    if let Some(unit) = unit.filter(|u| !u.is_empty()) {
        if !view.filters_by_unit() {
            let mut builder = ValidationErrorBuilder::new();
            builder.add("unit", format!("The {} view cannot be filtered by unit", view));
            builder.finish()?;
        }
        request = request.with_unit(unit);
    }
    Ok(request)
}

fn parse_range(
    builder: &mut ValidationErrorBuilder,
    start_date: &str,
    end_date: &str,
) -> Option<DateRange> {
    let start = parse_date(start_date)
        .map_err(|e| builder.add("start_date", e.to_string()))
        .ok();
    let end = parse_date(end_date)
        .map_err(|e| builder.add("end_date", e.to_string()))
        .ok();
    Some(DateRange::new(start?, end?))
}

/// Total cost between two dates, excluding tax
///
/// GET /api/:version/costs/aws/total/:start_date/:end_date
pub async fn get_total(
    State(state): State<Arc<AppState>>,
    Path((version, start_date, end_date)): Path<(String, String, String)>,
) -> Result<Json<ViewResponse>, ApiError> {
    check_version(&state, &version)?;

    let mut builder = ValidationErrorBuilder::new();
    let range = parse_range(&mut builder, &start_date, &end_date);
    builder.finish()?;
    let range = range.ok_or_else(|| ApiError::bad_request("Invalid date range"))?;

    let request = ViewRequest::new(range, Interval::default());
    let response = run_view(&state.executor, View::Total, &request).await?;
    Ok(Json(response))
}

/// Grouped cost view
///
/// GET /api/:version/costs/aws/:view/:start_date/:end_date/:interval?unit=
pub async fn get_view(
    State(state): State<Arc<AppState>>,
    Path((version, view, start_date, end_date, interval)): Path<(String, String, String, String, String)>,
    Query(filter): Query<UnitFilter>,
) -> Result<Json<ViewResponse>, ApiError> {
    check_version(&state, &version)?;

    let view: View = view.parse().map_err(ApiError::not_found)?;

    let mut builder = ValidationErrorBuilder::new();
    let range = parse_range(&mut builder, &start_date, &end_date);
    let interval = interval
        .parse::<Interval>()
        .map_err(|e| builder.add("interval", e))
        .ok();
    builder.finish()?;

    let (range, interval) = range
        .zip(interval)
        .ok_or_else(|| ApiError::bad_request("Invalid date range"))?;

    let request = view_request(view, range, interval, filter.unit)?;

    tracing::debug!(view = %view, interval = %interval, "Serving cost view");

    let response = run_view(&state.executor, view, &request).await?;
    Ok(Json(response))
}

/// View over the last `periods` whole intervals before the current one
///
/// GET /api/:version/costs/aws/recent/:view/:interval?periods=N&unit=
pub async fn get_recent(
    State(state): State<Arc<AppState>>,
    Path((version, view, interval)): Path<(String, String, String)>,
    Query(params): Query<RecentParams>,
) -> Result<Json<ViewResponse>, ApiError> {
    check_version(&state, &version)?;

    let view: View = view.parse().map_err(ApiError::not_found)?;
    let interval: Interval = interval.parse().map_err(|e: String| {
        let mut builder = ValidationErrorBuilder::new();
        builder.add("interval", e);
        builder
            .build()
            .unwrap_or_else(|| ApiError::bad_request("Invalid interval"))
    })?;
    check_count("periods", params.periods, MAX_RECENT_PERIODS)?;

    let back = -(params.periods as i32);
    let range = DateRange::relative(interval, back, 0, Utc::now());
    let request = view_request(view, range, interval, params.unit)?;

    let response = run_view(&state.executor, view, &request).await?;
    Ok(Json(response))
}

/// Current billing window using the configured cutover day
///
/// GET /api/:version/costs/aws/billing-range?months=N
pub async fn get_billing_range(
    State(state): State<Arc<AppState>>,
    Path(version): Path<String>,
    Query(params): Query<BillingRangeParams>,
) -> Result<Json<BillingRangeResponse>, ApiError> {
    check_version(&state, &version)?;
    check_count("months", params.months, MAX_BILLING_MONTHS)?;

    let cycle = state.config.reporting.billing_cycle();
    let range = cycle.range(Utc::now(), params.months);

    Ok(Json(BillingRangeResponse {
        start_date: format_date(range.start),
        end_date: format_date(range.end),
        months: params.months,
        cutover_day: cycle.cutover_day,
    }))
}
