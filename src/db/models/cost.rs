//! Cost record model.
//!
//! One row of billed cost for a cloud account on a day. Rows are written by
//! the importer and never updated. Grouped queries fill only the columns
//! they select; the rest are left at their defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Stored environment for accounts without distinct environments
pub const NULL_ENVIRONMENT: &str = "null";

/// What a "null" environment is shown as
pub const DEFAULT_ENVIRONMENT: &str = "production";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[sqlx(default)]
pub struct Cost {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    /// When the record was created
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ts: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organisation: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account_name: String,
    /// Team that owns the account
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(default)]
    pub service: String,
    /// Day the cost was incurred, or the bucket label on grouped rows
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,
    /// Decimal amount kept as text
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cost: String,
}

fn is_zero(id: &i64) -> bool {
    *id == 0
}

impl Cost {
    /// The cost as a number. Unparseable or non-finite text (`NaN`, `inf`)
    /// reads as zero.
    pub fn value(&self) -> f64 {
        self.cost
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    /// Text of a grouping column by name. The environment is returned as
    /// displayed.
    pub fn column(&self, name: &str) -> Option<&str> {
        let value = match name {
            "organisation" => &self.organisation,
            "account_id" => &self.account_id,
            "account_name" => &self.account_name,
            "unit" => &self.unit,
            "label" => &self.label,
            "environment" => return Some(self.display_environment()),
            "region" => &self.region,
            "service" => &self.service,
            "date" => &self.date,
            _ => return None,
        };
        Some(value)
    }

    /// Environment as shown in grouped views
    pub fn display_environment(&self) -> &str {
        if self.environment == NULL_ENVIRONMENT {
            DEFAULT_ENVIRONMENT
        } else {
            &self.environment
        }
    }

    /// Insert a record, returning the new id
    pub async fn insert(db: &SqlitePool, cost: &Cost) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO costs (
                ts, organisation, account_id, account_name, unit, label,
                environment, region, service, date, cost
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&cost.ts)
        .bind(&cost.organisation)
        .bind(&cost.account_id)
        .bind(&cost.account_name)
        .bind(&cost.unit)
        .bind(&cost.label)
        .bind(&cost.environment)
        .bind(&cost.region)
        .bind(&cost.service)
        .bind(&cost.date)
        .bind(&cost.cost)
        .execute(db)
        .await?;

        Ok(result.last_insert_rowid())
    }
}

/// Distinct values for each of `columns` across `rows`, in the order they
/// are first seen. Used to build filter options.
///
/// Rows that cannot be turned into a JSON object are skipped with a
/// warning, as is a requested column a row does not carry.
pub fn column_values<T: Serialize>(rows: &[T], columns: &[&str]) -> BTreeMap<String, Vec<Value>> {
    let mut values: BTreeMap<String, Vec<Value>> = columns
        .iter()
        .map(|column| (column.to_string(), Vec::new()))
        .collect();

    for (index, row) in rows.iter().enumerate() {
        let mapped = match serde_json::to_value(row) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                tracing::warn!(row = index, kind = ?other, "Row is not a structured record, skipping");
                continue;
            }
            Err(e) => {
                tracing::warn!(row = index, error = %e, "Failed to convert row, skipping");
                continue;
            }
        };

        for column in columns {
            let Some(value) = mapped.get(*column) else {
                tracing::warn!(row = index, column = %column, "Row has no value for column, skipping");
                continue;
            };
            if let Some(seen) = values.get_mut(*column) {
                if !seen.contains(value) {
                    seen.push(value.clone());
                }
            }
        }
    }

    values
}
