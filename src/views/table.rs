//! Pivot grouped rows into a table with one column per date bucket.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::db::Cost;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    /// Grouping column values, keyed by column name
    pub columns: BTreeMap<String, String>,
    /// Cost per date bucket; buckets without data are zero
    pub costs: BTreeMap<String, f64>,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostTable {
    pub rows: Vec<TableRow>,
    /// Sum of every row per date bucket
    pub totals: BTreeMap<String, f64>,
    pub total: f64,
}

/// One table row per distinct combination of `columns`, with a cost for
/// every label in `dates`.
///
/// Rows are ordered by their cost in the last bucket, highest first; rows
/// with equal cost keep the order they were first seen in.
pub fn tabulate(rows: &[Cost], columns: &[&str], dates: &[String]) -> CostTable {
    let skeleton: BTreeMap<String, f64> = dates.iter().map(|d| (d.clone(), 0.0)).collect();
    let mut table: Vec<TableRow> = Vec::new();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();

    for row in rows {
        let key: Vec<String> = columns
            .iter()
            .map(|column| row.column(column).unwrap_or_default().to_string())
            .collect();

        let position = *index.entry(key.clone()).or_insert_with(|| {
            table.push(TableRow {
                columns: columns
                    .iter()
                    .map(|c| c.to_string())
                    .zip(key)
                    .collect(),
                costs: skeleton.clone(),
                total: 0.0,
            });
            table.len() - 1
        });

        match table[position].costs.get_mut(&row.date) {
            Some(cost) => *cost += row.value(),
            None => tracing::warn!(date = %row.date, "Row date is outside the requested buckets, skipping"),
        }
    }

    let mut totals = skeleton;
    for row in &mut table {
        row.total = row.costs.values().sum();
        for (date, cost) in &row.costs {
            if let Some(sum) = totals.get_mut(date) {
                *sum += cost;
            }
        }
    }

    if let Some(last) = dates.last() {
        let last_cost = |row: &TableRow| row.costs.get(last).copied().unwrap_or(0.0);
        table.sort_by(|a, b| last_cost(b).total_cmp(&last_cost(a)));
    }

    let total = totals.values().sum();
    CostTable {
        rows: table,
        totals,
        total,
    }
}
