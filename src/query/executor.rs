//! Runs catalog statements against a cost store.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error};

use super::catalog::{RowSetQuery, ScalarQuery};
use super::params::{bind_named, required_placeholders, validate, ParameterBag};
use crate::db::Cost;
use crate::error::QueryError;

/// Storage the executor reads from
#[async_trait]
pub trait CostStore: Send + Sync {
    /// Run a statement with positional `?` arguments and return its single value
    async fn fetch_scalar(&self, statement: &str, args: &[String]) -> Result<f64, sqlx::Error>;

    /// Run a statement with `:name` placeholders and return every row in order
    async fn fetch_rows(
        &self,
        statement: &str,
        params: &ParameterBag,
    ) -> Result<Vec<Cost>, sqlx::Error>;
}

#[async_trait]
impl CostStore for SqlitePool {
    async fn fetch_scalar(&self, statement: &str, args: &[String]) -> Result<f64, sqlx::Error> {
        let mut query = sqlx::query_scalar::<_, f64>(statement);
        for arg in args {
            query = query.bind(arg.as_str());
        }
        query.fetch_one(self).await
    }

    async fn fetch_rows(
        &self,
        statement: &str,
        params: &ParameterBag,
    ) -> Result<Vec<Cost>, sqlx::Error> {
        let (sql, values) = bind_named(statement, params).map_err(sqlx::Error::Protocol)?;
        let mut query = sqlx::query_as::<_, Cost>(&sql);
        for value in values {
            query = query.bind(value);
        }
        query.fetch_all(self).await
    }
}

/// Executes catalog statements. Parameters are checked before any read;
/// storage failures are returned as they are, without retries.
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn CostStore>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn CostStore>) -> Self {
        Self { store }
    }

    pub async fn run_scalar(&self, query: ScalarQuery, args: &[String]) -> Result<f64, QueryError> {
        debug!(query = query.name(), args = ?args, "Running scalar query");

        self.store
            .fetch_scalar(query.statement(), args)
            .await
            .map_err(|e| {
                error!(query = query.name(), error = %e, "Scalar query failed");
                QueryError::Storage(e)
            })
    }

    /// Like [`run_scalar`](Self::run_scalar) for a statement given by name
    /// or text; anything outside the catalog is refused before any read.
    pub async fn run_scalar_named(&self, query: &str, args: &[String]) -> Result<f64, QueryError> {
        let query = ScalarQuery::lookup(query).map_err(|e| {
            error!(error = %e, "Refusing scalar query");
            e
        })?;
        self.run_scalar(query, args).await
    }

    pub async fn run_many(
        &self,
        query: RowSetQuery,
        params: &ParameterBag,
    ) -> Result<Vec<Cost>, QueryError> {
        let needs = required_placeholders(query.statement());
        if let Err(e) = validate(params, &needs) {
            error!(query = query.name(), error = %e, "Invalid parameters");
            return Err(e);
        }

        debug!(query = query.name(), params = ?params, "Running row-set query");

        self.store
            .fetch_rows(query.statement(), params)
            .await
            .map_err(|e| {
                error!(query = query.name(), error = %e, "Row-set query failed");
                QueryError::Storage(e)
            })
    }

    pub async fn run_many_named(
        &self,
        query: &str,
        params: &ParameterBag,
    ) -> Result<Vec<Cost>, QueryError> {
        let query = RowSetQuery::lookup(query).map_err(|e| {
            error!(error = %e, "Refusing row-set query");
            e
        })?;
        self.run_many(query, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, Cost};
    use crate::dates::{parse_date, DateRange, Interval};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts reads and returns nothing
    #[derive(Default)]
    struct CountingStore {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl CostStore for CountingStore {
        async fn fetch_scalar(&self, _: &str, _: &[String]) -> Result<f64, sqlx::Error> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(0.0)
        }

        async fn fetch_rows(&self, _: &str, _: &ParameterBag) -> Result<Vec<Cost>, sqlx::Error> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn record(unit: &str, env: &str, account: &str, service: &str, date: &str, cost: &str) -> Cost {
        Cost {
            ts: "2024-03-01T00:00:00Z".to_string(),
            organisation: "org".to_string(),
            account_id: account.to_string(),
            account_name: format!("{}-account", unit),
            unit: unit.to_string(),
            label: "label".to_string(),
            environment: env.to_string(),
            region: "eu-west-1".to_string(),
            service: service.to_string(),
            date: date.to_string(),
            cost: cost.to_string(),
            ..Default::default()
        }
    }

    async fn seeded(rows: &[Cost]) -> (SqlitePool, QueryExecutor) {
        let pool = db::init_memory().await.unwrap();
        for row in rows {
            Cost::insert(&pool, row).await.unwrap();
        }
        let executor = QueryExecutor::new(Arc::new(pool.clone()));
        (pool, executor)
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(parse_date(start).unwrap(), parse_date(end).unwrap())
    }

    fn args(range: &DateRange) -> Vec<String> {
        vec![range.start_date(), range.end_date()]
    }

    #[tokio::test]
    async fn test_unknown_query_never_reads() {
        let store = Arc::new(CountingStore::default());
        let executor = QueryExecutor::new(store.clone());

        let err = executor
            .run_scalar_named("SELECT * FROM costs", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownQuery(_)));

        let bag = ParameterBag::new().with("start_date", "2024-01-01");
        let err = executor
            .run_many_named("DROP TABLE costs", &bag)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownQuery(_)));

        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_bag_never_reads() {
        let store = Arc::new(CountingStore::default());
        let executor = QueryExecutor::new(store.clone());

        let bag = ParameterBag::new().with("start_date", "2024-01-01");
        match executor.run_many(RowSetQuery::PerUnit, &bag).await {
            Err(QueryError::MissingParameters { missing }) => {
                assert_eq!(missing, vec!["date_format", "end_date"]);
            }
            other => panic!("expected missing parameters, got {:?}", other),
        }

        let err = executor
            .run_many(RowSetQuery::Detailed, &ParameterBag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::EmptyParameters));

        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_named_lookup_runs_known_queries() {
        let store = Arc::new(CountingStore::default());
        let executor = QueryExecutor::new(store.clone());

        executor.run_scalar_named("row_count", &[]).await.unwrap();
        let bag = ParameterBag::grouped(&range("2024-01-01", "2024-02-01"), Interval::Month, None);
        executor.run_many_named("tax_overview", &bag).await.unwrap();

        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_row_count() {
        let (_pool, executor) = seeded(&[
            record("unitA", "production", "101", "ec2", "2024-01-10", "1"),
            record("unitA", "production", "101", "s3", "2024-01-11", "2"),
        ])
        .await;
        let count = executor.run_scalar(ScalarQuery::RowCount, &[]).await.unwrap();
        assert_eq!(count, 2.0);
    }

    #[tokio::test]
    async fn test_empty_range_is_zero() {
        let (_pool, executor) = seeded(&[
            record("unitA", "production", "101", "ec2", "2024-01-10", "50"),
            record("unitA", "production", "101", "Tax", "2024-01-10", "10"),
        ])
        .await;
        let empty = range("2024-01-10", "2024-01-10");

        for query in [ScalarQuery::Total, ScalarQuery::TotalIncludingTax] {
            let total = executor.run_scalar(query, &args(&empty)).await.unwrap();
            assert_eq!(total, 0.0);
        }

        for query in RowSetQuery::ALL {
            let bag = ParameterBag::grouped(&empty, Interval::Day, Some("unitA"));
            let rows = executor.run_many(query, &bag).await.unwrap();
            assert!(rows.is_empty(), "{}", query.name());
        }
    }

    #[tokio::test]
    async fn test_tax_excluded_from_totals_and_views() {
        let (_pool, executor) = seeded(&[
            record("unitA", "production", "101", "Tax", "2024-01-05", "100"),
            record("unitB", "production", "201", "ec2", "2024-01-06", "50"),
        ])
        .await;
        let january = range("2024-01-01", "2024-02-01");

        let without = executor.run_scalar(ScalarQuery::Total, &args(&january)).await.unwrap();
        assert_eq!(without, 50.0);
        let with = executor
            .run_scalar(ScalarQuery::TotalIncludingTax, &args(&january))
            .await
            .unwrap();
        assert_eq!(with, 150.0);

        let bag = ParameterBag::grouped(&january, Interval::Month, None);
        for query in [RowSetQuery::PerUnit, RowSetQuery::PerUnitEnvironment, RowSetQuery::Detailed] {
            let rows = executor.run_many(query, &bag).await.unwrap();
            assert_eq!(rows.len(), 1, "{}", query.name());
            assert_eq!(rows[0].unit, "unitB");
            assert_eq!(rows[0].value(), 50.0);
            assert_ne!(rows[0].service, "Tax");
        }
    }

    #[tokio::test]
    async fn test_tax_overview_splits_each_bucket() {
        let (_pool, executor) = seeded(&[
            record("unitA", "production", "101", "ec2", "2024-01-10", "50"),
            record("unitA", "production", "101", "Tax", "2024-01-15", "10"),
        ])
        .await;
        let bag = ParameterBag::grouped(&range("2024-01-01", "2024-02-01"), Interval::Month, None);

        let rows = executor.run_many(RowSetQuery::TaxOverview, &bag).await.unwrap();
        assert_eq!(rows.len(), 2);

        let including = rows.iter().find(|r| r.service == "Including Tax").unwrap();
        let excluding = rows.iter().find(|r| r.service == "Excluding Tax").unwrap();
        assert_eq!(including.value(), 60.0);
        assert_eq!(excluding.value(), 50.0);
        assert_eq!(including.date, "2024-01");
        assert_eq!(excluding.date, "2024-01");
    }

    #[tokio::test]
    async fn test_half_open_range_excludes_end() {
        let (_pool, executor) = seeded(&[
            record("unitA", "production", "101", "ec2", "2024-01-01", "5"),
            record("unitA", "production", "101", "ec2", "2024-01-31", "7"),
            record("unitA", "production", "101", "ec2", "2024-02-01", "11"),
        ])
        .await;
        let january = range("2024-01-01", "2024-02-01");
        let total = executor.run_scalar(ScalarQuery::Total, &args(&january)).await.unwrap();
        assert_eq!(total, 12.0);
    }

    #[tokio::test]
    async fn test_null_environment_shown_as_production() {
        let (_pool, executor) = seeded(&[
            record("unitA", "null", "101", "ec2", "2024-01-10", "4"),
            record("unitA", "production", "102", "ec2", "2024-01-11", "6"),
            record("unitA", "staging", "103", "ec2", "2024-01-12", "3"),
        ])
        .await;
        let bag = ParameterBag::grouped(&range("2024-01-01", "2024-02-01"), Interval::Month, None);

        let rows = executor
            .run_many(RowSetQuery::PerUnitEnvironment, &bag)
            .await
            .unwrap();
        let environments: Vec<&str> = rows.iter().map(|r| r.environment.as_str()).collect();
        assert_eq!(environments, vec!["production", "staging"]);
        assert_eq!(rows[0].value(), 10.0);
        assert_eq!(rows[1].value(), 3.0);
    }

    #[tokio::test]
    async fn test_grouping_and_order() {
        let (_pool, executor) = seeded(&[
            record("unitB", "production", "201", "ec2", "2024-02-03", "1"),
            record("unitA", "staging", "102", "s3", "2024-01-20", "2"),
            record("unitA", "production", "101", "s3", "2024-01-05", "3"),
            record("unitA", "production", "101", "ec2", "2024-01-06", "4"),
            record("unitB", "production", "201", "ec2", "2024-01-07", "5"),
        ])
        .await;
        let bag = ParameterBag::grouped(&range("2024-01-01", "2024-03-01"), Interval::Month, None);

        let rows = executor.run_many(RowSetQuery::PerUnit, &bag).await.unwrap();
        let keys: Vec<(String, String, f64)> = rows
            .iter()
            .map(|r| (r.date.clone(), r.unit.clone(), r.value()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2024-01".to_string(), "unitA".to_string(), 9.0),
                ("2024-01".to_string(), "unitB".to_string(), 5.0),
                ("2024-02".to_string(), "unitB".to_string(), 1.0),
            ]
        );

        let rows = executor.run_many(RowSetQuery::Detailed, &bag).await.unwrap();
        let keys: Vec<(&str, &str, &str, &str)> = rows
            .iter()
            .map(|r| (r.date.as_str(), r.unit.as_str(), r.environment.as_str(), r.service.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2024-01", "unitA", "production", "ec2"),
                ("2024-01", "unitA", "production", "s3"),
                ("2024-01", "unitA", "staging", "s3"),
                ("2024-01", "unitB", "production", "ec2"),
                ("2024-02", "unitB", "production", "ec2"),
            ]
        );
        assert_eq!(rows[0].account_id, "101");
        assert_eq!(rows[0].organisation, "org");
    }

    #[tokio::test]
    async fn test_unit_filter_and_year_grouping() {
        let (_pool, executor) = seeded(&[
            record("unitA", "production", "101", "ec2", "2023-12-31", "2"),
            record("unitA", "production", "101", "ec2", "2024-01-01", "3"),
            record("unitB", "production", "201", "ec2", "2024-01-01", "4"),
        ])
        .await;
        let bag = ParameterBag::grouped(&range("2023-01-01", "2025-01-01"), Interval::Year, Some("unitA"));

        let rows = executor.run_many(RowSetQuery::PerUnitForUnit, &bag).await.unwrap();
        let keys: Vec<(&str, f64)> = rows.iter().map(|r| (r.date.as_str(), r.value())).collect();
        assert_eq!(keys, vec![("2023", 2.0), ("2024", 3.0)]);
        assert!(rows.iter().all(|r| r.unit == "unitA"));
    }

    #[tokio::test]
    async fn test_filtered_query_without_unit_is_rejected() {
        let (_pool, executor) = seeded(&[]).await;
        let bag = ParameterBag::grouped(&range("2024-01-01", "2024-02-01"), Interval::Month, None);
        match executor.run_many(RowSetQuery::DetailedForUnit, &bag).await {
            Err(QueryError::MissingParameters { missing }) => assert_eq!(missing, vec!["unit"]),
            other => panic!("expected missing unit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_surfaced() {
        let (pool, executor) = seeded(&[]).await;
        sqlx::query("DROP TABLE costs").execute(&pool).await.unwrap();

        let err = executor.run_scalar(ScalarQuery::RowCount, &[]).await.unwrap_err();
        assert!(matches!(err, QueryError::Storage(_)));
        assert!(err.to_string().contains("costs"));
    }
}
