use std::time::Duration;

use futures::future::BoxFuture;
use grindstone_instruments::ContentionCounters;
use grindstone_runner::prelude::{
    ContentionProbe, QueryTarget, SqlValue, TargetError, TargetErrorKind,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

/// The default probe expects the schema bootstrapper to have provided a `scheduler_stats` view
/// exposing the engine's cumulative scheduler counters under these column names.
const DEFAULT_PROBE_STATEMENT: &str =
    "SELECT signal_wait_ms, total_wait_ms, runnable_tasks, yields FROM scheduler_stats";

#[derive(Debug, Clone)]
pub struct SqlTargetConfig {
    pub connection_string: String,
    /// Size of the one connection pool shared by every worker in the harness.
    pub max_connections: u32,
    /// How long a call waits for a connection before it is reported as resource exhaustion.
    pub acquire_timeout: Duration,
    /// Statement the sampler runs on each tick to read the contention counters.
    pub probe_statement: String,
}

impl SqlTargetConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            max_connections: 20,
            acquire_timeout: Duration::from_secs(2),
            probe_statement: DEFAULT_PROBE_STATEMENT.to_string(),
        }
    }
}

/// A Postgres-backed [QueryTarget] and [ContentionProbe].
///
/// One pool, shared by the attacker workers, the victim runner and the sampler alike. All
/// execution options are explicit in the statement or the configuration passed here; no
/// session-scoped state is set up or relied on, so every call behaves the same regardless of
/// which pooled connection serves it.
pub struct SqlTarget {
    pool: PgPool,
    probe_statement: String,
}

impl SqlTarget {
    /// Create the target without touching the network. Connections are established on first
    /// use; the runner's setup ping is what actually verifies reachability.
    pub fn connect_lazy(config: SqlTargetConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(&config.connection_string)?;

        Ok(Self {
            pool,
            probe_statement: config.probe_statement,
        })
    }
}

impl QueryTarget for SqlTarget {
    fn execute<'a>(
        &'a self,
        statement: &'a str,
        params: &'a [SqlValue],
    ) -> BoxFuture<'a, Result<u64, TargetError>> {
        Box::pin(async move {
            let mut query = sqlx::query(statement);
            for param in params {
                query = match param {
                    SqlValue::Int(v) => query.bind(*v),
                    SqlValue::Float(v) => query.bind(*v),
                    SqlValue::Text(v) => query.bind(v.clone()),
                };
            }

            let done = query.execute(&self.pool).await.map_err(map_sqlx_error)?;
            Ok(done.rows_affected())
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), TargetError>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        })
    }
}

impl ContentionProbe for SqlTarget {
    fn sample(&self) -> BoxFuture<'_, Result<ContentionCounters, TargetError>> {
        Box::pin(async move {
            let row = sqlx::query(&self.probe_statement)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            Ok(ContentionCounters {
                signal_wait_ms: counter(&row, "signal_wait_ms")?,
                total_wait_ms: counter(&row, "total_wait_ms")?,
                runnable_tasks: counter(&row, "runnable_tasks")?,
                yields: counter(&row, "yields")?,
            })
        })
    }
}

fn counter(row: &sqlx::postgres::PgRow, column: &str) -> Result<u64, TargetError> {
    let value: i64 = row.try_get(column).map_err(|e| {
        TargetError::new(
            TargetErrorKind::Execution,
            format!("Probe statement is missing column {column}: {e}"),
        )
    })?;
    Ok(value.max(0) as u64)
}

fn map_sqlx_error(e: sqlx::Error) -> TargetError {
    match e {
        sqlx::Error::PoolTimedOut => {
            TargetError::new(TargetErrorKind::ResourceExhausted, "Connection pool exhausted")
        }
        sqlx::Error::PoolClosed => {
            TargetError::new(TargetErrorKind::Unavailable, "Connection pool closed")
        }
        sqlx::Error::Io(e) => TargetError::new(TargetErrorKind::Unavailable, e.to_string()),
        sqlx::Error::Tls(e) => TargetError::new(TargetErrorKind::Unavailable, e.to_string()),
        other => TargetError::new(TargetErrorKind::Execution, other.to_string()),
    }
}
