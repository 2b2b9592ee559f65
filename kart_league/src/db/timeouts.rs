//! Time limits for database work.
//!
//! Pool acquisition already has a timeout; these wrap whole queries and
//! transactions so a stuck lock cannot hang a request. Transactions that
//! take row locks also set a server side `lock_timeout`, so a waiter gives
//! up inside PostgreSQL instead of leaving a lock request queued.

use sqlx::PgConnection;
use std::{future::Future, time::Duration};
use tokio::time::timeout;

/// Timeout for a single query
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a transaction holding row locks (bracket advancement)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for maintenance such as purges and exports
pub const LONG_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a statement may wait for a row lock
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type TimeoutResult<T> = Result<T, TimeoutError>;

/// Run a database future with a time limit
///
/// ```no_run
/// use kart_league::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// with_timeout(
///     DEFAULT_QUERY_TIMEOUT,
///     sqlx::query("SELECT id FROM matches WHERE tournament_id = $1")
///         .bind(1_i64)
///         .fetch_all(pool),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> TimeoutResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(result) => result.map_err(TimeoutError::Database),
        Err(_) => Err(TimeoutError::Timeout(duration)),
    }
}

/// Run a database future with [`DEFAULT_QUERY_TIMEOUT`]
pub async fn with_default_timeout<F, T>(future: F) -> TimeoutResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

/// Run a whole unit of work with a time limit
///
/// Unlike [`with_timeout`] the future may fail with any error that can hold
/// a [`TimeoutError`], so a transaction body from begin to commit can be
/// bounded as one piece. Dropping the future drops its transaction, which
/// rolls back.
pub async fn with_deadline<F, T, E>(duration: Duration, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(TimeoutError::Timeout(duration).into()),
    }
}

/// `SET LOCAL` statement limiting lock waits for the current transaction
pub fn lock_timeout_statement(duration: Duration) -> String {
    format!("SET LOCAL lock_timeout = '{}ms'", duration.as_millis().max(1))
}

/// Limit lock waits for the rest of the current transaction
pub async fn set_lock_timeout(
    conn: &mut PgConnection,
    duration: Duration,
) -> Result<(), sqlx::Error> {
    sqlx::query(&lock_timeout_statement(duration))
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_fires() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, sqlx::Error>(1)
        };
        let result = with_timeout(Duration::from_millis(10), slow).await;
        assert!(matches!(result, Err(TimeoutError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_fast_future_passes_through() {
        let result = with_default_timeout(async { Ok::<_, sqlx::Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_deadline_covers_whole_body() {
        #[derive(Debug)]
        enum WorkError {
            Timeout(TimeoutError),
        }
        impl From<TimeoutError> for WorkError {
            fn from(e: TimeoutError) -> Self {
                WorkError::Timeout(e)
            }
        }

        let body = async {
            // Fast first step, stuck second step
            tokio::time::sleep(Duration::from_millis(1)).await;
            std::future::pending::<()>().await;
            Ok::<_, WorkError>(())
        };
        let result = with_deadline(Duration::from_millis(20), body).await;
        assert!(matches!(
            result,
            Err(WorkError::Timeout(TimeoutError::Timeout(_)))
        ));
    }

    #[test]
    fn test_lock_timeout_statement() {
        assert_eq!(
            lock_timeout_statement(LOCK_TIMEOUT),
            "SET LOCAL lock_timeout = '5000ms'"
        );
        assert_eq!(
            lock_timeout_statement(Duration::ZERO),
            "SET LOCAL lock_timeout = '1ms'"
        );
    }

    #[test]
    fn test_timeout_error_display() {
        let err = TimeoutError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }
}
