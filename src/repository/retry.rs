//! Bounded linear-backoff retry for transient database failures

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

/// PostgreSQL admin/crash shutdown codes: the server went away mid-session
const TRANSIENT_SQLSTATES: [&str; 3] = ["57P01", "57P02", "57P03"];

static TRANSIENT_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)connection timeout|connection terminated|terminat(ed|ion)|timeout|timed out")
        .expect("transient error pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first failure
    pub retries: u32,
    /// Base delay, multiplied by the attempt number
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt + 1`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay * (attempt + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(250))
    }
}

/// Connectivity failures worth another attempt; everything else is final
pub fn is_transient_db_error(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Io(io) => {
            matches!(
                io.kind(),
                ErrorKind::TimedOut
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ) || TRANSIENT_MESSAGE.is_match(&io.to_string())
        }
        sqlx::Error::Database(db) => {
            db.code()
                .map(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref()))
                .unwrap_or(false)
                || TRANSIENT_MESSAGE.is_match(db.message())
        }
        sqlx::Error::Protocol(message) => TRANSIENT_MESSAGE.is_match(message),
        _ => false,
    }
}

/// Run `operation`, retrying transient failures up to `policy.retries` times
pub async fn with_db_retry<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.retries && is_transient_db_error(&error) => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Transient database error, retrying: {}",
                    error
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
