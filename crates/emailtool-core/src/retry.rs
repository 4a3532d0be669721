//! Bounded, immediate retry.
//!
//! A [`RetryPolicy`] couples a maximum attempt count with a classifier that
//! decides which failures are worth another attempt. There is no delay
//! between attempts.

use std::fmt;
use std::future::Future;

use tracing::{debug, warn};

/// Attempt limit used by every call site unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Errors that can name their failure kind.
pub trait Categorized {
    /// Stable name of the failure kind, e.g. `SmtpProtocol`.
    fn category(&self) -> &'static str;
}

/// Maximum attempts plus the classifier for retryable failures.
pub struct RetryPolicy<E> {
    max_attempts: u32,
    is_retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

const fn retry_every<E>(_: &E) -> bool {
    true
}

impl<E> RetryPolicy<E> {
    /// Creates a policy. A limit of zero is treated as one attempt.
    #[must_use]
    pub const fn new(max_attempts: u32, is_retryable: fn(&E) -> bool) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            is_retryable,
        }
    }

    /// Policy that retries every failure up to [`DEFAULT_MAX_ATTEMPTS`] times.
    #[must_use]
    pub const fn retry_all() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, retry_every::<E>)
    }

    /// Returns a copy with a different attempt limit.
    #[must_use]
    pub const fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self::new(max_attempts, self.is_retryable)
    }

    /// Attempt limit.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether `error` qualifies for another attempt.
    pub fn is_retryable(&self, error: &E) -> bool {
        (self.is_retryable)(error)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt limit is reached. `op` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Aborted`] for a non-retryable failure and
    /// [`RetryError::Exhausted`] once the limit is reached.
    pub fn run<T, F>(
        &self,
        operation: &'static str,
        target: Option<&str>,
        mut op: F,
    ) -> Result<Attempted<T>, RetryError<E>>
    where
        F: FnMut(u32) -> Result<T, E>,
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            debug!(operation, target_name = target, attempt, "Attempting");
            match op(attempt) {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) => self.on_failure(operation, target, attempt, error)?,
            }
            attempt += 1;
        }
    }

    /// Async counterpart of [`RetryPolicy::run`].
    ///
    /// # Errors
    ///
    /// Same as [`RetryPolicy::run`].
    pub async fn run_async<T, F, Fut>(
        &self,
        operation: &'static str,
        target: Option<&str>,
        mut op: F,
    ) -> Result<Attempted<T>, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            debug!(operation, target_name = target, attempt, "Attempting");
            match op(attempt).await {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) => self.on_failure(operation, target, attempt, error)?,
            }
            attempt += 1;
        }
    }

    fn on_failure(
        &self,
        operation: &'static str,
        target: Option<&str>,
        attempt: u32,
        error: E,
    ) -> Result<(), RetryError<E>>
    where
        E: fmt::Display,
    {
        if !self.is_retryable(&error) {
            return Err(RetryError::Aborted {
                operation,
                target: target.map(str::to_string),
                attempt,
                source: error,
            });
        }
        if attempt >= self.max_attempts {
            return Err(RetryError::Exhausted {
                operation,
                target: target.map(str::to_string),
                attempts: attempt,
                source: error,
            });
        }
        warn!(
            operation,
            target_name = target,
            attempt,
            max_attempts = self.max_attempts,
            error = %error,
            "Attempt failed, retrying"
        );
        Ok(())
    }
}

/// A successful result and the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    /// Value produced by the successful attempt.
    pub value: T,
    /// Attempts performed, including the successful one.
    pub attempts: u32,
}

/// Failure of a retried operation.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a retryable error.
    Exhausted {
        /// Operation name, e.g. `send email`.
        operation: &'static str,
        /// Attachment or file name the operation worked on.
        target: Option<String>,
        /// Attempts performed.
        attempts: u32,
        /// Error from the final attempt.
        source: E,
    },
    /// An attempt failed with an error the policy does not retry.
    Aborted {
        /// Operation name.
        operation: &'static str,
        /// Attachment or file name the operation worked on.
        target: Option<String>,
        /// Attempt that failed.
        attempt: u32,
        /// The error.
        source: E,
    },
}

impl<E> RetryError<E> {
    /// Attempts performed before giving up.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Aborted { attempt, .. } => *attempt,
        }
    }

    /// The last underlying error.
    #[must_use]
    pub const fn cause(&self) -> &E {
        match self {
            Self::Exhausted { source, .. } | Self::Aborted { source, .. } => source,
        }
    }

    /// Consumes the error, returning the last underlying error.
    #[must_use]
    pub fn into_cause(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::Aborted { source, .. } => source,
        }
    }

    /// Whether the limit was reached (as opposed to a non-retryable failure).
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

impl<E: Categorized> Categorized for RetryError<E> {
    fn category(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } => "RetryExhausted",
            Self::Aborted { source, .. } => source.category(),
        }
    }
}

impl<E: Categorized + fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted {
                operation,
                target,
                attempts,
                source,
            } => {
                write!(f, "Failed to {operation}")?;
                if let Some(target) = target {
                    write!(f, " {target}")?;
                }
                write!(
                    f,
                    " after {attempts} attempts due to {}. Details: {source}",
                    source.category()
                )
            }
            Self::Aborted {
                operation,
                target,
                source,
                ..
            } => {
                write!(f, "Failed to {operation}")?;
                if let Some(target) = target {
                    write!(f, " {target}")?;
                }
                write!(f, " due to {}. Details: {source}", source.category())
            }
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + Categorized + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause())
    }
}
