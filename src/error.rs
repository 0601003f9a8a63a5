// Error types for the routing-table service

use std::net::Ipv4Addr;
use thiserror::Error;

/// A route record that cannot be stored.
///
/// Every variant is an `InvalidRoute` condition: it rejects one record and
/// never aborts a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("non-contiguous subnet mask: {0}")]
    InvalidMask(Ipv4Addr),

    #[error("unparseable address: {0:?}")]
    InvalidAddress(String),

    #[error("prefix length out of range: {0}")]
    InvalidPrefixLength(u8),

    #[error("metric must be non-negative: {0}")]
    NegativeMetric(i32),

    #[error("metric does not fit a signed 32-bit integer: {0}")]
    MetricOutOfRange(u32),

    #[error("invalid CIDR notation: {0:?}")]
    InvalidCidr(String),
}

impl RouteError {
    /// Error kind as reported to remote callers
    pub fn kind(&self) -> &'static str {
        "InvalidRoute"
    }
}

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to load bootstrap routes: {0}")]
    Bootstrap(String),

    #[error("Invalid route: {0}")]
    InvalidRoute(#[from] RouteError),

    #[error("Route stream interrupted after {accepted} accepted route(s): {reason}")]
    TransportInterrupted { accepted: usize, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("No route found: {0}")]
    NotFound(String),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Convert error to user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(_) | AppError::Toml(_) => {
                "Configuration error. Check your config file or command-line arguments.".to_string()
            }
            AppError::Io(_) => "File system error. Check permissions and the file path.".to_string(),
            AppError::Serialization(_) => {
                "Data format error. Routes must be JSON objects with dest, mask, nh, metric and interface."
                    .to_string()
            }
            AppError::Bootstrap(msg) => format!("Could not load the initial route table: {}", msg),
            AppError::InvalidRoute(e) => format!("Route rejected: {}", e),
            AppError::TransportInterrupted { accepted, .. } => format!(
                "Connection dropped mid-upload. {} route(s) were applied before the interruption.",
                accepted
            ),
            AppError::Network(_) => "Network error occurred. Is the route server running?".to_string(),
            AppError::Rejected(msg) => format!("The server refused the request: {}", msg),
            AppError::NotFound(_) => "No covering route exists for that destination.".to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::TransportInterrupted { .. })
    }
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        delay.min(self.max_delay_ms as f64) as u64
    }
}

/// Retry a fallible operation with exponential backoff
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = AppResult<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!("{} succeeded after {} attempt(s)", operation_name, attempt + 1);
                }
                return Ok(result);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                attempt += 1;

                if attempt >= config.max_attempts {
                    tracing::error!("{} failed after {} attempts: {}", operation_name, attempt, e);
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {}ms...",
                    operation_name,
                    attempt,
                    config.max_attempts,
                    e,
                    delay
                );

                tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
            }
        }
    }
}
