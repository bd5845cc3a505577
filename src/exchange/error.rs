use std::fmt;

/// Closed error sum for the exchange boundary.
///
/// `Http` carries whatever the exchange said verbatim; the retry layer has
/// already consumed 429s, single 5xx retries, and idempotent 409s before one
/// of these reaches a caller, so a surfaced `Http` is final for that request.
#[derive(Debug)]
pub enum ExchangeError {
    /// Connection refused, timeout, DNS — transient transport failure.
    Network(reqwest::Error),
    /// Non-2xx after the retry policy ran its course.
    Http { status: u16, body: String },
    /// 429 that survived every backoff attempt.
    RateLimited { attempts: u32 },
    /// Request rejected locally before it left the process (bad price range,
    /// both price fields set, missing required field).
    Validation(String),
    /// Response body did not parse as the expected shape.
    Parse(serde_json::Error),
    /// Credential loading or signing failure.
    Auth(String),
    Io(std::io::Error),
}

impl ExchangeError {
    /// Transient errors are worth a retry at a higher level.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExchangeError::Network(_)
                | ExchangeError::RateLimited { .. }
                | ExchangeError::Http { status: 500..=599, .. }
        )
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::Network(e) => write!(f, "network error: {}", e),
            ExchangeError::Http { status, body } => {
                write!(f, "HTTP {}: {}", status, &body[..body.len().min(200)])
            }
            ExchangeError::RateLimited { attempts } => {
                write!(f, "rate limited after {} attempts", attempts)
            }
            ExchangeError::Validation(msg) => write!(f, "validation: {}", msg),
            ExchangeError::Parse(e) => write!(f, "parse error: {}", e),
            ExchangeError::Auth(msg) => write!(f, "auth error: {}", msg),
            ExchangeError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for ExchangeError {}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        ExchangeError::Network(err)
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Parse(err)
    }
}

impl From<std::io::Error> for ExchangeError {
    fn from(err: std::io::Error) -> Self {
        ExchangeError::Io(err)
    }
}
