//! Error taxonomy for talking to the policy backend.

use chrono::NaiveDate;

/// Client-side validation failures. These block a request before it reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
  #[error("end date {end} must be after start date {start}")]
  EndBeforeStart { start: NaiveDate, end: NaiveDate },

  #[error("unknown filter field: {0}")]
  UnknownFilter(String),

  #[error("unknown sort field: {0}")]
  UnknownSortField(String),

  #[error("invalid value for {field}: {value}")]
  InvalidValue { field: &'static str, value: String },
}

/// Errors surfaced by the policy client and cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// Network unreachable, timeout, or any other transport failure.
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),

  /// Backend answered with a non-success status.
  #[error("Error {status}: {body}")]
  Http { status: u16, body: String },

  /// Response body was not the JSON we expected.
  #[error("malformed response: {0}")]
  Decode(#[from] serde_json::Error),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("cache error: {message}")]
  Cache { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
