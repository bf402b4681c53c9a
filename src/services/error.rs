//! Errors raised at the analysis-service boundary.
//!
//! Transport failures and schema violations share one type so the
//! orchestrator can treat every stage the same way.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Cannot connect to analysis service at {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Analysis service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    ResponseParsing(String),

    #[error("Response missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid `{field}` in response: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Service rejected the request: {0}")]
    Rejected(String),

    #[error("HTTP client error: {0}")]
    Http(String),
}
