//! Cashback Error Types
//!
//! Two families of errors leave the core:
//!
//! - [`BusinessError`]: expected, user-facing outcomes with a stable code
//!   (invalid wallet code, no cashback bracket, H2H transfer failure).
//! - [`TechnicalError`]: infrastructure faults. Each one carries a ticket
//!   (ULID) and an occurrence timestamp and is logged where it is created,
//!   so an operator can correlate a client-visible ticket with the log line.
//!
//! Repositories and adapters keep their own error enums; the use-case layer
//! translates them into one of the two families above.

use chrono::{DateTime, Utc};
use thiserror::Error;
use ulid::Ulid;

/// Business error codes surfaced to callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusinessError {
    #[error("Merchant/wallet code invalid")]
    MerchantCodeInvalid,

    #[error("Bad payload: {0}")]
    BadPayload(String),

    #[error("H2H cashback transfer failed")]
    H2hCashbackFailed,

    #[error("No cashback available for this transaction")]
    NoCashback,
}

impl BusinessError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            BusinessError::MerchantCodeInvalid => "MERCHANT_CODE_INVALID",
            BusinessError::BadPayload(_) => "BAD_PAYLOAD",
            BusinessError::H2hCashbackFailed => "H2H_CASHBACK_FAILED",
            BusinessError::NoCashback => "ERR_BUSS_NO_CASHBACK",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            BusinessError::MerchantCodeInvalid | BusinessError::BadPayload(_) => 400,
            BusinessError::H2hCashbackFailed | BusinessError::NoCashback => 422,
        }
    }
}

/// Infrastructure fault with a traceable ticket
#[derive(Error, Debug, Clone)]
#[error("technical error [{ticket}] at {occurred_at}: {exception}")]
pub struct TechnicalError {
    pub exception: String,
    pub ticket: Ulid,
    pub occurred_at: DateTime<Utc>,
}

impl TechnicalError {
    /// Create and log a technical error
    pub fn new(exception: impl Into<String>) -> Self {
        let err = Self {
            exception: exception.into(),
            ticket: Ulid::new(),
            occurred_at: Utc::now(),
        };
        tracing::error!(
            ticket = %err.ticket,
            occurred_at = %err.occurred_at,
            exception = %err.exception,
            "Technical error"
        );
        err
    }

    /// Create and log an error that needs operator attention
    ///
    /// Used when a transaction could not be committed after its statements
    /// already executed.
    pub fn fatal(exception: impl Into<String>) -> Self {
        let err = Self {
            exception: exception.into(),
            ticket: Ulid::new(),
            occurred_at: Utc::now(),
        };
        tracing::error!(
            fatal = true,
            ticket = %err.ticket,
            occurred_at = %err.occurred_at,
            exception = %err.exception,
            "FATAL: un-committable transaction"
        );
        err
    }

    pub fn code(&self) -> &'static str {
        "TECHNICAL_ERROR"
    }
}

/// Either family, for callers that handle both
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error(transparent)]
    Business(#[from] BusinessError),

    #[error(transparent)]
    Technical(#[from] TechnicalError),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Business(e) => e.code(),
            AppError::Technical(e) => e.code(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Business(e) => e.http_status(),
            AppError::Technical(_) => 500,
        }
    }
}
