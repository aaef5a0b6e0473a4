//! The module contains the error the engine can throw.
//!
//! Every variant maps onto a stable [`ErrorKind`] so callers at the HTTP or CLI
//! boundary can branch on the failure class without matching messages:
//!
//! - [`NotFound`] thrown when a booking, wallet or notification is missing.
//! - [`InvalidTransition`] thrown when the requested edge is not allowed from
//!   the booking's current status.
//! - [`InsufficientFunds`] thrown when a debit would take a balance below zero.
//!
//!  [`NotFound`]: EngineError::NotFound
//!  [`InvalidTransition`]: EngineError::InvalidTransition
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
use sea_orm::DbErr;
use thiserror::Error;

use crate::BookingStatus;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Failure class of an [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidStatus,
    InvalidTransition,
    InsufficientFunds,
    Unauthorized,
    InvalidInput,
    Conflict,
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Conflict => "CONFLICT",
            Self::StorageFailure => "STORAGE_FAILURE",
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidStatus(_) => ErrorKind::InvalidStatus,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InvalidAmount(_) | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Database(_) => ErrorKind::StorageFailure,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::InvalidStatus(a), Self::InvalidStatus(b)) => a == b,
            (
                Self::InvalidTransition { from: a, to: b },
                Self::InvalidTransition { from: c, to: d },
            ) => a == c && b == d,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
