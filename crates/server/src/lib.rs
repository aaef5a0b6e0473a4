use api_types::error::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::{BookingStatus, EngineError, ErrorKind};

pub use server::{Actor, ServerState, router, run, run_with_listener, spawn_with_listener};

mod bookings;
mod notifications;
mod server;
mod wallets;

pub mod types {
    pub mod booking {
        pub use api_types::booking::{
            BookingList, BookingNew, BookingStatusUpdate, BookingView, Earnings,
        };
        pub use engine::{Booking, BookingStatus};
    }

    pub mod wallet {
        pub use api_types::wallet::{
            TopUp, WalletBalance, WalletTransactionList, WalletTransactionView,
        };
    }

    pub mod notification {
        pub use api_types::notification::{NotificationList, NotificationView};
    }
}

pub enum ServerError {
    Engine(EngineError),
    /// A refused status change, reported with the booking's unchanged status.
    Transition {
        error: EngineError,
        current_status: Option<BookingStatus>,
    },
    Generic(String),
}

fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidStatus => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidTransition | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

fn engine_error_body(
    err: EngineError,
    current_status: Option<BookingStatus>,
) -> (StatusCode, ErrorBody) {
    let kind = err.kind();
    let body = ErrorBody {
        error: message_for_engine_error(err),
        kind: kind.as_str().to_string(),
        current_status: current_status.map(|s| s.as_str().to_string()),
    };
    (status_for_kind(kind), body)
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Engine(err) => engine_error_body(err, None),
            ServerError::Transition {
                error,
                current_status,
            } => engine_error_body(error, current_status),
            ServerError::Generic(error) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error,
                    kind: ErrorKind::InvalidInput.as_str().to_string(),
                    current_status: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
