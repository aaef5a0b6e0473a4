//! Booking API endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{Actor, ServerState},
    types::booking::{
        Booking, BookingList, BookingNew, BookingStatus, BookingStatusUpdate, BookingView,
        Earnings,
    },
};
use engine::{CreateBookingCmd, TransitionCmd};

fn booking_view(booking: Booking) -> BookingView {
    BookingView {
        id: booking.id,
        user_id: booking.user_id,
        provider_id: booking.provider_id,
        price: booking.price,
        status: booking.status.as_str().to_string(),
        date_time: booking.date_time,
        created_at: booking.created_at,
        updated_at: booking.updated_at,
    }
}

fn booking_list(bookings: Vec<Booking>) -> BookingList {
    BookingList {
        bookings: bookings.into_iter().map(booking_view).collect(),
    }
}

pub async fn booking_new(
    Extension(Actor(user_id)): Extension<Actor>,
    State(state): State<ServerState>,
    Json(payload): Json<BookingNew>,
) -> Result<(StatusCode, Json<BookingView>), ServerError> {
    let booking = state
        .engine
        .create_booking(CreateBookingCmd::new(
            user_id,
            payload.provider_id,
            payload.price,
            payload.date_time,
        ))
        .await?;

    Ok((StatusCode::CREATED, Json(booking_view(booking))))
}

pub async fn get(
    Extension(Actor(user_id)): Extension<Actor>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>, ServerError> {
    let booking = state.engine.booking(id, &user_id).await?;
    Ok(Json(booking_view(booking)))
}

pub async fn update_status(
    Extension(Actor(user_id)): Extension<Actor>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BookingStatusUpdate>,
) -> Result<Json<BookingView>, ServerError> {
    let mut cmd = TransitionCmd::new(id, payload.status, user_id);
    if let Some(expected) = payload.expected_status.as_deref() {
        cmd = cmd.expecting(BookingStatus::try_from(expected)?);
    }

    match state.engine.apply_transition(cmd).await {
        Ok(booking) => Ok(Json(booking_view(booking))),
        Err(error) => {
            // Unknown bookings have no status to report.
            let current_status = state.engine.booking_status(id).await.ok();
            Err(ServerError::Transition {
                error,
                current_status,
            })
        }
    }
}

pub async fn my_bookings(
    Extension(Actor(user_id)): Extension<Actor>,
    State(state): State<ServerState>,
) -> Result<Json<BookingList>, ServerError> {
    let bookings = state.engine.user_bookings(&user_id, None).await?;
    Ok(Json(booking_list(bookings)))
}

pub async fn my_bookings_by_status(
    Extension(Actor(user_id)): Extension<Actor>,
    State(state): State<ServerState>,
    Path(status): Path<String>,
) -> Result<Json<BookingList>, ServerError> {
    let status = BookingStatus::try_from(status.as_str())?;
    let bookings = state.engine.user_bookings(&user_id, Some(status)).await?;
    Ok(Json(booking_list(bookings)))
}

pub async fn my_jobs(
    Extension(Actor(provider_id)): Extension<Actor>,
    State(state): State<ServerState>,
) -> Result<Json<BookingList>, ServerError> {
    let jobs = state.engine.provider_jobs(&provider_id, None).await?;
    Ok(Json(booking_list(jobs)))
}

pub async fn my_jobs_by_status(
    Extension(Actor(provider_id)): Extension<Actor>,
    State(state): State<ServerState>,
    Path(status): Path<String>,
) -> Result<Json<BookingList>, ServerError> {
    let status = BookingStatus::try_from(status.as_str())?;
    let jobs = state.engine.provider_jobs(&provider_id, Some(status)).await?;
    Ok(Json(booking_list(jobs)))
}

pub async fn earnings(
    Extension(Actor(provider_id)): Extension<Actor>,
    State(state): State<ServerState>,
) -> Result<Json<Earnings>, ServerError> {
    let summary = state.engine.earnings_summary(&provider_id).await?;
    Ok(Json(Earnings {
        completed_jobs: summary.completed_jobs,
        total_earnings: summary.total_earnings,
        pending_earnings: summary.pending_earnings,
        average_job_value: summary.average_job_value,
    }))
}
