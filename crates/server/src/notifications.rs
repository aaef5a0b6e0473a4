use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{Actor, ServerState},
    types::notification::{NotificationList, NotificationView},
};

pub async fn list(
    Extension(Actor(user_id)): Extension<Actor>,
    State(state): State<ServerState>,
) -> Result<Json<NotificationList>, ServerError> {
    let notifications = state.engine.notifications(&user_id).await?;
    Ok(Json(NotificationList {
        notifications: notifications
            .into_iter()
            .map(|n| NotificationView {
                id: n.id,
                message: n.message,
                kind: n.kind.as_str().to_string(),
                read: n.read,
                created_at: n.created_at,
            })
            .collect(),
    }))
}

pub async fn mark_read(
    Extension(Actor(user_id)): Extension<Actor>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.mark_notification_read(&user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
