use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use quad_db::models::ConnectionRow;
use quad_db::queries::connections::InviteOutcome;
use quad_types::api::{Claims, ConnectionResponse};
use quad_types::models::NotificationKind;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;

pub async fn invite(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == claims.sub {
        return Err(ApiError::BadRequest(
            "Cannot send a connection request to yourself".into(),
        ));
    }

    let connection_id = Uuid::new_v4();
    let s = state.clone();
    let requester = claims.sub.to_string();
    let addressee = user_id.to_string();
    let outcome = run_blocking(move || {
        if s.db.get_user_by_id(&addressee)?.is_none() {
            return Err(ApiError::NotFound("User"));
        }
        Ok(s.db.create_connection(&connection_id.to_string(), &requester, &addressee)?)
    })
    .await?;

    let row = match outcome {
        InviteOutcome::Created(row) => row,
        InviteOutcome::AlreadyExists => {
            return Err(ApiError::Conflict("A connection request already exists".into()));
        }
    };

    state.notifier.notify(
        user_id,
        NotificationKind::Invite,
        "New connection request",
        &format!("{} wants to connect", claims.username),
        serde_json::json!({ "requester_id": claims.sub }),
        "/connections",
    );

    Ok((StatusCode::CREATED, Json(connection_response(row)?)))
}

pub async fn accept(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let s = state.clone();
    let requester = user_id.to_string();
    let addressee = claims.sub.to_string();
    let row = run_blocking(move || Ok(s.db.accept_connection(&requester, &addressee)?))
        .await?
        .ok_or(ApiError::NotFound("Connection request"))?;

    state.notifier.notify(
        user_id,
        NotificationKind::InviteAccepted,
        "Connection accepted",
        &format!("{} accepted your connection request", claims.username),
        serde_json::json!({ "addressee_id": claims.sub }),
        "/connections",
    );

    Ok(Json(connection_response(row)?))
}

fn connection_response(row: ConnectionRow) -> anyhow::Result<ConnectionResponse> {
    Ok(ConnectionResponse {
        id: row.id.parse()?,
        requester_id: row.requester_id.parse()?,
        addressee_id: row.addressee_id.parse()?,
        status: row.status,
    })
}
