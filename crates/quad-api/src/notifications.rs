use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use quad_types::api::{Claims, MarkReadRequest, MarkReadResponse, NotificationListResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let s = state.clone();
    let user_id = claims.sub.to_string();
    let limit = query.limit.min(200);
    let (rows, unread) = run_blocking(move || {
        let rows = s.db.recent_notifications(&user_id, limit)?;
        let unread = s.db.unread_count(&user_id)?;
        Ok((rows, unread))
    })
    .await?;

    let notifications = rows
        .into_iter()
        .map(|r| r.into_model())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(NotificationListResponse {
        notifications,
        unread: unread.max(0) as u32,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let s = state.clone();
    let user_id = claims.sub.to_string();
    let ids: Vec<String> = req.ids.iter().map(|id| id.to_string()).collect();
    let marked = run_blocking(move || Ok(s.db.mark_read(&user_id, &ids)?)).await?;
    Ok(Json(MarkReadResponse {
        marked: marked as u32,
    }))
}
