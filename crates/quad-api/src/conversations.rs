use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use quad_types::api::{
    Claims, ConversationResponse, CreateConversationRequest, MessageHistoryResponse,
};
use quad_types::models::Conversation;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination: the `created_at` of the oldest message
    /// from the previous page.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut participant_ids: Vec<String> =
        req.participant_ids.iter().map(|id| id.to_string()).collect();
    let caller = claims.sub.to_string();
    if !participant_ids.contains(&caller) {
        participant_ids.push(caller);
    }
    if participant_ids.len() < 2 {
        return Err(ApiError::BadRequest(
            "A conversation needs at least two participants".into(),
        ));
    }

    let conversation_id = Uuid::new_v4();
    let s = state.clone();
    let ids = participant_ids.clone();
    let is_group = req.is_group;
    let row = run_blocking(move || {
        for user_id in &ids {
            if s.db.get_user_by_id(user_id)?.is_none() {
                return Err(ApiError::NotFound("User"));
            }
        }
        Ok(s.db.create_conversation(&conversation_id.to_string(), is_group, &ids)?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ConversationResponse {
            conversation: row.into_model(participant_ids)?,
        }),
    ))
}

/// The caller's conversations, most recent activity first.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let s = state.clone();
    let user_id = claims.sub.to_string();
    let pairs = run_blocking(move || {
        let rows = s.db.conversations_for_user(&user_id)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let participants = s.db.participant_ids(&row.id)?;
            out.push((row, participants));
        }
        Ok(out)
    })
    .await?;

    let conversations = pairs
        .into_iter()
        .map(|(row, participants)| row.into_model(participants))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(conversations))
}

pub async fn messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageHistoryResponse>, ApiError> {
    let s = state.clone();
    let cid = conversation_id.to_string();
    let user_id = claims.sub.to_string();
    let limit = query.limit.min(200);
    let before = query.before;
    let rows = run_blocking(move || {
        if s.db.get_conversation(&cid)?.is_none() {
            return Err(ApiError::NotFound("Conversation"));
        }
        if !s.db.is_participant(&cid, &user_id)? {
            return Err(ApiError::NotAParticipant);
        }
        Ok(s.db.messages(&cid, limit, before.as_deref())?)
    })
    .await?;

    let messages = rows
        .into_iter()
        .map(|r| r.into_model())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(MessageHistoryResponse { messages }))
}
