use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use quad_types::api::{Claims, CreateOrganizationRequest};
use quad_types::models::{Organization, Role};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Organization name is required".into()));
    }

    let org_id = Uuid::new_v4();
    let head_ids: Vec<String> = req.head_ids.iter().map(|id| id.to_string()).collect();
    let s = state.clone();
    let heads = head_ids.clone();
    let row = run_blocking(move || {
        if s.db.organization_name_exists(&req.name)? {
            return Err(ApiError::Conflict("Organization name is taken".into()));
        }
        for head in &heads {
            if s.db.get_user_by_id(head)?.is_none() {
                return Err(ApiError::NotFound("User"));
            }
        }
        s.db.create_organization(&org_id.to_string(), &req.name, &req.description, &heads)?;
        s.db.get_organization(&org_id.to_string())?
            .ok_or(ApiError::NotFound("Organization"))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(row.into_model(head_ids)?)))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<Vec<Organization>>, ApiError> {
    let s = state.clone();
    let pairs = run_blocking(move || {
        let rows = s.db.list_organizations()?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let heads = s.db.org_head_ids(&row.id)?;
            out.push((row, heads));
        }
        Ok(out)
    })
    .await?;

    let organizations = pairs
        .into_iter()
        .map(|(row, heads)| row.into_model(heads))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(organizations))
}
