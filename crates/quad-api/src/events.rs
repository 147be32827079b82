use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use quad_db::queries::registrations::{RegisterOutcome, UnregisterOutcome};
use quad_types::api::{Attendee, Claims, CreateEventRequest, EventResponse, RegistrationResponse};
use quad_types::models::{Event, NotificationKind, Role};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;

pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Event title is required".into()));
    }

    let event_id = Uuid::new_v4();
    let s = state.clone();
    let row = run_blocking(move || {
        let org = s
            .db
            .get_organization(&req.org_id.to_string())?
            .ok_or(ApiError::NotFound("Organization"))?;
        if !org.active {
            return Err(ApiError::BadRequest("Organization is inactive".into()));
        }
        let allowed =
            claims.role == Role::Admin || s.db.is_org_head(&org.id, &claims.sub.to_string())?;
        if !allowed {
            return Err(ApiError::Forbidden);
        }

        Ok(s.db.create_event(
            &event_id.to_string(),
            &org.id,
            &claims.sub.to_string(),
            &req.title,
            &req.description,
            &req.location,
            req.starts_at,
            req.capacity,
        )?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(EventResponse {
            event: row.into_model()?,
        }),
    ))
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let s = state.clone();
    let rows = run_blocking(move || Ok(s.db.list_approved_events()?)).await?;
    let events = rows
        .into_iter()
        .map(|r| r.into_model())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(events))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<EventResponse>, ApiError> {
    let s = state.clone();
    let row = run_blocking(move || {
        s.db.get_event(&event_id.to_string())?
            .ok_or(ApiError::NotFound("Event"))
    })
    .await?;
    Ok(Json(EventResponse {
        event: row.into_model()?,
    }))
}

pub async fn approve_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<EventResponse>, ApiError> {
    review_event(state, claims, event_id, "approved", NotificationKind::EventApproved).await
}

pub async fn reject_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<EventResponse>, ApiError> {
    review_event(state, claims, event_id, "rejected", NotificationKind::EventRejected).await
}

/// Shared approve/reject path: admin-only, valid only from `pending`, and
/// the event's creator is told the verdict.
async fn review_event(
    state: AppState,
    claims: Claims,
    event_id: Uuid,
    to: &'static str,
    kind: NotificationKind,
) -> Result<Json<EventResponse>, ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden);
    }

    let s = state.clone();
    let id = event_id.to_string();
    let row = run_blocking(move || {
        if !s.db.transition_event(&id, "pending", to)? {
            return match s.db.get_event(&id)? {
                None => Err(ApiError::NotFound("Event")),
                Some(_) => Err(ApiError::Conflict("Only pending events can be reviewed".into())),
            };
        }
        s.db.get_event(&id)?.ok_or(ApiError::NotFound("Event"))
    })
    .await?;

    if let Ok(creator) = row.creator_id.parse::<Uuid>() {
        let title = match kind {
            NotificationKind::EventApproved => "Event approved",
            _ => "Event rejected",
        };
        state.notifier.notify(
            creator,
            kind,
            title,
            &format!("\"{}\" was {to}", row.title),
            serde_json::json!({ "event_id": event_id }),
            &format!("/events/{event_id}"),
        );
    }

    Ok(Json(EventResponse {
        event: row.into_model()?,
    }))
}

pub async fn cancel_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<EventResponse>, ApiError> {
    let s = state.clone();
    let id = event_id.to_string();
    let row = run_blocking(move || {
        let event = s.db.get_event(&id)?.ok_or(ApiError::NotFound("Event"))?;
        let allowed =
            claims.role == Role::Admin || s.db.is_org_head(&event.org_id, &claims.sub.to_string())?;
        if !allowed {
            return Err(ApiError::Forbidden);
        }
        if !s.db.cancel_event(&id)? {
            return Err(ApiError::Conflict("Event is already closed".into()));
        }
        s.db.get_event(&id)?.ok_or(ApiError::NotFound("Event"))
    })
    .await?;

    Ok(Json(EventResponse {
        event: row.into_model()?,
    }))
}

pub async fn register_for_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let registration_id = Uuid::new_v4();
    let s = state.clone();
    let id = event_id.to_string();
    let student = claims.sub.to_string();
    let outcome = run_blocking(move || {
        Ok(s.db.register_for_event(&registration_id.to_string(), &id, &student)?)
    })
    .await?;

    let row = match outcome {
        RegisterOutcome::Registered(row) => row,
        RegisterOutcome::NotFoundOrClosed => return Err(ApiError::NotFoundOrClosed),
        RegisterOutcome::CapacityFull => return Err(ApiError::CapacityFull),
        RegisterOutcome::AlreadyRegistered => return Err(ApiError::AlreadyRegistered),
        RegisterOutcome::AlreadyAttended => return Err(ApiError::AlreadyAttended),
    };

    // The registration is committed; fan-out happens after it and a
    // fan-out failure never rolls it back.
    let s = state.clone();
    let id = event_id.to_string();
    match run_blocking(move || {
        let event = s.db.get_event(&id)?.ok_or(ApiError::NotFound("Event"))?;
        let heads = s.db.org_head_ids(&event.org_id)?;
        Ok((event, heads))
    })
    .await
    {
        Ok((event, heads)) => {
            let recipients =
                registration_recipients(&event.creator_id, &heads, &claims.sub.to_string());
            for recipient in recipients {
                let Ok(recipient) = recipient.parse::<Uuid>() else {
                    continue;
                };
                state.notifier.notify(
                    recipient,
                    NotificationKind::EventRegistration,
                    "New event registration",
                    &format!("{} registered for \"{}\"", claims.username, event.title),
                    serde_json::json!({
                        "event_id": event_id,
                        "student_id": claims.sub,
                    }),
                    &format!("/events/{event_id}"),
                );
            }
        }
        Err(e) => warn!("registration fan-out skipped for event {event_id}: {e}"),
    }

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            registration: row.into_model()?,
        }),
    ))
}

pub async fn unregister_from_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let s = state.clone();
    let id = event_id.to_string();
    let student = claims.sub.to_string();
    let outcome = run_blocking(move || Ok(s.db.unregister_from_event(&id, &student)?)).await?;

    match outcome {
        // Repeating an unregister is success, not an error
        UnregisterOutcome::Cancelled | UnregisterOutcome::AlreadyCancelled => {
            Ok(Json(serde_json::json!({ "status": "cancelled" })))
        }
        UnregisterOutcome::NotFound => Err(ApiError::NotFound("Registration")),
    }
}

pub async fn attendees(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Attendee>>, ApiError> {
    let s = state.clone();
    let id = event_id.to_string();
    let rows = run_blocking(move || {
        let event = s.db.get_event(&id)?.ok_or(ApiError::NotFound("Event"))?;
        let allowed =
            claims.role == Role::Admin || s.db.is_org_head(&event.org_id, &claims.sub.to_string())?;
        if !allowed {
            return Err(ApiError::Forbidden);
        }
        Ok(s.db.attendees(&id)?)
    })
    .await?;

    let attendees = rows
        .into_iter()
        .map(|r| r.into_model())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(attendees))
}

/// The event's creator plus every owning-org head, deduplicated, minus
/// the registering student (a head registering for their own event should
/// not be told about themselves).
fn registration_recipients(
    creator_id: &str,
    head_ids: &[String],
    registrant_id: &str,
) -> Vec<String> {
    let mut out = vec![creator_id.to_string()];
    for head in head_ids {
        if !out.contains(head) {
            out.push(head.clone());
        }
    }
    out.retain(|u| u != registrant_id);
    out
}
