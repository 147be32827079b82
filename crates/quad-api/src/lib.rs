pub mod auth;
pub mod connections;
pub mod conversations;
pub mod error;
pub mod events;
pub mod middleware;
pub mod notifications;
pub mod organizations;

use axum::Router;
use axum::routing::{get, post};

use crate::auth::AppState;
use crate::error::ApiError;

/// The full REST surface. Kept here (rather than in the server binary) so
/// tests can drive it with `tower::ServiceExt::oneshot`.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected = Router::new()
        .route(
            "/organizations",
            post(organizations::create).get(organizations::list),
        )
        .route("/events", post(events::create_event).get(events::list_events))
        .route("/events/{event_id}", get(events::get_event))
        .route("/events/{event_id}/approve", post(events::approve_event))
        .route("/events/{event_id}/reject", post(events::reject_event))
        .route("/events/{event_id}/cancel", post(events::cancel_event))
        .route("/events/{event_id}/register", post(events::register_for_event))
        .route("/events/{event_id}/unregister", post(events::unregister_from_event))
        .route("/events/{event_id}/attendees", get(events::attendees))
        .route("/notifications", get(notifications::list))
        .route("/notifications/mark-read", post(notifications::mark_read))
        .route("/connections/{user_id}/invite", post(connections::invite))
        .route("/connections/{user_id}/accept", post(connections::accept))
        .route(
            "/conversations",
            post(conversations::create).get(conversations::list),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(conversations::messages),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public).merge(protected)
}

/// Run a blocking database closure off the async runtime, folding the
/// join error into the store bucket.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("blocking task join error: {e}");
            Err(ApiError::Store(anyhow::anyhow!("blocking task failed")))
        }
    }
}
