use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task;
use tracing::{debug, warn};
use uuid::Uuid;

use quad_db::Database;
use quad_types::events::GatewayEvent;
use quad_types::models::NotificationKind;

use crate::dispatcher::Dispatcher;

/// Translates domain events into persisted notification rows plus an
/// attempted realtime push. The row is always written before the push, so
/// a dropped connection can never lose a notification.
#[derive(Clone)]
pub struct Notifier {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl Notifier {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    /// Fire-and-forget. Failures are logged and never reach the caller;
    /// the triggering operation has already committed and must not be
    /// affected by delivery problems.
    pub fn notify(
        &self,
        recipient: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
        payload: serde_json::Value,
        link: &str,
    ) {
        let notifier = self.clone();
        let title = title.to_string();
        let body = body.to_string();
        let link = link.to_string();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .deliver(recipient, kind, &title, &body, payload, &link)
                .await
            {
                warn!("notification delivery to {recipient} failed: {e:#}");
            }
        });
    }

    /// Persist first, then push. Awaitable for callers (and tests) that
    /// need the write to have landed.
    pub async fn deliver(
        &self,
        recipient: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
        payload: serde_json::Value,
        link: &str,
    ) -> Result<()> {
        let id = Uuid::new_v4();

        let db = self.db.clone();
        let user_id = recipient.to_string();
        let kind_str = kind.as_str();
        let title_owned = title.to_string();
        let body_owned = body.to_string();
        let payload_json = payload.to_string();
        let link_owned = link.to_string();
        task::spawn_blocking(move || {
            db.insert_notification(
                &id.to_string(),
                &user_id,
                kind_str,
                &title_owned,
                &body_owned,
                &payload_json,
                &link_owned,
            )
        })
        .await
        .context("notification insert task failed")??;

        let pushed = self.dispatcher.send_to_user(
            recipient,
            GatewayEvent::NewNotification {
                id,
                kind,
                title: title.to_string(),
                body: body.to_string(),
                link: link.to_string(),
                payload,
            },
        );
        if !pushed {
            debug!("{recipient} has no live connection, notification {id} stored only");
        }

        Ok(())
    }
}
