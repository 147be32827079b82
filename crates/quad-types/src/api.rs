use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ChatMessage, Conversation, Event, Notification, Registration, RegistrationStatus, Role,
};

// -- JWT Claims --

/// JWT claims shared across quad-api (REST middleware) and quad-gateway
/// (WebSocket handshake). Canonical definition lives here in quad-types
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub token: String,
}

// -- Organizations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrganizationRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub head_ids: Vec<Uuid>,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub org_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    #[serde(flatten)]
    pub event: Event,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    #[serde(flatten)]
    pub registration: Registration,
}

/// One attendee row: the registration joined with the minimal public
/// profile fields of the student.
#[derive(Debug, Clone, Serialize)]
pub struct Attendee {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    /// Derived at query time, never stored.
    pub unread: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: u32,
}

// -- Connections --

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub addressee_id: Uuid,
    pub status: String,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConversationRequest {
    pub participant_ids: Vec<Uuid>,
    #[serde(default)]
    pub is_group: bool,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    #[serde(flatten)]
    pub conversation: Conversation,
}

#[derive(Debug, Serialize)]
pub struct MessageHistoryResponse {
    pub messages: Vec<ChatMessage>,
}
