use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Head,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Head => "head",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "head" => Ok(Role::Head),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Event lifecycle. Registration is only open while `Approved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "approved" => Ok(EventStatus::Approved),
            "rejected" => Ok(EventStatus::Rejected),
            "cancelled" => Ok(EventStatus::Cancelled),
            other => Err(format!("unknown event status: {other}")),
        }
    }
}

/// A registration row is mutated in place across its lifecycle; the
/// (event, student) pair stays unique and the status carries the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    Cancelled,
    Attended,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Attended => "attended",
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(RegistrationStatus::Registered),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            "attended" => Ok(RegistrationStatus::Attended),
            other => Err(format!("unknown registration status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    EventRegistration,
    Invite,
    InviteAccepted,
    Message,
    Announcement,
    EventApproved,
    EventRejected,
    NewPost,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::EventRegistration => "event_registration",
            NotificationKind::Invite => "invite",
            NotificationKind::InviteAccepted => "invite_accepted",
            NotificationKind::Message => "message",
            NotificationKind::Announcement => "announcement",
            NotificationKind::EventApproved => "event_approved",
            NotificationKind::EventRejected => "event_rejected",
            NotificationKind::NewPost => "new_post",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event_registration" => Ok(NotificationKind::EventRegistration),
            "invite" => Ok(NotificationKind::Invite),
            "invite_accepted" => Ok(NotificationKind::InviteAccepted),
            "message" => Ok(NotificationKind::Message),
            "announcement" => Ok(NotificationKind::Announcement),
            "event_approved" => Ok(NotificationKind::EventApproved),
            "event_rejected" => Ok(NotificationKind::EventRejected),
            "new_post" => Ok(NotificationKind::NewPost),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// Public user profile; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub head_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// `registration_count` is denormalized and kept equal to the number of
/// `registered`-status registrations for the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub org_id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub status: EventStatus,
    pub capacity: Option<u32>,
    pub registration_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub student_id: Uuid,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub link: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// `last_message`/`last_message_at` are a denormalized preview, written as
/// a second statement after the message insert. A crash between the two
/// leaves a stale preview, never a lost message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub is_group: bool,
    pub participant_ids: Vec<Uuid>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Messages are immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub content: String,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            RegistrationStatus::Registered,
            RegistrationStatus::Cancelled,
            RegistrationStatus::Attended,
        ] {
            assert_eq!(status.as_str().parse::<RegistrationStatus>(), Ok(status));
        }
        assert!("deleted".parse::<RegistrationStatus>().is_err());
    }

    #[test]
    fn notification_kind_matches_wire_names() {
        assert_eq!(NotificationKind::EventRegistration.as_str(), "event_registration");
        assert_eq!("invite_accepted".parse::<NotificationKind>(), Ok(NotificationKind::InviteAccepted));
    }
}
