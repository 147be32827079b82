//! Database row types; these map directly to SQLite rows.
//! Distinct from the quad-types API models to keep the DB layer
//! independent; `into_model` conversions do the parsing in one place.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use quad_types::api::Attendee;
use quad_types::models::{
    ChatMessage, Conversation, Event, Notification, Organization, Registration, User,
};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub role: String,
    pub created_at: String,
}

pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: String,
}

pub struct EventRow {
    pub id: String,
    pub org_id: String,
    pub creator_id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: String,
    pub status: String,
    pub capacity: Option<i64>,
    pub registration_count: i64,
    pub created_at: String,
}

#[derive(Debug)]
pub struct RegistrationRow {
    pub id: String,
    pub event_id: String,
    pub student_id: String,
    pub status: String,
    pub registered_at: String,
}

/// A registration joined with the student's public profile fields.
pub struct AttendeeRow {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub status: String,
    pub registered_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub payload: String,
    pub link: String,
    pub read: bool,
    pub created_at: String,
}

#[derive(Debug)]
pub struct ConnectionRow {
    pub id: String,
    pub requester_id: String,
    pub addressee_id: String,
    pub status: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub is_group: bool,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub content: String,
    pub attachments: String,
    pub created_at: String,
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("bad timestamp: {s}"))
}

fn parse_id(s: &str) -> Result<uuid::Uuid> {
    s.parse().with_context(|| format!("bad uuid: {s}"))
}

impl UserRow {
    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            username: self.username,
            display_name: self.display_name,
            role: self.role.parse().map_err(anyhow::Error::msg)?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

impl OrganizationRow {
    pub fn into_model(self, head_ids: Vec<String>) -> Result<Organization> {
        Ok(Organization {
            id: parse_id(&self.id)?,
            name: self.name,
            description: self.description,
            active: self.active,
            head_ids: head_ids
                .iter()
                .map(|id| parse_id(id))
                .collect::<Result<Vec<_>>>()?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

impl EventRow {
    pub fn into_model(self) -> Result<Event> {
        Ok(Event {
            id: parse_id(&self.id)?,
            org_id: parse_id(&self.org_id)?,
            creator_id: parse_id(&self.creator_id)?,
            title: self.title,
            description: self.description,
            location: self.location,
            starts_at: parse_ts(&self.starts_at)?,
            status: self.status.parse().map_err(anyhow::Error::msg)?,
            capacity: self.capacity.map(|c| c as u32),
            registration_count: self.registration_count.max(0) as u32,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

impl RegistrationRow {
    pub fn into_model(self) -> Result<Registration> {
        Ok(Registration {
            id: parse_id(&self.id)?,
            event_id: parse_id(&self.event_id)?,
            student_id: parse_id(&self.student_id)?,
            status: self.status.parse().map_err(anyhow::Error::msg)?,
            registered_at: parse_ts(&self.registered_at)?,
        })
    }
}

impl AttendeeRow {
    pub fn into_model(self) -> Result<Attendee> {
        Ok(Attendee {
            user_id: parse_id(&self.user_id)?,
            username: self.username,
            display_name: self.display_name,
            status: self.status.parse().map_err(anyhow::Error::msg)?,
            registered_at: parse_ts(&self.registered_at)?,
        })
    }
}

impl NotificationRow {
    pub fn into_model(self) -> Result<Notification> {
        Ok(Notification {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            kind: self.kind.parse().map_err(anyhow::Error::msg)?,
            title: self.title,
            body: self.body,
            payload: serde_json::from_str(&self.payload)
                .with_context(|| "bad notification payload")?,
            link: self.link,
            read: self.read,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

impl ConversationRow {
    pub fn into_model(self, participant_ids: Vec<String>) -> Result<Conversation> {
        Ok(Conversation {
            id: parse_id(&self.id)?,
            is_group: self.is_group,
            participant_ids: participant_ids
                .iter()
                .map(|id| parse_id(id))
                .collect::<Result<Vec<_>>>()?,
            last_message: self.last_message,
            last_message_at: self
                .last_message_at
                .as_deref()
                .map(parse_ts)
                .transpose()?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

impl MessageRow {
    pub fn into_model(self) -> Result<ChatMessage> {
        Ok(ChatMessage {
            id: parse_id(&self.id)?,
            conversation_id: parse_id(&self.conversation_id)?,
            sender_id: parse_id(&self.sender_id)?,
            sender_username: self.sender_username,
            content: self.content,
            attachments: serde_json::from_str(&self.attachments)
                .with_context(|| "bad attachments list")?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}
