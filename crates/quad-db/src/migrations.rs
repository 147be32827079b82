use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            username        TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            display_name    TEXT NOT NULL,
            role            TEXT NOT NULL DEFAULT 'member'
                            CHECK (role IN ('member', 'head', 'admin')),
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS organizations (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL UNIQUE,
            description     TEXT NOT NULL DEFAULT '',
            active          INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS organization_heads (
            org_id          TEXT NOT NULL REFERENCES organizations(id),
            user_id         TEXT NOT NULL REFERENCES users(id),
            UNIQUE(org_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS events (
            id                  TEXT PRIMARY KEY,
            org_id              TEXT NOT NULL REFERENCES organizations(id),
            creator_id          TEXT NOT NULL REFERENCES users(id),
            title               TEXT NOT NULL,
            description         TEXT NOT NULL DEFAULT '',
            location            TEXT NOT NULL DEFAULT '',
            starts_at           TEXT NOT NULL,
            status              TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'approved', 'rejected', 'cancelled')),
            capacity            INTEGER,
            registration_count  INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_org
            ON events(org_id, starts_at);

        -- One logical registration per (event, student); the row is mutated
        -- in place, never recreated, so the status carries the lifecycle.
        CREATE TABLE IF NOT EXISTS registrations (
            id              TEXT PRIMARY KEY,
            event_id        TEXT NOT NULL REFERENCES events(id),
            student_id      TEXT NOT NULL REFERENCES users(id),
            status          TEXT NOT NULL
                            CHECK (status IN ('registered', 'cancelled', 'attended')),
            registered_at   TEXT NOT NULL,
            UNIQUE(event_id, student_id)
        );

        CREATE INDEX IF NOT EXISTS idx_registrations_event
            ON registrations(event_id, registered_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL REFERENCES users(id),
            kind            TEXT NOT NULL,
            title           TEXT NOT NULL,
            body            TEXT NOT NULL DEFAULT '',
            payload         TEXT NOT NULL DEFAULT '{}',
            link            TEXT NOT NULL DEFAULT '',
            read            INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS connections (
            id              TEXT PRIMARY KEY,
            requester_id    TEXT NOT NULL REFERENCES users(id),
            addressee_id    TEXT NOT NULL REFERENCES users(id),
            status          TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending', 'accepted')),
            created_at      TEXT NOT NULL,
            UNIQUE(requester_id, addressee_id)
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY,
            is_group        INTEGER NOT NULL DEFAULT 0,
            last_message    TEXT,
            last_message_at TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversation_participants (
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            user_id         TEXT NOT NULL REFERENCES users(id),
            UNIQUE(conversation_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT NOT NULL PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            sender_id       TEXT NOT NULL REFERENCES users(id),
            content         TEXT NOT NULL,
            attachments     TEXT NOT NULL DEFAULT '[]',
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
