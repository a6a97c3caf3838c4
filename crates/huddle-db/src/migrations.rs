use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            image       TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS workspaces (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL,
            join_code        TEXT NOT NULL,
            creator_user_id  TEXT NOT NULL REFERENCES users(id),
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS members (
            id            TEXT PRIMARY KEY,
            workspace_id  TEXT NOT NULL REFERENCES workspaces(id),
            user_id       TEXT NOT NULL REFERENCES users(id),
            role          TEXT NOT NULL CHECK (role IN ('admin', 'member')),
            created_at    TEXT NOT NULL,
            UNIQUE(workspace_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS channels (
            id            TEXT PRIMARY KEY,
            workspace_id  TEXT NOT NULL REFERENCES workspaces(id),
            name          TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_channels_workspace
            ON channels(workspace_id);

        CREATE TABLE IF NOT EXISTS conversations (
            id             TEXT PRIMARY KEY,
            workspace_id   TEXT NOT NULL REFERENCES workspaces(id),
            member_one_id  TEXT NOT NULL REFERENCES members(id),
            member_two_id  TEXT NOT NULL REFERENCES members(id),
            created_at     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_workspace
            ON conversations(workspace_id);

        CREATE TABLE IF NOT EXISTS messages (
            id                 TEXT PRIMARY KEY,
            workspace_id       TEXT NOT NULL REFERENCES workspaces(id),
            member_id          TEXT NOT NULL REFERENCES members(id),
            channel_id         TEXT REFERENCES channels(id),
            conversation_id    TEXT REFERENCES conversations(id),
            parent_message_id  TEXT,
            body               TEXT NOT NULL,
            image_id           TEXT,
            created_at         TEXT NOT NULL,
            updated_at         TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_parent
            ON messages(parent_message_id, created_at);

        -- No UNIQUE(message_id, member_id, value): toggle scans for the
        -- exact triple, which keeps multiple values per member per message
        -- working (one row each).
        CREATE TABLE IF NOT EXISTS reactions (
            id            TEXT PRIMARY KEY,
            workspace_id  TEXT NOT NULL REFERENCES workspaces(id),
            message_id    TEXT NOT NULL REFERENCES messages(id),
            member_id     TEXT NOT NULL REFERENCES members(id),
            value         TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);

        CREATE TABLE IF NOT EXISTS uploads (
            id             TEXT PRIMARY KEY,
            owner_user_id  TEXT NOT NULL REFERENCES users(id),
            token          TEXT NOT NULL UNIQUE,
            size           INTEGER,
            expires_at     TEXT NOT NULL,
            created_at     TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
