use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Config;
use crate::model::{Discussion, DiscussionContext, EntityReference, Message, StoreConfiguration};
use crate::reference::{DiscussionContextReference, DiscussionReference, MessageReference};

/// Filter name of the preference that makes its owner follow another user
pub const FOLLOW_FILTER_NAME: &str = "eventUserNotificationFilter";
pub const INCLUSIVE_FILTER: &str = "INCLUSIVE";

const DISCUSSION_COLUMNS: &str = "d.reference, d.title, d.description, d.creation_date, d.update_date";
const CONTEXT_COLUMNS: &str =
    "c.reference, c.name, c.description, c.reference_type, c.entity_reference";
const MESSAGE_COLUMNS: &str = "m.reference, m.content, m.syntax, m.author, m.discussion, \
     m.reply_to, m.attachments, m.creation_date, m.update_date";
const MESSAGE_INSERT: &str = "INSERT INTO messages (reference, namespace, discussion, content, \
     syntax, author, reply_to, attachments, creation_date, update_date, store_configuration)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

pub struct Database {
    pub conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let conn = Connection::open(Config::database_path(data_dir))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open(data_dir: &str) -> Result<Self> {
        Self::new(Path::new(data_dir))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        })
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS discussions (
                reference TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                creation_date INTEGER NOT NULL,
                update_date INTEGER NOT NULL,
                store_configuration TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS discussion_contexts (
                reference TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                reference_type TEXT NOT NULL,
                entity_reference TEXT NOT NULL,
                store_configuration TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS discussion_context_links (
                discussion TEXT NOT NULL,
                context TEXT NOT NULL,
                PRIMARY KEY (discussion, context),
                FOREIGN KEY(discussion) REFERENCES discussions(reference),
                FOREIGN KEY(context) REFERENCES discussion_contexts(reference)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                reference TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                discussion TEXT NOT NULL,
                content TEXT NOT NULL,
                syntax TEXT NOT NULL,
                author TEXT NOT NULL,
                reply_to TEXT,
                attachments TEXT NOT NULL,
                creation_date INTEGER NOT NULL,
                update_date INTEGER NOT NULL,
                store_configuration TEXT NOT NULL,
                FOREIGN KEY(discussion) REFERENCES discussions(reference)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS notification_filter_preferences (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                filter_name TEXT NOT NULL,
                filter_type TEXT NOT NULL,
                user TEXT NOT NULL,
                enabled BOOLEAN NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS group_members (
                group_name TEXT NOT NULL,
                member TEXT NOT NULL,
                PRIMARY KEY (group_name, member)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_contexts_entity
             ON discussion_contexts(reference_type, entity_reference)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_links_context
             ON discussion_context_links(context)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_discussion
             ON messages(discussion, creation_date)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_filter_prefs_user
             ON notification_filter_preferences(user, filter_name)",
            [],
        )?;

        Ok(())
    }

    // ── discussions ─────────────────────────────────────────────────

    pub fn insert_discussion(
        &self,
        discussion: &Discussion,
        namespace: &str,
        store_configuration: &StoreConfiguration,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO discussions (reference, namespace, title, description, creation_date, update_date, store_configuration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                discussion.reference.to_string(),
                namespace,
                discussion.title,
                discussion.description,
                discussion.creation_date.timestamp_micros(),
                discussion.update_date.timestamp_micros(),
                serde_json::to_string(store_configuration)?,
            ],
        )?;
        Ok(())
    }

    pub fn get_discussion(&self, reference: &DiscussionReference) -> Result<Option<Discussion>> {
        let conn = self.conn.lock();
        let discussion = conn
            .query_row(
                &format!("SELECT {DISCUSSION_COLUMNS} FROM discussions d WHERE d.reference = ?1"),
                params![reference.to_string()],
                discussion_from_row,
            )
            .optional()?;
        Ok(discussion)
    }

    /// Persist title, description and update date of an existing discussion.
    pub fn update_discussion(&self, discussion: &Discussion) -> Result<bool> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "UPDATE discussions SET title = ?2, description = ?3, update_date = ?4 WHERE reference = ?1",
            params![
                discussion.reference.to_string(),
                discussion.title,
                discussion.description,
                discussion.update_date.timestamp_micros(),
            ],
        )?;
        Ok(changes > 0)
    }

    pub fn link_context(
        &self,
        discussion: &DiscussionReference,
        context: &DiscussionContextReference,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "INSERT OR IGNORE INTO discussion_context_links (discussion, context) VALUES (?1, ?2)",
            params![discussion.to_string(), context.to_string()],
        )?;
        Ok(changes > 0)
    }

    pub fn unlink_context(
        &self,
        discussion: &DiscussionReference,
        context: &DiscussionContextReference,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "DELETE FROM discussion_context_links WHERE discussion = ?1 AND context = ?2",
            params![discussion.to_string(), context.to_string()],
        )?;
        Ok(changes > 0)
    }

    /// Discussions tagged by a context of `reference_type` pointing at one of
    /// `entity_references`, most recently updated first.
    pub fn find_discussions_by_entities(
        &self,
        reference_type: &str,
        entity_references: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Discussion>> {
        if entity_references.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let query = format!(
            "SELECT DISTINCT {DISCUSSION_COLUMNS}
             FROM discussions d
             JOIN discussion_context_links l ON l.discussion = d.reference
             JOIN discussion_contexts c ON c.reference = l.context
             WHERE c.reference_type = ? AND c.entity_reference IN ({})
             ORDER BY d.update_date DESC, d.reference
             LIMIT ? OFFSET ?",
            placeholders(entity_references.len())
        );

        let Some((offset, limit)) = page_bounds(offset, limit) else {
            return Ok(Vec::new());
        };
        let mut values = entity_values(reference_type, entity_references);
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(values), discussion_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_discussions_by_entities(
        &self,
        reference_type: &str,
        entity_references: &[String],
    ) -> Result<usize> {
        if entity_references.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.lock();
        let query = format!(
            "SELECT COUNT(DISTINCT d.reference)
             FROM discussions d
             JOIN discussion_context_links l ON l.discussion = d.reference
             JOIN discussion_contexts c ON c.reference = l.context
             WHERE c.reference_type = ? AND c.entity_reference IN ({})",
            placeholders(entity_references.len())
        );

        let count: i64 = conn.query_row(
            &query,
            params_from_iter(entity_values(reference_type, entity_references)),
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn find_discussions_by_context(
        &self,
        context: &DiscussionContextReference,
    ) -> Result<Vec<Discussion>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DISCUSSION_COLUMNS}
             FROM discussions d
             JOIN discussion_context_links l ON l.discussion = d.reference
             WHERE l.context = ?1
             ORDER BY d.update_date DESC, d.reference"
        ))?;
        let rows = stmt.query_map(params![context.to_string()], discussion_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ── contexts ────────────────────────────────────────────────────

    pub fn insert_context(
        &self,
        context: &DiscussionContext,
        namespace: &str,
        store_configuration: &StoreConfiguration,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO discussion_contexts (reference, namespace, name, description, reference_type, entity_reference, store_configuration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                context.reference.to_string(),
                namespace,
                context.name,
                context.description,
                context.entity_reference.reference_type,
                context.entity_reference.entity_reference,
                serde_json::to_string(store_configuration)?,
            ],
        )?;
        Ok(())
    }

    pub fn get_context(
        &self,
        reference: &DiscussionContextReference,
    ) -> Result<Option<DiscussionContext>> {
        let conn = self.conn.lock();
        let context = conn
            .query_row(
                &format!("SELECT {CONTEXT_COLUMNS} FROM discussion_contexts c WHERE c.reference = ?1"),
                params![reference.to_string()],
                context_from_row,
            )
            .optional()?;
        Ok(context)
    }

    /// First context created for an entity, if any.
    pub fn find_context_by_entity(
        &self,
        entity: &EntityReference,
    ) -> Result<Option<DiscussionContext>> {
        let conn = self.conn.lock();
        let context = conn
            .query_row(
                &format!(
                    "SELECT {CONTEXT_COLUMNS} FROM discussion_contexts c
                     WHERE c.reference_type = ?1 AND c.entity_reference = ?2
                     ORDER BY c.rowid
                     LIMIT 1"
                ),
                params![entity.reference_type, entity.entity_reference],
                context_from_row,
            )
            .optional()?;
        Ok(context)
    }

    pub fn find_contexts_by_discussion(
        &self,
        discussion: &DiscussionReference,
    ) -> Result<Vec<DiscussionContext>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTEXT_COLUMNS}
             FROM discussion_contexts c
             JOIN discussion_context_links l ON l.context = c.reference
             WHERE l.discussion = ?1
             ORDER BY c.rowid"
        ))?;
        let rows = stmt.query_map(params![discussion.to_string()], context_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ── messages ────────────────────────────────────────────────────

    /// Insert a message and persist the touched owning discussion in one transaction.
    pub fn insert_message_and_touch(
        &self,
        message: &Message,
        namespace: &str,
        store_configuration: &StoreConfiguration,
        discussion: &Discussion,
    ) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            MESSAGE_INSERT,
            params_from_iter(message_params(message, namespace, store_configuration)?),
        )?;
        let touched = tx.execute(
            "UPDATE discussions SET update_date = ?2 WHERE reference = ?1",
            params![
                discussion.reference.to_string(),
                discussion.update_date.timestamp_micros(),
            ],
        )?;
        if touched == 0 {
            // dropping the transaction rolls the insert back
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }

    pub fn get_message(&self, reference: &MessageReference) -> Result<Option<Message>> {
        let conn = self.conn.lock();
        let message = conn
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.reference = ?1"),
                params![reference.to_string()],
                message_from_row,
            )
            .optional()?;
        Ok(message)
    }

    /// Persist content, owning discussion and update date of an existing message.
    pub fn update_message(&self, message: &Message) -> Result<bool> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "UPDATE messages SET content = ?2, discussion = ?3, update_date = ?4 WHERE reference = ?1",
            params![
                message.reference.to_string(),
                message.content,
                message.discussion.to_string(),
                message.update_date.timestamp_micros(),
            ],
        )?;
        Ok(changes > 0)
    }

    /// Messages of a discussion, oldest first.
    pub fn find_messages_by_discussion(
        &self,
        discussion: &DiscussionReference,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let Some((offset, limit)) = page_bounds(offset, limit) else {
            return Ok(Vec::new());
        };

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m
             WHERE m.discussion = ?1
             ORDER BY m.creation_date, m.rowid
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(
            params![discussion.to_string(), limit, offset],
            message_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_messages_by_discussion(&self, discussion: &DiscussionReference) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE discussion = ?1",
            params![discussion.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Message counts of several discussions in one query. Discussions
    /// without messages are absent from the map.
    pub fn count_messages_by_discussions(
        &self,
        discussions: &[DiscussionReference],
    ) -> Result<HashMap<DiscussionReference, usize>> {
        if discussions.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT discussion, COUNT(*) FROM messages
             WHERE discussion IN ({})
             GROUP BY discussion",
            placeholders(discussions.len())
        ))?;
        let rows = stmt.query_map(
            params_from_iter(discussions.iter().map(|d| d.to_string())),
            |row| Ok((parse_column::<DiscussionReference>(row, 0)?, row.get::<_, i64>(1)?)),
        )?;

        let mut counts = HashMap::with_capacity(discussions.len());
        for row in rows {
            let (discussion, count) = row?;
            counts.insert(discussion, count as usize);
        }
        Ok(counts)
    }

    // ── followers and groups ────────────────────────────────────────

    /// Record that `owner` follows `user`.
    pub fn add_follow_preference(&self, owner: &str, user: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO notification_filter_preferences (owner, filter_name, filter_type, user, enabled)
             VALUES (?1, ?2, ?3, ?4, 1)",
            params![owner, FOLLOW_FILTER_NAME, INCLUSIVE_FILTER, user],
        )?;
        Ok(())
    }

    /// Owners of enabled, inclusive follow preferences naming `user`.
    pub fn find_follow_preference_owners(&self, user: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT owner FROM notification_filter_preferences
             WHERE user = ?1 AND filter_name = ?2 AND filter_type = ?3 AND enabled = 1
             ORDER BY owner",
        )?;
        let rows = stmt.query_map(params![user, FOLLOW_FILTER_NAME, INCLUSIVE_FILTER], |row| {
            row.get::<_, String>(0)
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn add_group_member(&self, group: &str, member: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO group_members (group_name, member) VALUES (?1, ?2)",
            params![group, member],
        )?;
        Ok(())
    }

    pub fn get_group_members(&self, group: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT member FROM group_members WHERE group_name = ?1 ORDER BY member")?;
        let rows = stmt.query_map(params![group], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// SQLite page bounds. `None` when the offset is past anything SQLite can
/// address, so the page is necessarily empty.
fn page_bounds(offset: usize, limit: usize) -> Option<(i64, i64)> {
    let offset = i64::try_from(offset).ok()?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    Some((offset, limit))
}

fn message_params(
    message: &Message,
    namespace: &str,
    store_configuration: &StoreConfiguration,
) -> Result<[Value; 11]> {
    Ok([
        Value::Text(message.reference.to_string()),
        Value::Text(namespace.to_string()),
        Value::Text(message.discussion.to_string()),
        Value::Text(message.content.clone()),
        Value::Text(message.syntax.clone()),
        Value::Text(message.author.clone()),
        message
            .reply_to
            .as_ref()
            .map_or(Value::Null, |r| Value::Text(r.to_string())),
        Value::Text(serde_json::to_string(&message.attachments)?),
        Value::Integer(message.creation_date.timestamp_micros()),
        Value::Integer(message.update_date.timestamp_micros()),
        Value::Text(serde_json::to_string(store_configuration)?),
    ])
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn entity_values(reference_type: &str, entity_references: &[String]) -> Vec<Value> {
    std::iter::once(Value::Text(reference_type.to_string()))
        .chain(entity_references.iter().cloned().map(Value::Text))
        .collect()
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_column<T>(row: &Row<'_>, column: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(column)?;
    text.parse().map_err(|err| conversion_error(column, err))
}

fn timestamp_column(row: &Row<'_>, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(column)?;
    DateTime::from_timestamp_micros(micros).ok_or(rusqlite::Error::IntegralValueOutOfRange(
        column, micros,
    ))
}

fn discussion_from_row(row: &Row<'_>) -> rusqlite::Result<Discussion> {
    Ok(Discussion {
        reference: parse_column(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        creation_date: timestamp_column(row, 3)?,
        update_date: timestamp_column(row, 4)?,
    })
}

fn context_from_row(row: &Row<'_>) -> rusqlite::Result<DiscussionContext> {
    Ok(DiscussionContext {
        reference: parse_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        entity_reference: EntityReference::new(row.get::<_, String>(3)?, row.get::<_, String>(4)?),
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let reply_to = row
        .get::<_, Option<String>>(5)?
        .map(|text| text.parse::<MessageReference>())
        .transpose()
        .map_err(|err| conversion_error(5, err))?;
    let attachments: String = row.get(6)?;
    let attachments = serde_json::from_str(&attachments).map_err(|err| conversion_error(6, err))?;

    Ok(Message {
        reference: parse_column(row, 0)?,
        content: row.get(1)?,
        syntax: row.get(2)?,
        author: row.get(3)?,
        discussion: parse_column(row, 4)?,
        reply_to,
        attachments,
        creation_date: timestamp_column(row, 7)?,
        update_date: timestamp_column(row, 8)?,
    })
}
