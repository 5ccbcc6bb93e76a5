use crate::models::{AccountChanges, AccountRow, MessageRow};
use crate::{ConstraintError, Database};
use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};
use tracing::debug;
use warbler_types::SESSION_TTL_DAYS;
use warbler_types::models::{LikeToggle, ProfileStats};

const ACCOUNT_COLUMNS: &str =
    "a.id, a.username, a.email, a.password, a.image_url, a.header_image_url, a.bio, a.created_at";

// Accounts are always aliased `a`, so the author columns come from the join.
const MESSAGE_COLUMNS: &str = "m.id, m.text, m.created_at, m.account_id, a.username, a.image_url";

impl Database {
    // -- Accounts --

    pub fn create_account(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        image_url: &str,
        header_image_url: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO accounts (id, username, email, password, image_url, header_image_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (id, username, email, password_hash, image_url, header_image_url, now()),
            )
            .map_err(unique_violation)?;
            Ok(())
        })
    }

    pub fn get_account_by_id(&self, id: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "a.id = ?1", id))
    }

    pub fn get_account_by_username(&self, username: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "a.username = ?1", username))
    }

    /// All accounts, or those whose username contains `term` (case-sensitive).
    pub fn search_accounts(&self, term: Option<&str>) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| match term {
            Some(term) => query_accounts(
                conn,
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE instr(a.username, ?1) > 0 ORDER BY a.username"),
                [term],
            ),
            None => query_accounts(
                conn,
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a ORDER BY a.username"),
                rusqlite::params![],
            ),
        })
    }

    pub fn update_account(&self, id: &str, changes: &AccountChanges<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn
                .execute(
                    "UPDATE accounts
                     SET username = ?2, email = ?3, image_url = ?4, header_image_url = ?5, bio = ?6
                     WHERE id = ?1",
                    (
                        id,
                        changes.username,
                        changes.email,
                        changes.image_url,
                        changes.header_image_url,
                        changes.bio,
                    ),
                )
                .map_err(unique_violation)?;
            Ok(updated > 0)
        })
    }

    /// Deletes the account. Its messages, likes, follows and sessions go with it,
    /// as do other accounts' likes on its messages.
    pub fn delete_account(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    pub fn account_stats(&self, id: &str) -> Result<ProfileStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM messages WHERE account_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE followed_id = ?1),
                    (SELECT COUNT(*) FROM likes WHERE account_id = ?1)",
                [id],
                |row| {
                    Ok(ProfileStats {
                        messages: row.get::<_, i64>(0)? as u64,
                        following: row.get::<_, i64>(1)? as u64,
                        followers: row.get::<_, i64>(2)? as u64,
                        likes: row.get::<_, i64>(3)? as u64,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, id: &str, account_id: &str, text: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, account_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, account_id, text, now()),
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages m
                         JOIN accounts a ON a.id = m.account_id
                         WHERE m.id = ?1"
                    ),
                    [id],
                    message_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_message(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    /// The account's own messages, newest first.
    pub fn messages_by_account(&self, account_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages m
                     JOIN accounts a ON a.id = m.account_id
                     WHERE m.account_id = ?1
                     ORDER BY m.created_at DESC, m.rowid DESC
                     LIMIT ?2"
                ),
                (account_id, limit),
            )
        })
    }

    /// Messages written by accounts that `account_id` follows, newest first.
    pub fn home_feed(&self, account_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages m
                     JOIN accounts a ON a.id = m.account_id
                     WHERE m.account_id IN (
                         SELECT followed_id FROM follows WHERE follower_id = ?1
                     )
                     ORDER BY m.created_at DESC, m.rowid DESC
                     LIMIT ?2"
                ),
                (account_id, limit),
            )
        })
    }

    /// Messages the account has liked, most recently liked first.
    pub fn liked_messages(&self, account_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM likes l
                     JOIN messages m ON m.id = l.message_id
                     JOIN accounts a ON a.id = m.account_id
                     WHERE l.account_id = ?1
                     ORDER BY l.created_at DESC, l.rowid DESC"
                ),
                [account_id],
            )
        })
    }

    pub fn liked_message_ids(&self, account_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT message_id FROM likes WHERE account_id = ?1")?;
            let ids = stmt
                .query_map([account_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    // -- Follows --

    /// Inserts the follow edge. Returns false when it already existed.
    pub fn follow(&self, follower_id: &str, followed_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followed_id) VALUES (?1, ?2)",
                (follower_id, followed_id),
            )?;
            Ok(inserted > 0)
        })
    }

    /// Removes the follow edge. Returns false when there was none.
    pub fn unfollow(&self, follower_id: &str, followed_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                (follower_id, followed_id),
            )?;
            Ok(deleted > 0)
        })
    }

    /// Does `account_id` follow `other_id`?
    pub fn is_following(&self, account_id: &str, other_id: &str) -> Result<bool> {
        self.with_conn(|conn| follow_exists(conn, account_id, other_id))
    }

    /// Is `account_id` followed by `other_id`?
    pub fn is_followed_by(&self, account_id: &str, other_id: &str) -> Result<bool> {
        self.with_conn(|conn| follow_exists(conn, other_id, account_id))
    }

    /// Accounts that `account_id` follows.
    pub fn following(&self, account_id: &str) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| {
            query_accounts(
                conn,
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM follows f
                     JOIN accounts a ON a.id = f.followed_id
                     WHERE f.follower_id = ?1
                     ORDER BY a.username"
                ),
                [account_id],
            )
        })
    }

    /// Accounts following `account_id`.
    pub fn followers(&self, account_id: &str) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| {
            query_accounts(
                conn,
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM follows f
                     JOIN accounts a ON a.id = f.follower_id
                     WHERE f.followed_id = ?1
                     ORDER BY a.username"
                ),
                [account_id],
            )
        })
    }

    /// Ids of every account `account_id` follows.
    pub fn followed_ids(&self, account_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT followed_id FROM follows WHERE follower_id = ?1")?;
            let ids = stmt
                .query_map([account_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    // -- Likes --

    /// Toggle a like: removes it if present, inserts it otherwise.
    pub fn toggle_like(&self, account_id: &str, message_id: &str) -> Result<LikeToggle> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM likes WHERE account_id = ?1 AND message_id = ?2",
                (account_id, message_id),
            )?;

            let outcome = if removed > 0 {
                LikeToggle::Unliked
            } else {
                tx.execute(
                    "INSERT INTO likes (account_id, message_id, created_at) VALUES (?1, ?2, ?3)",
                    (account_id, message_id, now()),
                )?;
                LikeToggle::Liked
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    pub fn has_liked(&self, account_id: &str, message_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM likes WHERE account_id = ?1 AND message_id = ?2",
                    (account_id, message_id),
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Sessions --

    /// Stores a new session and prunes every session that has expired.
    pub fn create_session(&self, token: &str, account_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let pruned = tx.execute("DELETE FROM sessions WHERE created_at < ?1", [session_cutoff()])?;
            if pruned > 0 {
                debug!("Pruned {} expired sessions", pruned);
            }
            tx.execute(
                "INSERT INTO sessions (token, account_id, created_at) VALUES (?1, ?2, ?3)",
                (token, account_id, now()),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
            Ok(())
        })
    }

    /// The account a session token is bound to, if the session exists and
    /// has not expired.
    pub fn get_session_account(&self, token: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {ACCOUNT_COLUMNS} FROM sessions s
                         JOIN accounts a ON a.id = s.account_id
                         WHERE s.token = ?1 AND s.created_at >= ?2"
                    ),
                    (token, session_cutoff()),
                    account_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }
}

fn now() -> String {
    timestamp(Utc::now())
}

// Fixed-width UTC so lexical order is chronological order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Sessions created before this instant have expired.
fn session_cutoff() -> String {
    timestamp(Utc::now() - Duration::days(SESSION_TTL_DAYS))
}

fn unique_violation(err: rusqlite::Error) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(e, Some(msg)) = &err {
        if e.code == ErrorCode::ConstraintViolation {
            if msg.contains("accounts.username") {
                return ConstraintError::UsernameTaken.into();
            }
            if msg.contains("accounts.email") {
                return ConstraintError::EmailTaken.into();
            }
        }
    }
    err.into()
}

fn follow_exists(conn: &Connection, follower_id: &str, followed_id: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
            (follower_id, followed_id),
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn query_account(conn: &Connection, filter: &str, value: &str) -> Result<Option<AccountRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE {filter}"))?;
    let row = stmt.query_row([value], account_from_row).optional()?;
    Ok(row)
}

fn query_accounts<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<AccountRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, account_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_messages<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: row.get(2)?,
        account_id: row.get(3)?,
        author_username: row.get(4)?,
        author_image_url: row.get(5)?,
    })
}
