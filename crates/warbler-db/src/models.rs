//! Database row types. These map directly to SQLite rows.
//! Distinct from warbler-types models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use warbler_types::models::{Account, Message};

pub struct AccountRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: String,
    pub created_at: String,
}

impl AccountRow {
    pub fn into_account(self) -> Account {
        Account {
            id: parse_id(&self.id, "account"),
            created_at: parse_timestamp(&self.created_at, &self.id),
            username: self.username,
            email: self.email,
            image_url: self.image_url,
            header_image_url: self.header_image_url,
            bio: self.bio,
        }
    }
}

pub struct MessageRow {
    pub id: String,
    pub text: String,
    pub created_at: String,
    pub account_id: String,
    pub author_username: String,
    pub author_image_url: String,
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        Message {
            id: parse_id(&self.id, "message"),
            account_id: parse_id(&self.account_id, "author"),
            created_at: parse_timestamp(&self.created_at, &self.id),
            text: self.text,
            author_username: self.author_username,
            author_image_url: self.author_image_url,
        }
    }
}

/// Profile edits, applied all at once.
pub struct AccountChanges<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub image_url: &'a str,
    pub header_image_url: &'a str,
    pub bio: &'a str,
}

fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str, owner: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through the sqlite shell use datetime('now').
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on '{}': {}", raw, owner, e);
            DateTime::default()
        })
}
