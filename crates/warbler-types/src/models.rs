use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account. The password hash never leaves the db layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

/// A posted message, joined with enough of its author to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub account_id: Uuid,
    pub author_username: String,
    pub author_image_url: String,
}

/// A message as shown on the home feed, annotated for the viewer.
#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub message: Message,
    pub liked: bool,
}

/// Relationship and activity counts shown in a profile header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub messages: u64,
    pub following: u64,
    pub followers: u64,
    pub likes: u64,
}

/// An account in a listing, with whether the viewer follows it.
#[derive(Debug, Clone, Serialize)]
pub struct AccountCard {
    #[serde(flatten)]
    pub account: Account,
    pub followed_by_viewer: bool,
}

/// Outcome of toggling a like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToggle {
    Liked,
    Unliked,
}
