pub mod forms;
pub mod models;

/// Avatar used when an account has no image of its own.
pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.png";

/// Banner shown behind the profile header when none is set.
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/warbler-hero.jpg";

/// Upper bound on message text, in characters.
pub const MAX_MESSAGE_LEN: usize = 140;

pub const MAX_USERNAME_LEN: usize = 30;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_BIO_LEN: usize = 280;

/// How many messages the home feed and profile pages show.
pub const FEED_LIMIT: u32 = 100;

/// Lifetime of a login session, both server-side and in the cookie.
pub const SESSION_TTL_DAYS: i64 = 14;
