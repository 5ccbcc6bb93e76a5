//! One-shot notices carried across a redirect in a cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const FLASH_COOKIE: &str = "warbler_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Success,
    Danger,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: Category,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self { category: Category::Success, message: message.into() }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self { category: Category::Danger, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { category: Category::Info, message: message.into() }
    }
}

/// A notice raised while building a response that has no cookie jar of its
/// own. `middleware::deliver_flash` queues it next to any pending notices.
#[derive(Debug, Clone)]
pub struct Deferred(pub Flash);

/// Queue a notice for the next rendered page.
pub fn push(jar: CookieJar, flash: Flash) -> CookieJar {
    let mut pending = jar.get(FLASH_COOKIE).map(|c| decode(c.value())).unwrap_or_default();
    pending.push(flash);

    let Ok(json) = serde_json::to_vec(&pending) else {
        return jar;
    };
    let cookie = Cookie::build((FLASH_COOKIE, B64.encode(json)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

/// Drain queued notices. The cookie is cleared if there was one.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<Flash>) {
    match jar.get(FLASH_COOKIE).map(|c| decode(c.value())) {
        Some(flashes) => (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flashes),
        None => (jar, Vec::new()),
    }
}

fn decode(raw: &str) -> Vec<Flash> {
    B64.decode(raw)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_else(|| {
            debug!("Discarding unreadable flash cookie");
            Vec::new()
        })
}
