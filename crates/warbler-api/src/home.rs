use std::collections::HashSet;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use warbler_types::FEED_LIMIT;

use crate::error::AppError;
use crate::render::Page;
use crate::session::Viewer;
use crate::state::{AppState, run_blocking};
use crate::users::annotate;

/// Anonymous visitors get the landing page; everyone else gets the
/// newest messages from the accounts they follow.
pub async fn homepage(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let Some(account) = viewer else {
        return Ok(Page::new("home-anon.html")
            .render(&state, jar, None)?
            .into_response());
    };

    let account_id = account.id.to_string();
    let (rows, liked, stats) = run_blocking(&state, move |db| {
        let rows = db.home_feed(&account_id, FEED_LIMIT)?;
        let liked = db.liked_message_ids(&account_id)?;
        let stats = db.account_stats(&account_id)?;
        Ok((rows, liked, stats))
    })
    .await?;

    let liked: HashSet<String> = liked.into_iter().collect();
    Ok(Page::new("home.html")
        .with("feed", &annotate(rows, &liked))
        .with("stats", &stats)
        .render(&state, jar, Some(&account))?
        .into_response())
}
