use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::info;

use warbler_types::models::LikeToggle;

use crate::error::AppError;
use crate::flash::{self, Flash};
use crate::messages::load_message;
use crate::session::{AuthUser, Id};
use crate::state::{AppState, run_blocking};

pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    jar: CookieJar,
    Id(message_id): Id,
) -> Result<Response, AppError> {
    let message = load_message(&state, message_id).await?;

    if message.account_id == viewer.id {
        let jar = flash::push(jar, Flash::danger("You cannot like your own message."));
        return Ok((jar, Redirect::to("/")).into_response());
    }

    let (aid, mid) = (viewer.id.to_string(), message_id.to_string());
    let outcome = run_blocking(&state, move |db| db.toggle_like(&aid, &mid)).await?;

    let notice = match outcome {
        LikeToggle::Liked => "Liked",
        LikeToggle::Unliked => "Unliked",
    };
    info!("Account {} {} message {}", viewer.id, notice.to_lowercase(), message_id);

    let jar = flash::push(jar, Flash::success(notice));
    Ok((jar, Redirect::to("/")).into_response())
}
