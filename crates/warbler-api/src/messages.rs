use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::info;
use uuid::Uuid;

use warbler_db::models::MessageRow;
use warbler_types::forms::MessageForm;
use warbler_types::models::Message;

use crate::error::AppError;
use crate::render::Page;
use crate::session::{AuthUser, Id, Viewer};
use crate::state::{AppState, run_blocking};

/// The message with this id, or `AppError::NotFound`.
pub(crate) async fn load_message(state: &AppState, id: Uuid) -> Result<Message, AppError> {
    run_blocking(state, move |db| db.get_message(&id.to_string()))
        .await?
        .map(MessageRow::into_message)
        .ok_or(AppError::NotFound)
}

pub async fn new_message_form(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    Ok(Page::new("messages/new.html")
        .with("form", &MessageForm::default())
        .render(&state, jar, Some(&viewer))?
        .into_response())
}

pub async fn create_message(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    jar: CookieJar,
    Form(form): Form<MessageForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(Page::new("messages/new.html")
            .with("form", &form)
            .errors(errors)
            .render(&state, jar, Some(&viewer))?
            .into_response());
    }

    let message_id = Uuid::new_v4();
    let (mid, aid) = (message_id.to_string(), viewer.id.to_string());
    let text = form.text.trim().to_string();
    run_blocking(&state, move |db| db.insert_message(&mid, &aid, &text)).await?;

    info!("Account {} posted message {}", viewer.id, message_id);
    Ok(Redirect::to(&format!("/users/{}", viewer.id)).into_response())
}

pub async fn show_message(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
    Id(id): Id,
) -> Result<Response, AppError> {
    let message = load_message(&state, id).await?;

    let liked = match viewer.as_ref() {
        Some(viewer) => {
            let (aid, mid) = (viewer.id.to_string(), id.to_string());
            run_blocking(&state, move |db| db.has_liked(&aid, &mid)).await?
        }
        None => false,
    };

    Ok(Page::new("messages/show.html")
        .with("message", &message)
        .with("liked", &liked)
        .render(&state, jar, viewer.as_ref())?
        .into_response())
}

pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Id(id): Id,
) -> Result<Response, AppError> {
    let message = load_message(&state, id).await?;
    if message.account_id != viewer.id {
        return Err(AppError::Unauthorized);
    }

    let mid = id.to_string();
    run_blocking(&state, move |db| db.delete_message(&mid)).await?;

    info!("Account {} deleted message {}", viewer.id, id);
    Ok(Redirect::to(&format!("/users/{}", viewer.id)).into_response())
}
