use std::path::Path;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::error::AppError;
use crate::state::AppState;
use crate::{auth, home, likes, messages, users};

/// Every page and action, plus `/static` when a directory is given,
/// with the no-cache headers applied to all of it.
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/", get(home::homepage))
        .route("/signup", get(auth::signup_form).post(auth::create_account))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/users", get(users::list_users))
        .route("/users/delete", post(users::delete_account))
        .route("/users/follow/{id}", post(users::follow))
        .route("/users/stop-following/{id}", post(users::stop_following))
        .route("/users/add_like/{message_id}", post(likes::toggle_like))
        .route("/users/{id}", get(users::show_user))
        .route("/users/{id}/edit", get(users::edit_form).post(users::edit_profile))
        .route("/users/{id}/likes", get(users::show_likes))
        .route("/users/{id}/following", get(users::show_following))
        .route("/users/{id}/followers", get(users::show_followers))
        .route("/messages/new", get(messages::new_message_form).post(messages::create_message))
        .route("/messages/{id}", get(messages::show_message))
        .route("/messages/{id}/delete", post(messages::delete_message))
        .fallback(not_found);

    if let Some(dir) = static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.layer(middleware::from_fn(crate::middleware::deliver_flash))
        .layer(middleware::from_fn(crate::middleware::no_cache))
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}
