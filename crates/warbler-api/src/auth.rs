use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use rand_core::OsRng;
use tracing::info;
use uuid::Uuid;

use warbler_db::{ConflictExt, ConstraintError, Database};
use warbler_types::forms::{LoginForm, SignupForm};
use warbler_types::models::Account;
use warbler_types::DEFAULT_HEADER_IMAGE_URL;

use crate::error::AppError;
use crate::flash::{self, Flash};
use crate::render::Page;
use crate::session::{self, Viewer};
use crate::state::{AppState, run_blocking};

/// Same words for an unknown username and a wrong password.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("corrupt password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Create an account with a hashed password. Blocking.
pub fn signup(db: &Database, form: &SignupForm) -> anyhow::Result<Result<Account, ConstraintError>> {
    let id = Uuid::new_v4().to_string();
    let hash = hash_password(&form.password)?;

    let created = db
        .create_account(
            &id,
            form.username.trim(),
            form.email.trim(),
            &hash,
            &form.image_url_or_default(),
            DEFAULT_HEADER_IMAGE_URL,
        )
        .conflict()?;
    if let Err(conflict) = created {
        return Ok(Err(conflict));
    }

    let row = db
        .get_account_by_id(&id)?
        .ok_or_else(|| anyhow::anyhow!("account {} vanished after insert", id))?;
    Ok(Ok(row.into_account()))
}

/// The account matching both username and password, or `None`. Blocking.
pub fn authenticate(db: &Database, username: &str, password: &str) -> anyhow::Result<Option<Account>> {
    let Some(row) = db.get_account_by_username(username)? else {
        return Ok(None);
    };
    if !verify_password(password, &row.password)? {
        return Ok(None);
    }
    Ok(Some(row.into_account()))
}

pub fn conflict_notice(conflict: ConstraintError) -> Flash {
    match conflict {
        ConstraintError::UsernameTaken => Flash::danger("Username already taken"),
        ConstraintError::EmailTaken => Flash::danger("Email already taken"),
    }
}

// -- Handlers --

pub async fn signup_form(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
) -> Result<Response, AppError> {
    Ok(Page::new("users/signup.html")
        .with("form", &SignupForm::default())
        .render(&state, jar, viewer.as_ref())?
        .into_response())
}

pub async fn create_account(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(Page::new("users/signup.html")
            .with("form", &form)
            .errors(errors)
            .render(&state, jar, viewer.as_ref())?
            .into_response());
    }

    let submitted = form.clone();
    let outcome = run_blocking(&state, move |db| signup(db, &submitted)).await?;

    match outcome {
        Ok(account) => {
            info!("Account {} signed up as {}", account.id, account.username);
            let jar = session::start(&state, jar, account.id).await?;
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(conflict) => Ok(Page::new("users/signup.html")
            .with("form", &form)
            .notice(conflict_notice(conflict))
            .render(&state, jar, viewer.as_ref())?
            .into_response()),
    }
}

pub async fn login_form(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
) -> Result<Response, AppError> {
    Ok(Page::new("users/login.html")
        .with("form", &LoginForm::default())
        .render(&state, jar, viewer.as_ref())?
        .into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(Page::new("users/login.html")
            .with("form", &form)
            .errors(errors)
            .render(&state, jar, viewer.as_ref())?
            .into_response());
    }

    let (username, password) = (form.username.trim().to_string(), form.password.clone());
    let account = run_blocking(&state, move |db| authenticate(db, &username, &password)).await?;

    let Some(account) = account else {
        info!("Failed login for {}", form.username);
        return Ok(Page::new("users/login.html")
            .with("form", &form)
            .notice(Flash::danger(INVALID_CREDENTIALS))
            .render(&state, jar, viewer.as_ref())?
            .into_response());
    };

    info!("Account {} logged in", account.id);
    let jar = session::start(&state, jar, account.id).await?;
    let jar = flash::push(jar, Flash::success(format!("Hello, {}!", account.username)));
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn logout(State(state): State<AppState>, Viewer(viewer): Viewer, jar: CookieJar) -> Result<Response, AppError> {
    if let Some(id) = viewer.as_ref().map(|a| a.id) {
        info!("Account {} logged out", id);
    }
    let jar = session::end(&state, jar).await?;
    let jar = flash::push(jar, Flash::success("You have logged out."));
    Ok((jar, Redirect::to("/login")).into_response())
}
