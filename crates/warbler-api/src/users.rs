use std::collections::HashSet;

use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{info, warn};
use uuid::Uuid;

use warbler_db::ConflictExt;
use warbler_db::models::{AccountChanges, AccountRow, MessageRow};
use warbler_types::FEED_LIMIT;
use warbler_types::forms::{EditProfileForm, SearchQuery};
use warbler_types::models::{Account, AccountCard, FeedItem, ProfileStats};

use crate::auth::{conflict_notice, verify_password};
use crate::error::AppError;
use crate::flash::{self, Flash};
use crate::render::Page;
use crate::session::{self, AuthUser, Id, Viewer};
use crate::state::{AppState, run_blocking};

/// The account with this id, or `AppError::NotFound`.
pub(crate) async fn load_account(state: &AppState, id: Uuid) -> Result<Account, AppError> {
    run_blocking(state, move |db| db.get_account_by_id(&id.to_string()))
        .await?
        .map(AccountRow::into_account)
        .ok_or(AppError::NotFound)
}

/// Pair messages with whether `liked_ids` contains them.
pub(crate) fn annotate(rows: Vec<MessageRow>, liked_ids: &HashSet<String>) -> Vec<FeedItem> {
    rows.into_iter()
        .map(|row| {
            let liked = liked_ids.contains(&row.id);
            FeedItem {
                message: row.into_message(),
                liked,
            }
        })
        .collect()
}

fn cards(rows: Vec<AccountRow>, followed_ids: &HashSet<String>) -> Vec<AccountCard> {
    rows.into_iter()
        .map(|row| {
            let followed_by_viewer = followed_ids.contains(&row.id);
            AccountCard {
                account: row.into_account(),
                followed_by_viewer,
            }
        })
        .collect()
}

pub async fn list_users(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let term = query.term().map(str::to_string);
    let viewer_id = viewer.as_ref().map(|a| a.id.to_string());

    let (rows, followed) = run_blocking(&state, move |db| {
        let rows = db.search_accounts(term.as_deref())?;
        let followed = match viewer_id {
            Some(id) => db.followed_ids(&id)?,
            None => vec![],
        };
        Ok((rows, followed))
    })
    .await?;

    let followed: HashSet<String> = followed.into_iter().collect();
    Ok(Page::new("users/index.html")
        .with("cards", &cards(rows, &followed))
        .render(&state, jar, viewer.as_ref())?
        .into_response())
}

/// What every profile-header page needs about the account being shown.
struct Profile {
    user: Account,
    stats: ProfileStats,
    viewer_follows: bool,
    follows_viewer: bool,
}

async fn load_profile(state: &AppState, id: Uuid, viewer: Option<&Account>) -> Result<Profile, AppError> {
    let user = load_account(state, id).await?;
    let account_id = id.to_string();
    let viewer_id = viewer.map(|a| a.id.to_string());

    let (stats, viewer_follows, follows_viewer) = run_blocking(state, move |db| {
        let stats = db.account_stats(&account_id)?;
        let (viewer_follows, follows_viewer) = match viewer_id {
            Some(viewer_id) => (
                db.is_following(&viewer_id, &account_id)?,
                db.is_followed_by(&viewer_id, &account_id)?,
            ),
            None => (false, false),
        };
        Ok((stats, viewer_follows, follows_viewer))
    })
    .await?;

    Ok(Profile {
        user,
        stats,
        viewer_follows,
        follows_viewer,
    })
}

fn profile_page(template: &'static str, profile: &Profile) -> Page {
    Page::new(template)
        .with("user", &profile.user)
        .with("stats", &profile.stats)
        .with("viewer_follows", &profile.viewer_follows)
        .with("follows_viewer", &profile.follows_viewer)
}

pub async fn show_user(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
    Id(id): Id,
) -> Result<Response, AppError> {
    let profile = load_profile(&state, id, viewer.as_ref()).await?;

    let account_id = id.to_string();
    let viewer_id = viewer.as_ref().map(|a| a.id.to_string());
    let (rows, liked) = run_blocking(&state, move |db| {
        let rows = db.messages_by_account(&account_id, FEED_LIMIT)?;
        let liked = match viewer_id {
            Some(viewer_id) => db.liked_message_ids(&viewer_id)?,
            None => vec![],
        };
        Ok((rows, liked))
    })
    .await?;

    let liked: HashSet<String> = liked.into_iter().collect();
    Ok(profile_page("users/show.html", &profile)
        .with("messages", &annotate(rows, &liked))
        .render(&state, jar, viewer.as_ref())?
        .into_response())
}

pub async fn show_likes(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    jar: CookieJar,
    Id(id): Id,
) -> Result<Response, AppError> {
    let profile = load_profile(&state, id, viewer.as_ref()).await?;

    let account_id = id.to_string();
    let viewer_id = viewer.as_ref().map(|a| a.id.to_string());
    let (rows, liked) = run_blocking(&state, move |db| {
        let rows = db.liked_messages(&account_id)?;
        let liked = match viewer_id {
            Some(viewer_id) => db.liked_message_ids(&viewer_id)?,
            None => vec![],
        };
        Ok((rows, liked))
    })
    .await?;

    let liked: HashSet<String> = liked.into_iter().collect();
    Ok(profile_page("users/likes.html", &profile)
        .with("messages", &annotate(rows, &liked))
        .render(&state, jar, viewer.as_ref())?
        .into_response())
}

#[derive(Clone, Copy)]
enum Direction {
    Following,
    Followers,
}

async fn show_relationship(
    state: AppState,
    viewer: Account,
    jar: CookieJar,
    id: Uuid,
    direction: Direction,
) -> Result<Response, AppError> {
    let profile = load_profile(&state, id, Some(&viewer)).await?;

    let account_id = id.to_string();
    let viewer_id = viewer.id.to_string();
    let (rows, followed) = run_blocking(&state, move |db| {
        let rows = match direction {
            Direction::Following => db.following(&account_id)?,
            Direction::Followers => db.followers(&account_id)?,
        };
        Ok((rows, db.followed_ids(&viewer_id)?))
    })
    .await?;

    let template = match direction {
        Direction::Following => "users/following.html",
        Direction::Followers => "users/followers.html",
    };
    let followed: HashSet<String> = followed.into_iter().collect();
    Ok(profile_page(template, &profile)
        .with("cards", &cards(rows, &followed))
        .render(&state, jar, Some(&viewer))?
        .into_response())
}

pub async fn show_following(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    jar: CookieJar,
    Id(id): Id,
) -> Result<Response, AppError> {
    show_relationship(state, viewer, jar, id, Direction::Following).await
}

pub async fn show_followers(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    jar: CookieJar,
    Id(id): Id,
) -> Result<Response, AppError> {
    show_relationship(state, viewer, jar, id, Direction::Followers).await
}

pub async fn follow(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    jar: CookieJar,
    Id(id): Id,
) -> Result<Response, AppError> {
    let back = Redirect::to(&format!("/users/{}/following", viewer.id));

    if id == viewer.id {
        let jar = flash::push(jar, Flash::danger("You cannot follow yourself."));
        return Ok((jar, back).into_response());
    }

    let target = load_account(&state, id).await?;
    let (follower, followed) = (viewer.id.to_string(), target.id.to_string());
    if run_blocking(&state, move |db| db.follow(&follower, &followed)).await? {
        info!("Account {} followed {}", viewer.id, target.id);
    }
    Ok((jar, back).into_response())
}

pub async fn stop_following(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Id(id): Id,
) -> Result<Response, AppError> {
    let (follower, followed) = (viewer.id.to_string(), id.to_string());
    if run_blocking(&state, move |db| db.unfollow(&follower, &followed)).await? {
        info!("Account {} unfollowed {}", viewer.id, id);
    }
    Ok(Redirect::to(&format!("/users/{}/following", viewer.id)).into_response())
}

pub async fn edit_form(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    jar: CookieJar,
    Id(id): Id,
) -> Result<Response, AppError> {
    if id != viewer.id {
        return Err(AppError::Unauthorized);
    }

    let form = EditProfileForm {
        username: viewer.username.clone(),
        email: viewer.email.clone(),
        image_url: viewer.image_url.clone(),
        header_image_url: viewer.header_image_url.clone(),
        bio: viewer.bio.clone(),
        password: String::new(),
    };
    Ok(Page::new("users/edit.html")
        .with("form", &form)
        .render(&state, jar, Some(&viewer))?
        .into_response())
}

enum EditOutcome {
    Saved,
    WrongPassword,
    Conflict(Flash),
}

pub async fn edit_profile(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    jar: CookieJar,
    Id(id): Id,
    Form(form): Form<EditProfileForm>,
) -> Result<Response, AppError> {
    if id != viewer.id {
        return Err(AppError::Unauthorized);
    }

    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(Page::new("users/edit.html")
            .with("form", &form)
            .errors(errors)
            .render(&state, jar, Some(&viewer))?
            .into_response());
    }

    let submitted = form.clone();
    let account_id = id.to_string();
    let outcome = run_blocking(&state, move |db| {
        let row = db
            .get_account_by_id(&account_id)?
            .ok_or_else(|| anyhow::anyhow!("account {} missing during edit", account_id))?;
        if !verify_password(&submitted.password, &row.password)? {
            return Ok(EditOutcome::WrongPassword);
        }

        let image_url = submitted.image_url_or_default();
        let header_image_url = submitted.header_image_url_or_default();
        let changes = AccountChanges {
            username: submitted.username.trim(),
            email: submitted.email.trim(),
            image_url: &image_url,
            header_image_url: &header_image_url,
            bio: submitted.bio.trim(),
        };
        Ok(match db.update_account(&account_id, &changes).conflict()? {
            Ok(_) => EditOutcome::Saved,
            Err(conflict) => EditOutcome::Conflict(conflict_notice(conflict)),
        })
    })
    .await?;

    match outcome {
        EditOutcome::Saved => {
            info!("Account {} edited its profile", id);
            Ok(Redirect::to(&format!("/users/{}", id)).into_response())
        }
        EditOutcome::WrongPassword => Err(AppError::Unauthorized),
        EditOutcome::Conflict(notice) => Ok(Page::new("users/edit.html")
            .with("form", &form)
            .notice(notice)
            .render(&state, jar, Some(&viewer))?
            .into_response()),
    }
}

pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let account_id = viewer.id.to_string();
    if run_blocking(&state, move |db| db.delete_account(&account_id)).await? {
        info!("Account {} deleted", viewer.id);
    } else {
        warn!("Account {} was already gone when its owner deleted it", viewer.id);
    }

    let jar = session::end(&state, jar).await?;
    let jar = flash::push(jar, Flash::info("Your account has been deleted."));
    Ok((jar, Redirect::to("/signup")).into_response())
}
