//! Drives the whole router in-process against an in-memory database.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use tower::ServiceExt;
use uuid::Uuid;

use warbler_db::Database;

use crate::flash::FLASH_COOKIE;
use crate::session::SESSION_COOKIE;
use crate::{AppState, AppStateInner, router};

struct TestApp {
    app: Router,
    state: AppState,
}

/// A logged-in browser: the account id plus its session cookie.
struct Client {
    id: Uuid,
    session: String,
}

impl TestApp {
    fn new() -> Self {
        let state = AppStateInner::new(Database::open_in_memory().unwrap(), false).unwrap();
        Self {
            app: router(state.clone(), None),
            state,
        }
    }

    async fn send(&self, req: Request<Body>) -> Response {
        self.app.clone().oneshot(req).await.unwrap()
    }

    async fn get(&self, uri: &str, cookies: &str) -> Response {
        let req = Request::builder()
            .uri(uri)
            .header(header::COOKIE, cookies)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    async fn post(&self, uri: &str, form: &str, cookies: &str) -> Response {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, cookies)
            .body(Body::from(form.to_string()))
            .unwrap();
        self.send(req).await
    }

    async fn signup(&self, username: &str) -> Client {
        let form = format!("username={username}&email={username}%40x.com&password=pw-{username}");
        let resp = self.post("/signup", &form, "").await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "signup of {username} failed");
        assert_eq!(location(&resp), "/");

        let session = cookie(&resp, SESSION_COOKIE).expect("signup sets a session");
        let id = self
            .state
            .db
            .get_account_by_username(username)
            .unwrap()
            .unwrap()
            .id
            .parse()
            .unwrap();
        Client {
            id,
            session: format!("{SESSION_COOKIE}={session}"),
        }
    }

    fn post_message(&self, author: &Client, text: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state
            .db
            .insert_message(&id.to_string(), &author.id.to_string(), text)
            .unwrap();
        id
    }

    fn message_count(&self) -> i64 {
        self.state
            .db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?))
            .unwrap()
    }
}

fn location(resp: &Response) -> &str {
    resp.headers()[header::LOCATION].to_str().unwrap()
}

/// Value of a cookie set by the response, if any.
fn cookie(resp: &Response, name: &str) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next()?.split_once('='))
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.to_string())
}

/// Cookie header that replays the flash notice set by `resp`, plus `base`.
fn with_flash(resp: &Response, base: &str) -> String {
    match cookie(resp, FLASH_COOKIE) {
        Some(flash) if base.is_empty() => format!("{FLASH_COOKIE}={flash}"),
        Some(flash) => format!("{base}; {FLASH_COOKIE}={flash}"),
        None => base.to_string(),
    }
}

async fn text(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn signup_login_and_bad_password() {
    let app = TestApp::new();
    let user = app.signup("user1").await;

    let resp = app.post("/login", "username=user1&password=pw-user1", "").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    let session = cookie(&resp, SESSION_COOKIE).expect("login sets a session");
    assert_ne!(format!("{SESSION_COOKIE}={session}"), user.session);
    let session_header = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(SESSION_COOKIE))
        .unwrap();
    let ttl_secs = warbler_types::SESSION_TTL_DAYS * 24 * 60 * 60;
    assert!(session_header.contains(&format!("Max-Age={ttl_secs}")));

    let cookies = with_flash(&resp, &format!("{SESSION_COOKIE}={session}"));
    let home = text(app.get("/", &cookies).await).await;
    assert!(home.contains("Hello, user1!"));
    assert!(home.contains("Log out"));

    let resp = app.post("/login", "username=user1&password=wrong", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(cookie(&resp, SESSION_COOKIE).is_none());
    assert!(text(resp).await.contains("Invalid credentials."));

    let resp = app.post("/login", "username=nobody&password=pw-user1", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(text(resp).await.contains("Invalid credentials."));
}

#[tokio::test]
async fn duplicate_signup_is_reported() {
    let app = TestApp::new();
    app.signup("user1").await;

    let resp = app
        .post("/signup", "username=user1&email=fresh%40x.com&password=secret1", "")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(cookie(&resp, SESSION_COOKIE).is_none());
    assert!(text(resp).await.contains("Username already taken"));

    let resp = app
        .post("/signup", "username=fresh&email=user1%40x.com&password=secret1", "")
        .await;
    assert!(text(resp).await.contains("Email already taken"));
}

#[tokio::test]
async fn invalid_signup_rerenders_form() {
    let app = TestApp::new();
    let resp = app.post("/signup", "username=user1&email=nope&password=x", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = text(resp).await;
    assert!(body.contains("Enter a valid email address."));
    assert!(body.contains("value=\"user1\""));
    assert!(app.state.db.get_account_by_username("user1").unwrap().is_none());
}

#[tokio::test]
async fn anonymous_message_post_is_refused() {
    let app = TestApp::new();

    let resp = app.post("/messages/new", "text=Hello", "").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    assert_eq!(app.message_count(), 0);

    let landing = text(app.get("/", &with_flash(&resp, "")).await).await;
    assert!(landing.contains("Access unauthorized."));
    assert!(landing.contains("New to Warbler?"));
}

#[tokio::test]
async fn refusal_keeps_notices_already_queued() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;

    let logout = app.get("/logout", &alice.session).await;
    let resp = app.get("/messages/new", &with_flash(&logout, "")).await;
    assert_eq!(location(&resp), "/");

    let landing = text(app.get("/", &with_flash(&resp, "")).await).await;
    assert!(landing.contains("You have logged out."));
    assert!(landing.contains("Access unauthorized."));
}

#[tokio::test]
async fn posting_and_deleting_messages() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let resp = app.post("/messages/new", "text=Hello", &alice.session).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/users/{}", alice.id));
    assert_eq!(app.message_count(), 1);

    let resp = app.post("/messages/new", "text=", &alice.session).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(text(resp).await.contains("Message text is required."));

    let message = app.post_message(&alice, "keep me");
    let resp = app.post(&format!("/messages/{message}/delete"), "", &bob.session).await;
    assert_eq!(location(&resp), "/");
    assert!(app.state.db.get_message(&message.to_string()).unwrap().is_some());

    let resp = app.post(&format!("/messages/{message}/delete"), "", &alice.session).await;
    assert_eq!(location(&resp), format!("/users/{}", alice.id));
    assert!(app.state.db.get_message(&message.to_string()).unwrap().is_none());
}

#[tokio::test]
async fn home_feed_shows_only_followed_accounts() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let carol = app.signup("carol").await;
    app.post_message(&bob, "bob speaks");
    app.post_message(&carol, "carol speaks");

    let home = text(app.get("/", &alice.session).await).await;
    assert!(home.contains("Nothing here yet."));
    assert!(!home.contains("bob speaks"));

    let resp = app.post(&format!("/users/follow/{}", bob.id), "", &alice.session).await;
    assert_eq!(location(&resp), format!("/users/{}/following", alice.id));

    let home = text(app.get("/", &alice.session).await).await;
    assert!(home.contains("bob speaks"));
    assert!(!home.contains("carol speaks"));

    app.post(&format!("/users/stop-following/{}", bob.id), "", &alice.session).await;
    let home = text(app.get("/", &alice.session).await).await;
    assert!(!home.contains("bob speaks"));
}

#[tokio::test]
async fn follow_rules() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let (aid, missing) = (alice.id.to_string(), Uuid::new_v4());

    let resp = app.post(&format!("/users/follow/{}", alice.id), "", &alice.session).await;
    assert!(cookie(&resp, FLASH_COOKIE).is_some());
    assert!(!app.state.db.is_following(&aid, &aid).unwrap());

    let resp = app.post(&format!("/users/follow/{missing}"), "", &alice.session).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Unfollowing someone never followed is a quiet no-op.
    let resp = app.post(&format!("/users/stop-following/{missing}"), "", &alice.session).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let resp = app.get(&format!("/users/{}/following", alice.id), "").await;
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn relationship_pages_list_accounts() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    app.post(&format!("/users/follow/{}", bob.id), "", &alice.session).await;

    let following = text(app.get(&format!("/users/{}/following", alice.id), &alice.session).await).await;
    assert!(following.contains("@bob"));
    assert!(following.contains("Unfollow"));

    let followers = text(app.get(&format!("/users/{}/followers", bob.id), &alice.session).await).await;
    assert!(followers.contains("@alice"));
}

#[tokio::test]
async fn like_toggles_and_refuses_own_messages() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let message = app.post_message(&bob, "likeable");
    let (aid, mid) = (alice.id.to_string(), message.to_string());

    let resp = app.post(&format!("/users/add_like/{message}"), "", &alice.session).await;
    assert_eq!(location(&resp), "/");
    assert!(app.state.db.has_liked(&aid, &mid).unwrap());
    let page = text(app.get("/", &with_flash(&resp, &alice.session)).await).await;
    assert!(page.contains("Liked"));

    let likes = text(app.get(&format!("/users/{}/likes", alice.id), "").await).await;
    assert!(likes.contains("likeable"));

    app.post(&format!("/users/add_like/{message}"), "", &alice.session).await;
    assert!(!app.state.db.has_liked(&aid, &mid).unwrap());

    app.post(&format!("/users/add_like/{message}"), "", &bob.session).await;
    assert!(!app.state.db.has_liked(&bob.id.to_string(), &mid).unwrap());

    let resp = app.post(&format!("/users/add_like/{}", Uuid::new_v4()), "", &alice.session).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_account_ends_session_and_cleans_up() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    app.post_message(&alice, "goodbye");
    let theirs = app.post_message(&bob, "still here");
    app.post(&format!("/users/follow/{}", bob.id), "", &alice.session).await;
    app.post(&format!("/users/add_like/{theirs}"), "", &alice.session).await;

    let resp = app.post("/users/delete", "", &alice.session).await;
    assert_eq!(location(&resp), "/signup");
    assert_eq!(cookie(&resp, SESSION_COOKIE).as_deref(), Some(""));

    assert!(app.state.db.get_account_by_id(&alice.id.to_string()).unwrap().is_none());
    assert_eq!(app.message_count(), 1);
    let stats = app.state.db.account_stats(&bob.id.to_string()).unwrap();
    assert_eq!(stats.followers, 0);

    // The old cookie no longer identifies anybody.
    let resp = app.get("/messages/new", &alice.session).await;
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn editing_profile_requires_current_password() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let edit = format!("/users/{}/edit", alice.id);

    let form = text(app.get(&edit, &alice.session).await).await;
    assert!(form.contains("value=\"alice\""));

    let resp = app.get(&edit, &bob.session).await;
    assert_eq!(location(&resp), "/");

    let resp = app
        .post(&edit, "username=alicia&email=alice%40x.com&bio=hi&password=wrong", &alice.session)
        .await;
    assert_eq!(location(&resp), "/");
    assert!(app.state.db.get_account_by_username("alicia").unwrap().is_none());

    let resp = app
        .post(&edit, "username=bob&email=alice%40x.com&password=pw-alice", &alice.session)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(text(resp).await.contains("Username already taken"));

    let resp = app
        .post(&edit, "username=alicia&email=alice%40x.com&bio=hi&password=pw-alice", &alice.session)
        .await;
    assert_eq!(location(&resp), format!("/users/{}", alice.id));
    let row = app.state.db.get_account_by_username("alicia").unwrap().unwrap();
    assert_eq!(row.bio, "hi");
    assert_eq!(row.image_url, warbler_types::DEFAULT_IMAGE_URL);
}

#[tokio::test]
async fn logout_forgets_the_session() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;

    let resp = app.get("/logout", &alice.session).await;
    assert_eq!(location(&resp), "/login");
    assert_eq!(cookie(&resp, SESSION_COOKIE).as_deref(), Some(""));

    let page = text(app.get("/login", &with_flash(&resp, &alice.session)).await).await;
    assert!(page.contains("You have logged out."));
    assert!(page.contains("Sign up"));
}

#[tokio::test]
async fn public_pages() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;
    app.signup("bob").await;
    let message = app.post_message(&alice, "public words");

    let profile = text(app.get(&format!("/users/{}", alice.id), "").await).await;
    assert!(profile.contains("public words"));
    assert!(profile.contains("@alice"));

    let shown = text(app.get(&format!("/messages/{message}"), "").await).await;
    assert!(shown.contains("public words"));

    let found = text(app.get("/users?q=ali", "").await).await;
    assert!(found.contains("@alice"));
    assert!(!found.contains("@bob"));

    let none = text(app.get("/users?q=zzz", "").await).await;
    assert!(none.contains("Sorry, no users found"));

    let resp = app.get(&format!("/messages/{}", Uuid::new_v4()), "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = app.get(&format!("/users/{}", Uuid::new_v4()), "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = app.get("/nowhere", "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    for uri in ["/users/123", "/messages/abc", "/users/42/likes"] {
        let resp = app.get(uri, "").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "GET {uri}");
        assert!(text(resp).await.contains("404"));
    }
}

#[tokio::test]
async fn malformed_ids_are_not_found_for_actions_too() {
    let app = TestApp::new();
    let alice = app.signup("alice").await;

    for uri in ["/users/add_like/7", "/messages/7/delete", "/users/follow/x"] {
        let resp = app.post(uri, "", &alice.session).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "POST {uri}");
    }
    let resp = app.get("/users/not-an-id/following", &alice.session).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn every_response_disables_caching() {
    let app = TestApp::new();
    for resp in [
        app.get("/", "").await,
        app.post("/messages/new", "text=x", "").await,
        app.get("/nowhere", "").await,
    ] {
        let headers = resp.headers();
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store, must-revalidate");
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], "0");
    }
}
