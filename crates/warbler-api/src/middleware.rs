use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::flash::{self, Deferred};

/// Forbid caching of every response; pages depend on who is logged in.
pub async fn no_cache(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    resp
}

/// Turn a `Deferred` notice on the response into a flash cookie, keeping the
/// notices the request already carried.
pub async fn deliver_flash(jar: CookieJar, req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    match resp.extensions_mut().remove::<Deferred>() {
        Some(Deferred(notice)) => (flash::push(jar, notice), resp).into_response(),
        None => resp,
    }
}
