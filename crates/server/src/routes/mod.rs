use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use session::Flash;
use shared::domain::Identity;

use crate::{app_state::AppState, cookies};

pub mod api;
pub mod auth;
pub mod resources;
pub mod wizards;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(auth::healthz))
        .route("/", get(auth::index))
        .route("/login", get(auth::login_page).post(auth::login_submit))
        .route("/logout", get(auth::logout))
        .route("/dashboard", get(auth::dashboard))
        .route("/resources/:name", get(resources::list_page))
        .route("/resources/:name/create", post(resources::create))
        .route("/resources/:name/update", post(resources::update))
        .route("/resources/:name/delete", post(resources::delete))
        .route("/documents/upload", post(resources::upload_document))
        .route(
            "/wizard/:name",
            get(wizards::show_step).post(wizards::submit),
        )
        .route("/api/:name", get(api::list_resource))
        // Leave headroom above the forwarded-file cap for multipart framing.
        .layer(DefaultBodyLimit::max(resources::MAX_UPLOAD_BYTES + 64 * 1024))
        .with_state(state)
}

/// A resolved session for the current request. `fresh` means the id was
/// minted during this request and the response must carry a `Set-Cookie`.
pub struct SessionHandle {
    pub id: String,
    fresh: bool,
}

pub async fn attach_session(state: &AppState, headers: &HeaderMap) -> SessionHandle {
    if let Some(id) = cookies::session_id_from_headers(&state.secret, headers) {
        if state.sessions.exists(&id).await {
            return SessionHandle { id, fresh: false };
        }
    }
    SessionHandle {
        id: state.sessions.create().await,
        fresh: true,
    }
}

/// Attaches the session cookie to a response when the session was created
/// during this request.
pub fn with_cookie(state: &AppState, handle: &SessionHandle, mut response: Response) -> Response {
    if handle.fresh {
        response.headers_mut().append(
            header::SET_COOKIE,
            cookies::set_cookie_value(&state.secret, &handle.id),
        );
    }
    response
}

/// Page-route guard: unauthenticated access becomes a flashed redirect to
/// the login page, never a raw 401.
pub async fn require_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(SessionHandle, Identity), Response> {
    let handle = attach_session(state, headers).await;
    match state.sessions.identity(&handle.id).await {
        Some(identity) => Ok((handle, identity)),
        None => {
            state
                .sessions
                .push_flash(&handle.id, Flash::error("Please sign in to continue."))
                .await;
            let redirect = Redirect::to("/login").into_response();
            Err(with_cookie(state, &handle, redirect))
        }
    }
}

/// Flash-then-redirect, the standard failure path for browser routes.
pub async fn flash_redirect(
    state: &AppState,
    handle: &SessionHandle,
    flash: Flash,
    location: &str,
) -> Response {
    state.sessions.push_flash(&handle.id, flash).await;
    with_cookie(state, handle, Redirect::to(location).into_response())
}
