use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use serde_json::json;
use session::Flash;
use shared::error::UpstreamFailure;
use tracing::info;
use upstream::Method;

use crate::{
    app_state::AppState,
    routes::{attach_session, flash_redirect, require_identity, with_cookie},
    views,
};

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let handle = attach_session(&state, &headers).await;
    let target = if state.sessions.identity(&handle.id).await.is_some() {
        "/dashboard"
    } else {
        "/login"
    };
    with_cookie(&state, &handle, Redirect::to(target).into_response())
}

pub async fn login_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let handle = attach_session(&state, &headers).await;
    let flashes = state.sessions.drain_flashes(&handle.id).await;
    let body = "<form method=\"post\" action=\"/login\">\n\
         <input name=\"email\" type=\"email\">\n\
         <input name=\"senha\" type=\"password\">\n\
         <button type=\"submit\">Sign in</button>\n</form>";
    let page = views::page("Sign in", &flashes, body).into_response();
    with_cookie(&state, &handle, page)
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    // The upstream's own forms say "senha"; accept both spellings.
    pub senha: Option<String>,
    pub password: Option<String>,
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let handle = attach_session(&state, &headers).await;
    let password = form.senha.or(form.password).unwrap_or_default();
    let payload = json!({ "email": form.email, "password": password });

    let outcome = state
        .upstream
        .call(Method::POST, "/login", None, Some(&payload))
        .await
        .and_then(|raw| upstream::parse_identity(&raw));

    match outcome {
        Ok(identity) => {
            info!(user = %identity.display_name, role = identity.role.label(), "login accepted");
            let welcome = format!("Welcome, {}!", identity.display_name);
            state.sessions.set_identity(&handle.id, identity).await;
            flash_redirect(&state, &handle, Flash::success(welcome), "/dashboard").await
        }
        Err(UpstreamFailure::Unauthorized) => {
            flash_redirect(
                &state,
                &handle,
                Flash::error("Invalid email or password. Check your credentials and try again."),
                "/login",
            )
            .await
        }
        Err(failure) => {
            flash_redirect(&state, &handle, Flash::error(failure.user_message()), "/login").await
        }
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let handle = attach_session(&state, &headers).await;
    state.sessions.destroy(&handle.id).await;
    let mut response = Redirect::to("/login").into_response();
    response.headers_mut().append(
        axum::http::header::SET_COOKIE,
        crate::cookies::clear_cookie_value(),
    );
    response
}

pub async fn dashboard(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (handle, identity) = match require_identity(&state, &headers).await {
        Ok(authenticated) => authenticated,
        Err(redirect) => return redirect,
    };
    let flashes = state.sessions.drain_flashes(&handle.id).await;
    let body = format!(
        "<h1>Dashboard</h1>\n<p>Signed in as {} ({})</p>\n",
        identity.display_name,
        identity.role.label()
    );
    let page = views::page("Dashboard", &flashes, &body).into_response();
    with_cookie(&state, &handle, page)
}
