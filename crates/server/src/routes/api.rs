use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use shared::{
    domain::CanonicalEntity,
    error::{ApiError, ErrorCode},
};
use upstream::Method;

use crate::{
    app_state::AppState,
    routes::{attach_session, resources},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// JSON list endpoint. Unlike the page routes this surface answers with
/// structured errors and mirrored status codes instead of redirects.
pub async fn list_resource(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Vec<CanonicalEntity>> {
    let handle = attach_session(&state, &headers).await;
    let Some(identity) = state.sessions.identity(&handle.id).await else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new(ErrorCode::Unauthorized, "not signed in")),
        ));
    };
    let Some(resource) = resources::find(&name) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(ErrorCode::NotFound, "unknown resource")),
        ));
    };

    let path = resources::resolved_path(&state.upstream, resource).await;
    let raw = state
        .upstream
        .call(Method::GET, &path, Some(&identity.token), None)
        .await
        .map_err(|failure| {
            let status = StatusCode::from_u16(failure.status())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(ApiError::from(&failure)))
        })?;

    Ok(Json(upstream::normalize_list(&raw, &resource.keys)))
}
