use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use session::{wizard, Flash, StepOutcome};
use tracing::info;
use upstream::Method;

use crate::{
    app_state::AppState,
    routes::{flash_redirect, require_identity, with_cookie},
    views,
};

#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    pub step: Option<u32>,
}

fn wizard_location(name: &str, step: u32) -> String {
    format!("/wizard/{name}?step={step}")
}

pub async fn show_step(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ShowQuery>,
    headers: HeaderMap,
) -> Response {
    let (handle, _identity) = match require_identity(&state, &headers).await {
        Ok(authenticated) => authenticated,
        Err(redirect) => return redirect,
    };
    let Some(def) = wizard::find(&name) else {
        return flash_redirect(&state, &handle, Flash::error("Unknown wizard."), "/dashboard")
            .await;
    };

    // GET is a pure read: it never moves the step counter, and a request
    // for a step the user has not reached renders the current one.
    let wizard_state = match state.sessions.wizard(&handle.id, def.key).await {
        Some(existing) => existing,
        None => {
            let fresh = def.begin();
            state.sessions.put_wizard(&handle.id, def.key, fresh.clone()).await;
            fresh
        }
    };
    let step = def.render_step(&wizard_state, query.step);

    let flashes = state.sessions.drain_flashes(&handle.id).await;
    let body = views::wizard_step(def.key, step, def.steps, &wizard_state.fields);
    let page = views::page(def.key, &flashes, &body).into_response();
    with_cookie(&state, &handle, page)
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (handle, identity) = match require_identity(&state, &headers).await {
        Ok(authenticated) => authenticated,
        Err(redirect) => return redirect,
    };
    let Some(def) = wizard::find(&name) else {
        return flash_redirect(&state, &handle, Flash::error("Unknown wizard."), "/dashboard")
            .await;
    };

    let mut wizard_state = match state.sessions.wizard(&handle.id, def.key).await {
        Some(existing) => existing,
        None => def.begin(),
    };

    match form.get("action").map(String::as_str) {
        Some("cancel") => {
            state.sessions.remove_wizard(&handle.id, def.key).await;
            return flash_redirect(
                &state,
                &handle,
                Flash::info("The form was discarded."),
                "/dashboard",
            )
            .await;
        }
        Some("back") => {
            def.step_back(&mut wizard_state);
            let step = wizard_state.step;
            state.sessions.put_wizard(&handle.id, def.key, wizard_state).await;
            return with_cookie(
                &state,
                &handle,
                axum::response::Redirect::to(&wizard_location(def.key, step)).into_response(),
            );
        }
        _ => {}
    }

    let Some(step) = form.get("step").and_then(|raw| raw.parse::<u32>().ok()) else {
        return flash_redirect(
            &state,
            &handle,
            Flash::error("The form did not carry a step number."),
            &wizard_location(def.key, wizard_state.step),
        )
        .await;
    };

    let fields: Map<String, Value> = form
        .iter()
        .filter(|(key, _)| key.as_str() != "step" && key.as_str() != "action")
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();

    match def.submit_step(&mut wizard_state, step, fields) {
        StepOutcome::OutOfSequence { current } => {
            flash_redirect(
                &state,
                &handle,
                Flash::error("Finish the current step before moving ahead."),
                &wizard_location(def.key, current),
            )
            .await
        }
        StepOutcome::Advanced { next } => {
            state.sessions.put_wizard(&handle.id, def.key, wizard_state).await;
            with_cookie(
                &state,
                &handle,
                axum::response::Redirect::to(&wizard_location(def.key, next)).into_response(),
            )
        }
        StepOutcome::ReadyToCommit { payload } => {
            match state
                .upstream
                .call(
                    Method::POST,
                    def.commit_path,
                    Some(&identity.token),
                    Some(&payload),
                )
                .await
            {
                Ok(_) => {
                    info!(wizard = def.key, "wizard committed");
                    state.sessions.remove_wizard(&handle.id, def.key).await;
                    flash_redirect(
                        &state,
                        &handle,
                        Flash::success("All steps saved."),
                        "/dashboard",
                    )
                    .await
                }
                Err(failure) => {
                    // Keep the accumulated fields so the user can retry
                    // the final step without re-entering anything.
                    state
                        .sessions
                        .put_wizard(&handle.id, def.key, wizard_state)
                        .await;
                    flash_redirect(
                        &state,
                        &handle,
                        Flash::error(failure.user_message()),
                        &wizard_location(def.key, def.steps),
                    )
                    .await
                }
            }
        }
    }
}
