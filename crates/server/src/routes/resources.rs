use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Form,
};
use serde_json::{Map, Value};
use session::Flash;
use shared::error::UpstreamFailure;
use upstream::{ListKeys, Method, UpstreamClient};

use crate::{
    app_state::AppState,
    routes::{flash_redirect, require_identity, with_cookie},
    views,
};

/// One proxied upstream resource. `candidates` exists because the
/// upstream's route table is not reliably documented: when more than one
/// suffix is plausible the adapter probes them once and remembers the
/// winner.
pub struct Resource {
    pub name: &'static str,
    pub title: &'static str,
    pub candidates: &'static [&'static str],
    pub default_path: &'static str,
    pub keys: ListKeys,
}

pub const RESOURCES: &[Resource] = &[
    Resource {
        name: "professors",
        title: "Professors",
        candidates: &["/professores", "/docentes"],
        default_path: "/professores",
        keys: ListKeys {
            wrappers: &["professores", "docentes"],
            id: &["professor_id"],
            name: &["nome_completo", "nome"],
            category: &["departamento"],
        },
    },
    Resource {
        name: "disciplines",
        title: "Disciplines",
        candidates: &["/disciplinas", "/materias"],
        default_path: "/disciplinas",
        keys: ListKeys {
            wrappers: &["disciplinas", "materias"],
            id: &["disciplina_id", "materia_id"],
            name: &["nome"],
            category: &["area"],
        },
    },
    Resource {
        name: "notices",
        title: "Notices",
        candidates: &["/avisos"],
        default_path: "/avisos",
        keys: ListKeys {
            wrappers: &["avisos"],
            id: &["aviso_id"],
            name: &["titulo"],
            category: &["categoria"],
        },
    },
    Resource {
        name: "schedules",
        title: "Schedules",
        candidates: &["/quadros", "/horarios"],
        default_path: "/quadros",
        keys: ListKeys {
            wrappers: &["quadros", "horarios"],
            id: &["quadro_id"],
            name: &["nome", "turma"],
            category: &["turno"],
        },
    },
    Resource {
        name: "evaluations",
        title: "Evaluations",
        candidates: &["/avaliacoes"],
        default_path: "/avaliacoes",
        keys: ListKeys {
            wrappers: &["avaliacoes"],
            id: &["avaliacao_id"],
            name: &["titulo"],
            category: &["tipo"],
        },
    },
    Resource {
        name: "knowledge",
        title: "Knowledge base",
        candidates: &["/base_conhecimento", "/conhecimentos"],
        default_path: "/base_conhecimento",
        keys: ListKeys {
            wrappers: &["artigos", "conhecimentos"],
            id: &["artigo_id"],
            name: &["titulo"],
            category: &["categoria"],
        },
    },
    Resource {
        name: "messages",
        title: "Student messages",
        candidates: &["/mensagens", "/recados"],
        default_path: "/mensagens",
        keys: ListKeys {
            wrappers: &["mensagens", "recados"],
            id: &["mensagem_id"],
            name: &["assunto", "titulo"],
            category: &["remetente"],
        },
    },
];

pub fn find(name: &str) -> Option<&'static Resource> {
    RESOURCES.iter().find(|resource| resource.name == name)
}

/// Resolves the upstream path for a resource, probing only when more than
/// one candidate is plausible.
pub async fn resolved_path(client: &UpstreamClient, resource: &Resource) -> String {
    if resource.candidates.len() <= 1 {
        resource.default_path.to_string()
    } else {
        client
            .probe_endpoint(resource.name, resource.candidates, resource.default_path)
            .await
    }
}

fn list_location(resource: &Resource) -> String {
    format!("/resources/{}", resource.name)
}

pub async fn list_page(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let (handle, identity) = match require_identity(&state, &headers).await {
        Ok(authenticated) => authenticated,
        Err(redirect) => return redirect,
    };
    let Some(resource) = find(&name) else {
        return flash_redirect(
            &state,
            &handle,
            Flash::error("Unknown resource."),
            "/dashboard",
        )
        .await;
    };

    let path = resolved_path(&state.upstream, resource).await;
    match state
        .upstream
        .call(Method::GET, &path, Some(&identity.token), None)
        .await
    {
        Ok(raw) => {
            let entities = upstream::normalize_list(&raw, &resource.keys);
            let flashes = state.sessions.drain_flashes(&handle.id).await;
            let body = format!(
                "<h1>{}</h1>\n{}",
                resource.title,
                views::entity_table(&entities)
            );
            let page = views::page(resource.title, &flashes, &body).into_response();
            with_cookie(&state, &handle, page)
        }
        Err(UpstreamFailure::Unauthorized) => {
            state.sessions.destroy(&handle.id).await;
            flash_redirect(
                &state,
                &handle,
                Flash::error(UpstreamFailure::Unauthorized.user_message()),
                "/login",
            )
            .await
        }
        Err(failure) => {
            flash_redirect(
                &state,
                &handle,
                Flash::error(failure.user_message()),
                "/dashboard",
            )
            .await
        }
    }
}

fn form_payload(form: &HashMap<String, String>, skip: &[&str]) -> Value {
    let fields: Map<String, Value> = form
        .iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    Value::Object(fields)
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (handle, identity) = match require_identity(&state, &headers).await {
        Ok(authenticated) => authenticated,
        Err(redirect) => return redirect,
    };
    let Some(resource) = find(&name) else {
        return flash_redirect(
            &state,
            &handle,
            Flash::error("Unknown resource."),
            "/dashboard",
        )
        .await;
    };

    let path = resolved_path(&state.upstream, resource).await;
    let payload = form_payload(&form, &[]);
    let flash = match state
        .upstream
        .call(Method::POST, &path, Some(&identity.token), Some(&payload))
        .await
    {
        Ok(_) => Flash::success(format!("{} record created.", resource.title)),
        Err(failure) => Flash::error(failure.user_message()),
    };
    flash_redirect(&state, &handle, flash, &list_location(resource)).await
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (handle, identity) = match require_identity(&state, &headers).await {
        Ok(authenticated) => authenticated,
        Err(redirect) => return redirect,
    };
    let Some(resource) = find(&name) else {
        return flash_redirect(
            &state,
            &handle,
            Flash::error("Unknown resource."),
            "/dashboard",
        )
        .await;
    };
    let Some(id) = form.get("id").filter(|id| !id.trim().is_empty()) else {
        return flash_redirect(
            &state,
            &handle,
            Flash::error("The form did not carry a record id."),
            &list_location(resource),
        )
        .await;
    };

    let path = format!("{}/{}", resolved_path(&state.upstream, resource).await, id);
    let payload = form_payload(&form, &["id"]);
    let flash = match state
        .upstream
        .call(Method::PUT, &path, Some(&identity.token), Some(&payload))
        .await
    {
        Ok(_) => Flash::success(format!("{} record updated.", resource.title)),
        Err(failure) => Flash::error(failure.user_message()),
    };
    flash_redirect(&state, &handle, flash, &list_location(resource)).await
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (handle, identity) = match require_identity(&state, &headers).await {
        Ok(authenticated) => authenticated,
        Err(redirect) => return redirect,
    };
    let Some(resource) = find(&name) else {
        return flash_redirect(
            &state,
            &handle,
            Flash::error("Unknown resource."),
            "/dashboard",
        )
        .await;
    };
    let Some(id) = form.get("id").filter(|id| !id.trim().is_empty()) else {
        return flash_redirect(
            &state,
            &handle,
            Flash::error("The form did not carry a record id."),
            &list_location(resource),
        )
        .await;
    };

    let path = format!("{}/{}", resolved_path(&state.upstream, resource).await, id);
    let flash = match state
        .upstream
        .call(Method::DELETE, &path, Some(&identity.token), None)
        .await
    {
        Ok(_) => Flash::success(format!("{} record removed.", resource.title)),
        // A record already gone is not worth an error on a delete.
        Err(UpstreamFailure::NotFound) => {
            Flash::info("The record was already gone.".to_string())
        }
        Err(failure) => Flash::error(failure.user_message()),
    };
    flash_redirect(&state, &handle, flash, &list_location(resource)).await
}

const UPLOAD_PATH_CANDIDATES: &[&str] = &["/documentos/upload", "/documentos", "/uploads"];
const UPLOAD_DEFAULT_PATH: &str = "/documentos/upload";
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let (handle, identity) = match require_identity(&state, &headers).await {
        Ok(authenticated) => authenticated,
        Err(redirect) => return redirect,
    };

    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut extra_fields: Vec<(String, String)> = Vec::new();
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let field_name = field.name().unwrap_or("arquivo").to_string();
                if let Some(filename) = field.file_name().map(str::to_string) {
                    match field.bytes().await {
                        Ok(bytes) if bytes.len() <= MAX_UPLOAD_BYTES => {
                            file = Some((field_name, filename, bytes.to_vec()));
                        }
                        _ => {
                            return flash_redirect(
                                &state,
                                &handle,
                                Flash::error("The file is too large to forward."),
                                "/dashboard",
                            )
                            .await;
                        }
                    }
                } else if let Ok(text) = field.text().await {
                    extra_fields.push((field_name, text));
                }
            }
            Ok(None) => break,
            Err(_) => {
                return flash_redirect(
                    &state,
                    &handle,
                    Flash::error("The upload form could not be read."),
                    "/dashboard",
                )
                .await;
            }
        }
    }

    let Some((field_name, filename, bytes)) = file else {
        return flash_redirect(
            &state,
            &handle,
            Flash::error("No file was attached."),
            "/dashboard",
        )
        .await;
    };

    let path = state
        .upstream
        .probe_endpoint("document_upload", UPLOAD_PATH_CANDIDATES, UPLOAD_DEFAULT_PATH)
        .await;
    let flash = match state
        .upstream
        .upload(
            &path,
            Some(&identity.token),
            &field_name,
            &filename,
            bytes,
            &extra_fields,
        )
        .await
    {
        Ok(_) => Flash::success(format!("Document '{filename}' uploaded.")),
        Err(failure) => Flash::error(failure.user_message()),
    };
    flash_redirect(&state, &handle, flash, "/dashboard").await
}
