use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use axum::{
    body::{self, Body},
    extract::State,
    http::{header, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use session::SessionStore;
use tower::ServiceExt;
use upstream::UpstreamClient;

use super::*;

#[derive(Default)]
struct UpstreamStub {
    commits: Mutex<Vec<Value>>,
    failed_commits: AtomicUsize,
    fail_next_commit: AtomicBool,
}

async fn stub_login(Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if body["email"] == "carmen@univ.edu" && body["password"] == "s3nh4" {
        Ok(Json(json!({
            "token": "tok-1",
            "usuario": { "id": 7, "nome": "Carmen", "tipo": "coordenador" }
        })))
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn stub_commit(
    State(stub): State<Arc<UpstreamStub>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if stub.fail_next_commit.swap(false, Ordering::SeqCst) {
        stub.failed_commits.fetch_add(1, Ordering::SeqCst);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    stub.commits.lock().expect("lock").push(body);
    Ok(Json(json!({ "id": 99 })))
}

async fn spawn_upstream_stub(stub: Arc<UpstreamStub>) -> String {
    let router = Router::new()
        .route("/login", post(stub_login))
        .route(
            "/disciplinas",
            get(|| async { Json(json!({ "data": [{ "id": 1, "nome": "Algorithms", "area": "CS" }] })) }),
        )
        .route(
            "/avisos",
            get(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "required_role": "coordenador" })),
                )
            }),
        )
        .route("/ofertas", post(stub_commit))
        .route("/estagios", post(stub_commit))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve stub");
    });
    format!("http://{addr}")
}

async fn test_app() -> (Router, Arc<UpstreamStub>) {
    let stub = Arc::new(UpstreamStub::default());
    let base_url = spawn_upstream_stub(stub.clone()).await;
    let state = AppState {
        upstream: UpstreamClient::new(base_url),
        sessions: SessionStore::default(),
        secret: "test-secret".into(),
    };
    (routes::build_router(Arc::new(state)), stub)
}

fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(
        header::CONTENT_TYPE,
        "application/x-www-form-urlencoded",
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

fn session_cookie(response: &axum::response::Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie")
        .to_str()
        .expect("cookie str");
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location")
        .to_str()
        .expect("location str")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(form_request(
            "/login",
            "email=carmen%40univ.edu&senha=s3nh4",
            None,
        ))
        .await
        .expect("login response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    session_cookie(&response)
}

#[tokio::test]
async fn login_success_reaches_dashboard_with_identity() {
    let (app, _stub) = test_app().await;
    let cookie = login(&app).await;

    let response = app
        .oneshot(get_request("/dashboard", Some(&cookie)))
        .await
        .expect("dashboard");
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Carmen"));
    assert!(page.contains("coordinator"));
}

#[tokio::test]
async fn login_rejection_flashes_and_keeps_session_anonymous() {
    let (app, _stub) = test_app().await;

    let response = app
        .clone()
        .oneshot(form_request(
            "/login",
            "email=carmen%40univ.edu&senha=wrong",
            None,
        ))
        .await
        .expect("login response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    let cookie = session_cookie(&response);

    let login_page = app
        .clone()
        .oneshot(get_request("/login", Some(&cookie)))
        .await
        .expect("login page");
    let page = body_text(login_page).await;
    assert!(page.contains("Invalid email or password"));

    // The session never received an identity: protected pages bounce.
    let dashboard = app
        .oneshot(get_request("/dashboard", Some(&cookie)))
        .await
        .expect("dashboard");
    assert_eq!(dashboard.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&dashboard), "/login");
}

#[tokio::test]
async fn unauthenticated_page_access_redirects_instead_of_401() {
    let (app, _stub) = test_app().await;
    let response = app
        .oneshot(get_request("/resources/professors", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn offering_wizard_commits_the_union_of_all_steps_exactly_once() {
    let (app, stub) = test_app().await;
    let cookie = login(&app).await;

    let step1 = app
        .clone()
        .oneshot(form_request(
            "/wizard/offering",
            "step=1&nome=Algorithms&codigo=CS101",
            Some(&cookie),
        ))
        .await
        .expect("step 1");
    assert_eq!(step1.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&step1), "/wizard/offering?step=2");

    // A read of step 2 still shows the step-1 fields.
    let render = app
        .clone()
        .oneshot(get_request("/wizard/offering?step=2", Some(&cookie)))
        .await
        .expect("render step 2");
    let page = body_text(render).await;
    assert!(page.contains("Algorithms"));
    assert!(page.contains("CS101"));

    for body in ["step=2&turno=noturno", "step=3&vagas=40"] {
        let response = app
            .clone()
            .oneshot(form_request("/wizard/offering", body, Some(&cookie)))
            .await
            .expect("middle step");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    let commit = app
        .clone()
        .oneshot(form_request(
            "/wizard/offering",
            "step=4&semestre=2026.1",
            Some(&cookie),
        ))
        .await
        .expect("commit");
    assert_eq!(commit.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&commit), "/dashboard");

    let commits = stub.commits.lock().expect("lock");
    assert_eq!(commits.len(), 1);
    assert_eq!(
        commits[0],
        json!({
            "nome": "Algorithms",
            "codigo": "CS101",
            "turno": "noturno",
            "vagas": "40",
            "semestre": "2026.1",
        })
    );
    drop(commits);

    // Committed state is gone: the wizard restarts at step 1.
    let fresh = app
        .oneshot(get_request("/wizard/offering", Some(&cookie)))
        .await
        .expect("fresh wizard");
    let page = body_text(fresh).await;
    assert!(page.contains("step 1 of 4"));
    assert!(!page.contains("Algorithms"));
}

#[tokio::test]
async fn skipping_ahead_in_a_wizard_is_rejected() {
    let (app, stub) = test_app().await;
    let cookie = login(&app).await;

    let response = app
        .clone()
        .oneshot(form_request(
            "/wizard/offering",
            "step=4&semestre=2026.1",
            Some(&cookie),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/wizard/offering?step=1");
    assert!(stub.commits.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn cancelling_a_wizard_discards_accumulated_state() {
    let (app, stub) = test_app().await;
    let cookie = login(&app).await;

    let step1 = app
        .clone()
        .oneshot(form_request(
            "/wizard/offering",
            "step=1&nome=Algorithms&codigo=CS101",
            Some(&cookie),
        ))
        .await
        .expect("step 1");
    assert_eq!(step1.status(), StatusCode::SEE_OTHER);

    let cancelled = app
        .clone()
        .oneshot(form_request("/wizard/offering", "action=cancel", Some(&cookie)))
        .await
        .expect("cancel");
    assert_eq!(cancelled.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&cancelled), "/dashboard");

    let dashboard = app
        .clone()
        .oneshot(get_request("/dashboard", Some(&cookie)))
        .await
        .expect("dashboard");
    let page = body_text(dashboard).await;
    assert!(page.contains("The form was discarded."));

    // Nothing reached the upstream and the wizard restarts from scratch.
    assert!(stub.commits.lock().expect("lock").is_empty());
    let fresh = app
        .oneshot(get_request("/wizard/offering", Some(&cookie)))
        .await
        .expect("fresh wizard");
    let page = body_text(fresh).await;
    assert!(page.contains("step 1 of 4"));
    assert!(!page.contains("Algorithms"));
}

#[tokio::test]
async fn stepping_back_keeps_fields_and_rerenders_the_earlier_step() {
    let (app, _stub) = test_app().await;
    let cookie = login(&app).await;

    let step1 = app
        .clone()
        .oneshot(form_request(
            "/wizard/offering",
            "step=1&nome=Algorithms",
            Some(&cookie),
        ))
        .await
        .expect("step 1");
    assert_eq!(location(&step1), "/wizard/offering?step=2");

    let back = app
        .clone()
        .oneshot(form_request("/wizard/offering", "action=back", Some(&cookie)))
        .await
        .expect("back");
    assert_eq!(back.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&back), "/wizard/offering?step=1");

    let render = app
        .oneshot(get_request("/wizard/offering?step=1", Some(&cookie)))
        .await
        .expect("render");
    let page = body_text(render).await;
    assert!(page.contains("step 1 of 4"));
    assert!(page.contains("Algorithms"));
    // The step form is submittable as rendered.
    assert!(page.contains("<button type=\"submit\">Continue</button>"));
    assert!(page.contains("name=\"action\" value=\"cancel\""));
}

#[tokio::test]
async fn failed_commit_keeps_wizard_state_for_retry() {
    let (app, stub) = test_app().await;
    let cookie = login(&app).await;

    let step1 = app
        .clone()
        .oneshot(form_request(
            "/wizard/internship",
            "step=1&empresa=ACME",
            Some(&cookie),
        ))
        .await
        .expect("step 1");
    assert_eq!(step1.status(), StatusCode::SEE_OTHER);

    stub.fail_next_commit.store(true, Ordering::SeqCst);
    let failed = app
        .clone()
        .oneshot(form_request(
            "/wizard/internship",
            "step=2&supervisor=Dr.+Silva",
            Some(&cookie),
        ))
        .await
        .expect("failed commit");
    assert_eq!(failed.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&failed), "/wizard/internship?step=2");
    assert_eq!(stub.failed_commits.load(Ordering::SeqCst), 1);
    assert!(stub.commits.lock().expect("lock").is_empty());

    // Nothing was lost: the earlier step's fields are still rendered.
    let render = app
        .clone()
        .oneshot(get_request("/wizard/internship?step=2", Some(&cookie)))
        .await
        .expect("render");
    let page = body_text(render).await;
    assert!(page.contains("ACME"));

    // Manual retry succeeds and the upstream sees the full union.
    let retried = app
        .clone()
        .oneshot(form_request(
            "/wizard/internship",
            "step=2&supervisor=Dr.+Silva",
            Some(&cookie),
        ))
        .await
        .expect("retry");
    assert_eq!(location(&retried), "/dashboard");

    let commits = stub.commits.lock().expect("lock");
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0]["empresa"], "ACME");
    assert_eq!(commits[0]["supervisor"], "Dr. Silva");
}

#[tokio::test]
async fn api_list_normalizes_wrapped_upstream_arrays() {
    let (app, _stub) = test_app().await;
    let cookie = login(&app).await;

    let response = app
        .oneshot(get_request("/api/disciplines", Some(&cookie)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let entities: Value =
        serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(entities[0]["id"], "1");
    assert_eq!(entities[0]["name"], "Algorithms");
    assert_eq!(entities[0]["category"], "CS");
}

#[tokio::test]
async fn api_errors_mirror_the_upstream_status() {
    let (app, _stub) = test_app().await;

    // Without a session the front-end answers 401 itself.
    let anonymous = app
        .clone()
        .oneshot(get_request("/api/disciplines", None))
        .await
        .expect("response");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let cookie = login(&app).await;
    let forbidden = app
        .clone()
        .oneshot(get_request("/api/notices", Some(&cookie)))
        .await
        .expect("response");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    let body: Value = serde_json::from_str(&body_text(forbidden).await).expect("json");
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("coordenador"));

    let unknown = app
        .oneshot(get_request("/api/nonsense", Some(&cookie)))
        .await
        .expect("response");
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_clears_the_session() {
    let (app, _stub) = test_app().await;
    let cookie = login(&app).await;

    let logout = app
        .clone()
        .oneshot(get_request("/logout", Some(&cookie)))
        .await
        .expect("logout");
    assert_eq!(logout.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&logout), "/login");

    let dashboard = app
        .oneshot(get_request("/dashboard", Some(&cookie)))
        .await
        .expect("dashboard");
    assert_eq!(dashboard.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&dashboard), "/login");
}
