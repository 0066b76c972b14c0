use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use picfest_api::guest::WizardRegistry;
use picfest_api::{AppStateInner, build_router};
use picfest_db::Database;
use picfest_gateway::LiveConfig;
use picfest_types::models::Role;

const FILES_URL: &str = "http://localhost:3000/files";
const BOUNDARY: &str = "picfest-test-boundary";

struct TestApp {
    router: Router,
    db: Arc<Database>,
    storage: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.storage);
    }
}

fn app() -> TestApp {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let storage = std::env::temp_dir().join(format!("picfest-api-{}", Uuid::new_v4()));
    let platform = picfest_platform::local::platform(
        db.clone(),
        "test-secret".into(),
        storage.clone(),
        FILES_URL,
    );
    let state = AppStateInner::new(
        platform,
        LiveConfig::default(),
        WizardRegistry::new(Duration::from_secs(1800)),
        10 * 1024 * 1024,
    );
    TestApp {
        router: build_router(state, Some(storage.clone())),
        db,
        storage,
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn file_request(uri: &str, token: Option<&str>, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("PUT")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

async fn send_raw(app: &TestApp, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, bytes)
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send_raw(app, req).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Register through the API and return (user id, token).
async fn register(app: &TestApp, email: &str, role: &str) -> (String, String) {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": email, "password": "segredo123", "nome": "Ana", "role": role })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["user"]["id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn register_admin(app: &TestApp) -> String {
    let (id, token) = register(app, "admin@picfest.com", "organizador").await;
    assert!(app.db.set_profile_role(&id, Role::Admin).unwrap());
    token
}

async fn create_event(app: &TestApp, token: &str, moderation: bool) -> Value {
    let (status, event) = send(
        app,
        json_request(
            "POST",
            "/dashboard/events",
            Some(token),
            Some(json!({ "nome": "Casamento", "slug_curto": "", "moderacao_ativa": moderation })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", event);
    event
}

/// Walk a guest through steps 1-3 and return the session's base path.
async fn guest_ready_to_submit(app: &TestApp, slug: &str, show_on_screen: bool) -> String {
    let (status, view) = send(
        app,
        json_request("POST", &format!("/guest/{}/sessions", slug.to_lowercase()), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", view);
    let session = view["session_id"].as_str().unwrap().to_string();
    let base = format!("/guest/sessions/{}", session);

    let (status, _) = send(
        app,
        json_request(
            "PUT",
            &format!("{}/profile", base),
            None,
            Some(json!({ "nome": "Bia", "email": "bia@festa.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app, json_request("POST", &format!("{}/proceed", base), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        app,
        file_request(&format!("{}/media", base), None, "bolo.jpg", "image/jpeg", b"fake-jpeg"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        app,
        json_request(
            "PUT",
            &format!("{}/caption", base),
            None,
            Some(json!({ "legenda": "Parabéns!", "show_on_screen": show_on_screen })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    base
}

/// Walk a guest through steps 1-3 and submit one photo.
async fn guest_uploads(app: &TestApp, slug: &str, show_on_screen: bool) -> (StatusCode, Value) {
    let base = guest_ready_to_submit(app, slug, show_on_screen).await;
    send(app, json_request("POST", &format!("{}/submit", base), None, None)).await
}

#[tokio::test]
async fn guest_upload_reaches_the_live_snapshot() {
    let app = app();
    let (_, token) = register(&app, "org@festa.com", "organizador").await;
    let event = create_event(&app, &token, false).await;
    let slug = event["slug_curto"].as_str().unwrap();
    assert_eq!(slug.len(), 6);

    let (status, view) = guest_uploads(&app, slug, true).await;
    assert_eq!(status, StatusCode::OK, "{}", view);
    assert_eq!(view["step"], 4);
    assert_eq!(view["uploaded"]["aprovado"], true);
    assert!(view["media"].is_null());

    let url = view["uploaded"]["url"].as_str().unwrap();
    assert!(url.starts_with(&format!("{}/eventos/", FILES_URL)));

    // Submitting again from the final step is refused
    let session = view["session_id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        json_request("POST", &format!("/guest/sessions/{}/submit", session), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, snapshot) = send(&app, json_request("GET", &format!("/live/{}", slug), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let media = snapshot["media"].as_array().unwrap();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0]["legenda"], "Parabéns!");
    assert_eq!(media[0]["perfil"]["nome"], "Bia");

    let file_path = url.trim_start_matches("http://localhost:3000");
    let (status, bytes) = send_raw(&app, json_request("GET", file_path, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..], b"fake-jpeg");
}

#[tokio::test]
async fn dropped_submit_request_still_settles_the_wizard() {
    let app = app();
    let (_, token) = register(&app, "org@festa.com", "organizador").await;
    let event = create_event(&app, &token, false).await;
    let slug = event["slug_curto"].as_str().unwrap();
    let base = guest_ready_to_submit(&app, slug, true).await;
    let submit = || json_request("POST", &format!("{}/submit", base), None, None);

    // The guest's connection goes away before the response is written
    let pending = app.router.clone().oneshot(submit());
    let _ = tokio::time::timeout(Duration::from_micros(1), pending).await;

    let mut view = Value::Null;
    for _ in 0..200 {
        let (status, current) = send(&app, json_request("GET", &base, None, None)).await;
        assert_eq!(status, StatusCode::OK, "{}", current);
        view = current;
        if view["submitting"] == false {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(view["submitting"], false, "{}", view);

    // Either the upload finished on its own or a retry is accepted
    if view["step"] == 3 {
        let (status, retried) = send(&app, submit()).await;
        assert_eq!(status, StatusCode::OK, "{}", retried);
        view = retried;
    }
    assert_eq!(view["step"], 4, "{}", view);

    let (_, snapshot) = send(&app, json_request("GET", &format!("/live/{}", slug), None, None)).await;
    assert_eq!(snapshot["media"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn incomplete_profile_keeps_the_guest_on_step_one() {
    let app = app();
    let (_, token) = register(&app, "org@festa.com", "organizador").await;
    let event = create_event(&app, &token, false).await;
    let slug = event["slug_curto"].as_str().unwrap();

    let (_, view) = send(&app, json_request("POST", &format!("/guest/{}/sessions", slug), None, None)).await;
    let base = format!("/guest/sessions/{}", view["session_id"].as_str().unwrap());

    let (status, body) = send(&app, json_request("POST", &format!("{}/proceed", base), None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    let (_, view) = send(&app, json_request("GET", &base, None, None)).await;
    assert_eq!(view["step"], 1);
    assert_eq!(view["can_proceed"], false);

    // Not a photo or video
    send(
        &app,
        json_request("PUT", &format!("{}/profile", base), None, Some(json!({ "nome": "Bia", "email": "bia@festa.com" }))),
    )
    .await;
    send(&app, json_request("POST", &format!("{}/proceed", base), None, None)).await;
    let (status, _) = send(
        &app,
        file_request(&format!("{}/media", base), None, "notes.txt", "text/plain", b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, json_request("DELETE", &base, None, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, json_request("GET", &base, None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn moderated_events_hold_media_until_approved() {
    let app = app();
    let (_, token) = register(&app, "org@festa.com", "organizador").await;
    let event = create_event(&app, &token, true).await;
    let slug = event["slug_curto"].as_str().unwrap();
    let event_id = event["id"].as_str().unwrap();

    let (status, view) = guest_uploads(&app, slug, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["uploaded"]["aprovado"], false);
    let media_id = view["uploaded"]["id"].as_str().unwrap();

    let (_, snapshot) = send(&app, json_request("GET", &format!("/live/{}", slug), None, None)).await;
    assert!(snapshot["media"].as_array().unwrap().is_empty());

    let (_, pending) = send(
        &app,
        json_request("GET", &format!("/dashboard/events/{}/media", event_id), Some(&token), None),
    )
    .await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/dashboard/media/{}/approval", media_id),
            Some(&token),
            Some(json!({ "aprovado": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, snapshot) = send(&app, json_request("GET", &format!("/live/{}", slug), None, None)).await;
    assert_eq!(snapshot["media"].as_array().unwrap().len(), 1);

    // Another organizer cannot touch it
    let (_, other) = register(&app, "outro@festa.com", "organizador").await;
    let (status, _) = send(
        &app,
        json_request("DELETE", &format!("/dashboard/media/{}", media_id), Some(&other), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        json_request("DELETE", &format!("/dashboard/media/{}", media_id), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, snapshot) = send(&app, json_request("GET", &format!("/live/{}", slug), None, None)).await;
    assert!(snapshot["media"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn guests_hidden_from_screen_are_not_approved() {
    let app = app();
    let (_, token) = register(&app, "org@festa.com", "organizador").await;
    let event = create_event(&app, &token, false).await;

    let (status, view) = guest_uploads(&app, event["slug_curto"].as_str().unwrap(), false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["uploaded"]["aprovado"], false);
}

#[tokio::test]
async fn closed_events_refuse_uploads() {
    let app = app();
    let (_, token) = register(&app, "org@festa.com", "organizador").await;
    let event = create_event(&app, &token, false).await;
    let slug = event["slug_curto"].as_str().unwrap();

    let (status, closed) = send(
        &app,
        json_request(
            "PUT",
            &format!("/dashboard/events/{}/status", event["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({ "status": "encerrado" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["status"], "encerrado");

    let (status, _) = send(&app, json_request("POST", &format!("/guest/{}/sessions", slug), None, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn role_gated_routes_redirect() {
    let app = app();
    let resolve = |path: &str| format!("/routes/resolve?path={}", path);

    let (_, anonymous) = send(&app, json_request("GET", &resolve("/dashboard/events"), None, None)).await;
    assert_eq!(anonymous["allowed"], false);
    assert_eq!(anonymous["redirect"], "/login");

    let (_, token) = register(&app, "org@festa.com", "organizador").await;
    let (_, wrong_role) = send(&app, json_request("GET", &resolve("/admin"), Some(&token), None)).await;
    assert_eq!(wrong_role["redirect"], "/dashboard");

    let (_, allowed) = send(&app, json_request("GET", &resolve("/dashboard"), Some(&token), None)).await;
    assert_eq!(allowed["allowed"], true);

    // The API itself enforces the same roles
    let (status, _) = send(&app, json_request("GET", "/admin/metrics", Some(&token), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, json_request("GET", "/dashboard/events", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, guest) = register(&app, "bia@festa.com", "convidado").await;
    let (status, _) = send(&app, json_request("GET", "/dashboard/events", Some(&guest), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admins_cannot_self_register() {
    let app = app();
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "x@festa.com", "password": "segredo123", "nome": "X", "role": "admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_and_logout() {
    let app = app();
    register(&app, "org@festa.com", "organizador").await;

    let (status, _) = send(
        &app,
        json_request("POST", "/auth/login", None, Some(json!({ "email": "org@festa.com", "password": "errada123" }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, session) = send(
        &app,
        json_request("POST", "/auth/login", None, Some(json!({ "email": "ORG@festa.com", "password": "segredo123" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["home"], "/dashboard");
    let token = session["token"].as_str().unwrap();

    let (_, me) = send(&app, json_request("GET", "/auth/me", Some(token), None)).await;
    assert_eq!(me["profile"]["role"], "organizador");

    let (status, _) = send(&app, json_request("POST", "/auth/logout", Some(token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, json_request("GET", "/auth/me", Some(token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn testimonial_approval_toggles_visibility() {
    let app = app();
    let (_, organizer) = register(&app, "org@festa.com", "organizador").await;
    let admin = register_admin(&app).await;

    let (status, testimonial) = send(
        &app,
        json_request(
            "POST",
            "/testimonials",
            Some(&organizer),
            Some(json!({ "estrelas": 5, "texto": "Foi lindo!" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(testimonial["aprovado"], false);
    let approval = format!("/admin/testimonials/{}/approval", testimonial["id"].as_str().unwrap());

    let public = || json_request("GET", "/testimonials", None, None);
    let (_, listed) = send(&app, public()).await;
    assert!(listed.as_array().unwrap().is_empty());

    for (approved, visible) in [(true, 1), (false, 0), (true, 1)] {
        let (status, _) = send(
            &app,
            json_request("PUT", &approval, Some(&admin), Some(json!({ "aprovado": approved }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, listed) = send(&app, public()).await;
        assert_eq!(listed.as_array().unwrap().len(), visible);
    }

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/testimonials",
            Some(&organizer),
            Some(json!({ "estrelas": 9, "texto": "?" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn plan_limits_apply_to_subscribed_organizers() {
    let app = app();
    let admin = register_admin(&app).await;
    let (organizer_id, organizer) = register(&app, "org@festa.com", "organizador").await;

    let (status, plan) = send(
        &app,
        json_request(
            "POST",
            "/admin/plans",
            Some(&admin),
            Some(json!({ "nome": "Festa", "limite_eventos": 1, "limite_midias": 0, "valor": 49.9 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", plan);
    let plan_id = plan["id"].as_str().unwrap();

    let (status, pending) = send(
        &app,
        json_request(
            "POST",
            "/dashboard/subscription",
            Some(&organizer),
            Some(json!({ "plano_id": plan_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pending["status"], "pendente");

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/admin/subscriptions/{}", organizer_id),
            Some(&admin),
            Some(json!({ "plano_id": plan_id, "status": "ativo" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, current) = send(&app, json_request("GET", "/dashboard/subscription", Some(&organizer), None)).await;
    assert_eq!(current["planos"]["nome"], "Festa");

    create_event(&app, &organizer, false).await;
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/dashboard/events",
            Some(&organizer),
            Some(json!({ "nome": "Outra festa" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    let (_, metrics) = send(&app, json_request("GET", "/admin/metrics", Some(&admin), None)).await;
    assert_eq!(metrics["totalEvents"], 1);
    assert_eq!(metrics["activeSubscriptions"], 1);
}

#[tokio::test]
async fn chosen_codes_are_normalized_and_unique() {
    let app = app();
    let (_, token) = register(&app, "org@festa.com", "organizador").await;

    let body = json!({ "nome": "Formatura", "slug_curto": " turma-24 " });
    let (status, event) = send(&app, json_request("POST", "/dashboard/events", Some(&token), Some(body.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["slug_curto"], "TURMA-24");

    let (status, _) = send(&app, json_request("POST", "/dashboard/events", Some(&token), Some(body))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, found) = send(&app, json_request("GET", "/events/by-slug/turma-24", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["nome"], "Formatura");

    let (status, _) = send(
        &app,
        json_request("POST", "/dashboard/events", Some(&token), Some(json!({ "nome": "X", "slug_curto": "a b" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn landing_config_round_trips_through_admin() {
    let app = app();
    let admin = register_admin(&app).await;

    let (_, empty) = send(&app, json_request("GET", "/config/landing", None, None)).await;
    assert_eq!(empty, json!({}));

    let content = json!({ "titulo": "Sua festa no telão" });
    let (status, _) = send(
        &app,
        json_request("PUT", "/admin/config/landing", Some(&admin), Some(content.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, landing) = send(&app, json_request("GET", "/config/landing", None, None)).await;
    assert_eq!(landing, content);
}
