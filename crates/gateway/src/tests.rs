use super::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use studyowl_common::auth::{JwtManager, LocalIdentityProvider};
use studyowl_common::genai::{MockEmbedder, MockGenerator};
use studyowl_common::store::MemoryStore;
use tower::ServiceExt;

const BOUNDARY: &str = "studyowl-test-boundary";

struct TestApp {
    router: Router,
    generator: Arc<MockGenerator>,
}

fn test_app_with(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let mut config = AppConfig::for_local_development();
    config.genai.file_poll_interval_secs = 0;
    configure(&mut config);

    let generator = Arc::new(MockGenerator::new());
    let state = AppState::new(
        Arc::new(config),
        Arc::new(MemoryStore::new()),
        generator.clone(),
        Arc::new(MockEmbedder::new(64)),
        Arc::new(LocalIdentityProvider::new(JwtManager::new("test_secret", 3600))),
    );

    TestApp {
        router: create_router(state, None),
        generator,
    }
}

fn test_app() -> TestApp {
    test_app_with(|_| {})
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn upload_request(token: &str, file_name: &str, bytes: &str, customisation: Option<Value>) -> Request<Body> {
    let mut body = String::new();
    if let Some(customisation) = customisation {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"notes_customisation\"\r\n\r\n{customisation}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n{bytes}\r\n--{BOUNDARY}--\r\n"
    ));

    Request::post("/v1/api/get-notes-from-uploaded-file")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap()
}

/// Sign up and log in, returning the ID token
async fn login(app: &TestApp, email: &str) -> String {
    let credentials = json!({ "email": email, "password": "secret123" });

    let (status, body) = send(app, json_request("/v1/api/signup", None, credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, body) = send(app, json_request("/v1/api/login", None, credentials)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Login successful");
    body["idToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_root_and_health() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/v1");

    let (status, body) = send(&app, Request::get("/v1").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    let (status, body) = send(&app, Request::get("/v1/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Request::get("/v1/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["store"]["status"], "up");
}

#[tokio::test]
async fn test_signup_login_and_welcome() {
    let app = test_app();
    let token = login(&app, "student@example.com").await;

    let (status, body) = send(
        &app,
        Request::get("/v1/api/welcome")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome student@example.com!");

    let duplicate = json!({ "email": "student@example.com", "password": "secret123" });
    let (status, _) = send(&app, json_request("/v1/api/signup", None, duplicate)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let wrong = json!({ "email": "student@example.com", "password": "wrong-password" });
    let (status, _) = send(&app, json_request("/v1/api/login", None, wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_validation() {
    let app = test_app();

    let (status, body) = send(
        &app,
        json_request(
            "/v1/api/signup",
            None,
            json!({ "email": "not-an-email", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app();

    let (status, _) = send(&app, Request::get("/v1/api/welcome").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        json_request("/v1/api/query-bot", Some("not-a-token"), json!({ "query": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_quiz_without_notes() {
    let app = test_app();
    let token = login(&app, "empty@example.com").await;

    let (status, body) = send(
        &app,
        json_request("/v1/api/get-quiz-from-uploaded-notes", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["message"].as_str().unwrap().starts_with("Upload a file"));
}

#[tokio::test]
async fn test_study_flow() {
    let app = test_app();
    let token = login(&app, "flow@example.com").await;

    // Notes from an uploaded image
    let (status, body) = send(
        &app,
        upload_request(
            &token,
            "diagram.png",
            "not really a png",
            Some(json!({ "focus": "Definitions", "length": "Short" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["summarised_notes"].as_str().unwrap().starts_with("# Notes"));

    // Quiz from the fresh notes
    let (status, body) = send(
        &app,
        json_request(
            "/v1/api/get-quiz-from-uploaded-notes",
            Some(&token),
            json!({ "number_of_questions": 2, "question_types": ["multiple_choice", "true_false"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let questions = body["question_answer_list"].as_array().unwrap().clone();
    assert_eq!(questions.len(), 2);

    // Answer the multiple choice question correctly
    let (status, body) = send(
        &app,
        json_request(
            "/v1/api/evaluate-student-answer",
            Some(&token),
            json!({ "question_and_answer": questions[0], "student_answer": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body, json!({ "correctness": 1 }));

    // Only the answered question counts
    let (status, body) = send(
        &app,
        json_request(
            "/v1/api/get-student-strength-weakness",
            Some(&token),
            json!({ "num_of_qns": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["score"], 100);
    assert!(body["strength"].is_string());
    assert!(body["weakness"].is_string());

    // Regenerate with the assessment
    let (status, body) = send(
        &app,
        json_request(
            "/v1/api/regenerate-quiz",
            Some(&token),
            json!({
                "quiz_customisation": { "number_of_questions": 2 },
                "strength_and_weakness": { "strength": body["strength"], "weakness": body["weakness"] }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["question_answer_list"].as_array().unwrap().len(), 2);

    // Retrieval over the stored notes
    let (status, body) = send(
        &app,
        json_request(
            "/v1/api/query-bot",
            Some(&token),
            json!({ "query": "What do my notes cover?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["answer"].is_string());

    // Clean up
    let (status, body) = send(
        &app,
        json_request(
            "/v1/api/delete-collections",
            Some(&token),
            json!({ "coll_name": "notes", "batch_size": 100 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["message"].as_str().unwrap().ends_with("from notes."));

    let (status, _) = send(
        &app,
        json_request("/v1/api/get-quiz-from-uploaded-notes", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_upload_errors() {
    let app = test_app();
    let token = login(&app, "uploads@example.com").await;

    let (status, _) = send(&app, upload_request(&token, "notes.exe", "MZ", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, upload_request(&token, "slides.ppt", "legacy", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, upload_request(&token, "broken.pdf", "%PDF-nonsense", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        upload_request(&token, "diagram.png", "bytes", Some(json!("not an object"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_model_quiz() {
    let app = test_app();
    let token = login(&app, "malformed@example.com").await;

    let (status, _) = send(&app, upload_request(&token, "diagram.png", "bytes", None)).await;
    assert_eq!(status, StatusCode::OK);

    app.generator
        .push_response(r#"{"question_answer_list": [{"question": "Missing answer"}]}"#);
    let (status, _) = send(
        &app,
        json_request("/v1/api/get-quiz-from-uploaded-notes", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_quiz_size_above_configured_limit() {
    let app = test_app_with(|config| config.study.max_quiz_questions = 20);
    let token = login(&app, "bigquiz@example.com").await;

    let (status, body) = send(
        &app,
        json_request(
            "/v1/api/get-quiz-from-uploaded-notes",
            Some(&token),
            json!({ "number_of_questions": 21 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "number_of_questions");
}

#[tokio::test]
async fn test_strength_weakness_without_answers() {
    let app = test_app();
    let token = login(&app, "noanswers@example.com").await;

    let (status, _) = send(
        &app,
        json_request(
            "/v1/api/get-student-strength-weakness",
            Some(&token),
            json!({ "num_of_qns": 5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        json_request(
            "/v1/api/get-student-strength-weakness",
            Some(&token),
            json!({ "num_of_qns": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_maintenance_errors() {
    let app = test_app();
    let token = login(&app, "maintenance@example.com").await;

    let (status, _) = send(
        &app,
        json_request(
            "/v1/api/delete-collections",
            Some(&token),
            json!({ "coll_name": "papers", "batch_size": 10 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(
            "/v1/api/delete-media",
            Some(&token),
            json!({ "file_name": "files/missing" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        json_request(
            "/v1/api/delete-collections",
            Some(&token),
            json!({ "coll_name": "notes", "batch_size": 18446744073709551615u64 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "batch_size");

    let (status, body) = send(
        &app,
        json_request(
            "/v1/api/delete-collections",
            Some(&token),
            json!({ "coll_name": "users", "batch_size": 10 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Deleted 1 documents from users.");
}

#[tokio::test]
async fn test_rate_limit_rejects_bursts() {
    let app = test_app_with(|config| {
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
    });

    let (status, _) = send(&app, Request::get("/v1/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Request::get("/v1/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
