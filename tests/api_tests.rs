/// HTTP-level tests driving the router with spy provider adapters
/// Verifies the envelope contract without touching real providers
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use provider_relay::classifier::RuleTableClassifier;
use provider_relay::config::Config;
use provider_relay::credentials::{CrmCredentials, LlmCredentials, SmtpCredentials};
use provider_relay::errors::{FailureSignal, RawFailure};
use provider_relay::handlers::AppState;
use provider_relay::models::{
    EmailMessage, MailSent, RecordMutated, RecordMutation, SearchHit, SearchQuery, SearchResults,
    TextGenerated, TextPrompt,
};
use provider_relay::openapi::ApiDoc;
use provider_relay::providers::{CrmProvider, MailProvider, SearchProvider, TextProvider};
use provider_relay::routes::build_router;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use utoipa::OpenApi;

// ============ Spy adapters ============

/// Mail spy: counts calls and rejects the password "wrong" with a 535 reply.
#[derive(Default)]
struct SpyMail {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

#[async_trait]
impl MailProvider for SpyMail {
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        message: &EmailMessage,
    ) -> Result<MailSent, RawFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if credentials.password.expose_secret() == "wrong" {
            return Err(RawFailure::new(
                FailureSignal::SmtpReply(535),
                "535 5.7.8 Username and Password not accepted",
            ));
        }
        Ok(MailSent {
            message: format!("Email sent successfully to {}", message.to_email),
            message_id: "<spy@relay.test>".to_string(),
            to_email: message.to_email.clone(),
            sent_at: Utc::now(),
        })
    }
}

#[derive(Default)]
struct SpyText {
    calls: AtomicUsize,
}

#[async_trait]
impl TextProvider for SpyText {
    async fn generate(
        &self,
        credentials: &LlmCredentials,
        prompt: &TextPrompt,
    ) -> Result<TextGenerated, RawFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match credentials.api_key.expose_secret() {
            "sk-bad" => Err(RawFailure::new(
                FailureSignal::ProviderCode {
                    code: "invalid_api_key".to_string(),
                    status: 401,
                },
                "Incorrect API key provided (HTTP 401)",
            )),
            "sk-flaky" => Err(RawFailure::new(
                FailureSignal::HttpStatus(500),
                "HTTP 500: internal error",
            )),
            _ => Ok(TextGenerated {
                text: format!("echo: {}", prompt.prompt),
                model: credentials.model.clone(),
                finish_reason: Some("stop".to_string()),
                usage: None,
            }),
        }
    }
}

#[derive(Default)]
struct SpyCrm {
    calls: AtomicUsize,
    last: Mutex<Option<RecordMutation>>,
}

#[async_trait]
impl CrmProvider for SpyCrm {
    async fn mutate(
        &self,
        _credentials: &CrmCredentials,
        mutation: &RecordMutation,
    ) -> Result<RecordMutated, RawFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(mutation.clone());
        Ok(RecordMutated {
            record_id: mutation
                .record_id
                .clone()
                .unwrap_or_else(|| "00Q000000000001AAA".to_string()),
            object_type: mutation.object_type.clone(),
            operation: mutation.operation(),
        })
    }
}

#[derive(Default)]
struct SpySearch {
    calls: AtomicUsize,
}

#[async_trait]
impl SearchProvider for SpySearch {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, RawFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let results: Vec<SearchHit> = (0..query.max_results.min(2))
            .map(|i| SearchHit {
                title: format!("Result {}", i),
                url: format!("https://example.com/{}", i),
                snippet: query.query.clone(),
            })
            .collect();
        Ok(SearchResults {
            query: query.query.clone(),
            count: results.len(),
            results,
        })
    }
}

struct Harness {
    app: Router,
    mail: Arc<SpyMail>,
    text: Arc<SpyText>,
    crm: Arc<SpyCrm>,
    search: Arc<SpySearch>,
}

fn harness_with(config: Config, mail: SpyMail) -> Harness {
    let mail = Arc::new(mail);
    let text = Arc::new(SpyText::default());
    let crm = Arc::new(SpyCrm::default());
    let search = Arc::new(SpySearch::default());
    let state = AppState {
        config,
        mail: mail.clone(),
        text: text.clone(),
        crm: crm.clone(),
        search: search.clone(),
        classifier: Arc::new(RuleTableClassifier::default()),
        health_issues: Vec::new(),
    };
    Harness {
        app: build_router(Arc::new(state)),
        mail,
        text,
        crm,
        search,
    }
}

fn harness() -> Harness {
    harness_with(Config::default(), SpyMail::default())
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn gmail_request(password: &str) -> Value {
    json!({
        "to_email": "friend@example.com",
        "subject": "Hello",
        "body": "Hi there",
        "smtp_config": {
            "smtp_server": "smtp.gmail.com",
            "smtp_port": 587,
            "smtp_username": "someone@gmail.com",
            "smtp_password": password
        }
    })
}

// ============ Mail ============

#[tokio::test]
async fn test_send_email_success_envelope() {
    let h = harness();
    let (status, body) = call(&h.app, "POST", "/api/email/send", Some(gmail_request("right"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["to_email"], "friend@example.com");
    assert_eq!(body["message_id"], "<spy@relay.test>");
    assert!(body.get("error").is_none());
    assert_eq!(h.mail.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gmail_login_rejection_links_app_passwords_only() {
    let h = harness();
    let (status, body) = call(&h.app, "POST", "/api/email/send", Some(gmail_request("wrong"))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "AuthError");
    assert!(body["error"].as_str().unwrap().contains("someone@gmail.com"));
    assert_eq!(
        body["helpful_links"],
        json!({"gmail": "https://myaccount.google.com/apppasswords"})
    );
}

#[tokio::test]
async fn test_slow_relay_is_network_error_without_links() {
    let config = Config {
        provider_timeout: Duration::from_millis(100),
        ..Config::default()
    };
    let h = harness_with(
        config,
        SpyMail {
            delay: Some(Duration::from_secs(5)),
            ..SpyMail::default()
        },
    );
    let (status, body) = call(&h.app, "POST", "/api/email/send", Some(gmail_request("right"))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error_code"], "NetworkError");
    assert!(body.get("helpful_links").is_none());
}

#[tokio::test]
async fn test_missing_subject_never_reaches_relay() {
    let h = harness();
    let mut request = gmail_request("right");
    request.as_object_mut().unwrap().remove("subject");

    let (status, body) = call(&h.app, "POST", "/api/email/send", Some(request)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "ValidationError");
    assert_eq!(body["error"], "Missing required field: subject");
    assert_eq!(h.mail.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_out_of_range_port_is_validation_error() {
    let h = harness();
    let mut request = gmail_request("right");
    request["smtp_config"]["smtp_port"] = json!(70000);

    let (status, body) = call(&h.app, "POST", "/api/email/send", Some(request)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("smtp_config.smtp_port"));
    assert_eq!(h.mail.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_smtp_config_without_fallback() {
    let h = harness();
    let mut request = gmail_request("right");
    request.as_object_mut().unwrap().remove("smtp_config");

    let (status, body) = call(&h.app, "POST", "/api/email/send", Some(request)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "ValidationError");
    assert_eq!(h.mail.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/api/email/send")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "ValidationError");
    assert_eq!(h.mail.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let h = harness();
    let payload = "x".repeat(2 * 1024 * 1024);
    let request = Request::builder()
        .method("POST")
        .uri("/api/search")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "ValidationError");
    assert!(body["error"].as_str().unwrap().contains("byte limit"));
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_body_without_length_header_is_validation_error() {
    let h = harness();
    let payload = format!(r#"{{"query": "{}"}}"#, "x".repeat(2 * 1024 * 1024));
    let request = Request::builder()
        .method("POST")
        .uri("/api/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error_code"], "ValidationError");
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_failures_keep_their_own_links() {
    let h = harness();
    let mut tasks = Vec::new();
    for i in 0..10 {
        let app = h.app.clone();
        let (user, host, key) = if i % 2 == 0 {
            ("a@gmail.com", "smtp.gmail.com", "gmail")
        } else {
            ("b@yahoo.com", "smtp.mail.yahoo.com", "yahoo")
        };
        let request = json!({
            "to_email": "friend@example.com",
            "subject": "Hello",
            "body": "Hi",
            "smtp_config": {
                "smtp_server": host,
                "smtp_port": "465",
                "smtp_username": user,
                "smtp_password": "wrong"
            }
        });
        tasks.push(tokio::spawn(async move {
            let (_, body) = call(&app, "POST", "/api/email/send", Some(request)).await;
            (key, body)
        }));
    }

    for task in tasks {
        let (key, body) = task.await.unwrap();
        let links = body["helpful_links"].as_object().unwrap();
        assert_eq!(links.len(), 1);
        assert!(links.contains_key(key));
    }
    assert_eq!(h.mail.calls.load(Ordering::SeqCst), 10);
}

// ============ Text generation ============

#[tokio::test]
async fn test_generate_text_success() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/llm/generate",
        Some(json!({"prompt": "ping", "api_key": "sk-good", "model": "tiny"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["text"], "echo: ping");
    assert_eq!(body["model"], "tiny");
}

#[tokio::test]
async fn test_rejected_api_key_is_auth_error_without_links() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/llm/generate",
        Some(json!({"prompt": "ping", "api_key": "sk-bad"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error_code"], "AuthError");
    assert!(body.get("helpful_links").is_none());
}

#[tokio::test]
async fn test_unrecognized_provider_failure_is_500() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/llm/generate",
        Some(json!({"prompt": "ping", "api_key": "sk-flaky"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_code"], "UnknownProviderError");
}

#[tokio::test]
async fn test_temperature_out_of_range_skips_provider() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/llm/generate",
        Some(json!({"prompt": "ping", "api_key": "sk-good", "temperature": 3.5})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "ValidationError");
    assert_eq!(h.text.calls.load(Ordering::SeqCst), 0);
}

// ============ CRM ============

fn sf_config() -> Value {
    json!({
        "username": "admin@acme.example",
        "password": "pw",
        "security_token": "tok",
        "client_id": "cid",
        "client_secret": "secret"
    })
}

#[tokio::test]
async fn test_create_record() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/crm/records",
        Some(json!({
            "object_type": "Lead",
            "fields": {"LastName": "Doe", "Company": "Acme"},
            "sf_config": sf_config()
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["operation"], "created");
    assert_eq!(body["object_type"], "Lead");
    assert_eq!(h.crm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_record_uses_path_segments() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "PATCH",
        "/api/crm/records/Contact/003000000000001AAA",
        Some(json!({"fields": {"Phone": "555"}, "sf_config": sf_config()})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["operation"], "updated");
    assert_eq!(body["record_id"], "003000000000001AAA");

    let last = h.crm.last.lock().unwrap().clone().unwrap();
    assert_eq!(last.object_type, "Contact");
    assert_eq!(last.record_id.as_deref(), Some("003000000000001AAA"));
}

#[tokio::test]
async fn test_invalid_object_type_is_rejected() {
    let h = harness();
    let (status, _) = call(
        &h.app,
        "POST",
        "/api/crm/records",
        Some(json!({
            "object_type": "Lead; DROP",
            "fields": {"LastName": "Doe"},
            "sf_config": sf_config()
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.crm.calls.load(Ordering::SeqCst), 0);
}

// ============ Search ============

#[tokio::test]
async fn test_search_success() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/search",
        Some(json!({"query": "rust", "max_results": 3})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["query"], "rust");
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_zero_max_results_never_reaches_engine() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/search",
        Some(json!({"query": "rust", "max_results": 0})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "ValidationError");
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
}

// ============ Discovery ============

#[tokio::test]
async fn test_health_and_info_are_stable() {
    let h = harness();
    for uri in ["/", "/health", "/api/info", "/api/email/info", "/api/openplugin/manifest"] {
        let (first_status, first) = call(&h.app, "GET", uri, None).await;
        let (second_status, second) = call(&h.app, "GET", uri, None).await;
        assert_eq!(first_status, StatusCode::OK, "{}", uri);
        assert_eq!(first_status, second_status);
        assert_eq!(first, second, "{} changed between calls", uri);
    }

    let (_, health) = call(&h.app, "GET", "/health", None).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "provider-relay");
}

#[tokio::test]
async fn test_degraded_startup_reports_unhealthy() {
    let state = AppState {
        health_issues: vec!["help links file unusable".to_string()],
        ..AppState::from_config(Config::default()).unwrap()
    };
    let app = build_router(Arc::new(state));
    let (status, body) = call(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["issues"][0], "help links file unusable");
}

#[tokio::test]
async fn test_manifest_points_at_openapi_document() {
    let h = harness();
    let (_, manifest) = call(&h.app, "GET", "/api/openplugin/manifest", None).await;
    let url = manifest["api"]["url"].as_str().unwrap();

    let request = Request::builder().uri(url).body(Body::empty()).unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/yaml");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let yaml = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(yaml.contains("/api/email/send"));
}

#[tokio::test]
async fn test_documented_paths_are_routed() {
    let h = harness();
    let documented: Vec<String> = ApiDoc::openapi().paths.paths.keys().cloned().collect();
    assert_eq!(
        documented,
        vec![
            "/api/crm/records",
            "/api/crm/records/{object_type}/{record_id}",
            "/api/email/info",
            "/api/email/send",
            "/api/info",
            "/api/llm/generate",
            "/api/search",
            "/health",
        ]
    );

    // Every documented path answers with something other than 404.
    for path in &documented {
        let uri = path
            .replace("{object_type}", "Lead")
            .replace("{record_id}", "00Q000000000001AAA");
        let method = if path.contains("{record_id}") {
            "PATCH"
        } else if path.ends_with("info") || path == "/health" {
            "GET"
        } else {
            "POST"
        };
        let (status, _) = call(&h.app, method, &uri, Some(json!({}))).await;
        assert_ne!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        assert_ne!(status, StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn test_swagger_ui_is_served() {
    let h = harness();
    let request = Request::builder().uri("/docs").body(Body::empty()).unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
