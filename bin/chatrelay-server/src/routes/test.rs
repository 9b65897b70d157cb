//! End-to-end router tests: in-memory SQLite, a scripted completion upstream,
//! and a mailer that remembers what it sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chatrelay_core::auth::TokenSigner;
use chatrelay_core::verification::{code_ttl, CodeStore, InMemoryCodeStore};
use chatrelay_core::{CompletionClient, CompletionError, CompletionRequest, DeltaStream, Role};
use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::build;
use crate::config::Config;
use crate::entities::{SqlStore, UserStore};
use crate::mailer::{CodeMailer, MailerError};
use crate::state::AppState;

// ── Fakes ─────────────────────────────────────────────────────────────────────

enum Script {
    Deltas(Vec<&'static str>),
    FailMidStream(Vec<&'static str>),
    FailToOpen,
}

struct ScriptedCompletion {
    script: Script,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedCompletion {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> CompletionRequest {
        self.last_request.lock().unwrap().clone().expect("upstream was not called")
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);

        let (deltas, fail) = match &self.script {
            Script::FailToOpen => {
                return Err(CompletionError::Api {
                    status: 503,
                    message: "overloaded".into(),
                });
            }
            Script::Deltas(d) => (d, false),
            Script::FailMidStream(d) => (d, true),
        };
        let mut items: Vec<Result<String, CompletionError>> =
            deltas.iter().map(|d| Ok((*d).to_owned())).collect();
        if fail {
            items.push(Err(CompletionError::Decode("connection reset".into())));
        }
        Ok(stream::iter(items).boxed())
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    fn code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl CodeMailer for RecordingMailer {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), MailerError> {
        self.sent.lock().unwrap().push((email.to_owned(), code.to_owned()));
        Ok(())
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

struct Harness {
    app: Router,
    state: Arc<AppState>,
    completion: Arc<ScriptedCompletion>,
    mailer: Arc<RecordingMailer>,
    codes: Arc<InMemoryCodeStore>,
}

fn harness(script: Script) -> Harness {
    let config = Config::for_tests();
    let completion = Arc::new(ScriptedCompletion {
        script,
        calls: AtomicUsize::new(0),
        last_request: Mutex::new(None),
    });
    let mailer = Arc::new(RecordingMailer::default());
    let codes = Arc::new(InMemoryCodeStore::new());
    let state = Arc::new(AppState {
        tokens: TokenSigner::new(&config.token_secret, config.token_ttl()).unwrap(),
        store: Arc::new(SqlStore::new(config.database_url.clone())),
        completion: completion.clone(),
        codes: codes.clone(),
        mailer: mailer.clone(),
        config: Arc::new(config),
    });
    Harness {
        app: build(state.clone()),
        state,
        completion,
        mailer,
        codes,
    }
}

impl Harness {
    /// Insert a user directly and hand back a fresh token for them.
    async fn user(&self, email: &str) -> (i64, String) {
        let user = self.state.store.create_user(email, "unused").await.unwrap().unwrap();
        let token = self.state.tokens.issue(user.id, Utc::now()).unwrap();
        (user.id, token)
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    async fn send_json(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let (status, headers, body) = self.send(req).await;
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, headers, value)
    }
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn user_turn(content: &str) -> Value {
    json!([{ "role": "user", "content": content }])
}

// ── Completion relay ──────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_completion_relays_deltas_as_exact_records() {
    let h = harness(Script::Deltas(vec!["Hel", "lo"]));
    let (_, token) = h.user("alice@qq.com").await;

    let (status, headers, body) = h
        .send(request(
            Method::POST,
            "/chat-completion",
            Some(&token),
            Some(json!({ "messages": user_turn("hi") })),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");
    assert_eq!(
        &body[..],
        b"data: {\"content\":\"Hel\"}\n\ndata: {\"content\":\"lo\"}\n\ndata: [DONE]\n\n"
    );
    assert_eq!(h.completion.calls(), 1);
    let sent = h.completion.last_request();
    assert_eq!(sent.model, "test-model");
    assert_eq!(sent.max_tokens, 1000);
    assert_eq!(sent.messages.len(), 1);
}

#[tokio::test]
async fn request_model_overrides_default() {
    let h = harness(Script::Deltas(vec!["ok"]));
    let (_, token) = h.user("alice@qq.com").await;

    h.send(request(
        Method::POST,
        "/chat-completion",
        Some(&token),
        Some(json!({ "messages": user_turn("hi"), "model": "gpt-4o" })),
    ))
    .await;
    assert_eq!(h.completion.last_request().model, "gpt-4o");
}

#[tokio::test]
async fn get_variant_reads_messages_from_query() {
    let h = harness(Script::Deltas(vec!["ok"]));
    let (_, token) = h.user("alice@qq.com").await;
    // [{"role":"user","content":"hi"}]
    let uri = "/chat-completion?messages=%5B%7B%22role%22%3A%22user%22%2C%22content%22%3A%22hi%22%7D%5D";

    let (status, _, body) = h.send(request(Method::GET, uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"data: {\"content\":\"ok\"}\n\ndata: [DONE]\n\n");
    assert_eq!(h.completion.last_request().messages[0].text(), "hi");
}

#[tokio::test]
async fn messages_are_relayed_as_received() {
    let h = harness(Script::Deltas(vec!["ok"]));
    let (_, token) = h.user("alice@qq.com").await;
    let messages = json!([
        { "role": "developer", "content": "answer tersely" },
        { "role": "user", "content": [{ "type": "text", "text": "hi" }], "name": "alice" }
    ]);

    let (status, _, body) = h
        .send(request(
            Method::POST,
            "/chat-completion",
            Some(&token),
            Some(json!({ "messages": messages.clone(), "chatId": "chat-1" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"data: {\"content\":\"ok\"}\n\ndata: [DONE]\n\n");
    assert_eq!(h.completion.calls(), 1);
    let sent = serde_json::to_value(&h.completion.last_request().messages).unwrap();
    assert_eq!(sent, messages);

    // Structured content is stored as its JSON text.
    let (_, _, listed) = h.send_json(request(Method::GET, "/chats", Some(&token), None)).await;
    let stored = listed["chats"][0]["messages"][0]["content"].as_str().unwrap();
    let stored: Value = serde_json::from_str(stored).unwrap();
    assert_eq!(stored, json!([{ "type": "text", "text": "hi" }]));
}

#[tokio::test]
async fn expired_token_is_rejected_without_calling_upstream() {
    let h = harness(Script::Deltas(vec!["never"]));
    let (user_id, _) = h.user("alice@qq.com").await;
    let expired = h
        .state
        .tokens
        .issue(user_id, Utc::now() - Duration::hours(2))
        .unwrap();

    let (status, headers, body) = h
        .send(request(
            Method::POST,
            "/chat-completion",
            Some(&expired),
            Some(json!({ "messages": user_turn("hi") })),
        ))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
    assert_eq!(&body[..], b"invalid or expired credential");
    assert_eq!(h.completion.calls(), 0);
}

#[tokio::test]
async fn missing_or_forged_credentials_are_rejected() {
    let h = harness(Script::Deltas(vec!["never"]));
    let (_, token) = h.user("alice@qq.com").await;
    let body = json!({ "messages": user_turn("hi") });

    let (status, _, text) = h
        .send(request(Method::POST, "/chat-completion", None, Some(body.clone())))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(&text[..], b"unauthenticated");

    let forged = format!("{token}x");
    let (status, _, _) = h
        .send(request(Method::POST, "/title", Some(&forged), Some(body)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = h.send(request(Method::GET, "/chats", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.completion.calls(), 0);
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let h = harness(Script::Deltas(vec!["ok"]));
    let (_, token) = h.user("alice@qq.com").await;

    let req = Request::builder()
        .method(Method::GET)
        .uri("/chats")
        .header(header::COOKIE, format!("auth-token={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = h.send_json(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "chats": [] }));
}

#[tokio::test]
async fn missing_messages_is_a_plain_bad_request() {
    let h = harness(Script::Deltas(vec!["never"]));
    let (_, token) = h.user("alice@qq.com").await;

    let (status, _, body) = h
        .send(request(Method::POST, "/chat-completion", Some(&token), Some(json!({ "model": "m" }))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(&body[..], b"messages is required");
    assert_eq!(h.completion.calls(), 0);
}

#[tokio::test]
async fn chat_id_persists_newest_user_message_before_relaying() {
    let h = harness(Script::Deltas(vec!["reply"]));
    let (_, token) = h.user("alice@qq.com").await;
    let messages = json!([
        { "role": "user", "content": "first" },
        { "role": "assistant", "content": "answer" },
        { "role": "user", "content": "second" }
    ]);

    let (status, _, _) = h
        .send(request(
            Method::POST,
            "/chat-completion",
            Some(&token),
            Some(json!({ "messages": messages, "chatId": "chat-1" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, listed) = h.send_json(request(Method::GET, "/chats", Some(&token), None)).await;
    let chats = listed["chats"].as_array().unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["id"], "chat-1");
    assert_eq!(chats[0]["title"], "");
    let stored = chats[0]["messages"].as_array().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["role"], "user");
    assert_eq!(stored[0]["content"], "second");
}

#[tokio::test]
async fn failed_persistence_never_reaches_upstream() {
    let h = harness(Script::Deltas(vec!["never"]));
    let (_, alice) = h.user("alice@qq.com").await;
    let (_, bob) = h.user("bob@163.com").await;

    let create = json!({ "messages": user_turn("mine"), "chatId": "chat-1" });
    h.send(request(Method::POST, "/chat-completion", Some(&alice), Some(create))).await;
    assert_eq!(h.completion.calls(), 1);

    let hijack = json!({ "messages": user_turn("also mine?"), "chatId": "chat-1" });
    let (status, _, _) = h
        .send(request(Method::POST, "/chat-completion", Some(&bob), Some(hijack)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(h.completion.calls(), 1);
}

#[tokio::test]
async fn upstream_open_failure_is_a_plain_500() {
    let h = harness(Script::FailToOpen);
    let (_, token) = h.user("alice@qq.com").await;

    let (status, headers, body) = h
        .send(request(
            Method::POST,
            "/chat-completion",
            Some(&token),
            Some(json!({ "messages": user_turn("hi") })),
        ))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
    assert_eq!(&body[..], b"Error: upstream API error 503: overloaded");
}

#[tokio::test]
async fn mid_stream_failure_breaks_the_body() {
    let h = harness(Script::FailMidStream(vec!["partial"]));
    let (_, token) = h.user("alice@qq.com").await;

    let resp = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/chat-completion",
            Some(&token),
            Some(json!({ "messages": user_turn("hi") })),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.into_body().collect().await.is_err());
}

// ── Title synthesis ───────────────────────────────────────────────────────────

#[tokio::test]
async fn title_records_are_cumulative() {
    let h = harness(Script::Deltas(vec!["AI", " 对话"]));
    let (_, token) = h.user("alice@qq.com").await;
    let messages = json!([
        { "role": "user", "content": "什么是AI？" },
        { "role": "assistant", "content": "AI 是人工智能。" }
    ]);

    let (status, _, body) = h
        .send(request(Method::POST, "/title", Some(&token), Some(json!({ "messages": messages }))))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "data: {\"title\":\"AI\"}\n\ndata: {\"title\":\"AI 对话\"}\n\ndata: [DONE]\n\n"
    );
    let sent = h.completion.last_request();
    assert_eq!(sent.messages.len(), 3);
    assert!(sent.messages[0].is(Role::System));
    assert_eq!(sent.max_tokens, 50);
}

#[tokio::test]
async fn title_get_variant_reads_messages_from_query() {
    let h = harness(Script::Deltas(vec!["Gr", "eeting"]));
    let (_, token) = h.user("alice@qq.com").await;
    // [{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]
    let uri = "/title?messages=%5B%7B%22role%22%3A%22user%22%2C%22content%22%3A%22hi%22%7D%2C\
               %7B%22role%22%3A%22assistant%22%2C%22content%22%3A%22hello%22%7D%5D&model=gpt-4o";

    let (status, headers, body) = h.send(request(Method::GET, uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(
        &body[..],
        b"data: {\"title\":\"Gr\"}\n\ndata: {\"title\":\"Greeting\"}\n\ndata: [DONE]\n\n"
    );
    let sent = h.completion.last_request();
    assert_eq!(sent.model, "gpt-4o");
    assert_eq!(sent.messages.len(), 3);
    assert_eq!(sent.messages[2].text(), "hello");

    let (status, _, _) = h.send(request(Method::GET, "/title", Some(&token), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.completion.calls(), 1);
}

#[tokio::test]
async fn title_needs_exactly_one_exchange() {
    let h = harness(Script::Deltas(vec!["never"]));
    let (_, token) = h.user("alice@qq.com").await;

    let (status, _, _) = h
        .send(request(
            Method::POST,
            "/title",
            Some(&token),
            Some(json!({ "messages": user_turn("only one") })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.completion.calls(), 0);
}

// ── Accounts ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_login_then_use_token() {
    let h = harness(Script::Deltas(vec![]));
    let email = "new.user@126.com";

    let (status, _, ack) = h
        .send_json(request(Method::POST, "/send-code", None, Some(json!({ "email": email }))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["success"], true);
    let code = h.mailer.code_for(email).unwrap();
    assert_eq!(code.len(), 6);

    let registration = json!({ "email": email, "password": "s3cret!", "code": code });
    let (status, _, _) = h
        .send_json(request(Method::POST, "/register", None, Some(registration.clone())))
        .await;
    assert_eq!(status, StatusCode::OK);

    // The code is spent.
    let (status, _, body) = h
        .send_json(request(Method::POST, "/register", None, Some(registration)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid or expired verification code");

    let (status, headers, login) = h
        .send_json(request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": email, "password": "s3cret!" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user"]["email"], email);
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("auth-token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=3600"));

    let token = login["token"].as_str().unwrap();
    let (status, _, _) = h.send(request(Method::GET, "/chats", Some(token), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_rejects_unlisted_domain_even_with_valid_code() {
    let h = harness(Script::Deltas(vec![]));
    let email = "someone@gmail.com";
    h.codes.issue(email, "123456", Utc::now() + code_ttl()).await;

    let (status, _, _) = h
        .send_json(request(
            Method::POST,
            "/register",
            None,
            Some(json!({ "email": email, "password": "pw", "code": "123456" })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.state.store.find_user_by_email(email).await.unwrap().is_none());
}

#[tokio::test]
async fn send_code_rejects_unlisted_domain() {
    let h = harness(Script::Deltas(vec![]));
    let (status, _, body) = h
        .send_json(request(
            Method::POST,
            "/send-code",
            None,
            Some(json!({ "email": "someone@outlook.com" })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(h.mailer.code_for("someone@outlook.com").is_none());
    assert!(h.codes.is_empty());
}

#[tokio::test]
async fn register_rejects_wrong_or_expired_code() {
    let h = harness(Script::Deltas(vec![]));
    h.codes.issue("a@qq.com", "111111", Utc::now() + code_ttl()).await;
    h.codes.issue("b@qq.com", "222222", Utc::now() - Duration::seconds(1)).await;

    for (email, code) in [("a@qq.com", "999999"), ("b@qq.com", "222222")] {
        let (status, _, _) = h
            .send_json(request(
                Method::POST,
                "/register",
                None,
                Some(json!({ "email": email, "password": "pw", "code": code })),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{email}");
    }
}

#[tokio::test]
async fn register_missing_fields_is_bad_request() {
    let h = harness(Script::Deltas(vec![]));
    let (status, _, _) = h
        .send_json(request(Method::POST, "/register", None, Some(json!({ "email": "a@qq.com" }))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let h = harness(Script::Deltas(vec![]));
    h.user("taken@163.com").await;
    h.codes.issue("taken@163.com", "123456", Utc::now() + code_ttl()).await;

    let (status, _, _) = h
        .send_json(request(
            Method::POST,
            "/register",
            None,
            Some(json!({ "email": "taken@163.com", "password": "pw", "code": "123456" })),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_failures_and_logout() {
    let h = harness(Script::Deltas(vec![]));
    let hash = chatrelay_core::auth::hash_password("right").unwrap();
    h.state.store.create_user("a@qq.com", &hash).await.unwrap();

    for (email, password) in [("a@qq.com", "wrong"), ("nobody@qq.com", "right")] {
        let (status, _, body) = h
            .send_json(request(
                Method::POST,
                "/login",
                None,
                Some(json!({ "email": email, "password": password })),
            ))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid email or password");
    }

    let (status, headers, _) = h.send_json(request(Method::DELETE, "/login", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("auth-token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

// ── Chat history ──────────────────────────────────────────────────────────────

fn history() -> Value {
    json!({ "chats": [
        {
            "id": "c-old", "title": "Old", "createdAt": 1000,
            "messages": [
                { "id": "m1", "role": "user", "content": "one" },
                { "id": "m2", "role": "assistant", "content": "two" },
                { "id": "m3", "role": "user", "content": "three" }
            ]
        },
        { "id": "c-new", "title": "New", "createdAt": 2000, "messages": [] }
    ]})
}

#[tokio::test]
async fn synced_history_reads_back_in_order() {
    let h = harness(Script::Deltas(vec![]));
    let (_, token) = h.user("alice@qq.com").await;

    let (status, _, ack) = h
        .send_json(request(Method::POST, "/chats", Some(&token), Some(history())))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "success": true, "chats": 2, "messages": 3 }));

    let (_, _, listed) = h.send_json(request(Method::GET, "/chats", Some(&token), None)).await;
    let chats = listed["chats"].as_array().unwrap();
    assert_eq!(chats[0]["id"], "c-new");
    assert_eq!(chats[1]["id"], "c-old");
    assert_eq!(chats[1]["createdAt"], 1000);
    let contents: Vec<_> = chats[1]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["one", "two", "three"]);
}

#[tokio::test]
async fn replaying_a_sync_yields_the_same_rows() {
    let h = harness(Script::Deltas(vec![]));
    let (_, token) = h.user("alice@qq.com").await;

    h.send(request(Method::POST, "/chats", Some(&token), Some(history()))).await;
    let (_, _, first) = h.send_json(request(Method::GET, "/chats", Some(&token), None)).await;
    h.send(request(Method::POST, "/chats", Some(&token), Some(history()))).await;
    let (_, _, second) = h.send_json(request(Method::GET, "/chats", Some(&token), None)).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn histories_are_private_per_user() {
    let h = harness(Script::Deltas(vec![]));
    let (_, alice) = h.user("alice@qq.com").await;
    let (_, bob) = h.user("bob@163.com").await;
    h.send(request(Method::POST, "/chats", Some(&alice), Some(history()))).await;

    let (_, _, listed) = h.send_json(request(Method::GET, "/chats", Some(&bob), None)).await;
    assert_eq!(listed, json!({ "chats": [] }));

    // Bob cannot claim Alice's chat ids.
    let (status, _, _) = h
        .send_json(request(Method::POST, "/chats", Some(&bob), Some(history())))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = h
        .send_json(request(Method::DELETE, "/chats/c-old", Some(&bob), None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_one_chat() {
    let h = harness(Script::Deltas(vec![]));
    let (_, token) = h.user("alice@qq.com").await;
    h.send(request(Method::POST, "/chats", Some(&token), Some(history()))).await;

    let (status, _, _) = h
        .send_json(request(Method::DELETE, "/chats/c-old", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = h
        .send_json(request(Method::DELETE, "/chats/c-old", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, listed) = h.send_json(request(Method::GET, "/chats", Some(&token), None)).await;
    assert_eq!(listed["chats"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn sync_rejects_unknown_roles() {
    let h = harness(Script::Deltas(vec![]));
    let (_, token) = h.user("alice@qq.com").await;
    let bad = json!({ "chats": [{
        "id": "c1", "title": "", "createdAt": 1,
        "messages": [{ "id": "m1", "role": "robot", "content": "beep" }]
    }]});

    let (status, _, _) = h.send_json(request(Method::POST, "/chats", Some(&token), Some(bad))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Ambient ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public_and_traced() {
    let h = harness(Script::Deltas(vec![]));
    let (status, headers, body) = h.send_json(request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(!body["version"].as_str().unwrap().is_empty());
    assert!(headers.contains_key("x-trace-id"));
}

#[tokio::test]
async fn valid_trace_id_is_echoed() {
    let h = harness(Script::Deltas(vec![]));
    let id = "6f1c2a4e-3b7d-4c8e-9f0a-1b2c3d4e5f60";
    let req = Request::builder()
        .uri("/health")
        .header("x-trace-id", id)
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = h.send(req).await;
    assert_eq!(headers["x-trace-id"], id);
}
