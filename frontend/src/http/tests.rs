use super::pipeline::{REFRESH_SUCCESS_MESSAGE, SESSION_EXPIRED_MESSAGE};
use super::transport::MockHttpTransport;
use super::*;
use crate::error::{ConsoleError, Result};
use crate::notify::RecordingNotifier;
use crate::router::{NavigationTarget, Navigator, RouteLocation};
use crate::session::SessionStore;
use crate::storage::{KeyValueStorage, MemoryStorage};
use adminkit_shared::date::utc;
use adminkit_shared::protocol::{
    self, ApiRequest, DownloadDocumentRequest, HttpMethod, REFRESH_TOKEN_PATH, SIGN_IN_PATH,
};
use adminkit_shared::{
    HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, ListQuery, STORAGE_TOKEN_KEY, SessionToken,
    SignInParams,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;

// =========================================================
// 测试环境
// =========================================================

const BASE: &str = "https://api.test";

fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ReportRequest;

impl ApiRequest for ReportRequest {
    type Response = Value;
    const PATH: &'static str = "/api/report";
    const METHOD: HttpMethod = HttpMethod::Get;
}

#[derive(Default)]
struct RecordingNavigator {
    navigations: RefCell<Vec<String>>,
}

#[async_trait(?Send)]
impl Navigator for RecordingNavigator {
    fn current_route(&self) -> RouteLocation {
        RouteLocation::start()
    }

    async fn push(&self, target: NavigationTarget) -> Result<RouteLocation> {
        self.navigations.borrow_mut().push(target.full_path());
        Ok(RouteLocation::start())
    }

    async fn replace(&self, target: NavigationTarget) -> Result<RouteLocation> {
        self.push(target).await
    }
}

struct TestContext {
    storage: Rc<MemoryStorage>,
    session: Rc<SessionStore>,
    notifier: Rc<RecordingNotifier>,
    navigator: Rc<RecordingNavigator>,
    pipeline: RequestPipeline<MockHttpTransport>,
}

impl TestContext {
    fn new() -> Self {
        let storage = Rc::new(MemoryStorage::new());
        let session = Rc::new(SessionStore::load(storage.clone()));
        let notifier = Rc::new(RecordingNotifier::new());
        let navigator = Rc::new(RecordingNavigator::default());
        let pipeline = RequestPipeline::new(
            MockHttpTransport::new(),
            session.clone(),
            notifier.clone(),
            navigator.clone(),
            PipelineSettings {
                base_url: BASE.to_string(),
                login_path: "/login".to_string(),
                display_offset: utc(),
            },
        );
        Self {
            storage,
            session,
            notifier,
            navigator,
            pipeline,
        }
    }

    fn logged_in() -> Self {
        let ctx = Self::new();
        ctx.session
            .set_token(SessionToken::new("old-access", "old-refresh"))
            .unwrap();
        ctx
    }

    fn transport(&self) -> &MockHttpTransport {
        self.pipeline.transport()
    }

    fn navigations(&self) -> Vec<String> {
        self.navigator.navigations.borrow().clone()
    }
}

// =========================================================
// 发出请求
// =========================================================

#[tokio::test]
async fn attaches_bearer_token_to_protected_requests() {
    let ctx = TestContext::logged_in();
    ctx.transport().mock_response(&url("/api/report"), 200, json!({ "ok": true }));

    ctx.pipeline.request(&ReportRequest).await.unwrap();

    let sent = ctx.transport().sent_to(&url("/api/report"));
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header(HEADER_AUTHORIZATION), Some("Bearer old-access"));
}

#[tokio::test]
async fn allow_listed_requests_carry_no_token() {
    let ctx = TestContext::logged_in();
    ctx.transport().mock_response(
        &url(SIGN_IN_PATH),
        200,
        json!({ "accessToken": "a", "refreshToken": "r" }),
    );

    let params = SignInParams {
        username: "admin".into(),
        password: "secret".into(),
        captcha: None,
    };
    let token = ctx.pipeline.request(&params).await.unwrap();

    assert_eq!(token, SessionToken::new("a", "r"));
    let sent = ctx.transport().sent_to(&url(SIGN_IN_PATH));
    assert_eq!(sent[0].header(HEADER_AUTHORIZATION), None);
    assert_eq!(sent[0].header(HEADER_CONTENT_TYPE), Some("application/json"));
    let body: Value = serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["username"], "admin");
}

#[tokio::test]
async fn builds_query_strings_and_path_params() {
    let ctx = TestContext::logged_in();
    let list_url = url("/api/system/user?keyword=a%20b&page=2&pageSize=20");
    ctx.transport()
        .mock_response(&list_url, 200, json!({ "list": [], "total": 0 }));
    let detail_url = url("/api/system/user/7");
    ctx.transport()
        .mock_response(&detail_url, 200, json!({ "id": 7, "username": "bob" }));

    let query = ListQuery {
        keyword: Some("a b".into()),
        ..ListQuery::page(2, 20)
    };
    let page = ctx
        .pipeline
        .request(&protocol::user::List(query))
        .await
        .unwrap();
    assert_eq!(page.total, 0);

    let user = ctx
        .pipeline
        .request(&protocol::user::Detail { id: 7 })
        .await
        .unwrap();
    assert_eq!(user.username, "bob");
    assert_eq!(ctx.transport().sent_to(&detail_url)[0].method, HttpMethod::Get);
}

// =========================================================
// 成功响应
// =========================================================

#[tokio::test]
async fn rewrites_timestamps_in_list_records() {
    let ctx = TestContext::logged_in();
    ctx.transport().mock_response(
        &url("/api/report"),
        200,
        json!({ "list": [{ "createdAt": "2024-01-01T00:00:00Z" }], "total": 1 }),
    );

    let body = ctx.pipeline.request(&ReportRequest).await.unwrap();

    assert_eq!(body["list"][0]["createdAt"], "2024-01-01 00:00:00");
}

#[tokio::test]
async fn empty_success_bodies_decode_as_null() {
    let ctx = TestContext::logged_in();
    ctx.transport()
        .mock_raw(&url("/api/report"), 204, Vec::new());

    let body = ctx.pipeline.request(&ReportRequest).await.unwrap();
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn stream_responses_are_returned_untouched() {
    let ctx = TestContext::logged_in();
    let raw = br#"{"createdAt":"2024-01-01T00:00:00Z"}"#.to_vec();
    ctx.transport().mock_raw(
        &url("/api/knowledge-base/kb%201/documents/doc-9"),
        200,
        raw.clone(),
    );

    let request = DownloadDocumentRequest {
        knowledge_base_id: "kb 1".into(),
        document_id: "doc-9".into(),
    };
    let bytes = ctx.pipeline.download(&request).await.unwrap();

    assert_eq!(bytes, raw);
}

#[tokio::test]
async fn invalid_json_is_a_decode_error() {
    let ctx = TestContext::logged_in();
    ctx.transport()
        .mock_raw(&url("/api/report"), 200, b"not json".to_vec());

    let err = ctx.pipeline.request(&ReportRequest).await.unwrap_err();
    assert!(matches!(err, ConsoleError::Decode(_)));
}

// =========================================================
// 错误响应
// =========================================================

#[tokio::test]
async fn error_messages_are_notified() {
    let ctx = TestContext::logged_in();
    ctx.transport().mock_response(
        &url("/api/report"),
        422,
        json!({ "error": { "message": ["name is required", "too short"] } }),
    );

    let err = ctx.pipeline.request(&ReportRequest).await.unwrap_err();

    assert_eq!(
        err,
        ConsoleError::api(422, vec!["name is required".into(), "too short".into()])
    );
    assert_eq!(ctx.notifier.errors(), vec!["name is required", "too short"]);
}

#[tokio::test]
async fn transport_failures_are_notified() {
    let ctx = TestContext::logged_in();

    let err = ctx.pipeline.request(&ReportRequest).await.unwrap_err();

    assert!(matches!(err, ConsoleError::Transport(_)));
    assert_eq!(ctx.notifier.errors().len(), 1);
}

// =========================================================
// 令牌刷新
// =========================================================

fn mock_refresh_success(ctx: &TestContext) {
    ctx.transport().mock_response(
        &url(REFRESH_TOKEN_PATH),
        200,
        json!({ "accessToken": "new-access", "refreshToken": "new-refresh" }),
    );
    ctx.transport()
        .mock_response(&url("/api/system/user/code"), 200, json!(["AC_100"]));
}

#[tokio::test]
async fn unauthorized_triggers_one_refresh_without_retry() {
    let ctx = TestContext::logged_in();
    ctx.transport()
        .mock_response(&url("/api/report"), 401, json!({ "message": "expired" }));
    mock_refresh_success(&ctx);

    let err = ctx.pipeline.request(&ReportRequest).await.unwrap_err();

    assert_eq!(err, ConsoleError::Unauthorized);
    assert_eq!(ctx.transport().sent_to(&url("/api/report")).len(), 1);

    let refresh = ctx.transport().sent_to(&url(REFRESH_TOKEN_PATH));
    assert_eq!(refresh.len(), 1);
    assert_eq!(refresh[0].header(HEADER_AUTHORIZATION), None);
    let body: Value = serde_json::from_str(refresh[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({ "refreshToken": "old-refresh" }));

    assert_eq!(
        ctx.session.token(),
        SessionToken::new("new-access", "new-refresh")
    );
    assert_eq!(ctx.session.access_codes(), vec!["AC_100".to_string()]);
    let codes = ctx.transport().sent_to(&url("/api/system/user/code"));
    assert_eq!(codes[0].header(HEADER_AUTHORIZATION), Some("Bearer new-access"));
    assert_eq!(ctx.notifier.successes(), vec![REFRESH_SUCCESS_MESSAGE]);
    assert!(ctx.navigations().is_empty());
}

#[tokio::test]
async fn refresh_rejection_clears_session_and_redirects_once() {
    let ctx = TestContext::logged_in();
    ctx.session.set_access_codes(vec!["AC_1".into()]);
    ctx.transport()
        .mock_response(&url("/api/report"), 401, json!({}));
    ctx.transport()
        .mock_response(&url(REFRESH_TOKEN_PATH), 401, json!({}));

    let err = ctx.pipeline.request(&ReportRequest).await.unwrap_err();

    assert_eq!(err, ConsoleError::SessionExpired);
    assert_eq!(ctx.session.token(), SessionToken::default());
    assert!(ctx.session.access_codes().is_empty());
    assert!(ctx.storage.get(STORAGE_TOKEN_KEY).is_none());
    assert_eq!(ctx.navigations(), vec!["/login".to_string()]);
    assert_eq!(ctx.notifier.errors(), vec![SESSION_EXPIRED_MESSAGE]);
    assert_eq!(ctx.transport().sent_to(&url(REFRESH_TOKEN_PATH)).len(), 1);
}

#[tokio::test]
async fn refresh_server_errors_are_terminal_too() {
    let ctx = TestContext::logged_in();
    ctx.transport()
        .mock_response(&url("/api/report"), 401, json!({}));
    ctx.transport().mock_response(
        &url(REFRESH_TOKEN_PATH),
        500,
        json!({ "error": "refresh store unavailable" }),
    );

    let err = ctx.pipeline.request(&ReportRequest).await.unwrap_err();

    assert_eq!(err, ConsoleError::SessionExpired);
    assert_eq!(
        ctx.notifier.errors(),
        vec!["refresh store unavailable", SESSION_EXPIRED_MESSAGE]
    );
    assert_eq!(ctx.navigations(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn missing_refresh_token_expires_without_calling_the_server() {
    let ctx = TestContext::new();
    ctx.session
        .set_token(SessionToken::new("only-access", ""))
        .unwrap();
    ctx.transport()
        .mock_response(&url("/api/report"), 401, json!({}));

    let err = ctx.pipeline.request(&ReportRequest).await.unwrap_err();

    assert_eq!(err, ConsoleError::SessionExpired);
    assert!(ctx.transport().sent_to(&url(REFRESH_TOKEN_PATH)).is_empty());
    assert_eq!(ctx.navigations(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn concurrent_unauthorized_responses_share_one_refresh() {
    let ctx = TestContext::logged_in();
    ctx.transport()
        .mock_response(&url("/api/report"), 401, json!({}));
    mock_refresh_success(&ctx);

    let (a, b) = futures::join!(
        ctx.pipeline.request(&ReportRequest),
        ctx.pipeline.request(&ReportRequest)
    );

    assert_eq!(a.unwrap_err(), ConsoleError::Unauthorized);
    assert_eq!(b.unwrap_err(), ConsoleError::Unauthorized);
    assert_eq!(ctx.transport().sent_to(&url("/api/report")).len(), 2);
    assert_eq!(ctx.transport().sent_to(&url(REFRESH_TOKEN_PATH)).len(), 1);
    assert_eq!(ctx.notifier.successes().len(), 1);

    // 刷新结束后，新的 401 会再次触发刷新
    ctx.pipeline.request(&ReportRequest).await.unwrap_err();
    assert_eq!(ctx.transport().sent_to(&url(REFRESH_TOKEN_PATH)).len(), 2);
}

#[tokio::test]
async fn concurrent_refresh_failure_expires_session_once() {
    let ctx = TestContext::logged_in();
    ctx.transport()
        .mock_response(&url("/api/report"), 401, json!({}));
    ctx.transport()
        .mock_response(&url(REFRESH_TOKEN_PATH), 401, json!({}));

    let (a, b) = futures::join!(
        ctx.pipeline.request(&ReportRequest),
        ctx.pipeline.request(&ReportRequest)
    );

    assert_eq!(a.unwrap_err(), ConsoleError::SessionExpired);
    assert_eq!(b.unwrap_err(), ConsoleError::SessionExpired);
    assert_eq!(ctx.navigations(), vec!["/login".to_string()]);
    assert_eq!(ctx.notifier.errors(), vec![SESSION_EXPIRED_MESSAGE]);
}

#[tokio::test]
async fn sign_in_rejection_is_reported_without_refresh() {
    let ctx = TestContext::new();
    ctx.transport().mock_response(
        &url(SIGN_IN_PATH),
        401,
        json!({ "message": "Invalid username or password" }),
    );

    let params = SignInParams {
        username: "admin".into(),
        password: "wrong".into(),
        captcha: None,
    };
    let err = ctx.pipeline.request(&params).await.unwrap_err();

    assert_eq!(err.status_code(), Some(401));
    assert_eq!(ctx.notifier.errors(), vec!["Invalid username or password"]);
    assert!(ctx.transport().sent_to(&url(REFRESH_TOKEN_PATH)).is_empty());
    assert!(ctx.navigations().is_empty());
}
