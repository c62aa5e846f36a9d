//! 请求管道
//!
//! 所有接口调用都经过这里：
//! - 发出前：非白名单接口附加 `Authorization: Bearer <accessToken>`
//! - 2xx：JSON 响应体中的 `createdAt` / `updatedAt` 格式化；字节流原样返回
//! - 401（刷新接口）：清空会话、提示重新登录、跳转登录页
//! - 401（其他受保护接口）：刷新一次令牌，不重试原请求；并发的刷新合并为一次
//! - 其他状态（含白名单接口的 401）：提取错误消息逐条提示

use super::message::extract_messages;
use super::transport::{HttpRequest, HttpTransport};
use crate::config::AppConfig;
use crate::error::{ConsoleError, Result};
use crate::notify::Notifier;
use crate::router::{NavigationTarget, Navigator};
use crate::session::SessionStore;
use adminkit_shared::protocol::{
    AccessCodesRequest, ApiRequest, REFRESH_TOKEN_PATH, ResponseMode, expand_path,
    is_unprotected,
};
use adminkit_shared::{HEADER_AUTHORIZATION, RefreshTokenParams, SessionToken, rewrite_timestamps};
use chrono::FixedOffset;
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

// =========================================================
// 常量定义
// =========================================================

pub const SESSION_EXPIRED_MESSAGE: &str = "Login expired, please log in again";
pub const REFRESH_SUCCESS_MESSAGE: &str = "Login successful";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub base_url: String,
    pub login_path: String,
    pub display_offset: FixedOffset,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            login_path: config.login_path.clone(),
            display_offset: config.display_offset(),
        }
    }
}

/// 成功响应的内容
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Bytes(Vec<u8>),
}

type RefreshFuture = Shared<LocalBoxFuture<'static, Result<SessionToken>>>;

// =========================================================
// 管道实现
// =========================================================

pub struct RequestPipeline<T> {
    inner: Rc<PipelineInner<T>>,
}

impl<T> Clone for RequestPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

struct PipelineInner<T> {
    transport: T,
    session: Rc<SessionStore>,
    notifier: Rc<dyn Notifier>,
    navigator: Rc<dyn Navigator>,
    settings: PipelineSettings,
    refreshing: RefCell<Option<RefreshFuture>>,
}

impl<T: HttpTransport + 'static> RequestPipeline<T> {
    pub fn new(
        transport: T,
        session: Rc<SessionStore>,
        notifier: Rc<dyn Notifier>,
        navigator: Rc<dyn Navigator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            inner: Rc::new(PipelineInner {
                transport,
                session,
                notifier,
                navigator,
                settings,
                refreshing: RefCell::new(None),
            }),
        }
    }

    pub fn session(&self) -> &Rc<SessionStore> {
        &self.inner.session
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// 调用 JSON 接口并反序列化响应
    pub async fn request<R: ApiRequest>(&self, request: &R) -> Result<R::Response> {
        let http = self.inner.build(request)?;
        match self.send(http).await? {
            ResponseBody::Json(value) => Ok(serde_json::from_value(value)?),
            ResponseBody::Bytes(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }

    /// 调用字节流接口
    pub async fn download<R: ApiRequest>(&self, request: &R) -> Result<Vec<u8>> {
        let http = self.inner.build(request)?;
        match self.send(http).await? {
            ResponseBody::Bytes(bytes) => Ok(bytes),
            ResponseBody::Json(value) => Ok(value.to_string().into_bytes()),
        }
    }

    pub fn build<R: ApiRequest>(&self, request: &R) -> Result<HttpRequest> {
        self.inner.build(request)
    }

    /// 发送一个已经构造好的请求
    ///
    /// 受保护接口返回 401 时触发一次令牌刷新；刷新成功返回 `Unauthorized`
    /// （调用方可自行重试），刷新失败返回 `SessionExpired`。
    pub async fn send(&self, request: HttpRequest) -> Result<ResponseBody> {
        match self.inner.execute(request).await {
            Err(ConsoleError::Unauthorized) => match self.refresh_session().await {
                Ok(_) => Err(ConsoleError::Unauthorized),
                Err(_) => Err(ConsoleError::SessionExpired),
            },
            other => other,
        }
    }

    /// 刷新令牌
    ///
    /// 同一时间只有一个刷新请求在途，其余调用者共享它的结果。
    pub async fn refresh_session(&self) -> Result<SessionToken> {
        let refresh = {
            let mut slot = self.inner.refreshing.borrow_mut();
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!("joining in-flight token refresh");
                    in_flight.clone()
                }
                None => {
                    let inner = Rc::clone(&self.inner);
                    let refresh = async move { inner.run_refresh().await }
                        .boxed_local()
                        .shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        let result = refresh.clone().await;

        let mut slot = self.inner.refreshing.borrow_mut();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&refresh)) {
            *slot = None;
        }
        result
    }
}

impl<T: HttpTransport> PipelineInner<T> {
    fn build<R: ApiRequest>(&self, request: &R) -> Result<HttpRequest> {
        let path = expand_path(R::PATH, &request.path_params())?;
        let query = request.query()?;

        let mut url = format!("{}{}", self.settings.base_url, path);
        if !query.is_empty() {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&encoded.join("&"));
        }

        let mut http = HttpRequest::new(R::METHOD, url, R::PATH).with_mode(R::MODE);
        if let Some(body) = request.body()? {
            http = http.with_json(&body);
        }
        for (name, value) in request.headers() {
            http = http.with_header(name, &value);
        }
        Ok(http)
    }

    /// 发送并解释响应，不做令牌刷新
    async fn execute(&self, mut request: HttpRequest) -> Result<ResponseBody> {
        let protected = !is_unprotected(&request.schema_path);
        if protected {
            let token = self.session.token();
            if token.has_access_token() {
                request.headers.insert(
                    HEADER_AUTHORIZATION.to_string(),
                    format!("Bearer {}", token.access_token),
                );
            }
        }

        let is_refresh = request.schema_path.starts_with(REFRESH_TOKEN_PATH);
        let mode = request.mode;
        let method = request.method.as_str();
        let url = request.url.clone();

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(method, url = %url, error = %e, "request failed");
                self.notifier.error(&e.to_string());
                return Err(e);
            }
        };
        debug!(method, url = %url, status = response.status, "response received");

        match response.status {
            200..=299 => self.decode_success(response.body, mode),
            401 if is_refresh => {
                self.expire_session().await;
                Err(ConsoleError::SessionExpired)
            }
            401 if protected => Err(ConsoleError::Unauthorized),
            status => {
                let messages = extract_messages(&response.body, status);
                for message in &messages {
                    self.notifier.error(message);
                }
                Err(ConsoleError::api(status, messages))
            }
        }
    }

    fn decode_success(&self, body: Vec<u8>, mode: ResponseMode) -> Result<ResponseBody> {
        match mode {
            ResponseMode::Stream => Ok(ResponseBody::Bytes(body)),
            ResponseMode::Json => {
                if body.iter().all(u8::is_ascii_whitespace) {
                    return Ok(ResponseBody::Json(Value::Null));
                }
                let mut value: Value = serde_json::from_slice(&body)?;
                rewrite_timestamps(&mut value, self.settings.display_offset);
                Ok(ResponseBody::Json(value))
            }
        }
    }

    async fn run_refresh(&self) -> Result<SessionToken> {
        let refresh_token = self.session.token().refresh_token;
        if refresh_token.is_empty() {
            warn!("no refresh token available");
            self.expire_session().await;
            return Err(ConsoleError::SessionExpired);
        }

        let request = self.build(&RefreshTokenParams { refresh_token })?;
        let token = match self.execute(request).await {
            Ok(ResponseBody::Json(value)) => serde_json::from_value::<SessionToken>(value).ok(),
            Ok(ResponseBody::Bytes(_)) => None,
            Err(ConsoleError::SessionExpired) => return Err(ConsoleError::SessionExpired),
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                None
            }
        };

        let Some(token) = token.filter(SessionToken::has_access_token) else {
            self.expire_session().await;
            return Err(ConsoleError::SessionExpired);
        };

        self.session.set_token(token.clone())?;
        self.notifier.success(REFRESH_SUCCESS_MESSAGE);
        info!("access token refreshed");

        match self.load_access_codes().await {
            Ok(codes) => self.session.set_access_codes(codes),
            Err(e) => warn!(error = %e, "failed to reload access codes"),
        }
        // 刷新成功后停留在当前页面，不跳转首页，也不重放原请求
        Ok(token)
    }

    async fn load_access_codes(&self) -> Result<Vec<String>> {
        let request = self.build(&AccessCodesRequest)?;
        match self.execute(request).await? {
            ResponseBody::Json(value) => Ok(serde_json::from_value(value)?),
            ResponseBody::Bytes(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }

    /// 会话失效：清空会话、提示并跳转登录页
    async fn expire_session(&self) {
        warn!("session expired");
        if let Err(e) = self.session.reset() {
            warn!(error = %e, "failed to clear stored token");
        }
        self.notifier.error(SESSION_EXPIRED_MESSAGE);

        let target = NavigationTarget::new(self.settings.login_path.clone()).replace();
        if let Err(e) = self.navigator.replace(target).await {
            warn!(error = %e, "failed to navigate to login");
        }
    }
}
