//! 错误定义
//!
//! 请求管道、路由与各个状态容器共用同一个错误类型。
//! 错误需要在合并的刷新请求之间共享，因此实现了 `Clone`。

use adminkit_shared::protocol::SharedError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// 401：访问令牌失效（非刷新接口），可以通过刷新令牌恢复
    #[error("unauthorized")]
    Unauthorized,
    /// 刷新令牌失败，会话已被清空
    #[error("session expired, please log in again")]
    SessionExpired,
    /// 其他非 2xx 响应，`messages` 为已经展示给用户的错误消息
    #[error("request failed with status {status}: {}", messages.join("; "))]
    Api { status: u16, messages: Vec<String> },
    /// 网络层失败（请求未得到响应）
    #[error("network error: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("failed to build request: {0}")]
    Request(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("navigation error: {0}")]
    Navigation(String),
    #[error("too many redirects while navigating to {0}")]
    RedirectLoop(String),
    #[error("no route matches {0}")]
    RouteNotFound(String),
}

impl ConsoleError {
    pub fn api(status: u16, messages: Vec<String>) -> Self {
        Self::Api { status, messages }
    }

    /// 对应的 HTTP 状态码（仅限由响应产生的错误）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ConsoleError::Unauthorized | ConsoleError::SessionExpired => Some(401),
            ConsoleError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 机器可读的错误代码
    pub fn error_code(&self) -> &'static str {
        match self {
            ConsoleError::Unauthorized => "UNAUTHORIZED",
            ConsoleError::SessionExpired => "SESSION_EXPIRED",
            ConsoleError::Api { .. } => "API_ERROR",
            ConsoleError::Transport(_) => "NETWORK_ERROR",
            ConsoleError::Decode(_) => "DECODE_ERROR",
            ConsoleError::Request(_) => "REQUEST_ERROR",
            ConsoleError::Storage(_) => "STORAGE_ERROR",
            ConsoleError::Navigation(_) => "NAVIGATION_ERROR",
            ConsoleError::RedirectLoop(_) => "REDIRECT_LOOP",
            ConsoleError::RouteNotFound(_) => "ROUTE_NOT_FOUND",
        }
    }

    /// 面向用户的错误消息
    pub fn messages(&self) -> Vec<String> {
        match self {
            ConsoleError::Api { messages, .. } => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<SharedError> for ConsoleError {
    fn from(e: SharedError) -> Self {
        ConsoleError::Request(e.to_string())
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        ConsoleError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
