use crate::error::Result;
use adminkit_shared::HEADER_CONTENT_TYPE;
use adminkit_shared::protocol::{HttpMethod, ResponseMode};
use serde_json::Value;
use std::collections::HashMap;

#[cfg(test)]
use std::cell::RefCell;

// =========================================================
// 核心抽象层 (HTTP Interface Abstraction)
// =========================================================

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// 接口的路径模板（未替换参数），用于鉴权白名单判断
    pub schema_path: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub mode: ResponseMode,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>, schema_path: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            schema_path: schema_path.into(),
            headers: HashMap::new(),
            body: None,
            mode: ResponseMode::Json,
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.headers
            .insert(HEADER_CONTENT_TYPE.to_string(), "application/json".to_string());
        self.body = Some(body.to_string());
        self
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// 网络失败返回 `ConsoleError::Transport`，任何状态码的响应都返回 `Ok`
#[async_trait::async_trait(?Send)]
pub trait HttpTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse>;
}

// =========================================================
// 测试工具: MockHttpTransport
// =========================================================

/// 按 URL 返回预设响应
///
/// 同一 URL 可预设多个响应，依次返回，最后一个会被重复使用。
/// 每次发送前让出一次执行权，以便并发请求交错执行。
#[cfg(test)]
pub struct MockHttpTransport {
    responses: RefCell<HashMap<String, Vec<HttpResponse>>>,
    pub requests: RefCell<Vec<HttpRequest>>,
}

#[cfg(test)]
impl MockHttpTransport {
    pub fn new() -> Self {
        Self {
            responses: RefCell::new(HashMap::new()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn mock_response(&self, url: &str, status: u16, body: Value) {
        self.mock_raw(url, status, body.to_string().into_bytes());
    }

    pub fn mock_raw(&self, url: &str, status: u16, body: Vec<u8>) {
        self.responses
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push(HttpResponse::new(status, body));
    }

    pub fn sent_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[async_trait::async_trait(?Send)]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        tokio::task::yield_now().await;
        self.requests.borrow_mut().push(req.clone());

        let mut responses = self.responses.borrow_mut();
        match responses.get_mut(&req.url) {
            Some(queue) if queue.len() > 1 => Ok(queue.remove(0)),
            Some(queue) if !queue.is_empty() => Ok(queue[0].clone()),
            _ => Err(crate::error::ConsoleError::Transport(format!(
                "no mock for {}",
                req.url
            ))),
        }
    }
}
