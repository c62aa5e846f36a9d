//! 基于 `gloo-net` 的 HTTP 传输层

use crate::error::{ConsoleError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use adminkit_shared::protocol::HttpMethod;
use async_trait::async_trait;
use gloo_net::http::{Method, RequestBuilder};

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTransport;

fn method_of(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn transport_error(e: gloo_net::Error) -> ConsoleError {
    ConsoleError::Transport(e.to_string())
}

#[async_trait(?Send)]
impl HttpTransport for FetchTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        let mut builder = RequestBuilder::new(&req.url).method(method_of(req.method));
        for (key, value) in &req.headers {
            builder = builder.header(key, value);
        }

        let request = match req.body {
            Some(body) => builder.body(body),
            None => builder.build(),
        }
        .map_err(transport_error)?;

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.binary().await.map_err(transport_error)?;
        Ok(HttpResponse::new(status, body))
    }
}
