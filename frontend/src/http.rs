//! 请求模块
//!
//! - `transport`：HTTP 传输抽象（浏览器下由 gloo-net 实现）
//! - `message`：从错误响应中提取提示消息
//! - `pipeline`：统一的请求管道（鉴权头、时间格式化、令牌刷新、错误提示）

pub mod message;
pub mod pipeline;
pub mod transport;

pub use message::extract_messages;
pub use pipeline::{PipelineSettings, RequestPipeline, ResponseBody};
pub use transport::{HttpRequest, HttpResponse, HttpTransport};

#[cfg(test)]
mod tests;
