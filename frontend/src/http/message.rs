//! 错误消息提取
//!
//! 后端错误体的几种形状：
//! - `{ "error": "..." }`
//! - `{ "error": { "message": "..." | ["...", ...] } }`
//! - `{ "message": "..." | ["...", ...] }`

use serde_json::Value;

pub fn extract_messages(body: &[u8], status: u16) -> Vec<String> {
    let messages = serde_json::from_slice::<Value>(body)
        .map(|value| messages_from(&value))
        .unwrap_or_default();
    if messages.is_empty() {
        vec![format!("Request failed with status code {status}")]
    } else {
        messages
    }
}

fn messages_from(body: &Value) -> Vec<String> {
    match body.get("error") {
        Some(Value::String(message)) if !message.trim().is_empty() => {
            return vec![message.clone()];
        }
        Some(Value::Object(error)) => {
            let messages = error.get("message").map(text_list).unwrap_or_default();
            if !messages.is_empty() {
                return messages;
            }
        }
        _ => {}
    }
    body.get("message").map(text_list).unwrap_or_default()
}

fn text_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
