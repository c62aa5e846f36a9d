//! 时间戳格式化模块
//!
//! 后端返回的 `createdAt` / `updatedAt` 为 RFC 3339 字符串（或毫秒时间戳），
//! 界面统一展示为 `YYYY-MM-DD HH:MM:SS`。

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde_json::Value;

/// 展示格式
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 需要格式化的字段名
pub const TIMESTAMP_FIELDS: [&str; 2] = ["createdAt", "updatedAt"];

/// 将单个时间值格式化为展示字符串
///
/// 支持 RFC 3339 字符串与毫秒时间戳，无法识别时返回 `None`。
pub fn format_timestamp(raw: &Value, offset: FixedOffset) -> Option<String> {
    let parsed = match raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim()).ok()?,
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?)?.fixed_offset(),
        _ => return None,
    };
    Some(
        parsed
            .with_timezone(&offset)
            .format(DISPLAY_FORMAT)
            .to_string(),
    )
}

/// 就地改写响应体中的时间字段
///
/// 只处理两种形状：顶层记录本身，以及顶层 `list` 数组中的每条记录。
/// 无法解析的值保持原样。
pub fn rewrite_timestamps(body: &mut Value, offset: FixedOffset) {
    let Value::Object(record) = body else {
        return;
    };

    if let Some(Value::Array(list)) = record.get_mut("list") {
        for item in list.iter_mut() {
            if let Value::Object(item) = item {
                rewrite_record(item, offset);
            }
        }
    }
    rewrite_record(record, offset);
}

fn rewrite_record(record: &mut serde_json::Map<String, Value>, offset: FixedOffset) {
    for field in TIMESTAMP_FIELDS {
        if let Some(value) = record.get_mut(field) {
            if let Some(formatted) = format_timestamp(value, offset) {
                *value = Value::String(formatted);
            }
        }
    }
}

/// 由分钟数构造时区偏移，超出范围时退回 UTC
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(utc)
}

pub fn utc() -> FixedOffset {
    Utc.fix()
}
