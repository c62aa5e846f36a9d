//! 运行时配置
//!
//! 负责从环境变量中读取配置，读不到就使用默认值。
//! 浏览器构建在编译期通过 `option_env!` 注入，测试使用 `MapEnv`。

use adminkit_shared::date::offset_from_minutes;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

// =========================================================
// 常量定义
// =========================================================

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_HOME_PATH: &str = "/dashboard/analytics";
pub const DEFAULT_APP_NAME: &str = "Adminkit";
pub const DEFAULT_REFRESH_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_REDIRECTS: usize = 8;

pub const ENV_API_BASE_URL: &str = "ADMINKIT_API_BASE_URL";
pub const ENV_LOGIN_PATH: &str = "ADMINKIT_LOGIN_PATH";
pub const ENV_HOME_PATH: &str = "ADMINKIT_HOME_PATH";
pub const ENV_REFRESH_DELAY_MS: &str = "ADMINKIT_REFRESH_DELAY_MS";
pub const ENV_TAB_MAX_COUNT: &str = "ADMINKIT_TAB_MAX_COUNT";
pub const ENV_PROGRESS: &str = "ADMINKIT_PROGRESS";
pub const ENV_UTC_OFFSET_MINUTES: &str = "ADMINKIT_UTC_OFFSET_MINUTES";
pub const ENV_APP_NAME: &str = "ADMINKIT_APP_NAME";

/// 抽象环境变量接口
pub trait EnvAdapter {
    fn var(&self, name: &str) -> Option<String>;
}

/// 基于 HashMap 的环境变量
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }
}

impl EnvAdapter for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// 编译期注入的环境变量
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildEnv;

impl EnvAdapter for BuildEnv {
    fn var(&self, name: &str) -> Option<String> {
        let value = match name {
            ENV_API_BASE_URL => option_env!("ADMINKIT_API_BASE_URL"),
            ENV_LOGIN_PATH => option_env!("ADMINKIT_LOGIN_PATH"),
            ENV_HOME_PATH => option_env!("ADMINKIT_HOME_PATH"),
            ENV_REFRESH_DELAY_MS => option_env!("ADMINKIT_REFRESH_DELAY_MS"),
            ENV_TAB_MAX_COUNT => option_env!("ADMINKIT_TAB_MAX_COUNT"),
            ENV_PROGRESS => option_env!("ADMINKIT_PROGRESS"),
            ENV_UTC_OFFSET_MINUTES => option_env!("ADMINKIT_UTC_OFFSET_MINUTES"),
            ENV_APP_NAME => option_env!("ADMINKIT_APP_NAME"),
            _ => None,
        };
        value.map(str::to_string)
    }
}

// =========================================================
// 配置结构体
// =========================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// 接口前缀，末尾不带 `/`
    pub api_base_url: String,
    pub login_path: String,
    /// 默认首页
    pub home_path: String,
    pub app_name: String,
    /// 页面刷新时卸载视图的时长
    pub refresh_delay_ms: u64,
    /// 标签页上限的初始值，<= 0 表示不限制
    pub tab_max_count: i32,
    /// 是否显示顶部加载进度条
    pub progress: bool,
    /// 时间字段展示用的时区偏移（分钟）
    pub utc_offset_minutes: i32,
    pub max_redirects: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            home_path: DEFAULT_HOME_PATH.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            refresh_delay_ms: DEFAULT_REFRESH_DELAY_MS,
            tab_max_count: 0,
            progress: true,
            utc_offset_minutes: 0,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl AppConfig {
    pub fn from_env(env: &impl EnvAdapter) -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: env
                .var(ENV_API_BASE_URL)
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            login_path: env
                .var(ENV_LOGIN_PATH)
                .filter(|v| v.starts_with('/'))
                .unwrap_or(defaults.login_path),
            home_path: env
                .var(ENV_HOME_PATH)
                .filter(|v| v.starts_with('/'))
                .unwrap_or(defaults.home_path),
            app_name: env
                .var(ENV_APP_NAME)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.app_name),
            refresh_delay_ms: parse_var(env, ENV_REFRESH_DELAY_MS)
                .unwrap_or(defaults.refresh_delay_ms),
            tab_max_count: parse_var(env, ENV_TAB_MAX_COUNT).unwrap_or(defaults.tab_max_count),
            progress: parse_var(env, ENV_PROGRESS).unwrap_or(defaults.progress),
            utc_offset_minutes: parse_var(env, ENV_UTC_OFFSET_MINUTES)
                .unwrap_or(defaults.utc_offset_minutes),
            max_redirects: defaults.max_redirects,
        }
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    pub fn display_offset(&self) -> FixedOffset {
        offset_from_minutes(self.utc_offset_minutes)
    }
}

fn parse_var<T: FromStr>(env: &impl EnvAdapter, name: &str) -> Option<T> {
    let raw = env.var(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, value = %raw, "ignoring unparseable config value");
            None
        }
    }
}
