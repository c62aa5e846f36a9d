//! 偏好设置
//!
//! 整份设置以 JSON 持久化在 `preferences-store` 键下。局部更新使用深合并：
//! 补丁中的对象逐层合并，其余值直接覆盖。

use crate::config::AppConfig;
use crate::error::{ConsoleError, Result};
use crate::observer::{Listeners, Subscription};
use crate::router::RouteLocation;
use crate::storage::{KeyValueStorage, load_json, save_json};
use adminkit_shared::STORAGE_PREFERENCES_KEY;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

// =========================================================
// 数据模型
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "en-US")]
    EnUs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthPageLayout {
    PanelLeft,
    PanelCenter,
    #[default]
    PanelRight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppPreferences {
    pub name: String,
    pub locale: Locale,
    /// 页面标题是否跟随路由
    pub dynamic_title: bool,
    pub auth_page_layout: AuthPageLayout,
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            name: "Adminkit".to_string(),
            locale: Locale::default(),
            dynamic_title: true,
            auth_page_layout: AuthPageLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemePreferences {
    pub mode: ThemeMode,
    pub primary: String,
    pub success: String,
    pub warning: String,
    pub error: String,
    pub info: String,
    pub radius: String,
}

impl Default for ThemePreferences {
    fn default() -> Self {
        Self {
            mode: ThemeMode::default(),
            primary: "#1677ff".to_string(),
            success: "#52c41a".to_string(),
            warning: "#faad14".to_string(),
            error: "#ff4d4f".to_string(),
            info: "#909399".to_string(),
            radius: "0.5".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabbarPreferences {
    pub enable: bool,
    pub show_icon: bool,
    /// 标签页数量上限，<= 0 表示不限制
    pub max_count: i32,
}

impl Default for TabbarPreferences {
    fn default() -> Self {
        Self {
            enable: true,
            show_icon: true,
            max_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransitionPreferences {
    pub enable: bool,
    pub name: String,
    /// 页面切换时显示顶部进度条
    pub progress: bool,
}

impl Default for TransitionPreferences {
    fn default() -> Self {
        Self {
            enable: true,
            name: "fade-slide".to_string(),
            progress: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub app: AppPreferences,
    pub theme: ThemePreferences,
    pub tabbar: TabbarPreferences,
    pub transition: TransitionPreferences,
}

impl Preferences {
    /// 以启动配置为默认值
    pub fn from_config(config: &AppConfig) -> Self {
        let mut preferences = Self::default();
        preferences.app.name = config.app_name.clone();
        preferences.tabbar.max_count = config.tab_max_count;
        preferences.transition.progress = config.progress;
        preferences
    }

    pub fn is_dark(&self) -> bool {
        self.theme.mode == ThemeMode::Dark
    }

    /// 页面标题：`<路由标题>-<应用名>`，路由没有标题或关闭动态标题时只用应用名
    pub fn page_title(&self, route: &RouteLocation) -> String {
        match route.meta.title.as_deref() {
            Some(title) if self.app.dynamic_title && !title.is_empty() => {
                format!("{}-{}", title, self.app.name)
            }
            _ => self.app.name.clone(),
        }
    }
}

// =========================================================
// 状态容器
// =========================================================

pub struct PreferencesStore {
    storage: Rc<dyn KeyValueStorage>,
    defaults: Preferences,
    state: RefCell<Preferences>,
    listeners: Listeners<Preferences>,
}

impl PreferencesStore {
    /// 读取已保存的设置，缺失字段使用 `defaults` 补齐
    pub fn load(storage: Rc<dyn KeyValueStorage>, defaults: Preferences) -> Self {
        let state = match load_json::<Value>(storage.as_ref(), STORAGE_PREFERENCES_KEY) {
            Some(saved) => merged(&defaults, &saved).unwrap_or_else(|e| {
                warn!(error = %e, "ignoring saved preferences");
                defaults.clone()
            }),
            None => defaults.clone(),
        };
        Self {
            storage,
            defaults,
            state: RefCell::new(state),
            listeners: Listeners::new(),
        }
    }

    pub fn get(&self) -> Preferences {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self, listener: impl Fn(&Preferences) + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.listeners.unsubscribe(subscription)
    }

    /// 深合并一个 JSON 补丁，例如 `{"theme": {"mode": "dark"}}`
    ///
    /// 合并结果无法解析为设置时返回错误，当前设置保持不变。
    pub fn update(&self, patch: &Value) -> Result<()> {
        let next = merged(&self.state.borrow(), patch)?;
        debug!(%patch, "preferences updated");
        self.replace(next)
    }

    pub fn reset(&self) -> Result<()> {
        self.replace(self.defaults.clone())
    }

    /// 在亮色与暗色之间切换；跟随系统时切到暗色
    pub fn toggle_theme_mode(&self) -> Result<()> {
        let mut next = self.get();
        next.theme.mode = if next.is_dark() {
            ThemeMode::Light
        } else {
            ThemeMode::Dark
        };
        self.replace(next)
    }

    pub fn set_theme_color(&self, color: &str) -> Result<()> {
        let mut next = self.get();
        next.theme.primary = color.to_string();
        self.replace(next)
    }

    pub fn set_locale(&self, locale: Locale) -> Result<()> {
        let mut next = self.get();
        next.app.locale = locale;
        self.replace(next)
    }

    pub fn set_auth_page_layout(&self, layout: AuthPageLayout) -> Result<()> {
        let mut next = self.get();
        next.app.auth_page_layout = layout;
        self.replace(next)
    }

    pub fn page_title(&self, route: &RouteLocation) -> String {
        self.state.borrow().page_title(route)
    }

    fn replace(&self, next: Preferences) -> Result<()> {
        save_json(self.storage.as_ref(), STORAGE_PREFERENCES_KEY, &next)?;
        *self.state.borrow_mut() = next.clone();
        self.listeners.emit(&next);
        Ok(())
    }
}

fn merged(base: &Preferences, patch: &Value) -> Result<Preferences> {
    let mut value = serde_json::to_value(base)?;
    deep_merge(&mut value, patch);
    serde_json::from_value(value).map_err(|e| ConsoleError::Decode(e.to_string()))
}

fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RouteMeta;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn store() -> (Rc<MemoryStorage>, PreferencesStore) {
        let storage = Rc::new(MemoryStorage::new());
        let store = PreferencesStore::load(storage.clone(), Preferences::default());
        (storage, store)
    }

    fn route_titled(title: Option<&str>) -> RouteLocation {
        RouteLocation {
            meta: RouteMeta {
                title: title.map(str::to_string),
                ..Default::default()
            },
            ..RouteLocation::start()
        }
    }

    #[test]
    fn update_merges_nested_fields() {
        let (storage, store) = store();

        store
            .update(&json!({ "theme": { "mode": "dark" }, "tabbar": { "maxCount": 5 } }))
            .unwrap();

        let prefs = store.get();
        assert_eq!(prefs.theme.mode, ThemeMode::Dark);
        assert_eq!(prefs.theme.primary, ThemePreferences::default().primary);
        assert_eq!(prefs.tabbar.max_count, 5);
        assert!(prefs.tabbar.show_icon);

        let reloaded = PreferencesStore::load(storage, Preferences::default());
        assert_eq!(reloaded.get(), prefs);
    }

    #[test]
    fn invalid_patch_is_rejected() {
        let (_, store) = store();
        let err = store
            .update(&json!({ "tabbar": { "maxCount": "many" } }))
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Decode(_)));
        assert_eq!(store.get(), Preferences::default());
    }

    #[test]
    fn partial_saved_record_is_filled_from_defaults() {
        let storage = MemoryStorage::new()
            .with_entry(STORAGE_PREFERENCES_KEY, r#"{"app":{"locale":"en-US"}}"#);
        let defaults = Preferences {
            app: AppPreferences {
                name: "Console".into(),
                ..Default::default()
            },
            ..Default::default()
        };

        let store = PreferencesStore::load(Rc::new(storage), defaults);

        let prefs = store.get();
        assert_eq!(prefs.app.locale, Locale::EnUs);
        assert_eq!(prefs.app.name, "Console");
    }

    #[test]
    fn toggle_and_reset() {
        let (_, store) = store();
        store.update(&json!({ "theme": { "mode": "auto" } })).unwrap();

        store.toggle_theme_mode().unwrap();
        assert!(store.get().is_dark());
        store.toggle_theme_mode().unwrap();
        assert_eq!(store.get().theme.mode, ThemeMode::Light);

        store.set_theme_color("#ff0000").unwrap();
        store.set_locale(Locale::EnUs).unwrap();
        store.set_auth_page_layout(AuthPageLayout::PanelCenter).unwrap();
        assert_eq!(store.get().theme.primary, "#ff0000");

        store.reset().unwrap();
        assert_eq!(store.get(), Preferences::default());
    }

    #[test]
    fn page_title_follows_route() {
        let (_, store) = store();
        assert_eq!(store.page_title(&route_titled(Some("Users"))), "Users-Adminkit");
        assert_eq!(store.page_title(&route_titled(None)), "Adminkit");

        store.update(&json!({ "app": { "dynamicTitle": false } })).unwrap();
        assert_eq!(store.page_title(&route_titled(Some("Users"))), "Adminkit");
    }

    #[test]
    fn defaults_come_from_config() {
        let config = AppConfig {
            app_name: "Ops Console".into(),
            tab_max_count: 12,
            progress: false,
            ..AppConfig::default()
        };
        let prefs = Preferences::from_config(&config);
        assert_eq!(prefs.app.name, "Ops Console");
        assert_eq!(prefs.tabbar.max_count, 12);
        assert!(!prefs.transition.progress);
    }
}
