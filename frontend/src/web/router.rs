//! 浏览器历史与窗口
//!
//! 所有对 `window.history` / `window.location` 的访问都集中在这里。

use crate::platform::WindowOpener;
use crate::router::History;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// 基于 History API 的浏览历史
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserHistory;

impl History for BrowserHistory {
    fn location(&self) -> String {
        let Some(location) = web_sys::window().map(|w| w.location()) else {
            return "/".to_string();
        };
        let path = location.pathname().unwrap_or_else(|_| "/".to_string());
        let search = location.search().unwrap_or_default();
        format!("{path}{search}")
    }

    fn push(&self, full_path: &str) {
        if let Some(history) = web_sys::window().and_then(|w| w.history().ok()) {
            let _ = history.push_state_with_url(&JsValue::NULL, "", Some(full_path));
        }
    }

    fn replace(&self, full_path: &str) {
        if let Some(history) = web_sys::window().and_then(|w| w.history().ok()) {
            let _ = history.replace_state_with_url(&JsValue::NULL, "", Some(full_path));
        }
    }
}

/// 监听浏览器前进/后退
///
/// 回调在每次 `popstate` 时触发；闭包随页面存活，不会被释放。
pub fn on_popstate(callback: impl Fn() + 'static) {
    let closure = Closure::<dyn Fn()>::new(callback);
    if let Some(window) = web_sys::window() {
        let _ = window
            .add_event_listener_with_callback("popstate", closure.as_ref().unchecked_ref());
    }
    closure.forget();
}

pub fn set_document_title(title: &str) {
    if let Some(document) = web_sys::window().and_then(|w| w.document()) {
        document.set_title(title);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserWindow;

impl WindowOpener for BrowserWindow {
    fn open(&self, url: &str) {
        if let Some(window) = web_sys::window() {
            let _ = window.open_with_url_and_target(url, "_blank");
        }
    }
}
