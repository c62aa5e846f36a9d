//! 标签页管理
//!
//! 记录已打开的页面标签，负责去重、数量上限淘汰、固定、排序、批量关闭，
//! 并据此推导出需要保持存活（keep-alive）的页面组件名称集合。
//!
//! 两种顺序：
//! - 存储顺序：`raw_tabs()`，即插入与拖拽后的顺序
//! - 展示顺序：`tabs()`，固定标签页（按 `affix_tab_order` 升序，稳定排序）在前，其余按存储顺序

use crate::error::Result;
use crate::notify::Notifier;
use crate::observer::{Listeners, Subscription};
use crate::platform::{Delay, WindowOpener};
use crate::router::{
    MatchedRoute, NavigationTarget, Navigator, Query, RouteLocation, RouteMeta,
    route::decode_component,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error};

// =========================================================
// 标签页
// =========================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    /// 唯一标识，见 [`tab_key_of`]
    pub key: String,
    pub name: String,
    pub path: String,
    pub full_path: String,
    pub query: Query,
    pub params: BTreeMap<String, String>,
    pub matched: Vec<MatchedRoute>,
    pub meta: RouteMeta,
}

impl Tab {
    pub fn from_route(route: &RouteLocation) -> Self {
        Self {
            key: tab_key_of(route),
            name: route.name.clone(),
            path: route.path.clone(),
            full_path: route.full_path.clone(),
            query: route.query.clone(),
            params: route.params.clone(),
            matched: route.matched.clone(),
            meta: route.meta.clone(),
        }
    }

    pub fn is_affix(&self) -> bool {
        self.meta.is_affix()
    }

    /// 自身与匹配链上任一环都没有设置 `hide_in_tab`
    pub fn is_shown(&self) -> bool {
        !self.meta.is_hidden_in_tab() && self.matched.iter().all(|m| !m.meta.is_hidden_in_tab())
    }

    /// 标签页上展示的标题
    pub fn title(&self) -> &str {
        self.meta
            .new_tab_title
            .as_deref()
            .or(self.meta.title.as_deref())
            .unwrap_or(&self.name)
    }

    /// 切换到该标签页的导航目标（替换历史记录）
    pub fn target(&self) -> NavigationTarget {
        NavigationTarget {
            path: self.path.clone(),
            query: self.query.clone(),
            replace: true,
        }
    }

    fn resolved_key(&self) -> String {
        if self.key.is_empty() {
            derive_key(&self.path, &self.full_path, &self.query, &self.meta)
        } else {
            self.key.clone()
        }
    }
}

impl From<&RouteLocation> for Tab {
    fn from(route: &RouteLocation) -> Self {
        Tab::from_route(route)
    }
}

/// 由路由位置计算标签页 key
///
/// 优先使用 `pageKey` 查询参数（重复时取第一个）；其次当 `full_path_key`
/// 为 false 时使用 `path`，否则使用 `full_path`。结果做 URL 解码，解码失败保留原文。
pub fn tab_key_of(route: &RouteLocation) -> String {
    derive_key(&route.path, &route.full_path, &route.query, &route.meta)
}

fn derive_key(path: &str, full_path: &str, query: &Query, meta: &RouteMeta) -> String {
    let raw = match query.get("pageKey").filter(|k| !k.is_empty()) {
        Some(page_key) => page_key,
        None if !meta.uses_full_path_key() => path,
        None if full_path.is_empty() => path,
        None => full_path,
    };
    decode_component(raw)
}

// =========================================================
// 右键菜单与事件
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TabMenuAction {
    Close,
    Affix,
    Maximize,
    Reload,
    OpenInNewWindow,
    CloseLeft,
    CloseRight,
    CloseOther,
    CloseAll,
}

impl TabMenuAction {
    pub const ALL: [TabMenuAction; 9] = [
        TabMenuAction::Close,
        TabMenuAction::Affix,
        TabMenuAction::Maximize,
        TabMenuAction::Reload,
        TabMenuAction::OpenInNewWindow,
        TabMenuAction::CloseLeft,
        TabMenuAction::CloseRight,
        TabMenuAction::CloseOther,
        TabMenuAction::CloseAll,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabbarEvent {
    TabsChanged,
    CacheChanged,
    RenderRouteViewChanged(bool),
    MenuListChanged,
    UpdateTimeChanged(i64),
}

/// 刷新目标
#[derive(Debug, Clone)]
pub enum RefreshTarget {
    /// 当前页面：卸载视图并显示加载进度条
    Current(RouteLocation),
    /// 指定路由名称：只把它临时移出缓存
    Name(String),
}

// =========================================================
// 状态容器
// =========================================================

#[derive(Debug, Clone)]
struct TabbarState {
    tabs: Vec<Tab>,
    cached: BTreeSet<String>,
    exclude: BTreeSet<String>,
    drag_end_index: u64,
    render_route_view: bool,
    menu_list: Vec<TabMenuAction>,
    update_time: i64,
    max_count: i32,
}

impl Default for TabbarState {
    fn default() -> Self {
        Self {
            tabs: Vec::new(),
            cached: BTreeSet::new(),
            exclude: BTreeSet::new(),
            drag_end_index: 0,
            render_route_view: true,
            menu_list: TabMenuAction::ALL.to_vec(),
            update_time: 0,
            max_count: 0,
        }
    }
}

pub struct TabbarStore {
    state: RefCell<TabbarState>,
    notifier: Rc<dyn Notifier>,
    delay: Rc<dyn Delay>,
    refresh_delay: Duration,
    listeners: Listeners<TabbarEvent>,
}

impl TabbarStore {
    pub fn new(notifier: Rc<dyn Notifier>, delay: Rc<dyn Delay>, refresh_delay: Duration) -> Self {
        Self {
            state: RefCell::new(TabbarState::default()),
            notifier,
            delay,
            refresh_delay,
            listeners: Listeners::new(),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&TabbarEvent) + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.listeners.unsubscribe(subscription)
    }

    // =========================================================
    // 快照
    // =========================================================

    /// 展示顺序
    pub fn tabs(&self) -> Vec<Tab> {
        let state = self.state.borrow();
        let mut tabs = sorted_affix(&state.tabs);
        tabs.extend(state.tabs.iter().filter(|t| !t.is_affix()).cloned());
        tabs
    }

    pub fn affix_tabs(&self) -> Vec<Tab> {
        sorted_affix(&self.state.borrow().tabs)
    }

    /// 存储顺序
    pub fn raw_tabs(&self) -> Vec<Tab> {
        self.state.borrow().tabs.clone()
    }

    /// 需要保持存活的组件名称（已去掉正在刷新的）
    pub fn cached_tabs(&self) -> Vec<String> {
        let state = self.state.borrow();
        state.cached.difference(&state.exclude).cloned().collect()
    }

    pub fn exclude_cached_tabs(&self) -> Vec<String> {
        self.state.borrow().exclude.iter().cloned().collect()
    }

    pub fn render_route_view(&self) -> bool {
        self.state.borrow().render_route_view
    }

    pub fn drag_end_index(&self) -> u64 {
        self.state.borrow().drag_end_index
    }

    pub fn menu_list(&self) -> Vec<TabMenuAction> {
        self.state.borrow().menu_list.clone()
    }

    pub fn set_menu_list(&self, list: Vec<TabMenuAction>) {
        self.state.borrow_mut().menu_list = list;
        self.listeners.emit(&TabbarEvent::MenuListChanged);
    }

    pub fn update_time(&self) -> i64 {
        self.state.borrow().update_time
    }

    /// 记录一次外部更新（毫秒时间戳），订阅者据此刷新而无需深度比较
    pub fn set_update_time(&self, millis: i64) {
        self.state.borrow_mut().update_time = millis;
        self.listeners.emit(&TabbarEvent::UpdateTimeChanged(millis));
    }

    pub fn max_count(&self) -> i32 {
        self.state.borrow().max_count
    }

    /// 标签页数量上限，<= 0 表示不限制
    pub fn set_max_count(&self, max_count: i32) {
        self.state.borrow_mut().max_count = max_count;
    }

    pub fn tab_key_of(&self, route: &RouteLocation) -> String {
        tab_key_of(route)
    }

    pub fn get_tab_by_key(&self, key: &str) -> Option<Tab> {
        self.tabs().into_iter().find(|t| t.key == key)
    }

    // =========================================================
    // 增加
    // =========================================================

    /// 打开（或更新）一个标签页
    pub fn add_tab(&self, candidate: Tab) -> Tab {
        let mut tab = candidate;
        tab.key = tab.resolved_key();
        if !tab.is_shown() {
            return tab;
        }

        let result = {
            let mut state = self.state.borrow_mut();
            match state.tabs.iter().position(|t| t.key == tab.key) {
                None => {
                    evict_for(&mut state, &tab);
                    state.tabs.push(tab.clone());
                    tab
                }
                Some(index) => {
                    let current = &state.tabs[index];
                    let mut merged = tab.clone();
                    merged.meta = current.meta.merged(&tab.meta);
                    if current.meta.affix_tab.is_some() {
                        merged.meta.affix_tab = current.meta.affix_tab;
                    }
                    if current.meta.new_tab_title.is_some() {
                        merged.meta.new_tab_title = current.meta.new_tab_title.clone();
                    }
                    state.tabs[index] = merged.clone();
                    merged
                }
            }
        };

        self.tabs_changed();
        result
    }

    /// 把路由标记为固定并打开
    pub fn set_affix_tabs(&self, routes: Vec<RouteLocation>) {
        for mut route in routes {
            route.meta.affix_tab = Some(true);
            self.add_tab(Tab::from_route(&route));
        }
    }

    // =========================================================
    // 关闭
    // =========================================================

    /// 关闭标签页
    ///
    /// 关闭的是当前页面时，先切换到展示顺序中的下一个（没有则上一个）标签页再移除。
    /// 固定标签页不会被关闭。
    pub async fn close_tab(&self, tab: &Tab, navigator: &dyn Navigator) -> Result<()> {
        let key = tab.resolved_key();
        let pinned = self
            .find_raw(&key)
            .map(|stored| stored.is_affix())
            .unwrap_or_else(|| tab.is_affix());
        if pinned {
            debug!(key = %key, "pinned tab cannot be closed");
            return Ok(());
        }

        let active_key = tab_key_of(&navigator.current_route());
        if active_key != key {
            self.remove_keys(&HashSet::from([key]));
            return Ok(());
        }

        let display = self.tabs();
        let Some(index) = display.iter().position(|t| t.key == key) else {
            return Ok(());
        };
        let neighbour = display
            .get(index + 1)
            .or_else(|| index.checked_sub(1).and_then(|i| display.get(i)));
        let Some(next) = neighbour else {
            error!("Failed to close the tab; only one tab remains open.");
            return Ok(());
        };

        navigator.replace(next.target()).await?;
        self.remove_keys(&HashSet::from([key]));
        Ok(())
    }

    /// 按 key（可能是 URL 编码后的）关闭标签页
    pub async fn close_tab_by_key(&self, key: &str, navigator: &dyn Navigator) -> Result<()> {
        let key = decode_component(key);
        match self.find_raw(&key) {
            Some(tab) => self.close_tab(&tab, navigator).await,
            None => Ok(()),
        }
    }

    /// 只保留固定标签页（没有则保留第一个），并切换到第一个标签页
    pub async fn close_all_tabs(&self, navigator: &dyn Navigator) -> Result<()> {
        {
            let mut state = self.state.borrow_mut();
            let mut kept: Vec<Tab> = state.tabs.iter().filter(|t| t.is_affix()).cloned().collect();
            if kept.is_empty() {
                kept.extend(state.tabs.first().cloned());
            }
            state.tabs = kept;
        }
        self.tabs_changed();

        if let Some(first) = self.tabs().into_iter().next() {
            navigator.replace(first.target()).await?;
        }
        Ok(())
    }

    pub fn close_left_tabs(&self, tab: &Tab) {
        let display = self.tabs();
        let Some(index) = self.display_index(&display, tab) else {
            return;
        };
        self.remove_unpinned(&display[..index]);
    }

    pub fn close_right_tabs(&self, tab: &Tab) {
        let display = self.tabs();
        let Some(index) = self.display_index(&display, tab) else {
            return;
        };
        self.remove_unpinned(&display[index + 1..]);
    }

    pub fn close_other_tabs(&self, tab: &Tab) {
        let key = tab.resolved_key();
        let others: Vec<Tab> = self.tabs().into_iter().filter(|t| t.key != key).collect();
        self.remove_unpinned(&others);
    }

    // =========================================================
    // 固定与排序
    // =========================================================

    /// 固定标签页并移动到固定分组的末尾
    pub fn pin_tab(&self, tab: &Tab) {
        self.set_pinned(tab, true);
    }

    /// 取消固定并移动到普通分组的开头
    pub fn unpin_tab(&self, tab: &Tab) {
        self.set_pinned(tab, false);
    }

    pub fn toggle_tab_pin(&self, tab: &Tab) {
        let key = tab.resolved_key();
        let pinned = self
            .find_raw(&key)
            .map(|stored| stored.is_affix())
            .unwrap_or_else(|| tab.is_affix());
        self.set_pinned(tab, !pinned);
    }

    /// 在存储顺序中移动标签页
    pub fn sort_tabs(&self, old_index: usize, new_index: usize) {
        {
            let mut state = self.state.borrow_mut();
            if old_index >= state.tabs.len() {
                return;
            }
            let tab = state.tabs.remove(old_index);
            let new_index = new_index.min(state.tabs.len());
            state.tabs.insert(new_index, tab);
            state.drag_end_index += 1;
        }
        self.listeners.emit(&TabbarEvent::TabsChanged);
    }

    // =========================================================
    // 标题
    // =========================================================

    pub fn set_tab_title(&self, tab: &Tab, title: impl Into<String>) {
        let key = tab.resolved_key();
        let found = {
            let mut state = self.state.borrow_mut();
            match state.tabs.iter_mut().find(|t| t.key == key) {
                Some(stored) => {
                    stored.meta.new_tab_title = Some(title.into());
                    true
                }
                None => false,
            }
        };
        if found {
            self.tabs_changed();
        }
    }

    pub fn reset_tab_title(&self, tab: &Tab) {
        let key = tab.resolved_key();
        let found = {
            let mut state = self.state.borrow_mut();
            match state.tabs.iter_mut().find(|t| t.key == key) {
                Some(stored) => stored.meta.new_tab_title.take().is_some(),
                None => false,
            }
        };
        if found {
            self.tabs_changed();
        }
    }

    // =========================================================
    // 刷新
    // =========================================================

    /// 强制重新挂载页面组件
    pub async fn refresh(&self, target: RefreshTarget) {
        match target {
            RefreshTarget::Current(route) => {
                let name = route.name;
                debug!(name = %name, "refreshing current view");
                self.state.borrow_mut().exclude.insert(name.clone());
                self.listeners.emit(&TabbarEvent::CacheChanged);
                self.set_render_route_view(false);
                self.notifier.start();

                self.delay.sleep(self.refresh_delay).await;

                self.state.borrow_mut().exclude.remove(&name);
                self.listeners.emit(&TabbarEvent::CacheChanged);
                self.set_render_route_view(true);
                self.notifier.finish();
            }
            RefreshTarget::Name(name) => {
                self.state.borrow_mut().exclude.insert(name.clone());
                self.listeners.emit(&TabbarEvent::CacheChanged);

                self.delay.sleep(self.refresh_delay).await;

                self.state.borrow_mut().exclude.remove(&name);
                self.listeners.emit(&TabbarEvent::CacheChanged);
            }
        }
    }

    pub fn open_tab_in_new_window(&self, tab: &Tab, opener: &dyn WindowOpener) {
        let url = if tab.full_path.is_empty() {
            &tab.path
        } else {
            &tab.full_path
        };
        opener.open(url);
    }

    // =========================================================
    // 内部方法
    // =========================================================

    fn find_raw(&self, key: &str) -> Option<Tab> {
        self.state
            .borrow()
            .tabs
            .iter()
            .find(|t| t.key == key)
            .cloned()
    }

    fn display_index(&self, display: &[Tab], tab: &Tab) -> Option<usize> {
        let key = tab.resolved_key();
        display.iter().position(|t| t.key == key)
    }

    fn remove_unpinned(&self, tabs: &[Tab]) {
        let keys: HashSet<String> = tabs
            .iter()
            .filter(|t| !t.is_affix())
            .map(|t| t.key.clone())
            .collect();
        if !keys.is_empty() {
            self.remove_keys(&keys);
        }
    }

    /// 按 key 批量移除，固定标签页除外
    fn remove_keys(&self, keys: &HashSet<String>) {
        self.state
            .borrow_mut()
            .tabs
            .retain(|t| t.is_affix() || !keys.contains(&t.key));
        self.tabs_changed();
    }

    fn set_pinned(&self, tab: &Tab, pinned: bool) {
        let key = tab.resolved_key();
        let (old_index, new_index) = {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.tabs.iter().position(|t| t.key == key) else {
                return;
            };
            let mut updated = tab.clone();
            updated.key = key;
            updated.meta.affix_tab = Some(pinned);
            updated.meta.title = state.tabs[index].meta.title.clone();
            state.tabs[index] = updated;

            let rest: Vec<&Tab> = state
                .tabs
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, t)| t)
                .collect();
            let target = if pinned {
                rest.iter().rposition(|t| t.is_affix()).map_or(0, |p| p + 1)
            } else {
                rest.iter().position(|t| !t.is_affix()).unwrap_or(rest.len())
            };
            (index, target)
        };
        self.update_cache();
        self.sort_tabs(old_index, new_index);
    }

    fn set_render_route_view(&self, render: bool) {
        self.state.borrow_mut().render_route_view = render;
        self.listeners
            .emit(&TabbarEvent::RenderRouteViewChanged(render));
    }

    fn tabs_changed(&self) {
        self.update_cache();
        self.listeners.emit(&TabbarEvent::TabsChanged);
    }

    /// 根据当前标签页重新计算缓存集合
    ///
    /// 对每个 keep-alive 标签页，收集匹配链上除根布局以外的名称以及自身名称。
    fn update_cache(&self) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let mut cached = BTreeSet::new();
            for tab in state.tabs.iter().filter(|t| t.meta.is_keep_alive()) {
                for matched in tab.matched.iter().skip(1) {
                    if !matched.name.is_empty() {
                        cached.insert(matched.name.clone());
                    }
                }
                if !tab.name.is_empty() {
                    cached.insert(tab.name.clone());
                }
            }
            let changed = cached != state.cached;
            state.cached = cached;
            changed
        };
        if changed {
            self.listeners.emit(&TabbarEvent::CacheChanged);
        }
    }
}

fn sorted_affix(tabs: &[Tab]) -> Vec<Tab> {
    let mut affix: Vec<Tab> = tabs.iter().filter(|t| t.is_affix()).cloned().collect();
    affix.sort_by_key(|t| t.meta.affix_order());
    affix
}

/// 为新标签页腾出位置
fn evict_for(state: &mut TabbarState, tab: &Tab) {
    let per_route = tab
        .meta
        .max_open()
        .filter(|max| state.tabs.iter().filter(|t| t.name == tab.name).count() >= *max);

    if per_route.is_some() {
        if let Some(index) = state.tabs.iter().position(|t| t.name == tab.name) {
            let evicted = state.tabs.remove(index);
            debug!(key = %evicted.key, route = %tab.name, "evicted tab over per-route limit");
        }
    } else if state.max_count > 0 && state.tabs.len() >= state.max_count as usize {
        if let Some(index) = state.tabs.iter().position(|t| !t.is_affix()) {
            let evicted = state.tabs.remove(index);
            debug!(key = %evicted.key, max = state.max_count, "evicted oldest tab");
        }
    }
}

#[cfg(test)]
mod tests;
