//! 组件共享的上下文
//!
//! 控制台状态容器本身不是响应式的，这里把需要渲染的部分同步到信号上。

use crate::lock::LockState;
use crate::router::RouteLocation;
use crate::shell::ConsoleShell;
use crate::tabbar::{Tab, TabbarEvent};
use crate::web::{FetchTransport, Toast, set_document_title};
use adminkit_shared::MenuInfo;
use leptos::prelude::*;
use std::rc::Rc;

pub type AppShell = ConsoleShell<FetchTransport>;

#[derive(Clone, Copy)]
pub struct ConsoleContext {
    shell: StoredValue<Rc<AppShell>, LocalStorage>,
    pub route: RwSignal<RouteLocation>,
    pub tabs: RwSignal<Vec<Tab>>,
    /// keep-alive 页面名称
    pub cached: RwSignal<Vec<String>>,
    pub render_view: RwSignal<bool>,
    pub locked: RwSignal<bool>,
    pub menus: RwSignal<Vec<MenuInfo>>,
    pub toasts: RwSignal<Vec<Toast>>,
    pub loading: RwSignal<bool>,
}

impl ConsoleContext {
    pub fn new(
        shell: Rc<AppShell>,
        toasts: RwSignal<Vec<Toast>>,
        loading: RwSignal<bool>,
    ) -> Self {
        let ctx = Self {
            shell: StoredValue::new_local(Rc::clone(&shell)),
            route: RwSignal::new(shell.router().current()),
            tabs: RwSignal::new(shell.tabbar().tabs()),
            cached: RwSignal::new(shell.tabbar().cached_tabs()),
            render_view: RwSignal::new(shell.tabbar().render_route_view()),
            locked: RwSignal::new(shell.lock().is_locked()),
            menus: RwSignal::new(shell.session().access_menus()),
            toasts,
            loading,
        };
        ctx.bind(&shell);
        ctx
    }

    /// 把状态容器的变化同步到信号
    fn bind(&self, shell: &AppShell) {
        let Self {
            route,
            tabs,
            cached,
            render_view,
            locked,
            menus,
            ..
        } = *self;

        // 监听闭包只持有弱引用，避免与容器互相持有
        let preferences = Rc::downgrade(shell.preferences());
        let session = Rc::downgrade(shell.session());
        shell.router().subscribe(move |to| {
            if let Some(preferences) = preferences.upgrade() {
                set_document_title(&preferences.page_title(to));
            }
            if let Some(session) = session.upgrade() {
                menus.set(session.access_menus());
            }
            route.set(to.clone());
        });

        let tabbar = Rc::downgrade(shell.tabbar());
        shell.tabbar().subscribe(move |event| {
            let Some(tabbar) = tabbar.upgrade() else {
                return;
            };
            match event {
                TabbarEvent::TabsChanged => tabs.set(tabbar.tabs()),
                TabbarEvent::CacheChanged => cached.set(tabbar.cached_tabs()),
                TabbarEvent::RenderRouteViewChanged(visible) => render_view.set(*visible),
                _ => {}
            }
        });

        shell
            .lock()
            .subscribe(move |state: &LockState| locked.set(state.is_lock_screen));
    }

    pub fn shell(&self) -> Rc<AppShell> {
        self.shell.get_value()
    }
}

pub fn use_console() -> ConsoleContext {
    expect_context::<ConsoleContext>()
}
