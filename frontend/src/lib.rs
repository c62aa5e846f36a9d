//! Adminkit 控制台前端
//!
//! 核心逻辑与平台无关，可以在原生环境下测试：
//! - `http`: 请求管道（鉴权头、时间格式化、令牌刷新、错误提示）
//! - `router`: 路由表与导航守卫
//! - `session` / `lock` / `preferences`: 持久化的状态容器
//! - `tabbar`: 多标签页
//! - `shell`: 把以上部分装配成一个控制台
//!
//! 浏览器适配层 `web` 与 UI 组件只在 wasm32 下编译。

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lock;
pub mod menu;
pub mod notify;
pub mod observer;
pub mod platform;
pub mod preferences;
pub mod router;
pub mod session;
pub mod shell;
pub mod storage;
pub mod tabbar;

// 浏览器原生 API 封装
#[cfg(target_arch = "wasm32")]
pub(crate) mod web {
    mod http;
    mod logging;
    mod notify;
    mod router;
    mod storage;
    mod timer;

    pub use http::FetchTransport;
    pub use logging::init_logging;
    pub use notify::{Toast, ToastNotifier};
    pub use router::{BrowserHistory, BrowserWindow, on_popstate, set_document_title};
    pub use storage::BrowserStorage;
    pub use timer::BrowserDelay;
}

#[cfg(target_arch = "wasm32")]
mod components {
    pub mod context;
    pub mod layout;
    pub mod login;
    pub mod tabbar;
}

#[cfg(target_arch = "wasm32")]
pub use app::{App, init_logging};

#[cfg(target_arch = "wasm32")]
mod app {
    use crate::components::context::{ConsoleContext, use_console};
    use crate::components::layout::{ConsoleLayout, Notifications};
    use crate::components::login::LoginPage;
    use crate::config::{AppConfig, BuildEnv};
    use crate::shell::{ConsoleShell, ShellAdapters};
    use crate::web::{
        BrowserDelay, BrowserHistory, BrowserStorage, FetchTransport, ToastNotifier, on_popstate,
    };
    use leptos::prelude::*;
    use leptos::task::spawn_local;
    use std::rc::Rc;
    use tracing::warn;

    pub use crate::web::init_logging;

    #[component]
    pub fn App() -> impl IntoView {
        // 1. 读取配置并装配控制台
        let config = AppConfig::from_env(&BuildEnv);
        let notifier = Rc::new(ToastNotifier::new());
        let toasts = notifier.toasts();
        let loading = notifier.loading();
        let shell = Rc::new(ConsoleShell::new(
            config,
            ShellAdapters {
                transport: FetchTransport,
                storage: Rc::new(BrowserStorage),
                history: Rc::new(BrowserHistory),
                notifier,
                delay: Rc::new(BrowserDelay),
            },
        ));

        // 2. 注入上下文
        provide_context(ConsoleContext::new(Rc::clone(&shell), toasts, loading));

        // 3. 首次导航，并跟随浏览器前进/后退
        {
            let shell = Rc::clone(&shell);
            spawn_local(async move {
                if let Err(e) = shell.start().await {
                    warn!(error = %e, "initial navigation failed");
                }
            });
        }
        let router = Rc::downgrade(shell.router());
        on_popstate(move || {
            let Some(router) = router.upgrade() else {
                return;
            };
            spawn_local(async move {
                if let Err(e) = router.sync_with_history().await {
                    warn!(error = %e, "history navigation failed");
                }
            });
        });

        view! {
            <Notifications />
            <RouteOutlet />
        }
    }

    #[component]
    fn RouteOutlet() -> impl IntoView {
        let ctx = use_console();
        let login_path = ctx.shell().config().login_path.clone();
        let on_login = move || ctx.route.get().path == login_path;

        view! {
            <Show when=on_login fallback=|| view! { <ConsoleLayout /> }>
                <LoginPage />
            </Show>
        }
    }
}
