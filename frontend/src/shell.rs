//! 控制台装配
//!
//! 把会话、请求管道、路由、标签页与偏好设置连接起来：
//! - 导航完成后记录标签页
//! - 偏好设置中的标签页上限同步到标签页状态
//! - 请求管道与权限守卫通过 [`RouterHandle`] 使用路由器
//!
//! 平台相关的部分（HTTP、存储、浏览历史、计时）由调用方以适配器注入。

use crate::api::ConsoleApi;
use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::error::Result;
use crate::http::{HttpTransport, PipelineSettings, RequestPipeline};
use crate::lock::LockStore;
use crate::notify::Notifier;
use crate::platform::Delay;
use crate::preferences::{Preferences, PreferencesStore};
use crate::router::{
    AccessGuard, CommonGuard, History, NOT_FOUND_ROUTE, NavigationGuard, NavigationTarget,
    Navigator, RouteLocation, RouteMeta, RouteRecord, RouteTable, Router, RouterHandle,
};
use crate::session::SessionStore;
use crate::storage::KeyValueStorage;
use crate::tabbar::{RefreshTarget, Tab, TabbarStore};
use adminkit_shared::{SignInParams, UserInfo};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{info, warn};

/// 平台适配器
pub struct ShellAdapters<T> {
    pub transport: T,
    pub storage: Rc<dyn KeyValueStorage>,
    pub history: Rc<dyn History>,
    pub notifier: Rc<dyn Notifier>,
    pub delay: Rc<dyn Delay>,
}

pub struct ConsoleShell<T> {
    config: AppConfig,
    session: Rc<SessionStore>,
    preferences: Rc<PreferencesStore>,
    lock: Rc<LockStore>,
    tabbar: Rc<TabbarStore>,
    router: Rc<Router>,
    auth: Rc<AuthService<T>>,
    api: ConsoleApi<T>,
}

impl<T: HttpTransport + 'static> ConsoleShell<T> {
    pub fn new(config: AppConfig, adapters: ShellAdapters<T>) -> Self {
        let ShellAdapters {
            transport,
            storage,
            history,
            notifier,
            delay,
        } = adapters;

        let session = Rc::new(SessionStore::load(Rc::clone(&storage)));
        let preferences = Rc::new(PreferencesStore::load(
            Rc::clone(&storage),
            Preferences::from_config(&config),
        ));
        let lock = Rc::new(LockStore::load(storage));
        let initial = preferences.get();

        let tabbar = Rc::new(TabbarStore::new(
            Rc::clone(&notifier),
            delay,
            config.refresh_delay(),
        ));
        tabbar.set_max_count(initial.tabbar.max_count);

        let routes = Rc::new(RefCell::new(console_routes(&config)));
        let handle = RouterHandle::detached();
        let navigator: Rc<dyn Navigator> = Rc::new(handle.clone());

        let pipeline = RequestPipeline::new(
            transport,
            Rc::clone(&session),
            Rc::clone(&notifier),
            Rc::clone(&navigator),
            PipelineSettings::from_config(&config),
        );
        let auth = Rc::new(AuthService::new(
            pipeline.clone(),
            Rc::clone(&routes),
            navigator,
            config.login_path.clone(),
            config.home_path.clone(),
        ));

        let common: Rc<dyn NavigationGuard> = Rc::new(CommonGuard::new(
            Rc::clone(&notifier),
            initial.transition.progress,
        ));
        let access: Rc<dyn NavigationGuard> = Rc::new(AccessGuard::new(
            Rc::clone(&session),
            auth.clone(),
            config.login_path.clone(),
            config.home_path.clone(),
        ));
        let router = Rc::new(Router::new(
            routes,
            vec![common, access],
            history,
            config.max_redirects,
        ));
        handle.attach(&router);

        {
            let tabbar = Rc::clone(&tabbar);
            router.subscribe(move |to| {
                tabbar.add_tab(Tab::from_route(to));
            });
        }
        {
            let tabbar = Rc::clone(&tabbar);
            preferences.subscribe(move |prefs| tabbar.set_max_count(prefs.tabbar.max_count));
        }

        Self {
            config,
            session,
            preferences,
            lock,
            tabbar,
            router,
            auth,
            api: ConsoleApi::new(pipeline),
        }
    }

    // =========================================================
    // 访问器
    // =========================================================

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &Rc<SessionStore> {
        &self.session
    }

    pub fn preferences(&self) -> &Rc<PreferencesStore> {
        &self.preferences
    }

    pub fn lock(&self) -> &Rc<LockStore> {
        &self.lock
    }

    pub fn tabbar(&self) -> &Rc<TabbarStore> {
        &self.tabbar
    }

    pub fn router(&self) -> &Rc<Router> {
        &self.router
    }

    pub fn auth(&self) -> &Rc<AuthService<T>> {
        &self.auth
    }

    pub fn api(&self) -> &ConsoleApi<T> {
        &self.api
    }

    // =========================================================
    // 生命周期
    // =========================================================

    /// 打开固定标签页，并按浏览器当前地址完成首次导航
    pub async fn start(&self) -> Result<RouteLocation> {
        self.tabbar
            .set_affix_tabs(self.router.routes().borrow().affix_routes());
        let location = self.router.sync_with_history().await?;
        // 菜单可能把更多路由标记为固定
        self.tabbar
            .set_affix_tabs(self.router.routes().borrow().affix_routes());
        info!(path = %location.full_path, "console started");
        Ok(location)
    }

    pub async fn login(&self, params: &SignInParams) -> Result<Option<UserInfo>> {
        self.auth.login(params).await
    }

    /// 注销并解除锁屏
    pub async fn logout(&self) -> Result<()> {
        if let Err(e) = self.lock.reset() {
            warn!(error = %e, "failed to clear lock state");
        }
        self.auth.logout(true).await
    }

    pub async fn navigate(&self, target: NavigationTarget) -> Result<RouteLocation> {
        self.router.navigate(target).await
    }

    /// 重新渲染当前页面
    pub async fn refresh_current(&self) {
        self.tabbar
            .refresh(RefreshTarget::Current(self.router.current()))
            .await;
    }

    pub async fn close_tab(&self, tab: &Tab) -> Result<()> {
        self.tabbar.close_tab(tab, self.router.as_ref()).await
    }

    pub fn page_title(&self) -> String {
        self.preferences.page_title(&self.router.current())
    }
}

// =========================================================
// 路由表
// =========================================================

fn titled(title: &str) -> RouteMeta {
    RouteMeta {
        title: Some(title.to_string()),
        ..Default::default()
    }
}

/// 控制台内置路由
///
/// 菜单接口返回后，同路径的记录会合并菜单上的元信息与重定向。
pub fn console_routes(config: &AppConfig) -> RouteTable {
    RouteTable::new(vec![
        RouteRecord::new("root", "/").with_redirect(config.home_path.clone()),
        RouteRecord::new("login", config.login_path.clone()).with_meta(RouteMeta {
            ignore_access: Some(true),
            hide_in_tab: Some(true),
            ..titled("Login")
        }),
        RouteRecord::new("dashboard", "/dashboard")
            .with_parent("root")
            .with_redirect(config.home_path.clone()),
        RouteRecord::new("analytics", config.home_path.clone())
            .with_parent("dashboard")
            .with_meta(RouteMeta {
                affix_tab: Some(true),
                ..titled("Analytics")
            }),
        RouteRecord::new("system", "/system")
            .with_parent("root")
            .with_meta(titled("System")),
        RouteRecord::new("user", "/system/user")
            .with_parent("system")
            .with_meta(RouteMeta {
                keep_alive: Some(true),
                ..titled("Users")
            }),
        RouteRecord::new("user-detail", "/system/user/:id")
            .with_parent("system")
            .with_meta(RouteMeta {
                max_num_of_open_tab: Some(3),
                ..titled("User Detail")
            }),
        RouteRecord::new("role", "/system/role")
            .with_parent("system")
            .with_meta(titled("Roles")),
        RouteRecord::new("dept", "/system/dept")
            .with_parent("system")
            .with_meta(titled("Departments")),
        RouteRecord::new("menu", "/system/menu")
            .with_parent("system")
            .with_meta(titled("Menus")),
        RouteRecord::new("dict", "/system/dict")
            .with_parent("system")
            .with_meta(titled("Dictionaries")),
        RouteRecord::new("system-knowledge-base", "/system/knowledge-base")
            .with_parent("system")
            .with_meta(titled("Knowledge Bases")),
        RouteRecord::new("knowledge-base", "/knowledge-base")
            .with_parent("root")
            .with_meta(titled("Knowledge Base")),
        RouteRecord::new("assistant", "/assistant")
            .with_parent("root")
            .with_meta(titled("Assistants")),
        RouteRecord::new("profile", "/profile")
            .with_parent("root")
            .with_meta(titled("Profile")),
        RouteRecord::new(NOT_FOUND_ROUTE, "/*").with_meta(RouteMeta {
            ignore_access: Some(true),
            hide_in_tab: Some(true),
            ..titled("Not Found")
        }),
    ])
}
