//! 路由模块
//!
//! - `route`：路由表、路由位置、查询参数
//! - `guard`：通用守卫与权限守卫
//!
//! [`Router`] 依次运行守卫、跟随重定向、更新浏览历史并通知订阅者。

pub mod guard;
pub mod route;

pub use guard::{AccessGuard, AccessLoader, CommonGuard, GuardDecision, NavigationGuard};
pub use route::{
    MatchedRoute, NOT_FOUND_ROUTE, NavigationTarget, Query, RouteLocation, RouteMeta,
    RouteRecord, RouteTable,
};

use crate::error::{ConsoleError, Result};
use crate::observer::{Listeners, Subscription};
use async_trait::async_trait;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

// =========================================================
// 接口定义
// =========================================================

/// 导航接口
///
/// 标签页与请求管道只依赖这个接口，而不是具体的路由器。
#[async_trait(?Send)]
pub trait Navigator {
    fn current_route(&self) -> RouteLocation;
    async fn push(&self, target: NavigationTarget) -> Result<RouteLocation>;
    async fn replace(&self, target: NavigationTarget) -> Result<RouteLocation>;
}

/// 浏览历史接口
pub trait History {
    /// 当前地址（路径 + 查询串）
    fn location(&self) -> String;
    fn push(&self, full_path: &str);
    fn replace(&self, full_path: &str);
}

/// 内存中的浏览历史
#[derive(Debug)]
pub struct MemoryHistory {
    entries: RefCell<Vec<String>>,
}

impl MemoryHistory {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: RefCell::new(vec![initial.to_string()]),
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }
}

impl History for MemoryHistory {
    fn location(&self) -> String {
        self.entries.borrow().last().cloned().unwrap_or_else(|| "/".to_string())
    }

    fn push(&self, full_path: &str) {
        self.entries.borrow_mut().push(full_path.to_string());
    }

    fn replace(&self, full_path: &str) {
        let mut entries = self.entries.borrow_mut();
        match entries.last_mut() {
            Some(last) => *last = full_path.to_string(),
            None => entries.push(full_path.to_string()),
        }
    }
}

// =========================================================
// 路由器
// =========================================================

pub struct Router {
    routes: Rc<RefCell<RouteTable>>,
    guards: Vec<Rc<dyn NavigationGuard>>,
    history: Rc<dyn History>,
    current: RefCell<RouteLocation>,
    listeners: Listeners<RouteLocation>,
    max_redirects: usize,
}

impl Router {
    pub fn new(
        routes: Rc<RefCell<RouteTable>>,
        guards: Vec<Rc<dyn NavigationGuard>>,
        history: Rc<dyn History>,
        max_redirects: usize,
    ) -> Self {
        Self {
            routes,
            guards,
            history,
            current: RefCell::new(RouteLocation::start()),
            listeners: Listeners::new(),
            max_redirects,
        }
    }

    pub fn routes(&self) -> Rc<RefCell<RouteTable>> {
        Rc::clone(&self.routes)
    }

    pub fn current(&self) -> RouteLocation {
        self.current.borrow().clone()
    }

    /// 订阅导航完成事件
    pub fn subscribe(&self, listener: impl Fn(&RouteLocation) + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.listeners.unsubscribe(subscription)
    }

    /// 按浏览器当前地址完成首次导航（或响应前进/后退）
    pub async fn sync_with_history(&self) -> Result<RouteLocation> {
        let location = self.history.location();
        self.navigate(NavigationTarget::parse(&location).replace())
            .await
    }

    pub fn resolve(&self, full_path: &str) -> Option<RouteLocation> {
        self.routes.borrow().resolve(full_path)
    }

    /// 执行一次导航
    ///
    /// 守卫按注册顺序运行，第一个重定向生效；重定向次数超过上限时报错。
    /// 路由记录自带的 `redirect` 同样计入重定向次数。
    pub async fn navigate(&self, target: NavigationTarget) -> Result<RouteLocation> {
        let requested = target.full_path();
        let mut target = target;
        let mut replace = target.replace;
        let mut hops = 0;

        loop {
            let full_path = target.full_path();
            let mut to = self
                .resolve(&full_path)
                .ok_or_else(|| ConsoleError::RouteNotFound(full_path.clone()))?;
            let from = self.current();

            let decision = match to.redirect.clone() {
                Some(redirect) => GuardDecision::Redirect(NavigationTarget::parse(&redirect)),
                None => self.run_guards(&mut to, &from).await?,
            };

            match decision {
                GuardDecision::Allow => {
                    if replace {
                        self.history.replace(&to.full_path);
                    } else {
                        self.history.push(&to.full_path);
                    }
                    *self.current.borrow_mut() = to.clone();
                    for guard in &self.guards {
                        guard.after_each(&to);
                    }
                    debug!(path = %to.full_path, "navigation confirmed");
                    self.listeners.emit(&to);
                    return Ok(to);
                }
                GuardDecision::Redirect(next) => {
                    hops += 1;
                    if hops > self.max_redirects {
                        warn!(requested = %requested, "redirect limit exceeded");
                        return Err(ConsoleError::RedirectLoop(requested));
                    }
                    debug!(from = %full_path, to = %next.full_path(), "navigation redirected");
                    replace = replace || next.replace;
                    target = next;
                }
            }
        }
    }

    async fn run_guards(
        &self,
        to: &mut RouteLocation,
        from: &RouteLocation,
    ) -> Result<GuardDecision> {
        for guard in &self.guards {
            if let GuardDecision::Redirect(next) = guard.before_each(to, from).await? {
                return Ok(GuardDecision::Redirect(next));
            }
        }
        Ok(GuardDecision::Allow)
    }
}

#[async_trait(?Send)]
impl Navigator for Router {
    fn current_route(&self) -> RouteLocation {
        self.current()
    }

    async fn push(&self, target: NavigationTarget) -> Result<RouteLocation> {
        self.navigate(target).await
    }

    async fn replace(&self, target: NavigationTarget) -> Result<RouteLocation> {
        self.navigate(target.replace()).await
    }
}

/// 路由器的弱引用
///
/// 权限守卫经由请求管道间接依赖导航接口，而路由器又持有守卫，
/// 这里用弱引用打断循环。句柄可以先创建、在路由器建好后再绑定，
/// 克隆出的句柄共享同一个绑定。
#[derive(Clone, Default)]
pub struct RouterHandle(Rc<RefCell<Weak<Router>>>);

impl RouterHandle {
    pub fn new(router: Weak<Router>) -> Self {
        Self(Rc::new(RefCell::new(router)))
    }

    /// 尚未绑定路由器的句柄
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn attach(&self, router: &Rc<Router>) {
        *self.0.borrow_mut() = Rc::downgrade(router);
    }

    fn upgrade(&self) -> Result<Rc<Router>> {
        self.0
            .borrow()
            .upgrade()
            .ok_or_else(|| ConsoleError::Navigation("router is no longer available".into()))
    }
}

#[async_trait(?Send)]
impl Navigator for RouterHandle {
    fn current_route(&self) -> RouteLocation {
        self.upgrade()
            .map(|router| router.current())
            .unwrap_or_else(|_| RouteLocation::start())
    }

    async fn push(&self, target: NavigationTarget) -> Result<RouteLocation> {
        self.upgrade()?.navigate(target).await
    }

    async fn replace(&self, target: NavigationTarget) -> Result<RouteLocation> {
        self.upgrade()?.navigate(target.replace()).await
    }
}
