//! 路由守卫
//!
//! - `CommonGuard`：记录已加载页面，驱动加载进度条
//! - `AccessGuard`：登录检查与首次进入时的权限初始化

use super::route::{NavigationTarget, RouteLocation, decode_component};
use crate::error::Result;
use crate::notify::Notifier;
use crate::session::{AccessCheck, SessionStore};
use adminkit_shared::{MenuInfo, UserInfo};
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, info};

/// 守卫的裁决结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(NavigationTarget),
}

#[async_trait(?Send)]
pub trait NavigationGuard {
    /// 导航确认前调用，可以改写目标的元信息
    async fn before_each(&self, to: &mut RouteLocation, from: &RouteLocation)
    -> Result<GuardDecision>;

    /// 导航完成后调用
    fn after_each(&self, _to: &RouteLocation) {}
}

/// 权限数据加载接口
#[async_trait(?Send)]
pub trait AccessLoader {
    async fn fetch_user_info(&self) -> Result<Option<UserInfo>>;
    /// 拉取菜单并合并进路由表，返回后端下发的全部菜单
    async fn fetch_menu_list(&self) -> Result<Vec<MenuInfo>>;
}

// =========================================================
// 通用守卫
// =========================================================

pub struct CommonGuard {
    notifier: Rc<dyn Notifier>,
    progress: bool,
    loaded_paths: RefCell<HashSet<String>>,
}

impl CommonGuard {
    pub fn new(notifier: Rc<dyn Notifier>, progress: bool) -> Self {
        Self {
            notifier,
            progress,
            loaded_paths: RefCell::new(HashSet::new()),
        }
    }

    pub fn is_loaded(&self, path: &str) -> bool {
        self.loaded_paths.borrow().contains(path)
    }
}

#[async_trait(?Send)]
impl NavigationGuard for CommonGuard {
    async fn before_each(
        &self,
        to: &mut RouteLocation,
        _from: &RouteLocation,
    ) -> Result<GuardDecision> {
        let loaded = self.is_loaded(&to.path);
        to.meta.loaded = Some(loaded);
        if !loaded && self.progress {
            self.notifier.start();
        }
        Ok(GuardDecision::Allow)
    }

    fn after_each(&self, to: &RouteLocation) {
        self.loaded_paths.borrow_mut().insert(to.path.clone());
        if self.progress {
            self.notifier.finish();
        }
    }
}

// =========================================================
// 权限守卫
// =========================================================

pub struct AccessGuard {
    session: Rc<SessionStore>,
    loader: Rc<dyn AccessLoader>,
    login_path: String,
    home_path: String,
}

impl AccessGuard {
    pub fn new(
        session: Rc<SessionStore>,
        loader: Rc<dyn AccessLoader>,
        login_path: impl Into<String>,
        home_path: impl Into<String>,
    ) -> Self {
        Self {
            session,
            loader,
            login_path: login_path.into(),
            home_path: home_path.into(),
        }
    }

    fn login_redirect(&self, to: &RouteLocation) -> NavigationTarget {
        let target = NavigationTarget::new(self.login_path.clone()).replace();
        if to.full_path == self.home_path {
            target
        } else {
            target.with_query("redirect", urlencoding::encode(&to.full_path).into_owned())
        }
    }

    async fn load_access(&self) -> Result<()> {
        if self.session.user_info().is_none() {
            self.loader.fetch_user_info().await?;
        }
        self.loader.fetch_menu_list().await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl NavigationGuard for AccessGuard {
    async fn before_each(
        &self,
        to: &mut RouteLocation,
        from: &RouteLocation,
    ) -> Result<GuardDecision> {
        if !self.session.is_logged_in() {
            if to.meta.ignores_access() || to.path == self.login_path {
                return Ok(GuardDecision::Allow);
            }
            debug!(to = %to.full_path, "no access token, redirecting to login");
            return Ok(GuardDecision::Redirect(self.login_redirect(to)));
        }

        if self.session.is_access_checked() {
            return Ok(GuardDecision::Allow);
        }

        self.session.set_access_check(AccessCheck::Checking);
        if let Err(e) = self.load_access().await {
            self.session.set_access_check(AccessCheck::Unchecked);
            return Err(e);
        }
        self.session.set_access_check(AccessCheck::Checked);

        let redirect = match from.query.get("redirect") {
            Some(redirect) => redirect.to_string(),
            None if to.path == self.home_path => self.home_path.clone(),
            None => to.full_path.clone(),
        };
        info!(redirect = %redirect, "access initialized");
        Ok(GuardDecision::Redirect(
            NavigationTarget::parse(&decode_component(&redirect)).replace(),
        ))
    }
}
