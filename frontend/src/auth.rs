//! 认证服务
//!
//! 登录、注销、拉取用户信息与菜单。会话状态本身保存在 [`SessionStore`]，
//! 这里只负责调用接口并把结果写回会话和路由表。

use crate::error::Result;
use crate::http::{HttpTransport, RequestPipeline};
use crate::router::{AccessLoader, NavigationTarget, Navigator, RouteTable};
use crate::session::SessionStore;
use adminkit_shared::protocol::{AccessCodesRequest, UserInfoRequest, menu};
use adminkit_shared::{MenuInfo, SessionToken, SignInParams, UserInfo};
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info, warn};

pub struct AuthService<T> {
    pipeline: RequestPipeline<T>,
    session: Rc<SessionStore>,
    routes: Rc<RefCell<RouteTable>>,
    navigator: Rc<dyn Navigator>,
    login_path: String,
    home_path: String,
    login_loading: Cell<bool>,
}

impl<T: HttpTransport + 'static> AuthService<T> {
    pub fn new(
        pipeline: RequestPipeline<T>,
        routes: Rc<RefCell<RouteTable>>,
        navigator: Rc<dyn Navigator>,
        login_path: impl Into<String>,
        home_path: impl Into<String>,
    ) -> Self {
        Self {
            session: Rc::clone(pipeline.session()),
            pipeline,
            routes,
            navigator,
            login_path: login_path.into(),
            home_path: home_path.into(),
            login_loading: Cell::new(false),
        }
    }

    pub fn pipeline(&self) -> &RequestPipeline<T> {
        &self.pipeline
    }

    pub fn is_login_loading(&self) -> bool {
        self.login_loading.get()
    }

    /// 登录
    ///
    /// 拿到访问令牌后保存令牌、加载权限码、拉取用户信息，再跳转首页。
    /// 后端没有返回访问令牌时不做任何跳转，返回 `None`。
    pub async fn login(&self, params: &SignInParams) -> Result<Option<UserInfo>> {
        self.login_loading.set(true);
        let result = self.sign_in(params).await;
        self.login_loading.set(false);
        result
    }

    async fn sign_in(&self, params: &SignInParams) -> Result<Option<UserInfo>> {
        let token = self.pipeline.request(params).await?;
        if !token.has_access_token() {
            warn!(username = %params.username, "sign-in returned no access token");
            return Ok(None);
        }
        self.session.set_token(token)?;
        info!(username = %params.username, "signed in");

        let codes = self.pipeline.request(&AccessCodesRequest).await?;
        self.session.set_access_codes(codes);

        let user_info = self.fetch_user_info().await?;
        self.navigator
            .push(NavigationTarget::new(self.home_path.clone()))
            .await?;
        Ok(user_info)
    }

    /// 注销：清空会话并回到登录页
    ///
    /// `redirect` 为真时把当前地址带到登录页，登录后回到这里。
    pub async fn logout(&self, redirect: bool) -> Result<()> {
        self.session.reset()?;
        info!("signed out");

        let mut target = NavigationTarget::new(self.login_path.clone()).replace();
        if redirect {
            let current = self.navigator.current_route();
            if current.path != self.login_path {
                target = target.with_query(
                    "redirect",
                    urlencoding::encode(&current.full_path).into_owned(),
                );
            }
        }
        self.navigator.replace(target).await?;
        Ok(())
    }

    pub async fn fetch_user_info(&self) -> Result<Option<UserInfo>> {
        let Some(info) = self.pipeline.request(&UserInfoRequest).await? else {
            return Ok(None);
        };
        self.session.set_user_info(info.clone());
        Ok(Some(info))
    }

    /// 拉取菜单，合并进路由表并保存可访问菜单
    ///
    /// 返回后端下发的全部菜单（含禁用菜单与按钮）。
    pub async fn fetch_menu_list(&self) -> Result<Vec<MenuInfo>> {
        let menus = self.pipeline.request(&menu::List::default()).await?;
        let updated = self.routes.borrow_mut().apply_menus(&menus);
        debug!(menus = menus.len(), updated, "menus merged into routes");
        self.session.set_access_menus(routable_menus(&menus));
        Ok(menus)
    }

    pub async fn refresh_token(&self) -> Result<SessionToken> {
        self.pipeline.refresh_session().await
    }
}

/// 去掉禁用菜单与按钮（逐层处理子菜单）
fn routable_menus(menus: &[MenuInfo]) -> Vec<MenuInfo> {
    menus
        .iter()
        .filter(|menu| menu.is_routable())
        .map(|menu| MenuInfo {
            children: routable_menus(&menu.children),
            ..menu.clone()
        })
        .collect()
}

#[async_trait(?Send)]
impl<T: HttpTransport + 'static> AccessLoader for AuthService<T> {
    async fn fetch_user_info(&self) -> Result<Option<UserInfo>> {
        AuthService::fetch_user_info(self).await
    }

    async fn fetch_menu_list(&self) -> Result<Vec<MenuInfo>> {
        AuthService::fetch_menu_list(self).await
    }
}
