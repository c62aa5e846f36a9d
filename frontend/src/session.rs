//! 会话状态
//!
//! 保存令牌、用户信息、权限码与可访问菜单。只有令牌会被持久化（`TOKEN` 键），
//! 其余字段在每次页面加载后由路由守卫重新拉取。

use crate::error::Result;
use crate::menu::MenuIndex;
use crate::observer::{Listeners, Subscription};
use crate::storage::{KeyValueStorage, load_json, save_json};
use adminkit_shared::{MenuInfo, STORAGE_TOKEN_KEY, SessionToken, UserInfo};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};

/// 权限检查进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessCheck {
    #[default]
    Unchecked,
    Checking,
    Checked,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub token: SessionToken,
    pub user_info: Option<UserInfo>,
    pub access_codes: Vec<String>,
    pub access_menus: Vec<MenuInfo>,
    pub user_roles: Vec<String>,
    pub access_check: AccessCheck,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TokenChanged,
    UserInfoChanged,
    AccessChanged,
    Reset,
}

pub struct SessionStore {
    storage: Rc<dyn KeyValueStorage>,
    state: RefCell<SessionState>,
    listeners: Listeners<SessionEvent>,
}

impl SessionStore {
    /// 从存储中恢复令牌
    pub fn load(storage: Rc<dyn KeyValueStorage>) -> Self {
        let token: SessionToken = load_json(storage.as_ref(), STORAGE_TOKEN_KEY).unwrap_or_default();
        debug!(has_token = token.has_access_token(), "session restored");
        Self {
            storage,
            state: RefCell::new(SessionState {
                token,
                ..Default::default()
            }),
            listeners: Listeners::new(),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self, listener: impl Fn(&SessionEvent) + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.listeners.unsubscribe(subscription)
    }

    // =========================================================
    // 令牌
    // =========================================================

    pub fn token(&self) -> SessionToken {
        self.state.borrow().token.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().token.has_access_token()
    }

    /// 更新并持久化令牌
    pub fn set_token(&self, token: SessionToken) -> Result<()> {
        save_json(self.storage.as_ref(), STORAGE_TOKEN_KEY, &token)?;
        self.state.borrow_mut().token = token;
        self.listeners.emit(&SessionEvent::TokenChanged);
        Ok(())
    }

    // =========================================================
    // 用户与权限
    // =========================================================

    pub fn user_info(&self) -> Option<UserInfo> {
        self.state.borrow().user_info.clone()
    }

    pub fn set_user_info(&self, info: UserInfo) {
        let roles = info
            .roles
            .iter()
            .map(|role| role.value.clone().unwrap_or_else(|| role.name.clone()))
            .collect();
        {
            let mut state = self.state.borrow_mut();
            state.user_info = Some(info);
            state.user_roles = roles;
        }
        self.listeners.emit(&SessionEvent::UserInfoChanged);
    }

    pub fn user_roles(&self) -> Vec<String> {
        self.state.borrow().user_roles.clone()
    }

    pub fn set_user_roles(&self, roles: Vec<String>) {
        self.state.borrow_mut().user_roles = roles;
        self.listeners.emit(&SessionEvent::UserInfoChanged);
    }

    pub fn access_codes(&self) -> Vec<String> {
        self.state.borrow().access_codes.clone()
    }

    pub fn set_access_codes(&self, codes: Vec<String>) {
        self.state.borrow_mut().access_codes = codes;
        self.listeners.emit(&SessionEvent::AccessChanged);
    }

    pub fn access_menus(&self) -> Vec<MenuInfo> {
        self.state.borrow().access_menus.clone()
    }

    pub fn set_access_menus(&self, menus: Vec<MenuInfo>) {
        self.state.borrow_mut().access_menus = menus;
        self.listeners.emit(&SessionEvent::AccessChanged);
    }

    pub fn access_check(&self) -> AccessCheck {
        self.state.borrow().access_check
    }

    pub fn is_access_checked(&self) -> bool {
        self.access_check() == AccessCheck::Checked
    }

    pub fn set_access_check(&self, check: AccessCheck) {
        self.state.borrow_mut().access_check = check;
    }

    /// 当前用户能否访问该路径
    ///
    /// 结尾的 `/数字` 视为 `/:id`；根路径总是可访问。
    pub fn has_access(&self, path: &str) -> bool {
        let path = normalize_id_segment(path);
        if path == "/" {
            return true;
        }
        let state = self.state.borrow();
        MenuIndex::new(&state.access_menus)
            .find_by_path(&path)
            .is_some()
    }

    /// 当前用户是否拥有某个权限标识，管理员拥有全部权限
    pub fn has_permission(&self, code: &str) -> bool {
        let state = self.state.borrow();
        let Some(user) = state.user_info.as_ref() else {
            return false;
        };
        user.is_admin || user.permissions().any(|p| p == code)
    }

    /// 在可访问菜单树中按路径查找菜单
    pub fn menu_by_path(&self, path: &str) -> Option<MenuInfo> {
        let state = self.state.borrow();
        MenuIndex::new(&state.access_menus)
            .find_by_path(path)
            .cloned()
    }

    /// 清空会话（登出或刷新失败）
    pub fn reset(&self) -> Result<()> {
        *self.state.borrow_mut() = SessionState::default();
        let removed = self.storage.remove(STORAGE_TOKEN_KEY);
        info!("session reset");
        self.listeners.emit(&SessionEvent::Reset);
        removed
    }
}

fn normalize_id_segment(path: &str) -> String {
    if let Some((head, last)) = path.rsplit_once('/') {
        if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) {
            return format!("{head}/:id");
        }
    }
    path.to_string()
}
