//! 锁屏状态
//!
//! 持久化在 `lock-state` 键下，刷新页面后仍保持锁定。

use crate::error::Result;
use crate::observer::{Listeners, Subscription};
use crate::storage::{KeyValueStorage, load_json, save_json};
use adminkit_shared::STORAGE_LOCK_KEY;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LockState {
    pub is_lock_screen: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_screen_password: Option<String>,
}

pub struct LockStore {
    storage: Rc<dyn KeyValueStorage>,
    state: RefCell<LockState>,
    listeners: Listeners<LockState>,
}

impl LockStore {
    pub fn load(storage: Rc<dyn KeyValueStorage>) -> Self {
        let state = load_json(storage.as_ref(), STORAGE_LOCK_KEY).unwrap_or_default();
        Self {
            storage,
            state: RefCell::new(state),
            listeners: Listeners::new(),
        }
    }

    pub fn state(&self) -> LockState {
        self.state.borrow().clone()
    }

    pub fn is_locked(&self) -> bool {
        self.state.borrow().is_lock_screen
    }

    pub fn subscribe(&self, listener: impl Fn(&LockState) + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.listeners.unsubscribe(subscription)
    }

    pub fn lock_screen(&self, password: &str) -> Result<()> {
        self.replace(LockState {
            is_lock_screen: true,
            lock_screen_password: Some(password.to_string()),
        })?;
        info!("screen locked");
        Ok(())
    }

    /// 密码正确时解锁并返回 `true`；未锁定时直接返回 `true`
    pub fn unlock_screen(&self, password: &str) -> Result<bool> {
        let matches = {
            let state = self.state.borrow();
            if !state.is_lock_screen {
                return Ok(true);
            }
            state.lock_screen_password.as_deref().unwrap_or_default() == password
        };
        if !matches {
            warn!("unlock rejected: wrong password");
            return Ok(false);
        }
        self.replace(LockState::default())?;
        info!("screen unlocked");
        Ok(true)
    }

    /// 无条件解除锁定（注销时使用）
    pub fn reset(&self) -> Result<()> {
        self.replace(LockState::default())
    }

    fn replace(&self, state: LockState) -> Result<()> {
        save_json(self.storage.as_ref(), STORAGE_LOCK_KEY, &state)?;
        *self.state.borrow_mut() = state.clone();
        self.listeners.emit(&state);
        Ok(())
    }
}
