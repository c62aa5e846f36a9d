//! localStorage 适配

use crate::error::{ConsoleError, Result};
use crate::storage::KeyValueStorage;
use gloo_storage::{LocalStorage, Storage};

/// 浏览器 localStorage，值按原样（JSON 字符串）存取
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

impl KeyValueStorage for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        LocalStorage::raw().get_item(key).ok()?
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        LocalStorage::raw()
            .set_item(key, value)
            .map_err(|e| ConsoleError::Storage(format!("{e:?}")))
    }

    fn remove(&self, key: &str) -> Result<()> {
        LocalStorage::raw()
            .remove_item(key)
            .map_err(|e| ConsoleError::Storage(format!("{e:?}")))
    }
}
