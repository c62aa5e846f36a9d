//! 平台接口
//!
//! 计时与新窗口只在浏览器里有真实实现，核心逻辑通过这里的 trait 使用它们。

use async_trait::async_trait;
use std::cell::RefCell;
use std::time::Duration;

/// 异步等待
#[async_trait(?Send)]
pub trait Delay {
    async fn sleep(&self, duration: Duration);
}

/// 在新窗口中打开地址
pub trait WindowOpener {
    fn open(&self, url: &str);
}

/// 立即返回并记录等待时长
#[derive(Debug, Default)]
pub struct InstantDelay {
    slept: RefCell<Vec<Duration>>,
}

impl InstantDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Delay for InstantDelay {
    async fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}
