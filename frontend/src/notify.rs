//! 全局提示
//!
//! 请求管道、路由守卫与标签页刷新只通过 [`Notifier`] 与界面交互：
//! 顶部加载进度条（start / finish）以及成功、错误提示。

use std::cell::RefCell;
use tracing::{error, info};

pub trait Notifier {
    /// 开始显示加载进度条
    fn start(&self);
    /// 结束加载进度条
    fn finish(&self);
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// 只写日志的实现，用于没有界面的场景
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn start(&self) {}

    fn finish(&self) {}

    fn success(&self, message: &str) {
        info!(message, "notify success");
    }

    fn error(&self, message: &str) {
        error!(message, "notify error");
    }
}

/// 通知记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Start,
    Finish,
    Success(String),
    Error(String),
}

/// 记录所有通知，供调试面板与测试查看
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: RefCell<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notices
            .borrow()
            .iter()
            .filter_map(|n| match n {
                Notice::Error(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn successes(&self) -> Vec<String> {
        self.notices
            .borrow()
            .iter()
            .filter_map(|n| match n {
                Notice::Success(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.notices.borrow_mut().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn start(&self) {
        self.notices.borrow_mut().push(Notice::Start);
    }

    fn finish(&self) {
        self.notices.borrow_mut().push(Notice::Finish);
    }

    fn success(&self, message: &str) {
        self.notices
            .borrow_mut()
            .push(Notice::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.notices
            .borrow_mut()
            .push(Notice::Error(message.to_string()));
    }
}
