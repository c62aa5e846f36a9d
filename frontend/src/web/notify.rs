//! 界面提示：顶部进度条与右上角消息

use crate::notify::Notifier;
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::cell::Cell;
use std::time::Duration;

const TOAST_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub is_error: bool,
}

pub struct ToastNotifier {
    toasts: RwSignal<Vec<Toast>>,
    loading: RwSignal<bool>,
    next_id: Cell<u64>,
}

impl ToastNotifier {
    pub fn new() -> Self {
        Self {
            toasts: RwSignal::new(Vec::new()),
            loading: RwSignal::new(false),
            next_id: Cell::new(0),
        }
    }

    pub fn toasts(&self) -> RwSignal<Vec<Toast>> {
        self.toasts
    }

    pub fn loading(&self) -> RwSignal<bool> {
        self.loading
    }

    fn push(&self, message: &str, is_error: bool) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.toasts.update(|list| {
            list.push(Toast {
                id,
                message: message.to_string(),
                is_error,
            })
        });

        let toasts = self.toasts;
        spawn_local(async move {
            gloo_timers::future::sleep(TOAST_DURATION).await;
            toasts.update(|list| list.retain(|toast| toast.id != id));
        });
    }
}

impl Default for ToastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ToastNotifier {
    fn start(&self) {
        self.loading.set(true);
    }

    fn finish(&self) {
        self.loading.set(false);
    }

    fn success(&self, message: &str) {
        self.push(message, false);
    }

    fn error(&self, message: &str) {
        self.push(message, true);
    }
}
