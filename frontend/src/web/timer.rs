use crate::platform::Delay;
use async_trait::async_trait;
use std::time::Duration;

/// `setTimeout` 驱动的等待
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserDelay;

#[async_trait(?Send)]
impl Delay for BrowserDelay {
    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}
