//! core::context
//!
//! Per-invocation tenant context.
//!
//! Every core operation receives a [`ShopContext`] explicitly. There is no
//! process-wide default shop: the CLI layer resolves flags, environment and
//! config file into one context and passes it down.

use std::time::Duration;

use super::config::{Config, DEFAULT_POLL_INTERVAL};
use super::types::ShopId;

/// Resolved settings for one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopContext {
    /// Tenant all requests are scoped to
    pub shop_id: ShopId,
    /// Delay between task lookups
    pub poll_interval: Duration,
    /// Give up waiting for a task after this long
    pub task_timeout: Option<Duration>,
    /// Render progress bars on stderr
    pub show_progress: bool,
}

impl ShopContext {
    /// Create a context with default polling and progress settings.
    pub fn new(shop_id: ShopId) -> Self {
        Self {
            shop_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
            task_timeout: None,
            show_progress: true,
        }
    }

    /// Create a context taking polling and display settings from config.
    pub fn from_config(shop_id: ShopId, config: &Config) -> Self {
        Self {
            shop_id,
            poll_interval: config.poll_interval(),
            task_timeout: config.task_timeout(),
            show_progress: config.progress(),
        }
    }

    /// Override the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable or disable progress bars.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_defaults() {
        let ctx = ShopContext::new(ShopId::new("1").unwrap());
        assert_eq!(ctx.poll_interval, Duration::from_secs(1));
        assert!(ctx.task_timeout.is_none());
        assert!(ctx.show_progress);
    }

    #[test]
    fn builders_override() {
        let ctx = ShopContext::new(ShopId::new("1").unwrap())
            .with_poll_interval(Duration::from_millis(10))
            .with_progress(false);
        assert_eq!(ctx.poll_interval, Duration::from_millis(10));
        assert!(!ctx.show_progress);
    }
}
