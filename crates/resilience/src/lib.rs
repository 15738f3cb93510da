//! Resilient execution of backend calls.
//!
//! Every call that crosses a network boundary goes through [`Resiliently`],
//! which composes two policies with the throttle outermost:
//!
//! 1. [`Throttle`]: a minimum delay between the *start* of successive calls in
//!    the same category, shared across the whole process.
//! 2. [`Backoff`]: bounded retry with exponentially growing delays. The error
//!    from the final attempt is returned unchanged.
//!
//! Nothing here knows about storage; any fallible async operation can be
//! wrapped.
//!
//! # Examples
//!
//! ```
//! use album_rsync_resilience::{ResilienceConfig, Resiliently};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = ResilienceConfig {
//!     retries: 2,
//!     base_delay: Duration::ZERO,
//!     ..ResilienceConfig::default()
//! };
//! let resiliently = Resiliently::new("doc-example", &config);
//! let mut calls = 0;
//! let result: Result<u32, &str> = resiliently
//!     .call(|| {
//!         calls += 1;
//!         let attempt = calls;
//!         async move { if attempt < 3 { Err("flaky") } else { Ok(attempt) } }
//!     })
//!     .await;
//! assert_eq!(result, Ok(3));
//! # }
//! ```

mod retry;
mod throttle;

pub use crate::retry::Backoff;
pub use crate::throttle::Throttle;
use std::fmt::Debug;
use std::time::Duration;

/// Tuning for [`Resiliently`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResilienceConfig {
    /// Minimum spacing between the start of two calls. Zero disables throttling.
    pub throttle: Duration,
    /// Retries after the initial attempt.
    pub retries: u32,
    /// Delay before the first retry; doubles for every retry after that.
    pub base_delay: Duration,
    /// Upper bound for a single back-off delay.
    pub max_delay: Duration,
}
impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::ZERO,
            retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Throttle-then-retry wrapper around fallible async operations.
#[derive(Debug, Clone)]
pub struct Resiliently {
    throttle: Throttle,
    backoff: Backoff,
}
impl Resiliently {
    /// The `category` names the class of operation being wrapped; every
    /// `Resiliently` sharing a category shares one throttle clock.
    pub fn new(category: impl Into<String>, config: &ResilienceConfig) -> Self {
        Self {
            throttle: Throttle::new(category, config.throttle),
            backoff: Backoff::new(config.retries, config.base_delay, config.max_delay),
        }
    }

    /// Run `operation` under the throttle, retrying failures with back-off.
    ///
    /// The throttle is applied once per call, not once per attempt.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Debug,
    {
        self.throttle.wait().await;
        self.backoff.run(operation).await
    }
}
