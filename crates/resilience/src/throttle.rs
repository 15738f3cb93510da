//! Process-wide call spacing.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Start time of the most recent (or next reserved) call, per category.
static SLOTS: LazyLock<Mutex<HashMap<String, Instant>>> = LazyLock::new(Default::default);

/// Enforces a minimum delay between the start of successive calls.
///
/// State is keyed by category rather than held in the value, so two
/// `Throttle`s created for the same category (e.g. one per backend instance)
/// still space their calls against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throttle {
    category: String,
    delay: Duration,
}
impl Throttle {
    pub fn new(category: impl Into<String>, delay: Duration) -> Self {
        Self {
            category: category.into(),
            delay,
        }
    }

    /// Wait until this category may start another call.
    ///
    /// The slot is reserved before sleeping, so a caller arriving while
    /// another one sleeps queues up behind it instead of sharing its slot.
    pub async fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }
        let slot = {
            let mut slots = SLOTS.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            let slot = match slots.get(&self.category) {
                Some(previous) => (*previous + self.delay).max(now),
                None => now,
            };
            slots.insert(self.category.clone(), slot);
            slot
        };
        let now = Instant::now();
        if slot > now {
            tracing::trace!(category = %self.category, wait_ms = (slot - now).as_millis() as u64, "Throttling call");
            sleep_until(slot).await;
        }
    }
}
