//! Suspension Abstraction
//!
//! Backoff delays and picker polling are explicit suspension points. Routing
//! them through a trait keeps the algorithms deterministic under test.

use async_trait::async_trait;
use std::time::Duration;

/// Async sleep source
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);
}
