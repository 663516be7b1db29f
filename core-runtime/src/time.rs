//! Time-related runtime pieces.
//!
//! Backoff and polling suspend through [`Sleeper`]; this module supplies the
//! Tokio-backed implementation used outside of tests.

use async_trait::async_trait;
use bridge_traits::Sleeper;
use std::time::Duration;

/// [`Sleeper`] backed by `tokio::time::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
