//! Console Interaction Launcher
//!
//! Desktop hosts without an embedded browser print the picker link and let
//! the person open it themselves. The handle reports closed once the host
//! calls `close()`.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    interaction::{ExternalInteraction, InteractionLauncher, PopupGeometry},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Prints interaction URLs to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleInteractionLauncher;

impl ConsoleInteractionLauncher {
    pub fn new() -> Self {
        Self
    }
}

/// Handle for a printed link
#[derive(Debug, Default, Clone)]
pub struct ConsoleInteraction {
    closed: Arc<AtomicBool>,
}

impl ExternalInteraction for ConsoleInteraction {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl InteractionLauncher for ConsoleInteractionLauncher {
    async fn open(
        &self,
        url: &str,
        geometry: PopupGeometry,
    ) -> Result<Option<Box<dyn ExternalInteraction>>> {
        info!(
            width = geometry.width,
            height = geometry.height,
            "Opening picker in external browser"
        );
        println!("Open this link to choose photos: {}", url);

        Ok(Some(Box::new(ConsoleInteraction::default())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_handle_closes() {
        let launcher = ConsoleInteractionLauncher::new();
        let handle = launcher
            .open(
                "https://picker.example/abc/autoclose",
                PopupGeometry::centered(800, 600, 1920, 1080),
            )
            .await
            .unwrap()
            .unwrap();

        assert!(!handle.is_closed());
        handle.close();
        assert!(handle.is_closed());
    }
}
