//! External Interaction Abstraction
//!
//! The picker service hands out a URI that a person has to visit to choose
//! photos. On the web this is a popup window; on desktop it can be a browser
//! tab or a printed link. The core only ever needs to open it, ask whether
//! it has been closed, and close it.

use async_trait::async_trait;

use crate::error::Result;

/// Size and placement requested for an interaction window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupGeometry {
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
}

impl PopupGeometry {
    /// Center a `width`×`height` window on a `screen_width`×`screen_height` screen
    pub fn centered(width: u32, height: u32, screen_width: u32, screen_height: u32) -> Self {
        Self {
            width,
            height,
            left: (screen_width as i32 - width as i32) / 2,
            top: (screen_height as i32 - height as i32) / 2,
        }
    }
}

/// Handle to an opened interaction (popup window, browser tab, ...)
pub trait ExternalInteraction: Send + Sync {
    /// Whether the person already closed the interaction
    fn is_closed(&self) -> bool;

    /// Close the interaction if the platform allows it
    fn close(&self);
}

/// Opens external interactions
#[async_trait]
pub trait InteractionLauncher: Send + Sync {
    /// Open `url` with the requested geometry
    ///
    /// Returns `Ok(None)` when the platform refused to open it (e.g. a popup
    /// blocker), which callers treat as a failure.
    async fn open(
        &self,
        url: &str,
        geometry: PopupGeometry,
    ) -> Result<Option<Box<dyn ExternalInteraction>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_geometry() {
        let geometry = PopupGeometry::centered(800, 600, 1920, 1080);
        assert_eq!(geometry.left, 560);
        assert_eq!(geometry.top, 240);
    }

    #[test]
    fn test_centered_geometry_on_small_screen() {
        let geometry = PopupGeometry::centered(800, 600, 640, 480);
        assert_eq!(geometry.left, -80);
        assert_eq!(geometry.top, -60);
    }
}
