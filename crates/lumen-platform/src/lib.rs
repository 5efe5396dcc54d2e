// SPDX-License-Identifier: CEPL-1.0
//! Windowing glue. winit is re-exported so the app does not pin its own copy.
pub use winit;

use lumen_render::{FramebufferSource, RenderSize};
use std::time::Duration;
use tracing::trace;
use winit::window::Window;

/// Poll interval while waiting for a minimized window to come back.
pub const WAIT_INTERVAL: Duration = Duration::from_millis(16);

/// Exposes a winit window's drawable size to the renderer.
pub struct WinitSurface<'a>(pub &'a Window);

impl FramebufferSource for WinitSurface<'_> {
    fn framebuffer_size(&self) -> RenderSize {
        let size = self.0.inner_size();
        RenderSize::new(size.width, size.height)
    }

    /// winit hands events to the application handler, not to us, so this only
    /// yields and lets the next size query observe the compositor's state. Hosts
    /// should defer recovery while the window reports a zero size.
    fn wait_events(&self) {
        trace!("waiting {:?} for a usable window size", WAIT_INTERVAL);
        std::thread::sleep(WAIT_INTERVAL);
    }
}
