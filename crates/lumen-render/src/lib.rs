// SPDX-License-Identifier: CEPL-1.0
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero dimension.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What the renderer needs from the windowing layer.
pub trait FramebufferSource {
    /// Current drawable size in pixels.
    fn framebuffer_size(&self) -> RenderSize;
    /// Blocks until the windowing layer has something new to report.
    /// Implementations that cannot block on the event queue may poll instead,
    /// sleeping briefly before returning.
    fn wait_events(&self);
}

/// Why the presentation surface no longer matches the live swapchain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceChange {
    OutOfDate,
    Suboptimal,
}

/// Result of a successful draw call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// The host must call [`Renderer::reinitialize`] before the next draw.
    Recover(SurfaceChange),
}

/// Unique per-site diagnostics for renderer failures.
pub trait StatusCode {
    /// Small non-zero integer, never shared between two failure sites.
    fn code(&self) -> u16;
    /// Short stable tag, handy when grepping logs.
    fn tag(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shader container formats a host may ask for. Backends decide which ones they accept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShaderFormat {
    #[default]
    SpirV,
    Glsl,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentPreference {
    /// Low-latency triple buffering when offered, FIFO otherwise.
    #[default]
    Mailbox,
    Fifo,
}

pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub app_name: String,
    pub validation: bool,
    pub frames_in_flight: usize,
    pub present: PresentPreference,
    pub clear_color: [f32; 4],
    /// Per-frame fence wait; `u64::MAX` waits forever.
    pub fence_timeout_ns: u64,
    pub rebuild_pipeline_on_resize: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub shader_format: ShaderFormat,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            app_name: "lumen".to_owned(),
            validation: false,
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            present: PresentPreference::Mailbox,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            fence_timeout_ns: u64::MAX,
            rebuild_pipeline_on_resize: false,
            vertex_shader: PathBuf::new(),
            fragment_shader: PathBuf::new(),
            shader_format: ShaderFormat::SpirV,
        }
    }
}

pub trait Renderer {
    type Error: std::error::Error + StatusCode + Send + Sync + 'static;

    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        surface: &dyn FramebufferSource,
        settings: &RenderSettings,
    ) -> Result<Self, Self::Error>
    where
        Self: Sized;

    /// Rebuilds everything tied to the surface size. Blocks while the window is minimized.
    fn reinitialize(&mut self, surface: &dyn FramebufferSource) -> Result<(), Self::Error>;
    fn draw(&mut self) -> Result<FrameStatus, Self::Error>;
    /// Releases every GPU resource. Calling it twice is harmless.
    fn cleanup(&mut self);
}
