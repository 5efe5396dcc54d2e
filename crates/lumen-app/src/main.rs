// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::AppConfig;
use lumen_core::init_tracing;
use lumen_platform::WinitSurface;
use lumen_render::{FrameStatus, RenderSettings, Renderer, StatusCode};
use lumen_render_vk::{VkError, VkRenderer};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};

use lumen_platform::winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; defaults are used when it does not exist
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Enable the Khronos validation layer
    #[arg(long)]
    validation: bool,
}

struct App {
    cfg: AppConfig,
    settings: RenderSettings,
    // Declared before `window` so it drops first.
    renderer: Option<VkRenderer>,
    window: Option<Window>,
    needs_recovery: bool,
    fatal: Option<anyhow::Error>,

    frames: u32,
    last_fps_instant: Instant,
}

fn log_vk_error(what: &str, e: &VkError) {
    error!(code = e.code(), tag = e.tag(), class = ?e.class(), "{what}: {e}");
}

impl App {
    fn new(cfg: AppConfig, settings: RenderSettings) -> Self {
        Self {
            cfg,
            settings,
            renderer: None,
            window: None,
            needs_recovery: false,
            fatal: None,
            frames: 0,
            last_fps_instant: Instant::now(),
        }
    }

    fn shut_down(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.cleanup();
        }
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: VkError, what: &'static str) {
        log_vk_error(what, &err);
        self.fatal = Some(anyhow::Error::new(err).context(what));
        self.shut_down(event_loop);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(renderer)) = (&self.window, &mut self.renderer) else {
            return;
        };

        if self.needs_recovery {
            let size = window.inner_size();
            if size.width == 0 || size.height == 0 {
                // Minimized; try again once a resize arrives.
                return;
            }
            if let Err(e) = renderer.reinitialize(&WinitSurface(window)) {
                self.fail(event_loop, e, "swapchain recovery failed");
                return;
            }
            self.needs_recovery = false;
        }

        match renderer.draw() {
            Ok(FrameStatus::Presented) => self.frames = self.frames.saturating_add(1),
            Ok(FrameStatus::Recover(change)) => {
                debug!("surface changed ({change:?}), recovering before next frame");
                self.needs_recovery = true;
            }
            Err(e) => log_vk_error("frame failed", &e),
        }
        window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title(self.cfg.window.title.clone())
            .with_inner_size(PhysicalSize::new(self.cfg.window.width, self.cfg.window.height));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => w,
            Err(e) => {
                error!("create_window failed: {e}");
                self.fatal = Some(anyhow::Error::new(e).context("creating window"));
                event_loop.exit();
                return;
            }
        };

        match <VkRenderer as Renderer>::new(&window, &window, &WinitSurface(&window), &self.settings)
        {
            Ok(renderer) => {
                info!(
                    "renderer up: {}x{}, {} images",
                    renderer.extent().width,
                    renderer.extent().height,
                    renderer.image_count()
                );
                self.renderer = Some(renderer);
                window.request_redraw();
                self.window = Some(window);
            }
            Err(e) => {
                self.window = Some(window);
                self.fail(event_loop, e, "renderer init failed");
            }
        }
        event_loop.set_control_flow(ControlFlow::Wait);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shut_down(event_loop);
            }
            WindowEvent::Resized(size) => {
                debug!("Resized → {}x{}", size.width, size.height);
                self.needs_recovery = true;
                if size.width > 0 && size.height > 0 {
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let settings = cfg.render_settings(args.validation);

    let event_loop: EventLoop<()> = EventLoop::new().context("creating event loop")?;
    let mut app = App::new(cfg, settings);
    event_loop.run_app(&mut app).context("running event loop")?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
