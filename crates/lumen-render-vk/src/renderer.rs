// SPDX-License-Identifier: CEPL-1.0
//! Frame loop and swapchain recovery.
//!
//! Each `draw` waits on its slot's fence, acquires an image, waits on whatever
//! frame last used that image, submits the pre-recorded command buffer and
//! presents. The slot index advances after every call, successful or not.
//!
//! `reinitialize` rebuilds everything tied to the swapchain: views, render pass,
//! framebuffers and command buffers. The pipeline is kept unless it is missing
//! or was built for another surface format; its viewport stays at the extent it
//! was built with unless `rebuild_pipeline_on_resize` is set. Until a recovery
//! completes, `draw` asks for another one instead of submitting.

use crate::buffer::VertexBuffer;
use crate::commands::{CommandSet, RecordInputs};
use crate::device::{DeviceConfig, DeviceContext, QueueFamilies};
use crate::error::VkError;
use crate::frame::{clamp_frames_in_flight, FrameRing};
use crate::gpu::Gpu;
use crate::pipeline::PipelineState;
use crate::render_target::RenderTargets;
use crate::shader::{default_shader_path, ShaderSet};
use crate::swapchain::SwapState;
use crate::vertex::TRIANGLE;
use ash::vk;
use lumen_render::{
    FrameStatus, FramebufferSource, RenderSettings, RenderSize, Renderer, ShaderStage,
    SurfaceChange,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::path::Path;
use tracing::{debug, error, info, warn};

pub struct VkRenderer<G: Gpu = DeviceContext> {
    gpu: G,
    settings: RenderSettings,
    shaders: ShaderSet,
    swap: SwapState,
    targets: RenderTargets,
    pipeline: PipelineState,
    /// Surface format and extent the live pipeline was built against.
    pipeline_target: (vk::Format, vk::Extent2D),
    vertices: VertexBuffer,
    commands: CommandSet,
    frames: FrameRing,
    live: bool,
    /// Cleared while a recovery is in progress or after one failed.
    ready: bool,
}

/// Blocks on window events until the framebuffer has a usable size.
fn wait_for_usable_size(window: &dyn FramebufferSource) -> RenderSize {
    let mut size = window.framebuffer_size();
    while size.is_empty() {
        debug!(
            "framebuffer is {}x{}, waiting for a usable size",
            size.width, size.height
        );
        window.wait_events();
        size = window.framebuffer_size();
    }
    size
}

impl<G: Gpu> VkRenderer<G> {
    /// Builds every resource the frame loop needs. Whatever was created before a
    /// failure is released when the half-built renderer drops.
    pub fn init(
        gpu: G,
        settings: &RenderSettings,
        window: &dyn FramebufferSource,
    ) -> Result<Self, VkError> {
        let mut settings = settings.clone();
        if settings.fence_timeout_ns == 0 {
            warn!("fence timeout of 0 would never wait; using an unbounded wait");
            settings.fence_timeout_ns = u64::MAX;
        }
        let mut renderer = Self {
            gpu,
            settings,
            shaders: ShaderSet::default(),
            swap: SwapState::default(),
            targets: RenderTargets::default(),
            pipeline: PipelineState::default(),
            pipeline_target: (vk::Format::UNDEFINED, vk::Extent2D::default()),
            vertices: VertexBuffer::default(),
            commands: CommandSet::default(),
            frames: FrameRing::default(),
            live: false,
            ready: false,
        };
        renderer.build(window)?;
        Ok(renderer)
    }

    fn build(&mut self, window: &dyn FramebufferSource) -> Result<(), VkError> {
        self.load_shaders()?;

        let size = wait_for_usable_size(window);
        self.swap = SwapState::create(&self.gpu, size, self.settings.present)?;
        self.targets
            .init_render_pass(&self.gpu, self.swap.format())?;
        self.targets.init_framebuffers(&self.gpu, &self.swap)?;
        self.pipeline = PipelineState::build(
            &self.gpu,
            &self.shaders,
            self.targets.render_pass(),
            self.swap.extent(),
        )?;
        self.pipeline_target = (self.swap.format(), self.swap.extent());
        self.vertices = VertexBuffer::upload(&self.gpu, &TRIANGLE)?;

        let QueueFamilies::Found { graphics, .. } = self.gpu.queue_families() else {
            return Err(VkError::NoSuitableAdapter);
        };
        self.commands = CommandSet::new(&self.gpu, graphics)?;
        self.commands
            .allocate(&self.gpu, self.targets.framebuffers().len())?;
        self.record()?;

        let frames = clamp_frames_in_flight(self.settings.frames_in_flight, self.swap.image_count());
        self.frames = FrameRing::new(&self.gpu, frames, self.swap.image_count())?;
        self.live = true;
        self.ready = true;
        info!(
            "renderer ready: {} images, {} frames in flight",
            self.swap.image_count(),
            frames
        );
        Ok(())
    }

    fn load_shaders(&mut self) -> Result<(), VkError> {
        let format = self.settings.shader_format;
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let configured = match stage {
                ShaderStage::Vertex => &self.settings.vertex_shader,
                ShaderStage::Fragment => &self.settings.fragment_shader,
            };
            let path = if configured.as_os_str().is_empty() {
                default_shader_path(stage)
            } else {
                configured.clone()
            };
            self.shaders.load(Path::new(&path), stage, format)?;
        }
        Ok(())
    }

    fn record(&self) -> Result<(), VkError> {
        self.commands.record(
            &self.gpu,
            &RecordInputs {
                render_pass: self.targets.render_pass(),
                framebuffers: self.targets.framebuffers(),
                extent: self.swap.extent(),
                pipeline: self.pipeline.handle(),
                vertex_buffer: self.vertices.buffer(),
                vertex_count: self.vertices.vertex_count(),
                clear: self.settings.clear_color,
            },
        )
    }

    fn wait(&self, fence: vk::Fence) -> Result<(), VkError> {
        match self.gpu.wait_for_fence(fence, self.settings.fence_timeout_ns) {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(VkError::FenceTimeout),
            Err(e) => Err(VkError::FenceWait(e)),
        }
    }

    /// Renders and presents one frame.
    pub fn draw(&mut self) -> Result<FrameStatus, VkError> {
        if !self.live {
            return Err(VkError::NotInitialized);
        }
        // A recovery that failed halfway leaves nothing safe to submit.
        if !self.ready {
            return Ok(FrameStatus::Recover(SurfaceChange::OutOfDate));
        }
        let status = self.draw_slot();
        self.frames.advance();
        status
    }

    fn draw_slot(&mut self) -> Result<FrameStatus, VkError> {
        let slot = self.frames.current();
        self.wait(slot.in_flight)?;

        let acquired =
            self.gpu
                .acquire_next_image(self.swap.handle(), u64::MAX, slot.image_available);
        let (image, suboptimal) = match acquired {
            Ok(acquired) => acquired,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("acquire: surface out of date");
                return Ok(FrameStatus::Recover(SurfaceChange::OutOfDate));
            }
            Err(e) => return Err(VkError::Acquire(e)),
        };
        // Checked before the fence is reset so the slot stays waitable.
        let Some(&cmd) = self.commands.buffers().get(image as usize) else {
            warn!("acquired image {image} has no command buffer");
            return Ok(FrameStatus::Recover(SurfaceChange::OutOfDate));
        };

        if let Some(previous) = self.frames.image_fence(image) {
            if previous != slot.in_flight {
                self.wait(previous)?;
            }
        }
        self.frames.track_image(image, slot.in_flight);
        self.gpu
            .reset_fence(slot.in_flight)
            .map_err(VkError::FenceReset)?;

        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &slot.image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &slot.render_finished,
            ..Default::default()
        };
        if let Err(e) = self.gpu.queue_submit(&submit, slot.in_flight) {
            // The fence was reset but nothing will signal it.
            if let Err(idle) = self.gpu.device_wait_idle() {
                warn!("device wait idle after failed submit: {idle}");
            }
            if let Err(rearm) = self.frames.rearm(&self.gpu) {
                error!("could not replace sync objects for slot {}: {rearm}", self.frames.index());
            }
            return Err(VkError::Submit(e));
        }

        let swapchain = self.swap.handle();
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &slot.render_finished,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image,
            ..Default::default()
        };
        match self.gpu.queue_present(&present) {
            Ok(false) if !suboptimal => Ok(FrameStatus::Presented),
            Ok(_) => Ok(FrameStatus::Recover(SurfaceChange::Suboptimal)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                Ok(FrameStatus::Recover(SurfaceChange::OutOfDate))
            }
            Err(e) => Err(VkError::Present(e)),
        }
    }

    /// Rebuilds the swapchain and everything sized by it. Blocks while the window
    /// is minimized. The frame slot index is left as is.
    pub fn reinitialize(&mut self, window: &dyn FramebufferSource) -> Result<(), VkError> {
        if !self.live {
            return Err(VkError::NotInitialized);
        }
        let size = wait_for_usable_size(window);
        self.gpu.device_wait_idle().map_err(VkError::DeviceIdle)?;

        self.ready = false;
        self.swap.cleanup(&self.gpu);
        self.targets.cleanup(&self.gpu);
        self.commands.free(&self.gpu);

        self.swap = SwapState::create(&self.gpu, size, self.settings.present)?;
        self.targets
            .init_render_pass(&self.gpu, self.swap.format())?;

        let (built_format, built_extent) = self.pipeline_target;
        let format_changed = self.swap.format() != built_format;
        let extent_changed = self.swap.extent() != built_extent;
        let missing = !self.pipeline.is_built();
        if missing || format_changed || (self.settings.rebuild_pipeline_on_resize && extent_changed) {
            debug!(
                "rebuilding pipeline (missing: {missing}, format changed: {format_changed}, extent changed: {extent_changed})"
            );
            self.pipeline.cleanup(&self.gpu);
            self.pipeline = PipelineState::build(
                &self.gpu,
                &self.shaders,
                self.targets.render_pass(),
                self.swap.extent(),
            )?;
            self.pipeline_target = (self.swap.format(), self.swap.extent());
        }

        self.targets.init_framebuffers(&self.gpu, &self.swap)?;
        self.commands
            .allocate(&self.gpu, self.targets.framebuffers().len())?;
        self.record()?;
        self.frames.reset_markers(self.swap.image_count());
        self.ready = true;

        let extent = self.swap.extent();
        debug!(
            "recovered at {}x{} with {} images",
            extent.width,
            extent.height,
            self.swap.image_count()
        );
        Ok(())
    }

    /// Drains the device and releases everything. Safe to call more than once.
    pub fn cleanup(&mut self) {
        if self.live {
            if let Err(e) = self.gpu.device_wait_idle() {
                warn!("device wait idle failed during cleanup: {e}");
            }
        }
        self.commands.destroy(&self.gpu);
        self.vertices.cleanup(&self.gpu);
        self.frames.destroy(&self.gpu);
        self.pipeline.cleanup(&self.gpu);
        self.targets.cleanup(&self.gpu);
        self.swap.cleanup(&self.gpu);
        if self.live {
            info!("renderer shut down");
        }
        self.live = false;
        self.ready = false;
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swap.extent()
    }

    pub fn image_count(&self) -> usize {
        self.swap.image_count()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_index(&self) -> usize {
        self.frames.index()
    }

    pub fn is_live(&self) -> bool {
        self.live
    }
}

impl<G: Gpu> Drop for VkRenderer<G> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl Renderer for VkRenderer<DeviceContext> {
    type Error = VkError;

    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        surface: &dyn FramebufferSource,
        settings: &RenderSettings,
    ) -> Result<Self, VkError> {
        let gpu = DeviceContext::new(window, display, &DeviceConfig::from_settings(settings))?;
        VkRenderer::init(gpu, settings, surface)
    }

    fn reinitialize(&mut self, surface: &dyn FramebufferSource) -> Result<(), VkError> {
        VkRenderer::reinitialize(self, surface)
    }

    fn draw(&mut self) -> Result<FrameStatus, VkError> {
        VkRenderer::draw(self)
    }

    fn cleanup(&mut self) {
        VkRenderer::cleanup(self)
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
