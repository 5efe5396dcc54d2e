// SPDX-License-Identifier: CEPL-1.0
//! Recording stand-in for a device and a window (no GPU required).
//!
//! Every handle is a fresh integer; the mock tracks which ones are alive so tests can
//! catch leaks and double destroys. Submitted work stays queued until something
//! waits on its fence (or drains the device), which is when it "retires".

use crate::device::QueueFamilies;
use crate::gpu::Gpu;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use lumen_render::{FramebufferSource, RenderSize};
use std::cell::{Cell, RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

// ============================================================================
// Call log
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Swapchain,
    ImageView,
    RenderPass,
    Framebuffer,
    ShaderModule,
    PipelineLayout,
    Pipeline,
    Buffer,
    Memory,
    CommandPool,
    CommandBuffer,
    Record,
    Semaphore,
    Fence,
    Submit,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateSwapchain {
        extent: vk::Extent2D,
        min_image_count: u32,
        format: vk::Format,
        present_mode: vk::PresentModeKHR,
        sharing: vk::SharingMode,
    },
    DestroySwapchain,
    CreateRenderPass(vk::RenderPass),
    DestroyRenderPass(vk::RenderPass),
    CreateFramebuffer { width: u32, height: u32 },
    DestroyFramebuffer,
    CreatePipeline(vk::Pipeline),
    DestroyPipeline(vk::Pipeline),
    AllocateCommandBuffers(usize),
    FreeCommandBuffers(usize),
    BeginRenderPass {
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    },
    Draw { cmd: vk::CommandBuffer, vertices: u32 },
    WaitFence { fence: vk::Fence, signaled: bool },
    ResetFence(vk::Fence),
    Retire(vk::Fence),
    Acquire(VkResult<(u32, bool)>),
    Submit { cmd: vk::CommandBuffer, fence: vk::Fence },
    Present { image: u32 },
    DeviceWaitIdle,
}

/// One-shot failure: the `after`-th next call of `op` returns `result`.
#[derive(Clone, Copy, Debug)]
pub struct FailAt {
    pub op: Op,
    pub after: usize,
    pub result: vk::Result,
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockState {
    pub caps: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub families: QueueFamilies,
    pub memory: vk::PhysicalDeviceMemoryProperties,
    /// Scripted acquire outcomes; `SUCCESS` when empty. `SUBOPTIMAL_KHR` yields
    /// an image with the suboptimal flag, anything else is returned as an error.
    pub acquire_script: VecDeque<vk::Result>,
    /// Scripted present outcomes, same encoding as `acquire_script`.
    pub present_script: VecDeque<vk::Result>,
    pub failures: Vec<FailAt>,

    pub calls: Vec<Call>,
    /// Destroys of handles that were not alive (double frees or wrong kind).
    pub bad_destroys: Vec<(Op, u64)>,
    /// Protocol misuse the real driver would reject.
    pub violations: Vec<String>,
    pub uploads: Vec<usize>,

    next_handle: u64,
    live: HashMap<u64, Op>,
    fences: HashMap<u64, bool>,
    queue: VecDeque<vk::Fence>,
    swap_images: HashMap<u64, Vec<vk::Image>>,
    next_image: u32,
}

/// Clones share one device, so a test can keep a probe after handing the mock over.
#[derive(Clone)]
pub struct MockGpu {
    state: Rc<RefCell<MockState>>,
}

impl Default for MockGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGpu {
    /// Scenario-A style surface: any-extent sentinel, 2..=4 images, sRGB offered
    /// second, MAILBOX available, one family for everything.
    pub fn new() -> Self {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 4,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            max_image_array_layers: 1,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        };
        let mut memory = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 2,
            ..Default::default()
        };
        memory.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        memory.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        Self {
            state: Rc::new(RefCell::new(MockState {
                caps,
                formats: vec![
                    vk::SurfaceFormatKHR {
                        format: vk::Format::B8G8R8A8_UNORM,
                        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                    },
                    vk::SurfaceFormatKHR {
                        format: vk::Format::B8G8R8A8_SRGB,
                        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                    },
                ],
                present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
                families: QueueFamilies::Found {
                    graphics: 0,
                    present: 0,
                },
                memory,
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                failures: Vec::new(),
                calls: Vec::new(),
                bad_destroys: Vec::new(),
                violations: Vec::new(),
                uploads: Vec::new(),
                next_handle: 0,
                live: HashMap::new(),
                fences: HashMap::new(),
                queue: VecDeque::new(),
                swap_images: HashMap::new(),
                next_image: 0,
            })),
        }
    }

    pub fn state(&self) -> RefMut<'_, MockState> {
        self.state.borrow_mut()
    }

    pub fn fail(&self, op: Op, after: usize, result: vk::Result) {
        self.state().failures.push(FailAt { op, after, result });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn live(&self, op: Op) -> usize {
        self.state.borrow().live.values().filter(|k| **k == op).count()
    }

    pub fn live_total(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn bad_destroys(&self) -> Vec<(Op, u64)> {
        self.state.borrow().bad_destroys.clone()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    pub fn pending_work(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Appends an image the renderer never saw to `swapchain` and makes it the
    /// next one acquired.
    pub fn add_stray_image(&self, swapchain: vk::SwapchainKHR) {
        let mut s = self.state();
        let Some(images) = s.swap_images.get_mut(&swapchain.as_raw()) else {
            return;
        };
        let index = images.len() as u32;
        images.push(vk::Image::from_raw(0xB000_0000 + swapchain.as_raw()));
        s.next_image = index;
    }

    pub fn fence_signaled(&self, fence: vk::Fence) -> Option<bool> {
        self.state.borrow().fences.get(&fence.as_raw()).copied()
    }

    fn injected(&self, op: Op) -> VkResult<()> {
        let mut s = self.state();
        let Some(pos) = s.failures.iter().position(|f| f.op == op) else {
            return Ok(());
        };
        if s.failures[pos].after == 0 {
            let f = s.failures.remove(pos);
            Err(f.result)
        } else {
            s.failures[pos].after -= 1;
            Ok(())
        }
    }

    fn make<H: Handle>(&self, op: Op) -> VkResult<H> {
        self.injected(op)?;
        let mut s = self.state();
        s.next_handle += 1;
        let raw = s.next_handle;
        s.live.insert(raw, op);
        Ok(H::from_raw(raw))
    }

    fn release<H: Handle>(&self, op: Op, handle: H) {
        let raw = handle.as_raw();
        let mut s = self.state();
        match s.live.remove(&raw) {
            Some(kind) if kind == op => {}
            Some(kind) => {
                s.live.insert(raw, kind);
                s.bad_destroys.push((op, raw));
            }
            None => s.bad_destroys.push((op, raw)),
        }
    }

    fn is_live<H: Handle>(&self, handle: H) -> bool {
        self.state.borrow().live.contains_key(&handle.as_raw())
    }

    fn retire_front(s: &mut MockState) -> Option<vk::Fence> {
        let fence = s.queue.pop_front()?;
        if let Some(signaled) = s.fences.get_mut(&fence.as_raw()) {
            *signaled = true;
        }
        s.calls.push(Call::Retire(fence));
        Some(fence)
    }
}

fn scripted(result: Option<vk::Result>) -> VkResult<bool> {
    match result.unwrap_or(vk::Result::SUCCESS) {
        vk::Result::SUCCESS => Ok(false),
        vk::Result::SUBOPTIMAL_KHR => Ok(true),
        err => Err(err),
    }
}

impl Gpu for MockGpu {
    fn queue_families(&self) -> QueueFamilies {
        self.state.borrow().families
    }

    fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.state.borrow().caps)
    }

    fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.state.borrow().formats.clone())
    }

    fn surface_present_modes(&self) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.state.borrow().present_modes.clone())
    }

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        {
            let mut s = self.state();
            if info.image_extent.width == 0 || info.image_extent.height == 0 {
                s.violations.push("swapchain created with a zero extent".into());
            }
            s.calls.push(Call::CreateSwapchain {
                extent: info.image_extent,
                min_image_count: info.min_image_count,
                format: info.image_format,
                present_mode: info.present_mode,
                sharing: info.image_sharing_mode,
            });
        }
        let swapchain: vk::SwapchainKHR = self.make(Op::Swapchain)?;
        let mut s = self.state();
        let images = (0..info.min_image_count)
            .map(|i| vk::Image::from_raw(0xA000_0000 + swapchain.as_raw() * 16 + i as u64))
            .collect();
        s.swap_images.insert(swapchain.as_raw(), images);
        s.next_image = 0;
        Ok(swapchain)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.state
            .borrow()
            .swap_images
            .get(&swapchain.as_raw())
            .cloned()
            .ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.release(Op::Swapchain, swapchain);
        let mut s = self.state();
        s.swap_images.remove(&swapchain.as_raw());
        s.calls.push(Call::DestroySwapchain);
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        self.make(Op::ImageView)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.release(Op::ImageView, view);
    }

    fn create_render_pass(
        &self,
        _info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        let rp: vk::RenderPass = self.make(Op::RenderPass)?;
        self.state().calls.push(Call::CreateRenderPass(rp));
        Ok(rp)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.release(Op::RenderPass, render_pass);
        self.state().calls.push(Call::DestroyRenderPass(render_pass));
    }

    fn create_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        if !self.is_live(info.render_pass) {
            self.state()
                .violations
                .push("framebuffer created against a dead render pass".into());
        }
        let fb = self.make(Op::Framebuffer)?;
        self.state().calls.push(Call::CreateFramebuffer {
            width: info.width,
            height: info.height,
        });
        Ok(fb)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.release(Op::Framebuffer, framebuffer);
        self.state().calls.push(Call::DestroyFramebuffer);
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        if code.is_empty() {
            self.state()
                .violations
                .push("shader module created from empty code".into());
        }
        self.make(Op::ShaderModule)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.release(Op::ShaderModule, module);
    }

    fn create_pipeline_layout(
        &self,
        _info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        self.make(Op::PipelineLayout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.release(Op::PipelineLayout, layout);
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        let stages = unsafe { std::slice::from_raw_parts(info.p_stages, info.stage_count as usize) };
        let dead_module = stages.iter().any(|st| !self.is_live(st.module));
        if dead_module || !self.is_live(info.layout) || !self.is_live(info.render_pass) {
            self.state()
                .violations
                .push("pipeline built from dead objects".into());
        }
        let pipeline: vk::Pipeline = self.make(Op::Pipeline)?;
        self.state().calls.push(Call::CreatePipeline(pipeline));
        Ok(pipeline)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.release(Op::Pipeline, pipeline);
        self.state().calls.push(Call::DestroyPipeline(pipeline));
    }

    fn create_buffer(&self, _info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer> {
        self.make(Op::Buffer)
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.release(Op::Buffer, buffer);
    }

    fn buffer_memory_requirements(&self, _buffer: vk::Buffer) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size: 256,
            alignment: 16,
            memory_type_bits: 0b11,
        }
    }

    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        self.state.borrow().memory
    }

    fn allocate_memory(&self, _info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        self.make(Op::Memory)
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.release(Op::Memory, memory);
    }

    fn bind_buffer_memory(&self, _buffer: vk::Buffer, _memory: vk::DeviceMemory) -> VkResult<()> {
        Ok(())
    }

    fn write_memory(&self, _memory: vk::DeviceMemory, bytes: &[u8]) -> VkResult<()> {
        self.state().uploads.push(bytes.len());
        Ok(())
    }

    fn create_command_pool(
        &self,
        _info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        self.make(Op::CommandPool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.release(Op::CommandPool, pool);
    }

    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        self.injected(Op::CommandBuffer)?;
        let count = info.command_buffer_count as usize;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let mut s = self.state();
            s.next_handle += 1;
            let raw = s.next_handle;
            s.live.insert(raw, Op::CommandBuffer);
            out.push(vk::CommandBuffer::from_raw(raw));
        }
        self.state().calls.push(Call::AllocateCommandBuffers(count));
        Ok(out)
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        for &b in buffers {
            self.release(Op::CommandBuffer, b);
        }
        self.state()
            .calls
            .push(Call::FreeCommandBuffers(buffers.len()));
    }

    fn begin_command_buffer(
        &self,
        _cmd: vk::CommandBuffer,
        _info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        self.injected(Op::Record)
    }

    fn end_command_buffer(&self, _cmd: vk::CommandBuffer) -> VkResult<()> {
        Ok(())
    }

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, info: &vk::RenderPassBeginInfo<'_>) {
        self.state().calls.push(Call::BeginRenderPass {
            cmd,
            framebuffer: info.framebuffer,
            extent: info.render_area.extent,
        });
    }

    fn cmd_bind_pipeline(&self, _cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        if !self.is_live(pipeline) {
            self.state()
                .violations
                .push("recorded a dead pipeline".into());
        }
    }

    fn cmd_bind_vertex_buffer(&self, _cmd: vk::CommandBuffer, _buffer: vk::Buffer) {}

    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32) {
        self.state().calls.push(Call::Draw {
            cmd,
            vertices: vertex_count,
        });
    }

    fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {}

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        self.make(Op::Semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.release(Op::Semaphore, semaphore);
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let fence: vk::Fence = self.make(Op::Fence)?;
        self.state().fences.insert(fence.as_raw(), signaled);
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.release(Op::Fence, fence);
        let mut s = self.state();
        s.fences.remove(&fence.as_raw());
        if s.queue.contains(&fence) {
            s.violations.push("destroyed a fence with pending work".into());
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> VkResult<()> {
        let mut s = self.state();
        let known = s.fences.get(&fence.as_raw()).copied();
        let Some(signaled) = known else {
            s.violations.push("waited on a dead fence".into());
            return Err(vk::Result::ERROR_UNKNOWN);
        };
        s.calls.push(Call::WaitFence { fence, signaled });
        if signaled {
            return Ok(());
        }
        if !s.queue.contains(&fence) {
            // Nothing will ever signal it.
            return Err(vk::Result::TIMEOUT);
        }
        while let Some(done) = Self::retire_front(&mut s) {
            if done == fence {
                break;
            }
        }
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut s = self.state();
        if s.queue.contains(&fence) {
            s.violations.push("reset a fence with pending work".into());
        }
        s.calls.push(Call::ResetFence(fence));
        match s.fences.get_mut(&fence.as_raw()) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => Err(vk::Result::ERROR_UNKNOWN),
        }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout_ns: u64,
        _signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut s = self.state();
        let next = s.acquire_script.pop_front();
        let result = scripted_acquire(&mut s, swapchain, next);
        s.calls.push(Call::Acquire(result));
        result
    }

    fn queue_submit(&self, submit: &vk::SubmitInfo<'_>, fence: vk::Fence) -> VkResult<()> {
        self.injected(Op::Submit)?;
        let cmd = unsafe { *submit.p_command_buffers };
        let mut s = self.state();
        if s.fences.get(&fence.as_raw()) != Some(&false) {
            s.violations
                .push("submitted with a signaled or dead fence".into());
        }
        s.queue.push_back(fence);
        s.calls.push(Call::Submit { cmd, fence });
        Ok(())
    }

    fn queue_present(&self, present: &vk::PresentInfoKHR<'_>) -> VkResult<bool> {
        let image = unsafe { *present.p_image_indices };
        let mut s = self.state();
        s.calls.push(Call::Present { image });
        let next = s.present_script.pop_front();
        scripted(next)
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        let mut s = self.state();
        while Self::retire_front(&mut s).is_some() {}
        s.calls.push(Call::DeviceWaitIdle);
        Ok(())
    }
}

fn scripted_acquire(
    s: &mut MockState,
    swapchain: vk::SwapchainKHR,
    scripted_result: Option<vk::Result>,
) -> VkResult<(u32, bool)> {
    let suboptimal = scripted(scripted_result)?;
    let count = s
        .swap_images
        .get(&swapchain.as_raw())
        .map(|v| v.len() as u32)
        .unwrap_or(0);
    if count == 0 {
        return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
    }
    let image = s.next_image % count;
    s.next_image += 1;
    Ok((image, suboptimal))
}

// ============================================================================
// Mock window
// ============================================================================

pub struct MockWindow {
    size: Cell<RenderSize>,
    queued: RefCell<VecDeque<RenderSize>>,
    waits: Cell<usize>,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Cell::new(RenderSize::new(width, height)),
            queued: RefCell::new(VecDeque::new()),
            waits: Cell::new(0),
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.size.set(RenderSize::new(width, height));
    }

    /// Sizes delivered one per `wait_events` call.
    pub fn queue_size(&self, width: u32, height: u32) {
        self.queued
            .borrow_mut()
            .push_back(RenderSize::new(width, height));
    }

    pub fn waits(&self) -> usize {
        self.waits.get()
    }
}

impl FramebufferSource for MockWindow {
    fn framebuffer_size(&self) -> RenderSize {
        self.size.get()
    }

    fn wait_events(&self) {
        self.waits.set(self.waits.get() + 1);
        match self.queued.borrow_mut().pop_front() {
            Some(next) => self.size.set(next),
            None => panic!("wait_events would block forever: no size event queued"),
        }
    }
}
