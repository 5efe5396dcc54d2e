// SPDX-License-Identifier: CEPL-1.0
use crate::error::VkError;
use crate::gpu::Gpu;
use ash::ext::debug_utils as ext_debug;
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use lumen_render::RenderSettings;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::ffi::{c_void, CStr, CString};
use tracing::{debug, error, info, trace, warn};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
/// `1`/`true` forces validation on, `0`/`false` forces it off.
pub const VALIDATION_ENV: &str = "LUMEN_VALIDATION";

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub app_name: String,
    /// Enables the Khronos validation layer and routes its messages into `tracing`.
    /// Off by default.
    pub validation: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            app_name: "lumen".to_owned(),
            validation: false,
        }
    }
}

impl DeviceConfig {
    /// Takes the settings value, then lets `LUMEN_VALIDATION` override it.
    pub fn from_settings(settings: &RenderSettings) -> Self {
        let env = std::env::var(VALIDATION_ENV).ok();
        Self {
            app_name: settings.app_name.clone(),
            validation: validation_override(env.as_deref(), settings.validation),
        }
    }
}

fn validation_override(env: Option<&str>, fallback: bool) -> bool {
    match env.map(str::trim) {
        Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
        Some(v) if v == "0" || v.eq_ignore_ascii_case("false") => false,
        _ => fallback,
    }
}

/// Outcome of one queue-family resolution pass over an adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueFamilies {
    Found { graphics: u32, present: u32 },
    NotFound,
}

impl QueueFamilies {
    /// First graphics-capable family and first family that can present win; the scan
    /// stops as soon as both are known.
    pub fn resolve(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> bool,
    ) -> Self {
        let mut graphics = None;
        let mut present = None;
        for (i, props) in families.iter().enumerate() {
            let i = i as u32;
            if graphics.is_none()
                && props.queue_count > 0
                && props.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                graphics = Some(i);
            }
            if present.is_none() && supports_present(i) {
                present = Some(i);
            }
            if let (Some(graphics), Some(present)) = (graphics, present) {
                return QueueFamilies::Found { graphics, present };
            }
        }
        QueueFamilies::NotFound
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        match *self {
            QueueFamilies::Found { graphics, present } if graphics == present => vec![graphics],
            QueueFamilies::Found { graphics, present } => vec![graphics, present],
            QueueFamilies::NotFound => Vec::new(),
        }
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let msg = unsafe {
        let p = (*data).p_message;
        if p.is_null() {
            return vk::FALSE;
        }
        CStr::from_ptr(p).to_string_lossy()
    };
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(target: "vulkan", "{msg}");
    } else {
        trace!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

/// Instance-level objects. Dropped after the logical device.
struct InstanceHandles {
    _entry: Entry,
    instance: ash::Instance,
    debug: Option<(ext_debug::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
}

impl InstanceHandles {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        cfg: &DeviceConfig,
    ) -> Result<Self, VkError> {
        let dh = display
            .display_handle()
            .map_err(VkError::WindowHandle)?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(VkError::WindowHandle)?
            .as_raw();

        let entry = Entry::linked();
        if cfg.validation && !has_validation_layer(&entry) {
            return Err(VkError::ValidationUnavailable);
        }
        let instance = create_instance(&entry, dh, cfg)?;
        let surface_loader = surface::Instance::new(&entry, &instance);

        // From here on, Drop cleans up whatever was created.
        let mut handles = InstanceHandles {
            _entry: entry,
            instance,
            debug: None,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
        };

        handles.surface = unsafe {
            ash_window::create_surface(&handles._entry, &handles.instance, dh, wh, None)
        }
        .map_err(VkError::SurfaceCreation)?;

        if cfg.validation {
            let loader = ext_debug::Instance::new(&handles._entry, &handles.instance);
            let ci = vk::DebugUtilsMessengerCreateInfoEXT {
                s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
                message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                pfn_user_callback: Some(debug_callback),
                ..Default::default()
            };
            let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None) }
                .map_err(VkError::DebugMessenger)?;
            handles.debug = Some((loader, messenger));
        }
        Ok(handles)
    }
}

impl Drop for InstanceHandles {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn has_validation_layer(entry: &Entry) -> bool {
    unsafe { entry.enumerate_instance_layer_properties() }
        .unwrap_or_default()
        .iter()
        .any(|l| unsafe { CStr::from_ptr(l.layer_name.as_ptr()) } == VALIDATION_LAYER)
}

fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    cfg: &DeviceConfig,
) -> Result<ash::Instance, VkError> {
    let app = CString::new(cfg.app_name.as_str()).unwrap_or_else(|_| CString::from(c"lumen"));
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: c"lumen".as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let wsi = ash_window::enumerate_required_extensions(display_raw)
        .map_err(VkError::InstanceCreation)?;
    let mut exts = wsi.to_vec();
    let mut layers = Vec::new();
    if cfg.validation {
        exts.push(ext_debug::NAME.as_ptr());
        layers.push(VALIDATION_LAYER.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: exts.len() as u32,
        pp_enabled_extension_names: exts.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };
    unsafe { entry.create_instance(&create_info, None) }.map_err(VkError::InstanceCreation)
}

/// Logical device, its queues, and everything it was created from.
pub struct DeviceContext {
    device: ash::Device,
    swapchain_loader: swapchain::Device,
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    memory_props: vk::PhysicalDeviceMemoryProperties,
    // Must stay the last field: dropped after `Drop::drop` destroys the device.
    handles: InstanceHandles,
}

impl DeviceContext {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        cfg: &DeviceConfig,
    ) -> Result<Self, VkError> {
        let handles = InstanceHandles::new(window, display, cfg)?;
        let instance = &handles.instance;

        let adapters =
            unsafe { instance.enumerate_physical_devices() }.map_err(VkError::AdapterQuery)?;
        let (phys, families) = adapters
            .into_iter()
            .find_map(|phys| {
                let props = unsafe { instance.get_physical_device_queue_family_properties(phys) };
                let found = QueueFamilies::resolve(&props, |i| unsafe {
                    handles
                        .surface_loader
                        .get_physical_device_surface_support(phys, i, handles.surface)
                        .unwrap_or(false)
                });
                match found {
                    QueueFamilies::Found { .. } => Some((phys, found)),
                    QueueFamilies::NotFound => None,
                }
            })
            .ok_or(VkError::NoSuitableAdapter)?;
        let QueueFamilies::Found { graphics, present } = families else {
            return Err(VkError::NoSuitableAdapter);
        };

        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();
        let device_exts = [swapchain::NAME.as_ptr()];
        let device_info = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: device_exts.len() as u32,
            pp_enabled_extension_names: device_exts.as_ptr(),
            ..Default::default()
        };
        let device = unsafe { instance.create_device(phys, &device_info, None) }
            .map_err(VkError::DeviceCreation)?;

        let (graphics_queue, present_queue) = unsafe {
            (
                device.get_device_queue(graphics, 0),
                device.get_device_queue(present, 0),
            )
        };
        let swapchain_loader = swapchain::Device::new(instance, &device);
        let memory_props = unsafe { instance.get_physical_device_memory_properties(phys) };

        let props = unsafe { instance.get_physical_device_properties(phys) };
        let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy();
        info!(
            "adapter: {name}, graphics family={graphics}, present family={present}, validation={}",
            cfg.validation
        );

        Ok(Self {
            device,
            swapchain_loader,
            phys,
            families,
            graphics_queue,
            present_queue,
            memory_props,
            handles,
        })
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.phys
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

impl Gpu for DeviceContext {
    fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.handles
                .surface_loader
                .get_physical_device_surface_capabilities(self.phys, self.handles.surface)
        }
    }

    fn surface_formats(&self) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.handles
                .surface_loader
                .get_physical_device_surface_formats(self.phys, self.handles.surface)
        }
    }

    fn surface_present_modes(&self) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.handles
                .surface_loader
                .get_physical_device_surface_present_modes(self.phys, self.handles.surface)
        }
    }

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        // The surface is owned here, so it is filled in here.
        let info = vk::SwapchainCreateInfoKHR {
            surface: self.handles.surface,
            ..*info
        };
        unsafe { self.swapchain_loader.create_swapchain(&info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        unsafe { self.device.create_image_view(info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_render_pass(
        &self,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        unsafe { self.device.create_render_pass(info, None) }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) }
    }

    fn create_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        unsafe { self.device.create_framebuffer(info, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let ci = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_code: code.as_ptr(),
            code_size: std::mem::size_of_val(code),
            ..Default::default()
        };
        unsafe { self.device.create_shader_module(&ci, None) }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.device.destroy_shader_module(module, None) }
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        unsafe { self.device.create_pipeline_layout(info, None) }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) }
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        let created = unsafe {
            self.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(info),
                None,
            )
        };
        match created {
            Ok(pipelines) => pipelines
                .into_iter()
                .next()
                .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED),
            Err((partial, err)) => {
                for p in partial.into_iter().filter(|p| *p != vk::Pipeline::null()) {
                    unsafe { self.device.destroy_pipeline(p, None) };
                }
                Err(err)
            }
        }
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) }
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer> {
        unsafe { self.device.create_buffer(info, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.device.get_buffer_memory_requirements(buffer) }
    }

    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        self.memory_props
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        unsafe { self.device.allocate_memory(info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()> {
        unsafe { self.device.bind_buffer_memory(buffer, memory, 0) }
    }

    fn write_memory(&self, memory: vk::DeviceMemory, bytes: &[u8]) -> VkResult<()> {
        unsafe {
            let dst = self.device.map_memory(
                memory,
                0,
                bytes.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.cast::<u8>(), bytes.len());
            self.device.unmap_memory(memory);
        }
        Ok(())
    }

    fn create_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        unsafe { self.device.create_command_pool(info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        unsafe { self.device.allocate_command_buffers(info) }
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        unsafe { self.device.free_command_buffers(pool, buffers) }
    }

    fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        unsafe { self.device.begin_command_buffer(cmd, info) }
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }
    }

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, info: &vk::RenderPassBeginInfo<'_>) {
        unsafe {
            self.device
                .cmd_begin_render_pass(cmd, info, vk::SubpassContents::INLINE)
        }
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline)
        }
    }

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe { self.device.cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[0]) }
    }

    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32) {
        unsafe { self.device.cmd_draw(cmd, vertex_count, 1, 0, 0) }
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let ci = vk::SemaphoreCreateInfo::default();
        unsafe { self.device.create_semaphore(&ci, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.device.create_fence(&ci, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, timeout_ns) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout_ns, signal, vk::Fence::null())
        }
    }

    fn queue_submit(&self, submit: &vk::SubmitInfo<'_>, fence: vk::Fence) -> VkResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, std::slice::from_ref(submit), fence)
        }
    }

    fn queue_present(&self, present: &vk::PresentInfoKHR<'_>) -> VkResult<bool> {
        unsafe { self.swapchain_loader.queue_present(self.present_queue, present) }
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }
}
