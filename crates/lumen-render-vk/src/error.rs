// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use lumen_render::{ShaderFormat, ShaderStage, StatusCode};
use std::path::PathBuf;
use thiserror::Error;

/// How the caller is expected to react to a [`VkError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Resource creation failed; the renderer cannot produce frames.
    FatalToInit,
    /// One frame was dropped; keep drawing.
    FatalToFrame,
    /// The request itself was rejected before any work happened.
    UnsupportedInput,
}

#[derive(Debug, Error)]
pub enum VkError {
    // device
    #[error("validation requested but VK_LAYER_KHRONOS_validation is not installed")]
    ValidationUnavailable,
    #[error("window/display handle unavailable: {0}")]
    WindowHandle(#[source] raw_window_handle::HandleError),
    #[error("vkCreateInstance failed")]
    InstanceCreation(#[source] vk::Result),
    #[error("surface creation failed")]
    SurfaceCreation(#[source] vk::Result),
    #[error("debug messenger creation failed")]
    DebugMessenger(#[source] vk::Result),
    #[error("adapter enumeration failed")]
    AdapterQuery(#[source] vk::Result),
    #[error("no adapter exposes both a graphics and a present queue for this surface")]
    NoSuitableAdapter,
    #[error("vkCreateDevice failed")]
    DeviceCreation(#[source] vk::Result),

    // swapchain
    #[error("surface capability query failed")]
    SurfaceQuery(#[source] vk::Result),
    #[error("surface reports no formats")]
    NoSurfaceFormats,
    #[error("vkCreateSwapchainKHR failed")]
    SwapchainCreation(#[source] vk::Result),
    #[error("swapchain image query failed")]
    SwapchainImages(#[source] vk::Result),
    #[error("surface extent {width}x{height} has a zero dimension")]
    ZeroExtent { width: u32, height: u32 },
    #[error("image view creation failed at index {index}")]
    ImageView {
        index: usize,
        #[source]
        source: vk::Result,
    },

    // render targets
    #[error("render pass creation failed")]
    RenderPassCreation(#[source] vk::Result),
    #[error("framebuffer creation failed at index {index}")]
    Framebuffer {
        index: usize,
        #[source]
        source: vk::Result,
    },

    // shaders and pipeline
    #[error("shader format {0:?} is not supported, only SPIR-V is")]
    UnsupportedShaderFormat(ShaderFormat),
    #[error("failed to read shader {}", path.display())]
    ShaderRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shader file {} is empty", path.display())]
    ShaderEmpty { path: PathBuf },
    #[error("{0} shader was not loaded before the pipeline build")]
    ShaderNotLoaded(ShaderStage),
    #[error("{stage} shader is not valid SPIR-V")]
    ShaderMalformed {
        stage: ShaderStage,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} shader module creation failed")]
    ShaderModule {
        stage: ShaderStage,
        #[source]
        source: vk::Result,
    },
    #[error("pipeline layout creation failed")]
    PipelineLayout(#[source] vk::Result),
    #[error("graphics pipeline creation failed")]
    PipelineCreation(#[source] vk::Result),

    // vertex buffer
    #[error("vertex buffer creation failed")]
    BufferCreation(#[source] vk::Result),
    #[error("no host-visible memory type fits the vertex buffer")]
    NoMemoryType,
    #[error("vertex memory allocation failed")]
    MemoryAllocation(#[source] vk::Result),
    #[error("vertex upload failed")]
    MemoryUpload(#[source] vk::Result),

    // commands
    #[error("command pool creation failed")]
    CommandPool(#[source] vk::Result),
    #[error("command buffer allocation failed")]
    CommandBufferAllocation(#[source] vk::Result),
    #[error("command buffer recording failed at index {index}")]
    CommandRecording {
        index: usize,
        #[source]
        source: vk::Result,
    },

    // frame
    #[error("sync object creation failed for frame slot {slot}")]
    SyncObjects {
        slot: usize,
        #[source]
        source: vk::Result,
    },
    #[error("fence wait failed")]
    FenceWait(#[source] vk::Result),
    #[error("fence wait timed out")]
    FenceTimeout,
    #[error("fence reset failed")]
    FenceReset(#[source] vk::Result),
    #[error("image acquisition failed")]
    Acquire(#[source] vk::Result),
    #[error("queue submission failed")]
    Submit(#[source] vk::Result),
    #[error("presentation failed")]
    Present(#[source] vk::Result),

    // lifecycle
    #[error("device drain before recovery failed")]
    DeviceIdle(#[source] vk::Result),
    #[error("renderer is not initialized")]
    NotInitialized,
}

impl VkError {
    pub fn class(&self) -> ErrorClass {
        use VkError::*;
        match self {
            UnsupportedShaderFormat(_) => ErrorClass::UnsupportedInput,
            FenceWait(_) | FenceTimeout | FenceReset(_) | Acquire(_) | Submit(_) | Present(_) => {
                ErrorClass::FatalToFrame
            }
            _ => ErrorClass::FatalToInit,
        }
    }
}

impl StatusCode for VkError {
    fn code(&self) -> u16 {
        use VkError::*;
        match self {
            ValidationUnavailable => 10,
            WindowHandle(_) => 11,
            InstanceCreation(_) => 12,
            SurfaceCreation(_) => 13,
            DebugMessenger(_) => 14,
            AdapterQuery(_) => 15,
            NoSuitableAdapter => 16,
            DeviceCreation(_) => 17,

            SurfaceQuery(_) => 20,
            NoSurfaceFormats => 21,
            SwapchainCreation(_) => 22,
            SwapchainImages(_) => 23,
            ImageView { .. } => 24,
            ZeroExtent { .. } => 25,

            RenderPassCreation(_) => 30,
            Framebuffer { .. } => 31,

            UnsupportedShaderFormat(_) => 40,
            ShaderRead { .. } => 41,
            ShaderEmpty { .. } => 42,
            ShaderNotLoaded(_) => 43,
            ShaderMalformed { .. } => 44,
            ShaderModule { .. } => 45,
            PipelineLayout(_) => 46,
            PipelineCreation(_) => 47,

            BufferCreation(_) => 50,
            NoMemoryType => 51,
            MemoryAllocation(_) => 52,
            MemoryUpload(_) => 53,

            CommandPool(_) => 60,
            CommandBufferAllocation(_) => 61,
            CommandRecording { .. } => 62,

            SyncObjects { .. } => 70,
            FenceWait(_) => 71,
            FenceTimeout => 72,
            FenceReset(_) => 73,
            Acquire(_) => 74,
            Submit(_) => 75,
            Present(_) => 76,

            DeviceIdle(_) => 90,
            NotInitialized => 91,
        }
    }

    fn tag(&self) -> &'static str {
        use VkError::*;
        match self {
            ValidationUnavailable => "DEV-VAL",
            WindowHandle(_) => "DEV-HND",
            InstanceCreation(_) => "DEV-INS",
            SurfaceCreation(_) => "DEV-SRF",
            DebugMessenger(_) => "DEV-DBG",
            AdapterQuery(_) => "DEV-ENU",
            NoSuitableAdapter => "DEV-ADP",
            DeviceCreation(_) => "DEV-DEV",

            SurfaceQuery(_) => "SWP-QRY",
            NoSurfaceFormats => "SWP-FMT",
            SwapchainCreation(_) => "SWP-NEW",
            SwapchainImages(_) => "SWP-IMG",
            ImageView { .. } => "SWP-IVW",
            ZeroExtent { .. } => "SWP-ZER",

            RenderPassCreation(_) => "RTG-RPS",
            Framebuffer { .. } => "RTG-FBO",

            UnsupportedShaderFormat(_) => "SHD-FMT",
            ShaderRead { .. } => "SHD-RD",
            ShaderEmpty { .. } => "SHD-EMP",
            ShaderNotLoaded(_) => "SHD-NLD",
            ShaderMalformed { .. } => "SHD-SPV",
            ShaderModule { .. } => "PIP-MOD",
            PipelineLayout(_) => "PIP-LAY",
            PipelineCreation(_) => "PIP-NEW",

            BufferCreation(_) => "BUF-NEW",
            NoMemoryType => "BUF-TYP",
            MemoryAllocation(_) => "BUF-MEM",
            MemoryUpload(_) => "BUF-UPL",

            CommandPool(_) => "CMD-POL",
            CommandBufferAllocation(_) => "CMD-ALC",
            CommandRecording { .. } => "CMD-REC",

            SyncObjects { .. } => "FRM-SYN",
            FenceWait(_) => "FRM-WT",
            FenceTimeout => "FRM-TMO",
            FenceReset(_) => "FRM-RST",
            Acquire(_) => "FRM-ACQ",
            Submit(_) => "FRM-SUB",
            Present(_) => "FRM-PRS",

            DeviceIdle(_) => "REC-IDL",
            NotInitialized => "REC-NIN",
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
