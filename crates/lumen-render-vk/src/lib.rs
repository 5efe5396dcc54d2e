// SPDX-License-Identifier: CEPL-1.0
//! Vulkan presentation core: device, swapchain, render targets, pipeline and the
//! frame loop with its resize recovery.
#![deny(unsafe_op_in_unsafe_fn)]

mod buffer;
mod commands;
mod device;
mod error;
mod frame;
mod gpu;
mod pipeline;
mod render_target;
mod renderer;
mod shader;
mod swapchain;
mod vertex;

#[cfg(test)]
mod mock;

pub use buffer::{find_memory_type, VertexBuffer};
pub use commands::{CommandSet, RecordInputs};
pub use device::{DeviceConfig, DeviceContext, QueueFamilies, VALIDATION_ENV};
pub use error::{ErrorClass, VkError};
pub use frame::{clamp_frames_in_flight, FrameRing, FrameSlot};
pub use gpu::Gpu;
pub use pipeline::PipelineState;
pub use render_target::RenderTargets;
pub use renderer::VkRenderer;
pub use shader::{default_shader_path, load_shader, ShaderSet};
pub use swapchain::SwapState;
pub use vertex::{Vertex, TRIANGLE};
