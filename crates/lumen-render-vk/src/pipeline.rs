// SPDX-License-Identifier: CEPL-1.0
//! Fixed-function graphics pipeline for the colour pass.
//!
//! Viewport and scissor are baked in at build time, so a pipeline is only valid for
//! the extent it was built with. The renderer decides when that matters.

use crate::error::VkError;
use crate::gpu::Gpu;
use crate::shader::ShaderSet;
use crate::vertex;
use ash::util::read_spv;
use ash::vk;
use lumen_render::ShaderStage;
use std::ffi::CStr;
use std::io::Cursor;
use tracing::debug;

const ENTRY_POINT: &CStr = c"main";

pub fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo<'static> {
    vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::CLOCKWISE,
        depth_bias_enable: vk::FALSE,
        line_width: 1.0,
        ..Default::default()
    }
}

/// Straight alpha blending on colour, alpha passes through.
pub fn color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState {
        blend_enable: vk::TRUE,
        src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
        dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: vk::BlendFactor::ONE,
        dst_alpha_blend_factor: vk::BlendFactor::ZERO,
        alpha_blend_op: vk::BlendOp::ADD,
        color_write_mask: vk::ColorComponentFlags::RGBA,
    }
}

pub fn viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

fn spirv_words(shaders: &ShaderSet, stage: ShaderStage) -> Result<Vec<u32>, VkError> {
    if !shaders.is_loaded(stage) {
        return Err(VkError::ShaderNotLoaded(stage));
    }
    read_spv(&mut Cursor::new(shaders.bytes(stage)))
        .map_err(|source| VkError::ShaderMalformed { stage, source })
}

#[derive(Debug)]
pub struct PipelineState {
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
        }
    }
}

impl PipelineState {
    /// Shader modules only live for the duration of this call.
    pub fn build<G: Gpu + ?Sized>(
        gpu: &G,
        shaders: &ShaderSet,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
    ) -> Result<Self, VkError> {
        let vs_code = spirv_words(shaders, ShaderStage::Vertex)?;
        let fs_code = spirv_words(shaders, ShaderStage::Fragment)?;

        let vs = gpu
            .create_shader_module(&vs_code)
            .map_err(|source| VkError::ShaderModule {
                stage: ShaderStage::Vertex,
                source,
            })?;
        let fs = match gpu.create_shader_module(&fs_code) {
            Ok(fs) => fs,
            Err(source) => {
                gpu.destroy_shader_module(vs);
                return Err(VkError::ShaderModule {
                    stage: ShaderStage::Fragment,
                    source,
                });
            }
        };

        let built = Self::assemble(gpu, vs, fs, render_pass, extent);
        gpu.destroy_shader_module(vs);
        gpu.destroy_shader_module(fs);
        if built.is_ok() {
            debug!(
                "pipeline built for {}x{}",
                extent.width, extent.height
            );
        }
        built
    }

    fn assemble<G: Gpu + ?Sized>(
        gpu: &G,
        vs: vk::ShaderModule,
        fs: vk::ShaderModule,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
    ) -> Result<Self, VkError> {
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
        ];

        let binding = vertex::binding_description();
        let attributes = vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &binding,
            vertex_attribute_description_count: attributes.len() as u32,
            p_vertex_attribute_descriptions: attributes.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            ..Default::default()
        };

        let viewport = viewport(extent);
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            p_viewports: &viewport,
            scissor_count: 1,
            p_scissors: &scissor,
            ..Default::default()
        };
        let raster = rasterization_state();
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let blend_attachment = color_blend_attachment();
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &blend_attachment,
            ..Default::default()
        };

        // No descriptors or push constants.
        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            ..Default::default()
        };
        let layout = gpu
            .create_pipeline_layout(&layout_info)
            .map_err(VkError::PipelineLayout)?;

        let info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_color_blend_state: &color_blend,
            layout,
            render_pass,
            subpass: 0,
            ..Default::default()
        };
        match gpu.create_graphics_pipeline(&info) {
            Ok(pipeline) => Ok(Self { layout, pipeline }),
            Err(err) => {
                gpu.destroy_pipeline_layout(layout);
                Err(VkError::PipelineCreation(err))
            }
        }
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn is_built(&self) -> bool {
        self.pipeline != vk::Pipeline::null()
    }

    /// Pipeline, then layout. Safe to repeat.
    pub fn cleanup<G: Gpu + ?Sized>(&mut self, gpu: &G) {
        if self.pipeline != vk::Pipeline::null() {
            gpu.destroy_pipeline(self.pipeline);
            self.pipeline = vk::Pipeline::null();
        }
        if self.layout != vk::PipelineLayout::null() {
            gpu.destroy_pipeline_layout(self.layout);
            self.layout = vk::PipelineLayout::null();
        }
    }
}
